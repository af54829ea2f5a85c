//! Application state for the API server.

use chiron_pipeline::{Pipeline, PipelineConfig};

/// Shared application state for the API server.
pub struct AppState {
    /// The pipeline that handles every request
    pub pipeline: Pipeline,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state with the given pipeline configuration.
    pub fn new(config: &PipelineConfig) -> chiron_common::Result<Self> {
        Ok(Self::with_pipeline(Pipeline::from_config(config)?))
    }

    /// Create application state around an existing pipeline.
    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
