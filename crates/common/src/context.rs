//! Per-request session state handed to task agents.

/// Problem statement and editor code for one request.
///
/// Built fresh per request; nothing here outlives the HTTP call.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    problem_content: String,
    editor_code: String,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the problem statement, including with an empty one.
    pub fn set_problem_content(&mut self, content: impl Into<String>) {
        self.problem_content = content.into();
    }

    /// Replaces the editor code. Blank input is ignored so a stray
    /// empty field cannot wipe code set earlier in the request.
    pub fn set_editor_code(&mut self, code: impl Into<String>) {
        let code = code.into();
        if !code.trim().is_empty() {
            self.editor_code = code;
        }
    }

    pub fn problem_content(&self) -> &str {
        &self.problem_content
    }

    pub fn editor_code(&self) -> &str {
        &self.editor_code
    }

    pub fn has_editor_code(&self) -> bool {
        !self.editor_code.trim().is_empty()
    }
}
