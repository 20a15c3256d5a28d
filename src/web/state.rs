use crate::chat::ChatSession;
use crate::config::AppConfig;
use crate::llm::{LlmError, LlmManager, TextCompletion};
use crate::web::session::SessionStore;
use crate::web::templates::init_templates;
use minijinja::Environment;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub template_env: Environment<'static>,
    pub llm_manager: LlmManager,
    pub sessions: SessionStore,
    pub startup_time: chrono::DateTime<chrono::Utc>,
    default_llm: Arc<dyn TextCompletion>,
}

impl AppState {
    pub fn new(config: AppConfig, llm_manager: LlmManager) -> Result<Self, LlmError> {
        let default_llm = llm_manager.client_for(llm_manager.default_model())?;
        let sessions = SessionStore::new(config.web.session_idle_minutes);

        Ok(Self {
            config,
            template_env: init_templates(),
            llm_manager,
            sessions,
            startup_time: chrono::Utc::now(),
            default_llm,
        })
    }

    /// Replaces the completion client new sessions start with.
    #[cfg(test)]
    pub fn with_default_llm(mut self, llm: Arc<dyn TextCompletion>) -> Self {
        self.default_llm = llm;
        self
    }

    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(
            Arc::clone(&self.default_llm),
            self.config.chat.routing,
            self.config.database.sample_rows,
        )
    }
}
