use ragchat_core::ChatOrchestrator;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
    pub version: String,
}
