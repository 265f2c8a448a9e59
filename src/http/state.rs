//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::{BookingOrchestrator, RecurrenceExpander};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for storage operations
    pub repository: Arc<dyn FullRepository>,
    /// Booking orchestrator owning the advisory lock registry
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Recurring series expander
    pub expander: Arc<RecurrenceExpander>,
}

impl AppState {
    /// Create application state with default service wiring.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        let orchestrator = Arc::new(BookingOrchestrator::new(repository.clone()));
        let expander = Arc::new(RecurrenceExpander::new(
            repository.clone(),
            orchestrator.clone(),
        ));
        Self {
            repository,
            orchestrator,
            expander,
        }
    }
}
