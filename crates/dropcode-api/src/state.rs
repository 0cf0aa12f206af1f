//! Shared application state

use std::sync::Arc;

use dropcode_core::{Config, EventSink, TransferEvent};
use dropcode_services::TransferService;

/// State handed to every handler
pub struct AppState {
    pub transfers: TransferService,
    /// Sink for request-level audit events (client IP attached)
    pub events: Arc<dyn EventSink>,
    pub config: Config,
}

impl AppState {
    pub fn new(transfers: TransferService, events: Arc<dyn EventSink>, config: Config) -> Self {
        Self {
            transfers,
            events,
            config,
        }
    }

    pub fn emit(&self, event: TransferEvent) {
        self.events.emit(event);
    }
}
