use crate::analysis::AnalysisQueue;
use crate::gateway::RealtimeGateway;
use crate::session::SessionRegistry;

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: RealtimeGateway,
}

impl AppState {
    pub fn new(gateway: RealtimeGateway) -> Self {
        Self { gateway }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.gateway.registry()
    }

    pub fn queue(&self) -> &AnalysisQueue {
        self.gateway.queue()
    }
}
