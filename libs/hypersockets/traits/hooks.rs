use crate::error::HyperSocketError;
use crate::parser::WsMessage;

/// Observation hooks invoked by the driver task
///
/// All methods default to no-ops. Hooks run inline on the driver task, after
/// the state change they report has been published.
pub trait ConnectionHooks: Send + Sync {
    /// Handshake succeeded and the connection is usable
    fn on_connect(&self) {}

    /// A previously established or pending connection ended
    fn on_disconnect(&self) {}

    /// Every data frame, before it is parsed
    fn on_message(&self, _message: &WsMessage) {}

    /// Transport error (handshake failure, read or write error)
    fn on_error(&self, _error: &HyperSocketError) {}
}

/// Hooks that observe nothing
pub struct NoHooks;

impl ConnectionHooks for NoHooks {}
