use crate::parser::WsMessage;

/// Source of the subscription messages sent after every successful handshake
///
/// The provider is asked on each (re)connect, so the replayed set always
/// reflects the current desired subscriptions rather than those known at
/// build time.
pub trait SubscriptionProvider: Send + Sync {
    fn replay_messages(&self) -> Vec<WsMessage>;
}

/// Fixed list of subscription messages
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions {
    messages: Vec<WsMessage>,
}

impl StaticSubscriptions {
    pub fn new(messages: Vec<WsMessage>) -> Self {
        Self { messages }
    }
}

impl SubscriptionProvider for StaticSubscriptions {
    fn replay_messages(&self) -> Vec<WsMessage> {
        self.messages.clone()
    }
}
