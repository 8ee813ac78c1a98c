//! Trading Stream Message Types
//!
//! Wire envelope for inbound events and the outbound subscription commands.

use crate::domain::{Channel, Order, PnlSnapshot, Position};
use hypersockets::WsMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Inbound
// =============================================================================

/// Envelope of every inbound frame
///
/// ```json
/// {"type": "order_update", "channel": "orders", "data": {...}, "timestamp": 1718000000000}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub data: Option<Value>,

    /// Epoch seconds/milliseconds or an RFC 3339 string
    #[serde(default)]
    pub timestamp: Option<Value>,

    /// Confirmations may carry the channel list at the top level
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

/// Known values of the envelope `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    OrderUpdate,
    PositionUpdate,
    PnlUpdate,
    Subscribed,
    Unsubscribed,
    Unknown,
}

impl MessageType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "order_update" => MessageType::OrderUpdate,
            "position_update" => MessageType::PositionUpdate,
            "pnl_update" => MessageType::PnlUpdate,
            "subscribed" => MessageType::Subscribed,
            "unsubscribed" => MessageType::Unsubscribed,
            _ => MessageType::Unknown,
        }
    }
}

/// A parsed, transformed inbound event
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Order(Order),
    Position(Position),
    Pnl(PnlSnapshot),
    /// Backend-confirmed subscription set after a subscribe
    Subscribed(Vec<Channel>),
    /// Backend-confirmed subscription set after an unsubscribe
    Unsubscribed(Vec<Channel>),
    /// Unrecognized event type, ignored
    Unknown(String),
}

/// Route keys for the trading stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRoute {
    /// Order, position and P&L updates applied to the state store
    State,
    /// Subscription confirmations and unknown events
    Control,
}

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

/// `{"action": "subscribe", "channels": ["orders", "pnl"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCommand {
    pub action: SubscriptionAction,
    pub channels: Vec<Channel>,
}

impl SubscriptionCommand {
    pub fn subscribe(channels: Vec<Channel>) -> Self {
        Self {
            action: SubscriptionAction::Subscribe,
            channels,
        }
    }

    pub fn unsubscribe(channels: Vec<Channel>) -> Self {
        Self {
            action: SubscriptionAction::Unsubscribe,
            channels,
        }
    }

    pub fn to_ws_message(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_command_wire_format() {
        let command = SubscriptionCommand::subscribe(vec![Channel::Orders, Channel::Pnl]);
        let message = command.to_ws_message().unwrap();
        assert_eq!(
            message.as_text(),
            Some(r#"{"action":"subscribe","channels":["orders","pnl"]}"#)
        );
    }

    #[test]
    fn test_envelope_optional_fields() {
        let envelope: StreamEnvelope = serde_json::from_str(r#"{"type":"pnl_update"}"#).unwrap();
        assert_eq!(MessageType::from_str(&envelope.event_type), MessageType::PnlUpdate);
        assert!(envelope.data.is_none());
        assert!(envelope.timestamp.is_none());

        let envelope: StreamEnvelope =
            serde_json::from_str(r#"{"type":"heartbeat","extra":true}"#).unwrap();
        assert_eq!(MessageType::from_str(&envelope.event_type), MessageType::Unknown);
    }
}
