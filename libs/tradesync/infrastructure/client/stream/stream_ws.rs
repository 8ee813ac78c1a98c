//! Trading Stream WebSocket Client
//!
//! Connects to the trading backend's streaming endpoint and keeps the
//! [`TradingHub`] in sync with order, position and P&L events. The desired
//! channel set is replayed on every (re)connect; a REST resync after each
//! `Connected` event covers anything missed while the stream was down.

use super::hub::TradingHub;
use super::subscriptions::{
    parse_channel_names, SharedSubscriptions, SubscriptionRegistry, SubscriptionReplay,
};
use super::transform::{order_from_wire, parse_timestamp, pnl_from_wire, position_from_wire};
use super::types::{MessageType, StreamEnvelope, StreamMessage, StreamRoute, SubscriptionCommand};
use crate::domain::Channel;
use crate::infrastructure::config::StreamOptions;
use anyhow::Result;
use hypersockets::core::*;
use hypersockets::{
    ConnectionHooks, FixedDelay, HyperSocketError, MessageHandler, MessageRouter, NeverReconnect,
    WsMessage,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// Router
// =============================================================================

/// Router for parsing trading stream messages
pub struct StreamRouter;

impl StreamRouter {
    /// Parse one text frame: envelope first, then the Transform Layer
    pub fn parse_text(text: &str) -> hypersockets::Result<StreamMessage> {
        let envelope: StreamEnvelope = serde_json::from_str(text)
            .map_err(|e| HyperSocketError::ParseError(format!("Invalid envelope: {}", e)))?;

        match MessageType::from_str(&envelope.event_type) {
            MessageType::OrderUpdate => {
                let mut order = order_from_wire(payload(&envelope)?).map_err(transform_error)?;
                if order.updated_at.is_none() {
                    order.updated_at = envelope_time(&envelope);
                }
                Ok(StreamMessage::Order(order))
            }
            MessageType::PositionUpdate => {
                let mut position =
                    position_from_wire(payload(&envelope)?).map_err(transform_error)?;
                if position.updated_at.is_none() {
                    position.updated_at = envelope_time(&envelope);
                }
                Ok(StreamMessage::Position(position))
            }
            MessageType::PnlUpdate => {
                let mut pnl = pnl_from_wire(payload(&envelope)?).map_err(transform_error)?;
                if pnl.updated_at.is_none() {
                    pnl.updated_at = envelope_time(&envelope);
                }
                Ok(StreamMessage::Pnl(pnl))
            }
            MessageType::Subscribed => Ok(StreamMessage::Subscribed(confirmed_channels(&envelope)?)),
            MessageType::Unsubscribed => {
                Ok(StreamMessage::Unsubscribed(confirmed_channels(&envelope)?))
            }
            MessageType::Unknown => Ok(StreamMessage::Unknown(envelope.event_type)),
        }
    }
}

#[async_trait::async_trait]
impl MessageRouter for StreamRouter {
    type Message = StreamMessage;
    type RouteKey = StreamRoute;

    async fn parse(&self, message: WsMessage) -> hypersockets::Result<Self::Message> {
        let text = message
            .to_text()
            .ok_or_else(|| HyperSocketError::ParseError("Non UTF-8 binary frame".to_string()))?;
        Self::parse_text(text)
    }

    fn route_key(&self, message: &Self::Message) -> Self::RouteKey {
        match message {
            StreamMessage::Order(_) | StreamMessage::Position(_) | StreamMessage::Pnl(_) => {
                StreamRoute::State
            }
            StreamMessage::Subscribed(_)
            | StreamMessage::Unsubscribed(_)
            | StreamMessage::Unknown(_) => StreamRoute::Control,
        }
    }
}

fn payload(envelope: &StreamEnvelope) -> hypersockets::Result<&Value> {
    envelope.data.as_ref().ok_or_else(|| {
        HyperSocketError::ParseError(format!("{} without data", envelope.event_type))
    })
}

fn envelope_time(envelope: &StreamEnvelope) -> Option<chrono::DateTime<chrono::Utc>> {
    envelope.timestamp.as_ref().and_then(parse_timestamp)
}

fn transform_error(e: super::transform::TransformError) -> HyperSocketError {
    HyperSocketError::ParseError(e.to_string())
}

/// Channel list of a confirmation: `data.channels`, `data` as a list, or a
/// top-level `channels` field, in that order
fn confirmed_channels(envelope: &StreamEnvelope) -> hypersockets::Result<Vec<Channel>> {
    let from_data = match envelope.data.as_ref() {
        Some(Value::Object(obj)) => obj.get("channels").and_then(Value::as_array),
        Some(Value::Array(list)) => Some(list),
        _ => None,
    };

    if let Some(list) = from_data {
        return Ok(parse_channel_names(list.iter().filter_map(Value::as_str)));
    }
    if let Some(list) = envelope.channels.as_ref() {
        return Ok(parse_channel_names(list.iter().map(String::as_str)));
    }

    Err(HyperSocketError::ParseError(format!(
        "{} confirmation without a channel list",
        envelope.event_type
    )))
}

// =============================================================================
// Handlers
// =============================================================================

/// Applies order, position and P&L updates to the hub
pub struct StateHandler {
    hub: TradingHub,
}

impl StateHandler {
    pub fn new(hub: TradingHub) -> Self {
        Self { hub }
    }
}

impl MessageHandler<StreamMessage> for StateHandler {
    fn handle(&mut self, message: StreamMessage) -> hypersockets::Result<()> {
        match message {
            StreamMessage::Order(order) => {
                debug!(
                    "[TradingStream] Order {}: {} {} {} (filled {}/{})",
                    order.order_id,
                    order.status,
                    order.side,
                    order.symbol,
                    order.filled_quantity,
                    order.quantity
                );
                self.hub.apply_order(order);
            }
            StreamMessage::Position(position) => {
                debug!(
                    "[TradingStream] Position {}: {} qty {} pnl {:.2}",
                    position.position_id, position.symbol, position.quantity, position.unrealized_pnl
                );
                if !position.has_consistent_quantity() {
                    debug!(
                        "[TradingStream] Position {} net {} differs from buy {} - sell {}",
                        position.position_id,
                        position.quantity,
                        position.buy_quantity,
                        position.sell_quantity
                    );
                }
                self.hub.apply_position(position);
            }
            StreamMessage::Pnl(pnl) => {
                debug!(
                    "[TradingStream] P&L total {:.2} day {:.2}",
                    pnl.total_pnl, pnl.day_pnl
                );
                self.hub.apply_pnl(pnl);
            }
            other => debug!("[TradingStream] State handler ignoring {:?}", other),
        }
        Ok(())
    }
}

/// Reconciles subscription confirmations; ignores unknown event types
pub struct ControlHandler {
    subscriptions: SharedSubscriptions,
}

impl ControlHandler {
    pub fn new(subscriptions: SharedSubscriptions) -> Self {
        Self { subscriptions }
    }
}

impl MessageHandler<StreamMessage> for ControlHandler {
    fn handle(&mut self, message: StreamMessage) -> hypersockets::Result<()> {
        match message {
            StreamMessage::Subscribed(channels) | StreamMessage::Unsubscribed(channels) => {
                info!("[TradingStream] Subscriptions confirmed: {:?}", channels);
                self.subscriptions.write().confirm(channels);
            }
            StreamMessage::Unknown(event_type) => {
                debug!("[TradingStream] Ignoring event type '{}'", event_type);
            }
            other => debug!("[TradingStream] Control handler ignoring {:?}", other),
        }
        Ok(())
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Owned streaming session: transport, subscriptions and state hub
pub struct TradingStream {
    client: WebSocketClient<StreamRouter, StreamMessage>,
    hub: TradingHub,
    subscriptions: SharedSubscriptions,
}

impl TradingStream {
    /// Build the stream with a fresh hub
    ///
    /// Connects immediately when `options.auto_connect` is set and a session
    /// token is present; otherwise waits for `connect()` or `set_session()`.
    pub async fn start(
        options: &StreamOptions,
        session: Option<String>,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> Result<Self> {
        Self::start_with_hub(options, session, hooks, TradingHub::new()).await
    }

    /// Build the stream on top of an existing hub
    pub async fn start_with_hub(
        options: &StreamOptions,
        session: Option<String>,
        hooks: Arc<dyn ConnectionHooks>,
        hub: TradingHub,
    ) -> Result<Self> {
        let subscriptions =
            SubscriptionRegistry::with_channels(options.channels.iter().copied()).shared();

        let state_handler = StateHandler::new(hub.clone());
        let control_handler = ControlHandler::new(Arc::clone(&subscriptions));

        info!(
            "[TradingStream] Starting (url: {}, channels: {:?}, session: {})",
            options.ws_url,
            options.channels,
            if session.is_some() { "present" } else { "absent" }
        );

        let builder = WebSocketClientBuilder::new()
            .url(options.ws_url.clone())
            .router(StreamRouter, move |routing| {
                routing
                    .handler(StreamRoute::State, state_handler)
                    .handler(StreamRoute::Control, control_handler)
            })
            .credential_query(options.credential_param.clone())
            .credential(session)
            .auto_connect(options.auto_connect)
            .connect_timeout(options.connect_timeout())
            .subscriptions(SubscriptionReplay::new(Arc::clone(&subscriptions)))
            .hooks(hooks);

        let builder = if options.auto_reconnect {
            builder.reconnect_strategy(FixedDelay::new(
                options.reconnect_interval(),
                Some(options.max_reconnect_attempts),
            ))
        } else {
            builder.reconnect_strategy(NeverReconnect)
        };

        let client = builder.build().await?;

        Ok(Self {
            client,
            hub,
            subscriptions,
        })
    }

    pub fn connect(&self) -> Result<()> {
        self.client.connect()?;
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        self.client.disconnect()?;
        Ok(())
    }

    /// Replace the session token; `None` forces a disconnect
    pub fn set_session(&self, session: Option<String>) -> Result<()> {
        self.client.set_credential(session)?;
        Ok(())
    }

    /// Add channels to the desired set, sending the command if connected.
    /// Returns the channels that were not desired before.
    pub fn subscribe(&self, channels: &[Channel]) -> Result<Vec<Channel>> {
        let added = self.subscriptions.write().subscribe(channels);
        if !channels.is_empty() {
            self.send_if_connected(SubscriptionCommand::subscribe(dedup(channels)))?;
        }
        Ok(added)
    }

    /// Remove channels from the desired set, sending the command if connected.
    /// Returns the channels that were desired before.
    pub fn unsubscribe(&self, channels: &[Channel]) -> Result<Vec<Channel>> {
        let removed = self.subscriptions.write().unsubscribe(channels);
        if !channels.is_empty() {
            self.send_if_connected(SubscriptionCommand::unsubscribe(dedup(channels)))?;
        }
        Ok(removed)
    }

    /// Send an arbitrary JSON payload. Dropped with a warning unless connected.
    pub fn send_message<T: Serialize>(&self, payload: &T) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.client.send(WsMessage::Text(text))?;
        Ok(())
    }

    fn send_if_connected(&self, command: SubscriptionCommand) -> Result<()> {
        if !self.client.is_connected() {
            debug!(
                "[TradingStream] Not connected, {:?} {:?} applies on next connect",
                command.action, command.channels
            );
            return Ok(());
        }
        self.client.send(command.to_ws_message()?)?;
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.connection_state()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn desired_channels(&self) -> Vec<Channel> {
        self.subscriptions.read().desired()
    }

    pub fn hub(&self) -> &TradingHub {
        &self.hub
    }

    /// Next lifecycle event, if any. Events are buffered with a fixed
    /// capacity; an undrained buffer loses its oldest entries.
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.client.try_recv_event()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.client.recv_event_timeout(timeout)
    }

    pub fn metrics(&self) -> Metrics {
        self.client.metrics()
    }

    /// Disconnect and stop the driver task
    pub async fn shutdown(self) -> Result<()> {
        info!("[TradingStream] Shutting down");
        self.client.shutdown().await?;
        Ok(())
    }
}

fn dedup(channels: &[Channel]) -> Vec<Channel> {
    let mut channels = channels.to_vec();
    channels.sort();
    channels.dedup();
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderStatus;
    use chrono::TimeZone;

    fn parse(text: &str) -> StreamMessage {
        StreamRouter::parse_text(text).unwrap()
    }

    #[test]
    fn test_order_update_parsed() {
        let message = parse(
            r#"{"type":"order_update","channel":"orders","data":{"orderId":"O1","status":"PLACED","quantity":10,"filledQuantity":0}}"#,
        );
        match message {
            StreamMessage::Order(order) => {
                assert_eq!(order.order_id, "O1");
                assert_eq!(order.status, OrderStatus::Placed);
                assert_eq!(order.quantity, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_envelope_timestamp_fills_missing_updated_at() {
        let message = parse(
            r#"{"type":"position_update","data":{"position_id":"P1"},"timestamp":1718000000000}"#,
        );
        let StreamMessage::Position(position) = message else {
            panic!("expected position");
        };
        assert_eq!(
            position.updated_at,
            Some(chrono::Utc.timestamp_millis_opt(1_718_000_000_000).unwrap())
        );
    }

    #[test]
    fn test_confirmation_channel_sources() {
        let from_data = parse(r#"{"type":"subscribed","data":{"channels":["orders","pnl"]}}"#);
        let from_list = parse(r#"{"type":"subscribed","data":["orders","pnl"]}"#);
        let from_top = parse(r#"{"type":"unsubscribed","channels":["orders","bogus","pnl"]}"#);

        for message in [from_data, from_list, from_top] {
            match message {
                StreamMessage::Subscribed(channels) | StreamMessage::Unsubscribed(channels) => {
                    assert_eq!(channels, vec![Channel::Orders, Channel::Pnl]);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_malformed_frames_are_parse_errors() {
        for text in [
            "not json",
            r#"{"channel":"orders"}"#,
            r#"{"type":"order_update"}"#,
            r#"{"type":"order_update","data":{"symbol":"INFY"}}"#,
            r#"{"type":"subscribed"}"#,
        ] {
            assert!(
                matches!(StreamRouter::parse_text(text), Err(HyperSocketError::ParseError(_))),
                "expected parse error for {}",
                text
            );
        }
    }

    #[test]
    fn test_unknown_type_is_ignored_not_an_error() {
        let message = parse(r#"{"type":"execution_report","data":{}}"#);
        assert!(matches!(message, StreamMessage::Unknown(ref t) if t == "execution_report"));
        assert_eq!(StreamRouter.route_key(&message), StreamRoute::Control);
    }

    #[test]
    fn test_state_handler_applies_to_hub() {
        let hub = TradingHub::new();
        let mut handler = StateHandler::new(hub.clone());

        handler
            .handle(parse(
                r#"{"type":"order_update","data":{"order_id":"O1","status":"FILLED","quantity":10,"filled_quantity":10}}"#,
            ))
            .unwrap();
        handler
            .handle(parse(r#"{"type":"pnl_update","data":{"totalPnl":42.0,"dayPnl":4.2}}"#))
            .unwrap();

        assert_eq!(hub.order("O1").unwrap().status, OrderStatus::Filled);
        assert_eq!(hub.pnl().total_pnl, 42.0);
    }

    #[test]
    fn test_control_handler_reconciles_desired_set() {
        let subscriptions =
            SubscriptionRegistry::with_channels([Channel::Orders, Channel::Positions]).shared();
        let mut handler = ControlHandler::new(Arc::clone(&subscriptions));

        handler
            .handle(StreamMessage::Subscribed(vec![Channel::Orders]))
            .unwrap();
        assert_eq!(subscriptions.read().desired(), vec![Channel::Orders]);
    }
}
