//! Trading entities: orders, positions and the P&L snapshot
//!
//! These are the reconciled, internal representations. Wire payloads are
//! mapped onto them by the transform layer; nothing here knows about JSON
//! field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing derived P&L figures
const PNL_EPSILON: f64 = 1e-9;

/// Uppercase and unify separators so "partially-filled", "PARTIALLY_FILLED"
/// and "Partially Filled" compare equal
fn normalize(s: &str) -> String {
    s.trim()
        .to_uppercase()
        .replace(|c: char| c == '-' || c == ' ', "_")
}

// =============================================================================
// Enums
// =============================================================================

/// Side of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "BUY" | "B" => Some(Side::Buy),
            "SELL" | "S" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "MARKET" | "MKT" => Some(OrderKind::Market),
            "LIMIT" | "LMT" => Some(OrderKind::Limit),
            "STOP" | "STOP_MARKET" | "SL_M" => Some(OrderKind::Stop),
            "STOP_LIMIT" | "STOPLIMIT" | "SL" => Some(OrderKind::StopLimit),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted locally, not yet acknowledged by the venue
    #[default]
    Pending,
    /// Acknowledged by the venue
    Placed,
    /// Working on the book
    Open,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "PENDING" | "NEW" => Some(OrderStatus::Pending),
            "PLACED" => Some(OrderStatus::Placed),
            "OPEN" | "LIVE" | "WORKING" => Some(OrderStatus::Open),
            "FILLED" | "COMPLETE" | "COMPLETED" | "EXECUTED" => Some(OrderStatus::Filled),
            "PARTIALLY_FILLED" | "PARTIAL" | "PARTIAL_FILL" => Some(OrderStatus::PartiallyFilled),
            "CANCELLED" | "CANCELED" => Some(OrderStatus::Cancelled),
            "REJECTED" => Some(OrderStatus::Rejected),
            "EXPIRED" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }

    /// Filled, cancelled, rejected and expired orders never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Placed => write!(f, "PLACED"),
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Paper or live trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingMode {
    #[default]
    Paper,
    Live,
}

impl TradingMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "PAPER" | "SIMULATED" | "PAPER_TRADING" => Some(TradingMode::Paper),
            "LIVE" | "REAL" | "LIVE_TRADING" => Some(TradingMode::Live),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Paper => write!(f, "PAPER"),
            TradingMode::Live => write!(f, "LIVE"),
        }
    }
}

/// What caused an order to be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionTrigger {
    Entry,
    Exit,
    #[default]
    Manual,
}

impl ExecutionTrigger {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "ENTRY" => Some(ExecutionTrigger::Entry),
            "EXIT" => Some(ExecutionTrigger::Exit),
            "MANUAL" => Some(ExecutionTrigger::Manual),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for ExecutionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTrigger::Entry => write!(f, "ENTRY"),
            ExecutionTrigger::Exit => write!(f, "EXIT"),
            ExecutionTrigger::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Position status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    #[default]
    Open,
    Closed,
    SquaredOff,
}

impl PositionStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "OPEN" => Some(PositionStatus::Open),
            "CLOSED" => Some(PositionStatus::Closed),
            "SQUARED_OFF" | "SQUAREDOFF" | "SQUARE_OFF" => Some(PositionStatus::SquaredOff),
            _ => None,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "OPEN"),
            PositionStatus::Closed => write!(f, "CLOSED"),
            PositionStatus::SquaredOff => write!(f, "SQUARED_OFF"),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order as known to the dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    /// Backend-assigned identifier
    pub order_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Requested quantity
    pub quantity: i64,
    /// Limit price (limit and stop-limit orders)
    pub price: Option<f64>,
    /// Trigger price (stop and stop-limit orders)
    pub trigger_price: Option<f64>,
    /// Product category, e.g. intraday or delivery
    pub product: String,
    pub status: OrderStatus,
    /// Never exceeds `quantity` once stored
    pub filled_quantity: i64,
    pub average_price: Option<f64>,
    pub rejection_reason: Option<String>,
    pub trading_mode: TradingMode,
    pub broker_id: String,
    pub client_id: String,
    pub strategy_id: Option<String>,
    pub basket_id: Option<String>,
    pub leg_id: Option<String>,
    pub execution_trigger: ExecutionTrigger,
    pub placed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Still working at the venue
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn remaining_quantity(&self) -> i64 {
        (self.quantity - self.filled_quantity).max(0)
    }

    /// Clamp the filled quantity to the requested quantity.
    /// Returns true if the value had to be changed.
    ///
    /// A missing requested quantity arrives as 0, so any fill on such an
    /// order is clamped to 0 as well.
    pub fn clamp_filled_quantity(&mut self) -> bool {
        let cap = self.quantity.max(0);
        if self.filled_quantity > cap {
            self.filled_quantity = cap;
            return true;
        }
        false
    }
}

// =============================================================================
// Position
// =============================================================================

/// A net position in one instrument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub symbol: String,
    pub exchange: String,
    pub product: String,
    /// Signed net quantity (positive = long)
    pub quantity: i64,
    pub buy_quantity: i64,
    pub sell_quantity: i64,
    pub average_buy_price: f64,
    pub average_sell_price: f64,
    pub last_price: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub day_change: f64,
    /// Mark-to-market value
    pub mtm: f64,
    pub trading_mode: TradingMode,
    pub broker_id: String,
    pub client_id: String,
    pub strategy_id: Option<String>,
    pub basket_id: Option<String>,
    pub status: PositionStatus,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Net quantity agrees with `buy_quantity - sell_quantity`
    pub fn has_consistent_quantity(&self) -> bool {
        self.quantity == self.buy_quantity - self.sell_quantity
    }

    /// Unrealized P&L sign agrees with the price move against the entry.
    ///
    /// Vacuously true for flat positions or zero P&L.
    pub fn pnl_direction_consistent(&self) -> bool {
        let expected = if self.is_long() {
            (self.last_price - self.average_buy_price) * self.quantity as f64
        } else if self.is_short() {
            (self.average_sell_price - self.last_price) * self.quantity.unsigned_abs() as f64
        } else {
            return true;
        };

        if expected.abs() < PNL_EPSILON || self.unrealized_pnl.abs() < PNL_EPSILON {
            return true;
        }
        expected.signum() == self.unrealized_pnl.signum()
    }
}

// =============================================================================
// P&L
// =============================================================================

/// Account-level profit and loss, replaced wholesale on every update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PnlSnapshot {
    pub total_pnl: f64,
    pub day_pnl: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PnlSnapshot {
    /// Recompute totals from positions; used only when the backend summary
    /// is unavailable during a resync.
    pub fn from_positions(positions: &[Position]) -> Self {
        let total_pnl = positions.iter().map(|p| p.unrealized_pnl).sum();
        let day_pnl = positions
            .iter()
            .map(|p| p.day_change * p.quantity as f64)
            .sum();

        Self {
            total_pnl,
            day_pnl,
            updated_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position(avg: f64, last: f64, qty: i64, pnl: f64) -> Position {
        Position {
            position_id: "P1".to_string(),
            quantity: qty,
            buy_quantity: qty,
            average_buy_price: avg,
            last_price: last,
            unrealized_pnl: pnl,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!(OrderStatus::from_str("partially-filled"), Some(OrderStatus::PartiallyFilled));
        assert_eq!(OrderStatus::from_str("PARTIALLY_FILLED"), Some(OrderStatus::PartiallyFilled));
        assert_eq!(OrderStatus::from_str("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::from_str_or_default("???"), OrderStatus::Pending);
        assert_eq!(OrderKind::from_str("SL-M"), Some(OrderKind::Stop));
        assert_eq!(OrderKind::from_str("stop limit"), Some(OrderKind::StopLimit));
        assert_eq!(PositionStatus::from_str("squared-off"), Some(PositionStatus::SquaredOff));
    }

    #[test]
    fn test_terminal_statuses() {
        for status in [
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
            OrderStatus::Expired,
        ] {
            assert!(status.is_terminal(), "{} should be terminal", status);
        }
        for status in [
            OrderStatus::Pending,
            OrderStatus::Placed,
            OrderStatus::Open,
            OrderStatus::PartiallyFilled,
        ] {
            assert!(!status.is_terminal(), "{} should not be terminal", status);
        }
    }

    #[test]
    fn test_clamp_filled_quantity() {
        let mut order = Order {
            quantity: 10,
            filled_quantity: 12,
            ..Default::default()
        };
        assert!(order.clamp_filled_quantity());
        assert_eq!(order.filled_quantity, 10);
        assert_eq!(order.remaining_quantity(), 0);
        assert!(!order.clamp_filled_quantity());
    }

    #[test]
    fn test_clamp_with_missing_requested_quantity() {
        let mut order = Order {
            quantity: 0,
            filled_quantity: 5,
            status: OrderStatus::PartiallyFilled,
            ..Default::default()
        };
        assert!(order.clamp_filled_quantity());
        assert_eq!(order.filled_quantity, 0);
    }

    #[test]
    fn test_position_quantity_consistency() {
        let mut position = long_position(100.0, 110.0, 5, 50.0);
        assert!(position.has_consistent_quantity());

        position.sell_quantity = 2;
        assert!(!position.has_consistent_quantity());
    }

    #[test]
    fn test_pnl_direction() {
        assert!(long_position(100.0, 110.0, 5, 50.0).pnl_direction_consistent());
        assert!(!long_position(100.0, 110.0, 5, -50.0).pnl_direction_consistent());

        let short = Position {
            quantity: -5,
            sell_quantity: 5,
            average_sell_price: 100.0,
            last_price: 90.0,
            unrealized_pnl: 50.0,
            ..Default::default()
        };
        assert!(short.is_short());
        assert!(short.pnl_direction_consistent());
    }

    #[test]
    fn test_pnl_from_positions() {
        let mut a = long_position(100.0, 110.0, 5, 50.0);
        a.day_change = 2.0;
        let mut b = long_position(50.0, 45.0, 10, -50.0);
        b.day_change = -1.0;

        let pnl = PnlSnapshot::from_positions(&[a, b]);
        assert_eq!(pnl.total_pnl, 0.0);
        assert_eq!(pnl.day_pnl, 0.0);
        assert!(pnl.updated_at.is_some());
    }
}
