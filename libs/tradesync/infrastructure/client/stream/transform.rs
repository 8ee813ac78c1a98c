//! Wire payload → domain entity mapping
//!
//! Backends have shipped both snake_case and camelCase spellings (plus a few
//! legacy names) for most fields. Every attribute is resolved through an
//! ordered candidate list; the first present, non-null field wins.
//!
//! Numbers may arrive as JSON numbers or numeric strings. Anything missing,
//! unparseable or non-finite becomes zero so downstream arithmetic never
//! sees NaN.

use crate::domain::{
    ExecutionTrigger, Order, OrderKind, OrderStatus, PnlSnapshot, Position, PositionStatus, Side,
    TradingMode,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("{0} payload is not a JSON object")]
    NotAnObject(&'static str),

    #[error("{0} payload has no identifier")]
    MissingIdentifier(&'static str),
}

// =============================================================================
// Candidate field names
// =============================================================================

mod fields {
    // Orders
    pub const ORDER_ID: &[&str] = &["order_id", "orderId", "id"];
    pub const SYMBOL: &[&str] = &["symbol", "trading_symbol", "tradingSymbol", "tradingsymbol", "instrument"];
    pub const EXCHANGE: &[&str] = &["exchange", "venue", "exchange_segment", "exchangeSegment"];
    pub const SIDE: &[&str] = &["side", "transaction_type", "transactionType", "order_side", "orderSide"];
    pub const ORDER_KIND: &[&str] = &["order_type", "orderType", "kind"];
    pub const QUANTITY: &[&str] = &["quantity", "qty", "order_quantity", "orderQuantity"];
    pub const PRICE: &[&str] = &["price", "limit_price", "limitPrice"];
    pub const TRIGGER_PRICE: &[&str] = &["trigger_price", "triggerPrice", "stop_price", "stopPrice"];
    pub const PRODUCT: &[&str] = &["product", "product_type", "productType"];
    pub const ORDER_STATUS: &[&str] = &["status", "order_status", "orderStatus"];
    pub const FILLED_QUANTITY: &[&str] = &[
        "filled_quantity", "filledQuantity", "filled_qty", "filledQty",
        "executed_quantity", "executedQuantity",
    ];
    pub const AVERAGE_PRICE: &[&str] = &[
        "average_price", "averagePrice", "avg_price", "avgPrice",
        "average_fill_price", "averageFillPrice",
    ];
    pub const REJECTION_REASON: &[&str] = &[
        "rejection_reason", "rejectionReason", "reject_reason", "status_message", "statusMessage",
    ];
    pub const LEG_ID: &[&str] = &["leg_id", "legId"];
    pub const EXECUTION_TRIGGER: &[&str] = &["execution_trigger", "executionTrigger", "trigger_type", "triggerType"];
    pub const PLACED_AT: &[&str] = &[
        "placed_at", "placedAt", "created_at", "createdAt", "order_timestamp", "orderTimestamp",
    ];

    // Shared
    pub const TRADING_MODE: &[&str] = &["trading_mode", "tradingMode", "mode"];
    pub const BROKER_ID: &[&str] = &["broker_id", "brokerId", "broker"];
    pub const CLIENT_ID: &[&str] = &["client_id", "clientId", "user_id", "userId"];
    pub const STRATEGY_ID: &[&str] = &["strategy_id", "strategyId"];
    pub const BASKET_ID: &[&str] = &["basket_id", "basketId"];
    pub const UPDATED_AT: &[&str] = &["updated_at", "updatedAt", "last_updated", "lastUpdated", "timestamp"];

    // Positions
    pub const POSITION_ID: &[&str] = &["position_id", "positionId", "id"];
    pub const NET_QUANTITY: &[&str] = &["net_quantity", "netQuantity", "net_qty", "netQty", "quantity", "qty"];
    pub const BUY_QUANTITY: &[&str] = &["buy_quantity", "buyQuantity", "buy_qty", "buyQty"];
    pub const SELL_QUANTITY: &[&str] = &["sell_quantity", "sellQuantity", "sell_qty", "sellQty"];
    pub const AVERAGE_BUY_PRICE: &[&str] = &[
        "average_buy_price", "averageBuyPrice", "buy_average", "buyAverage", "buy_avg_price", "buyAvgPrice",
    ];
    pub const AVERAGE_SELL_PRICE: &[&str] = &[
        "average_sell_price", "averageSellPrice", "sell_average", "sellAverage", "sell_avg_price", "sellAvgPrice",
    ];
    pub const LAST_PRICE: &[&str] = &["last_price", "lastPrice", "ltp", "last_traded_price", "lastTradedPrice"];
    pub const UNREALIZED_PNL: &[&str] = &["unrealized_pnl", "unrealizedPnl", "unrealised_pnl", "unrealisedPnl", "pnl"];
    pub const UNREALIZED_PNL_PERCENT: &[&str] = &[
        "unrealized_pnl_percent", "unrealizedPnlPercent", "pnl_percent", "pnlPercent",
        "pnl_percentage", "pnlPercentage",
    ];
    pub const DAY_CHANGE: &[&str] = &["day_change", "dayChange", "change"];
    pub const MTM: &[&str] = &["mtm", "m2m", "mark_to_market", "markToMarket"];
    pub const POSITION_STATUS: &[&str] = &["status", "position_status", "positionStatus"];
    pub const OPENED_AT: &[&str] = &["opened_at", "openedAt", "created_at", "createdAt"];
    pub const CLOSED_AT: &[&str] = &["closed_at", "closedAt"];

    // P&L
    pub const TOTAL_PNL: &[&str] = &["total_pnl", "totalPnl", "total_pnl_value", "totalPnlValue", "pnl", "total"];
    pub const DAY_PNL: &[&str] = &["day_pnl", "dayPnl", "todays_pnl", "todaysPnl", "daily_pnl", "dailyPnl"];
}

// =============================================================================
// Field resolution
// =============================================================================

fn field<'a>(payload: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|name| payload.get(*name))
        .find(|value| !value.is_null())
}

fn opt_text(payload: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    let text = match field(payload, candidates)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn text(payload: &Map<String, Value>, candidates: &[&str]) -> String {
    opt_text(payload, candidates).unwrap_or_default()
}

/// Parse a JSON number or numeric string; None if absent or not finite
fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn opt_number(payload: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    field(payload, candidates).and_then(value_as_f64)
}

fn number(payload: &Map<String, Value>, candidates: &[&str]) -> f64 {
    opt_number(payload, candidates).unwrap_or(0.0)
}

fn opt_quantity(payload: &Map<String, Value>, candidates: &[&str]) -> Option<i64> {
    opt_number(payload, candidates).map(|q| q.round() as i64)
}

fn quantity(payload: &Map<String, Value>, candidates: &[&str]) -> i64 {
    opt_quantity(payload, candidates).unwrap_or(0)
}

fn timestamp(payload: &Map<String, Value>, candidates: &[&str]) -> Option<DateTime<Utc>> {
    field(payload, candidates).and_then(parse_timestamp)
}

/// Epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Parse an RFC 3339 / ISO 8601 string, or epoch seconds / milliseconds
/// given as a number or numeric string
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            s.parse::<f64>().ok().and_then(epoch_to_datetime)
        }
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    }
}

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch <= 0.0 {
        return None;
    }
    let millis = if epoch > EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

// =============================================================================
// Entities
// =============================================================================

/// Map an order payload. Fails only when the payload has no identifier.
pub fn order_from_wire(payload: &Value) -> Result<Order, TransformError> {
    let obj = payload
        .as_object()
        .ok_or(TransformError::NotAnObject("order"))?;

    let order_id =
        opt_text(obj, fields::ORDER_ID).ok_or(TransformError::MissingIdentifier("order"))?;

    Ok(Order {
        order_id,
        symbol: text(obj, fields::SYMBOL),
        exchange: text(obj, fields::EXCHANGE),
        side: Side::from_str_or_default(&text(obj, fields::SIDE)),
        kind: OrderKind::from_str_or_default(&text(obj, fields::ORDER_KIND)),
        quantity: quantity(obj, fields::QUANTITY),
        price: opt_number(obj, fields::PRICE),
        trigger_price: opt_number(obj, fields::TRIGGER_PRICE),
        product: text(obj, fields::PRODUCT),
        status: OrderStatus::from_str_or_default(&text(obj, fields::ORDER_STATUS)),
        filled_quantity: quantity(obj, fields::FILLED_QUANTITY),
        average_price: opt_number(obj, fields::AVERAGE_PRICE),
        rejection_reason: opt_text(obj, fields::REJECTION_REASON),
        trading_mode: TradingMode::from_str_or_default(&text(obj, fields::TRADING_MODE)),
        broker_id: text(obj, fields::BROKER_ID),
        client_id: text(obj, fields::CLIENT_ID),
        strategy_id: opt_text(obj, fields::STRATEGY_ID),
        basket_id: opt_text(obj, fields::BASKET_ID),
        leg_id: opt_text(obj, fields::LEG_ID),
        execution_trigger: ExecutionTrigger::from_str_or_default(&text(obj, fields::EXECUTION_TRIGGER)),
        placed_at: timestamp(obj, fields::PLACED_AT),
        updated_at: timestamp(obj, fields::UPDATED_AT),
    })
}

/// Map a position payload. A missing net quantity is derived as
/// `buy_quantity - sell_quantity`; a delivered one is kept as is.
pub fn position_from_wire(payload: &Value) -> Result<Position, TransformError> {
    let obj = payload
        .as_object()
        .ok_or(TransformError::NotAnObject("position"))?;

    let position_id =
        opt_text(obj, fields::POSITION_ID).ok_or(TransformError::MissingIdentifier("position"))?;

    let buy_quantity = quantity(obj, fields::BUY_QUANTITY);
    let sell_quantity = quantity(obj, fields::SELL_QUANTITY);
    let net_quantity =
        opt_quantity(obj, fields::NET_QUANTITY).unwrap_or(buy_quantity - sell_quantity);

    Ok(Position {
        position_id,
        symbol: text(obj, fields::SYMBOL),
        exchange: text(obj, fields::EXCHANGE),
        product: text(obj, fields::PRODUCT),
        quantity: net_quantity,
        buy_quantity,
        sell_quantity,
        average_buy_price: number(obj, fields::AVERAGE_BUY_PRICE),
        average_sell_price: number(obj, fields::AVERAGE_SELL_PRICE),
        last_price: number(obj, fields::LAST_PRICE),
        unrealized_pnl: number(obj, fields::UNREALIZED_PNL),
        unrealized_pnl_percent: number(obj, fields::UNREALIZED_PNL_PERCENT),
        day_change: number(obj, fields::DAY_CHANGE),
        mtm: number(obj, fields::MTM),
        trading_mode: TradingMode::from_str_or_default(&text(obj, fields::TRADING_MODE)),
        broker_id: text(obj, fields::BROKER_ID),
        client_id: text(obj, fields::CLIENT_ID),
        strategy_id: opt_text(obj, fields::STRATEGY_ID),
        basket_id: opt_text(obj, fields::BASKET_ID),
        status: PositionStatus::from_str_or_default(&text(obj, fields::POSITION_STATUS)),
        opened_at: timestamp(obj, fields::OPENED_AT),
        closed_at: timestamp(obj, fields::CLOSED_AT),
        updated_at: timestamp(obj, fields::UPDATED_AT),
    })
}

/// Map a P&L summary payload
pub fn pnl_from_wire(payload: &Value) -> Result<PnlSnapshot, TransformError> {
    let obj = payload
        .as_object()
        .ok_or(TransformError::NotAnObject("pnl"))?;

    Ok(PnlSnapshot {
        total_pnl: number(obj, fields::TOTAL_PNL),
        day_pnl: number(obj, fields::DAY_PNL),
        updated_at: timestamp(obj, fields::UPDATED_AT),
    })
}
