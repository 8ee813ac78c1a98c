//! Trading State Store
//!
//! Holds the reconciled orders, positions and P&L snapshot:
//! - Upsert keyed by identifier: replace in place if present, else prepend
//! - Terminal order statuses are never overwritten by non-terminal ones
//! - Filled quantity is clamped to the requested quantity
//! - Resync replaces whole collections in one assignment
//!
//! The store itself never notifies anyone; see `TradingHub`.

use crate::domain::{Order, PnlSnapshot, Position};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared store handle
pub type SharedTradingState = Arc<RwLock<TradingStateStore>>;

#[derive(Debug, Default)]
pub struct TradingStateStore {
    /// Most recently inserted first
    orders: VecDeque<Order>,
    /// Most recently inserted first
    positions: VecDeque<Position>,
    pnl: PnlSnapshot,
}

impl TradingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTradingState {
        Arc::new(RwLock::new(Self::new()))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Apply an order update.
    ///
    /// Returns the stored record when the update was applied, `None` when it
    /// was dropped as stale (non-terminal update for a terminal order).
    pub fn upsert_order(&mut self, mut order: Order) -> Option<Order> {
        if order.clamp_filled_quantity() {
            warn!(
                "[Store] Order {} filled quantity exceeds requested {}, clamped",
                order.order_id, order.quantity
            );
        }

        match self.orders.iter_mut().find(|o| o.order_id == order.order_id) {
            Some(existing) => {
                if existing.is_terminal() && !order.is_terminal() {
                    debug!(
                        "[Store] Dropping stale {} update for order {} already {}",
                        order.status, order.order_id, existing.status
                    );
                    return None;
                }
                *existing = order.clone();
            }
            None => self.orders.push_front(order.clone()),
        }

        Some(order)
    }

    /// Replace every order (resync)
    pub fn replace_orders(&mut self, orders: Vec<Order>) {
        let mut orders = VecDeque::from(orders);
        for order in orders.iter_mut() {
            if order.clamp_filled_quantity() {
                warn!("[Store] Order {} filled quantity clamped during resync", order.order_id);
            }
        }
        self.orders = orders;
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// Apply a position update (full-record replace or prepend)
    pub fn upsert_position(&mut self, position: Position) -> Position {
        match self
            .positions
            .iter_mut()
            .find(|p| p.position_id == position.position_id)
        {
            Some(existing) => *existing = position.clone(),
            None => self.positions.push_front(position.clone()),
        }
        position
    }

    /// Replace every position (resync)
    pub fn replace_positions(&mut self, positions: Vec<Position>) {
        self.positions = VecDeque::from(positions);
    }

    pub fn position(&self, position_id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.position_id == position_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    // =========================================================================
    // P&L
    // =========================================================================

    pub fn set_pnl(&mut self, pnl: PnlSnapshot) {
        self.pnl = pnl;
    }

    pub fn pnl(&self) -> PnlSnapshot {
        self.pnl
    }
}
