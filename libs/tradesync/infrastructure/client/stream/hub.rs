//! Trading Notification Hub
//!
//! Couples the shared state store with one listener registry per category.
//! Every `apply_*` call mutates the store under its write lock, releases the
//! lock, then dispatches the stored record to the listeners of its category.

use super::listeners::{ListenerHandle, ListenerRegistry};
use super::store::{SharedTradingState, TradingStateStore};
use crate::domain::{Order, PnlSnapshot, Position};
use tracing::debug;

#[derive(Clone)]
pub struct TradingHub {
    state: SharedTradingState,
    orders: ListenerRegistry<Order>,
    positions: ListenerRegistry<Position>,
    pnl: ListenerRegistry<PnlSnapshot>,
}

impl Default for TradingHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingHub {
    pub fn new() -> Self {
        Self::with_state(TradingStateStore::shared())
    }

    pub fn with_state(state: SharedTradingState) -> Self {
        Self {
            state,
            orders: ListenerRegistry::new("order"),
            positions: ListenerRegistry::new("position"),
            pnl: ListenerRegistry::new("pnl"),
        }
    }

    pub fn state(&self) -> &SharedTradingState {
        &self.state
    }

    // =========================================================================
    // Listener registration
    // =========================================================================

    pub fn on_order_update<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Order) + Send + Sync + 'static,
    {
        self.orders.register(listener)
    }

    pub fn on_position_update<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Position) + Send + Sync + 'static,
    {
        self.positions.register(listener)
    }

    pub fn on_pnl_update<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&PnlSnapshot) + Send + Sync + 'static,
    {
        self.pnl.register(listener)
    }

    pub fn listener_counts(&self) -> (usize, usize, usize) {
        (self.orders.len(), self.positions.len(), self.pnl.len())
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Upsert an order and notify. Returns false when the update was stale.
    pub fn apply_order(&self, order: Order) -> bool {
        let applied = self.state.write().upsert_order(order);
        match applied {
            Some(order) => {
                self.orders.dispatch(&order);
                true
            }
            None => false,
        }
    }

    pub fn apply_position(&self, position: Position) {
        let stored = self.state.write().upsert_position(position);
        self.positions.dispatch(&stored);
    }

    pub fn apply_pnl(&self, pnl: PnlSnapshot) {
        self.state.write().set_pnl(pnl);
        self.pnl.dispatch(&pnl);
    }

    /// Wholesale replace after a resync. Only P&L is dispatched; order and
    /// position listeners observe subsequent streaming updates.
    pub(crate) fn replace_orders(&self, orders: Vec<Order>) {
        self.state.write().replace_orders(orders);
    }

    /// Positions and P&L swap under one write lock, so readers never see
    /// the new positions next to the old snapshot.
    pub(crate) fn replace_positions_and_pnl(&self, positions: Vec<Position>, pnl: PnlSnapshot) {
        {
            let mut state = self.state.write();
            state.replace_positions(positions);
            state.set_pnl(pnl);
        }
        debug!(
            "[Hub] P&L replaced: total={:.2} day={:.2}",
            pnl.total_pnl, pnl.day_pnl
        );
        self.pnl.dispatch(&pnl);
    }

    // =========================================================================
    // Read accessors (cloned snapshots)
    // =========================================================================

    pub fn orders(&self) -> Vec<Order> {
        self.state.read().orders().cloned().collect()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.state.read().positions().cloned().collect()
    }

    pub fn pnl(&self) -> PnlSnapshot {
        self.state.read().pnl()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.state.read().order(order_id).cloned()
    }

    pub fn position(&self, position_id: &str) -> Option<Position> {
        self.state.read().position(position_id).cloned()
    }

    pub fn open_orders(&self) -> Vec<Order> {
        self.state
            .read()
            .orders()
            .filter(|o| o.is_active())
            .cloned()
            .collect()
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.state
            .read()
            .positions()
            .filter(|p| p.is_open())
            .cloned()
            .collect()
    }

    pub fn order_count(&self) -> usize {
        self.state.read().order_count()
    }

    pub fn position_count(&self) -> usize {
        self.state.read().position_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, PositionStatus};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            order_id: id.to_string(),
            status,
            quantity: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_listeners_see_updates_in_order() {
        let hub = TradingHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _handle = {
            let seen = Arc::clone(&seen);
            hub.on_order_update(move |order| seen.lock().push(order.status))
        };

        hub.apply_order(order("O1", OrderStatus::Placed));
        hub.apply_order(order("O1", OrderStatus::Filled));

        assert_eq!(*seen.lock(), vec![OrderStatus::Placed, OrderStatus::Filled]);
        assert_eq!(hub.order_count(), 1);
    }

    #[test]
    fn test_stale_update_is_not_dispatched() {
        let hub = TradingHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = {
            let count = Arc::clone(&count);
            hub.on_order_update(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(hub.apply_order(order("O1", OrderStatus::Cancelled)));
        assert!(!hub.apply_order(order("O1", OrderStatus::Open)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_read_store_during_dispatch() {
        let hub = TradingHub::new();
        let observed = Arc::new(AtomicUsize::new(0));
        let _handle = {
            let reader = hub.clone();
            let observed = Arc::clone(&observed);
            hub.on_position_update(move |_| {
                observed.store(reader.position_count(), Ordering::SeqCst);
            })
        };

        hub.apply_position(Position {
            position_id: "P1".into(),
            ..Default::default()
        });
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let hub = TradingHub::new();
        let _bad = hub.on_pnl_update(|_| panic!("broken consumer"));
        let total = Arc::new(Mutex::new(0.0));
        let _good = {
            let total = Arc::clone(&total);
            hub.on_pnl_update(move |pnl| *total.lock() = pnl.total_pnl)
        };

        hub.apply_pnl(PnlSnapshot {
            total_pnl: 125.5,
            day_pnl: 20.0,
            updated_at: None,
        });
        assert_eq!(*total.lock(), 125.5);
        assert_eq!(hub.pnl().total_pnl, 125.5);
    }

    #[test]
    fn test_panicking_order_listener_isolated() {
        let hub = TradingHub::new();
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(Mutex::new(Vec::new()));
        let _first = {
            let before = Arc::clone(&before);
            hub.on_order_update(move |_| {
                before.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _bad = hub.on_order_update(|order| panic!("cannot handle {}", order.order_id));
        let _last = {
            let after = Arc::clone(&after);
            hub.on_order_update(move |order| after.lock().push(order.status))
        };

        assert!(hub.apply_order(order("O1", OrderStatus::Placed)));
        assert!(hub.apply_order(order("O1", OrderStatus::Filled)));

        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(*after.lock(), vec![OrderStatus::Placed, OrderStatus::Filled]);
        assert_eq!(hub.order("O1").unwrap().status, OrderStatus::Filled);
        assert_eq!(hub.listener_counts(), (3, 0, 0));
    }

    #[test]
    fn test_open_filters() {
        let hub = TradingHub::new();
        hub.apply_order(order("O1", OrderStatus::Open));
        hub.apply_order(order("O2", OrderStatus::Filled));
        hub.apply_position(Position {
            position_id: "P1".into(),
            quantity: 3,
            status: PositionStatus::Open,
            ..Default::default()
        });
        hub.apply_position(Position {
            position_id: "P2".into(),
            status: PositionStatus::Closed,
            ..Default::default()
        });

        let open: Vec<String> = hub.open_orders().into_iter().map(|o| o.order_id).collect();
        assert_eq!(open, vec!["O1".to_string()]);
        assert_eq!(hub.open_positions().len(), 1);
    }

    #[test]
    fn test_unregistered_listener_not_invoked() {
        let hub = TradingHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = {
            let count = Arc::clone(&count);
            hub.on_order_update(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        handle.unregister();
        hub.apply_order(order("O1", OrderStatus::Open));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_counts(), (0, 0, 0));
    }
}
