//! REST Resync
//!
//! One-shot authoritative fetch that repairs drift accumulated while the
//! stream was down. Collections are replaced wholesale; a failed fetch leaves
//! the last known state untouched.

use super::hub::TradingHub;
use crate::domain::{Order, PnlSnapshot, Position};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// Authoritative source for a resync
#[async_trait]
pub trait TradingApi: Send + Sync {
    async fn get_orders(&self) -> Result<Vec<Order>>;

    async fn get_positions(&self) -> Result<Vec<Position>>;

    /// Account-level P&L summary
    async fn get_position_summary(&self) -> Result<PnlSnapshot>;
}

impl TradingHub {
    /// Replace every order with the backend's list
    pub async fn resync_orders(&self, api: &dyn TradingApi) -> Result<usize> {
        let orders = api.get_orders().await.map_err(|e| {
            warn!("[Resync] Failed to fetch orders, keeping current state: {:#}", e);
            e
        })?;

        let count = orders.len();
        self.replace_orders(orders);
        info!("[Resync] Replaced {} orders", count);
        Ok(count)
    }

    /// Replace every position and the P&L snapshot
    ///
    /// P&L comes from the summary endpoint; when that call fails it is
    /// recomputed from the fetched positions.
    pub async fn resync_positions(&self, api: &dyn TradingApi) -> Result<usize> {
        let positions = api.get_positions().await.map_err(|e| {
            warn!("[Resync] Failed to fetch positions, keeping current state: {:#}", e);
            e
        })?;

        let pnl = match api.get_position_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("[Resync] Position summary unavailable, deriving P&L from positions: {:#}", e);
                PnlSnapshot::from_positions(&positions)
            }
        };

        let count = positions.len();
        self.replace_positions_and_pnl(positions, pnl);
        info!(
            "[Resync] Replaced {} positions (total P&L {:.2})",
            count, pnl.total_pnl
        );
        Ok(count)
    }

    /// Resync orders and positions concurrently
    ///
    /// Each category is applied independently; the first error is returned.
    pub async fn resync(&self, api: &dyn TradingApi) -> Result<()> {
        let (orders, positions) =
            tokio::join!(self.resync_orders(api), self.resync_positions(api));
        orders?;
        positions?;
        Ok(())
    }
}
