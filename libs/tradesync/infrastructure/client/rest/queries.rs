//! Resync queries for RestClient

use super::helpers::{collect_entities, parse_json, require_success, unwrap_data};
use super::{RestClient, RestError, Result};
use crate::domain::{Order, PnlSnapshot, Position};
use crate::infrastructure::client::stream::resync::TradingApi;
use crate::infrastructure::client::stream::transform::{
    order_from_wire, pnl_from_wire, position_from_wire,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const ORDERS_PATH: &str = "/orders";
const POSITIONS_PATH: &str = "/positions";
const POSITION_SUMMARY_PATH: &str = "/positions/summary";

impl RestClient {
    async fn fetch(&self, path: &str, context: &str) -> Result<Value> {
        debug!("[Rest] GET {}{}", self.base_url, path);
        let response = self.get(path).send().await?;
        let response = require_success(response, context).await?;
        parse_json(response).await
    }

    /// Fetch every order of the session
    pub async fn fetch_orders(&self) -> Result<Vec<Order>> {
        let body = self.fetch(ORDERS_PATH, "Failed to fetch orders").await?;
        let orders = collect_entities(body, "order", order_from_wire)?;
        debug!("[Rest] Fetched {} orders", orders.len());
        Ok(orders)
    }

    /// Fetch every position of the session
    pub async fn fetch_positions(&self) -> Result<Vec<Position>> {
        let body = self.fetch(POSITIONS_PATH, "Failed to fetch positions").await?;
        let positions = collect_entities(body, "position", position_from_wire)?;
        debug!("[Rest] Fetched {} positions", positions.len());
        Ok(positions)
    }

    /// Fetch the account-level P&L summary
    pub async fn fetch_position_summary(&self) -> Result<PnlSnapshot> {
        let body = self
            .fetch(POSITION_SUMMARY_PATH, "Failed to fetch position summary")
            .await?;
        pnl_from_wire(&unwrap_data(body)).map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }
}

#[async_trait]
impl TradingApi for RestClient {
    async fn get_orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(self.fetch_orders().await?)
    }

    async fn get_positions(&self) -> anyhow::Result<Vec<Position>> {
        Ok(self.fetch_positions().await?)
    }

    async fn get_position_summary(&self) -> anyhow::Result<PnlSnapshot> {
        Ok(self.fetch_position_summary().await?)
    }
}
