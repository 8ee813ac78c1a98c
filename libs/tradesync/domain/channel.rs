use serde::{Deserialize, Serialize};
use std::fmt;

/// Named logical event stream on the trading feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Orders,
    Positions,
    Pnl,
    Executions,
    All,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Orders,
        Channel::Positions,
        Channel::Pnl,
        Channel::Executions,
        Channel::All,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "orders" => Some(Channel::Orders),
            "positions" => Some(Channel::Positions),
            "pnl" => Some(Channel::Pnl),
            "executions" => Some(Channel::Executions),
            "all" => Some(Channel::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Orders => "orders",
            Channel::Positions => "positions",
            Channel::Pnl => "pnl",
            Channel::Executions => "executions",
            Channel::All => "all",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
