//! Subscription Registry
//!
//! Tracks the desired channel set for the session. The registry never talks
//! to the transport itself: `subscribe`/`unsubscribe` report which channels
//! actually changed so the caller can decide whether to send a command, and
//! [`SubscriptionReplay`] hands the whole set to the connection driver on
//! every successful handshake.

use super::types::SubscriptionCommand;
use crate::domain::Channel;
use hypersockets::{SubscriptionProvider, WsMessage};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedSubscriptions = Arc<RwLock<SubscriptionRegistry>>;

#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    desired: BTreeSet<Channel>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            desired: channels.into_iter().collect(),
        }
    }

    pub fn shared(self) -> SharedSubscriptions {
        Arc::new(RwLock::new(self))
    }

    /// Add channels; returns those not already desired
    pub fn subscribe(&mut self, channels: &[Channel]) -> Vec<Channel> {
        let mut added: Vec<Channel> = channels
            .iter()
            .copied()
            .filter(|c| self.desired.insert(*c))
            .collect();
        added.sort();
        added
    }

    /// Remove channels; returns those that were desired
    pub fn unsubscribe(&mut self, channels: &[Channel]) -> Vec<Channel> {
        let mut removed: Vec<Channel> = channels
            .iter()
            .copied()
            .filter(|c| self.desired.remove(c))
            .collect();
        removed.sort();
        removed
    }

    /// Reconcile to exactly the backend-confirmed set
    pub fn confirm(&mut self, confirmed: Vec<Channel>) {
        let confirmed: BTreeSet<Channel> = confirmed.into_iter().collect();
        if confirmed != self.desired {
            info!(
                "[Subscriptions] Backend confirmed {:?} (desired was {:?})",
                confirmed, self.desired
            );
        }
        self.desired = confirmed;
    }

    pub fn desired(&self) -> Vec<Channel> {
        self.desired.iter().copied().collect()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.desired.contains(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.desired.is_empty()
    }

    /// One subscribe command for the whole set, `None` when empty
    pub fn replay_command(&self) -> Option<SubscriptionCommand> {
        if self.desired.is_empty() {
            return None;
        }
        Some(SubscriptionCommand::subscribe(self.desired()))
    }
}

/// Parse confirmation channel names, skipping unknown ones
pub fn parse_channel_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Channel> {
    names
        .into_iter()
        .filter_map(|name| {
            let channel = Channel::from_str(name);
            if channel.is_none() {
                warn!("[Subscriptions] Ignoring unknown channel '{}' in confirmation", name);
            }
            channel
        })
        .collect()
}

/// Replays the desired set on every handshake
#[derive(Clone)]
pub struct SubscriptionReplay {
    registry: SharedSubscriptions,
}

impl SubscriptionReplay {
    pub fn new(registry: SharedSubscriptions) -> Self {
        Self { registry }
    }
}

impl SubscriptionProvider for SubscriptionReplay {
    fn replay_messages(&self) -> Vec<WsMessage> {
        let command = match self.registry.read().replay_command() {
            Some(command) => command,
            None => return Vec::new(),
        };

        match command.to_ws_message() {
            Ok(message) => vec![message],
            Err(e) => {
                warn!("[Subscriptions] Failed to encode replay command: {}", e);
                Vec::new()
            }
        }
    }
}
