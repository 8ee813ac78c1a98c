//! Connection lifecycle state machine
//!
//! The machine owns the connection state and the reconnect attempt counter.
//! It performs no I/O: each [`MachineEvent`] yields the list of
//! [`MachineAction`]s the driver must carry out, in order.
//!
//! ```text
//!                 connect (credential ready)
//!  Disconnected ─────────────────────────────▶ Connecting
//!       ▲  │                                    │     ▲
//!       │  │ closure, budget left               │     │ retry timer fired
//!       │  ▼                                    │     │ (attempt += 1)
//!       │ Reconnecting ─────────────────────────┼─────┘
//!       │                                       │ handshake ok
//!       │          transport closed             ▼ (attempt = 0, replay)
//!       └────────────────────────────────── Connected
//! ```
//!
//! An explicit disconnect from any state cancels the pending retry, closes
//! the socket and marks the budget exhausted so nothing reconnects until the
//! next explicit connect.

use crate::connection_state::ConnectionState;
use crate::traits::ReconnectionStrategy;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempt counter value after an explicit disconnect
pub const ATTEMPTS_EXHAUSTED: usize = usize::MAX;

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    /// Caller asked to connect. `credential_ready` is false when a credential
    /// is required but none is present.
    ConnectRequested { credential_ready: bool },
    HandshakeSucceeded,
    HandshakeFailed,
    TransportClosed,
    RetryTimerFired,
    DisconnectRequested,
    /// Credential appeared (`present = true`) or was revoked
    CredentialChanged { present: bool },
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineAction {
    /// State changed; publish it
    Transition {
        from: ConnectionState,
        to: ConnectionState,
    },
    OpenConnection,
    ReplaySubscriptions,
    ScheduleReconnect { delay: Duration, attempt: usize },
    CancelReconnect,
    CloseConnection,
    /// Connect was requested without a credential
    MissingCredential,
}

pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: usize,
    auto_connect: bool,
    strategy: Box<dyn ReconnectionStrategy>,
}

impl ConnectionMachine {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>, auto_connect: bool) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            auto_connect,
            strategy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts made since the last successful handshake
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts == ATTEMPTS_EXHAUSTED
    }

    pub fn handle(&mut self, event: MachineEvent) -> Vec<MachineAction> {
        use ConnectionState::*;
        use MachineEvent::*;

        let mut actions = Vec::new();

        match (self.state, event) {
            (Disconnected, ConnectRequested { credential_ready: false }) => {
                warn!("[Connection] Connect requested without a credential, staying disconnected");
                actions.push(MachineAction::MissingCredential);
            }
            (Disconnected, ConnectRequested { credential_ready: true }) => {
                self.begin_connect(&mut actions);
            }
            (_, ConnectRequested { .. }) => {
                debug!("[Connection] Connect ignored while {}", self.state);
            }

            (Connecting, HandshakeSucceeded) => {
                self.attempts = 0;
                self.enter(Connected, &mut actions);
                actions.push(MachineAction::ReplaySubscriptions);
            }
            (Connecting, HandshakeFailed) | (Connecting, TransportClosed) | (Connected, TransportClosed) => {
                self.on_closed(&mut actions);
            }

            (Reconnecting, RetryTimerFired) => {
                self.attempts = self.attempts.saturating_add(1);
                info!("[Connection] Reconnect attempt {}", self.attempts);
                self.enter(Connecting, &mut actions);
                actions.push(MachineAction::OpenConnection);
            }

            (_, DisconnectRequested) | (_, CredentialChanged { present: false }) => {
                self.force_disconnect(&mut actions);
            }

            (Disconnected, CredentialChanged { present: true }) if self.auto_connect => {
                info!("[Connection] Credential available, connecting");
                self.begin_connect(&mut actions);
            }

            (state, event) => {
                debug!("[Connection] Ignoring {:?} while {}", event, state);
            }
        }

        actions
    }

    fn begin_connect(&mut self, actions: &mut Vec<MachineAction>) {
        self.attempts = 0;
        self.enter(ConnectionState::Connecting, actions);
        actions.push(MachineAction::OpenConnection);
    }

    fn on_closed(&mut self, actions: &mut Vec<MachineAction>) {
        self.enter(ConnectionState::Disconnected, actions);

        if self.is_exhausted() {
            return;
        }

        match self.strategy.next_delay(self.attempts) {
            Some(delay) => {
                let attempt = self.attempts + 1;
                info!("[Connection] Reconnecting in {:?} (attempt {})", delay, attempt);
                self.enter(ConnectionState::Reconnecting, actions);
                actions.push(MachineAction::ScheduleReconnect { delay, attempt });
            }
            None => {
                warn!(
                    "[Connection] Reconnect budget exhausted after {} attempts",
                    self.attempts
                );
            }
        }
    }

    fn force_disconnect(&mut self, actions: &mut Vec<MachineAction>) {
        self.attempts = ATTEMPTS_EXHAUSTED;
        actions.push(MachineAction::CancelReconnect);
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            actions.push(MachineAction::CloseConnection);
        }
        self.enter(ConnectionState::Disconnected, actions);
    }

    fn enter(&mut self, to: ConnectionState, actions: &mut Vec<MachineAction>) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        actions.push(MachineAction::Transition { from, to });
    }
}
