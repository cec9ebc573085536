//! Cancelable per-turn deadline for unotable rooms.
//!
//! Each room owns one [`TurnTimer`]. Whenever the turn changes hands the
//! room re-arms it with the new turn's sequence number; when a hand ends
//! it disarms it. The room's event loop awaits [`TurnTimer::expired`]
//! inside `tokio::select!`:
//!
//! ```rust,ignore
//! loop {
//!     tokio::select! {
//!         cmd = rx.recv() => { /* handle command, maybe re-arm */ }
//!         fired = timer.expired() => { /* apply AFK handling for fired.turn_seq */ }
//!     }
//! }
//! ```
//!
//! A disarmed timer never completes, so the `select!` branch is inert
//! while no hand is in progress.
//!
//! # Staleness
//!
//! The sequence number travels with the deadline. If a command advances
//! the turn in the same loop iteration the deadline fires, the room
//! compares [`TimerFired::turn_seq`] against the table's current turn and
//! ignores a mismatch, so a stale timeout never lands on the next player.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Returned by [`TurnTimer::expired`] when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// The turn the deadline was armed for.
    pub turn_seq: u64,
    /// How far past the deadline the room noticed.
    pub late_by: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    turn_seq: u64,
}

/// A single re-armable deadline.
#[derive(Debug, Default)]
pub struct TurnTimer {
    deadline: Option<Deadline>,
    fired: u64,
}

impl TurnTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the countdown for `turn_seq`, replacing any
    /// previous deadline.
    pub fn arm(&mut self, timeout: Duration, turn_seq: u64) {
        self.deadline = Some(Deadline {
            at: Instant::now() + timeout,
            turn_seq,
        });
        trace!(turn_seq, timeout_ms = timeout.as_millis() as u64, "turn timer armed");
    }

    /// Cancels the pending deadline, if any.
    pub fn disarm(&mut self) {
        if let Some(d) = self.deadline.take() {
            trace!(turn_seq = d.turn_seq, "turn timer disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The turn the pending deadline belongs to.
    pub fn armed_for(&self) -> Option<u64> {
        self.deadline.map(|d| d.turn_seq)
    }

    /// Time left before the pending deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    /// Number of deadlines that have fired over the timer's lifetime.
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Waits for the pending deadline, then disarms.
    ///
    /// Pends forever while disarmed. Cancel-safe: dropping the future
    /// before it completes leaves the deadline in place.
    pub async fn expired(&mut self) -> TimerFired {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline.at).await;

        self.deadline = None;
        self.fired += 1;
        let late_by = Instant::now().saturating_duration_since(deadline.at);
        debug!(turn_seq = deadline.turn_seq, "turn timer fired");

        TimerFired {
            turn_seq: deadline.turn_seq,
            late_by,
        }
    }
}
