//! Turn counter with a presentation-gated advance.
//!
//! An advance is two-phase: [`TurnController::request_advance`] enters
//! `Advancing` and hands out an [`AdvanceTicket`], and the presentation layer
//! resumes it with [`TurnController::complete_presentation`] using that
//! ticket. If that signal never comes, [`TurnController::poll_timeout`]
//! completes the advance once the configured timeout has passed; a signal
//! arriving after that is stale and never completes a later advance.

use grid_core::GameConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("no turns remaining")]
    NoTurnsRemaining,
    /// Advances never interleave.
    #[error("a turn advance is already in progress")]
    AlreadyAdvancing,
    #[error("turn advance is currently blocked")]
    Blocked,
    #[error("no turn advance is in progress")]
    NotAdvancing,
    /// The completion signal belongs to an earlier advance.
    #[error("completion signal for advance {0:?} is stale")]
    StaleCompletion(AdvanceTicket),
}

/// Identifies one requested advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AdvanceTicket(u64);

/// Timeline position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub current_year: u32,
    pub step_size: u32,
    pub max_year: u32,
    pub turns_remaining: u32,
}

impl TurnState {
    pub fn from_config(cfg: &GameConfig) -> Self {
        Self {
            current_year: cfg.start_year,
            step_size: cfg.step_size,
            max_year: cfg.max_year,
            turns_remaining: cfg.total_turns(),
        }
    }

    /// Year after one more advance, clamped to `max_year`.
    pub fn next_year(&self) -> u32 {
        self.current_year
            .saturating_add(self.step_size)
            .min(self.max_year)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// Waiting for the presentation layer since the given instant.
    Advancing { since: Instant, ticket: AdvanceTicket },
}

/// A finished advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletedAdvance {
    pub previous_year: u32,
    pub year: u32,
    pub turns_remaining: u32,
    /// Completed by the timeout fallback rather than the presentation layer.
    pub timed_out: bool,
}

#[derive(Clone, Debug)]
pub struct TurnController {
    start_year: u32,
    total_turns: u32,
    state: TurnState,
    phase: TurnPhase,
    blocked: bool,
    timeout: Duration,
    next_ticket: u64,
}

impl TurnController {
    pub fn new(cfg: &GameConfig) -> Self {
        Self {
            start_year: cfg.start_year,
            total_turns: cfg.total_turns(),
            state: TurnState::from_config(cfg),
            phase: TurnPhase::Idle,
            blocked: false,
            timeout: Duration::from_millis(cfg.advance_timeout_ms),
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_advancing(&self) -> bool {
        matches!(self.phase, TurnPhase::Advancing { .. })
    }

    /// The presentation layer can disable the next-turn action.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Enter `Advancing`. Nothing changes on error.
    pub fn request_advance(&mut self, now: Instant) -> Result<AdvanceTicket, TurnError> {
        if self.is_advancing() {
            return Err(TurnError::AlreadyAdvancing);
        }
        if self.state.turns_remaining == 0 {
            return Err(TurnError::NoTurnsRemaining);
        }
        if self.blocked {
            return Err(TurnError::Blocked);
        }
        let ticket = AdvanceTicket(self.next_ticket);
        self.next_ticket += 1;
        self.phase = TurnPhase::Advancing { since: now, ticket };
        Ok(ticket)
    }

    /// Resume the pending advance after the presentation step.
    ///
    /// `ticket` must be the one handed out for the pending advance.
    pub fn complete_presentation(
        &mut self,
        ticket: AdvanceTicket,
    ) -> Result<CompletedAdvance, TurnError> {
        match self.phase {
            TurnPhase::Idle => Err(TurnError::NotAdvancing),
            TurnPhase::Advancing { ticket: pending, .. } if pending != ticket => {
                warn!(?ticket, ?pending, "stale presentation signal ignored");
                Err(TurnError::StaleCompletion(ticket))
            }
            TurnPhase::Advancing { .. } => Ok(self.finish(false)),
        }
    }

    /// Complete a pending advance whose presentation step took too long.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<CompletedAdvance> {
        match self.phase {
            TurnPhase::Advancing { since, .. } if now.saturating_duration_since(since) >= self.timeout => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "presentation step timed out");
                Some(self.finish(true))
            }
            _ => None,
        }
    }

    fn finish(&mut self, timed_out: bool) -> CompletedAdvance {
        let previous_year = self.state.current_year;
        self.state.current_year = self.state.next_year();
        self.state.turns_remaining = self.state.turns_remaining.saturating_sub(1);
        self.phase = TurnPhase::Idle;
        info!(
            from = previous_year,
            to = self.state.current_year,
            remaining = self.state.turns_remaining,
            "turn advanced"
        );
        CompletedAdvance {
            previous_year,
            year: self.state.current_year,
            turns_remaining: self.state.turns_remaining,
            timed_out,
        }
    }

    /// Back to the start year, dropping any pending advance.
    pub fn reset(&mut self) {
        self.state.current_year = self.start_year;
        self.state.turns_remaining = self.total_turns;
        self.phase = TurnPhase::Idle;
        self.blocked = false;
    }
}
