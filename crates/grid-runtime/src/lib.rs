#![deny(warnings)]

//! Turn runtime for the grid economy.
//!
//! [`GameSession`] owns one game: the resource ledger, import planner, debt
//! manager, voting engine and turn controller. Every mutation goes through
//! the session, which broadcasts the resulting [`grid_core::GameEvent`]s to
//! subscribed observers.

pub mod session;
pub mod turn;

pub use session::{GameSession, SessionError, TurnReport};
pub use turn::{AdvanceTicket, CompletedAdvance, TurnController, TurnError, TurnPhase, TurnState};
