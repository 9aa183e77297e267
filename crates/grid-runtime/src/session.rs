//! One game: ledger, import planner, debt, voting and turn controller wired
//! together behind the event bus.

use crate::turn::{AdvanceTicket, CompletedAdvance, TurnController, TurnError, TurnState};
use grid_core::{
    ConfigError, EventBus, GameConfig, GameEvent, GameObserver, ResourceCategory, ResourceLedger,
    ResourceSnapshot, ResourceUpdate, SubscriptionId, UpdateOutcome, ValidationError,
};
use grid_econ::{DebtManager, EconError, ImportPlanner, LoanQuote};
use grid_policy::{
    Catalog, PolicyError, PolicyVotingEngine, ProbabilitySource, SelectionPreview, VoteOutcome,
};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Econ(#[from] EconError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Summary of a completed turn advance.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    pub year: u32,
    pub turns_remaining: u32,
    /// Campaigns that became active on this turn.
    pub started_campaigns: Vec<String>,
    /// Import target recomputed for the new turn, if winter figures exist.
    pub import_target: Option<f64>,
    pub timed_out: bool,
}

pub struct GameSession {
    config: GameConfig,
    ledger: ResourceLedger,
    planner: ImportPlanner,
    debt: DebtManager,
    voting: PolicyVotingEngine,
    turns: TurnController,
    bus: EventBus,
}

impl GameSession {
    pub fn new(config: GameConfig, catalog: Catalog) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            ledger: ResourceLedger::new(config.max_energy_bar_value),
            planner: ImportPlanner::new(),
            debt: DebtManager::new(config.interest_rate)?,
            voting: PolicyVotingEngine::new(catalog, config.rng_seed),
            turns: TurnController::new(&config),
            bus: EventBus::new(),
            config,
        })
    }

    pub fn subscribe<O>(&mut self, observer: O) -> SubscriptionId
    where
        O: GameObserver + 'static,
    {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &ResourceSnapshot {
        self.ledger.snapshot()
    }

    pub fn turn_state(&self) -> &TurnState {
        self.turns.state()
    }

    pub fn is_advancing(&self) -> bool {
        self.turns.is_advancing()
    }

    pub fn import_target(&self) -> f64 {
        self.planner.target()
    }

    pub fn import_selection(&self) -> u8 {
        self.planner.selection_percent()
    }

    pub fn debt(&self) -> &DebtManager {
        &self.debt
    }

    pub fn voting(&self) -> &PolicyVotingEngine {
        &self.voting
    }

    // ── Resources ─────────────────────────────────

    /// Write figures to the ledger; winter figures refresh the import target.
    pub fn apply_update(&mut self, update: ResourceUpdate) -> UpdateOutcome {
        let outcome = self.ledger.apply_update(update);
        if outcome.requires_import_recompute() {
            self.recompute_import_target();
        }
        outcome
    }

    pub fn apply_values(
        &mut self,
        category: ResourceCategory,
        values: &[i64],
    ) -> Result<UpdateOutcome, SessionError> {
        let update = ResourceUpdate::from_values(category, values)?;
        Ok(self.apply_update(update))
    }

    /// Store the player's import percentage. When it changed, observers are
    /// told so they can push fresh figures.
    pub fn set_import_selection(&mut self, percent: u8) -> Result<(), SessionError> {
        if self.planner.set_selection(percent)? {
            self.bus.emit(GameEvent::ImportSelectionChanged { percent });
        }
        Ok(())
    }

    fn recompute_import_target(&mut self) -> Option<f64> {
        let winter = self.ledger.snapshot().winter?;
        Some(self.planner.recompute_target(winter))
    }

    /// Ask the simulation for predicted supply; the answer comes back as a
    /// [`ResourceUpdate::Prediction`].
    pub fn request_prediction(&mut self) {
        self.bus.emit(GameEvent::PredictionUpdateRequested);
    }

    // ── Debt ──────────────────────────────────────

    pub fn quote_loan(&mut self, principal: u64) -> Result<LoanQuote, SessionError> {
        Ok(self.debt.quote(principal)?)
    }

    pub fn cancel_loan(&mut self) -> Option<LoanQuote> {
        self.debt.cancel()
    }

    /// Confirm a loan. Returns `(repayment, principal)`.
    pub fn confirm_loan(&mut self, principal: u64) -> Result<(u64, u64), SessionError> {
        let (repayment, principal) = self.debt.request_loan(principal)?;
        if principal > 0 {
            self.bus.emit(GameEvent::LoanRequested {
                repayment,
                principal,
            });
        }
        Ok((repayment, principal))
    }

    pub fn repay_debt(&mut self, amount: u64) -> u64 {
        self.debt.repay(amount)
    }

    // ── Policies ──────────────────────────────────

    pub fn select_policy(
        &mut self,
        key: &str,
        probabilities: &dyn ProbabilitySource,
    ) -> Result<SelectionPreview, SessionError> {
        Ok(self.voting.select_policy(key, probabilities)?)
    }

    pub fn select_campaign(&mut self, key: &str) -> Result<SelectionPreview, SessionError> {
        Ok(self.voting.select_campaign(key)?)
    }

    pub fn clear_selection(&mut self) {
        self.voting.clear_selection();
    }

    /// See [`PolicyVotingEngine::cast_vote`], including its panic.
    pub fn cast_vote(
        &mut self,
        probabilities: &dyn ProbabilitySource,
    ) -> Result<VoteOutcome, SessionError> {
        let outcome = self.voting.cast_vote(probabilities)?;
        self.bus.emit(GameEvent::VoteCast {
            key: outcome.key.clone(),
            verdict: outcome.verdict.clone(),
        });
        Ok(outcome)
    }

    // ── Turns ─────────────────────────────────────

    pub fn set_advance_blocked(&mut self, blocked: bool) {
        self.turns.set_blocked(blocked);
    }

    /// Start a turn advance; it completes on [`presentation_finished`]
    /// or the timeout checked by [`poll`].
    ///
    /// [`presentation_finished`]: Self::presentation_finished
    /// [`poll`]: Self::poll
    pub fn request_advance(&mut self, now: Instant) -> Result<AdvanceTicket, SessionError> {
        self.turns.request_advance(now).map_err(|e| {
            warn!(error = %e, "turn advance refused");
            SessionError::from(e)
        })
    }

    /// The presentation layer finished the animation started for `ticket`.
    pub fn presentation_finished(
        &mut self,
        ticket: AdvanceTicket,
    ) -> Result<TurnReport, SessionError> {
        let done = self.turns.complete_presentation(ticket)?;
        Ok(self.finish_advance(done))
    }

    /// Complete a stuck advance once the timeout has passed.
    pub fn poll(&mut self, now: Instant) -> Option<TurnReport> {
        let done = self.turns.poll_timeout(now)?;
        Some(self.finish_advance(done))
    }

    fn finish_advance(&mut self, done: CompletedAdvance) -> TurnReport {
        let started_campaigns = self.voting.on_turn_advanced();
        self.debt.clear_after_turn();
        self.bus.emit(GameEvent::TurnAdvanced {
            year: done.year,
            turns_remaining: done.turns_remaining,
        });
        for key in &started_campaigns {
            self.bus.emit(GameEvent::CampaignStarted { key: key.clone() });
        }
        let import_target = self.recompute_import_target();
        TurnReport {
            year: done.year,
            turns_remaining: done.turns_remaining,
            started_campaigns,
            import_target,
            timed_out: done.timed_out,
        }
    }

    /// Confirmed game reset: every component returns to its initial state.
    pub fn reset_game(&mut self) {
        self.ledger.reset();
        self.planner.reset();
        self.debt.reset();
        self.voting.reset();
        self.turns.reset();
        info!(year = self.turns.state().current_year, "game reset");
        self.bus.emit(GameEvent::GameResetRequested);
    }
}
