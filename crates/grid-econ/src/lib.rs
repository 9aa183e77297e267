#![deny(warnings)]

//! Economic models for the grid turn economy.
//!
//! This module provides validated utilities for:
//! - The import target: the share of winter demand still uncovered after
//!   domestic supply and the player's import selection
//! - Loans charged a one-off interest on the borrowed principal
//! - Tracking outstanding debt and the per-turn debt display (latest loan)

use grid_core::EnergyFigures;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Highest import selection the slider allows.
pub const MAX_IMPORT_PERCENT: u8 = 100;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Interest must be strictly positive and representable.
    #[error("invalid interest rate: {0}")]
    InvalidInterestRate(Decimal),
    /// Import selection is a percentage in [0, 100].
    #[error("import selection {0}% is out of range [0, 100]")]
    SelectionOutOfRange(u8),
    /// Amount does not fit the money representation.
    #[error("monetary overflow")]
    Overflow,
}

/// Share of `demand` that must still be imported.
///
/// The player's selected import volume (`demand * import_percent / 100`) is
/// netted out of the gap, so raising the selection lowers the target until it
/// reaches zero: `max(0, demand - supply - imported) / demand`, clamped to
/// [0, 1]. Zero demand yields 0.
///
/// Example:
/// assert!((import_target(1000, 700, 0) - 0.3).abs() < 1e-9);
/// assert_eq!(import_target(1000, 700, 50), 0.0);
pub fn import_target(demand: u64, supply: u64, import_percent: u8) -> f64 {
    if demand == 0 {
        return 0.0;
    }
    let d = demand as f64;
    let covered = supply as f64 / d;
    let selected = f64::from(import_percent.min(MAX_IMPORT_PERCENT)) / 100.0;
    (1.0 - covered - selected).clamp(0.0, 1.0)
}

/// Holds the player's import selection and the last computed target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPlanner {
    selection_percent: u8,
    target: f64,
}

impl ImportPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection_percent(&self) -> u8 {
        self.selection_percent
    }

    /// Selection as a fraction in [0, 1].
    pub fn selection_fraction(&self) -> f32 {
        f32::from(self.selection_percent) / 100.0
    }

    /// Store a new selection. Returns whether it differs from the old one.
    pub fn set_selection(&mut self, percent: u8) -> Result<bool, EconError> {
        if percent > MAX_IMPORT_PERCENT {
            return Err(EconError::SelectionOutOfRange(percent));
        }
        let changed = percent != self.selection_percent;
        self.selection_percent = percent;
        Ok(changed)
    }

    /// Recompute the target from winter figures and the stored selection.
    pub fn recompute_target(&mut self, winter: EnergyFigures) -> f64 {
        self.target = import_target(winter.demand, winter.supply, self.selection_percent);
        debug!(
            demand = winter.demand,
            supply = winter.supply,
            selection = self.selection_percent,
            import_target = self.target,
            "import target recomputed"
        );
        self.target
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Back to no imports and no target.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Amount owed for borrowing `principal` at `rate`.
///
/// The interest is rounded up to a whole unit, so any non-zero principal
/// costs at least one unit at a positive rate.
///
/// Example:
/// assert_eq!(repayment_for(100, Decimal::new(2, 1)).unwrap(), 120);
pub fn repayment_for(principal: u64, rate: Decimal) -> Result<u64, EconError> {
    let interest = Decimal::from(principal)
        .checked_mul(rate)
        .ok_or(EconError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::AwayFromZero)
        .to_u64()
        .ok_or(EconError::Overflow)?;
    principal.checked_add(interest).ok_or(EconError::Overflow)
}

/// Borrow amounts previewed while the player picks a principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanQuote {
    /// Credited to the player.
    pub principal: u64,
    /// Deducted later.
    pub repayment: u64,
}

/// A confirmed loan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtObligation {
    pub principal: u64,
    pub interest_rate: Decimal,
    pub repayment: u64,
    /// Part of `repayment` not yet paid back.
    pub remaining: u64,
}

/// Loans, outstanding obligations and the per-turn debt display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DebtManager {
    interest_rate: Decimal,
    pending: Option<LoanQuote>,
    debt_this_turn: u64,
    obligations: Vec<DebtObligation>,
}

impl DebtManager {
    pub fn new(interest_rate: Decimal) -> Result<Self, EconError> {
        if interest_rate <= Decimal::ZERO {
            return Err(EconError::InvalidInterestRate(interest_rate));
        }
        Ok(Self {
            interest_rate,
            pending: None,
            debt_this_turn: 0,
            obligations: Vec::new(),
        })
    }

    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }

    /// Preview a loan and remember it as pending.
    pub fn quote(&mut self, principal: u64) -> Result<LoanQuote, EconError> {
        let quote = LoanQuote {
            principal,
            repayment: repayment_for(principal, self.interest_rate)?,
        };
        self.pending = Some(quote);
        Ok(quote)
    }

    pub fn pending(&self) -> Option<LoanQuote> {
        self.pending
    }

    /// Drop the pending preview; nothing else changes.
    pub fn cancel(&mut self) -> Option<LoanQuote> {
        self.pending.take()
    }

    /// Confirm a loan of `principal`.
    ///
    /// Returns `(repayment, principal)`: the amount to show as owed and the
    /// amount to credit.
    pub fn request_loan(&mut self, principal: u64) -> Result<(u64, u64), EconError> {
        let repayment = repayment_for(principal, self.interest_rate)?;
        self.pending = None;
        if principal == 0 {
            return Ok((0, 0));
        }
        self.debt_this_turn = repayment;
        self.obligations.push(DebtObligation {
            principal,
            interest_rate: self.interest_rate,
            repayment,
            remaining: repayment,
        });
        info!(principal, repayment, "loan taken");
        Ok((repayment, principal))
    }

    /// Repayment of the latest loan taken this turn. Earlier loans of the
    /// same turn stay in [`obligations`](Self::obligations) only.
    pub fn debt_this_turn(&self) -> u64 {
        self.debt_this_turn
    }

    /// Zero the per-turn display. Called at every turn boundary.
    pub fn clear_after_turn(&mut self) {
        self.debt_this_turn = 0;
        self.pending = None;
    }

    pub fn obligations(&self) -> &[DebtObligation] {
        &self.obligations
    }

    /// Sum still owed over all obligations.
    pub fn outstanding(&self) -> u64 {
        self.obligations
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.remaining))
    }

    /// Pay back up to `amount`, oldest obligation first. Returns the amount
    /// actually applied.
    pub fn repay(&mut self, amount: u64) -> u64 {
        let mut left = amount;
        for o in &mut self.obligations {
            if left == 0 {
                break;
            }
            let paid = o.remaining.min(left);
            o.remaining -= paid;
            left -= paid;
        }
        self.obligations.retain(|o| o.remaining > 0);
        let applied = amount - left;
        if applied > 0 {
            info!(applied, outstanding = self.outstanding(), "debt repaid");
        }
        applied
    }

    /// Forget every loan, keeping the interest rate.
    pub fn reset(&mut self) {
        self.pending = None;
        self.debt_this_turn = 0;
        self.obligations.clear();
    }
}
