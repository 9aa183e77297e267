#![deny(warnings)]

//! Core resource model for the energy grid turn economy.
//!
//! This crate defines the per-turn resource snapshot, the ledger that is its
//! only writer, the typed event bus shared by the other crates, and the game
//! configuration. Values arrive from the external simulation either as a
//! strongly typed [`ResourceUpdate`] or as a positional array that is
//! validated against the category's field count before anything is written.

pub mod config;
pub mod events;

pub use config::{ConfigError, GameConfig};
pub use events::{ChannelObserver, EventBus, GameEvent, GameObserver, SubscriptionId, VoteVerdict};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Season an energy figure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Summer,
}

/// Resource groups the simulation pushes into the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Winter demand and supply.
    WinterEnergy,
    /// Summer demand and supply.
    SummerEnergy,
    /// Public support.
    Support,
    /// Land use, pollution, biodiversity, environment score, import pollution.
    Environment,
    /// Budget, production, building cost, money, import cost.
    Money,
    /// Predicted winter supply, predicted summer supply.
    Prediction,
}

impl ResourceCategory {
    /// Minimum number of positional values an update for this category needs.
    pub const fn required_fields(self) -> usize {
        match self {
            Self::WinterEnergy | Self::SummerEnergy | Self::Prediction => 2,
            Self::Support => 1,
            Self::Environment => 5,
            Self::Money => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WinterEnergy => "winter_energy",
            Self::SummerEnergy => "summer_energy",
            Self::Support => "support",
            Self::Environment => "environment",
            Self::Money => "money",
            Self::Prediction => "prediction",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Demand and supply for one season.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyFigures {
    pub demand: u64,
    pub supply: u64,
}

impl EnergyFigures {
    /// True when the grid cannot cover demand on its own.
    pub fn shortfall(&self) -> bool {
        self.supply < self.demand
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportFigures {
    pub support: u64,
}

/// Environmental metrics, in the order the simulation sends them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFigures {
    /// Share of land used by plants, in percent.
    pub land_use: u64,
    /// Pollution produced domestically.
    pub pollution: u64,
    /// Biodiversity index, in percent.
    pub biodiversity: u64,
    /// Aggregate environment bar value.
    pub environment_score: u64,
    /// Pollution attributed to imported energy.
    pub import_pollution: u64,
}

impl EnvironmentFigures {
    /// Value shown on the pollution bar: domestic plus imported pollution.
    pub fn total_pollution(&self) -> u64 {
        self.pollution.saturating_add(self.import_pollution)
    }
}

/// Money figures, in the order the simulation sends them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyFigures {
    pub budget: u64,
    pub production: u64,
    pub building_cost: u64,
    pub money: u64,
    pub import_cost: u64,
}

/// Supply the simulation expects next turn, answered after a prediction
/// request and shown next to the current energy bars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionFigures {
    pub winter_supply: u64,
    pub summer_supply: u64,
}

/// One update per category, each carrying its own field set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceUpdate {
    WinterEnergy(EnergyFigures),
    SummerEnergy(EnergyFigures),
    Support(SupportFigures),
    Environment(EnvironmentFigures),
    Money(MoneyFigures),
    Prediction(PredictionFigures),
}

impl ResourceUpdate {
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::WinterEnergy(_) => ResourceCategory::WinterEnergy,
            Self::SummerEnergy(_) => ResourceCategory::SummerEnergy,
            Self::Support(_) => ResourceCategory::Support,
            Self::Environment(_) => ResourceCategory::Environment,
            Self::Money(_) => ResourceCategory::Money,
            Self::Prediction(_) => ResourceCategory::Prediction,
        }
    }

    /// Build an update from positional values.
    ///
    /// Extra trailing values are ignored. Fewer values than the category
    /// requires, or any negative value among the required ones, is rejected
    /// without producing an update.
    pub fn from_values(category: ResourceCategory, values: &[i64]) -> Result<Self, ValidationError> {
        let required = category.required_fields();
        if values.len() < required {
            return Err(ValidationError::TooFewValues {
                category,
                required,
                got: values.len(),
            });
        }
        let mut v = [0u64; 5];
        for (index, (&raw, slot)) in values.iter().zip(v.iter_mut()).take(required).enumerate() {
            *slot = u64::try_from(raw).map_err(|_| ValidationError::Negative {
                category,
                index,
                value: raw,
            })?;
        }
        Ok(match category {
            ResourceCategory::WinterEnergy => Self::WinterEnergy(EnergyFigures {
                demand: v[0],
                supply: v[1],
            }),
            ResourceCategory::SummerEnergy => Self::SummerEnergy(EnergyFigures {
                demand: v[0],
                supply: v[1],
            }),
            ResourceCategory::Support => Self::Support(SupportFigures { support: v[0] }),
            ResourceCategory::Environment => Self::Environment(EnvironmentFigures {
                land_use: v[0],
                pollution: v[1],
                biodiversity: v[2],
                environment_score: v[3],
                import_pollution: v[4],
            }),
            ResourceCategory::Money => Self::Money(MoneyFigures {
                budget: v[0],
                production: v[1],
                building_cost: v[2],
                money: v[3],
                import_cost: v[4],
            }),
            ResourceCategory::Prediction => Self::Prediction(PredictionFigures {
                winter_supply: v[0],
                summer_supply: v[1],
            }),
        })
    }
}

/// Validation errors for ledger writes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The update carried fewer values than the category needs.
    #[error("{category} update needs {required} values, got {got}")]
    TooFewValues {
        category: ResourceCategory,
        required: usize,
        got: usize,
    },
    /// Resource values are non-negative.
    #[error("{category} value #{index} is negative ({value})")]
    Negative {
        category: ResourceCategory,
        index: usize,
        value: i64,
    },
}

/// Latest resource values of the current turn.
///
/// A group stays `None` until an update for it has been applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub winter: Option<EnergyFigures>,
    pub summer: Option<EnergyFigures>,
    pub support: Option<SupportFigures>,
    pub environment: Option<EnvironmentFigures>,
    pub money: Option<MoneyFigures>,
    pub prediction: Option<PredictionFigures>,
}

impl ResourceSnapshot {
    pub fn energy(&self, season: Season) -> Option<EnergyFigures> {
        match season {
            Season::Winter => self.winter,
            Season::Summer => self.summer,
        }
    }
}

/// Derived values of a successful energy update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyOutcome {
    pub season: Season,
    pub figures: EnergyFigures,
    /// Supply is below demand.
    pub shortfall: bool,
    /// Demand relative to the full energy bar, used for the demand marker.
    pub demand_ratio: f32,
}

/// What an applied update changed, with the values derived from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpdateOutcome {
    Energy(EnergyOutcome),
    Support(SupportFigures),
    Environment {
        figures: EnvironmentFigures,
        total_pollution: u64,
    },
    Money(MoneyFigures),
    Prediction(PredictionFigures),
}

impl UpdateOutcome {
    /// Winter figures drive the import target; summer figures do not.
    pub fn requires_import_recompute(&self) -> bool {
        matches!(self, Self::Energy(o) if o.season == Season::Winter)
    }

    pub fn shortfall(&self) -> bool {
        matches!(self, Self::Energy(o) if o.shortfall)
    }
}

/// Sole writer of the [`ResourceSnapshot`].
#[derive(Clone, Debug)]
pub struct ResourceLedger {
    snapshot: ResourceSnapshot,
    max_energy_bar_value: u64,
}

impl ResourceLedger {
    pub fn new(max_energy_bar_value: u64) -> Self {
        Self {
            snapshot: ResourceSnapshot::default(),
            max_energy_bar_value,
        }
    }

    pub fn snapshot(&self) -> &ResourceSnapshot {
        &self.snapshot
    }

    /// Overwrite one group of the snapshot and report the derived values.
    pub fn apply_update(&mut self, update: ResourceUpdate) -> UpdateOutcome {
        debug!(category = %update.category(), "ledger update");
        match update {
            ResourceUpdate::WinterEnergy(figures) => {
                self.snapshot.winter = Some(figures);
                UpdateOutcome::Energy(self.energy_outcome(Season::Winter, figures))
            }
            ResourceUpdate::SummerEnergy(figures) => {
                self.snapshot.summer = Some(figures);
                UpdateOutcome::Energy(self.energy_outcome(Season::Summer, figures))
            }
            ResourceUpdate::Support(figures) => {
                self.snapshot.support = Some(figures);
                UpdateOutcome::Support(figures)
            }
            ResourceUpdate::Environment(figures) => {
                self.snapshot.environment = Some(figures);
                UpdateOutcome::Environment {
                    figures,
                    total_pollution: figures.total_pollution(),
                }
            }
            ResourceUpdate::Money(figures) => {
                self.snapshot.money = Some(figures);
                UpdateOutcome::Money(figures)
            }
            ResourceUpdate::Prediction(figures) => {
                self.snapshot.prediction = Some(figures);
                UpdateOutcome::Prediction(figures)
            }
        }
    }

    /// Positional variant of [`apply_update`](Self::apply_update).
    ///
    /// Nothing is written when validation fails.
    pub fn apply_values(
        &mut self,
        category: ResourceCategory,
        values: &[i64],
    ) -> Result<UpdateOutcome, ValidationError> {
        let update = ResourceUpdate::from_values(category, values)?;
        Ok(self.apply_update(update))
    }

    /// Forget every group, as on a game reset.
    pub fn reset(&mut self) {
        self.snapshot = ResourceSnapshot::default();
    }

    fn energy_outcome(&self, season: Season, figures: EnergyFigures) -> EnergyOutcome {
        let demand_ratio = if self.max_energy_bar_value == 0 {
            0.0
        } else {
            figures.demand as f32 / self.max_energy_bar_value as f32
        };
        EnergyOutcome {
            season,
            figures,
            shortfall: figures.shortfall(),
            demand_ratio,
        }
    }
}
