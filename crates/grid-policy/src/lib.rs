#![deny(warnings)]

//! Policy and campaign voting with a one-decision-per-turn lock.
//!
//! Policies are put to a vote whose acceptance probability comes from the
//! simulation; campaigns skip the vote and become active after a fixed number
//! of turns. The catalog is read from YAML and never mutated here.

use grid_core::VoteVerdict;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
    #[error("unknown campaign: {0}")]
    UnknownCampaign(String),
    /// Only one vote per turn.
    #[error("a vote has already been cast this turn")]
    AlreadyVoted,
    #[error("policy already implemented: {0}")]
    AlreadyImplemented(String),
    #[error("duplicate catalog key: {0}")]
    DuplicateKey(String),
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PolicyError {
    fn from(e: std::io::Error) -> Self {
        PolicyError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(e: serde_yaml::Error) -> Self {
        PolicyError::InvalidCatalog(e.to_string())
    }
}

/// One line of a policy's effect list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Turns between scheduling and the campaign becoming active.
    pub duration_turns: u32,
}

/// Non-empty effect texts, in catalog order.
fn effect_lines(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter(|e| !e.text.is_empty())
        .map(|e| e.text.clone())
        .collect()
}

/// Read-only set of policies and campaigns, keyed by stable name.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    policies: BTreeMap<String, PolicyDef>,
    campaigns: BTreeMap<String, CampaignDef>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate keys (also across the two kinds)
    /// and campaigns without a duration.
    pub fn new(policies: Vec<PolicyDef>, campaigns: Vec<CampaignDef>) -> Result<Self, PolicyError> {
        let mut cat = Catalog::default();
        for p in policies {
            if cat.policies.contains_key(&p.key) {
                return Err(PolicyError::DuplicateKey(p.key));
            }
            cat.policies.insert(p.key.clone(), p);
        }
        for c in campaigns {
            if cat.policies.contains_key(&c.key) || cat.campaigns.contains_key(&c.key) {
                return Err(PolicyError::DuplicateKey(c.key));
            }
            if c.duration_turns == 0 {
                return Err(PolicyError::InvalidCatalog(format!(
                    "campaign {} needs duration_turns >= 1",
                    c.key
                )));
            }
            cat.campaigns.insert(c.key.clone(), c);
        }
        Ok(cat)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, PolicyError> {
        #[derive(Deserialize)]
        struct CatalogFile {
            #[serde(default)]
            policies: Vec<PolicyDef>,
            #[serde(default)]
            campaigns: Vec<CampaignDef>,
        }
        let file: CatalogFile = serde_yaml::from_str(text)?;
        Self::new(file.policies, file.campaigns)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn policy(&self, key: &str) -> Option<&PolicyDef> {
        self.policies.get(key)
    }

    pub fn campaign(&self, key: &str) -> Option<&CampaignDef> {
        self.campaigns.get(key)
    }

    pub fn policy_keys(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn campaign_keys(&self) -> impl Iterator<Item = &str> {
        self.campaigns.keys().map(String::as_str)
    }
}

/// Supplies the current acceptance probability of a policy.
pub trait ProbabilitySource {
    fn acceptance_probability(&self, policy: &str) -> f64;
}

impl<F> ProbabilitySource for F
where
    F: Fn(&str) -> f64,
{
    fn acceptance_probability(&self, policy: &str) -> f64 {
        self(policy)
    }
}

/// Table of probabilities; unlisted policies never pass.
#[derive(Clone, Debug, Default)]
pub struct FixedProbabilities(pub BTreeMap<String, f64>);

impl ProbabilitySource for FixedProbabilities {
    fn acceptance_probability(&self, policy: &str) -> f64 {
        self.0.get(policy).copied().unwrap_or(0.0)
    }
}

/// Clamp to [0, 1]; NaN counts as 0.
fn sanitize_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// What the player currently has selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Policy(String),
    Campaign { key: String, duration_turns: u32 },
}

/// Whether the vote option is offered for the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteAvailability {
    Open,
    /// A decision was already made this turn.
    Locked,
    /// The policy passed earlier; nothing left to vote on.
    AlreadyImplemented,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PolicyPreview {
    pub key: String,
    pub name: String,
    pub description: String,
    pub effect_lines: Vec<String>,
    pub acceptance_probability: f64,
    pub availability: VoteAvailability,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CampaignPreview {
    pub key: String,
    pub name: String,
    pub description: String,
    pub effect_lines: Vec<String>,
    pub duration_turns: u32,
    pub availability: VoteAvailability,
}

/// Data shown for the current selection.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionPreview {
    Policy(PolicyPreview),
    Campaign(CampaignPreview),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub key: String,
    pub verdict: VoteVerdict,
}

/// Campaign waiting for its start turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCampaign {
    pub key: String,
    pub remaining_turns: u32,
}

/// Catalog, selection, vote lock and campaign schedule.
pub struct PolicyVotingEngine {
    catalog: Catalog,
    selection: Selection,
    implemented: BTreeSet<String>,
    vote_locked: bool,
    scheduled: Vec<ScheduledCampaign>,
    active_campaigns: BTreeSet<String>,
    seed: u64,
    rng: ChaCha8Rng,
}

impl PolicyVotingEngine {
    pub fn new(catalog: Catalog, seed: u64) -> Self {
        Self {
            catalog,
            selection: Selection::None,
            implemented: BTreeSet::new(),
            vote_locked: false,
            scheduled: Vec::new(),
            active_campaigns: BTreeSet::new(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_vote_locked(&self) -> bool {
        self.vote_locked
    }

    pub fn is_implemented(&self, key: &str) -> bool {
        self.implemented.contains(key)
    }

    pub fn implemented(&self) -> impl Iterator<Item = &str> {
        self.implemented.iter().map(String::as_str)
    }

    pub fn scheduled(&self) -> &[ScheduledCampaign] {
        &self.scheduled
    }

    /// Campaigns that have started; a rerun campaign is listed once.
    pub fn active_campaigns(&self) -> &BTreeSet<String> {
        &self.active_campaigns
    }

    fn availability(&self) -> VoteAvailability {
        if self.vote_locked {
            VoteAvailability::Locked
        } else {
            VoteAvailability::Open
        }
    }

    /// Select a policy and preview it with its current acceptance probability.
    pub fn select_policy(
        &mut self,
        key: &str,
        probabilities: &dyn ProbabilitySource,
    ) -> Result<SelectionPreview, PolicyError> {
        let def = self
            .catalog
            .policy(key)
            .ok_or_else(|| PolicyError::UnknownPolicy(key.to_string()))?;
        let availability = if self.implemented.contains(key) {
            VoteAvailability::AlreadyImplemented
        } else {
            self.availability()
        };
        let preview = PolicyPreview {
            key: def.key.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            effect_lines: effect_lines(&def.effects),
            acceptance_probability: sanitize_probability(probabilities.acceptance_probability(key)),
            availability,
        };
        self.selection = Selection::Policy(def.key.clone());
        debug!(policy = key, "policy selected");
        Ok(SelectionPreview::Policy(preview))
    }

    /// Select a campaign and preview its duration.
    pub fn select_campaign(&mut self, key: &str) -> Result<SelectionPreview, PolicyError> {
        let def = self
            .catalog
            .campaign(key)
            .ok_or_else(|| PolicyError::UnknownCampaign(key.to_string()))?;
        let preview = CampaignPreview {
            key: def.key.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            effect_lines: effect_lines(&def.effects),
            duration_turns: def.duration_turns,
            availability: self.availability(),
        };
        self.selection = Selection::Campaign {
            key: def.key.clone(),
            duration_turns: def.duration_turns,
        };
        debug!(campaign = key, "campaign selected");
        Ok(SelectionPreview::Campaign(preview))
    }

    /// The policy window was closed.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Decide on the current selection and lock voting for the turn.
    ///
    /// A policy passes when a uniform draw in [0, 1) falls below its
    /// acceptance probability. A campaign is scheduled unconditionally.
    /// Errors leave every piece of state untouched.
    ///
    /// # Panics
    ///
    /// Panics when nothing is selected; the caller only offers the vote
    /// after a selection.
    pub fn cast_vote(
        &mut self,
        probabilities: &dyn ProbabilitySource,
    ) -> Result<VoteOutcome, PolicyError> {
        if self.vote_locked {
            return Err(PolicyError::AlreadyVoted);
        }
        let outcome = match &self.selection {
            Selection::None => panic!("cast_vote called without a selected policy or campaign"),
            Selection::Policy(key) => {
                if self.implemented.contains(key) {
                    return Err(PolicyError::AlreadyImplemented(key.clone()));
                }
                let p = sanitize_probability(probabilities.acceptance_probability(key));
                let draw: f64 = self.rng.gen();
                let accepted = draw < p;
                info!(policy = %key, probability = p, accepted, "policy vote");
                if accepted {
                    self.implemented.insert(key.clone());
                }
                VoteOutcome {
                    key: key.clone(),
                    verdict: if accepted {
                        VoteVerdict::Accepted
                    } else {
                        VoteVerdict::Rejected
                    },
                }
            }
            Selection::Campaign {
                key,
                duration_turns,
            } => {
                self.scheduled.push(ScheduledCampaign {
                    key: key.clone(),
                    remaining_turns: *duration_turns,
                });
                info!(campaign = %key, turns = duration_turns, "campaign scheduled");
                VoteOutcome {
                    key: key.clone(),
                    verdict: VoteVerdict::Scheduled {
                        starts_in_turns: *duration_turns,
                    },
                }
            }
        };
        self.vote_locked = true;
        Ok(outcome)
    }

    /// Turn boundary: unlock voting and age scheduled campaigns.
    ///
    /// Returns the keys of campaigns that became active this turn.
    pub fn on_turn_advanced(&mut self) -> Vec<String> {
        self.vote_locked = false;
        let mut started = Vec::new();
        let mut still_waiting = Vec::new();
        for mut c in self.scheduled.drain(..) {
            c.remaining_turns = c.remaining_turns.saturating_sub(1);
            if c.remaining_turns == 0 {
                info!(campaign = %c.key, "campaign started");
                started.push(c.key);
            } else {
                still_waiting.push(c);
            }
        }
        self.scheduled = still_waiting;
        self.active_campaigns.extend(started.iter().cloned());
        started
    }

    /// Back to a fresh game with the same catalog and seed.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.selection = Selection::None;
        self.implemented.clear();
        self.vote_locked = false;
        self.scheduled.clear();
        self.active_campaigns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn catalog() -> Catalog {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/catalog.yaml");
        Catalog::from_file(root).unwrap()
    }

    fn always(p: f64) -> impl Fn(&str) -> f64 {
        move |_: &str| p
    }

    #[test]
    fn asset_catalog_loads() {
        let cat = catalog();
        assert_eq!(cat.policy_keys().count(), 5);
        assert_eq!(cat.campaign("campaign_env").unwrap().duration_turns, 2);
    }

    #[test]
    fn preview_skips_empty_effects() {
        let mut e = PolicyVotingEngine::new(catalog(), 1);
        match e.select_policy("home_regulation", &always(0.4)).unwrap() {
            SelectionPreview::Policy(p) => {
                assert_eq!(p.effect_lines, vec!["Winter demand reduced".to_string()]);
                assert_eq!(p.acceptance_probability, 0.4);
                assert_eq!(p.availability, VoteAvailability::Open);
            }
            other => panic!("unexpected preview {other:?}"),
        }
    }

    #[test]
    fn certain_vote_implements_policy() {
        let mut e = PolicyVotingEngine::new(catalog(), 7);
        e.select_policy("upgrade_pv", &always(1.0)).unwrap();
        let out = e.cast_vote(&always(1.0)).unwrap();
        assert_eq!(out.verdict, VoteVerdict::Accepted);
        assert!(e.is_implemented("upgrade_pv"));
        assert!(e.is_vote_locked());
    }

    #[test]
    fn second_vote_in_turn_is_rejected_without_changes() {
        let mut e = PolicyVotingEngine::new(catalog(), 7);
        e.select_policy("upgrade_wind", &always(0.0)).unwrap();
        assert_eq!(e.cast_vote(&always(0.0)).unwrap().verdict, VoteVerdict::Rejected);
        e.select_policy("upgrade_pv", &always(1.0)).unwrap();
        assert_eq!(e.cast_vote(&always(1.0)), Err(PolicyError::AlreadyVoted));
        assert!(!e.is_implemented("upgrade_pv"));
        assert_eq!(e.implemented().count(), 0);
    }

    #[test]
    fn implemented_policy_shows_state_and_does_not_lock() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        e.select_policy("upgrade_pv", &always(1.0)).unwrap();
        e.cast_vote(&always(1.0)).unwrap();
        e.on_turn_advanced();
        match e.select_policy("upgrade_pv", &always(1.0)).unwrap() {
            SelectionPreview::Policy(p) => {
                assert_eq!(p.availability, VoteAvailability::AlreadyImplemented)
            }
            other => panic!("unexpected preview {other:?}"),
        }
        assert_eq!(
            e.cast_vote(&always(1.0)),
            Err(PolicyError::AlreadyImplemented("upgrade_pv".into()))
        );
        assert!(!e.is_vote_locked());
    }

    #[test]
    fn campaign_starts_after_duration() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        e.select_campaign("campaign_env").unwrap();
        let out = e.cast_vote(&always(0.0)).unwrap();
        assert_eq!(out.verdict, VoteVerdict::Scheduled { starts_in_turns: 2 });
        assert!(e.is_vote_locked());
        assert!(e.on_turn_advanced().is_empty());
        assert!(!e.is_vote_locked());
        assert_eq!(e.on_turn_advanced(), vec!["campaign_env".to_string()]);
        assert!(e.scheduled().is_empty());
        assert!(e.active_campaigns().contains("campaign_env"));
    }

    #[test]
    fn rerun_campaign_is_active_once() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        for _ in 0..2 {
            e.select_campaign("campaign_demand").unwrap();
            e.cast_vote(&always(0.0)).unwrap();
            assert_eq!(e.on_turn_advanced(), vec!["campaign_demand".to_string()]);
        }
        assert_eq!(e.active_campaigns().len(), 1);
    }

    fn verdicts(e: &mut PolicyVotingEngine) -> Vec<VoteVerdict> {
        let keys = ["upgrade_wind", "upgrade_pv", "wind_buildtime", "industry_subsidy"];
        keys.iter()
            .map(|key| {
                e.select_policy(key, &always(0.5)).unwrap();
                let verdict = e.cast_vote(&always(0.5)).unwrap().verdict;
                e.on_turn_advanced();
                verdict
            })
            .collect()
    }

    #[test]
    fn reset_restarts_the_vote_sequence() {
        let expected = verdicts(&mut PolicyVotingEngine::new(catalog(), 11));
        let mut e = PolicyVotingEngine::new(catalog(), 11);
        verdicts(&mut e);
        e.reset();
        assert_eq!(verdicts(&mut e), expected);
    }

    #[test]
    fn locked_preview_for_campaign() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        e.select_campaign("campaign_demand").unwrap();
        e.cast_vote(&always(0.0)).unwrap();
        match e.select_campaign("campaign_env").unwrap() {
            SelectionPreview::Campaign(c) => assert_eq!(c.availability, VoteAvailability::Locked),
            other => panic!("unexpected preview {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_errors() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        assert_eq!(
            e.select_policy("campaign_env", &always(1.0)),
            Err(PolicyError::UnknownPolicy("campaign_env".into()))
        );
        assert_eq!(
            e.select_campaign("nope"),
            Err(PolicyError::UnknownCampaign("nope".into()))
        );
        assert_eq!(e.selection(), &Selection::None);
    }

    #[test]
    #[should_panic(expected = "without a selected")]
    fn vote_without_selection_panics() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        let _ = e.cast_vote(&always(1.0));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let yaml = "policies:\n  - {key: a, name: A}\ncampaigns:\n  - {key: a, name: B, duration_turns: 1}\n";
        assert_eq!(
            Catalog::from_yaml_str(yaml).unwrap_err(),
            PolicyError::DuplicateKey("a".into())
        );
    }

    #[test]
    fn zero_duration_campaign_rejected() {
        let yaml = "campaigns:\n  - {key: c, name: C, duration_turns: 0}\n";
        assert!(matches!(
            Catalog::from_yaml_str(yaml),
            Err(PolicyError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn reset_clears_progress() {
        let mut e = PolicyVotingEngine::new(catalog(), 3);
        e.select_policy("upgrade_pv", &always(1.0)).unwrap();
        e.cast_vote(&always(1.0)).unwrap();
        e.reset();
        assert!(!e.is_implemented("upgrade_pv"));
        assert!(!e.is_vote_locked());
        assert_eq!(e.selection(), &Selection::None);
    }

    #[test]
    fn fixed_probabilities_default_to_zero() {
        let mut table = BTreeMap::new();
        table.insert("upgrade_pv".to_string(), 0.75);
        let probs = FixedProbabilities(table);
        assert_eq!(probs.acceptance_probability("upgrade_pv"), 0.75);
        assert_eq!(probs.acceptance_probability("upgrade_wind"), 0.0);
    }

    proptest! {
        #[test]
        fn extreme_probabilities_are_deterministic(seed in any::<u64>()) {
            let mut e = PolicyVotingEngine::new(catalog(), seed);
            e.select_policy("upgrade_wind", &always(1.0)).unwrap();
            prop_assert_eq!(e.cast_vote(&always(1.0)).unwrap().verdict, VoteVerdict::Accepted);

            let mut e = PolicyVotingEngine::new(catalog(), seed);
            e.select_policy("upgrade_wind", &always(0.0)).unwrap();
            prop_assert_eq!(e.cast_vote(&always(0.0)).unwrap().verdict, VoteVerdict::Rejected);
        }

        #[test]
        fn out_of_range_probabilities_are_clamped(p in -10.0f64..10.0) {
            let s = sanitize_probability(p);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
