//! Typed notifications emitted by the turn economy.
//!
//! Collaborators subscribe an observer and receive every event in emission
//! order. The bus never learns who its observers are.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;

/// Result of a vote, as seen by observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VoteVerdict {
    Accepted,
    Rejected,
    /// Campaigns are not voted on; they start after a delay.
    Scheduled { starts_in_turns: u32 },
}

/// Every notification the core emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Emitted once per completed advance.
    TurnAdvanced { year: u32, turns_remaining: u32 },
    /// Emitted on explicit reset confirmation.
    GameResetRequested,
    /// A loan was confirmed: `principal` is credited, `repayment` is owed.
    LoanRequested { repayment: u64, principal: u64 },
    /// The player moved the import slider; the caller should push fresh figures.
    ImportSelectionChanged { percent: u8 },
    /// Ask the simulation for forward-looking supply estimates.
    PredictionUpdateRequested,
    VoteCast { key: String, verdict: VoteVerdict },
    /// A scheduled campaign reached its start turn.
    CampaignStarted { key: String },
}

/// Anything that wants to hear about [`GameEvent`]s.
pub trait GameObserver {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> GameObserver for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

/// Message-passing observer: forwards a copy of every event to a channel.
///
/// A dropped receiver is ignored.
#[derive(Clone, Debug)]
pub struct ChannelObserver(pub Sender<GameEvent>);

impl GameObserver for ChannelObserver {
    fn on_event(&mut self, event: &GameEvent) {
        let _ = self.0.send(event.clone());
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out of events to registered observers.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(SubscriptionId, Box<dyn GameObserver>)>,
    next_id: u64,
    emitted: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<O>(&mut self, observer: O) -> SubscriptionId
    where
        O: GameObserver + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    /// Deliver `event` to every observer in subscription order.
    pub fn emit(&mut self, event: GameEvent) {
        tracing::trace!(?event, observers = self.observers.len(), "emit");
        for (_, observer) in &mut self.observers {
            observer.on_event(&event);
        }
        self.emitted += 1;
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Total events emitted since creation.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    #[test]
    fn closures_receive_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(move |e: &GameEvent| sink.borrow_mut().push(e.clone()));
        bus.emit(GameEvent::PredictionUpdateRequested);
        bus.emit(GameEvent::GameResetRequested);
        assert_eq!(
            *seen.borrow(),
            vec![GameEvent::PredictionUpdateRequested, GameEvent::GameResetRequested]
        );
        assert_eq!(bus.emitted(), 2);
    }

    #[test]
    fn channel_observer_and_unsubscribe() {
        let (tx, rx) = mpsc::channel();
        let mut bus = EventBus::new();
        let id = bus.subscribe(ChannelObserver(tx));
        bus.emit(GameEvent::ImportSelectionChanged { percent: 20 });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(GameEvent::GameResetRequested);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![GameEvent::ImportSelectionChanged { percent: 20 }]);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn event_serializes_with_tag() {
        let s = serde_json::to_string(&GameEvent::LoanRequested {
            repayment: 120,
            principal: 100,
        })
        .unwrap();
        assert!(s.contains("\"type\":\"loan_requested\""));
    }
}
