//! The race protocol.
//!
//! [`RaceLogic`] turns inbound [`Event`]s into the events a room commits or
//! relays:
//!
//! | inbound          | outcome                                               |
//! |------------------|-------------------------------------------------------|
//! | `hello`          | roster update; `status(roomIsReady)` when it fills    |
//! | `startRequest`   | `startUrl`, `goalUrl`, a `traversed` per player, `command(startGame)` |
//! | `action(retireGame)` | `winner` for the sender's opponent, if both are on the roster |
//! | `traversed`      | committed; `winner` if it matches the current goal    |
//! | `scrolled`       | relayed, never stored                                 |
//! | anything else    | committed verbatim                                    |

use linkrace_protocol::{
    Event, EventBody, PlayMode, PlayerId, RETIRE_GAME, ROOM_IS_READY, START_GAME,
};

use crate::{Outcome, RoomLogic, RoomPhase};

/// Number of players a race room admits.
pub const ROSTER_SIZE: usize = 2;

/// Race room state: the roster and the derived phase.
///
/// The roster lives only in the actor. A room reactivated from persisted
/// history starts with an empty roster and clients re-announce themselves
/// with `hello`.
#[derive(Debug, Default)]
pub struct RaceLogic {
    roster: Vec<PlayerId>,
    phase: RoomPhase,
}

impl RaceLogic {
    fn admit(&mut self, player: PlayerId) {
        if self.roster.len() < ROSTER_SIZE && !self.roster.contains(&player) {
            tracing::debug!(player = %player, "player admitted to roster");
            self.roster.push(player);
        }
    }

    fn on_hello(&mut self, player: PlayerId, mode: PlayMode, now: u64) -> Vec<Outcome<Event>> {
        let was_full = self.roster.len() == ROSTER_SIZE;
        self.admit(player);
        if mode == PlayMode::Solo {
            self.admit(PlayerId::cpu());
        }

        if self.phase == RoomPhase::Empty && !self.roster.is_empty() {
            self.phase = RoomPhase::WaitingForPlayers;
        }
        if !was_full && self.roster.len() == ROSTER_SIZE {
            self.phase = RoomPhase::Ready;
            return vec![Outcome::Commit(Event::system(
                now,
                EventBody::Status(ROOM_IS_READY.to_string()),
            ))];
        }
        Vec::new()
    }

    fn on_start(&mut self, start_page: String, goal_page: String, now: u64) -> Vec<Outcome<Event>> {
        let mut out = Vec::with_capacity(3 + self.roster.len());
        out.push(Outcome::Commit(Event::system(
            now,
            EventBody::StartUrl(start_page.clone()),
        )));
        out.push(Outcome::Commit(Event::system(now, EventBody::GoalUrl(goal_page))));
        for player in &self.roster {
            out.push(Outcome::Commit(Event::new(
                player.clone(),
                now,
                EventBody::Traversed(start_page.clone()),
            )));
        }
        out.push(Outcome::Commit(Event::system(
            now,
            EventBody::Command(START_GAME.to_string()),
        )));

        self.phase = RoomPhase::Playing;
        out
    }

    fn on_retire(&mut self, sender: &PlayerId, now: u64) -> Vec<Outcome<Event>> {
        if !self.roster.contains(sender) {
            tracing::debug!(player = %sender, "retire from outside the roster ignored");
            return Vec::new();
        }
        match self.roster.iter().find(|p| *p != sender) {
            Some(opponent) => {
                self.phase = RoomPhase::Resolved;
                vec![Outcome::Commit(Event::new(opponent.clone(), now, EventBody::Winner))]
            }
            None => {
                tracing::debug!(player = %sender, "retire with no opponent ignored");
                Vec::new()
            }
        }
    }

    fn on_traversed(&mut self, event: Event, history: &[Event], now: u64) -> Vec<Outcome<Event>> {
        let reached_goal = match (&event.body, current_goal(history)) {
            (EventBody::Traversed(url), Some(goal)) => url == goal,
            _ => false,
        };
        let player = event.player.clone();

        let mut out = vec![Outcome::Commit(event)];
        if reached_goal {
            self.phase = RoomPhase::Resolved;
            out.push(Outcome::Commit(Event::new(player, now, EventBody::Winner)));
        }
        out
    }
}

/// The goal page of the current race: the `goalUrl` with the greatest
/// `date`, the later one in history on ties.
pub fn current_goal(history: &[Event]) -> Option<&str> {
    history
        .iter()
        .enumerate()
        .filter_map(|(index, event)| match &event.body {
            EventBody::GoalUrl(url) => Some((event.date, index, url.as_str())),
            _ => None,
        })
        .max_by_key(|&(date, index, _)| (date, index))
        .map(|(_, _, url)| url)
}

impl RoomLogic for RaceLogic {
    type Event = Event;

    const NAMESPACE: &'static str = "game";

    fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self, event: Event, history: &[Event], now: u64) -> Vec<Outcome<Event>> {
        match event.body {
            EventBody::Hello { play_mode } => self.on_hello(event.player, play_mode, now),
            EventBody::StartRequest {
                start_page,
                goal_page,
            } => self.on_start(start_page, goal_page, now),
            EventBody::Action(ref action) if action == RETIRE_GAME => {
                self.on_retire(&event.player, now)
            }
            EventBody::Traversed(_) => self.on_traversed(event, history, now),
            _ if event.is_durable() => vec![Outcome::Commit(event)],
            _ => vec![Outcome::Relay(event)],
        }
    }

    fn label(event: &Event) -> &'static str {
        event.kind().as_str()
    }

    fn phase(&self) -> Option<RoomPhase> {
        Some(self.phase)
    }

    fn roster(&self) -> Vec<PlayerId> {
        self.roster.clone()
    }
}

// =========================================================================
// Tests
// =========================================================================
