//! Conversation history shared across chat requests.
//!
//! The map lock is held only to look up, insert, or evict a session. Turn history lives behind a
//! per-session lock so concurrent conversations never wait on each other.

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
	User,
	Assistant,
}
impl TurnRole {
	/// Upper-case label used when rendering history into prompts.
	pub fn label(self) -> &'static str {
		match self {
			Self::User => "USER",
			Self::Assistant => "ASSISTANT",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
	pub role: TurnRole,
	pub content: String,
}
impl Turn {
	pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
		Self { role, content: content.into() }
	}
}

type SharedTurns = Arc<Mutex<VecDeque<Turn>>>;

struct SessionSlot {
	turns: SharedTurns,
	last_used: Instant,
}

pub struct SessionStore {
	sessions: Mutex<HashMap<String, SessionSlot>>,
	max_turns: usize,
	max_sessions: usize,
	ttl: Duration,
}
impl SessionStore {
	pub fn new(max_turns: usize, max_sessions: usize, ttl: Duration) -> Self {
		Self {
			sessions: Mutex::new(HashMap::new()),
			max_turns: max_turns.max(1),
			max_sessions: max_sessions.max(1),
			ttl,
		}
	}

	pub fn from_config(cfg: &iq_config::Sessions) -> Self {
		Self::new(
			cfg.max_turns as usize,
			cfg.max_sessions as usize,
			Duration::from_secs(cfg.ttl_seconds),
		)
	}

	/// Turns recorded so far, oldest first. Creates the session on first use.
	pub fn history(&self, id: &str) -> Vec<Turn> {
		self.history_at(id, Instant::now())
	}

	pub fn history_at(&self, id: &str, now: Instant) -> Vec<Turn> {
		let turns = self.session_at(id, now);
		let turns = turns.lock().unwrap_or_else(|err| err.into_inner());

		turns.iter().cloned().collect()
	}

	/// Appends `turns`, dropping the oldest entries beyond the per-session cap.
	pub fn append(&self, id: &str, turns: impl IntoIterator<Item = Turn>) {
		self.append_at(id, turns, Instant::now());
	}

	pub fn append_at(&self, id: &str, turns: impl IntoIterator<Item = Turn>, now: Instant) {
		let session = self.session_at(id, now);
		let mut history = session.lock().unwrap_or_else(|err| err.into_inner());

		history.extend(turns);

		while history.len() > self.max_turns {
			history.pop_front();
		}
	}

	/// Number of live sessions.
	pub fn len(&self) -> usize {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, id: &str) -> bool {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).contains_key(id)
	}

	fn session_at(&self, id: &str, now: Instant) -> SharedTurns {
		let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());

		sessions.retain(|_, slot| now.saturating_duration_since(slot.last_used) <= self.ttl);

		if let Some(slot) = sessions.get_mut(id) {
			slot.last_used = now;

			return slot.turns.clone();
		}

		while sessions.len() >= self.max_sessions {
			let Some(oldest) = sessions
				.iter()
				.min_by_key(|(_, slot)| slot.last_used)
				.map(|(key, _)| key.clone())
			else {
				break;
			};

			tracing::debug!(session_id = %oldest, "Evicting least recently used session.");

			sessions.remove(&oldest);
		}

		let turns = SharedTurns::default();

		sessions.insert(id.to_string(), SessionSlot { turns: turns.clone(), last_used: now });

		turns
	}
}
