use std::collections::HashSet;

use crate::candidate::CandidateMatch;

/// Insertion-ordered set of matches keyed by candidate id.
///
/// The first occurrence of an id wins. Later merges never touch the stored score or attributes.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
	seen: HashSet<String>,
	matches: Vec<CandidateMatch>,
}
impl CandidatePool {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns how many of `incoming` were not already present.
	pub fn merge<I>(&mut self, incoming: I) -> usize
	where
		I: IntoIterator<Item = CandidateMatch>,
	{
		let mut added = 0;

		for candidate in incoming {
			if self.seen.contains(&candidate.id) {
				continue;
			}

			self.seen.insert(candidate.id.clone());
			self.matches.push(candidate);

			added += 1;
		}

		added
	}

	pub fn contains(&self, id: &str) -> bool {
		self.seen.contains(id)
	}

	pub fn len(&self) -> usize {
		self.matches.len()
	}

	pub fn is_empty(&self) -> bool {
		self.matches.is_empty()
	}

	pub fn values(&self) -> &[CandidateMatch] {
		&self.matches
	}

	pub fn into_values(self) -> Vec<CandidateMatch> {
		self.matches
	}
}
