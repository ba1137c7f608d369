pub mod candidate;
pub mod pool;
pub mod text;

pub use candidate::{CandidateAttributes, CandidateMatch, CandidateProfile, SearchFilter};
pub use pool::CandidatePool;
