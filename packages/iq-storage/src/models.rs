use iq_domain::CandidateProfile;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
	pub id: Option<String>,
	pub name: Option<String>,
	pub headline: Option<String>,
	pub email: Option<String>,
	pub years_of_experience: Option<i32>,
	pub city: Option<String>,
	pub country: Option<String>,
	pub current_title: Option<String>,
	pub current_company: Option<String>,
	pub industry: Option<String>,
	pub job_description: Option<String>,
	pub work_history: Option<String>,
	pub skills: Option<String>,
	pub top_skills: Option<String>,
	pub education: Option<String>,
	pub languages: Option<String>,
}
impl CandidateRow {
	/// Rows without an identifier or a display name cannot be indexed.
	pub fn into_profile(self) -> Option<CandidateProfile> {
		let id = self.id.filter(|id| !id.trim().is_empty())?;
		let name = self.name.filter(|name| !name.trim().is_empty())?;

		Some(CandidateProfile {
			id,
			name,
			headline: self.headline,
			email: self.email,
			years_of_experience: self.years_of_experience,
			city: self.city,
			country: self.country,
			current_title: self.current_title,
			current_company: self.current_company,
			industry: self.industry,
			skills: self.skills,
			top_skills: self.top_skills,
			education: self.education,
			languages: self.languages,
			work_history: self.work_history,
			job_description: self.job_description,
		})
	}
}

/// Result of a full read of the source of record.
#[derive(Debug, Default)]
pub struct FetchedCandidates {
	pub candidates: Vec<CandidateProfile>,
	/// Identifiers (possibly empty) of rows that could not be turned into a profile.
	pub skipped: Vec<String>,
}
