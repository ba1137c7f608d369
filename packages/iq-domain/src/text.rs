use crate::candidate::CandidateProfile;

const MAX_JOB_DESCRIPTION_CHARS: usize = 300;

/// First `max_chars` characters of `raw`, cut on a char boundary.
pub fn truncate_chars(raw: &str, max_chars: usize) -> String {
	raw.chars().take(max_chars).collect()
}

/// Single passage describing a candidate, used as the embedding input at ingestion time.
pub fn build_candidate_text(profile: &CandidateProfile) -> String {
	fn present(value: &Option<String>) -> Option<&str> {
		value.as_deref().map(str::trim).filter(|value| !value.is_empty())
	}

	let mut parts = Vec::new();

	if let Some(top_skills) = present(&profile.top_skills) {
		parts.push(format!("Expert skills: {top_skills}"));
	}
	if let Some(industry) = present(&profile.industry) {
		parts.push(format!("Industry: {industry}"));
	}
	if let Some(years) = profile.years_of_experience.filter(|years| *years > 0) {
		parts.push(format!("{years} years of experience"));
	}
	if !profile.name.trim().is_empty() {
		parts.push(profile.name.trim().to_string());
	}
	if let (Some(title), Some(company)) =
		(present(&profile.current_title), present(&profile.current_company))
	{
		parts.push(format!("{title} at {company}"));
	}

	let location = [present(&profile.city), present(&profile.country)]
		.into_iter()
		.flatten()
		.collect::<Vec<_>>();

	if !location.is_empty() {
		parts.push(format!("Location: {}", location.join(", ")));
	}
	if let Some(headline) = present(&profile.headline) {
		parts.push(headline.to_string());
	}
	if let Some(skills) = present(&profile.skills) {
		parts.push(format!("Skills: {skills}"));
	}
	if let Some(languages) = present(&profile.languages) {
		parts.push(format!("Languages: {languages}"));
	}
	if let Some(education) = present(&profile.education) {
		parts.push(format!("Education: {education}"));
	}
	if let Some(work_history) = present(&profile.work_history) {
		parts.push(format!("Work history: {work_history}"));
	}
	if let Some(description) = present(&profile.job_description) {
		parts.push(truncate_chars(description, MAX_JOB_DESCRIPTION_CHARS));
	}

	parts.join(". ")
}
