/// One flattened row per candidate. Every one-to-many relation is aggregated in its own CTE so the
/// final select stays a chain of left joins.
pub const FETCH_ALL_CANDIDATES: &str = "\
WITH
	all_skills AS (
		SELECT
			cs.candidate_id,
			string_agg(DISTINCT s.name, ', ' ORDER BY s.name) AS skills,
			string_agg(DISTINCT s.name, ', ' ORDER BY s.name)
				FILTER (WHERE cs.proficiency_level = 'Expert') AS top_skills
		FROM candidate_skills cs
		JOIN skills s ON s.id = cs.skill_id
		GROUP BY cs.candidate_id
	),
	work_hist AS (
		SELECT
			we.candidate_id,
			string_agg(we.job_title || ' at ' || comp.name, ' | ' ORDER BY we.start_date DESC)
				AS work_history
		FROM work_experience we
		JOIN companies comp ON comp.id = we.company_id
		GROUP BY we.candidate_id
	),
	edu_agg AS (
		SELECT
			e.candidate_id,
			string_agg(
				d.name || ' in ' || fos.name || ' at ' || inst.name,
				' | ' ORDER BY e.graduation_year DESC NULLS LAST
			) AS education
		FROM education e
		JOIN degrees d ON d.id = e.degree_id
		JOIN fields_of_study fos ON fos.id = e.field_of_study_id
		JOIN institutions inst ON inst.id = e.institution_id
		GROUP BY e.candidate_id
	),
	lang_agg AS (
		SELECT
			cl.candidate_id,
			string_agg(l.name || ' (' || pl.name || ')', ', ' ORDER BY pl.rank DESC) AS languages
		FROM candidate_languages cl
		JOIN languages l ON l.id = cl.language_id
		JOIN proficiency_levels pl ON pl.id = cl.proficiency_level_id
		GROUP BY cl.candidate_id
	),
	current_job AS (
		SELECT DISTINCT ON (we.candidate_id)
			we.candidate_id,
			we.job_title,
			we.description,
			comp.name AS company_name,
			comp.industry
		FROM work_experience we
		JOIN companies comp ON comp.id = we.company_id
		WHERE we.is_current = true
		ORDER BY we.candidate_id, we.start_date DESC
	)
SELECT
	c.id::text AS id,
	c.first_name || ' ' || c.last_name AS name,
	c.headline,
	c.email,
	c.years_of_experience::int4 AS years_of_experience,
	ci.name AS city,
	co.name AS country,
	cj.job_title AS current_title,
	cj.company_name AS current_company,
	cj.industry,
	cj.description AS job_description,
	wh.work_history,
	sk.skills,
	sk.top_skills,
	ed.education,
	la.languages
FROM candidates c
LEFT JOIN cities ci ON ci.id = c.city_id
LEFT JOIN countries co ON co.id = ci.country_id
LEFT JOIN current_job cj ON cj.candidate_id = c.id
LEFT JOIN all_skills sk ON sk.candidate_id = c.id
LEFT JOIN work_hist wh ON wh.candidate_id = c.id
LEFT JOIN edu_agg ed ON ed.candidate_id = c.id
LEFT JOIN lang_agg la ON la.candidate_id = c.id
ORDER BY c.created_at DESC";

pub const COUNT_CANDIDATES: &str = "SELECT COUNT(*) FROM candidates";
