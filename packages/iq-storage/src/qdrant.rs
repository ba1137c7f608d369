use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
		Query, QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, Value, VectorParamsBuilder,
		value::Kind,
	},
};
use uuid::Uuid;

use crate::{Error, Result};
use iq_domain::{CandidateAttributes, CandidateMatch, CandidateProfile, SearchFilter};

const CANDIDATE_ID_KEY: &str = "candidate_id";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &iq_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the cosine collection when it does not exist yet.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine));

		self.client.create_collection(builder).await?;

		Ok(())
	}

	pub async fn count(&self) -> Result<u64> {
		let response =
			self.client.count(CountPointsBuilder::new(self.collection.clone()).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	/// Nearest neighbours of `vector`, most similar first, with scores mapped into `[0, 1]`.
	pub async fn search(
		&self,
		vector: &[f32],
		top_k: u32,
		filter: Option<&SearchFilter>,
	) -> Result<Vec<CandidateMatch>> {
		if top_k == 0 {
			return Ok(Vec::new());
		}
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(u64::from(top_k))
			.with_payload(true);

		if let Some(filter) = filter.filter(|filter| !filter.is_empty()) {
			search = search.filter(build_filter(filter));
		}

		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(scored_point_to_match).collect())
	}

	/// Inserts or replaces one point per profile. Point ids are derived from candidate ids, so
	/// re-ingesting a candidate overwrites its previous vector.
	pub async fn upsert(&self, profiles: &[CandidateProfile], vectors: Vec<Vec<f32>>) -> Result<()> {
		if profiles.len() != vectors.len() {
			return Err(Error::InvalidArgument(format!(
				"Got {} vectors for {} candidates.",
				vectors.len(),
				profiles.len()
			)));
		}
		if profiles.is_empty() {
			return Ok(());
		}

		let points = profiles
			.iter()
			.zip(vectors)
			.map(|(profile, vector)| {
				PointStruct::new(
					point_id(&profile.id).to_string(),
					vector,
					build_payload(profile),
				)
			})
			.collect::<Vec<_>>();

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	/// Drops every stored vector and leaves an empty collection behind.
	pub async fn wipe(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			self.client.delete_collection(self.collection.clone()).await?;
		}

		self.ensure_collection().await
	}
}

pub fn point_id(candidate_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, candidate_id.as_bytes())
}

/// Maps cosine similarity in `[-1, 1]` onto `[0, 1]`, rounded to four decimals.
pub fn normalize_score(cosine: f32) -> f32 {
	let scaled = ((cosine + 1.0) / 2.0).clamp(0.0, 1.0);

	(scaled * 10_000.0).round() / 10_000.0
}

fn build_filter(filter: &SearchFilter) -> Filter {
	Filter::must(
		filter
			.conditions()
			.into_iter()
			.map(|(field, value)| Condition::matches(field, value.to_string())),
	)
}

fn build_payload(profile: &CandidateProfile) -> Payload {
	let attributes = CandidateAttributes::from_profile(profile);
	let mut payload = Payload::new();

	payload.insert(CANDIDATE_ID_KEY, profile.id.clone());
	payload.insert("name", attributes.name);
	payload.insert("headline", attributes.headline);
	payload.insert("current_title", attributes.current_title);
	payload.insert("current_company", attributes.current_company);
	payload.insert("industry", attributes.industry);
	payload.insert("city", attributes.city);
	payload.insert("country", attributes.country);
	payload.insert("years_of_experience", Value::from(attributes.years_of_experience));
	payload.insert("skills", attributes.skills);
	payload.insert("top_skills", attributes.top_skills);
	payload.insert("education", attributes.education);
	payload.insert("languages", attributes.languages);
	payload.insert("email", attributes.email);

	payload
}

fn scored_point_to_match(point: &ScoredPoint) -> Option<CandidateMatch> {
	let payload = &point.payload;
	let id = payload_string(payload, CANDIDATE_ID_KEY)?;
	let attributes = CandidateAttributes {
		name: payload_string(payload, "name").unwrap_or_default(),
		headline: payload_string(payload, "headline").unwrap_or_default(),
		current_title: payload_string(payload, "current_title").unwrap_or_default(),
		current_company: payload_string(payload, "current_company").unwrap_or_default(),
		industry: payload_string(payload, "industry").unwrap_or_default(),
		city: payload_string(payload, "city").unwrap_or_default(),
		country: payload_string(payload, "country").unwrap_or_default(),
		years_of_experience: payload_i64(payload, "years_of_experience").unwrap_or(0),
		skills: payload_string(payload, "skills").unwrap_or_default(),
		top_skills: payload_string(payload, "top_skills").unwrap_or_default(),
		education: payload_string(payload, "education").unwrap_or_default(),
		languages: payload_string(payload, "languages").unwrap_or_default(),
		email: payload_string(payload, "email").unwrap_or_default(),
	};

	Some(CandidateMatch::new(id, normalize_score(point.score), attributes))
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}
