mod error;

pub use error::{Error, Result};

use std::{
	collections::HashSet, env, future::Future, str::FromStr, sync::Mutex, thread, time::Duration,
};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor, PgPool,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// Minimal copy of the recruiting schema the candidate query reads from.
pub const SOURCE_SCHEMA: &str = "\
CREATE TABLE countries (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE cities (id serial PRIMARY KEY, name text NOT NULL, country_id int REFERENCES countries(id));
CREATE TABLE companies (id serial PRIMARY KEY, name text NOT NULL, industry text);
CREATE TABLE candidates (
	id uuid PRIMARY KEY,
	first_name text,
	last_name text,
	headline text,
	email text,
	years_of_experience int,
	city_id int REFERENCES cities(id),
	created_at timestamptz NOT NULL DEFAULT now()
);
CREATE TABLE skills (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE candidate_skills (
	candidate_id uuid REFERENCES candidates(id),
	skill_id int REFERENCES skills(id),
	proficiency_level text
);
CREATE TABLE work_experience (
	candidate_id uuid REFERENCES candidates(id),
	company_id int REFERENCES companies(id),
	job_title text NOT NULL,
	description text,
	start_date date,
	is_current boolean NOT NULL DEFAULT false
);
CREATE TABLE degrees (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE fields_of_study (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE institutions (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE education (
	candidate_id uuid REFERENCES candidates(id),
	degree_id int REFERENCES degrees(id),
	field_of_study_id int REFERENCES fields_of_study(id),
	institution_id int REFERENCES institutions(id),
	graduation_year int
);
CREATE TABLE languages (id serial PRIMARY KEY, name text NOT NULL);
CREATE TABLE proficiency_levels (id serial PRIMARY KEY, name text NOT NULL, rank int NOT NULL);
CREATE TABLE candidate_languages (
	candidate_id uuid REFERENCES candidates(id),
	language_id int REFERENCES languages(id),
	proficiency_level_id int REFERENCES proficiency_levels(id)
)";

pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	cleaned: bool,
	collections: Mutex<HashSet<String>>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options: PgConnectOptions = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse IQ_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("iq_test_{}", Uuid::new_v4().simple());
		let create_sql = format!(r#"CREATE DATABASE "{}""#, name);

		admin_conn
			.execute(create_sql.as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.clone().database(&name).to_url_lossy().to_string();

		Ok(Self {
			name,
			dsn,
			admin_options,
			cleaned: false,
			collections: Mutex::new(HashSet::new()),
		})
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);
		let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		tracked.insert(collection.clone());

		collection
	}

	/// Creates the source tables so tests can seed candidates.
	pub async fn apply_source_schema(&self, pool: &PgPool) -> Result<()> {
		for statement in SOURCE_SCHEMA.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(pool).await?;
		}

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		let collections = {
			let tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

			tracked.iter().cloned().collect::<Vec<_>>()
		};
		let db_result = cleanup_database(&self.name, &self.admin_options).await;
		let qdrant_result = cleanup_qdrant_collections(&collections).await;

		db_result?;
		qdrant_result?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let collections = self
			.collections
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.cloned()
			.collect::<Vec<_>>();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(cleanup_qdrant_collections(&collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
			if let Err(err) = runtime.block_on(cleanup_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("IQ_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("IQ_QDRANT_URL").ok()
}

pub async fn with_test_db<F, Fut, T>(base_dsn: &str, f: F) -> Result<T>
where
	F: FnOnce(&TestDatabase) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let db = TestDatabase::new(base_dsn).await?;
	let result = f(&db).await;
	let mut db = db;

	if let Err(err) = db.cleanup_inner().await {
		eprintln!("Test database cleanup warning: {err}.");

		if result.is_ok() {
			return Err(err);
		}
	}

	result
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => {
				last_err = Some(err);
			},
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn cleanup_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await.map_err(|err| {
		Error::Message(format!("Failed to connect to admin database for cleanup: {err}."))
	})?;
	let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}""#, name);
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.execute(&mut conn)
	.await;

	sqlx::query(drop_sql.as_str())
		.execute(&mut conn)
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}

async fn cleanup_qdrant_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(qdrant_url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant cleanup; set IQ_QDRANT_URL to delete test collections.");

		return Ok(());
	};
	let client = Qdrant::from_url(&qdrant_url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;

	for collection in collections {
		let exists = time::timeout(
			Duration::from_secs(10),
			client.collection_exists(collection.clone()),
		)
		.await
		.map_err(|_| Error::Message("Qdrant collection_exists timed out.".to_string()))??;

		if !exists {
			continue;
		}

		time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
			.await
			.map_err(|_| {
				Error::Message(format!("Timed out deleting Qdrant collection {collection:?}."))
			})??;
	}

	Ok(())
}
