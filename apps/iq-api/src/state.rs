use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use iq_service::IqService;
use iq_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<IqService>,
	/// Cancelled once the server starts shutting down. Each request works on a child token.
	pub shutdown: CancellationToken,
}
impl AppState {
	pub async fn new(config: iq_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		Ok(Self::from_service(IqService::new(config, db, qdrant)))
	}

	pub fn from_service(service: IqService) -> Self {
		Self { service: Arc::new(service), shutdown: CancellationToken::new() }
	}
}
