use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Args;
use portage_config::ServerConfig;
use portage_connections::ConnectionsState;
use portage_core::ConnectionStore;
use portage_jobs::{JobStore, JobsState};
use portage_migration::{MigrationState, PreviewStore};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to (overrides the config file)
    #[arg(long, default_value = "", env = "PORTAGE_LISTEN")]
    pub listen: String,

    /// Path to a YAML config file with pre-seeded connections
    #[arg(long, env = "PORTAGE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.serve())
    }

    async fn serve(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => ServerConfig::load(path, &self.listen)?,
            None => ServerConfig::from_cli(&self.listen),
        };

        let connections = Arc::new(ConnectionStore::new());
        let jobs = Arc::new(JobStore::new());
        let previews = Arc::new(PreviewStore::new());

        // Seed connections from the config file and verify them early so
        // discovery runs before the first migration.
        for seed in config.connections.clone() {
            let conn = connections.create(seed.into_connection());
            info!("Loaded connection: {} ({})", conn.name, conn.base_url());
            if let Err(e) =
                portage_connections::refresh_connection_health(&connections, &conn.id).await
            {
                warn!("health check for {}: {e}", conn.name);
            }
        }

        let connections_state = Arc::new(ConnectionsState {
            connections: connections.clone(),
        });
        let jobs_state = Arc::new(JobsState { jobs: jobs.clone() });
        let migration_state = Arc::new(MigrationState {
            connections,
            jobs,
            previews,
        });

        let api = Router::new()
            .merge(portage_connections::configure_routes(connections_state))
            .merge(portage_jobs::configure_routes(jobs_state.clone()))
            .merge(portage_migration::configure_routes(migration_state));

        // WebSocket routes live outside /api to avoid JSON content-type
        // assumptions in clients.
        let app = Router::new()
            .nest("/api", api)
            .merge(portage_jobs::ws_routes(jobs_state))
            .layer(CorsLayer::permissive());

        let listener = tokio::net::TcpListener::bind(&config.listen).await?;
        info!("Portage listening on {}", config.listen);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
