use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

mod auth;
mod handlers;
mod state;
mod storage;

use crate::auth::TokenStore;
use crate::handlers::{
    delete_diagram_handler, get_diagrams_handler, login_handler, register_handler,
    rename_diagram_handler, save_diagram_handler,
};
use crate::state::{AppState, Store};
use crate::storage::{FileStorage, S3Storage, S3StorageConfig, Storage, StorageError};

const FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the database file (file storage).
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Directory with the static frontend bundle.
    #[arg(long)]
    public_dir: Option<PathBuf>,
    /// Store the database in this S3 bucket instead of on disk.
    #[arg(long)]
    s3_bucket: Option<String>,
    #[arg(long)]
    s3_prefix: Option<String>,
    #[arg(long)]
    s3_region: Option<String>,
    #[arg(long)]
    s3_endpoint: Option<String>,
    #[arg(long, default_value_t = false)]
    s3_force_path_style: bool,
}

async fn build_storage(args: &Args) -> Arc<dyn Storage> {
    if let Some(bucket) = args.s3_bucket.clone() {
        let mut config = S3StorageConfig::new(bucket);
        config.prefix = args.s3_prefix.clone();
        config.region = args.s3_region.clone();
        config.endpoint_url = args.s3_endpoint.clone();
        config.force_path_style = args.s3_force_path_style;
        config.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        config.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        return Arc::new(S3Storage::new(config).await);
    }
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"));
    if let Err(error) = tokio::fs::create_dir_all(&data_dir).await {
        error!(path = %data_dir.display(), %error, "failed to create data dir");
    }
    Arc::new(FileStorage::new(data_dir))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let storage = build_storage(&args).await;

    let store = match storage.load().await {
        Ok(data) => {
            info!(
                users = data.users.len(),
                diagrams = data.diagrams.len(),
                "loaded database"
            );
            Store::from_persistent(data)
        }
        Err(StorageError::NotFound) => {
            info!("no existing database, starting empty");
            Store::default()
        }
        Err(error) => {
            warn!(%error, "failed to load database, starting empty");
            Store::default()
        }
    };

    let state = AppState {
        store: Arc::new(tokio::sync::RwLock::new(store)),
        tokens: Arc::new(tokio::sync::RwLock::new(TokenStore::default())),
        storage,
    };
    let flush_state = state.clone();

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));

    let app = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/save_diagram", post(save_diagram_handler))
        .route("/get_diagrams/:username", get(get_diagrams_handler))
        .route("/delete_diagram/:id", delete(delete_diagram_handler))
        .route("/rename_diagram/:id", put(rename_diagram_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .with_state(state);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            let maybe_data = {
                let mut store = flush_state.store.write().await;
                if !store.dirty {
                    None
                } else {
                    store.dirty = false;
                    Some(store.to_persistent())
                }
            };
            if let Some(data) = maybe_data {
                info!(
                    users = data.users.len(),
                    diagrams = data.diagrams.len(),
                    "flushing database"
                );
                flush_state.storage.save(&data).await;
            }
        }
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("drawdeck running at http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");
    axum::serve(listener, app).await.expect("Server crashed");
}
