mod api;
mod config;
mod discography;
mod error;
mod musicbrainz;
mod scan;
mod state;
mod utils;
mod walker;

use std::sync::Arc;

use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use common::now_millis;
use library::{Db, ExpectedStore, LibraryStore, SettingsStore, WishlistStore};

use api::api_router;
use config::Config;
use discography::DiscographyService;
use musicbrainz::MusicBrainzClient;
use scan::ScanController;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(Config::from_env());
    info!(
        "crate {} starting (data: {}, music: {})",
        config.version,
        config.data_dir.display(),
        config.music_dir.display()
    );

    let db = Db::open(&config.db_path())?;
    let library = LibraryStore::new(db.clone());
    let expected = ExpectedStore::new(db.clone());
    let wishlist = WishlistStore::new(db.clone());
    let settings = SettingsStore::new(db);

    if library.mark_interrupted_scan(now_millis())? {
        warn!("previous scan was interrupted by a restart");
    }

    let client = MusicBrainzClient::new(&config.user_agent())?;
    let discography = Arc::new(DiscographyService::new(
        library.clone(),
        expected.clone(),
        wishlist.clone(),
        Arc::new(client),
    ));

    let state = AppState {
        config: config.clone(),
        library,
        expected,
        wishlist,
        settings,
        scanner: ScanController::new(),
        discography,
    };

    let app = api_router(state)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", err);
        }
    }

    info!("shutdown signal received");
}
