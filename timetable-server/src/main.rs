use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timetable_server::cache::QueryCache;
use timetable_server::config::AppConfig;
use timetable_server::domain::{Clock, SystemClock};
use timetable_server::refresh::{Refresher, run_daily};
use timetable_server::scrape::{PageSource, TimetableClient};
use timetable_server::staging::Staging;
use timetable_server::store::Store;
use timetable_server::timetable::CachedTimetable;
use timetable_server::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Staging directory must exist before the first cycle
    let staging = Staging::new(&config.data_dir);
    staging.ensure_dir()?;

    let store = Store::connect(&config.database_url).await?;
    store.init_schema().await?;

    // Create cache and sweep it in the background
    let cache_config = config.cache();
    let cache = QueryCache::new(&cache_config, clock.clone());
    cache.spawn_sweeper(cache_config.sweep_interval);

    let client = TimetableClient::new(config.client())?;
    let refresher = Arc::new(
        Refresher::new(
            PageSource::Http(client),
            staging,
            store.clone(),
            config.refresh(),
            clock.clone(),
        )
        .with_cache(cache.clone()),
    );

    if config.refresh_on_start {
        if let Err(e) = refresher.run_once().await {
            warn!(error = %e, "Startup refresh failed, serving existing data");
        }
    }

    tokio::spawn(run_daily(refresher.clone(), config.timezone));

    let timetable = CachedTimetable::new(store.clone(), cache, clock.clone(), config.timezone);
    let state = AppState::new(Arc::new(timetable), refresher, store, clock);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, timezone = %config.timezone, "Timetable server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
