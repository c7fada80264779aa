pub mod config;

use std::{process::ExitCode, sync::Arc};

use config::WatchpostConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchpost_capture::FfmpegCapture;
use watchpost_core::{error::Result, AlertState, FrameCache};
use watchpost_fleet::{AlertDispatcher, CameraRegistry, FleetContext};
use watchpost_remote::{ApiClient, HttpDetector, HttpObjectStore};
use watchpost_server::{AppState, Server};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchpost=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        warn!("at most one parameter, the config file, is expected.");
        warn!("got {}", args.join(","));
        return ExitCode::FAILURE;
    }

    let config = match WatchpostConfig::load(args.get(1).map(|o| o.as_str())) {
        Ok(config) => config,
        Err(err) => {
            error!("Error starting watchpost. Failed to load config: {}", err);
            return ExitCode::FAILURE;
        }
    };

    info!("watchpost starting up!");
    match run(config).await {
        Ok(()) => {
            info!("watchpost shut down!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("watchpost exited with an error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: WatchpostConfig) -> Result<()> {
    let timeout = config.request_timeout();
    let settings = config.worker_settings()?;
    let target = settings.target_class;

    let api = Arc::new(ApiClient::new(&config.api_url, timeout)?);
    let store = HttpObjectStore::new(config.object_store_settings()?, timeout)?;
    let frames = FrameCache::new();

    let ctx = Arc::new(FleetContext {
        capture: Arc::new(FfmpegCapture::new(config.ffmpeg_settings())),
        detector: Arc::new(HttpDetector::new(&config.detector_url, timeout)?),
        dispatcher: AlertDispatcher::new(
            Arc::new(store),
            api.clone(),
            &config.object_store_bucket,
            config.event_type,
        ),
        frames: frames.clone(),
        alerts: AlertState::new(),
        settings,
    });
    let registry = CameraRegistry::new(api, ctx);

    let state = AppState::new(frames, registry.status(), config.stream_interval())?;
    let server = Server::bind(config.bind_addr()?, state)?;

    info!(
        "api {}, detector {}, alerting on '{}' with a {}s cooldown",
        config.api_url, config.detector_url, target, config.alert_cooldown_secs
    );

    let shutdown = CancellationToken::new();
    let mut server_handle = server.serve(shutdown.clone());
    let registry_handle = registry.spawn(
        config.sync_interval(),
        shutdown.clone(),
        config.shutdown_grace(),
    );

    let server_running = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("ctrl-c received, shutting down ...");
            true
        }
        _ = &mut server_handle => {
            warn!("http server stopped unexpectedly, shutting down ...");
            false
        }
    };
    shutdown.cancel();

    if let Err(err) = registry_handle.await {
        warn!("camera registry task failed: {}", err);
    }
    let grace = config.shutdown_grace();
    if server_running && tokio::time::timeout(grace, server_handle).await.is_err() {
        warn!("http server did not stop within {:?}", grace);
    }
    Ok(())
}
