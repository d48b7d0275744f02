//! Application entry point for the `daypack` service.
//!
//! Startup sequence:
//! - Load `.env` and configuration from the environment
//! - Initialize structured logging/tracing
//! - Build the capability adapters (ephemeris, tides, K-index feed, push)
//! - Spawn the storm watcher on its own timer
//! - Mount all API routes via the `routes` gateway and serve until Ctrl+C
//!
//! # Environment Variables
//! See [`daypack::config::load_from_env`] for the service settings, plus:
//! - `DAYPACK_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `DAYPACK_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use daypack::sources::{
    http_client, FcmAuth, FcmNotifier, HttpEphemeris, LogNotifier, SwpcKpFeed,
    UnconfiguredEphemeris, WorldTides,
};
use daypack::{
    config, AppState, Config, DeviceRegistry, Ephemeris, Notifier, SeveritySource, StormWatcher,
    TideSource, TimelineSources,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let registry = DeviceRegistry::new();
    let timeline = build_timeline_sources(&cfg)?;
    let severity = build_severity_source(&cfg)?;
    let notifier = build_notifier(&cfg)?;

    // Watcher owns its state; the registry is the only thing it shares
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = StormWatcher::new(
        severity.clone(),
        notifier,
        registry.clone(),
        cfg.kp_watch_interval,
    );
    let watcher_task = tokio::spawn(watcher.run(shutdown_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let app = daypack::router(AppState {
        config: cfg,
        timeline,
        severity,
        registry,
    });

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, waiting for storm watcher");
    let _ = shutdown_tx.send(true);
    watcher_task.await?;

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ---

fn build_timeline_sources(cfg: &Config) -> Result<TimelineSources> {
    // ---
    let ephemeris: Arc<dyn Ephemeris> = match &cfg.ephemeris_url {
        Some(url) => {
            let client = http_client(cfg.http_connect_timeout, cfg.ephemeris_timeout)
                .context("Failed to build ephemeris HTTP client")?;
            Arc::new(HttpEphemeris::new(client, url.as_str()))
        }
        None => {
            tracing::warn!("EPHEMERIS_URL not set: sun and moon events will be empty");
            Arc::new(UnconfiguredEphemeris)
        }
    };

    let tides: Option<Arc<dyn TideSource>> = match &cfg.worldtides_api_key {
        Some(key) => {
            let client = http_client(cfg.http_connect_timeout, cfg.tide_timeout)
                .context("Failed to build tide HTTP client")?;
            let tides = WorldTides::new(client, cfg.worldtides_url.as_str(), key.as_str());
            Some(Arc::new(tides))
        }
        None => {
            tracing::info!("WORLDTIDES_API_KEY not set: tides disabled");
            None
        }
    };

    Ok(TimelineSources { ephemeris, tides })
}

fn build_severity_source(cfg: &Config) -> Result<Arc<dyn SeveritySource>> {
    let client = http_client(cfg.http_connect_timeout, cfg.kp_timeout)
        .context("Failed to build K-index HTTP client")?;
    Ok(Arc::new(SwpcKpFeed::new(client, cfg.kp_feed_url.as_str())))
}

fn build_notifier(cfg: &Config) -> Result<Arc<dyn Notifier>> {
    // ---
    if !cfg.push_enabled() {
        tracing::info!("FCM not configured: storm alerts will only be logged");
        return Ok(Arc::new(LogNotifier));
    }

    let client = http_client(cfg.http_connect_timeout, cfg.kp_timeout)
        .context("Failed to build FCM HTTP client")?;
    let key = cfg.firebase_credentials_json.as_deref();
    let project_id = cfg.fcm_project_id.as_deref();
    let token = cfg.fcm_access_token.as_deref();

    let notifier = match (key, project_id, token) {
        (Some(key), _, _) => {
            tracing::info!("FCM push enabled with service-account credentials");
            FcmNotifier::from_service_account(client, &cfg.fcm_url, key, project_id)
                .context("Failed to load FIREBASE_CREDENTIALS_JSON")?
        }
        (None, Some(project), Some(token)) => {
            tracing::warn!("FCM push enabled with a fixed access token; it will not be refreshed");
            let auth = FcmAuth::Static(token.to_string());
            FcmNotifier::new(client, &cfg.fcm_url, project, auth)
        }
        _ => bail!("FCM push enabled without usable credentials"),
    };
    Ok(Arc::new(notifier))
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins when set; otherwise `DAYPACK_LOG_LEVEL` picks the level
///   (default `debug`) with `hyper` and `reqwest` held at `info`
/// - `DAYPACK_SPAN_EVENTS`: `"full"` for ENTER/EXIT/CLOSE, `"enter_exit"`
///   for ENTER/EXIT, anything else for CLOSE only
/// - `FORCE_COLOR=1|true|yes` / `0|false|no` overrides TTY detection
///
/// Call once, before any tracing macro.
fn init_tracing() {
    // ---
    let span_events = match env::var("DAYPACK_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("DAYPACK_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=info,hyper_util=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
