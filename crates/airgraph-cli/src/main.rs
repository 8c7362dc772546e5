//! airgraph - broadcast schedule and audience collector.

/// Application configuration (TOML).
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use airgraph_api::schedule::ScheduleClient;
use airgraph_api::search::SearchClient;
use airgraph_collector::{Collector, Scheduler};
use airgraph_db::Store;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use crate::config::{AppConfig, resolve_cache_path, resolve_config_path};

/// Environment variable holding the schedule API bearer token.
const API_TOKEN_ENV: &str = "AIRGRAPH_API_TOKEN";

/// Collector wired to the live HTTP collaborators.
type LiveCollector = Collector<ScheduleClient, SearchClient>;

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the schedule-sync and audience-sampling loops until Ctrl-C.
    Serve,
    /// Run one timetable refresh cycle.
    Sync,
    /// Sample the audience of currently airing slots once.
    Sample,
}

/// Loads the config file for `dir`.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved or the file is invalid.
fn load_config(dir: Option<&PathBuf>) -> Result<AppConfig> {
    let path = resolve_config_path(dir)?;
    let config = AppConfig::load(&path)?;
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parses an optional URL setting.
fn parse_url(value: Option<&str>, key: &str) -> Result<Option<Url>> {
    value
        .map(|v| Url::parse(v).with_context(|| format!("invalid {key}: {v}")))
        .transpose()
}

/// Builds a `ScheduleClient` from `[source]` settings.
///
/// # Errors
///
/// Returns an error if a configured URL is invalid or the client fails to build.
fn build_schedule_client(config: &AppConfig) -> Result<ScheduleClient> {
    let source = &config.source;
    let mut builder = ScheduleClient::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .min_interval(Duration::from_millis(source.min_interval_ms));

    if let Some(url) = parse_url(source.base_url.as_deref(), "source.base_url")? {
        builder = builder.base_url(url);
    }
    if let Some(url) = parse_url(source.sitemap_url.as_deref(), "source.sitemap_url")? {
        builder = builder.sitemap_url(url);
    }
    if let Some(token) = source
        .api_token
        .clone()
        .or_else(|| std::env::var(API_TOKEN_ENV).ok())
    {
        builder = builder.api_token(token);
    }

    builder.build().context("failed to build schedule client")
}

/// Builds a `SearchClient` from `[search]` settings.
///
/// # Errors
///
/// Returns an error if the configured URL is invalid or the client fails to build.
fn build_search_client(config: &AppConfig) -> Result<SearchClient> {
    let mut builder = SearchClient::builder();
    if let Some(url) = parse_url(config.search.url.as_deref(), "search.url")? {
        builder = builder.base_url(url);
    }
    if let Some(index) = &config.search.index {
        builder = builder.index(index.clone());
    }
    builder.build().context("failed to build search client")
}

/// Wires store, clients and cache path into a collector.
///
/// # Errors
///
/// Returns an error if a client fails to build or the database cannot be opened.
#[instrument(skip_all)]
fn build_collector(dir: Option<&PathBuf>, config: &AppConfig) -> Result<LiveCollector> {
    let store = Store::open(dir).context("failed to open database")?;
    let cache_path = resolve_cache_path(config.collector.cache_path.as_ref(), dir)?;

    Collector::builder()
        .store(store)
        .source(build_schedule_client(config)?)
        .index(build_search_client(config)?)
        .cache_path(cache_path)
        .build()
}

/// Runs both loops until Ctrl-C.
///
/// # Errors
///
/// Returns an error if setup fails or the signal handler cannot be installed.
#[instrument(skip_all)]
async fn run_serve(dir: Option<&PathBuf>) -> Result<()> {
    let config = load_config(dir)?;
    let collector = build_collector(dir, &config)?;
    if !collector.load_cached_timetable() {
        tracing::info!("Starting without a cached timetable");
    }

    let scheduler = Scheduler::new(
        Arc::new(collector),
        Duration::from_secs(config.collector.sync_interval_secs.max(1)),
    );
    scheduler.start().await;

    let signal = tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C");
    tracing::info!("Shutting down");
    scheduler.stop().await;
    signal
}

/// Runs one refresh cycle.
///
/// # Errors
///
/// Returns an error if setup or the refresh fails.
#[instrument(skip_all)]
async fn run_sync(dir: Option<&PathBuf>) -> Result<()> {
    let config = load_config(dir)?;
    let collector = build_collector(dir, &config)?;

    let report = collector.refresh().await?;
    tracing::info!(
        "Sync complete: {} channels, {} slots ({} reconciled), {} programs inserted ({} already stored), {} indexed",
        report.channels,
        report.slots,
        report.reconciled,
        report.programs.inserted,
        report.programs.skipped,
        report.indexed.indexed,
    );
    if report.indexed.failed > 0 {
        tracing::warn!(failed = report.indexed.failed, "Some slots were not indexed");
    }
    Ok(())
}

/// Samples once against the cached timetable.
///
/// # Errors
///
/// Returns an error if no cached timetable exists or the tick fails.
#[instrument(skip_all)]
async fn run_sample(dir: Option<&PathBuf>) -> Result<()> {
    let config = load_config(dir)?;
    let collector = build_collector(dir, &config)?;
    if !collector.load_cached_timetable() {
        bail!("no cached timetable; run `airgraph sync` first");
    }

    let report = collector.sample_tick().await?;
    match report.aggregate {
        Some(all) => tracing::info!(
            "Sampled {} of {} airing slots: {} comments/min, {} views/min across {} channels",
            report.sampled,
            report.airing,
            all.total_comment_velocity,
            all.total_view_velocity,
            all.per_channel.len(),
        ),
        None => tracing::info!(
            "Sampled {} of {} airing slots; no channel velocities yet",
            report.sampled,
            report.airing,
        ),
    }
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    let dir = cli.dir.as_ref();
    match cli.command {
        Commands::Serve => run_serve(dir).await,
        Commands::Sync => run_sync(dir).await,
        Commands::Sample => run_sample(dir).await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_url_absent() {
        // Arrange & Act
        let url = parse_url(None, "search.url").unwrap();

        // Assert
        assert!(url.is_none());
    }

    #[test]
    fn test_parse_url_invalid() {
        // Arrange & Act
        let err = parse_url(Some("not a url"), "search.url").unwrap_err();

        // Assert
        assert!(err.to_string().contains("invalid search.url"));
    }

    #[test]
    fn test_build_collector_uses_dir() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        // Act
        let collector = build_collector(Some(&path), &AppConfig::default()).unwrap();

        // Assert
        assert!(dir.path().join("airgraph.db").exists());
        assert!(!collector.load_cached_timetable());
    }

    #[test]
    fn test_build_collector_rejects_bad_source_url() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let mut config = AppConfig::default();
        config.source.base_url = Some(String::from("::nope"));

        // Act
        let result = build_collector(Some(&path), &config);

        // Assert
        assert!(result.is_err());
    }
}
