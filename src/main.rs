//! Episode Sync - command line entry point
//!
//! ```text
//! episode-sync sync [--source episode-api] [--force] [--json]
//! episode-sync status [--json]
//! episode-sync episodes [--arc 3] [--page 0] [--page-size 50]
//! episode-sync health
//! ```
//!
//! Settings come from `EPISODE_SYNC_*` environment variables; flags given on
//! the command line take precedence. Exits with 1 when a run fails fatally,
//! 0 otherwise (including degraded runs).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use core_runtime::{init_logging, AppConfig, IdRange, LogFormat, LogLevel, SourceKind};
use core_service::{
    ArcCoverage, CoreError, EpisodeWithArc, HealthReport, Page, PageRequest, PersistedRecord,
    StatusReport, SyncService,
};
use core_sync::SyncStats;
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "episode-sync")]
#[command(about = "Reconcile an upstream episode list into a local SQLite store")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the source and write new episodes
    Sync {
        /// Write every valid episode, not only the ones missing from the store
        #[arg(long)]
        force: bool,

        /// Print the final stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store contents and the last run
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List stored episodes, optionally only one arc's
    Episodes {
        /// Only episodes assigned to this arc id
        #[arg(long)]
        arc: Option<i64>,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=1000))]
        page_size: u32,

        #[arg(long)]
        json: bool,
    },

    /// Probe the store and the source
    Health {
        #[arg(long)]
        json: bool,
    },
}

/// Flags layered over the environment configuration
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// SQLite database file, or `:memory:`
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// `filler-list` or `episode-api`
    #[arg(long, global = true)]
    source: Option<SourceKind>,

    /// Scraper page or API base URL
    #[arg(long, global = true)]
    source_url: Option<String>,

    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Fetch these API ids one by one, e.g. `1..1100`
    #[arg(long, global = true)]
    id_range: Option<IdRange>,

    /// Whole-run timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
}

impl ConfigOverrides {
    fn into_config(self) -> Result<AppConfig> {
        let mut builder = AppConfig::builder()
            .apply_env(|key| std::env::var(key).ok())
            .context("Invalid environment configuration")?;

        if let Some(path) = self.database {
            builder = builder.database_path(path);
        }
        if let Some(source) = self.source {
            builder = builder.source(source);
        }
        if let Some(url) = self.source_url {
            builder = builder.source_url(url);
        }
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(limit) = self.concurrency {
            builder = builder.fetch_concurrency(limit);
        }
        if let Some(range) = self.id_range {
            builder = builder.id_range(range);
        }
        if let Some(secs) = self.timeout {
            builder = builder.sync_timeout_secs(secs);
        }
        if let Some(format) = self.log_format {
            builder = builder.log_format(format);
        }
        if let Some(level) = self.log_level {
            builder = builder.log_level(level);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "episode-sync failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.overrides.into_config()?;
    init_logging(config.logging.clone()).context("Failed to initialize logging")?;

    let service = SyncService::bootstrap(config)
        .await
        .context("Failed to start sync service")?;

    let code = match cli.command {
        Command::Sync { force, json } => run_sync(&service, force, json).await?,
        Command::Status { json } => {
            let report = service.status().await.context("Failed to read status")?;
            if json {
                print_json(&report)?;
            } else {
                print_status(&report);
            }
            ExitCode::SUCCESS
        }
        Command::Episodes {
            arc,
            page,
            page_size,
            json,
        } => {
            let request = PageRequest::new(page, page_size);
            match arc {
                Some(arc_id) => {
                    let (arc, episodes) = service
                        .episodes_in_arc(arc_id, request)
                        .await
                        .context("Failed to list arc episodes")?;
                    if json {
                        print_json(&episodes)?;
                    } else {
                        print_arc_episodes(&arc, &episodes);
                    }
                }
                None => {
                    let episodes = service
                        .episodes(request)
                        .await
                        .context("Failed to list episodes")?;
                    if json {
                        print_json(&episodes)?;
                    } else {
                        print_episodes(&episodes);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Command::Health { json } => {
            let report = service.health_check().await;
            if json {
                print_json(&report)?;
            } else {
                print_health(&report);
            }
            if report.healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    service.close().await;
    Ok(code)
}

async fn run_sync(service: &SyncService, force: bool, json: bool) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = service.sync(cancel, force).await;
    watcher.abort();

    match result {
        Ok(stats) => {
            if json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
            if stats.is_degraded() {
                warn!("Run completed with failed batches or unassigned episodes");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(CoreError::SyncFailed(failure)) => {
            if json {
                print_json(&failure.stats)?;
            } else {
                print_stats(&failure.stats);
            }
            eprintln!("error: {}", failure.error);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Sync failed"),
    }
}

/// Cancel the run on Ctrl-C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling sync"),
        _ = terminate => info!("Received terminate signal, cancelling sync"),
    }
    cancel.cancel();
}

// ============================================================================
// Output
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stats(stats: &SyncStats) {
    let outcome = stats.outcome().map(|o| o.as_str()).unwrap_or("unknown");
    let duration = stats
        .duration()
        .map(|d| format!("{:.2}s", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_else(|| "-".to_string());

    println!("Sync {} ({})", outcome, stats.source);
    println!("  episodes seen      {}", stats.episodes_seen());
    println!("  rejected           {}", stats.rejected());
    println!("  already in store   {}", stats.existing_in_store());
    println!("  new                {}", stats.new_found());
    println!("  inserted           {}", stats.inserted());
    println!("  failed             {}", stats.failed());
    println!("  without arc        {}", stats.unassigned());
    println!("  success rate       {:.1}%", stats.success_rate() * 100.0);
    println!("  duration           {}", duration);
    if let Some(message) = stats.error_message() {
        println!("  error              {}", message);
    }
}

fn print_status(report: &StatusReport) {
    println!("Source: {}", report.source);
    if !report.store_healthy {
        println!("Store: unreachable");
        return;
    }

    match (report.min_episode_id, report.max_episode_id) {
        (Some(min), Some(max)) => {
            println!("Episodes: {} (ids {}..={})", report.episode_count, min, max)
        }
        _ => println!("Episodes: {}", report.episode_count),
    }

    println!("Arcs: {}", report.arc_count);
    for arc in &report.arcs {
        println!(
            "  {:>4}  {:<40} {}-{}",
            arc.arc_id, arc.name, arc.start_episode, arc.end_episode
        );
    }
    match &report.fallback_arc {
        Some(arc) => println!("Fallback arc: {} (id {})", arc.name, arc.arc_id),
        None => println!("Fallback arc: missing"),
    }

    match &report.latest_run {
        Some(run) => println!(
            "Last sync: {} from {} ({} inserted of {} new, {}s)",
            run.outcome.as_str(),
            run.source,
            run.inserted,
            run.new_found,
            run.duration_secs()
        ),
        None => println!("Last sync: never"),
    }
}

fn print_page_footer<T>(page: &Page<T>) {
    println!(
        "page {} of {} ({} episodes){}",
        page.page + 1,
        page.total_pages.max(1),
        page.total,
        if page.has_next() { ", --page for more" } else { "" }
    );
}

fn print_episodes(page: &Page<EpisodeWithArc>) {
    for item in &page.items {
        let episode = &item.episode;
        println!(
            "{:>5}  {:<10}  {:<24}  {}",
            episode.id,
            episode
                .release_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            item.arc_name.as_deref().unwrap_or("-"),
            episode.title
        );
    }
    print_page_footer(page);
}

fn print_arc_episodes(arc: &ArcCoverage, page: &Page<PersistedRecord>) {
    println!("{} ({}-{})", arc.name, arc.start_episode, arc.end_episode);
    for episode in &page.items {
        println!("{:>5}  {}", episode.id, episode.title);
    }
    print_page_footer(page);
}

fn print_health(report: &HealthReport) {
    let label = |ok: bool| if ok { "ok" } else { "unavailable" };
    println!("store    {}", label(report.store_healthy));
    println!("source   {} ({})", label(report.source_healthy), report.source);
    println!("overall  {}", label(report.healthy));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "episode-sync",
            "sync",
            "--force",
            "--source",
            "episode-api",
            "--batch-size",
            "50",
            "--id-range",
            "1..20",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Sync { force: true, json: false }));
        assert_eq!(cli.overrides.source, Some(SourceKind::EpisodeApi));
        assert_eq!(cli.overrides.batch_size, Some(50));
        assert_eq!(cli.overrides.id_range, Some(IdRange::new(1, 20)));
    }

    #[test]
    fn test_cli_parses_episode_listing() {
        let cli = Cli::try_parse_from(["episode-sync", "episodes", "--arc", "3", "--page", "2"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Episodes {
                arc: Some(3),
                page: 2,
                page_size: 50,
                json: false
            }
        ));

        assert!(Cli::try_parse_from(["episode-sync", "episodes", "--page-size", "0"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_source() {
        assert!(Cli::try_parse_from(["episode-sync", "sync", "--source", "ftp"]).is_err());
    }

    #[test]
    fn test_overrides_apply_over_defaults() {
        let overrides = ConfigOverrides {
            database: Some(PathBuf::from(":memory:")),
            source: Some(SourceKind::EpisodeApi),
            batch_size: Some(10),
            ..ConfigOverrides::default()
        };

        let config = overrides.into_config().unwrap();
        assert!(config.is_in_memory());
        assert_eq!(config.source, SourceKind::EpisodeApi);
        assert_eq!(config.source_url, SourceKind::EpisodeApi.default_url());
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let overrides = ConfigOverrides {
            batch_size: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(overrides.into_config().is_err());
    }
}
