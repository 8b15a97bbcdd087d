//! AuthorForge Dedup Worker
//!
//! Runs one pass of the author deduplication engine and exits:
//! - `build <import-job-id>`: wait for the import job, then link probable
//!   duplicate authors
//! - `propagate [<rfc3339> | --last <minutes>]`: recompute popularity for
//!   recently resolved duplicate relations
//!
//! `--in-memory` swaps PostgreSQL for empty in-process stores.

mod blocking;
mod builder;
mod propagator;
mod signal;
mod similarity;
mod tasks;

use crate::builder::DuplicateGraphBuilder;
use crate::propagator::PopularityPropagator;
use crate::signal::{shutdown_channel, CompletionSignal, ImportCompletion, ImportJobSignal};
use crate::similarity::SimilarityMatcher;
use authorforge_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{
        AuthorStore, DbPool, DuplicateStore, ImportJobStore, MemoryStore,
        PopularityGenerator, PopularityStore, Repository,
    },
    metrics, VERSION,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dedup-worker",
    about = "AuthorForge author deduplication worker",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run against empty in-process stores instead of PostgreSQL
    #[arg(long, global = true)]
    in_memory: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Wait for an import job, then link probable duplicate authors
    Build { import_job_id: i64 },
    /// Recompute popularity for relations updated after a cutoff
    Propagate {
        /// RFC 3339 cutoff, e.g. 2024-05-01T12:00:00Z
        #[arg(conflicts_with = "last")]
        since: Option<DateTime<Utc>>,
        /// Cutoff this many minutes before now
        #[arg(long)]
        last: Option<u32>,
    },
}

/// Lower bound on `updated_at` for relations to propagate. Without either
/// argument it is `window` before `now`.
fn resolve_cutoff(
    since: Option<DateTime<Utc>>,
    last: Option<u32>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> DateTime<Utc> {
    match (since, last) {
        (Some(at), _) => at,
        (None, Some(minutes)) => now - chrono::Duration::minutes(i64::from(minutes)),
        (None, None) => now - window,
    }
}

/// Store handles the engine runs against
struct Stores {
    authors: Arc<dyn AuthorStore>,
    duplicates: Arc<dyn DuplicateStore>,
    popularity: Arc<dyn PopularityStore>,
    generator: Arc<dyn PopularityGenerator>,
    import_jobs: Arc<dyn ImportJobStore>,
}

impl Stores {
    fn shared<T>(store: Arc<T>) -> Self
    where
        T: AuthorStore
            + DuplicateStore
            + PopularityStore
            + PopularityGenerator
            + ImportJobStore
            + 'static,
    {
        Self {
            authors: store.clone(),
            duplicates: store.clone(),
            popularity: store.clone(),
            generator: store.clone(),
            import_jobs: store,
        }
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn init_metrics(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::PASS_DURATION_BUCKETS,
            )?
            .install()?;
        info!(port, "Prometheus exporter listening");
    }

    metrics::register_metrics();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration; tracing needs it, so report failures afterwards
    let config = AppConfig::load();
    match &config {
        Ok(config) => init_tracing(&config.observability),
        Err(_) => init_tracing(&ObservabilityConfig::default()),
    }
    let config = Arc::new(config.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?);

    info!(
        service = %config.observability.service_name,
        "Starting AuthorForge Dedup Worker v{}",
        VERSION
    );

    init_metrics(config.observability.metrics_port)?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                trigger.trigger();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let stores = if cli.in_memory {
        info!("Using in-memory stores");
        Stores::shared(Arc::new(MemoryStore::new()))
    } else {
        info!("Connecting to database...");
        let db = DbPool::new(&config.database).await?;
        db.ping().await?;
        Stores::shared(Arc::new(Repository::new(db)))
    };

    let finished = match cli.command {
        Command::Build { import_job_id } => {
            let builder = Arc::new(DuplicateGraphBuilder::new(
                stores.authors,
                stores.duplicates,
                SimilarityMatcher::new(config.dedup.similarity_mode),
                config.import_poll_interval(),
            ));
            let signal: Box<dyn CompletionSignal> = if cli.in_memory {
                // Nothing to import into empty stores
                let (completion, rx) = ImportCompletion::channel();
                completion.complete();
                Box::new(rx)
            } else {
                Box::new(ImportJobSignal::new(stores.import_jobs, import_job_id))
            };

            info!(import_job_id, "Waiting for import before building duplicate graph");
            match tasks::spawn_build(builder, signal, shutdown.clone()).await? {
                Some(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    true
                }
                None => false,
            }
        }
        Command::Propagate { since, last } => {
            let since = resolve_cutoff(since, last, Utc::now(), config.propagation_window());
            let propagator = Arc::new(PopularityPropagator::new(
                stores.duplicates,
                stores.popularity,
                stores.generator,
            ));

            match tasks::spawn_propagation(propagator, since).await? {
                Some(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    true
                }
                None => false,
            }
        }
    };

    if !finished && !shutdown.is_requested() {
        std::process::exit(1);
    }

    info!("Dedup worker shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("dedup-worker").chain(args.iter().copied()))
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_build() {
        let cli = parse(&["build", "42"]).unwrap();
        assert_eq!(cli.command, Command::Build { import_job_id: 42 });
        assert!(!cli.in_memory);
    }

    #[test]
    fn test_in_memory_is_global() {
        let cli = parse(&["--in-memory", "propagate", "--last", "15"]).unwrap();
        assert_eq!(cli.command, Command::Propagate { since: None, last: Some(15) });
        assert!(cli.in_memory);

        let cli = parse(&["build", "7", "--in-memory"]).unwrap();
        assert_eq!(cli.command, Command::Build { import_job_id: 7 });
        assert!(cli.in_memory);
    }

    #[test]
    fn test_parse_propagate_timestamp() {
        let cli = parse(&["propagate", "2024-05-01T12:00:00+02:00"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Propagate { since: Some(utc("2024-05-01T10:00:00Z")), last: None }
        );
    }

    #[test]
    fn test_bare_propagate_uses_configured_window() {
        let cli = parse(&["propagate"]).unwrap();
        assert_eq!(cli.command, Command::Propagate { since: None, last: None });

        let config = AppConfig::default();
        let now = Utc::now();
        assert_eq!(
            resolve_cutoff(None, None, now, config.propagation_window()),
            now - chrono::Duration::minutes(60)
        );
        assert_eq!(
            resolve_cutoff(None, Some(5), now, config.propagation_window()),
            now - chrono::Duration::minutes(5)
        );
        let at = utc("2024-05-01T10:00:00Z");
        assert_eq!(resolve_cutoff(Some(at), None, now, config.propagation_window()), at);
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["merge"]).is_err());
        assert!(parse(&["build"]).is_err());
        assert!(parse(&["build", "abc"]).is_err());
        assert!(parse(&["propagate", "--last", "-3"]).is_err());
        assert!(parse(&["propagate", "yesterday"]).is_err());
        assert!(parse(&["propagate", "2024-05-01T10:00:00Z", "--last", "5"]).is_err());
    }
}
