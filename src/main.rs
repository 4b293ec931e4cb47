use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use diskover_dispatcher::auth::{resolve_auth_token, verify_auth_token};
use diskover_dispatcher::broker::client::HttpJobBroker;
use diskover_dispatcher::config::{CrawlConfig, Cli};
use diskover_dispatcher::index::client::HttpSearchIndexClient;
use diskover_dispatcher::run::{self, RuntimeContext};
use diskover_dispatcher::telemetry::init_telemetry;
use diskover_dispatcher::walker::pool::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.log_level())?;

    let run_args = cli.to_run_args();

    let (crawl_config, config_path) = match CrawlConfig::from_default_locations()? {
        Some((config, path)) => (config, Some(path)),
        None => {
            anyhow::bail!("config-missing: no diskover.toml found (checked CONFIG_PATH, ./diskover.toml, and the user config directory)");
        }
    };
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "loaded configuration");
    }

    if let Some(endpoint) = crawl_config.crawlapi.url.as_deref() {
        if let Some(token) = resolve_auth_token(None) {
            verify_auth_token(endpoint, &token).context("auth-token-invalid")?;
        }
    }

    let index_client = HttpSearchIndexClient::new(
        crawl_config.searchindex.url.clone(),
        Duration::from_secs(crawl_config.searchindex.request_timeout_secs),
    )?;
    let broker = HttpJobBroker::new(
        crawl_config.broker.url.clone(),
        Duration::from_secs(30),
    )?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc_handler(move || cancel.cancel());
    }

    let ctx = RuntimeContext {
        index_client: &index_client,
        broker: &broker,
        crawl_config: &crawl_config,
        cancel,
    };

    match run::run(&ctx, &run_args) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Registers a real SIGINT handler: flips the cancellation token checked at
/// each blocking wait point, then prints the same message and exits 0 that
/// `diskover.py` used to do from its `except KeyboardInterrupt` blocks,
/// instead of letting the default disposition terminate with code 130.
fn ctrlc_handler<F: Fn() + Send + 'static>(on_interrupt: F) {
    ctrlc::set_handler(move || {
        on_interrupt();
        println!("Ctrl-c keyboard interrupt, shutting down...");
        std::process::exit(0);
    })
    .expect("failed to register Ctrl-C handler");
}
