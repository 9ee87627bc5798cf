//! Command handlers.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;
use toolcache_core::{CacheStorage, Config, FetchRequest, NetworkClient, OfflineWorker, WorkerState};

use crate::cli::Cli;
use crate::server;

/// Merge the config file with command line flags. Flags win.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().context("Failed to load config file")?;
    if let Some(ref origin) = cli.origin {
        config.origin = Some(origin.clone());
    }
    if let Some(ref dir) = cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(ref name) = cli.cache_name {
        config.cache_name = Some(name.clone());
    }
    Ok(config)
}

async fn build_worker(config: &Config) -> Result<OfflineWorker> {
    let root = config.cache_dir()?;
    let storage = CacheStorage::new(root.clone())
        .with_context(|| format!("Failed to open cache storage at {}", root.display()))?;
    let network = NetworkClient::new(config.origin())
        .with_context(|| format!("Invalid origin {}", config.origin()))?;

    Ok(OfflineWorker::register(config.worker_settings(), storage, network).await?)
}

pub async fn install(config: &Config) -> Result<()> {
    let mut worker = build_worker(config).await?;
    worker.install().await?;
    eprintln!(
        "Installed {} ({} assets)",
        worker.settings().cache_name,
        worker.settings().manifest.len()
    );
    Ok(())
}

pub async fn activate(config: &Config) -> Result<()> {
    let mut worker = build_worker(config).await?;
    let deleted = worker.activate().await?;
    report_activation(&worker, &deleted);
    Ok(())
}

pub async fn update(config: &Config) -> Result<()> {
    let mut worker = build_worker(config).await?;
    let deleted = worker.update().await?;
    report_activation(&worker, &deleted);
    Ok(())
}

fn report_activation(worker: &OfflineWorker, deleted: &[String]) {
    eprintln!("Activated {}", worker.settings().cache_name);
    for name in deleted {
        eprintln!("  deleted {}", name);
    }
}

pub async fn fetch(config: &Config, path: &str, output: Option<&Path>) -> Result<()> {
    let worker = build_worker(config).await?;
    let url = worker.network().resolve(path)?;
    let outcome = worker.handle_fetch(&FetchRequest::get(url.clone())).await?;

    eprintln!(
        "{} {} {}",
        outcome.source.as_str(),
        outcome.response.status,
        url
    );

    match output {
        Some(file) => std::fs::write(file, &outcome.response.body)
            .with_context(|| format!("Failed to write {}", file.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&outcome.response.body)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub async fn status(config: &Config) -> Result<()> {
    let worker = build_worker(config).await?;
    let current = &worker.settings().cache_name;

    println!("origin:  {}", worker.network().origin());
    println!("storage: {}", worker.storage().root().display());
    println!("worker:  {} ({})", current, worker.state());

    let summaries = worker.storage().summaries().await?;
    if summaries.is_empty() {
        println!("no caches");
        return Ok(());
    }

    for summary in summaries {
        let marker = if &summary.name == current { "*" } else { " " };
        println!(
            "{} {:<32} {:>3} entries {:>10}  created {}",
            marker,
            summary.name,
            summary.entries,
            toolcache_core::utils::format_bytes(summary.total_bytes),
            summary.age_display()
        );
    }
    Ok(())
}

pub async fn serve(config: &Config, listen: &str) -> Result<()> {
    let mut worker = build_worker(config).await?;

    if !worker.state().is_active() {
        // Offline start: keep serving whatever earlier generations cached
        if let Err(e) = worker.update().await {
            warn!(error = %e, "Could not bring cache up to date");
            eprintln!("Warning: {}", e);
        }
    }
    if worker.state() == WorkerState::Redundant {
        eprintln!("Serving from existing caches only");
    }

    server::serve(Arc::new(worker), listen).await
}

pub fn show_config(config: &Config, save: bool) -> Result<()> {
    let effective = Config {
        origin: Some(config.origin().to_string()),
        cache_name: Some(config.worker_settings().cache_name),
        cache_dir: Some(config.cache_dir()?),
        listen: Some(config.listen().to_string()),
    };

    println!("{}", serde_json::to_string_pretty(&effective)?);
    if save {
        effective.save().context("Failed to save config file")?;
        eprintln!("Saved");
    }
    Ok(())
}
