// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod backup;
mod cli;
pub mod config;
mod kubernetes;
mod output;
pub mod progress;

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use backup::actions::builtin_registry;
use backup::{
    BackupProcessor, BackupResult, BackupStatus, CancellationFlag, DirectoryArchive,
};
use cli::Args;
use kubernetes::ClusterClient;
use output::RunSummary;
use progress::{ProgressHandle, ProgressUpdate, create_progress_handle, create_spinner};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("k8sbackup.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(guard);

    let filter = if verbose {
        "k8sbackup=debug"
    } else {
        "k8sbackup=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();

    // Always log to file (~/.k8sbackup/log/k8sbackup.log), to stderr as well with -v
    init_logging(args.verbose);

    let status = run_backup(&args).await?;
    if status != BackupStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_backup(args: &Args) -> Result<BackupStatus> {
    let config = config::Config::load()?;
    let progress = create_progress_handle();
    let mut progress_rx = progress.subscribe();

    // Log lines and the spinner would fight over stderr
    let spinner = (!args.verbose).then(|| create_spinner("Connecting to Kubernetes..."));

    let outcome = {
        let mut work = Box::pin(execute(args, &config, Arc::clone(&progress)));

        loop {
            tokio::select! {
                biased;
                update = progress_rx.recv() => {
                    if let Some(spinner) = &spinner
                        && let Ok(update) = update
                        && let Some(message) = spinner_message(&update, &progress)
                    {
                        spinner.set_message(message);
                    }
                }
                result = &mut work => {
                    break result;
                }
            }
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let (result, location) = outcome?;
    println!("{}", RunSummary::new(&result, &location).format(&args.output));
    Ok(result.status)
}

/// Connect, run the backup and write its metadata
async fn execute(
    args: &Args,
    config: &config::Config,
    progress: ProgressHandle,
) -> Result<(BackupResult, PathBuf)> {
    let mut cluster = ClusterClient::connect(args.context.as_deref(), Some(&progress)).await?;
    if args.discover {
        cluster.discover(Some(&progress)).await?;
    }

    let request = args.to_request(cluster.registry(), config);
    let location = args.output_dir(config)?.join(&request.name);
    let mut archive = DirectoryArchive::create(&location)?;

    let registry = Arc::new(builtin_registry()?);
    let processor = BackupProcessor::new(registry)
        .with_action_timeout(args.action_timeout(config))
        .with_progress(progress);

    let cancel = CancellationFlag::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    info!(
        backup = %request.name,
        context = %cluster.context(),
        location = %location.display(),
        "Writing backup"
    );
    let result = processor.run(&request, &cluster, &mut archive, &cancel).await;
    let metadata = archive.finish(&request, &result)?;
    info!(
        items = archive.written(),
        metadata = %metadata.display(),
        "Backup written"
    );

    Ok((result, archive.root().to_path_buf()))
}

/// First Ctrl-C cancels the run between items, a second one exits immediately
async fn watch_interrupts(cancel: CancellationFlag) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if cancel.is_cancelled() {
            eprintln!("Interrupted again, exiting");
            std::process::exit(130);
        }
        warn!("Interrupted, cancelling backup (press Ctrl-C again to exit now)");
        cancel.cancel();
    }
}

fn spinner_message(update: &ProgressUpdate, progress: &ProgressHandle) -> Option<String> {
    match update {
        ProgressUpdate::Connecting { cluster } => Some(format!("Connecting to {}...", cluster)),
        ProgressUpdate::Discovering { cluster } => {
            Some(format!("Discovering resources on {}...", cluster))
        }
        ProgressUpdate::ListingRoots => Some("Listing resources...".to_string()),
        ProgressUpdate::RootsListed { count } => Some(format!("{} resources selected", count)),
        ProgressUpdate::ItemArchived { resource } => {
            let (done, total) = progress.progress();
            Some(format!("[{}/{}] {}", done, total, resource))
        }
        ProgressUpdate::ItemFailed { .. } | ProgressUpdate::RunFinished { .. } => None,
    }
}
