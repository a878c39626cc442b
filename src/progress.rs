// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for backup runs
//!
//! The backup processor reports what it is doing through a broadcast channel,
//! which the CLI turns into spinner updates.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// Connecting to a cluster
    Connecting { cluster: String },
    /// Discovering resource kinds on a cluster
    Discovering { cluster: String },
    /// Listing the items selected by the backup request
    ListingRoots,
    /// Root items found
    RootsListed { count: usize },
    /// An item was written to the archive
    ItemArchived { resource: String },
    /// A soft error was recorded for an item
    ItemFailed { resource: String, phase: String },
    /// The run ended
    RunFinished {
        status: String,
        items: usize,
        errors: usize,
        elapsed_ms: u64,
    },
}

/// Progress reporter shared by the processor and the CLI
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    /// Items written to the archive so far
    items_done: AtomicUsize,
    /// Items enqueued so far (grows as references are discovered)
    items_total: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            items_done: AtomicUsize::new(0),
            items_total: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn connecting(&self, cluster: &str) {
        let _ = self.sender.send(ProgressUpdate::Connecting {
            cluster: cluster.to_string(),
        });
    }

    pub fn discovering(&self, cluster: &str) {
        let _ = self.sender.send(ProgressUpdate::Discovering {
            cluster: cluster.to_string(),
        });
    }

    /// Report run start; resets counters
    pub fn listing_roots(&self) {
        self.items_done.store(0, Ordering::SeqCst);
        self.items_total.store(0, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::ListingRoots);
    }

    pub fn roots_listed(&self, count: usize) {
        let _ = self.sender.send(ProgressUpdate::RootsListed { count });
    }

    /// Count a newly enqueued item
    pub fn item_enqueued(&self) {
        self.items_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn item_archived(&self, resource: &str) {
        self.items_done.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::ItemArchived {
            resource: resource.to_string(),
        });
    }

    pub fn item_failed(&self, resource: &str, phase: &str) {
        let _ = self.sender.send(ProgressUpdate::ItemFailed {
            resource: resource.to_string(),
            phase: phase.to_string(),
        });
    }

    pub fn run_finished(&self, status: &str, items: usize, errors: usize, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::RunFinished {
            status: status.to_string(),
            items,
            errors,
            elapsed_ms,
        });
    }

    /// Get current progress (archived/enqueued)
    pub fn progress(&self) -> (usize, usize) {
        (
            self.items_done.load(Ordering::SeqCst),
            self.items_total.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reporter_new() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.progress(), (0, 0));
    }

    #[test]
    fn test_counters() {
        let reporter = ProgressReporter::default();
        reporter.listing_roots();
        reporter.item_enqueued();
        reporter.item_enqueued();
        reporter.item_enqueued();
        assert_eq!(reporter.progress(), (0, 3));

        reporter.item_archived("pods/default/a");
        assert_eq!(reporter.progress(), (1, 3));

        reporter.item_failed("pods/default/b", "fetch");
        assert_eq!(reporter.progress(), (1, 3));
    }

    #[test]
    fn test_listing_roots_resets_counters() {
        let reporter = ProgressReporter::new();
        reporter.item_enqueued();
        reporter.item_archived("pods/default/a");
        assert_eq!(reporter.progress(), (1, 1));

        reporter.listing_roots();
        assert_eq!(reporter.progress(), (0, 0));
    }

    #[test]
    fn test_subscribe_receives_updates() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();

        reporter.roots_listed(12);

        match receiver.try_recv().unwrap() {
            ProgressUpdate::RootsListed { count } => assert_eq!(count, 12),
            other => panic!("Expected RootsListed update, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_updates() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();

        reporter.connecting("prod");
        reporter.discovering("prod");
        reporter.listing_roots();
        reporter.roots_listed(1);
        reporter.item_archived("pods/default/a");
        reporter.item_failed("pods/default/b", "fetch");
        reporter.run_finished("PartiallyFailed", 1, 1, 10);

        let updates: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        assert_eq!(updates.len(), 7);

        assert!(matches!(updates[0], ProgressUpdate::Connecting { .. }));
        assert!(matches!(updates[1], ProgressUpdate::Discovering { .. }));
        assert!(matches!(updates[2], ProgressUpdate::ListingRoots));
        assert!(matches!(updates[3], ProgressUpdate::RootsListed { .. }));
        assert!(matches!(updates[4], ProgressUpdate::ItemArchived { .. }));
        assert!(matches!(updates[5], ProgressUpdate::ItemFailed { .. }));
        assert!(matches!(updates[6], ProgressUpdate::RunFinished { .. }));
    }

    #[test]
    fn test_create_progress_handle() {
        let handle = create_progress_handle();
        assert_eq!(handle.progress(), (0, 0));
    }
}
