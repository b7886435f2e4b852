//! Cache warmer
//!
//! Primes the cache from a declarative, priority-sorted query list. Each
//! query is probed through the manager; on a miss the fetcher collaborator
//! produces the response and the warmer stores it through the normal set
//! path. Per-query failures are logged and counted, never fatal.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};

use respcache_core::{ChatMessage, GenerationParams, Provider, ResponseFetcher, Result};

use crate::manager::ResponseCacheManager;

/// A single warmup query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupQuery {
    pub prompt: String,
    pub model: String,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<GenerationParams>,
    /// Higher priorities warm first
    pub priority: u32,
}

/// Outcome counts of one warm pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Queries fetched and stored
    pub warmed: u64,
    /// Queries already cached
    pub skipped: u64,
    /// Queries whose fetch failed
    pub failed: u64,
}

/// Warmer tuning
#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Queries processed concurrently within one batch
    pub batch_size: usize,
    /// Seconds between background warm passes
    pub interval: u64,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            interval: 3600,
        }
    }
}

enum WarmOutcome {
    Warmed,
    Skipped,
    Failed,
}

/// Primes the cache from warmup queries using a fetch collaborator
pub struct CacheWarmer {
    manager: Arc<ResponseCacheManager>,
    fetcher: Arc<dyn ResponseFetcher>,
    config: WarmerConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CacheWarmer {
    pub fn new(manager: Arc<ResponseCacheManager>, fetcher: Arc<dyn ResponseFetcher>) -> Self {
        Self::with_config(manager, fetcher, WarmerConfig::default())
    }

    pub fn with_config(
        manager: Arc<ResponseCacheManager>,
        fetcher: Arc<dyn ResponseFetcher>,
        config: WarmerConfig,
    ) -> Self {
        Self {
            manager,
            fetcher,
            config,
            task: Mutex::new(None),
        }
    }

    /// Run one warm pass over the queries, highest priority first.
    ///
    /// Batches of `batch_size` run concurrently; batches themselves run
    /// sequentially.
    pub async fn warm(&self, queries: &[WarmupQuery]) -> WarmupReport {
        let mut sorted: Vec<WarmupQuery> = queries.to_vec();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut report = WarmupReport::default();
        for batch in sorted.chunks(self.config.batch_size.max(1)) {
            let mut tasks = JoinSet::new();
            for query in batch.iter().cloned() {
                let manager = self.manager.clone();
                let fetcher = self.fetcher.clone();
                tasks.spawn(async move { warm_one(manager, fetcher, query).await });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(WarmOutcome::Warmed) => report.warmed += 1,
                    Ok(WarmOutcome::Skipped) => report.skipped += 1,
                    Ok(WarmOutcome::Failed) => report.failed += 1,
                    Err(err) => {
                        tracing::warn!(target: "respcache", error = %err, "warmup task panicked");
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }

    /// Re-warm at the configured interval until `stop` (or drop).
    ///
    /// The first pass runs immediately.
    pub fn start_background(self: &Arc<Self>, queries: Vec<WarmupQuery>) {
        let weak = Arc::downgrade(self);
        let interval_secs = self.config.interval.max(1);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                let Some(warmer) = weak.upgrade() else { break };
                let report = warmer.warm(&queries).await;
                tracing::debug!(
                    target: "respcache",
                    warmed = report.warmed,
                    skipped = report.skipped,
                    failed = report.failed,
                    "background warm pass finished"
                );
            }
        });
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background mode
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Snapshot the managed cache to `path`
    pub async fn export_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        self.manager.export_cache(path).await
    }

    /// Replay a snapshot into the managed cache
    pub async fn import_cache(&self, path: impl AsRef<Path>) -> Result<u64> {
        self.manager.import_cache(path).await
    }
}

async fn warm_one(
    manager: Arc<ResponseCacheManager>,
    fetcher: Arc<dyn ResponseFetcher>,
    query: WarmupQuery,
) -> WarmOutcome {
    let messages = vec![ChatMessage::user(query.prompt.clone())];
    let lookup = manager
        .get(
            &messages,
            &query.model,
            query.provider,
            query.parameters.as_ref(),
            false,
        )
        .await;
    if lookup.hit {
        return WarmOutcome::Skipped;
    }

    match fetcher
        .fetch(&messages, &query.model, query.parameters.as_ref())
        .await
    {
        Ok(response) => {
            manager
                .set(
                    &messages,
                    &query.model,
                    query.provider,
                    response,
                    query.parameters.as_ref(),
                    None,
                )
                .await;
            WarmOutcome::Warmed
        }
        Err(err) => {
            tracing::warn!(
                target: "respcache",
                model = %query.model,
                error = %err,
                "warmup fetch failed"
            );
            WarmOutcome::Failed
        }
    }
}
