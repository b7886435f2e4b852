//! Integration tests for ResponseCacheManager

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::{is_valid_key, CacheBackend, CacheEntry, EventBus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn small_config(max_entries: usize) -> CacheConfig {
        CacheConfig {
            max_entries,
            default_ttl: 0,
            ..Default::default()
        }
    }

    async fn manager(config: CacheConfig) -> ResponseCacheManager {
        ResponseCacheManager::new(config).await.unwrap()
    }

    fn user(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(text)]
    }

    #[tokio::test]
    async fn test_basic_hit() {
        let cache = manager(CacheConfig::default()).await;
        let messages = user("Hello, world!");

        cache
            .set(
                &messages,
                "gpt-3.5-turbo",
                Provider::OpenAi,
                "Hi there!".into(),
                None,
                None,
            )
            .await;

        let lookup = cache
            .get(&messages, "gpt-3.5-turbo", Provider::OpenAi, None, false)
            .await;
        assert!(lookup.hit);
        assert_eq!(lookup.data.unwrap().content, "Hi there!");
        let entry = lookup.entry.unwrap();
        assert!(is_valid_key(&entry.key));
        assert_eq!(entry.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_miss_before_set() {
        let cache = manager(CacheConfig::default()).await;
        let lookup = cache
            .get(&user("nothing here"), "gpt-4o", Provider::OpenAi, None, false)
            .await;
        assert!(!lookup.hit);
        assert!(lookup.data.is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction_order() {
        let cache = manager(small_config(3)).await;
        for m in ["M1", "M2", "M3"] {
            cache
                .set(&user(m), "m", Provider::OpenAi, format!("r:{m}").into(), None, None)
                .await;
        }
        // Promote M1, then push M4: M2 is the LRU victim
        assert!(cache.get(&user("M1"), "m", Provider::OpenAi, None, false).await.hit);
        cache
            .set(&user("M4"), "m", Provider::OpenAi, "r:M4".into(), None, None)
            .await;

        assert_eq!(cache.size().await, 3);
        assert!(cache.get(&user("M1"), "m", Provider::OpenAi, None, false).await.hit);
        assert!(!cache.get(&user("M2"), "m", Provider::OpenAi, None, false).await.hit);
        assert!(cache.get(&user("M3"), "m", Provider::OpenAi, None, false).await.hit);
        assert!(cache.get(&user("M4"), "m", Provider::OpenAi, None, false).await.hit);
    }

    #[tokio::test]
    async fn test_default_ttl_expiry() {
        let config = CacheConfig {
            default_ttl: 1,
            ..Default::default()
        };
        let cache = manager(config).await;
        let messages = user("short lived");

        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, None)
            .await;
        assert!(cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);
    }

    #[tokio::test]
    async fn test_per_entry_ttl_overrides_default() {
        let cache = manager(small_config(16)).await;
        let messages = user("explicit ttl");

        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, Some(1))
            .await;
        assert!(cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let cache = manager(small_config(16)).await;
        let messages = user("immortal");

        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, Some(0))
            .await;
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);
    }

    #[tokio::test]
    async fn test_whitespace_normalization_hit() {
        let cache = manager(CacheConfig::default()).await;
        cache
            .set(
                &user("Hello,   world!"),
                "m",
                Provider::OpenAi,
                "r".into(),
                None,
                None,
            )
            .await;

        let lookup = cache
            .get(&user("Hello, world!"), "m", Provider::OpenAi, None, false)
            .await;
        assert!(lookup.hit);
    }

    #[tokio::test]
    async fn test_cross_provider_distinctness() {
        let cache = manager(CacheConfig::default()).await;
        let messages = user("same prompt");

        cache
            .set(&messages, "gpt-3.5-turbo", Provider::OpenAi, "a".into(), None, None)
            .await;
        cache
            .set(&messages, "claude-3-sonnet", Provider::Anthropic, "b".into(), None, None)
            .await;

        assert_eq!(cache.size().await, 2);
    }

    #[tokio::test]
    async fn test_parameter_sensitivity() {
        let cache = manager(CacheConfig::default()).await;
        let messages = user("same prompt");
        let cold = GenerationParams::with_temperature(0.0);
        let hot = GenerationParams::with_temperature(1.0);

        cache
            .set(&messages, "m", Provider::OpenAi, "cold".into(), Some(&cold), None)
            .await;
        let lookup = cache
            .get(&messages, "m", Provider::OpenAi, Some(&hot), false)
            .await;
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn test_bypass_returns_miss() {
        let cache = manager(CacheConfig::default()).await;
        let messages = user("bypassed");

        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, None)
            .await;
        let lookup = cache.get(&messages, "m", Provider::OpenAi, None, true).await;
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn test_disabled_cache_short_circuits() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = manager(config).await;
        let messages = user("ignored");

        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, None)
            .await;
        assert_eq!(cache.size().await, 0);
        assert!(!cache.get(&messages, "m", Provider::OpenAi, None, false).await.hit);
    }

    #[tokio::test]
    async fn test_replace_in_place_emits_set_not_evict() {
        let cache = manager(CacheConfig::default()).await;
        let mut sets = cache.subscribe(EventKind::Set);
        let mut evicts = cache.subscribe(EventKind::Evict);
        let messages = user("replace me");

        cache
            .set(&messages, "m", Provider::OpenAi, "v1".into(), None, None)
            .await;
        cache
            .set(&messages, "m", Provider::OpenAi, "v2".into(), None, None)
            .await;

        assert_eq!(cache.size().await, 1);
        let lookup = cache.get(&messages, "m", Provider::OpenAi, None, false).await;
        assert_eq!(lookup.data.unwrap().content, "v2");

        assert!(matches!(sets.try_recv(), Ok(CacheEvent::Set { .. })));
        assert!(matches!(sets.try_recv(), Ok(CacheEvent::Set { .. })));
        assert!(evicts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stats_accounting() {
        let cache = manager(CacheConfig::default()).await;
        let messages = user("counted");

        cache
            .set(
                &messages,
                "m",
                Provider::OpenAi,
                ModelResponse::text("r").with_usage(TokenUsage::new(100, 50)),
                None,
                None,
            )
            .await;

        cache.get(&messages, "m", Provider::OpenAi, None, false).await;
        cache.get(&messages, "m", Provider::OpenAi, None, false).await;
        cache.get(&user("absent"), "m", Provider::OpenAi, None, false).await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(stats.avg_hit_latency_ms > 0.0);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_tokens_saved, 300);
        assert!(stats.total_cost_saved > 0.0);
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let cache = manager(CacheConfig::default()).await;
        cache.get(&user("x"), "m", Provider::OpenAi, None, false).await;
        assert_eq!(cache.stats().await.misses, 1);

        cache.reset_stats();
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_event_emission() {
        let cache = manager(CacheConfig::default()).await;
        let mut hits = cache.subscribe(EventKind::Hit);
        let mut misses = cache.subscribe(EventKind::Miss);
        let mut evicts = cache.subscribe(EventKind::Evict);
        let mut clears = cache.subscribe(EventKind::Clear);
        let messages = user("observed");

        cache.get(&messages, "m", Provider::OpenAi, None, false).await;
        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, None)
            .await;
        cache.get(&messages, "m", Provider::OpenAi, None, false).await;

        assert!(matches!(misses.try_recv(), Ok(CacheEvent::Miss { .. })));
        match hits.try_recv() {
            Ok(CacheEvent::Hit { key, latency_ms }) => {
                assert!(is_valid_key(&key));
                assert!(latency_ms >= 0.0);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let key = cache.key_for(&messages, "m", Provider::OpenAi, None);
        assert!(cache.delete(&key).await);
        match evicts.try_recv() {
            Ok(CacheEvent::Evict { reason, .. }) => assert_eq!(reason, EvictionReason::Manual),
            other => panic!("unexpected event: {other:?}"),
        }

        cache.clear().await;
        assert!(matches!(clears.try_recv(), Ok(CacheEvent::Clear)));
    }

    #[tokio::test]
    async fn test_cleanup_counts_expired() {
        let cache = manager(small_config(16)).await;
        for m in ["e1", "e2", "e3"] {
            cache
                .set(&user(m), "m", Provider::OpenAi, "r".into(), None, Some(1))
                .await;
        }
        cache
            .set(&user("keeper"), "m", Provider::OpenAi, "r".into(), None, Some(0))
            .await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let removed = cache.cleanup().await;
        assert_eq!(removed, 3);
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let cache = manager(CacheConfig::default()).await;
        assert!(!cache.delete(&"0".repeat(64)).await);
    }

    #[tokio::test]
    async fn test_health_check_and_close() {
        let cache = manager(CacheConfig::default()).await;
        assert!(cache.health_check().await);
        cache.close().await;
    }

    #[tokio::test]
    async fn test_many_sequential_sets() {
        let cache = manager(CacheConfig::default()).await;
        for i in 0..1000 {
            cache
                .set(
                    &user(&format!("prompt {i}")),
                    "m",
                    Provider::OpenAi,
                    format!("response {i}").into(),
                    None,
                    None,
                )
                .await;
        }
        assert_eq!(cache.size().await, 1000);
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");

        let source = manager(CacheConfig::default()).await;
        for m in ["q1", "q2"] {
            source
                .set(&user(m), "m", Provider::OpenAi, format!("r:{m}").into(), None, None)
                .await;
        }
        source.export_cache(&path).await.unwrap();

        let target = manager(CacheConfig::default()).await;
        let imported = target.import_cache(&path).await.unwrap();
        assert_eq!(imported, 2);
        assert_eq!(target.size().await, 2);

        let lookup = target.get(&user("q1"), "m", Provider::OpenAi, None, false).await;
        assert!(lookup.hit);
        assert_eq!(lookup.data.unwrap().content, "r:q1");
    }

    // -- failure semantics --------------------------------------------------

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn set(&self, _key: &str, _entry: CacheEntry) -> Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn clear(&self) -> Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn keys(&self) -> Result<Vec<String>> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn len(&self) -> Result<usize> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn contains(&self, _key: &str) -> Result<bool> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn health_check(&self) -> Result<bool> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_backend_errors_surface_as_miss_and_event() {
        let events = EventBus::new();
        let cache = ResponseCacheManager::with_backend(
            CacheConfig::default(),
            Arc::new(FailingBackend),
            events,
        )
        .unwrap();
        let mut errors = cache.subscribe(EventKind::BackendError);
        let messages = user("unreachable");

        let lookup = cache.get(&messages, "m", Provider::OpenAi, None, false).await;
        assert!(!lookup.hit);
        assert!(matches!(errors.try_recv(), Ok(CacheEvent::BackendError { .. })));

        // Writes degrade to event-only no-ops
        cache
            .set(&messages, "m", Provider::OpenAi, "r".into(), None, None)
            .await;
        assert!(matches!(errors.try_recv(), Ok(CacheEvent::BackendError { .. })));

        assert!(!cache.delete(&"0".repeat(64)).await);
        assert!(!cache.health_check().await);
        assert_eq!(cache.cleanup().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_configuration_rejected() {
        let config = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        match ResponseCacheManager::new(config).await {
            Err(CacheError::Configuration(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    // -- warmer -------------------------------------------------------------

    struct StubFetcher {
        calls: AtomicU32,
        prompts: parking_lot::Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                prompts: parking_lot::Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ResponseFetcher for StubFetcher {
        async fn fetch(
            &self,
            messages: &[ChatMessage],
            _model: &str,
            _params: Option<&GenerationParams>,
        ) -> Result<ModelResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let prompt = messages
                .first()
                .map(|m| m.content.flatten())
                .unwrap_or_default();
            self.prompts.lock().push(prompt.clone());
            if self.fail {
                return Err(CacheError::Backend("upstream down".to_string()));
            }
            Ok(ModelResponse::text(format!("warmed:{prompt}")))
        }
    }

    fn query(prompt: &str, priority: u32) -> WarmupQuery {
        WarmupQuery {
            prompt: prompt.to_string(),
            model: "gpt-4o".to_string(),
            provider: Provider::OpenAi,
            parameters: None,
            priority,
        }
    }

    #[tokio::test]
    async fn test_warm_fetches_misses_and_skips_hits() {
        let cache = Arc::new(manager(CacheConfig::default()).await);
        let fetcher = Arc::new(StubFetcher::new());
        let warmer = CacheWarmer::new(cache.clone(), fetcher.clone());
        let queries = vec![query("q1", 1), query("q2", 2)];

        let report = warmer.warm(&queries).await;
        assert_eq!(report.warmed, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(fetcher.calls.load(Ordering::Relaxed), 2);

        // Everything is cached now: the second pass fetches nothing
        let report = warmer.warm(&queries).await;
        assert_eq!(report.skipped, 2);
        assert_eq!(fetcher.calls.load(Ordering::Relaxed), 2);

        let lookup = cache
            .get(&user("q1"), "gpt-4o", Provider::OpenAi, None, false)
            .await;
        assert_eq!(lookup.data.unwrap().content, "warmed:q1");
    }

    #[tokio::test]
    async fn test_warm_respects_priority_order() {
        let cache = Arc::new(manager(CacheConfig::default()).await);
        let fetcher = Arc::new(StubFetcher::new());
        let warmer = CacheWarmer::with_config(
            cache,
            fetcher.clone(),
            WarmerConfig {
                batch_size: 1,
                interval: 3600,
            },
        );

        warmer
            .warm(&[query("low", 1), query("high", 9), query("mid", 5)])
            .await;

        let prompts = fetcher.prompts.lock().clone();
        assert_eq!(prompts, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_warm_counts_failures_without_aborting() {
        let cache = Arc::new(manager(CacheConfig::default()).await);
        let fetcher = Arc::new(StubFetcher::failing());
        let warmer = CacheWarmer::new(cache.clone(), fetcher.clone());

        let report = warmer.warm(&[query("a", 1), query("b", 2)]).await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.warmed, 0);
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn test_background_warming_stops_cleanly() {
        let cache = Arc::new(manager(CacheConfig::default()).await);
        let fetcher = Arc::new(StubFetcher::new());
        let warmer = Arc::new(CacheWarmer::with_config(
            cache.clone(),
            fetcher.clone(),
            WarmerConfig {
                batch_size: 4,
                interval: 3600,
            },
        ));

        warmer.start_background(vec![query("bg", 1)]);
        // The first pass runs immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.calls.load(Ordering::Relaxed), 1);

        warmer.stop();
        assert_eq!(cache.size().await, 1);
    }
}
