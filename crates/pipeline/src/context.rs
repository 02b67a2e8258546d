//! Conditioning context for a user's task, cached per
//! `(user, task type, project)`.
//!
//! The cache is best effort: read, history and write failures are logged
//! and the caller still gets a usable context.

use std::sync::Arc;

use veostudio_core::context::{compose_context, HistoryEntry, TaskType, MAX_HISTORY_ENTRIES};
use veostudio_core::types::{DbId, UserId};

use crate::clock::Clock;
use crate::store::{ContextCache, ContextKey, GenerationStore};

pub struct ContextStore {
    cache: Arc<dyn ContextCache>,
    generations: Arc<dyn GenerationStore>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl ContextStore {
    pub fn new(
        cache: Arc<dyn ContextCache>,
        generations: Arc<dyn GenerationStore>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            cache,
            generations,
            clock,
            ttl,
        }
    }

    /// Cached context if younger than the TTL, otherwise a freshly composed
    /// one (which is then cached). Never fails.
    pub async fn get_context(
        &self,
        user_id: UserId,
        task: TaskType,
        project_id: Option<DbId>,
    ) -> String {
        let key = ContextKey {
            user_id,
            task,
            project_id,
        };
        let now = self.clock.now();

        match self.cache.get(&key).await {
            Ok(Some(cached)) if now - cached.refreshed_at < self.ttl => {
                tracing::debug!(user_id, task = task.as_str(), "Context cache hit");
                return cached.content;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id, task = task.as_str(), error = %e, "Context cache read failed");
            }
        }

        let history = match self
            .generations
            .recent_for_context(user_id, project_id, MAX_HISTORY_ENTRIES)
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|r| HistoryEntry {
                    prompt: r.prompt,
                    status: r.status.as_str().to_string(),
                })
                .collect(),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Generation history unavailable for context");
                Vec::new()
            }
        };

        let content = compose_context(task, &history);
        if let Err(e) = self.cache.put(&key, &content, now).await {
            tracing::warn!(user_id, task = task.as_str(), error = %e, "Context cache write failed");
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::{CachedContext, InMemoryContextCache, InMemoryGenerationStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use veostudio_core::generation::{AspectRatio, ClipDuration, GenerationParams, Resolution};
    use veostudio_core::money::Money;
    use veostudio_core::record::NewGeneration;
    use veostudio_core::types::Timestamp;

    struct BrokenCache;

    #[async_trait]
    impl ContextCache for BrokenCache {
        async fn get(&self, _: &ContextKey) -> Result<Option<CachedContext>, StoreError> {
            Err(StoreError::Corrupt("cache offline".into()))
        }

        async fn put(&self, _: &ContextKey, _: &str, _: Timestamp) -> Result<(), StoreError> {
            Err(StoreError::Corrupt("cache offline".into()))
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap())
    }

    async fn add_history(store: &InMemoryGenerationStore, user_id: UserId, prompt: &str) {
        store
            .create_or_get(NewGeneration {
                user_id,
                project_id: None,
                request_id: prompt.into(),
                prompt: prompt.into(),
                negative_prompt: None,
                params: GenerationParams {
                    duration: ClipDuration::Four,
                    resolution: Resolution::Hd720,
                    aspect_ratio: AspectRatio::Landscape,
                },
                reference_images: vec![],
                include_audio: false,
                estimated_cost: Money::from_cents(25),
                estimated_tokens: 5,
            })
            .await
            .unwrap();
    }

    fn context_store(
        clock: &ManualClock,
        generations: Arc<InMemoryGenerationStore>,
    ) -> ContextStore {
        ContextStore::new(
            Arc::new(InMemoryContextCache::default()),
            generations,
            Arc::new(clock.clone()),
            chrono::Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn fresh_snapshot_is_reused_until_it_expires() {
        let clock = clock();
        let generations = Arc::new(InMemoryGenerationStore::new(Arc::new(clock.clone())));
        let store = context_store(&clock, Arc::clone(&generations));

        let first = store.get_context(1, TaskType::VideoGeneration, None).await;
        assert!(!first.contains("Recent generations"));

        // New history is invisible while the snapshot is fresh.
        add_history(&generations, 1, "macro shot of a perfume bottle").await;
        clock.advance(chrono::Duration::hours(23));
        let cached = store.get_context(1, TaskType::VideoGeneration, None).await;
        assert_eq!(cached, first);

        clock.advance(chrono::Duration::hours(2));
        let refreshed = store.get_context(1, TaskType::VideoGeneration, None).await;
        assert!(refreshed.contains("perfume bottle"));
    }

    #[tokio::test]
    async fn keys_are_scoped_by_task() {
        let clock = clock();
        let generations = Arc::new(InMemoryGenerationStore::new(Arc::new(clock.clone())));
        let store = context_store(&clock, generations);

        let video = store.get_context(1, TaskType::VideoGeneration, None).await;
        let cost = store.get_context(1, TaskType::CostEstimation, None).await;
        assert_ne!(video, cost);
        assert!(cost.starts_with(TaskType::CostEstimation.instructions()));
    }

    #[tokio::test]
    async fn cache_failures_fall_back_to_composition() {
        let clock = clock();
        let generations = Arc::new(InMemoryGenerationStore::new(Arc::new(clock.clone())));
        add_history(&generations, 2, "orbit shot of a ceramic vase").await;
        let store = ContextStore::new(
            Arc::new(BrokenCache),
            generations,
            Arc::new(clock),
            chrono::Duration::hours(24),
        );

        let context = store.get_context(2, TaskType::VideoGeneration, None).await;
        assert!(context.starts_with(TaskType::VideoGeneration.instructions()));
        assert!(context.contains("ceramic vase"));
    }
}
