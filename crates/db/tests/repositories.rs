//! Repository tests against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a server where the test user may
//! create databases: `cargo test -p veostudio-db -- --ignored`.

use sqlx::PgPool;
use veostudio_core::generation::{
    AspectRatio, ClipDuration, FailureClass, GenerationParams, Resolution,
};
use veostudio_core::money::Money;
use veostudio_core::record::{GenerationRecord, NewGeneration};
use veostudio_core::status::GenerationStatus;
use veostudio_core::templates::NewSavedTemplate;
use veostudio_db::repositories::{BudgetRepo, GenerationJobRepo, GenerationRepo, PromptTemplateRepo};

fn new_generation(request_id: &str) -> NewGeneration {
    NewGeneration {
        user_id: 1,
        project_id: Some(9),
        request_id: request_id.into(),
        prompt: "tracking shot | ceramic mug | steam rising | kitchen | warm light".into(),
        negative_prompt: None,
        params: GenerationParams {
            duration: ClipDuration::Six,
            resolution: Resolution::Hd1080,
            aspect_ratio: AspectRatio::Landscape,
        },
        reference_images: vec!["gs://refs/mug.png".into()],
        include_audio: true,
        estimated_cost: Money::from_cents(65),
        estimated_tokens: 14,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn bootstrap_seeds_status_tables(pool: PgPool) {
    veostudio_db::health_check(&pool).await.unwrap();
    for table in ["generation_statuses", "queue_states"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 4, "{table}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn duplicate_request_id_returns_existing_row(pool: PgPool) {
    let (first, created) = GenerationRepo::create_or_get(&pool, &new_generation("dup"))
        .await
        .unwrap();
    assert!(created);
    let (second, created) = GenerationRepo::create_or_get(&pool, &new_generation("dup"))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);

    let record = GenerationRecord::try_from(second).unwrap();
    assert_eq!(record.status, GenerationStatus::Queued);
    assert_eq!(record.estimated_cost, Money::from_cents(65));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn terminal_records_do_not_transition(pool: PgPool) {
    let (row, _) = GenerationRepo::create_or_get(&pool, &new_generation("t"))
        .await
        .unwrap();
    // queued -> completed is not allowed.
    assert!(!GenerationRepo::complete(&pool, row.id, "https://cdn/v.mp4", Money::from_cents(65))
        .await
        .unwrap());
    assert!(GenerationRepo::mark_processing(&pool, row.id).await.unwrap());
    assert!(GenerationRepo::complete(&pool, row.id, "https://cdn/v.mp4", Money::from_cents(65))
        .await
        .unwrap());
    assert!(!GenerationRepo::fail(&pool, row.id, FailureClass::Internal, "late")
        .await
        .unwrap());
    assert!(!GenerationRepo::mark_processing(&pool, row.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn reserve_never_exceeds_limit(pool: PgPool) {
    BudgetRepo::ensure(&pool, 5, Money::from_cents(100), 30).await.unwrap();
    assert!(BudgetRepo::reserve(&pool, 5, Money::from_cents(60)).await.unwrap().is_some());
    assert!(BudgetRepo::reserve(&pool, 5, Money::from_cents(50)).await.unwrap().is_none());
    let account = BudgetRepo::find(&pool, 5).await.unwrap().unwrap();
    assert_eq!(account.used, 60);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn leases_are_exclusive_and_fifo(pool: PgPool) {
    let (a, _) = GenerationRepo::create_or_get(&pool, &new_generation("a")).await.unwrap();
    let (b, _) = GenerationRepo::create_or_get(&pool, &new_generation("b")).await.unwrap();
    GenerationJobRepo::enqueue(&pool, a.id, &serde_json::json!({})).await.unwrap();
    GenerationJobRepo::enqueue(&pool, b.id, &serde_json::json!({})).await.unwrap();

    let first = GenerationJobRepo::lease(&pool, "w1", 60.0).await.unwrap().unwrap();
    let second = GenerationJobRepo::lease(&pool, "w2", 60.0).await.unwrap().unwrap();
    assert_eq!(first.generation_id, a.id);
    assert_eq!(second.generation_id, b.id);
    assert!(GenerationJobRepo::lease(&pool, "w3", 60.0).await.unwrap().is_none());

    // Only the holder can ack.
    assert!(!GenerationJobRepo::ack(&pool, first.id, "w2", first.lease_count).await.unwrap());
    assert!(GenerationJobRepo::ack(&pool, first.id, "w1", first.lease_count).await.unwrap());
    assert_eq!(GenerationJobRepo::depth(&pool).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn reissued_lease_rejects_the_previous_holder(pool: PgPool) {
    let (g, _) = GenerationRepo::create_or_get(&pool, &new_generation("fence")).await.unwrap();
    GenerationJobRepo::enqueue(&pool, g.id, &serde_json::json!({})).await.unwrap();

    // A zero-length lease is expired by the next statement.
    let stale = GenerationJobRepo::lease(&pool, "worker-1-0", 0.0).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let fresh = GenerationJobRepo::lease(&pool, "worker-1-0", 60.0).await.unwrap().unwrap();
    assert_eq!(fresh.id, stale.id);
    assert_eq!((stale.lease_count, fresh.lease_count), (1, 2));

    assert!(!GenerationJobRepo::extend(&pool, stale.id, "worker-1-0", stale.lease_count, 60.0)
        .await
        .unwrap());
    assert!(!GenerationJobRepo::ack(&pool, stale.id, "worker-1-0", stale.lease_count).await.unwrap());

    assert!(GenerationJobRepo::record_error(
        &pool,
        fresh.id,
        "worker-1-0",
        fresh.lease_count,
        "provider_transient",
        "rate limited",
    )
    .await
    .unwrap());
    assert!(GenerationJobRepo::ack(&pool, fresh.id, "worker-1-0", fresh.lease_count).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn template_slugs_are_unique_and_uses_are_counted(pool: PgPool) {
    let new = NewSavedTemplate {
        name: "Mug Hero".into(),
        prompt: "tracking shot | ceramic mug | steam rising | kitchen | warm light".into(),
        product_type: "kitchenware".into(),
        tags: vec!["mug".into()],
        notes: String::new(),
    };
    let saved = PromptTemplateRepo::create(&pool, &new).await.unwrap();
    assert_eq!(saved.slug, "tpl_mug_hero");
    assert_eq!(saved.tags, vec!["mug".to_string()]);

    let err = PromptTemplateRepo::create(&pool, &new).await.unwrap_err();
    assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));

    let used = PromptTemplateRepo::record_use(&pool, saved.id).await.unwrap().unwrap();
    assert_eq!(used.usage_count, 1);
    let listed = PromptTemplateRepo::list(&pool, Some("kitchenware"), 20, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
}
