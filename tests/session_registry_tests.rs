// Integration tests for the session registry
//
// Cleanup timers and the welcome cooldown run on the paused tokio clock.

use aimian_realtime::pipeline::TurnState;
use aimian_realtime::session::{SessionMeta, SessionRegistry, WelcomeDedup};
use anyhow::Result;
use std::time::Duration;
use uuid::Uuid;

const RETENTION: Duration = Duration::from_secs(120);
const COOLDOWN: Duration = Duration::from_secs(300);

fn registry() -> SessionRegistry {
    SessionRegistry::new(RETENTION, COOLDOWN)
}

#[tokio::test(start_paused = true)]
async fn test_get_or_create_starts_fresh() -> Result<()> {
    let registry = registry();
    let handle = registry.get_or_create("s1").await;

    {
        let entry = handle.lock().await;
        assert!(!entry.connection.welcome_sent);
        assert!(entry.connection.connections.is_empty());
        assert_eq!(entry.turn.state, TurnState::Idle);
    }

    // Same entry on the second call
    let again = registry.get_or_create("s1").await;
    assert!(std::sync::Arc::ptr_eq(&handle, &again));
    assert_eq!(registry.len().await, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_bind_reports_first_binding_and_merges_meta() -> Result<()> {
    let registry = registry();
    let meta = SessionMeta {
        job_position: Some("产品经理".into()),
        ..Default::default()
    };

    let first = registry.bind("s1", Uuid::new_v4(), meta).await;
    let second = registry
        .bind("s1", Uuid::new_v4(), SessionMeta::default())
        .await;

    assert!(first.first_binding);
    assert!(!second.first_binding);

    let entry = first.handle.lock().await;
    assert_eq!(entry.connection.connections.len(), 2);
    // A join without metadata keeps what the first one supplied
    assert_eq!(entry.session.meta.job_position.as_deref(), Some("产品经理"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_purged_after_retention() -> Result<()> {
    let registry = registry();
    let conn = Uuid::new_v4();
    registry.bind("s1", conn, SessionMeta::default()).await;

    assert!(registry.unbind("s1", conn).await);

    tokio::time::sleep(RETENTION - Duration::from_secs(1)).await;
    assert!(registry.contains("s1").await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rebind_cancels_pending_cleanup() -> Result<()> {
    let registry = registry();
    let conn = Uuid::new_v4();
    registry.bind("s1", conn, SessionMeta::default()).await;
    registry.mark_welcome_sent("s1").await;
    registry.unbind("s1", conn).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    let outcome = registry.bind("s1", conn, SessionMeta::default()).await;
    assert!(!outcome.handle.lock().await.connection.cleanup_armed());

    // Leave again: a fresh window starts from now, not from the first leave
    registry.unbind("s1", conn).await;
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(registry.contains("s1").await);
    assert!(registry.status("s1").await.welcome_sent);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_touch_defers_purge() -> Result<()> {
    let registry = registry();
    registry.get_or_create("s1").await;
    registry.schedule_cleanup("s1", RETENTION).await;

    tokio::time::sleep(Duration::from_secs(100)).await;
    registry.touch("s1").await;

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert!(registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_only_one_cleanup_timer_armed() -> Result<()> {
    let registry = registry();
    let handle = registry.get_or_create("s1").await;

    registry.schedule_cleanup("s1", RETENTION).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    // Second request while armed is ignored; the first deadline stands
    registry.schedule_cleanup("s1", RETENTION).await;
    assert!(handle.lock().await.connection.cleanup_armed());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_purge_skips_session_with_connections() -> Result<()> {
    let registry = registry();
    registry.bind("s1", Uuid::new_v4(), SessionMeta::default()).await;

    tokio::time::sleep(RETENTION * 2).await;
    assert!(!registry.purge_if_idle("s1", RETENTION).await);
    assert!(registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_welcome_claimed_once() -> Result<()> {
    let registry = registry();
    let handle = registry.get_or_create("s1").await;
    let mut entry = handle.lock().await;

    assert!(registry.claim_welcome(&mut entry, "欢迎").await);
    assert!(entry.connection.welcome_sent);
    assert!(!registry.claim_welcome(&mut entry, "欢迎").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_welcome_dedup_survives_recreation_within_cooldown() -> Result<()> {
    let registry = registry();
    let conn = Uuid::new_v4();
    registry.bind("s1", conn, SessionMeta::default()).await;
    {
        let handle = registry.get_or_create("s1").await;
        let mut entry = handle.lock().await;
        assert!(registry.claim_welcome(&mut entry, "欢迎").await);
    }

    // Purged, then recreated inside the cooldown
    registry.unbind("s1", conn).await;
    tokio::time::sleep(RETENTION + Duration::from_secs(1)).await;
    assert!(!registry.contains("s1").await);

    let handle = registry.get_or_create("s1").await;
    {
        let mut entry = handle.lock().await;
        assert!(!registry.claim_welcome(&mut entry, "欢迎").await);
        assert!(entry.connection.welcome_sent);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_welcome_dedup_expires() -> Result<()> {
    let dedup = WelcomeDedup::new(COOLDOWN);
    let hash = WelcomeDedup::hash_text("欢迎");
    dedup.record("s1", hash.clone()).await;

    assert!(dedup.is_recent("s1", &hash).await);
    assert!(!dedup.is_recent("s1", &WelcomeDedup::hash_text("别的开场")).await);
    assert!(!dedup.is_recent("s2", &hash).await);

    tokio::time::sleep(COOLDOWN).await;
    assert!(!dedup.is_recent("s1", &hash).await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_status_is_idle() -> Result<()> {
    let registry = registry();
    let status = registry.status("missing").await;

    assert_eq!(status.state, TurnState::Idle);
    assert_eq!(status.connections, 0);
    assert!(!status.welcome_sent);
    assert!(registry.transcript("missing").await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_not_armed_while_connected() -> Result<()> {
    let registry = registry();
    let conn = Uuid::new_v4();
    let outcome = registry.bind("s1", conn, SessionMeta::default()).await;

    registry.schedule_cleanup("s1", RETENTION).await;
    assert!(!outcome.handle.lock().await.connection.cleanup_armed());

    // The last leave arms its own timer and the session is purged on schedule
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(registry.unbind("s1", conn).await);
    assert!(outcome.handle.lock().await.connection.cleanup_armed());

    tokio::time::sleep(RETENTION + Duration::from_secs(1)).await;
    assert!(!registry.contains("s1").await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_early_timer_rearms_for_remaining_window() -> Result<()> {
    let registry = registry();
    let handle = registry.get_or_create("s1").await;
    registry.schedule_cleanup("s1", RETENTION).await;

    // Activity recorded without cancelling the timer
    tokio::time::sleep(Duration::from_secs(60)).await;
    handle.lock().await.connection.last_activity = tokio::time::Instant::now();

    // First timer finds the session idle for only 60s and re-arms
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(registry.contains("s1").await);
    assert!(handle.lock().await.connection.cleanup_armed());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!registry.contains("s1").await);
    Ok(())
}
