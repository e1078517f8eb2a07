//! Integration tests for hot reload: debouncing, validation failure, and
//! remote-source polling.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use runtime_config::reload::{HotReloadEvent, ReloadSource, SourceLoadError, SourceLoader};
use runtime_config::settings::EngineSettings;
use runtime_config::{ConfigError, EngineContext};

mod common;

fn write_config(path: &std::path::Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

fn settings_with_debounce(debounce_ms: u64) -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.reload.debounce_ms = debounce_ms;
    settings
}

#[tokio::test]
async fn burst_of_file_changes_triggers_one_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, &json!({"n": 1}));

    let ctx = EngineContext::builder(settings_with_debounce(300))
        .initial_config(json!({"n": 1}))
        .watch_file("primary", &path)
        .build();
    let mut events = ctx.reload.subscribe();
    ctx.start().await.unwrap();

    // Three rapid saves inside one debounce window.
    for n in 2..=4 {
        write_config(&path, &json!({ "n": n }));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let store = ctx.store.clone();
    assert!(
        common::wait_until(Duration::from_secs(5), || {
            store.get("n") == Some(json!(4))
        })
        .await,
        "reload never applied"
    );
    // Allow any spurious extra cycle to surface before counting.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(ctx.store.statistics().total_updates, 1);

    let mut reloads = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, HotReloadEvent::Reload { .. }) {
            reloads += 1;
        }
    }
    assert_eq!(reloads, 1);

    ctx.stop();
}

#[tokio::test]
async fn invalid_reload_keeps_current_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, &json!({"nonsense": true}));

    let initial = json!({"server": {"name": "engine"}});
    let ctx = EngineContext::builder(settings_with_debounce(100))
        .initial_config(initial.clone())
        .validator(common::require_server_name())
        .watch_file("primary", &path)
        .build();
    let mut events = ctx.reload.subscribe();
    ctx.start().await.unwrap();

    ctx.reload.trigger_reload("primary").await.unwrap();

    match events.recv().await.unwrap() {
        HotReloadEvent::ValidationFailed { source, validation } => {
            assert_eq!(source, "primary");
            assert!(!validation.is_valid);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(*ctx.store.current(), initial);
    assert_eq!(ctx.store.statistics().total_updates, 0);

    ctx.stop();
}

#[tokio::test]
async fn unreadable_source_emits_error_and_source_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, b"{ truncated").unwrap();

    let ctx = EngineContext::builder(settings_with_debounce(100))
        .watch_file("primary", &path)
        .build();
    let mut events = ctx.reload.subscribe();
    ctx.start().await.unwrap();

    ctx.reload.trigger_reload("primary").await.unwrap();
    match events.recv().await.unwrap() {
        HotReloadEvent::Error { source, .. } => assert_eq!(source, "primary"),
        other => panic!("expected error event, got {other:?}"),
    }

    // The cycle failed but the source is still serviceable.
    write_config(&path, &json!({"fixed": true}));
    ctx.reload.trigger_reload("primary").await.unwrap();
    match events.recv().await.unwrap() {
        HotReloadEvent::Reload { source, .. } => assert_eq!(source, "primary"),
        other => panic!("expected reload event, got {other:?}"),
    }
    assert_eq!(ctx.store.get("fixed"), Some(json!(true)));

    ctx.stop();
}

#[tokio::test]
async fn trigger_reload_rejects_unknown_source() {
    let ctx = EngineContext::builder(EngineSettings::default()).build();

    let err = ctx.reload.trigger_reload("ghost").await.unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSource(_)));
}

/// Programmable stand-in for a remote endpoint.
struct StubRemote {
    value: Mutex<Value>,
    loads: AtomicUsize,
}

impl StubRemote {
    fn new(value: Value) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            loads: AtomicUsize::new(0),
        })
    }

    fn set_value(&self, value: Value) {
        *self.value.lock().unwrap() = value;
    }
}

#[async_trait]
impl SourceLoader for StubRemote {
    async fn load(&self) -> Result<Value, SourceLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn unchanged_remote_payload_does_not_rereload() {
    let stub = StubRemote::new(json!({"remote": 1}));

    let source = ReloadSource::Remote {
        id: "stub".into(),
        url: url::Url::parse("http://127.0.0.1:9/unused").unwrap(),
        poll_interval: Duration::from_millis(100),
    };
    let ctx = EngineContext::builder(settings_with_debounce(50))
        .source(source)
        .loader("stub", stub.clone())
        .build();
    ctx.start().await.unwrap();

    let store = ctx.store.clone();
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            store.get("remote") == Some(json!(1))
        })
        .await,
        "initial remote payload never applied"
    );

    // Several more polls with an identical payload: no further updates.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(stub.loads.load(Ordering::SeqCst) >= 3, "poller stalled");
    assert_eq!(ctx.store.statistics().total_updates, 1);

    // A changed payload is picked up on the next poll.
    stub.set_value(json!({"remote": 2}));
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            store.get("remote") == Some(json!(2))
        })
        .await,
        "changed remote payload never applied"
    );

    ctx.stop();
}
