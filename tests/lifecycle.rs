//! Install and activation behaviour against scripted network and storage.

mod support;

use std::sync::Arc;

use netfirst_cache::cache::CacheStorage;
use netfirst_cache::http::Request;
use netfirst_cache::{AgentConfig, Error, Lifecycle, ServiceWorker};
use support::{url, FlakyStorage, Fixture, ScriptedNetwork};

#[tokio::test]
async fn test_install_caches_every_manifest_entry() {
    let fx = Fixture::new(AgentConfig::default());
    fx.agent.on_install().await.unwrap();

    for locator in ["/", "/index.html", "/manifest.json"] {
        let hit = fx.agent.cached(locator).await.unwrap();
        assert!(hit.is_some(), "{} missing after install", locator);
    }
    assert_eq!(
        fx.agent.cached("/manifest.json").await.unwrap().unwrap().text(),
        r#"{"name":"Gym Tracker"}"#
    );
    assert!(fx.host.skipped_waiting().unwrap());
    assert_eq!(fx.agent.state(), Lifecycle::Installed);
}

#[tokio::test]
async fn test_install_with_unreachable_entry_writes_nothing() {
    let network = Arc::new(ScriptedNetwork::new());
    network.route("/", 200, "root");
    network.route("/index.html", 200, "index");
    let fx = Fixture::with_parts(AgentConfig::default(), network.clone(), Arc::new(FlakyStorage::new()));

    let err = fx.agent.on_install().await.unwrap_err();
    assert!(matches!(err, Error::Manifest { .. }));
    assert_eq!(fx.agent.state(), Lifecycle::Parsed);
    assert!(fx.storage.entries("gym-tracker-v1").await.unwrap().is_empty());
    assert!(!fx.host.skipped_waiting().unwrap());

    // The next attempt starts over and succeeds once the resource is reachable.
    network.route("/manifest.json", 200, "{}");
    fx.agent.on_install().await.unwrap();
    assert_eq!(fx.storage.entries("gym-tracker-v1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_reinstall_is_idempotent() {
    let fx = Fixture::new(AgentConfig::default());
    fx.agent.on_install().await.unwrap();
    fx.network.route("/index.html", 200, "<html>index v2</html>");
    fx.agent.on_install().await.unwrap();

    let entries = fx.storage.entries("gym-tracker-v1").await.unwrap();
    assert_eq!(
        entries,
        vec![url("/"), url("/index.html"), url("/manifest.json")]
    );
    assert_eq!(
        fx.agent.cached("/index.html").await.unwrap().unwrap().text(),
        "<html>index v2</html>"
    );
}

#[tokio::test]
async fn test_activation_leaves_only_current_bucket() {
    let fx = Fixture::new(AgentConfig::default());
    for stale in ["gym-tracker-v0", "legacy", "gym-tracker-v1-beta"] {
        fx.storage.open(stale).await.unwrap();
    }
    let client = fx.host.open_client().unwrap();

    fx.agent.on_install().await.unwrap();
    let report = fx.agent.on_activate().await.unwrap();

    assert_eq!(fx.storage.keys().await.unwrap(), vec!["gym-tracker-v1"]);
    assert_eq!(report.deleted.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(fx.agent.state(), Lifecycle::Active);
    assert_eq!(
        fx.host.controller(client).unwrap().as_deref(),
        Some("gym-tracker-v1")
    );
}

#[tokio::test]
async fn test_failed_deletion_does_not_stop_sweep() {
    let fx = Fixture::new(AgentConfig::default());
    for stale in ["v-a", "v-b", "v-c"] {
        fx.storage.open(stale).await.unwrap();
    }
    fx.storage.fail_delete_of("v-b");

    fx.agent.on_install().await.unwrap();
    let report = fx.agent.on_activate().await.unwrap();

    assert_eq!(report.failed, vec!["v-b"]);
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(fx.agent.state(), Lifecycle::Active);
    assert_eq!(fx.storage.keys().await.unwrap(), vec!["v-b", "gym-tracker-v1"]);
    assert_eq!(fx.agent.stats().delete_failures, 1);
}

#[tokio::test]
async fn test_version_rotation_invalidates_old_entries() {
    let network = Arc::new(ScriptedNetwork::with_manifest());
    network.route("/api/workouts", 200, "[1,2,3]");
    let storage = Arc::new(FlakyStorage::new());

    let v1 = Fixture::with_parts(AgentConfig::default(), network.clone(), storage.clone());
    v1.agent.on_install().await.unwrap();
    v1.agent.on_activate().await.unwrap();
    v1.agent
        .on_fetch(Request::get(&url("/api/workouts")).unwrap())
        .await;
    v1.agent.settle().await;

    let v2 = Fixture::with_parts(
        AgentConfig::default().with_cache_name("gym-tracker-v2"),
        network.clone(),
        storage.clone(),
    );
    v2.agent.on_install().await.unwrap();
    v2.agent.on_activate().await.unwrap();
    assert_eq!(storage.keys().await.unwrap(), vec!["gym-tracker-v2"]);

    network.set_offline(true);
    let workouts = v2
        .agent
        .on_fetch(Request::get(&url("/api/workouts")).unwrap())
        .await
        .into_response()
        .unwrap();
    assert_eq!(workouts.status(), 503);

    let index = v2
        .agent
        .on_fetch(Request::get(&url("/index.html")).unwrap())
        .await
        .into_response()
        .unwrap();
    assert_eq!(index.status(), 200);
    assert_eq!(index.text(), "<html>index</html>");
}

#[tokio::test]
async fn test_activate_before_install_is_rejected() {
    let fx = Fixture::new(AgentConfig::default());
    let err = fx.agent.on_activate().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { operation: "activate", .. }));
}

#[tokio::test]
async fn test_installed_but_not_activated_version_does_not_resume() {
    let network = Arc::new(ScriptedNetwork::with_manifest());
    let storage = Arc::new(FlakyStorage::new());
    storage.open("gym-tracker-v0").await.unwrap();

    let first = Fixture::with_parts(AgentConfig::default(), network.clone(), storage.clone());
    first.agent.on_install().await.unwrap();

    let restarted = Fixture::with_parts(AgentConfig::default(), network, storage.clone());
    assert!(!restarted.agent.resume().await.unwrap());
    assert_eq!(restarted.agent.state(), Lifecycle::Parsed);
    assert_eq!(
        storage.keys().await.unwrap(),
        vec!["gym-tracker-v0", "gym-tracker-v1"]
    );
}

#[tokio::test]
async fn test_activated_version_resumes_after_restart() {
    let network = Arc::new(ScriptedNetwork::with_manifest());
    let storage = Arc::new(FlakyStorage::new());

    let first = Fixture::with_parts(AgentConfig::default(), network.clone(), storage.clone());
    first.agent.on_install().await.unwrap();
    first.agent.on_activate().await.unwrap();

    let restarted = Fixture::with_parts(AgentConfig::default(), network.clone(), storage);
    assert!(restarted.agent.resume().await.unwrap());
    assert_eq!(restarted.agent.state(), Lifecycle::Active);

    network.set_offline(true);
    let index = restarted
        .agent
        .on_fetch(Request::get(&url("/index.html")).unwrap())
        .await
        .into_response()
        .unwrap();
    assert_eq!(index.text(), "<html>index</html>");
}
