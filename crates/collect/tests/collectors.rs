//! Collector resolution-order tests. Everything here runs without network;
//! the one API test points at an unroutable local port.
//!
//! Tests that touch process env vars share a lock so parallel test threads
//! never observe each other's overrides.

use std::sync::{Mutex, OnceLock};

use serde_json::json;

use triage_collect::{
    collect_dependency_feed, collect_image_scan, validate_collector_auth, CollectMode,
    DEPENDENCY_FEED_FILE_VAR, IMAGE_SCAN_FILE_VAR,
};
use triage_config::Config;

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn config(dep_enabled: bool, scan_enabled: bool, fallback: Option<&str>) -> Config {
    serde_json::from_value(json!({
        "schema_version": "0.1.0",
        "component_name": "payments",
        "sources": {
            "dependency_feed": {
                "enabled": dep_enabled,
                "repository": "org/payments",
                "api_base": "http://127.0.0.1:9",
                "auth_token_env": "TRIAGE_TEST_GITHUB_TOKEN"
            },
            "image_scan": {
                "enabled": scan_enabled,
                "registry": "123456789012",
                "repository": "payments",
                "api_base": "http://127.0.0.1:9",
                "fallback_file": fallback
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn disabled_sources_write_empty_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");

    let cfg = config(false, false, None);
    let (dep_path, dep_meta) = collect_dependency_feed(&cfg, dir.path(), &cache, "t0")
        .await
        .unwrap();
    let (scan_path, scan_meta) = collect_image_scan(&cfg, dir.path(), &cache, "t0")
        .await
        .unwrap();

    assert_eq!(dep_meta.mode, CollectMode::Disabled);
    assert_eq!(scan_meta.mode, CollectMode::Disabled);
    assert_eq!(std::fs::read_to_string(dep_path).unwrap(), "[]\n");
    assert!(std::fs::read_to_string(scan_path)
        .unwrap()
        .contains("\"findings\": []"));
}

#[tokio::test]
async fn repo_local_file_wins_over_api() {
    let _guard = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::write(
        dir.path().join("dependency_feed.json"),
        json!([{"number": 1}, {"number": 2}]).to_string(),
    )
    .unwrap();

    let cfg = config(true, false, None);
    let (path, meta) = collect_dependency_feed(&cfg, dir.path(), &cache, "t1")
        .await
        .unwrap();

    assert_eq!(meta.mode, CollectMode::RepoFile);
    assert_eq!(meta.items, 2);
    assert_eq!(meta.attempts, 0);
    assert!(path.ends_with("dependency-feed-raw-t1.json"));
}

#[tokio::test]
async fn env_override_wins_over_repo_file() {
    let _guard = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::write(dir.path().join("dependency_feed.json"), "[]").unwrap();
    let override_path = dir.path().join("override.json");
    std::fs::write(&override_path, json!([{"number": 9}]).to_string()).unwrap();

    std::env::set_var(DEPENDENCY_FEED_FILE_VAR, &override_path);
    let result = collect_dependency_feed(&config(true, false, None), dir.path(), &cache, "t2").await;
    std::env::remove_var(DEPENDENCY_FEED_FILE_VAR);

    let (_, meta) = result.unwrap();
    assert_eq!(meta.mode, CollectMode::EnvOverride);
    assert_eq!(meta.items, 1);
}

#[tokio::test]
async fn missing_env_override_is_an_error() {
    let _guard = env_lock();
    let dir = tempfile::tempdir().unwrap();

    std::env::set_var(IMAGE_SCAN_FILE_VAR, "/nonexistent/scan.json");
    let result =
        collect_image_scan(&config(false, true, None), dir.path(), &dir.path().join("c"), "t3")
            .await;
    std::env::remove_var(IMAGE_SCAN_FILE_VAR);

    let err = result.unwrap_err();
    assert!(err.to_string().contains("override file does not exist"));
}

#[tokio::test]
async fn missing_token_without_local_payload_fails() {
    let _guard = env_lock();
    std::env::remove_var("TRIAGE_TEST_GITHUB_TOKEN");
    let dir = tempfile::tempdir().unwrap();

    let err = collect_dependency_feed(&config(true, false, None), dir.path(), &dir.path().join("c"), "t4")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("TRIAGE_TEST_GITHUB_TOKEN"));
}

#[tokio::test]
async fn api_failure_degrades_to_fallback_file() {
    let _guard = env_lock();
    std::env::set_var("TRIAGE_HTTP_MAX_ATTEMPTS", "1");
    std::env::set_var("TRIAGE_HTTP_RETRY_SLEEP_SECONDS", "0");

    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::write(
        dir.path().join("scan_fallback.json"),
        json!({"findings": [{"name": "CVE-2024-0002"}]}).to_string(),
    )
    .unwrap();

    let result = collect_image_scan(
        &config(false, true, Some("scan_fallback.json")),
        dir.path(),
        &cache,
        "t5",
    )
    .await;

    std::env::remove_var("TRIAGE_HTTP_MAX_ATTEMPTS");
    std::env::remove_var("TRIAGE_HTTP_RETRY_SLEEP_SECONDS");

    let (path, meta) = result.unwrap();
    assert_eq!(meta.mode, CollectMode::ApiFallbackFile);
    assert_eq!(meta.items, 1);
    assert!(std::fs::read_to_string(path).unwrap().contains("CVE-2024-0002"));
}

#[tokio::test]
async fn api_failure_without_fallback_is_an_error() {
    let _guard = env_lock();
    std::env::set_var("TRIAGE_HTTP_MAX_ATTEMPTS", "1");
    std::env::set_var("TRIAGE_HTTP_RETRY_SLEEP_SECONDS", "0");

    let dir = tempfile::tempdir().unwrap();
    let result = collect_image_scan(
        &config(false, true, None),
        dir.path(),
        &dir.path().join("cache"),
        "t6",
    )
    .await;

    std::env::remove_var("TRIAGE_HTTP_MAX_ATTEMPTS");
    std::env::remove_var("TRIAGE_HTTP_RETRY_SLEEP_SECONDS");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("image-scan"));
}

#[test]
fn auth_validation_reports_each_gap() {
    let _guard = env_lock();
    std::env::remove_var("TRIAGE_TEST_GITHUB_TOKEN");
    let dir = tempfile::tempdir().unwrap();

    let problems = validate_collector_auth(&config(true, true, Some("missing.json")), dir.path());
    assert_eq!(problems.len(), 2);
    assert!(problems[0].contains("TRIAGE_TEST_GITHUB_TOKEN"));
    assert!(problems[1].contains("missing.json"));

    std::fs::write(dir.path().join("dependency_feed.json"), "[]").unwrap();
    std::fs::write(dir.path().join("missing.json"), "{}").unwrap();
    assert!(validate_collector_auth(&config(true, true, Some("missing.json")), dir.path()).is_empty());
}
