//! Cache persistence across runs, driven through the tool runner.

use async_trait::async_trait;
use instability::cache::ResultCache;
use instability::tools::external_ip::EXTERNAL_IP_KEY;
use instability::tools::{DiagnosticTool, ToolContext, ToolOutput, ToolRegistry, ToolRunner};
use instability::{InstabilityError, InstabilityResult};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Reports whatever IP it is given.
struct FixedIp;

#[async_trait]
impl DiagnosticTool for FixedIp {
    fn name(&self) -> &'static str {
        "get_external_ip"
    }

    fn description(&self) -> &'static str {
        "test double"
    }

    async fn run(&self, args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let ip = args["ip"].as_str().unwrap_or("192.0.2.1");
        Ok(ToolOutput::text(format!("External IP: {}", ip)).with_fact(EXTERNAL_IP_KEY, ip))
    }
}

struct AlwaysFails;

#[async_trait]
impl DiagnosticTool for AlwaysFails {
    fn name(&self) -> &'static str {
        "check_flaky"
    }

    fn description(&self) -> &'static str {
        "test double"
    }

    async fn run(&self, _args: &Value, _ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        Err(InstabilityError::tool_failed("check_flaky", "no route to host"))
    }
}

fn runner() -> ToolRunner {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FixedIp));
    registry.register(Box::new(AlwaysFails));
    ToolRunner::new(registry, ToolContext::fast().unwrap())
}

fn open(dir: &TempDir) -> ResultCache {
    ResultCache::load(dir.path().join("state").join("cache.json"), 16, 4096)
}

#[tokio::test]
async fn external_ip_change_is_detected_across_restarts() {
    let dir = TempDir::new().unwrap();
    let runner = runner();

    let mut cache = open(&dir);
    let first = runner
        .run("get_external_ip", &json!({"ip": "192.0.2.1"}), &mut cache)
        .await
        .unwrap();
    assert!(first.output.contains("First time recording the external IP."));
    drop(cache);

    let mut cache = open(&dir);
    let same = runner
        .run("get_external_ip", &json!({"ip": "192.0.2.1"}), &mut cache)
        .await
        .unwrap();
    assert!(same.output.contains("External IP unchanged since"));
    drop(cache);

    let mut cache = open(&dir);
    let changed = runner
        .run("get_external_ip", &json!({"ip": "198.51.100.7"}), &mut cache)
        .await
        .unwrap();
    assert!(changed.output.contains("External IP changed from 192.0.2.1 to 198.51.100.7"));

    let reloaded = open(&dir);
    assert_eq!(reloaded.get(EXTERNAL_IP_KEY).unwrap().value, "198.51.100.7");
    assert_eq!(reloaded.get("get_external_ip").unwrap().value, changed.output);
}

#[tokio::test]
async fn failed_runs_are_not_cached() {
    let dir = TempDir::new().unwrap();
    let runner = runner();
    let mut cache = open(&dir);

    let run = runner.run("check_flaky", &json!({}), &mut cache).await.unwrap();

    assert!(!run.ok);
    assert!(run.output.contains("no route to host"));
    assert!(cache.get("check_flaky").is_none());
    assert!(!dir.path().join("state").join("cache.json").exists());
}

#[tokio::test]
async fn unknown_tool_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut cache = open(&dir);

    let err = runner().run("check_everything", &json!({}), &mut cache).await.unwrap_err();

    assert!(matches!(err, InstabilityError::ToolNotFound { .. }));
}

#[test]
fn clear_keeps_preserved_keys_after_reload() {
    let dir = TempDir::new().unwrap();
    let mut cache = open(&dir);
    cache.update(EXTERNAL_IP_KEY, "192.0.2.1");
    cache.update("check_cdns", "All 6 CDNs are reachable.");
    cache.save().unwrap();

    let mut cache = open(&dir);
    cache.clear(&[EXTERNAL_IP_KEY]);
    cache.save().unwrap();

    let cache = open(&dir);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(EXTERNAL_IP_KEY).is_some());
    assert_eq!(cache.info().keys, vec![EXTERNAL_IP_KEY.to_string()]);
}

#[test]
fn corrupt_file_is_strict_for_try_load_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        ResultCache::try_load(&path, 16, 4096),
        Err(InstabilityError::Cache(_))
    ));
    assert!(ResultCache::load(&path, 16, 4096).is_empty());
}
