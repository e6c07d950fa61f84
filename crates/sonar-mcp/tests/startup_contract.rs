use predicates::prelude::*;

fn sonar() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("sonar-mcp"));
    // Hermetic: never inherit a real key or env file.
    cmd.env_remove("PERPLEXITY_API_KEY")
        .env_remove("SONAR_ENV_FILE")
        .env_remove("SONAR_PERPLEXITY_ENDPOINT")
        .env_remove("SONAR_DEFAULT_MAX_TOKENS")
        .env_remove("SONAR_DEFAULT_TEMPERATURE");
    cmd
}

#[test]
fn missing_api_key_exits_1_before_serving() {
    sonar()
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        // Nothing on the MCP channel; the reason goes to stderr.
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("PERPLEXITY_API_KEY"));
}

#[test]
fn blank_api_key_is_missing() {
    sonar()
        .env("PERPLEXITY_API_KEY", "   ")
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn invalid_endpoint_exits_1() {
    sonar()
        .env("PERPLEXITY_API_KEY", "test-key")
        .env("SONAR_PERPLEXITY_ENDPOINT", "not a url")
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("invalid Perplexity endpoint"));
}

#[test]
fn out_of_range_default_exits_1() {
    sonar()
        .env("PERPLEXITY_API_KEY", "test-key")
        .env("SONAR_DEFAULT_TEMPERATURE", "2.5")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("temperature"));
}

#[test]
fn stdin_closed_before_handshake_exits_1() {
    // A configured server whose host never completes the MCP handshake.
    sonar()
        .env("PERPLEXITY_API_KEY", "test-key")
        .write_stdin("")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("sonar-mcp exiting"));
}

#[test]
fn version_prints_json() {
    let out = sonar().arg("version").assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("parse version json");
    assert_eq!(v["name"].as_str(), Some("sonar-mcp"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn doctor_reports_config_without_secrets() {
    let out = sonar()
        .arg("doctor")
        .env("PERPLEXITY_API_KEY", "sk-secret-value")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let s = String::from_utf8_lossy(&out);
    assert!(!s.contains("sk-secret-value"));
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    assert_eq!(v["configured"]["perplexity_api_key"].as_bool(), Some(true));
    assert_eq!(
        v["endpoint"].as_str(),
        Some("https://api.perplexity.ai/chat/completions")
    );
    assert_eq!(v["defaults"]["max_tokens"].as_u64(), Some(500));
    let tools = v["tools"].as_array().expect("tools array");
    assert_eq!(tools[0]["name"].as_str(), Some("web-search"));
    assert_eq!(tools[0]["model"].as_str(), Some("sonar-reasoning-pro"));
    assert_eq!(tools[1]["name"].as_str(), Some("deep-research"));
    assert_eq!(tools[1]["model"].as_str(), Some("sonar-deep-research"));
}

#[test]
fn doctor_succeeds_without_key() {
    let out = sonar().arg("doctor").assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("parse doctor json");
    assert_eq!(v["configured"]["perplexity_api_key"].as_bool(), Some(false));
}

#[test]
fn env_file_supplies_key_but_never_overrides_process_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sonar.env");
    std::fs::write(
        &path,
        "# local keys\nPERPLEXITY_API_KEY=from-file\nSONAR_PERPLEXITY_ENDPOINT=http://127.0.0.1:9/from-file\n",
    )
    .unwrap();

    let out = sonar()
        .arg("doctor")
        .env("SONAR_ENV_FILE", &path)
        .env("SONAR_PERPLEXITY_ENDPOINT", "http://127.0.0.1:9/from-process")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).expect("parse doctor json");
    assert_eq!(v["configured"]["perplexity_api_key"].as_bool(), Some(true));
    assert_eq!(
        v["endpoint"].as_str(),
        Some("http://127.0.0.1:9/from-process")
    );
}
