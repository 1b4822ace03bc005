//! # Redis CLI Integration Tests
//!
//! Purpose: Verify RESP compatibility using the real `redis-cli` binary when
//! available on the host. Skipped otherwise.

mod common;

use std::process::Command;
use std::time::Duration;

use common::spawn_test_server;

fn redis_cli_available() -> bool {
    Command::new("redis-cli")
        .arg("--version")
        .output()
        .is_ok()
}

fn run_redis_cli(port: u16, args: &[&str]) -> std::io::Result<String> {
    let output = Command::new("redis-cli")
        .arg("-p")
        .arg(port.to_string())
        .args(args)
        .output()?;

    assert!(
        output.status.success(),
        "redis-cli failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn redis_cli_basic_commands() {
    if !redis_cli_available() {
        eprintln!("redis-cli not found; skipping integration test");
        return;
    }

    let server = spawn_test_server().await.unwrap();
    let port = server.addr.port();

    assert_eq!(run_redis_cli(port, &["PING"]).unwrap(), "PONG");
    assert_eq!(run_redis_cli(port, &["SET", "key", "value"]).unwrap(), "OK");
    assert_eq!(run_redis_cli(port, &["GET", "key"]).unwrap(), "value");
    assert_eq!(run_redis_cli(port, &["TTL", "key"]).unwrap(), "-1");
    assert_eq!(run_redis_cli(port, &["SET", "key", "value", "EX", "1"]).unwrap(), "OK");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let missing = run_redis_cli(port, &["GET", "key"]).unwrap();
    assert!(matches!(missing.as_str(), "" | "(nil)"), "unexpected GET output {missing:?}");
    assert_eq!(run_redis_cli(port, &["TTL", "key"]).unwrap(), "-2");
    assert_eq!(run_redis_cli(port, &["DEL", "key"]).unwrap(), "0");

    run_redis_cli(port, &["SET", "user:1", "a"]).unwrap();
    run_redis_cli(port, &["SET", "user:2", "b"]).unwrap();
    run_redis_cli(port, &["SET", "other", "c"]).unwrap();
    let scan = run_redis_cli(port, &["SCAN", "0", "MATCH", "user:*", "COUNT", "100"]).unwrap();
    let lines: Vec<&str> = scan.lines().collect();
    assert_eq!(lines, ["0", "user:1", "user:2"]);

    let info = run_redis_cli(port, &["INFO"]).unwrap();
    assert!(info.contains("engine:edgekv-memory"));
}
