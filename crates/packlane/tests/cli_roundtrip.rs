#![cfg(unix)]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port should bind");
    let port = listener
        .local_addr()
        .expect("bound socket should have an address")
        .port();
    drop(listener);
    port
}

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_packlane"))
}

fn send_until_accepted(addr: &str, extra: &[&str], timeout: Duration) {
    let start = Instant::now();
    loop {
        let mut cmd = binary();
        cmd.arg("send").arg(addr).args(extra);
        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("send should spawn");

        if status.success() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("send did not reach the listener within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::process::Output {
    let start = Instant::now();
    loop {
        match child.try_wait().expect("child status should be readable") {
            Some(_) => return child.wait_with_output().expect("child output"),
            None if start.elapsed() >= timeout => {
                let _ = child.kill();
                let output = child.wait_with_output().expect("child output");
                panic!(
                    "listener did not exit within {timeout:?}; stderr: {}",
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            None => thread::sleep(Duration::from_millis(25)),
        }
    }
}

#[test]
fn send_to_listen_roundtrip_over_loopback() {
    let port = free_port();
    let addr = format!("127.0.0.1:{port}");

    let listener = binary()
        .args(["listen", &addr, "--count", "1", "--format", "json"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should spawn");

    send_until_accepted(
        &addr,
        &["--type-tag", "9", "--json", r#"{"kind":"greeting"}"#],
        Duration::from_secs(5),
    );

    let output = wait_with_timeout(listener, Duration::from_secs(5));
    assert!(output.status.success(), "listener should exit cleanly");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let record: serde_json::Value = serde_json::from_str(stdout.lines().next().expect("one record"))
        .expect("listener should emit a JSON record");

    assert_eq!(record["type_tag"], 9);
    assert_eq!(record["encoding"], "JSON");
    assert_eq!(record["payload"], r#"{"kind":"greeting"}"#);
}

#[test]
fn repeated_sends_are_counted_separately() {
    let port = free_port();
    let addr = format!("127.0.0.1:{port}");

    let listener = binary()
        .args(["listen", &addr, "--count", "3", "--format", "pretty"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should spawn");

    send_until_accepted(
        &addr,
        &["--data", "ping", "--repeat", "3"],
        Duration::from_secs(5),
    );

    let output = wait_with_timeout(listener, Duration::from_secs(5));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.lines().all(|line| line.contains("payload=ping")));
}

#[test]
fn invalid_json_payload_fails_with_usage_code() {
    let output = binary()
        .args(["send", "127.0.0.1:1", "--json", "{broken"])
        .output()
        .expect("send should spawn");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not valid JSON"));
}

#[test]
fn oversize_payload_fails_before_connecting() {
    let big = "x".repeat(2000);
    let output = binary()
        .args(["send", "127.0.0.1:1", "--data", &big])
        .output()
        .expect("send should spawn");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("payload too large"));
}
