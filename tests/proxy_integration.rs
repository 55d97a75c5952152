//! End-to-end tests against a fake Inkscape shell.
//!
//! The fake is a small shell script speaking the same line protocol as
//! `inkscape --shell`: banner on startup, `>` when idle, `ack:<command>` as
//! the result payload. Scripted command prefixes trigger warnings,
//! diagnostics, hangs and crashes.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use inkscape_proxy::{Proxy, ProxyConfig, ProxyError};

/// Write an executable fake-inkscape script into `dir`.
fn fake_inkscape(dir: &tempfile::TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("inkscape");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    path.to_string_lossy().into_owned()
}

/// Standard echo shell: logs every received command line to `log`.
fn echo_shell(log: &Path) -> String {
    format!(
        r#"echo "Inkscape interactive shell mode"
echo ">"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "{log}"
  case "$line" in
    quit) exit 0 ;;
    warn*) echo "test WARNING issued" >&2; sleep 0.3; echo ">" ;;
    fail*) echo "boom" >&2; sleep 1 ;;
    die*) exit 1 ;;
    hang*) sleep 1; echo "late:$line"; echo ">" ;;
    *) echo "ack:$line"; echo ">" ;;
  esac
done"#,
        log = log.display()
    )
}

fn echo_proxy(dir: &tempfile::TempDir, config: ProxyConfig) -> (Proxy, std::path::PathBuf) {
    let log = dir.path().join("commands.log");
    let script = fake_inkscape(dir, &echo_shell(&log));
    (Proxy::new(config.command_name(script)), log)
}

fn read_log(log: &Path) -> String {
    std::fs::read_to_string(log).unwrap_or_default()
}

#[tokio::test]
async fn test_round_trip_command() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    let result = proxy
        .raw_commands(&["file-open:in.svg", "export-do"])
        .await
        .unwrap();
    assert_eq!(result, b"ack:file-open:in.svg;export-do");

    proxy.close().await.unwrap();
    assert!(read_log(&log).contains("file-open:in.svg;export-do"));
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());
    let proxy = Arc::new(proxy);

    assert_ok!(proxy.run::<&str>(&[]));

    let mut handles = Vec::new();
    for i in 0..8 {
        let proxy = Arc::clone(&proxy);
        handles.push(tokio::spawn(async move {
            let result = proxy.raw_commands(&[format!("cmd-{i}")]).await.unwrap();
            (i, result)
        }));
    }

    // Each caller must get back exactly its own echo; any overlap of command
    // windows would mix payloads across callers.
    for handle in handles {
        let (i, result) = handle.await.unwrap();
        assert_eq!(result, format!("ack:cmd-{i}").into_bytes());
    }

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_precancelled_scope_returns_canceled_and_releases_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = proxy
        .raw_commands_with_cancel(&cancel, &["select-all"])
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::ExecCanceled));

    // The slot was not lost: a subsequent call completes.
    let result = proxy.raw_commands(&["after"]).await.unwrap();
    assert_eq!(result, b"ack:after");

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_mid_flight_keeps_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = proxy
        .raw_commands_with_cancel(&cancel, &["hang"])
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::ExecCanceled));

    // Let the canceled command's late output arrive, then verify the next
    // call drains it and gets its own response.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let result = proxy.raw_commands(&["after"]).await.unwrap();
    assert_eq!(result, b"ack:after");

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_warning_suppressed_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    // The warning is dropped and the command completes on the prompt.
    let result = proxy.raw_commands(&["warn"]).await.unwrap();
    assert!(result.is_empty());

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_warning_surfaced_when_suppression_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default().suppress_warning(false));

    assert_ok!(proxy.run::<&str>(&[]));

    let err = proxy.raw_commands(&["warn"]).await.unwrap_err();
    match err {
        ProxyError::Inkscape(text) => assert!(text.contains("WARNING")),
        other => panic!("expected Inkscape error, got {other:?}"),
    }

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_diagnostic_fails_the_in_flight_command() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    let err = proxy.raw_commands(&["fail"]).await.unwrap_err();
    match err {
        ProxyError::Inkscape(text) => assert!(text.contains("boom")),
        other => panic!("expected Inkscape error, got {other:?}"),
    }

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_respawn_budget_exhaustion_fails_calls() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_inkscape(&dir, "exit 1");
    let proxy = Proxy::new(ProxyConfig::default().command_name(script).max_retry(2));

    assert_ok!(proxy.run::<&str>(&[]));

    // The process never prompts; once the budget is spent the wait must fail
    // rather than hang.
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        proxy.raw_commands(&["select-all"]),
    )
    .await
    .expect("call must not hang after budget exhaustion");

    assert!(matches!(result.unwrap_err(), ProxyError::CommandNotReady));
}

#[tokio::test]
async fn test_respawn_recovers_after_crash() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, _log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    // "die" crashes the fake; the supervisor respawns it and the pending
    // wait completes on the fresh shell's prompt.
    let result = tokio::time::timeout(Duration::from_secs(5), proxy.raw_commands(&["die"]))
        .await
        .expect("pending call must complete after respawn")
        .unwrap();
    assert!(result.is_empty());

    let result = proxy.raw_commands(&["after"]).await.unwrap();
    assert_eq!(result, b"ack:after");

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn test_close_sends_quit_and_rejects_further_commands() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    let result = proxy.raw_commands(&["before"]).await.unwrap();
    assert_eq!(result, b"ack:before");

    proxy.close().await.unwrap();
    proxy.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(read_log(&log).contains("quit"));

    let err = proxy.raw_commands(&["after"]).await.unwrap_err();
    assert!(matches!(err, ProxyError::CommandNotReady));
}

#[tokio::test]
async fn test_svg2pdf_composes_expected_commands() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, log) = echo_proxy(&dir, ProxyConfig::default());

    assert_ok!(proxy.run::<&str>(&[]));

    proxy.svg2pdf("circle.svg", "circle.pdf").await.unwrap();
    proxy.close().await.unwrap();

    assert!(read_log(&log).contains(
        "file-open:circle.svg;export-filename:circle.pdf;export-do;file-close"
    ));
}
