//! Process-level tests against a scripted controller.

#![cfg(unix)]

mod common;

use common::*;
use htty_session::{with_session, Press, SessionConfig, SessionError};
use std::time::{Duration, Instant};

// -- Keys and snapshots ------------------------------------------------------

#[tokio::test]
async fn keys_are_reflected_in_order() {
    let mut session = spawn_fake("interactive").await;
    assert!(session.subprocess_pid().is_some());

    session.send_keys(["abc"]).await.unwrap();
    session.send_keys(["def", "Enter", "g"]).await.unwrap();

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "abcdef\ng");
    assert_eq!(snapshot.trimmed_lines(), vec!["abcdef", "g"]);

    // Ledger holds each output exactly once, even though snapshots drained the channel
    assert_eq!(session.output_text(), "abcdef\ng");
    assert_eq!(session.output().len(), 4);
    assert!(session.output_matches("def\\s+g").unwrap());

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn press_values_are_sent_as_wire_strings() {
    let mut session = spawn_fake("interactive").await;

    session.send_keys(["x"]).await.unwrap();
    session.send_keys([Press::Enter, Press::Enter]).await.unwrap();

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "x\n\n");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn strings_that_look_like_key_names_are_typed_literally() {
    let mut session = spawn_fake("interactive").await;

    session.send_keys(["end", "tab", "ENTER"]).await.unwrap();

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "endtabENTER");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn snapshot_times_out_when_controller_never_answers() {
    let mut config = fake_config("silent");
    config.timing.snapshot_retry_timeout = Duration::from_millis(50);
    config.timing.max_snapshot_retries = 3;
    let mut session = spawn_config(config).await;

    let err = session.snapshot().await.unwrap_err();
    match err {
        SessionError::SnapshotTimeout { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("Expected SnapshotTimeout, got {:?}", other),
    }

    session.exit().await.unwrap();
}

#[tokio::test]
async fn late_snapshot_answer_is_not_returned_to_next_request() {
    let mut session = spawn_fake("slow").await;
    session.send_keys(["abc"]).await.unwrap();

    let err = session
        .snapshot_within(Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SnapshotTimeout { .. }));

    // The answer to the abandoned request arrives first and must be skipped
    session.send_keys(["def"]).await.unwrap();
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "abcdef");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn answer_arriving_during_settle_delay_is_used() {
    let mut config = fake_config("interactive");
    config.timing.settle_delay = Duration::from_millis(200);
    let mut session = spawn_config(config).await;
    session.send_keys(["abc"]).await.unwrap();

    // Shorter than the settle delay, yet the answer is already queued
    let snapshot = session
        .snapshot_within(Duration::from_millis(1))
        .await
        .unwrap();
    assert_eq!(snapshot.text, "abc");

    session.send_keys(["def"]).await.unwrap();
    assert_eq!(session.snapshot().await.unwrap().text, "abcdef");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_giving_up_does_not_leave_a_stale_screen() {
    let mut session = spawn_fake("interactive").await;
    session.send_keys(["abc"]).await.unwrap();

    let err = session
        .expect_within("zzz", Duration::from_millis(5))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PatternTimeout { .. }));

    session.send_keys(["def"]).await.unwrap();
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "abcdef");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn operations_fail_after_controller_exit() {
    let mut session = spawn_fake("crash").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = session.snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::ProcessNotRunning { exit_code: Some(3) }
    ));
    let err = session.send_keys(["a"]).await.unwrap_err();
    assert!(matches!(err, SessionError::ProcessNotRunning { .. }));

    assert_eq!(session.exit().await.unwrap(), 3);
}

#[tokio::test]
async fn keys_after_subprocess_exit_are_harmless() {
    let mut session = spawn_fake("done").await;
    assert!(session.subprocess_exited());
    assert_eq!(session.subprocess_exit_code(), Some(0));

    session.send_keys(["world"]).await.unwrap();
    let first = session.snapshot().await.unwrap();
    let second = session.snapshot().await.unwrap();
    assert_eq!(first.text, "world");
    assert_eq!(first, second);

    assert_eq!(session.exit().await.unwrap(), 0);
}

#[tokio::test]
async fn wait_for_subprocess_returns_reported_code() {
    let mut session = spawn_fake("done").await;
    let code = session
        .wait_for_subprocess(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(code, Some(0));
    assert!(session.subprocess_completed());
    session.exit().await.unwrap();
}

#[tokio::test]
async fn wait_for_subprocess_times_out_while_running() {
    let mut session = spawn_fake("interactive").await;
    let err = session
        .wait_for_subprocess(Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SubprocessWaitTimeout { .. }));
    session.terminate().await.unwrap();
}

// -- Pattern waits -----------------------------------------------------------

#[tokio::test]
async fn expect_finds_text_already_on_screen() {
    let mut session = spawn_fake("interactive").await;
    session.send_keys(["hello"]).await.unwrap();

    session.expect("hel+o").await.unwrap();
    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_waits_for_later_output() {
    let mut session = spawn_fake("delayed").await;

    let start = Instant::now();
    session.expect("ready").await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_timeout_names_pattern_and_bound() {
    let mut session = spawn_fake("interactive").await;

    let start = Instant::now();
    let err = session
        .expect_within("nonexistent", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Pattern 'nonexistent' not found within 1s");

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_rechecks_screen_while_output_keeps_coming() {
    let mut session = spawn_fake("flood").await;

    // None of the output events contain the pattern; only a fresh snapshot does
    session
        .expect_within("ready", Duration::from_secs(2))
        .await
        .unwrap();
    assert!(session.output_text().contains("noise"));

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_without_periodic_snapshots_misses_screen_only_text() {
    let mut config = fake_config("flood");
    config.timing.expect_snapshot_every = 0;
    let mut session = spawn_config(config).await;

    let err = session
        .expect_within("ready", Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PatternTimeout { .. }));

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn invalid_pattern_fails_immediately() {
    let mut session = spawn_fake("interactive").await;

    let err = session.expect("(unclosed").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidRegex { .. }));
    let err = session.expect_absent("[").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidRegex { .. }));

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn expect_absent_returns_once_pattern_is_gone() {
    let mut session = spawn_fake("interactive").await;
    session.send_keys(["abc"]).await.unwrap();

    session
        .expect_absent_within("xyz", Duration::from_secs(1))
        .await
        .unwrap();

    let err = session
        .expect_absent_within("abc", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PatternStillPresent { .. }));

    session.terminate().await.unwrap();
}

#[tokio::test]
async fn subprocess_exit_during_expect_is_not_an_error() {
    let mut session = spawn_fake("done").await;
    session.send_keys(["finished"]).await.unwrap();

    // The exitCode event still queued from startup must not fail the wait
    session.expect("finished").await.unwrap();
    assert_eq!(session.exit().await.unwrap(), 0);
}

// -- Shutdown ----------------------------------------------------------------

#[tokio::test]
async fn exit_is_idempotent() {
    let mut session = spawn_fake("done").await;

    let first = session.exit().await.unwrap();
    let start = Instant::now();
    let second = session.exit().await.unwrap();

    assert_eq!(first, 0);
    assert_eq!(first, second);
    assert_eq!(session.exit_code(), Some(0));
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn forced_exit_reports_negative_signal() {
    let mut session = spawn_fake("interactive").await;
    let controller = session.controller_pid().unwrap();
    assert!(!session.subprocess_exited());

    let code = session.exit().await.unwrap();
    assert_eq!(code, -15);
    assert_eq!(session.terminate().await.unwrap(), -15);

    assert!(!process_alive(controller));
}

#[tokio::test]
async fn with_session_always_exits() {
    let (controller, subprocess, text) = with_session(fake_config("interactive"), |s| {
        Box::pin(async move {
            s.send_keys(["scoped"]).await?;
            let snapshot = s.snapshot().await?;
            Ok((s.controller_pid(), s.subprocess_pid(), snapshot.text))
        })
    })
    .await
    .unwrap();

    assert_eq!(text, "scoped");
    assert!(!process_alive(controller.unwrap()));
    assert!(!process_running(subprocess.unwrap()));
}

#[tokio::test]
async fn with_session_body_error_wins() {
    let mut pids = None;
    let err = with_session(fake_config("interactive"), |s| {
        pids = Some((s.controller_pid(), s.subprocess_pid()));
        Box::pin(async move {
            s.expect_within("never", Duration::from_millis(200)).await?;
            Ok(())
        })
    })
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::PatternTimeout { .. }));
    let (controller, subprocess) = pids.unwrap();
    assert!(!process_alive(controller.unwrap()));
    assert!(!process_running(subprocess.unwrap()));
}

#[tokio::test]
async fn missing_binary_is_spawn_failure() {
    let config = SessionConfig::new(["true"]).with_ht_path("/nonexistent/dir/ht");
    let err = htty_session::Session::spawn(config).await.unwrap_err();
    assert!(matches!(err, SessionError::SpawnFailed(_)));
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let config = SessionConfig::new(Vec::<String>::new()).with_ht_path(fake_ht());
    let err = htty_session::Session::spawn(config).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidConfig(_)));
}
