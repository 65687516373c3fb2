//! Shared helpers: a scripted stand-in for the ht controller.

#![allow(dead_code)]

use htty_session::{Session, SessionConfig, SessionError, Timing};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;

/// Speaks the JSON-lines protocol well enough for lifecycle tests.
///
/// The last argument selects a behaviour:
/// - `interactive`: a long-running subprocess; keys are echoed into the screen
/// - `delayed`: like `interactive`, plus `ready` is printed after 300ms
/// - `done`: the subprocess has already exited when the session starts
/// - `silent`: never answers `takeSnapshot`
/// - `slow`: answers `takeSnapshot` 300ms late, with the screen as it was when asked
/// - `flood`: the first snapshot shows an empty screen and is followed by a
///   burst of `noise` output; later snapshots show `ready`
/// - `crash`: the controller exits with code 3 right after reporting a pid
const FAKE_HT: &str = r#"#!/bin/sh
while [ "$#" -gt 0 ] && [ "$1" != "--" ]; do shift; done
[ "$1" = "--" ] && shift
MODE="${1:-interactive}"

printf '{"type":"init","data":{}}\n'
echo "fake ht starting in $MODE mode" >&2

case "$MODE" in
  crash)
    printf '{"type":"pid","data":{"pid":%s}}\n' "$$"
    exit 3 ;;
  done)
    true &
    DONE=$!
    wait "$DONE"
    printf '{"type":"pid","data":{"pid":%s}}\n' "$DONE"
    printf '{"type":"exitCode","data":{"exitCode":0}}\n'
    printf '{"type":"commandCompleted"}\n' ;;
  *)
    # Double fork so the subprocess is not our child and is reaped on death
    SUB=$(sh -c 'sleep 1000 </dev/null >/dev/null 2>&1 & echo $!')
    printf '{"type":"pid","data":{"pid":%s}}\n' "$SUB"
    (
      while kill -0 "$SUB" 2>/dev/null; do sleep 0.05; done
      printf '{"type":"exitCode","data":{"exitCode":143}}\n'
    ) &
    if [ "$MODE" = delayed ]; then
      ( sleep 0.3; printf '{"type":"output","data":{"seq":"ready\\r\\n"}}\n' ) &
    fi ;;
esac

printf 'this line is not json\n'

SCREEN=""
SNAPS=0
while IFS= read -r line; do
  case "$line" in
    *'"sendKeys"'*)
      keys=$(printf '%s\n' "$line" | sed -e 's/.*"keys":\[//' -e 's/\].*//' -e 's/","/ /g' -e 's/"//g')
      for key in $keys; do
        case "$key" in
          Enter) key='\n' ;;
        esac
        SCREEN="$SCREEN$key"
        printf '{"type":"output","data":{"seq":"%s"}}\n' "$key"
      done ;;
    *'"takeSnapshot"'*)
      case "$MODE" in
        silent) continue ;;
        slow)
          ( sleep 0.3; printf '{"type":"snapshot","data":{"text":"%s","seq":"%s"}}\n' "$SCREEN" "$SCREEN" ) &
          continue ;;
        flood)
          SNAPS=$((SNAPS + 1))
          if [ "$SNAPS" -gt 1 ]; then
            printf '{"type":"snapshot","data":{"text":"ready","seq":"ready"}}\n'
          else
            printf '{"type":"snapshot","data":{"text":"","seq":""}}\n'
            i=0
            while [ "$i" -lt 12 ]; do
              printf '{"type":"output","data":{"seq":"noise"}}\n'
              i=$((i + 1))
            done
          fi
          continue ;;
      esac
      printf '{"type":"snapshot","data":{"text":"%s","seq":"%s"}}\n' "$SCREEN" "$SCREEN" ;;
    *'"exit"'*)
      [ -n "$SUB" ] && kill "$SUB" 2>/dev/null
      exit 0 ;;
  esac
done

[ -n "$SUB" ] && kill "$SUB" 2>/dev/null
exit 0
"#;

static FAKE_DIR: OnceLock<TempDir> = OnceLock::new();

/// Path to the fake controller, written once per test binary.
pub fn fake_ht() -> PathBuf {
    let dir = FAKE_DIR.get_or_init(|| {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("fake-ht");
        std::fs::write(&path, FAKE_HT).expect("Failed to write fake controller");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake controller executable");
        dir
    });
    dir.path().join("fake-ht")
}

/// Short bounds so failure paths finish quickly.
pub fn fast_timing() -> Timing {
    Timing {
        settle_delay: Duration::from_millis(20),
        snapshot_timeout: Duration::from_secs(2),
        snapshot_retry_timeout: Duration::from_millis(200),
        max_snapshot_retries: 10,
        exit_timeout: Duration::from_secs(2),
        exit_grace_window: Duration::from_millis(100),
        subprocess_wait_timeout: Duration::from_secs(1),
        expect_timeout: Duration::from_secs(2),
        expect_poll_slice: Duration::from_millis(50),
        expect_snapshot_every: 10,
        startup_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
    }
}

pub fn fake_config(mode: &str) -> SessionConfig {
    SessionConfig::new([mode])
        .with_size(4, 20)
        .with_ht_path(fake_ht())
        .with_timing(fast_timing())
}

/// Spawn against the fake controller.
///
/// Retries on ETXTBSY, which a parallel test can cause by forking while
/// the script is still open for writing.
pub async fn spawn_fake(mode: &str) -> Session {
    spawn_config(fake_config(mode)).await
}

pub async fn spawn_config(config: SessionConfig) -> Session {
    let mut attempts = 0;
    loop {
        match Session::spawn(config.clone()).await {
            Ok(session) => return session,
            Err(SessionError::SpawnFailed(e)) if e.raw_os_error() == Some(26) && attempts < 5 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Failed to spawn fake controller: {}", e),
        }
    }
}

pub fn process_alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Alive and not a zombie waiting to be reaped.
pub fn process_running(pid: u32) -> bool {
    if !process_alive(pid) {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // State is the first field after the parenthesised command name
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}
