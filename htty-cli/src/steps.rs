//! Steps run against the session, in command-line order.

use clap::ArgMatches;
use htty_session::{key_to_wire, Session, SessionError, SnapshotResult};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// Line printed after every snapshot
pub const SNAPSHOT_SEPARATOR: &str = "----";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Text,
    Html,
    Raw,
}

impl SnapshotFormat {
    fn from_arg(value: &str) -> Self {
        match value {
            "html" => SnapshotFormat::Html,
            "raw" => SnapshotFormat::Raw,
            _ => SnapshotFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Delimited key names and literal text
    Keys(String),
    Snapshot(SnapshotFormat),
    Expect(String),
    ExpectAbsent(String),
}

/// Collect the step options in the order they appeared.
///
/// Relies on clap recording an index for every occurrence of an appended
/// argument, so interleaved `-k` and `--snapshot` keep their order.
pub fn ordered(matches: &ArgMatches) -> Vec<Step> {
    let mut indexed = Vec::new();
    collect(matches, "keys", Step::Keys, &mut indexed);
    collect(
        matches,
        "snapshot",
        |v| Step::Snapshot(SnapshotFormat::from_arg(&v)),
        &mut indexed,
    );
    collect(matches, "expect", Step::Expect, &mut indexed);
    collect(matches, "expect_absent", Step::ExpectAbsent, &mut indexed);
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, step)| step).collect()
}

fn collect(
    matches: &ArgMatches,
    id: &str,
    make: impl Fn(String) -> Step,
    out: &mut Vec<(usize, Step)>,
) {
    if let (Some(values), Some(indices)) =
        (matches.get_many::<String>(id), matches.indices_of(id))
    {
        out.extend(indices.zip(values.cloned().map(make)));
    }
}

/// Split a `-k` argument into keys, dropping empty pieces.
pub fn split_keys(keys: &str, delimiter: &str) -> Vec<String> {
    keys.split(delimiter)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a `-k` argument and turn key names (`Enter`, `page_up`) into wire strings.
pub fn wire_keys(keys: &str, delimiter: &str) -> Vec<String> {
    split_keys(keys, delimiter)
        .iter()
        .map(|k| key_to_wire(k))
        .collect()
}

pub struct StepRunner {
    pub delimiter: String,
    pub expect_timeout: Duration,
}

impl StepRunner {
    /// Run every step, then print a final snapshot if none was requested.
    pub async fn run(&self, session: &mut Session, steps: &[Step]) -> Result<(), SessionError> {
        for step in steps {
            debug!("Running step {:?}", step);
            match step {
                Step::Keys(keys) => self.send_keys(session, keys).await?,
                Step::Snapshot(format) => print_snapshot(session, *format).await,
                Step::Expect(pattern) => {
                    session.expect_within(pattern, self.expect_timeout).await?
                }
                Step::ExpectAbsent(pattern) => {
                    session
                        .expect_absent_within(pattern, self.expect_timeout)
                        .await?
                }
            }
        }

        if !steps.iter().any(|s| matches!(s, Step::Snapshot(_))) {
            if let Err(e) = session.wait_for_subprocess(self.expect_timeout).await {
                debug!("Taking final snapshot anyway: {}", e);
            }
            print_snapshot(session, SnapshotFormat::Text).await;
        }
        Ok(())
    }

    async fn send_keys(&self, session: &mut Session, keys: &str) -> Result<(), SessionError> {
        let keys = wire_keys(keys, &self.delimiter);
        if keys.is_empty() {
            return Ok(());
        }
        if session.subprocess_exited() {
            warn!("Subprocess has exited, not sending keys: {}", keys.join(&self.delimiter));
            return Ok(());
        }
        session.send_keys(keys).await
    }
}

/// Print a snapshot followed by the separator.
///
/// A failed snapshot is logged and still produces the separator, so the
/// output keeps one block per requested snapshot.
async fn print_snapshot(session: &mut Session, format: SnapshotFormat) {
    match session.snapshot().await {
        Ok(snapshot) => {
            let mut out = std::io::stdout().lock();
            if let Err(e) = write_snapshot(&mut out, &snapshot, format) {
                warn!("Failed to write snapshot: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to take snapshot: {}", e);
            println!("{}", SNAPSHOT_SEPARATOR);
        }
    }
}

pub fn write_snapshot(
    out: &mut impl Write,
    snapshot: &SnapshotResult,
    format: SnapshotFormat,
) -> std::io::Result<()> {
    match format {
        SnapshotFormat::Text => {
            for line in snapshot.trimmed_lines() {
                writeln!(out, "{}", line)?;
            }
        }
        SnapshotFormat::Html => writeln!(out, "{}", snapshot.html)?,
        SnapshotFormat::Raw => writeln!(out, "{}", snapshot.raw_seq)?,
    }
    writeln!(out, "{}", SNAPSHOT_SEPARATOR)?;
    out.flush()
}
