//! Deterministic replay log.
//!
//! Every submission the authority sees is written as one JSONL line: the
//! submitting player, the message element and a summary of the verdict.
//! The first line stamps the protocol schema hash, the game seed and a
//! digest of the initial state. Re-dispatching the log against the same
//! initial state must reproduce every verdict bit for bit.

use crate::authority::{Authority, Dispatch, Verdict};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use tradewind_core::{DeltaSet, Element, ObjectId};
use tradewind_net::{compute_schema_hash, ErrorKind, Message};
use tradewind_world::{Game, GameLogic};

/// Hex blake3 digest of the JSON form of `game`.
pub fn game_digest(game: &Game) -> Result<String> {
    let json = serde_json::to_vec(game).context("Failed to serialize game for digest")?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Hex blake3 digest of the postcard form of `delta`.
pub fn delta_digest(delta: &DeltaSet) -> Result<String> {
    let bytes = postcard::to_allocvec(delta)
        .map_err(|err| anyhow::anyhow!("Failed to serialize delta: {err}"))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// First line of a replay log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayHeader {
    /// Protocol schema hash of the recording authority.
    pub schema_hash: u64,
    /// Game seed.
    pub seed: u64,
    /// Digest of the state before the first submission.
    pub initial_state: String,
}

/// Recorded verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum RecordedOutcome {
    /// Applied, producing `records` change records.
    Accepted {
        /// Number of change records.
        records: usize,
        /// Digest of the delta set.
        delta_digest: String,
    },
    /// Refused.
    Rejected {
        /// Error category.
        kind: ErrorKind,
        /// Reason sent to the client.
        reason: String,
    },
}

impl RecordedOutcome {
    /// Summarize a dispatch.
    pub fn of(dispatch: &Dispatch) -> Result<Self> {
        Ok(match &dispatch.verdict {
            Verdict::Accepted { delta } => RecordedOutcome::Accepted {
                records: delta.len(),
                delta_digest: delta_digest(delta)?,
            },
            Verdict::Rejected(error) => RecordedOutcome::Rejected {
                kind: error.kind(),
                reason: error.reason().to_string(),
            },
        })
    }
}

/// One submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEntry {
    /// Position in the log, from zero.
    pub sequence: u64,
    /// Game turn at submission.
    pub turn: u32,
    /// Submitting player.
    pub player: ObjectId,
    /// The message as received.
    pub message: Element,
    /// What the authority decided.
    pub outcome: RecordedOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayLine {
    Header(ReplayHeader),
    Entry(ReplayEntry),
}

/// Writes a replay log.
pub struct ReplayRecorder {
    writer: BufWriter<File>,
    entries_written: u64,
}

impl ReplayRecorder {
    /// Create a log at `path` for a game starting from `game`.
    pub fn create(path: impl AsRef<Path>, game: &Game) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create replay log: {:?}", path.as_ref()))?;
        let mut recorder = Self {
            writer: BufWriter::new(file),
            entries_written: 0,
        };
        let header = ReplayHeader {
            schema_hash: compute_schema_hash(),
            seed: game.seed(),
            initial_state: game_digest(game)?,
        };
        recorder.write_line(&ReplayLine::Header(header))?;
        Ok(recorder)
    }

    /// Record one dispatched submission and flush it.
    pub fn record(
        &mut self,
        turn: u32,
        player: &ObjectId,
        message: &Message,
        dispatch: &Dispatch,
    ) -> Result<()> {
        let entry = ReplayEntry {
            sequence: self.entries_written,
            turn,
            player: player.clone(),
            message: message.to_element(),
            outcome: RecordedOutcome::of(dispatch)?,
        };
        self.write_line(&ReplayLine::Entry(entry))?;
        // Each entry reaches the file before the next command runs.
        self.writer.flush()?;
        self.entries_written += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &ReplayLine) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line)?;
        writeln!(&mut self.writer)?;
        Ok(())
    }

    /// Flush buffered writes.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Get number of entries written.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }
}

/// Divergence between a recorded and a replayed verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    /// Entry sequence number.
    pub sequence: u64,
    /// Recorded outcome.
    pub expected: RecordedOutcome,
    /// Outcome on replay.
    pub actual: RecordedOutcome,
}

/// A loaded replay log.
#[derive(Debug, Clone)]
pub struct ReplayPlayer {
    header: ReplayHeader,
    entries: Vec<ReplayEntry>,
}

impl ReplayPlayer {
    /// Load a replay from a JSONL file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open replay file: {:?}", path.as_ref()))?;
        let reader = BufReader::new(file);

        let mut header = None;
        let mut entries = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ReplayLine = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            match (parsed, header.is_some()) {
                (ReplayLine::Header(h), false) => header = Some(h),
                (ReplayLine::Header(_), true) => {
                    bail!("Duplicate replay header at line {}", line_num + 1)
                }
                (ReplayLine::Entry(_), false) => {
                    bail!("Replay entry before header at line {}", line_num + 1)
                }
                (ReplayLine::Entry(entry), true) => entries.push(entry),
            }
        }

        let header = header.context("Replay log has no header")?;
        Ok(Self { header, entries })
    }

    /// Log header.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Recorded submissions in order.
    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    /// Re-dispatch every entry on `authority`, which must hold the initial
    /// state the log was recorded from. Returns the divergent entries.
    pub fn verify<L: GameLogic>(
        &self,
        authority: &mut Authority<L>,
    ) -> Result<Vec<ReplayMismatch>> {
        if self.header.schema_hash != compute_schema_hash() {
            bail!(
                "Schema hash mismatch: log {:016x}, local {:016x}",
                self.header.schema_hash,
                compute_schema_hash()
            );
        }
        let initial = game_digest(authority.game())?;
        if initial != self.header.initial_state {
            bail!("Initial state differs from the recorded game");
        }

        let mut mismatches = Vec::new();
        for entry in &self.entries {
            let message = Message::decode(&entry.message)
                .with_context(|| format!("Entry {} holds an invalid message", entry.sequence))?;
            let dispatch = authority.dispatch(&entry.player, message);
            let actual = RecordedOutcome::of(&dispatch)?;
            if actual != entry.outcome {
                warn!(sequence = entry.sequence, "replay diverged");
                mismatches.push(ReplayMismatch {
                    sequence: entry.sequence,
                    expected: entry.outcome.clone(),
                    actual,
                });
            } else {
                debug!(sequence = entry.sequence, "replay entry matched");
            }
        }
        info!(
            entries = self.entries.len(),
            mismatches = mismatches.len(),
            "replay verified"
        );
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tradewind_net::HighScoresMessage;
    use tradewind_testkit::scenario;

    fn temp_log(label: &str) -> std::path::PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        env::temp_dir().join(format!("tradewind_replay_{label}_{timestamp}.jsonl"))
    }

    #[test]
    fn entries_before_header_are_rejected() {
        let path = temp_log("no_header");
        std::fs::write(
            &path,
            r#"{"type":"entry","sequence":0,"turn":1,"player":"player:1","message":{"tag":"highScores","attributes":[],"children":[]},"outcome":{"verdict":"accepted","records":0,"delta_digest":""}}"#,
        )
        .unwrap();
        let err = ReplayPlayer::load(&path).unwrap_err();
        assert!(err.to_string().contains("before header"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn record_and_reload() {
        let scenario = scenario();
        let path = temp_log("reload");
        let mut authority = Authority::new(scenario.game.clone());
        let mut recorder = ReplayRecorder::create(&path, authority.game()).unwrap();

        let message: Message = HighScoresMessage::query().into();
        let dispatch = authority.dispatch(&scenario.ids.p1, message.clone());
        recorder.record(1, &scenario.ids.p1, &message, &dispatch).unwrap();
        recorder.flush().unwrap();
        assert_eq!(recorder.entries_written(), 1);

        let player = ReplayPlayer::load(&path).unwrap();
        assert_eq!(player.header().seed, scenario.game.seed());
        assert_eq!(player.entries().len(), 1);
        assert_eq!(player.entries()[0].message, message.to_element());

        let mut fresh = Authority::new(scenario.game);
        assert!(player.verify(&mut fresh).unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }
}
