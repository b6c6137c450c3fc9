//! Save files for the authoritative game and the high score table.
//!
//! Games are stored as `.twsave` files: a 14-byte header (magic, version,
//! CRC32 of the payload, payload length) followed by a zstd-compressed
//! bincode payload. High scores are stored as JSON, one flat attribute map
//! per record, so missing fields load with their documented defaults.

use crate::game::Game;
use anyhow::{Context, Result};
use crc32fast::Hasher;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tradewind_core::{Element, ElementCodec, HighScore, HighScoreTable};

/// Magic number for save file identification ("TWSG").
const SAVE_MAGIC: u32 = 0x5457_5347;

/// Current save file format version.
const SAVE_VERSION: u16 = 1;

const HEADER_LEN: usize = 14;

#[derive(Debug, Clone)]
struct SaveHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl SaveHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: SAVE_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&self.magic.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            anyhow::bail!("Save header too short");
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != SAVE_MAGIC {
            anyhow::bail!(
                "Invalid save magic: expected 0x{:08X}, got 0x{:08X}",
                SAVE_MAGIC,
                magic
            );
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SAVE_VERSION {
            anyhow::bail!("Unsupported save version {version}");
        }
        let crc32 = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload_len = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        Ok(Self {
            magic,
            version,
            crc32,
            payload_len,
        })
    }
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Directory holding named save files.
pub struct SaveStore {
    save_dir: PathBuf,
}

impl SaveStore {
    /// Open (creating if needed) a save directory.
    pub fn new<P: AsRef<Path>>(save_dir: P) -> Result<Self> {
        let save_dir = save_dir.as_ref().to_path_buf();
        fs::create_dir_all(&save_dir).context("Failed to create save directory")?;
        Ok(Self { save_dir })
    }

    fn game_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{name}.twsave"))
    }

    fn high_score_path(&self) -> PathBuf {
        self.save_dir.join("high_scores.json")
    }

    /// Write `game` under `name`, replacing any earlier save.
    pub fn save_game(&self, name: &str, game: &Game) -> Result<()> {
        let serialized = bincode::serialize(game).context("Failed to serialize game")?;
        let compressed =
            zstd::encode_all(&serialized[..], 3).context("Failed to compress game")?;
        let payload_len =
            u32::try_from(compressed.len()).context("Save payload exceeds 4 GiB")?;
        let header = SaveHeader::new(checksum(&compressed), payload_len);

        let path = self.game_path(name);
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create save file {}", path.display()))?;
        file.write_all(&header.to_bytes())
            .context("Failed to write save header")?;
        file.write_all(&compressed)
            .context("Failed to write save payload")?;
        Ok(())
    }

    /// Load the game saved under `name`.
    pub fn load_game(&self, name: &str) -> Result<Game> {
        let path = self.game_path(name);
        let mut file = File::open(&path)
            .with_context(|| format!("Failed to open save file {}", path.display()))?;

        let mut header_bytes = [0u8; HEADER_LEN];
        file.read_exact(&mut header_bytes)
            .context("Failed to read save header")?;
        let header = SaveHeader::from_bytes(&header_bytes)?;

        let mut compressed = vec![0u8; header.payload_len as usize];
        file.read_exact(&mut compressed)
            .context("Failed to read save payload")?;

        let computed_crc = checksum(&compressed);
        if computed_crc != header.crc32 {
            anyhow::bail!(
                "CRC32 mismatch: expected {:08X}, got {:08X}",
                header.crc32,
                computed_crc
            );
        }

        let decompressed =
            zstd::decode_all(&compressed[..]).context("Failed to decompress save")?;
        bincode::deserialize(&decompressed).context("Failed to deserialize game")
    }

    /// Whether a save named `name` exists.
    pub fn game_exists(&self, name: &str) -> bool {
        self.game_path(name).exists()
    }

    /// Write the high score table.
    pub fn save_high_scores(&self, table: &HighScoreTable) -> Result<()> {
        let records: Vec<BTreeMap<String, String>> = table
            .scores()
            .iter()
            .map(|score| score.to_element().attributes().iter().cloned().collect())
            .collect();
        let json =
            serde_json::to_string_pretty(&records).context("Failed to serialize high scores")?;
        fs::write(self.high_score_path(), json).context("Failed to write high scores")
    }

    /// Load the high score table; a missing file is an empty table.
    pub fn load_high_scores(&self) -> Result<HighScoreTable> {
        let path = self.high_score_path();
        if !path.exists() {
            return Ok(HighScoreTable::new());
        }
        let json = fs::read_to_string(&path).context("Failed to read high scores")?;
        let records: Vec<BTreeMap<String, String>> =
            serde_json::from_str(&json).context("Failed to parse high scores")?;

        let mut table = HighScoreTable::new();
        for (index, record) in records.into_iter().enumerate() {
            let element = record
                .into_iter()
                .fold(Element::new(HighScore::TAG), |element, (name, value)| {
                    element.with_attr(&name, value)
                });
            let score = HighScore::from_element(&element)
                .with_context(|| format!("Invalid high score record #{index}"))?;
            table.insert(score);
        }
        Ok(table)
    }
}
