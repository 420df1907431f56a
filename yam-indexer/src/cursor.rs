//! Sync cursor persistence.
//!
//! The data directory contains a `cursor.json` that records the last
//! fully-indexed block and every block range indexed so far, so that
//! subsequent runs only fetch the delta and gaps stay visible.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Inclusive range of blocks whose logs have been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    /// First block of the range.
    pub from: u64,
    /// Last block of the range.
    pub to: u64,
}

/// Sync progress of the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The last block whose records have been fully flushed.
    pub last_block: u64,
    /// Unix timestamp (seconds) of the last successful sync.
    pub synced_at: u64,
    /// Indexed ranges, sorted by block and disjoint.
    #[serde(default)]
    pub ranges: Vec<BlockRange>,
}

impl Cursor {
    /// Record that `[from, to]` has been indexed and stamp the current time.
    ///
    /// Ranges stay sorted and disjoint: the new range absorbs every range it
    /// overlaps or touches, so a range already covered changes nothing and a
    /// back-filled gap closes. Unindexed gaps remain as separate ranges.
    pub fn advance(&mut self, from: u64, to: u64) {
        let mut merged = BlockRange { from, to };
        self.ranges.retain(|r| {
            let touches = r.from <= to.saturating_add(1) && from <= r.to.saturating_add(1);
            if touches {
                merged.from = merged.from.min(r.from);
                merged.to = merged.to.max(r.to);
            }
            !touches
        });
        let at = self.ranges.partition_point(|r| r.to < merged.from);
        self.ranges.insert(at, merged);

        self.last_block = self.last_block.max(to);
        self.synced_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
    }

    /// Read cursor from `<dir>/cursor.json`.
    ///
    /// Returns `None` if the file does not exist (first sync) or contains
    /// invalid JSON (logs a warning and triggers fresh sync).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read (I/O error).
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join("cursor.json");
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        match serde_json::from_str::<Self>(&data) {
            Ok(cursor) => Ok(Some(cursor)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupted cursor, starting fresh");
                Ok(None)
            }
        }
    }

    /// Persist cursor to `<dir>/cursor.json` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join("cursor.json");
        let tmp = dir.join("cursor.json.tmp");

        std::fs::write(&tmp, serde_json::to_string_pretty(self)?.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(cursor: &Cursor) -> Vec<(u64, u64)> {
        cursor.ranges.iter().map(|r| (r.from, r.to)).collect()
    }

    #[test]
    fn contiguous_ranges_merge() {
        let mut cursor = Cursor::default();
        cursor.advance(10, 19);
        cursor.advance(20, 29);
        cursor.advance(25, 40);
        assert_eq!(ranges(&cursor), vec![(10, 40)], "adjacent and overlapping ranges merge");
        assert_eq!(cursor.last_block, 40, "last block tracks the tip");
    }

    #[test]
    fn gaps_and_covered_ranges() {
        let mut cursor = Cursor::default();
        cursor.advance(10, 19);
        cursor.advance(30, 39);
        assert_eq!(ranges(&cursor), vec![(10, 19), (30, 39)], "gap opens a new range");

        cursor.advance(31, 35);
        assert_eq!(ranges(&cursor), vec![(10, 19), (30, 39)], "covered range ignored");
        assert_eq!(cursor.last_block, 39, "last block unchanged");
    }

    #[test]
    fn backfilled_ranges_stay_sorted_and_merge() {
        let mut cursor = Cursor::default();
        cursor.advance(100, 200);
        cursor.advance(50, 80);
        assert_eq!(ranges(&cursor), vec![(50, 80), (100, 200)], "back-fill inserted in order");
        assert_eq!(cursor.last_block, 200, "back-fill does not move the tip");

        cursor.advance(50, 300);
        assert_eq!(ranges(&cursor), vec![(50, 300)], "spanning range absorbs both");
        assert_eq!(cursor.last_block, 300, "tip follows the widest range");
    }

    #[test]
    fn backfill_closing_a_gap_joins_neighbours() {
        let mut cursor = Cursor::default();
        cursor.advance(10, 19);
        cursor.advance(40, 49);
        cursor.advance(60, 69);
        cursor.advance(20, 39);
        assert_eq!(ranges(&cursor), vec![(10, 49), (60, 69)], "adjacent ranges joined");

        cursor.advance(0, 5);
        assert_eq!(ranges(&cursor), vec![(0, 5), (10, 49), (60, 69)], "leading gap kept");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Cursor::load(dir.path()).unwrap().is_none(), "no cursor yet");

        let mut cursor = Cursor::default();
        cursor.advance(1, 5);
        cursor.save(dir.path()).unwrap();

        assert_eq!(Cursor::load(dir.path()).unwrap(), Some(cursor), "persisted");
        assert!(!dir.path().join("cursor.json.tmp").exists(), "temp file renamed away");
    }

    #[test]
    fn corrupted_cursor_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cursor.json"), "{not json").unwrap();
        assert!(Cursor::load(dir.path()).unwrap().is_none(), "corruption is not fatal");
    }
}
