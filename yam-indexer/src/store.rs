//! Parquet-backed [`RecordStore`].
//!
//! Records live in memory while a sync round runs and are written out by
//! [`ParquetStore::flush`], one file per record kind:
//!
//! ```text
//! <data_dir>/
//!   ├── cursor.json
//!   ├── offer_created.parquet
//!   ├── offer_accepted.parquet
//!   ├── offer_deleted.parquet
//!   └── offer_updated.parquet
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use yam::record::{AnyRecord, RecordKind};
use yam::{MemoryStore, RecordStore};

use crate::parquet;

/// Record store persisted as Parquet files in a directory.
#[derive(Debug)]
pub struct ParquetStore {
    dir: PathBuf,
    records: MemoryStore,
    dirty: BTreeSet<RecordKind>,
}

impl ParquetStore {
    /// Open the store in `dir`, loading every existing record file.
    ///
    /// Missing files are treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or holds rows
    /// that do not parse back into records.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut records = MemoryStore::new();
        for kind in RecordKind::ALL {
            let path = file_path(dir, kind);
            for batch in parquet::read(&path)? {
                let rows = parquet::batch_to_records(kind, &batch)
                    .with_context(|| format!("loading {}", path.display()))?;
                records.extend(rows);
            }
        }
        tracing::debug!(dir = %dir.display(), records = records.len(), "store opened");
        Ok(Self {
            dir: dir.to_owned(),
            records,
            dirty: BTreeSet::new(),
        })
    }

    /// Everything stored so far, including unflushed upserts.
    #[must_use]
    pub const fn records(&self) -> &MemoryStore {
        &self.records
    }

    /// Whether upserts are waiting to be flushed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Rewrite the file of every kind touched since the last flush.
    ///
    /// Rows are written in chain order. Each file is replaced atomically;
    /// a kind stays pending until its file is written.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the Parquet writer rejects the data.
    pub fn flush(&mut self) -> Result<()> {
        while let Some(kind) = self.dirty.first().copied() {
            let mut rows: Vec<&AnyRecord> =
                self.records.iter().filter(|r| r.kind() == kind).collect();
            rows.sort_by_key(|r| r.position());

            let batch = parquet::records_to_batch(kind, &rows)?;
            let path = file_path(&self.dir, kind);
            parquet::write(&path, kind, &[batch])?;
            tracing::debug!(file = %path.display(), rows = rows.len(), "flushed");

            self.dirty.remove(&kind);
        }
        Ok(())
    }
}

impl RecordStore for ParquetStore {
    fn upsert(&mut self, id: &str, record: AnyRecord) -> yam::Result<()> {
        self.dirty.insert(record.kind());
        self.records.upsert(id, record)
    }
}

fn file_path(dir: &Path, kind: RecordKind) -> PathBuf {
    dir.join(format!("{}.parquet", kind.table_name()))
}
