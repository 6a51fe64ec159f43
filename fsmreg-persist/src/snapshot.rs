//! Snapshot storage.
//!
//! Each snapshot is a small JSON document holding one automaton record
//! nested under `"automaton"`, written to `<dir>/<name>.snap`. An index
//! file keeps a crc32c of every snapshot so that torn or edited files are
//! detected on load.

use crate::adapter::{serialize, AutomatonRecord};
use crate::error::PersistError;
use crate::json::{JsonStateReader, JsonStateWriter};
use crate::record::{StateReader, StateWriter};
use fsmreg_core::Automaton;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Field under which the automaton record is nested.
pub const SNAPSHOT_LEVEL: &str = "automaton";

/// Snapshot metadata stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub name: String,
    pub machine: String,
    pub state: usize,
    pub size_bytes: u64,
    pub checksum: String,
}

/// File-backed store of named automaton snapshots.
pub struct SnapshotStore {
    dir: PathBuf,
    /// Snapshot name -> metadata of the latest write.
    index: RwLock<BTreeMap<String, SnapshotMeta>>,
}

impl SnapshotStore {
    /// Opens or creates a snapshot store at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            index: RwLock::new(BTreeMap::new()),
        };
        store.load_index()?;

        Ok(store)
    }

    fn load_index(&self) -> Result<(), PersistError> {
        let index_path = self.dir.join("index.json");
        if !index_path.exists() {
            return Ok(());
        }

        let file = File::open(&index_path)?;
        let index: BTreeMap<String, SnapshotMeta> =
            serde_json::from_reader(BufReader::new(file))?;
        *self.index.write() = index;

        Ok(())
    }

    fn save_index(&self, index: &BTreeMap<String, SnapshotMeta>) -> Result<(), PersistError> {
        let index_path = self.dir.join("index.json");
        let tmp_path = self.dir.join("index.json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, index)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &index_path)?;
        Ok(())
    }

    /// Writes a snapshot of `automaton` under `name`, replacing any
    /// previous one.
    pub fn save(&self, name: &str, automaton: &Automaton) -> Result<SnapshotMeta, PersistError> {
        validate_name(name)?;

        let record = serialize(automaton);
        let data = JsonStateWriter::persist(|writer| {
            writer.write_level(SNAPSHOT_LEVEL, &|level| record.write(level));
        })?;
        let checksum = format!("{:08x}", crc32c::crc32c(data.as_bytes()));

        let meta = SnapshotMeta {
            name: name.to_string(),
            machine: record.machine,
            state: record.state,
            size_bytes: data.len() as u64,
            checksum,
        };

        // The index lock guards the snapshot file as well as the index, so
        // the file on disk always matches the checksum recorded for it.
        let mut index = self.index.write();

        let path = self.snapshot_path(name);
        let tmp_path = path.with_extension("snap.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        index.insert(name.to_string(), meta.clone());
        self.save_index(&index)?;
        drop(index);

        tracing::debug!(
            "Saved snapshot {} (state {}, {} bytes)",
            name,
            meta.state,
            meta.size_bytes
        );

        Ok(meta)
    }

    /// Loads the record stored under `name`, verifying its checksum.
    pub fn load(&self, name: &str) -> Result<AutomatonRecord, PersistError> {
        validate_name(name)?;

        let index = self.index.read();
        let expected = index
            .get(name)
            .map(|meta| meta.checksum.clone())
            .ok_or_else(|| PersistError::SnapshotNotFound(name.to_string()))?;

        let path = self.snapshot_path(name);
        if !path.exists() {
            return Err(PersistError::SnapshotNotFound(name.to_string()));
        }
        let data = fs::read(&path)?;
        drop(index);

        let actual = format!("{:08x}", crc32c::crc32c(&data));
        if actual != expected {
            return Err(PersistError::Corruption(format!(
                "snapshot {} checksum mismatch",
                name
            )));
        }

        let value: serde_json::Value = serde_json::from_slice(&data)?;
        let reader = JsonStateReader::new(&value)?;
        let mut result = None;
        let found = reader.read_level(SNAPSHOT_LEVEL, &mut |level| {
            result = Some(AutomatonRecord::read(level));
            true
        });
        if !found {
            return Err(PersistError::restore(format!(
                "snapshot {} has no '{}' record",
                name, SNAPSHOT_LEVEL
            )));
        }
        result.unwrap_or_else(|| Err(PersistError::restore("empty snapshot record")))
    }

    /// Restores `automaton` from the snapshot stored under `name`.
    pub fn restore(&self, name: &str, automaton: &mut Automaton) -> Result<(), PersistError> {
        let record = self.load(name)?;
        *automaton = crate::adapter::deserialize(&record, automaton)?;
        Ok(())
    }

    /// Gets snapshot metadata by name.
    pub fn meta(&self, name: &str) -> Option<SnapshotMeta> {
        self.index.read().get(name).cloned()
    }

    /// Lists all snapshot metadata, ordered by name.
    pub fn list(&self) -> Vec<SnapshotMeta> {
        self.index.read().values().cloned().collect()
    }

    /// Deletes a snapshot.
    pub fn delete(&self, name: &str) -> Result<(), PersistError> {
        validate_name(name)?;

        let mut index = self.index.write();

        let path = self.snapshot_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        index.remove(name);
        self.save_index(&index)?;

        Ok(())
    }

    /// Returns the number of snapshots stored.
    pub fn snapshot_count(&self) -> usize {
        self.index.read().len()
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.snap", name))
    }
}

fn validate_name(name: &str) -> Result<(), PersistError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(PersistError::InvalidName(name.to_string()))
    }
}
