//! Strategy file format.
//!
//! A deterministic binary archive of a keyed map: one leading header byte
//! recording the persisted scalar width (so 32- or 64-bit variants of this
//! format stay distinguishable across builds), followed by a bincode-encoded
//! `Vec<PersistedEntry>` sorted by key for byte-for-byte reproducibility.
//! Writes go to a temp file followed by a rename so a reader never observes
//! a partially written snapshot.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::Options;

use crate::error::TrainerError;
use crate::node::{InfoSetNode, PersistedEntry};
use crate::table::NodeTable;

const SCALAR_WIDTH_F32: u8 = 4;

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_no_limit()
}

/// Persist every node's `average_strategy` to `path`, atomically.
pub fn save(table: &mut NodeTable, path: &Path) -> Result<(), TrainerError> {
    let mut entries: Vec<PersistedEntry> = Vec::with_capacity(table.len());
    for (key, node) in table.iter_mut() {
        entries.push(PersistedEntry {
            key: key.clone(),
            average_strategy: node.persisted_average_strategy(),
        });
    }
    // HashMap iteration order is not stable across runs; sort so that
    // identical training runs produce bit-identical files.
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("bin.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&[SCALAR_WIDTH_F32])?;
        bincode_options().serialize_into(&mut writer, &entries)?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load a read-only [`NodeTable`] whose nodes only have `average_strategy`
/// populated, as required for fixed-opponent tables and the agent.
pub fn load(path: &Path) -> Result<NodeTable, TrainerError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut header = [0u8; 1];
    reader
        .read_exact(&mut header)
        .map_err(|e| TrainerError::Io(format!("truncated strategy file: {e}")))?;
    if header[0] != SCALAR_WIDTH_F32 {
        return Err(TrainerError::Io(format!(
            "unsupported strategy file scalar width: {} (expected {})",
            header[0], SCALAR_WIDTH_F32
        )));
    }
    let entries: Vec<PersistedEntry> = bincode_options()
        .deserialize_from(&mut reader)
        .map_err(|e| TrainerError::Io(format!("malformed strategy file: {e}")))?;

    let mut table = NodeTable::new();
    for entry in entries {
        table.insert(
            entry.key,
            InfoSetNode::from_average_strategy(entry.average_strategy),
        );
    }
    Ok(table)
}
