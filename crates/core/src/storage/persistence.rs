//! Disk persistence for collections.
//!
//! Each collection persists as three files in the data directory:
//!
//! - `<name>.cfg`: the JSON-encoded [`CollectionConfig`].
//! - `<name>.idx`: the graph snapshot, a bincode-encoded graph plus the
//!   slot→key table, followed by a 4-byte magic and a big-endian CRC32
//!   footer for integrity verification.
//! - `<name>.idx.meta`: the payload sidecar in a framed little-endian
//!   format: record count, the key high-water mark, then per record the
//!   internal key, length-prefixed id, f32 values, and metadata pairs.
//!
//! Writes go through a temp file plus rename so a crash never leaves a torn
//! file behind. Saving takes shared access only; a snapshot that still
//! contains tombstoned slots is physically compacted when it is next loaded.

use crate::error::{Result, VectorError};
use crate::hnsw::graph::HnswGraph;
use crate::record::{CollectionConfig, VectorRecord};
use crate::storage::collection::{Collection, CollectionData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Magic bytes preceding the CRC32 footer of a graph snapshot.
const INDEX_CRC_MAGIC: &[u8; 4] = b"VIX1";

#[derive(Serialize)]
struct GraphSnapshotRef<'a> {
    graph: &'a HnswGraph,
    slot_keys: &'a [u64],
}

#[derive(Deserialize)]
struct GraphSnapshot {
    graph: HnswGraph,
    slot_keys: Vec<u64>,
}

/// Path of the `<name>.cfg` file.
pub fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.cfg"))
}

/// Path of the `<name>.idx` file.
pub fn index_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.idx"))
}

/// Path of the `<name>.idx.meta` file.
pub fn meta_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.idx.meta"))
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Persists a collection's configuration file.
pub fn save_config(dir: &Path, config: &CollectionConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).map_err(io::Error::other)?;
    fs::create_dir_all(dir)?;
    atomic_write(&config_path(dir, &config.name), &json)?;
    Ok(())
}

/// Persists a collection's graph snapshot and payload sidecar.
///
/// Takes shared access to the collection; nothing is mutated.
pub fn save_collection(dir: &Path, collection: &Collection) -> Result<()> {
    let data = collection.data.read();
    fs::create_dir_all(dir)?;

    // Graph snapshot: [bincode payload][magic "VIX1"][CRC32 BE]
    let snapshot = GraphSnapshotRef {
        graph: &data.graph,
        slot_keys: &data.slot_to_key,
    };
    let payload = bincode::serialize(&snapshot).map_err(io::Error::other)?;
    let crc = crc32fast::hash(&payload);
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&payload);
    out.extend_from_slice(INDEX_CRC_MAGIC);
    out.extend_from_slice(&crc.to_be_bytes());
    atomic_write(&index_path(dir, &data.config.name), &out)?;

    // Payload sidecar: live records only, in key order for stable files.
    let mut keys: Vec<u64> = data.records.keys().copied().collect();
    keys.sort_unstable();

    let mut meta = Vec::new();
    meta.extend_from_slice(&(keys.len() as u64).to_le_bytes());
    meta.extend_from_slice(&data.next_key.to_le_bytes());
    for key in keys {
        let record = &data.records[&key];
        meta.extend_from_slice(&key.to_le_bytes());
        meta.extend_from_slice(&(record.id.len() as u64).to_le_bytes());
        meta.extend_from_slice(record.id.as_bytes());
        meta.extend_from_slice(&(record.values.len() as u64).to_le_bytes());
        for value in &record.values {
            meta.extend_from_slice(&value.to_le_bytes());
        }
        let mut pairs: Vec<(&String, &String)> = record.metadata.iter().collect();
        pairs.sort_unstable();
        meta.extend_from_slice(&(pairs.len() as u64).to_le_bytes());
        for (k, v) in pairs {
            meta.extend_from_slice(&(k.len() as u64).to_le_bytes());
            meta.extend_from_slice(k.as_bytes());
            meta.extend_from_slice(&(v.len() as u64).to_le_bytes());
            meta.extend_from_slice(v.as_bytes());
        }
    }
    atomic_write(&meta_path(dir, &data.config.name), &meta)?;

    tracing::info!(
        collection = %data.config.name,
        records = data.records.len(),
        graph_bytes = out.len(),
        crc = %format!("{crc:#010x}"),
        "saved collection"
    );
    Ok(())
}

/// Byte-cursor over the framed sidecar format.
struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u64(&mut self) -> std::result::Result<u64, String> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    fn read_bytes(&mut self, len: usize) -> std::result::Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| format!("truncated sidecar at offset {}", self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_string(&mut self) -> std::result::Result<String, String> {
        let len = self.read_u64()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8 in sidecar: {e}"))
    }
}

fn decode_sidecar(
    bytes: &[u8],
    dimension: usize,
) -> std::result::Result<(HashMap<u64, Arc<VectorRecord>>, u64), String> {
    let mut reader = FrameReader::new(bytes);
    let count = reader.read_u64()?;
    let next_key = reader.read_u64()?;

    // Cap the pre-allocation so a corrupt count cannot balloon memory; the
    // reads below fail fast on truncation anyway.
    let mut records = HashMap::with_capacity(count.min(65_536) as usize);
    for _ in 0..count {
        let key = reader.read_u64()?;
        let id = reader.read_string()?;

        let vec_len = reader.read_u64()? as usize;
        if vec_len != dimension {
            return Err(format!(
                "record '{id}' has {vec_len} values, expected {dimension}"
            ));
        }
        let raw = reader.read_bytes(vec_len * 4)?;
        let values: Vec<f32> = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().expect("4-byte chunk")))
            .collect();

        let meta_count = reader.read_u64()?;
        let mut metadata = HashMap::with_capacity(meta_count.min(1_024) as usize);
        for _ in 0..meta_count {
            let k = reader.read_string()?;
            let v = reader.read_string()?;
            metadata.insert(k, v);
        }

        if records
            .insert(key, Arc::new(VectorRecord { id, values, metadata }))
            .is_some()
        {
            return Err(format!("duplicate key {key} in sidecar"));
        }
    }
    Ok((records, next_key))
}

/// Loads one collection from its three files, verifying integrity.
///
/// Any decode or validation failure is [`VectorError::CorruptState`]; the
/// caller drops the collection and continues with the rest.
pub fn load_collection(dir: &Path, name: &str) -> Result<Collection> {
    let mut config: CollectionConfig = serde_json::from_slice(&fs::read(config_path(dir, name))?)
        .map_err(|e| VectorError::CorruptState(format!("config for '{name}': {e}")))?;
    // The file stem is authoritative for the name.
    config.name = name.to_string();

    let raw = fs::read(index_path(dir, name))?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != INDEX_CRC_MAGIC {
        return Err(VectorError::CorruptState(format!(
            "index for '{name}': missing CRC footer"
        )));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes(
        raw[raw.len() - 4..]
            .try_into()
            .expect("4-byte CRC footer"),
    );
    let computed_crc = crc32fast::hash(payload);
    if stored_crc != computed_crc {
        return Err(VectorError::CorruptState(format!(
            "index for '{name}': CRC32 mismatch (stored {stored_crc:#010x}, computed {computed_crc:#010x})"
        )));
    }
    let snapshot: GraphSnapshot = bincode::deserialize(payload)
        .map_err(|e| VectorError::CorruptState(format!("index for '{name}': {e}")))?;

    let meta_bytes = fs::read(meta_path(dir, name))?;
    let (records, next_key) = decode_sidecar(&meta_bytes, config.dimension)
        .map_err(|e| VectorError::CorruptState(format!("sidecar for '{name}': {e}")))?;

    let mut id_to_key = HashMap::with_capacity(records.len());
    for (&key, record) in &records {
        if id_to_key.insert(record.id.clone(), key).is_some() {
            return Err(VectorError::CorruptState(format!(
                "sidecar for '{name}': duplicate id '{}'",
                record.id
            )));
        }
    }

    let mut key_to_slot = HashMap::with_capacity(records.len());
    for (slot, &key) in snapshot.slot_keys.iter().enumerate() {
        if (slot as u32 as usize) != slot {
            return Err(VectorError::CorruptState(format!(
                "index for '{name}': slot count overflows u32"
            )));
        }
        if !snapshot
            .graph
            .deleted
            .get(slot)
            .copied()
            .unwrap_or(true)
        {
            key_to_slot.insert(key, slot as u32);
        }
    }

    let data = CollectionData {
        config,
        graph: snapshot.graph,
        records,
        id_to_key,
        key_to_slot,
        slot_to_key: snapshot.slot_keys,
        next_key,
    };
    data.validate()
        .map_err(|e| VectorError::CorruptState(format!("collection '{name}': {e}")))?;

    let data = if data.graph.has_tombstones() {
        let collected = data.graph.slot_count() - data.graph.live_count();
        tracing::info!(
            collection = %data.config.name,
            collected,
            "compacting tombstoned slots from snapshot"
        );
        compact(data)
    } else {
        data
    };

    tracing::info!(
        collection = %data.config.name,
        records = data.records.len(),
        "loaded collection"
    );
    Ok(Collection::from_data(data))
}

/// Rebuilds the graph from live slots only, preserving keys and records.
/// Slots are reinserted in slot order, which is also ascending key order, so
/// the new slot order still agrees with key order.
fn compact(data: CollectionData) -> CollectionData {
    let mut graph = HnswGraph::new(&data.config);
    let mut slot_to_key = Vec::with_capacity(data.records.len());
    let mut key_to_slot = HashMap::with_capacity(data.records.len());

    for (slot, &key) in data.slot_to_key.iter().enumerate() {
        if data.graph.is_deleted(slot as u32) {
            continue;
        }
        let new_slot = graph.insert(data.graph.vector(slot as u32));
        slot_to_key.push(key);
        key_to_slot.insert(key, new_slot);
    }

    CollectionData {
        graph,
        slot_to_key,
        key_to_slot,
        ..data
    }
}

/// Loads every collection in `dir`: a `<name>.cfg` with a companion
/// `<name>.idx` becomes a live collection; strays are logged and skipped,
/// and a collection that fails to decode is dropped without aborting the
/// rest.
pub fn load_all(dir: &Path) -> io::Result<Vec<Collection>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut collections = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("cfg") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        if !index_path(dir, &name).exists() {
            tracing::warn!(collection = %name, "config without index file, ignoring");
            continue;
        }
        match load_collection(dir, &name) {
            Ok(collection) => collections.push(collection),
            Err(e) => {
                tracing::warn!(collection = %name, error = %e, "failed to load collection, dropping");
            }
        }
    }
    Ok(collections)
}

/// Removes all three on-disk files of a collection. Missing files are fine.
pub fn remove_collection_files(dir: &Path, name: &str) {
    for path in [
        config_path(dir, name),
        index_path(dir, name),
        meta_path(dir, name),
    ] {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
            }
        }
    }
}
