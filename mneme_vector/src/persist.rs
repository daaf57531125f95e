//! Mirror persistence to a `vectors/` directory (§4.4): `entries.jsonl` for
//! metadata/text, `vectors.bin` for the raw float payload. Both are rewritten
//! in full on every mutation and atomically swapped in via rename, so a
//! crash mid-write never leaves a torn pair on disk.

use crate::entry::{EntryRecord, VectorEntry};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

fn entries_path(dir: &Path) -> PathBuf {
    dir.join("entries.jsonl")
}

fn vectors_path(dir: &Path) -> PathBuf {
    dir.join("vectors.bin")
}

/// `vectors.bin` layout: a 4-byte little-endian `u32` dimension header,
/// followed by `count * dim` little-endian `f32`s, one vector after another
/// in `entries.jsonl` order.
pub(crate) fn write_snapshot(dir: &Path, dim: usize, entries: &[VectorEntry]) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let mut jsonl = String::new();
    let mut vector_bytes = Vec::with_capacity(4 + entries.len() * dim * 4);
    #[allow(clippy::cast_possible_truncation)]
    vector_bytes.extend_from_slice(&(dim as u32).to_le_bytes());

    for (slot, entry) in entries.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let record = EntryRecord {
            id: entry.id,
            metadata: entry.metadata.clone(),
            text: entry.text.clone(),
            vector_slot: slot as u64,
        };
        jsonl.push_str(&serde_json::to_string(&record)?);
        jsonl.push('\n');

        for component in &entry.vector {
            vector_bytes.extend_from_slice(&component.to_le_bytes());
        }
    }

    write_atomically(&entries_path(dir), jsonl.as_bytes())?;
    write_atomically(&vectors_path(dir), &vector_bytes)?;
    Ok(())
}

fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

/// Returns `(dim, entries)`; an absent pair (first run) yields `(0, vec![])`.
pub(crate) fn load_snapshot(dir: &Path) -> io::Result<(usize, Vec<VectorEntry>)> {
    let entries_file = entries_path(dir);
    let vectors_file = vectors_path(dir);
    if !entries_file.exists() || !vectors_file.exists() {
        return Ok((0, Vec::new()));
    }

    let mut raw_vectors = Vec::new();
    fs::File::open(&vectors_file)?.read_to_end(&mut raw_vectors)?;
    if raw_vectors.len() < 4 {
        return Ok((0, Vec::new()));
    }
    let dim = u32::from_le_bytes([raw_vectors[0], raw_vectors[1], raw_vectors[2], raw_vectors[3]]) as usize;
    let payload = &raw_vectors[4..];

    let jsonl = fs::read_to_string(&entries_file)?;
    let mut entries = Vec::new();
    for line in jsonl.lines().filter(|l| !l.trim().is_empty()) {
        let record: EntryRecord = serde_json::from_str(line)?;
        let start = record.vector_slot as usize * dim * 4;
        let end = start + dim * 4;
        let vector = payload
            .get(start..end)
            .ok_or_else(|| io::Error::other(format!("vectors.bin truncated for entry {}", record.id)))?
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        entries.push(VectorEntry {
            id: record.id,
            vector,
            metadata: record.metadata,
            text: record.text,
        });
    }

    Ok((dim, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            VectorEntry {
                id: Uuid::now_v7(),
                vector: vec![1.0, 2.0, 3.0],
                metadata: serde_json::json!({"category": "note"}),
                text: "first".to_string(),
            },
            VectorEntry {
                id: Uuid::now_v7(),
                vector: vec![4.0, 5.0, 6.0],
                metadata: serde_json::json!({"category": "note"}),
                text: "second".to_string(),
            },
        ];

        write_snapshot(dir.path(), 3, &entries).unwrap();
        let (dim, loaded) = load_snapshot(dir.path()).unwrap();

        assert_eq!(dim, 3);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].text, "first");
        assert_eq!(loaded[1].vector, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (dim, loaded) = load_snapshot(dir.path()).unwrap();
        assert_eq!(dim, 0);
        assert!(loaded.is_empty());
    }
}
