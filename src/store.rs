// content-index/src/store.rs
//! Durable checkpoint of the index:
//! `{ "lastUpdate": <epoch ms>, "mappings": { "<fingerprint>": "<path>" } }`.
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! target, so a crash mid-save leaves the previous checkpoint intact.

use serde::{
    Deserialize,
    Serialize
};
use std::{
    collections::{
        BTreeMap,
        HashMap
    },
    fs,
    io::{
        BufWriter,
        ErrorKind,
        Write
    },
    path::{
        Path,
        PathBuf
    },
};
use tempfile::NamedTempFile;
use tracing::{
    debug,
    error,
    warn
};
use crate::error::{
    IndexError,
    Result
};


/// Fingerprint -> absolute path.
pub type Mapping = HashMap<String, PathBuf>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Start time of the build that produced `mappings`; 0 = never built.
    #[serde(default)]
    pub last_update: i64,
    pub mappings: Mapping,
}

/// Borrowed view used for writing, with keys sorted for stable output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    last_update: i64,
    mappings: BTreeMap<&'a str, &'a Path>,
}

/// Strict read. `Ok(None)` when there is no checkpoint yet.
pub fn try_load(path: &Path) -> Result<Option<Snapshot>> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(IndexError::Load { path: path.to_path_buf(), source });
        }
    };
    let snap: Snapshot = serde_json::from_str(&data).map_err(|source| IndexError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(snap))
}

/// Forgiving read: any failure degrades to an empty, never-built snapshot.
/// A missing file is expected and not logged.
pub fn load(path: &Path) -> Snapshot {
    match try_load(path) {
        Ok(Some(snap)) => {
            debug!(path = %path.display(), entries = snap.mappings.len(), "loaded index state");
            snap
        }
        Ok(None) => Snapshot::default(),
        Err(err) => {
            error!(error = %err, "error loading index state, starting empty");
            Snapshot::default()
        }
    }
}

/// Overwrite the checkpoint at `path` with `mapping` stamped `last_update`.
pub fn save(path: &Path, last_update: i64, mapping: &Mapping) -> Result<()> {
    let view = SnapshotRef {
        last_update,
        mappings: mapping.iter().map(|(k, v)| (k.as_str(), v.as_path())).collect(),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let save_err = |source| IndexError::Save { path: path.to_path_buf(), source };

    fs::create_dir_all(&dir).map_err(save_err)?;
    let tmp = NamedTempFile::new_in(&dir).map_err(save_err)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, &view)?;
        w.write_all(b"\n").map_err(save_err)?;
        w.flush().map_err(save_err)?;
    }
    tmp.as_file().sync_all().map_err(save_err)?;
    tmp.persist(path).map_err(|e| save_err(e.error))?;

    debug!(path = %path.display(), entries = mapping.len(), "saved index state");
    Ok(())
}

/// `save` that logs instead of failing; returns whether it succeeded.
pub fn save_logged(path: &Path, last_update: i64, mapping: &Mapping) -> bool {
    match save(path, last_update, mapping) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "index state not persisted, in-memory index still current");
            false
        }
    }
}
