//! Recordings directory as a catalog.
//!
//! Each `.wav` file is one item; its file stem is the media id. Display
//! names live in a sidecar `names.json` next to the recordings, so a rename
//! never touches the audio file itself.

use super::{CatalogAdapter, CatalogError};
use crate::data::{AudioMetadata, Locator};

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const INDEX_FILE: &str = "names.json";

pub struct FsCatalog {
    root: PathBuf,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CatalogAdapter for FsCatalog {
    async fn scan(&self) -> Result<Vec<AudioMetadata>, CatalogError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_dir(&root))
            .await
            .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
    }

    async fn rename(&self, locator: &Locator, new_name: &str) -> Result<(), CatalogError> {
        let root = self.root.clone();
        let locator = locator.clone();
        let new_name = new_name.to_owned();
        tokio::task::spawn_blocking(move || rename_in_dir(&root, &locator, &new_name))
            .await
            .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
    }
}

fn scan_dir(root: &Path) -> Result<Vec<AudioMetadata>, CatalogError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let names = load_index(root)?;

    let mut items = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(OsStr::to_str) != Some("wav") {
            continue;
        }
        let Some(media_id) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };
        let media_id = media_id.to_owned();

        let meta = entry.metadata()?;
        let created_secs = meta
            .created()
            .or_else(|_| meta.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let duration_ms = match wav_duration_ms(&path) {
            Ok(ms) => ms,
            Err(e) => {
                tracing::warn!("Unreadable WAV header in {}: {}", path.display(), e);
                0
            }
        };

        let name = names.get(&media_id).cloned().unwrap_or_else(|| media_id.clone());
        items.push(AudioMetadata {
            media_id,
            locator: Locator::new(path),
            name,
            created_secs,
            duration_ms,
        });
    }

    // Newest first; same-second items fall back to id for a stable order.
    items.sort_by(|a, b| {
        b.created_secs
            .cmp(&a.created_secs)
            .then_with(|| a.media_id.cmp(&b.media_id))
    });
    Ok(items)
}

fn rename_in_dir(root: &Path, locator: &Locator, new_name: &str) -> Result<(), CatalogError> {
    let media_id = locator
        .path()
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| CatalogError::UnknownItem(locator.clone()))?;
    if !locator.path().exists() {
        return Err(CatalogError::UnknownItem(locator.clone()));
    }

    let mut names = load_index(root)?;
    names.insert(media_id.to_owned(), new_name.to_owned());
    save_index(root, &names)
}

fn wav_duration_ms(path: &Path) -> Result<u64, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(reader.duration() as u64 * 1000 / spec.sample_rate as u64)
}

fn load_index(root: &Path) -> Result<HashMap<String, String>, CatalogError> {
    let path = root.join(INDEX_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&raw)?)
}

fn save_index(root: &Path, names: &HashMap<String, String>) -> Result<(), CatalogError> {
    let raw = serde_json::to_string_pretty(names)?;
    fs::write(root.join(INDEX_FILE), raw)?;
    Ok(())
}
