// Preset store - sixteen numbered JSON slots in one directory

use super::types::{PRESET_TYPE, PRESET_VERSION, Preset};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const PRESET_SLOTS: u8 = 16;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Preset slot {0} out of range (0..{PRESET_SLOTS})")]
    InvalidSlot(u8),

    #[error("Preset slot {0} is empty")]
    Empty(u8),

    #[error("Not a preset document: type '{0}'")]
    WrongType(String),

    #[error("Unsupported preset version {0}")]
    UnsupportedVersion(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Summary of an occupied slot
#[derive(Debug, Clone, PartialEq)]
pub struct PresetEntry {
    pub slot: u8,
    pub name: String,
}

pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `<data dir>/euclidio/presets`, or a relative `presets` directory
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("euclidio").join("presets"))
            .unwrap_or_else(|| PathBuf::from("presets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: u8) -> Result<PathBuf, PresetError> {
        check_slot(slot)?;
        Ok(self.dir.join(format!("preset_{slot:02}.json")))
    }

    pub fn save(&self, slot: u8, preset: &Preset) -> Result<PathBuf, PresetError> {
        let path = self.slot_path(slot)?;
        fs::create_dir_all(&self.dir)?;

        // Readers only ever see a complete file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(preset)?)?;
        fs::rename(&tmp, &path)?;

        info!(slot, name = %preset.name, "preset saved");
        Ok(path)
    }

    pub fn load(&self, slot: u8) -> Result<Preset, PresetError> {
        let path = self.slot_path(slot)?;
        if !path.exists() {
            return Err(PresetError::Empty(slot));
        }
        let preset: Preset = serde_json::from_str(&fs::read_to_string(&path)?)?;
        validate(&preset)?;
        debug!(slot, name = %preset.name, "preset loaded");
        Ok(preset)
    }

    pub fn exists(&self, slot: u8) -> bool {
        self.slot_path(slot).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Returns false when the slot was already empty
    pub fn delete(&self, slot: u8) -> Result<bool, PresetError> {
        let path = self.slot_path(slot)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        info!(slot, "preset deleted");
        Ok(true)
    }

    /// Occupied slots in order; unreadable files are skipped
    pub fn list(&self) -> Vec<PresetEntry> {
        (0..PRESET_SLOTS)
            .filter(|slot| self.exists(*slot))
            .filter_map(|slot| match self.load(slot) {
                Ok(preset) => Some(PresetEntry {
                    slot,
                    name: preset.name,
                }),
                Err(e) => {
                    debug!(slot, error = %e, "skipping unreadable preset");
                    None
                }
            })
            .collect()
    }
}

fn check_slot(slot: u8) -> Result<(), PresetError> {
    if slot < PRESET_SLOTS {
        Ok(())
    } else {
        Err(PresetError::InvalidSlot(slot))
    }
}

fn validate(preset: &Preset) -> Result<(), PresetError> {
    if preset.kind != PRESET_TYPE {
        return Err(PresetError::WrongType(preset.kind.clone()));
    }
    if preset.version != PRESET_VERSION {
        return Err(PresetError::UnsupportedVersion(preset.version));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::EngineState;
    use crate::preset::PresetOutputs;
    use tempfile::TempDir;

    fn sample(name: &str) -> Preset {
        Preset::capture(name, &EngineState::new(), PresetOutputs::default())
    }

    #[test]
    fn test_slot_file_names() {
        let store = PresetStore::new("/tmp/presets");
        assert!(store.slot_path(3).unwrap().ends_with("preset_03.json"));
        assert!(store.slot_path(15).unwrap().ends_with("preset_15.json"));
        assert!(matches!(store.slot_path(16), Err(PresetError::InvalidSlot(16))));
    }

    #[test]
    fn test_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("nested"));
        assert!(!store.exists(2));

        store.save(2, &sample("groove")).unwrap();
        assert!(store.exists(2));
        assert_eq!(store.load(2).unwrap().name, "groove");

        assert!(store.delete(2).unwrap());
        assert!(!store.delete(2).unwrap());
        assert!(matches!(store.load(2), Err(PresetError::Empty(2))));
    }

    #[test]
    fn test_list_skips_broken_files() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path());
        store.save(0, &sample("a")).unwrap();
        store.save(7, &sample("b")).unwrap();
        fs::write(store.slot_path(4).unwrap(), "{ not json").unwrap();

        let names: Vec<(u8, String)> = store.list().into_iter().map(|e| (e.slot, e.name)).collect();
        assert_eq!(names, vec![(0, "a".to_string()), (7, "b".to_string())]);
    }

    #[test]
    fn test_version_checked() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path());
        let mut preset = sample("future");
        preset.version = 2;
        store.save(1, &preset).unwrap();
        assert!(matches!(store.load(1), Err(PresetError::UnsupportedVersion(2))));
    }
}
