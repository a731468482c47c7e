//! Flashing profiles
//!
//! A profile names a J-Flash project, up to three images with their load
//! addresses, the probe serial and whether to erase the whole chip first.
//! The list is stored as `{"profiles": [...]}` with flat field names
//! (`image_file`, `addr_image`, `jlink_sn`, ...), so existing
//! `settings.json` files load as-is.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile name must not be empty")]
    EmptyName,

    #[error("profile '{0}' already exists")]
    Duplicate(String),

    #[error("no profile named '{0}'")]
    NotFound(String),
}

/// The three image slots of a profile, in flashing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Slot {
    Bootloader,
    Image,
    Param,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Bootloader, Slot::Image, Slot::Param];

    /// Name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Bootloader => "Bootloader",
            Slot::Image => "Kernel",
            Slot::Param => "BootParam",
        }
    }

    pub fn default_address(&self) -> &'static str {
        match self {
            Slot::Bootloader => "08000000",
            Slot::Image => "08080000",
            Slot::Param => "083FE000",
        }
    }
}

/// An image file and the hex address it is loaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    pub path: String,
    pub address: String,
    pub enabled: bool,
}

impl FlashImage {
    fn empty(slot: Slot) -> Self {
        Self {
            path: String::new(),
            address: slot.default_address().to_string(),
            enabled: false,
        }
    }

    /// Point the slot at a new file, enable it and pick the usual load
    /// address for that kind of file.
    pub fn select(&mut self, path: impl Into<String>) {
        self.path = path.into();
        self.address = suggested_address(&self.path).to_string();
        self.enabled = true;
    }
}

/// Load address normally used for an image file.
pub fn suggested_address(path: &str) -> &'static str {
    if path.contains("boot") {
        Slot::Bootloader.default_address()
    } else if path.ends_with(".trpk") {
        Slot::Image.default_address()
    } else {
        "08014000"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProfile", into = "RawProfile")]
pub struct Profile {
    pub name: String,
    pub project_file: String,
    pub bootloader: FlashImage,
    pub image: FlashImage,
    pub param: FlashImage,
    /// J-Link USB serial; empty selects the first probe.
    pub serial: String,
    pub chip_erase: bool,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_file: String::new(),
            bootloader: FlashImage::empty(Slot::Bootloader),
            image: FlashImage::empty(Slot::Image),
            param: FlashImage::empty(Slot::Param),
            serial: String::new(),
            chip_erase: false,
        }
    }

    pub fn slot(&self, slot: Slot) -> &FlashImage {
        match slot {
            Slot::Bootloader => &self.bootloader,
            Slot::Image => &self.image,
            Slot::Param => &self.param,
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut FlashImage {
        match slot {
            Slot::Bootloader => &mut self.bootloader,
            Slot::Image => &mut self.image,
            Slot::Param => &mut self.param,
        }
    }

    /// Enabled images in flashing order.
    pub fn enabled_images(&self) -> impl Iterator<Item = (Slot, &FlashImage)> {
        Slot::ALL
            .into_iter()
            .map(|slot| (slot, self.slot(slot)))
            .filter(|(_, image)| image.enabled)
    }
}

/// On-disk shape of a profile.
#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawProfile {
    name: String,
    project_file: String,
    bootloader: String,
    image_file: String,
    param_file: String,
    addr_bootloader: String,
    addr_image: String,
    addr_param: String,
    jlink_sn: String,
    bootloader_enabled: bool,
    image_enabled: bool,
    param_enabled: bool,
    chip_erase: bool,
}

impl Default for RawProfile {
    fn default() -> Self {
        Profile::new("Unnamed Profile").into()
    }
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        Self {
            name: raw.name,
            project_file: raw.project_file,
            bootloader: FlashImage {
                path: raw.bootloader,
                address: raw.addr_bootloader,
                enabled: raw.bootloader_enabled,
            },
            image: FlashImage {
                path: raw.image_file,
                address: raw.addr_image,
                enabled: raw.image_enabled,
            },
            param: FlashImage {
                path: raw.param_file,
                address: raw.addr_param,
                enabled: raw.param_enabled,
            },
            serial: raw.jlink_sn,
            chip_erase: raw.chip_erase,
        }
    }
}

impl From<Profile> for RawProfile {
    fn from(p: Profile) -> Self {
        Self {
            name: p.name,
            project_file: p.project_file,
            bootloader: p.bootloader.path,
            image_file: p.image.path,
            param_file: p.param.path,
            addr_bootloader: p.bootloader.address,
            addr_image: p.image.address,
            addr_param: p.param.address,
            jlink_sn: p.serial,
            bootloader_enabled: p.bootloader.enabled,
            image_enabled: p.image.enabled,
            param_enabled: p.param.enabled,
            chip_erase: p.chip_erase,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    profiles: Vec<Profile>,
}

/// The profile list backed by a settings file.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Load the list, creating an empty settings file if there is none.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        if !path.exists() {
            let store = Self {
                path,
                profiles: Vec::new(),
            };
            store.save()?;
            tracing::info!(path = %store.path.display(), "created empty settings file");
            return Ok(store);
        }

        let text = fs::read_to_string(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        let file: SettingsFile =
            serde_json::from_str(&text).map_err(|source| ProfileError::Json {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), count = file.profiles.len(), "loaded settings");
        Ok(Self {
            path,
            profiles: file.profiles,
        })
    }

    /// Write the whole list back.
    pub fn save(&self) -> Result<(), ProfileError> {
        let file = SettingsFile {
            profiles: self.profiles.clone(),
        };
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        file.serialize(&mut ser).map_err(|source| ProfileError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, out).map_err(|source| ProfileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Names are compared after trimming, as [`add`](Self::add) stores them.
    pub fn get(&self, name: &str) -> Result<&Profile, ProfileError> {
        let name = name.trim();
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    /// Append a new profile with default addresses.
    pub fn add(&mut self, name: &str) -> Result<&Profile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if self.profiles.iter().any(|p| p.name == name) {
            return Err(ProfileError::Duplicate(name.to_string()));
        }
        self.profiles.push(Profile::new(name));
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    pub fn remove(&mut self, name: &str) -> Result<Profile, ProfileError> {
        let name = name.trim();
        let index = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
        Ok(self.profiles.remove(index))
    }

    /// Replace the stored profile that has the same name.
    pub fn commit(&mut self, mut profile: Profile) -> Result<(), ProfileError> {
        profile.name = profile.name.trim().to_string();
        let slot = self
            .profiles
            .iter_mut()
            .find(|p| p.name == profile.name)
            .ok_or_else(|| ProfileError::NotFound(profile.name.clone()))?;
        *slot = profile;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_flat_settings_schema() {
        let json = r#"{
            "profiles": [
                {
                    "name": "board-a",
                    "project_file": "C:/work/a.jflash",
                    "bootloader": "boot.bin",
                    "image_file": "kernel.trpk",
                    "param_file": "",
                    "addr_bootloader": "08000000",
                    "addr_image": "08080000",
                    "addr_param": "083FE000",
                    "jlink_sn": "123456",
                    "image_enabled": true,
                    "chip_erase": true
                }
            ]
        }"#;
        let file: SettingsFile = serde_json::from_str(json).unwrap();
        let p = &file.profiles[0];
        assert_eq!(p.name, "board-a");
        assert_eq!(p.image.path, "kernel.trpk");
        assert!(p.image.enabled);
        assert!(!p.bootloader.enabled);
        assert_eq!(p.serial, "123456");
        assert!(p.chip_erase);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let file: SettingsFile =
            serde_json::from_str(r#"{"profiles": [{"name": "x"}]}"#).unwrap();
        assert_eq!(file.profiles[0], Profile::new("x"));

        let file: SettingsFile = serde_json::from_str("{}").unwrap();
        assert!(file.profiles.is_empty());
    }

    #[test]
    fn serializes_flat_field_names() {
        let mut p = Profile::new("b");
        p.param.enabled = true;
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["addr_param"], "083FE000");
        assert_eq!(value["param_enabled"], true);
        assert_eq!(value["jlink_sn"], "");
    }

    #[test]
    fn selecting_a_file_suggests_an_address() {
        let mut image = FlashImage::empty(Slot::Image);
        image.select("out/kernel.trpk");
        assert!(image.enabled);
        assert_eq!(image.address, "08080000");

        image.select("out/bootloader.bin");
        assert_eq!(image.address, "08000000");

        image.select("out/app.bin");
        assert_eq!(image.address, "08014000");
    }

    #[test]
    fn load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = ProfileStore::load(&path).unwrap();
        assert!(store.profiles().is_empty());
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"profiles\": []\n}");
    }

    #[test]
    fn add_commit_remove_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = ProfileStore::load(&path).unwrap();
        store.add("board-a").unwrap();
        assert!(matches!(store.add(" board-a "), Err(ProfileError::Duplicate(_))));
        assert!(matches!(store.add("  "), Err(ProfileError::EmptyName)));

        let mut edited = store.get("board-a").unwrap().clone();
        edited.serial = "600100200".to_string();
        edited.slot_mut(Slot::Image).enabled = true;
        store.commit(edited).unwrap();
        store.save().unwrap();

        let mut reloaded = ProfileStore::load(&path).unwrap();
        let p = reloaded.get("board-a").unwrap();
        assert_eq!(p.serial, "600100200");
        assert_eq!(
            p.enabled_images().map(|(s, _)| s).collect::<Vec<_>>(),
            vec![Slot::Image]
        );

        reloaded.remove("board-a").unwrap();
        assert!(matches!(reloaded.get("board-a"), Err(ProfileError::NotFound(_))));
        assert!(matches!(
            reloaded.commit(Profile::new("ghost")),
            Err(ProfileError::NotFound(_))
        ));
    }

    #[test]
    fn lookups_ignore_surrounding_whitespace() {
        let dir = TempDir::new().unwrap();
        let mut store = ProfileStore::load(dir.path().join("settings.json")).unwrap();
        store.add(" x ").unwrap();

        assert_eq!(store.get(" x ").unwrap().name, "x");
        let mut edited = Profile::new("x  ");
        edited.serial = "42".to_string();
        store.commit(edited).unwrap();
        assert_eq!(store.get("x").unwrap().serial, "42");

        assert_eq!(store.remove(" x ").unwrap().name, "x");
        assert!(store.profiles().is_empty());
    }
}
