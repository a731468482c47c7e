use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FlashError, FlashTask};
use crate::profile::{Profile, Slot};

/// Executable name looked up in PATH when none is configured.
#[cfg(windows)]
pub const DEFAULT_PROGRAM: &str = "JFlash.exe";
#[cfg(not(windows))]
pub const DEFAULT_PROGRAM: &str = "JFlashExe";

/// Resolve the J-Flash executable.
///
/// Names containing a path separator are checked as given; bare names are
/// searched for in PATH.
pub fn locate_program(name: &str) -> Result<PathBuf, FlashError> {
    let candidate = Path::new(name);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(FlashError::ProgramNotFound(name.to_string()))
        };
    }

    env::var_os("PATH")
        .iter()
        .flat_map(|paths| env::split_paths(paths))
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| FlashError::ProgramNotFound(name.to_string()))
}

/// 8 hex digits, as J-Flash expects for `-open` addresses.
fn is_valid_address(address: &str) -> bool {
    address.len() == 8 && address.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Path as handed to the tool. J-Flash on Windows wants backslashes.
fn tool_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('/', "\\")
    } else {
        s.into_owned()
    }
}

/// `.trpk` packages are flashed through a `.bin` copy next to them. The
/// copy is only made when `create` is set.
fn prepare_image(path: &Path, create: bool) -> Result<PathBuf, FlashError> {
    if path.extension().is_none_or(|ext| ext != "trpk") {
        return Ok(path.to_path_buf());
    }
    let bin = path.with_extension("bin");
    if create && !bin.exists() {
        fs::copy(path, &bin).map_err(|source| FlashError::Prepare {
            path: bin.clone(),
            source,
        })?;
        tracing::info!(from = %path.display(), to = %bin.display(), "converted trpk image");
    }
    Ok(bin)
}

/// A validated J-Flash invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl FlashCommand {
    /// Validate `profile` and assemble the argument list, creating `.bin`
    /// copies of `.trpk` images as needed.
    pub fn build(profile: &Profile, program: impl Into<PathBuf>) -> Result<Self, FlashError> {
        Self::assemble(profile, program.into(), true)
    }

    /// Same validation and arguments as [`build`](Self::build), but nothing
    /// is written to disk.
    pub fn preview(profile: &Profile, program: impl Into<PathBuf>) -> Result<Self, FlashError> {
        Self::assemble(profile, program.into(), false)
    }

    fn assemble(profile: &Profile, program: PathBuf, create: bool) -> Result<Self, FlashError> {
        let project = Path::new(profile.project_file.trim());
        if project.as_os_str().is_empty() || !project.exists() {
            return Err(FlashError::ProjectMissing(project.to_path_buf()));
        }

        let images: Vec<(PathBuf, &str)> = profile
            .enabled_images()
            .map(|(_, image)| (PathBuf::from(image.path.trim()), image.address.trim()))
            .collect();
        if images.is_empty() && !profile.chip_erase {
            return Err(FlashError::NothingToFlash);
        }
        if let Some((path, _)) = images.iter().find(|(path, _)| !path.exists()) {
            return Err(FlashError::ImageMissing(path.clone()));
        }

        // Disabled slots are checked too.
        for slot in Slot::ALL {
            let address = profile.slot(slot).address.trim();
            if !is_valid_address(address) {
                return Err(FlashError::InvalidAddress {
                    slot,
                    address: address.to_string(),
                });
            }
        }

        let mut args = vec!["-openprj".to_string(), tool_path(project)];
        let serial = profile.serial.trim();
        if !serial.is_empty() {
            args.extend(["-usb".to_string(), serial.to_string()]);
        }
        if profile.chip_erase {
            args.push("-erasechip".to_string());
        }
        for (path, address) in &images {
            let path = prepare_image(path, create)?;
            args.push(format!("-open\"{}\",{}", tool_path(&path), address));
            args.push("-auto".to_string());
        }
        args.push("-exit".to_string());

        Ok(Self { program, args })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line as one string, for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start the tool in the background.
    pub fn spawn(&self) -> Result<FlashTask, FlashError> {
        tracing::info!(command = %self.display(), "running command");
        FlashTask::spawn(&self.program, &self.args)
    }
}
