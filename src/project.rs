//! J-Flash project file settings edited by the front-end.

use std::path::Path;

use thiserror::Error;

use crate::config::{self, ConfigError, PatchOutcome};

/// SWD clock speeds offered for a project, in kHz.
pub const SWD_SPEEDS_KHZ: [u32; 17] = [
    1, 5, 100, 500, 1000, 2000, 4000, 4800, 6000, 8000, 9600, 12000, 15000, 20000, 25000, 30000,
    40000,
];

const SPEED_SECTION: &str = "JTAG";
const SPEED_KEY: &str = "Speed1";

#[derive(Debug, Error)]
pub enum SpeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("[JTAG] Speed1 is not a number: '{0}'")]
    Malformed(String),

    #[error("unsupported SWD speed {0} kHz")]
    Unsupported(u32),
}

/// SWD speed stored in the project, in kHz.
pub fn swd_speed(project: impl AsRef<Path>) -> Result<u32, SpeedError> {
    let raw = config::read(project, SPEED_SECTION, SPEED_KEY)?;
    raw.parse().map_err(|_| SpeedError::Malformed(raw))
}

/// Store a new SWD speed in the project.
pub fn set_swd_speed(project: impl AsRef<Path>, khz: u32) -> Result<PatchOutcome, SpeedError> {
    if !SWD_SPEEDS_KHZ.contains(&khz) {
        return Err(SpeedError::Unsupported(khz));
    }
    Ok(config::write(project, SPEED_SECTION, SPEED_KEY, &khz.to_string())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_and_updates_speed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.jflash");
        fs::write(&path, "[JTAG]\n  Speed0 = 4000\n  Speed1 = 4000\n").unwrap();

        assert_eq!(swd_speed(&path).unwrap(), 4000);
        set_swd_speed(&path, 12000).unwrap();
        assert_eq!(swd_speed(&path).unwrap(), 12000);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[JTAG]\n  Speed0 = 4000\n  Speed1 = 12000\n"
        );
    }

    #[test]
    fn rejects_unlisted_speed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.jflash");
        fs::write(&path, "[JTAG]\n").unwrap();
        assert!(matches!(set_swd_speed(&path, 3000), Err(SpeedError::Unsupported(3000))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "[JTAG]\n");
    }

    #[test]
    fn reports_non_numeric_speed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.jflash");
        fs::write(&path, "[JTAG]\nSpeed1 = fast\n").unwrap();
        assert!(matches!(swd_speed(&path), Err(SpeedError::Malformed(v)) if v == "fast"));
    }
}
