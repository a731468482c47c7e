//! Driving the external J-Flash executable
//!
//! [`FlashCommand`] turns a profile into a validated argument list and
//! [`FlashTask`] runs it on worker threads, streaming output back.

mod command;
mod runner;

pub use command::{DEFAULT_PROGRAM, FlashCommand, locate_program};
pub use runner::{FlashEvent, FlashReport, FlashTask};

use std::path::PathBuf;

use thiserror::Error;

use crate::profile::Slot;

#[derive(Debug, Error)]
pub enum FlashError {
    #[error("{0} not found in PATH; add the J-Flash install directory to PATH")]
    ProgramNotFound(String),

    #[error("project file path is invalid: {0}")]
    ProjectMissing(PathBuf),

    #[error("no binaries selected to flash")]
    NothingToFlash,

    #[error("binary file not found: {0}")]
    ImageMissing(PathBuf),

    #[error("{} address is invalid: '{address}' (must be 8-digit hex)", slot.label())]
    InvalidAddress { slot: Slot, address: String },

    #[error("cannot prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
