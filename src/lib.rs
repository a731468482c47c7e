//! jfx - J-Flash front-end
//!
//! Shared library for `jfx` (profiles, project patching, flashing, hex
//! dump tools) and `jfv` (terminal hex viewer).

pub mod app;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod flash;
pub mod logging;
pub mod profile;
pub mod project;
pub mod ui;
