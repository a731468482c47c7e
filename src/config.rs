//! Section-structured project file patcher
//!
//! J-Flash project files are INI-like: `[Section]` headers followed by
//! `key = value` lines, possibly with bare pairs before the first header.
//! Reads look a key up; writes rewrite exactly one line and leave the rest
//! of the file byte-for-byte intact.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("section [{section}] not found")]
    SectionNotFound { section: String },

    #[error("key '{key}' not found in section [{section}]")]
    KeyNotFound { section: String, key: String },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a write did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// An existing line was rewritten (index into the line list).
    Replaced(usize),
    /// A new line was inserted at this index.
    Inserted(usize),
    /// The section does not exist; nothing was changed.
    SectionMissing,
}

/// A line classified by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Header(&'a str),
    Pair { key: &'a str, value: &'a str },
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if let Some(name) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return LineKind::Header(name);
    }
    match line.split_once('=') {
        Some((key, value)) => LineKind::Pair {
            key: key.trim(),
            value: value.trim(),
        },
        None => LineKind::Other,
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

/// Lines of a configuration file, each with its original line ending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_owned).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Replace `path` with this document via a temp file in the same directory.
    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ConfigError::io(path, e))?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| ConfigError::io(path, e))?;
        }
        tmp.write_all(self.to_string().as_bytes())
            .map_err(|e| ConfigError::io(path, e))?;
        tmp.persist(path).map_err(|e| ConfigError::io(path, e.error))?;
        Ok(())
    }

    /// Every line paired with the section it belongs to. Lines before the
    /// first header belong to the unnamed section (`None`).
    fn scan(&self) -> impl Iterator<Item = (usize, Option<&str>, LineKind<'_>)> {
        self.lines
            .iter()
            .enumerate()
            .scan(None::<&str>, |current, (idx, line)| {
                let kind = classify(line);
                if let LineKind::Header(name) = kind {
                    *current = Some(name);
                }
                Some((idx, *current, kind))
            })
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.scan()
            .any(|(_, _, kind)| kind == LineKind::Header(section))
    }

    /// First value of `key` inside `[section]`, trimmed.
    pub fn get(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        let found = self.scan().find_map(|(idx, current, kind)| match kind {
            LineKind::Pair { key: k, value }
                if current == Some(section) && k == key && !is_comment(&self.lines[idx]) =>
            {
                Some(value)
            }
            _ => None,
        });
        match found {
            Some(value) => Ok(value),
            None if !self.has_section(section) => Err(ConfigError::SectionNotFound {
                section: section.to_string(),
            }),
            None => Err(ConfigError::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Rewrite the first `key` line of `[section]`, or insert one right
    /// after the first `[section]` header. Missing sections are left alone.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> PatchOutcome {
        let replacement = format!("  {} = {}\n", key, value);

        let existing = self.scan().find_map(|(idx, current, kind)| match kind {
            LineKind::Pair { key: k, .. } if current == Some(section) && k == key => Some(idx),
            _ => None,
        });
        if let Some(idx) = existing {
            self.lines[idx] = replacement;
            return PatchOutcome::Replaced(idx);
        }

        let header = self
            .scan()
            .find(|(_, _, kind)| *kind == LineKind::Header(section))
            .map(|(idx, _, _)| idx);
        match header {
            Some(idx) => {
                // 改行のない最終行の後ろに挿入する場合
                if !self.lines[idx].ends_with('\n') {
                    self.lines[idx].push('\n');
                }
                self.lines.insert(idx + 1, replacement);
                PatchOutcome::Inserted(idx + 1)
            }
            None => PatchOutcome::SectionMissing,
        }
    }
}

impl std::fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.lines.iter().try_for_each(|line| f.write_str(line))
    }
}

/// Read `key` from `[section]` of the file at `path`.
pub fn read(path: impl AsRef<Path>, section: &str, key: &str) -> Result<String, ConfigError> {
    let path = path.as_ref();
    let doc = ConfigDocument::load(path)?;
    let value = doc.get(section, key)?.to_string();
    tracing::debug!(path = %path.display(), section, key, value = %value, "read config value");
    Ok(value)
}

/// Set `key` in `[section]` of the file at `path`.
///
/// When the section does not exist the file is left untouched and
/// [`PatchOutcome::SectionMissing`] is returned; this is not an error.
pub fn write(
    path: impl AsRef<Path>,
    section: &str,
    key: &str,
    value: &str,
) -> Result<PatchOutcome, ConfigError> {
    let path = path.as_ref();
    let mut doc = ConfigDocument::load(path)?;
    let outcome = doc.set(section, key, value);
    if outcome == PatchOutcome::SectionMissing {
        tracing::warn!(
            path = %path.display(),
            section,
            key,
            "section not present, setting was not written"
        );
        return Ok(outcome);
    }
    doc.store(path)?;
    tracing::debug!(path = %path.display(), section, key, value, ?outcome, "patched config");
    Ok(outcome)
}
