//! `server.properties` handling.
//!
//! Settings are merged by key and the file is rewritten whole, so repeated
//! starts never stack duplicate `server-port` lines.

use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Setting { key: String, value: String },
    /// Comments, blanks and anything else kept verbatim.
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerProperties {
    lines: Vec<Line>,
}

impl ServerProperties {
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|raw| {
                let trimmed = raw.trim_start();
                if trimmed.is_empty() || trimmed.starts_with(['#', '!']) {
                    return Line::Other(raw.to_string());
                }
                match raw.split_once('=') {
                    Some((key, value)) => Line::Setting {
                        key: key.trim().to_string(),
                        value: value.to_string(),
                    },
                    None => Line::Other(raw.to_string()),
                }
            })
            .collect();
        Self { lines }
    }

    /// Read `path`, or start empty when it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(AppError::io(format!("Failed to read {:?}: {}", path, e))),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .map_err(|e| AppError::io(format!("Failed to write {:?}: {}", path, e)))
    }

    /// Last value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Setting { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Replace every occurrence of `key` with a single line holding `value`.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        let mut replaced = false;
        self.lines.retain_mut(|line| match line {
            Line::Setting { key: k, value: v } if k == key => {
                if replaced {
                    false
                } else {
                    *v = value.clone();
                    replaced = true;
                    true
                }
            }
            _ => true,
        });
        if !replaced {
            self.lines.push(Line::Setting {
                key: key.to_string(),
                value,
            });
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Setting { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Line::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }
}

/// Read-modify-write a single setting in the file at `path`.
pub fn update_setting(path: &Path, key: &str, value: impl ToString) -> Result<()> {
    let mut props = ServerProperties::load(path)?;
    props.set(key, value);
    props.save(path)
}
