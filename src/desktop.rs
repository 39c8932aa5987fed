//! Icon/Desktop-Entry Resolver.
//!
//! A minimal `.desktop` scanner: it only reads the first `Icon=` and
//! `Exec=` lines of an entry and ignores sections, locales and actions.

use crate::traits::{ResolveError, Resolver};
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolver backed by a search path of application directories.
#[derive(Debug, Clone)]
pub struct DesktopEntries {
    dirs: Vec<PathBuf>,
    /// App id prefix -> icon name, for apps whose id differs from their
    /// desktop file name.
    exceptions: BTreeMap<String, String>,
}

impl DesktopEntries {
    pub fn new(dirs: Vec<PathBuf>, exceptions: BTreeMap<String, String>) -> Self {
        Self { dirs, exceptions }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// The entry for `app_id`: `<dir>/<id>.desktop`, or the same with the
    /// id lowercased, in search path order.
    fn entry_path(&self, app_id: &str) -> Option<PathBuf> {
        self.dirs.iter().find_map(|dir| {
            let path = dir.join(format!("{}.desktop", app_id));
            if path.is_file() {
                return Some(path);
            }
            let lower = dir.join(format!("{}.desktop", app_id.to_lowercase()));
            lower.is_file().then_some(lower)
        })
    }

    /// The first entry whose file name contains `app_id`, ignoring case.
    fn fuzzy_entry_path(&self, app_id: &str) -> Option<PathBuf> {
        let wanted = app_id.to_uppercase();
        self.dirs.iter().find_map(|dir| {
            let mut names: Vec<String> = std::fs::read_dir(dir)
                .ok()?
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|n| n.ends_with(".desktop") && n.to_uppercase().contains(&wanted))
                .collect();
            names.sort();
            names.into_iter().next().map(|n| dir.join(n))
        })
    }
}

impl Resolver for DesktopEntries {
    fn icon(&self, app_id: &str) -> Result<String, ResolveError> {
        if let Some(icon) = self
            .exceptions
            .iter()
            .find(|(prefix, _)| app_id.starts_with(prefix.as_str()))
            .map(|(_, icon)| icon.clone())
        {
            return Ok(icon);
        }
        let path = self
            .entry_path(app_id)
            .ok_or_else(|| ResolveError::NoEntry(app_id.to_string()))?;
        let icon = read_key(&path, "ICON")?;
        debug!("icon for {}: {}", app_id, icon);
        Ok(icon)
    }

    fn exec(&self, app_id: &str) -> Result<String, ResolveError> {
        let id = if app_id.to_uppercase().starts_with("GIMP") {
            "gimp"
        } else {
            app_id
        };
        let path = self
            .fuzzy_entry_path(id)
            .ok_or_else(|| ResolveError::NoEntry(app_id.to_string()))?;
        let exec = strip_field_codes(&read_key(&path, "EXEC")?);
        debug!("exec for {} ({}): {}", app_id, path.display(), exec);
        Ok(exec)
    }
}

/// Value of the first non-blank line starting with `key` (case-insensitive).
fn read_key(path: &Path, key: &'static str) -> Result<String, ResolveError> {
    let shown = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ResolveError::Io(shown.clone(), e.to_string()))?;
    text.lines()
        .map(str::trim)
        .filter(|l| l.to_uppercase().starts_with(key))
        .find_map(|l| l.split_once('=').map(|(_, v)| v.trim().to_string()))
        .ok_or(ResolveError::MissingKey(shown, key))
}

/// Cut an `Exec=` value before its first `%` field code.
pub fn strip_field_codes(exec: &str) -> String {
    match exec.find('%') {
        Some(at) => exec[..at].trim_end().to_string(),
        None => exec.trim().to_string(),
    }
}

/// The built-in icon exceptions table.
pub fn default_exceptions() -> BTreeMap<String, String> {
    [("gimp", "gimp"), ("pamac", "system-software-install")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
