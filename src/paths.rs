//! XDG directory resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP: &str = "swaydock";
const DEFAULT_DATA_DIRS: &str = "/usr/local/share/:/usr/share/";

/// Snapshot of the environment variables that locate our files.
///
/// Built once with [`XdgDirs::from_env`]; tests construct it directly.
#[derive(Debug, Clone, Default)]
pub struct XdgDirs {
    pub home: Option<PathBuf>,
    pub config_home: Option<PathBuf>,
    pub cache_home: Option<PathBuf>,
    pub data_home: Option<PathBuf>,
    pub data_dirs: Option<String>,
    pub tmp: Option<PathBuf>,
}

fn non_empty(v: Option<OsString>) -> Option<OsString> {
    v.filter(|s| !s.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    non_empty(std::env::var_os(key)).map(PathBuf::from)
}

impl XdgDirs {
    pub fn from_env() -> Self {
        Self {
            home: env_path("HOME"),
            config_home: env_path("XDG_CONFIG_HOME"),
            cache_home: env_path("XDG_CACHE_HOME"),
            data_home: env_path("XDG_DATA_HOME"),
            data_dirs: non_empty(std::env::var_os("XDG_DATA_DIRS"))
                .and_then(|s| s.into_string().ok()),
            tmp: ["TMPDIR", "TEMP", "TMP"].iter().find_map(|k| env_path(k)),
        }
    }

    /// `$XDG_CONFIG_HOME/swaydock`, else `~/.config/swaydock`.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_home
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".config")))
            .map(|d| d.join(APP))
    }

    /// `$XDG_CACHE_HOME`, else `~/.cache`.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_home
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".cache")))
    }

    /// `$TMPDIR`, `$TEMP` or `$TMP`, else `/tmp`.
    pub fn temp_dir(&self) -> PathBuf {
        self.tmp.clone().unwrap_or_else(|| PathBuf::from("/tmp"))
    }

    fn data_home(&self) -> Option<PathBuf> {
        self.data_home
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".local/share")))
    }

    fn data_dirs(&self) -> Vec<PathBuf> {
        self.data_dirs
            .as_deref()
            .unwrap_or(DEFAULT_DATA_DIRS)
            .split(':')
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Desktop entry search path, user directory first, duplicates removed.
    pub fn app_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut push = |d: PathBuf| {
            if !dirs.contains(&d) {
                dirs.push(d);
            }
        };
        if let Some(d) = self.data_home() {
            push(d.join("applications"));
        }
        for d in self.data_dirs() {
            push(d.join("applications"));
        }
        if let Some(h) = &self.home {
            push(h.join(".local/share/flatpak/exports/share/applications"));
        }
        push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
        dirs
    }

    /// First packaged `swaydock/<name>` found in the data directories.
    pub fn find_data_file(&self, name: &str) -> Option<PathBuf> {
        self.data_home()
            .into_iter()
            .chain(self.data_dirs())
            .map(|d| d.join(APP).join(name))
            .find(|p| p.is_file())
    }

    pub fn pin_file(&self) -> Option<PathBuf> {
        self.cache_dir().map(|d| d.join(format!("{}-pinned", APP)))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.temp_dir().join(format!("{}.lock", APP))
    }
}

/// Copy the packaged `name` into `config_dir` unless a copy already exists.
///
/// Returns the path inside `config_dir` when the file is present afterwards.
pub fn install_default(
    dirs: &XdgDirs,
    config_dir: &Path,
    name: &str,
) -> std::io::Result<Option<PathBuf>> {
    let target = config_dir.join(name);
    if target.is_file() {
        return Ok(Some(target));
    }
    std::fs::create_dir_all(config_dir)?;
    match dirs.find_data_file(name) {
        Some(src) => {
            std::fs::copy(&src, &target)?;
            log::info!("copied {} to {}", src.display(), target.display());
            Ok(Some(target))
        }
        None => Ok(None),
    }
}
