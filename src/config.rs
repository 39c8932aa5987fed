//! Application configuration.
//!
//! Two layers: command-line flags ([`Args`], parsed with `clap`) and an
//! optional JSON file at `$XDG_CONFIG_HOME/swaydock/config.json`
//! ([`FileConfig`]) for settings that rarely change.  [`resolve`] merges
//! them into [`Settings`], applying the precedence rules between flags that
//! contradict each other.
//!
//! # Example
//!
//! ```json
//! {
//!   "hide_delay_ms": 1000,
//!   "title_max_chars": 20,
//!   "ipc_timeout_ms": 100,
//!   "launcher_companions": ["nwggrid"],
//!   "icon_exceptions": { "gimp": "gimp", "pamac": "system-software-install" },
//!   "strict_id_matching": false
//! }
//! ```

use crate::command::split_command_line;
use crate::desktop::default_exceptions;
use crate::reconciler::PlanSettings;
use crate::task::IdMatcher;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Screen edge the dock is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Position {
    #[default]
    Bottom,
    Top,
    Left,
}

impl Position {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Position::Bottom | Position::Top)
    }
}

/// Layer-shell layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Layer {
    #[default]
    Overlay,
    Top,
    Bottom,
}

/// Placement of the buttons along a full-width/height dock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Alignment {
    Start,
    #[default]
    Center,
    End,
}

/// How the dock window reserves screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusiveZone {
    /// Push other windows aside by the dock's size.
    Auto,
    /// Draw over everything, including other panels' zones.
    Ignore,
    /// Compositor default.
    Normal,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "swaydock",
    about = "Dock for the sway compositor",
    disable_version_flag = true
)]
pub struct Args {
    /// Stylesheet file name inside the config directory
    #[arg(short = 's', long = "css", default_value = "style.css")]
    pub css_file: String,

    /// Name of the output to show the dock on (default: all)
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Print version and exit
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Auto-hide: close the dock on leave, reopen from the hotspot
    #[arg(short = 'd', long)]
    pub autohide: bool,

    /// Take the full width/height of the screen
    #[arg(short = 'f', long)]
    pub full: bool,

    /// Number of workspaces offered in menus and the switcher
    #[arg(short = 'w', long, default_value_t = 8)]
    pub workspaces: i64,

    #[arg(short = 'p', long, value_enum, default_value_t = Position::Bottom)]
    pub position: Position,

    /// Exclusive zone: move other windows aside; overrides --layer
    #[arg(short = 'x', long)]
    pub exclusive: bool,

    #[arg(short = 'i', long = "icon-size", default_value_t = 48)]
    pub icon_size: i32,

    #[arg(short = 'l', long, value_enum, default_value_t = Layer::Overlay)]
    pub layer: Layer,

    /// Command assigned to the launcher button
    #[arg(short = 'c', long = "launcher")]
    pub launcher_cmd: Option<String>,

    /// Alignment in full width/height mode
    #[arg(short = 'a', long, value_enum, default_value_t = Alignment::Center)]
    pub alignment: Alignment,

    #[arg(long = "mt", default_value_t = 0)]
    pub margin_top: i32,
    #[arg(long = "ml", default_value_t = 0)]
    pub margin_left: i32,
    #[arg(long = "mr", default_value_t = 0)]
    pub margin_right: i32,
    #[arg(long = "mb", default_value_t = 0)]
    pub margin_bottom: i32,

    /// Hotspot delay in ms: how fast the pointer must cross into the hotspot
    #[arg(long = "hd", default_value_t = 30)]
    pub hotspot_delay: u64,

    /// Hide the workspace switcher
    #[arg(long = "nows")]
    pub no_workspaces: bool,

    /// Hide the launcher button
    #[arg(long = "nolauncher")]
    pub no_launcher: bool,

    /// Stay resident when closed, without a hotspot
    #[arg(short = 'r', long)]
    pub resident: bool,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,

    /// Config file (default: $XDG_CONFIG_HOME/swaydock/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Settings read from the JSON file.  Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Delay before an auto-hiding dock closes after the pointer leaves (ms).
    pub hide_delay_ms: u64,
    /// Window titles in menus are cut to this many characters.
    pub title_max_chars: usize,
    /// Deadline for each compositor request (ms).
    pub ipc_timeout_ms: u64,
    /// App ids that belong to the launcher and never get a task button.
    pub launcher_companions: Vec<String>,
    /// App id prefix -> icon name.
    pub icon_exceptions: BTreeMap<String, String>,
    /// Match app ids exactly instead of by case-insensitive substring.
    pub strict_id_matching: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 1000,
            title_max_chars: 20,
            ipc_timeout_ms: 100,
            launcher_companions: vec!["nwggrid".into()],
            icon_exceptions: default_exceptions(),
            strict_id_matching: false,
        }
    }
}

impl FileConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub css_file: String,
    pub output: Option<String>,
    pub autohide: bool,
    pub resident: bool,
    pub full: bool,
    pub workspaces: i64,
    pub position: Position,
    pub alignment: Alignment,
    pub layer: Layer,
    pub exclusive_zone: ExclusiveZone,
    pub icon_size: i32,
    /// `None` hides the launcher button.
    pub launcher: Option<String>,
    /// `[top, left, right, bottom]`
    pub margins: [i32; 4],
    pub hotspot_delay: Duration,
    pub hide_delay: Duration,
    pub ipc_timeout: Duration,
    pub show_workspaces: bool,
    pub title_max_chars: usize,
    pub companions: Vec<String>,
    pub icon_exceptions: BTreeMap<String, String>,
    pub matcher: IdMatcher,
}

impl Settings {
    /// Whether closing the dock keeps the process alive.
    pub fn stays_resident(&self) -> bool {
        self.autohide || self.resident
    }

    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            icon_size: self.icon_size,
            workspaces: self.workspaces,
            show_workspaces: self.show_workspaces,
            launcher: self.launcher.clone(),
            companions: self.companions.clone(),
            title_max_chars: self.title_max_chars,
            matcher: self.matcher,
        }
    }
}

/// Merge flags and file settings.
///
/// Returns the settings and a warning for every conflict that was
/// resolved; conflicts are never fatal.  `is_command` decides whether a
/// program is available, for launcher auto-detection.
pub fn resolve(
    args: &Args,
    file: FileConfig,
    is_command: impl Fn(&str) -> bool,
) -> (Settings, Vec<String>) {
    let mut warnings = Vec::new();

    let mut autohide = args.autohide;
    if autohide && args.resident {
        warnings.push("auto-hide and resident are mutually exclusive, ignoring -d".to_string());
        autohide = false;
    }

    let mut layer = args.layer;
    let mut zone = ExclusiveZone::Normal;
    if args.exclusive {
        if layer != Layer::Top && layer != Layer::default() {
            warnings.push(format!("-x overrides -l {:?}, using the top layer", layer));
        }
        layer = Layer::Top;
        zone = ExclusiveZone::Auto;
    }
    if autohide {
        if args.exclusive {
            warnings.push("auto-hide ignores the exclusive zone".to_string());
        }
        // The dock must cover its own hotspot.
        layer = Layer::Overlay;
        zone = ExclusiveZone::Ignore;
    } else if layer == Layer::Overlay {
        zone = ExclusiveZone::Ignore;
    }

    let launcher = if args.no_launcher {
        if args.launcher_cmd.is_some() {
            warnings.push("--nolauncher overrides -c".to_string());
        }
        None
    } else {
        match args.launcher_cmd.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => Some(cmd.to_string()),
            _ => detect_launcher(&is_command),
        }
    };

    let mut companions = file.launcher_companions;
    if let Some((program, _)) = launcher.as_deref().and_then(split_command_line) {
        let name = match Path::new(&program).file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => program.clone(),
        };
        if !companions.contains(&name) {
            companions.push(name);
        }
    }

    let settings = Settings {
        css_file: args.css_file.clone(),
        output: args.output.clone(),
        autohide,
        resident: args.resident,
        full: args.full,
        workspaces: args.workspaces.max(1),
        position: args.position,
        alignment: args.alignment,
        layer,
        exclusive_zone: zone,
        icon_size: args.icon_size.max(1),
        launcher,
        margins: [
            args.margin_top,
            args.margin_left,
            args.margin_right,
            args.margin_bottom,
        ],
        hotspot_delay: Duration::from_millis(args.hotspot_delay),
        hide_delay: Duration::from_millis(file.hide_delay_ms),
        ipc_timeout: Duration::from_millis(file.ipc_timeout_ms.max(1)),
        show_workspaces: !args.no_workspaces,
        title_max_chars: file.title_max_chars,
        companions,
        icon_exceptions: file.icon_exceptions,
        matcher: if file.strict_id_matching {
            IdMatcher::Exact
        } else {
            IdMatcher::Substring
        },
    };
    (settings, warnings)
}

/// `nwg-drawer`, else `nwggrid -p`, else no launcher.
fn detect_launcher(is_command: &impl Fn(&str) -> bool) -> Option<String> {
    let found = if is_command("nwg-drawer") {
        Some("nwg-drawer".to_string())
    } else if is_command("nwggrid") {
        Some("nwggrid -p".to_string())
    } else {
        None
    };
    match &found {
        Some(cmd) => log::info!("using auto-detected launcher command {:?}", cmd),
        None => log::info!("no launcher found, hiding the launcher button"),
    }
    found
}

/// Is `name` an executable file somewhere on `$PATH`?
pub fn on_path(name: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| {
        std::fs::metadata(dir.join(name))
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("swaydock").chain(flags.iter().copied())).unwrap()
    }

    fn nothing_installed(_: &str) -> bool {
        false
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.workspaces, 8);
        assert_eq!(args.icon_size, 48);
        assert_eq!(args.hotspot_delay, 30);
        assert_eq!(args.position, Position::Bottom);
        assert_eq!(args.css_file, "style.css");

        let (s, warnings) = resolve(&args, FileConfig::default(), nothing_installed);
        assert!(warnings.is_empty());
        assert_eq!(s.layer, Layer::Overlay);
        assert_eq!(s.exclusive_zone, ExclusiveZone::Ignore);
        assert_eq!(s.hide_delay, Duration::from_millis(1000));
        assert_eq!(s.launcher, None);
        assert_eq!(s.matcher, IdMatcher::Substring);
    }

    #[test]
    fn short_and_margin_flags() {
        let args = parse(&[
            "-p", "left", "-i", "32", "-w", "4", "-a", "end", "--mt", "5", "--mb", "7", "-o",
            "DP-1", "--nows",
        ]);
        assert_eq!(args.position, Position::Left);
        assert_eq!(args.alignment, Alignment::End);
        let (s, _) = resolve(&args, FileConfig::default(), nothing_installed);
        assert_eq!(s.icon_size, 32);
        assert_eq!(s.workspaces, 4);
        assert_eq!(s.margins, [5, 0, 0, 7]);
        assert_eq!(s.output.as_deref(), Some("DP-1"));
        assert!(!s.show_workspaces);
    }

    #[test]
    fn resident_wins_over_autohide() {
        let (s, warnings) = resolve(&parse(&["-d", "-r"]), FileConfig::default(), nothing_installed);
        assert!(!s.autohide);
        assert!(s.resident);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn exclusive_forces_top_layer() {
        let (s, warnings) =
            resolve(&parse(&["-x", "-l", "bottom"]), FileConfig::default(), nothing_installed);
        assert_eq!(s.layer, Layer::Top);
        assert_eq!(s.exclusive_zone, ExclusiveZone::Auto);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn autohide_forces_overlay() {
        let (s, _) = resolve(&parse(&["-d", "-l", "bottom"]), FileConfig::default(), nothing_installed);
        assert_eq!(s.layer, Layer::Overlay);
        assert_eq!(s.exclusive_zone, ExclusiveZone::Ignore);
        assert!(s.stays_resident());
    }

    #[test]
    fn launcher_detection_and_companions() {
        let (s, _) = resolve(&parse(&[]), FileConfig::default(), |c| c == "nwggrid");
        assert_eq!(s.launcher.as_deref(), Some("nwggrid -p"));
        assert_eq!(s.companions, ["nwggrid"]);

        let (s, _) = resolve(&parse(&[]), FileConfig::default(), |_| true);
        assert_eq!(s.launcher.as_deref(), Some("nwg-drawer"));
        assert_eq!(s.companions, ["nwggrid", "nwg-drawer"]);

        let (s, _) = resolve(
            &parse(&["-c", "/usr/bin/wofi --show drun"]),
            FileConfig::default(),
            |_| true,
        );
        assert_eq!(s.launcher.as_deref(), Some("/usr/bin/wofi --show drun"));
        assert!(s.companions.contains(&"wofi".to_string()));
    }

    #[test]
    fn nolauncher_wins_over_command() {
        let (s, warnings) =
            resolve(&parse(&["--nolauncher", "-c", "fuzzel"]), FileConfig::default(), |_| true);
        assert_eq!(s.launcher, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn deserialize_partial_file() {
        let cfg: FileConfig =
            serde_json::from_str(r#"{ "hide_delay_ms": 250, "strict_id_matching": true }"#).unwrap();
        assert_eq!(cfg.hide_delay_ms, 250);
        assert_eq!(cfg.title_max_chars, 20);
        assert_eq!(cfg.icon_exceptions.get("pamac").map(String::as_str), Some("system-software-install"));

        let (s, _) = resolve(&parse(&[]), cfg, nothing_installed);
        assert_eq!(s.matcher, IdMatcher::Exact);
        assert_eq!(s.hide_delay, Duration::from_millis(250));
    }

    #[test]
    fn unknown_keys_ignored() {
        let _cfg: FileConfig = serde_json::from_str(r#"{ "future": { "key": 42 } }"#).unwrap();
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
        assert!(FileConfig::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn version_flag_is_lowercase_v() {
        assert!(parse(&["-v"]).version);
    }
}
