//! Entry point for the **swaydock** dock.
//!
//! Resolves settings, takes the single-instance lock, starts the task feed
//! on background threads and hands the main thread to the UI.
//!
//! When the `ui-gtk` feature is enabled the main thread runs the GLib main
//! loop (GTK4 requires it) and polls the feed from there.  Without the
//! feature, plans are logged from a simple blocking loop instead.

use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::exit;
use swaydock::config::{self, Args, FileConfig, Settings};
use swaydock::desktop::DesktopEntries;
use swaydock::dock::Dock;
use swaydock::instance::{on_already_running, InstanceLock, LockError};
use swaydock::paths::{install_default, XdgDirs};
use swaydock::pins::PinStore;
use swaydock::reconciler::Reconciler;
use swaydock::sway::{feed, SwayCompositor};
use swaydock::traits::FeedUpdate;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load `--config` or `$XDG_CONFIG_HOME/swaydock/config.json`, falling
/// back to compiled-in defaults.
fn load_file_config(explicit: Option<&Path>, config_dir: Option<&Path>) -> FileConfig {
    let Some(path) = explicit
        .map(Path::to_path_buf)
        .or_else(|| config_dir.map(|d| d.join("config.json")))
    else {
        return FileConfig::default();
    };
    match FileConfig::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            FileConfig::default()
        }
    }
}

/// Stylesheet path: absolute `-s` values are used as is, names are looked
/// up in the config dir, where the packaged default is installed first.
fn css_path(dirs: &XdgDirs, config_dir: Option<&Path>, name: &str) -> Option<PathBuf> {
    let given = Path::new(name);
    if given.is_absolute() {
        return Some(given.to_path_buf());
    }
    let config_dir = config_dir?;
    if let Err(e) = install_default(dirs, config_dir, name) {
        warn!("could not install default {}: {}", name, e);
    }
    Some(config_dir.join(name))
}

fn fatal(msg: impl std::fmt::Display) -> ! {
    error!("{}", msg);
    exit(1)
}

//  Main

fn main() {
    let args = Args::parse();
    if args.version {
        println!("swaydock version {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    init_logging(args.debug);

    let dirs = XdgDirs::from_env();
    let config_dir = dirs.config_dir();
    let file = load_file_config(args.config.as_deref(), config_dir.as_deref());
    let (settings, warnings) = config::resolve(&args, file, config::on_path);
    for w in &warnings {
        warn!("{}", w);
    }

    let _lock = match InstanceLock::acquire(&dirs.lock_file()) {
        Ok(lock) => lock,
        Err(LockError::AlreadyRunning { pid, .. }) => {
            on_already_running(pid, settings.stays_resident());
            return;
        }
        Err(e) => fatal(e),
    };

    let Some(pin_file) = dirs.pin_file() else {
        fatal("cannot determine the cache directory (is $HOME set?)");
    };
    let pins = PinStore::load(pin_file).unwrap_or_else(|e| fatal(e));
    info!("{} pinned app(s) from {}", pins.ids().len(), pins.path().display());

    let compositor = SwayCompositor::from_env(settings.ipc_timeout).unwrap_or_else(|e| fatal(e));
    let desktop = DesktopEntries::new(dirs.app_dirs(), settings.icon_exceptions.clone());

    let (feed, updates) = feed::start(
        compositor.socket().to_path_buf(),
        compositor.clone(),
        settings.ipc_timeout,
    )
    .unwrap_or_else(|e| fatal(format!("failed to start the task feed: {}", e)));

    let reconciler = Reconciler::new(settings.plan_settings());
    let css = css_path(&dirs, config_dir.as_deref(), &settings.css_file);

    run(compositor, desktop, pins, reconciler, feed.refresh().clone(), updates, settings, css);

    feed.shutdown();
    info!("bye");
}

#[cfg(feature = "ui-gtk")]
#[allow(clippy::too_many_arguments)]
fn run(
    compositor: SwayCompositor,
    desktop: DesktopEntries,
    pins: PinStore,
    reconciler: Reconciler,
    refresh: feed::RefreshHandle,
    updates: std::sync::mpsc::Receiver<FeedUpdate>,
    settings: Settings,
    css: Option<PathBuf>,
) {
    use swaydock::ui::gtk::{run_main_loop, ThemedResolver};

    let resolver = ThemedResolver::new(desktop);
    let dock = Dock::new(compositor, resolver, pins, reconciler, refresh);
    if let Err(e) = run_main_loop(dock, updates, settings, css) {
        fatal(e);
    }
}

#[cfg(not(feature = "ui-gtk"))]
#[allow(clippy::too_many_arguments)]
fn run(
    compositor: SwayCompositor,
    desktop: DesktopEntries,
    pins: PinStore,
    reconciler: Reconciler,
    refresh: feed::RefreshHandle,
    updates: std::sync::mpsc::Receiver<FeedUpdate>,
    _settings: Settings,
    _css: Option<PathBuf>,
) {
    let mut dock = Dock::new(compositor, desktop, pins, reconciler, refresh);
    match dock.initialize() {
        Ok(plan) => log_plan(plan),
        Err(e) => fatal(e),
    }
    info!("swaydock running headless");
    while let Ok(first) = updates.recv() {
        let batch = std::iter::once(first).chain(updates.try_iter());
        if let Some(plan) = dock.on_updates(batch) {
            log_plan(plan);
        }
    }
    info!("task feed closed, exiting");
}

#[cfg(not(feature = "ui-gtk"))]
fn log_plan(plan: &swaydock::reconciler::ButtonPlan) {
    let ids: Vec<&str> = plan.items.iter().map(|i| i.app_id.as_str()).collect();
    info!(
        "dock: [{}] at {}px, workspace {:?}",
        ids.join(", "),
        plan.icon_size,
        plan.workspace
    );
}
