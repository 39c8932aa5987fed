//! Dock Reconciler.
//!
//! Turns a [`Snapshot`] and the pinned ids into a [`ButtonPlan`]: the
//! complete, ordered description of what the dock shows, including every
//! click target and context menu.  The plan is rebuilt from scratch and
//! never patched; the toolkit layer only renders it.
//!
//! # Rebuild decision
//!
//! [`Reconciler::apply`] rebuilds when the task count or the focused
//! workspace differ from the last rebuild, or when the update is forced.
//! Identity changes with an unchanged count (a window closed while another
//! opened) are only picked up by forced updates or the next count change.
//!
//! # Grouping
//!
//! 1. Pinned pass: a pin with no running task (exact id) becomes a launcher
//!    button; otherwise its instances (per [`IdMatcher`]) become a single
//!    or grouped button.
//! 2. Task pass: every task whose id is neither pinned nor a launcher
//!    companion, grouped the same way, each id emitted once.

use crate::command::DockAction;
use crate::task::{IdMatcher, Snapshot, Task};
use crate::traits::{FeedUpdate, Resolver};
use crate::workspace::MAX_WORKSPACES;
use log::{debug, warn};

/// Items beyond this count shrink the icons.
pub const SCALE_THRESHOLD: usize = 6;
/// Every this many extra items shrink the icons by one step.
pub const SCALE_STEP: usize = 3;

/// Inputs to plan building that do not change between rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSettings {
    pub icon_size: i32,
    /// Configured workspace count, used for "To WS n" entries.
    pub workspaces: i64,
    pub show_workspaces: bool,
    /// Launcher command line; `None` hides the launcher button.
    pub launcher: Option<String>,
    /// App ids that belong to the launcher and never get a task button.
    pub companions: Vec<String>,
    pub title_max_chars: usize,
    pub matcher: IdMatcher,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            icon_size: 48,
            workspaces: 8,
            show_workspaces: true,
            launcher: None,
            companions: vec!["nwggrid".into()],
            title_max_chars: 20,
            matcher: IdMatcher::default(),
        }
    }
}

impl PlanSettings {
    fn is_companion(&self, app_id: &str) -> bool {
        let id = app_id.trim();
        self.companions.iter().any(|c| c == id)
    }

    /// Counted towards icon scaling: not a companion and not part of the
    /// launcher command line.
    fn counts_as_item(&self, app_id: &str) -> bool {
        let id = app_id.trim();
        if id.is_empty() || self.is_companion(id) {
            return false;
        }
        !self.launcher.as_deref().is_some_and(|l| l.contains(id))
    }
}

/// What a button displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonFace {
    /// Icon name or absolute path.
    Icon(String),
    /// Text fallback showing the raw app id.
    Label(String),
}

/// Small indicator under the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    NotRunning,
    Single,
    Multiple,
}

/// One popup menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Action { label: String, action: DockAction },
    Submenu { label: String, entries: Vec<MenuEntry> },
    Separator,
}

impl MenuEntry {
    fn action(label: impl Into<String>, action: DockAction) -> Self {
        MenuEntry::Action {
            label: label.into(),
            action,
        }
    }
}

/// Primary click behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Click {
    Run(DockAction),
    /// Open the instance picker.
    Menu(Vec<MenuEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockItem {
    pub app_id: String,
    pub face: ButtonFace,
    pub pinned: bool,
    /// Running instances, empty for a pinned launcher.
    pub instances: Vec<Task>,
    pub click: Click,
    pub context_menu: Vec<MenuEntry>,
}

impl DockItem {
    pub fn indicator(&self) -> Indicator {
        match self.instances.len() {
            0 => Indicator::NotRunning,
            1 => Indicator::Single,
            _ => Indicator::Multiple,
        }
    }

    pub fn is_group(&self) -> bool {
        self.instances.len() > 1
    }
}

/// Everything the dock shows, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPlan {
    pub items: Vec<DockItem>,
    pub icon_size: i32,
    /// Focused workspace for the switcher button, `None` when hidden.
    pub workspace: Option<i64>,
    /// Launcher command, `None` when the launcher button is hidden.
    pub launcher: Option<String>,
}

/// Icon size for `count` items.  Non-increasing in `count`.
pub fn scaled_icon_size(base: i32, count: usize) -> i32 {
    if count <= SCALE_THRESHOLD {
        return base;
    }
    let steps = ((count - SCALE_THRESHOLD) / SCALE_STEP) as i32;
    base * SCALE_THRESHOLD as i32 / (SCALE_THRESHOLD as i32 + steps)
}

/// Number of distinct ids that will get a button.
fn item_count(snapshot: &Snapshot, pins: &[String], settings: &PlanSettings) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for id in pins.iter().map(String::as_str) {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    for t in &snapshot.tasks {
        let id = t.app_id.as_str();
        if !seen.contains(&id) && settings.counts_as_item(id) {
            seen.push(id);
        }
    }
    seen.len()
}

fn face_for<R: Resolver>(resolver: &R, app_id: &str) -> ButtonFace {
    match resolver.icon(app_id) {
        Ok(icon) => ButtonFace::Icon(icon),
        Err(e) => {
            warn!("no icon for {}: {}", app_id, e);
            ButtonFace::Label(app_id.to_string())
        }
    }
}

/// Instance picker: one focus entry per instance.
pub fn instance_menu(instances: &[Task], title_max: usize) -> Vec<MenuEntry> {
    instances
        .iter()
        .map(|t| MenuEntry::action(t.menu_label(title_max), DockAction::Focus { con_id: t.con_id }))
        .collect()
}

/// Secondary-click menu for a running app.
pub fn task_context_menu(
    app_id: &str,
    instances: &[Task],
    pinned: bool,
    settings: &PlanSettings,
) -> Vec<MenuEntry> {
    let workspaces = settings.workspaces.clamp(1, MAX_WORKSPACES);
    let mut menu: Vec<MenuEntry> = instances
        .iter()
        .map(|t| {
            let mut entries = vec![MenuEntry::action("Close", DockAction::Close { con_id: t.con_id })];
            entries.extend((1..=workspaces).map(|n| {
                MenuEntry::action(
                    format!("To WS {}", n),
                    DockAction::MoveToWorkspace {
                        con_id: t.con_id,
                        workspace: n,
                    },
                )
            }));
            MenuEntry::Submenu {
                label: t.menu_label(settings.title_max_chars),
                entries,
            }
        })
        .collect();

    menu.push(MenuEntry::Separator);
    menu.push(MenuEntry::action(
        "New window",
        DockAction::Launch {
            app_id: app_id.to_string(),
        },
    ));
    let app_id = app_id.to_string();
    menu.push(if pinned {
        MenuEntry::action("Unpin", DockAction::Unpin { app_id })
    } else {
        MenuEntry::action("Pin", DockAction::Pin { app_id })
    });
    menu
}

fn pinned_launcher<R: Resolver>(app_id: &str, resolver: &R) -> DockItem {
    DockItem {
        app_id: app_id.to_string(),
        face: face_for(resolver, app_id),
        pinned: true,
        instances: Vec::new(),
        click: Click::Run(DockAction::Launch {
            app_id: app_id.to_string(),
        }),
        context_menu: vec![MenuEntry::action(
            "Unpin",
            DockAction::Unpin {
                app_id: app_id.to_string(),
            },
        )],
    }
}

/// Button for running `instances` (at least one) grouped under `app_id`.
/// A pinned item keeps the pinned id even when the matcher gathered
/// instances with a longer id.
fn task_item<R: Resolver>(
    app_id: &str,
    instances: Vec<Task>,
    pinned: bool,
    settings: &PlanSettings,
    resolver: &R,
) -> Option<DockItem> {
    if instances.is_empty() {
        return None;
    }
    let app_id = app_id.trim().to_string();
    let click = match instances.as_slice() {
        [only] => Click::Run(DockAction::Focus { con_id: only.con_id }),
        many => Click::Menu(instance_menu(many, settings.title_max_chars)),
    };
    Some(DockItem {
        face: face_for(resolver, &app_id),
        context_menu: task_context_menu(&app_id, &instances, pinned, settings),
        app_id,
        pinned,
        instances,
        click,
    })
}

/// Build the complete plan.  Pure: the same inputs give the same plan.
pub fn build_plan<R: Resolver>(
    snapshot: &Snapshot,
    pins: &[String],
    settings: &PlanSettings,
    resolver: &R,
) -> ButtonPlan {
    let matcher = settings.matcher;
    let mut items = Vec::new();

    let mut added: Vec<String> = Vec::new();
    for pin in pins {
        if !snapshot.contains_app(pin) {
            items.push(pinned_launcher(pin, resolver));
            continue;
        }
        let key = pin.trim().to_string();
        if added.contains(&key) {
            continue;
        }
        let instances = snapshot.instances_of(pin, matcher);
        items.extend(task_item(&key, instances, true, settings, resolver));
        added.push(key);
    }

    added.clear();
    let is_pinned = |id: &str| pins.iter().any(|p| p.trim() == id.trim());
    for t in &snapshot.tasks {
        if is_pinned(&t.app_id) || settings.is_companion(&t.app_id) || added.contains(&t.app_id) {
            continue;
        }
        let instances = snapshot.instances_of(&t.app_id, matcher);
        items.extend(task_item(&t.app_id, instances, false, settings, resolver));
        added.push(t.app_id.clone());
    }

    let count = item_count(snapshot, pins, settings);
    ButtonPlan {
        items,
        icon_size: scaled_icon_size(settings.icon_size, count),
        workspace: settings.show_workspaces.then_some(snapshot.focused_workspace),
        launcher: settings.launcher.clone(),
    }
}

/// UI-thread reconciliation context.
///
/// Owns the last applied snapshot and plan.  Background threads never see
/// it; they only deliver [`FeedUpdate`]s.
#[derive(Debug)]
pub struct Reconciler {
    settings: PlanSettings,
    snapshot: Snapshot,
    /// `(task count, focused workspace)` of the last rebuild.
    last_rebuild: Option<(usize, i64)>,
    plan: Option<ButtonPlan>,
}

impl Reconciler {
    pub fn new(settings: PlanSettings) -> Self {
        Self {
            settings,
            snapshot: Snapshot::default(),
            last_rebuild: None,
            plan: None,
        }
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn plan(&self) -> Option<&ButtonPlan> {
        self.plan.as_ref()
    }

    pub fn should_rebuild(&self, snapshot: &Snapshot, forced: bool) -> bool {
        match self.last_rebuild {
            _ if forced => true,
            None => true,
            Some((len, ws)) => len != snapshot.len() || ws != snapshot.focused_workspace,
        }
    }

    /// Take `update` as the current snapshot and rebuild if needed.
    ///
    /// Returns the new plan when a rebuild happened, `None` when the
    /// rendered plan stays as it is.
    pub fn apply<R: Resolver>(
        &mut self,
        update: FeedUpdate,
        pins: &[String],
        resolver: &R,
    ) -> Option<&ButtonPlan> {
        let FeedUpdate { snapshot, forced } = update;
        let rebuild = self.should_rebuild(&snapshot, forced);
        self.snapshot = snapshot;
        if !rebuild {
            debug!("snapshot unchanged, keeping plan");
            return None;
        }
        debug!(
            "rebuilding: {} tasks, workspace {}, forced {}",
            self.snapshot.len(),
            self.snapshot.focused_workspace,
            forced
        );
        let plan = build_plan(&self.snapshot, pins, &self.settings, resolver);
        self.last_rebuild = Some((self.snapshot.len(), self.snapshot.focused_workspace));
        self.plan = Some(plan);
        self.plan.as_ref()
    }
}

/// Collapse a burst of updates into one: the newest snapshot, forced when
/// any of them was.
pub fn coalesce(updates: impl IntoIterator<Item = FeedUpdate>) -> Option<FeedUpdate> {
    updates.into_iter().reduce(|acc, next| FeedUpdate {
        snapshot: next.snapshot,
        forced: acc.forced || next.forced,
    })
}
