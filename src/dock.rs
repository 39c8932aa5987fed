//! The orchestrator that ties the compositor, the pin store, the resolver
//! and the reconciler together.
//!
//! [`Dock`] lives on the UI thread.  It executes [`DockAction`]s coming from
//! buttons and menus, and folds [`FeedUpdate`]s into the current
//! [`ButtonPlan`].

use crate::command::{split_command_line, DockAction};
use crate::pins::{PinError, PinStore};
use crate::reconciler::{coalesce, ButtonPlan, Reconciler};
use crate::sway::feed::RefreshHandle;
use crate::traits::{Compositor, FeedUpdate, Resolver};
use log::{debug, info, warn};
use std::process::{Command as Process, Stdio};

/// Possible errors from the dock.
#[derive(Debug, thiserror::Error)]
pub enum DockError {
    /// The compositor could not be queried or refused a command.
    #[error("compositor error: {0}")]
    Compositor(String),
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error("launch {0:?}: {1}")]
    Launch(String, std::io::Error),
    #[error("nothing to launch for {0}")]
    EmptyCommand(String),
}

/// What the UI should do after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Schedule the auto-hide.
    pub hide: bool,
}

/// Orchestrates actions and reconciliation.
///
/// Generic over any [`Compositor`] and [`Resolver`], so tests drive it with
/// doubles.
pub struct Dock<C: Compositor, R: Resolver> {
    compositor: C,
    resolver: R,
    pins: PinStore,
    reconciler: Reconciler,
    refresh: RefreshHandle,
    /// A mutating action is waiting for a rebuild.  Survives refreshes
    /// that fail, so the change shows with the next update.
    dirty: bool,
}

impl<C: Compositor, R: Resolver> Dock<C, R> {
    pub fn new(
        compositor: C,
        resolver: R,
        pins: PinStore,
        reconciler: Reconciler,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            compositor,
            resolver,
            pins,
            reconciler,
            refresh,
            dirty: false,
        }
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn pins(&self) -> &PinStore {
        &self.pins
    }

    pub fn plan(&self) -> Option<&ButtonPlan> {
        self.reconciler.plan()
    }

    /// Fetch the first snapshot and build the first plan.  Failure here is
    /// fatal for the caller: without a tree there is nothing to show.
    pub fn initialize(&mut self) -> Result<&ButtonPlan, DockError> {
        let snapshot = self
            .compositor
            .snapshot()
            .map_err(|e| DockError::Compositor(e.to_string()))?;
        info!(
            "initial snapshot: {} tasks, workspace {}",
            snapshot.len(),
            snapshot.focused_workspace
        );
        let update = FeedUpdate {
            snapshot,
            forced: true,
        };
        self.dirty = false;
        self.reconciler
            .apply(update, self.pins.ids(), &self.resolver)
            .ok_or_else(|| DockError::Compositor("initial plan not built".into()))
    }

    /// Fold every pending update into one and reconcile once.  Returns the
    /// new plan if the dock must be rebuilt.
    pub fn on_updates(
        &mut self,
        updates: impl IntoIterator<Item = FeedUpdate>,
    ) -> Option<&ButtonPlan> {
        let mut update = coalesce(updates)?;
        update.forced |= self.dirty;
        let plan = self.reconciler.apply(update, self.pins.ids(), &self.resolver);
        if plan.is_some() {
            self.dirty = false;
        }
        plan
    }

    /// Whether a mutating action still waits for a rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Execute `action`.
    pub fn handle(&mut self, action: DockAction) -> Result<Outcome, DockError> {
        debug!("action: {}", action);
        let outcome = Outcome {
            hide: action.hides_dock(),
        };

        if let Some(cmd) = action.ipc_command() {
            self.compositor
                .run_command(&cmd)
                .map_err(|e| DockError::Compositor(e.to_string()))?;
        }

        match &action {
            DockAction::Pin { app_id } => {
                if !self.pins.pin(app_id)? {
                    return Ok(outcome);
                }
            }
            DockAction::Unpin { app_id } => {
                if !self.pins.unpin(app_id)? {
                    return Ok(outcome);
                }
            }
            DockAction::Launch { app_id } => {
                let line = self.launch_command(app_id);
                spawn(&line, app_id)?;
            }
            DockAction::RunLauncher => {
                let line = self
                    .reconciler
                    .settings()
                    .launcher
                    .clone()
                    .ok_or_else(|| DockError::EmptyCommand("launcher".into()))?;
                spawn(&line, "launcher")?;
            }
            // Fire and forget: the next snapshot shows the effect.
            DockAction::MoveToWorkspace { .. }
            | DockAction::Focus { .. }
            | DockAction::Close { .. }
            | DockAction::FocusWorkspace(_) => {}
        }

        if action.forces_rebuild() {
            self.dirty = true;
            self.refresh.request();
        }
        Ok(outcome)
    }

    /// Command line that launches `app_id`, falling back to the raw id.
    pub fn launch_command(&self, app_id: &str) -> String {
        self.resolver.exec(app_id).unwrap_or_else(|e| {
            warn!("{}; trying {:?} as a command", e, app_id);
            app_id.to_string()
        })
    }
}

/// Start `line` detached from the dock.  The child is reaped on a
/// background thread.
pub fn spawn(line: &str, what: &str) -> Result<(), DockError> {
    let (program, args) =
        split_command_line(line).ok_or_else(|| DockError::EmptyCommand(what.to_string()))?;
    let mut child = Process::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| DockError::Launch(line.to_string(), e))?;
    info!("launched {:?} (pid {})", line, child.id());
    std::thread::spawn(move || {
        if let Err(e) = child.wait() {
            warn!("waiting for {}: {}", program, e);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::PlanSettings;
    use crate::sway::feed::fetch_update;
    use crate::task::{task, Snapshot};
    use crate::traits::testing::{MapResolver, MockCompositor};
    use std::sync::mpsc;

    struct Fixture {
        dock: Dock<MockCompositor, MapResolver>,
        refreshes: mpsc::Receiver<()>,
        _dir: tempfile::TempDir,
    }

    fn fixture(compositor: MockCompositor, settings: PlanSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pins = PinStore::load(dir.path().join("pinned")).unwrap();
        let (refresh, refreshes) = RefreshHandle::channel();
        let dock = Dock::new(
            compositor,
            MapResolver::with_icons(&["foot"]),
            pins,
            Reconciler::new(settings),
            refresh,
        );
        Fixture {
            dock,
            refreshes,
            _dir: dir,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(vec![task(1, "foot", 1), task(2, "firefox", 2)], 1)
    }

    #[test]
    fn initialize_builds_first_plan() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        let plan = f.dock.initialize().unwrap();
        assert_eq!(plan.items.len(), 2);
    }

    #[test]
    fn initialize_fails_without_compositor() {
        let mut f = fixture(MockCompositor::unreachable(), PlanSettings::default());
        assert!(matches!(f.dock.initialize(), Err(DockError::Compositor(_))));
    }

    #[test]
    fn window_actions_run_compositor_commands() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        let out = f.dock.handle(DockAction::Focus { con_id: 2 }).unwrap();
        assert!(out.hide);
        f.dock.handle(DockAction::Close { con_id: 1 }).unwrap();
        f.dock.handle(DockAction::FocusWorkspace(4)).unwrap();
        assert_eq!(
            f.dock.compositor().commands.borrow().as_slice(),
            ["[con_id=2] focus", "[con_id=1] kill", "workspace number 4"]
        );
        assert!(f.refreshes.try_recv().is_err());
    }

    #[test]
    fn move_requests_refresh() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        f.dock
            .handle(DockAction::MoveToWorkspace { con_id: 1, workspace: 3 })
            .unwrap();
        assert!(f.refreshes.try_recv().is_ok());
    }

    #[test]
    fn rejected_command_is_reported() {
        let compositor = MockCompositor {
            fail_commands: true,
            ..MockCompositor::serving(snapshot())
        };
        let mut f = fixture(compositor, PlanSettings::default());
        assert!(matches!(
            f.dock.handle(DockAction::Focus { con_id: 1 }),
            Err(DockError::Compositor(_))
        ));
    }

    #[test]
    fn pin_persists_and_requests_refresh() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        let out = f.dock.handle(DockAction::Pin { app_id: "foot".into() }).unwrap();
        assert!(!out.hide);
        assert!(f.refreshes.try_recv().is_ok());
        assert_eq!(
            PinStore::load(f.dock.pins().path()).unwrap().ids(),
            ["foot"]
        );

        // Pinning again changes nothing and asks for nothing.
        f.dock.handle(DockAction::Pin { app_id: "foot".into() }).unwrap();
        assert!(f.refreshes.try_recv().is_err());

        f.dock.handle(DockAction::Unpin { app_id: "foot".into() }).unwrap();
        assert!(f.refreshes.try_recv().is_ok());
        assert!(f.dock.pins().ids().is_empty());
    }

    #[test]
    fn forced_update_after_pin_shows_it_first() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        f.dock.initialize().unwrap();
        f.dock.handle(DockAction::Pin { app_id: "firefox".into() }).unwrap();

        let update = FeedUpdate {
            snapshot: snapshot(),
            forced: true,
        };
        let plan = f.dock.on_updates(vec![update]).unwrap();
        assert_eq!(plan.items[0].app_id, "firefox");
        assert!(plan.items[0].pinned);
    }

    #[test]
    fn pin_shows_after_failed_refresh() {
        let foot = || Snapshot::new(vec![task(1, "foot", 1)], 1);
        let mut f = fixture(MockCompositor::serving(foot()), PlanSettings::default());
        f.dock.initialize().unwrap();
        f.dock.handle(DockAction::Pin { app_id: "gimp".into() }).unwrap();
        assert!(f.refreshes.try_recv().is_ok());
        assert!(f.dock.is_dirty());

        // The forced refresh times out and delivers nothing.
        assert!(fetch_update(&MockCompositor::unreachable(), true).is_none());

        let plain = FeedUpdate {
            snapshot: foot(),
            forced: false,
        };
        let plan = f.dock.on_updates(vec![plain.clone()]).unwrap();
        let ids: Vec<&str> = plan.items.iter().map(|i| i.app_id.as_str()).collect();
        assert_eq!(ids, ["gimp", "foot"]);
        assert!(!f.dock.is_dirty());
        assert!(f.dock.on_updates(vec![plain]).is_none());
    }

    #[test]
    fn move_marks_dock_dirty() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        f.dock.initialize().unwrap();
        f.dock.handle(DockAction::Focus { con_id: 1 }).unwrap();
        assert!(!f.dock.is_dirty());
        f.dock
            .handle(DockAction::MoveToWorkspace { con_id: 1, workspace: 3 })
            .unwrap();
        assert!(f.dock.is_dirty());
    }

    #[test]
    fn unchanged_updates_keep_plan() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        f.dock.initialize().unwrap();
        let same = FeedUpdate {
            snapshot: snapshot(),
            forced: false,
        };
        assert!(f.dock.on_updates(vec![same.clone(), same]).is_none());
        assert!(f.dock.on_updates(Vec::new()).is_none());
    }

    #[test]
    fn launch_command_falls_back_to_id() {
        let f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        assert_eq!(f.dock.launch_command("foot"), "foot");
        let mut resolver = MapResolver::default();
        resolver.execs.insert("firefox".into(), "firefox --new-window".into());
        let dock = Dock::new(
            MockCompositor::unreachable(),
            resolver,
            f.dock.pins().clone(),
            Reconciler::new(PlanSettings::default()),
            RefreshHandle::channel().0,
        );
        assert_eq!(dock.launch_command("firefox"), "firefox --new-window");
    }

    #[test]
    fn missing_launcher_is_an_error() {
        let mut f = fixture(MockCompositor::serving(snapshot()), PlanSettings::default());
        assert!(matches!(
            f.dock.handle(DockAction::RunLauncher),
            Err(DockError::EmptyCommand(_))
        ));
    }

    #[test]
    fn spawn_runs_and_reports_missing_programs() {
        spawn("true", "test").unwrap();
        assert!(matches!(
            spawn("/nonexistent/swaydock-test-binary", "test"),
            Err(DockError::Launch(..))
        ));
        assert!(matches!(spawn("  ", "test"), Err(DockError::EmptyCommand(_))));
    }
}
