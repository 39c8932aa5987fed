//! Actions and types used throughout the dock.
//!
//! [`DockAction`] describes everything a click, scroll or menu entry can
//! ask the [`Dock`](crate::dock::Dock) to do; [`OutputInfo`] describes a
//! compositor output.

use std::fmt;

/// Every action a dock button or menu entry can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DockAction {
    /// Focus the window with the given container id.
    Focus { con_id: i64 },
    /// Close (kill) the window with the given container id.
    Close { con_id: i64 },
    /// Move the window to workspace number `workspace`.
    MoveToWorkspace { con_id: i64, workspace: i64 },
    /// Launch a new instance of the application.
    Launch { app_id: String },
    /// Add the application to the pinned set.
    Pin { app_id: String },
    /// Remove the application from the pinned set.
    Unpin { app_id: String },
    /// Switch to workspace number `n`.
    FocusWorkspace(i64),
    /// Run the configured launcher command.
    RunLauncher,
}

impl DockAction {
    /// The compositor command implementing this action, if it is one.
    pub fn ipc_command(&self) -> Option<String> {
        match self {
            DockAction::Focus { con_id } => Some(format!("[con_id={}] focus", con_id)),
            DockAction::Close { con_id } => Some(format!("[con_id={}] kill", con_id)),
            DockAction::MoveToWorkspace { con_id, workspace } => Some(format!(
                "[con_id={}] move to workspace number {}",
                con_id, workspace
            )),
            DockAction::FocusWorkspace(n) => Some(format!("workspace number {}", n)),
            DockAction::Launch { .. }
            | DockAction::Pin { .. }
            | DockAction::Unpin { .. }
            | DockAction::RunLauncher => None,
        }
    }

    /// Whether the dock must be rebuilt after this action even when the
    /// task count stays the same.
    pub fn forces_rebuild(&self) -> bool {
        matches!(
            self,
            DockAction::Pin { .. } | DockAction::Unpin { .. } | DockAction::MoveToWorkspace { .. }
        )
    }

    /// Whether an auto-hiding dock should schedule its hide after this action.
    pub fn hides_dock(&self) -> bool {
        matches!(
            self,
            DockAction::Focus { .. }
                | DockAction::Close { .. }
                | DockAction::MoveToWorkspace { .. }
                | DockAction::Launch { .. }
                | DockAction::RunLauncher
        )
    }
}

impl fmt::Display for DockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockAction::Focus { con_id } => write!(f, "focus {}", con_id),
            DockAction::Close { con_id } => write!(f, "close {}", con_id),
            DockAction::MoveToWorkspace { con_id, workspace } => {
                write!(f, "move {} to workspace {}", con_id, workspace)
            }
            DockAction::Launch { app_id } => write!(f, "launch {}", app_id),
            DockAction::Pin { app_id } => write!(f, "pin {}", app_id),
            DockAction::Unpin { app_id } => write!(f, "unpin {}", app_id),
            DockAction::FocusWorkspace(n) => write!(f, "workspace {}", n),
            DockAction::RunLauncher => write!(f, "launcher"),
        }
    }
}

/// A compositor output and its position on the virtual desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Output name (e.g. `"DP-1"`).
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Split a command line into program and arguments on whitespace.
///
/// Returns `None` for a blank command line.
pub fn split_command_line(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}
