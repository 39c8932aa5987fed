//! Tasks and snapshots shared by every component.
//!
//! A [`Task`] is one leaf window reported by the compositor.  Tasks are
//! rebuilt from scratch on every tree query; identity across queries is
//! re-established only through [`Task::con_id`].

use std::fmt;

/// One compositor leaf window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Compositor-assigned container id, used for focus/close/move commands.
    pub con_id: i64,
    /// Grouping key: the window's app id, or its window class when absent.
    pub app_id: String,
    /// Window title.
    pub name: String,
    /// Owning process, informational only.
    pub pid: Option<u32>,
    /// Number of the workspace the window currently occupies (0 if unknown).
    pub workspace: i64,
}

impl Task {
    /// Title cut to at most `max_chars` characters (not bytes).
    pub fn short_title(&self, max_chars: usize) -> String {
        self.name.chars().take(max_chars).collect()
    }

    /// Menu label in the form `"<title> (<workspace>)"`.
    pub fn menu_label(&self, max_chars: usize) -> String {
        format!("{} ({})", self.short_title(max_chars), self.workspace)
    }
}

/// A complete, consistent task list captured at one instant.
///
/// Tasks are ordered by ascending workspace number; same-workspace tasks
/// keep tree traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    /// Number of the focused workspace, 0 when none is focused.
    pub focused_workspace: i64,
}

impl Snapshot {
    pub fn new(tasks: Vec<Task>, focused_workspace: i64) -> Self {
        Self {
            tasks,
            focused_workspace,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `true` when some task's app id equals `app_id` exactly (ignoring
    /// surrounding whitespace).
    pub fn contains_app(&self, app_id: &str) -> bool {
        let wanted = app_id.trim();
        self.tasks.iter().any(|t| t.app_id.trim() == wanted)
    }

    /// All tasks that `matcher` considers instances of `app_id`, in
    /// snapshot order.
    pub fn instances_of(&self, app_id: &str, matcher: IdMatcher) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| matcher.matches(&t.app_id, app_id))
            .cloned()
            .collect()
    }
}

/// How a task's app id is compared against a lookup key.
///
/// [`Substring`](IdMatcher::Substring) is the historical behaviour: the key
/// matches any app id that contains it, case-insensitively.  It tolerates
/// desktop-file / app-id mismatches but also lets `"code"` match
/// `"vscode"`.  [`Exact`](IdMatcher::Exact) compares trimmed ids verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdMatcher {
    #[default]
    Substring,
    Exact,
}

impl IdMatcher {
    /// Does `candidate` (a task's app id) match the lookup `key`?
    pub fn matches(self, candidate: &str, key: &str) -> bool {
        match self {
            IdMatcher::Substring => candidate.to_uppercase().contains(&key.to_uppercase()),
            IdMatcher::Exact => candidate.trim() == key.trim(),
        }
    }
}

impl fmt::Display for IdMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdMatcher::Substring => write!(f, "substring"),
            IdMatcher::Exact => write!(f, "exact"),
        }
    }
}

#[cfg(test)]
pub(crate) fn task(con_id: i64, app_id: &str, workspace: i64) -> Task {
    Task {
        con_id,
        app_id: app_id.into(),
        name: format!("{} window {}", app_id, con_id),
        pid: Some(1000 + con_id as u32),
        workspace,
    }
}
