//! Task extraction from the sway node tree.
//!
//! The tree is walked as `root → outputs → workspaces → containers`.
//! Synthetic outputs (whose name starts with `__`, e.g. the scratchpad
//! holder `__i3`) are skipped.  Every leaf container and every floating
//! container attached to a workspace becomes one [`Task`].

use crate::command::OutputInfo;
use crate::task::{Snapshot, Task};
use serde::Deserialize;

/// Prefix sway uses for its internal outputs.
const INTERNAL_OUTPUT_PREFIX: &str = "__";

//  Minimal serde structs for the JSON we care about

/// Subset of a node returned by `GET_TREE`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub floating_nodes: Vec<Node>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub window_properties: Option<WindowProperties>,
}

/// X11 window properties (present for Xwayland windows).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowProperties {
    #[serde(default)]
    pub class: Option<String>,
}

/// Subset of an entry returned by `GET_WORKSPACES`.
#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    pub num: i64,
    pub name: String,
    #[serde(default)]
    pub focused: bool,
}

/// Subset of an entry returned by `GET_OUTPUTS`.
#[derive(Debug, Clone, Deserialize)]
pub struct Output {
    pub name: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Output> for OutputInfo {
    fn from(o: Output) -> Self {
        OutputInfo {
            name: o.name,
            x: o.rect.x,
            y: o.rect.y,
            width: o.rect.width,
            height: o.rect.height,
        }
    }
}

impl Node {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn is_internal_output(&self) -> bool {
        self.name().starts_with(INTERNAL_OUTPUT_PREFIX)
    }

    /// App id, falling back to the X11 window class.
    fn application_id(&self) -> Option<&str> {
        self.app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.window_properties
                    .as_ref()
                    .and_then(|wp| wp.class.as_deref())
                    .filter(|c| !c.is_empty())
            })
    }
}

/// A window container carried neither an app id nor a window class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("container {0} has neither app_id nor window class")]
pub struct ExtractError(pub i64);

//  Extraction

/// Flatten `tree` into tasks ordered by ascending workspace number.
///
/// Workspace numbers are resolved by name against `workspaces`; a name
/// that is not listed maps to `0`.  The sort is stable, so tasks on the
/// same workspace keep traversal order.
pub fn extract_tasks(tree: &Node, workspaces: &[Workspace]) -> Result<Vec<Task>, ExtractError> {
    let mut tasks = Vec::new();
    for ws in workspace_nodes(tree) {
        let num = workspace_number(workspaces, ws.name());
        for con in leaves(ws).into_iter().chain(ws.floating_nodes.iter()) {
            tasks.push(make_task(con, num)?);
        }
    }
    tasks.sort_by_key(|t| t.workspace);
    Ok(tasks)
}

/// Extract tasks and pair them with the focused workspace number.
pub fn snapshot_from(tree: &Node, workspaces: &[Workspace]) -> Result<Snapshot, ExtractError> {
    let tasks = extract_tasks(tree, workspaces)?;
    Ok(Snapshot::new(tasks, focused_workspace(workspaces)))
}

/// Workspace nodes nested under every non-internal output.
fn workspace_nodes(tree: &Node) -> impl Iterator<Item = &Node> {
    tree.nodes
        .iter()
        .filter(|n| n.kind == "output" && !n.is_internal_output())
        .flat_map(|o| o.nodes.iter())
        .filter(|n| n.kind == "workspace")
}

/// Every childless descendant of `workspace` (tiled windows only).
fn leaves(workspace: &Node) -> Vec<&Node> {
    workspace
        .nodes
        .iter()
        .fold(Vec::new(), |acc, con| collect_leaves(con, acc))
}

fn collect_leaves<'a>(con: &'a Node, mut acc: Vec<&'a Node>) -> Vec<&'a Node> {
    if con.nodes.is_empty() {
        acc.push(con);
        acc
    } else {
        con.nodes.iter().fold(acc, |acc, child| collect_leaves(child, acc))
    }
}

fn make_task(con: &Node, workspace: i64) -> Result<Task, ExtractError> {
    let app_id = con.application_id().ok_or(ExtractError(con.id))?;
    Ok(Task {
        con_id: con.id,
        app_id: app_id.to_string(),
        name: con.name().to_string(),
        pid: con.pid,
        workspace,
    })
}

/// Number of the workspace called `name`, `0` when unknown.
pub fn workspace_number(workspaces: &[Workspace], name: &str) -> i64 {
    workspaces
        .iter()
        .find(|ws| ws.name == name)
        .map(|ws| ws.num)
        .unwrap_or(0)
}

/// Number of the focused workspace, `0` when none is focused.
pub fn focused_workspace(workspaces: &[Workspace]) -> i64 {
    workspaces
        .iter()
        .find(|ws| ws.focused)
        .map(|ws| ws.num)
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A two-output tree: DP-1 holds workspaces "1" (nested split + one
    /// floating window) and "3"; HDMI-A-1 holds "2".  The scratchpad output
    /// `__i3` holds one hidden window that must be ignored.
    pub const TREE: &str = r#"{
        "id": 1, "name": "root", "type": "root",
        "nodes": [
            { "id": 2, "name": "__i3", "type": "output", "nodes": [
                { "id": 3, "name": "__i3_scratch", "type": "workspace", "nodes": [],
                  "floating_nodes": [
                    { "id": 99, "name": "hidden", "type": "floating_con", "app_id": "scratch", "pid": 9, "nodes": [] }
                  ] }
            ] },
            { "id": 10, "name": "DP-1", "type": "output", "nodes": [
                { "id": 11, "name": "3", "type": "workspace", "nodes": [
                    { "id": 30, "name": "Terminal", "type": "con", "app_id": "foot", "pid": 30, "nodes": [] }
                ] },
                { "id": 12, "name": "1", "type": "workspace", "nodes": [
                    { "id": 20, "name": "Mozilla Firefox", "type": "con", "app_id": "firefox", "pid": 20, "nodes": [] },
                    { "id": 21, "name": null, "type": "con", "nodes": [
                        { "id": 22, "name": "GIMP", "type": "con", "app_id": null, "pid": 22,
                          "window_properties": { "class": "Gimp-2.10" }, "nodes": [] },
                        { "id": 23, "name": "Second Firefox", "type": "con", "app_id": "firefox", "pid": 23, "nodes": [] }
                    ] }
                ],
                  "floating_nodes": [
                    { "id": 24, "name": "Picture-in-Picture", "type": "floating_con", "app_id": "firefox", "pid": 24, "nodes": [] }
                ] }
            ] },
            { "id": 40, "name": "HDMI-A-1", "type": "output", "nodes": [
                { "id": 41, "name": "2", "type": "workspace", "focused": true, "nodes": [
                    { "id": 50, "name": "mpv", "type": "con", "app_id": "mpv", "pid": 50, "nodes": [] }
                ] }
            ] }
        ]
    }"#;

    pub const WORKSPACES: &str = r#"[
        { "num": 1, "name": "1", "focused": false },
        { "num": 2, "name": "2", "focused": true },
        { "num": 3, "name": "3", "focused": false }
    ]"#;

    pub const OUTPUTS: &str = r#"[
        { "name": "DP-1", "rect": { "x": 0, "y": 0, "width": 2560, "height": 1440 } },
        { "name": "HDMI-A-1", "rect": { "x": 2560, "y": 0, "width": 1920, "height": 1080 } }
    ]"#;
}
