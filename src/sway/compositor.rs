//! [`Compositor`] implementation backed by sway IPC.

use super::ipc::{self, Connection, IpcError, MessageType};
use super::tree::{self, Node, Output, Workspace};
use crate::command::OutputInfo;
use crate::task::Snapshot;
use crate::traits::Compositor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default deadline for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Sway-backed compositor handle.
///
/// No connection is held; each method call opens a short-lived IPC
/// connection bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct SwayCompositor {
    socket: PathBuf,
    timeout: Duration,
}

/// One entry of a `RUN_COMMAND` reply.
#[derive(Deserialize)]
struct CommandOutcome {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SwayCompositor {
    /// Handle for the compositor named by `$SWAYSOCK`.
    pub fn from_env(timeout: Duration) -> Result<Self, IpcError> {
        Ok(Self::with_socket(ipc::socket_path()?, timeout))
    }

    pub fn with_socket(socket: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            timeout,
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn request(&self, kind: MessageType, payload: &str) -> Result<Vec<u8>, IpcError> {
        let mut conn = Connection::open(&self.socket, Some(self.timeout))?;
        conn.request(kind, payload)
    }

    /// Fetch the raw node tree.
    pub fn tree(&self) -> Result<Node, IpcError> {
        let body = self.request(MessageType::GetTree, "")?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch the workspace list.
    pub fn workspaces(&self) -> Result<Vec<Workspace>, IpcError> {
        let body = self.request(MessageType::GetWorkspaces, "")?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl Compositor for SwayCompositor {
    type Error = IpcError;

    fn snapshot(&self) -> Result<Snapshot, Self::Error> {
        let tree = self.tree()?;
        let workspaces = self.workspaces()?;
        Ok(tree::snapshot_from(&tree, &workspaces)?)
    }

    fn run_command(&self, command: &str) -> Result<(), Self::Error> {
        let body = self.request(MessageType::RunCommand, command)?;
        let outcomes: Vec<CommandOutcome> = serde_json::from_slice(&body)?;
        match outcomes.into_iter().find(|o| !o.success) {
            Some(failed) => Err(IpcError::Rejected(
                failed.error.unwrap_or_else(|| command.to_string()),
            )),
            None => Ok(()),
        }
    }

    fn outputs(&self) -> Result<Vec<OutputInfo>, Self::Error> {
        let body = self.request(MessageType::GetOutputs, "")?;
        let outputs: Vec<Output> = serde_json::from_slice(&body)?;
        Ok(outputs.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sway::ipc::fake::{read_request, serve, serve_replies, write_reply};
    use crate::sway::tree::fixtures::{OUTPUTS, TREE, WORKSPACES};
    use std::sync::{Arc, Mutex};

    fn fixture_compositor() -> (SwayCompositor, PathBuf) {
        let path = serve_replies(vec![
            (MessageType::GetTree, TREE.into()),
            (MessageType::GetWorkspaces, WORKSPACES.into()),
            (MessageType::GetOutputs, OUTPUTS.into()),
        ]);
        (
            SwayCompositor::with_socket(&path, Duration::from_millis(500)),
            path,
        )
    }

    #[test]
    fn snapshot_fetches_tree_and_workspaces() {
        let (c, path) = fixture_compositor();
        let snap = c.snapshot().unwrap();
        assert_eq!(snap.len(), 6);
        assert_eq!(snap.focused_workspace, 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn outputs_are_listed() {
        let (c, path) = fixture_compositor();
        let outputs = c.outputs().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].width, 2560);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn run_command_sends_payload_and_checks_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let path = serve(move |mut stream| {
            let (kind, payload) = read_request(&mut stream);
            seen2.lock().unwrap().push(payload);
            write_reply(&mut stream, kind, r#"[{"success":true}]"#);
        });
        let c = SwayCompositor::with_socket(&path, Duration::from_millis(500));
        c.run_command("[con_id=7] focus").unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["[con_id=7] focus"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejected_command_reports_error() {
        let path = serve(|mut stream| {
            let (kind, _) = read_request(&mut stream);
            write_reply(
                &mut stream,
                kind,
                r#"[{"success":false,"error":"No matching node"}]"#,
            );
        });
        let c = SwayCompositor::with_socket(&path, Duration::from_millis(500));
        let err = c.run_command("[con_id=1] kill").unwrap_err();
        assert!(matches!(err, IpcError::Rejected(ref m) if m == "No matching node"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn tree_timeout_is_reported_as_timeout() {
        let path = serve(|stream| {
            std::thread::sleep(Duration::from_millis(400));
            drop(stream);
        });
        let c = SwayCompositor::with_socket(&path, Duration::from_millis(50));
        assert!(c.snapshot().unwrap_err().is_timeout());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_tree_fails_whole_snapshot() {
        let path = serve_replies(vec![
            (MessageType::GetTree, "{ not json".into()),
            (MessageType::GetWorkspaces, WORKSPACES.into()),
        ]);
        let c = SwayCompositor::with_socket(&path, Duration::from_millis(500));
        assert!(matches!(c.snapshot(), Err(IpcError::Json(_))));
        let _ = std::fs::remove_file(&path);
    }
}
