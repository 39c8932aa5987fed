//! Core traits that decouple the dock from the compositor backend, the
//! desktop-entry lookup and the transport that delivers task snapshots.
//!
//! The [`Dock`](crate::dock::Dock) and the
//! [`Reconciler`](crate::reconciler::Reconciler) only depend on these
//! abstractions; [`sway`](crate::sway) and [`desktop`](crate::desktop)
//! provide the concrete implementations.

use crate::command::OutputInfo;
use crate::task::Snapshot;
use std::sync::mpsc;

/// Abstraction over a compositor that can be queried for its window tree
/// and driven with imperative commands.
///
/// Every call is expected to be short-lived and bounded by a small fixed
/// timeout; a call that exceeds it fails instead of blocking the caller.
pub trait Compositor {
    /// The error type produced by this compositor.
    type Error: std::error::Error + Send + 'static;

    /// Fetch the window tree and workspace list and flatten them into a
    /// [`Snapshot`].  Fails as a whole; there is no partial result.
    fn snapshot(&self) -> Result<Snapshot, Self::Error>;

    /// Run a raw compositor command (e.g. `[con_id=7] focus`).
    fn run_command(&self, command: &str) -> Result<(), Self::Error>;

    /// Return the outputs the compositor knows about.
    fn outputs(&self) -> Result<Vec<OutputInfo>, Self::Error>;
}

/// Error from an icon or exec lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no desktop entry for {0:?}")]
    NoEntry(String),
    #[error("desktop entry {0} has no {1} key")]
    MissingKey(String, &'static str),
    #[error("read {0}: {1}")]
    Io(String, String),
    #[error("icon {0:?} is not in the icon theme")]
    NotInTheme(String),
}

/// Maps an application identifier to an icon reference and a launchable
/// command line.
pub trait Resolver {
    /// Icon name (theme lookup) or absolute icon path for `app_id`.
    fn icon(&self, app_id: &str) -> Result<String, ResolveError>;

    /// Command line that launches a new instance of `app_id`.
    fn exec(&self, app_id: &str) -> Result<String, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn icon(&self, app_id: &str) -> Result<String, ResolveError> {
        (**self).icon(app_id)
    }

    fn exec(&self, app_id: &str) -> Result<String, ResolveError> {
        (**self).exec(app_id)
    }
}

/// A freshly recomputed snapshot delivered to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    pub snapshot: Snapshot,
    /// Set when a mutating action (pin, unpin, move) asked for the refresh;
    /// a forced update always rebuilds the dock.
    pub forced: bool,
}

/// A long-lived producer of [`FeedUpdate`]s.
///
/// # Contract
///
/// * [`run`](SnapshotSource::run) **blocks** until the source is exhausted,
///   the sink is closed or an unrecoverable error occurs.
/// * Every emitted update carries a complete snapshot, never a diff.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait SnapshotSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start producing and push every update into `sink`.
    fn run(&mut self, sink: mpsc::SyncSender<FeedUpdate>) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared across module tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, thiserror::Error)]
    #[error("mock compositor error: {0}")]
    pub struct MockError(pub String);

    /// A compositor double that serves a fixed snapshot and records every
    /// command it is asked to run.
    #[derive(Debug, Default)]
    pub struct MockCompositor {
        pub snapshot: RefCell<Option<Snapshot>>,
        pub commands: RefCell<Vec<String>>,
        pub fail_commands: bool,
    }

    impl MockCompositor {
        pub fn serving(snapshot: Snapshot) -> Self {
            Self {
                snapshot: RefCell::new(Some(snapshot)),
                ..Default::default()
            }
        }

        /// A compositor whose tree query always times out.
        pub fn unreachable() -> Self {
            Self::default()
        }
    }

    impl Compositor for MockCompositor {
        type Error = MockError;

        fn snapshot(&self) -> Result<Snapshot, MockError> {
            self.snapshot
                .borrow()
                .clone()
                .ok_or_else(|| MockError("timed out".into()))
        }

        fn run_command(&self, command: &str) -> Result<(), MockError> {
            self.commands.borrow_mut().push(command.to_string());
            if self.fail_commands {
                return Err(MockError("rejected".into()));
            }
            Ok(())
        }

        fn outputs(&self) -> Result<Vec<OutputInfo>, MockError> {
            Ok(vec![OutputInfo {
                name: "MOCK-1".into(),
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            }])
        }
    }

    /// A resolver double backed by two maps.
    #[derive(Debug, Default)]
    pub struct MapResolver {
        pub icons: HashMap<String, String>,
        pub execs: HashMap<String, String>,
    }

    impl MapResolver {
        pub fn with_icons(ids: &[&str]) -> Self {
            Self {
                icons: ids.iter().map(|id| (id.to_string(), format!("{}-icon", id))).collect(),
                execs: HashMap::new(),
            }
        }
    }

    impl Resolver for MapResolver {
        fn icon(&self, app_id: &str) -> Result<String, ResolveError> {
            self.icons
                .get(app_id)
                .cloned()
                .ok_or_else(|| ResolveError::NoEntry(app_id.into()))
        }

        fn exec(&self, app_id: &str) -> Result<String, ResolveError> {
            self.execs
                .get(app_id)
                .cloned()
                .ok_or_else(|| ResolveError::NoEntry(app_id.into()))
        }
    }
}
