//! **swaydock**: a dock / taskbar for the sway Wayland compositor.
//!
//! The dock shows one button per pinned or running application.  Windows
//! of the same application are grouped behind a single button with a
//! menu; pinned applications stay on the dock while closed and launch on
//! click.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::Compositor`]: queries the window tree and runs commands,
//!   so the dock logic is not coupled to sway.
//! * [`traits::Resolver`]: maps application ids to icons and command
//!   lines, so the dock logic is not coupled to desktop files or an icon
//!   theme.
//!
//! [`sway::feed`] turns compositor events into complete task
//! [`Snapshot`](task::Snapshot)s on background threads.  On the UI thread
//! the [`dock::Dock`] folds them through the [`reconciler::Reconciler`],
//! which decides when to rebuild and produces a toolkit-free
//! [`ButtonPlan`](reconciler::ButtonPlan) that [`ui`] renders.

pub mod command;
pub mod config;
pub mod debounce;
pub mod desktop;
pub mod dock;
pub mod instance;
pub mod paths;
pub mod pins;
pub mod reconciler;
pub mod sway;
pub mod task;
pub mod traits;
pub mod ui;
pub mod workspace;
