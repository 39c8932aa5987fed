//! Toolkit front end.
//!
//! When the `ui-gtk` feature is enabled, [`gtk::run_main_loop`] takes over
//! the main thread, renders every [`ButtonPlan`](crate::reconciler::ButtonPlan)
//! and executes clicks through the [`Dock`](crate::dock::Dock).  The
//! toolkit-free decisions it relies on live here so they can be tested
//! headless.

#[cfg(feature = "ui-gtk")]
pub mod gtk;
pub mod hotspot;

use crate::command::OutputInfo;

/// What a toggle signal (`SIGUSR1`) does given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Show,
    Hide,
    Quit,
}

/// Resident and auto-hiding docks toggle; any other dock quits.
pub fn on_toggle_signal(stays_resident: bool, visible: bool) -> SignalAction {
    match (stays_resident, visible) {
        (false, _) => SignalAction::Quit,
        (true, true) => SignalAction::Hide,
        (true, false) => SignalAction::Show,
    }
}

/// A display monitor as seen by the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorGeometry {
    /// Connector name, when the toolkit reports one.
    pub connector: Option<String>,
    pub x: i32,
    pub y: i32,
}

/// Index into `monitors` of the monitor showing output `name`.
///
/// Connector names win; otherwise the output's position on the virtual
/// desktop is matched against monitor origins.
pub fn monitor_for_output(
    name: &str,
    outputs: &[OutputInfo],
    monitors: &[MonitorGeometry],
) -> Option<usize> {
    if let Some(i) = monitors
        .iter()
        .position(|m| m.connector.as_deref() == Some(name))
    {
        return Some(i);
    }
    let output = outputs.iter().find(|o| o.name == name)?;
    monitors
        .iter()
        .position(|m| m.x == output.x && m.y == output.y)
}
