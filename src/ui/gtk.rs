//! GTK4 + layer-shell dock running on the **main thread**.
//!
//! # Widget tree
//!
//! ```text
//! window                          (layer-shell, transparent)
//! └ #box                          (dock background)
//!     └ alignment box
//!         └ .dock-items           (rebuilt from every new plan)
//!             ├ .dock-item        (vertical box per app)
//!             │   ├ .dock-button
//!             │   └ .indicator.{single,multiple,not-running}
//!             ├ .workspace-button
//!             └ .launcher-button
//! ```
//!
//! # CSS selectors
//!
//! | Selector               | Targets                                     |
//! |------------------------|---------------------------------------------|
//! | `window`               | The dock window (keep transparent)          |
//! | `#box`                 | Background around the buttons               |
//! | `.dock-button`         | Every app button                            |
//! | `.dock-button.pinned`  | Buttons of pinned apps                      |
//! | `.indicator`           | Running-state bar under each app button     |
//! | `.workspace-button`    | Workspace switcher                          |
//! | `.launcher-button`     | Launcher                                    |
//! | `.dock-menu`           | Popup menus                                 |
//! | `#detector-box`, `#hotspot-box` | Auto-hide hotspot strips           |
//!
//! All widget state is touched from the GLib main loop only.  Task
//! snapshots arrive over a channel polled with `timeout_add_local`; signals
//! arrive through `unix_signal_add_local`.

use crate::command::DockAction;
use crate::config::{Alignment, ExclusiveZone, Position, Settings};
use crate::debounce::{Debounce, Scheduler};
use crate::dock::{Dock, DockError};
use crate::reconciler::{ButtonFace, ButtonPlan, Click, DockItem, Indicator, MenuEntry};
use crate::traits::{Compositor, FeedUpdate, ResolveError, Resolver};
use crate::ui::{hotspot, monitor_for_output, on_toggle_signal, MonitorGeometry, SignalAction};
use crate::workspace::WorkspaceCursor;
use gtk4::prelude::*;
use gtk4::{gdk, glib};
use gtk4_layer_shell::{Edge, KeyboardMode, Layer, LayerShell};
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::mpsc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// An auto-hiding dock is shown briefly at startup, then hidden.
const INITIAL_HIDE: Duration = Duration::from_millis(500);
const LAUNCHER_ICON: &str = "view-app-grid-symbolic";

const DEFAULT_CSS: &str = r#"
window,
window.background {
    background-color: transparent;
}

#box {
    background-color: rgba(30, 30, 30, 0.85);
    border-radius: 12px;
    padding: 4px;
}

.dock-button,
.workspace-button,
.launcher-button {
    background: none;
    border: none;
    box-shadow: none;
    padding: 4px;
    margin: 0 2px;
}

.dock-button:hover,
.workspace-button:hover,
.launcher-button:hover {
    background-color: rgba(255, 255, 255, 0.12);
}

.workspace-button {
    font-weight: bold;
    min-width: 32px;
}

.indicator {
    min-height: 3px;
    min-width: 3px;
    margin: 1px 14px;
    border-radius: 2px;
}

.indicator.single {
    background-color: rgba(255, 255, 255, 0.55);
}

.indicator.multiple {
    background-color: rgba(255, 255, 255, 0.95);
}

.dock-menu button {
    padding: 4px 10px;
}

.hotspot-window,
#detector-box,
#hotspot-box {
    background-color: transparent;
}
"#;

/// Errors that stop the UI from starting.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("failed to initialise GTK: {0}")]
    Init(#[from] glib::BoolError),
    #[error(transparent)]
    Dock(#[from] DockError),
}

//  Timers

/// [`Scheduler`] on the GLib main loop.
pub struct GlibScheduler;

impl Scheduler for GlibScheduler {
    type Handle = glib::SourceId;

    fn schedule(&self, delay: Duration, f: Box<dyn FnOnce()>) -> glib::SourceId {
        glib::timeout_add_local_once(delay, f)
    }

    fn cancel(&self, handle: glib::SourceId) {
        handle.remove();
    }
}

//  Icon theme

/// Wraps a [`Resolver`] so that only icons the theme (or the filesystem)
/// can actually provide are reported, and bare app ids that happen to be
/// theme icon names are accepted.
pub struct ThemedResolver<R> {
    inner: R,
}

impl<R: Resolver> ThemedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Resolver> Resolver for ThemedResolver<R> {
    fn icon(&self, app_id: &str) -> Result<String, ResolveError> {
        let theme = gdk::Display::default().map(|d| gtk4::IconTheme::for_display(&d));
        let in_theme = |name: &str| theme.as_ref().is_some_and(|t| t.has_icon(name));
        match self.inner.icon(app_id) {
            Ok(icon) if icon.starts_with('/') => {
                if Path::new(&icon).is_file() {
                    Ok(icon)
                } else {
                    Err(ResolveError::NotInTheme(icon))
                }
            }
            Ok(icon) if in_theme(&icon) => Ok(icon),
            Ok(icon) => Err(ResolveError::NotInTheme(icon)),
            Err(_) if in_theme(app_id) => Ok(app_id.to_string()),
            Err(e) => Err(e),
        }
    }

    fn exec(&self, app_id: &str) -> Result<String, ResolveError> {
        self.inner.exec(app_id)
    }
}

//  Dock window

struct Ui<C: Compositor, R: Resolver> {
    dock: RefCell<Dock<C, R>>,
    settings: Settings,
    window: gtk4::Window,
    items: gtk4::Box,
    cursor: RefCell<WorkspaceCursor>,
    hide: Debounce<GlibScheduler>,
    open_menu: RefCell<Option<gtk4::Popover>>,
}

impl<C, R> Ui<C, R>
where
    C: Compositor + 'static,
    R: Resolver + 'static,
{
    fn dispatch(&self, action: DockAction) {
        let result = self.dock.borrow_mut().handle(action.clone());
        match result {
            Ok(outcome) => {
                if outcome.hide {
                    self.schedule_hide();
                }
            }
            Err(e @ DockError::Pin(_)) => error!("{}: {}", action, e),
            Err(e) => warn!("{}: {}", action, e),
        }
    }

    fn schedule_hide(&self) {
        if !self.settings.autohide {
            return;
        }
        let window = self.window.downgrade();
        self.hide.schedule(move || {
            if let Some(w) = window.upgrade() {
                debug!("hiding dock");
                w.set_visible(false);
            }
        });
    }

    fn cancel_hide(&self) {
        if self.hide.cancel() {
            debug!("hide cancelled");
        }
    }

    fn close_menu(&self) {
        if let Some(menu) = self.open_menu.borrow_mut().take() {
            menu.popdown();
            if menu.parent().is_some() {
                menu.unparent();
            }
        }
    }

    /// Replace every button with the ones described by `plan`.
    fn render(self: &Rc<Self>, plan: &ButtonPlan) {
        self.close_menu();
        while let Some(child) = self.items.first_child() {
            self.items.remove(&child);
        }

        for item in &plan.items {
            self.items.append(&self.item_widget(item, plan.icon_size));
        }
        if let Some(focused) = plan.workspace {
            self.cursor.borrow_mut().follow(focused);
            self.items.append(&self.workspace_button());
        }
        if plan.launcher.is_some() {
            self.items.append(&self.launcher_button(plan.icon_size));
        }
        debug!("rendered {} items at {}px", plan.items.len(), plan.icon_size);
    }

    fn item_widget(self: &Rc<Self>, item: &DockItem, icon_size: i32) -> gtk4::Box {
        let column = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        column.add_css_class("dock-item");

        let button = gtk4::Button::new();
        button.add_css_class("dock-button");
        if item.pinned {
            button.add_css_class("pinned");
        }
        match &item.face {
            ButtonFace::Icon(icon) => button.set_child(Some(&icon_image(icon, icon_size))),
            ButtonFace::Label(id) => button.set_label(id),
        }
        button.set_tooltip_text(Some(&item.app_id));
        column.append(&button);

        let indicator = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
        indicator.add_css_class("indicator");
        indicator.add_css_class(match item.indicator() {
            Indicator::NotRunning => "not-running",
            Indicator::Single => "single",
            Indicator::Multiple => "multiple",
        });
        column.append(&indicator);

        let weak = Rc::downgrade(self);
        let click = item.click.clone();
        button.connect_clicked(move |b| {
            let Some(ui) = weak.upgrade() else { return };
            match &click {
                Click::Run(action) => ui.dispatch(action.clone()),
                Click::Menu(entries) => ui.popup(b, entries),
            }
        });

        let secondary = gtk4::GestureClick::new();
        secondary.set_button(gdk::BUTTON_SECONDARY);
        let weak = Rc::downgrade(self);
        let menu = item.context_menu.clone();
        let anchor = button.downgrade();
        secondary.connect_pressed(move |_, _, _, _| {
            if let (Some(ui), Some(b)) = (weak.upgrade(), anchor.upgrade()) {
                ui.popup(&b, &menu);
            }
        });
        button.add_controller(secondary);

        column
    }

    fn workspace_button(self: &Rc<Self>) -> gtk4::Button {
        let target = self.cursor.borrow().target();
        let button = gtk4::Button::with_label(&target.to_string());
        button.add_css_class("workspace-button");
        button.set_tooltip_text(Some("Scroll to pick a workspace, click to go there"));

        let weak = Rc::downgrade(self);
        button.connect_clicked(move |_| {
            if let Some(ui) = weak.upgrade() {
                let n = ui.cursor.borrow().target();
                ui.dispatch(DockAction::FocusWorkspace(n));
            }
        });

        let scroll = gtk4::EventControllerScroll::new(gtk4::EventControllerScrollFlags::VERTICAL);
        let weak = Rc::downgrade(self);
        let label_target = button.downgrade();
        scroll.connect_scroll(move |_, _, dy| {
            let (Some(ui), Some(b)) = (weak.upgrade(), label_target.upgrade()) else {
                return glib::Propagation::Proceed;
            };
            let n = if dy < 0.0 {
                ui.cursor.borrow_mut().next()
            } else {
                ui.cursor.borrow_mut().prev()
            };
            b.set_label(&n.to_string());
            glib::Propagation::Stop
        });
        button.add_controller(scroll);
        button
    }

    fn launcher_button(self: &Rc<Self>, icon_size: i32) -> gtk4::Button {
        let button = gtk4::Button::new();
        button.add_css_class("launcher-button");
        button.set_child(Some(&icon_image(LAUNCHER_ICON, icon_size)));
        let weak = Rc::downgrade(self);
        button.connect_clicked(move |_| {
            if let Some(ui) = weak.upgrade() {
                ui.dispatch(DockAction::RunLauncher);
            }
        });
        button
    }

    /// Show `entries` in a popover attached to `anchor`.
    fn popup(self: &Rc<Self>, anchor: &gtk4::Button, entries: &[MenuEntry]) {
        self.close_menu();
        let popover = self.menu_popover(entries, &[]);
        popover.set_parent(anchor);
        popover.set_position(match self.settings.position {
            Position::Bottom => gtk4::PositionType::Top,
            Position::Top => gtk4::PositionType::Bottom,
            Position::Left => gtk4::PositionType::Right,
        });
        popover.connect_closed(|p| {
            let p = p.clone();
            glib::idle_add_local_once(move || {
                if p.parent().is_some() {
                    p.unparent();
                }
            });
        });
        *self.open_menu.borrow_mut() = Some(popover.clone());
        popover.popup();
    }

    /// Popover for `entries`.  `ancestors` are the menus to close as well
    /// when an entry is activated.
    fn menu_popover(
        self: &Rc<Self>,
        entries: &[MenuEntry],
        ancestors: &[glib::WeakRef<gtk4::Popover>],
    ) -> gtk4::Popover {
        let popover = gtk4::Popover::new();
        popover.add_css_class("dock-menu");
        popover.set_has_arrow(false);

        let mut chain = ancestors.to_vec();
        chain.push(popover.downgrade());

        let column = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        for entry in entries {
            match entry {
                MenuEntry::Action { label, action } => {
                    let button = gtk4::Button::with_label(label);
                    button.set_has_frame(false);
                    let weak = Rc::downgrade(self);
                    let action = action.clone();
                    let chain = chain.clone();
                    button.connect_clicked(move |_| {
                        for menu in chain.iter().rev().filter_map(|m| m.upgrade()) {
                            menu.popdown();
                        }
                        if let Some(ui) = weak.upgrade() {
                            ui.dispatch(action.clone());
                        }
                    });
                    column.append(&button);
                }
                MenuEntry::Submenu { label, entries } => {
                    let sub = gtk4::MenuButton::new();
                    sub.set_label(label);
                    sub.set_has_frame(false);
                    sub.set_direction(gtk4::ArrowType::Right);
                    sub.set_popover(Some(&self.menu_popover(entries, &chain)));
                    column.append(&sub);
                }
                MenuEntry::Separator => {
                    column.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));
                }
            }
        }
        popover.set_child(Some(&column));

        // Moving into a menu leaves the dock window; keep the dock open.
        let motion = gtk4::EventControllerMotion::new();
        let weak = Rc::downgrade(self);
        motion.connect_enter(move |_, _, _| {
            if let Some(ui) = weak.upgrade() {
                ui.cancel_hide();
            }
        });
        popover.add_controller(motion);
        popover
    }
}

fn icon_image(icon: &str, size: i32) -> gtk4::Image {
    let image = if icon.starts_with('/') {
        gtk4::Image::from_file(icon)
    } else {
        gtk4::Image::from_icon_name(icon)
    };
    image.set_pixel_size(size);
    image
}

fn all_monitors() -> Vec<gdk::Monitor> {
    let Some(display) = gdk::Display::default() else {
        return Vec::new();
    };
    let list = display.monitors();
    (0..list.n_items())
        .filter_map(|i| list.item(i).and_downcast::<gdk::Monitor>())
        .collect()
}

/// The monitor showing output `name`, per the compositor's output layout.
fn output_monitor<C: Compositor>(compositor: &C, name: &str) -> Option<gdk::Monitor> {
    let outputs = match compositor.outputs() {
        Ok(o) => o,
        Err(e) => {
            warn!("could not list outputs: {}", e);
            return None;
        }
    };
    let monitors = all_monitors();
    let geometry: Vec<MonitorGeometry> = monitors
        .iter()
        .map(|m| {
            let g = m.geometry();
            MonitorGeometry {
                connector: m.connector().map(|c| c.to_string()),
                x: g.x(),
                y: g.y(),
            }
        })
        .collect();
    let found = monitor_for_output(name, &outputs, &geometry).map(|i| monitors[i].clone());
    if found.is_none() {
        warn!("no monitor for output {}", name);
    }
    found
}

fn build_window(settings: &Settings) -> (gtk4::Window, gtk4::Box) {
    let window = gtk4::Window::new();
    window.init_layer_shell();
    window.set_namespace("swaydock");
    window.set_keyboard_mode(KeyboardMode::None);
    window.set_decorated(false);
    window.set_layer(match settings.layer {
        crate::config::Layer::Overlay => Layer::Overlay,
        crate::config::Layer::Top => Layer::Top,
        crate::config::Layer::Bottom => Layer::Bottom,
    });
    match settings.exclusive_zone {
        ExclusiveZone::Auto => window.auto_exclusive_zone_enable(),
        ExclusiveZone::Ignore => window.set_exclusive_zone(-1),
        ExclusiveZone::Normal => {}
    }

    let horizontal = settings.position.is_horizontal();
    let (edge, sides) = match settings.position {
        Position::Bottom => (Edge::Bottom, [Edge::Left, Edge::Right]),
        Position::Top => (Edge::Top, [Edge::Left, Edge::Right]),
        Position::Left => (Edge::Left, [Edge::Top, Edge::Bottom]),
    };
    window.set_anchor(edge, true);
    for side in sides {
        window.set_anchor(side, settings.full);
    }
    let [top, left, right, bottom] = settings.margins;
    window.set_margin(Edge::Top, top);
    window.set_margin(Edge::Left, left);
    window.set_margin(Edge::Right, right);
    window.set_margin(Edge::Bottom, bottom);

    let (outer, inner) = if horizontal {
        (gtk4::Orientation::Vertical, gtk4::Orientation::Horizontal)
    } else {
        (gtk4::Orientation::Horizontal, gtk4::Orientation::Vertical)
    };
    let frame = gtk4::Box::new(outer, 0);
    frame.set_widget_name("box");
    let alignment_box = gtk4::Box::new(inner, 0);
    alignment_box.set_hexpand(true);
    alignment_box.set_vexpand(true);
    frame.append(&alignment_box);

    let items = gtk4::Box::new(inner, 0);
    items.add_css_class("dock-items");
    let align = match settings.alignment {
        Alignment::Start => gtk4::Align::Start,
        Alignment::Center => gtk4::Align::Center,
        Alignment::End => gtk4::Align::End,
    };
    if horizontal {
        items.set_halign(align);
        items.set_hexpand(true);
    } else {
        items.set_valign(align);
        items.set_vexpand(true);
    }
    alignment_box.append(&items);
    window.set_child(Some(&frame));
    (window, items)
}

//  Public API

/// Run the dock on the **current** (main) thread until a signal or the
/// window ends it.
///
/// Builds the first plan after GTK is up (icon lookups need the display);
/// a failure there is returned so the caller can exit non-zero.
pub fn run_main_loop<C, R>(
    mut dock: Dock<C, R>,
    updates: mpsc::Receiver<FeedUpdate>,
    settings: Settings,
    css_path: Option<PathBuf>,
) -> Result<(), UiError>
where
    C: Compositor + 'static,
    R: Resolver + 'static,
{
    gtk4::init()?;
    info!("GTK4 initialised on main thread");
    load_css(css_path.as_deref());

    let plan = dock.initialize()?.clone();
    let (window, items) = build_window(&settings);

    let target_monitor = settings
        .output
        .as_deref()
        .and_then(|name| output_monitor(dock.compositor(), name));
    if let Some(monitor) = &target_monitor {
        window.set_monitor(monitor);
    }

    let ui = Rc::new(Ui {
        cursor: RefCell::new(WorkspaceCursor::new(
            settings.workspaces,
            plan.workspace.unwrap_or(0),
        )),
        hide: Debounce::new(GlibScheduler, settings.hide_delay),
        dock: RefCell::new(dock),
        settings,
        window: window.clone(),
        items,
        open_menu: RefCell::new(None),
    });
    ui.render(&plan);

    //  Close on leave
    let motion = gtk4::EventControllerMotion::new();
    let weak: Weak<Ui<C, R>> = Rc::downgrade(&ui);
    motion.connect_leave(move |_| {
        if let Some(ui) = weak.upgrade() {
            ui.schedule_hide();
        }
    });
    let weak = Rc::downgrade(&ui);
    motion.connect_enter(move |_, _, _| {
        if let Some(ui) = weak.upgrade() {
            ui.cancel_hide();
        }
    });
    window.add_controller(motion);

    let main_loop = glib::MainLoop::new(None, false);
    let quit = main_loop.clone();
    window.connect_close_request(move |_| {
        quit.quit();
        glib::Propagation::Proceed
    });

    window.present();

    //  Auto-hide hotspots
    let mut hotspots = Vec::new();
    if ui.settings.autohide {
        let w = window.downgrade();
        glib::timeout_add_local_once(INITIAL_HIDE, move || {
            if let Some(w) = w.upgrade() {
                w.set_visible(false);
            }
        });
        let monitors = match &target_monitor {
            Some(m) => vec![m.clone()],
            None => all_monitors(),
        };
        for monitor in &monitors {
            let dock_window = window.downgrade();
            let spot = hotspot::build(monitor, &ui.settings, plan.icon_size, move |m| {
                if let Some(w) = dock_window.upgrade() {
                    // Remap so the dock follows the monitor the pointer is on.
                    w.set_visible(false);
                    w.set_monitor(m);
                    w.set_visible(true);
                }
            });
            spot.present();
            hotspots.push(spot);
        }
        info!("auto-hide with {} hotspot(s)", hotspots.len());
    }

    //  Feed updates
    let weak = Rc::downgrade(&ui);
    glib::timeout_add_local(POLL_INTERVAL, move || {
        let Some(ui) = weak.upgrade() else {
            return glib::ControlFlow::Break;
        };
        let mut pending = Vec::new();
        let mut disconnected = false;
        loop {
            match updates.try_recv() {
                Ok(update) => pending.push(update),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if !pending.is_empty() {
            let plan = ui.dock.borrow_mut().on_updates(pending).cloned();
            if let Some(plan) = plan {
                ui.render(&plan);
            }
        }
        if disconnected {
            warn!("task feed closed, the dock will no longer update");
            return glib::ControlFlow::Break;
        }
        glib::ControlFlow::Continue
    });

    //  Signals
    let weak = Rc::downgrade(&ui);
    let quit = main_loop.clone();
    glib::unix_signal_add_local(libc::SIGUSR1, move || {
        let Some(ui) = weak.upgrade() else {
            return glib::ControlFlow::Break;
        };
        match on_toggle_signal(ui.settings.stays_resident(), ui.window.is_visible()) {
            SignalAction::Show => {
                debug!("SIGUSR1: showing");
                ui.cancel_hide();
                ui.window.set_visible(true);
            }
            SignalAction::Hide => {
                debug!("SIGUSR1: hiding");
                ui.window.set_visible(false);
            }
            SignalAction::Quit => {
                info!("SIGUSR1 received and not resident, exiting");
                quit.quit();
            }
        }
        glib::ControlFlow::Continue
    });
    for signum in [libc::SIGTERM, libc::SIGINT] {
        let quit = main_loop.clone();
        glib::unix_signal_add_local(signum, move || {
            info!("signal {} received, exiting", signum);
            quit.quit();
            glib::ControlFlow::Break
        });
    }

    info!("entering GLib main loop");
    main_loop.run();
    info!("GLib main loop exited");

    ui.close_menu();
    drop(hotspots);
    Ok(())
}

fn load_css(css_path: Option<&Path>) {
    let css = match css_path {
        Some(p) if p.is_file() => match std::fs::read_to_string(p) {
            Ok(content) => {
                info!("using style {}", p.display());
                content
            }
            Err(e) => {
                warn!("cannot read {}: {}; using built-in style", p.display(), e);
                DEFAULT_CSS.to_string()
            }
        },
        Some(p) => {
            warn!("{} not found, using built-in style", p.display());
            DEFAULT_CSS.to_string()
        }
        None => DEFAULT_CSS.to_string(),
    };

    let provider = gtk4::CssProvider::new();
    #[allow(deprecated)]
    provider.load_from_data(&css);

    match gdk::Display::default() {
        Some(display) => gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        ),
        None => warn!("no display, style not applied"),
    }
}
