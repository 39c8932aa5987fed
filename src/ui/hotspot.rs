//! Auto-hide hotspot.
//!
//! Each hotspot is a thin layer-shell window along the dock's screen edge
//! made of two strips: a wider *detector* and a 2px *hotspot* at the very
//! edge.  The dock shows only when the pointer enters the hotspot shortly
//! after crossing the detector, so a pointer resting at the edge or
//! brushing past slowly does not open it.

use std::time::{Duration, Instant};

/// Thickness of the strip at the screen edge.
pub const HOTSPOT_PX: i32 = 2;

/// Detector → hotspot crossing timer.
#[derive(Debug, Clone)]
pub struct HotspotTimer {
    max_delay: Duration,
    detector_entered: Option<Instant>,
}

impl HotspotTimer {
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            detector_entered: None,
        }
    }

    pub fn enter_detector(&mut self, now: Instant) {
        self.detector_entered = Some(now);
    }

    /// Should entering the hotspot at `now` show the dock?
    pub fn enter_hotspot(&mut self, now: Instant) -> bool {
        match self.detector_entered.take() {
            Some(at) => now.saturating_duration_since(at) <= self.max_delay,
            None => false,
        }
    }
}

/// Detector thickness for a dock showing icons of `icon_size`.
pub fn detector_px(icon_size: i32) -> i32 {
    ((icon_size + 16) / 5).max(4)
}

#[cfg(feature = "ui-gtk")]
pub use self::window::build;

#[cfg(feature = "ui-gtk")]
mod window {
    use super::{detector_px, HotspotTimer, HOTSPOT_PX};
    use crate::config::{Position, Settings};
    use gtk4::prelude::*;
    use gtk4::gdk;
    use gtk4_layer_shell::{Edge, Layer, LayerShell};
    use log::debug;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    /// Build (but do not show) the hotspot window for `monitor`.  `show`
    /// runs when the dock should appear there.
    pub fn build(
        monitor: &gdk::Monitor,
        settings: &Settings,
        icon_size: i32,
        show: impl Fn(&gdk::Monitor) + 'static,
    ) -> gtk4::Window {
        let window = gtk4::Window::new();
        window.init_layer_shell();
        window.set_namespace("swaydock-hotspot");
        window.set_layer(Layer::Top);
        window.set_exclusive_zone(-1);
        window.set_monitor(monitor);
        window.set_decorated(false);
        window.add_css_class("hotspot-window");

        let horizontal = settings.position.is_horizontal();
        let orientation = if horizontal {
            gtk4::Orientation::Vertical
        } else {
            gtk4::Orientation::Horizontal
        };
        let strips = gtk4::Box::new(orientation, 0);
        window.set_child(Some(&strips));

        let detector = gtk4::Box::new(orientation, 0);
        detector.set_widget_name("detector-box");
        let hotspot = gtk4::Box::new(orientation, 0);
        hotspot.set_widget_name("hotspot-box");

        let thickness = detector_px(icon_size);
        if horizontal {
            detector.set_size_request(-1, thickness);
            hotspot.set_size_request(-1, HOTSPOT_PX);
        } else {
            detector.set_size_request(thickness, -1);
            hotspot.set_size_request(HOTSPOT_PX, -1);
        }

        // The hotspot is always the strip touching the screen edge.
        match settings.position {
            Position::Bottom => {
                strips.append(&detector);
                strips.append(&hotspot);
            }
            Position::Top | Position::Left => {
                strips.append(&hotspot);
                strips.append(&detector);
            }
        }

        let (edge, sides) = match settings.position {
            Position::Bottom => (Edge::Bottom, [Edge::Left, Edge::Right]),
            Position::Top => (Edge::Top, [Edge::Left, Edge::Right]),
            Position::Left => (Edge::Left, [Edge::Top, Edge::Bottom]),
        };
        window.set_anchor(edge, true);
        for side in sides {
            window.set_anchor(side, true);
        }
        let [top, left, right, bottom] = settings.margins;
        window.set_margin(Edge::Top, top);
        window.set_margin(Edge::Left, left);
        window.set_margin(Edge::Right, right);
        window.set_margin(Edge::Bottom, bottom);

        let timer = Rc::new(RefCell::new(HotspotTimer::new(settings.hotspot_delay)));

        let detector_motion = gtk4::EventControllerMotion::new();
        let t = timer.clone();
        detector_motion.connect_enter(move |_, _, _| t.borrow_mut().enter_detector(Instant::now()));
        detector.add_controller(detector_motion);

        let hotspot_motion = gtk4::EventControllerMotion::new();
        let monitor = monitor.clone();
        hotspot_motion.connect_enter(move |_, _, _| {
            if timer.borrow_mut().enter_hotspot(Instant::now()) {
                debug!("hotspot crossed fast enough, showing dock");
                show(&monitor);
            } else {
                debug!("hotspot crossed too slowly");
            }
        });
        hotspot.add_controller(hotspot_motion);

        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_crossing_shows() {
        let t0 = Instant::now();
        let mut timer = HotspotTimer::new(Duration::from_millis(30));
        timer.enter_detector(t0);
        assert!(timer.enter_hotspot(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn slow_crossing_does_not_show() {
        let t0 = Instant::now();
        let mut timer = HotspotTimer::new(Duration::from_millis(30));
        timer.enter_detector(t0);
        assert!(!timer.enter_hotspot(t0 + Duration::from_millis(31)));
    }

    #[test]
    fn hotspot_without_detector_does_not_show() {
        let mut timer = HotspotTimer::new(Duration::from_millis(30));
        assert!(!timer.enter_hotspot(Instant::now()));

        // Each detector crossing arms the hotspot once.
        let t0 = Instant::now();
        timer.enter_detector(t0);
        assert!(timer.enter_hotspot(t0));
        assert!(!timer.enter_hotspot(t0));
    }

    #[test]
    fn detector_scales_with_icons() {
        assert_eq!(detector_px(48), 12);
        assert_eq!(detector_px(0), 4);
    }
}
