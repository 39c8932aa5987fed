//! Workspace switcher cursor.
//!
//! The switcher button shows a target workspace.  Scrolling moves the target
//! through `1..=max` with wrap-around; clicking focuses it.  Every rebuild
//! resets the target to the focused workspace.

/// Hard upper bound on switcher targets.
pub const MAX_WORKSPACES: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceCursor {
    target: i64,
    max: i64,
}

impl WorkspaceCursor {
    /// Cursor over `1..=min(workspaces, 20)`, starting at `focused`.
    pub fn new(workspaces: i64, focused: i64) -> Self {
        let mut cursor = Self {
            target: 1,
            max: workspaces.clamp(1, MAX_WORKSPACES),
        };
        cursor.follow(focused);
        cursor
    }

    pub fn target(&self) -> i64 {
        self.target
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Reset the target to the focused workspace.  Unknown or out of range
    /// numbers leave the target unchanged.
    pub fn follow(&mut self, focused: i64) {
        if (1..=self.max).contains(&focused) {
            self.target = focused;
        }
    }

    /// Scroll up.
    pub fn next(&mut self) -> i64 {
        self.target = if self.target < self.max { self.target + 1 } else { 1 };
        self.target
    }

    /// Scroll down.
    pub fn prev(&mut self) -> i64 {
        self.target = if self.target > 1 { self.target - 1 } else { self.max };
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_with_wrap_around() {
        let mut c = WorkspaceCursor::new(3, 2);
        assert_eq!(c.next(), 3);
        assert_eq!(c.next(), 1);
        assert_eq!(c.prev(), 3);
        assert_eq!(c.prev(), 2);
    }

    #[test]
    fn upper_bound_is_capped() {
        let mut c = WorkspaceCursor::new(32, 1);
        assert_eq!(c.max(), MAX_WORKSPACES);
        assert_eq!(c.prev(), 20);
        assert_eq!(c.next(), 1);
    }

    #[test]
    fn follow_ignores_out_of_range() {
        let mut c = WorkspaceCursor::new(8, 3);
        c.follow(0);
        assert_eq!(c.target(), 3);
        c.follow(12);
        assert_eq!(c.target(), 3);
        c.follow(5);
        assert_eq!(c.target(), 5);
    }
}
