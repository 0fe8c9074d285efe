//! Free-interaction gate for unauthenticated visitors.
//!
//! The gate counts accepted submissions from visitors who are not signed in
//! and derives the visibility of two overlays from that count:
//!
//! - the **initial popup**, shown once per workspace after a short delay, and
//! - the **banner**, which takes over once the free interactions are used up
//!   and cannot be dismissed while they stay exhausted.
//!
//! Everything the page needs is recomputed by [`UsageGate::snapshot`] on each
//! render; the gate itself only stores the counter and the overlay flags.

use serde::Serialize;

/// Default number of free interactions per workspace.
pub const DEFAULT_FREE_LIMIT: u32 = 25;

/// Interaction counter plus overlay flags.
#[derive(Debug, Clone)]
pub struct UsageGate {
    limit: u32,
    count: u32,
    popup_shown_once: bool,
    popup_visible: bool,
    banner_visible: bool,
}

/// Derived, render-ready view of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub limit: u32,
    pub count: u32,
    /// `limit - count`, floored at zero.
    pub remaining: u32,
    pub exhausted: bool,
    pub show_popup: bool,
    pub show_banner: bool,
    pub banner_dismissible: bool,
    pub input_enabled: bool,
}

impl Default for UsageGate {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_LIMIT)
    }
}

impl UsageGate {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            count: 0,
            popup_shown_once: false,
            popup_visible: false,
            banner_visible: false,
        }
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Whether a submission may go through for this visitor.
    #[must_use]
    pub fn allows(&self, signed_in: bool) -> bool {
        signed_in || !self.is_exhausted()
    }

    /// Count one accepted submission. Signed-in visitors are never counted.
    pub fn record(&mut self, signed_in: bool) {
        if !signed_in {
            self.count = self.count.saturating_add(1);
        }
    }

    /// Fire the delayed initial popup.
    ///
    /// Returns `true` only the first time it fires for an unauthenticated
    /// visitor.
    pub fn show_initial_popup(&mut self, signed_in: bool) -> bool {
        if signed_in || self.popup_shown_once {
            return false;
        }
        self.popup_shown_once = true;
        self.popup_visible = true;
        true
    }

    pub fn dismiss_popup(&mut self) {
        self.popup_visible = false;
    }

    /// Pin the banner open after a submission was rejected for exhaustion.
    ///
    /// Only called once [`allows`](Self::allows) has refused, so the banner
    /// stays undismissable until the visitor signs in.
    pub fn force_banner(&mut self) {
        self.banner_visible = true;
        self.popup_visible = false;
    }

    /// Hide the banner. Refused while the free interactions are exhausted.
    pub fn dismiss_banner(&mut self, signed_in: bool) -> bool {
        if !signed_in && self.is_exhausted() {
            return false;
        }
        self.banner_visible = false;
        true
    }

    /// Render-ready view for the current auth status.
    #[must_use]
    pub fn snapshot(&self, signed_in: bool) -> UsageSnapshot {
        let exhausted = self.is_exhausted();
        let gated = !signed_in && exhausted;
        let show_banner = !signed_in && (self.banner_visible || exhausted);

        UsageSnapshot {
            limit: self.limit,
            count: self.count,
            remaining: self.remaining(),
            exhausted,
            show_popup: !signed_in && self.popup_visible && !show_banner && !exhausted,
            show_banner,
            banner_dismissible: !exhausted,
            input_enabled: !gated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_gates_at_limit() {
        let mut gate = UsageGate::new(3);
        for expected in 1..=3 {
            assert!(gate.allows(false));
            gate.record(false);
            assert_eq!(gate.count(), expected);
        }
        assert!(!gate.allows(false));
        assert!(gate.is_exhausted());
        assert_eq!(gate.remaining(), 0);

        // signed-in visitors pass and are not counted
        assert!(gate.allows(true));
        gate.record(true);
        assert_eq!(gate.count(), 3);
    }

    #[test]
    fn test_popup_shown_once() {
        let mut gate = UsageGate::default();
        assert!(!gate.show_initial_popup(true));
        assert!(gate.show_initial_popup(false));
        assert!(gate.snapshot(false).show_popup);

        gate.dismiss_popup();
        assert!(!gate.snapshot(false).show_popup);
        assert!(!gate.show_initial_popup(false));
        assert!(!gate.snapshot(false).show_popup);
    }

    #[test]
    fn test_banner_supersedes_popup() {
        let mut gate = UsageGate::new(1);
        gate.show_initial_popup(false);
        gate.record(false);

        let snap = gate.snapshot(false);
        assert!(snap.show_banner);
        assert!(!snap.show_popup);
        assert!(!snap.banner_dismissible);
        assert!(!snap.input_enabled);

        assert!(!gate.dismiss_banner(false));
        assert!(gate.snapshot(false).show_banner);
    }

    #[test]
    fn test_signed_in_hides_overlays() {
        let mut gate = UsageGate::new(1);
        gate.record(false);
        let snap = gate.snapshot(true);
        assert!(!snap.show_banner);
        assert!(!snap.show_popup);
        assert!(snap.input_enabled);
    }

    #[test]
    fn test_rejected_send_pins_banner() {
        let mut gate = UsageGate::new(1);
        assert!(gate.show_initial_popup(false));
        gate.record(false);
        assert!(!gate.allows(false));

        gate.force_banner();
        let snap = gate.snapshot(false);
        assert!(snap.show_banner);
        assert!(!snap.show_popup);
        assert!(!gate.dismiss_banner(false));

        // signing in lifts the pin
        assert!(gate.dismiss_banner(true));
        assert!(!gate.snapshot(true).show_banner);
    }
}
