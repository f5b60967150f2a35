//! Visibility-based component-view tracking.
//!
//! Each testable element reports its visibility ratio here; the observer
//! decides when a transition becomes a component-view or component-hide
//! event. Repeated partial visibility never refires a view.

use std::collections::HashMap;

/// A visibility transition worth tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityTransition {
    /// First transition into >= threshold visibility.
    Shown,
    /// Transition back below the threshold.
    Hidden,
}

#[derive(Debug, Default)]
struct ComponentVisibility {
    /// Latched on the first qualifying view.
    viewed: bool,
    /// Current above-threshold state.
    visible: bool,
}

/// Tracks per-component visibility state.
pub struct VisibilityObserver {
    threshold: f64,
    track_hides: bool,
    states: HashMap<String, ComponentVisibility>,
}

impl VisibilityObserver {
    pub fn new(threshold: f64, track_hides: bool) -> Self {
        Self {
            threshold,
            track_hides,
            states: HashMap::new(),
        }
    }

    /// Feed the current visibility ratio for a component.
    ///
    /// Returns `Shown` on the first transition to >= threshold, `Hidden`
    /// (when enabled) on each transition back out, and None otherwise.
    pub fn observe(&mut self, component_id: &str, ratio: f64) -> Option<VisibilityTransition> {
        let state = self.states.entry(component_id.to_string()).or_default();
        let above = ratio >= self.threshold;

        if above && !state.visible {
            state.visible = true;
            if !state.viewed {
                state.viewed = true;
                return Some(VisibilityTransition::Shown);
            }
        } else if !above && state.visible {
            state.visible = false;
            if self.track_hides && state.viewed {
                return Some(VisibilityTransition::Hidden);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_fires_once_at_threshold() {
        let mut observer = VisibilityObserver::new(0.5, false);

        assert_eq!(observer.observe("hero", 0.2), None);
        assert_eq!(observer.observe("hero", 0.6), Some(VisibilityTransition::Shown));
        assert_eq!(observer.observe("hero", 0.8), None, "still visible, no refire");
    }

    #[test]
    fn test_partial_visibility_never_refires() {
        let mut observer = VisibilityObserver::new(0.5, false);

        observer.observe("hero", 0.7);
        observer.observe("hero", 0.3);
        assert_eq!(observer.observe("hero", 0.9), None, "re-show does not refire the view");
    }

    #[test]
    fn test_hide_fires_on_exit_when_enabled() {
        let mut observer = VisibilityObserver::new(0.5, true);

        observer.observe("hero", 0.7);
        assert_eq!(observer.observe("hero", 0.1), Some(VisibilityTransition::Hidden));
        assert_eq!(observer.observe("hero", 0.05), None, "already hidden");
    }

    #[test]
    fn test_hide_disabled_by_default() {
        let mut observer = VisibilityObserver::new(0.5, false);

        observer.observe("hero", 0.7);
        assert_eq!(observer.observe("hero", 0.1), None);
    }

    #[test]
    fn test_components_tracked_independently() {
        let mut observer = VisibilityObserver::new(0.5, false);

        assert_eq!(observer.observe("hero", 0.9), Some(VisibilityTransition::Shown));
        assert_eq!(observer.observe("cta", 0.9), Some(VisibilityTransition::Shown));
    }
}
