//! Focus zones: named, ordered groups of focusable elements.
//!
//! The focused element is a signal, so components re-render when focus
//! moves. Tab order is registration order within a zone; zones that wrap
//! cycle at either end, zones that don't stop there. Unregistering the
//! focused element advances focus to its successor automatically so focus
//! never dangles on a dead element.

use crate::signals::{signal, Signal};

pub type ElementId = u64;

struct Zone {
    name: String,
    wrap: bool,
    elements: Vec<ElementId>,
}

pub struct FocusManager {
    zones: Vec<Zone>,
    focused: Signal<Option<ElementId>>,
    next_id: ElementId,
}

impl Default for FocusManager {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            focused: signal(None),
            next_id: 0,
        }
    }
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a zone. Re-declaring an existing zone updates its wrap flag.
    pub fn register_zone(&mut self, name: &str, wrap: bool) {
        match self.zones.iter_mut().find(|z| z.name == name) {
            Some(zone) => zone.wrap = wrap,
            None => self.zones.push(Zone {
                name: name.to_string(),
                wrap,
                elements: Vec::new(),
            }),
        }
    }

    /// Add a focusable element at the end of `zone`'s tab order. The zone is
    /// created if it doesn't exist; implicit zones wrap, `register_zone` opts
    /// out. The first element registered overall receives focus.
    pub fn register_element(&mut self, zone: &str) -> ElementId {
        let id = self.next_id;
        self.next_id += 1;
        if !self.zones.iter().any(|z| z.name == zone) {
            self.register_zone(zone, true);
        }
        if let Some(z) = self.zones.iter_mut().find(|z| z.name == zone) {
            z.elements.push(id);
        }
        if self.focused.peek().is_none() {
            self.focused.set(Some(id));
        }
        id
    }

    /// Remove an element. If it was focused, focus advances to the next
    /// element in its zone (or the previous at the end, or nothing if the
    /// zone empties).
    pub fn unregister_element(&mut self, id: ElementId) {
        let was_focused = self.focused.peek() == Some(id);
        let mut successor = None;

        for zone in &mut self.zones {
            if let Some(pos) = zone.elements.iter().position(|&e| e == id) {
                zone.elements.remove(pos);
                if was_focused {
                    successor = zone
                        .elements
                        .get(pos)
                        .or_else(|| zone.elements.last())
                        .copied();
                }
                break;
            }
        }

        if was_focused {
            self.focused.set(successor);
        }
    }

    /// Reactive handle on the focused element.
    pub fn focused(&self) -> Signal<Option<ElementId>> {
        self.focused.clone()
    }

    pub fn current(&self) -> Option<ElementId> {
        self.focused.peek()
    }

    pub fn is_focused(&self, id: ElementId) -> bool {
        self.focused.peek() == Some(id)
    }

    pub fn focus(&mut self, id: ElementId) {
        if self.zones.iter().any(|z| z.elements.contains(&id)) {
            self.focused.set(Some(id));
        }
    }

    pub fn focus_next(&mut self) {
        if let Some(target) = self.next_target() {
            self.focused.set(Some(target));
        }
    }

    pub fn focus_previous(&mut self) {
        if let Some(target) = self.previous_target() {
            self.focused.set(Some(target));
        }
    }

    /// Element `focus_next` would land on, without moving focus. Lets
    /// callers release their borrow on the manager before writing the focus
    /// signal (writes flush effects synchronously).
    pub fn next_target(&self) -> Option<ElementId> {
        self.step_target(1)
    }

    /// Element `focus_previous` would land on, without moving focus.
    pub fn previous_target(&self) -> Option<ElementId> {
        self.step_target(-1)
    }

    fn step_target(&self, step: isize) -> Option<ElementId> {
        let Some(current) = self.focused.peek() else {
            // Nothing focused: the first element anywhere.
            return self
                .zones
                .iter()
                .flat_map(|z| z.elements.first())
                .next()
                .copied();
        };

        let zone = self
            .zones
            .iter()
            .find(|z| z.elements.contains(&current))?;
        let len = zone.elements.len() as isize;
        let pos = zone.elements.iter().position(|&e| e == current)?;

        let mut next = pos as isize + step;
        if next < 0 {
            next = if zone.wrap { len - 1 } else { 0 };
        } else if next >= len {
            next = if zone.wrap { 0 } else { len - 1 };
        }
        Some(zone.elements[next as usize])
    }

    pub fn reset(&mut self) {
        self.zones.clear();
        self.focused.set(None);
        self.next_id = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(zone: &str, wrap: bool, count: usize) -> (FocusManager, Vec<ElementId>) {
        let mut fm = FocusManager::new();
        fm.register_zone(zone, wrap);
        let ids = (0..count).map(|_| fm.register_element(zone)).collect();
        (fm, ids)
    }

    #[test]
    fn test_first_element_takes_focus() {
        let (fm, ids) = manager_with("main", false, 3);
        assert_eq!(fm.current(), Some(ids[0]));
    }

    #[test]
    fn test_focus_next_walks_registration_order() {
        let (mut fm, ids) = manager_with("main", false, 3);
        fm.focus_next();
        assert_eq!(fm.current(), Some(ids[1]));
        fm.focus_next();
        assert_eq!(fm.current(), Some(ids[2]));
    }

    #[test]
    fn test_wrapping_zone_cycles() {
        let (mut fm, ids) = manager_with("main", true, 3);
        fm.focus(ids[2]);
        fm.focus_next();
        assert_eq!(fm.current(), Some(ids[0]));
        fm.focus_previous();
        assert_eq!(fm.current(), Some(ids[2]));
    }

    #[test]
    fn test_implicit_zone_wraps() {
        let mut fm = FocusManager::new();
        let ids: Vec<ElementId> = (0..3).map(|_| fm.register_element("root")).collect();

        fm.focus(ids[2]);
        fm.focus_next();
        assert_eq!(fm.current(), Some(ids[0]));
        fm.focus_previous();
        assert_eq!(fm.current(), Some(ids[2]));
    }

    #[test]
    fn test_non_wrapping_zone_stops_at_ends() {
        let (mut fm, ids) = manager_with("main", false, 2);
        fm.focus_previous();
        assert_eq!(fm.current(), Some(ids[0]));
        fm.focus(ids[1]);
        fm.focus_next();
        assert_eq!(fm.current(), Some(ids[1]));
    }

    #[test]
    fn test_unregister_focused_advances() {
        let (mut fm, ids) = manager_with("main", false, 3);
        fm.focus(ids[1]);
        fm.unregister_element(ids[1]);
        assert_eq!(fm.current(), Some(ids[2]));
    }

    #[test]
    fn test_unregister_last_falls_back() {
        let (mut fm, ids) = manager_with("main", false, 2);
        fm.focus(ids[1]);
        fm.unregister_element(ids[1]);
        assert_eq!(fm.current(), Some(ids[0]));
        fm.unregister_element(ids[0]);
        assert_eq!(fm.current(), None);
    }

    #[test]
    fn test_unregister_unfocused_keeps_focus() {
        let (mut fm, ids) = manager_with("main", false, 3);
        fm.unregister_element(ids[2]);
        assert_eq!(fm.current(), Some(ids[0]));
    }

    #[test]
    fn test_zones_are_independent() {
        let mut fm = FocusManager::new();
        let a = fm.register_element("sidebar");
        let _b = fm.register_element("content");
        let a2 = fm.register_element("sidebar");

        fm.focus(a);
        fm.focus_next();
        // Stays within the sidebar zone.
        assert_eq!(fm.current(), Some(a2));
    }

    #[test]
    fn test_focused_signal_fires_on_change() {
        use std::cell::Cell;
        use std::rc::Rc;

        let (mut fm, ids) = manager_with("main", false, 2);
        let seen = Rc::new(Cell::new(None));
        let seen_c = seen.clone();
        let focused = fm.focused();
        let _e = crate::signals::effect(move || {
            seen_c.set(focused.get());
        });
        assert_eq!(seen.get(), Some(ids[0]));

        fm.focus_next();
        assert_eq!(seen.get(), Some(ids[1]));
    }
}
