//! Priority-tiered keyboard dispatch.
//!
//! Handlers register at one of four priorities. Dispatch visits tiers from
//! critical down to background, and within a tier visits the most recently
//! registered handler first, so a modal pushed on top of a screen shadows
//! the handlers beneath it without unregistering them.
//!
//! A handler halts dispatch only by doing both: calling
//! [`Propagation::stop_propagation`] and returning `true`. Returning `true`
//! alone marks interest without blocking other handlers.

use super::KeyEvent;

/// Dispatch priority, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Background,
    Normal,
    Modal,
    Critical,
}

const TIER_COUNT: usize = 4;

impl Priority {
    fn tier(self) -> usize {
        match self {
            Priority::Background => 0,
            Priority::Normal => 1,
            Priority::Modal => 2,
            Priority::Critical => 3,
        }
    }
}

/// Per-dispatch propagation control handed to each handler.
#[derive(Debug, Default)]
pub struct Propagation {
    stopped: bool,
}

impl Propagation {
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

pub type HandlerId = u64;

type Handler = Box<dyn FnMut(&KeyEvent, &mut Propagation) -> bool>;

struct HandlerEntry {
    id: HandlerId,
    callback: Handler,
}

/// Keyboard handler registry and dispatcher.
#[derive(Default)]
pub struct InputRouter {
    tiers: [Vec<HandlerEntry>; TIER_COUNT],
    next_id: HandlerId,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key handler at `priority`. Returns an id for
    /// [`unregister`](Self::unregister).
    pub fn on_key<F>(&mut self, priority: Priority, callback: F) -> HandlerId
    where
        F: FnMut(&KeyEvent, &mut Propagation) -> bool + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.tiers[priority.tier()].push(HandlerEntry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unregister(&mut self, id: HandlerId) {
        for tier in &mut self.tiers {
            tier.retain(|entry| entry.id != id);
        }
    }

    /// Dispatch one key event. Returns true when a handler consumed it
    /// (stopped propagation with a truthy return).
    pub fn dispatch(&mut self, event: &KeyEvent) -> bool {
        for tier in self.tiers.iter_mut().rev() {
            for entry in tier.iter_mut().rev() {
                let mut propagation = Propagation::default();
                let handled = (entry.callback)(event, &mut propagation);
                if handled && propagation.is_stopped() {
                    return true;
                }
            }
        }
        false
    }

    pub fn handler_count(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn reset(&mut self) {
        for tier in &mut self.tiers {
            tier.clear();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn press(router: &mut InputRouter, key: Key) -> bool {
        router.dispatch(&KeyEvent::new(key))
    }

    #[test]
    fn test_higher_priority_runs_first() {
        let mut router = InputRouter::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (priority, label) in [
            (Priority::Background, "background"),
            (Priority::Critical, "critical"),
            (Priority::Normal, "normal"),
        ] {
            let order_c = order.clone();
            router.on_key(priority, move |_, _| {
                order_c.borrow_mut().push(label);
                false
            });
        }

        press(&mut router, Key::Enter);
        assert_eq!(
            *order.borrow(),
            vec!["critical", "normal", "background"]
        );
    }

    #[test]
    fn test_most_recent_first_within_tier() {
        let mut router = InputRouter::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["older", "newer"] {
            let order_c = order.clone();
            router.on_key(Priority::Normal, move |_, _| {
                order_c.borrow_mut().push(label);
                false
            });
        }

        press(&mut router, Key::Enter);
        assert_eq!(*order.borrow(), vec!["newer", "older"]);
    }

    #[test]
    fn test_stop_propagation_requires_truthy_return() {
        let mut router = InputRouter::new();
        let reached = Rc::new(RefCell::new(Vec::new()));

        let reached_c = reached.clone();
        router.on_key(Priority::Background, move |_, _| {
            reached_c.borrow_mut().push("background");
            false
        });

        // Stops propagation but returns false: dispatch continues.
        let reached_c = reached.clone();
        router.on_key(Priority::Modal, move |_, prop| {
            reached_c.borrow_mut().push("half-hearted");
            prop.stop_propagation();
            false
        });

        let consumed = press(&mut router, Key::Enter);
        assert!(!consumed);
        assert_eq!(*reached.borrow(), vec!["half-hearted", "background"]);
    }

    #[test]
    fn test_stop_with_truthy_return_halts() {
        let mut router = InputRouter::new();
        let reached = Rc::new(RefCell::new(Vec::new()));

        let reached_c = reached.clone();
        router.on_key(Priority::Normal, move |_, _| {
            reached_c.borrow_mut().push("shadowed");
            false
        });

        let reached_c = reached.clone();
        router.on_key(Priority::Modal, move |_, prop| {
            reached_c.borrow_mut().push("modal");
            prop.stop_propagation();
            true
        });

        let consumed = press(&mut router, Key::Enter);
        assert!(consumed);
        assert_eq!(*reached.borrow(), vec!["modal"]);
    }

    #[test]
    fn test_unregister_removes_handler() {
        let mut router = InputRouter::new();
        let count = Rc::new(RefCell::new(0));

        let count_c = count.clone();
        let id = router.on_key(Priority::Normal, move |_, _| {
            *count_c.borrow_mut() += 1;
            false
        });

        press(&mut router, Key::Enter);
        router.unregister(id);
        press(&mut router, Key::Enter);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(router.handler_count(), 0);
    }
}
