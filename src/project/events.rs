//! Project change notifications.
//!
//! Listeners are plain callbacks run synchronously inside the mutating call.
//! While frozen, emission is suppressed; thawing emits one `NeedsUpdate` if
//! anything was suppressed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectEvent {
    /// Something that affects the plot changed
    NeedsUpdate,
    /// A specimen was inserted at this index
    SpecimenAdded(usize),
    /// The specimen at this index was removed
    SpecimenRemoved(usize),
}

pub type ListenerId = usize;

type Listener = Box<dyn FnMut(&ProjectEvent)>;

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: ListenerId,
    frozen: bool,
    pending: bool,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("frozen", &self.frozen)
            .field("pending", &self.pending)
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&ProjectEvent) + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if no listener had this id
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: ProjectEvent) {
        if self.frozen {
            self.pending = true;
            return;
        }
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn thaw(&mut self) {
        self.frozen = false;
        if std::mem::take(&mut self.pending) {
            self.emit(ProjectEvent::NeedsUpdate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(bus: &mut EventBus) -> Rc<RefCell<Vec<ProjectEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(move |e| sink.borrow_mut().push(*e));
        seen
    }

    #[test]
    fn test_emit_reaches_listeners() {
        let mut bus = EventBus::default();
        let seen = recorder(&mut bus);
        bus.emit(ProjectEvent::SpecimenAdded(0));
        bus.emit(ProjectEvent::NeedsUpdate);
        assert_eq!(
            *seen.borrow(),
            vec![ProjectEvent::SpecimenAdded(0), ProjectEvent::NeedsUpdate]
        );
    }

    #[test]
    fn test_freeze_coalesces() {
        let mut bus = EventBus::default();
        let seen = recorder(&mut bus);
        bus.freeze();
        bus.emit(ProjectEvent::NeedsUpdate);
        bus.emit(ProjectEvent::SpecimenRemoved(1));
        bus.emit(ProjectEvent::NeedsUpdate);
        assert!(seen.borrow().is_empty());
        bus.thaw();
        assert_eq!(*seen.borrow(), vec![ProjectEvent::NeedsUpdate]);

        // nothing suppressed, nothing emitted
        bus.freeze();
        bus.thaw();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::default();
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |_| *sink.borrow_mut() += 1);
        bus.emit(ProjectEvent::NeedsUpdate);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(ProjectEvent::NeedsUpdate);
        assert_eq!(*seen.borrow(), 1);
    }
}
