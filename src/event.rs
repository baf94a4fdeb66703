//! Observing a running [Emulator](crate::emulator::Emulator).
//!
//! Listeners registered with [add_listener](crate::emulator::Emulator::add_listener)
//! see every cell the program writes, every taken control transfer and the final halt.
//! Any `FnMut(&Event)` closure is a listener. [EventLog] records events for later
//! inspection.

use std::cell::RefCell;
use std::rc::Rc;

use crate::instruction::Register;

/// A state change of the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An instruction wrote a cell. Stack cells included, register bookkeeping of the
    /// program counter, stack pointer and flags excluded.
    MemoryChange {
        address: u8,
        data: u8,
    },

    /// A write to one of the general purpose registers `a`..`j`. Always follows the
    /// matching [MemoryChange](Event::MemoryChange).
    RegisterChange {
        register: Register,
        data: u8,
    },

    /// A branch, jump, call or return was taken. `to` is the index of the next
    /// instruction to execute.
    Jump {
        from: u8,
        to: u8,
    },

    /// A `halt` or `end` was fetched.
    Halt {
        program_counter: u8,
    },
}

/// Consumer of [Events](Event).
pub trait EventListener {
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: FnMut(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

/// Handle for unregistering a listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Shared, growing record of events. Clones append to the same record.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Values written to `register`, oldest first.
    pub fn register_values(&self, register: Register) -> Vec<u8> {
        self.events.borrow().iter()
            .filter_map(|event| match event {
                Event::RegisterChange { register: changed, data } if *changed == register => Some(*data),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventListener for EventLog {
    fn event(&mut self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

pub(crate) struct EventDispatcher {
    listeners: Vec<(ListenerId, Box<dyn EventListener>)>,
    next_id: usize,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));

        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);

        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, event: Event) {
        for (_, listener) in self.listeners.iter_mut() {
            listener.event(&event);
        }
    }
}

#[test]
fn test_dispatch_and_remove() {
    let log = EventLog::new();
    let mut dispatcher = EventDispatcher::new();

    let first = dispatcher.add_listener(log.clone());
    let second = dispatcher.add_listener(log.clone());

    dispatcher.dispatch(Event::Halt { program_counter: 3 });
    assert_eq!(log.events().len(), 2);

    assert!(dispatcher.remove_listener(first));
    assert!(!dispatcher.remove_listener(first));

    log.clear();
    dispatcher.dispatch(Event::RegisterChange { register: Register::B, data: 4 });
    dispatcher.dispatch(Event::RegisterChange { register: Register::C, data: 5 });

    assert_eq!(log.register_values(Register::B), vec![4]);
    assert!(dispatcher.remove_listener(second));
}
