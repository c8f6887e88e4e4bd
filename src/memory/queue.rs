//! Intrusive FIFO queues
//!
//! Both scheduler queues (events and continuations) are singly linked through
//! the Z field of the cells they hold, so putting and popping never allocate.

use super::heap::Heap;
use super::value::{Val, NIL};
use crate::interpreter::errors::VmError;

/// Head/tail pair of a Z-linked queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fifo {
    head: Val,
    tail: Val,
}

impl Fifo {
    pub const fn new() -> Self {
        Fifo {
            head: NIL,
            tail: NIL,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// First cell in the queue, `NIL` when empty
    pub fn head(&self) -> Val {
        self.head
    }

    /// Append a cell at the tail
    pub fn put(&mut self, heap: &mut Heap, cell: Val) -> Result<(), VmError> {
        heap.set_z(cell, NIL)?;
        if self.is_empty() {
            self.head = cell;
        } else {
            heap.set_z(self.tail, cell)?;
        }
        self.tail = cell;
        heap.shade(cell);
        Ok(())
    }

    /// Unlink the head cell, `None` when the queue is empty
    pub fn pop(&mut self, heap: &mut Heap) -> Result<Option<Val>, VmError> {
        if self.is_empty() {
            return Ok(None);
        }
        let cell = self.head;
        self.head = heap.z(cell)?;
        heap.set_z(cell, NIL)?;
        if self.is_empty() {
            self.tail = NIL;
        }
        Ok(Some(cell))
    }

    /// Queued cells, head first
    pub fn to_vec(&self, heap: &Heap) -> Result<Vec<Val>, VmError> {
        let mut budget = heap.budget("queue walk");
        let mut cells = Vec::new();
        let mut p = self.head;
        while p != NIL {
            budget.spend()?;
            cells.push(p);
            p = heap.z(p)?;
        }
        Ok(cells)
    }

    pub fn len(&self, heap: &Heap) -> Result<usize, VmError> {
        Ok(self.to_vec(heap)?.len())
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

/// The event queue: a [`Fifo`] that only accepts event cells addressed to
/// an actor capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventQueue(Fifo);

impl EventQueue {
    pub const fn new() -> Self {
        EventQueue(Fifo::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn head(&self) -> Val {
        self.0.head()
    }

    /// Append an event. Anything else is a fatal assertion.
    pub fn put(&mut self, heap: &mut Heap, event: Val) -> Result<(), VmError> {
        if !heap.is_event(event) {
            return Err(VmError::Assertion("event queue accepts only events"));
        }
        if !heap.is_actor(heap.x(event)?) {
            return Err(VmError::Assertion("event target must be an actor"));
        }
        self.0.put(heap, event)
    }

    pub fn pop(&mut self, heap: &mut Heap) -> Result<Option<Val>, VmError> {
        self.0.pop(heap)
    }

    pub fn to_vec(&self, heap: &Heap) -> Result<Vec<Val>, VmError> {
        self.0.to_vec(heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::{ACTOR_T, EVENT_T, PAIR_T, UNDEF};

    fn event(heap: &mut Heap, n: i64) -> Val {
        heap.alloc(EVENT_T, UNDEF, Val::fix(n), NIL).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut heap = Heap::new(64);
        let mut q = Fifo::new();
        let a = event(&mut heap, 1);
        let b = event(&mut heap, 2);
        q.put(&mut heap, a).unwrap();
        q.put(&mut heap, b).unwrap();
        assert_eq!(q.len(&heap).unwrap(), 2);
        assert_eq!(q.pop(&mut heap).unwrap(), Some(a));
        assert_eq!(q.pop(&mut heap).unwrap(), Some(b));
        assert_eq!(q.pop(&mut heap).unwrap(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_requeue_after_pop() {
        let mut heap = Heap::new(64);
        let mut q = Fifo::new();
        let a = event(&mut heap, 1);
        let b = event(&mut heap, 2);
        q.put(&mut heap, a).unwrap();
        q.put(&mut heap, b).unwrap();
        let first = q.pop(&mut heap).unwrap().unwrap();
        q.put(&mut heap, first).unwrap();
        assert_eq!(q.to_vec(&heap).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_event_queue_rejects_non_events() {
        let mut heap = Heap::new(64);
        let mut q = EventQueue::new();
        let actor = heap.alloc(ACTOR_T, UNDEF, NIL, UNDEF).unwrap();
        let good = heap.alloc(EVENT_T, actor.to_cap(), Val::fix(1), NIL).unwrap();
        q.put(&mut heap, good).unwrap();

        let pair = heap.alloc(PAIR_T, Val::fix(1), NIL, UNDEF).unwrap();
        assert!(matches!(q.put(&mut heap, pair), Err(VmError::Assertion(_))));
        let stray = event(&mut heap, 2);
        let err = q.put(&mut heap, stray).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(q.to_vec(&heap).unwrap(), vec![good]);
    }
}
