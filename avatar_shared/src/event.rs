//! Typed event bus between the frame loop and whoever presents its results.
//!
//! The loop pushes `DisplayEvent`s and `VerticalEvent`s during a tick; the
//! driver (or UI layer) drains the types it cares about afterwards. Each type
//! gets its own FIFO queue, so draining one type never disturbs another.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

/// Type-erased view of one queue.
trait Queue: Send + Sync {
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<E: 'static + Send + Sync> Queue for Vec<E> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Queue>>,
}

impl EventBus {
    pub fn push<E: 'static + Send + Sync>(&mut self, event: E) {
        let queue = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        if let Some(queue) = queue.as_any_mut().downcast_mut::<Vec<E>>() {
            queue.push(event);
        }
    }

    /// Queued events of type `E`.
    pub fn pending<E: 'static + Send + Sync>(&self) -> usize {
        self.queues.get(&TypeId::of::<E>()).map_or(0, |q| q.len())
    }

    /// Queued events across every type.
    pub fn total_pending(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_pending() == 0
    }

    /// Takes every queued `E`, oldest first.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .remove(&TypeId::of::<E>())
            .and_then(|queue| queue.into_any().downcast::<Vec<E>>().ok())
            .map_or_else(Vec::new, |queue| *queue)
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}
