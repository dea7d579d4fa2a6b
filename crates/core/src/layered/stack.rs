//! The ordered layer stack of one configuration.

use std::sync::Arc;

use crate::layer::Layer;
use crate::scope::{Scope, ScopeOrder, ScopeSet};
use crate::storage::Storage;

pub(crate) struct LayerSlot {
    pub(crate) id: u64,
    pub(crate) layer: Box<dyn Layer>,
    /// Storage that produced the layer; `None` for layers added by hand.
    pub(crate) storage: Option<Arc<dyn Storage>>,
    /// Bumped by every write, removal and flush of the layer.
    pub(crate) generation: u64,
}

impl LayerSlot {
    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }
}

/// Layers ordered by scope precedence; within a scope the earlier inserted wins.
#[derive(Default)]
pub(crate) struct LayerStack {
    slots: Vec<LayerSlot>,
    next_id: u64,
}

impl LayerStack {
    pub(crate) fn insert(
        &mut self,
        layer: Box<dyn Layer>,
        storage: Option<Arc<dyn Storage>>,
        order: &ScopeOrder,
    ) -> u64 {
        let rank = order.rank(layer.scope());
        let position = self
            .slots
            .iter()
            .position(|slot| order.rank(slot.layer.scope()) > rank)
            .unwrap_or(self.slots.len());
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(
            position,
            LayerSlot {
                id,
                layer,
                storage,
                generation: 0,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<LayerSlot> {
        let position = self.slots.iter().position(|slot| slot.id == id)?;
        Some(self.slots.remove(position))
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut LayerSlot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &LayerSlot> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut LayerSlot> {
        self.slots.iter_mut()
    }

    /// Slots whose scope is in `scopes`, highest precedence first.
    pub(crate) fn in_scopes(&self, scopes: ScopeSet) -> impl Iterator<Item = &LayerSlot> {
        self.slots
            .iter()
            .filter(move |slot| scopes.has(slot.layer.scope()))
    }

    pub(crate) fn writeable_in(&self, scope: Scope) -> impl Iterator<Item = &LayerSlot> {
        self.slots
            .iter()
            .filter(move |slot| slot.layer.scope() == scope && slot.layer.is_writeable())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MemoryLayer;
    use crate::location::Location;

    fn layer(scope: Scope, name: &str) -> Box<dyn Layer> {
        let uri = Location::opaque_uri("memory", &[name]).unwrap();
        Box::new(MemoryLayer::new(Location::new(scope, "memory", uri)))
    }

    fn names(stack: &LayerStack) -> Vec<String> {
        stack
            .iter()
            .map(|slot| slot.layer.location().uri().path().trim_start_matches('/').to_string())
            .collect()
    }

    #[test]
    fn test_insert_orders_by_scope_then_insertion() {
        let order = ScopeOrder::default();
        let mut stack = LayerStack::default();
        stack.insert(layer(Scope::Host, "host"), None, &order);
        stack.insert(layer(Scope::User, "user1"), None, &order);
        stack.insert(layer(Scope::Runtime, "runtime"), None, &order);
        stack.insert(layer(Scope::User, "user2"), None, &order);

        assert_eq!(names(&stack), vec!["runtime", "user1", "user2", "host"]);
    }

    #[test]
    fn test_touch_bumps_generation() {
        let order = ScopeOrder::default();
        let mut stack = LayerStack::default();
        let id = stack.insert(layer(Scope::User, "a"), None, &order);
        let slot = stack.get_mut(id).unwrap();
        assert_eq!(slot.generation, 0);
        slot.touch();
        slot.touch();
        assert_eq!(slot.generation, 2);
    }

    #[test]
    fn test_remove_by_id() {
        let order = ScopeOrder::default();
        let mut stack = LayerStack::default();
        let a = stack.insert(layer(Scope::User, "a"), None, &order);
        stack.insert(layer(Scope::User, "b"), None, &order);

        assert!(stack.remove(a).is_some());
        assert!(stack.remove(a).is_none());
        assert_eq!(names(&stack), vec!["b"]);
        assert_eq!(stack.writeable_in(Scope::User).count(), 1);
        assert_eq!(stack.in_scopes(ScopeSet::HOST).count(), 0);
    }
}
