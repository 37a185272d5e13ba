use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Index plus generation counter, so a handle to a freed slot never aliases its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Handle type shared by hierarchy nodes and registered chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId(pub GenerationalId);

impl EntityId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self(GenerationalId::new(index, generation))
    }

    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn generation(&self) -> u32 {
        self.0.generation
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self(GenerationalId::new(usize::MAX, 0))
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational arena handing out stable [`EntityId`]s.
///
/// Removing an entry bumps the slot generation, so ids held by a chain whose
/// node was destroyed simply stop resolving instead of pointing at a new node.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: VecDeque<usize>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: VecDeque::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> EntityId {
        self.live += 1;
        if let Some(index) = self.free_list.pop_front() {
            let slot = &mut self.slots[index];
            slot.value = Some(item);
            return EntityId::new(index, slot.generation);
        }

        let index = self.slots.len();
        self.slots.push(Slot {
            generation: 0,
            value: Some(item),
        });
        EntityId::new(index, 0)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push_back(id.index());
        self.live -= 1;
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (EntityId::new(index, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (EntityId::new(index, generation), value))
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_ids_do_not_resolve_after_reuse() {
        let mut arena = Arena::new();
        let first = arena.insert("hair");
        assert_eq!(arena.remove(first), Some("hair"));

        let second = arena.insert("tail");
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"tail"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        let c = arena.insert(3);
        arena.remove(b);

        let ids: Vec<_> = arena.ids().collect();
        assert_eq!(ids, vec![a, c]);
        assert!(!arena.contains(b));
        assert!(arena.get(EntityId::default()).is_none());
    }
}
