//! Device registry.
//!
//! [`DeviceArena`] maps a [`DeviceId`] to a driver-owned device record. Slots
//! are tombstoned on disconnect and their storage index is recycled by the next
//! insert, but ids come from an [`IdAllocator`] that only counts up: a new
//! connection never receives an id that was handed out before.
//!
//! The fixed-slot XInput driver does not use the arena; its ids are the API
//! slot indices themselves.

use std::collections::HashMap;

/// Opaque identifier for one connection instance.
pub type DeviceId = u32;

/// Monotonic id source, one per driver instance.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: DeviceId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> DeviceId {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// The id the next call to `allocate` will return.
    pub fn peek(&self) -> DeviceId {
        self.next
    }
}

#[derive(Debug)]
enum Slot<T> {
    Live { id: DeviceId, value: T },
    Tombstone,
}

/// Bounded `DeviceId → T` table with slot reuse.
#[derive(Debug)]
pub struct DeviceArena<T> {
    slots: Vec<Slot<T>>,
    index: HashMap<DeviceId, usize>,
    ids: IdAllocator,
    limit: usize,
}

impl<T> DeviceArena<T> {
    /// Create an arena that holds at most `limit` live devices.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            ids: IdAllocator::new(),
            limit,
        }
    }

    /// Insert a record under a freshly allocated id.
    ///
    /// Returns `None` without consuming an id when the arena is full.
    pub fn insert(&mut self, value: T) -> Option<DeviceId> {
        if self.is_full() {
            return None;
        }
        let id = self.ids.allocate();
        let slot = Slot::Live { id, value };

        let at = match self.slots.iter().position(|s| matches!(s, Slot::Tombstone)) {
            Some(free) => {
                self.slots[free] = slot;
                free
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.index.insert(id, at);
        Some(id)
    }

    /// Tombstone the slot holding `id` and hand back its record.
    pub fn remove(&mut self, id: DeviceId) -> Option<T> {
        let at = self.index.remove(&id)?;
        match std::mem::replace(&mut self.slots[at], Slot::Tombstone) {
            Slot::Live { value, .. } => Some(value),
            Slot::Tombstone => None,
        }
    }

    pub fn get(&self, id: DeviceId) -> Option<&T> {
        match self.slots.get(*self.index.get(&id)?)? {
            Slot::Live { value, .. } => Some(value),
            Slot::Tombstone => None,
        }
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut T> {
        let at = *self.index.get(&id)?;
        match self.slots.get_mut(at)? {
            Slot::Live { value, .. } => Some(value),
            Slot::Tombstone => None,
        }
    }

    /// First live device matching `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<DeviceId> {
        self.iter().find(|(_, v)| pred(v)).map(|(id, _)| id)
    }

    /// Live devices in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &T)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Live { id, value } => Some((*id, value)),
            Slot::Tombstone => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DeviceId, &mut T)> {
        self.slots.iter_mut().filter_map(|s| match s {
            Slot::Live { id, value } => Some((*id, value)),
            Slot::Tombstone => None,
        })
    }

    /// Ids of all live devices, in slot order.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Remove and return every live record.
    pub fn drain(&mut self) -> Vec<(DeviceId, T)> {
        self.index.clear();
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|s| match s {
                Slot::Live { id, value } => Some((id, value)),
                Slot::Tombstone => None,
            })
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.limit
    }
}
