use alloc::vec::Vec;

/// Index into a [SlotPool], checked against the generation of the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u16,
    generation: u16,
}

impl Handle {
    /// Position of the slot inside the pool
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

struct Slot<T> {
    value: Option<T>,
    generation: u16,
}

/// Fixed capacity arena handing out generation checked handles
///
/// The capacity is set on construction and never grows.
/// A handle stays valid until its slot is freed, afterwards every access with it fails
/// even when the slot was reused.
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    used: usize,
}

impl<T> SlotPool<T> {
    /// Creates a pool of `capacity` empty slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            value: None,
            generation: 0,
        });
        Self { slots, used: 0 }
    }

    /// Stores a value in the first free slot, returns None if the pool is exhausted
    pub fn alloc(&mut self, value: T) -> Option<Handle> {
        let index = self.slots.iter().position(|slot| slot.value.is_none())?;
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.used += 1;
        Some(Handle {
            index: index as u16,
            generation: slot.generation,
        })
    }

    /// Frees a slot and returns its value
    /// Stale or unknown handles leave the pool untouched
    pub fn free(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.used -= 1;
        Some(value)
    }

    /// Value of a live handle
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Mutable value of a live handle
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slot_mut(handle).and_then(|slot| slot.value.as_mut())
    }

    /// Number of allocated slots
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns true if no slot is allocated
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocated values with their handles in index order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Handle {
                        index: index as u16,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
    }
}
