//! # Callback Registry
//!
//! Fixed-capacity table of named callback slots behind one mutex, the
//! shape every plugin-style registry in the gateway shares (PEP resolver,
//! PIP attribute providers).
//!
//! - `register` takes the first empty slot and refuses duplicate names
//! - `register_at` fills a capability index; the first write wins
//! - `dispatch` is an O(1) indexed call under the lock

use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Callback '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("Slot {0} is already taken")]
    SlotTaken(usize),
    #[error("Registry is full ({0} slots)")]
    Full(usize),
    #[error("Slot {index} out of range (capacity {capacity})")]
    OutOfRange { index: usize, capacity: usize },
    #[error("Slot {0} is empty")]
    Empty(usize),
    #[error("Registry lock poisoned")]
    Poisoned,
}

struct Slot<T> {
    name: String,
    callback: T,
}

/// Named callback slots behind one lock
pub struct CallbackTable<T> {
    slots: Mutex<Vec<Option<Slot<T>>>>,
    capacity: usize,
}

impl<T> CallbackTable<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: Mutex::new(slots),
            capacity,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Option<Slot<T>>>>, RegistryError> {
        self.slots.lock().map_err(|_| RegistryError::Poisoned)
    }

    fn check_index(&self, index: usize) -> Result<(), RegistryError> {
        if index >= self.capacity {
            return Err(RegistryError::OutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Register in the first empty slot, returning its index
    pub fn register(&self, name: &str, callback: T) -> Result<usize, RegistryError> {
        let mut slots = self.lock()?;
        if slots.iter().flatten().any(|slot| slot.name == name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        let index = slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::Full(self.capacity))?;
        slots[index] = Some(Slot {
            name: name.to_string(),
            callback,
        });
        Ok(index)
    }

    /// Register at a fixed capability index; an occupied slot is never overwritten
    pub fn register_at(&self, index: usize, name: &str, callback: T) -> Result<(), RegistryError> {
        self.check_index(index)?;
        let mut slots = self.lock()?;
        if slots[index].is_some() {
            return Err(RegistryError::SlotTaken(index));
        }
        slots[index] = Some(Slot {
            name: name.to_string(),
            callback,
        });
        Ok(())
    }

    /// Empty a slot, returning the callback it held
    pub fn unregister(&self, index: usize) -> Result<T, RegistryError> {
        self.check_index(index)?;
        let mut slots = self.lock()?;
        slots[index]
            .take()
            .map(|slot| slot.callback)
            .ok_or(RegistryError::Empty(index))
    }

    /// Call `f` with the callback at `index`, holding the lock
    pub fn dispatch<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Result<R, RegistryError> {
        self.check_index(index)?;
        let slots = self.lock()?;
        match &slots[index] {
            Some(slot) => Ok(f(&slot.callback)),
            None => Err(RegistryError::Empty(index)),
        }
    }

    /// Call `f` on every occupied slot in index order until it returns `Some`
    pub fn find_map<R>(
        &self,
        mut f: impl FnMut(&str, &T) -> Option<R>,
    ) -> Result<Option<R>, RegistryError> {
        let slots = self.lock()?;
        Ok(slots
            .iter()
            .flatten()
            .find_map(|slot| f(&slot.name, &slot.callback)))
    }

    /// Name registered at `index`
    pub fn name(&self, index: usize) -> Option<String> {
        let slots = self.lock().ok()?;
        slots.get(index)?.as_ref().map(|slot| slot.name.clone())
    }

    /// Occupied slots
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.iter().flatten().count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
