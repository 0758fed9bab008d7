//! Reference-counted opaque handles for side data that travels with shadow rays.
//!
//! Occlusion rays carry AOV/LPE bookkeeping lists, deep-output records and cryptomatte
//! records by handle rather than by pointer. Every slot is created with one reference; the
//! ray that owns it releases it exactly once at retirement, and forwarding to the output
//! stage takes an extra reference that the consumer drops.

use crate::{DispatchError, Result};
use parking_lot::Mutex;
use smallvec::SmallVec;
use ultraviolet::Vec3;

/// Opaque reference into a [`HandleTable`]. [`Handle::NULL`] refers to nothing.
///
/// The generation distinguishes successive occupants of a recycled slot, so a handle kept
/// past its release never reaches the slot's next value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub const NULL: Handle = Handle {
        index: u32::MAX,
        generation: 0,
    };

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline(always)]
    pub fn raw(self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    refs: u32,
    generation: u32,
}

/// Slot table with explicit acquire/release.
#[derive(Debug)]
pub struct HandleTable<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    released: usize,
}

impl<T> HandleTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            released: 0,
        }
    }

    /// Stores `value` with a reference count of one.
    pub fn insert(&mut self, value: T) -> Handle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.refs = 1;
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            value: Some(value),
            refs: 1,
            generation: 0,
        });
        Handle {
            index,
            generation: 0,
        }
    }

    /// Adds a reference. The null handle passes through untouched.
    pub fn acquire(&mut self, handle: Handle) -> Result<Handle> {
        if handle.is_null() {
            return Ok(handle);
        }
        let slot = self.live_slot_mut(handle)?;
        slot.refs += 1;
        Ok(handle)
    }

    /// Drops a reference and frees the slot when the count reaches zero.
    ///
    /// Releasing the previous occupant of a recycled slot is a [`DispatchError::StaleHandle`];
    /// releasing a handle whose slot is still empty is a [`DispatchError::DoubleRelease`].
    pub fn release(&mut self, handle: Handle) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        let name = self.name;
        let slot = match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.refs > 0 => slot,
            Some(slot)
                if slot.refs == 0 && slot.generation == handle.generation.wrapping_add(1) =>
            {
                return Err(DispatchError::DoubleRelease {
                    table: name,
                    handle: handle.index,
                });
            }
            _ => {
                return Err(DispatchError::StaleHandle {
                    table: name,
                    handle: handle.index,
                });
            }
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            slot.value = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
            self.live -= 1;
        }
        self.released += 1;
        Ok(())
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn ref_count(&self, handle: Handle) -> u32 {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .map_or(0, |slot| slot.refs)
    }

    /// Slots that still hold a value.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Successful `release` calls over the table's lifetime.
    pub fn releases(&self) -> usize {
        self.released
    }

    fn live_slot_mut(&mut self, handle: Handle) -> Result<&mut Slot<T>> {
        let name = self.name;
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.refs > 0 && slot.generation == handle.generation => Ok(slot),
            _ => Err(DispatchError::StaleHandle {
                table: name,
                handle: handle.index,
            }),
        }
    }
}

/// One AOV/LPE bookkeeping record attached to an occlusion ray.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OcclSideItem {
    pub lpe_state_id: i32,
    pub ray_epsilon: f32,
}

pub type OcclSideList = SmallVec<[OcclSideItem; 4]>;

/// Deep-output record for a sample.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeepData {
    pub z: f32,
    pub normal: Vec3,
    pub layer: u32,
}

/// Cryptomatte record for a sample.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CryptomatteData {
    pub id: f32,
    pub position: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct SideDataCounts {
    pub occl_lists: usize,
    pub deep: usize,
    pub cryptomatte: usize,
}

impl SideDataCounts {
    pub fn total(&self) -> usize {
        self.occl_lists + self.deep + self.cryptomatte
    }
}

/// The three handle tables shared by every worker of a frame.
#[derive(Debug)]
pub struct SideDataStore {
    occl_lists: Mutex<HandleTable<OcclSideList>>,
    deep: Mutex<HandleTable<DeepData>>,
    cryptomatte: Mutex<HandleTable<CryptomatteData>>,
}

impl Default for SideDataStore {
    fn default() -> Self {
        Self {
            occl_lists: Mutex::new(HandleTable::new("occlusion side data")),
            deep: Mutex::new(HandleTable::new("deep data")),
            cryptomatte: Mutex::new(HandleTable::new("cryptomatte data")),
        }
    }
}

impl SideDataStore {
    pub fn insert_occl_list(&self, list: OcclSideList) -> Handle {
        self.occl_lists.lock().insert(list)
    }

    pub fn occl_list(&self, handle: Handle) -> Option<OcclSideList> {
        self.occl_lists.lock().get(handle).cloned()
    }

    pub fn release_occl_list(&self, handle: Handle) -> Result<()> {
        self.occl_lists.lock().release(handle)
    }

    pub fn insert_deep(&self, data: DeepData) -> Handle {
        self.deep.lock().insert(data)
    }

    pub fn deep(&self, handle: Handle) -> Option<DeepData> {
        self.deep.lock().get(handle).copied()
    }

    pub fn acquire_deep(&self, handle: Handle) -> Result<Handle> {
        self.deep.lock().acquire(handle)
    }

    pub fn release_deep(&self, handle: Handle) -> Result<()> {
        self.deep.lock().release(handle)
    }

    pub fn insert_cryptomatte(&self, data: CryptomatteData) -> Handle {
        self.cryptomatte.lock().insert(data)
    }

    pub fn cryptomatte(&self, handle: Handle) -> Option<CryptomatteData> {
        self.cryptomatte.lock().get(handle).copied()
    }

    pub fn acquire_cryptomatte(&self, handle: Handle) -> Result<Handle> {
        self.cryptomatte.lock().acquire(handle)
    }

    pub fn release_cryptomatte(&self, handle: Handle) -> Result<()> {
        self.cryptomatte.lock().release(handle)
    }

    pub fn live_counts(&self) -> SideDataCounts {
        SideDataCounts {
            occl_lists: self.occl_lists.lock().live(),
            deep: self.deep.lock().live(),
            cryptomatte: self.cryptomatte.lock().live(),
        }
    }

    pub fn occl_list_releases(&self) -> usize {
        self.occl_lists.lock().releases()
    }
}
