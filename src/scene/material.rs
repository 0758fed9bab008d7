use crate::raytracing::RayState;
use crate::{DispatchError, Result};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stable material identifier. Dense and starting at 1; 0 is the miss sort key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MaterialId(NonZeroU32);

impl MaterialId {
    pub fn new(raw: u32) -> Result<Self> {
        NonZeroU32::new(raw)
            .map(Self)
            .ok_or(DispatchError::ReservedMaterialId)
    }

    #[inline(always)]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Ray classification used by per-material switch rules.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum RayType {
    #[default]
    Camera,
    Mirror,
    Diffuse,
    Glossy,
}

impl RayType {
    pub const COUNT: usize = 4;

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One ray handed to a material, with its locality key.
#[derive(Debug)]
pub struct ShadeEntry {
    pub sort_key: u32,
    pub ray_state: RayState,
}

/// Externally owned, thread-safe per-material work queue. A submitted batch belongs to the
/// queue from then on.
pub trait ShadeQueue: Send + Sync + Debug {
    fn add_entries(&self, thread_idx: usize, entries: Vec<ShadeEntry>);
}

#[derive(Debug)]
struct MaterialEntry {
    name: String,
    queue: Arc<dyn ShadeQueue>,
    switch: [Option<MaterialId>; RayType::COUNT],
}

/// Registered materials, indexed by [`MaterialId`].
#[derive(Debug, Default)]
pub struct MaterialTable {
    entries: Vec<MaterialEntry>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, queue: Arc<dyn ShadeQueue>) -> MaterialId {
        self.entries.push(MaterialEntry {
            name: name.into(),
            queue,
            switch: [None; RayType::COUNT],
        });
        // entries.len() >= 1 after the push
        MaterialId(NonZeroU32::MIN.saturating_add(self.entries.len() as u32 - 1))
    }

    /// Rays of `ray_type` hitting `material` are shaded by `target` instead.
    pub fn set_ray_switch(
        &mut self,
        material: MaterialId,
        ray_type: RayType,
        target: MaterialId,
    ) -> Result<()> {
        self.entry(target)?;
        self.entry_mut(material)?.switch[ray_type.index()] = Some(target);
        Ok(())
    }

    /// Applies the switch rule once; the substitute is not switched again.
    pub fn resolve(&self, material: MaterialId, ray_type: RayType) -> Result<MaterialId> {
        Ok(self.entry(material)?.switch[ray_type.index()].unwrap_or(material))
    }

    pub fn queue(&self, material: MaterialId) -> Result<&Arc<dyn ShadeQueue>> {
        Ok(&self.entry(material)?.queue)
    }

    pub fn name(&self, material: MaterialId) -> Result<&str> {
        Ok(&self.entry(material)?.name)
    }

    /// Largest registered id, the upper bound of every sort key.
    pub fn max_id(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, material: MaterialId) -> Result<&MaterialEntry> {
        self.entries
            .get(material.get() as usize - 1)
            .ok_or(DispatchError::UnknownMaterial(material.get()))
    }

    fn entry_mut(&mut self, material: MaterialId) -> Result<&mut MaterialEntry> {
        self.entries
            .get_mut(material.get() as usize - 1)
            .ok_or(DispatchError::UnknownMaterial(material.get()))
    }
}

/// Shade queue that simply keeps what it is given.
#[derive(Debug, Default)]
pub struct CollectingShadeQueue {
    entries: Mutex<Vec<ShadeEntry>>,
    submissions: AtomicUsize,
}

impl CollectingShadeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<ShadeEntry> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl ShadeQueue for CollectingShadeQueue {
    fn add_entries(&self, _thread_idx: usize, mut entries: Vec<ShadeEntry>) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().append(&mut entries);
    }
}
