//! Entity pools.
//!
//! Instances are built at warm-up (or on demand when growth is allowed) and
//! then reused forever. Every instance is either queued-inactive or
//! active-in-world, and `acquire`/`release` are the only moves between the
//! two sets. Handles are generational, so a handle kept past its release
//! can never reach the recycled instance.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use skirmish_common::KindId;

use crate::config::PoolConfig;

/// Errors from pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The instance is already queued (second release)
    #[error("pool handle {0} is not active")]
    NotActive(PoolHandle),
    /// The handle belongs to an earlier activation or another pool
    #[error("pool handle {0} is stale")]
    StaleHandle(PoolHandle),
    /// No pool registered for the kind
    #[error("no pool registered for {0}")]
    UnknownKind(KindId),
    /// The multi-kind pool has no kinds registered
    #[error("no kinds registered")]
    NoKinds,
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Hooks run when an instance changes hands.
///
/// Factories must hand out inactive instances; warm-up queues them as built
/// without running either hook.
pub trait Poolable {
    /// Called on acquire, before the handle is returned. Must leave the
    /// instance in its initial post-initialize state.
    fn on_acquire(&mut self);

    /// Called on release, before the instance is queued.
    fn on_release(&mut self);
}

/// Generational reference to a pooled instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolHandle {
    slot: u32,
    generation: u32,
}

impl PoolHandle {
    /// Slot index inside the pool.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Activation count of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// Pool occupancy counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Instances ever built
    pub created: usize,
    /// Instances queued
    pub available: usize,
    /// Instances in the world
    pub active: usize,
    /// Instances built past warm-up
    pub grown: usize,
}

impl PoolStats {
    fn merge(self, other: Self) -> Self {
        Self {
            created: self.created + other.created,
            available: self.available + other.available,
            active: self.active + other.active,
            grown: self.grown + other.grown,
        }
    }
}

/// Consumer interface shared by single- and multi-kind pools.
pub trait Pool<T> {
    /// Handle type issued by this pool.
    type Handle: Copy + Eq + fmt::Debug + fmt::Display;

    /// Takes a queued instance (or builds one if growth allows).
    fn acquire(&mut self) -> Option<Self::Handle>;

    /// Returns an instance to the queue.
    fn release(&mut self, handle: Self::Handle) -> PoolResult<()>;

    /// Active instance behind `handle`.
    fn get(&self, handle: Self::Handle) -> Option<&T>;

    /// Active instance behind `handle`, mutably.
    fn get_mut(&mut self, handle: Self::Handle) -> Option<&mut T>;

    /// Returns whether `handle` refers to an active instance.
    fn is_active(&self, handle: Self::Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Occupancy counters.
    fn stats(&self) -> PoolStats;
}

type Factory<T> = Box<dyn FnMut() -> T + Send>;

#[derive(Debug)]
struct Slot<T> {
    item: T,
    active: bool,
    generation: u32,
}

/// Pool of one entity kind.
pub struct EntityPool<T> {
    slots: Vec<Slot<T>>,
    /// Queued slot indices; the most recently released is reused first
    free: Vec<usize>,
    factory: Factory<T>,
    config: PoolConfig,
    grown: usize,
}

impl<T> fmt::Debug for EntityPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityPool")
            .field("capacity", &self.slots.len())
            .field("available", &self.free.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Poolable> EntityPool<T> {
    /// Creates a pool and warms it to `config.initial_size`.
    pub fn new(config: PoolConfig, factory: impl FnMut() -> T + Send + 'static) -> Self {
        let mut pool = Self {
            slots: Vec::with_capacity(config.initial_size),
            free: Vec::with_capacity(config.initial_size),
            factory: Box::new(factory),
            config,
            grown: 0,
        };
        for _ in 0..config.initial_size {
            pool.build_slot();
        }
        // Stack order: slot 0 is handed out first.
        pool.free.reverse();
        debug!(
            "Warmed entity pool with {} instances (growth {})",
            pool.slots.len(),
            if config.allow_growth { "allowed" } else { "denied" }
        );
        pool
    }

    fn build_slot(&mut self) -> usize {
        let item = (self.factory)();
        let index = self.slots.len();
        self.slots.push(Slot {
            item,
            active: false,
            generation: 0,
        });
        self.free.push(index);
        index
    }

    fn activate(&mut self, index: usize) -> Option<PoolHandle> {
        let slot = self.slots.get_mut(index)?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.active = true;
        slot.item.on_acquire();
        Some(PoolHandle {
            slot: index as u32,
            generation: slot.generation,
        })
    }

    fn slot_for(&self, handle: PoolHandle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Number of instances built.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of queued instances.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of instances in the world.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Handles of every active instance.
    #[must_use]
    pub fn active_handles(&self) -> Vec<PoolHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(i, s)| PoolHandle {
                slot: i as u32,
                generation: s.generation,
            })
            .collect()
    }
}

impl<T: Poolable> Pool<T> for EntityPool<T> {
    type Handle = PoolHandle;

    fn acquire(&mut self) -> Option<PoolHandle> {
        if let Some(index) = self.free.pop() {
            return self.activate(index);
        }
        if !self.config.allow_growth {
            debug!("Entity pool exhausted at {} instances", self.slots.len());
            return None;
        }
        self.build_slot();
        let index = self.free.pop()?;
        self.grown += 1;
        info!("Entity pool grew to {} instances", self.slots.len());
        self.activate(index)
    }

    fn release(&mut self, handle: PoolHandle) -> PoolResult<()> {
        let index = handle.slot as usize;
        let slot = self
            .slots
            .get_mut(index)
            .filter(|s| s.generation == handle.generation)
            .ok_or(PoolError::StaleHandle(handle))?;
        if !slot.active {
            return Err(PoolError::NotActive(handle));
        }
        slot.item.on_release();
        slot.active = false;
        self.free.push(index);
        Ok(())
    }

    fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slot_for(handle).filter(|s| s.active).map(|s| &s.item)
    }

    fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.active && s.generation == handle.generation)
            .map(|s| &mut s.item)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.slots.len(),
            available: self.free.len(),
            active: self.active_count(),
            grown: self.grown,
        }
    }
}

/// Handle issued by a `MultiKindPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindHandle {
    /// Kind the instance came from
    pub kind: KindId,
    /// Handle inside that kind's pool
    pub handle: PoolHandle,
}

impl fmt::Display for KindHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.handle)
    }
}

/// Pools for several kinds; each acquisition picks a kind uniformly at random.
///
/// When the picked kind is exhausted the remaining kinds are tried in
/// registration order.
pub struct MultiKindPool<T> {
    pools: AHashMap<KindId, EntityPool<T>>,
    kinds: Vec<KindId>,
    rng: fastrand::Rng,
}

impl<T> fmt::Debug for MultiKindPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiKindPool")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl<T: Poolable> Default for MultiKindPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> MultiKindPool<T> {
    /// Creates an empty multi-kind pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Creates an empty pool with a seeded kind picker.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            pools: AHashMap::new(),
            kinds: Vec::new(),
            rng,
        }
    }

    /// Registers a kind, replacing any earlier pool for it.
    pub fn register(
        &mut self,
        kind: KindId,
        config: PoolConfig,
        factory: impl FnMut() -> T + Send + 'static,
    ) {
        if self.pools.insert(kind, EntityPool::new(config, factory)).is_some() {
            warn!("Replaced pool for {}", kind);
        } else {
            self.kinds.push(kind);
        }
    }

    /// Registered kinds in registration order.
    #[must_use]
    pub fn kinds(&self) -> &[KindId] {
        &self.kinds
    }

    /// Pool for one kind.
    #[must_use]
    pub fn pool(&self, kind: KindId) -> Option<&EntityPool<T>> {
        self.pools.get(&kind)
    }

    /// Acquires from one specific kind.
    pub fn acquire_kind(&mut self, kind: KindId) -> PoolResult<Option<KindHandle>> {
        let pool = self.pools.get_mut(&kind).ok_or(PoolError::UnknownKind(kind))?;
        Ok(pool.acquire().map(|handle| KindHandle { kind, handle }))
    }

    /// Acquires from a randomly picked kind, falling back to the others.
    pub fn try_acquire(&mut self) -> PoolResult<Option<KindHandle>> {
        if self.kinds.is_empty() {
            return Err(PoolError::NoKinds);
        }
        let start = self.rng.usize(..self.kinds.len());
        for offset in 0..self.kinds.len() {
            let kind = self.kinds[(start + offset) % self.kinds.len()];
            if let Some(handle) = self.acquire_kind(kind)? {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Handles of every active instance across kinds.
    #[must_use]
    pub fn active_handles(&self) -> Vec<KindHandle> {
        self.kinds
            .iter()
            .filter_map(|kind| self.pools.get(kind).map(|p| (*kind, p)))
            .flat_map(|(kind, pool)| {
                pool.active_handles()
                    .into_iter()
                    .map(move |handle| KindHandle { kind, handle })
            })
            .collect()
    }
}

impl<T: Poolable> Pool<T> for MultiKindPool<T> {
    type Handle = KindHandle;

    fn acquire(&mut self) -> Option<KindHandle> {
        match self.try_acquire() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Multi-kind acquire failed: {e}");
                None
            },
        }
    }

    fn release(&mut self, handle: KindHandle) -> PoolResult<()> {
        self.pools
            .get_mut(&handle.kind)
            .ok_or(PoolError::UnknownKind(handle.kind))?
            .release(handle.handle)
    }

    fn get(&self, handle: KindHandle) -> Option<&T> {
        self.pools.get(&handle.kind)?.get(handle.handle)
    }

    fn get_mut(&mut self, handle: KindHandle) -> Option<&mut T> {
        self.pools.get_mut(&handle.kind)?.get_mut(handle.handle)
    }

    fn stats(&self) -> PoolStats {
        self.pools
            .values()
            .map(|pool| pool.stats())
            .fold(PoolStats::default(), PoolStats::merge)
    }
}
