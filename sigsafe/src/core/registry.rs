//! Guarded-region registry
//!
//! The registry maps program counters inside a guarded region to that
//! region's landing address. It is assembled once with [`RegistryBuilder`],
//! frozen into an immutable [`GuardedRegistry`] and published through a
//! write-once global, so the signal handler reads it without locking.

use core::fmt;

use sigsafe_api::{Error, GuardedCall, RawRegion, RegionSource, Result};
use spin::Once;

use crate::arch::Platform;

/// One guarded region: `start..=end` redirects to `landing`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedRegion {
    pub name: &'static str,
    pub start: usize,
    pub end: usize,
    pub landing: usize,
}

impl GuardedRegion {
    /// Creates a region from a trampoline descriptor
    pub fn new(name: &'static str, raw: RawRegion) -> Self {
        Self {
            name,
            start: raw.start,
            end: raw.end,
            landing: raw.landing,
        }
    }

    /// Creates a region describing one guarded call
    pub fn from_call(call: &dyn GuardedCall) -> Self {
        Self::new(call.name(), call.region())
    }

    /// Whether `pc` lies in `start..=end`
    pub fn contains(&self, pc: usize) -> bool {
        self.start <= pc && pc <= self.end
    }

    fn overlaps(&self, other: &GuardedRegion) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for GuardedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:#x}, {:#x}] -> {:#x}",
            self.name, self.start, self.end, self.landing
        )
    }
}

/// Collects and validates guarded regions before they are frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    regions: Vec<GuardedRegion>,
}

impl RegistryBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every region built into this crate for the current target
    pub fn with_platform(mut self) -> Result<Self> {
        self.extend_from(&Platform)?;
        Ok(self)
    }

    /// Adds one region.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRegion`] if `start > end`, and
    /// [`Error::OverlappingRegion`] if it shares an address with a region
    /// already added.
    pub fn add(&mut self, region: GuardedRegion) -> Result<&mut Self> {
        if region.start > region.end {
            return Err(Error::InvalidRegion {
                name: region.name,
                start: region.start,
                end: region.end,
            });
        }
        if let Some(other) = self.regions.iter().find(|r| r.overlaps(&region)) {
            return Err(Error::OverlappingRegion {
                name: region.name,
                other: other.name,
            });
        }

        sys_trace!("guarded region {}", region);
        self.regions.push(region);
        Ok(self)
    }

    /// Adds every call a region source provides
    pub fn extend_from(&mut self, source: &dyn RegionSource) -> Result<&mut Self> {
        for call in source.guarded_calls() {
            self.add(GuardedRegion::from_call(call))?;
        }
        Ok(self)
    }

    /// Freezes the collected regions
    pub fn freeze(mut self) -> GuardedRegistry {
        self.regions.sort_by_key(|r| r.start);
        GuardedRegistry {
            regions: self.regions.into_boxed_slice(),
        }
    }
}

/// Immutable set of disjoint guarded regions, sorted by start address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedRegistry {
    regions: Box<[GuardedRegion]>,
}

impl GuardedRegistry {
    /// The region containing `pc`, if any. Async-signal-safe.
    pub fn lookup(&self, pc: usize) -> Option<&GuardedRegion> {
        let index = self.regions.partition_point(|r| r.start <= pc);
        let candidate = self.regions.get(index.checked_sub(1)?)?;
        candidate.contains(pc).then_some(candidate)
    }

    /// The landing address for `pc`, if it lies in a guarded region
    pub fn redirect(&self, pc: usize) -> Option<usize> {
        self.lookup(pc).map(|r| r.landing)
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the registry holds no regions
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in address order
    pub fn iter(&self) -> impl Iterator<Item = &GuardedRegion> {
        self.regions.iter()
    }

    /// The region registered under `name`
    pub fn find(&self, name: &str) -> Option<&GuardedRegion> {
        self.regions.iter().find(|r| r.name == name)
    }
}

/// Global registry instance
static REGISTRY: Once<GuardedRegistry> = Once::new();

/// Publishes `registry` as the one the signal handler consults.
///
/// Callers that add regions beyond the platform set must do so before the
/// first [`install_handler`](crate::install_handler).
///
/// # Errors
///
/// [`Error::RegistryFrozen`] if a registry was already published.
pub fn install_registry(registry: GuardedRegistry) -> Result<()> {
    let mut published = false;
    REGISTRY.call_once(|| {
        published = true;
        registry
    });

    if published {
        sys_debug!(
            "guarded-region registry frozen with {} regions",
            REGISTRY.get().map_or(0, GuardedRegistry::len)
        );
        Ok(())
    } else {
        Err(Error::RegistryFrozen)
    }
}

/// Publishes the platform registry unless one is already published
pub fn init() -> Result<()> {
    if REGISTRY.is_completed() {
        return Ok(());
    }
    match install_registry(RegistryBuilder::new().with_platform()?.freeze()) {
        Err(Error::RegistryFrozen) => Ok(()),
        other => other,
    }
}

/// The published registry. Lock-free, async-signal-safe.
pub fn registry() -> Option<&'static GuardedRegistry> {
    REGISTRY.get()
}
