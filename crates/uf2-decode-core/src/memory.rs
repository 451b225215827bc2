//! Where decoded regions end up.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::region::MemoryRegion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Region {start:#010x}..{end:#010x} conflicts with existing region {existing_start:#010x}..{existing_end:#010x}"
)]
pub struct MemoryConflictError {
    pub start: u32,
    pub end: u64,
    pub existing_start: u32,
    pub existing_end: u64,
}

impl MemoryConflictError {
    fn new(region: &MemoryRegion, existing: &MemoryRegion) -> Self {
        Self {
            start: region.start(),
            end: region.end(),
            existing_start: existing.start(),
            existing_end: existing.end(),
        }
    }
}

/// Receives decoded regions, in order, and materializes them in its own
/// memory model.
pub trait MemoryLoader {
    fn load_region(&mut self, region: MemoryRegion) -> Result<(), MemoryConflictError>;
}

/// A sparse memory image keyed by start address.
///
/// Overlapping regions are refused. With `join_adjacent` a region that starts
/// where another ends is folded into it.
#[derive(Debug, Default)]
pub struct MemoryMap {
    regions: BTreeMap<u32, MemoryRegion>,
    join_adjacent: bool,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joining_adjacent() -> Self {
        Self {
            regions: BTreeMap::new(),
            join_adjacent: true,
        }
    }

    pub fn insert(&mut self, region: MemoryRegion) -> Result<(), MemoryConflictError> {
        if region.is_empty() {
            return Ok(());
        }

        if let Some((_, prev)) = self.regions.range(..=region.start()).next_back() {
            if prev.overlaps(&region) {
                return Err(MemoryConflictError::new(&region, prev));
            }
        }
        if let Some((_, next)) = self.regions.range(region.start()..).next() {
            if next.overlaps(&region) {
                return Err(MemoryConflictError::new(&region, next));
            }
        }

        let mut region = region;
        if self.join_adjacent {
            let next = u32::try_from(region.end())
                .ok()
                .and_then(|end| self.regions.remove(&end));
            if let Some(next) = next {
                region.join(next);
            }

            let prev_start = self
                .regions
                .range(..region.start())
                .next_back()
                .filter(|(_, prev)| prev.end() == u64::from(region.start()))
                .map(|(start, _)| *start);
            if let Some(mut prev) = prev_start.and_then(|start| self.regions.remove(&start)) {
                prev.join(region);
                region = prev;
            }
        }

        self.regions.insert(region.start(), region);
        Ok(())
    }

    /// Bytes `addr..addr + len`, if they lie within one region.
    pub fn read(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let (_, region) = self.regions.range(..=addr).next_back()?;
        region.read(addr, len)
    }

    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.values()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.regions.values().map(|region| region.len() as u64).sum()
    }
}

impl MemoryLoader for MemoryMap {
    fn load_region(&mut self, region: MemoryRegion) -> Result<(), MemoryConflictError> {
        self.insert(region)
    }
}
