//! Rebuilds contiguous memory regions from blocks in file order.
//!
//! Blocks are taken in the order they appear in the file. `block_no` and
//! `num_blocks` are not used for sequencing, so a file whose blocks are out of
//! address order simply yields more regions.

use log::warn;
use thiserror::Error;

use crate::{
    region::{ADDRESS_SPACE_END, MemoryRegion},
    uf2::Uf2Block,
};

/// A block that could not be placed.
///
/// Both variants drop the offending block and finalize the region that was
/// open when it arrived; that region travels in `closed`.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error(
        "Block at {target_addr:#010x} with a {payload_size} byte payload overflows the 32-bit address space"
    )]
    AddressOverflow {
        target_addr: u32,
        payload_size: u32,
        closed: Option<MemoryRegion>,
    },
    #[error("Block at {target_addr:#010x} declares {payload_size} payload bytes, at most 476 fit")]
    PayloadTooLarge {
        target_addr: u32,
        payload_size: u32,
        closed: Option<MemoryRegion>,
    },
}

impl AssembleError {
    pub fn take_closed(&mut self) -> Option<MemoryRegion> {
        match self {
            Self::AddressOverflow { closed, .. } | Self::PayloadTooLarge { closed, .. } => {
                closed.take()
            }
        }
    }
}

/// Merges address-contiguous blocks into regions.
///
/// The only state is the region currently being extended.
#[derive(Debug, Default)]
pub struct MemoryAssembler {
    open: Option<MemoryRegion>,
}

impl MemoryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the next block in file order.
    ///
    /// Returns the region this block closed, if it did not continue the open
    /// one. Zero-length payloads are transparent: they neither open, extend
    /// nor close a region.
    pub fn push(&mut self, block: &Uf2Block) -> Result<Option<MemoryRegion>, AssembleError> {
        let Some(payload) = block.payload() else {
            return Err(AssembleError::PayloadTooLarge {
                target_addr: block.target_addr,
                payload_size: block.payload_size,
                closed: self.open.take(),
            });
        };

        let target_addr = u64::from(block.target_addr);
        if target_addr + payload.len() as u64 > ADDRESS_SPACE_END {
            return Err(AssembleError::AddressOverflow {
                target_addr: block.target_addr,
                payload_size: block.payload_size,
                closed: self.open.take(),
            });
        }

        if payload.is_empty() {
            return Ok(None);
        }

        if let Some(region) = self.open.as_mut() {
            if region.end() == target_addr {
                region.append(payload);
                return Ok(None);
            }
        }

        let mut region = MemoryRegion::new(block.target_addr);
        region.append(payload);
        Ok(self.open.replace(region))
    }

    /// Like [`push`](Self::push), but collects every finalized region into
    /// `regions`, including one closed by a rejected block.
    pub fn push_into(
        &mut self,
        block: &Uf2Block,
        regions: &mut Vec<MemoryRegion>,
    ) -> Result<(), AssembleError> {
        match self.push(block) {
            Ok(closed) => {
                regions.extend(closed);
                Ok(())
            }
            Err(mut err) => {
                regions.extend(err.take_closed());
                Err(err)
            }
        }
    }

    /// Finalizes the open region.
    pub fn finish(self) -> Option<MemoryRegion> {
        self.open
    }
}

/// Assembles a whole sequence of blocks, dropping the ones that cannot be
/// placed.
pub fn assemble<'a>(blocks: impl IntoIterator<Item = &'a Uf2Block>) -> Vec<MemoryRegion> {
    let mut assembler = MemoryAssembler::new();
    let mut regions = Vec::new();

    for block in blocks {
        if let Err(err) = assembler.push_into(block, &mut regions) {
            warn!("Dropping block {}: {}", block.block_no, err);
        }
    }

    regions.extend(assembler.finish());
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(target_addr: u32, len: usize, fill: u8) -> Uf2Block {
        Uf2Block::new(target_addr, &vec![fill; len]).unwrap()
    }

    #[test]
    fn contiguous_blocks_merge_into_one_region() {
        let blocks: Vec<Uf2Block> = (0..8u8)
            .map(|i| block(0x1000_0000 + u32::from(i) * 256, 256, i))
            .collect();

        let regions = assemble(&blocks);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start(), 0x1000_0000);
        assert_eq!(regions[0].len(), 8 * 256);

        let expected: Vec<u8> = (0..8u8).flat_map(|i| [i; 256]).collect();
        assert_eq!(regions[0].bytes(), expected.as_slice());
    }

    #[test]
    fn gap_splits_regions() {
        let blocks = [block(0x100, 16, 1), block(0x100 + 16 + 1, 16, 2)];

        let regions = assemble(&blocks);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].start(), 0x100);
        assert_eq!(regions[1].start(), 0x111);
    }

    #[test]
    fn overlap_and_backwards_blocks_open_new_regions() {
        let blocks = [
            block(0x200, 16, 1),
            block(0x208, 16, 2),
            block(0x100, 16, 3),
            block(0x110, 16, 4),
        ];

        let regions = assemble(&blocks);
        let starts: Vec<u32> = regions.iter().map(MemoryRegion::start).collect();
        assert_eq!(starts, vec![0x200, 0x208, 0x100]);
        assert_eq!(regions[2].len(), 32);
    }

    #[test]
    fn block_numbers_are_ignored() {
        let blocks = [
            block(0x100, 16, 1).with_position(5, 2),
            block(0x110, 16, 2).with_position(5, 2),
        ];

        assert_eq!(assemble(&blocks).len(), 1);
    }

    #[test]
    fn zero_length_block_keeps_region_open() {
        let blocks = [block(0x100, 16, 1), block(0x5000, 0, 0), block(0x110, 16, 2)];

        let regions = assemble(&blocks);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 32);
    }

    #[test]
    fn zero_length_blocks_alone_produce_nothing() {
        assert!(assemble(&[block(0x100, 0, 0), block(0x100, 0, 0)]).is_empty());
    }

    #[test]
    fn overflow_drops_block_and_keeps_previous_region() {
        let good = [block(0x100, 16, 1), block(0x110, 16, 2)];
        let expected = assemble(&good);

        let blocks = [
            good[0].clone(),
            good[1].clone(),
            block(0xffff_fff0, 32, 3),
            block(0x400, 16, 4),
        ];

        let regions = assemble(&blocks);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], expected[0]);
        assert_eq!(regions[1].start(), 0x400);
    }

    #[test]
    fn overflow_reports_the_closed_region() {
        let mut assembler = MemoryAssembler::new();
        assert!(assembler.push(&block(0x100, 16, 1)).unwrap().is_none());

        let err = assembler.push(&block(0xffff_ff00, 0x101, 2)).unwrap_err();
        match err {
            AssembleError::AddressOverflow { closed, .. } => {
                assert_eq!(closed.unwrap().start(), 0x100);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
        assert!(assembler.finish().is_none());
    }

    #[test]
    fn payload_reaching_top_of_address_space_is_accepted() {
        let regions = assemble(&[block(0xffff_ff00, 256, 1)]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].end(), ADDRESS_SPACE_END);
    }

    #[test]
    fn oversized_payload_is_dropped() {
        let mut bad = block(0x110, 16, 2);
        bad.payload_size = 477;

        let regions = assemble(&[block(0x100, 16, 1), bad, block(0x110, 16, 3)]);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].len(), 16);
        assert_eq!(regions[1].start(), 0x110);
        assert_eq!(regions[1].bytes(), &[3; 16]);
    }

    #[test]
    fn push_returns_closed_region() {
        let mut assembler = MemoryAssembler::new();

        assert!(assembler.push(&block(0x100, 4, 1)).unwrap().is_none());
        assert!(assembler.push(&block(0x104, 4, 1)).unwrap().is_none());
        let closed = assembler.push(&block(0x200, 4, 2)).unwrap().unwrap();
        assert_eq!(closed.start(), 0x100);
        assert_eq!(closed.len(), 8);
        assert_eq!(assembler.finish().unwrap().start(), 0x200);
    }
}
