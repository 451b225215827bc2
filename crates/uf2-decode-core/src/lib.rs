//! This is the backend library logic for uf2-decode.
//!
//! It recognizes UF2 firmware containers and rebuilds the memory image they
//! describe as a list of contiguous regions, ready to be handed to whatever
//! memory model the caller keeps (see [`memory::MemoryLoader`]).
//!
//! See https://github.com/microsoft/uf2 for the format itself.

use std::io;

use log::*;
use thiserror::Error;

use crate::{
    assemble::{AssembleError, MemoryAssembler},
    families::Family,
    memory::{MemoryConflictError, MemoryLoader},
    monitor::DecodeMonitor,
    region::MemoryRegion,
    source::ByteSource,
    uf2::{BlockReadError, UF2_BLOCK_SIZE, Uf2Block, read_block},
    validate::{Architecture, MAX_CONFIDENCE, Validation, validate},
};

pub mod assemble;
pub mod families;
pub mod memory;
pub mod monitor;
pub mod region;
pub mod source;
pub mod uf2;
pub mod validate;

#[derive(Error, Debug)]
pub enum Uf2LoadError {
    #[error("Failed to read input: {0}")]
    FailedToRead(io::Error),
    #[error("The input is not a UF2 file")]
    NotUf2,
    #[error("Failed to load memory region: {source}")]
    MemoryConflict {
        source: MemoryConflictError,
        /// What was decoded and loaded before the conflict.
        report: Box<LoadReport>,
    },
}

/// Which blocks take part in assembly. The default keeps every block.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Only keep blocks tagged with this family. Blocks without a family ID are
    /// always kept.
    pub family_id: Option<u32>,
    /// Drop blocks flagged as not belonging to main flash.
    pub ignore_not_main_flash: bool,
}

impl DecodeOptions {
    fn filter(&self, block: &Uf2Block) -> Option<SkipReason> {
        if self.ignore_not_main_flash && block.is_not_main_flash() {
            return Some(SkipReason::NotMainFlash);
        }

        match (self.family_id, block.family_id()) {
            (Some(wanted), Some(found)) if wanted != found => Some(SkipReason::OtherFamily(found)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Truncated,
    ReadFailed,
    AddressOverflow,
    PayloadTooLarge,
    NotMainFlash,
    OtherFamily(u32),
}

impl From<&BlockReadError> for SkipReason {
    fn from(err: &BlockReadError) -> Self {
        match err {
            BlockReadError::Truncated { .. } => Self::Truncated,
            BlockReadError::FailedToRead(_) => Self::ReadFailed,
        }
    }
}

impl From<&AssembleError> for SkipReason {
    fn from(err: &AssembleError) -> Self {
        match err {
            AssembleError::AddressOverflow { .. } => Self::AddressOverflow,
            AssembleError::PayloadTooLarge { .. } => Self::PayloadTooLarge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedBlock {
    /// Position of the block in the file, counted in 512 byte blocks.
    pub index: u64,
    pub offset: u64,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct DecodedImage {
    pub validation: Validation,
    /// Contiguity-merged regions, in the order their first block appeared.
    pub regions: Vec<MemoryRegion>,
    pub skipped: Vec<SkippedBlock>,
    pub cancelled: bool,
}

impl DecodedImage {
    pub fn family(&self) -> Option<&'static Family> {
        self.validation.family
    }

    pub fn architecture(&self) -> Architecture {
        self.validation.architecture
    }
}

#[derive(Debug)]
pub struct LoadReport {
    pub validation: Validation,
    pub regions_loaded: usize,
    pub bytes_loaded: u64,
    pub skipped: Vec<SkippedBlock>,
    pub cancelled: bool,
}

/// Checks whether `source` looks like a UF2 file.
///
/// Returns `Ok(None)` when it does not, including when it is too short to hold
/// a single block. Only failing to read the first block is an error.
pub fn probe<S: ByteSource + ?Sized>(source: &S) -> Result<Option<Validation>, Uf2LoadError> {
    let length = source.length().map_err(Uf2LoadError::FailedToRead)?;
    if length < UF2_BLOCK_SIZE as u64 {
        debug!("Input is {} bytes, too short for a UF2 block", length);
        return Ok(None);
    }

    let block = match read_block(source, 0) {
        Ok(block) => block,
        Err(BlockReadError::Truncated { .. }) => return Ok(None),
        Err(BlockReadError::FailedToRead(err)) => return Err(Uf2LoadError::FailedToRead(err)),
    };
    debug!("First block: {:?}", block);

    let validation = validate(&block);
    if !validation.is_accepted() {
        debug!("No UF2 magic in first block");
        return Ok(None);
    }

    info!(
        "UF2 loader can try to load this (confidence {}/{})",
        validation.score, MAX_CONFIDENCE
    );
    match (validation.family, validation.family_id) {
        (Some(family), _) => info!("Board might be a {}", family.name),
        (None, Some(id)) => info!("Unknown UF2 family {:#010x}", id),
        (None, None) => {}
    }

    Ok(Some(validation))
}

/// Decodes every block of `source`, in file order, into memory regions.
///
/// Blocks that cannot be read or placed are skipped and listed in
/// [`DecodedImage::skipped`]; they never abort the decode.
pub fn decode<S: ByteSource + ?Sized>(
    source: &S,
    options: &DecodeOptions,
    monitor: &mut dyn DecodeMonitor,
) -> Result<DecodedImage, Uf2LoadError> {
    let validation = probe(source)?.ok_or(Uf2LoadError::NotUf2)?;

    let length = source.length().map_err(Uf2LoadError::FailedToRead)?;
    let block_size = UF2_BLOCK_SIZE as u64;
    let total_blocks = length.div_ceil(block_size);

    let mut assembler = MemoryAssembler::new();
    let mut regions = Vec::new();
    let mut skipped = Vec::new();
    let mut cancelled = false;

    monitor.start(total_blocks);

    for index in 0..total_blocks {
        if monitor.is_cancelled() {
            info!("Decoding cancelled after {} of {} blocks", index, total_blocks);
            cancelled = true;
            break;
        }

        let offset = index * block_size;
        let mut skip = |reason: SkipReason| {
            skipped.push(SkippedBlock {
                index,
                offset,
                reason,
            })
        };

        match read_block(source, offset) {
            Ok(block) => {
                trace!(
                    "Block {} / {} {:#010x} ({} bytes)",
                    block.block_no, block.num_blocks, block.target_addr, block.payload_size
                );

                if let Some(reason) = options.filter(&block) {
                    debug!("Skipping block {} at {:#x}: {:?}", index, offset, reason);
                    skip(reason);
                } else if let Err(err) = assembler.push_into(&block, &mut regions) {
                    warn!("Dropping block {} at {:#x}: {}", index, offset, err);
                    skip(SkipReason::from(&err));
                }
            }
            Err(err) => {
                warn!("Skipping block {} at {:#x}: {}", index, offset, err);
                skip(SkipReason::from(&err));
            }
        }

        monitor.advance(1);
    }

    regions.extend(assembler.finish());
    monitor.finish();

    debug!(
        "Decoded {} regions, skipped {} blocks",
        regions.len(),
        skipped.len()
    );

    Ok(DecodedImage {
        validation,
        regions,
        skipped,
        cancelled,
    })
}

/// Decodes `source` and hands each region, in order, to `loader`.
///
/// The first conflict reported by the loader stops the load; regions already
/// handed over stay where they are, and the error carries the partial report.
pub fn load<S, L>(
    source: &S,
    options: &DecodeOptions,
    loader: &mut L,
    monitor: &mut dyn DecodeMonitor,
) -> Result<LoadReport, Uf2LoadError>
where
    S: ByteSource + ?Sized,
    L: MemoryLoader + ?Sized,
{
    let DecodedImage {
        validation,
        regions,
        skipped,
        cancelled,
    } = decode(source, options, monitor)?;

    let mut regions_loaded = 0;
    let mut bytes_loaded = 0;

    for region in regions {
        debug!("Loading {:?}", region);
        let len = region.len() as u64;

        if let Err(err) = loader.load_region(region) {
            error!("{}", err);
            return Err(Uf2LoadError::MemoryConflict {
                source: err,
                report: Box::new(LoadReport {
                    validation,
                    regions_loaded,
                    bytes_loaded,
                    skipped,
                    cancelled,
                }),
            });
        }

        regions_loaded += 1;
        bytes_loaded += len;
    }

    Ok(LoadReport {
        validation,
        regions_loaded,
        bytes_loaded,
        skipped,
        cancelled,
    })
}
