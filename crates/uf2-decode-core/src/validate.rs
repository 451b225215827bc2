//! Scores how much a block looks like the start of a UF2 file.

use std::fmt;

use log::debug;

use crate::{
    families::{self, Family},
    uf2::{UF2_MAGIC_END, UF2_MAGIC_START0, UF2_MAGIC_START1, Uf2Block},
};

pub const MAX_CONFIDENCE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
}

/// Processor profile a decoded image is meant to be analysed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    pub processor: &'static str,
    pub endianness: Endianness,
    pub address_size: u8,
    pub variant: &'static str,
}

/// UF2 has no architecture field, so every image is treated as 32-bit
/// little-endian Arm Cortex. This also covers the non-Arm families in the
/// table; they get no better guess.
pub const UF2_ARCHITECTURE: Architecture = Architecture {
    processor: "ARM",
    endianness: Endianness::Little,
    address_size: 32,
    variant: "Cortex",
};

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endianness = match self.endianness {
            Endianness::Little => "LE",
        };
        write!(
            f,
            "{}:{}:{}:{}",
            self.processor, endianness, self.address_size, self.variant
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Number of magic values that matched, `0..=MAX_CONFIDENCE`.
    pub score: u8,
    /// Raw family ID, when the family flag is set on an accepted block.
    pub family_id: Option<u32>,
    /// `family_id` resolved against the family table.
    pub family: Option<&'static Family>,
    pub architecture: Architecture,
}

impl Validation {
    /// Any matching magic is enough; partially corrupted leading blocks are
    /// still worth loading.
    pub fn is_accepted(&self) -> bool {
        self.score > 0
    }
}

pub fn confidence(block: &Uf2Block) -> u8 {
    let mut score = 0;

    if block.magic_start0 == UF2_MAGIC_START0 {
        debug!("first magic matches");
        score += 1;
    }
    if block.magic_start1 == UF2_MAGIC_START1 {
        debug!("second magic matches");
        score += 1;
    }
    if block.magic_end == UF2_MAGIC_END {
        debug!("final magic matches");
        score += 1;
    }

    score
}

/// Validates the first block of a candidate file.
pub fn validate(block: &Uf2Block) -> Validation {
    let score = confidence(block);

    let family_id = if score > 0 { block.family_id() } else { None };

    Validation {
        score,
        family_id,
        family: family_id.and_then(families::lookup),
        architecture: UF2_ARCHITECTURE,
    }
}
