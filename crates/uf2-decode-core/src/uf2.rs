//! UF2 block layout and the block parser.
//!
//! See https://github.com/microsoft/uf2 for the format description. Every block
//! is 512 bytes, little-endian, whatever its payload size.

use std::{fmt, mem};

use assert_into::AssertInto;
use static_assertions::const_assert;
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, byteorder::little_endian::U32};

use crate::source::ByteSource;

pub const UF2_BLOCK_SIZE: usize = 512;
pub const UF2_HEADER_SIZE: usize = 32;
pub const UF2_DATA_SIZE: usize = 476;

pub const UF2_MAGIC_START0: u32 = 0x0A324655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x00002000;
pub const UF2_FLAG_MD5_PRESENT: u32 = 0x00004000;
pub const UF2_FLAG_EXTENSION_TAGS_PRESENT: u32 = 0x00008000;

pub type Uf2BlockData = [u8; UF2_DATA_SIZE];

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Uf2BlockHeader {
    pub magic_start0: U32,
    pub magic_start1: U32,
    pub flags: U32,
    pub target_addr: U32,
    pub payload_size: U32,
    pub block_no: U32,
    pub num_blocks: U32,
    pub file_size: U32, // or familyID
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Uf2BlockFooter {
    pub magic_end: U32,
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawUf2Block {
    header: Uf2BlockHeader,
    data: Uf2BlockData,
    footer: Uf2BlockFooter,
}

const_assert!(mem::size_of::<Uf2BlockHeader>() == UF2_HEADER_SIZE);
const_assert!(mem::size_of::<RawUf2Block>() == UF2_BLOCK_SIZE);

#[derive(Error, Debug)]
pub enum BlockReadError {
    #[error("Truncated block at offset {offset:#x}: only {available} of 512 bytes available")]
    Truncated { offset: u64, available: u64 },
    #[error("Failed to read block: {0}")]
    FailedToRead(std::io::Error),
}

/// One decoded UF2 block.
///
/// Nothing is checked while decoding: magic values and `payload_size` are
/// reported as found, see [`crate::validate`] for scoring them.
#[derive(Clone, PartialEq, Eq)]
pub struct Uf2Block {
    pub magic_start0: u32,
    pub magic_start1: u32,
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    /// File size, or the family ID when [`UF2_FLAG_FAMILY_ID_PRESENT`] is set.
    pub file_size_or_family_id: u32,
    pub data: Uf2BlockData,
    pub magic_end: u32,
}

impl Uf2Block {
    /// Creates a well-formed block carrying `payload` at `target_addr`.
    ///
    /// Returns `None` if the payload does not fit in one block.
    pub fn new(target_addr: u32, payload: &[u8]) -> Option<Self> {
        if payload.len() > UF2_DATA_SIZE {
            return None;
        }

        let mut data: Uf2BlockData = [0; UF2_DATA_SIZE];
        data[..payload.len()].copy_from_slice(payload);

        Some(Self {
            magic_start0: UF2_MAGIC_START0,
            magic_start1: UF2_MAGIC_START1,
            flags: 0,
            target_addr,
            payload_size: payload.len().assert_into(),
            block_no: 0,
            num_blocks: 1,
            file_size_or_family_id: 0,
            data,
            magic_end: UF2_MAGIC_END,
        })
    }

    pub fn with_family_id(mut self, family_id: u32) -> Self {
        self.flags |= UF2_FLAG_FAMILY_ID_PRESENT;
        self.file_size_or_family_id = family_id;
        self
    }

    pub fn with_position(mut self, block_no: u32, num_blocks: u32) -> Self {
        self.block_no = block_no;
        self.num_blocks = num_blocks;
        self
    }

    /// Decodes the block stored in the first 512 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, BlockReadError> {
        let (raw, _) =
            RawUf2Block::read_from_prefix(bytes).map_err(|_| BlockReadError::Truncated {
                offset: 0,
                available: bytes.len().assert_into(),
            })?;

        Ok(Self {
            magic_start0: raw.header.magic_start0.get(),
            magic_start1: raw.header.magic_start1.get(),
            flags: raw.header.flags.get(),
            target_addr: raw.header.target_addr.get(),
            payload_size: raw.header.payload_size.get(),
            block_no: raw.header.block_no.get(),
            num_blocks: raw.header.num_blocks.get(),
            file_size_or_family_id: raw.header.file_size.get(),
            data: raw.data,
            magic_end: raw.footer.magic_end.get(),
        })
    }

    /// Encodes the block into its 512 byte wire form.
    pub fn to_bytes(&self) -> [u8; UF2_BLOCK_SIZE] {
        let raw = RawUf2Block {
            header: Uf2BlockHeader {
                magic_start0: U32::new(self.magic_start0),
                magic_start1: U32::new(self.magic_start1),
                flags: U32::new(self.flags),
                target_addr: U32::new(self.target_addr),
                payload_size: U32::new(self.payload_size),
                block_no: U32::new(self.block_no),
                num_blocks: U32::new(self.num_blocks),
                file_size: U32::new(self.file_size_or_family_id),
            },
            data: self.data,
            footer: Uf2BlockFooter {
                magic_end: U32::new(self.magic_end),
            },
        };

        let mut bytes = [0; UF2_BLOCK_SIZE];
        bytes.copy_from_slice(raw.as_bytes());
        bytes
    }

    pub fn has_family_id(&self) -> bool {
        self.flags & UF2_FLAG_FAMILY_ID_PRESENT != 0
    }

    pub fn family_id(&self) -> Option<u32> {
        self.has_family_id().then_some(self.file_size_or_family_id)
    }

    pub fn file_size(&self) -> Option<u32> {
        (!self.has_family_id()).then_some(self.file_size_or_family_id)
    }

    pub fn is_not_main_flash(&self) -> bool {
        self.flags & UF2_FLAG_NOT_MAIN_FLASH != 0
    }

    pub fn is_file_container(&self) -> bool {
        self.flags & UF2_FLAG_FILE_CONTAINER != 0
    }

    /// Short names of the known flags set on this block.
    pub fn flag_names(&self) -> Vec<&'static str> {
        const NAMES: [(u32, &str); 5] = [
            (UF2_FLAG_NOT_MAIN_FLASH, "noflash"),
            (UF2_FLAG_FILE_CONTAINER, "file"),
            (UF2_FLAG_FAMILY_ID_PRESENT, "family"),
            (UF2_FLAG_MD5_PRESENT, "md5"),
            (UF2_FLAG_EXTENSION_TAGS_PRESENT, "tags"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.flags & flag != 0)
            .map(|&(_, name)| name)
            .collect()
    }

    /// The meaningful part of `data`, or `None` if `payload_size` exceeds the
    /// block's capacity.
    pub fn payload(&self) -> Option<&[u8]> {
        let len: usize = self.payload_size.assert_into();
        self.data.get(..len)
    }
}

impl fmt::Debug for Uf2Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uf2Block")
            .field("magic_start0", &format_args!("{:#010x}", self.magic_start0))
            .field("magic_start1", &format_args!("{:#010x}", self.magic_start1))
            .field("flags", &format_args!("{:#010x}", self.flags))
            .field("target_addr", &format_args!("{:#010x}", self.target_addr))
            .field("payload_size", &self.payload_size)
            .field("block_no", &self.block_no)
            .field("num_blocks", &self.num_blocks)
            .field(
                "file_size_or_family_id",
                &format_args!("{:#010x}", self.file_size_or_family_id),
            )
            .field("magic_end", &format_args!("{:#010x}", self.magic_end))
            .finish_non_exhaustive()
    }
}

/// Reads the block starting at `offset`.
///
/// Holds no cursor: reading the same offset of an unchanged source twice
/// yields equal blocks.
pub fn read_block<S: ByteSource + ?Sized>(
    source: &S,
    offset: u64,
) -> Result<Uf2Block, BlockReadError> {
    let length = source.length().map_err(BlockReadError::FailedToRead)?;
    let available = length.saturating_sub(offset);

    if available < UF2_BLOCK_SIZE as u64 {
        return Err(BlockReadError::Truncated { offset, available });
    }

    let bytes = source
        .read(offset, UF2_BLOCK_SIZE)
        .map_err(BlockReadError::FailedToRead)?;

    Uf2Block::parse(&bytes).map_err(|_| BlockReadError::Truncated {
        offset,
        available: bytes.len().assert_into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Uf2Block {
        let payload: Vec<u8> = (0..=255).collect();
        Uf2Block::new(0x1000_0100, &payload)
            .unwrap()
            .with_family_id(0xe48bff56)
            .with_position(1, 4)
    }

    #[test]
    fn header_fields_are_little_endian_at_fixed_offsets() {
        let bytes = sample_block().to_bytes();

        assert_eq!(&bytes[0..4], &[0x55, 0x46, 0x32, 0x0A]);
        assert_eq!(&bytes[4..8], &[0x57, 0x51, 0x5D, 0x9E]);
        assert_eq!(&bytes[8..12], &0x2000u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0x1000_0100u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &256u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &4u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0xe48bff56u32.to_le_bytes());
        assert_eq!(bytes[32], 0);
        assert_eq!(bytes[32 + 255], 255);
        assert_eq!(&bytes[508..512], &[0x30, 0x6F, 0xB1, 0x0A]);
    }

    #[test]
    fn parse_decodes_every_field() {
        let block = sample_block();
        let parsed = Uf2Block::parse(&block.to_bytes()).unwrap();

        assert_eq!(parsed, block);
        assert_eq!(parsed.family_id(), Some(0xe48bff56));
        assert_eq!(parsed.file_size(), None);
        assert_eq!(parsed.payload().unwrap().len(), 256);
    }

    #[test]
    fn parse_does_not_check_magic_or_size() {
        let mut bytes = sample_block().to_bytes();
        bytes[0..4].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        bytes[16..20].copy_from_slice(&1000u32.to_le_bytes());

        let parsed = Uf2Block::parse(&bytes).unwrap();
        assert_eq!(parsed.magic_start0, 0xdeadbeef);
        assert_eq!(parsed.payload_size, 1000);
        assert_eq!(parsed.payload(), None);
    }

    #[test]
    fn padding_after_payload_is_not_payload() {
        let mut bytes = Uf2Block::new(0, &[1, 2, 3]).unwrap().to_bytes();
        bytes[32 + 3] = 0xaa;

        let parsed = Uf2Block::parse(&bytes).unwrap();
        assert_eq!(parsed.payload().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn read_block_at_offset() {
        let mut file = Vec::new();
        file.extend_from_slice(&Uf2Block::new(0x100, &[1; 16]).unwrap().to_bytes());
        file.extend_from_slice(&sample_block().to_bytes());

        let block = read_block(&file, 512).unwrap();
        assert_eq!(block, sample_block());
    }

    #[test]
    fn read_block_twice_is_identical() {
        let file = sample_block().to_bytes().to_vec();

        let first = read_block(&file, 0).unwrap();
        let second = read_block(&file, 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn read_block_reports_truncation() {
        let file = vec![0u8; 700];

        match read_block(&file, 512) {
            Err(BlockReadError::Truncated { offset, available }) => {
                assert_eq!(offset, 512);
                assert_eq!(available, 188);
            }
            other => panic!("expected truncation, got {:?}", other),
        }

        assert!(matches!(
            read_block(&file, 4096),
            Err(BlockReadError::Truncated { available: 0, .. })
        ));
    }

    #[test]
    fn flag_names_in_bit_order() {
        let mut block = sample_block();
        block.flags = UF2_FLAG_EXTENSION_TAGS_PRESENT
            | UF2_FLAG_FAMILY_ID_PRESENT
            | UF2_FLAG_FILE_CONTAINER
            | 0x10;

        assert!(block.is_file_container());
        assert!(!block.is_not_main_flash());
        assert_eq!(block.flag_names(), ["file", "family", "tags"]);

        block.flags = UF2_FLAG_NOT_MAIN_FLASH | UF2_FLAG_MD5_PRESENT;
        assert_eq!(block.flag_names(), ["noflash", "md5"]);
    }

    #[test]
    fn new_rejects_oversized_payload() {
        assert!(Uf2Block::new(0, &[0; UF2_DATA_SIZE]).is_some());
        assert!(Uf2Block::new(0, &[0; UF2_DATA_SIZE + 1]).is_none());
    }
}
