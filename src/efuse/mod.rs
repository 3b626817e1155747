//! # Reading calibration data from eFuse
//!
//! ## Overview
//!
//! eFuse is one-time programmable memory organized in blocks of 32-bit
//! words. Calibration values are bit fields which may start anywhere inside
//! a block and may straddle word boundaries.
//!
//! Access to the words goes through the [EfuseBlocks] trait so the same
//! decoders work against the eFuse controller on the device and against an
//! [EfuseImage] dumped from a device or built in a test.
//!
//! The chip modules ([esp32s2], [esp32s3]) contain the field tables and
//! implement [crate::adc::CalibrationEfuse] on top of them.

use bytemuck::Pod;

pub mod esp32s2;
pub mod esp32s3;

/// Number of 32-bit words per eFuse block.
pub const BLOCK_WORDS: usize = 8;

/// An eFuse block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EfuseBlock {
    Block0,
    Block1,
    Block2,
    Block3,
    Block4,
    Block5,
    Block6,
    Block7,
    Block8,
    Block9,
    Block10,
}

impl EfuseBlock {
    /// Number of blocks.
    pub const COUNT: usize = 11;
}

/// A bit field inside an eFuse block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EfuseField {
    pub(crate) block: EfuseBlock,
    pub(crate) bit_start: u16,
    pub(crate) bit_count: u16,
}

impl EfuseField {
    /// Creates a field of `bit_count` bits starting at `bit_start` of `block`.
    pub const fn new(block: EfuseBlock, bit_start: u16, bit_count: u16) -> Self {
        Self {
            block,
            bit_start,
            bit_count,
        }
    }

    /// Width of the field in bits.
    pub const fn bit_count(&self) -> u16 {
        self.bit_count
    }
}

/// Word level access to eFuse blocks.
pub trait EfuseBlocks {
    /// Reads word `word` of `block`. Words past the end of a block read as
    /// zero.
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32;
}

impl<T> EfuseBlocks for &T
where
    T: EfuseBlocks + ?Sized,
{
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32 {
        (**self).read_word(block, word)
    }
}

/// Typed field access on top of [EfuseBlocks].
#[derive(Debug, Clone, Copy)]
pub struct Efuse<B> {
    blocks: B,
}

impl<B> Efuse<B>
where
    B: EfuseBlocks,
{
    /// Wraps a word source.
    pub const fn new(blocks: B) -> Self {
        Self { blocks }
    }

    /// Read field value in a little-endian order
    ///
    /// Bits beyond the field (or beyond the size of `T`) are zero.
    pub fn read_field_le<T: Pod>(&self, field: EfuseField) -> T {
        let EfuseField {
            block,
            bit_start,
            bit_count,
        } = field;

        let mut output = T::zeroed();
        let mut bytes = bytemuck::bytes_of_mut(&mut output);

        let bit_off = bit_start as usize;
        let bit_end = core::cmp::min(bit_count as usize, bytes.len() * 8) + bit_off;

        let word_bit_off = bit_off % 32;
        let mut word_off = bit_off / 32;

        for bit_off in (bit_off..bit_end).step_by(32) {
            let mut word = self.blocks.read_word(block, word_off) >> word_bit_off;
            word_off += 1;

            let word_bit_len = core::cmp::min(bit_end - bit_off, 32);
            if word_bit_len > 32 - word_bit_off {
                // Append bits from the beginning of the next word:
                word |= self.blocks.read_word(block, word_off) << (32 - word_bit_off);
            }

            if word_bit_len < 32 {
                word &= u32::MAX >> (32 - word_bit_len);
            }

            let byte_len = word_bit_len.div_ceil(8);
            bytes[..byte_len].copy_from_slice(&word.to_le_bytes()[..byte_len]);
            bytes = &mut bytes[byte_len..];
        }

        output
    }

    /// Read bit value.
    ///
    /// # Panics
    ///
    /// If `field` is wider than one bit.
    pub fn read_bit(&self, field: EfuseField) -> bool {
        assert_eq!(field.bit_count, 1);
        self.read_field_le::<u8>(field) != 0
    }

    /// Reads a field stored as sign and magnitude, the top bit being the
    /// sign.
    pub fn read_signed(&self, field: EfuseField) -> i32 {
        sign_magnitude(self.read_field_le::<u32>(field), field.bit_count)
    }
}

/// Decodes a `bit_count` wide sign-magnitude number.
pub fn sign_magnitude(raw: u32, bit_count: u16) -> i32 {
    if bit_count == 0 {
        return 0;
    }

    let sign_bit = 1u32 << (bit_count - 1);
    if raw & sign_bit != 0 {
        -((raw & !sign_bit) as i32)
    } else {
        raw as i32
    }
}

/// An in-memory copy of the eFuse blocks.
///
/// Useful for replaying a dump read from a device and for building
/// calibration data field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EfuseImage {
    words: [[u32; BLOCK_WORDS]; EfuseBlock::COUNT],
}

impl Default for EfuseImage {
    fn default() -> Self {
        Self::new()
    }
}

impl EfuseImage {
    /// An image with every bit cleared.
    pub const fn new() -> Self {
        Self {
            words: [[0; BLOCK_WORDS]; EfuseBlock::COUNT],
        }
    }

    /// An image of a single block, e.g. a dump of the calibration block.
    pub const fn with_block(mut self, block: EfuseBlock, words: [u32; BLOCK_WORDS]) -> Self {
        self.words[block as usize] = words;
        self
    }

    /// Burns the low `field.bit_count()` bits of `value` into `field`.
    ///
    /// Like real eFuse, bits can only be set: bits already set in the field
    /// stay set.
    pub fn with_field(mut self, field: EfuseField, value: u32) -> Self {
        self.burn(field, value);
        self
    }

    /// Burns `value` into `field`, see [EfuseImage::with_field].
    pub fn burn(&mut self, field: EfuseField, value: u32) {
        let block = &mut self.words[field.block as usize];

        for bit in 0..core::cmp::min(field.bit_count as usize, 32) {
            if value & (1 << bit) == 0 {
                continue;
            }

            let pos = field.bit_start as usize + bit;
            if let Some(word) = block.get_mut(pos / 32) {
                *word |= 1 << (pos % 32);
            }
        }
    }

    /// The words of `block`.
    pub fn block(&self, block: EfuseBlock) -> &[u32; BLOCK_WORDS] {
        &self.words[block as usize]
    }
}

impl EfuseBlocks for EfuseImage {
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32 {
        self.words[block as usize].get(word).copied().unwrap_or(0)
    }
}
