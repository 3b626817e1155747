//! ESP32-S2 ADC calibration fields.
//!
//! The ESP32-S2 stores its ADC calibration in the RTC calibration table of
//! block 2. Each entry is a sign-magnitude offset which is scaled and added
//! to a base value and, for version 2 data, to the decoded value of another
//! entry it depends on.
//!
//! Version 1 stores the raw readings at 250 mV and at the attenuation's
//! nominal high voltage. Version 2 only stores the high reading, plus the
//! initial offset codes for the ADC's own calibration.

use super::{Efuse, EfuseBlock, EfuseBlocks, EfuseField};
use crate::adc::{AdcUnit, Attenuation, CalibrationEfuse, ReferencePoint, ATTENUATION_COUNT};

/// `[]` BLK_VERSION_MAJOR
pub const BLK_VERSION_MAJOR: EfuseField = EfuseField::new(EfuseBlock::Block1, 121, 2);
/// `[]` BLK_VERSION_MINOR of BLOCK2 {0: "No calib"; 1: "ADC calib V1"; 2: "ADC calib V2"}
pub const BLK_VERSION_MINOR: EfuseField = EfuseField::new(EfuseBlock::Block2, 132, 3);

/// Tag of the temperature sensor calibration entry.
pub const TAG_TEMP_SENSOR: usize = 33;

/// Parameters stored in the RTC calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcCalibParam {
    /// Version 1 reading at 250 mV.
    V1Low,
    /// Version 1 reading at the nominal high voltage.
    V1High,
    /// Version 2 reading at the nominal high voltage.
    V2High,
    /// Version 2 initial offset code.
    V2Init,
}

impl RtcCalibParam {
    const fn first_tag(self) -> usize {
        match self {
            RtcCalibParam::V1Low => 1,
            RtcCalibParam::V1High => 9,
            RtcCalibParam::V2High => 17,
            RtcCalibParam::V2Init => 25,
        }
    }

    const fn version(self) -> u8 {
        match self {
            RtcCalibParam::V1Low | RtcCalibParam::V1High => 1,
            RtcCalibParam::V2High | RtcCalibParam::V2Init => 2,
        }
    }
}

/// An entry of the RTC calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RtcCalibEntry {
    /// Where the raw offset is stored.
    pub field: EfuseField,
    /// Scale of the raw offset.
    pub multiplier: i32,
    /// Value the scaled offset is added to.
    pub base: i32,
    /// Tag of the entry whose decoded value is added as well, `0` for none.
    pub dependency: usize,
}

const fn entry(bit_start: u16, bit_count: u16, multiplier: i32, base: i32, dependency: usize) -> RtcCalibEntry {
    RtcCalibEntry {
        field: EfuseField::new(EfuseBlock::Block2, bit_start, bit_count),
        multiplier,
        base,
        dependency,
    }
}

/// The RTC calibration table, indexed by tag. Tag 0 is a placeholder that
/// always decodes to zero.
#[rustfmt::skip]
pub const RTC_CALIB_TABLE: [RtcCalibEntry; 34] = [
    entry(0, 0, 0, 0, 0),
    // version 1, low reference
    entry(208, 6, 4, 2231, 0),
    entry(214, 6, 4, 1643, 0),
    entry(220, 6, 4, 1290, 0),
    entry(226, 6, 4, 701, 0),
    entry(232, 6, 4, 2305, 0),
    entry(238, 6, 4, 1693, 0),
    entry(244, 6, 4, 1343, 0),
    entry(250, 6, 4, 723, 0),
    // version 1, high reference
    entry(144, 8, 4, 5775, 0),
    entry(152, 8, 4, 5693, 0),
    entry(160, 8, 4, 5723, 0),
    entry(168, 8, 4, 6209, 0),
    entry(176, 8, 4, 5817, 0),
    entry(184, 8, 4, 5703, 0),
    entry(192, 8, 4, 5731, 0),
    entry(200, 8, 4, 6157, 0),
    // version 2, high reference
    entry(197, 6, 2, 169, 19),
    entry(203, 6, 2, -26, 19),
    entry(209, 9, 2, 126, 22),
    entry(218, 7, 2, 387, 19),
    entry(225, 7, 2, 177, 22),
    entry(232, 10, 2, 5815, 0),
    entry(242, 7, 2, 27, 22),
    entry(249, 7, 2, 410, 22),
    // version 2, initial code
    entry(147, 8, 2, 1519, 0),
    entry(155, 6, 2, 88, 25),
    entry(161, 5, 2, 8, 26),
    entry(166, 6, 2, 70, 27),
    entry(172, 8, 2, 1677, 0),
    entry(180, 6, 2, 23, 29),
    entry(186, 5, 2, 6, 30),
    entry(191, 6, 2, 13, 31),
    // temperature sensor
    entry(135, 9, 1, 0, 0),
];

/// ADC calibration decoder for the ESP32-S2.
#[derive(Debug, Clone, Copy)]
pub struct AdcCalibration<B> {
    efuse: Efuse<B>,
}

impl<B> AdcCalibration<B>
where
    B: EfuseBlocks,
{
    /// Creates a decoder reading from `blocks`.
    pub const fn new(blocks: B) -> Self {
        Self {
            efuse: Efuse::new(blocks),
        }
    }

    /// Get efuse block version as `(major, minor)`.
    ///
    /// The minor version is the ADC calibration version.
    pub fn block_version(&self) -> (u8, u8) {
        (
            self.efuse.read_field_le::<u8>(BLK_VERSION_MAJOR),
            self.efuse.read_field_le::<u8>(BLK_VERSION_MINOR),
        )
    }

    /// The table tag of `param` for the given unit and attenuation, or
    /// `None` if `param` doesn't exist in `version`.
    pub fn tag(
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
        param: RtcCalibParam,
    ) -> Option<usize> {
        if param.version() != version {
            return None;
        }

        Some(param.first_tag() + unit.index() * ATTENUATION_COUNT + atten as usize)
    }

    /// The raw, signed offset stored for `tag`.
    pub fn raw_value(&self, tag: usize) -> i32 {
        match RTC_CALIB_TABLE.get(tag) {
            Some(entry) if tag != 0 => self.efuse.read_signed(entry.field),
            _ => 0,
        }
    }

    /// The decoded value of `tag`: the scaled offset plus the base plus the
    /// decoded value of the dependency.
    pub fn parsed_value(&self, tag: usize) -> i32 {
        let mut value = 0;
        let mut tag = tag;

        while let Some(entry) = RTC_CALIB_TABLE.get(tag).filter(|_| tag != 0) {
            value += self.raw_value(tag) * entry.multiplier + entry.base;
            tag = entry.dependency;
        }

        value
    }

    /// The version 2 initial offset code of the ADC, used to seed its
    /// self-calibration.
    pub fn init_code(&self, unit: AdcUnit, atten: Attenuation) -> Option<u32> {
        let version = self.calibration_version();
        let tag = Self::tag(version, unit, atten, RtcCalibParam::V2Init)?;

        u32::try_from(self.parsed_value(tag)).ok()
    }
}

impl<B> CalibrationEfuse for AdcCalibration<B>
where
    B: EfuseBlocks,
{
    fn calibration_version(&self) -> u8 {
        self.block_version().1
    }

    fn reference_point(
        &self,
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<ReferencePoint> {
        let read = |param| {
            let tag = Self::tag(version, unit, atten, param)?;
            u32::try_from(self.parsed_value(tag)).ok()
        };

        match version {
            1 => Some(ReferencePoint::TwoPoint {
                high: read(RtcCalibParam::V1High)?,
                low: read(RtcCalibParam::V1Low)?,
            }),
            2 => Some(ReferencePoint::Single {
                voltage_mv: atten.nominal_high_voltage(),
                reading: read(RtcCalibParam::V2High)?,
            }),
            _ => None,
        }
    }
}
