//! # Analog to Digital Converter (ADC) calibration
//!
//! ## Overview
//!
//! Every ESP32-S2, ESP32-S3 and ESP32-C3 leaves the factory with ADC
//! reference measurements burnt into eFuse. This module turns those
//! measurements into [Characteristics], a line through the origin (plus an
//! offset on the ESP32-S2), and converts raw readings into millivolts with
//! [Characteristics::raw_to_voltage].
//!
//! On chips which use curve fitting, the linear estimate is further corrected
//! by a polynomial error model. The coefficients are fixed per chip and per
//! attenuation and are stored as integer fractions, see [curve].
//!
//! The chip specific parts (scaling constants, supported calibration
//! versions, error tables, failure policy) live in a [ChipCalibration]
//! descriptor selected by [Chip], so one characterization routine serves all
//! chips.
//!
//! ## Usage
//!
//! The fuse data is accessed through the [CalibrationEfuse] trait. The
//! [crate::efuse] module provides decoders for the ESP32-S2 and ESP32-S3
//! fuse layouts; any other source of reference points can be plugged in by
//! implementing the trait.

mod calibration;
mod chip;
pub mod curve;

pub use self::{calibration::*, chip::*};

/// Errors which can be returned by the calibration routines.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, strum::Display)]
pub enum Error {
    /// The requested calibration scheme, the arguments or the fuse data are
    /// not supported by the chip.
    NotSupported,

    /// The calibration version burnt into eFuse is not one the chip
    /// supports.
    InvalidVersion,

    /// A raw ADC unit number was out of range.
    InvalidUnit,

    /// A raw attenuation value was out of range.
    InvalidAttenuation,
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self)
    }
}

/// The ADC unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AdcUnit {
    /// ADC1
    Adc1 = 1,
    /// ADC2
    Adc2 = 2,
}

impl AdcUnit {
    /// Zero based index of the unit, as used by the fuse tables.
    pub const fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for AdcUnit {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AdcUnit::from_repr(value).ok_or(Error::InvalidUnit)
    }
}

/// Number of attenuation levels.
pub const ATTENUATION_COUNT: usize = 4;

/// The attenuation of the ADC pin.
///
/// The effective measurement range for a given attenuation is dependent on the
/// device being targeted. Please refer to "ADC Characteristics" section of your
/// device's datasheet for more information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(clippy::enum_variant_names)]
#[repr(u8)]
pub enum Attenuation {
    /// 0dB attenuation
    _0dB   = 0b00,
    /// 2.5dB attenuation
    _2p5dB = 0b01,
    /// 6dB attenuation
    _6dB   = 0b10,
    /// 11dB attenuation
    _11dB  = 0b11,
}

impl Attenuation {
    /// All attenuation levels in ascending order.
    pub const ALL: [Attenuation; ATTENUATION_COUNT] = [
        Attenuation::_0dB,
        Attenuation::_2p5dB,
        Attenuation::_6dB,
        Attenuation::_11dB,
    ];

    /// The high voltage, in mV, at which the ESP32-S2 two-point and
    /// version 2 single-point calibrations were measured.
    pub const fn nominal_high_voltage(self) -> u32 {
        match self {
            Attenuation::_0dB => 600,
            Attenuation::_2p5dB => 800,
            Attenuation::_6dB => 1000,
            Attenuation::_11dB => 2000,
        }
    }
}

impl TryFrom<u8> for Attenuation {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Attenuation::from_repr(value).ok_or(Error::InvalidAttenuation)
    }
}

/// The low voltage, in mV, of the two-point calibration.
pub const TWO_POINT_LOW_VOLTAGE: u32 = 250;

/// Source of the calibration values used by a characterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationScheme {
    /// Reference voltage stored in eFuse.
    EfuseVref,
    /// Two-point values (or a single reference point) stored in eFuse,
    /// linear conversion.
    EfuseTwoPoint,
    /// Default reference voltage supplied by the caller.
    DefaultVref,
    /// Reference point stored in eFuse, linear conversion followed by
    /// curve fitting.
    EfuseTwoPointFit,
}

/// A factory calibration measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReferencePoint {
    /// Raw readings at [Attenuation::nominal_high_voltage] and at
    /// [TWO_POINT_LOW_VOLTAGE].
    TwoPoint {
        /// Reading at the nominal high voltage.
        high: u32,
        /// Reading at 250 mV.
        low: u32,
    },
    /// One raw reading taken at a known voltage.
    Single {
        /// The voltage the reading was taken at, in mV.
        voltage_mv: u32,
        /// The raw reading.
        reading: u32,
    },
}

/// Factory calibration data of an ADC.
///
/// This is the seam between the calibration math and the eFuse hardware.
/// Implementations must return the same values for the whole lifetime of the
/// program.
pub trait CalibrationEfuse {
    /// The encoding version of the calibration data, `0` if the chip was
    /// never calibrated.
    fn calibration_version(&self) -> u8;

    /// The reference point for the given unit and attenuation, encoded with
    /// `version`.
    ///
    /// Returns `None` if the data is absent or `version` is not understood.
    fn reference_point(
        &self,
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<ReferencePoint>;
}

impl<T> CalibrationEfuse for &T
where
    T: CalibrationEfuse + ?Sized,
{
    fn calibration_version(&self) -> u8 {
        (**self).calibration_version()
    }

    fn reference_point(
        &self,
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<ReferencePoint> {
        (**self).reference_point(version, unit, atten)
    }
}
