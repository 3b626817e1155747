//! ESP32-S3 ADC calibration fields.
//!
//! Version 1 calibration stores, per unit and attenuation, the reading of an
//! 850 mV reference. ADC1 readings are chained differences starting from the
//! highest attenuation, ADC2 readings are differences to the matching ADC1
//! reading.

use super::{Efuse, EfuseBlock, EfuseBlocks, EfuseField};
use crate::adc::{AdcUnit, Attenuation, CalibrationEfuse, ReferencePoint};

/// `[]` BLK_VERSION_MAJOR of BLOCK2 {0: "No calib"; 1: "ADC calib V1"}
pub const BLK_VERSION_MAJOR: EfuseField = EfuseField::new(EfuseBlock::Block2, 128, 2);

/// `[]` ADC1 init code at atten0
pub const ADC1_INIT_CODE_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 149, 8);
/// `[]` ADC1 init code at atten1
pub const ADC1_INIT_CODE_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 157, 6);
/// `[]` ADC1 init code at atten2
pub const ADC1_INIT_CODE_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 163, 6);
/// `[]` ADC1 init code at atten3
pub const ADC1_INIT_CODE_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 169, 6);
/// `[]` ADC2 init code at atten0
pub const ADC2_INIT_CODE_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 175, 8);
/// `[]` ADC2 init code at atten1
pub const ADC2_INIT_CODE_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 183, 6);
/// `[]` ADC2 init code at atten2
pub const ADC2_INIT_CODE_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 189, 6);
/// `[]` ADC2 init code at atten3
pub const ADC2_INIT_CODE_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 195, 6);
/// `[]` ADC1 calibration voltage at atten0
pub const ADC1_CAL_VOL_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 201, 8);
/// `[]` ADC1 calibration voltage at atten1
pub const ADC1_CAL_VOL_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 209, 8);
/// `[]` ADC1 calibration voltage at atten2
pub const ADC1_CAL_VOL_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 217, 8);
/// `[]` ADC1 calibration voltage at atten3
pub const ADC1_CAL_VOL_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block2, 225, 8);
/// `[]` ADC2 calibration voltage at atten0
pub const ADC2_CAL_VOL_ATTEN0: EfuseField = EfuseField::new(EfuseBlock::Block2, 233, 8);
/// `[]` ADC2 calibration voltage at atten1
pub const ADC2_CAL_VOL_ATTEN1: EfuseField = EfuseField::new(EfuseBlock::Block2, 241, 7);
/// `[]` ADC2 calibration voltage at atten2
pub const ADC2_CAL_VOL_ATTEN2: EfuseField = EfuseField::new(EfuseBlock::Block2, 248, 7);
/// `[]` ADC2 calibration voltage at atten3
pub const ADC2_CAL_VOL_ATTEN3: EfuseField = EfuseField::new(EfuseBlock::Block1, 186, 6);

/// The calibration version this decoder understands.
pub const ADC_CALIB_VERSION: u8 = 1;

/// Voltage of the calibration reference, in mV.
pub const REFERENCE_VOLTAGE_MV: u32 = 850;

const INIT_CODE: [[EfuseField; 4]; 2] = [
    [
        ADC1_INIT_CODE_ATTEN0,
        ADC1_INIT_CODE_ATTEN1,
        ADC1_INIT_CODE_ATTEN2,
        ADC1_INIT_CODE_ATTEN3,
    ],
    [
        ADC2_INIT_CODE_ATTEN0,
        ADC2_INIT_CODE_ATTEN1,
        ADC2_INIT_CODE_ATTEN2,
        ADC2_INIT_CODE_ATTEN3,
    ],
];

const CAL_VOL: [[EfuseField; 4]; 2] = [
    [
        ADC1_CAL_VOL_ATTEN0,
        ADC1_CAL_VOL_ATTEN1,
        ADC1_CAL_VOL_ATTEN2,
        ADC1_CAL_VOL_ATTEN3,
    ],
    [
        ADC2_CAL_VOL_ATTEN0,
        ADC2_CAL_VOL_ATTEN1,
        ADC2_CAL_VOL_ATTEN2,
        ADC2_CAL_VOL_ATTEN3,
    ],
];

/// ADC calibration decoder for the ESP32-S3.
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

    fn read_diffs(&self, fields: &[EfuseField; 4]) -> [i32; 4] {
        fields.map(|field| self.efuse.read_field_le::<u8>(field) as i32)
    }

    /// The initial offset code of the ADC, used to seed its
    /// self-calibration. `None` without version 1 calibration.
    pub fn init_code(&self, unit: AdcUnit, atten: Attenuation) -> Option<u32> {
        if self.calibration_version() != ADC_CALIB_VERSION {
            return None;
        }

        let diff = self.read_diffs(&INIT_CODE[unit.index()]);
        let mut code = [0; 4];

        match unit {
            AdcUnit::Adc1 => {
                code[0] = diff[0] + 1850;
                code[1] = diff[1] + code[0] + 90;
                code[2] = diff[2] + code[1];
                code[3] = diff[3] + code[2] + 70;
            }
            AdcUnit::Adc2 => {
                code[0] = diff[0] + 2020;
                code[1] = diff[1] + code[0];
                code[2] = diff[2] + code[1];
                code[3] = diff[3] + code[2];
            }
        }

        u32::try_from(code[atten as usize]).ok()
    }

    /// The raw reading of the 850 mV reference for every attenuation of
    /// `unit`.
    pub fn reference_readings(&self, unit: AdcUnit) -> [i32; 4] {
        let adc1_diff = self.read_diffs(&CAL_VOL[0]);

        let mut adc1 = [0; 4];
        adc1[3] = adc1_diff[3] + 900;
        adc1[2] = adc1_diff[2] + adc1[3] + 800;
        adc1[1] = adc1_diff[1] + adc1[2] + 700;
        adc1[0] = adc1_diff[0] + adc1[1] + 800;

        match unit {
            AdcUnit::Adc1 => adc1,
            AdcUnit::Adc2 => {
                let adc2_diff = self.read_diffs(&CAL_VOL[1]);
                [
                    adc1[0] - adc2_diff[0] + 40,
                    adc1[1] - adc2_diff[1] + 10,
                    adc1[2] - adc2_diff[2] + 20,
                    adc1[3] - adc2_diff[3] + 15,
                ]
            }
        }
    }
}

impl<B> CalibrationEfuse for AdcCalibration<B>
where
    B: EfuseBlocks,
{
    fn calibration_version(&self) -> u8 {
        let major = self.efuse.read_field_le::<u8>(BLK_VERSION_MAJOR);
        if major == 1 {
            ADC_CALIB_VERSION
        } else {
            warn!("calibration efuse version does not match, set default version to 0");
            0
        }
    }

    fn reference_point(
        &self,
        version: u8,
        unit: AdcUnit,
        atten: Attenuation,
    ) -> Option<ReferencePoint> {
        if version != ADC_CALIB_VERSION {
            return None;
        }

        let reading = self.reference_readings(unit)[atten as usize];

        Some(ReferencePoint::Single {
            voltage_mv: REFERENCE_VOLTAGE_MV,
            reading: u32::try_from(reading).ok().filter(|&r| r != 0)?,
        })
    }
}
