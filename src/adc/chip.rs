use super::{
    curve::{ErrorCurves, ESP32C3_CURVES, ESP32S3_ADC1_CURVES, ESP32S3_ADC2_CURVES},
    CalibrationScheme,
};

/// Chips with eFuse based ADC calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    /// ESP32
    Esp32,
    /// ESP32-S2
    Esp32s2,
    /// ESP32-S3
    Esp32s3,
    /// ESP32-C3
    Esp32c3,
}

impl Chip {
    /// The calibration descriptor of this chip.
    pub const fn calibration(self) -> &'static ChipCalibration {
        match self {
            Chip::Esp32 => &ESP32,
            Chip::Esp32s2 => &ESP32S2,
            Chip::Esp32s3 => &ESP32S3,
            Chip::Esp32c3 => &ESP32C3,
        }
    }
}

/// How a linear estimate is turned into the final voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionModel {
    /// `reading * coeff_a / coeff_a_scaling + coeff_b / coeff_b_scaling`
    Linear {
        /// Divisor of `coeff_b`.
        coeff_b_scaling: i64,
    },
    /// `v - error(v)` with `v = reading * coeff_a / coeff_a_scaling`
    CurveFitting {
        /// Error curves of ADC1.
        adc1: &'static ErrorCurves,
        /// Error curves of ADC2.
        adc2: &'static ErrorCurves,
    },
}

/// What happens when the chip has no usable calibration in eFuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCalibration {
    /// Calibration is mandatory, the program panics.
    Panic,
    /// [super::Error::NotSupported] is returned.
    NotSupported,
}

/// How invalid characterization arguments are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentCheck {
    /// Checked with `debug_assert!` only.
    DebugAssert,
    /// Rejected with [super::Error::NotSupported].
    Reject,
}

/// Everything that differs between the chips' calibration routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipCalibration {
    /// Native resolution of the ADC, the only accepted bit width.
    pub bit_width: u8,
    /// Calibration versions understood by the chip.
    pub versions: &'static [u8],
    /// Divisor of `coeff_a`.
    pub coeff_a_scaling: u64,
    /// Conversion from a reading to a voltage.
    pub model: ConversionModel,
    /// Scheme reported by a successful characterization.
    pub scheme: CalibrationScheme,
    /// Behavior when the calibration version is not supported.
    pub missing_calibration: MissingCalibration,
    /// Behavior on invalid arguments.
    pub argument_check: ArgumentCheck,
    /// Readings must be below this value; checked with `assert!`.
    pub reading_limit: Option<u32>,
}

impl ChipCalibration {
    /// Whether `version` is a calibration version this chip understands.
    pub fn supports_version(&self, version: u8) -> bool {
        self.versions.contains(&version)
    }
}

// The Vref measured at the factory is supplied as a single reference point.
const ESP32: ChipCalibration = ChipCalibration {
    bit_width: 12,
    versions: &[1],
    coeff_a_scaling: 65536,
    model: ConversionModel::Linear { coeff_b_scaling: 1 },
    scheme: CalibrationScheme::EfuseVref,
    missing_calibration: MissingCalibration::NotSupported,
    argument_check: ArgumentCheck::Reject,
    reading_limit: None,
};

const ESP32S2: ChipCalibration = ChipCalibration {
    bit_width: 13,
    versions: &[1, 2],
    coeff_a_scaling: 65536,
    model: ConversionModel::Linear {
        coeff_b_scaling: 1024,
    },
    scheme: CalibrationScheme::EfuseTwoPoint,
    missing_calibration: MissingCalibration::Panic,
    argument_check: ArgumentCheck::DebugAssert,
    reading_limit: None,
};

const ESP32S3: ChipCalibration = ChipCalibration {
    bit_width: 12,
    versions: &[1],
    coeff_a_scaling: 1_000_000,
    model: ConversionModel::CurveFitting {
        adc1: &ESP32S3_ADC1_CURVES,
        adc2: &ESP32S3_ADC2_CURVES,
    },
    scheme: CalibrationScheme::EfuseTwoPointFit,
    missing_calibration: MissingCalibration::NotSupported,
    argument_check: ArgumentCheck::Reject,
    reading_limit: None,
};

const ESP32C3: ChipCalibration = ChipCalibration {
    bit_width: 12,
    versions: &[1],
    coeff_a_scaling: 65536,
    model: ConversionModel::CurveFitting {
        adc1: &ESP32C3_CURVES,
        adc2: &ESP32C3_CURVES,
    },
    scheme: CalibrationScheme::EfuseTwoPoint,
    missing_calibration: MissingCalibration::NotSupported,
    argument_check: ArgumentCheck::Reject,
    reading_limit: Some(4096),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_bit_widths() {
        assert_eq!(Chip::Esp32.calibration().bit_width, 12);
        assert_eq!(Chip::Esp32s2.calibration().bit_width, 13);
        assert_eq!(Chip::Esp32s3.calibration().bit_width, 12);
        assert_eq!(Chip::Esp32c3.calibration().bit_width, 12);
    }

    #[test]
    fn supported_versions() {
        let s2 = Chip::Esp32s2.calibration();
        assert!(!s2.supports_version(0));
        assert!(s2.supports_version(1));
        assert!(s2.supports_version(2));
        assert!(!s2.supports_version(3));

        for chip in [Chip::Esp32, Chip::Esp32s3, Chip::Esp32c3] {
            let cal = chip.calibration();
            assert!(cal.supports_version(1));
            assert!(!cal.supports_version(0));
            assert!(!cal.supports_version(2));
        }
    }

    #[test]
    fn curve_fitting_chips() {
        assert!(matches!(
            Chip::Esp32s3.calibration().model,
            ConversionModel::CurveFitting { adc1, adc2 }
                if *adc1 == ESP32S3_ADC1_CURVES && *adc2 == ESP32S3_ADC2_CURVES
        ));
        assert!(matches!(
            Chip::Esp32c3.calibration().model,
            ConversionModel::CurveFitting { adc1, adc2 } if adc1 == adc2
        ));
        assert_eq!(
            Chip::Esp32s2.calibration().model,
            ConversionModel::Linear {
                coeff_b_scaling: 1024
            }
        );
    }
}
