use super::{
    curve::{evaluate_error, term_count},
    AdcUnit,
    ArgumentCheck,
    Attenuation,
    CalibrationEfuse,
    CalibrationScheme,
    Chip,
    ConversionModel,
    Error,
    MissingCalibration,
    ReferencePoint,
    TWO_POINT_LOW_VOLTAGE,
};

/// Calibration characteristics of one ADC unit at one attenuation.
///
/// Created once by [characterize] and read-only afterwards, so it can be
/// shared freely between cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Characteristics {
    chip: Chip,
    unit: AdcUnit,
    atten: Attenuation,
    bit_width: u8,
    coeff_a: u32,
    coeff_b: i32,
    scheme: CalibrationScheme,
    default_vref: u32,
}

impl Characteristics {
    /// Derives the characteristics from an already decoded reference point.
    ///
    /// A single point yields `coeff_a = scaling * voltage / reading` and no
    /// offset. Two points, only meaningful for chips calibrating with
    /// [CalibrationScheme::EfuseTwoPoint] on the linear model, yield the
    /// line through (250 mV, `low`) and ([Attenuation::nominal_high_voltage],
    /// `high`).
    pub fn from_reference_point(
        chip: Chip,
        unit: AdcUnit,
        atten: Attenuation,
        bit_width: u8,
        point: ReferencePoint,
    ) -> Result<Self, Error> {
        let cal = chip.calibration();

        let (coeff_a, coeff_b) = match (point, cal.model) {
            (
                ReferencePoint::Single {
                    voltage_mv,
                    reading,
                },
                _,
            ) => {
                if reading == 0 {
                    return Err(Error::NotSupported);
                }
                let coeff_a = cal.coeff_a_scaling * voltage_mv as u64 / reading as u64;
                (coeff_a as i64, 0)
            }
            (ReferencePoint::TwoPoint { high, low }, ConversionModel::Linear { coeff_b_scaling })
                if cal.scheme == CalibrationScheme::EfuseTwoPoint =>
            {
                if high <= low {
                    return Err(Error::NotSupported);
                }
                let v_high = atten.nominal_high_voltage() as i64;
                let v_low = TWO_POINT_LOW_VOLTAGE as i64;
                let (high, low) = (high as i64, low as i64);

                let coeff_a = cal.coeff_a_scaling as i64 * (v_high - v_low) / (high - low);
                let coeff_b = coeff_b_scaling * (v_low * high - v_high * low) / (high - low);
                (coeff_a, coeff_b)
            }
            (ReferencePoint::TwoPoint { .. }, _) => {
                return Err(Error::NotSupported);
            }
        };

        let coeff_a = u32::try_from(coeff_a).map_err(|_| Error::NotSupported)?;
        let coeff_b = i32::try_from(coeff_b).map_err(|_| Error::NotSupported)?;
        if coeff_a == 0 {
            return Err(Error::NotSupported);
        }

        debug!(
            "ADC{} {:?}: coeff_a {}, coeff_b {}",
            unit as u8,
            atten,
            coeff_a,
            coeff_b
        );

        Ok(Self {
            chip,
            unit,
            atten,
            bit_width,
            coeff_a,
            coeff_b,
            scheme: cal.scheme,
            default_vref: 0,
        })
    }

    /// Converts a raw reading into millivolts.
    ///
    /// Zero is not special-cased: the constant term of the error polynomial
    /// applies to every reading, so readings close to zero can produce
    /// negative voltages on curve fitting chips.
    ///
    /// # Panics
    ///
    /// On the ESP32-C3 if `reading` is not below 4096. The other chips don't
    /// check the reading: out of range readings convert to a meaningless
    /// value.
    pub fn raw_to_voltage(&self, reading: u32) -> i32 {
        let cal = self.chip.calibration();

        if let Some(limit) = cal.reading_limit {
            assert!(reading < limit, "ADC reading {} out of range", reading);
        }

        let v = reading as u64 * self.coeff_a as u64 / cal.coeff_a_scaling;

        match cal.model {
            ConversionModel::Linear { coeff_b_scaling } => {
                let v = v as i64 + self.coeff_b as i64 / coeff_b_scaling;
                i32::try_from(v).unwrap_or(i32::MAX)
            }
            ConversionModel::CurveFitting { adc1, adc2 } => {
                let curves = match self.unit {
                    AdcUnit::Adc1 => adc1,
                    AdcUnit::Adc2 => adc2,
                };
                let error = evaluate_error(v, self.atten, curves, term_count(self.atten));
                i32::try_from(v).unwrap_or(i32::MAX).saturating_sub(error)
            }
        }
    }

    /// The chip these characteristics were computed for.
    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// The ADC unit.
    pub fn unit(&self) -> AdcUnit {
        self.unit
    }

    /// The attenuation.
    pub fn attenuation(&self) -> Attenuation {
        self.atten
    }

    /// The bit width the characterization was requested for.
    pub fn bit_width(&self) -> u8 {
        self.bit_width
    }

    /// Gradient, scaled by the chip's `coeff_a` scaling.
    pub fn coeff_a(&self) -> u32 {
        self.coeff_a
    }

    /// Offset, scaled by 1024. Only the ESP32-S2 two-point scheme sets it.
    pub fn coeff_b(&self) -> i32 {
        self.coeff_b
    }

    /// The calibration scheme that produced these characteristics.
    pub fn scheme(&self) -> CalibrationScheme {
        self.scheme
    }

    /// The fallback reference voltage passed to [characterize]. eFuse
    /// based schemes don't use it.
    pub fn default_vref(&self) -> u32 {
        self.default_vref
    }
}

/// Checks whether the chip's eFuse holds calibration data for `scheme`.
///
/// Returns [Error::NotSupported] if the chip doesn't calibrate with `scheme`
/// and [Error::InvalidVersion] if the burnt calibration version is not one
/// the chip understands.
pub fn check_calibration_available<E>(
    chip: Chip,
    efuse: &E,
    scheme: CalibrationScheme,
) -> Result<(), Error>
where
    E: CalibrationEfuse + ?Sized,
{
    let cal = chip.calibration();

    if scheme != cal.scheme {
        return Err(Error::NotSupported);
    }

    let version = efuse.calibration_version();
    if !cal.supports_version(version) {
        return Err(Error::InvalidVersion);
    }

    Ok(())
}

/// Characterizes an ADC unit at the given attenuation from the factory
/// calibration in eFuse.
///
/// `bit_width` must be the chip's native resolution. `default_vref` is only
/// recorded; none of the supported chips fall back to it.
///
/// # Panics
///
/// On the ESP32-S2, if the calibration version is not supported. On every
/// chip, if a supported version is burnt but the reference point for `unit`
/// and `atten` can't be read.
pub fn characterize<E>(
    chip: Chip,
    efuse: &E,
    unit: AdcUnit,
    atten: Attenuation,
    bit_width: u8,
    default_vref: u32,
) -> Result<Characteristics, Error>
where
    E: CalibrationEfuse + ?Sized,
{
    let cal = chip.calibration();

    if bit_width != cal.bit_width {
        match cal.argument_check {
            ArgumentCheck::Reject => {
                warn!("Invalid bit width {} for {}", bit_width, chip);
                return Err(Error::NotSupported);
            }
            ArgumentCheck::DebugAssert => {
                debug_assert!(
                    bit_width == cal.bit_width,
                    "Invalid bit width {}",
                    bit_width
                );
            }
        }
    }

    let version = efuse.calibration_version();
    if !cal.supports_version(version) {
        match cal.missing_calibration {
            MissingCalibration::NotSupported => {
                warn!("No calibration efuse burnt (version {})", version);
                return Err(Error::NotSupported);
            }
            MissingCalibration::Panic => {
                error!("Unsupported ADC calibration version {}", version);
                panic!("Unsupported ADC calibration version {}", version);
            }
        }
    }

    let Some(point) = efuse.reference_point(version, unit, atten) else {
        error!(
            "No calibration data for ADC{} {:?} (version {})",
            unit as u8,
            atten,
            version
        );
        panic!("ADC calibration data missing");
    };

    let mut chars = Characteristics::from_reference_point(chip, unit, atten, bit_width, point)?;
    chars.default_vref = default_vref;

    Ok(chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEfuse {
        version: u8,
        point: Option<ReferencePoint>,
    }

    impl CalibrationEfuse for FakeEfuse {
        fn calibration_version(&self) -> u8 {
            self.version
        }

        fn reference_point(
            &self,
            _version: u8,
            _unit: AdcUnit,
            _atten: Attenuation,
        ) -> Option<ReferencePoint> {
            self.point
        }
    }

    fn single(version: u8, voltage_mv: u32, reading: u32) -> FakeEfuse {
        FakeEfuse {
            version,
            point: Some(ReferencePoint::Single {
                voltage_mv,
                reading,
            }),
        }
    }

    #[test]
    fn two_point_line_hits_both_references() {
        let efuse = FakeEfuse {
            version: 1,
            point: Some(ReferencePoint::TwoPoint {
                high: 5000,
                low: 1500,
            }),
        };

        let chars =
            characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_11dB, 13, 0).unwrap();

        assert_eq!(chars.coeff_a(), 32768);
        assert_eq!(chars.coeff_b(), -512000);
        assert_eq!(chars.scheme(), CalibrationScheme::EfuseTwoPoint);
        assert_eq!(chars.raw_to_voltage(5000), 2000);
        assert_eq!(chars.raw_to_voltage(1500), 250);
    }

    #[test]
    fn two_point_high_reading_within_rounding() {
        let cases = [
            (Attenuation::_0dB, 3000, 1300),
            (Attenuation::_2p5dB, 3900, 1210),
            (Attenuation::_6dB, 4700, 1150),
            (Attenuation::_11dB, 7600, 1030),
        ];

        for (atten, high, low) in cases {
            let efuse = FakeEfuse {
                version: 1,
                point: Some(ReferencePoint::TwoPoint { high, low }),
            };
            let chars = characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc2, atten, 13, 0).unwrap();
            let v = chars.raw_to_voltage(high);
            let nominal = atten.nominal_high_voltage() as i32;
            assert!((v - nominal).abs() <= 1, "{atten:?}: {v} mV");
        }
    }

    #[test]
    fn negative_offset_truncates_toward_zero() {
        let efuse = FakeEfuse {
            version: 1,
            point: Some(ReferencePoint::TwoPoint {
                high: 3000,
                low: 1300,
            }),
        };
        let chars =
            characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_0dB, 13, 0).unwrap();

        assert_eq!(chars.coeff_a(), 13492);
        assert_eq!(chars.coeff_b(), -18070);
        assert_eq!(chars.raw_to_voltage(3000), 600);
    }

    #[test]
    fn version_two_single_point() {
        let efuse = single(2, 2000, 6000);
        let chars =
            characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_11dB, 13, 1100)
                .unwrap();

        assert_eq!(chars.coeff_a(), 21845);
        assert_eq!(chars.coeff_b(), 0);
        assert_eq!(chars.default_vref(), 1100);
        assert_eq!(chars.raw_to_voltage(6000), 1999);
    }

    #[test]
    fn curve_fitting_single_point() {
        let efuse = single(1, 850, 1000);
        let chars =
            characterize(Chip::Esp32s3, &efuse, AdcUnit::Adc1, Attenuation::_6dB, 12, 0).unwrap();

        assert_eq!(chars.coeff_a(), 850_000);
        assert_eq!(chars.coeff_b(), 0);
        assert_eq!(chars.scheme(), CalibrationScheme::EfuseTwoPointFit);
        assert_eq!(chars.unit(), AdcUnit::Adc1);
        assert_eq!(chars.attenuation(), Attenuation::_6dB);
        assert_eq!(chars.bit_width(), 12);
        assert_eq!(chars.chip(), Chip::Esp32s3);
    }

    #[test]
    fn zero_reading_applies_constant_term() {
        let c3 = characterize(
            Chip::Esp32c3,
            &single(1, 1370, 2000),
            AdcUnit::Adc1,
            Attenuation::_11dB,
            12,
            0,
        )
        .unwrap();
        assert_eq!(c3.raw_to_voltage(0), 1);

        let s3 = characterize(
            Chip::Esp32s3,
            &single(1, 850, 900),
            AdcUnit::Adc2,
            Attenuation::_11dB,
            12,
            0,
        )
        .unwrap();
        assert_eq!(s3.raw_to_voltage(0), -1);

        let s3 = characterize(
            Chip::Esp32s3,
            &single(1, 850, 3200),
            AdcUnit::Adc1,
            Attenuation::_0dB,
            12,
            0,
        )
        .unwrap();
        assert_eq!(s3.raw_to_voltage(0), 2);
    }

    #[test]
    fn curve_fitting_is_monotonic() {
        let c3_references = [400, 550, 750, 1370];
        let s3_readings = [3200, 2400, 1700, 900];

        for (atten, voltage) in Attenuation::ALL.into_iter().zip(c3_references) {
            let efuse = single(1, voltage, 2000);
            let chars = characterize(Chip::Esp32c3, &efuse, AdcUnit::Adc1, atten, 12, 0).unwrap();
            assert_non_decreasing(&chars);
        }

        for unit in [AdcUnit::Adc1, AdcUnit::Adc2] {
            for (atten, reading) in Attenuation::ALL.into_iter().zip(s3_readings) {
                let efuse = single(1, 850, reading);
                let chars = characterize(Chip::Esp32s3, &efuse, unit, atten, 12, 0).unwrap();
                assert_non_decreasing(&chars);
            }
        }
    }

    fn assert_non_decreasing(chars: &Characteristics) {
        const EPSILON: i32 = 5;

        let mut previous = chars.raw_to_voltage(0);
        for reading in (16..4096).step_by(16) {
            let v = chars.raw_to_voltage(reading);
            assert!(
                v + EPSILON >= previous,
                "{:?} {:?}: {} mV at {} after {} mV",
                chars.unit(),
                chars.attenuation(),
                v,
                reading,
                previous
            );
            previous = v;
        }
    }

    #[test]
    fn linear_model_is_monotonic() {
        let efuse = single(2, 1000, 5000);
        let chars =
            characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_6dB, 13, 0).unwrap();

        let mut previous = chars.raw_to_voltage(0);
        for reading in 1..8192 {
            let v = chars.raw_to_voltage(reading);
            assert!(v >= previous);
            previous = v;
        }
    }

    #[test]
    fn version_gating() {
        for version in 0..=u8::MAX {
            let efuse = single(version, 850, 1000);

            let s2 = check_calibration_available(
                Chip::Esp32s2,
                &efuse,
                CalibrationScheme::EfuseTwoPoint,
            );
            let s3 = check_calibration_available(
                Chip::Esp32s3,
                &efuse,
                CalibrationScheme::EfuseTwoPointFit,
            );
            let c3 = check_calibration_available(
                Chip::Esp32c3,
                &efuse,
                CalibrationScheme::EfuseTwoPoint,
            );
            let esp32 =
                check_calibration_available(Chip::Esp32, &efuse, CalibrationScheme::EfuseVref);

            match version {
                1 => {
                    assert_eq!(s2, Ok(()));
                    assert_eq!(s3, Ok(()));
                    assert_eq!(c3, Ok(()));
                    assert_eq!(esp32, Ok(()));
                }
                2 => {
                    assert_eq!(s2, Ok(()));
                    assert_eq!(s3, Err(Error::InvalidVersion));
                    assert_eq!(c3, Err(Error::InvalidVersion));
                    assert_eq!(esp32, Err(Error::InvalidVersion));
                }
                _ => {
                    assert_eq!(s2, Err(Error::InvalidVersion));
                    assert_eq!(s3, Err(Error::InvalidVersion));
                    assert_eq!(c3, Err(Error::InvalidVersion));
                    assert_eq!(esp32, Err(Error::InvalidVersion));
                }
            }
        }
    }

    #[test]
    fn other_schemes_not_supported() {
        let efuse = single(1, 850, 1000);

        for scheme in [
            CalibrationScheme::EfuseVref,
            CalibrationScheme::DefaultVref,
            CalibrationScheme::EfuseTwoPointFit,
        ] {
            assert_eq!(
                check_calibration_available(Chip::Esp32c3, &efuse, scheme),
                Err(Error::NotSupported)
            );
        }
        assert_eq!(
            check_calibration_available(Chip::Esp32s3, &efuse, CalibrationScheme::EfuseTwoPoint),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn missing_calibration_not_supported() {
        for chip in [Chip::Esp32, Chip::Esp32s3, Chip::Esp32c3] {
            let efuse = single(0, 850, 1000);
            assert_eq!(
                characterize(chip, &efuse, AdcUnit::Adc1, Attenuation::_0dB, 12, 0),
                Err(Error::NotSupported)
            );
        }
    }

    #[test]
    #[should_panic(expected = "Unsupported ADC calibration version 3")]
    fn missing_calibration_panics_on_esp32s2() {
        let efuse = single(3, 850, 1000);
        let _ = characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_0dB, 13, 0);
    }

    #[test]
    #[should_panic(expected = "ADC calibration data missing")]
    fn missing_reference_point_panics() {
        let efuse = FakeEfuse {
            version: 1,
            point: None,
        };
        let _ = characterize(Chip::Esp32s3, &efuse, AdcUnit::Adc2, Attenuation::_6dB, 12, 0);
    }

    #[test]
    fn wrong_bit_width_rejected() {
        let efuse = single(1, 850, 1000);
        for chip in [Chip::Esp32s3, Chip::Esp32c3] {
            for bit_width in [9, 10, 11, 13] {
                assert_eq!(
                    characterize(chip, &efuse, AdcUnit::Adc1, Attenuation::_0dB, bit_width, 0),
                    Err(Error::NotSupported)
                );
            }
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Invalid bit width 12")]
    fn wrong_bit_width_asserted_on_esp32s2() {
        let efuse = single(2, 1000, 5000);
        let _ = characterize(Chip::Esp32s2, &efuse, AdcUnit::Adc1, Attenuation::_6dB, 12, 0);
    }

    #[test]
    #[should_panic(expected = "ADC reading 4096 out of range")]
    fn reading_limit_asserted_on_esp32c3() {
        let chars = characterize(
            Chip::Esp32c3,
            &single(1, 750, 2000),
            AdcUnit::Adc1,
            Attenuation::_6dB,
            12,
            0,
        )
        .unwrap();
        chars.raw_to_voltage(4096);
    }

    #[test]
    fn out_of_range_readings_do_not_overflow() {
        let point = ReferencePoint::Single {
            voltage_mv: 850,
            reading: 900,
        };

        for atten in Attenuation::ALL {
            let chars =
                Characteristics::from_reference_point(Chip::Esp32s3, AdcUnit::Adc1, atten, 12, point)
                    .unwrap();
            for reading in [4096, 65535, u32::MAX] {
                let _ = chars.raw_to_voltage(reading);
            }
        }

        let chars = Characteristics::from_reference_point(
            Chip::Esp32s2,
            AdcUnit::Adc1,
            Attenuation::_11dB,
            13,
            ReferencePoint::TwoPoint {
                high: 6209,
                low: 701,
            },
        )
        .unwrap();
        assert!(chars.raw_to_voltage(u32::MAX) > chars.raw_to_voltage(8191));
    }

    #[test]
    fn esp32_single_point() {
        let efuse = single(1, 1100, 2048);
        let chars =
            characterize(Chip::Esp32, &efuse, AdcUnit::Adc2, Attenuation::_2p5dB, 12, 1100).unwrap();

        // 65536 * 1100 / 2048
        assert_eq!(chars.coeff_a(), 35200);
        assert_eq!(chars.coeff_b(), 0);
        assert_eq!(chars.scheme(), CalibrationScheme::EfuseVref);
        assert_eq!(chars.raw_to_voltage(2048), 1100);
        assert_eq!(chars.raw_to_voltage(0), 0);

        assert_eq!(
            characterize(Chip::Esp32, &efuse, AdcUnit::Adc1, Attenuation::_0dB, 13, 1100),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn malformed_reference_points() {
        let zero_reading = ReferencePoint::Single {
            voltage_mv: 850,
            reading: 0,
        };
        let inverted = ReferencePoint::TwoPoint {
            high: 1000,
            low: 1000,
        };
        let two_point_on_curve_chip = ReferencePoint::TwoPoint {
            high: 3000,
            low: 1000,
        };

        for (chip, point) in [
            (Chip::Esp32s3, zero_reading),
            (Chip::Esp32s2, inverted),
            (Chip::Esp32c3, two_point_on_curve_chip),
            (Chip::Esp32, two_point_on_curve_chip),
        ] {
            assert_eq!(
                Characteristics::from_reference_point(
                    chip,
                    AdcUnit::Adc1,
                    Attenuation::_0dB,
                    12,
                    point
                ),
                Err(Error::NotSupported)
            );
        }
    }
}
