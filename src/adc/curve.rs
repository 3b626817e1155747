//! Polynomial error correction for curve fitting calibration.
//!
//! The error of the linear estimate `v` is modelled as
//! `e(v) = c0 + c1 * v + c2 * v^2 + ... + cn * v^n`, with a quadratic for the
//! lower attenuations and a quartic at 11dB. Each coefficient is stored as an
//! unsigned fraction `value / divisor` plus a separate sign so that the
//! evaluation only needs integer arithmetic.

use super::{Attenuation, ATTENUATION_COUNT};

/// Maximum number of polynomial terms.
pub const MAX_TERMS: usize = 5;

/// A coefficient magnitude expressed as `value / divisor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurveTerm {
    /// Numerator.
    pub value: u64,
    /// Denominator, only zero for unused terms.
    pub divisor: u64,
}

impl CurveTerm {
    const UNUSED: Self = Self {
        value: 0,
        divisor: 0,
    };

    fn apply(&self, variable: u128) -> u128 {
        debug_assert!(self.divisor != 0, "evaluating an unused polynomial term");
        variable.saturating_mul(self.value as u128) / self.divisor as u128
    }

    fn signed(&self, variable: u128, sign: i8) -> i32 {
        i32::try_from(self.apply(variable))
            .unwrap_or(i32::MAX)
            .saturating_mul(sign as i32)
    }
}

/// Error polynomial coefficients for all attenuation levels of one ADC unit.
///
/// `coeff[atten][i]` is the magnitude of the coefficient of `v^i` and
/// `sign[atten][i]` its sign (`-1`, `0` or `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCurves {
    /// Coefficient magnitudes.
    pub coeff: [[CurveTerm; MAX_TERMS]; ATTENUATION_COUNT],
    /// Coefficient signs.
    pub sign: [[i8; MAX_TERMS]; ATTENUATION_COUNT],
}

impl ErrorCurves {
    const fn new(rows: [(Attenuation, &[(i8, u64, u64)]); ATTENUATION_COUNT]) -> Self {
        let mut coeff = [[CurveTerm::UNUSED; MAX_TERMS]; ATTENUATION_COUNT];
        let mut sign = [[0i8; MAX_TERMS]; ATTENUATION_COUNT];

        let mut row = 0;
        while row < rows.len() {
            let (atten, terms) = rows[row];
            ::core::assert!(terms.len() <= MAX_TERMS);

            let mut i = 0;
            while i < terms.len() {
                let (s, value, divisor) = terms[i];
                coeff[atten as usize][i] = CurveTerm { value, divisor };
                sign[atten as usize][i] = s;
                i += 1;
            }
            row += 1;
        }

        Self { coeff, sign }
    }
}

/// Number of polynomial terms used at the given attenuation.
pub const fn term_count(atten: Attenuation) -> usize {
    match atten {
        Attenuation::_11dB => 5,
        _ => 3,
    }
}

/// Evaluates the error polynomial at `v_estimate` (mV).
///
/// The result is subtracted from the linear estimate; a negative error adds
/// voltage back. A zero estimate still yields the constant term.
///
/// Estimates far outside the ADC's range saturate instead of overflowing.
///
/// `term_count` must be between 1 and [MAX_TERMS] and must not exceed the
/// number of terms defined for `atten`. The attenuation itself always
/// indexes the tables in bounds.
pub fn evaluate_error(
    v_estimate: u64,
    atten: Attenuation,
    curves: &ErrorCurves,
    term_count: usize,
) -> i32 {
    debug_assert!((1..=MAX_TERMS).contains(&term_count));

    let coeff = &curves.coeff[atten as usize];
    let sign = &curves.sign[atten as usize];

    let mut variable: u128 = 1;
    let mut error = coeff[0].signed(variable, sign[0]);

    for i in 1..term_count {
        variable = variable.saturating_mul(v_estimate as u128);
        error = error.saturating_add(coeff[i].signed(variable, sign[i]));
    }

    error
}

const E15: u64 = 1_000_000_000_000_000;
const E16: u64 = 10_000_000_000_000_000;
const E17: u64 = 100_000_000_000_000_000;

macro_rules! error_curves {
    ($($(#[$meta:meta])* $name:ident [ $($att:ident => [ $( $sign:literal * $value:literal / $divisor:ident, )* ],)* ];)*) => {
        $(
            $(#[$meta])*
            pub const $name: ErrorCurves = ErrorCurves::new([
                $((Attenuation::$att, &[$(($sign, $value, $divisor),)*]),)*
            ]);
        )*
    };
}

error_curves! {
    /// ESP32-C3 error curves, shared by ADC1 and ADC2.
    ESP32C3_CURVES [
        _0dB => [
            -1 * 225966470500043 / E15,
            -1 * 7265418501948 / E16,
            1 * 109410402681 / E16,
        ],
        _2p5dB => [
            1 * 4229623392600516 / E16,
            -1 * 731527490903 / E16,
            1 * 88166562521 / E16,
        ],
        _6dB => [
            -1 * 1017859239236435 / E15,
            -1 * 97159265299153 / E16,
            1 * 149794028038 / E16,
        ],
        _11dB => [
            -1 * 14912262772850453 / E16,
            -1 * 228549975564099 / E16,
            1 * 356391935717 / E16,
            -1 * 179964582 / E16,
            1 * 42046 / E16,
        ],
    ];

    /// ESP32-S3 ADC1 error curves.
    ESP32S3_ADC1_CURVES [
        _0dB => [
            -1 * 27856531419538344 / E16,
            -1 * 50871540569528 / E16,
            1 * 9798249589 / E15,
        ],
        _2p5dB => [
            -1 * 29831022915028695 / E16,
            -1 * 49393185868806 / E16,
            1 * 101379430548 / E16,
        ],
        _6dB => [
            -1 * 23285545746296417 / E16,
            -1 * 147640181047414 / E16,
            1 * 208385525314 / E16,
        ],
        _11dB => [
            -1 * 644403418269478 / E15,
            -1 * 644334888647536 / E16,
            1 * 1297891447611 / E16,
            -1 * 70769718 / E15,
            1 * 13515 / E15,
        ],
    ];

    /// ESP32-S3 ADC2 error curves.
    ESP32S3_ADC2_CURVES [
        _0dB => [
            -1 * 25668651654328927 / E16,
            1 * 1353548869615 / E16,
            1 * 36615265189 / E16,
        ],
        _2p5dB => [
            -1 * 23690184690298404 / E16,
            -1 * 66319894226185 / E16,
            1 * 118964995959 / E16,
        ],
        _6dB => [
            -1 * 9452499397020617 / E16,
            -1 * 200996773954387 / E16,
            1 * 259011467956 / E17,
        ],
        _11dB => [
            1 * 12247719764336924 / E16,
            -1 * 755717904943462 / E16,
            1 * 1478791187119 / E16,
            -1 * 79672528 / E15,
            1 * 15038 / E15,
        ],
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_counts() {
        assert_eq!(term_count(Attenuation::_0dB), 3);
        assert_eq!(term_count(Attenuation::_2p5dB), 3);
        assert_eq!(term_count(Attenuation::_6dB), 3);
        assert_eq!(term_count(Attenuation::_11dB), 5);
    }

    #[test]
    fn tables_define_exactly_the_used_terms() {
        for curves in [&ESP32C3_CURVES, &ESP32S3_ADC1_CURVES, &ESP32S3_ADC2_CURVES] {
            for atten in Attenuation::ALL {
                let count = term_count(atten);
                for i in 0..MAX_TERMS {
                    let term = curves.coeff[atten as usize][i];
                    let sign = curves.sign[atten as usize][i];
                    if i < count {
                        assert_ne!(term.divisor, 0);
                        assert!(sign == 1 || sign == -1);
                    } else {
                        assert_eq!(term, CurveTerm::UNUSED);
                        assert_eq!(sign, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn constant_term_at_zero() {
        // 1.4912... truncates to 1, negative
        assert_eq!(
            evaluate_error(0, Attenuation::_11dB, &ESP32C3_CURVES, 5),
            -1
        );
        // 2.7856... truncates to 2, negative
        assert_eq!(
            evaluate_error(0, Attenuation::_0dB, &ESP32S3_ADC1_CURVES, 3),
            -2
        );
        // 1.2247... truncates to 1, positive
        assert_eq!(
            evaluate_error(0, Attenuation::_11dB, &ESP32S3_ADC2_CURVES, 5),
            1
        );
        // 0.2259... truncates to 0
        assert_eq!(evaluate_error(0, Attenuation::_0dB, &ESP32C3_CURVES, 3), 0);
    }

    #[test]
    fn reference_vectors() {
        let cases = [
            (&ESP32C3_CURVES, Attenuation::_0dB, 500, 2),
            (&ESP32C3_CURVES, Attenuation::_11dB, 1000, -1),
            (&ESP32C3_CURVES, Attenuation::_11dB, 2500, 47),
            (&ESP32S3_ADC1_CURVES, Attenuation::_6dB, 1000, 4),
            (&ESP32S3_ADC1_CURVES, Attenuation::_11dB, 3000, 159),
            (&ESP32S3_ADC2_CURVES, Attenuation::_2p5dB, 800, 0),
            (&ESP32S3_ADC2_CURVES, Attenuation::_11dB, 1500, 28),
        ];

        for (curves, atten, v, expected) in cases {
            assert_eq!(
                evaluate_error(v, atten, curves, term_count(atten)),
                expected,
                "{atten:?} at {v} mV"
            );
        }
    }

    #[test]
    fn fewer_terms_only_sum_the_prefix() {
        let full = evaluate_error(1000, Attenuation::_6dB, &ESP32C3_CURVES, 3);
        let constant = evaluate_error(1000, Attenuation::_6dB, &ESP32C3_CURVES, 1);
        let linear = evaluate_error(1000, Attenuation::_6dB, &ESP32C3_CURVES, 2);

        assert_eq!(constant, -1);
        assert_eq!(linear, -10);
        assert_eq!(full, 4);
    }
}
