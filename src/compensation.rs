//! Calibration coefficients and the compensation formulas.
//!
//! The formulas are those published in the [BMP280 datasheet][ds] (section
//! 8.1 for the floating point and section 8.2 for the 64-bit fixed point
//! variant). Scaling constants are kept exactly as published since they
//! encode the mapping from the chip's fixed point representation to physical
//! units.
//!
//! Both variants implement [`Compensation`]. Temperature compensation hands
//! back a [`FineTemperature`] which pressure compensation takes as input,
//! so the temperature-before-pressure ordering shows up in the signatures.
//!
//! [ds]: https://www.bosch-sensortec.com/media/boschsensortec/downloads/datasheets/bst-bmp280-ds001.pdf

/// Number of 16-bit trim coefficients stored in NVM.
pub(crate) const CALIBRATION_COEFFICIENT_COUNT: usize = 12;

/// Trim coefficients burned into the chip's NVM at manufacture.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationCoefficients {
    /// Temperature trim T1, unsigned.
    pub dig_t1: u16,
    /// Temperature trim T2.
    pub dig_t2: i16,
    /// Temperature trim T3.
    pub dig_t3: i16,
    /// Pressure trim P1, unsigned.
    pub dig_p1: u16,
    /// Pressure trim P2.
    pub dig_p2: i16,
    /// Pressure trim P3.
    pub dig_p3: i16,
    /// Pressure trim P4.
    pub dig_p4: i16,
    /// Pressure trim P5.
    pub dig_p5: i16,
    /// Pressure trim P6.
    pub dig_p6: i16,
    /// Pressure trim P7.
    pub dig_p7: i16,
    /// Pressure trim P8.
    pub dig_p8: i16,
    /// Pressure trim P9.
    pub dig_p9: i16,
}

impl CalibrationCoefficients {
    /// Builds the coefficients from the twelve words in register order
    /// (0x88/0x89 first). Signedness follows the datasheet: `dig_T1` and
    /// `dig_P1` are unsigned, all others are two's complement.
    pub(crate) fn from_words(words: &[u16; CALIBRATION_COEFFICIENT_COUNT]) -> Self {
        Self {
            dig_t1: words[0],
            dig_t2: words[1] as i16,
            dig_t3: words[2] as i16,
            dig_p1: words[3],
            dig_p2: words[4] as i16,
            dig_p3: words[5] as i16,
            dig_p4: words[6] as i16,
            dig_p5: words[7] as i16,
            dig_p6: words[8] as i16,
            dig_p7: words[9] as i16,
            dig_p8: words[10] as i16,
            dig_p9: words[11] as i16,
        }
    }
}

/// Intermediate `t_fine` value of the temperature compensation.
///
/// Carries the chip's die temperature into the pressure formula. A value
/// obtained from a different sampling cycle yields a pressure compensated
/// for the wrong temperature.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FineTemperature(i32);

impl FineTemperature {
    /// Wraps a raw `t_fine` value.
    pub const fn from_raw(t_fine: i32) -> Self {
        FineTemperature(t_fine)
    }

    /// The raw `t_fine` value.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

/// A numeric strategy turning raw 20-bit ADC values into physical readings.
///
/// Implementations are zero-sized and selected as a type parameter, so the
/// choice is made at build time and costs nothing per call.
pub trait Compensation {
    /// Unit of the compensated temperature.
    type Temperature: Copy;
    /// Unit of the compensated pressure.
    type Pressure: Copy;

    /// Compensates a raw temperature sample.
    fn compensate_temperature(
        coeffs: &CalibrationCoefficients,
        adc_t: u32,
    ) -> (Self::Temperature, FineTemperature);

    /// Compensates a raw pressure sample at the temperature described by
    /// `t_fine`.
    ///
    /// Returns zero if the pressure polynomial's denominator evaluates to
    /// zero. Zero is a sentinel in that case, not a measured pressure.
    fn compensate_pressure(
        coeffs: &CalibrationCoefficients,
        adc_p: u32,
        t_fine: FineTemperature,
    ) -> Self::Pressure;
}

/// Double precision compensation. Temperature in °C, pressure in Pa.
#[derive(Copy, Clone, Debug, Default)]
pub struct FloatingPoint;

/// Integer-only compensation for targets without an FPU.
///
/// Temperature is returned in 1/100 °C (2508 = 25.08 °C), pressure as an
/// unsigned Q24.8 number in Pa (divide by 256 for Pa).
#[derive(Copy, Clone, Debug, Default)]
pub struct FixedPoint;

/// Compensation used when the driver's type parameter is not spelled out.
#[cfg(not(feature = "fixed-point"))]
pub type DefaultCompensation = FloatingPoint;

/// Compensation used when the driver's type parameter is not spelled out.
#[cfg(feature = "fixed-point")]
pub type DefaultCompensation = FixedPoint;

impl Compensation for FloatingPoint {
    type Temperature = f64;
    type Pressure = f64;

    fn compensate_temperature(
        coeffs: &CalibrationCoefficients,
        adc_t: u32,
    ) -> (f64, FineTemperature) {
        let adc_t = adc_t as f64;
        let t1 = coeffs.dig_t1 as f64;

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * coeffs.dig_t2 as f64;
        let var2 = ((adc_t / 131072.0 - t1 / 8192.0) * (adc_t / 131072.0 - t1 / 8192.0))
            * coeffs.dig_t3 as f64;

        let t_fine = FineTemperature((var1 + var2) as i32);
        ((var1 + var2) / 5120.0, t_fine)
    }

    fn compensate_pressure(
        coeffs: &CalibrationCoefficients,
        adc_p: u32,
        t_fine: FineTemperature,
    ) -> f64 {
        let mut var1 = (t_fine.0 as f64 / 2.0) - 64000.0;
        let mut var2 = var1 * var1 * coeffs.dig_p6 as f64 / 32768.0;
        var2 += var1 * coeffs.dig_p5 as f64 * 2.0;
        var2 = (var2 / 4.0) + (coeffs.dig_p4 as f64 * 65536.0);
        var1 = (coeffs.dig_p3 as f64 * var1 * var1 / 524288.0 + coeffs.dig_p2 as f64 * var1)
            / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * coeffs.dig_p1 as f64;

        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - adc_p as f64;
        p = (p - (var2 / 4096.0)) * 6250.0 / var1;
        var1 = coeffs.dig_p9 as f64 * p * p / 2147483648.0;
        var2 = p * coeffs.dig_p8 as f64 / 32768.0;
        p + (var1 + var2 + coeffs.dig_p7 as f64) / 16.0
    }
}

impl Compensation for FixedPoint {
    type Temperature = i32;
    type Pressure = u32;

    /// The 32-bit datasheet formula, evaluated in 64 bits. For a 20-bit
    /// sample `t_fine` stays below 2^23, so narrowing the results is exact.
    fn compensate_temperature(
        coeffs: &CalibrationCoefficients,
        adc_t: u32,
    ) -> (i32, FineTemperature) {
        let adc_t = adc_t as i64;
        let t1 = coeffs.dig_t1 as i64;
        let t2 = coeffs.dig_t2 as i64;
        let t3 = coeffs.dig_t3 as i64;

        let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * t3) >> 14;

        let t_fine = var1 + var2;
        let temperature = (t_fine * 5 + 128) >> 8;
        (temperature as i32, FineTemperature(t_fine as i32))
    }

    /// Intermediate products wrap like the two's complement reference does.
    /// Plausible trim values never get there, nonsensical ones yield a
    /// nonsensical pressure instead of a panic.
    fn compensate_pressure(
        coeffs: &CalibrationCoefficients,
        adc_p: u32,
        t_fine: FineTemperature,
    ) -> u32 {
        let mut var1 = t_fine.0 as i64 - 128000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(coeffs.dig_p6 as i64);
        var2 = var2.wrapping_add(var1.wrapping_mul(coeffs.dig_p5 as i64) << 17);
        var2 = var2.wrapping_add((coeffs.dig_p4 as i64) << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(coeffs.dig_p3 as i64) >> 8)
            .wrapping_add(var1.wrapping_mul(coeffs.dig_p2 as i64) << 12);
        var1 = (1_i64 << 47).wrapping_add(var1).wrapping_mul(coeffs.dig_p1 as i64) >> 33;

        if var1 == 0 {
            return 0;
        }

        let mut p = 1048576 - adc_p as i64;
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        var1 = (coeffs.dig_p9 as i64).wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = (coeffs.dig_p8 as i64).wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8)
            .wrapping_add((coeffs.dig_p7 as i64) << 4);
        p as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Coefficients from the worked example in section 3.12 of the BMP280
    /// datasheet.
    fn get_sample_coefficients() -> CalibrationCoefficients {
        CalibrationCoefficients {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
        }
    }

    /// Sample ADC values (pressure, temperature) from the same example.
    fn get_sample_adc_values() -> (u32, u32) {
        (415148, 519888)
    }

    #[test]
    fn words_are_split_by_signedness() {
        let mut words = [0_u16; CALIBRATION_COEFFICIENT_COUNT];
        words[0] = 0xFC18;
        words[1] = 0xFC18;
        words[3] = 0x8E7D;
        words[11] = 0x8000;
        let coeffs = CalibrationCoefficients::from_words(&words);
        assert_eq!(coeffs.dig_t1, 0xFC18);
        assert_eq!(coeffs.dig_t2, -1000);
        assert_eq!(coeffs.dig_p1, 36477);
        assert_eq!(coeffs.dig_p9, i16::MIN);
    }

    #[test]
    fn floating_point_with_sample_coefficients() {
        let coeffs = get_sample_coefficients();
        let (adc_p, adc_t) = get_sample_adc_values();

        let (temperature, t_fine) = FloatingPoint::compensate_temperature(&coeffs, adc_t);
        assert_eq!(t_fine.raw(), 128422);
        assert!((temperature - 25.08).abs() < 0.005, "temperature {}", temperature);

        let pressure = FloatingPoint::compensate_pressure(&coeffs, adc_p, t_fine);
        assert!((pressure - 100653.26).abs() < 0.01, "pressure {}", pressure);
    }

    #[test]
    fn fixed_point_with_sample_coefficients() {
        let coeffs = get_sample_coefficients();
        let (adc_p, adc_t) = get_sample_adc_values();

        let (temperature, t_fine) = FixedPoint::compensate_temperature(&coeffs, adc_t);
        assert_eq!(t_fine.raw(), 128422);
        assert_eq!(temperature, 2508);

        let pressure = FixedPoint::compensate_pressure(&coeffs, adc_p, t_fine);
        assert_eq!(pressure, 25_767_233);
        assert_eq!(pressure / 256, 100653);
    }

    /// Trim values in the range seen on production chips.
    fn get_typical_coefficient_sets() -> [CalibrationCoefficients; 3] {
        let sample = get_sample_coefficients();
        [
            sample,
            CalibrationCoefficients {
                dig_t1: 28009,
                dig_t2: 25654,
                dig_t3: 50,
                dig_p1: 39145,
                dig_p2: -10750,
                dig_p4: 5782,
                dig_p5: -140,
                ..sample
            },
            CalibrationCoefficients {
                dig_t1: 27100,
                dig_t2: 26800,
                dig_p1: 37200,
                dig_p2: -10500,
                dig_p4: 4000,
                dig_p5: 100,
                ..sample
            },
        ]
    }

    /// Every 4099th raw value from 0, plus full scale.
    fn raw_sweep() -> impl Iterator<Item = u32> {
        (0..=0xFFFFF).step_by(4099).chain(core::iter::once(0xFFFFF))
    }

    fn max_temperature_delta(coeffs: &CalibrationCoefficients) -> f64 {
        raw_sweep()
            .map(|adc_t| {
                let (float_t, _) = FloatingPoint::compensate_temperature(coeffs, adc_t);
                let (fixed_t, _) = FixedPoint::compensate_temperature(coeffs, adc_t);
                (float_t - fixed_t as f64 / 100.0).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn variants_agree_after_unit_normalization() {
        for coeffs in get_typical_coefficient_sets().iter() {
            let delta = max_temperature_delta(coeffs);
            assert!(delta <= 0.01, "{:?}: temperature delta {}", coeffs, delta);

            for adc_t in (380_000..=620_000).step_by(4999) {
                let (_, float_fine) = FloatingPoint::compensate_temperature(coeffs, adc_t);
                let (_, fixed_fine) = FixedPoint::compensate_temperature(coeffs, adc_t);

                for adc_p in (0..=0xFFFFF).step_by(7919).chain(core::iter::once(0xFFFFF)) {
                    let float_p = FloatingPoint::compensate_pressure(coeffs, adc_p, float_fine);
                    if !(30_000.0..=110_000.0).contains(&float_p) {
                        continue;
                    }
                    let fixed_p = FixedPoint::compensate_pressure(coeffs, adc_p, fixed_fine);
                    let delta = (float_p - fixed_p as f64 / 256.0).abs();
                    assert!(delta <= 1.0, "adc_p {}: {} vs {}", adc_p, float_p, fixed_p);
                }
            }
        }
    }

    #[test]
    fn variants_stay_close_with_extreme_temperature_trims() {
        let extremes = [
            (0, i16::MAX, -1000),
            (u16::MAX, i16::MIN, i16::MAX),
            (27504, 26435, i16::MIN),
            (u16::MAX, i16::MAX, i16::MAX),
        ];
        for &(dig_t1, dig_t2, dig_t3) in extremes.iter() {
            let coeffs = CalibrationCoefficients {
                dig_t1,
                dig_t2,
                dig_t3,
                ..get_sample_coefficients()
            };
            // Coarser integer rounding, still within two hundredths.
            let delta = max_temperature_delta(&coeffs);
            assert!(delta <= 0.02, "{:?}: temperature delta {}", coeffs, delta);
        }
    }

    #[test]
    fn fixed_point_temperature_at_full_scale() {
        let coeffs = |dig_t1, dig_t2, dig_t3| CalibrationCoefficients {
            dig_t1,
            dig_t2,
            dig_t3,
            ..CalibrationCoefficients::default()
        };

        let (temperature, t_fine) = FixedPoint::compensate_temperature(&coeffs(0, 1, 1), 0xFFFFF);
        assert_eq!((temperature, t_fine.raw()), (2, 126));

        let (temperature, t_fine) =
            FixedPoint::compensate_temperature(&coeffs(0, i16::MAX, -1000), 0xFFFFF);
        assert_eq!((temperature, t_fine.raw()), (39708, 2033073));

        let (temperature, t_fine) =
            FixedPoint::compensate_temperature(&coeffs(27504, i16::MAX, -1000), 0xFFFFF);
        assert_eq!((temperature, t_fine.raw()), (23348, 1195417));

        let (temperature, t_fine) =
            FixedPoint::compensate_temperature(&coeffs(u16::MAX, i16::MIN, i16::MAX), 0);
        assert_eq!((temperature, t_fine.raw()), (81917, 4194144));
    }

    #[test]
    fn fixed_point_pressure_with_extreme_pressure_trims() {
        let all_max = CalibrationCoefficients {
            dig_t1: 0,
            dig_t2: i16::MAX,
            dig_t3: -1000,
            dig_p1: u16::MAX,
            dig_p2: i16::MAX,
            dig_p3: i16::MAX,
            dig_p4: i16::MAX,
            dig_p5: i16::MAX,
            dig_p6: i16::MAX,
            dig_p7: i16::MAX,
            dig_p8: i16::MAX,
            dig_p9: i16::MAX,
        };
        let all_min = CalibrationCoefficients {
            dig_p2: i16::MIN,
            dig_p3: i16::MIN,
            dig_p4: i16::MIN,
            dig_p5: i16::MIN,
            dig_p6: i16::MIN,
            dig_p7: i16::MIN,
            dig_p8: i16::MIN,
            dig_p9: i16::MIN,
            ..all_max
        };

        for coeffs in [all_max, all_min].iter() {
            for &adc_t in [0, 0xFFFFF].iter() {
                let (_, t_fine) = FixedPoint::compensate_temperature(coeffs, adc_t);
                for &adc_p in [0, 415148, 0xFFFFF].iter() {
                    assert_eq!(
                        FixedPoint::compensate_pressure(coeffs, adc_p, t_fine),
                        FixedPoint::compensate_pressure(coeffs, adc_p, t_fine)
                    );
                }
            }
        }
    }

    #[test]
    fn temperature_compensation_is_deterministic() {
        let coeffs = get_sample_coefficients();
        let (_, adc_t) = get_sample_adc_values();

        assert_eq!(
            FloatingPoint::compensate_temperature(&coeffs, adc_t),
            FloatingPoint::compensate_temperature(&coeffs, adc_t)
        );
        assert_eq!(
            FixedPoint::compensate_temperature(&coeffs, adc_t),
            FixedPoint::compensate_temperature(&coeffs, adc_t)
        );
    }

    #[test]
    fn pressure_depends_only_on_given_fine_temperature() {
        let coeffs = get_sample_coefficients();
        let (adc_p, _) = get_sample_adc_values();

        // A stale or default t_fine gives a repeatable, but wrong, pressure.
        let stale = FineTemperature::default();
        let first = FloatingPoint::compensate_pressure(&coeffs, adc_p, stale);
        let second = FloatingPoint::compensate_pressure(&coeffs, adc_p, stale);
        assert_eq!(first, second);
        assert!((first - 96821.06).abs() < 0.01, "pressure {}", first);

        assert_eq!(
            FixedPoint::compensate_pressure(&coeffs, adc_p, stale),
            FixedPoint::compensate_pressure(&coeffs, adc_p, stale)
        );
        assert_eq!(FixedPoint::compensate_pressure(&coeffs, adc_p, stale), 24_786_192);

        let fresh = FineTemperature::from_raw(128422);
        let pressure = FloatingPoint::compensate_pressure(&coeffs, adc_p, fresh);
        assert!((pressure - 100653.26).abs() < 0.01, "pressure {}", pressure);
    }

    #[test]
    fn zero_denominator_returns_zero() {
        let coeffs = CalibrationCoefficients {
            dig_p1: 0,
            ..get_sample_coefficients()
        };
        let (adc_p, adc_t) = get_sample_adc_values();

        let (_, t_fine) = FloatingPoint::compensate_temperature(&coeffs, adc_t);
        assert_eq!(FloatingPoint::compensate_pressure(&coeffs, adc_p, t_fine), 0.0);

        let (_, t_fine) = FixedPoint::compensate_temperature(&coeffs, adc_t);
        assert_eq!(FixedPoint::compensate_pressure(&coeffs, adc_p, t_fine), 0);
    }
}
