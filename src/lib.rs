//! Implements a driver for accessing a BMP280 temperature and pressure sensor.
//!
//! The library is built to work with [`embedded-hal`] and talks to the chip
//! over I2C using single-byte register reads and writes. Temperature and
//! pressure compensation follow the [datasheet definition][bmp280], and are
//! available as double precision ([`FloatingPoint`], the default) or as
//! integer-only arithmetic ([`FixedPoint`]) for targets without an FPU. The
//! integer variant becomes the default with the feature flag `fixed-point`.
//! Barometric altitude helpers may be enabled using the `altitude-adjust`
//! feature flag, and initialization diagnostics are logged through `defmt`
//! when the `defmt` feature flag is set.
//!
//! [bmp280]: https://www.bosch-sensortec.com/media/boschsensortec/downloads/datasheets/bst-bmp280-ds001.pdf
//!
//! # Usage
//!
//! Provide something that can delay execution by a specific time, and a
//! reference to the I2C bus itself:
//!
//! ```ignore
//! let mut bmp280: bmp280::BMP280<_> = bmp280::BMP280::new(
//!     &mut syst_delay,
//!     &mut i2c,
//!     bmp280::Address::SdoGnd,
//!     bmp280::OversampleConfig::default(),
//!     bmp280::StandbyFilterConfig::default(),
//! )?;
//! let reading = bmp280.read_temperature_and_pressure(&mut i2c)?;
//! ```
//!
//! The driver never owns the bus, so it can be cooperatively used with other
//! sensors on the same I2C bus. Access to the bus has to be serialized by the
//! caller, since register sequences are not atomic.
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

mod compensation;
mod config;

pub use compensation::{
    CalibrationCoefficients, Compensation, DefaultCompensation, FineTemperature, FixedPoint,
    FloatingPoint,
};
pub use config::{Filter, Mode, OversampleConfig, Oversampling, Standby, StandbyFilterConfig};

use compensation::CALIBRATION_COEFFICIENT_COUNT;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

/// Expected content of the chip identification register.
pub const BMP280_CHIP_ID: u8 = 0x58;

/// Chip identification register.
const BMP280_CHIP_ID_REGISTER: u8 = 0xD0;

/// Soft reset register.
const BMP280_RESET_REGISTER: u8 = 0xE0;

/// Value triggering a complete power-on-reset when written to the reset
/// register.
const BMP280_RESET_VALUE: u8 = 0xB6;

/// Status register, see [`StatusFlag`].
const BMP280_STATUS_REGISTER: u8 = 0xF3;

/// Oversampling and power mode register.
const BMP280_CTRL_MEAS_REGISTER: u8 = 0xF4;

/// Standby time, IIR filter and interface register.
const BMP280_CONFIG_REGISTER: u8 = 0xF5;

/// First of the three pressure data registers (MSB, LSB, XLSB).
const BMP280_PRESSURE_MSB_REGISTER: u8 = 0xF7;

/// First of the three temperature data registers (MSB, LSB, XLSB).
const BMP280_TEMPERATURE_MSB_REGISTER: u8 = 0xFA;

/// Register of the low byte of `dig_T1`. The calibration block spans
/// 0x88 to 0x9F.
const BMP280_CALIBRATION_START_REGISTER: u8 = 0x88;

/// Start-up time after a power-on or soft reset, in milliseconds.
const BMP280_STARTUP_TIME_MS: u32 = 2;

/// 7-bit unshifted I2C address, selected by the level of the SDO pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Address {
    /// SDO tied to GND.
    SdoGnd = 0x76,
    /// SDO tied to VDDIO.
    SdoVddio = 0x77,
}

impl Default for Address {
    fn default() -> Self {
        Address::SdoGnd
    }
}

/// Condition bits of the status register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusFlag {
    /// Bit 0, set while a conversion is running.
    Measuring = 0x01,
    /// Bit 3, set while NVM data is copied to the image registers.
    ImUpdate = 0x08,
}

/// Represents an I2C-connected BMP280 sensor.
///
/// `C` selects the compensation arithmetic, see [`Compensation`].
#[derive(Copy, Clone, Debug)]
pub struct BMP280<I2C, C = DefaultCompensation> {
    /// I2C address of the chip.
    address: Address,

    /// Calibration coefficients read from the chip during initialization.
    coeffs: CalibrationCoefficients,

    /// `t_fine` of the most recent temperature compensation.
    fine_temperature: FineTemperature,

    /// Compensation variant.
    _compensation: core::marker::PhantomData<C>,

    /// I2C Interface for communicating with the sensor.
    _i2c: core::marker::PhantomData<I2C>,
}

impl<I2C, C> BMP280<I2C, C>
where
    I2C: Write + WriteRead,
    C: Compensation,
{
    /// Creates a connection with a BMP280 sensor via I2C.
    ///
    /// Initialization sequence:
    /// - Verifies the chip ID, aborting before anything is written if it is
    ///   not [`BMP280_CHIP_ID`]. The chip then stays in its power-on sleep
    ///   mode.
    /// - Reads the calibration coefficients.
    /// - Soft-resets the chip and waits for it to start up.
    /// - Writes `ctrl_meas` and then `config`.
    ///
    pub fn new<D>(
        delay: &mut D,
        i2c: &mut I2C,
        address: Address,
        oversample: OversampleConfig,
        standby_filter: StandbyFilterConfig,
    ) -> Result<Self>
    where
        D: DelayMs<u32>,
    {
        let chip_id = chip_id(i2c, address)?;
        if chip_id != BMP280_CHIP_ID {
            #[cfg(feature = "defmt")]
            defmt::error!("BMP280: invalid chip ID {=u8:#x}", chip_id);
            return Err(BMP280Error::IdentityMismatch(chip_id));
        }

        let coeffs = load_calibration(i2c, address)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("BMP280: calibration loaded {}", coeffs);

        let bmp280 = Self {
            address,
            coeffs,
            fine_temperature: FineTemperature::default(),
            _compensation: core::marker::PhantomData,
            _i2c: core::marker::PhantomData,
        };

        bmp280.soft_reset(i2c)?;
        delay.delay_ms(BMP280_STARTUP_TIME_MS);

        bmp280.set_oversample_and_mode(i2c, &oversample)?;
        bmp280.set_standby_and_filter(i2c, &standby_filter)?;

        #[cfg(feature = "defmt")]
        defmt::info!("BMP280: initialized at {=u8:#x}", address as u8);

        Ok(bmp280)
    }

    /// Reads the chip ID and compares it to [`BMP280_CHIP_ID`].
    pub fn verify_identity(&self, i2c: &mut I2C) -> Result<bool> {
        verify_identity(i2c, self.address)
    }

    /// Triggers a complete power-on-reset. Configuration registers return
    /// to their defaults, calibration coefficients are not affected.
    pub fn soft_reset(&self, i2c: &mut I2C) -> Result<()> {
        write_register(i2c, self.address, BMP280_RESET_REGISTER, BMP280_RESET_VALUE)
    }

    /// Writes oversampling and power mode to `ctrl_meas`.
    pub fn set_oversample_and_mode(&self, i2c: &mut I2C, config: &OversampleConfig) -> Result<()> {
        write_register(
            i2c,
            self.address,
            BMP280_CTRL_MEAS_REGISTER,
            config.register_value(),
        )
    }

    /// Writes standby time, IIR filter and interface selection to `config`.
    ///
    /// Writes in normal mode may be ignored by the chip; switch to sleep
    /// mode first when reconfiguring a running sensor.
    pub fn set_standby_and_filter(
        &self,
        i2c: &mut I2C,
        config: &StandbyFilterConfig,
    ) -> Result<()> {
        write_register(
            i2c,
            self.address,
            BMP280_CONFIG_REGISTER,
            config.register_value(),
        )
    }

    /// Reads back the current content of `ctrl_meas`.
    pub fn oversample_and_mode(&self, i2c: &mut I2C) -> Result<OversampleConfig> {
        let value = read_register(i2c, self.address, BMP280_CTRL_MEAS_REGISTER)?;
        Ok(OversampleConfig::from_register_value(value))
    }

    /// Reads back the current content of `config`.
    pub fn standby_and_filter(&self, i2c: &mut I2C) -> Result<StandbyFilterConfig> {
        let value = read_register(i2c, self.address, BMP280_CONFIG_REGISTER)?;
        Ok(StandbyFilterConfig::from_register_value(value))
    }

    /// Reads the status register and returns whether `flag` is set.
    pub fn get_status(&self, i2c: &mut I2C, flag: StatusFlag) -> Result<bool> {
        let status = read_register(i2c, self.address, BMP280_STATUS_REGISTER)?;
        Ok(status & flag as u8 != 0)
    }

    /// Reads the raw 20-bit pressure ADC value.
    pub fn read_raw_pressure(&self, i2c: &mut I2C) -> Result<u32> {
        read_raw_sample(i2c, self.address, BMP280_PRESSURE_MSB_REGISTER)
    }

    /// Reads the raw 20-bit temperature ADC value.
    pub fn read_raw_temperature(&self, i2c: &mut I2C) -> Result<u32> {
        read_raw_sample(i2c, self.address, BMP280_TEMPERATURE_MSB_REGISTER)
    }

    /// Compensates a raw temperature value and keeps its `t_fine` for
    /// subsequent pressure compensation.
    pub fn compensate_temperature(&mut self, adc_t: u32) -> C::Temperature {
        let (temperature, t_fine) = C::compensate_temperature(&self.coeffs, adc_t);
        self.fine_temperature = t_fine;
        temperature
    }

    /// Compensates a raw pressure value using the `t_fine` of the last
    /// [`compensate_temperature`](Self::compensate_temperature) call.
    ///
    /// Before the first temperature compensation `t_fine` is zero, and the
    /// result is a repeatable but wrong pressure. A zero result means the
    /// compensation polynomial degenerated and no pressure is available.
    pub fn compensate_pressure(&self, adc_p: u32) -> C::Pressure {
        C::compensate_pressure(&self.coeffs, adc_p, self.fine_temperature)
    }

    /// Reads and compensates the temperature.
    pub fn read_temperature(&mut self, i2c: &mut I2C) -> Result<C::Temperature> {
        let adc_t = self.read_raw_temperature(i2c)?;
        Ok(self.compensate_temperature(adc_t))
    }

    /// Reads and compensates the pressure.
    ///
    /// The same caveats as for
    /// [`compensate_pressure`](Self::compensate_pressure) apply; prefer
    /// [`read_temperature_and_pressure`](Self::read_temperature_and_pressure)
    /// unless the temperature was read just before.
    pub fn read_pressure(&self, i2c: &mut I2C) -> Result<C::Pressure> {
        let adc_p = self.read_raw_pressure(i2c)?;
        Ok(self.compensate_pressure(adc_p))
    }

    /// Reads the temperature and pressure ADC values and computes the
    /// compensated values, temperature first.
    pub fn read_temperature_and_pressure(
        &mut self,
        i2c: &mut I2C,
    ) -> Result<Reading<C::Temperature, C::Pressure>> {
        let temperature = self.read_temperature(i2c)?;
        let pressure = self.read_pressure(i2c)?;

        Ok(Reading {
            temperature,
            pressure,
        })
    }

    /// Calibration coefficients read during initialization.
    pub fn calibration(&self) -> &CalibrationCoefficients {
        &self.coeffs
    }

    /// `t_fine` of the most recent temperature compensation.
    pub fn fine_temperature(&self) -> FineTemperature {
        self.fine_temperature
    }
}

/// Represents the reading gotten from the sensor, in the units of the
/// selected [`Compensation`].
#[derive(Default, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading<T, P> {
    /// Temperature.
    pub temperature: T,

    /// Pressure.
    pub pressure: P,
}

/// Shorthand for all functions returning an error in this module.
pub type Result<T> = core::result::Result<T, BMP280Error>;

/// Represents any error that may happen during communication.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BMP280Error {
    /// The chip ID register did not hold [`BMP280_CHIP_ID`]. Carries the
    /// value read.
    IdentityMismatch(u8),
    /// A register read was not acknowledged.
    ReadI2CError,
    /// A register write was not acknowledged.
    WriteI2CError,
}

/// Given a pressure (Pa) taken at a specific altitude (meters), returns
/// the equivalent pressure (Pa) at sea level.
///
/// This produces pressure readings that can be used for weather
/// measurements.
///
#[cfg(feature = "altitude-adjust")]
pub fn adjust_to_sea_level(absolute_pressure: f32, actual_altitude: f32) -> f32 {
    absolute_pressure / libm::powf(1.0 - (actual_altitude / 44330.0), 5.255)
}

/// Given a pressure measurement (Pa) and the pressure at a baseline (Pa),
/// returns the altitude change (in meters) for the delta in pressures.
#[cfg(feature = "altitude-adjust")]
pub fn altitude_change(current_pressure: f32, baseline_pressure: f32) -> f32 {
    44330.0 * (1.0 - libm::powf(current_pressure / baseline_pressure, 1.0 / 5.255))
}

/// Writes a single register: the register pointer followed by the value.
fn write_register<I2C>(i2c: &mut I2C, address: Address, register: u8, value: u8) -> Result<()>
where
    I2C: Write,
{
    i2c.write(address as u8, &[register, value])
        .map_err(|_| BMP280Error::WriteI2CError)
}

/// Reads a single register: the register pointer is written, then one byte
/// is read after a repeated start.
fn read_register<I2C>(i2c: &mut I2C, address: Address, register: u8) -> Result<u8>
where
    I2C: WriteRead,
{
    let mut buf = [0_u8; 1];
    i2c.write_read(address as u8, &[register], &mut buf)
        .map_err(|_| BMP280Error::ReadI2CError)?;
    Ok(buf[0])
}

/// Reads the chip identification register.
pub fn chip_id<I2C>(i2c: &mut I2C, address: Address) -> Result<u8>
where
    I2C: WriteRead,
{
    read_register(i2c, address, BMP280_CHIP_ID_REGISTER)
}

/// Checks whether the device at `address` identifies as a BMP280.
pub fn verify_identity<I2C>(i2c: &mut I2C, address: Address) -> Result<bool>
where
    I2C: WriteRead,
{
    Ok(chip_id(i2c, address)? == BMP280_CHIP_ID)
}

/// Reads the calibration coefficients, one register at a time, low byte
/// before high byte.
///
/// Only meaningful once [`verify_identity`] succeeded.
pub fn load_calibration<I2C>(i2c: &mut I2C, address: Address) -> Result<CalibrationCoefficients>
where
    I2C: WriteRead,
{
    let mut words = [0_u16; CALIBRATION_COEFFICIENT_COUNT];
    for (idx, word) in words.iter_mut().enumerate() {
        let lsb_register = BMP280_CALIBRATION_START_REGISTER + idx as u8 * 2;
        let lsb = read_register(i2c, address, lsb_register)?;
        let msb = read_register(i2c, address, lsb_register + 1)?;
        *word = u16::from_le_bytes([lsb, msb]);
    }

    Ok(CalibrationCoefficients::from_words(&words))
}

/// Reads MSB, LSB and XLSB starting at `msb_register` and assembles the
/// 20-bit ADC value.
///
/// The three reads are independent transactions; a conversion finishing in
/// between yields a torn sample.
fn read_raw_sample<I2C>(i2c: &mut I2C, address: Address, msb_register: u8) -> Result<u32>
where
    I2C: WriteRead,
{
    let msb = read_register(i2c, address, msb_register)?;
    let lsb = read_register(i2c, address, msb_register + 1)?;
    let xlsb = read_register(i2c, address, msb_register + 2)?;
    Ok(assemble_raw_sample(msb, lsb, xlsb))
}

/// Combines the data registers into the 20-bit ADC value. Only the upper
/// nibble of `xlsb` holds data.
pub const fn assemble_raw_sample(msb: u8, lsb: u8, xlsb: u8) -> u32 {
    (msb as u32) << 12 | (lsb as u32) << 4 | (xlsb as u32) >> 4
}
