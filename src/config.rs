//! Operating configuration of the BMP280.
//!
//! The chip is configured through two registers:
//!
//! | Register          | Address | Bits 7:5     | Bits 4:2     | Bit 1:0 / 0        |
//! |-------------------|---------|--------------|--------------|--------------------|
//! | `ctrl_meas`       | 0xF4    | `osrs_t`     | `osrs_p`     | `mode[1:0]`        |
//! | `config`          | 0xF5    | `t_sb`       | `filter`     | `spi3w_en[0]`      |
//!
//! [`OversampleConfig`] and [`StandbyFilterConfig`] hold the typed field values
//! and encode them into (and decode them from) the raw register bytes.

/// Oversampling of a single measurement channel (`osrs_t` / `osrs_p`).
///
/// Higher oversampling lowers noise at the cost of measurement time and
/// supply current. `Skipped` disables the channel entirely; its output
/// register then holds 0x80000.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// Measurement skipped.
    Skipped = 0,
    /// ×1, 16 bit resolution.
    X1 = 1,
    /// ×2, 17 bit resolution.
    X2 = 2,
    /// ×4, 18 bit resolution.
    X4 = 3,
    /// ×8, 19 bit resolution.
    X8 = 4,
    /// ×16, 20 bit resolution.
    X16 = 5,
}

impl Oversampling {
    /// Decodes a 3-bit `osrs_*` field. Codes 6 and 7 are treated as ×16 by
    /// the chip.
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            _ => Oversampling::X16,
        }
    }
}

/// Power mode of the sensor (`mode[1:0]`).
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No measurements are performed. Power-on-reset default.
    Sleep = 0b00,
    /// One measurement cycle, after which the chip returns to sleep.
    Forced = 0b01,
    /// Continuous measurement, separated by the configured standby time.
    Normal = 0b11,
}

impl Mode {
    /// Both 0b01 and 0b10 select forced mode.
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Sleep,
            0b11 => Mode::Normal,
            _ => Mode::Forced,
        }
    }
}

/// Inactive duration between two measurements in normal mode (`t_sb`).
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Standby {
    /// 0.5 ms.
    Millis0_5 = 0,
    /// 62.5 ms.
    Millis62_5 = 1,
    /// 125 ms.
    Millis125 = 2,
    /// 250 ms.
    Millis250 = 3,
    /// 500 ms.
    Millis500 = 4,
    /// 1000 ms.
    Millis1000 = 5,
    /// 2000 ms.
    Millis2000 = 6,
    /// 4000 ms.
    Millis4000 = 7,
}

impl Standby {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Standby::Millis0_5,
            1 => Standby::Millis62_5,
            2 => Standby::Millis125,
            3 => Standby::Millis250,
            4 => Standby::Millis500,
            5 => Standby::Millis1000,
            6 => Standby::Millis2000,
            _ => Standby::Millis4000,
        }
    }
}

/// IIR filter coefficient applied to the pressure and temperature outputs.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Filter {
    /// Filter off, every sample is reported as measured.
    Off = 0,
    /// Coefficient 2.
    X2 = 1,
    /// Coefficient 4.
    X4 = 2,
    /// Coefficient 8.
    X8 = 3,
    /// Coefficient 16.
    X16 = 4,
}

impl Filter {
    /// Codes 5 to 7 behave like coefficient 16.
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Filter::Off,
            1 => Filter::X2,
            2 => Filter::X4,
            3 => Filter::X8,
            _ => Filter::X16,
        }
    }
}

/// Contents of the `ctrl_meas` register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OversampleConfig {
    /// Pressure oversampling, bits 4:2.
    pub pressure: Oversampling,
    /// Temperature oversampling, bits 7:5.
    pub temperature: Oversampling,
    /// Power mode, bits 1:0.
    pub mode: Mode,
}

impl OversampleConfig {
    /// Packs the fields into the byte written to `ctrl_meas`.
    pub const fn register_value(&self) -> u8 {
        (self.temperature as u8) << 5 | (self.pressure as u8) << 2 | self.mode as u8
    }

    /// Unpacks a byte read from `ctrl_meas`.
    pub const fn from_register_value(value: u8) -> Self {
        Self {
            pressure: Oversampling::from_bits(value >> 2),
            temperature: Oversampling::from_bits(value >> 5),
            mode: Mode::from_bits(value),
        }
    }
}

/// Pressure ×4, temperature ×1, normal mode.
impl Default for OversampleConfig {
    fn default() -> Self {
        Self {
            pressure: Oversampling::X4,
            temperature: Oversampling::X1,
            mode: Mode::Normal,
        }
    }
}

/// Contents of the `config` register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandbyFilterConfig {
    /// Standby time in normal mode, bits 7:5.
    pub standby: Standby,
    /// IIR filter coefficient, bits 4:2.
    pub filter: Filter,
    /// Enables the 3-wire SPI interface, bit 0. Must stay `false` on I2C.
    pub spi3w_enable: bool,
}

impl StandbyFilterConfig {
    /// Packs the fields into the byte written to `config`.
    pub const fn register_value(&self) -> u8 {
        (self.standby as u8) << 5 | (self.filter as u8) << 2 | self.spi3w_enable as u8
    }

    /// Unpacks a byte read from `config`. Bit 1 is reserved and ignored.
    pub const fn from_register_value(value: u8) -> Self {
        Self {
            standby: Standby::from_bits(value >> 5),
            filter: Filter::from_bits(value >> 2),
            spi3w_enable: value & 0b1 != 0,
        }
    }
}

/// 0.5 ms standby, filter ×16, 3-wire SPI off.
impl Default for StandbyFilterConfig {
    fn default() -> Self {
        Self {
            standby: Standby::Millis0_5,
            filter: Filter::X16,
            spi3w_enable: false,
        }
    }
}
