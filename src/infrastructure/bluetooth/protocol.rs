//! Ember Mug Protocol
//!
//! Wire encodings of every attribute, plus the push event codes the mug sends
//! on the push-event characteristic.
//!
//! All multi-byte integers are little-endian, except the date/time and
//! control-register characteristics which are big-endian.

use crate::domain::attributes::Attribute;
use crate::domain::models::{
    AttributeValue, BatteryInfo, Colour, FirmwareInfo, LiquidState, MugMeta, TemperatureUnit,
    VolumeLevel,
};
use crate::error::{MugError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::DateTime;
use tracing::warn;

/// One wire unit of temperature is a hundredth of a degree.
pub const TEMPERATURE_SCALE: f64 = 0.01;

/// An all-zero UDSK of this length means none has been set.
const EMPTY_UDSK_LEN: usize = 20;

/// Push event codes sent on the push-event characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushEvent {
    BatteryChanged = 1,
    ChargerConnected = 2,
    ChargerDisconnected = 3,
    TargetTemperatureChanged = 4,
    DrinkTemperatureChanged = 5,
    AuthInfoNotFound = 6,
    LiquidLevelChanged = 7,
    LiquidStateChanged = 8,
    BatteryVoltageStateChanged = 9,
}

impl PushEvent {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::BatteryChanged,
            2 => Self::ChargerConnected,
            3 => Self::ChargerDisconnected,
            4 => Self::TargetTemperatureChanged,
            5 => Self::DrinkTemperatureChanged,
            6 => Self::AuthInfoNotFound,
            7 => Self::LiquidLevelChanged,
            8 => Self::LiquidStateChanged,
            9 => Self::BatteryVoltageStateChanged,
            _ => return None,
        })
    }

    /// Attribute that needs re-reading after this event, if any.
    pub fn affected_attribute(self) -> Option<Attribute> {
        match self {
            Self::BatteryChanged | Self::ChargerConnected | Self::ChargerDisconnected => {
                Some(Attribute::Battery)
            }
            Self::TargetTemperatureChanged => Some(Attribute::TargetTemp),
            Self::DrinkTemperatureChanged => Some(Attribute::CurrentTemp),
            Self::LiquidLevelChanged => Some(Attribute::LiquidLevel),
            Self::LiquidStateChanged => Some(Attribute::LiquidState),
            Self::BatteryVoltageStateChanged => Some(Attribute::BatteryVoltage),
            Self::AuthInfoNotFound => None,
        }
    }
}

pub fn bytes_to_little_int(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

pub fn bytes_to_big_int(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

pub fn celsius_to_fahrenheit(temp: f64) -> f64 {
    temp * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(temp: f64) -> f64 {
    (temp - 32.0) * 5.0 / 9.0
}

/// Convert a temperature between units. A no-op when the units agree.
pub fn convert_temperature(temp: f64, from: TemperatureUnit, to: TemperatureUnit) -> f64 {
    match (from, to) {
        (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => celsius_to_fahrenheit(temp),
        (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => fahrenheit_to_celsius(temp),
        _ => temp,
    }
}

/// Temperature in the device's own unit.
pub fn temp_from_bytes(data: &[u8]) -> f64 {
    bytes_to_little_int(data) as f64 * TEMPERATURE_SCALE
}

/// Sub-hundredth precision is dropped and out-of-range values saturate.
pub fn temp_to_bytes(temp: f64) -> [u8; 2] {
    let raw = (temp / TEMPERATURE_SCALE).round() as u16;
    raw.to_le_bytes()
}

/// Bytes to the base64 text the Ember app uses for ids and tokens.
pub fn decode_byte_string(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    STANDARD.encode(data)
}

/// Inverse of [`decode_byte_string`]. Text that is not valid base64 is sent as is.
pub fn encode_byte_string(text: &str) -> Vec<u8> {
    match STANDARD.decode(text.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to decode \"{}\" as base64 ({}), sending raw bytes", text, e);
            text.as_bytes().to_vec()
        }
    }
}

/// UTF-8 text, or a raw rendering of the bytes when they are not valid UTF-8.
pub fn bytes_to_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("Failed to decode bytes {:02X?}. Forcing to string.", data);
            format!("{:02X?}", data)
        }
    }
}

fn require_len(attribute: Attribute, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(MugError::decode(
            attribute,
            format!("expected at least {} bytes, got {}", expected, data.len()),
        ));
    }
    Ok(())
}

pub fn decode_battery(data: &[u8]) -> Result<BatteryInfo> {
    require_len(Attribute::Battery, data, 2)?;
    Ok(BatteryInfo {
        percent: f64::from(data[0]),
        on_charging_base: data[1] == 1,
    })
}

pub fn decode_firmware(data: &[u8]) -> Result<FirmwareInfo> {
    require_len(Attribute::Firmware, data, 6)?;
    Ok(FirmwareInfo {
        version: u16::from_le_bytes([data[0], data[1]]),
        hardware: u16::from_le_bytes([data[2], data[3]]),
        bootloader: u16::from_le_bytes([data[4], data[5]]),
    })
}

/// `[6 byte id][separator][serial number]`
pub fn decode_meta(data: &[u8]) -> Result<MugMeta> {
    require_len(Attribute::Meta, data, 6)?;
    Ok(MugMeta {
        mug_id: decode_byte_string(&data[..6]),
        serial_number: data.get(7..).map(bytes_to_text).unwrap_or_default(),
    })
}

pub fn decode_colour(data: &[u8]) -> Result<Colour> {
    require_len(Attribute::LedColour, data, 3)?;
    let brightness = data.get(3).copied().unwrap_or(255);
    Ok(Colour::rgba(data[0], data[1], data[2], brightness))
}

/// The firmware expects full brightness on every write.
pub fn encode_colour(colour: &Colour) -> [u8; 4] {
    [colour.red, colour.green, colour.blue, 255]
}

pub fn decode_liquid_state(data: &[u8]) -> Result<LiquidState> {
    require_len(Attribute::LiquidState, data, 1)?;
    LiquidState::try_from(data[0]).map_err(|code| {
        MugError::decode(Attribute::LiquidState, format!("unknown liquid state {code}"))
    })
}

pub fn decode_volume_level(data: &[u8]) -> Result<VolumeLevel> {
    require_len(Attribute::VolumeLevel, data, 1)?;
    VolumeLevel::try_from(data[0]).map_err(|level| {
        MugError::decode(Attribute::VolumeLevel, format!("unknown volume level {level}"))
    })
}

pub fn encode_volume_level(level: VolumeLevel) -> [u8; 1] {
    [level.state()]
}

pub fn decode_temperature_unit(data: &[u8]) -> Result<TemperatureUnit> {
    require_len(Attribute::TemperatureUnit, data, 1)?;
    Ok(if bytes_to_little_int(data) == 0 {
        TemperatureUnit::Celsius
    } else {
        TemperatureUnit::Fahrenheit
    })
}

pub fn encode_temperature_unit(unit: TemperatureUnit) -> [u8; 1] {
    match unit {
        TemperatureUnit::Celsius => [0],
        TemperatureUnit::Fahrenheit => [1],
    }
}

/// Longest name the firmware accepts.
pub const MAX_NAME_LEN: usize = 16;

const NAME_PUNCTUATION: &str = ",.[]#()!\"';:|-_+<>%= ";

/// Names are 1 to 16 characters of ASCII letters, digits, and a fixed set of
/// punctuation.
pub fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(MugError::validation(
            Attribute::Name,
            format!("must be 1-{MAX_NAME_LEN} characters"),
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !NAME_PUNCTUATION.contains(*c))
    {
        return Err(MugError::validation(
            Attribute::Name,
            format!("character {bad:?} is not allowed"),
        ));
    }
    Ok(())
}

pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    validate_name(name)?;
    Ok(name.as_bytes().to_vec())
}

/// Decode a raw read into a typed value. `Ok(None)` means the device reports
/// the value as unset.
///
/// Temperatures are returned in the device's unit; converting to the display
/// unit is up to the caller.
pub fn decode_attribute(attribute: Attribute, data: &[u8]) -> Result<Option<AttributeValue>> {
    let value = match attribute {
        Attribute::Name => AttributeValue::Name(bytes_to_text(data)),
        Attribute::Meta => AttributeValue::Meta(decode_meta(data)?),
        Attribute::Battery => AttributeValue::Battery(decode_battery(data)?),
        Attribute::Firmware => AttributeValue::Firmware(decode_firmware(data)?),
        Attribute::LedColour => AttributeValue::LedColour(decode_colour(data)?),
        Attribute::LiquidState => AttributeValue::LiquidState(decode_liquid_state(data)?),
        Attribute::LiquidLevel => {
            require_len(attribute, data, 1)?;
            AttributeValue::LiquidLevel(data[0])
        }
        Attribute::CurrentTemp => {
            require_len(attribute, data, 2)?;
            AttributeValue::CurrentTemp(temp_from_bytes(&data[..2]))
        }
        Attribute::TargetTemp => {
            require_len(attribute, data, 2)?;
            AttributeValue::TargetTemp(temp_from_bytes(&data[..2]))
        }
        Attribute::TemperatureUnit => {
            AttributeValue::TemperatureUnit(decode_temperature_unit(data)?)
        }
        Attribute::Dsk => {
            if data.is_empty() {
                return Ok(None);
            }
            AttributeValue::Dsk(decode_byte_string(data))
        }
        Attribute::Udsk => {
            if data.is_empty() || (data.len() == EMPTY_UDSK_LEN && data.iter().all(|b| *b == 0)) {
                return Ok(None);
            }
            AttributeValue::Udsk(decode_byte_string(data))
        }
        Attribute::DateTimeZone => {
            require_len(attribute, data, 4)?;
            let seconds = bytes_to_big_int(&data[..4]);
            if seconds == 0 {
                return Ok(None);
            }
            let timestamp = DateTime::from_timestamp(seconds as i64, 0).ok_or_else(|| {
                MugError::decode(attribute, format!("timestamp {seconds} out of range"))
            })?;
            AttributeValue::DateTimeZone(timestamp)
        }
        Attribute::BatteryVoltage => {
            require_len(attribute, data, 1)?;
            AttributeValue::BatteryVoltage(bytes_to_big_int(&data[..1]) as u8)
        }
        Attribute::VolumeLevel => AttributeValue::VolumeLevel(decode_volume_level(data)?),
    };
    Ok(Some(value))
}
