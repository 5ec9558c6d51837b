//! Typed attribute values and the change records built from them.

use super::attributes::Attribute;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum raw liquid level reported by the device.
pub const LIQUID_LEVEL_MAX: u8 = 30;

/// Temperature unit the device (or the user) works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_metric(use_metric: bool) -> Self {
        if use_metric {
            Self::Celsius
        } else {
            Self::Fahrenheit
        }
    }

    /// Allowed target temperature range in this unit.
    pub const fn target_range(self) -> (f64, f64) {
        match self {
            Self::Celsius => (49.0, 63.0),
            Self::Fahrenheit => (120.0, 145.0),
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What the device is currently doing with the liquid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidState {
    Standby = 0,
    Empty = 1,
    Filling = 2,
    ColdNoTempControl = 3,
    Cooling = 4,
    Heating = 5,
    TargetTemperature = 6,
    WarmNoTempControl = 7,
}

impl LiquidState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standby => "Standby",
            Self::Empty => "Empty",
            Self::Filling => "Filling",
            Self::ColdNoTempControl => "Cold (No control)",
            Self::Cooling => "Cooling",
            Self::Heating => "Heating",
            Self::TargetTemperature => "Perfect",
            Self::WarmNoTempControl => "Warm (No control)",
        }
    }
}

impl TryFrom<u8> for LiquidState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Standby,
            1 => Self::Empty,
            2 => Self::Filling,
            3 => Self::ColdNoTempControl,
            4 => Self::Cooling,
            5 => Self::Heating,
            6 => Self::TargetTemperature,
            7 => Self::WarmNoTempControl,
            other => return Err(other),
        })
    }
}

impl fmt::Display for LiquidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Speaker volume of the travel mug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeLevel {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl VolumeLevel {
    pub const fn state(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for VolumeLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            other => Err(other),
        }
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub percent: f64,
    pub on_charging_base: bool,
}

impl fmt::Display for BatteryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}%, {}on charging base",
            self.percent,
            if self.on_charging_base { "" } else { "not " }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub version: u16,
    pub hardware: u16,
    pub bootloader: u16,
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, Hardware: {}, Bootloader: {}",
            self.version, self.hardware, self.bootloader
        )
    }
}

/// Unique id and serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MugMeta {
    pub mug_id: String,
    pub serial_number: String,
}

impl fmt::Display for MugMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mug ID: {}, Serial Number: {}",
            self.mug_id, self.serial_number
        )
    }
}

/// LED colour with brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
}

impl Colour {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            brightness: 255,
        }
    }

    pub const fn rgba(red: u8, green: u8, blue: u8, brightness: u8) -> Self {
        Self {
            red,
            green,
            blue,
            brightness,
        }
    }

    /// `#rrggbb`, brightness is not included.
    pub fn as_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

/// Parse error for [`Colour`] text input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid rgba or hex colour")]
pub struct ParseColourError(pub String);

impl FromStr for Colour {
    type Err = ParseColourError;

    /// Accepts `#rrggbb`, `#rrggbbaa`, `rrggbb` or `r,g,b[,a]`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let err = || ParseColourError(value.to_string());
        let trimmed = value.trim();

        if trimmed.contains(',') {
            let parts = trimmed
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| err())?;
            return match parts.as_slice() {
                [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Self::rgba(*r, *g, *b, *a)),
                _ => Err(err()),
            };
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let brightness = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, brightness))
    }
}

/// A decoded value of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Name(String),
    Meta(MugMeta),
    Battery(BatteryInfo),
    Firmware(FirmwareInfo),
    LedColour(Colour),
    LiquidState(LiquidState),
    LiquidLevel(u8),
    CurrentTemp(f64),
    TargetTemp(f64),
    TemperatureUnit(TemperatureUnit),
    Dsk(String),
    Udsk(String),
    DateTimeZone(DateTime<Utc>),
    BatteryVoltage(u8),
    VolumeLevel(VolumeLevel),
}

impl AttributeValue {
    /// Attribute this value belongs to.
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Name(_) => Attribute::Name,
            Self::Meta(_) => Attribute::Meta,
            Self::Battery(_) => Attribute::Battery,
            Self::Firmware(_) => Attribute::Firmware,
            Self::LedColour(_) => Attribute::LedColour,
            Self::LiquidState(_) => Attribute::LiquidState,
            Self::LiquidLevel(_) => Attribute::LiquidLevel,
            Self::CurrentTemp(_) => Attribute::CurrentTemp,
            Self::TargetTemp(_) => Attribute::TargetTemp,
            Self::TemperatureUnit(_) => Attribute::TemperatureUnit,
            Self::Dsk(_) => Attribute::Dsk,
            Self::Udsk(_) => Attribute::Udsk,
            Self::DateTimeZone(_) => Attribute::DateTimeZone,
            Self::BatteryVoltage(_) => Attribute::BatteryVoltage,
            Self::VolumeLevel(_) => Attribute::VolumeLevel,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(v) | Self::Dsk(v) | Self::Udsk(v) => f.write_str(v),
            Self::Meta(v) => fmt::Display::fmt(v, f),
            Self::Battery(v) => fmt::Display::fmt(v, f),
            Self::Firmware(v) => fmt::Display::fmt(v, f),
            Self::LedColour(v) => fmt::Display::fmt(v, f),
            Self::LiquidState(v) => fmt::Display::fmt(v, f),
            Self::LiquidLevel(v) => fmt::Display::fmt(v, f),
            Self::CurrentTemp(v) | Self::TargetTemp(v) => write!(f, "{v:.2}"),
            Self::TemperatureUnit(v) => fmt::Display::fmt(v, f),
            Self::DateTimeZone(v) => fmt::Display::fmt(v, f),
            Self::BatteryVoltage(v) => fmt::Display::fmt(v, f),
            Self::VolumeLevel(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// One attribute that changed during an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub attribute: Attribute,
    pub old_value: Option<AttributeValue>,
    pub new_value: Option<AttributeValue>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<AttributeValue>| {
            value
                .as_ref()
                .map_or_else(|| "Unknown".to_string(), ToString::to_string)
        };
        write!(
            f,
            "{} changed from \"{}\" to \"{}\"",
            title_case(self.attribute.as_str()),
            show(&self.old_value),
            show(&self.new_value)
        )
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
