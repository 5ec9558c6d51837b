//! Attribute catalogue
//!
//! Maps the logical attributes of a mug onto the GATT characteristics that
//! carry them. Every characteristic address is derived from its 16-bit id by
//! a fixed 128-bit template.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// `fc54XXXX-236c-4c94-8fa9-944a3e5353fa` with the id field zeroed.
const UUID_TEMPLATE: u128 = 0xfc54_0000_236c_4c94_8fa9_944a_3e53_53fa;

/// Characteristic and service ids exposed by the mug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Characteristic {
    /// Name of the mug as a byte string (read/write)
    MugName = 1,
    /// Current drink temperature (read)
    CurrentTemperature = 2,
    /// Target temperature (read/write)
    TargetTemperature = 3,
    /// 0 -> Celsius, 1 -> Fahrenheit (read/write)
    TemperatureUnit = 4,
    /// Liquid level, 0..=30
    LiquidLevel = 5,
    DateTimeAndZone = 6,
    Battery = 7,
    LiquidState = 8,
    /// Travel mug speaker volume
    Volume = 9,
    LastLocation = 10,
    Acceleration = 11,
    Firmware = 12,
    /// `[unique id]-[serial number]`
    MugId = 13,
    Dsk = 14,
    Udsk = 15,
    ControlRegisterAddress = 16,
    /// Battery voltage and charge info
    ControlRegisterData = 17,
    /// Push events (notify/read)
    PushEvent = 18,
    /// Statistics stream (notify)
    Statistics = 19,
    /// RGBA colour of the LED (read/write)
    Led = 20,
    StandardService = 13858,
    TravelMugService = 13857,
    TravelMugServiceOther = 8609,
}

impl Characteristic {
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Full 128-bit address of this characteristic.
    pub const fn uuid(self) -> Uuid {
        Uuid::from_u128(UUID_TEMPLATE | ((self.id() as u128) << 96))
    }

    /// Reverse lookup used when a notification arrives tagged only by address.
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        ALL_CHARACTERISTICS.iter().copied().find(|c| c.uuid() == uuid)
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid())
    }
}

const ALL_CHARACTERISTICS: [Characteristic; 23] = [
    Characteristic::MugName,
    Characteristic::CurrentTemperature,
    Characteristic::TargetTemperature,
    Characteristic::TemperatureUnit,
    Characteristic::LiquidLevel,
    Characteristic::DateTimeAndZone,
    Characteristic::Battery,
    Characteristic::LiquidState,
    Characteristic::Volume,
    Characteristic::LastLocation,
    Characteristic::Acceleration,
    Characteristic::Firmware,
    Characteristic::MugId,
    Characteristic::Dsk,
    Characteristic::Udsk,
    Characteristic::ControlRegisterAddress,
    Characteristic::ControlRegisterData,
    Characteristic::PushEvent,
    Characteristic::Statistics,
    Characteristic::Led,
    Characteristic::StandardService,
    Characteristic::TravelMugService,
    Characteristic::TravelMugServiceOther,
];

/// Service UUIDs that only the travel mug advertises.
pub const TRAVEL_MUG_SERVICE_UUIDS: [Uuid; 2] = [
    Characteristic::TravelMugService.uuid(),
    Characteristic::TravelMugServiceOther.uuid(),
];

/// A logical attribute of the device, as mirrored in [`MugState`](super::state::MugState).
///
/// Declaration order is the order attributes are requested in during a refresh.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Name,
    Meta,
    Battery,
    Firmware,
    LedColour,
    LiquidState,
    LiquidLevel,
    CurrentTemp,
    TargetTemp,
    TemperatureUnit,
    Dsk,
    Udsk,
    DateTimeZone,
    BatteryVoltage,
    VolumeLevel,
}

impl Attribute {
    pub const ALL: [Attribute; 15] = [
        Attribute::Name,
        Attribute::Meta,
        Attribute::Battery,
        Attribute::Firmware,
        Attribute::LedColour,
        Attribute::LiquidState,
        Attribute::LiquidLevel,
        Attribute::CurrentTemp,
        Attribute::TargetTemp,
        Attribute::TemperatureUnit,
        Attribute::Dsk,
        Attribute::Udsk,
        Attribute::DateTimeZone,
        Attribute::BatteryVoltage,
        Attribute::VolumeLevel,
    ];

    /// Characteristic the attribute is read from and written to.
    pub const fn characteristic(self) -> Characteristic {
        match self {
            Self::Name => Characteristic::MugName,
            Self::Meta => Characteristic::MugId,
            Self::Battery => Characteristic::Battery,
            Self::Firmware => Characteristic::Firmware,
            Self::LedColour => Characteristic::Led,
            Self::LiquidState => Characteristic::LiquidState,
            Self::LiquidLevel => Characteristic::LiquidLevel,
            Self::CurrentTemp => Characteristic::CurrentTemperature,
            Self::TargetTemp => Characteristic::TargetTemperature,
            Self::TemperatureUnit => Characteristic::TemperatureUnit,
            Self::Dsk => Characteristic::Dsk,
            Self::Udsk => Characteristic::Udsk,
            Self::DateTimeZone => Characteristic::DateTimeAndZone,
            Self::BatteryVoltage => Characteristic::ControlRegisterData,
            Self::VolumeLevel => Characteristic::Volume,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Meta => "meta",
            Self::Battery => "battery",
            Self::Firmware => "firmware",
            Self::LedColour => "led_colour",
            Self::LiquidState => "liquid_state",
            Self::LiquidLevel => "liquid_level",
            Self::CurrentTemp => "current_temp",
            Self::TargetTemp => "target_temp",
            Self::TemperatureUnit => "temperature_unit",
            Self::Dsk => "dsk",
            Self::Udsk => "udsk",
            Self::DateTimeZone => "date_time_zone",
            Self::BatteryVoltage => "battery_voltage",
            Self::VolumeLevel => "volume_level",
        }
    }

    /// Human readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Device Name",
            Self::Meta => "Meta",
            Self::Battery => "Battery",
            Self::Firmware => "Firmware",
            Self::LedColour => "LED Colour",
            Self::LiquidState => "Liquid State",
            Self::LiquidLevel => "Liquid Level",
            Self::CurrentTemp => "Current Temp",
            Self::TargetTemp => "Target Temp",
            Self::TemperatureUnit => "Temperature Unit",
            Self::Dsk => "DSK",
            Self::Udsk => "UDSK",
            Self::DateTimeZone => "Date Time + Time Zone",
            Self::BatteryVoltage => "Voltage",
            Self::VolumeLevel => "Volume Level",
        }
    }

    /// Reads of these are allowed to fail; some firmware revisions reject them.
    pub const fn is_best_effort(self) -> bool {
        matches!(self, Self::Dsk | Self::Udsk)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type AttributeSet = BTreeSet<Attribute>;

/// Slow-changing attributes, read once per connection.
pub fn initial_attributes() -> AttributeSet {
    [
        Attribute::Meta,
        Attribute::Udsk,
        Attribute::Dsk,
        Attribute::DateTimeZone,
        Attribute::Firmware,
    ]
    .into_iter()
    .collect()
}

/// Attributes refreshed on every full update.
pub fn update_attributes() -> AttributeSet {
    [
        Attribute::Name,
        Attribute::LedColour,
        Attribute::CurrentTemp,
        Attribute::TargetTemp,
        Attribute::TemperatureUnit,
        Attribute::Battery,
        Attribute::LiquidLevel,
        Attribute::LiquidState,
    ]
    .into_iter()
    .collect()
}

/// Diagnostic attributes, only shown in debug mode.
pub fn extra_attributes() -> AttributeSet {
    [
        Attribute::BatteryVoltage,
        Attribute::DateTimeZone,
        Attribute::Udsk,
        Attribute::Dsk,
    ]
    .into_iter()
    .collect()
}
