//! Local mirror of the device's attributes.

use super::attributes::{extra_attributes, Attribute, AttributeSet};
use super::models::{
    AttributeValue, BatteryInfo, Change, Colour, FirmwareInfo, LiquidState, MugMeta,
    TemperatureUnit, VolumeLevel, LIQUID_LEVEL_MAX,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Candidate value for one attribute. `None` means the value is unknown.
///
/// The attribute and the value variant always agree; there is no way to build
/// an update for `target_temp` that carries a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUpdate {
    attribute: Attribute,
    value: Option<AttributeValue>,
}

impl AttributeUpdate {
    pub fn known(value: AttributeValue) -> Self {
        Self {
            attribute: value.attribute(),
            value: Some(value),
        }
    }

    pub fn unknown(attribute: Attribute) -> Self {
        Self {
            attribute,
            value: None,
        }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        self.value.as_ref()
    }
}

impl From<AttributeValue> for AttributeUpdate {
    fn from(value: AttributeValue) -> Self {
        Self::known(value)
    }
}

/// Last known value of every attribute plus display preferences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MugState {
    pub use_metric: bool,
    pub debug: bool,

    name: Option<String>,
    meta: Option<MugMeta>,
    battery: Option<BatteryInfo>,
    firmware: Option<FirmwareInfo>,
    led_colour: Option<Colour>,
    liquid_state: Option<LiquidState>,
    liquid_level: Option<u8>,
    temperature_unit: Option<TemperatureUnit>,
    current_temp: Option<f64>,
    target_temp: Option<f64>,
    dsk: Option<String>,
    udsk: Option<String>,
    volume_level: Option<VolumeLevel>,
    date_time_zone: Option<DateTime<Utc>>,
    battery_voltage: Option<u8>,
}

impl Default for MugState {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl MugState {
    pub fn new(use_metric: bool, debug: bool) -> Self {
        Self {
            use_metric,
            debug,
            name: None,
            meta: None,
            battery: None,
            firmware: None,
            led_colour: None,
            liquid_state: None,
            liquid_level: None,
            temperature_unit: None,
            current_temp: None,
            target_temp: None,
            dsk: None,
            udsk: None,
            volume_level: None,
            date_time_zone: None,
            battery_voltage: None,
        }
    }

    /// Apply candidate values, returning one [`Change`] per slot that differed.
    ///
    /// Changes are reported in the order the updates were given.
    pub fn update_info<I>(&mut self, updates: I) -> Vec<Change>
    where
        I: IntoIterator<Item = AttributeUpdate>,
    {
        let mut changes = Vec::new();
        for update in updates {
            let old_value = self.get(update.attribute);
            if old_value != update.value {
                self.set(update.attribute, update.value.clone());
                changes.push(Change {
                    attribute: update.attribute,
                    old_value,
                    new_value: update.value,
                });
            }
        }
        changes
    }

    /// Current value of a slot.
    pub fn get(&self, attribute: Attribute) -> Option<AttributeValue> {
        match attribute {
            Attribute::Name => self.name.clone().map(AttributeValue::Name),
            Attribute::Meta => self.meta.clone().map(AttributeValue::Meta),
            Attribute::Battery => self.battery.map(AttributeValue::Battery),
            Attribute::Firmware => self.firmware.map(AttributeValue::Firmware),
            Attribute::LedColour => self.led_colour.map(AttributeValue::LedColour),
            Attribute::LiquidState => self.liquid_state.map(AttributeValue::LiquidState),
            Attribute::LiquidLevel => self.liquid_level.map(AttributeValue::LiquidLevel),
            Attribute::CurrentTemp => self.current_temp.map(AttributeValue::CurrentTemp),
            Attribute::TargetTemp => self.target_temp.map(AttributeValue::TargetTemp),
            Attribute::TemperatureUnit => {
                self.temperature_unit.map(AttributeValue::TemperatureUnit)
            }
            Attribute::Dsk => self.dsk.clone().map(AttributeValue::Dsk),
            Attribute::Udsk => self.udsk.clone().map(AttributeValue::Udsk),
            Attribute::DateTimeZone => self.date_time_zone.map(AttributeValue::DateTimeZone),
            Attribute::BatteryVoltage => self.battery_voltage.map(AttributeValue::BatteryVoltage),
            Attribute::VolumeLevel => self.volume_level.map(AttributeValue::VolumeLevel),
        }
    }

    fn set(&mut self, attribute: Attribute, value: Option<AttributeValue>) {
        match (attribute, value) {
            (Attribute::Name, None) => self.name = None,
            (Attribute::Meta, None) => self.meta = None,
            (Attribute::Battery, None) => self.battery = None,
            (Attribute::Firmware, None) => self.firmware = None,
            (Attribute::LedColour, None) => self.led_colour = None,
            (Attribute::LiquidState, None) => self.liquid_state = None,
            (Attribute::LiquidLevel, None) => self.liquid_level = None,
            (Attribute::CurrentTemp, None) => self.current_temp = None,
            (Attribute::TargetTemp, None) => self.target_temp = None,
            (Attribute::TemperatureUnit, None) => self.temperature_unit = None,
            (Attribute::Dsk, None) => self.dsk = None,
            (Attribute::Udsk, None) => self.udsk = None,
            (Attribute::DateTimeZone, None) => self.date_time_zone = None,
            (Attribute::BatteryVoltage, None) => self.battery_voltage = None,
            (Attribute::VolumeLevel, None) => self.volume_level = None,
            (_, Some(value)) => match value {
                AttributeValue::Name(v) => self.name = Some(v),
                AttributeValue::Meta(v) => self.meta = Some(v),
                AttributeValue::Battery(v) => self.battery = Some(v),
                AttributeValue::Firmware(v) => self.firmware = Some(v),
                AttributeValue::LedColour(v) => self.led_colour = Some(v),
                AttributeValue::LiquidState(v) => self.liquid_state = Some(v),
                AttributeValue::LiquidLevel(v) => self.liquid_level = Some(v),
                AttributeValue::CurrentTemp(v) => self.current_temp = Some(v),
                AttributeValue::TargetTemp(v) => self.target_temp = Some(v),
                AttributeValue::TemperatureUnit(v) => self.temperature_unit = Some(v),
                AttributeValue::Dsk(v) => self.dsk = Some(v),
                AttributeValue::Udsk(v) => self.udsk = Some(v),
                AttributeValue::DateTimeZone(v) => self.date_time_zone = Some(v),
                AttributeValue::BatteryVoltage(v) => self.battery_voltage = Some(v),
                AttributeValue::VolumeLevel(v) => self.volume_level = Some(v),
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn meta(&self) -> Option<&MugMeta> {
        self.meta.as_ref()
    }

    pub fn battery(&self) -> Option<BatteryInfo> {
        self.battery
    }

    pub fn firmware(&self) -> Option<FirmwareInfo> {
        self.firmware
    }

    pub fn led_colour(&self) -> Option<Colour> {
        self.led_colour
    }

    pub fn liquid_state(&self) -> Option<LiquidState> {
        self.liquid_state
    }

    /// Raw liquid level, 0..=30.
    pub fn liquid_level(&self) -> Option<u8> {
        self.liquid_level
    }

    pub fn temperature_unit(&self) -> Option<TemperatureUnit> {
        self.temperature_unit
    }

    /// Current temperature in the display unit.
    pub fn current_temp(&self) -> Option<f64> {
        self.current_temp
    }

    /// Target temperature in the display unit.
    pub fn target_temp(&self) -> Option<f64> {
        self.target_temp
    }

    pub fn dsk(&self) -> Option<&str> {
        self.dsk.as_deref()
    }

    pub fn udsk(&self) -> Option<&str> {
        self.udsk.as_deref()
    }

    pub fn volume_level(&self) -> Option<VolumeLevel> {
        self.volume_level
    }

    pub fn date_time_zone(&self) -> Option<DateTime<Utc>> {
        self.date_time_zone
    }

    pub fn battery_voltage(&self) -> Option<u8> {
        self.battery_voltage
    }

    /// Writes need the UDSK to be known.
    pub fn can_write(&self) -> bool {
        self.udsk.is_some()
    }

    /// The unit values are displayed in.
    pub fn display_unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_metric(self.use_metric)
    }

    /// Liquid level scaled to a percentage of a full device.
    pub fn liquid_level_percent(&self) -> Option<f64> {
        self.liquid_level
            .map(|level| f64::from(level) / f64::from(LIQUID_LEVEL_MAX) * 100.0)
    }

    pub fn liquid_level_display(&self) -> String {
        self.liquid_level_percent()
            .map_or_else(|| "Unknown".to_string(), |p| format!("{p:.2}%"))
    }

    pub fn current_temp_display(&self) -> String {
        self.format_temp(self.current_temp)
    }

    pub fn target_temp_display(&self) -> String {
        self.format_temp(self.target_temp)
    }

    pub fn meta_display(&self) -> String {
        match &self.meta {
            Some(meta) if !self.debug => format!("Serial Number: {}", meta.serial_number),
            Some(meta) => meta.to_string(),
            None => "Unknown".to_string(),
        }
    }

    fn format_temp(&self, temp: Option<f64>) -> String {
        temp.map_or_else(
            || "Unknown".to_string(),
            |t| format!("{t:.2}{}", self.display_unit()),
        )
    }

    /// Attributes worth showing for a device exposing `attributes`.
    ///
    /// Diagnostic attributes are hidden unless debug mode is on.
    pub fn visible_attributes(&self, attributes: &AttributeSet) -> Vec<(Attribute, Option<AttributeValue>)> {
        let extra = extra_attributes();
        attributes
            .iter()
            .filter(|attribute| self.debug || !extra.contains(attribute))
            .map(|attribute| (*attribute, self.get(*attribute)))
            .collect()
    }
}

/// Capacity formatted in the preferred unit.
pub fn format_capacity(capacity_ml: Option<u16>, use_metric: bool) -> String {
    match capacity_ml {
        None => "Unknown".to_string(),
        Some(ml) if use_metric => format!("{ml}ml"),
        Some(ml) => format!("{}oz", (f64::from(ml) * 0.033814).round()),
    }
}
