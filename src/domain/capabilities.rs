//! Device capability resolution
//!
//! Works out which hardware variant we are talking to from its advertisement
//! and, from that, which attributes it exposes.

use super::attributes::{
    extra_attributes, initial_attributes, update_attributes, Attribute, AttributeSet,
    TRAVEL_MUG_SERVICE_UUIDS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Registered Bluetooth SIG company id used in manufacturer data.
pub const EMBER_BLE_SIG: u16 = 0x03C1;

/// Known hardware models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModel {
    Cup6Oz,
    Mug1_10Oz,
    Mug1_14Oz,
    Mug2_10Oz,
    Mug2_14Oz,
    TravelMug12Oz,
    Tumbler16Oz,
    Unknown,
}

impl DeviceModel {
    /// Model number as printed on the device.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Cup6Oz => "CM21S",
            Self::Mug1_10Oz => "CM17",
            Self::Mug1_14Oz => "CM17P",
            Self::Mug2_10Oz => "CM19/CM21M",
            Self::Mug2_14Oz => "CM19P/CM21L",
            Self::TravelMug12Oz => "TM19",
            Self::Tumbler16Oz => "CM21XL",
            Self::Unknown => "Unknown",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cup6Oz => "Ember Cup",
            Self::Mug1_10Oz => "Ember Mug (10oz)",
            Self::Mug1_14Oz => "Ember Mug (14oz)",
            Self::Mug2_10Oz => "Ember Mug 2 (10oz)",
            Self::Mug2_14Oz => "Ember Mug 2 (14oz)",
            Self::TravelMug12Oz => "Ember Travel Mug",
            Self::Tumbler16Oz => "Ember Tumbler",
            Self::Unknown => "Unknown Device",
        }
    }

    /// Capacity in millilitres.
    pub const fn capacity_ml(self) -> Option<u16> {
        match self {
            Self::Cup6Oz => Some(178),
            Self::Mug1_10Oz | Self::Mug2_10Oz => Some(295),
            Self::TravelMug12Oz => Some(355),
            Self::Mug1_14Oz | Self::Mug2_14Oz => Some(414),
            Self::Tumbler16Oz => Some(473),
            Self::Unknown => None,
        }
    }

    pub const fn device_type(self) -> DeviceType {
        match self {
            Self::TravelMug12Oz => DeviceType::TravelMug,
            Self::Tumbler16Oz => DeviceType::Tumbler,
            Self::Cup6Oz => DeviceType::Cup,
            // Unknown hardware is treated as a regular mug
            _ => DeviceType::Mug,
        }
    }

    /// Model from the single signed integer older firmware advertises.
    ///
    /// Travel mug service UUIDs win over the integer value.
    pub fn from_single_int(model_id: i32, service_uuids: &[Uuid]) -> Self {
        if service_uuids
            .iter()
            .any(|uuid| TRAVEL_MUG_SERVICE_UUIDS.contains(uuid))
        {
            return Self::TravelMug12Oz;
        }
        match model_id {
            1..=3 => Self::Mug1_10Oz,
            65 => Self::Mug1_14Oz,
            -51 | -59 | -63 | -61 | -62 => Self::Mug2_14Oz,
            -60 => Self::Cup6Oz,
            -127 | -126 | -125 | -124 | -123 | -122 | -120 | -117 | -57 | -56 | -55 | -53
            | -52 | 83 | 131 => Self::Mug2_10Oz,
            _ => Self::Unknown,
        }
    }

    /// Model from the (model code, generation) pair newer firmware advertises.
    pub fn from_id_and_generation(model_id: u8, generation: u8) -> Self {
        match model_id {
            1 if generation < 2 => Self::Mug1_10Oz,
            1 => Self::Mug2_10Oz,
            2 if generation < 2 => Self::Mug1_14Oz,
            2 => Self::Mug2_14Oz,
            3 => Self::TravelMug12Oz,
            8 => Self::Cup6Oz,
            9 => Self::Tumbler16Oz,
            _ => Self::Unknown,
        }
    }

    /// Best guess from the advertised local name.
    pub fn guess_from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("travel") {
            Self::TravelMug12Oz
        } else if lower.contains("cup") {
            Self::Cup6Oz
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Colours found across all models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceColour {
    SageGreen,
    Sandstone,
    Black,
    White,
    Grey,
    Blue,
    Red,
    Copper,
    Gold,
    StainlessSteel,
    RoseGold,
    Unknown,
}

impl DeviceColour {
    pub fn from_int(colour_id: i32) -> Self {
        match colour_id {
            -127 | -63 | 1 | 14 | 65 => Self::Black,
            -126 | -62 | 2 => Self::White,
            8 | 11 | -56 | -120 | -117 | -53 => Self::Red,
            -131 | -125 | -61 | 3 | 83 => Self::Copper,
            -124 | -60 => Self::RoseGold,
            -59 | -123 => Self::StainlessSteel,
            -51 => Self::Sandstone,
            -52 => Self::SageGreen,
            -55 => Self::Grey,
            -57 => Self::Blue,
            -122 => Self::Gold,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SageGreen => "Sage Green",
            Self::Sandstone => "Sandstone",
            Self::Black => "Black",
            Self::White => "White",
            Self::Grey => "Grey",
            Self::Blue => "Blue",
            Self::Red => "Red",
            Self::Copper => "Copper",
            Self::Gold => "Gold",
            Self::StainlessSteel => "Stainless Steel",
            Self::RoseGold => "Rose Gold",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad device classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cup,
    Mug,
    TravelMug,
    Tumbler,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cup => "cup",
            Self::Mug => "mug",
            Self::TravelMug => "travel_mug",
            Self::Tumbler => "tumbler",
        })
    }
}

/// The parts of a BLE advertisement the resolver looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub local_name: Option<String>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub service_uuids: Vec<Uuid>,
}

impl Advertisement {
    pub fn ember_payload(&self) -> Option<&[u8]> {
        self.manufacturer_data
            .get(&EMBER_BLE_SIG)
            .map(Vec::as_slice)
    }
}

/// Immutable description of what the connected hardware can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    model: DeviceModel,
    colour: DeviceColour,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::new(DeviceModel::Unknown, DeviceColour::Unknown)
    }
}

impl DeviceCapabilities {
    pub fn new(model: DeviceModel, colour: DeviceColour) -> Self {
        Self { model, colour }
    }

    /// Resolve capabilities from advertisement data, falling back to the name.
    pub fn from_advertisement(advertisement: &Advertisement) -> Self {
        match advertisement.ember_payload() {
            Some(payload) if payload.len() < 4 => {
                let model_id = signed_big_endian(payload);
                Self::new(
                    DeviceModel::from_single_int(model_id, &advertisement.service_uuids),
                    DeviceColour::from_int(model_id),
                )
            }
            Some(payload) => Self::new(
                DeviceModel::from_id_and_generation(payload[1], payload[2]),
                DeviceColour::from_int(i32::from(payload[3])),
            ),
            None => {
                debug!("No manufacturer data in advertisement, guessing model from name");
                Self::from_name(advertisement.local_name.as_deref().unwrap_or_default())
            }
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::new(DeviceModel::guess_from_name(name), DeviceColour::Unknown)
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn colour(&self) -> DeviceColour {
        self.colour
    }

    pub fn name(&self) -> &'static str {
        self.model.display_name()
    }

    pub fn capacity_ml(&self) -> Option<u16> {
        self.model.capacity_ml()
    }

    pub fn device_type(&self) -> DeviceType {
        self.model.device_type()
    }

    pub fn is_unknown(&self) -> bool {
        self.model == DeviceModel::Unknown
    }

    /// Attributes this variant exposes.
    pub fn attributes(&self) -> AttributeSet {
        let mut attributes: AttributeSet = extra_attributes()
            .into_iter()
            .chain(initial_attributes())
            .chain(update_attributes())
            .collect();

        let device_type = self.device_type();
        if self.is_unknown() || matches!(device_type, DeviceType::Cup | DeviceType::Tumbler) {
            // Cups and tumblers cannot be named
            attributes.remove(&Attribute::Name);
        } else if device_type == DeviceType::TravelMug {
            // No LED on the travel mug, but it has a speaker
            attributes.remove(&Attribute::LedColour);
            attributes.insert(Attribute::VolumeLevel);
        }
        if self.model != DeviceModel::TravelMug12Oz {
            attributes.remove(&Attribute::BatteryVoltage);
        }
        attributes
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes().contains(&attribute)
    }
}

fn signed_big_endian(payload: &[u8]) -> i32 {
    if payload.is_empty() {
        return 0;
    }
    let negative = payload[0] & 0x80 != 0;
    let mut value: i32 = if negative { -1 } else { 0 };
    for byte in payload {
        value = (value << 8) | i32::from(*byte);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertisement(payload: &[u8]) -> Advertisement {
        Advertisement {
            local_name: Some("Ember Ceramic Mug".into()),
            manufacturer_data: HashMap::from([(EMBER_BLE_SIG, payload.to_vec())]),
            service_uuids: vec![],
        }
    }

    #[test]
    fn test_single_signed_byte() {
        let caps = DeviceCapabilities::from_advertisement(&advertisement(&[(-127i8) as u8]));
        assert_eq!(caps.model(), DeviceModel::Mug2_10Oz);
        assert_eq!(caps.colour(), DeviceColour::Black);
        assert_eq!(caps.name(), "Ember Mug 2 (10oz)");
        assert_eq!(caps.capacity_ml(), Some(295));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let adv = advertisement(&[0xC4]);
        assert_eq!(
            DeviceCapabilities::from_advertisement(&adv),
            DeviceCapabilities::from_advertisement(&adv)
        );
        assert_eq!(
            DeviceCapabilities::from_advertisement(&adv).model(),
            DeviceModel::Cup6Oz
        );
    }

    #[test]
    fn test_travel_service_overrides_byte() {
        let mut adv = advertisement(&[1]);
        adv.service_uuids = vec![TRAVEL_MUG_SERVICE_UUIDS[1]];
        let caps = DeviceCapabilities::from_advertisement(&adv);
        assert_eq!(caps.model(), DeviceModel::TravelMug12Oz);
        assert_eq!(caps.colour(), DeviceColour::Black);
    }

    #[test]
    fn test_model_and_generation() {
        let caps = DeviceCapabilities::from_advertisement(&advertisement(&[0, 1, 1, 1]));
        assert_eq!(caps.model(), DeviceModel::Mug1_10Oz);
        let caps = DeviceCapabilities::from_advertisement(&advertisement(&[0, 1, 2, 2]));
        assert_eq!(caps.model(), DeviceModel::Mug2_10Oz);
        assert_eq!(caps.colour(), DeviceColour::White);
        let caps = DeviceCapabilities::from_advertisement(&advertisement(&[0, 9, 1, 83]));
        assert_eq!(caps.device_type(), DeviceType::Tumbler);
        assert_eq!(caps.colour(), DeviceColour::Copper);
        let caps = DeviceCapabilities::from_advertisement(&advertisement(&[0, 42, 1, 200]));
        assert_eq!(caps.model(), DeviceModel::Unknown);
        assert_eq!(caps.colour(), DeviceColour::Unknown);
    }

    #[test]
    fn test_name_fallback() {
        let mut adv = Advertisement {
            local_name: Some("Ember Travel Mug".into()),
            ..Default::default()
        };
        assert_eq!(
            DeviceCapabilities::from_advertisement(&adv).model(),
            DeviceModel::TravelMug12Oz
        );
        adv.local_name = Some("Ember Cup".into());
        assert_eq!(
            DeviceCapabilities::from_advertisement(&adv).device_type(),
            DeviceType::Cup
        );
        adv.local_name = None;
        let caps = DeviceCapabilities::from_advertisement(&adv);
        assert!(caps.is_unknown());
        assert_eq!(caps.device_type(), DeviceType::Mug);
    }

    #[test]
    fn test_attribute_sets() {
        let mug = DeviceCapabilities::new(DeviceModel::Mug2_14Oz, DeviceColour::Black);
        assert!(mug.has_attribute(Attribute::Name));
        assert!(mug.has_attribute(Attribute::LedColour));
        assert!(!mug.has_attribute(Attribute::VolumeLevel));
        assert!(!mug.has_attribute(Attribute::BatteryVoltage));

        let cup = DeviceCapabilities::new(DeviceModel::Cup6Oz, DeviceColour::Unknown);
        assert!(!cup.has_attribute(Attribute::Name));
        assert!(cup.has_attribute(Attribute::LedColour));

        let tumbler = DeviceCapabilities::new(DeviceModel::Tumbler16Oz, DeviceColour::Unknown);
        assert!(!tumbler.has_attribute(Attribute::Name));

        let travel = DeviceCapabilities::new(DeviceModel::TravelMug12Oz, DeviceColour::Unknown);
        assert!(travel.has_attribute(Attribute::Name));
        assert!(!travel.has_attribute(Attribute::LedColour));
        assert!(travel.has_attribute(Attribute::VolumeLevel));
        assert!(travel.has_attribute(Attribute::BatteryVoltage));

        let unknown = DeviceCapabilities::default();
        assert!(!unknown.has_attribute(Attribute::Name));
        assert!(unknown.has_attribute(Attribute::LedColour));
    }

    #[test]
    fn test_signed_big_endian() {
        assert_eq!(signed_big_endian(&[0x81]), -127);
        assert_eq!(signed_big_endian(&[0x00, 0x83]), 131);
        assert_eq!(signed_big_endian(&[0xFF, 0x7D]), -131);
        assert_eq!(signed_big_endian(&[]), 0);
    }
}
