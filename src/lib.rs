//! State synchronisation engine for Ember temperature-controlled mugs.
//!
//! The crate does not ship a BLE stack. Callers implement
//! [`Connector`]/[`Transport`] over their backend of choice and hand it to
//! [`EmberMug`], which mirrors the device into a [`MugState`] and notifies
//! registered callbacks whenever something changes.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::attributes::{Attribute, AttributeSet, Characteristic};
pub use domain::capabilities::{
    Advertisement, DeviceCapabilities, DeviceColour, DeviceModel, DeviceType,
};
pub use domain::models::{
    AttributeValue, BatteryInfo, Change, Colour, FirmwareInfo, LiquidState, MugMeta,
    TemperatureUnit, VolumeLevel,
};
pub use domain::settings::{LogSettings, MugSettings, SettingsService};
pub use domain::state::MugState;
pub use error::{MugError, Result, TransportError};
pub use infrastructure::bluetooth::callbacks::{CallbackHandle, MugCallback};
pub use infrastructure::bluetooth::transport::{
    ConnectOptions, Connector, DisconnectHandler, NotificationHandler, Transport,
};
pub use infrastructure::bluetooth::EmberMug;
pub use infrastructure::logging::{init_logger, LoggingGuard};
