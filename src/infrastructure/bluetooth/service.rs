//! Mug Engine
//!
//! [`EmberMug`] ties the session, codec, state mirror and callbacks together.
//! It is cheap to clone; clones share one connection and one state.

use crate::domain::attributes::{
    initial_attributes, Attribute, AttributeSet, Characteristic,
};
use crate::domain::capabilities::{Advertisement, DeviceCapabilities};
use crate::domain::models::{
    AttributeValue, BatteryInfo, Change, Colour, FirmwareInfo, LiquidState, MugMeta,
    TemperatureUnit, VolumeLevel,
};
use crate::domain::settings::MugSettings;
use crate::domain::state::{AttributeUpdate, MugState};
use crate::error::{MugError, Result, TransportError};
use crate::infrastructure::bluetooth::callbacks::{CallbackHandle, CallbackRegistry, MugCallback};
use crate::infrastructure::bluetooth::connection::Session;
use crate::infrastructure::bluetooth::events::{EventAction, EventDebouncer};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{
    ConnectOptions, Connector, NotificationHandler,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct MugInner {
    session: Arc<Session>,
    capabilities: RwLock<Arc<DeviceCapabilities>>,
    state: Mutex<MugState>,
    callbacks: CallbackRegistry,
    events: Mutex<EventDebouncer>,
    polls: AtomicU32,
    full_refresh_every: u32,
    poll_interval: Duration,
}

/// Handle to one Ember device.
#[derive(Clone)]
pub struct EmberMug {
    inner: Arc<MugInner>,
}

impl EmberMug {
    /// Create an engine for the device at `address`. Nothing is sent until
    /// the first operation.
    pub fn new(
        connector: Arc<dyn Connector>,
        address: impl Into<String>,
        capabilities: DeviceCapabilities,
        settings: &MugSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let options = ConnectOptions::new(address).with_adapter(settings.adapter.clone());
        let session = Session::new(connector, options, settings.debug);
        Ok(Self {
            inner: Arc::new(MugInner {
                session: Arc::new(session),
                capabilities: RwLock::new(Arc::new(capabilities)),
                state: Mutex::new(MugState::new(settings.use_metric, settings.debug)),
                callbacks: CallbackRegistry::new(),
                events: Mutex::new(EventDebouncer::new(settings.debounce_window())),
                polls: AtomicU32::new(0),
                full_refresh_every: settings.full_refresh_every,
                poll_interval: settings.poll_interval(),
            }),
        })
    }

    /// Create an engine with capabilities resolved from a scan result.
    pub fn from_advertisement(
        connector: Arc<dyn Connector>,
        address: impl Into<String>,
        advertisement: &Advertisement,
        settings: &MugSettings,
    ) -> Result<Self> {
        let capabilities = DeviceCapabilities::from_advertisement(advertisement);
        Self::new(connector, address, capabilities, settings)
    }

    pub fn address(&self) -> &str {
        self.inner.session.address()
    }

    pub fn capabilities(&self) -> Arc<DeviceCapabilities> {
        match self.inner.capabilities.read() {
            Ok(capabilities) => capabilities.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.capabilities().has_attribute(attribute)
    }

    /// Replace the capabilities if they are still unresolved and the new
    /// advertisement identifies the model. Returns whether anything changed.
    pub fn update_from_advertisement(&self, advertisement: &Advertisement) -> bool {
        if !self.capabilities().is_unknown() {
            return false;
        }
        let resolved = DeviceCapabilities::from_advertisement(advertisement);
        if resolved.is_unknown() {
            return false;
        }

        let mut capabilities = match self.inner.capabilities.write() {
            Ok(capabilities) => capabilities,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another refinement may have won while the lock was free
        if !capabilities.is_unknown() {
            return false;
        }
        info!(
            "Identified {} as {} ({})",
            self.address(),
            resolved.name(),
            resolved.colour().as_str()
        );
        *capabilities = Arc::new(resolved);
        true
    }

    /// Snapshot of the mirrored state.
    pub fn state(&self) -> MugState {
        lock(&self.inner.state).clone()
    }

    /// Attributes to show for this device, with their current values.
    pub fn visible_attributes(&self) -> Vec<(Attribute, Option<AttributeValue>)> {
        self.state()
            .visible_attributes(&self.capabilities().attributes())
    }

    pub fn can_write(&self) -> bool {
        lock(&self.inner.state).can_write()
    }

    pub fn register_callback(&self, callback: MugCallback) -> CallbackHandle {
        self.inner.callbacks.register(callback)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Connect now instead of on the first operation.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_connected().await
    }

    /// Connect, pair, read the slow-changing attributes and subscribe, unless
    /// a live connection already exists.
    pub async fn ensure_connected(&self) -> Result<()> {
        let session = &self.inner.session;
        if session.is_connected() {
            return Ok(());
        }
        let _guard = session.lock_connection().await;
        if session.is_connected() {
            return Ok(());
        }

        session.establish().await?;
        if let Err(e) = self.refresh_attributes(initial_attributes()).await {
            warn!("Initial update of {} failed: {}", self.address(), e);
            session.close().await;
            return Err(e);
        }
        session.subscribe(self.notification_handler()).await;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.inner.session.disconnect(true).await;
    }

    fn notification_handler(&self) -> NotificationHandler {
        let inner: Weak<MugInner> = Arc::downgrade(&self.inner);
        Arc::new(move |characteristic, data| {
            if let Some(inner) = inner.upgrade() {
                EmberMug { inner }.handle_notification(characteristic, &data);
            }
        })
    }

    fn handle_notification(&self, characteristic: Uuid, data: &[u8]) {
        let Some(&code) = data.first() else {
            debug!("Ignoring empty notification from {}", characteristic);
            return;
        };
        let name = self.capabilities().name();
        let now = Instant::now();

        let action = {
            let mut events = lock(&self.inner.events);
            match Characteristic::from_uuid(characteristic) {
                Some(Characteristic::PushEvent) => events.handle_push(code, now),
                Some(Characteristic::Statistics) => {
                    if events.accept(code, now) {
                        info!("Statistics received from {} ({}) - Data: {:02X?}.", name, code, data);
                    }
                    return;
                }
                _ => {
                    debug!("Ignoring notification from {}", characteristic);
                    return;
                }
            }
        };

        match action {
            EventAction::Debounced => {}
            EventAction::ChargerChanged { on_base } => {
                debug!("Push event received from {} ({}) - Data: {:02X?}.", name, code, data);
                let snapshot = {
                    let mut state = lock(&self.inner.state);
                    let percent = state.battery().map_or(0.0, |battery| battery.percent);
                    state.update_info([AttributeUpdate::known(AttributeValue::Battery(
                        BatteryInfo {
                            percent,
                            on_charging_base: on_base,
                        },
                    ))]);
                    state.clone()
                };
                self.inner.callbacks.fire(&snapshot);
            }
            EventAction::Queued(attribute) => {
                debug!(
                    "Push event received from {} ({}) - queued {}",
                    name, code, attribute
                );
            }
            EventAction::AuthInfoMissing => warn!("Auth info missing"),
            EventAction::Unknown(code) => debug!("Unknown event received {}", code),
        }
    }

    // Update pipeline

    /// Read every attribute in `attributes`, in order, and apply the result.
    ///
    /// Either every read succeeds and the state is updated, or the first
    /// failure is returned and the state is left alone.
    async fn refresh_attributes(&self, attributes: AttributeSet) -> Result<Vec<Change>> {
        debug!("Updating the following attributes: {:?}", attributes);
        let mut values = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            values.push((attribute, self.read_value(attribute).await?));
        }

        let batch_unit = values.iter().find_map(|(_, value)| match value {
            Some(AttributeValue::TemperatureUnit(unit)) => Some(*unit),
            _ => None,
        });
        let device_unit = match batch_unit {
            Some(unit) => unit,
            None if values.iter().any(|(_, value)| is_temperature(value.as_ref())) => {
                self.device_unit().await?
            }
            None => TemperatureUnit::default(),
        };

        let (changes, snapshot) = {
            let mut state = lock(&self.inner.state);
            let display_unit = state.display_unit();
            let updates = values.into_iter().map(|(attribute, value)| match value {
                Some(value) => {
                    AttributeUpdate::known(to_unit(value, device_unit, display_unit))
                }
                None => AttributeUpdate::unknown(attribute),
            });
            let changes = state.update_info(updates);
            let snapshot = (!changes.is_empty()).then(|| state.clone());
            (changes, snapshot)
        };

        if let Some(snapshot) = snapshot {
            self.inner.callbacks.fire(&snapshot);
        }
        debug!("Attributes updated: {:?}", changes);
        Ok(changes)
    }

    /// Re-read the attributes that rarely change.
    pub async fn refresh_initial(&self) -> Result<Vec<Change>> {
        self.ensure_connected().await?;
        self.refresh_attributes(initial_attributes()).await
    }

    /// Re-read every attribute the device has, except the initial set.
    pub async fn refresh_all(&self) -> Result<Vec<Change>> {
        self.ensure_connected().await?;
        let initial = initial_attributes();
        let attributes = self
            .capabilities()
            .attributes()
            .into_iter()
            .filter(|attribute| !initial.contains(attribute))
            .collect();
        self.refresh_attributes(attributes).await
    }

    /// Re-read whatever push events have flagged since the last call.
    pub async fn refresh_queued(&self) -> Result<Vec<Change>> {
        let queued = {
            let mut events = lock(&self.inner.events);
            if !events.has_queued() {
                return Ok(Vec::new());
            }
            events.take_queued()
        };
        debug!("Updating queued attributes: {:?}", queued);
        self.ensure_connected().await?;
        let capabilities = self.capabilities();
        let attributes = queued
            .into_iter()
            .filter(|attribute| capabilities.has_attribute(*attribute))
            .collect();
        self.refresh_attributes(attributes).await
    }

    /// One polling step: a queued refresh, or a full one every
    /// `full_refresh_every` steps.
    pub async fn poll(&self) -> Result<Vec<Change>> {
        let step = self.inner.polls.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        if step % self.inner.full_refresh_every.max(1) == 0 {
            debug!("Poll step {}: full refresh", step);
            self.refresh_all().await
        } else {
            self.refresh_queued().await
        }
    }

    /// Poll until `shutdown` resolves. Failed steps are logged and retried on
    /// the next interval.
    pub async fn watch<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Watching {} every {:?}", self.address(), self.inner.poll_interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.poll() => {
                    if let Err(e) = result {
                        warn!("Failed to poll {}: {}", self.address(), e);
                    }
                }
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
            }
        }
        info!("Stopped watching {}", self.address());
    }

    // Attribute access

    fn require(&self, attribute: Attribute) -> Result<()> {
        let capabilities = self.capabilities();
        if capabilities.has_attribute(attribute) {
            Ok(())
        } else {
            Err(MugError::Unsupported {
                device_type: capabilities.device_type(),
                attribute,
            })
        }
    }

    /// Read and decode one attribute in the device's unit.
    async fn read_value(&self, attribute: Attribute) -> Result<Option<AttributeValue>> {
        let result = match self.inner.session.read(attribute.characteristic()).await {
            Ok(data) => protocol::decode_attribute(attribute, &data),
            Err(TransportError::NotConnected) => Err(MugError::NotConnected),
            Err(source) => Err(MugError::Read { attribute, source }),
        };
        match result {
            Err(e) if attribute.is_best_effort() => {
                warn!("Unable to read {}: {}", attribute, e);
                Ok(None)
            }
            other => other,
        }
    }

    /// The unit the device reports temperatures in. Read from the device the
    /// first time it is needed; Celsius if the device has no unit setting.
    async fn device_unit(&self) -> Result<TemperatureUnit> {
        let known = lock(&self.inner.state).temperature_unit();
        if let Some(unit) = known {
            return Ok(unit);
        }
        if !self.has_attribute(Attribute::TemperatureUnit) {
            return Ok(TemperatureUnit::default());
        }
        debug!("Temperature unit of {} unknown, reading it", self.address());
        match self.read_value(Attribute::TemperatureUnit).await? {
            Some(AttributeValue::TemperatureUnit(unit)) => {
                self.apply_update(AttributeValue::TemperatureUnit(unit));
                Ok(unit)
            }
            _ => Ok(TemperatureUnit::default()),
        }
    }

    /// Read one attribute for a caller, in the display unit.
    async fn get(&self, attribute: Attribute) -> Result<Option<AttributeValue>> {
        self.require(attribute)?;
        self.ensure_connected().await?;
        let value = self.read_value(attribute).await?;
        if !is_temperature(value.as_ref()) {
            return Ok(value);
        }
        let device_unit = self.device_unit().await?;
        let display_unit = lock(&self.inner.state).display_unit();
        Ok(value.map(|value| to_unit(value, device_unit, display_unit)))
    }

    async fn write_raw(&self, attribute: Attribute, data: &[u8]) -> Result<()> {
        self.ensure_connected().await?;
        self.inner
            .session
            .write(attribute.characteristic(), data)
            .await
            .map_err(|source| {
                error!(
                    "Failed to write {:02X?} to attribute '{}': {}",
                    data, attribute, source
                );
                MugError::Write { attribute, source }
            })
    }

    /// Apply a confirmed value to the local mirror.
    fn apply_update(&self, value: AttributeValue) {
        let snapshot = {
            let mut state = lock(&self.inner.state);
            let changes = state.update_info([AttributeUpdate::known(value)]);
            (!changes.is_empty()).then(|| state.clone())
        };
        if let Some(snapshot) = snapshot {
            self.inner.callbacks.fire(&snapshot);
        }
    }

    pub async fn read_name(&self) -> Result<Option<String>> {
        Ok(match self.get(Attribute::Name).await? {
            Some(AttributeValue::Name(name)) => Some(name),
            _ => None,
        })
    }

    pub async fn read_meta(&self) -> Result<Option<MugMeta>> {
        Ok(match self.get(Attribute::Meta).await? {
            Some(AttributeValue::Meta(meta)) => Some(meta),
            _ => None,
        })
    }

    pub async fn read_battery(&self) -> Result<Option<BatteryInfo>> {
        Ok(match self.get(Attribute::Battery).await? {
            Some(AttributeValue::Battery(battery)) => Some(battery),
            _ => None,
        })
    }

    pub async fn read_firmware(&self) -> Result<Option<FirmwareInfo>> {
        Ok(match self.get(Attribute::Firmware).await? {
            Some(AttributeValue::Firmware(firmware)) => Some(firmware),
            _ => None,
        })
    }

    pub async fn read_led_colour(&self) -> Result<Option<Colour>> {
        Ok(match self.get(Attribute::LedColour).await? {
            Some(AttributeValue::LedColour(colour)) => Some(colour),
            _ => None,
        })
    }

    pub async fn read_liquid_state(&self) -> Result<Option<LiquidState>> {
        Ok(match self.get(Attribute::LiquidState).await? {
            Some(AttributeValue::LiquidState(state)) => Some(state),
            _ => None,
        })
    }

    /// Raw level, 0..=30.
    pub async fn read_liquid_level(&self) -> Result<Option<u8>> {
        Ok(match self.get(Attribute::LiquidLevel).await? {
            Some(AttributeValue::LiquidLevel(level)) => Some(level),
            _ => None,
        })
    }

    pub async fn read_current_temp(&self) -> Result<Option<f64>> {
        Ok(match self.get(Attribute::CurrentTemp).await? {
            Some(AttributeValue::CurrentTemp(temp)) => Some(temp),
            _ => None,
        })
    }

    pub async fn read_target_temp(&self) -> Result<Option<f64>> {
        Ok(match self.get(Attribute::TargetTemp).await? {
            Some(AttributeValue::TargetTemp(temp)) => Some(temp),
            _ => None,
        })
    }

    pub async fn read_temperature_unit(&self) -> Result<Option<TemperatureUnit>> {
        Ok(match self.get(Attribute::TemperatureUnit).await? {
            Some(AttributeValue::TemperatureUnit(unit)) => Some(unit),
            _ => None,
        })
    }

    pub async fn read_dsk(&self) -> Result<Option<String>> {
        Ok(match self.get(Attribute::Dsk).await? {
            Some(AttributeValue::Dsk(dsk)) => Some(dsk),
            _ => None,
        })
    }

    pub async fn read_udsk(&self) -> Result<Option<String>> {
        Ok(match self.get(Attribute::Udsk).await? {
            Some(AttributeValue::Udsk(udsk)) => Some(udsk),
            _ => None,
        })
    }

    pub async fn read_date_time_zone(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(match self.get(Attribute::DateTimeZone).await? {
            Some(AttributeValue::DateTimeZone(timestamp)) => Some(timestamp),
            _ => None,
        })
    }

    pub async fn read_battery_voltage(&self) -> Result<Option<u8>> {
        Ok(match self.get(Attribute::BatteryVoltage).await? {
            Some(AttributeValue::BatteryVoltage(voltage)) => Some(voltage),
            _ => None,
        })
    }

    pub async fn read_volume_level(&self) -> Result<Option<VolumeLevel>> {
        Ok(match self.get(Attribute::VolumeLevel).await? {
            Some(AttributeValue::VolumeLevel(level)) => Some(level),
            _ => None,
        })
    }

    pub async fn write_name(&self, name: &str) -> Result<()> {
        self.require(Attribute::Name)?;
        let data = protocol::encode_name(name)?;
        self.write_raw(Attribute::Name, &data).await?;
        self.apply_update(AttributeValue::Name(name.to_string()));
        Ok(())
    }

    /// Set the LED colour. Brightness is always sent as full.
    pub async fn write_led_colour(&self, colour: Colour) -> Result<()> {
        self.require(Attribute::LedColour)?;
        let data = protocol::encode_colour(&colour);
        self.write_raw(Attribute::LedColour, &data).await?;
        self.apply_update(AttributeValue::LedColour(Colour::rgb(
            colour.red,
            colour.green,
            colour.blue,
        )));
        Ok(())
    }

    /// Like [`write_led_colour`](Self::write_led_colour), from `#rrggbb` or
    /// `r,g,b` text.
    pub async fn write_led_colour_text(&self, text: &str) -> Result<()> {
        self.require(Attribute::LedColour)?;
        let colour = text
            .parse::<Colour>()
            .map_err(|e| MugError::validation(Attribute::LedColour, e.to_string()))?;
        self.write_led_colour(colour).await
    }

    /// Set the target temperature in the display unit. 0 turns heating off.
    pub async fn write_target_temp(&self, temp: f64) -> Result<()> {
        self.require(Attribute::TargetTemp)?;
        let display_unit = lock(&self.inner.state).display_unit();
        if temp != 0.0 {
            let (min, max) = display_unit.target_range();
            if !(min..=max).contains(&temp) {
                return Err(MugError::validation(
                    Attribute::TargetTemp,
                    format!("{temp}{display_unit} is outside {min}-{max}{display_unit}"),
                ));
            }
        }
        self.ensure_connected().await?;
        let device_unit = self.device_unit().await?;
        let device_temp = protocol::convert_temperature(temp, display_unit, device_unit);
        self.write_raw(Attribute::TargetTemp, &protocol::temp_to_bytes(device_temp))
            .await?;
        self.apply_update(AttributeValue::TargetTemp(temp));
        Ok(())
    }

    pub async fn write_temperature_unit(&self, unit: TemperatureUnit) -> Result<()> {
        self.require(Attribute::TemperatureUnit)?;
        self.write_raw(
            Attribute::TemperatureUnit,
            &protocol::encode_temperature_unit(unit),
        )
        .await?;
        self.apply_update(AttributeValue::TemperatureUnit(unit));
        Ok(())
    }

    /// Make the device's unit match the display preference.
    pub async fn ensure_correct_unit(&self) -> Result<()> {
        let (current, desired) = {
            let state = lock(&self.inner.state);
            (state.temperature_unit(), state.display_unit())
        };
        if current != Some(desired) {
            info!("Changing temperature unit of {} to {}", self.address(), desired);
            self.write_temperature_unit(desired).await?;
        }
        Ok(())
    }

    pub async fn write_volume_level(&self, level: VolumeLevel) -> Result<()> {
        self.require(Attribute::VolumeLevel)?;
        self.write_raw(
            Attribute::VolumeLevel,
            &protocol::encode_volume_level(level),
        )
        .await?;
        self.apply_update(AttributeValue::VolumeLevel(level));
        Ok(())
    }

    pub async fn write_udsk(&self, udsk: &str) -> Result<()> {
        self.require(Attribute::Udsk)?;
        let data = protocol::encode_byte_string(udsk);
        self.write_raw(Attribute::Udsk, &data).await?;
        self.apply_update(AttributeValue::Udsk(udsk.to_string()));
        Ok(())
    }
}

fn is_temperature(value: Option<&AttributeValue>) -> bool {
    matches!(
        value,
        Some(AttributeValue::CurrentTemp(_) | AttributeValue::TargetTemp(_))
    )
}

/// Convert temperature values from `from` to `to`; other values pass through.
fn to_unit(value: AttributeValue, from: TemperatureUnit, to: TemperatureUnit) -> AttributeValue {
    match value {
        AttributeValue::CurrentTemp(temp) => {
            AttributeValue::CurrentTemp(protocol::convert_temperature(temp, from, to))
        }
        AttributeValue::TargetTemp(temp) => {
            AttributeValue::TargetTemp(protocol::convert_temperature(temp, from, to))
        }
        other => other,
    }
}
