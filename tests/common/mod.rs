//! Scripted in-memory BLE backend.

#![allow(dead_code)]

use async_trait::async_trait;
use ember_mug::{
    Characteristic, ConnectOptions, Connector, DeviceCapabilities, DeviceColour, DeviceModel,
    DisconnectHandler, EmberMug, MugSettings, NotificationHandler, Transport, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Pair,
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    StartNotify(Uuid),
    StopNotify(Uuid),
    Disconnect,
}

/// Everything the fake device knows, shared by every link opened to it.
#[derive(Default)]
pub struct FakeDevice {
    values: Mutex<HashMap<Uuid, Vec<u8>>>,
    read_errors: Mutex<HashMap<Uuid, TransportError>>,
    write_errors: Mutex<HashMap<Uuid, TransportError>>,
    connect_error: Mutex<Option<TransportError>>,
    pair_error: Mutex<Option<TransportError>>,
    calls: Mutex<Vec<Call>>,
    connected: AtomicBool,
    handlers: Mutex<HashMap<Uuid, NotificationHandler>>,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
}

impl FakeDevice {
    /// A Celsius mug with every characteristic populated.
    pub fn standard() -> Arc<Self> {
        let device = Arc::new(Self::default());
        device.set(Characteristic::MugName, b"Office");
        device.set(Characteristic::CurrentTemperature, &[0xCD, 0x15]);
        device.set(Characteristic::TargetTemperature, &[0x7C, 0x15]);
        device.set(Characteristic::TemperatureUnit, &[0]);
        device.set(Characteristic::LiquidLevel, &[15]);
        device.set(Characteristic::Battery, &[0x35, 0x01]);
        device.set(Characteristic::LiquidState, &[6]);
        device.set(Characteristic::Led, &[244, 0, 161, 255]);
        device.set(Characteristic::Firmware, &[0x0C, 0x00, 0x23, 0x00, 0x37, 0x01]);
        device.set(Characteristic::MugId, b"abcdef-SERIAL1");
        device.set(Characteristic::Dsk, b"dsk-token");
        device.set(Characteristic::Udsk, &[0; 20]);
        device.set(Characteristic::DateTimeAndZone, &[0, 0, 0, 0]);
        device.set(Characteristic::ControlRegisterData, &[0x0E]);
        device.set(Characteristic::Volume, &[1]);
        device
    }

    pub fn set(&self, characteristic: Characteristic, data: &[u8]) {
        self.values
            .lock()
            .unwrap()
            .insert(characteristic.uuid(), data.to_vec());
    }

    pub fn fail_read(&self, characteristic: Characteristic, error: TransportError) {
        self.read_errors
            .lock()
            .unwrap()
            .insert(characteristic.uuid(), error);
    }

    pub fn fail_write(&self, characteristic: Characteristic, error: TransportError) {
        self.write_errors
            .lock()
            .unwrap()
            .insert(characteristic.uuid(), error);
    }

    pub fn fail_connect(&self, error: Option<TransportError>) {
        *self.connect_error.lock().unwrap() = error;
    }

    pub fn fail_pair(&self, error: TransportError) {
        *self.pair_error.lock().unwrap() = Some(error);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn connects(&self) -> usize {
        self.count(|call| *call == Call::Connect)
    }

    pub fn reads(&self) -> usize {
        self.count(|call| matches!(call, Call::Read(_)))
    }

    pub fn reads_of(&self, characteristic: Characteristic) -> usize {
        self.count(|call| *call == Call::Read(characteristic.uuid()))
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(uuid, data) => Some((uuid, data)),
                _ => None,
            })
            .collect()
    }

    pub fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        self.handlers
            .lock()
            .unwrap()
            .contains_key(&characteristic.uuid())
    }

    /// Deliver a notification as the backend would.
    pub fn notify(&self, characteristic: Characteristic, data: &[u8]) {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(&characteristic.uuid())
            .cloned();
        if let Some(handler) = handler {
            handler(characteristic.uuid(), data.to_vec());
        }
    }

    /// Drop the link from the device side.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let handler = self.on_disconnect.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

pub struct FakeTransport {
    device: Arc<FakeDevice>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        self.device.record(Call::Read(characteristic));
        if !self.device.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = self.device.read_errors.lock().unwrap().get(&characteristic) {
            return Err(error.clone());
        }
        self.device
            .values
            .lock()
            .unwrap()
            .get(&characteristic)
            .cloned()
            .ok_or_else(|| TransportError::Backend(format!("no value for {characteristic}")))
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        self.device.record(Call::Write(characteristic, data.to_vec()));
        if let Some(error) = self.device.write_errors.lock().unwrap().get(&characteristic) {
            return Err(error.clone());
        }
        self.device
            .values
            .lock()
            .unwrap()
            .insert(characteristic, data.to_vec());
        Ok(())
    }

    async fn pair(&self) -> Result<(), TransportError> {
        self.device.record(Call::Pair);
        match self.device.pair_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn start_notify(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), TransportError> {
        self.device.record(Call::StartNotify(characteristic));
        self.device
            .handlers
            .lock()
            .unwrap()
            .insert(characteristic, handler);
        Ok(())
    }

    async fn stop_notify(&self, characteristic: Uuid) -> Result<(), TransportError> {
        self.device.record(Call::StopNotify(characteristic));
        self.device.handlers.lock().unwrap().remove(&characteristic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.device.record(Call::Disconnect);
        self.device.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.device.connected.load(Ordering::SeqCst)
    }
}

pub struct FakeConnector {
    pub device: Arc<FakeDevice>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _options: &ConnectOptions,
        on_disconnect: DisconnectHandler,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.device.record(Call::Connect);
        if let Some(error) = self.device.connect_error.lock().unwrap().clone() {
            return Err(error);
        }
        *self.device.on_disconnect.lock().unwrap() = Some(on_disconnect);
        self.device.connected.store(true, Ordering::SeqCst);
        Ok(Arc::new(FakeTransport {
            device: self.device.clone(),
        }))
    }
}

pub const ADDRESS: &str = "32:36:A5:BE:88:CB";

pub fn mug2() -> DeviceCapabilities {
    DeviceCapabilities::new(DeviceModel::Mug2_10Oz, DeviceColour::Black)
}

pub fn engine(
    device: &Arc<FakeDevice>,
    capabilities: DeviceCapabilities,
    settings: &MugSettings,
) -> EmberMug {
    let connector = Arc::new(FakeConnector {
        device: device.clone(),
    });
    EmberMug::new(connector, ADDRESS, capabilities, settings).unwrap()
}

pub fn standard_engine(device: &Arc<FakeDevice>) -> EmberMug {
    engine(device, mug2(), &MugSettings::default())
}
