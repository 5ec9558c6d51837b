//! BLE Transport Seam
//!
//! The engine never talks to a Bluetooth stack directly. A backend implements
//! [`Connector`] to open links and [`Transport`] for GATT access on an open
//! link; tests plug in an in-memory fake.

use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Invoked by the backend for every notification: characteristic and payload.
///
/// Called from the backend's own context. Implementations must not block.
pub type NotificationHandler = Arc<dyn Fn(Uuid, Vec<u8>) + Send + Sync>;

/// Invoked by the backend when the link drops without being asked to.
pub type DisconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub address: String,
    /// BlueZ adapter, e.g. `hci0`
    pub adapter: Option<String>,
}

impl ConnectOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<String>) -> Self {
        self.adapter = adapter;
        self
    }
}

/// An open link to one device.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, TransportError>;

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError>;

    /// Request bonding. Backends without pairing return
    /// [`TransportError::PairingUnsupported`].
    async fn pair(&self) -> Result<(), TransportError>;

    async fn start_notify(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), TransportError>;

    async fn stop_notify(&self, characteristic: Uuid) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Opens links.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        options: &ConnectOptions,
        on_disconnect: DisconnectHandler,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}
