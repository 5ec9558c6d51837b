//! BLE Session Module
//!
//! Owns the transport handle and serialises access to it through two
//! independent locks: one for connect/disconnect, one for attribute I/O.

use crate::domain::attributes::Characteristic;
use crate::error::{MugError, TransportError};
use crate::infrastructure::bluetooth::transport::{
    ConnectOptions, Connector, DisconnectHandler, NotificationHandler, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{mpsc, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A single logical link to one device.
pub struct Session {
    connector: Arc<dyn Connector>,
    options: ConnectOptions,
    debug: bool,
    client: RwLock<Option<Arc<dyn Transport>>>,
    connect_lock: tokio::sync::Mutex<()>,
    operation_lock: tokio::sync::Mutex<()>,
    expected_disconnect: Arc<AtomicBool>,
    disconnect_tx: mpsc::UnboundedSender<()>,
    disconnect_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    cleanup_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(connector: Arc<dyn Connector>, options: ConnectOptions, debug: bool) -> Self {
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            options,
            debug,
            client: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            operation_lock: tokio::sync::Mutex::new(()),
            expected_disconnect: Arc::new(AtomicBool::new(false)),
            disconnect_tx,
            disconnect_rx: Mutex::new(Some(disconnect_rx)),
            cleanup_worker: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.options.address
    }

    fn client(&self) -> Option<Arc<dyn Transport>> {
        match self.client.read() {
            Ok(client) => client.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_client(&self, transport: Option<Arc<dyn Transport>>) {
        match self.client.write() {
            Ok(mut client) => *client = transport,
            Err(poisoned) => *poisoned.into_inner() = transport,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client().is_some_and(|client| client.is_connected())
    }

    /// Wait for the connection region.
    pub async fn lock_connection(&self) -> MutexGuard<'_, ()> {
        match self.connect_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(
                    "Connection to {} already in progress. Waiting first.",
                    self.options.address
                );
                self.connect_lock.lock().await
            }
        }
    }

    async fn lock_operation(&self) -> MutexGuard<'_, ()> {
        match self.operation_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Operation already in progress. Waiting for it to complete");
                self.operation_lock.lock().await
            }
        }
    }

    /// Open the link and pair. Caller must hold the connection lock.
    ///
    /// Pairing failures are logged and ignored.
    pub async fn establish(self: &Arc<Self>) -> Result<(), MugError> {
        info!("Establishing a new connection to {}", self.options.address);
        let transport = self
            .connector
            .connect(&self.options, self.disconnect_handler())
            .await
            .map_err(|source| {
                debug!("{}: Failed to connect to the mug: {}", self.options.address, source);
                MugError::Connection {
                    address: self.options.address.clone(),
                    source,
                }
            })?;
        self.expected_disconnect.store(false, Ordering::SeqCst);

        match transport.pair().await {
            Ok(()) => debug!("Paired with {}", self.options.address),
            Err(TransportError::PairingUnsupported) => warn!(
                "Pairing not implemented. If your mug is still in pairing mode \
                 (blinking blue) tap the button on the bottom to exit."
            ),
            Err(e) => warn!("Pairing with {} failed, continuing: {}", self.options.address, e),
        }

        self.set_client(Some(transport));
        self.start_cleanup_worker();
        info!("Connected to {}", self.options.address);
        Ok(())
    }

    /// The handler handed to the backend. It only records the event; the
    /// cleanup worker does the rest.
    fn disconnect_handler(&self) -> DisconnectHandler {
        let expected = self.expected_disconnect.clone();
        let tx = self.disconnect_tx.clone();
        Arc::new(move || {
            if expected.load(Ordering::SeqCst) {
                debug!("Disconnect callback called");
            } else {
                debug!("Unexpectedly disconnected");
                let _ = tx.send(());
            }
        })
    }

    fn start_cleanup_worker(self: &Arc<Self>) {
        let receiver = match self.disconnect_rx.lock() {
            Ok(mut rx) => rx.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut receiver) = receiver else {
            return;
        };
        let session: Weak<Session> = Arc::downgrade(self);
        let worker = tokio::spawn(async move {
            while receiver.recv().await.is_some() {
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.drop_stale_client().await;
            }
            debug!("Disconnect cleanup worker stopped");
        });
        if let Ok(mut slot) = self.cleanup_worker.lock() {
            *slot = Some(worker);
        }
    }

    async fn drop_stale_client(&self) {
        let _guard = self.lock_connection().await;
        if let Some(client) = self.client() {
            if !client.is_connected() {
                self.set_client(None);
                info!("Connection to {} lost", self.options.address);
            }
        }
    }

    /// Subscribe to push events, plus statistics in debug mode. Best effort.
    pub async fn subscribe(&self, handler: NotificationHandler) {
        let Some(client) = self.client() else {
            return;
        };
        let mut characteristics = vec![Characteristic::PushEvent];
        if self.debug {
            characteristics.push(Characteristic::Statistics);
        }
        for characteristic in characteristics {
            if let Err(e) = client
                .start_notify(characteristic.uuid(), handler.clone())
                .await
            {
                warn!("Failed to subscribe to state attr: {}", e);
                return;
            }
        }
    }

    pub async fn unsubscribe(&self) {
        debug!("Unsubscribe called");
        let Some(client) = self.client() else {
            return;
        };
        let _ = client.stop_notify(Characteristic::PushEvent.uuid()).await;
        if self.debug {
            let _ = client.stop_notify(Characteristic::Statistics.uuid()).await;
        }
    }

    pub async fn read(&self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError> {
        let _guard = self.lock_operation().await;
        let client = self.client().ok_or(TransportError::NotConnected)?;
        let data = client.read(characteristic.uuid()).await?;
        debug!("Read attribute '{}' with value {:02X?}", characteristic, data);
        Ok(data)
    }

    pub async fn write(
        &self,
        characteristic: Characteristic,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let _guard = self.lock_operation().await;
        let client = self.client().ok_or(TransportError::NotConnected)?;
        client.write(characteristic.uuid(), data).await?;
        debug!("Wrote {:02X?} to attribute '{}'", data, characteristic);
        Ok(())
    }

    /// Close the link. `expected` only affects logging.
    pub async fn disconnect(&self, expected: bool) {
        debug!(
            "{} disconnect called",
            if expected { "Expected" } else { "Unexpected" }
        );
        self.expected_disconnect.store(expected, Ordering::SeqCst);
        if self.is_connected() {
            let _guard = self.lock_connection().await;
            self.close().await;
        }
        self.set_client(None);
        self.expected_disconnect.store(false, Ordering::SeqCst);
    }

    /// Unsubscribe, close the link and drop the handle. Caller must hold the
    /// connection lock.
    pub async fn close(&self) {
        self.unsubscribe().await;
        if let Some(client) = self.client() {
            if let Err(e) = client.disconnect().await {
                warn!("Error while disconnecting from {}: {}", self.options.address, e);
            }
        }
        self.set_client(None);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.cleanup_worker.lock() {
            if let Some(worker) = slot.take() {
                worker.abort();
            }
        }
    }
}
