//! Bluetooth Module
//!
//! Keeps a local mirror of an Ember device in sync over BLE.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       EmberMug                           │
//! │  (Engine - getters, setters, refresh, polling)           │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┬─────────────┐
//!         │             │             │             │
//!         ▼             ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌───────────┐
//! │  Session  │  │   Events   │  │ Protocol │  │ Callbacks │
//! │           │  │            │  │          │  │           │
//! │ - Connect │  │ - Debounce │  │ - Codecs │  │ - Ordered │
//! │ - Locks   │  │ - Queue    │  │ - Events │  │   fan-out │
//! └─────┬─────┘  └────────────┘  └──────────┘  └───────────┘
//!       │
//!       ▼
//! ┌───────────┐
//! │ Transport │  (backend supplied by the caller)
//! └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Wire encodings and push event codes
//! - [`transport`] - Traits a BLE backend implements
//! - [`connection`] - Connection lifecycle and I/O serialisation
//! - [`events`] - Push event debouncing and the refresh queue
//! - [`callbacks`] - State change observers
//! - [`service`] - The engine

pub mod callbacks;
pub mod connection;
pub mod events;
pub mod protocol;
pub mod service;
pub mod transport;

pub use service::EmberMug;
