//! Bluetooth Module
//!
//! Provides BLE communication with the LED strip.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionManager                      │
//! │  (link lifecycle, retry budget, reconnect-and-resend)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  BleTransport
//!         ┌─────────────┴─────────────┐
//!         │                           │
//!         ▼                           ▼
//! ┌───────────────┐           ┌──────────────┐
//! │ BtleplugTrans │           │   Protocol   │
//! │               │           │              │
//! │ - Scanner     │           │ - Frames     │
//! │ - GATT write  │           │ - Commands   │
//! └───────────────┘           └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Command frame encoding
//! - [`transport`] - The BLE operations the connection manager relies on
//! - [`scanner`] - Discovery by hardware address
//! - [`gatt`] - `btleplug` implementation of the transport
//! - [`connection`] - Connection state machine

pub mod connection;
pub mod error;
pub mod gatt;
pub mod protocol;
pub mod scanner;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::{BleError, ConnectionError};
pub use gatt::BtleplugTransport;
pub use transport::BleTransport;
