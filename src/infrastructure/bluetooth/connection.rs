//! BLE Connection Module
//!
//! Owns the single link to the LED strip: discovery, connect with retries,
//! and reconnect-and-resend when a write fails.

use crate::domain::models::{ConnectionState, DeviceAddress};
use crate::domain::settings::{Config, ConfigError};
use crate::infrastructure::bluetooth::error::{BleError, ConnectionError};
use crate::infrastructure::bluetooth::protocol::Frame;
use crate::infrastructure::bluetooth::transport::BleTransport;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Address of the LED strip
    pub address: DeviceAddress,
    /// Characteristic that accepts command frames
    pub characteristic: Uuid,
    /// Bound for a single scan and a single GATT connect
    pub timeout: Duration,
    /// Discover + connect attempts per connect loop
    pub retries: u32,
    /// GATT connect attempts per discovered device
    pub connect_attempts: u32,
    /// Reconnect-and-resend cycles allowed per send
    pub max_resends: u32,
}

impl ConnectionConfig {
    pub fn new(address: DeviceAddress, characteristic: Uuid) -> Self {
        Self {
            address,
            characteristic,
            timeout: Duration::from_secs(30),
            retries: 50,
            connect_attempts: 3,
            max_resends: 1,
        }
    }
}

impl TryFrom<&Config> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self {
            timeout: Duration::from_secs(config.connection_timeout_sec),
            retries: config.connection_retries,
            ..Self::new(config.device_address()?, config.characteristic_uuid()?)
        })
    }
}

struct LinkSlot<L> {
    state: ConnectionState,
    link: Option<L>,
    closed: bool,
}

/// Connection manager for the LED strip.
///
/// All link access goes through one async mutex, so the command loop and
/// the shutdown cleanup never write to the strip at the same time.
pub struct ConnectionManager<T: BleTransport> {
    transport: T,
    config: ConnectionConfig,
    slot: Mutex<LinkSlot<T::Link>>,
}

impl<T: BleTransport> ConnectionManager<T> {
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            slot: Mutex::new(LinkSlot {
                state: ConnectionState::Disconnected,
                link: None,
                closed: false,
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state
    }

    /// Scan for an advertisement from `address`
    pub async fn discover(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<T::Device, ConnectionError> {
        match self.transport.scan_for_address(address, timeout).await {
            Ok(Some(device)) => {
                info!("Device {} discovered", address);
                Ok(device)
            }
            Ok(None) => Err(ConnectionError::Discovery {
                address: *address,
                timeout,
            }),
            Err(source) => Err(ConnectionError::Scan {
                address: *address,
                source,
            }),
        }
    }

    /// Open a GATT connection, retrying while the device's service is
    /// unavailable
    pub async fn connect(
        &self,
        device: &T::Device,
        timeout: Duration,
    ) -> Result<T::Link, ConnectionError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.transport.connect(device, timeout).await {
                Ok(link) => {
                    if self.transport.is_connected(&link).await {
                        return Ok(link);
                    }
                    warn!(
                        "Link reported disconnected right after connecting (attempt {}/{})",
                        attempt, attempts
                    );
                    let _ = self.transport.disconnect(&link).await;
                }
                Err(e) => {
                    warn!(
                        "BLE device service unavailable ({}), attempt {}/{}",
                        e, attempt, attempts
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ConnectionError::Connect {
            address: self.config.address,
            attempts,
            source: last_error,
        })
    }

    /// Discover and connect, spending at most `retries` attempts.
    ///
    /// Failed attempts are logged and retried; running out of attempts
    /// leaves the manager in [`ConnectionState::Failed`].
    pub async fn connect_loop(&self) -> Result<(), ConnectionError> {
        let mut slot = self.slot.lock().await;
        if slot.closed {
            return Err(ConnectionError::Closed);
        }
        self.connect_loop_locked(&mut slot).await
    }

    async fn connect_loop_locked(
        &self,
        slot: &mut LinkSlot<T::Link>,
    ) -> Result<(), ConnectionError> {
        self.drop_link(slot).await;

        let budget = self.config.retries;
        for attempt in 1..=budget {
            info!(
                "Connecting to BLE LED strip {} (attempt {}/{})",
                self.config.address, attempt, budget
            );

            match self.establish(slot).await {
                Ok(link) => {
                    slot.link = Some(link);
                    slot.state = ConnectionState::Connected;
                    info!("Connected!");
                    return Ok(());
                }
                Err(e) => {
                    slot.state = ConnectionState::Disconnected;
                    warn!("Could not connect to BLE LED strip: {}", e);
                }
            }
        }

        slot.state = ConnectionState::Failed;
        let err = ConnectionError::RetriesExhausted {
            address: self.config.address,
            attempts: budget,
        };
        error!("{}", err);
        Err(err)
    }

    async fn establish(&self, slot: &mut LinkSlot<T::Link>) -> Result<T::Link, ConnectionError> {
        slot.state = ConnectionState::Discovering;
        let device = self.discover(&self.config.address, self.config.timeout).await?;

        slot.state = ConnectionState::Connecting;
        self.connect(&device, self.config.timeout).await
    }

    async fn drop_link(&self, slot: &mut LinkSlot<T::Link>) {
        if let Some(link) = slot.link.take() {
            if let Err(e) = self.transport.disconnect(&link).await {
                debug!("Ignoring disconnect error on stale link: {}", e);
            }
        }
        slot.state = ConnectionState::Disconnected;
    }

    /// Write `frame` to the command characteristic without waiting for a
    /// response.
    ///
    /// A failed write drops the link, runs the connect loop and resends the
    /// same frame, up to `max_resends` times.
    pub async fn send(&self, frame: &Frame) -> Result<(), ConnectionError> {
        let mut slot = self.slot.lock().await;
        if slot.closed {
            return Err(ConnectionError::Closed);
        }

        let mut resends = 0;
        loop {
            info!("Sending command: {}", frame);
            let result = match slot.link.as_ref() {
                Some(link) => {
                    self.transport
                        .write_characteristic(link, self.config.characteristic, frame.as_bytes())
                        .await
                }
                None => Err(BleError::NotConnected),
            };

            let source = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            let err = ConnectionError::Write {
                characteristic: self.config.characteristic,
                source,
            };

            if resends >= self.config.max_resends {
                error!("{}, giving up on command", err);
                return Err(err);
            }
            resends += 1;

            warn!("{}, command failed; reestablishing connection", err);
            self.connect_loop_locked(&mut slot).await?;
        }
    }

    /// Single write over the current link. Never reconnects, so it is the
    /// one to use once shutdown has started.
    pub async fn send_once(&self, frame: &Frame) -> Result<(), ConnectionError> {
        let slot = self.slot.lock().await;
        if slot.closed {
            return Err(ConnectionError::Closed);
        }

        let link = slot.link.as_ref().ok_or(ConnectionError::Write {
            characteristic: self.config.characteristic,
            source: BleError::NotConnected,
        })?;
        info!("Sending command: {}", frame);
        self.transport
            .write_characteristic(link, self.config.characteristic, frame.as_bytes())
            .await
            .map_err(|source| ConnectionError::Write {
                characteristic: self.config.characteristic,
                source,
            })
    }

    /// Disconnect and refuse further commands. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        slot.closed = true;

        if let Some(link) = slot.link.take() {
            match self.transport.disconnect(&link).await {
                Ok(()) => info!("Disconnected from device"),
                Err(e) => warn!("Failed to disconnect cleanly: {}", e),
            }
        }
        slot.state = ConnectionState::Disconnected;
    }
}
