//! Graceful shutdown
//!
//! A single-fire latch set by OS signals or by the `q` command. One cleanup
//! task waits on it, switches the strip off and closes the connection.

use crate::infrastructure::bluetooth::protocol::power_command;
use crate::infrastructure::bluetooth::{BleTransport, ConnectionManager};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct ShutdownCoordinator {
    requested: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (requested, _) = watch::channel(false);
        Self { requested }
    }

    /// Request shutdown. Returns `true` only for the call that fired the
    /// latch.
    pub fn trigger(&self) -> bool {
        self.requested.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolve once shutdown has been requested, including when that
    /// happened before the call
    pub async fn wait(&self) {
        let mut rx = self.requested.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

/// Spawn the task that turns the strip off and disconnects once shutdown is
/// requested
pub fn spawn_cleanup<T>(
    coordinator: Arc<ShutdownCoordinator>,
    manager: Arc<ConnectionManager<T>>,
) -> JoinHandle<()>
where
    T: BleTransport + 'static,
{
    tokio::spawn(async move {
        coordinator.wait().await;
        info!("Cleaning up");

        if let Err(e) = manager.send_once(&power_command(false)).await {
            warn!("Could not switch the LED strip off: {}", e);
        }
        manager.close().await;
    })
}

/// Forward interrupt and termination signals to the coordinator.
///
/// The listener does nothing but fire the latch.
pub fn spawn_signal_listener(coordinator: Arc<ShutdownCoordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                info!("Received {}, exiting", name);
                coordinator.trigger();
            }
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(windows)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::windows::ctrl_break;

    let mut ctrl_break = ctrl_break()?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "Ctrl+C"),
        _ = ctrl_break.recv() => Ok("Ctrl+Break"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConnectionState, DeviceAddress};
    use crate::infrastructure::bluetooth::mock::MockTransport;
    use crate::infrastructure::bluetooth::ConnectionConfig;
    use std::time::Duration;
    use uuid::Uuid;

    fn connected_manager(transport: &MockTransport) -> Arc<ConnectionManager<MockTransport>> {
        let mut config = ConnectionConfig::new(DeviceAddress::new([1, 2, 3, 4, 5, 6]), Uuid::nil());
        config.retries = 1;
        Arc::new(ConnectionManager::new(transport.clone(), config))
    }

    #[test]
    fn test_trigger_fires_once() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_requested());
        assert!(coordinator.trigger());
        assert!(!coordinator.trigger());
        assert!(coordinator.is_requested());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_resolves() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();
        tokio::time::timeout(Duration::from_secs(1), coordinator.wait())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers_clean_up_once() {
        let transport = MockTransport::new();
        let manager = connected_manager(&transport);
        manager.connect_loop().await.unwrap();

        let coordinator = Arc::new(ShutdownCoordinator::new());
        let cleanup = spawn_cleanup(coordinator.clone(), manager.clone());

        let triggers: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.trigger() })
            })
            .collect();
        let mut fired = 0;
        for trigger in triggers {
            if trigger.await.unwrap() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);

        tokio::time::timeout(Duration::from_secs(1), cleanup)
            .await
            .unwrap()
            .unwrap();
        // A late trigger changes nothing
        assert!(!coordinator.trigger());

        let state = transport.state();
        assert_eq!(state.delivered, vec![power_command(false).as_bytes().to_vec()]);
        assert_eq!(state.disconnect_calls, 1);
        drop(state);
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_commands_rejected_after_cleanup() {
        let transport = MockTransport::new();
        let manager = connected_manager(&transport);
        manager.connect_loop().await.unwrap();

        let coordinator = Arc::new(ShutdownCoordinator::new());
        let cleanup = spawn_cleanup(coordinator.clone(), manager.clone());
        coordinator.trigger();
        cleanup.await.unwrap();

        assert!(manager.send(&power_command(true)).await.is_err());
        assert_eq!(transport.state().delivered.len(), 1);
    }
}
