//! Operator prompt
//!
//! Reads commands line by line and runs them until the operator quits,
//! input ends, or a shutdown signal arrives.

use crate::domain::commands::Command;
use crate::domain::models::Rgb;
use crate::infrastructure::bluetooth::{BleTransport, ConnectionError, ConnectionManager};
use crate::infrastructure::shutdown::{spawn_cleanup, ShutdownCoordinator};
use crate::presentation::dispatcher::{ColorPicker, Dispatcher, Flow};
use anyhow::Context;
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const PROMPT: &str = "> ";
const COLOR_PROMPT: &str = "Colour (RRGGBB)> ";

pub const HELP_PAGE: &str = "
Instructions:
Random colour change - Press ENTER
Pick a colour - Type \"c\" and enter a hex colour such as ff8000.
Turn off LED - Type \"off\" to turn off the LED.
Turn on LED - Type \"on\" to turn on the LED.
Set off time in minutes - Type \"s <minutes>\" (default 60), \"s off\" cancels it.
Set brightness - Type \"b <brightness>\" with brightness between 0 and 100.
Help Page - Type \"help\" to show this menu.
To quit press CTRL + C or type \"q\"; both turn the LED off.
";

/// Lines typed by the operator
pub struct LineInput {
    lines: mpsc::UnboundedReceiver<String>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl LineInput {
    pub fn new(lines: mpsc::UnboundedReceiver<String>, shutdown: Arc<ShutdownCoordinator>) -> Self {
        Self { lines, shutdown }
    }

    /// Read stdin on its own thread so a pending read never holds up exit
    pub fn stdin(shutdown: Arc<ShutdownCoordinator>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
        });
        Self::new(rx, shutdown)
    }

    /// Show `prompt` and wait for the next line.
    ///
    /// `None` once input has ended or shutdown was requested.
    pub async fn next_line(&mut self, prompt: &str) -> Option<String> {
        if self.shutdown.is_requested() {
            return None;
        }

        print!("{}", prompt);
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            line = self.lines.recv() => line,
        }
    }
}

#[async_trait]
impl ColorPicker for LineInput {
    async fn pick_color(&mut self) -> Option<Rgb> {
        let line = self.next_line(COLOR_PROMPT).await?;
        let rgb = Rgb::from_hex(&line);
        if rgb.is_none() && !line.trim().is_empty() {
            warn!("`{}` is not a hex colour", line.trim());
        }
        rgb
    }
}

/// Connect, then run operator commands until quit, end of input or a
/// shutdown signal. The strip is switched off on the way out.
pub async fn run<T>(
    manager: Arc<ConnectionManager<T>>,
    shutdown: Arc<ShutdownCoordinator>,
    mut input: LineInput,
) -> anyhow::Result<()>
where
    T: BleTransport + 'static,
{
    tokio::select! {
        result = manager.connect_loop() => {
            result.context("could not connect to the LED strip")?;
        }
        _ = shutdown.wait() => {
            info!("Shutdown requested before the LED strip was connected");
            manager.close().await;
            return Ok(());
        }
    }

    info!(
        "LED strip {} is {}",
        manager.config().address,
        manager.state().await
    );

    let cleanup = spawn_cleanup(shutdown.clone(), manager.clone());
    let dispatcher = Dispatcher::new(manager.clone(), shutdown.clone());

    println!("{}", HELP_PAGE);
    match command_loop(&dispatcher, &shutdown, &mut input).await {
        Ok(()) => {
            shutdown.trigger();
            cleanup.await?;
            Ok(())
        }
        Err(e) => {
            cleanup.abort();
            manager.close().await;
            Err(e)
        }
    }
}

async fn command_loop<T: BleTransport>(
    dispatcher: &Dispatcher<T>,
    shutdown: &ShutdownCoordinator,
    input: &mut LineInput,
) -> anyhow::Result<()> {
    while let Some(line) = input.next_line(PROMPT).await {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                error!("{}", e);
                continue;
            }
        };

        // Dropping an in-flight command releases the link and stops any
        // reconnect it started
        let result = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!("Shutdown requested, abandoning the running command");
                break;
            }
            result = dispatcher.execute(command, input) => result,
        };

        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) | Err(ConnectionError::Closed) => break,
            Err(e @ ConnectionError::RetriesExhausted { .. }) => {
                return Err(e).context("lost the connection to the LED strip");
            }
            Err(e) => error!("Command failed: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConnectionState, DeviceAddress};
    use crate::infrastructure::bluetooth::mock::MockTransport;
    use crate::infrastructure::bluetooth::protocol::{brightness_command, color_command, power_command};
    use crate::infrastructure::bluetooth::ConnectionConfig;
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        transport: MockTransport,
        manager: Arc<ConnectionManager<MockTransport>>,
        shutdown: Arc<ShutdownCoordinator>,
        lines: mpsc::UnboundedSender<String>,
        input: LineInput,
    }

    fn harness(transport: MockTransport, retries: u32) -> Harness {
        let mut config = ConnectionConfig::new(DeviceAddress::new([1, 2, 3, 4, 5, 6]), Uuid::nil());
        config.retries = retries;
        let manager = Arc::new(ConnectionManager::new(transport.clone(), config));
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (lines, rx) = mpsc::unbounded_channel();
        let input = LineInput::new(rx, shutdown.clone());
        Harness {
            transport,
            manager,
            shutdown,
            lines,
            input,
        }
    }

    fn frames(bytes: &[Vec<u8>]) -> Vec<String> {
        bytes
            .iter()
            .map(|b| b.iter().map(|x| format!("{:02x}", x)).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_session_ends_with_power_off() {
        let h = harness(MockTransport::new(), 1);
        for line in ["b 50", "bogus", "b -1", "c", "00ff00", "q", "on"] {
            h.lines.send(line.to_string()).unwrap();
        }

        run(h.manager.clone(), h.shutdown.clone(), h.input)
            .await
            .unwrap();

        assert_eq!(
            frames(&h.transport.state().delivered),
            vec![
                brightness_command(50).to_string(),
                color_command(Rgb::new(0, 0xff, 0)).to_string(),
                power_command(false).to_string(),
            ]
        );
        assert_eq!(h.transport.state().disconnect_calls, 1);
    }

    #[tokio::test]
    async fn test_end_of_input_quits() {
        let h = harness(MockTransport::new(), 1);
        h.lines.send("on".to_string()).unwrap();
        drop(h.lines);

        run(h.manager.clone(), h.shutdown.clone(), h.input)
            .await
            .unwrap();

        assert!(h.shutdown.is_requested());
        assert_eq!(
            frames(&h.transport.state().delivered),
            vec![power_command(true).to_string(), power_command(false).to_string()]
        );
    }

    #[tokio::test]
    async fn test_signal_stops_idle_loop() {
        let h = harness(MockTransport::new(), 1);
        let shutdown = h.shutdown.clone();
        let _lines = h.lines;

        let session = tokio::spawn(run(h.manager.clone(), h.shutdown.clone(), h.input));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            frames(&h.transport.state().delivered),
            vec![power_command(false).to_string()]
        );
    }

    #[tokio::test]
    async fn test_signal_interrupts_reconnect() {
        let h = harness(MockTransport::new(), 50);
        let shutdown = h.shutdown.clone();
        let lines = h.lines;

        let session = tokio::spawn(run(h.manager.clone(), h.shutdown.clone(), h.input));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.manager.state().await, ConnectionState::Connected);

        // From here on the strip is gone for good
        {
            let mut state = h.transport.state();
            state.scan_delay = Duration::from_millis(200);
            state.discovery_failures = u32::MAX;
            state.write_failures = u32::MAX;
        }
        lines.send("on".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), session)
            .await
            .expect("session kept reconnecting after shutdown")
            .unwrap()
            .unwrap();

        let state = h.transport.state();
        assert_eq!(
            frames(&state.write_attempts),
            vec![power_command(true).to_string()]
        );
        assert!(state.delivered.is_empty());
        drop(state);
        assert_eq!(h.manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_startup_connect_failure_is_fatal() {
        let h = harness(MockTransport::new().with_discovery_failures(5), 2);

        let err = run(h.manager.clone(), h.shutdown.clone(), h.input)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("could not connect"));
        assert!(h.transport.state().write_attempts.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_resent_once() {
        let h = harness(MockTransport::new(), 2);
        h.lines.send("b 10".to_string()).unwrap();
        h.lines.send("q".to_string()).unwrap();
        h.transport.state().write_failures = 1;

        run(h.manager.clone(), h.shutdown.clone(), h.input)
            .await
            .unwrap();

        let state = h.transport.state();
        assert_eq!(
            frames(&state.write_attempts[..2]),
            vec![brightness_command(10).to_string(); 2]
        );
        assert_eq!(
            frames(&state.delivered),
            vec![brightness_command(10).to_string(), power_command(false).to_string()]
        );
    }
}
