//! Command Dispatcher
//!
//! Turns parsed operator commands into frames and hands them to the
//! connection manager.

use crate::domain::commands::Command;
use crate::domain::models::Rgb;
use crate::infrastructure::bluetooth::protocol::{
    brightness_command, color_command, power_command, schedule_off_command, sync_clock_command,
};
use crate::infrastructure::bluetooth::{BleTransport, ConnectionError, ConnectionManager};
use crate::infrastructure::shutdown::ShutdownCoordinator;
use crate::presentation::cli::HELP_PAGE;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between the clock sync and the schedule frame, giving the strip
/// time to apply the new time first
pub const SCHEDULE_SYNC_DELAY: Duration = Duration::from_secs(3);

/// Source of an operator-chosen colour for the `c` command
#[async_trait]
pub trait ColorPicker: Send {
    /// `None` when the operator gave nothing usable
    async fn pick_color(&mut self) -> Option<Rgb>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Dispatcher<T: BleTransport> {
    manager: Arc<ConnectionManager<T>>,
    shutdown: Arc<ShutdownCoordinator>,
    sync_delay: Duration,
}

impl<T: BleTransport> Dispatcher<T> {
    pub fn new(manager: Arc<ConnectionManager<T>>, shutdown: Arc<ShutdownCoordinator>) -> Self {
        Self {
            manager,
            shutdown,
            sync_delay: SCHEDULE_SYNC_DELAY,
        }
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    pub async fn execute(
        &self,
        command: Command,
        picker: &mut dyn ColorPicker,
    ) -> Result<Flow, ConnectionError> {
        match command {
            Command::RandomColor => {
                let rgb = Rgb::random();
                info!("Changing to random colour {}", rgb);
                self.manager.send(&color_command(rgb)).await?;
            }
            Command::PickColor => {
                let rgb = picker.pick_color().await.unwrap_or(Rgb::RED);
                info!("Changing colour to {}", rgb);
                self.manager.send(&color_command(rgb)).await?;
            }
            Command::Power(on) => {
                self.manager.send(&power_command(on)).await?;
            }
            Command::Brightness(level) => {
                self.manager.send(&brightness_command(level)).await?;
            }
            Command::ScheduleOff { minutes } => {
                self.manager.send(&sync_clock_command()).await?;
                tokio::time::sleep(self.sync_delay).await;
                if self.shutdown.is_requested() {
                    info!("Shutdown requested, schedule not set");
                    return Ok(Flow::Quit);
                }
                self.manager
                    .send(&schedule_off_command(minutes, false))
                    .await?;
                info!("LED strip will switch off in {} minutes", minutes);
            }
            Command::CancelSchedule => {
                self.manager.send(&schedule_off_command(0, true)).await?;
                info!("Scheduled switch-off cancelled");
            }
            Command::Help => println!("{}", HELP_PAGE),
            Command::Quit => {
                info!("Exiting");
                self.shutdown.trigger();
                return Ok(Flow::Quit);
            }
            Command::Unknown(input) => warn!("Unknown command: {}", input),
        }

        Ok(Flow::Continue)
    }
}
