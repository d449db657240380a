//! ELK-BLEDOM LED Strip Protocol
//!
//! This module contains the command frames understood by the LED strip
//! controller. Every frame is nine bytes long, starts with `0x7e` and ends
//! with `0xef`; only the bytes in between differ per command.

use crate::domain::models::Rgb;
use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike};
use std::fmt;

/// Length shared by every command frame
pub const FRAME_LEN: usize = 9;

pub const FRAME_HEADER: u8 = 0x7e;
pub const FRAME_TRAILER: u8 = 0xef;

const POWER_ON: [u8; FRAME_LEN] = [
    FRAME_HEADER, 0x04, 0x04, 0xf0, 0x00, 0x01, 0xff, 0x00, FRAME_TRAILER,
];
const POWER_OFF: [u8; FRAME_LEN] = [
    FRAME_HEADER, 0x04, 0x04, 0x00, 0x00, 0x00, 0xff, 0x00, FRAME_TRAILER,
];

const SCHEDULE_ENABLE: u8 = 0xff;
const SCHEDULE_DISABLE: u8 = 0x7f;

/// Highest brightness level the strip accepts
pub const MAX_BRIGHTNESS: u8 = 100;

/// An encoded command, ready to be written to the command characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// LED strip commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    SetColor(Rgb),
    SetPower(bool),
    /// Level in percent, clamped to 100
    SetBrightness(u8),
    /// Switch the strip off at a wall-clock time
    ScheduleOff { hour: u8, minute: u8, enabled: bool },
    /// Set the strip's internal clock
    SyncClock {
        hour: u8,
        minute: u8,
        second: u8,
        /// ISO weekday, 1 = Monday
        weekday: u8,
    },
}

impl LedCommand {
    /// Encode this command into its frame
    pub fn frame(&self) -> Frame {
        let bytes = match *self {
            Self::SetColor(rgb) => {
                let [r, g, b] = rgb.to_bytes();
                [FRAME_HEADER, 0x07, 0x05, 0x03, r, g, b, 0x10, FRAME_TRAILER]
            }
            Self::SetPower(true) => POWER_ON,
            Self::SetPower(false) => POWER_OFF,
            Self::SetBrightness(level) => {
                let level = level.min(MAX_BRIGHTNESS);
                [FRAME_HEADER, 0x00, 0x01, level, 0x00, 0x00, 0x00, 0x00, FRAME_TRAILER]
            }
            Self::ScheduleOff {
                hour,
                minute,
                enabled,
            } => {
                let flag = if enabled {
                    SCHEDULE_ENABLE
                } else {
                    SCHEDULE_DISABLE
                };
                [FRAME_HEADER, 0x00, 0x82, hour, minute, 0x00, 0x01, flag, FRAME_TRAILER]
            }
            Self::SyncClock {
                hour,
                minute,
                second,
                weekday,
            } => [
                FRAME_HEADER, 0x00, 0x83, hour, minute, second, weekday, 0x00, FRAME_TRAILER,
            ],
        };
        Frame(bytes)
    }
}

pub fn color_command(rgb: Rgb) -> Frame {
    LedCommand::SetColor(rgb).frame()
}

pub fn power_command(on: bool) -> Frame {
    LedCommand::SetPower(on).frame()
}

pub fn brightness_command(level: u8) -> Frame {
    LedCommand::SetBrightness(level).frame()
}

/// Schedule the strip to switch off `minutes_from_now` minutes from the
/// current local time
pub fn schedule_off_command(minutes_from_now: u32, disable: bool) -> Frame {
    schedule_off_command_at(&Local::now(), minutes_from_now, disable)
}

pub fn schedule_off_command_at<Tz: TimeZone>(
    now: &DateTime<Tz>,
    minutes_from_now: u32,
    disable: bool,
) -> Frame {
    let off_time = now.clone() + Duration::minutes(i64::from(minutes_from_now));
    LedCommand::ScheduleOff {
        hour: off_time.hour() as u8,
        minute: off_time.minute() as u8,
        enabled: !disable,
    }
    .frame()
}

pub fn sync_clock_command() -> Frame {
    sync_clock_command_at(&Local::now())
}

pub fn sync_clock_command_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Frame {
    LedCommand::SyncClock {
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        second: now.second() as u8,
        weekday: now.weekday().number_from_monday() as u8,
    }
    .frame()
}
