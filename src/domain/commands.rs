//! Operator commands
//!
//! Every input line maps to exactly one [`Command`]. The first token is
//! looked up verbatim; there is no prefix matching.

use thiserror::Error;

pub const DEFAULT_BRIGHTNESS: u8 = 100;
pub const DEFAULT_SCHEDULE_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input
    RandomColor,
    Power(bool),
    PickColor,
    ScheduleOff { minutes: u32 },
    CancelSchedule,
    Brightness(u8),
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("`{command}` expects a whole number, got `{value}`")]
    NotANumber { command: &'static str, value: String },
    #[error("`{command}` does not accept negative values (got {value})")]
    Negative { command: &'static str, value: String },
    #[error("`{command}` value {value} is too large")]
    TooLarge { command: &'static str, value: String },
    #[error("`{command}` takes at most one argument")]
    TooManyArguments { command: &'static str },
    #[error("`{command}` takes no arguments")]
    UnexpectedArgument { command: &'static str },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            return Ok(Self::RandomColor);
        };
        let args: Vec<&str> = tokens.collect();

        let command = match key {
            "off" => no_args("off", &args, Self::Power(false))?,
            "on" => no_args("on", &args, Self::Power(true))?,
            "c" => no_args("c", &args, Self::PickColor)?,
            "help" => no_args("help", &args, Self::Help)?,
            "q" => no_args("q", &args, Self::Quit)?,
            "b" => {
                let level = single_number("b", &args)?.unwrap_or(DEFAULT_BRIGHTNESS as u64);
                // Levels past 100 are clamped by the encoder
                Self::Brightness(level.min(u8::MAX as u64) as u8)
            }
            "s" => match args.as_slice() {
                ["off"] => Self::CancelSchedule,
                _ => {
                    let minutes = single_number("s", &args)?
                        .unwrap_or(DEFAULT_SCHEDULE_MINUTES as u64);
                    let minutes = u32::try_from(minutes).map_err(|_| ParseError::TooLarge {
                        command: "s",
                        value: minutes.to_string(),
                    })?;
                    Self::ScheduleOff { minutes }
                }
            },
            other => Self::Unknown(other.to_string()),
        };

        Ok(command)
    }
}

fn no_args(command: &'static str, args: &[&str], parsed: Command) -> Result<Command, ParseError> {
    if args.is_empty() {
        Ok(parsed)
    } else {
        Err(ParseError::UnexpectedArgument { command })
    }
}

fn single_number(command: &'static str, args: &[&str]) -> Result<Option<u64>, ParseError> {
    match args {
        [] => Ok(None),
        [value] => {
            if let Ok(n) = value.parse::<i64>() {
                if n < 0 {
                    return Err(ParseError::Negative {
                        command,
                        value: value.to_string(),
                    });
                }
            }
            value.parse::<u64>().map(Some).map_err(|_| {
                if value.bytes().all(|b| b.is_ascii_digit()) {
                    ParseError::TooLarge {
                        command,
                        value: value.to_string(),
                    }
                } else {
                    ParseError::NotANumber {
                        command,
                        value: value.to_string(),
                    }
                }
            })
        }
        _ => Err(ParseError::TooManyArguments { command }),
    }
}
