//! Command-line argument parsing
//!
//! Positional arguments follow the order `PORT DATA_BITS STOP_BITS BAUD PARITY`;
//! anything given on the command line overrides the config file.

use std::path::PathBuf;

use crate::config::{BaudRate, Config, DataBits, Mode, Parity, StopBits};

/// What the process should do after parsing
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(Args),
    Help,
    Version,
}

/// Parsed command-line arguments. `None` means "not given".
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub port: Option<String>,
    pub data_bits: Option<DataBits>,
    pub stop_bits: Option<StopBits>,
    pub baud: Option<BaudRate>,
    pub parity: Option<Parity>,
    pub mode: Option<Mode>,
    pub display: bool,
    /// Alternative config file
    pub config: Option<PathBuf>,
    /// Write the effective settings back to the config file
    pub save: bool,
}

impl Args {
    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref port) = self.port {
            config.port.name = port.clone();
        }
        if let Some(data_bits) = self.data_bits {
            config.port.data_bits = data_bits;
        }
        if let Some(stop_bits) = self.stop_bits {
            config.port.stop_bits = stop_bits;
        }
        if let Some(baud) = self.baud {
            config.port.baud = baud;
        }
        if let Some(parity) = self.parity {
            config.port.parity = parity;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.display {
            config.display = true;
        }
    }
}

/// Version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn print_version() {
    eprintln!("serterm {}", VERSION);
}

pub fn print_help() {
    eprintln!("serterm {} - A serial-line terminal", VERSION);
    eprintln!();
    eprintln!("Usage: serterm [OPTIONS] [PORT] [DATA_BITS] [STOP_BITS] [BAUD] [PARITY]");
    eprintln!();
    eprintln!("Port settings:");
    eprintln!("  PORT                  Port to open (D: /dev/ttyUSB0)");
    eprintln!("  DATA_BITS             6, 7 or 8 (D: 8)");
    eprintln!("  STOP_BITS             1 or 2 (D: 1)");
    eprintln!("  BAUD                  9600, 57600 or 115200 (D: 9600)");
    eprintln!("  PARITY                Y or N (D: N)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -m, --mode <MODE>     dumb: send every key immediately (default)");
    eprintln!("                        local: edit lines locally, send on Enter");
    eprintln!("  -d, --display         Show non-printable received bytes as \\xHH");
    eprintln!("  -c, --config <PATH>   Use an alternative config file");
    eprintln!("      --save            Save the effective settings to the config file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Local-line escapes: \\n \\r \\t \\b \\f \\\\ \\xHH \\oOOO");
    eprintln!("A line with a bad escape is not sent.");
    eprintln!();
    eprintln!("Keys: Ctrl+C quits; in local mode Ctrl+D also quits.");
    eprintln!();
    eprintln!("Configuration: ~/.serterm/config.toml");
    eprintln!("Log file:      ~/.serterm/serterm.log (level from SERTERM_LOG)");
}

/// Parse arguments, excluding the program name
pub fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut positional = 0;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-m" | "--mode" => {
                let value = args.next().ok_or("Missing mode argument")?;
                parsed.mode = Some(value.parse()?);
            }
            "-d" | "--display" => {
                parsed.display = true;
            }
            "-c" | "--config" => {
                let value = args.next().ok_or("Missing config path argument")?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--save" => {
                parsed.save = true;
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown argument: {}. Use -h for help.", flag));
            }
            value => {
                parse_positional(&mut parsed, positional, value)?;
                positional += 1;
            }
        }
    }

    Ok(Command::Run(parsed))
}

fn parse_positional(args: &mut Args, index: usize, value: &str) -> Result<(), String> {
    match index {
        0 => args.port = Some(value.to_string()),
        1 => args.data_bits = Some(DataBits::try_from(parse_number::<u8>(value, "data bits")?)?),
        2 => args.stop_bits = Some(StopBits::try_from(parse_number::<u8>(value, "stop bits")?)?),
        3 => args.baud = Some(BaudRate::try_from(parse_number::<u32>(value, "baud rate")?)?),
        4 => {
            args.parity = Some(match value.to_uppercase().as_str() {
                "Y" => Parity::Enabled,
                "N" => Parity::Disabled,
                _ => return Err(format!("invalid parity '{}' (expected Y or N)", value)),
            })
        }
        _ => return Err(format!("Unexpected argument: {}", value)),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    fn run_args(args: &[&str]) -> Args {
        match parse(args) {
            Ok(Command::Run(args)) => args,
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(run_args(&[]), Args::default());
    }

    #[test]
    fn test_positional_order() {
        let args = run_args(&["/dev/ttyACM0", "7", "2", "115200", "y"]);
        assert_eq!(args.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(args.data_bits, Some(DataBits::Seven));
        assert_eq!(args.stop_bits, Some(StopBits::Two));
        assert_eq!(args.baud, Some(BaudRate::B115200));
        assert_eq!(args.parity, Some(Parity::Enabled));
    }

    #[test]
    fn test_options() {
        let args = run_args(&["-m", "local", "COM3", "--display", "-c", "alt.toml", "--save"]);
        assert_eq!(args.mode, Some(Mode::Local));
        assert!(args.display);
        assert_eq!(args.port.as_deref(), Some("COM3"));
        assert_eq!(args.config, Some(PathBuf::from("alt.toml")));
        assert!(args.save);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["-h"]), Ok(Command::Help));
        assert_eq!(parse(&["/dev/ttyS0", "--version"]), Ok(Command::Version));
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse(&["/dev/ttyS0", "5"]).is_err());
        assert!(parse(&["/dev/ttyS0", "8", "3"]).is_err());
        assert!(parse(&["/dev/ttyS0", "8", "1", "4800"]).is_err());
        assert!(parse(&["/dev/ttyS0", "8", "1", "9600", "maybe"]).is_err());
        assert!(parse(&["/dev/ttyS0", "8", "1", "9600", "N", "extra"]).is_err());
        assert!(parse(&["-m", "smart"]).is_err());
        assert!(parse(&["-m"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }

    #[test]
    fn test_overrides_config() {
        let mut config = Config::default();
        config.display = true;
        config.port.baud = BaudRate::B57600;

        let args = run_args(&["/dev/ttyUSB1", "8", "1", "9600", "-m", "local"]);
        args.apply(&mut config);

        assert_eq!(config.port.name, "/dev/ttyUSB1");
        assert_eq!(config.port.baud, BaudRate::B9600);
        assert_eq!(config.mode, Mode::Local);
        // Flag absent on the command line leaves the file's value alone
        assert!(config.display);
    }
}
