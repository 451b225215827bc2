use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::*;
use uf2_decode_core::{DecodeOptions, families};

use std::io::Write;

use crate::{
    inspect::{blocks, probe},
    regions::regions,
};

mod inspect;
mod regions;
mod reporter;

#[derive(Parser, Debug)]
enum Command {
    /// Check whether a file is a UF2 container
    #[command(arg_required_else_help = true)]
    Probe {
        /// Input UF2 file
        input: String,
    },
    /// Print the header of every block in file order
    #[command(arg_required_else_help = true)]
    Blocks {
        /// Input UF2 file
        input: String,
    },
    /// Rebuild the memory image and list its regions
    #[command(arg_required_else_help = true)]
    Regions {
        /// Input UF2 file
        input: String,

        /// Only keep blocks of this family (0xe48bff56, or a name such as "ESP32-S3")
        #[clap(short, long, value_parser = family_parser)]
        family: Option<u32>,

        /// Drop blocks flagged as not belonging to main flash
        #[clap(long)]
        ignore_not_main_flash: bool,

        /// Join regions that touch into one
        #[clap(short, long)]
        join: bool,
    },
}

fn family_parser(s: &str) -> Result<u32, String> {
    if let Some(family) = families::find_by_name(s) {
        return Ok(family.id);
    }

    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("Unknown family '{}'", s))
}

#[derive(Parser, Debug, Default)]
#[clap(version, about, long_about = None, author = "Jonathan Nilsson")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Probe { input } => probe(&input),
        Command::Blocks { input } => blocks(&input),
        Command::Regions {
            input,
            family,
            ignore_not_main_flash,
            join,
        } => {
            let options = DecodeOptions {
                family_id: family,
                ignore_not_main_flash,
            };

            regions(&input, &options, join)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_by_hex_decimal_or_name() {
        assert_eq!(family_parser("0xe48bff56"), Ok(0xe48bff56));
        assert_eq!(family_parser("0XADA52840"), Ok(0xada52840));
        assert_eq!(family_parser("16"), Ok(16));
        assert_eq!(family_parser("esp32-c3"), Ok(0xd42ba06c));
        assert!(family_parser("pico").is_err());
    }

    #[test]
    fn cli_parses_regions_flags() {
        let cli = Cli::try_parse_from([
            "uf2-decode",
            "regions",
            "fw.uf2",
            "--family",
            "0xe48bff59",
            "--ignore-not-main-flash",
            "-j",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Regions {
                input,
                family,
                ignore_not_main_flash,
                join,
            }) => {
                assert_eq!(input, "fw.uf2");
                assert_eq!(family, Some(0xe48bff59));
                assert!(ignore_not_main_flash);
                assert!(join);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
