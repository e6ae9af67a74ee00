//! CLI command implementations
//!
//! This module contains implementations of various commands
//! supported by the CLI application using the Command pattern.

pub mod command_traits;
pub mod extract_command;
pub mod transform_command;
pub mod validate_command;
pub mod elevation_command;
pub mod crs_search_command;

pub use command_traits::{Command, CommandFactory};
pub use extract_command::ExtractCoordsCommand;
pub use transform_command::TransformCommand;
pub use validate_command::ValidateCommand;
pub use elevation_command::ElevationCommand;
pub use crs_search_command::CrsSearchCommand;

use std::fs;
use std::io::{self, Read};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command as ClapCommand};
use serde_json::Value;

use crate::config::GeoConfig;
use crate::errors::{GeoError, GeoResult};
use crate::utils::logger::Logger;

/// Command-line definition of the `geocoord` binary
pub fn cli() -> ClapCommand {
    ClapCommand::new("geocoord")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extract, transform and validate geographic coordinates")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML configuration file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write log records to this file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            ClapCommand::new("extract-coords")
                .about("Extract coordinates from text, HTML, KML, GeoJSON or GML")
                .arg(Arg::new("input").help("Input file, or - for stdin").required(true).index(1))
                .arg(Arg::new("html").long("html").help("Treat the input as HTML").action(ArgAction::SetTrue))
                .arg(Arg::new("output").short('o').long("output").help("Output GeoJSON file").value_name("FILE"))
                .arg(Arg::new("output-crs").long("output-crs").help("Reproject results to this CRS").value_name("CRS"))
                .arg(
                    Arg::new("min-confidence")
                        .long("min-confidence")
                        .help("Drop matches below this confidence")
                        .value_name("VALUE")
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            ClapCommand::new("transform")
                .about("Reproject a GeoJSON file")
                .arg(Arg::new("input").help("Input GeoJSON file, or - for stdin").required(true).index(1))
                .arg(Arg::new("crs").help("Target CRS, e.g. EPSG:3857").required(true).index(2))
                .arg(Arg::new("from").long("from").help("Source CRS overriding the document").value_name("CRS"))
                .arg(Arg::new("output").short('o').long("output").help("Output GeoJSON file").value_name("FILE"))
                .arg(Arg::new("quiet").short('q').long("quiet").help("Hide the progress bar").action(ArgAction::SetTrue)),
        )
        .subcommand(
            ClapCommand::new("validate")
                .about("Validate the geometries of a GeoJSON file")
                .arg(Arg::new("input").help("Input GeoJSON file, or - for stdin").required(true).index(1))
                .arg(
                    Arg::new("fix")
                        .long("fix")
                        .help("Write repaired geometries to this file (- for stdout)")
                        .value_name("FILE"),
                ),
        )
        .subcommand(
            ClapCommand::new("elevation")
                .about("Geoid height at a point, optionally converting an ellipsoidal height")
                .arg(Arg::new("lat").required(true).index(1).allow_negative_numbers(true).value_parser(value_parser!(f64)))
                .arg(Arg::new("lon").required(true).index(2).allow_negative_numbers(true).value_parser(value_parser!(f64)))
                .arg(
                    Arg::new("height")
                        .long("height")
                        .help("Ellipsoidal height in metres")
                        .value_name("METERS")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(Arg::new("feet").long("feet").help("Also report feet").action(ArgAction::SetTrue)),
        )
        .subcommand(
            ClapCommand::new("crs-search")
                .about("Search the CRS registry by name, alias or code")
                .arg(Arg::new("term").required(true).index(1))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .help("Maximum number of results")
                        .value_name("N")
                        .value_parser(value_parser!(usize)),
                ),
        )
}

/// Factory for creating command instances based on CLI arguments
///
/// This factory examines the subcommand given on the command line and
/// creates the matching command instance for execution.
pub struct GeocoordCommandFactory {
    config: GeoConfig,
}

impl GeocoordCommandFactory {
    /// Create a new factory instance
    pub fn new(config: GeoConfig) -> Self {
        GeocoordCommandFactory { config }
    }
}

impl<'a> CommandFactory<'a> for GeocoordCommandFactory {
    fn create_command(&self, args: &ArgMatches, logger: &'a Logger) -> GeoResult<Box<dyn Command + 'a>> {
        match args.subcommand() {
            Some(("extract-coords", sub)) => Ok(Box::new(ExtractCoordsCommand::new(sub, &self.config, logger)?)),
            Some(("transform", sub)) => Ok(Box::new(TransformCommand::new(sub, &self.config, logger)?)),
            Some(("validate", sub)) => Ok(Box::new(ValidateCommand::new(sub, &self.config, logger)?)),
            Some(("elevation", sub)) => Ok(Box::new(ElevationCommand::new(sub, &self.config, logger)?)),
            Some(("crs-search", sub)) => Ok(Box::new(CrsSearchCommand::new(sub, logger)?)),
            Some((other, _)) => Err(GeoError::Config(format!("Unknown command: {}", other))),
            None => Err(GeoError::Config("Missing command".to_string())),
        }
    }
}

/// A required string argument of a subcommand
pub(crate) fn required_arg(args: &ArgMatches, name: &str) -> GeoResult<String> {
    args.get_one::<String>(name)
        .cloned()
        .ok_or_else(|| GeoError::Config(format!("Missing argument <{}>", name)))
}

/// Read a file, or stdin when `path` is `-`
pub(crate) fn read_input(path: &str) -> GeoResult<String> {
    if path == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Pretty-print JSON to a file, or stdout when no path is given
pub(crate) fn write_output(value: &Value, path: Option<&str>) -> GeoResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GeoError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    match path {
        Some(path) => fs::write(path, text + "\n")?,
        None => println!("{}", text),
    }
    Ok(())
}
