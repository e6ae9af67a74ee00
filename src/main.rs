use std::path::Path;
use std::process;
use log::{error, LevelFilter};

use geocoord::config::GeoConfig;
use geocoord::utils::logger::Logger;
use geocoord::commands::{cli, CommandFactory, GeocoordCommandFactory};

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { LevelFilter::Debug } else { LevelFilter::Info };

    // File logging replaces the console logger when requested
    let logger = match matches.get_one::<String>("log-file") {
        Some(log_file) => {
            let logger = match Logger::new(log_file) {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Error initializing logger: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = logger.init_global_logger(level) {
                eprintln!("Error setting up global logger: {}", e);
                process::exit(1);
            }
            logger
        }
        None => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .init();
            Logger::disabled()
        }
    };

    let config = match matches.get_one::<String>("config") {
        Some(path) => match GeoConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => GeoConfig::default(),
    };

    let factory = GeocoordCommandFactory::new(config);

    let command_result = factory.create_command(&matches, &logger);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
