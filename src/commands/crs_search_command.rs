//! CRS lookup command

use clap::ArgMatches;
use log::info;

use crate::commands::command_traits::Command;
use crate::commands::required_arg;
use crate::crs::{CrsMatch, CrsRegistry};
use crate::errors::GeoResult;
use crate::utils::logger::Logger;

/// Command listing reference systems whose name, alias or code matches a term
pub struct CrsSearchCommand<'a> {
    term: String,
    limit: usize,
    logger: &'a Logger,
}

impl<'a> CrsSearchCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> GeoResult<Self> {
        Ok(CrsSearchCommand {
            term: required_arg(args, "term")?,
            limit: args.get_one::<usize>("limit").copied().unwrap_or(20),
            logger,
        })
    }

    /// One line per hit: code, kind, name and area of use when known
    pub fn describe(registry: &CrsRegistry, hit: &CrsMatch) -> String {
        let entry = match registry.entry(&hit.code) {
            Ok(entry) => entry,
            Err(_) => return format!("{:<12} {}", hit.code, hit.name),
        };
        let kind = if entry.projected { "projected" } else { "geographic" };
        match entry.area_of_use {
            Some(area) => format!(
                "{:<12} {:<10} {} [{}, {}, {}, {}]",
                hit.code, kind, hit.name, area.west, area.south, area.east, area.north
            ),
            None => format!("{:<12} {:<10} {}", hit.code, kind, hit.name),
        }
    }
}

impl<'a> Command for CrsSearchCommand<'a> {
    fn execute(&self) -> GeoResult<()> {
        let registry = CrsRegistry::shared();
        let hits = registry.search(&self.term);
        info!("{} CRS match(es) for '{}'", hits.len(), self.term);

        for hit in hits.iter().take(self.limit) {
            println!("{}", Self::describe(&registry, hit));
        }
        if hits.len() > self.limit {
            println!("... {} more", hits.len() - self.limit);
        }
        self.logger.log(&format!("crs-search '{}': {} match(es)", self.term, hits.len()))?;
        Ok(())
    }
}
