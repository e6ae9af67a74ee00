//! CRS registry: EPSG codes, human aliases and areas of use
//!
//! The registry is built from an embedded table of common systems
//! (`crs_registry.toml`), the sixty WGS84 UTM zones per hemisphere and the
//! `crs-definitions` EPSG database for everything else. Lookups never touch
//! the network.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use lazy_static::lazy_static;
use log::{debug, warn};

use crate::coordinate::BoundingBox;
use crate::errors::{GeoError, GeoResult};
use super::utm;

lazy_static! {
    // Parse the embedded table once
    static ref REGISTRY_TABLE: Vec<CrsEntry> = {
        let content = include_str!("../../crs_registry.toml");
        parse_registry_table(content).unwrap_or_else(|e| {
            warn!("Failed to parse CRS registry table: {}", e);
            Vec::new()
        })
    };

    static ref SHARED_REGISTRY: Arc<CrsRegistry> = Arc::new(CrsRegistry::new());
}

/// Area of use in degrees, `west` may exceed `east` for areas crossing 180°
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaOfUse {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl AreaOfUse {
    /// Check whether the area wraps across the anti-meridian
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Check whether a WGS84 position lies inside the area
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// The area as a WGS84 bounding box, rejected when it crosses 180°
    pub fn to_bbox(&self) -> GeoResult<BoundingBox> {
        BoundingBox::new(self.west, self.south, self.east, self.north)
    }
}

/// One registry row
#[derive(Debug, Clone, PartialEq)]
pub struct CrsEntry {
    /// Canonical code, e.g. "EPSG:4326"
    pub code: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub area_of_use: Option<AreaOfUse>,
    pub projected: bool,
    /// Geodetic datum name, when known
    pub datum: Option<String>,
    /// proj4 definition used to build transform pipelines
    pub proj4: Option<String>,
}

impl CrsEntry {
    /// Numeric EPSG code of this entry
    pub fn epsg(&self) -> Option<u32> {
        epsg_number(&self.code)
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsMatch {
    pub name: String,
    pub code: String,
}

/// Lookup table for coordinate reference systems
///
/// Entries are immutable once built. Aliases registered at runtime and
/// resolved names are kept behind read-write locks so a shared registry can
/// be used from many threads.
pub struct CrsRegistry {
    entries: HashMap<String, CrsEntry>,
    /// lowercase name/alias -> code
    alias_index: HashMap<String, String>,
    /// lowercase alias -> (alias as registered, code)
    custom_aliases: RwLock<HashMap<String, (String, String)>>,
    resolve_cache: RwLock<HashMap<String, String>>,
}

impl CrsRegistry {
    /// Build a registry from the embedded table plus generated UTM zones
    pub fn new() -> Self {
        let mut entries: HashMap<String, CrsEntry> = HashMap::new();

        for entry in utm_entries() {
            entries.insert(entry.code.clone(), entry);
        }
        for entry in REGISTRY_TABLE.iter() {
            entries.insert(entry.code.clone(), entry.clone());
        }

        let mut ordered: Vec<&CrsEntry> = entries.values().collect();
        ordered.sort_by_key(|entry| entry.epsg().unwrap_or(u32::MAX));

        for (key, codes) in name_collisions(&ordered) {
            warn!("CRS name '{}' is claimed by {}", key, codes.join(", "));
        }
        let alias_index = build_alias_index(&ordered);

        debug!("CRS registry built with {} entries and {} names", entries.len(), alias_index.len());

        CrsRegistry {
            entries,
            alias_index,
            custom_aliases: RwLock::new(HashMap::new()),
            resolve_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry, built on first use
    pub fn shared() -> Arc<CrsRegistry> {
        Arc::clone(&SHARED_REGISTRY)
    }

    /// Resolve a code, alias or OGC URI to a canonical `EPSG:n` string
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Accepted forms are `EPSG:n`, bare `n`, `urn:ogc:def:crs:EPSG::n`,
    /// `http(s)://www.opengis.net/def/crs/EPSG/0/n`, the CRS84 identifiers
    /// and any canonical name or alias.
    ///
    /// # Returns
    /// The canonical code, or `GeoError::UnknownCrs`
    pub fn resolve(&self, name_or_alias: &str) -> GeoResult<String> {
        let key = name_or_alias.trim().to_lowercase();
        if key.is_empty() {
            return Err(GeoError::UnknownCrs(name_or_alias.to_string()));
        }

        if let Some(code) = read_lock(&self.resolve_cache).get(&key) {
            return Ok(code.clone());
        }

        let code = self.resolve_uncached(&key)
            .ok_or_else(|| GeoError::UnknownCrs(name_or_alias.trim().to_string()))?;

        write_lock(&self.resolve_cache).insert(key, code.clone());
        Ok(code)
    }

    fn resolve_uncached(&self, key: &str) -> Option<String> {
        if let Some(code) = self.alias_index.get(key) {
            return Some(code.clone());
        }
        if let Some((_, code)) = read_lock(&self.custom_aliases).get(key) {
            return Some(code.clone());
        }
        if is_crs84(key) {
            return Some("EPSG:4326".to_string());
        }

        let number = parse_code_form(key)?;
        self.known_code(number)
    }

    /// Canonical code for a numeric EPSG code known to the registry or the
    /// backing store
    fn known_code(&self, number: u32) -> Option<String> {
        let code = format!("EPSG:{}", number);
        if self.entries.contains_key(&code) || backing_proj4(number).is_some() {
            Some(code)
        } else {
            None
        }
    }

    /// Search names and aliases for a substring
    ///
    /// Exact alias matches rank first, then prefix matches, then plain
    /// substring matches; ties are ordered by ascending EPSG code. Each code
    /// appears at most once.
    pub fn search(&self, term: &str) -> Vec<CrsMatch> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let custom = read_lock(&self.custom_aliases);
        let mut hits: Vec<(u8, u32, CrsMatch)> = Vec::new();

        for entry in self.entries.values() {
            let extra = custom.values().filter(|(_, code)| code == &entry.code).map(|(alias, _)| alias);
            let names = std::iter::once(&entry.name)
                .chain(entry.aliases.iter())
                .chain(std::iter::once(&entry.code))
                .chain(extra);

            let rank = names.filter_map(|name| match_rank(&name.to_lowercase(), &needle)).min();
            if let Some(rank) = rank {
                hits.push((rank, entry.epsg().unwrap_or(u32::MAX), CrsMatch {
                    name: entry.name.clone(),
                    code: entry.code.clone(),
                }));
            }
        }

        hits.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, _, m)| m).collect()
    }

    /// Register an extra alias for an existing CRS
    ///
    /// # Arguments
    /// * `alias` - New human name
    /// * `target` - Anything [`resolve`](Self::resolve) accepts
    pub fn register_alias(&self, alias: &str, target: &str) -> GeoResult<()> {
        let code = self.resolve(target)?;
        let key = alias.trim().to_lowercase();
        if key.is_empty() {
            return Err(GeoError::Config("alias must not be empty".to_string()));
        }

        debug!("Registering CRS alias '{}' -> {}", alias.trim(), code);
        write_lock(&self.custom_aliases).insert(key.clone(), (alias.trim().to_string(), code.clone()));
        write_lock(&self.resolve_cache).insert(key, code);
        Ok(())
    }

    /// All names a CRS is known by, canonical name first
    pub fn list_aliases(&self, code: &str) -> GeoResult<Vec<String>> {
        let code = self.resolve(code)?;
        let mut names = Vec::new();
        if let Some(entry) = self.entries.get(&code) {
            names.push(entry.name.clone());
            names.extend(entry.aliases.iter().cloned());
        }

        let custom = read_lock(&self.custom_aliases);
        let mut extra: Vec<String> = custom.values()
            .filter(|(_, target)| target == &code)
            .map(|(alias, _)| alias.clone())
            .collect();
        extra.sort();
        names.extend(extra);
        Ok(names)
    }

    /// Full registry row for a CRS
    ///
    /// Codes that only exist in the EPSG backing store get a synthesized
    /// entry named after the code.
    pub fn entry(&self, code: &str) -> GeoResult<CrsEntry> {
        let code = self.resolve(code)?;
        if let Some(entry) = self.entries.get(&code) {
            return Ok(entry.clone());
        }

        let proj4 = epsg_number(&code).and_then(backing_proj4)
            .ok_or_else(|| GeoError::UnknownCrs(code.clone()))?;
        Ok(CrsEntry {
            name: code.clone(),
            code,
            aliases: Vec::new(),
            area_of_use: None,
            projected: proj4_is_projected(proj4),
            datum: proj4_datum(proj4),
            proj4: Some(proj4.to_string()),
        })
    }

    /// Check whether a CRS has projected (metric) axes
    pub fn is_projected(&self, code: &str) -> GeoResult<bool> {
        Ok(self.entry(code)?.projected)
    }

    /// Area of use of a CRS, when recorded
    pub fn area_of_use(&self, code: &str) -> GeoResult<Option<AreaOfUse>> {
        Ok(self.entry(code)?.area_of_use)
    }

    /// proj4 definition of a CRS
    pub fn proj4(&self, code: &str) -> GeoResult<String> {
        let entry = self.entry(code)?;
        entry.proj4.ok_or(GeoError::UnknownCrs(entry.code))
    }
}

impl Default for CrsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric part of an `EPSG:n` code
pub fn epsg_number(code: &str) -> Option<u32> {
    code.trim()
        .to_ascii_uppercase()
        .strip_prefix("EPSG:")
        .and_then(|n| n.parse::<u32>().ok())
}

/// proj4 string from the EPSG backing store
pub fn backing_proj4(number: u32) -> Option<&'static str> {
    u16::try_from(number).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check whether a proj4 definition describes projected coordinates
pub fn proj4_is_projected(proj4: &str) -> bool {
    !(proj4.contains("+proj=longlat") || proj4.contains("+proj=latlong") || proj4.contains("+proj=geocent"))
}

/// Datum name carried by a proj4 definition, when one is named
pub fn proj4_datum(proj4: &str) -> Option<String> {
    proj4.split_whitespace()
        .find_map(|token| token.strip_prefix("+datum="))
        .map(|d| d.to_string())
}

fn match_rank(name: &str, needle: &str) -> Option<u8> {
    if name == needle {
        Some(0)
    } else if name.starts_with(needle) {
        Some(1)
    } else if name.contains(needle) {
        Some(2)
    } else {
        None
    }
}

fn is_crs84(key: &str) -> bool {
    matches!(
        key,
        "crs84" | "ogc:crs84" | "urn:ogc:def:crs:ogc:1.3:crs84" | "urn:ogc:def:crs:ogc::crs84"
            | "http://www.opengis.net/def/crs/ogc/1.3/crs84"
            | "https://www.opengis.net/def/crs/ogc/1.3/crs84"
    )
}

/// Extract the EPSG number from the code forms `resolve` accepts
fn parse_code_form(key: &str) -> Option<u32> {
    if let Some(rest) = key.strip_prefix("epsg:") {
        return rest.trim().parse().ok();
    }
    if let Some(rest) = key.strip_prefix("urn:ogc:def:crs:epsg:") {
        // urn:ogc:def:crs:EPSG::4326 or with a version, urn:ogc:def:crs:EPSG:6.6:4326
        return rest.rsplit(':').next().and_then(|n| n.parse().ok());
    }
    for prefix in ["http://www.opengis.net/def/crs/epsg/", "https://www.opengis.net/def/crs/epsg/"] {
        if let Some(rest) = key.strip_prefix(prefix) {
            return rest.trim_end_matches('/').rsplit('/').next().and_then(|n| n.parse().ok());
        }
    }
    for prefix in ["http://www.opengis.net/gml/srs/epsg.xml#", "epsg.xml#"] {
        if let Some(rest) = key.strip_prefix(prefix) {
            return rest.parse().ok();
        }
    }
    if key.chars().all(|c| c.is_ascii_digit()) {
        return key.parse().ok();
    }
    None
}

/// Lowercase lookup keys in precedence order: codes, then explicit
/// aliases, then canonical names. The first claim on a key wins.
fn build_alias_index(entries: &[&CrsEntry]) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for entry in entries {
        index.insert(entry.code.to_lowercase(), entry.code.clone());
    }
    for entry in entries {
        for alias in &entry.aliases {
            index.entry(alias.to_lowercase()).or_insert_with(|| entry.code.clone());
        }
    }
    for entry in entries {
        index.entry(entry.name.to_lowercase()).or_insert_with(|| entry.code.clone());
    }
    index
}

/// Lowercase names or aliases that more than one entry claims
///
/// # Returns
/// Each contested key with the codes claiming it, sorted by key
pub fn name_collisions(entries: &[&CrsEntry]) -> Vec<(String, Vec<String>)> {
    let mut claims: HashMap<String, Vec<String>> = HashMap::new();
    for entry in entries {
        let names = std::iter::once(&entry.name).chain(entry.aliases.iter());
        for name in names {
            let codes = claims.entry(name.to_lowercase()).or_default();
            if !codes.contains(&entry.code) {
                codes.push(entry.code.clone());
            }
        }
    }

    let mut contested: Vec<(String, Vec<String>)> = claims.into_iter()
        .filter(|(_, codes)| codes.len() > 1)
        .collect();
    contested.sort();
    contested
}

/// Registry rows for the WGS84 UTM zones
fn utm_entries() -> Vec<CrsEntry> {
    let mut entries = Vec::with_capacity(120);
    for zone in 1..=60u8 {
        for northern in [true, false] {
            let hemi = if northern { 'N' } else { 'S' };
            let west = utm::central_meridian(zone) - 3.0;
            let (south, north) = if northern { (0.0, 84.0) } else { (-80.0, 0.0) };

            entries.push(CrsEntry {
                code: utm::utm_epsg(zone, northern),
                name: format!("WGS 84 / UTM zone {}{}", zone, hemi),
                aliases: vec![
                    format!("UTM {}{}", zone, hemi),
                    format!("UTM zone {}{}", zone, hemi),
                    format!("WGS84 UTM {}{}", zone, hemi),
                ],
                area_of_use: Some(AreaOfUse { west, south, east: west + 6.0, north }),
                projected: true,
                datum: Some("WGS84".to_string()),
                proj4: Some(format!(
                    "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
                    zone,
                    if northern { "" } else { " +south" }
                )),
            });
        }
    }
    entries
}

/// Parse registry rows from the TOML table
pub fn parse_registry_table(content: &str) -> GeoResult<Vec<CrsEntry>> {
    let toml_value: toml::Value = match content.parse() {
        Ok(value) => value,
        Err(e) => return Err(GeoError::Config(format!("Failed to parse CRS registry TOML: {}", e))),
    };

    let rows = toml_value.get("crs").and_then(|v| v.as_array())
        .ok_or_else(|| GeoError::Config("CRS registry has no [[crs]] entries".to_string()))?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let code = row.get("code").and_then(|v| v.as_integer())
            .ok_or_else(|| GeoError::Config("CRS registry entry without integer code".to_string()))?;
        let name = row.get("name").and_then(|v| v.as_str())
            .ok_or_else(|| GeoError::Config(format!("CRS registry entry {} has no name", code)))?;

        let aliases = row.get("aliases").and_then(|v| v.as_array())
            .map(|list| list.iter().filter_map(|a| a.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let area_of_use = row.get("area_of_use").and_then(|v| v.as_array()).and_then(|list| {
            let values: Vec<f64> = list.iter()
                .filter_map(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
                .collect();
            match values.as_slice() {
                [west, south, east, north] => Some(AreaOfUse {
                    west: *west,
                    south: *south,
                    east: *east,
                    north: *north,
                }),
                _ => None,
            }
        });

        let proj4 = row.get("proj4").and_then(|v| v.as_str()).map(str::to_string);
        let projected = row.get("projected").and_then(|v| v.as_bool())
            .unwrap_or_else(|| proj4.as_deref().map(proj4_is_projected).unwrap_or(false));
        let datum = row.get("datum").and_then(|v| v.as_str()).map(str::to_string)
            .or_else(|| proj4.as_deref().and_then(proj4_datum));

        entries.push(CrsEntry {
            code: format!("EPSG:{}", code),
            name: name.to_string(),
            aliases,
            area_of_use,
            projected,
            datum,
            proj4,
        });
    }

    Ok(entries)
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_forms() {
        let registry = CrsRegistry::new();
        assert_eq!(registry.resolve("EPSG:4326").unwrap(), "EPSG:4326");
        assert_eq!(registry.resolve("  epsg:3857 ").unwrap(), "EPSG:3857");
        assert_eq!(registry.resolve("4326").unwrap(), "EPSG:4326");
        assert_eq!(registry.resolve("urn:ogc:def:crs:EPSG::27700").unwrap(), "EPSG:27700");
        assert_eq!(registry.resolve("urn:ogc:def:crs:EPSG:6.6:4326").unwrap(), "EPSG:4326");
        assert_eq!(registry.resolve("http://www.opengis.net/def/crs/EPSG/0/32618").unwrap(), "EPSG:32618");
        assert_eq!(registry.resolve("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(), "EPSG:4326");
    }

    #[test]
    fn test_resolve_aliases_case_insensitive() {
        let registry = CrsRegistry::new();
        assert_eq!(registry.resolve("OSGB36").unwrap(), "EPSG:27700");
        assert_eq!(registry.resolve("web mercator").unwrap(), "EPSG:3857");
        assert_eq!(registry.resolve("WGS84").unwrap(), "EPSG:4326");
        assert_eq!(registry.resolve("utm zone 33s").unwrap(), "EPSG:32733");
    }

    #[test]
    fn test_names_map_to_one_code() {
        let mut rows = utm_entries();
        rows.extend(REGISTRY_TABLE.iter().cloned());
        let rows: Vec<&CrsEntry> = rows.iter().collect();
        assert_eq!(name_collisions(&rows), Vec::<(String, Vec<String>)>::new());
    }

    #[test]
    fn test_alias_beats_other_entry_name() {
        let geographic = CrsEntry {
            code: "EPSG:4277".to_string(),
            name: "Grid36".to_string(),
            aliases: vec![],
            area_of_use: None,
            projected: false,
            datum: None,
            proj4: None,
        };
        let projected = CrsEntry {
            code: "EPSG:27700".to_string(),
            name: "Grid36 / National".to_string(),
            aliases: vec!["GRID36".to_string()],
            ..geographic.clone()
        };
        for order in [vec![&geographic, &projected], vec![&projected, &geographic]] {
            assert_eq!(name_collisions(&order).len(), 1);
            let index = build_alias_index(&order);
            assert_eq!(index["grid36"], "EPSG:27700");
        }
    }

    #[test]
    fn test_osgb36_resolves_to_national_grid_every_time() {
        for _ in 0..20 {
            assert_eq!(CrsRegistry::new().resolve("OSGB36").unwrap(), "EPSG:27700");
        }
        assert_eq!(CrsRegistry::new().resolve("OSGB 1936").unwrap(), "EPSG:4277");
    }

    #[test]
    fn test_unknown_crs() {
        let registry = CrsRegistry::new();
        let err = registry.resolve("Middle Earth Grid").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnknownCrs);
        assert!(registry.resolve("").is_err());
        assert!(registry.resolve("EPSG:99999999").is_err());
    }

    #[test]
    fn test_search_ranking() {
        let registry = CrsRegistry::new();
        let hits = registry.search("nad83");
        assert!(!hits.is_empty());
        // exact alias match before prefix matches like "NAD83 / UTM zone 18N"
        assert_eq!(hits[0].code, "EPSG:4269");
        assert!(hits.iter().any(|m| m.code == "EPSG:26918"));

        let hits = registry.search("mercator");
        let codes: Vec<&str> = hits.iter().map(|m| m.code.as_str()).collect();
        assert!(codes.contains(&"EPSG:3857"));
        assert!(codes.contains(&"EPSG:3395"));
        assert!(registry.search("   ").is_empty());
    }

    #[test]
    fn test_search_ties_by_code() {
        let registry = CrsRegistry::new();
        let hits = registry.search("utm zone 1");
        let numbers: Vec<u32> = hits.iter().filter_map(|m| epsg_number(&m.code)).collect();
        assert_eq!(numbers[0], 32601);

        // prefix hits on the WGS84 zone aliases come in code order, the
        // substring hit on "NAD83 / UTM zone 18N" follows them
        let prefix_hits: Vec<u32> = numbers.iter().copied().take_while(|n| *n >= 32600).collect();
        let mut sorted = prefix_hits.clone();
        sorted.sort();
        assert_eq!(prefix_hits, sorted);
        let nad83 = numbers.iter().position(|n| *n == 26918).unwrap();
        assert!(nad83 >= prefix_hits.len());
    }

    #[test]
    fn test_register_alias() {
        let registry = CrsRegistry::new();
        registry.register_alias("Survey Grid", "EPSG:27700").unwrap();
        assert_eq!(registry.resolve("survey grid").unwrap(), "EPSG:27700");
        assert!(registry.list_aliases("EPSG:27700").unwrap().contains(&"Survey Grid".to_string()));
        assert!(registry.register_alias("Nowhere", "EPSG:0").is_err());
    }

    #[test]
    fn test_entry_metadata() {
        let registry = CrsRegistry::new();
        assert!(registry.is_projected("EPSG:3857").unwrap());
        assert!(!registry.is_projected("EPSG:4326").unwrap());

        let area = registry.area_of_use("EPSG:32618").unwrap().unwrap();
        assert!(area.contains(-74.0, 40.7));
        assert!(!area.contains(-80.0, 40.7));

        let nad83 = registry.area_of_use("NAD83").unwrap().unwrap();
        assert!(nad83.crosses_antimeridian());
        assert!(nad83.to_bbox().is_err());
    }

    #[test]
    fn test_backing_store_entry() {
        let registry = CrsRegistry::new();
        // Not in the embedded table
        let entry = registry.entry("EPSG:2263").unwrap();
        assert_eq!(entry.code, "EPSG:2263");
        assert!(entry.projected);
        assert!(entry.proj4.is_some());
    }
}
