//! Geolocation lookups
//!
//! Resolves an address to the `location.latitude` / `location.longitude`
//! pair of its record and maps decoder failures onto the caller-facing
//! [`GeoError`] kinds.

use crate::data_section::{DataType, PathElement};
use crate::database::Database;
use crate::error::GeoError;
use crate::mmdb::{Entry, MmdbError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

const LATITUDE_PATH: [PathElement<'static>; 2] =
    [PathElement::Key("location"), PathElement::Key("latitude")];
const LONGITUDE_PATH: [PathElement<'static>; 2] =
    [PathElement::Key("location"), PathElement::Key("longitude")];

/// Geographic coordinates of an address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl Database {
    /// Resolve an address string to its coordinates
    ///
    /// # Errors
    ///
    /// - [`GeoError::InvalidAddress`] if `ip` does not parse
    /// - [`GeoError::LocationNotFound`] if no record covers the address
    /// - [`GeoError::LatitudeNotFound`] / [`GeoError::LongitudeNotFound`] if
    ///   the record lacks a coordinate
    /// - [`GeoError::InvalidLocationType`] if a coordinate is not a double
    /// - [`GeoError::CorruptData`] if the database is damaged
    pub fn location(&self, ip: &str) -> Result<Location, GeoError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;
        self.location_ip(addr)
    }

    /// Resolve a parsed address to its coordinates
    pub fn location_ip(&self, addr: IpAddr) -> Result<Location, GeoError> {
        let entry = self.lookup_ip(addr)?.ok_or(GeoError::LocationNotFound)?;

        let latitude = self.coordinate(entry, &LATITUDE_PATH, GeoError::LatitudeNotFound)?;
        let longitude = self.coordinate(entry, &LONGITUDE_PATH, GeoError::LongitudeNotFound)?;

        Ok(Location {
            latitude,
            longitude,
        })
    }

    fn coordinate(
        &self,
        entry: Entry,
        path: &[PathElement<'_>],
        missing: GeoError,
    ) -> Result<f64, GeoError> {
        match self.decode_path_as(entry.data_offset, path, DataType::Double) {
            Ok(value) => value
                .as_f64()
                .ok_or_else(|| GeoError::InvalidLocationType(value.data_type().to_string())),
            Err(MmdbError::PathNotFound) => Err(missing),
            Err(MmdbError::TypeMismatch { found, .. }) => {
                Err(GeoError::InvalidLocationType(found.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
