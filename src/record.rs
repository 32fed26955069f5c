//! The records delivered by the backend.
//!
//! The backend hands out JSON:API style documents. The types in here only
//! describe the parts we are interested in, anything else is ignored when
//! deserializing.

use std::fmt;
use serde::Deserialize;
use crate::entity::{Route, Stop, Vehicle};
use crate::projection::{OutOfRange, Viewport};


//------------ Document ------------------------------------------------------

/// The envelope around the records of a reference snapshot.
#[derive(Clone, Debug, Deserialize)]
pub struct Document<T> {
    pub data: Vec<T>,
}


//------------ Position ------------------------------------------------------

/// The geographic position attributes of a record.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    fn project(self, id: &str, viewport: Viewport) -> Result<kurbo::Point, RecordError> {
        Viewport::check(self.longitude, self.latitude).map_err(|err| {
            RecordError { id: id.into(), err }
        })?;
        Ok(viewport.project(self.longitude, self.latitude))
    }
}


//------------ VehicleRecord -------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct VehicleRecord {
    pub id: String,
    pub attributes: Position,
    pub relationships: VehicleRelationships,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VehicleRelationships {
    pub route: Relationship,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Relationship {
    pub data: ResourceId,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResourceId {
    pub id: String,
}

impl VehicleRecord {
    /// Converts the record into a vehicle placed through `viewport`.
    pub fn into_vehicle(
        self, viewport: Viewport
    ) -> Result<Vehicle, RecordError> {
        let pos = self.attributes.project(&self.id, viewport)?;
        Ok(Vehicle {
            id: self.id,
            route_id: self.relationships.route.data.id,
            pos,
        })
    }
}


//------------ RouteRecord ---------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub attributes: RouteAttributes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RouteAttributes {
    pub color: String,
}

impl From<RouteRecord> for Route {
    fn from(record: RouteRecord) -> Self {
        Route { id: record.id, color: record.attributes.color }
    }
}


//------------ StopRecord ----------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct StopRecord {
    pub id: String,
    pub attributes: StopAttributes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StopAttributes {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl StopRecord {
    /// Converts the record into a stop placed through `viewport`.
    pub fn into_stop(self, viewport: Viewport) -> Result<Stop, RecordError> {
        let pos = Position {
            latitude: self.attributes.latitude,
            longitude: self.attributes.longitude,
        }.project(&self.id, viewport)?;
        Ok(Stop { id: self.id, name: self.attributes.name, pos })
    }
}


//------------ RemoveRecord --------------------------------------------------

/// The payload of a remove notification.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoveRecord {
    pub id: String,
}


//------------ RecordError ---------------------------------------------------

/// A record could not be converted into an entity.
#[derive(Clone, Debug)]
pub struct RecordError {
    id: String,
    err: OutOfRange,
}

impl RecordError {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.err)
    }
}

impl std::error::Error for RecordError { }


//============ Tests =========================================================
