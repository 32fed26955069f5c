//! The things shown on the map.

use kurbo::Point;
use serde::Serialize;


//------------ Entity --------------------------------------------------------

/// Something that can be kept in an entity collection.
pub trait Entity: Clone {
    /// Returns the identifier the entity is keyed by.
    fn id(&self) -> &str;
}


//------------ Vehicle -------------------------------------------------------

/// A vehicle currently moving along a route.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: String,

    /// The identifier of the route the vehicle serves.
    ///
    /// There may not be a route with this identifier, either because the
    /// routes haven’t been loaded yet or because they never mentioned it.
    pub route_id: String,

    /// The projected position.
    #[serde(with = "point")]
    pub pos: Point,
}

impl Entity for Vehicle {
    fn id(&self) -> &str {
        &self.id
    }
}


//------------ Route ---------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    pub id: String,

    /// The display color as hex digits without a leading `#`.
    pub color: String,
}

impl Entity for Route {
    fn id(&self) -> &str {
        &self.id
    }
}


//------------ Stop ----------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stop {
    pub id: String,
    pub name: String,

    /// The projected position.
    #[serde(with = "point")]
    pub pos: Point,
}

impl Entity for Stop {
    fn id(&self) -> &str {
        &self.id
    }
}


//------------ point ---------------------------------------------------------

/// Serializes a point as `{ "x": .., "y": .. }`.
mod point {
    use kurbo::Point;
    use serde::Serializer;
    use serde::ser::SerializeStruct;

    pub fn serialize<S: Serializer>(
        point: &Point, serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Point", 2)?;
        s.serialize_field("x", &point.x)?;
        s.serialize_field("y", &point.y)?;
        s.end()
    }
}
