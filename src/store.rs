//! The entity store.
//!
//! The store keeps three independent collections: vehicles, routes, and
//! stops. Each collection maps identifiers to entities. Readers get hold of
//! a collection through a [`View`], which is a cheap, shared snapshot: the
//! store copies a collection on write if a view of it is still around, so a
//! view never changes underneath its holder.

use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use crate::entity::{Entity, Route, Stop, Vehicle};


//------------ View ----------------------------------------------------------

/// A read-only snapshot of a collection.
pub type View<T> = Arc<HashMap<String, T>>;


//------------ Collection ----------------------------------------------------

/// A mapping from identifiers to entities.
#[derive(Clone, Debug)]
pub struct Collection<T> {
    items: View<T>,
}

impl<T: Entity> Collection<T> {
    /// Replaces the entire content of the collection.
    ///
    /// If `items` contains an identifier more than once, the last one wins.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items = Arc::new(
            items.into_iter().map(|item| (item.id().into(), item)).collect()
        );
    }

    /// Inserts an entity or overwrites the one with the same identifier.
    pub fn upsert(&mut self, item: T) {
        Arc::make_mut(&mut self.items).insert(item.id().into(), item);
    }

    /// Removes the entity with the given identifier.
    ///
    /// Returns whether there was such an entity.
    pub fn remove(&mut self, id: &str) -> bool {
        // Don’t copy the map if there is nothing to remove.
        if !self.items.contains_key(id) {
            return false
        }
        Arc::make_mut(&mut self.items).remove(id).is_some()
    }

    pub fn view(&self) -> View<T> {
        self.items.clone()
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection { items: Default::default() }
    }
}


//------------ Store ---------------------------------------------------------

/// The entity store.
///
/// Only routes and stops loaded from the reference snapshots and vehicles
/// updated through the stream ever go in here, so the mutating methods
/// are limited to what these need.
#[derive(Clone, Debug, Default)]
pub struct Store {
    vehicles: Collection<Vehicle>,
    routes: Collection<Route>,
    stops: Collection<Stop>,

    /// Incremented with every mutation.
    version: u64,
}

impl Store {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn replace_vehicles(&mut self, items: impl IntoIterator<Item = Vehicle>) {
        self.vehicles.replace_all(items);
        self.bump();
    }

    pub fn upsert_vehicle(&mut self, item: Vehicle) {
        self.vehicles.upsert(item);
        self.bump();
    }

    /// Removes a vehicle. Removing an unknown vehicle does nothing.
    pub fn remove_vehicle(&mut self, id: &str) {
        if self.vehicles.remove(id) {
            self.bump();
        }
    }

    pub fn replace_routes(&mut self, items: impl IntoIterator<Item = Route>) {
        self.routes.replace_all(items);
        self.bump();
    }

    pub fn replace_stops(&mut self, items: impl IntoIterator<Item = Stop>) {
        self.stops.replace_all(items);
        self.bump();
    }

    pub fn vehicles(&self) -> View<Vehicle> {
        self.vehicles.view()
    }

    pub fn routes(&self) -> View<Route> {
        self.routes.view()
    }

    pub fn stops(&self) -> View<Stop> {
        self.stops.view()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns views of all three collections at once.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            vehicles: self.vehicles(),
            routes: self.routes(),
            stops: self.stops(),
        }
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}


//------------ Snapshot ------------------------------------------------------

/// Consistent views of all collections of a store.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Snapshot {
    pub version: u64,
    pub vehicles: View<Vehicle>,
    pub routes: View<Route>,
    pub stops: View<Stop>,
}

impl Snapshot {
    /// Returns the route of a vehicle if it is known.
    pub fn route_of(&self, vehicle: &Vehicle) -> Option<&Route> {
        self.routes.get(&vehicle.route_id)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use kurbo::Point;
    use super::*;

    fn vehicle(id: &str, route: &str, x: f64, y: f64) -> Vehicle {
        Vehicle { id: id.into(), route_id: route.into(), pos: Point::new(x, y) }
    }

    fn route(id: &str, color: &str) -> Route {
        Route { id: id.into(), color: color.into() }
    }

    fn stop(id: &str) -> Stop {
        Stop { id: id.into(), name: id.into(), pos: Point::ZERO }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut once = Store::new();
        once.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        let mut twice = Store::new();
        twice.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        twice.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        assert_eq!(once.vehicles(), twice.vehicles());
        assert_eq!(twice.vehicles().len(), 1);
    }

    #[test]
    fn upsert_overwrites() {
        let mut store = Store::new();
        store.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        store.upsert_vehicle(vehicle("v1", "r2", 3., 4.));
        let vehicles = store.vehicles();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles["v1"], vehicle("v1", "r2", 3., 4.));
    }

    #[test]
    fn last_writer_wins() {
        let mut store = Store::new();
        store.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        store.remove_vehicle("v1");
        assert!(store.vehicles().get("v1").is_none());

        let mut store = Store::new();
        store.remove_vehicle("v1");
        store.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        assert!(store.vehicles().get("v1").is_some());
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut store = Store::new();
        store.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        let version = store.version();
        store.remove_vehicle("v2");
        assert_eq!(store.version(), version);
        assert_eq!(store.vehicles().len(), 1);
    }

    #[test]
    fn replace_only_touches_one_collection() {
        let mut store = Store::new();
        store.replace_routes([route("r1", "ff0000")]);
        store.replace_stops([stop("s1"), stop("s2")]);
        store.replace_vehicles([
            vehicle("v1", "r1", 1., 2.), vehicle("v2", "r1", 1., 2.)
        ]);
        store.replace_vehicles([]);
        assert!(store.vehicles().is_empty());
        assert_eq!(store.routes().len(), 1);
        assert_eq!(store.stops().len(), 2);
    }

    #[test]
    fn replace_discards_previous() {
        let mut store = Store::new();
        store.replace_vehicles([vehicle("v1", "r1", 1., 2.)]);
        store.replace_vehicles([vehicle("v2", "r1", 1., 2.)]);
        let vehicles = store.vehicles();
        assert_eq!(vehicles.len(), 1);
        assert!(vehicles.contains_key("v2"));
    }

    #[test]
    fn views_are_stable() {
        let mut store = Store::new();
        store.upsert_vehicle(vehicle("v1", "r1", 1., 2.));
        let before = store.snapshot();
        store.upsert_vehicle(vehicle("v1", "r1", 5., 6.));
        store.remove_vehicle("v1");
        assert_eq!(before.vehicles["v1"].pos, Point::new(1., 2.));
        assert!(store.vehicles().is_empty());
        assert!(store.version() > before.version);
    }

    #[test]
    fn dangling_route() {
        let mut store = Store::new();
        store.replace_routes([route("r1", "ff0000")]);
        store.upsert_vehicle(vehicle("v1", "nope", 1., 2.));
        let snapshot = store.snapshot();
        assert!(snapshot.route_of(&snapshot.vehicles["v1"]).is_none());
    }
}
