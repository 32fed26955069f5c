//! Turning the map state into things to draw.

use kurbo::{Point, Size, Vec2};
use crate::entity::{Stop, Vehicle};
use crate::store::Snapshot;
use crate::transform::{Fit, FitTransform};
use super::color::Color;
use super::hover::StopIndex;


//------------ Configurable Constants ----------------------------------------

/// The radius of the dot marking a stop.
const STOP_RADIUS: f64 = 2.;

/// The radius of the dot marking a vehicle.
const VEHICLE_RADIUS: f64 = 2.;

/// The font size of stop labels.
const LABEL_SIZE: f64 = 6.;

/// Where a stop label starts relative to the stop.
const LABEL_OFFSET: Vec2 = Vec2::new(4., 2.);


//------------ Primitive -----------------------------------------------------

/// Something to draw.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Circle {
        center: Point,
        radius: f64,
        fill: Color,
    },
    Label {
        /// The left end of the text’s baseline.
        anchor: Point,
        text: String,
        size: f64,
        fill: Color,

        /// The color of the box behind the text.
        backdrop: Color,
    },
}


//------------ Scene ---------------------------------------------------------

/// Everything to draw for one frame.
#[derive(Clone, Debug)]
pub struct Scene {
    pub size: Size,
    pub background: Color,

    /// The primitives in drawing order.
    pub items: Vec<Primitive>,
}


//------------ Presenter -----------------------------------------------------

/// Creates scenes from map state.
///
/// Stops go at the bottom, vehicles above them, and the label of the
/// stop the pointer is hovering over on top.
#[derive(Clone, Debug)]
pub struct Presenter<F = FitTransform> {
    fit: F,
    size: Size,
}

impl<F: Fit> Presenter<F> {
    pub fn new(fit: F, size: Size) -> Self {
        Presenter { fit, size }
    }

    /// Converts a projected position into canvas coordinates.
    pub fn place(&self, pos: Point) -> Point {
        self.fit.apply(pos)
    }

    pub fn scene(&self, snapshot: &Snapshot, hover: Option<&str>) -> Scene {
        let mut stops: Vec<&Stop> = snapshot.stops.values().collect();
        stops.sort_by(|a, b| a.id.cmp(&b.id));
        let mut vehicles: Vec<&Vehicle> = snapshot.vehicles.values().collect();
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));

        let mut items = Vec::with_capacity(stops.len() + vehicles.len() + 1);
        items.extend(stops.iter().map(|stop| Primitive::Circle {
            center: self.place(stop.pos),
            radius: STOP_RADIUS,
            fill: Color::STOP,
        }));
        items.extend(vehicles.iter().map(|vehicle| Primitive::Circle {
            center: self.place(vehicle.pos),
            radius: VEHICLE_RADIUS,
            fill: vehicle_color(snapshot, vehicle),
        }));
        if let Some(stop) = hover.and_then(|id| snapshot.stops.get(id)) {
            items.push(Primitive::Label {
                anchor: self.place(stop.pos) + LABEL_OFFSET,
                text: stop.name.clone(),
                size: LABEL_SIZE,
                fill: Color::LABEL,
                backdrop: Color::BACKGROUND,
            })
        }

        Scene { size: self.size, background: Color::BACKGROUND, items }
    }

    /// Creates an index for finding stops by canvas position.
    pub fn stop_index(&self, snapshot: &Snapshot) -> StopIndex {
        StopIndex::new(snapshot.stops.values().map(|stop| {
            (self.place(stop.pos), stop.id.clone())
        }))
    }
}


//------------ vehicle_color -------------------------------------------------

/// Returns the color for a vehicle.
///
/// This is the color of the vehicle’s route or a neutral grey if the route
/// is unknown or its color unusable.
pub fn vehicle_color(snapshot: &Snapshot, vehicle: &Vehicle) -> Color {
    snapshot.route_of(vehicle).and_then(|route| {
        Color::hex(&route.color).ok()
    }).unwrap_or(Color::UNKNOWN_ROUTE)
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::entity::Route;
    use crate::store::Store;
    use crate::transform::Identity;
    use super::*;

    fn snapshot() -> Snapshot {
        let mut store = Store::new();
        store.replace_routes([
            Route { id: "R1".into(), color: "ff0000".into() },
            Route { id: "R2".into(), color: "not a color".into() },
        ]);
        store.replace_stops([
            Stop { id: "S1".into(), name: "Park".into(), pos: Point::new(1., 1.) },
        ]);
        store.replace_vehicles([
            Vehicle { id: "V1".into(), route_id: "R1".into(), pos: Point::new(2., 2.) },
            Vehicle { id: "V2".into(), route_id: "R2".into(), pos: Point::new(3., 3.) },
            Vehicle { id: "V3".into(), route_id: "R9".into(), pos: Point::new(4., 4.) },
        ]);
        store.snapshot()
    }

    fn fill(item: &Primitive) -> Color {
        match *item {
            Primitive::Circle { fill, .. } => fill,
            Primitive::Label { fill, .. } => fill,
        }
    }

    #[test]
    fn layering_and_colors() {
        let presenter = Presenter::new(Identity, Size::new(10., 10.));
        let scene = presenter.scene(&snapshot(), None);
        assert_eq!(scene.items.len(), 4);
        assert_eq!(fill(&scene.items[0]), Color::STOP);
        assert_eq!(fill(&scene.items[1]), Color::rgb(1., 0., 0.));
        assert_eq!(fill(&scene.items[2]), Color::UNKNOWN_ROUTE);
        assert_eq!(fill(&scene.items[3]), Color::UNKNOWN_ROUTE);
    }

    #[test]
    fn hover_label() {
        let presenter = Presenter::new(
            FitTransform::new(0., 0., 10.), Size::new(100., 100.)
        );
        let scene = presenter.scene(&snapshot(), Some("S1"));
        match scene.items.last() {
            Some(Primitive::Label { anchor, text, .. }) => {
                assert_eq!(text, "Park");
                assert_eq!(*anchor, Point::new(14., 12.));
            }
            other => panic!("unexpected {:?}", other),
        }

        // Unknown stops don’t get a label.
        let scene = presenter.scene(&snapshot(), Some("S2"));
        assert_eq!(scene.items.len(), 4);
    }

    #[test]
    fn fit_is_applied() {
        let presenter = Presenter::new(
            FitTransform::new(1., 1., 2.), Size::new(100., 100.)
        );
        let scene = presenter.scene(&snapshot(), None);
        match scene.items[0] {
            Primitive::Circle { center, .. } => assert_eq!(center, Point::ZERO),
            ref other => panic!("unexpected {:?}", other),
        }
    }
}
