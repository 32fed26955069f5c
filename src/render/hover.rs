//! Finding the stop under the pointer.

use kurbo::Point;
use rstar::{PointDistance, RTree};
use rstar::primitives::GeomWithData;


//------------ Configurable Constants ----------------------------------------

/// How far from a stop in canvas units the pointer may be to still hit it.
pub const HOVER_DISTANCE: f64 = 4.;


//------------ StopIndex -----------------------------------------------------

type IndexedStop = GeomWithData<[f64; 2], String>;

/// A spatial index of stops in canvas coordinates.
pub struct StopIndex {
    stops: RTree<IndexedStop>,
}

impl StopIndex {
    pub fn new(stops: impl IntoIterator<Item = (Point, String)>) -> Self {
        StopIndex {
            stops: RTree::bulk_load(
                stops.into_iter().map(|(pos, id)| {
                    GeomWithData::new([pos.x, pos.y], id)
                }).collect()
            )
        }
    }

    /// Returns the stop closest to `pos` if it is within `max_distance`.
    pub fn find(&self, pos: Point, max_distance: f64) -> Option<&str> {
        let query = [pos.x, pos.y];
        let stop = self.stops.nearest_neighbor(&query)?;
        if stop.distance_2(&query) <= max_distance * max_distance {
            Some(stop.data.as_str())
        }
        else {
            None
        }
    }
}


//============ Tests =========================================================
