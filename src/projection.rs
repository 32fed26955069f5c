//! The geographic projection.
//!
//! Everything that ends up on the map, vehicles and stops alike, is placed
//! through [`Viewport::project`]. Mixing in any other projection will make
//! vehicles drift away from the stops they are sitting at.

use std::f64::consts::PI;
use std::fmt;
use kurbo::Point;


//------------ Configurable Constants ----------------------------------------

/// The default width of the projection surface.
pub const DEFAULT_WIDTH: f64 = 496.;

/// The default height of the projection surface.
pub const DEFAULT_HEIGHT: f64 = 496.;


//------------ project -------------------------------------------------------

/// Projects a longitude and latitude onto a plane of the given size.
///
/// This is a spherical Mercator projection. The horizontal position scales
/// linearly with the longitude so that the full range of `-180. ..= 180.`
/// covers `0. ..= width`. The vertical position is inverted so that north
/// is up, with the equator at half the height.
///
/// The latitude must be strictly between the poles. At the poles the
/// result is infinite.
pub fn project(width: f64, height: f64, lon: f64, lat: f64) -> Point {
    let x = (lon + 180.) * (width / 360.);
    let merc_n = (PI / 4. + lat.to_radians() / 2.).tan().ln();
    let y = height / 2. - width * merc_n / (2. * PI);
    Point::new(x, y)
}


//------------ Viewport ------------------------------------------------------

/// The size of the surface geographic coordinates are projected onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    /// Projects a position given as longitude and latitude.
    pub fn project(self, lon: f64, lat: f64) -> Point {
        project(self.width, self.height, lon, lat)
    }

    /// Checks that a position can be projected to finite coordinates.
    pub fn check(lon: f64, lat: f64) -> Result<(), OutOfRange> {
        if (-180. ..= 180.).contains(&lon) && lat > -90. && lat < 90. {
            Ok(())
        }
        else {
            Err(OutOfRange { lon, lat })
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}


//------------ OutOfRange ----------------------------------------------------

/// A position outside of what the projection can handle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutOfRange {
    pub lon: f64,
    pub lat: f64,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "coordinates out of range: lon {}, lat {}",
            self.lon, self.lat
        )
    }
}

impl std::error::Error for OutOfRange { }


//============ Tests =========================================================
