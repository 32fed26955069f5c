//! Transformations from projected into canvas coordinates.
//!
//! The projection places everything on a surface covering the whole world.
//! What we actually want to look at is a tiny window of that surface blown
//! up to the size of the canvas. This second step is kept apart from the
//! projection so it can be replaced without touching stored positions.

use kurbo::{Point, TranslateScale, Vec2};


//------------ Configurable Constants ----------------------------------------

/// The default left edge of the window in projected coordinates.
pub const DEFAULT_MIN_X: f64 = 149.85;

/// The default top edge of the window in projected coordinates.
pub const DEFAULT_MIN_Y: f64 = 183.325;

/// The default factor between projected and canvas units.
pub const DEFAULT_SCALE: f64 = 2300.;


//------------ Fit -----------------------------------------------------------

/// A transformation from projected into canvas coordinates.
pub trait Fit {
    fn apply(&self, point: Point) -> Point;
}

impl<'a, F: Fit + ?Sized> Fit for &'a F {
    fn apply(&self, point: Point) -> Point {
        (*self).apply(point)
    }
}


//------------ Identity ------------------------------------------------------

/// The fit that leaves coordinates alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Fit for Identity {
    fn apply(&self, point: Point) -> Point {
        point
    }
}


//------------ FitTransform --------------------------------------------------

/// A fit that moves a window to the origin and scales it up.
///
/// A projected point `p` ends up at `(p - min) * scale`.
#[derive(Clone, Copy, Debug)]
pub struct FitTransform {
    /// The north-west corner of the window in projected coordinates.
    min: Point,

    /// The scale factor.
    scale: f64,

    /// The combined transformation.
    ///
    /// Note that in a `TranslateScale` the scaling happens first and the
    /// translation needs to be in scaled up coordinates.
    transform: TranslateScale,
}

impl FitTransform {
    pub fn new(min_x: f64, min_y: f64, scale: f64) -> Self {
        FitTransform {
            min: Point::new(min_x, min_y),
            scale,
            transform: TranslateScale::new(
                Vec2::new(-min_x * scale, -min_y * scale),
                scale
            ),
        }
    }

    pub fn min(&self) -> Point {
        self.min
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Default for FitTransform {
    fn default() -> Self {
        FitTransform::new(DEFAULT_MIN_X, DEFAULT_MIN_Y, DEFAULT_SCALE)
    }
}

impl Fit for FitTransform {
    fn apply(&self, point: Point) -> Point {
        self.transform * point
    }
}


//============ Tests =========================================================
