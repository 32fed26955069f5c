//! Rendering the map.
//!
//! Rendering happens in two steps. First, a [`Presenter`] turns the current
//! map state into a [`Scene`], a list of primitives in canvas coordinates.
//! The scene is then written out in one of the supported formats.

pub use self::color::Color;
pub use self::hover::{HOVER_DISTANCE, StopIndex};
pub use self::scene::{Presenter, Primitive, Scene, vehicle_color};

use std::fmt;
use std::str::FromStr;

pub mod color;
pub mod hover;
#[cfg(feature = "png")]
pub mod png;
pub mod scene;
pub mod svg;


//------------ Format --------------------------------------------------------

/// The format of a rendered map.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Format {
    Png,
    Svg,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Png => "image/png",
            Format::Svg => "image/svg+xml",
        }
    }

    /// Renders a scene in this format.
    pub fn render(self, scene: &Scene) -> Result<Vec<u8>, RenderError> {
        match self {
            Format::Svg => Ok(svg::to_svg(scene).into_bytes()),
            #[cfg(feature = "png")]
            Format::Png => png::to_png(scene),
            #[cfg(not(feature = "png"))]
            Format::Png => Err(RenderError::Unsupported(self)),
        }
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(Format::Png),
            "svg" => Ok(Format::Svg),
            _ => Err(UnknownFormat),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Format::Png => "png",
            Format::Svg => "svg",
        })
    }
}


//------------ UnknownFormat -------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct UnknownFormat;


//------------ RenderError ---------------------------------------------------

#[derive(Debug)]
pub enum RenderError {
    /// The format isn’t available in this build.
    Unsupported(Format),

    #[cfg(feature = "png")]
    Cairo(cairo::Error),

    #[cfg(feature = "png")]
    Io(cairo::IoError),
}

#[cfg(feature = "png")]
impl From<cairo::Error> for RenderError {
    fn from(err: cairo::Error) -> Self {
        RenderError::Cairo(err)
    }
}

#[cfg(feature = "png")]
impl From<cairo::IoError> for RenderError {
    fn from(err: cairo::IoError) -> Self {
        RenderError::Io(err)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RenderError::Unsupported(format) => {
                write!(f, "{} output is not supported", format)
            }
            #[cfg(feature = "png")]
            RenderError::Cairo(ref err) => err.fmt(f),
            #[cfg(feature = "png")]
            RenderError::Io(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RenderError { }
