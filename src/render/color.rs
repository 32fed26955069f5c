//! Colors.

use std::fmt;
use std::num::ParseIntError;


/// A color.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    red: f64,
    green: f64,
    blue: f64,
    alpha: f64
}

impl Color {
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Color { red, green, blue, alpha: 1. }
    }

    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Color { red, green, blue, alpha }
    }

    /// Parses a color from hex digits.
    ///
    /// Accepts six or eight digits with or without a leading `#`.
    pub fn hex(mut hex: &str) -> Result<Self, InvalidHexColor> {
        if let Some(stripped) = hex.strip_prefix('#') {
            hex = stripped
        }
        if !hex.is_ascii() {
            return Err(InvalidHexColor)
        }
        let (r, g, b, a) = if hex.len() == 6 {
            (
                u8::from_str_radix(&hex[0..2], 16)?,
                u8::from_str_radix(&hex[2..4], 16)?,
                u8::from_str_radix(&hex[4..6], 16)?,
                0xFF,
            )
        }
        else if hex.len() == 8 {
            (
                u8::from_str_radix(&hex[0..2], 16)?,
                u8::from_str_radix(&hex[2..4], 16)?,
                u8::from_str_radix(&hex[4..6], 16)?,
                u8::from_str_radix(&hex[6..8], 16)?,
            )
        }
        else {
            return Err(InvalidHexColor)
        };
        Ok(Color::rgba(
            r as f64 / 255.,
            g as f64 / 255.,
            b as f64 / 255.,
            a as f64 / 255.,
        ))
    }

    pub fn red(self) -> f64 {
        self.red
    }

    pub fn green(self) -> f64 {
        self.green
    }

    pub fn blue(self) -> f64 {
        self.blue
    }

    pub fn alpha(self) -> f64 {
        self.alpha
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Color { red: self.red, green: self.green, blue: self.blue, alpha }
    }

    /// Returns a wrapper that displays the color as `#rrggbb`.
    pub fn to_hex(self) -> Hex {
        Hex(self)
    }
}

impl Color {
    /// The map background.
    pub const BACKGROUND: Color = Color::rgb(34. / 255., 34. / 255., 51. / 255.);

    /// Stops.
    pub const STOP: Color = Color::rgb(68. / 255., 68. / 255., 85. / 255.);

    /// Stop labels.
    pub const LABEL: Color = Color::rgb(102. / 255., 102. / 255., 119. / 255.);

    /// Vehicles on a route we don’t know or can’t color.
    pub const UNKNOWN_ROUTE: Color = Color::rgb(170. / 255., 170. / 255., 170. / 255.);
}


//------------ Hex -----------------------------------------------------------

pub struct Hex(Color);

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn component(x: f64) -> u8 {
            (x.clamp(0., 1.) * 255.).round() as u8
        }

        write!(
            f, "#{:02x}{:02x}{:02x}",
            component(self.0.red),
            component(self.0.green),
            component(self.0.blue),
        )
    }
}


//------------ InvalidHexColor -----------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct InvalidHexColor;

impl From<ParseIntError> for InvalidHexColor {
    fn from(_: ParseIntError) -> Self {
        InvalidHexColor
    }
}

impl fmt::Display for InvalidHexColor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid color")
    }
}


//============ Tests =========================================================
