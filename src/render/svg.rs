//! Writing scenes as SVG.

use std::fmt;
use std::fmt::Write;
use super::color::Color;
use super::scene::{Primitive, Scene};


/// Renders a scene into an SVG document.
pub fn to_svg(scene: &Scene) -> String {
    let mut res = String::new();
    // Writing into a string doesn’t fail.
    let _ = write_svg(scene, &mut res);
    res
}

/// Writes a scene as an SVG document.
pub fn write_svg(scene: &Scene, target: &mut impl Write) -> fmt::Result {
    writeln!(
        target,
        "<svg version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\" \
         width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = scene.size.width, h = scene.size.height
    )?;

    // Labels sit on a solid box which needs a filter each.
    let backdrops: Vec<Color> = scene.items.iter().filter_map(|item| {
        match *item {
            Primitive::Label { backdrop, .. } => Some(backdrop),
            _ => None
        }
    }).collect();
    if !backdrops.is_empty() {
        target.write_str("<defs>\n")?;
        for (idx, color) in backdrops.iter().enumerate() {
            writeln!(
                target,
                "<filter x=\"0\" y=\"0\" width=\"1\" height=\"1\" \
                 id=\"backdrop{}\"><feFlood flood-color=\"{}\" result=\"bg\"/>\
                 <feMerge><feMergeNode in=\"bg\"/>\
                 <feMergeNode in=\"SourceGraphic\"/></feMerge></filter>",
                idx, color.to_hex()
            )?;
        }
        target.write_str("</defs>\n")?;
    }

    writeln!(
        target, "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        scene.background.to_hex()
    )?;

    let mut label_idx = 0;
    for item in &scene.items {
        match *item {
            Primitive::Circle { center, radius, fill } => {
                writeln!(
                    target,
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\"{}/>",
                    center.x, center.y, radius, Fill(fill)
                )?;
            }
            Primitive::Label { anchor, ref text, size, fill, .. } => {
                writeln!(
                    target,
                    "<text filter=\"url(#backdrop{})\" x=\"{:.2}\" \
                     y=\"{:.2}\" font-size=\"{}\" text-anchor=\"start\"{}>\
                     {}</text>",
                    label_idx, anchor.x, anchor.y, size, Fill(fill),
                    Escaped(text)
                )?;
                label_idx += 1;
            }
        }
    }
    target.write_str("</svg>\n")
}


//------------ Fill ----------------------------------------------------------

/// Displays the fill attributes for a color.
struct Fill(Color);

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, " fill=\"{}\"", self.0.to_hex())?;
        if self.0.alpha() < 1. {
            write!(f, " fill-opacity=\"{:.3}\"", self.0.alpha())?;
        }
        Ok(())
    }
}


//------------ Escaped -------------------------------------------------------

/// Displays text escaped for use in XML.
struct Escaped<'a>(&'a str);

impl<'a> fmt::Display for Escaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in self.0.chars() {
            match ch {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                _ => f.write_char(ch)?,
            }
        }
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use kurbo::{Point, Size};
    use super::*;

    #[test]
    fn document() {
        let scene = Scene {
            size: Size::new(100., 50.),
            background: Color::BACKGROUND,
            items: vec![
                Primitive::Circle {
                    center: Point::new(10., 20.5),
                    radius: 2.,
                    fill: Color::rgb(1., 0., 0.),
                },
                Primitive::Label {
                    anchor: Point::new(14., 22.),
                    text: "Harvard <Sq> & \"more\"".into(),
                    size: 6.,
                    fill: Color::LABEL,
                    backdrop: Color::BACKGROUND,
                },
            ],
        };
        let svg = to_svg(&scene);
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains("width=\"100\" height=\"50\""));
        assert!(svg.contains("<rect width=\"100%\" height=\"100%\" fill=\"#222233\"/>"));
        assert!(svg.contains(
            "<circle cx=\"10.00\" cy=\"20.50\" r=\"2\" fill=\"#ff0000\"/>"
        ));
        assert!(svg.contains("id=\"backdrop0\""));
        assert!(svg.contains("filter=\"url(#backdrop0)\""));
        assert!(svg.contains(
            "Harvard &lt;Sq&gt; &amp; &quot;more&quot;</text>"
        ));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn no_defs_without_labels() {
        let scene = Scene {
            size: Size::new(1., 1.),
            background: Color::BACKGROUND,
            items: vec![Primitive::Circle {
                center: Point::ZERO,
                radius: 1.,
                fill: Color::STOP.with_alpha(0.5),
            }],
        };
        let svg = to_svg(&scene);
        assert!(!svg.contains("<defs>"));
        assert!(svg.contains("fill-opacity=\"0.500\""));
    }
}
