//! Rendering scenes into PNG images via cairo.

use std::f64::consts::PI;
use super::RenderError;
use super::color::Color;
use super::scene::{Primitive, Scene};


/// Renders a scene into a PNG image.
pub fn to_png(scene: &Scene) -> Result<Vec<u8>, RenderError> {
    let surface = cairo::ImageSurface::create(
        cairo::Format::ARgb32,
        scene.size.width.ceil() as i32,
        scene.size.height.ceil() as i32,
    )?;
    {
        let context = cairo::Context::new(&surface)?;
        set_color(&context, scene.background);
        context.paint()?;
        for item in &scene.items {
            draw(&context, item)?;
        }
    }
    let mut data = Vec::new();
    surface.write_to_png(&mut data)?;
    Ok(data)
}

fn draw(context: &cairo::Context, item: &Primitive) -> Result<(), cairo::Error> {
    match *item {
        Primitive::Circle { center, radius, fill } => {
            context.new_path();
            context.arc(center.x, center.y, radius, 0., 2. * PI);
            set_color(context, fill);
            context.fill()
        }
        Primitive::Label { anchor, ref text, size, fill, backdrop } => {
            context.set_font_size(size);
            let extents = context.text_extents(text)?;
            context.new_path();
            context.rectangle(
                anchor.x + extents.x_bearing(),
                anchor.y + extents.y_bearing(),
                extents.width(),
                extents.height(),
            );
            set_color(context, backdrop);
            context.fill()?;
            context.move_to(anchor.x, anchor.y);
            set_color(context, fill);
            context.show_text(text)
        }
    }
}

fn set_color(context: &cairo::Context, color: Color) {
    context.set_source_rgba(
        color.red(), color.green(), color.blue(), color.alpha()
    )
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use kurbo::{Point, Size};
    use super::*;

    #[test]
    fn png_signature() {
        let scene = Scene {
            size: Size::new(16., 16.),
            background: Color::BACKGROUND,
            items: vec![Primitive::Circle {
                center: Point::new(8., 8.), radius: 2., fill: Color::STOP
            }],
        };
        let data = to_png(&scene).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }
}
