//! Picture-frame renderer: draws one sub-thumbnail as a slightly rotated
//! "photo" with a drop shadow, and a white card behind opaque images.

use image::{imageops::FilterType, Rgba, RgbaImage};
use tiny_skia::{FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Transform};

use crate::raster::{from_pixmap, is_opaque, offset, to_pixmap};

/// Largest rotation, in degrees, either way.
pub const MAX_ROTATION: i32 = 8;
/// Alpha of the drop shadow at full coverage.
const SHADOW_ALPHA: u32 = 128;

/// Where a framed picture ended up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub angle: i32,
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

/// Draw `image` onto `canvas`, centered at `center`, scaled down to
/// `target.0` wide when it is wider, rotated by a random angle in
/// `-MAX_ROTATION..=MAX_ROTATION`. `None` when there is nothing to draw.
pub fn draw_picture_frame(
    canvas: &mut RgbaImage,
    center: (i64, i64),
    image: &RgbaImage,
    frame_width: u32,
    target: (u32, u32),
    rng: &mut fastrand::Rng,
) -> Option<FrameGeometry> {
    let angle = rng.i32(-MAX_ROTATION..=MAX_ROTATION);

    let card = build_card(image, frame_width, scaling(image.width(), target.0))?;
    let rotated = rotate(&card, angle as f32)?;

    let radius = frame_width.max(1);
    let shadow = to_pixmap(&build_shadow(&rotated, radius))?;

    let (bw, bh) = (rotated.width(), rotated.height());
    let left = center.0 - (bw as i64 - 1) / 2;
    let top = center.1 - (bh as i64 - 1) / 2;
    let half = (radius / 2) as i64;

    let mut surface = to_pixmap(canvas)?;
    let paint = PixmapPaint::default();
    surface.draw_pixmap(
        offset(left - half),
        offset(top - half),
        shadow.as_ref(),
        &paint,
        Transform::identity(),
        None,
    );
    surface.draw_pixmap(offset(left), offset(top), rotated.as_ref(), &paint, Transform::identity(), None);
    *canvas = from_pixmap(&surface);

    Some(FrameGeometry {
        angle,
        left,
        top,
        width: bw,
        height: bh,
    })
}

/// Shrink factor so a `source_w` wide image fits `target_w`. Never above 1.
pub fn scaling(source_w: u32, target_w: u32) -> f32 {
    if source_w > target_w && target_w != 0 {
        target_w as f32 / source_w as f32
    } else {
        1.0
    }
}

/// The unrotated picture: scaled image inset by `frame_width`, on a white
/// rounded card when the source is opaque.
fn build_card(image: &RgbaImage, frame_width: u32, scale: f32) -> Option<Pixmap> {
    let scaled = if scale < 1.0 {
        let w = ((image.width() as f32 * scale).round() as u32).max(1);
        let h = ((image.height() as f32 * scale).round() as u32).max(1);
        image::imageops::resize(image, w, h, FilterType::Triangle)
    } else {
        image.clone()
    };
    let picture = to_pixmap(&scaled)?;

    let mut card = Pixmap::new(picture.width() + frame_width * 2, picture.height() + frame_width * 2)?;
    if is_opaque(image) {
        let outline = rounded_rect(card.width() as f32, card.height() as f32, frame_width as f32 / 2.0)?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 255);
        paint.anti_alias = true;
        card.fill_path(&outline, &paint, FillRule::Winding, Transform::identity(), None);
    }
    let inset = frame_width as i32;
    card.draw_pixmap(inset, inset, picture.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    Some(card)
}

fn rounded_rect(w: f32, h: f32, radius: f32) -> Option<Path> {
    let r = radius.min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(Rect::from_xywh(0.0, 0.0, w, h)?));
    }
    let mut pb = PathBuilder::new();
    pb.move_to(r, 0.0);
    pb.line_to(w - r, 0.0);
    pb.quad_to(w, 0.0, w, r);
    pb.line_to(w, h - r);
    pb.quad_to(w, h, w - r, h);
    pb.line_to(r, h);
    pb.quad_to(0.0, h, 0.0, h - r);
    pb.line_to(0.0, r);
    pb.quad_to(0.0, 0.0, r, 0.0);
    pb.close();
    pb.finish()
}

/// Rotate clockwise by `degrees` about the center, into the rotated
/// bounding box, with bilinear filtering.
fn rotate(card: &Pixmap, degrees: f32) -> Option<Pixmap> {
    if degrees == 0.0 {
        return Some(card.clone());
    }
    let (w, h) = (card.width() as f32, card.height() as f32);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let bw = (w * cos.abs() + h * sin.abs()).ceil().max(1.0);
    let bh = (w * sin.abs() + h * cos.abs()).ceil().max(1.0);

    let mut out = Pixmap::new(bw as u32, bh as u32)?;
    let transform =
        Transform::from_rotate_at(degrees, bw / 2.0, bh / 2.0).pre_translate((bw - w) / 2.0, (bh - h) / 2.0);
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(0, 0, card.as_ref(), &paint, transform, None);
    Some(out)
}

/// Black, half-transparent silhouette of `picture`, padded by `radius` on
/// each side and blurred.
fn build_shadow(picture: &Pixmap, radius: u32) -> RgbaImage {
    let width = picture.width();
    let mut silhouette = RgbaImage::new(width + radius * 2, picture.height() + radius * 2);
    for (i, p) in picture.pixels().iter().enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        let alpha = p.alpha() as u32 * SHADOW_ALPHA / 255;
        silhouette.put_pixel(x + radius, y + radius, Rgba([0, 0, 0, alpha as u8]));
    }
    image::imageops::fast_blur(&silhouette, radius as f32)
}
