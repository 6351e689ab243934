//! Small raster helpers shared by the renderer, the tiler and the protocol
//! post-processing: aspect-preserving scaling, source-over compositing, the
//! two-tone page border and PNG encoding.

use image::{ImageFormat, Rgba, RgbaImage};
use tiny_skia::{ColorU8, IntSize, Pixmap, PixmapPaint, Transform};

/// Scale `(w, h)` to fit `(box_w, box_h)` keeping the aspect ratio.
/// Scales up as well as down.
pub fn fit_size(w: u32, h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let (w, h, bw, bh) = (w as u64, h as u64, box_w as u64, box_h as u64);
    let rw = bh * w / h;
    if rw <= bw {
        (rw as u32, box_h)
    } else {
        (box_w, (bw * h / w) as u32)
    }
}

/// Shrink `img` to fit `max_w` x `max_h`, never enlarging it.
/// A zero-sized box leaves nothing to draw and yields `None`.
pub fn scale_down(img: RgbaImage, max_w: u32, max_h: u32) -> Option<RgbaImage> {
    if img.width() == 0 || img.height() == 0 {
        return None;
    }
    if img.width() <= max_w && img.height() <= max_h {
        return Some(img);
    }
    if max_w == 0 || max_h == 0 {
        return None;
    }
    let (w, h) = fit_size(img.width(), img.height(), max_w, max_h);
    Some(image::imageops::thumbnail(&img, w.max(1), h.max(1)))
}

/// True when all four corner pixels are fully opaque.
pub fn is_opaque(img: &RgbaImage) -> bool {
    if img.width() == 0 || img.height() == 0 {
        return false;
    }
    let (x2, y2) = (img.width() - 1, img.height() - 1);
    [(0, 0), (x2, 0), (0, y2), (x2, y2)]
        .iter()
        .all(|&(x, y)| img.get_pixel(x, y)[3] == 255)
}

/// Premultiplied tiny-skia copy of `img`. `None` for an empty image.
pub fn to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(img.width(), img.height())?;
    let mut data = Vec::with_capacity(img.as_raw().len());
    for p in img.pixels() {
        let c = ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Pixmap::from_vec(data, size)
}

pub fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (px, c) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = c.demultiply();
        *px = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    img
}

/// Pixel offset as tiny-skia takes it; far off-canvas offsets stay off-canvas.
pub fn offset(v: i64) -> i32 {
    v.clamp(i32::MIN as i64 / 2, i32::MAX as i64 / 2) as i32
}

/// Composite `src` onto `dst` at `(x, y)` (may be negative), source-over,
/// with `opacity` in `0.0..=1.0`.
pub fn draw_image(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity == 0.0 {
        return;
    }
    let (Some(mut canvas), Some(layer)) = (to_pixmap(dst), to_pixmap(src)) else {
        return;
    };
    let paint = PixmapPaint {
        opacity,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(offset(x), offset(y), layer.as_ref(), &paint, Transform::identity(), None);
    *dst = from_pixmap(&canvas);
}

/// Draw the 1px "page" border: dark right and bottom edges, light top and
/// left edges (light wins at the shared corners).
pub fn draw_frame_border(img: &mut RgbaImage) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    const DARK: Rgba<u8> = Rgba([48, 48, 48, 255]);
    const LIGHT: Rgba<u8> = Rgba([215, 215, 215, 255]);
    let (x2, y2) = (img.width() - 1, img.height() - 1);
    for y in 0..=y2 {
        img.put_pixel(x2, y, DARK);
    }
    for x in 0..=x2 {
        img.put_pixel(x, y2, DARK);
    }
    for x in 0..=x2 {
        img.put_pixel(x, 0, LIGHT);
    }
    for y in 0..=y2 {
        img.put_pixel(0, y, LIGHT);
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    img.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(buf)
}
