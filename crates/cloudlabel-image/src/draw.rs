use crate::image::{Image, ImageSize};
use std::cmp::{max, min};

// coordinates beyond this are pulled in before clipping to the image, keeping the f64
// intersections exact to well under a pixel near the image
const FAR: i64 = 1 << 40;

/// Set a pixel's color, ignoring coordinates outside the image.
#[inline]
fn set_pixel_clipped<const C: usize>(img: &mut Image<u8, C>, x: i64, y: i64, color: [u8; C]) {
    if img.size().contains(x, y) {
        let start = (y as usize * img.cols() + x as usize) * C;
        img.as_slice_mut()[start..start + C].copy_from_slice(&color);
    }
}

/// Clips the segment `p0`-`p1` to the rectangle spanned by `lo` and `hi` (inclusive)
/// using Liang-Barsky. Returns `None` when the segment misses the rectangle.
fn clip_segment(
    p0: (i64, i64),
    p1: (i64, i64),
    lo: (i64, i64),
    hi: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    if lo.0 > hi.0 || lo.1 > hi.1 {
        return None;
    }
    let inside = |p: (i64, i64)| p.0 >= lo.0 && p.0 <= hi.0 && p.1 >= lo.1 && p.1 <= hi.1;
    if inside(p0) && inside(p1) {
        return Some((p0, p1));
    }

    let (x0, y0) = (p0.0 as f64, p0.1 as f64);
    let (dx, dy) = (p1.0 as f64 - x0, p1.1 as f64 - y0);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let edges = [
        (-dx, x0 - lo.0 as f64),
        (dx, hi.0 as f64 - x0),
        (-dy, y0 - lo.1 as f64),
        (dy, hi.1 as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    if t0 > t1 {
        return None;
    }

    let at = |t: f64| {
        (
            (x0 + t * dx).round().clamp(lo.0 as f64, hi.0 as f64) as i64,
            (y0 + t * dy).round().clamp(lo.1 as f64, hi.1 as f64) as i64,
        )
    };
    let start = if inside(p0) { p0 } else { at(t0) };
    let end = if inside(p1) { p1 } else { at(t1) };
    Some((start, end))
}

/// Draws a line on an image inplace using Bresenham's line algorithm.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `p0` - The start point of the line as a tuple of (x, y).
/// * `p1` - The end point of the line as a tuple of (x, y).
/// * `color` - The color of the line as an array of `C` elements.
/// * `thickness` - The thickness of the line. Thickness above one is approximated with squares.
///
/// The segment is clipped to the image first, so endpoints far outside the image are fine.
pub fn draw_line<const C: usize>(
    img: &mut Image<u8, C>,
    p0: (i64, i64),
    p1: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let size = img.size();
    let half = (thickness / 2).min(size.diagonal()) as i64;
    let lo = (-half, -half);
    let hi = (
        size.width as i64 - 1 + half,
        size.height as i64 - 1 + half,
    );
    let Some(((mut x0, mut y0), (x1, y1))) = clip_segment(p0, p1, (-FAR, -FAR), (FAR, FAR))
        .and_then(|(a, b)| clip_segment(a, b, lo, hi))
    else {
        return;
    };

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut err = dx - dy;

    loop {
        for i in -half..=half {
            for j in -half..=half {
                set_pixel_clipped(img, x0 + i, y0 + j, color);
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws a rectangle outline on an image inplace.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `top_left` - The top-left corner coordinates (x, y).
/// * `bottom_right` - The bottom-right corner coordinates (x, y).
/// * `color` - The color of the rectangle outline.
/// * `thickness` - The thickness of the lines.
pub fn draw_rect<const C: usize>(
    img: &mut Image<u8, C>,
    top_left: (i64, i64),
    bottom_right: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let (x0, y0) = top_left;
    let (x1, y1) = bottom_right;

    let (lx0, lx1) = (min(x0, x1), max(x0, x1));
    let (ly0, ly1) = (min(y0, y1), max(y0, y1));

    draw_line(img, (lx0, ly0), (lx1, ly0), color, thickness);
    draw_line(img, (lx0, ly1), (lx1, ly1), color, thickness);
    draw_line(img, (lx0, ly0), (lx0, ly1), color, thickness);
    draw_line(img, (lx1, ly0), (lx1, ly1), color, thickness);
}

/// Draws a closed polygon outline, connecting the last vertex back to the first.
///
/// Polylines with fewer than two vertices draw nothing.
pub fn draw_polyline<const C: usize>(
    img: &mut Image<u8, C>,
    vertices: &[(i64, i64)],
    color: [u8; C],
    thickness: usize,
) {
    if vertices.len() < 2 {
        return;
    }
    for (i, &start) in vertices.iter().enumerate() {
        let end = vertices[(i + 1) % vertices.len()];
        draw_line(img, start, end, color, thickness);
    }
}

/// Pixels of the disc centered at `center` that fall inside an image of `size`.
///
/// The radius is capped at the image diagonal and only the rows and columns overlapping
/// the image are visited, so the cost is bounded by the image area.
pub fn disc_pixels(
    size: ImageSize,
    center: (i64, i64),
    radius: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let (cx, cy) = center;
    let r = radius.min(size.diagonal()) as i64;
    let r2 = r * r;
    let (x0, x1) = (
        cx.saturating_sub(r).max(0),
        cx.saturating_add(r).min(size.width as i64 - 1),
    );
    let (y0, y1) = (
        cy.saturating_sub(r).max(0),
        cy.saturating_add(r).min(size.height as i64 - 1),
    );

    // non-empty ranges imply |x - cx| <= r and |y - cy| <= r
    (y0..=y1).flat_map(move |y| {
        (x0..=x1).filter_map(move |x| {
            let (dx, dy) = (x - cx, y - cy);
            (dx * dx + dy * dy <= r2).then_some((x as usize, y as usize))
        })
    })
}

/// Draws a filled disc centered at `center`, clipped to the image.
///
/// A radius of zero paints the center pixel only.
pub fn draw_filled_circle<const C: usize>(
    img: &mut Image<u8, C>,
    center: (i64, i64),
    radius: usize,
    color: [u8; C],
) {
    let cols = img.cols();
    for (x, y) in disc_pixels(img.size(), center, radius) {
        let start = (y * cols + x) * C;
        img.as_slice_mut()[start..start + C].copy_from_slice(&color);
    }
}
