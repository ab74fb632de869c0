//! Stateless geometry over landmarks.
//!
//! Coordinates are image-normalized: x grows to the right, y grows downward.

use crate::pose::Landmark;

/// Points closer than this are treated as coincident.
const DEGENERATE_EPS: f32 = 1e-6;

/// Interior angle at `b` (degrees, 0..=180) between the rays `b->a` and `b->c`.
///
/// The atan2 difference can land anywhere in (-360, 360); taking its absolute
/// value and reflecting anything above 180 yields the interior angle, never
/// the reflex complement. Callers compare against one-sided thresholds.
pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut deg = (radians.to_degrees()).abs();
    if deg > 180.0 {
        deg = 360.0 - deg;
    }
    deg.clamp(0.0, 180.0)
}

/// Like [`angle`] but `None` when `b` coincides with `a` or `c`, where the
/// angle carries no information.
pub fn try_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> Option<f32> {
    if planar_distance(a, b) < DEGENERATE_EPS || planar_distance(c, b) < DEGENERATE_EPS {
        return None;
    }
    Some(angle(a, b, c))
}

/// `a.y - b.y`; positive means `a` sits below `b` in the image.
pub fn vertical_gap(a: &Landmark, b: &Landmark) -> f32 {
    a.y - b.y
}

/// Absolute horizontal separation.
pub fn horizontal_gap(a: &Landmark, b: &Landmark) -> f32 {
    (a.x - b.x).abs()
}

/// Euclidean distance in the image plane; depth is ignored.
pub fn planar_distance(a: &Landmark, b: &Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Depth separation, used for stance orientation checks.
pub fn depth_gap(a: &Landmark, b: &Landmark) -> f32 {
    (a.z - b.z).abs()
}

/// Midpoint of two landmarks; visibility is the weaker of the two.
pub fn midpoint(a: &Landmark, b: &Landmark) -> Landmark {
    Landmark::new(
        (a.x + b.x) / 2.0,
        (a.y + b.y) / 2.0,
        (a.z + b.z) / 2.0,
        a.visibility.min(b.visibility),
    )
}
