//! Fixed-point board geometry primitives.
//!
//! All coordinates are stored as signed 64-bit nanometers, which keeps
//! copper positions exact across serialization and lets intersection math
//! promote to `f64` only where a distance is actually computed.

use serde::{Deserialize, Serialize};

/// Board coordinate in nanometers.
pub type Coord = i64;

/// One millimeter in board units.
pub const MM: Coord = 1_000_000;

/// One mil (1/1000 inch) in board units.
pub const MIL: Coord = 25_400;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub fn new(x: Coord, y: Coord) -> Self {
        Point { x, y }
    }

    /// Chebyshev (per-axis) equality with tolerance. Tolerance zero
    /// degrades to exact equality.
    pub fn matches(&self, other: &Point, tolerance: Coord) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    dx.hypot(dy)
}

/// Squared distance from a point to the segment `a`..`b`.
pub fn dist2_point_segment(p: Point, a: Point, b: Point) -> f64 {
    let px = p.x as f64;
    let py = p.y as f64;
    let ax = a.x as f64;
    let ay = a.y as f64;
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        let ex = px - ax;
        let ey = py - ay;
        return ex * ex + ey * ey;
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    let ex = px - (ax + t * dx);
    let ey = py - (ay + t * dy);
    ex * ex + ey * ey
}

/// True if segments `a1..a2` and `b1..b2` cross or touch.
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f64 {
        let abx = (b.x - a.x) as f64;
        let aby = (b.y - a.y) as f64;
        let acx = (c.x - a.x) as f64;
        let acy = (c.y - a.y) as f64;
        abx * acy - aby * acx
    }
    fn on_segment(a: Point, b: Point, p: Point) -> bool {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    }
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

/// Minimum distance between two segments.
pub fn segment_segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    let d = dist2_point_segment(a1, b1, b2)
        .min(dist2_point_segment(a2, b1, b2))
        .min(dist2_point_segment(b1, a1, a2))
        .min(dist2_point_segment(b2, a1, a2));
    d.sqrt()
}

/// Axis-aligned bounding box. `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: Coord,
    pub y1: Coord,
    pub x2: Coord,
    pub y2: Coord,
}

impl BBox {
    pub fn new(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        BBox {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn around(p: Point, radius: Coord) -> Self {
        BBox {
            x1: p.x - radius,
            y1: p.y - radius,
            x2: p.x + radius,
            y2: p.y + radius,
        }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut bb = match points.first() {
            Some(p) => BBox::around(*p, 0),
            None => BBox::default(),
        };
        for p in points {
            bb.x1 = bb.x1.min(p.x);
            bb.y1 = bb.y1.min(p.y);
            bb.x2 = bb.x2.max(p.x);
            bb.y2 = bb.y2.max(p.y);
        }
        bb
    }

    pub fn join(self, other: BBox) -> BBox {
        BBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn grow(self, amount: Coord) -> BBox {
        BBox {
            x1: self.x1 - amount,
            y1: self.y1 - amount,
            x2: self.x2 + amount,
            y2: self.y2 + amount,
        }
    }

    /// Bounds expanded by a signed bloat, growing only when positive.
    /// Negative bloat shrinks copper, which can never enlarge the area a
    /// range query has to cover.
    pub fn expand_by_bloat(self, bloat: Coord) -> BBox {
        if bloat > 0 {
            self.grow(bloat)
        } else {
            self
        }
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        !(other.x2 < self.x1 || other.x1 > self.x2 || other.y2 < self.y1 || other.y1 > self.y2)
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

/// Reduce an arc's start angle to [0, 360) and delta to [0, 360],
/// flipping negative sweeps.
pub fn normalize_angles(start: f64, delta: f64) -> (f64, f64) {
    let (mut sa, mut d) = (start, delta);
    if d < 0.0 {
        sa += d;
        d = -d;
    }
    if d > 360.0 {
        d = 360.0;
    }
    sa = sa.rem_euclid(360.0);
    (sa, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_bloat_only_grows_when_positive() {
        let bb = BBox::new(0, 0, 10, 10);
        assert_eq!(bb.expand_by_bloat(5), BBox::new(-5, -5, 15, 15));
        assert_eq!(bb.expand_by_bloat(-5), bb);
        assert_eq!(bb.expand_by_bloat(0), bb);
    }

    #[test]
    fn point_matching_tolerance() {
        let a = Point::new(100, 100);
        let b = Point::new(101, 99);
        assert!(!a.matches(&b, 0));
        assert!(a.matches(&b, 1));
        assert!(a.matches(&a, 0));
    }

    #[test]
    fn segment_distance_parallel() {
        let d = segment_segment_distance(
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(0, 40),
            Point::new(100, 40),
        );
        assert!((d - 40.0).abs() < 1e-9);
    }

    #[test]
    fn segments_crossing_touch() {
        assert!(segments_intersect(
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(10, 0),
        ));
        assert!(!segments_intersect(
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(0, 5),
            Point::new(10, 5),
        ));
    }

    #[test]
    fn angle_normalization() {
        let (sa, d) = normalize_angles(30.0, -90.0);
        assert!((sa - 300.0).abs() < 1e-9);
        assert!((d - 90.0).abs() < 1e-9);
        let (_, d) = normalize_angles(0.0, 720.0);
        assert!((d - 360.0).abs() < 1e-9);
    }
}
