//! Pairwise touch predicates between copper objects.
//!
//! Every predicate takes a signed `bloat`, applied once per pair:
//! positive values make objects with a gap of up to `bloat` still
//! "touch", negative values shrink the copper so marginal overlaps
//! drop out. Polygon predicates work on the outer contour with even-odd
//! containment and edge distances; no boolean polygon algebra is done.

use crate::board::{Arc, Flags, Line, Pad, Polygon, Pv};
use crate::geometry::{
    dist2_point_segment, distance, normalize_angles, segment_segment_distance, BBox, Coord, Point,
};

/// A thick segment: the common shape of lines and pads. `square` picks
/// rectangular end caps over round ones.
#[derive(Clone, Copy, Debug)]
pub struct Seg {
    pub p1: Point,
    pub p2: Point,
    pub thickness: Coord,
    pub square: bool,
}

impl From<&Line> for Seg {
    fn from(l: &Line) -> Seg {
        Seg {
            p1: l.p1,
            p2: l.p2,
            thickness: l.thickness,
            square: l.flags.contains(Flags::SQUARE),
        }
    }
}

impl From<&Pad> for Seg {
    fn from(p: &Pad) -> Seg {
        Seg {
            p1: p.p1,
            p2: p.p2,
            thickness: p.thickness,
            square: p.flags.contains(Flags::SQUARE),
        }
    }
}

fn clampf(v: f64) -> f64 {
    v.max(0.0)
}

/// Distance from a point to a thick segment's outline, measured against
/// `radius`: true when the point (grown to a disc of `radius`) touches
/// the segment shape.
pub fn point_in_seg(p: Point, radius: f64, seg: &Seg) -> bool {
    if radius < 0.0 {
        return false;
    }
    let t2 = seg.thickness as f64 / 2.0;
    if seg.square {
        // Rectangle running t2 past both endpoints, t2 to each side.
        let ax = seg.p1.x as f64;
        let ay = seg.p1.y as f64;
        let dx = (seg.p2.x - seg.p1.x) as f64;
        let dy = (seg.p2.y - seg.p1.y) as f64;
        let len = dx.hypot(dy);
        let (ux, uy) = if len == 0.0 { (1.0, 0.0) } else { (dx / len, dy / len) };
        let px = p.x as f64 - ax;
        let py = p.y as f64 - ay;
        let u = px * ux + py * uy;
        let v = px * -uy + py * ux;
        let du = (-t2 - u).max(u - (len + t2)).max(0.0);
        let dv = (v.abs() - t2).max(0.0);
        du.hypot(dv) <= radius
    } else {
        dist2_point_segment(p, seg.p1, seg.p2).sqrt() <= t2 + radius
    }
}

/// Point against a pin/via body.
pub fn point_on_pv(p: Point, radius: f64, pv: &Pv) -> bool {
    let t = pv.copper_size() as f64 / 2.0;
    if pv.flags.contains(Flags::SQUARE) {
        let dx = ((p.x - pv.pos.x).abs() as f64 - t).max(0.0);
        let dy = ((p.y - pv.pos.y).abs() as f64 - t).max(0.0);
        dx.hypot(dy) <= radius
    } else {
        distance(p, pv.pos) <= radius + t
    }
}

fn arc_angles(arc: &Arc) -> (f64, f64) {
    normalize_angles(arc.start_angle, arc.delta_angle)
}

/// Arc endpoint positions. Zero angle points toward negative x, positive
/// angles sweep toward positive y.
pub fn arc_endpoints(arc: &Arc) -> (Point, Point) {
    let at = |ang: f64| {
        let rad = ang.to_radians();
        Point::new(
            arc.center.x - (arc.radius as f64 * rad.cos()).round() as Coord,
            arc.center.y + (arc.radius as f64 * rad.sin()).round() as Coord,
        )
    };
    (at(arc.start_angle), at(arc.start_angle + arc.delta_angle))
}

/// Does the ray from the arc's center through (x, y) cross the arc's
/// angular span?
fn radius_crosses_arc(x: f64, y: f64, arc: &Arc) -> bool {
    let mut alpha = (y - arc.center.y as f64)
        .atan2(arc.center.x as f64 - x)
        .to_degrees();
    let (sa, d) = arc_angles(arc);
    if alpha < 0.0 {
        alpha += 360.0;
    }
    if sa <= alpha {
        sa + d >= alpha
    } else {
        sa + d - 360.0 >= alpha
    }
}

/// Distance from a point to the arc's centerline, measured against
/// `radius + thickness / 2`.
pub fn point_on_arc(p: Point, radius: f64, arc: &Arc) -> bool {
    let px = p.x as f64;
    let py = p.y as f64;
    let d = if radius_crosses_arc(px, py, arc) {
        (distance(p, arc.center) - arc.radius as f64).abs()
    } else {
        let (e1, e2) = arc_endpoints(arc);
        distance(p, e1).min(distance(p, e2))
    };
    d <= radius + arc.thickness as f64 / 2.0
}

/// Corner points of a square-capped line, perimeter order.
fn slanted_rectangle(seg: &Seg) -> [Point; 4] {
    let (mut dwx, mut dwy) = (0.0, 0.0);
    if seg.p1.y == seg.p2.y {
        dwx = seg.thickness as f64 / 2.0;
    } else if seg.p1.x == seg.p2.x {
        dwy = seg.thickness as f64 / 2.0;
    } else {
        let dx = (seg.p2.x - seg.p1.x) as f64;
        let dy = (seg.p2.y - seg.p1.y) as f64;
        let r = distance(seg.p1, seg.p2);
        dwx = seg.thickness as f64 / 2.0 / r * dx;
        dwy = seg.thickness as f64 / 2.0 / r * dy;
    }
    let p = |x: f64, y: f64| Point::new(x.round() as Coord, y.round() as Coord);
    [
        p(seg.p1.x as f64 - dwx + dwy, seg.p1.y as f64 - dwy - dwx),
        p(seg.p1.x as f64 - dwx - dwy, seg.p1.y as f64 - dwy + dwx),
        p(seg.p2.x as f64 + dwx - dwy, seg.p2.y as f64 + dwy + dwx),
        p(seg.p2.x as f64 + dwx + dwy, seg.p2.y as f64 + dwy - dwx),
    ]
}

fn point_in_quadrangle(q: &[Point; 4], p: Point) -> bool {
    let mut sign = 0i32;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        let cross = (b.x - a.x) as f64 * (p.y - a.y) as f64
            - (b.y - a.y) as f64 * (p.x - a.x) as f64;
        if cross > 0.0 {
            if sign < 0 {
                return false;
            }
            sign = 1;
        } else if cross < 0.0 {
            if sign > 0 {
                return false;
            }
            sign = -1;
        }
    }
    true
}

fn quadrangle_line(q: &[Point; 4], seg: &Seg, bloat: Coord) -> bool {
    if point_in_quadrangle(q, seg.p1) || point_in_quadrangle(q, seg.p2) {
        return true;
    }
    for i in 0..4 {
        let edge = Seg {
            p1: q[i],
            p2: q[(i + 1) % 4],
            thickness: 0,
            square: false,
        };
        if seg_seg_round(&edge, seg, bloat) {
            return true;
        }
    }
    false
}

/// Round/round segment intersection: endpoint capsule checks followed by
/// the parametric crossing test.
fn seg_seg_round(s1: &Seg, s2: &Seg, bloat: Coord) -> bool {
    let r1 = clampf(s1.thickness as f64 / 2.0 + bloat as f64);
    let r2 = clampf(s2.thickness as f64 / 2.0 + bloat as f64);
    let round1 = Seg { square: false, ..*s1 };
    let round2 = Seg { square: false, ..*s2 };
    // Endpoint checks catch touching thick segments and any zero-length
    // input before the parametric math divides by the cross product.
    if point_in_seg(s2.p1, r2, &round1)
        || point_in_seg(s2.p2, r2, &round1)
        || point_in_seg(s1.p1, r1, &round2)
        || point_in_seg(s1.p2, r1, &round2)
    {
        return true;
    }
    let l1dx = (s1.p2.x - s1.p1.x) as f64;
    let l1dy = (s1.p2.y - s1.p1.y) as f64;
    let l2dx = (s2.p2.x - s2.p1.x) as f64;
    let l2dy = (s2.p2.y - s2.p1.y) as f64;
    if (l1dx == 0.0 && l1dy == 0.0) || (l2dx == 0.0 && l2dy == 0.0) {
        return false;
    }
    let p1dx = (s1.p1.x - s2.p1.x) as f64;
    let p1dy = (s1.p1.y - s2.p1.y) as f64;
    let mut s = p1dy * l1dx - p1dx * l1dy;
    let denom = l1dx * l2dy - l1dy * l2dx;
    // Parallel centerlines; the endpoint capsules above already covered
    // any touch.
    if denom == 0.0 {
        return false;
    }
    s /= denom;
    let r = (p1dy * l2dx - p1dx * l2dy) / denom;
    (0.0..=1.0).contains(&r) && (0.0..=1.0).contains(&s)
}

/// Thick segment vs thick segment, honoring square caps on either side.
pub fn seg_seg(s1: &Seg, s2: &Seg, bloat: Coord) -> bool {
    if s1.square {
        let q = slanted_rectangle(s1);
        return quadrangle_line(&q, s2, bloat);
    }
    if s2.square {
        let q = slanted_rectangle(s2);
        return quadrangle_line(&q, s1, bloat);
    }
    seg_seg_round(s1, s2, bloat)
}

pub fn line_line(l1: &Line, l2: &Line, bloat: Coord) -> bool {
    seg_seg(&l1.into(), &l2.into(), bloat)
}

pub fn line_pad(l: &Line, p: &Pad, bloat: Coord) -> bool {
    seg_seg(&l.into(), &p.into(), bloat)
}

pub fn pad_pad(p1: &Pad, p2: &Pad, bloat: Coord) -> bool {
    seg_seg(&p1.into(), &p2.into(), bloat)
}

/// Thick segment vs arc: circle/line projection, with the segment ends
/// and arc ends checked individually.
pub fn seg_arc(seg: &Seg, arc: &Arc, bloat: Coord) -> bool {
    let dx = (seg.p2.x - seg.p1.x) as f64;
    let dy = (seg.p2.y - seg.p1.y) as f64;
    let dx1 = (seg.p1.x - arc.center.x) as f64;
    let dy1 = (seg.p1.y - arc.center.y) as f64;
    let l = dx * dx + dy * dy;
    let d = {
        let c = dx * dy1 - dy * dx1;
        c * c
    };
    let mut radius =
        arc.radius as f64 + clampf(0.5 * (arc.thickness + seg.thickness) as f64 + bloat as f64);
    radius *= radius;
    let mut r2 = radius * l - d;
    if r2 < 0.0 {
        return false;
    }
    let seg_r = clampf(0.5 * seg.thickness as f64 + bloat as f64);
    if point_on_arc(seg.p1, seg_r, arc) || point_on_arc(seg.p2, seg_r, arc) {
        return true;
    }
    if l == 0.0 {
        return false;
    }
    r2 = r2.sqrt();
    let base = -(dx * dx1 + dy * dy1);
    for proj in [(base + r2) / l, (base - r2) / l] {
        if (0.0..=1.0).contains(&proj) {
            let px = seg.p1.x as f64 + proj * dx;
            let py = seg.p1.y as f64 + proj * dy;
            let p = Point::new(px.round() as Coord, py.round() as Coord);
            if point_on_arc(p, seg_r, arc) {
                return true;
            }
        }
    }
    let (e1, e2) = arc_endpoints(arc);
    let round = Seg { square: false, ..*seg };
    let arc_r = arc.thickness as f64 * 0.5 + bloat as f64;
    point_in_seg(e1, arc_r, &round) || point_in_seg(e2, arc_r, &round)
}

pub fn line_arc(l: &Line, arc: &Arc, bloat: Coord) -> bool {
    seg_arc(&l.into(), arc, bloat)
}

pub fn pad_arc(p: &Pad, arc: &Arc, bloat: Coord) -> bool {
    seg_arc(&p.into(), arc, bloat)
}

/// Arc vs arc: endpoints first, then the concentric, far/near and
/// chord-intersection cases.
pub fn arc_arc(a1: &Arc, a2: &Arc, bloat: Coord) -> bool {
    let t = 0.5 * a1.thickness as f64 + bloat as f64;
    let t2 = 0.5 * a2.thickness as f64;
    let t1 = t2 + bloat as f64;
    if t < 0.0 || t1 < 0.0 {
        return false;
    }

    let (a1s, a1e) = arc_endpoints(a1);
    let (a2s, a2e) = arc_endpoints(a2);
    if point_on_arc(a1s, t, a2)
        || point_on_arc(a1e, t, a2)
        || point_on_arc(a2s, t1, a1)
        || point_on_arc(a2e, t1, a1)
    {
        return true;
    }

    let pdx = (a2.center.x - a1.center.x) as f64;
    let pdy = (a2.center.y - a1.center.y) as f64;
    let dl = distance(a1.center, a2.center);
    // Concentric circles: endpoints were ruled out above, so one arc must
    // overlap the other's angular span at a matching radius.
    if dl < 0.5 {
        let r1 = a1.radius as f64;
        let r2 = a2.radius as f64;
        if (r1 - t >= r2 - t2 && r1 - t <= r2 + t2) || (r1 + t >= r2 - t2 && r1 + t <= r2 + t2) {
            let (sa1, d1) = arc_angles(a1);
            let (sa2, d2) = arc_angles(a2);
            if sa1 > sa2 && (sa1 < sa2 + d2 || sa1 + d1 - 360.0 > sa2) {
                return true;
            }
            if sa2 > sa1 && (sa2 < sa1 + d1 || sa2 + d2 - 360.0 > sa1) {
                return true;
            }
        }
        return false;
    }

    let r1 = a1.radius as f64;
    let r2 = a2.radius as f64;
    let test = |x: f64, y: f64, on: &Arc, other: &Arc, r: f64| {
        let p = Point::new(x.round() as Coord, y.round() as Coord);
        radius_crosses_arc(x, y, on) && point_on_arc(p, r, other)
    };
    // Centerline circles too far apart (or nested): probe the nearest
    // point of each circle to the other center.
    if dl > r1 + r2 || dl + r1 < r2 || dl + r2 < r1 {
        let mut dx = pdx * r1 / dl;
        let mut dy = pdy * r1 / dl;
        if dl + r1 < r2 {
            dx = -dx;
            dy = -dy;
        }
        if test(a1.center.x as f64 + dx, a1.center.y as f64 + dy, a1, a2, t) {
            return true;
        }
        let mut dx = -pdx * r2 / dl;
        let mut dy = -pdy * r2 / dl;
        if dl + r2 < r1 {
            dx = -dx;
            dy = -dy;
        }
        return test(a2.center.x as f64 + dx, a2.center.y as f64 + dy, a2, a1, t1);
    }

    let l = dl * dl;
    let r1sq = r1 * r1;
    let r2sq = r2 * r2;
    let a = 0.5 * (r1sq - r2sq + l) / l;
    let mut d = r1sq / l - a * a;
    d = if d < 0.0 { 0.0 } else { d.sqrt() };
    let x = a1.center.x as f64 + a * pdx;
    let y = a1.center.y as f64 + a * pdy;
    let dx = d * pdx;
    let dy = d * pdy;
    test(x + dy, y - dx, a1, a2, t)
        || test(x + dy, y - dx, a2, a1, t1)
        || test(x - dy, y + dx, a1, a2, t)
        || test(x - dy, y + dx, a2, a1, t1)
}

/// Pin/via vs pin/via.
pub fn pv_pv(pv1: &Pv, pv2: &Pv, bloat: Coord) -> bool {
    let t1 = clampf(pv1.thickness as f64 / 2.0 + bloat as f64);
    let t2 = clampf(pv2.thickness as f64 / 2.0 + bloat as f64);
    if point_on_pv(pv1.pos, t1, pv2) || point_on_pv(pv2.pos, t2, pv1) {
        return true;
    }
    if !pv1.flags.contains(Flags::SQUARE) || !pv2.flags.contains(Flags::SQUARE) {
        return false;
    }
    // Square/square: corner overlaps escape both center probes.
    let b1 = BBox::around(pv1.pos, t1 as Coord);
    let b2 = BBox::around(pv2.pos, pv2.thickness / 2);
    b1.overlaps(&b2)
}

/// Pin/via vs thick segment (line path).
pub fn pv_seg(pv: &Pv, seg: &Seg, bloat: Coord) -> bool {
    if pv.flags.contains(Flags::SQUARE) {
        let half = (pv.copper_size() + 1) / 2;
        let bb = BBox::around(pv.pos, half);
        return seg_in_rect(bb, seg, bloat);
    }
    point_in_seg(
        pv.pos,
        clampf(pv.copper_size() as f64 / 2.0 + bloat as f64),
        &Seg { square: false, ..*seg },
    )
}

pub fn pv_line(pv: &Pv, line: &Line, bloat: Coord) -> bool {
    pv_seg(pv, &line.into(), bloat)
}

/// Pin/via vs pad. The pin's full thickness is used even for holes.
pub fn pv_pad(pv: &Pv, pad: &Pad, bloat: Coord) -> bool {
    point_in_seg(
        pv.pos,
        clampf(pv.thickness as f64 / 2.0 + bloat as f64),
        &pad.into(),
    )
}

pub fn pv_arc(pv: &Pv, arc: &Arc, bloat: Coord) -> bool {
    if pv.flags.contains(Flags::SQUARE) {
        let half = ((pv.thickness + 1) / 2 + bloat).max(0);
        return arc_in_rect(BBox::around(pv.pos, half), arc, bloat);
    }
    point_on_arc(pv.pos, clampf(pv.thickness as f64 / 2.0 + bloat as f64), arc)
}

/// Thick segment vs an axis-aligned rectangle.
fn seg_in_rect(bb: BBox, seg: &Seg, bloat: Coord) -> bool {
    if bb.contains_point(seg.p1) || bb.contains_point(seg.p2) {
        return true;
    }
    for (p1, p2) in rect_edges(bb) {
        let edge = Seg {
            p1,
            p2,
            thickness: 0,
            square: false,
        };
        if seg_seg(&edge, seg, bloat) {
            return true;
        }
    }
    false
}

fn arc_in_rect(bb: BBox, arc: &Arc, bloat: Coord) -> bool {
    let (e1, e2) = arc_endpoints(arc);
    if bb.contains_point(e1) || bb.contains_point(e2) {
        return true;
    }
    for (p1, p2) in rect_edges(bb) {
        let edge = Seg {
            p1,
            p2,
            thickness: 0,
            square: false,
        };
        if seg_arc(&edge, arc, bloat) {
            return true;
        }
    }
    false
}

fn rect_edges(bb: BBox) -> [(Point, Point); 4] {
    let ul = Point::new(bb.x1, bb.y1);
    let ur = Point::new(bb.x2, bb.y1);
    let lr = Point::new(bb.x2, bb.y2);
    let ll = Point::new(bb.x1, bb.y2);
    [(ul, ur), (ur, lr), (lr, ll), (ll, ul)]
}

// ---------------------------------------------------------------------------
// Polygon predicates (outer contour only).

/// Even-odd containment test.
pub fn point_in_contour(contour: &[Point], p: Point) -> bool {
    let mut inside = false;
    let n = contour.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let a = contour[i];
        let b = contour[j];
        if (a.y > p.y) != (b.y > p.y) {
            let xi = a.x as f64
                + (p.y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64;
            if (p.x as f64) < xi {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn contour_edge_near_segment(contour: &[Point], p1: Point, p2: Point, radius: f64) -> bool {
    let n = contour.len();
    if n < 2 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        if segment_segment_distance(p1, p2, contour[j], contour[i]) <= radius {
            return true;
        }
        j = i;
    }
    false
}

/// Point grown to a disc of `radius` vs the polygon area.
pub fn point_in_polygon(p: Point, radius: f64, poly: &Polygon) -> bool {
    if radius < 0.0 {
        return false;
    }
    if point_in_contour(&poly.contour, p) {
        return true;
    }
    contour_edge_near_segment(&poly.contour, p, p, radius)
}

/// Two closed contours, touching within `clearance`.
fn contours_touch(a: &[Point], b: &[Point], clearance: f64) -> bool {
    if a.iter().any(|p| point_in_contour(b, *p)) || b.iter().any(|p| point_in_contour(a, *p)) {
        return true;
    }
    let n = a.len();
    if n < 2 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        if contour_edge_near_segment(b, a[j], a[i], clearance) {
            return true;
        }
        j = i;
    }
    false
}

/// Axis-aligned rectangle vs polygon area. The rectangle is assumed to
/// already carry any bloat.
pub fn rect_in_polygon(bb: BBox, poly: &Polygon) -> bool {
    let rect = [
        Point::new(bb.x1, bb.y1),
        Point::new(bb.x2, bb.y1),
        Point::new(bb.x2, bb.y2),
        Point::new(bb.x1, bb.y2),
    ];
    contours_touch(&rect, &poly.contour, 0.0)
}

/// Thick segment vs polygon area. Clearing segments never touch clearing
/// polygons; axis-aligned square segments reduce to the rectangle case.
pub fn seg_in_polygon(seg: &Seg, seg_flags: Flags, poly: &Polygon, bloat: Coord) -> bool {
    if poly.flags.contains(Flags::CLEARPOLY) && seg_flags.contains(Flags::CLEARLINE) {
        return false;
    }
    if poly.contour.len() < 3 {
        return false;
    }
    if !poly
        .bounds()
        .expand_by_bloat(bloat)
        .overlaps(&BBox::from_points(&[seg.p1, seg.p2]).grow((seg.thickness + 1) / 2))
    {
        return false;
    }
    if seg.square && (seg.p1.x == seg.p2.x || seg.p1.y == seg.p2.y) {
        let wid = (seg.thickness + bloat + 1) / 2;
        if wid < 0 {
            return false;
        }
        let bb = BBox::from_points(&[seg.p1, seg.p2]).grow(wid);
        return rect_in_polygon(bb, poly);
    }
    let radius = clampf((seg.thickness + bloat) as f64 / 2.0);
    if point_in_contour(&poly.contour, seg.p1) || point_in_contour(&poly.contour, seg.p2) {
        return true;
    }
    contour_edge_near_segment(&poly.contour, seg.p1, seg.p2, radius)
}

pub fn line_in_polygon(line: &Line, poly: &Polygon, bloat: Coord) -> bool {
    seg_in_polygon(&line.into(), line.flags, poly, bloat)
}

pub fn pad_in_polygon(pad: &Pad, poly: &Polygon, bloat: Coord) -> bool {
    seg_in_polygon(&pad.into(), pad.flags, poly, bloat)
}

/// Arc vs polygon area: the arc centerline is flattened into a short
/// polyline and tested as capsules against the contour.
pub fn arc_in_polygon(arc: &Arc, poly: &Polygon, bloat: Coord) -> bool {
    if poly.flags.contains(Flags::CLEARPOLY) && arc.flags.contains(Flags::CLEARLINE) {
        return false;
    }
    if poly.contour.len() < 3 {
        return false;
    }
    if !poly.bounds().expand_by_bloat(bloat).overlaps(&arc.bounds()) {
        return false;
    }
    let radius = clampf((arc.thickness + bloat) as f64 / 2.0);
    let (sa, d) = arc_angles(arc);
    let steps = ((d / 5.0).ceil() as usize).max(1);
    let mut prev: Option<Point> = None;
    for i in 0..=steps {
        let ang = (sa + d * i as f64 / steps as f64).to_radians();
        let p = Point::new(
            arc.center.x - (arc.radius as f64 * ang.cos()).round() as Coord,
            arc.center.y + (arc.radius as f64 * ang.sin()).round() as Coord,
        );
        if point_in_contour(&poly.contour, p) {
            return true;
        }
        if let Some(q) = prev {
            if contour_edge_near_segment(&poly.contour, q, p, radius) {
                return true;
            }
        }
        prev = Some(p);
    }
    false
}

/// Octagon contour around a pin center, flat-to-flat equal to `size`.
fn octagon_contour(center: Point, size: Coord) -> Vec<Point> {
    let circ = size as f64 / 2.0 / (std::f64::consts::PI / 8.0).cos();
    (0..8)
        .map(|i| {
            let ang = (i as f64 + 0.5) * std::f64::consts::FRAC_PI_4;
            Point::new(
                center.x + (circ * ang.cos()).round() as Coord,
                center.y + (circ * ang.sin()).round() as Coord,
            )
        })
        .collect()
}

/// Pin/via vs polygon area, by shape. Clearance/thermal screening is the
/// caller's business.
pub fn pv_in_polygon(pv: &Pv, poly: &Polygon, bloat: Coord) -> bool {
    if poly.contour.len() < 3 {
        return false;
    }
    let size = pv.copper_size();
    if pv.flags.contains(Flags::SQUARE) {
        // the rectangle grows by half the bloat on each side
        let half = ((size + 1 + bloat) / 2).max(0);
        rect_in_polygon(BBox::around(pv.pos, half), poly)
    } else if pv.flags.contains(Flags::OCTAGON) {
        let oct = octagon_contour(pv.pos, size);
        contours_touch(&oct, &poly.contour, clampf(bloat as f64))
    } else {
        point_in_polygon(pv.pos, clampf(size as f64 / 2.0 + bloat as f64), poly)
    }
}

/// Polygon vs polygon. The unbloated contours are tested directly; with
/// positive bloat each edge of the first contour is re-tested as a thick
/// segment against the second.
pub fn polygon_in_polygon(p1: &Polygon, p2: &Polygon, bloat: Coord) -> bool {
    if p1.contour.len() < 3 || p2.contour.len() < 3 {
        return false;
    }
    let b1 = p1.bounds();
    let b2 = p2.bounds();
    if b1.x1 - bloat > b2.x2
        || b1.x2 + bloat < b2.x1
        || b1.y1 - bloat > b2.y2
        || b1.y2 + bloat < b2.y1
    {
        return false;
    }
    if contours_touch(&p1.contour, &p2.contour, 0.0) {
        return true;
    }
    if bloat > 0 {
        let n = p1.contour.len();
        let mut j = n - 1;
        for i in 0..n {
            let edge = Seg {
                p1: p1.contour[j],
                p2: p1.contour[i],
                thickness: 2 * bloat,
                square: false,
            };
            if seg_in_polygon(&edge, Flags::NONE, p2, bloat) {
                return true;
            }
            j = i;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Rat endpoint predicates. Rats attach at exact points; `tolerance`
// loosens the match per axis.

pub fn rat_on_seg_end(p: Point, seg_p1: Point, seg_p2: Point, tolerance: Coord) -> bool {
    p.matches(&seg_p1, tolerance) || p.matches(&seg_p2, tolerance)
}

/// Rats attach to a pad at either endpoint or the midpoint.
pub fn rat_on_pad(p: Point, pad: &Pad, tolerance: Coord) -> bool {
    let mid = Point::new((pad.p1.x + pad.p2.x) / 2, (pad.p1.y + pad.p2.y) / 2);
    p.matches(&pad.p1, tolerance) || p.matches(&pad.p2, tolerance) || p.matches(&mid, tolerance)
}

/// Rats attach to a polygon at its first contour vertex.
pub fn rat_on_polygon(p: Point, poly: &Polygon, tolerance: Coord) -> bool {
    poly.contour
        .first()
        .is_some_and(|start| p.matches(start, tolerance))
}
