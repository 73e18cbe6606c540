//! Delaunay triangulation (Bowyer-Watson).
//!
//! Points are inserted in index order, so the output is a pure function of
//! the input sequence. Callers are expected to remove duplicate points and
//! to perturb exactly co-circular inputs (regular grids) beforehand.

use super::projection::PlanarPoint;

/// A triangle as three point indices in counter-clockwise order.
pub type Triangle = [usize; 3];

#[derive(Debug, Clone, Copy)]
struct Cell {
    v: Triangle,
    center: PlanarPoint,
    radius_2: f64,
}

/// Triangulates `points`. Returns an empty list for fewer than three points
/// or when all points are collinear.
pub fn delaunay(points: &[PlanarPoint]) -> Vec<Triangle> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p[0]);
        min_y = min_y.min(p[1]);
        max_x = max_x.max(p[0]);
        max_y = max_y.max(p[1]);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid = [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0];

    let mut all: Vec<PlanarPoint> = points.to_vec();
    all.push([mid[0] - 40.0 * span, mid[1] - 20.0 * span]);
    all.push([mid[0] + 40.0 * span, mid[1] - 20.0 * span]);
    all.push([mid[0], mid[1] + 40.0 * span]);

    let mut cells: Vec<Cell> = Vec::with_capacity(2 * n + 1);
    if let Some(cell) = make_cell(&all, [n, n + 1, n + 2]) {
        cells.push(cell);
    }

    for i in 0..n {
        let p = all[i];

        let (bad, good): (Vec<Cell>, Vec<Cell>) = cells.into_iter().partition(|cell| {
            let dx = p[0] - cell.center[0];
            let dy = p[1] - cell.center[1];
            dx * dx + dy * dy < cell.radius_2 && in_circumcircle(&all, cell.v, p)
        });
        cells = good;

        // Edges of the cavity: directed edges whose reverse is not in another bad cell.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for cell in &bad {
            for (a, b) in edges(cell.v) {
                let shared = bad
                    .iter()
                    .any(|other| edges(other.v).iter().any(|&(c, d)| c == b && d == a));
                if !shared {
                    boundary.push((a, b));
                }
            }
        }

        for (a, b) in boundary {
            if let Some(cell) = make_cell(&all, [a, b, i]) {
                cells.push(cell);
            }
        }
    }

    cells
        .into_iter()
        .filter(|cell| cell.v.iter().all(|&v| v < n))
        .map(|cell| cell.v)
        .collect()
}

/// Circumradius of a triangle, infinite when degenerate.
pub fn circumradius(a: PlanarPoint, b: PlanarPoint, c: PlanarPoint) -> f64 {
    let ab = distance(a, b);
    let bc = distance(b, c);
    let ca = distance(c, a);
    let area2 = cross(a, b, c).abs();
    if area2 <= f64::EPSILON * (ab * bc).max(1.0) {
        return f64::INFINITY;
    }
    (ab * bc * ca) / (2.0 * area2)
}

/// Twice the signed area of `abc`; positive when counter-clockwise.
pub fn cross(a: PlanarPoint, b: PlanarPoint, c: PlanarPoint) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn distance(a: PlanarPoint, b: PlanarPoint) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn edges(v: Triangle) -> [(usize, usize); 3] {
    [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])]
}

fn make_cell(points: &[PlanarPoint], v: Triangle) -> Option<Cell> {
    let (a, b, c) = (points[v[0]], points[v[1]], points[v[2]]);
    let orientation = cross(a, b, c);
    if orientation == 0.0 || !orientation.is_finite() {
        return None;
    }
    let v = if orientation > 0.0 { v } else { [v[0], v[2], v[1]] };

    // Circumcenter relative to `a` to keep magnitudes small.
    let (bx, by) = (b[0] - a[0], b[1] - a[1]);
    let (cx, cy) = (c[0] - a[0], c[1] - a[1]);
    let d = 2.0 * (bx * cy - by * cx);
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    if !ux.is_finite() || !uy.is_finite() {
        return None;
    }

    Some(Cell {
        v,
        center: [a[0] + ux, a[1] + uy],
        // Slack so the exact predicate decides borderline points.
        radius_2: (ux * ux + uy * uy) * (1.0 + 1e-9) + 1e-12,
    })
}

/// In-circle predicate for a counter-clockwise triangle, evaluated relative
/// to the query point.
fn in_circumcircle(points: &[PlanarPoint], v: Triangle, p: PlanarPoint) -> bool {
    let a = [points[v[0]][0] - p[0], points[v[0]][1] - p[1]];
    let b = [points[v[1]][0] - p[0], points[v[1]][1] - p[1]];
    let c = [points[v[2]][0] - p[0], points[v[2]][1] - p[1]];
    let a2 = a[0] * a[0] + a[1] * a[1];
    let b2 = b[0] * b[0] + b[1] * b[1];
    let c2 = c[0] * c[0] + c[1] * c[1];
    let det = a[0] * (b[1] * c2 - b2 * c[1]) - a[1] * (b[0] * c2 - b2 * c[0])
        + a2 * (b[0] * c[1] - b[1] * c[0]);
    det > 0.0
}
