//! Zone boundary reconstruction and area.
//!
//! A cluster's outline is its alpha shape: the union of Delaunay triangles
//! whose circumradius does not exceed `1 / alpha`. When that is empty or not
//! a valid polygon the radius is relaxed through `alpha_relaxation`, then the
//! convex hull is used, and for point or line clusters a small buffered
//! polygon. Everything happens in the planar projection used for clustering,
//! so areas are in square meters.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Contains, ConvexHull, Coord, Line, LineString, MultiPoint, Point, Polygon};
use tracing::debug;

use super::projection::PlanarPoint;
use super::triangulation::{circumradius, cross, delaunay, Triangle};
use crate::error::CoreError;
use crate::models::ZoneMethod;

/// Polygons at or below this area (m²) are treated as empty.
const MIN_POLYGON_AREA_M2: f64 = 1e-6;

/// Perturbation applied before triangulation, in meters.
const JOGGLE_M: f64 = 1e-3;

/// Distance (m) under which a point counts as lying on a line.
const COLLINEAR_TOLERANCE_M: f64 = 1e-6;

/// Vertices used to approximate a buffered point.
const BUFFER_SEGMENTS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryParams {
    /// Alpha in 1/m; triangles with circumradius above `1 / alpha` are dropped.
    pub alpha: f64,
    /// Multipliers applied to `alpha` in turn until a valid shape is found.
    pub alpha_relaxation: Vec<f64>,
    /// Half-width of the polygon built around point and line clusters.
    pub buffer_meters: f64,
    /// Pieces smaller than this are discarded.
    pub min_zone_area_m2: f64,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            alpha: 0.02,
            alpha_relaxation: vec![1.0, 0.5, 0.25],
            buffer_meters: 2.0,
            min_zone_area_m2: 0.0,
        }
    }
}

/// One polygon produced from a cluster, in planar coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePiece {
    pub polygon: Polygon<f64>,
    pub area_m2: f64,
    /// Cluster points backing this piece.
    pub point_count: usize,
    pub method: ZoneMethod,
}

/// Computes the zone polygons for one cluster.
///
/// Pieces come back ordered by descending area. An empty list means every
/// piece fell under `min_zone_area_m2`.
pub fn boundary_and_area(
    points: &[PlanarPoint],
    params: &BoundaryParams,
) -> Result<Vec<ZonePiece>, CoreError> {
    let finite: Vec<PlanarPoint> = points
        .iter()
        .copied()
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();
    if finite.is_empty() {
        return Err(CoreError::GeometryDegenerate(
            "cluster has no finite points".to_string(),
        ));
    }

    let (unique, multiplicity) = dedup(&finite);
    let total = finite.len();

    if unique.len() >= 3 && !all_collinear(&unique) {
        let jittered: Vec<PlanarPoint> = unique
            .iter()
            .enumerate()
            .map(|(i, p)| joggle(i, *p))
            .collect();
        let triangles = delaunay(&jittered);

        for factor in &params.alpha_relaxation {
            let alpha = params.alpha * factor;
            if !(alpha > 0.0 && alpha.is_finite()) {
                continue;
            }
            match alpha_shape(&unique, &multiplicity, &triangles, 1.0 / alpha) {
                Some(pieces) => return Ok(finish(pieces, params)),
                None => debug!(alpha, points = total, "Alpha shape degenerate, relaxing"),
            }
        }

        if let Some(piece) = convex_hull(&unique, total) {
            debug!(points = total, "Falling back to convex hull");
            return Ok(finish(vec![piece], params));
        }
    }

    match buffered(&unique, total, params.buffer_meters) {
        Some(piece) => {
            debug!(points = total, "Falling back to buffered geometry");
            Ok(finish(vec![piece], params))
        }
        None => Err(CoreError::GeometryDegenerate(format!(
            "no valid polygon for {total} points"
        ))),
    }
}

fn finish(mut pieces: Vec<ZonePiece>, params: &BoundaryParams) -> Vec<ZonePiece> {
    pieces.retain(|p| p.area_m2 >= params.min_zone_area_m2);
    pieces.sort_by(|a, b| b.area_m2.total_cmp(&a.area_m2));
    pieces
}

/// Collapses identical points, keeping first-seen order and counts.
fn dedup(points: &[PlanarPoint]) -> (Vec<PlanarPoint>, Vec<usize>) {
    let mut seen: HashMap<(u64, u64), usize> = HashMap::new();
    let mut unique = Vec::new();
    let mut counts = Vec::new();
    for p in points {
        // `+ 0.0` folds -0.0 into 0.0.
        let key = ((p[0] + 0.0).to_bits(), (p[1] + 0.0).to_bits());
        match seen.get(&key) {
            Some(&i) => counts[i] += 1,
            None => {
                seen.insert(key, unique.len());
                unique.push(*p);
                counts.push(1);
            }
        }
    }
    (unique, counts)
}

fn all_collinear(points: &[PlanarPoint]) -> bool {
    let Some((origin, far)) = farthest_pair(points) else {
        return true;
    };
    let length = distance(origin, far);
    if length <= COLLINEAR_TOLERANCE_M {
        return true;
    }
    points
        .iter()
        .all(|p| (cross(origin, far, *p) / length).abs() <= COLLINEAR_TOLERANCE_M)
}

/// Deterministic sub-millimeter offset derived from the point index.
fn joggle(index: usize, p: PlanarPoint) -> PlanarPoint {
    let h = splitmix64(index as u64);
    let jx = ((h & 0xffff_ffff) as f64 / f64::from(u32::MAX) - 0.5) * JOGGLE_M;
    let jy = ((h >> 32) as f64 / f64::from(u32::MAX) - 0.5) * JOGGLE_M;
    [p[0] + jx, p[1] + jy]
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn alpha_shape(
    points: &[PlanarPoint],
    multiplicity: &[usize],
    triangles: &[Triangle],
    max_radius: f64,
) -> Option<Vec<ZonePiece>> {
    let kept: Vec<Triangle> = triangles
        .iter()
        .copied()
        .filter(|t| {
            let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
            cross(a, b, c) > 0.0 && circumradius(a, b, c) <= max_radius
        })
        .collect();
    if kept.is_empty() {
        return None;
    }

    let mut owners: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (ti, t) in kept.iter().enumerate() {
        for (a, b) in triangle_edges(*t) {
            owners.entry(undirected(a, b)).or_default().push(ti);
        }
    }

    // Components of triangles connected through shared edges.
    let mut parent: Vec<usize> = (0..kept.len()).collect();
    for tris in owners.values() {
        if let [first, second] = tris.as_slice() {
            union(&mut parent, *first, *second);
        }
    }
    let mut component_of_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for ti in 0..kept.len() {
        let root = find(&mut parent, ti);
        let ci = *component_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[ci].push(ti);
    }

    let mut pieces = Vec::new();
    for component in &components {
        let mut boundary: Vec<(usize, usize)> = component
            .iter()
            .flat_map(|&ti| triangle_edges(kept[ti]))
            .filter(|&(a, b)| owners.get(&undirected(a, b)).map_or(0, Vec::len) == 1)
            .collect();
        boundary.sort_unstable();

        let rings = trace_rings(&boundary, points)?;
        let mut exteriors: Vec<LineString<f64>> = Vec::new();
        let mut holes: Vec<LineString<f64>> = Vec::new();
        for ring in rings {
            let signed = signed_area(&ring, points);
            let line = ring_to_linestring(&ring, points);
            if signed > MIN_POLYGON_AREA_M2 {
                exteriors.push(line);
            } else if signed < -MIN_POLYGON_AREA_M2 {
                holes.push(line);
            } else {
                return None;
            }
        }
        if exteriors.is_empty() {
            return None;
        }

        let outlines: Vec<Polygon<f64>> = exteriors
            .iter()
            .map(|e| Polygon::new(e.clone(), vec![]))
            .collect();
        let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); exteriors.len()];
        for hole in holes {
            let probe = hole.lines().next().map(|l| {
                Point::new((l.start.x + l.end.x) / 2.0, (l.start.y + l.end.y) / 2.0)
            })?;
            let owner = outlines.iter().position(|o| o.contains(&probe))?;
            interiors[owner].push(hole);
        }

        // Attribute each triangle's vertices to the outline containing it.
        let mut vertices: Vec<Vec<usize>> = vec![Vec::new(); exteriors.len()];
        for &ti in component {
            let t = kept[ti];
            let centroid = Point::new(
                (points[t[0]][0] + points[t[1]][0] + points[t[2]][0]) / 3.0,
                (points[t[0]][1] + points[t[1]][1] + points[t[2]][1]) / 3.0,
            );
            let owner = outlines.iter().position(|o| o.contains(&centroid))?;
            vertices[owner].extend_from_slice(&t);
        }

        for ((exterior, holes), mut used) in exteriors.into_iter().zip(interiors).zip(vertices) {
            used.sort_unstable();
            used.dedup();
            let polygon = Polygon::new(exterior, holes);
            if !is_valid_polygon(&polygon) {
                return None;
            }
            pieces.push(ZonePiece {
                area_m2: polygon.unsigned_area(),
                point_count: used.iter().map(|&v| multiplicity[v]).sum(),
                polygon,
                method: ZoneMethod::AlphaShape,
            });
        }
    }

    Some(pieces)
}

/// Chains directed boundary edges into closed rings.
///
/// At a vertex with several outgoing edges the one with the smallest
/// clockwise turn from the reversed incoming edge is taken, which keeps the
/// ring on the same side of a pinch point.
fn trace_rings(edges: &[(usize, usize)], points: &[PlanarPoint]) -> Option<Vec<Vec<usize>>> {
    let mut outgoing: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (ei, (a, _)) in edges.iter().enumerate() {
        outgoing.entry(*a).or_default().push(ei);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (origin, mut current) = edges[start];
        let mut previous = origin;
        let mut ring = vec![origin];

        while current != origin {
            if ring.len() > edges.len() {
                return None;
            }
            ring.push(current);

            let back = sub(points[previous], points[current]);
            let next = outgoing
                .get(&current)?
                .iter()
                .copied()
                .filter(|&ei| !used[ei])
                .min_by(|&x, &y| {
                    let ax = clockwise_angle(back, sub(points[edges[x].1], points[current]));
                    let ay = clockwise_angle(back, sub(points[edges[y].1], points[current]));
                    ax.total_cmp(&ay).then(x.cmp(&y))
                })?;

            used[next] = true;
            previous = current;
            current = edges[next].1;
        }

        if ring.len() < 3 {
            return None;
        }
        rings.push(ring);
    }

    Some(rings)
}

fn convex_hull(points: &[PlanarPoint], total: usize) -> Option<ZonePiece> {
    let multipoint: MultiPoint<f64> = points.iter().map(|p| Point::new(p[0], p[1])).collect();
    let hull = multipoint.convex_hull();
    let area = hull.unsigned_area();
    if area <= MIN_POLYGON_AREA_M2 || !is_valid_polygon(&hull) {
        return None;
    }
    Some(ZonePiece {
        polygon: hull,
        area_m2: area,
        point_count: total,
        method: ZoneMethod::ConvexHull,
    })
}

/// Polygon around a point (approximated circle) or a segment (rectangle
/// extended by the buffer at both ends).
fn buffered(points: &[PlanarPoint], total: usize, buffer: f64) -> Option<ZonePiece> {
    if !(buffer > 0.0 && buffer.is_finite()) {
        return None;
    }

    let coords: Vec<Coord<f64>> = match farthest_pair(points) {
        Some((a, b)) if distance(a, b) > COLLINEAR_TOLERANCE_M => {
            let length = distance(a, b);
            let u = [(b[0] - a[0]) / length, (b[1] - a[1]) / length];
            let n = [-u[1], u[0]];
            let start = [a[0] - u[0] * buffer, a[1] - u[1] * buffer];
            let end = [b[0] + u[0] * buffer, b[1] + u[1] * buffer];
            vec![
                Coord { x: start[0] - n[0] * buffer, y: start[1] - n[1] * buffer },
                Coord { x: end[0] - n[0] * buffer, y: end[1] - n[1] * buffer },
                Coord { x: end[0] + n[0] * buffer, y: end[1] + n[1] * buffer },
                Coord { x: start[0] + n[0] * buffer, y: start[1] + n[1] * buffer },
            ]
        }
        _ => {
            let center = *points.first()?;
            (0..BUFFER_SEGMENTS)
                .map(|k| {
                    let angle = TAU * k as f64 / BUFFER_SEGMENTS as f64;
                    Coord {
                        x: center[0] + buffer * angle.cos(),
                        y: center[1] + buffer * angle.sin(),
                    }
                })
                .collect()
        }
    };

    let polygon = Polygon::new(LineString::from(coords), vec![]);
    if !is_valid_polygon(&polygon) {
        return None;
    }
    Some(ZonePiece {
        area_m2: polygon.unsigned_area(),
        polygon,
        point_count: total,
        method: ZoneMethod::Buffered,
    })
}

/// Finite coordinates, closed rings of at least three vertices, non-zero
/// area and no crossing or overlapping edges. Rings may touch at vertices.
pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();

    for ring in &rings {
        if ring.0.len() < 4 || !ring.is_closed() {
            return false;
        }
        if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return false;
        }
    }
    if polygon.unsigned_area() <= MIN_POLYGON_AREA_M2 {
        return false;
    }

    let segments: Vec<(usize, usize, usize, Line<f64>)> = rings
        .iter()
        .enumerate()
        .flat_map(|(ri, ring)| {
            let count = ring.0.len() - 1;
            ring.lines()
                .enumerate()
                .map(move |(si, line)| (ri, si, count, line))
        })
        .collect();

    for (i, (ri, si, count, line)) in segments.iter().enumerate() {
        for (rj, sj, _, other) in &segments[i + 1..] {
            let adjacent =
                ri == rj && (sj - si == 1 || (*si == 0 && *sj == count - 1));
            match line_intersection(*line, *other) {
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) => return false,
                Some(LineIntersection::Collinear { .. }) if !adjacent => return false,
                Some(LineIntersection::Collinear { intersection }) => {
                    // Adjacent edges folding back onto each other.
                    if intersection.start != intersection.end {
                        return false;
                    }
                }
                _ => {}
            }
        }
    }
    true
}

fn ring_to_linestring(ring: &[usize], points: &[PlanarPoint]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&v| Coord {
            x: points[v][0],
            y: points[v][1],
        })
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::from(coords)
}

fn signed_area(ring: &[usize], points: &[PlanarPoint]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|k| {
            let a = points[ring[k]];
            let b = points[ring[(k + 1) % n]];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum::<f64>()
        / 2.0
}

fn farthest_pair(points: &[PlanarPoint]) -> Option<(PlanarPoint, PlanarPoint)> {
    let first = *points.first()?;
    // Two sweeps: the farthest point from an arbitrary start, then the
    // farthest from that one. Exact for collinear sets.
    let a = points
        .iter()
        .copied()
        .max_by(|p, q| distance(first, *p).total_cmp(&distance(first, *q)))?;
    let b = points
        .iter()
        .copied()
        .max_by(|p, q| distance(a, *p).total_cmp(&distance(a, *q)))?;
    Some((a, b))
}

fn triangle_edges(t: Triangle) -> [(usize, usize); 3] {
    [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])]
}

fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn find(parent: &mut [usize], x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = x;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[high] = low;
    }
}

fn sub(a: PlanarPoint, b: PlanarPoint) -> PlanarPoint {
    [a[0] - b[0], a[1] - b[1]]
}

fn distance(a: PlanarPoint, b: PlanarPoint) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Clockwise angle from `from` to `to`, in `(0, 2π]`.
fn clockwise_angle(from: PlanarPoint, to: PlanarPoint) -> f64 {
    let mut angle = from[1].atan2(from[0]) - to[1].atan2(to[0]);
    while angle <= 0.0 {
        angle += TAU;
    }
    while angle > TAU {
        angle -= TAU;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cols: usize, rows: usize, spacing: f64) -> Vec<PlanarPoint> {
        let mut points = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                points.push([c as f64 * spacing, r as f64 * spacing]);
            }
        }
        points
    }

    #[test]
    fn test_square_grid_area() {
        let points = grid(11, 11, 10.0);
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].method, ZoneMethod::AlphaShape);
        assert!((pieces[0].area_m2 - 10_000.0).abs() < 1.0, "{}", pieces[0].area_m2);
        assert_eq!(pieces[0].point_count, 121);
    }

    #[test]
    fn test_concave_shape_is_not_filled() {
        // An L of 5 m cells: the missing quadrant must not be counted.
        let points: Vec<PlanarPoint> = grid(9, 9, 5.0)
            .into_iter()
            .filter(|p| !(p[0] > 20.0 && p[1] > 20.0))
            .collect();
        let params = BoundaryParams {
            alpha: 0.2,
            ..BoundaryParams::default()
        };
        let pieces = boundary_and_area(&points, &params).unwrap();
        assert_eq!(pieces.len(), 1);
        // 40x40 square minus the empty 20x20 corner, plus the one half cell
        // spanning the inner corner.
        assert!((pieces[0].area_m2 - 1_212.5).abs() < 1e-6, "{}", pieces[0].area_m2);
    }

    #[test]
    fn test_disjoint_groups_become_separate_pieces() {
        let mut points = grid(4, 4, 5.0);
        points.extend(grid(3, 3, 5.0).into_iter().map(|p| [p[0] + 500.0, p[1]]));
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].area_m2 > pieces[1].area_m2);
        assert!((pieces[0].area_m2 - 225.0).abs() < 0.5);
        assert!((pieces[1].area_m2 - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_relaxation_then_convex_hull() {
        // A wide triangle of three points: circumradius ~500 m, beyond every
        // relaxed alpha, so the hull is used.
        let points = vec![[0.0, 0.0], [1000.0, 0.0], [500.0, 10.0]];
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].method, ZoneMethod::ConvexHull);
        assert!((pieces[0].area_m2 - 5_000.0).abs() < 1e-6);
        assert_eq!(pieces[0].point_count, 3);
    }

    #[test]
    fn test_relaxed_alpha_recovers_shape() {
        let points = vec![[0.0, 0.0], [120.0, 0.0], [120.0, 120.0], [0.0, 120.5]];
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        // Circumradius ~85 m: rejected at 50 m, accepted at 100 m.
        assert_eq!(pieces[0].method, ZoneMethod::AlphaShape);
    }

    #[test]
    fn test_single_point_is_buffered() {
        let points = vec![[3.0, 4.0]; 6];
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        assert_eq!(pieces[0].method, ZoneMethod::Buffered);
        assert_eq!(pieces[0].point_count, 6);
        // Regular 16-gon of radius 2.
        let expected = 0.5 * 16.0 * 4.0 * (TAU / 16.0).sin();
        assert!((pieces[0].area_m2 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_points_are_buffered() {
        let points: Vec<PlanarPoint> = (0..10).map(|i| [i as f64 * 3.0, i as f64 * 4.0]).collect();
        let pieces = boundary_and_area(&points, &BoundaryParams::default()).unwrap();
        assert_eq!(pieces[0].method, ZoneMethod::Buffered);
        // Segment of 45 m, extended by 2 m at each end, 4 m wide.
        assert!((pieces[0].area_m2 - 49.0 * 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_when_no_buffer() {
        let points = vec![[0.0, 0.0], [1.0, 1.0]];
        let params = BoundaryParams {
            buffer_meters: 0.0,
            ..BoundaryParams::default()
        };
        assert!(matches!(
            boundary_and_area(&points, &params),
            Err(CoreError::GeometryDegenerate(_))
        ));
        assert!(matches!(
            boundary_and_area(&[], &params),
            Err(CoreError::GeometryDegenerate(_))
        ));
    }

    #[test]
    fn test_min_zone_area_filter() {
        let points = grid(3, 3, 5.0);
        let params = BoundaryParams {
            min_zone_area_m2: 500.0,
            ..BoundaryParams::default()
        };
        assert!(boundary_and_area(&points, &params).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_output() {
        let points: Vec<PlanarPoint> = (0..150)
            .map(|i| {
                let t = i as f64;
                [(t * 1.7).sin() * 40.0, (t * 2.3).cos() * 25.0]
            })
            .collect();
        let params = BoundaryParams::default();
        assert_eq!(
            boundary_and_area(&points, &params).unwrap(),
            boundary_and_area(&points, &params).unwrap()
        );
    }

    #[test]
    fn test_validity_rejects_bow_tie() {
        let bow_tie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]),
            vec![],
        );
        assert!(!is_valid_polygon(&bow_tie));

        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![],
        );
        assert!(is_valid_polygon(&square));
    }

    #[test]
    fn test_clockwise_angle() {
        let a = clockwise_angle([-1.0, 0.0], [0.0, 1.0]);
        assert!((a - TAU / 4.0).abs() < 1e-12);
        let full = clockwise_angle([1.0, 0.0], [1.0, 0.0]);
        assert!((full - TAU).abs() < 1e-12);
    }
}
