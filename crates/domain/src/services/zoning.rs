//! Per-day zone computation and equipment totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use geo::{
    Area, BooleanOps, Centroid, Coord, HaversineDistance, LineString, MapCoords, MultiPolygon,
    Point, Polygon,
};
use tracing::warn;

use super::boundary::{boundary_and_area, BoundaryParams, ZonePiece};
use super::clustering::{cluster, ClusterParams};
use super::projection::{LocalProjection, PlanarPoint};
use crate::models::{DailyZone, EquipmentTotals, NewDailyZone, Position, Ring, M2_PER_HECTARE};

/// Tuning for one analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisParams {
    pub clustering: ClusterParams,
    pub boundary: BoundaryParams,
}

/// Result of analyzing one day's positions.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAnalysis {
    pub date: NaiveDate,
    pub zones: Vec<NewDailyZone>,
    /// Positions outside every retained cluster.
    pub noise_points: usize,
    /// Clusters for which no polygon could be built.
    pub degenerate_clusters: usize,
}

/// Clusters one day's positions and builds a zone for every polygon piece.
///
/// Zone indexes follow cluster order, then descending area within a cluster.
/// A degenerate cluster is logged and skipped.
pub fn analyze_day(date: NaiveDate, positions: &[Position], params: &AnalysisParams) -> DayAnalysis {
    let mut analysis = DayAnalysis {
        date,
        zones: Vec::new(),
        noise_points: positions.len(),
        degenerate_clusters: 0,
    };

    let coords: Vec<(f64, f64)> = positions.iter().map(|p| (p.latitude, p.longitude)).collect();
    let Some(projection) = LocalProjection::centered_on(&coords) else {
        return analysis;
    };
    let planar: Vec<PlanarPoint> = coords
        .iter()
        .map(|(lat, lon)| projection.forward(*lat, *lon))
        .collect();

    let clusters = cluster(&planar, &params.clustering);
    analysis.noise_points -= clusters.iter().map(Vec::len).sum::<usize>();

    for members in clusters {
        let points: Vec<PlanarPoint> = members.iter().map(|&i| planar[i]).collect();
        match boundary_and_area(&points, &params.boundary) {
            Ok(pieces) => {
                for piece in pieces {
                    let zone_index = analysis.zones.len() as i32;
                    analysis.zones.push(to_zone(zone_index, &piece, &projection));
                }
            }
            Err(e) => {
                warn!(
                    date = %date,
                    cluster_size = members.len(),
                    first_position = positions[members[0]].id,
                    error = %e,
                    "Skipping degenerate cluster"
                );
                analysis.degenerate_clusters += 1;
            }
        }
    }

    analysis
}

fn to_zone(zone_index: i32, piece: &ZonePiece, projection: &LocalProjection) -> NewDailyZone {
    let to_ring = |line: &LineString<f64>| -> Ring {
        line.coords()
            .map(|c| {
                let (lat, lon) = projection.inverse([c.x, c.y]);
                [lon, lat]
            })
            .collect()
    };

    let mut boundary = vec![to_ring(piece.polygon.exterior())];
    boundary.extend(piece.polygon.interiors().iter().map(to_ring));

    NewDailyZone {
        zone_index,
        area_m2: piece.area_m2,
        boundary,
        point_count: piece.point_count as i32,
        method: piece.method,
    }
}

/// WGS84 polygon for a stored zone boundary.
pub fn zone_polygon(boundary: &[Ring]) -> Option<Polygon<f64>> {
    let mut rings = boundary.iter().map(|ring| {
        LineString::from(
            ring.iter()
                .map(|[lon, lat]| Coord { x: *lon, y: *lat })
                .collect::<Vec<_>>(),
        )
    });
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

/// One day's zones merged in the equipment's local plane.
struct DayUnion {
    /// Stored zone areas less their overlap.
    area_m2: f64,
    planar: MultiPolygon<f64>,
}

fn planar_polygon(boundary: &[Ring], projection: &LocalProjection) -> Option<Polygon<f64>> {
    let polygon = zone_polygon(boundary)?;
    Some(polygon.map_coords(|c| {
        let [x, y] = projection.forward(c.y, c.x);
        Coord { x, y }
    }))
}

/// Union of `polygons` and the area they shared before merging.
fn merge(polygons: Vec<Polygon<f64>>) -> (MultiPolygon<f64>, f64) {
    let separate: f64 = polygons.iter().map(|p| p.unsigned_area()).sum();
    let mut pieces = polygons.into_iter();
    let Some(first) = pieces.next() else {
        return (MultiPolygon::new(Vec::new()), 0.0);
    };
    let union = pieces.fold(MultiPolygon::new(vec![first]), |acc, polygon| {
        acc.union(&MultiPolygon::new(vec![polygon]))
    });
    let overlap = (separate - union.unsigned_area()).max(0.0);
    (union, overlap)
}

/// Totals over every zone stored for an equipment.
///
/// Each day's zones are merged first. `total_hectares` sums the daily
/// surfaces, `relative_hectares` is the surface of all days merged, and the
/// distance runs between the centroids of consecutive days.
pub fn totals(zones: &[DailyZone]) -> EquipmentTotals {
    let vertices: Vec<(f64, f64)> = zones
        .iter()
        .flat_map(|z| z.boundary.first().into_iter().flatten())
        .map(|[lon, lat]| (*lat, *lon))
        .collect();
    let Some(projection) = LocalProjection::centered_on(&vertices) else {
        return EquipmentTotals::default();
    };

    let mut by_day: BTreeMap<NaiveDate, Vec<&DailyZone>> = BTreeMap::new();
    for zone in zones {
        by_day.entry(zone.date).or_default().push(zone);
    }

    let days: Vec<DayUnion> = by_day
        .into_values()
        .map(|day| {
            let stored: f64 = day.iter().map(|z| z.area_m2).sum();
            let polygons = day
                .iter()
                .filter_map(|z| planar_polygon(&z.boundary, &projection))
                .collect();
            let (planar, overlap) = merge(polygons);
            DayUnion {
                area_m2: (stored - overlap).max(0.0),
                planar,
            }
        })
        .collect();

    let total_m2: f64 = days.iter().map(|d| d.area_m2).sum();
    let (_, revisited_m2) = merge(
        days.iter()
            .flat_map(|d| d.planar.0.iter().cloned())
            .collect(),
    );

    let centroids: Vec<Point<f64>> = days
        .iter()
        .filter_map(|d| d.planar.centroid())
        .map(|c| {
            let (lat, lon) = projection.inverse([c.x(), c.y()]);
            Point::new(lon, lat)
        })
        .collect();
    let distance: f64 = centroids
        .windows(2)
        .map(|pair| pair[0].haversine_distance(&pair[1]))
        .sum();

    EquipmentTotals {
        total_hectares: total_m2 / M2_PER_HECTARE,
        relative_hectares: (total_m2 - revisited_m2).max(0.0) / M2_PER_HECTARE,
        distance_between_zones_m: distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PositionSource, ZoneMethod};
    use chrono::{TimeZone, Utc};

    const LAT: f64 = 45.0;
    const LON: f64 = 4.0;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 10).unwrap()
    }

    fn fix(id: i64, lat: f64, lon: f64) -> Position {
        let ts = Utc.with_ymd_and_hms(2024, 8, 10, 8, 0, 0).unwrap()
            + chrono::Duration::seconds(id * 10);
        Position {
            id,
            equipment_id: 1,
            latitude: lat,
            longitude: lon,
            timestamp: ts,
            speed: None,
            battery_level: None,
            source: PositionSource::Pull,
            created_at: ts,
        }
    }

    /// Fixes on a metric grid around (LAT, LON).
    fn grid_fixes(start_id: i64, cols: usize, rows: usize, spacing_m: f64) -> Vec<Position> {
        let proj = LocalProjection::new(LAT, LON);
        let mut out = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let (lat, lon) = proj.inverse([c as f64 * spacing_m, r as f64 * spacing_m]);
                out.push(fix(start_id + out.len() as i64, lat, lon));
            }
        }
        out
    }

    #[test]
    fn test_dense_field_with_transit_noise() {
        let mut positions = grid_fixes(0, 5, 8, 4.0);
        // Ten scattered fixes at least 300 m apart.
        let proj = LocalProjection::new(LAT, LON);
        for k in 0..10 {
            let (lat, lon) = proj.inverse([400.0 + 300.0 * k as f64, -500.0]);
            positions.push(fix(100 + k, lat, lon));
        }

        let analysis = analyze_day(day(), &positions, &AnalysisParams::default());
        assert_eq!(analysis.zones.len(), 1);
        assert_eq!(analysis.zones[0].point_count, 40);
        assert_eq!(analysis.zones[0].zone_index, 0);
        assert_eq!(analysis.noise_points, 10);
        assert_eq!(analysis.degenerate_clusters, 0);
    }

    #[test]
    fn test_hundred_meter_square() {
        let positions = grid_fixes(0, 11, 11, 10.0);
        let analysis = analyze_day(day(), &positions, &AnalysisParams::default());
        assert_eq!(analysis.zones.len(), 1);
        let zone = &analysis.zones[0];
        assert!((zone.area_m2 - 10_000.0).abs() < 100.0, "{}", zone.area_m2);
        assert!((zone.area_ha() - 1.0).abs() < 0.01);
        assert_eq!(zone.method, ZoneMethod::AlphaShape);
    }

    #[test]
    fn test_boundary_is_closed_lon_lat() {
        let positions = grid_fixes(0, 6, 6, 5.0);
        let analysis = analyze_day(day(), &positions, &AnalysisParams::default());
        let ring = &analysis.zones[0].boundary[0];
        assert_eq!(ring.first(), ring.last());
        for [lon, lat] in ring {
            assert!((lon - LON).abs() < 0.01);
            assert!((lat - LAT).abs() < 0.01);
        }
    }

    #[test]
    fn test_sparse_day_produces_no_zone() {
        let positions = vec![fix(1, LAT, LON), fix(2, LAT + 0.01, LON)];
        let analysis = analyze_day(day(), &positions, &AnalysisParams::default());
        assert!(analysis.zones.is_empty());
        assert_eq!(analysis.noise_points, 2);
        assert!(analyze_day(day(), &[], &AnalysisParams::default()).zones.is_empty());
    }

    #[test]
    fn test_two_fields_are_indexed_in_order() {
        let mut positions = grid_fixes(0, 4, 4, 5.0);
        let proj = LocalProjection::new(LAT, LON);
        for r in 0..5 {
            for c in 0..5 {
                let (lat, lon) = proj.inverse([1000.0 + c as f64 * 5.0, r as f64 * 5.0]);
                positions.push(fix(100 + r * 5 + c, lat, lon));
            }
        }
        let analysis = analyze_day(day(), &positions, &AnalysisParams::default());
        assert_eq!(analysis.zones.len(), 2);
        assert_eq!(analysis.zones[0].point_count, 16);
        assert_eq!(analysis.zones[1].point_count, 25);
        assert_eq!(analysis.zones[1].zone_index, 1);
    }

    fn stored(date: NaiveDate, zone_index: i32, lon: f64, area_m2: f64) -> DailyZone {
        stored_at(date, zone_index, LAT, lon, area_m2)
    }

    fn stored_at(date: NaiveDate, zone_index: i32, lat: f64, lon: f64, area_m2: f64) -> DailyZone {
        let d = 0.0001;
        DailyZone {
            id: 0,
            equipment_id: 1,
            date,
            zone_index,
            area_m2,
            area_ha: area_m2 / 10_000.0,
            boundary: vec![vec![
                [lon - d, lat - d],
                [lon + d, lat - d],
                [lon + d, lat + d],
                [lon - d, lat + d],
                [lon - d, lat - d],
            ]],
            point_count: 10,
            method: ZoneMethod::AlphaShape,
            computed_at: Utc::now(),
        }
    }

    /// Planar area of the square `stored` draws.
    fn square_m2() -> f64 {
        let proj = LocalProjection::new(LAT, LON);
        let [w, _] = proj.forward(LAT, LON + 0.0002);
        let [_, h] = proj.forward(LAT + 0.0002, LON);
        w * h
    }

    #[test]
    fn test_totals_measure_between_days() {
        let next = day().succ_opt().unwrap();
        let third = next.succ_opt().unwrap();
        // Out of order on purpose: days are walked by date.
        let zones = vec![
            stored(third, 0, LON + 0.02, 5_000.0),
            stored(day(), 0, LON, 10_000.0),
            stored(next, 0, LON + 0.01, 2_500.0),
        ];
        let t = totals(&zones);
        assert!((t.total_hectares - 1.75).abs() < 1e-6, "{}", t.total_hectares);
        // Two hops of 0.01 degree of longitude at 45N, ~786 m each.
        assert!((t.distance_between_zones_m - 1572.6).abs() < 5.0, "{}", t.distance_between_zones_m);
    }

    #[test]
    fn test_fields_on_one_day_are_not_a_hop() {
        let next = day().succ_opt().unwrap();
        let zones = vec![
            stored(day(), 0, LON, 10_000.0),
            stored(day(), 1, LON + 0.02, 2_500.0),
            // Sits on the first day's merged centroid.
            stored(next, 0, LON + 0.01, 5_000.0),
        ];
        let t = totals(&zones);
        assert!(t.distance_between_zones_m < 1.0, "{}", t.distance_between_zones_m);
        assert!((t.total_hectares - 1.75).abs() < 1e-6);
        assert!((t.relative_hectares - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_within_a_day_counts_once() {
        let area = square_m2();
        // Shifted by half a side both ways: a quarter of each square is shared.
        let zones = vec![
            stored(day(), 0, LON, area),
            stored_at(day(), 1, LAT + 0.0001, LON + 0.0001, area),
        ];
        let t = totals(&zones);
        let expected = 1.75 * area / M2_PER_HECTARE;
        assert!((t.total_hectares - expected).abs() < expected * 1e-3, "{}", t.total_hectares);
        assert!((t.relative_hectares - t.total_hectares).abs() < 1e-9);
        assert_eq!(t.distance_between_zones_m, 0.0);
    }

    #[test]
    fn test_relative_surface_merges_revisited_ground() {
        let area = square_m2();
        let next = day().succ_opt().unwrap();
        let zones = vec![
            stored(day(), 0, LON, area),
            stored_at(next, 0, LAT + 0.0001, LON + 0.0001, area),
        ];
        let t = totals(&zones);
        assert!((t.total_hectares - 2.0 * area / M2_PER_HECTARE).abs() < 1e-9);
        assert!(t.relative_hectares < t.total_hectares);
        let expected = 1.75 * area / M2_PER_HECTARE;
        assert!((t.relative_hectares - expected).abs() < expected * 1e-3, "{}", t.relative_hectares);
    }

    #[test]
    fn test_totals_empty() {
        assert_eq!(totals(&[]), EquipmentTotals::default());
    }
}
