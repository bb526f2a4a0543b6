use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::Point;

/// Tolerance for the boundary-inclusive containment test.
const EDGE_EPSILON: f64 = 1e-6;

/// Which inclusion policy a region applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    All,
    Line,
    Area,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::All => "all",
            RegionKind::Line => "line",
            RegionKind::Area => "area",
        }
    }
}

/// The spatial test deciding which detections may count.
///
/// Regions are immutable values. Reconfiguration builds a new region and swaps it in
/// whole; the hull of an area is derived once, here, not per frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InclusionRegion {
    /// Every detection is included.
    #[default]
    WholeFrame,
    /// Detections whose reference point lies inside or on the hull.
    Area(ConvexHull),
    /// Detections whose reference point moves from strictly above the line to at or
    /// below it between two consecutive sightings of the same track.
    Line { y: f32 },
}

impl InclusionRegion {
    /// Area region from at least three vertices, in any order.
    pub fn area(vertices: &[Point]) -> Result<Self> {
        Ok(InclusionRegion::Area(ConvexHull::from_vertices(vertices)?))
    }

    pub fn line(y: f32) -> Result<Self> {
        if !y.is_finite() {
            return Err(anyhow!("line ordinate must be finite"));
        }
        Ok(InclusionRegion::Line { y })
    }

    pub fn kind(&self) -> RegionKind {
        match self {
            InclusionRegion::WholeFrame => RegionKind::All,
            InclusionRegion::Area(_) => RegionKind::Area,
            InclusionRegion::Line { .. } => RegionKind::Line,
        }
    }

    /// Decide whether `point` is included.
    ///
    /// `last_y` is the previous ordinate recorded for the same track, if any. Only the
    /// line policy consults it; a track with no history never crosses on first sight.
    pub fn includes(&self, point: Point, last_y: Option<f32>) -> bool {
        match self {
            InclusionRegion::WholeFrame => true,
            InclusionRegion::Area(hull) => hull.contains(point),
            InclusionRegion::Line { y } => match last_y {
                Some(prev) => prev < *y && *y <= point.y,
                None => false,
            },
        }
    }
}

/// Convex hull of a configured polygon, stored counter-clockwise (in y-up terms)
/// without collinear vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexHull {
    vertices: Vec<Point>,
}

impl ConvexHull {
    pub fn from_vertices(points: &[Point]) -> Result<Self> {
        if points.len() < 3 {
            return Err(anyhow!(
                "area needs at least 3 vertices (got {})",
                points.len()
            ));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(anyhow!("area vertices must be finite"));
        }

        let mut sorted: Vec<Point> = points.to_vec();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup();

        // Andrew's monotone chain.
        let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
        for &p in &sorted {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(p);
        }
        let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
        for &p in sorted.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);

        if lower.len() < 3 {
            return Err(anyhow!("area vertices are collinear; hull has no interior"));
        }
        Ok(Self { vertices: lower })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Boundary-inclusive point-in-hull test.
    pub fn contains(&self, point: Point) -> bool {
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            cross(a, b, point) >= -EDGE_EPSILON
        })
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    let (ox, oy) = (o.x as f64, o.y as f64);
    (a.x as f64 - ox) * (b.y as f64 - oy) - (a.y as f64 - oy) * (b.x as f64 - ox)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f32, f32)]) -> Vec<Point> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn hull_is_independent_of_vertex_order() {
        let a = ConvexHull::from_vertices(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]))
            .unwrap();
        let b = ConvexHull::from_vertices(&pts(&[(10.0, 10.0), (0.0, 0.0), (0.0, 10.0), (10.0, 0.0)]))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.vertices().len(), 4);
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let hull = ConvexHull::from_vertices(&pts(&[
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (5.0, 5.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]))
        .unwrap();
        assert_eq!(hull.vertices().len(), 4);
    }

    #[test]
    fn containment_is_boundary_inclusive() {
        let hull = ConvexHull::from_vertices(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]))
            .unwrap();
        assert!(hull.contains(Point::new(5.0, 5.0)));
        assert!(hull.contains(Point::new(10.0, 5.0)));
        assert!(hull.contains(Point::new(0.0, 0.0)));
        assert!(!hull.contains(Point::new(10.5, 5.0)));
        assert!(!hull.contains(Point::new(5.0, -0.1)));
    }

    #[test]
    fn trapezoid_from_field_setup() {
        let region = InclusionRegion::area(&pts(&[
            (250.0, 130.0),
            (470.0, 130.0),
            (800.0, 400.0),
            (70.0, 400.0),
        ]))
        .unwrap();
        assert_eq!(region.kind(), RegionKind::Area);
        assert!(region.includes(Point::new(400.0, 300.0), None));
        assert!(!region.includes(Point::new(100.0, 140.0), None));
    }

    #[test]
    fn degenerate_areas_are_rejected() {
        assert!(ConvexHull::from_vertices(&pts(&[(0.0, 0.0), (1.0, 1.0)])).is_err());
        assert!(ConvexHull::from_vertices(&pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)])).is_err());
        assert!(ConvexHull::from_vertices(&pts(&[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (1.0, 0.0)])).is_err());
    }

    #[test]
    fn line_requires_history_and_downward_crossing() {
        let line = InclusionRegion::line(300.0).unwrap();
        assert!(!line.includes(Point::new(0.0, 320.0), None));
        assert!(line.includes(Point::new(0.0, 320.0), Some(280.0)));
        assert!(line.includes(Point::new(0.0, 300.0), Some(299.0)));
        assert!(!line.includes(Point::new(0.0, 320.0), Some(300.0)));
        assert!(!line.includes(Point::new(0.0, 280.0), Some(320.0)));
        assert!(InclusionRegion::line(f32::INFINITY).is_err());
    }

    #[test]
    fn whole_frame_includes_everything() {
        let region = InclusionRegion::default();
        assert_eq!(region.kind(), RegionKind::All);
        assert!(region.includes(Point::new(-1e6, 1e6), None));
    }
}
