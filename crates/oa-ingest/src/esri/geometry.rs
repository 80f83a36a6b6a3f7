//! ESRI JSON geometries
//!
//! Features arrive with geometry in ESRI's own encoding. Each one is turned
//! into a [`geo`] geometry to compute a representative point and a WKT
//! string for the output table.

use crate::error::GeometryError;
use geo::{BoundingRect, Centroid, Coord, Geometry, LineString, MultiLineString, MultiPoint, Point, Polygon};
use serde_json::Value;
use wkt::ToWkt;

/// Decimal places kept for derived coordinates
pub const COORDINATE_PRECISION: i32 = 7;

pub const POINT: &str = "esriGeometryPoint";
pub const MULTIPOINT: &str = "esriGeometryMultipoint";
pub const POLYGON: &str = "esriGeometryPolygon";
pub const POLYLINE: &str = "esriGeometryPolyline";

/// A feature's representative point and its geometry as WKT
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub x: f64,
    pub y: f64,
    pub wkt: String,
}

/// Build a geometry from the ESRI encoding named by `geometry_type`.
///
/// Polygon rings are taken in order, the first as the exterior.
pub fn build_geometry(geometry_type: &str, geometry: Option<&Value>) -> Result<Geometry<f64>, GeometryError> {
    let geometry = match geometry {
        Some(Value::Null) | None => return Err(GeometryError::Missing),
        Some(g) => g,
    };

    match geometry_type {
        POINT => {
            let (x, y) = match (geometry.get("x"), geometry.get("y")) {
                (Some(Value::Null), _) | (_, Some(Value::Null)) => return Err(GeometryError::Empty),
                (Some(x), Some(y)) => (number(x)?, number(y)?),
                _ => return Err(GeometryError::Malformed("point without x/y".to_string())),
            };
            Ok(Geometry::Point(Point::new(x, y)))
        },
        MULTIPOINT => {
            let points = coordinates(member(geometry, "points")?)?;
            if points.is_empty() {
                return Err(GeometryError::Empty);
            }
            Ok(Geometry::MultiPoint(MultiPoint::from(
                points.into_iter().map(Point::from).collect::<Vec<_>>(),
            )))
        },
        POLYGON => {
            let mut rings = lists(member(geometry, "rings")?)?
                .into_iter()
                .map(|ring| coordinates(ring).map(LineString::new))
                .collect::<Result<Vec<_>, _>>()?;
            if rings.is_empty() {
                return Err(GeometryError::Empty);
            }
            let exterior = rings.remove(0);
            Ok(Geometry::Polygon(Polygon::new(exterior, rings)))
        },
        POLYLINE => {
            let paths = lists(member(geometry, "paths")?)?
                .into_iter()
                .map(|path| coordinates(path).map(LineString::new))
                .collect::<Result<Vec<_>, _>>()?;
            if paths.is_empty() {
                return Err(GeometryError::Empty);
            }
            Ok(Geometry::MultiLineString(MultiLineString::new(paths)))
        },
        other => Err(GeometryError::Unsupported(other.to_string())),
    }
}

/// Centroid of a geometry.
///
/// Fails with [`GeometryError::Degenerate`] for polygons with a ring too
/// short to enclose anything, and for geometries without a centroid.
pub fn centroid(geometry: &Geometry<f64>) -> Result<Point<f64>, GeometryError> {
    if let Geometry::Polygon(polygon) = geometry {
        let short_ring = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .any(|ring| ring.0.len() < 4);
        if short_ring {
            return Err(GeometryError::Degenerate);
        }
    }

    geometry.centroid().ok_or(GeometryError::Degenerate)
}

/// Representative point and WKT for an ESRI geometry. Degenerate shapes use
/// the midpoint of their bounding box.
pub fn locate(geometry_type: &str, geometry: Option<&Value>) -> Result<Located, GeometryError> {
    let geometry = build_geometry(geometry_type, geometry)?;

    let point = match centroid(&geometry) {
        Ok(point) => point,
        Err(GeometryError::Degenerate) => {
            let rect = geometry.bounding_rect().ok_or(GeometryError::Empty)?;
            Point::from(rect.center())
        },
        Err(e) => return Err(e),
    };

    Ok(Located {
        x: round(point.x()),
        y: round(point.y()),
        wkt: geometry.wkt_string(),
    })
}

pub fn round(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() / scale
}

fn member<'a>(geometry: &'a Value, key: &str) -> Result<&'a Value, GeometryError> {
    geometry
        .get(key)
        .ok_or_else(|| GeometryError::Malformed(format!("missing '{}'", key)))
}

fn number(value: &Value) -> Result<f64, GeometryError> {
    value
        .as_f64()
        .ok_or_else(|| GeometryError::Malformed(format!("not a number: {}", value)))
}

fn lists(value: &Value) -> Result<&Vec<Value>, GeometryError> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::Malformed("expected an array".to_string()))
}

/// `[[x, y, ...], ...]` into coordinates. Z and M values are dropped.
fn coordinates(value: &Value) -> Result<Vec<Coord<f64>>, GeometryError> {
    lists(value)?
        .iter()
        .map(|pair| {
            let pair = lists(pair)?;
            match (pair.first(), pair.get(1)) {
                (Some(x), Some(y)) => Ok(Coord { x: number(x)?, y: number(y)? }),
                _ => Err(GeometryError::Malformed("coordinate needs x and y".to_string())),
            }
        })
        .collect()
}
