//! Bounding boxes and the one reprojection of a layer extent into WGS84

use proj4rs::Proj;
use serde::Deserialize;
use std::fmt;

pub const WGS84: u16 = 4326;

/// ESRI codes for web mercator that predate EPSG:3857
const WEB_MERCATOR_ALIASES: &[u32] = &[102100, 102113, 900913];

/// Rectangle in degrees, `xmin <= xmax` and `ymin <= ymax`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }

    /// Smallest box containing every point
    pub fn envelope(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.xmin.min(x), b.ymin.min(y), b.xmax.max(x), b.ymax.max(y)),
            })
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.xmin / 2.0 + self.xmax / 2.0, self.ymin / 2.0 + self.ymax / 2.0)
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.xmin, self.ymin),
            (self.xmin, self.ymax),
            (self.xmax, self.ymax),
            (self.xmax, self.ymin),
        ]
    }

    /// Split at `(x, y)` into lower-left, lower-right, upper-left and
    /// upper-right quadrants, in that order
    pub fn quadrants(&self, x: f64, y: f64) -> [BoundingBox; 4] {
        [
            Self::new(self.xmin, self.ymin, x, y),
            Self::new(x, self.ymin, self.xmax, y),
            Self::new(self.xmin, y, x, self.ymax),
            Self::new(x, y, self.xmax, self.ymax),
        ]
    }

    /// `xmin,ymin,xmax,ymax` as an ESRI envelope parameter
    pub fn to_envelope_param(&self) -> String {
        format!("{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    pub wkid: Option<u32>,
    pub latest_wkid: Option<u32>,
}

impl SpatialReference {
    /// EPSG code for this reference. `latestWkid` wins over `wkid`, and the
    /// ESRI web mercator aliases map to 3857.
    pub fn epsg_code(&self) -> Option<u32> {
        let code = self.latest_wkid.or(self.wkid)?;
        if WEB_MERCATOR_ALIASES.contains(&code) {
            Some(3857)
        } else {
            Some(code)
        }
    }
}

/// Reproject a box from `epsg` into WGS84 and take the envelope of its
/// transformed corners.
pub fn to_wgs84(bbox: &BoundingBox, epsg: u32) -> Result<BoundingBox, String> {
    if epsg == u32::from(WGS84) {
        return Ok(*bbox);
    }

    let code = u16::try_from(epsg).map_err(|_| format!("unsupported spatial reference {}", epsg))?;
    let source = Proj::from_epsg_code(code)
        .map_err(|e| format!("unsupported spatial reference {}: {}", epsg, e))?;
    let target = Proj::from_epsg_code(WGS84).map_err(|e| e.to_string())?;

    let mut transformed = Vec::with_capacity(4);
    for (x, y) in bbox.corners() {
        let mut point = if source.is_latlong() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&source, &target, &mut point)
            .map_err(|e| format!("could not reproject extent from {}: {}", epsg, e))?;
        transformed.push((point.0.to_degrees(), point.1.to_degrees()));
    }

    BoundingBox::envelope(transformed).ok_or_else(|| "empty extent".to_string())
}
