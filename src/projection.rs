//! Coordinate reprojection between the geographic storage CRS and the
//! planar working CRS, backed by proj4rs (pure Rust).

use geo::{Coord, MapCoords, MultiPolygon, Polygon};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{PipelineError, Result};

/// WGS84 Geographic (longitude/latitude in degrees)
pub const EPSG_WGS84: u32 = 4326;
/// Web Mercator
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Build a proj string for the EPSG codes this pipeline works with.
///
/// Covers WGS84, Web Mercator and the WGS84 UTM zones (326xx north, 327xx south).
pub fn proj_string(epsg: u32) -> Option<String> {
    match epsg {
        EPSG_WGS84 => Some("+proj=longlat +datum=WGS84 +no_defs".to_string()),
        EPSG_WEB_MERCATOR => Some(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                .to_string(),
        ),
        32601..=32660 => Some(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            epsg - 32600
        )),
        32701..=32760 => Some(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            epsg - 32700
        )),
        _ => None,
    }
}

pub fn is_geographic(epsg: u32) -> bool {
    epsg == EPSG_WGS84
}

struct ProjPair {
    source: Proj,
    target: Proj,
}

/// Reusable transformer between two CRS identified by EPSG codes.
///
/// Geographic coordinates are in degrees on both sides; the radian
/// conversion proj4rs needs is handled internally.
pub struct CoordTransformer {
    projs: Option<ProjPair>,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for CoordTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordTransformer")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .field("identity", &self.projs.is_none())
            .finish()
    }
}

impl CoordTransformer {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            return Ok(Self::identity_for(source_epsg));
        }

        let source = Self::build_proj(source_epsg)?;
        let target = Self::build_proj(target_epsg)?;

        Ok(Self {
            projs: Some(ProjPair { source, target }),
            source_epsg,
            target_epsg,
        })
    }

    /// A transformer that leaves coordinates untouched
    pub fn identity() -> Self {
        Self::identity_for(EPSG_WGS84)
    }

    fn identity_for(epsg: u32) -> Self {
        Self {
            projs: None,
            source_epsg: epsg,
            target_epsg: epsg,
        }
    }

    fn build_proj(epsg: u32) -> Result<Proj> {
        let defn = proj_string(epsg)
            .ok_or_else(|| PipelineError::Projection(format!("EPSG:{} not supported", epsg)))?;
        Proj::from_proj_string(&defn)
            .map_err(|e| PipelineError::Projection(format!("invalid EPSG:{}: {:?}", epsg, e)))
    }

    /// The inverse direction of this transformer
    pub fn inverse(&self) -> Result<Self> {
        if self.projs.is_none() {
            return Ok(Self::identity_for(self.target_epsg));
        }
        Self::new(self.target_epsg, self.source_epsg)
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    pub fn is_identity(&self) -> bool {
        self.projs.is_none()
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some(pair) = &self.projs else {
            return Ok(coord);
        };

        let (in_x, in_y) = if is_geographic(self.source_epsg) {
            (coord.x.to_radians(), coord.y.to_radians())
        } else {
            (coord.x, coord.y)
        };

        let mut point = (in_x, in_y, 0.0);
        transform(&pair.source, &pair.target, &mut point).map_err(|e| {
            PipelineError::Projection(format!(
                "transform ({}, {}) EPSG:{} -> EPSG:{} failed: {:?}",
                coord.x, coord.y, self.source_epsg, self.target_epsg, e
            ))
        })?;

        let (x, y) = if is_geographic(self.target_epsg) {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        Ok(Coord { x, y })
    }

    pub fn transform_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        if self.is_identity() {
            return Ok(polygon.clone());
        }
        polygon.try_map_coords(|c| self.transform_coord(c))
    }

    pub fn transform_multi_polygon(&self, geom: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        if self.is_identity() {
            return Ok(geom.clone());
        }
        geom.try_map_coords(|c| self.transform_coord(c))
    }
}
