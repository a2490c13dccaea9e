//! Opaque geometries and the spatial collaborator used to combine them.
//!
//! Geometries are carried as WKT text with an optional SRID; this crate never
//! parses them. Combining areas from several matching rules is delegated to a
//! [`GeometryOps`] implementation supplied by the host.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srid: Option<u32>,
    pub wkt: String,
}

impl Geometry {
    pub fn new(wkt: impl Into<String>) -> Self {
        Self {
            srid: None,
            wkt: wkt.into(),
        }
    }

    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = Some(srid);
        self
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.srid {
            Some(srid) => write!(f, "SRID={srid};{}", self.wkt),
            None => f.write_str(&self.wkt),
        }
    }
}

/// Spatial set operations needed when several rules restrict the same layer.
pub trait GeometryOps: Send + Sync {
    /// Area allowed by both inputs. LIMIT rules narrow access this way.
    fn intersection(&self, a: &Geometry, b: &Geometry) -> AuthzResult<Geometry>;

    /// Area allowed by either input. Multiple ALLOW rules widen access this way.
    fn union(&self, a: &Geometry, b: &Geometry) -> AuthzResult<Geometry>;
}

/// Collaborator for hosts without a geometry library.
///
/// Any attempt to combine two areas fails; single-area answers never reach it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGeometryOps;

impl GeometryOps for UnsupportedGeometryOps {
    fn intersection(&self, _a: &Geometry, _b: &Geometry) -> AuthzResult<Geometry> {
        Err(AuthzError::Geometry(
            "no geometry engine configured for intersection".to_string(),
        ))
    }

    fn union(&self, _a: &Geometry, _b: &Geometry) -> AuthzResult<Geometry> {
        Err(AuthzError::Geometry(
            "no geometry engine configured for union".to_string(),
        ))
    }
}
