//! Angles and bearings on the grid plane.

use std::f64::consts::{PI, TAU};

use crate::coord::RdPoint;

/// An angle, stored in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    pub fn from_radians(radians: f64) -> Angle {
        Angle { radians }
    }

    pub fn from_degrees(degrees: f64) -> Angle {
        Angle {
            radians: degrees.to_radians(),
        }
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    /// True for the degenerate bearing of a point with itself.
    pub fn is_undefined(&self) -> bool {
        self.radians.is_nan()
    }

    /// The same direction expressed in (-180°, 180°].
    ///
    /// The branch point sits at +180°; callers comparing angles near it
    /// should stay 1e-10 rad clear of the boundary.
    pub fn normalized(self) -> Angle {
        let mut r = self.radians.rem_euclid(TAU);
        if r > PI {
            r -= TAU;
        }
        Angle { radians: r }
    }
}

/// Bearing from `from` to `to`: 0 at grid north, increasing clockwise,
/// normalized to (-180°, 180°]. Undefined (NaN) when the points coincide.
pub fn azimuth(from: &RdPoint, to: &RdPoint) -> Angle {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0.0 && dy == 0.0 {
        return Angle::from_radians(f64::NAN);
    }
    Angle::from_radians(dx.atan2(dy)).normalized()
}
