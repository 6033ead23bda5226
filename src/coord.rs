//! Coordinate systems and transforms.
//!
//! Antenna positions live on the RD ("Rijksdriehoek") projected grid, the
//! planar system all distance math runs on. Geodetic input and output is
//! WGS84, carried as a [`geo::Point`] with longitude in `x` and latitude in
//! `y`.
//!
//! Two transform strategies are provided and kept consistent to well under a
//! metre inside the RD coverage area:
//!
//! - [`RdPoint::wgs84`] / [`RdPoint::from_wgs84`] run the full chain: the
//!   double stereographic RD projection on the Bessel 1841 ellipsoid plus a
//!   seven-parameter datum shift to ETRS89 (indistinguishable from WGS84 at
//!   this accuracy).
//! - [`RdPoint::wgs84_approx`] / [`RdPoint::from_wgs84_approx`] evaluate the
//!   published polynomial fits. They are cheap enough to run per row during
//!   bulk export; consumers of exported data must treat those positions as
//!   approximate.

use std::f64::consts::FRAC_PI_2;

use geo::Point;

/// A position on the RD grid, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RdPoint {
    pub x: f64,
    pub y: f64,
}

// Bessel 1841, the ellipsoid carrying the RD datum.
const BESSEL_A: f64 = 6_377_397.155;
const BESSEL_F: f64 = 1.0 / 299.152_812_8;

// GRS80 carries ETRS89.
const GRS80_A: f64 = 6_378_137.0;
const GRS80_F: f64 = 1.0 / 298.257_222_101;

// Amersfoort, the projection centre: false origin, geographic position on
// Bessel, and the scale reduction at the centre.
const X0: f64 = 155_000.0;
const Y0: f64 = 463_000.0;
const PHI0_DEG: f64 = 52.156_160_555_555_56;
const LAM0_DEG: f64 = 5.387_638_888_888_889;
const SCALE: f64 = 0.999_907_9;

// Bessel -> ETRS89, position-vector convention. Translations in metres,
// rotations in arcseconds, scale in ppm.
const TX: f64 = 565.2369;
const TY: f64 = 50.0087;
const TZ: f64 = 465.658;
const RX_AS: f64 = -0.406_857;
const RY_AS: f64 = 0.350_733;
const RZ_AS: f64 = -1.870_35;
const DS_PPM: f64 = 4.0812;

// Base point and scaling of the polynomial fits: the geodetic position of
// the false origin.
const LAT_BASE: f64 = 52.155_174_40;
const LON_BASE: f64 = 5.387_206_21;

impl RdPoint {
    pub fn new(x: f64, y: f64) -> RdPoint {
        RdPoint { x, y }
    }

    /// Euclidean distance on the grid plane, in metres.
    pub fn distance(&self, other: &RdPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// The point displaced by the given number of metres east and north.
    pub fn move_by(&self, east_m: f64, north_m: f64) -> RdPoint {
        RdPoint::new(self.x + east_m, self.y + north_m)
    }

    /// Exact transform to WGS84.
    pub fn wgs84(&self) -> Point {
        let sphere = Sphere::amersfoort();
        let (phi, lam) = sphere.unproject(*self);
        let cartesian = geodetic_to_cartesian(BESSEL_A, BESSEL_F, phi, lam);
        let cartesian = helmert_to_etrs(cartesian);
        let (phi, lam) = cartesian_to_geodetic(GRS80_A, GRS80_F, cartesian);
        Point::new(lam.to_degrees(), phi.to_degrees())
    }

    /// Exact transform from WGS84.
    pub fn from_wgs84(p: Point) -> RdPoint {
        let cartesian = geodetic_to_cartesian(GRS80_A, GRS80_F, p.y().to_radians(), p.x().to_radians());
        let cartesian = helmert_to_bessel(cartesian);
        let (phi, lam) = cartesian_to_geodetic(BESSEL_A, BESSEL_F, cartesian);
        Sphere::amersfoort().project(phi, lam)
    }

    /// Polynomial approximation of [`RdPoint::wgs84`].
    pub fn wgs84_approx(&self) -> Point {
        let dx = (self.x - X0) * 1e-5;
        let dy = (self.y - Y0) * 1e-5;

        let lat_sec = 3235.65389 * dy
            - 32.58297 * dx * dx
            - 0.2475 * dy * dy
            - 0.84978 * dx * dx * dy
            - 0.0655 * dy.powi(3)
            - 0.01709 * dx * dx * dy * dy
            - 0.00738 * dx
            + 0.0053 * dx.powi(4)
            - 0.00039 * dx * dx * dy.powi(3)
            + 0.00033 * dx.powi(4) * dy
            - 0.00012 * dx * dy;
        let lon_sec = 5260.52916 * dx
            + 105.94684 * dx * dy
            + 2.45656 * dx * dy * dy
            - 0.81885 * dx.powi(3)
            + 0.05594 * dx * dy.powi(3)
            - 0.05607 * dx.powi(3) * dy
            + 0.01199 * dy
            - 0.00256 * dx.powi(3) * dy * dy
            + 0.00128 * dx * dy.powi(4)
            + 0.00022 * dy * dy
            - 0.00022 * dx * dx
            + 0.00026 * dx.powi(5);

        Point::new(LON_BASE + lon_sec / 3600.0, LAT_BASE + lat_sec / 3600.0)
    }

    /// Polynomial approximation of [`RdPoint::from_wgs84`].
    pub fn from_wgs84_approx(p: Point) -> RdPoint {
        let dphi = 0.36 * (p.y() - LAT_BASE);
        let dlam = 0.36 * (p.x() - LON_BASE);

        let x = X0 + 190_094.945 * dlam
            - 11_832.228 * dphi * dlam
            - 114.221 * dphi * dphi * dlam
            - 32.391 * dlam.powi(3)
            - 0.705 * dphi
            - 2.340 * dphi.powi(3) * dlam
            - 0.608 * dphi * dlam.powi(3)
            - 0.008 * dlam * dlam
            + 0.148 * dphi * dphi * dlam.powi(3);
        let y = Y0 + 309_056.544 * dphi
            + 3_638.893 * dlam * dlam
            + 73.077 * dphi * dphi
            - 157.984 * dphi * dlam * dlam
            + 59.788 * dphi.powi(3)
            + 0.433 * dlam
            - 6.439 * dphi * dphi * dlam * dlam
            - 0.032 * dphi * dlam
            + 0.092 * dlam.powi(4)
            - 0.054 * dphi * dlam.powi(4);

        RdPoint::new(x, y)
    }
}

/// The Gaussian sphere of the double stereographic projection, with the
/// derived constants of the Amersfoort centre.
struct Sphere {
    e: f64,
    n: f64,
    m: f64,
    radius: f64,
    /// Latitude of the projection centre on the sphere.
    phi0: f64,
    lam0: f64,
}

impl Sphere {
    fn amersfoort() -> Sphere {
        let e2 = BESSEL_F * (2.0 - BESSEL_F);
        let e = e2.sqrt();
        let phi0 = PHI0_DEG.to_radians();
        let (sin0, cos0) = phi0.sin_cos();

        let rm = BESSEL_A * (1.0 - e2) / (1.0 - e2 * sin0 * sin0).powf(1.5);
        let rn = BESSEL_A / (1.0 - e2 * sin0 * sin0).sqrt();
        let radius = (rm * rn).sqrt();

        let n = (1.0 + e2 * cos0.powi(4) / (1.0 - e2)).sqrt();
        let phi0_sphere = (sin0 / n).asin();
        let m = phi0_sphere.sin().atanh() - n * isometric(phi0, e);

        Sphere {
            e,
            n,
            m,
            radius,
            phi0: phi0_sphere,
            lam0: LAM0_DEG.to_radians(),
        }
    }

    /// Bessel geographic coordinates to the RD plane.
    fn project(&self, phi: f64, lam: f64) -> RdPoint {
        let w = self.n * isometric(phi, self.e) + self.m;
        let phi_s = 2.0 * w.exp().atan() - FRAC_PI_2;
        let dlam = self.n * (lam - self.lam0);

        let (sin_phi, cos_phi) = phi_s.sin_cos();
        let (sin0, cos0) = self.phi0.sin_cos();
        let den = 1.0 + sin0 * sin_phi + cos0 * cos_phi * dlam.cos();
        let k = 2.0 * SCALE * self.radius / den;

        RdPoint::new(
            X0 + k * cos_phi * dlam.sin(),
            Y0 + k * (cos0 * sin_phi - sin0 * cos_phi * dlam.cos()),
        )
    }

    /// RD plane back to Bessel geographic coordinates.
    fn unproject(&self, p: RdPoint) -> (f64, f64) {
        let dx = p.x - X0;
        let dy = p.y - Y0;
        let r = dx.hypot(dy);

        let (sin0, cos0) = self.phi0.sin_cos();
        let (phi_s, dlam) = if r == 0.0 {
            (self.phi0, 0.0)
        } else {
            let psi = 2.0 * (r / (2.0 * SCALE * self.radius)).atan();
            let alpha = dx.atan2(dy);
            let (sin_psi, cos_psi) = psi.sin_cos();
            let sin_phi = sin0 * cos_psi + cos0 * sin_psi * alpha.cos();
            let dlam = (alpha.sin() * sin_psi * cos0).atan2(cos_psi - sin0 * sin_phi);
            (sin_phi.asin(), dlam)
        };

        let q = (phi_s.sin().atanh() - self.m) / self.n;
        // invert the isometric latitude by fixed-point iteration
        let mut phi = 2.0 * q.exp().atan() - FRAC_PI_2;
        for _ in 0..12 {
            let next = 2.0 * (q + self.e * (self.e * phi.sin()).atanh()).exp().atan() - FRAC_PI_2;
            if (next - phi).abs() < 1e-13 {
                phi = next;
                break;
            }
            phi = next;
        }

        (phi, self.lam0 + dlam / self.n)
    }
}

/// Isometric latitude on an ellipsoid with first eccentricity `e`.
fn isometric(phi: f64, e: f64) -> f64 {
    phi.sin().atanh() - e * (e * phi.sin()).atanh()
}

fn geodetic_to_cartesian(a: f64, f: f64, phi: f64, lam: f64) -> [f64; 3] {
    let e2 = f * (2.0 - f);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    [
        n * cos_phi * lam.cos(),
        n * cos_phi * lam.sin(),
        n * (1.0 - e2) * sin_phi,
    ]
}

fn cartesian_to_geodetic(a: f64, f: f64, [x, y, z]: [f64; 3]) -> (f64, f64) {
    let e2 = f * (2.0 - f);
    let lam = y.atan2(x);
    let p = x.hypot(y);

    let mut phi = z.atan2(p * (1.0 - e2));
    for _ in 0..12 {
        let n = a / (1.0 - e2 * phi.sin() * phi.sin()).sqrt();
        let next = (z + e2 * n * phi.sin()).atan2(p);
        if (next - phi).abs() < 1e-13 {
            phi = next;
            break;
        }
        phi = next;
    }

    (phi, lam)
}

const ARCSEC: f64 = std::f64::consts::PI / (180.0 * 3600.0);

fn helmert_to_etrs([x, y, z]: [f64; 3]) -> [f64; 3] {
    let (rx, ry, rz) = (RX_AS * ARCSEC, RY_AS * ARCSEC, RZ_AS * ARCSEC);
    let s = 1.0 + DS_PPM * 1e-6;
    [
        TX + s * (x - rz * y + ry * z),
        TY + s * (rz * x + y - rx * z),
        TZ + s * (-ry * x + rx * y + z),
    ]
}

fn helmert_to_bessel([x, y, z]: [f64; 3]) -> [f64; 3] {
    let (rx, ry, rz) = (RX_AS * ARCSEC, RY_AS * ARCSEC, RZ_AS * ARCSEC);
    let s = 1.0 + DS_PPM * 1e-6;
    let (xc, yc, zc) = ((x - TX) / s, (y - TY) / s, (z - TZ) / s);
    [
        xc + rz * yc - ry * zc,
        -rz * xc + yc + rx * zc,
        ry * xc - rx * yc + zc,
    ]
}
