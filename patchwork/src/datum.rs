//! Conversion between the GCJ-02 and WGS-84 geodetic reference frames.
//!
//! The host grid's coordinates are in GCJ-02 (the datum mandated for maps of China), while
//! the upstream grid is addressed in plain WGS-84. The offset between the two is
//! deterministic and publicly documented; within China it reaches a few hundred meters, so
//! skipping this conversion shifts every composited tile visibly.
//! <https://en.wikipedia.org/wiki/Restrictions_on_geographic_data_in_China>

use crate::{lon_lat, position::Position};
use std::f64::consts::PI;

/// Semi-major axis of the Krasovsky 1940 ellipsoid, on which GCJ-02 is defined.
const A: f64 = 6378245.;

/// First eccentricity squared of the same ellipsoid.
const EE: f64 = 0.00669342162296594323;

/// The obfuscation applies only within this rough bounding box of China.
fn in_china(lon: f64, lat: f64) -> bool {
    (72.004..=137.8347).contains(&lon) && (0.8293..=55.8271).contains(&lat)
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret =
        -100. + 2. * x + 3. * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20. * (6. * x * PI).sin() + 20. * (2. * x * PI).sin()) * 2. / 3.;
    ret += (20. * (y * PI).sin() + 40. * (y / 3. * PI).sin()) * 2. / 3.;
    ret += (160. * (y / 12. * PI).sin() + 320. * (y * PI / 30.).sin()) * 2. / 3.;
    ret
}

fn transform_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300. + x + 2. * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20. * (6. * x * PI).sin() + 20. * (2. * x * PI).sin()) * 2. / 3.;
    ret += (20. * (x * PI).sin() + 40. * (x / 3. * PI).sin()) * 2. / 3.;
    ret += (150. * (x / 12. * PI).sin() + 300. * (x / 30. * PI).sin()) * 2. / 3.;
    ret
}

/// Offset added to a WGS-84 position to obtain its GCJ-02 counterpart.
fn offset(lon: f64, lat: f64) -> (f64, f64) {
    let d_lat = transform_lat(lon - 105., lat - 35.);
    let d_lon = transform_lon(lon - 105., lat - 35.);

    let rad_lat = lat.to_radians();
    let magic = 1. - EE * rad_lat.sin() * rad_lat.sin();
    let sqrt_magic = magic.sqrt();

    (
        (d_lon * 180.) / (A / sqrt_magic * rad_lat.cos() * PI),
        (d_lat * 180.) / ((A * (1. - EE)) / (magic * sqrt_magic) * PI),
    )
}

/// Move a WGS-84 position into the GCJ-02 frame. Positions outside China pass through
/// unchanged.
pub fn wgs84_to_gcj02(position: Position) -> Position {
    let (lon, lat) = (position.x(), position.y());
    if !in_china(lon, lat) {
        return position;
    }
    let (d_lon, d_lat) = offset(lon, lat);
    lon_lat(lon + d_lon, lat + d_lat)
}

/// Move a GCJ-02 position back into the WGS-84 frame, by iteratively inverting
/// [`wgs84_to_gcj02`] until the residual drops below 1e-6 degrees.
pub fn gcj02_to_wgs84(position: Position) -> Position {
    let (lon, lat) = (position.x(), position.y());
    if !in_china(lon, lat) {
        return position;
    }

    let (mut wgs_lon, mut wgs_lat) = (lon, lat);
    loop {
        let forward = wgs84_to_gcj02(lon_lat(wgs_lon, wgs_lat));
        let (dx, dy) = (forward.x() - lon, forward.y() - lat);
        if dx.abs() < 1e-6 && dy.abs() < 1e-6 {
            break;
        }
        wgs_lon -= dx;
        wgs_lat -= dy;
    }
    lon_lat(wgs_lon, wgs_lat)
}
