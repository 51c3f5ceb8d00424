//! Spatial helpers over world-space positions.
//!
//! World space is Y-up; "flat" helpers ignore the Y axis.

use glam::Vec3;

/// Distances below this are treated as zero when normalizing.
pub const DIRECTION_EPSILON: f32 = 0.0001;

/// Euclidean distance between two world positions.
#[must_use]
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

/// Distance between two positions projected onto the XZ plane.
#[must_use]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Returns the unit direction from `from` to `to`, or zero when they coincide.
#[must_use]
pub fn direction_to(from: Vec3, to: Vec3) -> Vec3 {
    let delta = to - from;
    let len = delta.length();
    if len < DIRECTION_EPSILON {
        Vec3::ZERO
    } else {
        delta / len
    }
}

/// Yaw (radians, around +Y) that looks along `direction`.
///
/// Returns `None` for a direction with no horizontal component.
#[must_use]
pub fn yaw_of(direction: Vec3) -> Option<f32> {
    if direction.x.abs() < DIRECTION_EPSILON && direction.z.abs() < DIRECTION_EPSILON {
        None
    } else {
        Some(direction.x.atan2(direction.z))
    }
}

/// Moves `from` toward `to` by at most `max_step`, never overshooting.
#[must_use]
pub fn step_toward(from: Vec3, to: Vec3, max_step: f32) -> Vec3 {
    let delta = to - from;
    let len = delta.length();
    if len <= max_step || len < DIRECTION_EPSILON {
        to
    } else {
        from + delta / len * max_step
    }
}

/// Picks a point in the axis-aligned square of half-size `radius` around
/// `center` on the XZ plane, at height `height`.
#[must_use]
pub fn random_point_in_square(rng: &mut fastrand::Rng, center: Vec3, radius: f32, height: f32) -> Vec3 {
    let r = radius.max(0.0);
    let x = center.x + (rng.f32() * 2.0 - 1.0) * r;
    let z = center.z + (rng.f32() * 2.0 - 1.0) * r;
    Vec3::new(x, height, z)
}

/// Picks a point uniformly inside a disc of `radius` around `center` (XZ plane).
#[must_use]
pub fn random_point_in_disc(rng: &mut fastrand::Rng, center: Vec3, radius: f32) -> Vec3 {
    let angle = rng.f32() * std::f32::consts::TAU;
    let dist = rng.f32().sqrt() * radius.max(0.0);
    Vec3::new(center.x + angle.cos() * dist, center.y, center.z + angle.sin() * dist)
}
