//! Shared patrol routes.
//!
//! A route is loaded once and then only read. Entities hold a cheap clone of
//! the shared slice plus their own cursor into it.

use std::sync::Arc;

use glam::Vec3;

/// Ordered, immutable waypoint sequence shared by many entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatrolRoute {
    points: Arc<[Vec3]>,
}

impl PatrolRoute {
    /// Creates a route from waypoints.
    #[must_use]
    pub fn new(points: impl Into<Arc<[Vec3]>>) -> Self {
        Self {
            points: points.into(),
        }
    }

    /// A route with no waypoints.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns whether the route has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Waypoint at `index`, wrapping around the end.
    #[must_use]
    pub fn waypoint(&self, index: usize) -> Option<Vec3> {
        if self.points.is_empty() {
            None
        } else {
            Some(self.points[index % self.points.len()])
        }
    }

    /// Index following `index`, wrapping to zero.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        if self.points.is_empty() {
            0
        } else {
            (index + 1) % self.points.len()
        }
    }

    /// All waypoints.
    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Returns whether both routes share the same storage.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.points, &other.points)
    }
}

impl From<Vec<Vec3>> for PatrolRoute {
    fn from(points: Vec<Vec3>) -> Self {
        Self::new(points)
    }
}
