//! Movement backends.
//!
//! The state machine moves an entity through the `MovementBackend` trait and
//! never learns which variant it is talking to. Two variants exist:
//! - `DirectController`: steps straight at the destination every tick
//! - `PathfindingAgent`: asks a `NavMesh` for a route and walks it
//!
//! The backend is picked once, when the entity is built, by `select_backend`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use skirmish_common::{direction_to, distance, step_toward, yaw_of};

/// Destinations closer than this are the same destination.
const SAME_DESTINATION_EPSILON: f32 = 0.001;

/// Movement errors.
#[derive(Debug, Clone, Error)]
pub enum MovementError {
    /// Neither the requested backend nor its fallback can be built
    #[error("no movement backend available (requested {requested:?})")]
    Unavailable {
        /// Mode asked for in configuration
        requested: MovementMode,
    },
}

/// Result type for movement operations.
pub type MovementResult<T> = Result<T, MovementError>;

/// Which movement strategy an entity is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    /// Direct per-tick displacement
    #[default]
    DirectController,
    /// Route planning through a navigation mesh
    PathfindingAgent,
}

impl MovementMode {
    /// The other variant.
    #[must_use]
    pub const fn alternate(self) -> Self {
        match self {
            Self::DirectController => Self::PathfindingAgent,
            Self::PathfindingAgent => Self::DirectController,
        }
    }
}

/// World transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    /// World position
    pub position: Vec3,
    /// Facing around +Y in radians
    pub yaw: f32,
}

impl Body {
    /// Creates a body at `position` facing +Z.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self { position, yaw: 0.0 }
    }

    /// Turns to look along `direction` if it has a horizontal component.
    pub fn face(&mut self, direction: Vec3) {
        if let Some(yaw) = yaw_of(direction) {
            self.yaw = yaw;
        }
    }
}

/// Abstract movement contract used by the state machine.
pub trait MovementBackend: fmt::Debug + Send {
    /// Which variant this is (for diagnostics only).
    fn mode(&self) -> MovementMode;

    /// Sets travel speed in units per second.
    fn set_speed(&mut self, speed: f32);

    /// Current travel speed.
    fn speed(&self) -> f32;

    /// Heads for `point` and advances one tick.
    fn move_toward(&mut self, body: &mut Body, point: Vec3, dt: f32);

    /// Sets a destination without moving.
    fn set_destination(&mut self, point: Vec3);

    /// Current destination, if any.
    fn destination(&self) -> Option<Vec3>;

    /// Halts in place, keeping the destination.
    fn stop(&mut self);

    /// Drops the destination and any planned route.
    fn clear_path(&mut self);

    /// Returns whether the current destination is within `tolerance`.
    fn has_arrived(&self, body: &Body, tolerance: f32) -> bool;

    /// Enables or disables the backend. A disabled backend never moves.
    fn set_enabled(&mut self, enabled: bool);

    /// Returns whether the backend is enabled.
    fn is_enabled(&self) -> bool;
}

/// Navigation collaborator that plans routes.
pub trait NavMesh: fmt::Debug + Send + Sync {
    /// Plans a route. The returned points end at (or near) `to`.
    fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;
}

/// Flat, obstacle-free ground: every route is a straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGround;

impl NavMesh for OpenGround {
    fn find_path(&self, _from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        Some(vec![to])
    }
}

/// What movement support an entity prototype carries.
#[derive(Debug, Clone, Default)]
pub struct MovementCapabilities {
    /// A character controller is attached
    pub character_controller: bool,
    /// A navigation mesh is reachable
    pub navigation: Option<Arc<dyn NavMesh>>,
}

impl MovementCapabilities {
    /// Only a character controller.
    #[must_use]
    pub fn controller_only() -> Self {
        Self {
            character_controller: true,
            navigation: None,
        }
    }

    /// Only a navigation mesh.
    #[must_use]
    pub fn navigation_only(nav: Arc<dyn NavMesh>) -> Self {
        Self {
            character_controller: false,
            navigation: Some(nav),
        }
    }

    /// Both variants available.
    #[must_use]
    pub fn full(nav: Arc<dyn NavMesh>) -> Self {
        Self {
            character_controller: true,
            navigation: Some(nav),
        }
    }

    /// No movement support at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    fn build(&self, mode: MovementMode, speed: f32) -> Option<Box<dyn MovementBackend>> {
        match mode {
            MovementMode::DirectController => self
                .character_controller
                .then(|| Box::new(DirectController::new(speed)) as Box<dyn MovementBackend>),
            MovementMode::PathfindingAgent => self.navigation.as_ref().map(|nav| {
                Box::new(PathfindingAgent::new(Arc::clone(nav), speed)) as Box<dyn MovementBackend>
            }),
        }
    }
}

/// Builds the configured backend, falling back once to the other variant.
pub fn select_backend(
    requested: MovementMode,
    caps: &MovementCapabilities,
    speed: f32,
) -> MovementResult<Box<dyn MovementBackend>> {
    if let Some(backend) = caps.build(requested, speed) {
        return Ok(backend);
    }

    let fallback = requested.alternate();
    warn!("{:?} unavailable, falling back to {:?}", requested, fallback);
    if let Some(backend) = caps.build(fallback, speed) {
        return Ok(backend);
    }

    error!("No movement backend available (requested {:?})", requested);
    Err(MovementError::Unavailable { requested })
}

/// Moves by direct displacement toward the destination.
#[derive(Debug, Clone)]
pub struct DirectController {
    speed: f32,
    destination: Option<Vec3>,
    stopped: bool,
    enabled: bool,
}

impl DirectController {
    /// Creates a controller moving at `speed`.
    #[must_use]
    pub fn new(speed: f32) -> Self {
        Self {
            speed: speed.max(0.0),
            destination: None,
            stopped: false,
            enabled: true,
        }
    }
}

impl MovementBackend for DirectController {
    fn mode(&self) -> MovementMode {
        MovementMode::DirectController
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn move_toward(&mut self, body: &mut Body, point: Vec3, dt: f32) {
        self.set_destination(point);
        self.stopped = false;
        if !self.enabled {
            return;
        }
        body.face(direction_to(body.position, point));
        body.position = step_toward(body.position, point, self.speed * dt.max(0.0));
    }

    fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn clear_path(&mut self) {
        self.destination = None;
    }

    fn has_arrived(&self, body: &Body, tolerance: f32) -> bool {
        self.destination
            .is_some_and(|dest| distance(body.position, dest) <= tolerance)
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Walks routes planned by a navigation mesh.
///
/// A new destination marks the path pending until the next `move_toward`
/// call, which plans the route and starts walking it.
#[derive(Debug, Clone)]
pub struct PathfindingAgent {
    nav: Arc<dyn NavMesh>,
    speed: f32,
    destination: Option<Vec3>,
    path: VecDeque<Vec3>,
    path_pending: bool,
    stopped: bool,
    enabled: bool,
}

impl PathfindingAgent {
    /// Creates an agent on `nav` moving at `speed`.
    #[must_use]
    pub fn new(nav: Arc<dyn NavMesh>, speed: f32) -> Self {
        Self {
            nav,
            speed: speed.max(0.0),
            destination: None,
            path: VecDeque::new(),
            path_pending: false,
            stopped: false,
            enabled: true,
        }
    }

    /// Whether a route is still being planned.
    #[must_use]
    pub const fn path_pending(&self) -> bool {
        self.path_pending
    }

    /// Remaining route length; infinite while planning.
    #[must_use]
    pub fn remaining_distance(&self, body: &Body) -> f32 {
        if self.path_pending {
            return f32::INFINITY;
        }
        let Some(dest) = self.destination else {
            return 0.0;
        };
        if self.path.is_empty() {
            return distance(body.position, dest);
        }
        let mut total = 0.0;
        let mut cursor = body.position;
        for point in &self.path {
            total += distance(cursor, *point);
            cursor = *point;
        }
        total
    }

    fn plan(&mut self, from: Vec3) {
        self.path.clear();
        self.path_pending = false;
        if let Some(dest) = self.destination {
            match self.nav.find_path(from, dest) {
                Some(points) => self.path.extend(points),
                None => tracing::trace!("No route from {:?} to {:?}", from, dest),
            }
        }
    }

    fn walk(&mut self, body: &mut Body, dt: f32) {
        let mut budget = self.speed * dt.max(0.0);
        while budget > 0.0 {
            let Some(next) = self.path.front().copied() else {
                break;
            };
            let gap = distance(body.position, next);
            body.face(direction_to(body.position, next));
            if gap <= budget {
                body.position = next;
                budget -= gap;
                self.path.pop_front();
            } else {
                body.position = step_toward(body.position, next, budget);
                budget = 0.0;
            }
        }
    }
}

impl MovementBackend for PathfindingAgent {
    fn mode(&self) -> MovementMode {
        MovementMode::PathfindingAgent
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn move_toward(&mut self, body: &mut Body, point: Vec3, dt: f32) {
        self.set_destination(point);
        self.stopped = false;
        if !self.enabled {
            return;
        }
        if self.path_pending {
            self.plan(body.position);
        }
        self.walk(body, dt);
    }

    fn set_destination(&mut self, point: Vec3) {
        let same = self
            .destination
            .is_some_and(|dest| distance(dest, point) < SAME_DESTINATION_EPSILON);
        if !same {
            self.destination = Some(point);
            self.path.clear();
            self.path_pending = true;
        }
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn clear_path(&mut self) {
        self.destination = None;
        self.path.clear();
        self.path_pending = false;
    }

    fn has_arrived(&self, body: &Body, tolerance: f32) -> bool {
        self.destination.is_some()
            && !self.path_pending
            && self.remaining_distance(body) <= tolerance
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.path.clear();
            self.path_pending = self.destination.is_some();
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[derive(Debug)]
    struct Unreachable;

    impl NavMesh for Unreachable {
        fn find_path(&self, _from: Vec3, _to: Vec3) -> Option<Vec<Vec3>> {
            None
        }
    }

    #[derive(Debug)]
    struct Detour;

    impl NavMesh for Detour {
        fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
            Some(vec![Vec3::new(from.x, from.y, to.z), to])
        }
    }

    #[test]
    fn test_select_requested_backend() {
        let caps = MovementCapabilities::full(Arc::new(OpenGround));
        let backend = select_backend(MovementMode::PathfindingAgent, &caps, 3.0)
            .expect("agent available");
        assert_eq!(backend.mode(), MovementMode::PathfindingAgent);
    }

    #[test]
    fn test_select_falls_back_once() {
        let caps = MovementCapabilities::controller_only();
        let backend = select_backend(MovementMode::PathfindingAgent, &caps, 3.0)
            .expect("controller fallback");
        assert_eq!(backend.mode(), MovementMode::DirectController);

        let caps = MovementCapabilities::navigation_only(Arc::new(OpenGround));
        let backend = select_backend(MovementMode::DirectController, &caps, 3.0)
            .expect("agent fallback");
        assert_eq!(backend.mode(), MovementMode::PathfindingAgent);
    }

    #[test]
    fn test_select_fails_without_capabilities() {
        let result = select_backend(MovementMode::DirectController, &MovementCapabilities::none(), 3.0);
        assert!(matches!(
            result,
            Err(MovementError::Unavailable {
                requested: MovementMode::DirectController
            })
        ));
    }

    #[test]
    fn test_direct_controller_reaches_point() {
        let mut ctrl = DirectController::new(6.0);
        let mut body = Body::at(Vec3::ZERO);
        let goal = Vec3::new(0.0, 0.0, 1.0);
        assert!(!ctrl.has_arrived(&body, 0.2));
        for _ in 0..20 {
            ctrl.move_toward(&mut body, goal, DT);
        }
        assert!(ctrl.has_arrived(&body, 0.2));
        assert_eq!(body.position, goal);
        assert!(body.yaw.abs() < 1e-5);
    }

    #[test]
    fn test_disabled_controller_does_not_move() {
        let mut ctrl = DirectController::new(6.0);
        ctrl.set_enabled(false);
        let mut body = Body::at(Vec3::ZERO);
        ctrl.move_toward(&mut body, Vec3::X, 1.0);
        assert_eq!(body.position, Vec3::ZERO);
    }

    #[test]
    fn test_agent_plans_before_moving() {
        let mut agent = PathfindingAgent::new(Arc::new(OpenGround), 10.0);
        let mut body = Body::at(Vec3::ZERO);
        let goal = Vec3::new(5.0, 0.0, 0.0);

        agent.set_destination(goal);
        assert!(agent.path_pending());
        assert!(!agent.has_arrived(&body, 100.0));

        agent.move_toward(&mut body, goal, 0.1);
        assert!(!agent.path_pending());
        assert!((body.position.x - 1.0).abs() < 1e-4);
        assert!((agent.remaining_distance(&body) - 4.0).abs() < 1e-4);

        for _ in 0..60 {
            agent.move_toward(&mut body, goal, DT);
        }
        assert!(agent.has_arrived(&body, 0.1));
    }

    #[test]
    fn test_agent_follows_multi_point_route() {
        let mut agent = PathfindingAgent::new(Arc::new(Detour), 100.0);
        let mut body = Body::at(Vec3::ZERO);
        let goal = Vec3::new(3.0, 0.0, 4.0);
        agent.set_destination(goal);
        agent.move_toward(&mut body, goal, 0.0);
        assert!((agent.remaining_distance(&body) - 7.0).abs() < 1e-4);
        agent.move_toward(&mut body, goal, 1.0);
        assert_eq!(body.position, goal);
    }

    #[test]
    fn test_agent_unreachable_destination_reports_straight_distance() {
        let mut agent = PathfindingAgent::new(Arc::new(Unreachable), 10.0);
        let mut body = Body::at(Vec3::ZERO);
        let goal = Vec3::new(0.0, 0.0, 2.0);
        agent.move_toward(&mut body, goal, DT);
        agent.move_toward(&mut body, goal, DT);
        assert_eq!(body.position, Vec3::ZERO);
        assert!((agent.remaining_distance(&body) - 2.0).abs() < 1e-4);
        assert!(!agent.has_arrived(&body, 0.5));
    }

    #[test]
    fn test_clear_path_drops_destination() {
        let mut agent = PathfindingAgent::new(Arc::new(OpenGround), 10.0);
        agent.set_destination(Vec3::X);
        agent.clear_path();
        assert!(agent.destination().is_none());
        assert!(!agent.path_pending());
        assert!(!agent.has_arrived(&Body::default(), 1.0));
    }
}
