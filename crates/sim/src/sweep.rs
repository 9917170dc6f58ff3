//! Continuous (swept) collision for fast-moving circles.
//!
//! A body whose per-step displacement exceeds its radius can pass clean
//! through a peer between two static tests. This solver rewinds both
//! circles to their start-of-step positions and solves for the time of
//! impact along their relative motion instead.

use crate::geometry::circle_circle;
use glam::Vec2;

/// Penetration of circle A into circle B accounting for this step's motion.
///
/// `end_*` are the positions after integration; `disp_*` the displacement
/// each body covered this step. Solves `a·u² + b·u + c = 0` for the contact
/// time fraction `u`, where `a = relVel·relVel`, `b = 2·relVel·relDist`,
/// `c = relDist·relDist − (rA+rB)²`.
///
/// Already overlapping at the start resolves statically, as does a pair
/// whose roots fall outside the step (non-real roots included — the paths
/// never meet).
pub fn swept_circle_penetration(
    end_a: Vec2,
    disp_a: Vec2,
    ra: f32,
    end_b: Vec2,
    disp_b: Vec2,
    rb: f32,
) -> Vec2 {
    let start_a = end_a - disp_a;
    let start_b = end_b - disp_b;
    let rel_dist = start_a - start_b;
    let rel_vel = disp_a - disp_b;

    let radius_sum = ra + rb;
    let c = rel_dist.length_squared() - radius_sum * radius_sum;
    if c <= 0.0 {
        // Overlapping before either body moved; nothing to sweep.
        return circle_circle(end_a, ra, end_b, rb);
    }

    let a = rel_vel.length_squared();
    let b = 2.0 * rel_vel.dot(rel_dist);
    if a == 0.0 {
        return circle_circle(end_a, ra, end_b, rb);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return circle_circle(end_a, ra, end_b, rb);
    }

    let sqrt_d = discriminant.sqrt();
    let u0 = (-b - sqrt_d) / (2.0 * a);
    let u1 = (-b + sqrt_d) / (2.0 * a);
    if !(0.0..=1.0).contains(&u0) || !(0.0..=1.0).contains(&u1) {
        // Contact happens outside this step.
        return circle_circle(end_a, ra, end_b, rb);
    }

    // Advance both circles to the midpoint of the contact interval and
    // resolve the static penetration there.
    let mid = (u0 + u1) * 0.5;
    circle_circle(start_a + disp_a * mid, ra, start_b + disp_b * mid, rb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_circles_resolve_at_midpoint() {
        // Two unit circles crossing paths within one step. Their contact
        // interval midpoint is coincident, so the fixed -Y axis applies.
        let pen = swept_circle_penetration(
            Vec2::new(3.0, 0.0),
            Vec2::new(3.0, -3.0),
            1.0,
            Vec2::new(3.0, 3.0),
            Vec2::new(3.0, 3.0),
            1.0,
        );
        assert_eq!(pen, Vec2::new(0.0, 2.0));
    }

    #[test]
    fn relative_velocity_against_stationary_peer_is_equivalent() {
        // Same case as above expressed as A moving with (vA - vB) against a
        // stationary B.
        let pen = swept_circle_penetration(
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, -6.0),
            1.0,
            Vec2::new(3.0, 3.0),
            Vec2::ZERO,
            1.0,
        );
        assert_eq!(pen, Vec2::new(0.0, 2.0));
    }

    #[test]
    fn tunneling_body_is_caught() {
        // A small fast circle passes completely through a stationary one;
        // the static test at the end positions would miss it.
        let end_a = Vec2::new(10.0, 0.0);
        let disp_a = Vec2::new(20.0, 0.0);
        let pen = swept_circle_penetration(end_a, disp_a, 0.2, Vec2::ZERO, Vec2::ZERO, 1.0);
        assert_ne!(pen, Vec2::ZERO);
        assert_eq!(
            circle_circle(end_a, 0.2, Vec2::ZERO, 1.0),
            Vec2::ZERO,
            "static test should have missed"
        );
    }

    #[test]
    fn overlap_at_start_resolves_statically() {
        let pen = swept_circle_penetration(
            Vec2::new(0.5, 0.0),
            Vec2::new(0.1, 0.0),
            1.0,
            Vec2::ZERO,
            Vec2::ZERO,
            1.0,
        );
        assert_eq!(
            pen,
            circle_circle(Vec2::new(0.5, 0.0), 1.0, Vec2::ZERO, 1.0)
        );
    }

    #[test]
    fn contact_outside_step_falls_back_to_static() {
        // Moving away from each other: roots are negative, end positions
        // disjoint, so the result is zero.
        let pen = swept_circle_penetration(
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 0.0),
            1.0,
            Vec2::ZERO,
            Vec2::ZERO,
            1.0,
        );
        assert_eq!(pen, Vec2::ZERO);
    }

    #[test]
    fn parallel_motion_never_contacts() {
        // Equal velocities: relative motion is zero, a == 0, static path.
        let pen = swept_circle_penetration(
            Vec2::new(0.0, 5.0),
            Vec2::new(4.0, 0.0),
            1.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            1.0,
        );
        assert_eq!(pen, Vec2::ZERO);
    }
}
