//! Shape intersection and minimal-translation penetration vectors.
//!
//! The penetration vector is A's penetration into B: it points from the
//! contact surface *into* B, so resolving motion subtracts it. Pushing A by
//! the negated vector leaves the shapes exactly tangent. Disjoint shapes
//! yield zero.

use glam::Vec2;
use gravwell_common::Shape;

/// Axis used when two circles are exactly coincident and the push direction
/// would otherwise be undefined.
const DEGENERATE_AXIS: Vec2 = Vec2::NEG_Y;

/// Whether two positioned shapes overlap.
pub fn intersects(a: Shape, pos_a: Vec2, b: Shape, pos_b: Vec2) -> bool {
    match (a, b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            let sum = ra + rb;
            pos_a.distance_squared(pos_b) < sum * sum
        }
        (Shape::Rect { half_extents: ha }, Shape::Rect { half_extents: hb }) => {
            let d = (pos_a - pos_b).abs();
            d.x < ha.x + hb.x && d.y < ha.y + hb.y
        }
        (Shape::Circle { radius }, Shape::Rect { half_extents }) => {
            let closest = pos_a.clamp(pos_b - half_extents, pos_b + half_extents);
            pos_a.distance_squared(closest) < radius * radius
        }
        (Shape::Rect { .. }, Shape::Circle { .. }) => intersects(b, pos_b, a, pos_a),
    }
}

/// A's penetration into B; zero if the shapes are disjoint.
pub fn penetration_vector(a: Shape, pos_a: Vec2, b: Shape, pos_b: Vec2) -> Vec2 {
    match (a, b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(pos_a, ra, pos_b, rb)
        }
        (Shape::Rect { half_extents: ha }, Shape::Rect { half_extents: hb }) => {
            rect_rect(pos_a, ha, pos_b, hb)
        }
        (Shape::Circle { radius }, Shape::Rect { half_extents }) => {
            circle_rect(pos_a, radius, pos_b, half_extents)
        }
        // rect into circle is the mirrored case
        (Shape::Rect { .. }, Shape::Circle { .. }) => -penetration_vector(b, pos_b, a, pos_a),
    }
}

pub(crate) fn circle_circle(pos_a: Vec2, ra: f32, pos_b: Vec2, rb: f32) -> Vec2 {
    let displacement = pos_a - pos_b;
    let sum = ra + rb;
    let dist_sq = displacement.length_squared();
    if dist_sq >= sum * sum {
        return Vec2::ZERO;
    }
    // Coincident centers leave the direction undefined; fall back to a
    // fixed axis so the pair still separates.
    let dir = if dist_sq == 0.0 {
        DEGENERATE_AXIS
    } else {
        displacement / dist_sq.sqrt()
    };
    displacement - dir * sum
}

fn rect_rect(pos_a: Vec2, ha: Vec2, pos_b: Vec2, hb: Vec2) -> Vec2 {
    let d = pos_a - pos_b;
    let overlap = ha + hb - d.abs();
    if overlap.x <= 0.0 || overlap.y <= 0.0 {
        return Vec2::ZERO;
    }
    // Push out along the axis with the smaller overlap extent; the sign
    // comes from comparing centers on that axis. Equal overlaps push on X.
    if overlap.x <= overlap.y {
        Vec2::new(if d.x < 0.0 { overlap.x } else { -overlap.x }, 0.0)
    } else {
        Vec2::new(0.0, if d.y < 0.0 { overlap.y } else { -overlap.y })
    }
}

fn circle_rect(pos_a: Vec2, radius: f32, pos_b: Vec2, half: Vec2) -> Vec2 {
    let min = pos_b - half;
    let max = pos_b + half;
    let inside = pos_a.x > min.x && pos_a.x < max.x && pos_a.y > min.y && pos_a.y < max.y;

    if inside {
        // Degenerate case: the circle's center is inside the rectangle, so
        // there is no boundary point to push away from. Use the min-axis
        // push, scaled by (radius + half extent) per axis.
        let d = pos_a - pos_b;
        let overlap = Vec2::new(radius + half.x, radius + half.y) - d.abs();
        return if overlap.x <= overlap.y {
            Vec2::new(if d.x < 0.0 { overlap.x } else { -overlap.x }, 0.0)
        } else {
            Vec2::new(0.0, if d.y < 0.0 { overlap.y } else { -overlap.y })
        };
    }

    let closest = pos_a.clamp(min, max);
    let displacement = pos_a - closest;
    let dist_sq = displacement.length_squared();
    if dist_sq >= radius * radius {
        return Vec2::ZERO;
    }
    let dir = if dist_sq == 0.0 {
        DEGENERATE_AXIS
    } else {
        displacement / dist_sq.sqrt()
    };
    displacement - dir * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn circle(radius: f32) -> Shape {
        Shape::Circle { radius }
    }

    fn rect(hx: f32, hy: f32) -> Shape {
        Shape::Rect {
            half_extents: Vec2::new(hx, hy),
        }
    }

    #[test]
    fn disjoint_circles_have_zero_penetration() {
        let p = penetration_vector(circle(1.0), Vec2::ZERO, circle(1.0), Vec2::new(5.0, 0.0));
        assert_eq!(p, Vec2::ZERO);
    }

    #[test]
    fn pushing_out_by_penetration_leaves_circles_tangent() {
        let cases = [
            (Vec2::new(0.5, 0.0), 1.0, Vec2::ZERO, 1.0),
            (Vec2::new(-0.3, 0.4), 0.5, Vec2::ZERO, 1.5),
            (Vec2::new(10.0, 10.0), 2.0, Vec2::new(11.0, 9.0), 1.0),
        ];
        for (pa, ra, pb, rb) in cases {
            let pen = penetration_vector(circle(ra), pa, circle(rb), pb);
            assert_ne!(pen, Vec2::ZERO);
            let resolved = pa - pen;
            assert!(
                (resolved.distance(pb) - (ra + rb)).abs() < EPS,
                "not tangent for {pa:?} vs {pb:?}"
            );
        }
    }

    #[test]
    fn tangent_circles_resolve_to_zero() {
        // Exactly touching: distance == rA + rB.
        let p = penetration_vector(circle(1.0), Vec2::new(2.0, 0.0), circle(1.0), Vec2::ZERO);
        assert_eq!(p, Vec2::ZERO);
    }

    #[test]
    fn coincident_circles_use_fixed_axis() {
        let p = penetration_vector(circle(1.0), Vec2::ZERO, circle(1.0), Vec2::ZERO);
        // displacement zero, desired = -Y * 2 => penetration (0, 2)
        assert_eq!(p, Vec2::new(0.0, 2.0));
    }

    #[test]
    fn rect_rect_pushes_along_smaller_overlap() {
        // A slightly right of B, overlapping more in Y than X.
        let p = penetration_vector(
            rect(1.0, 2.0),
            Vec2::new(1.5, 0.0),
            rect(1.0, 2.0),
            Vec2::ZERO,
        );
        assert_eq!(p.y, 0.0);
        assert!((p.x - (-0.5)).abs() < EPS);
        // Resolving separates them.
        let resolved = Vec2::new(1.5, 0.0) - p;
        assert!(!intersects(rect(1.0, 2.0), resolved, rect(1.0, 2.0), Vec2::ZERO));
    }

    #[test]
    fn rect_rect_equal_overlap_prefers_x() {
        let p = penetration_vector(
            rect(1.0, 1.0),
            Vec2::new(0.5, 0.5),
            rect(1.0, 1.0),
            Vec2::ZERO,
        );
        assert_eq!(p.y, 0.0);
        assert!(p.x < 0.0);
    }

    #[test]
    fn circle_rect_outside_pushes_from_boundary() {
        // Circle above a rect, overlapping by 0.5.
        let p = penetration_vector(circle(1.0), Vec2::new(0.0, 1.5), rect(2.0, 1.0), Vec2::ZERO);
        assert!((p.y - (-0.5)).abs() < EPS);
        assert_eq!(p.x, 0.0);
        let resolved = Vec2::new(0.0, 1.5) - p;
        assert!(!intersects(circle(1.0), resolved, rect(2.0, 1.0), Vec2::ZERO));
    }

    #[test]
    fn circle_center_inside_rect_uses_min_axis_split() {
        // Center inside, nearer the right edge: push should be pure X.
        let p = penetration_vector(circle(0.5), Vec2::new(1.5, 0.0), rect(2.0, 3.0), Vec2::ZERO);
        assert_eq!(p.y, 0.0);
        assert!(p.x != 0.0);
        // overlap.x = (0.5 + 2.0) - 1.5 = 1.0, pushing +X means pen is -X
        assert!((p.x - (-1.0)).abs() < EPS);
    }

    #[test]
    fn rect_circle_is_negated_mirror() {
        let a = rect(2.0, 1.0);
        let b = circle(1.0);
        let pa = Vec2::ZERO;
        let pb = Vec2::new(0.0, 1.5);
        assert_eq!(
            penetration_vector(a, pa, b, pb),
            -penetration_vector(b, pb, a, pa)
        );
    }

    #[test]
    fn intersects_agrees_with_penetration() {
        let shapes = [
            (circle(1.0), Vec2::new(0.5, 0.2)),
            (rect(1.0, 0.5), Vec2::new(-0.4, 0.3)),
        ];
        for (sa, pa) in shapes {
            for (sb, pb) in shapes {
                let hit = intersects(sa, pa, sb, pb);
                let pen = penetration_vector(sa, pa, sb, pb);
                assert_eq!(hit, pen != Vec2::ZERO, "{sa:?} {pa:?} vs {sb:?} {pb:?}");
            }
        }
    }
}
