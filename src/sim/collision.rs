//! Collision detection and response
//!
//! Balls are circles. Pegs are circles, walls are convex polygons. The ground
//! is a sensor handled by `Board::has_landed`, not a collider.

use glam::Vec2;

use super::board::Wall;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point on the obstacle surface (if hit)
    pub point: Vec2,
    /// Surface normal at contact, pointing toward the ball centre
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a ball and a static circle (peg)
pub fn ball_circle_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    radius: f32,
) -> CollisionResult {
    let delta = ball_pos - center;
    let reach = ball_radius + radius;
    let dist_sq = delta.length_squared();
    if dist_sq >= reach * reach {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    // Dead-centre hit: push straight up, the way a ball resting on a peg would leave
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::NEG_Y };
    CollisionResult {
        hit: true,
        point: center + normal * radius,
        normal,
        penetration: reach - dist,
    }
}

/// Check collision between a ball and a convex polygon
///
/// Handles both the usual case (centre outside, closest edge within radius)
/// and the tunnelling case where the centre already sits inside the polygon.
pub fn ball_polygon_collision(ball_pos: Vec2, ball_radius: f32, corners: &[Vec2]) -> CollisionResult {
    if corners.len() < 3 {
        return CollisionResult::miss();
    }

    let mut closest = corners[0];
    let mut closest_dist_sq = f32::INFINITY;
    let mut closest_edge = (corners[0], corners[1]);
    let mut sign = 0.0f32;
    let mut inside = true;

    for i in 0..corners.len() {
        let a = corners[i];
        let b = corners[(i + 1) % corners.len()];
        let p = closest_point_on_segment(ball_pos, a, b);
        let d = (ball_pos - p).length_squared();
        if d < closest_dist_sq {
            closest_dist_sq = d;
            closest = p;
            closest_edge = (a, b);
        }

        let cross = (b - a).perp_dot(ball_pos - a);
        if cross != 0.0 {
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                inside = false;
            }
        }
    }

    let dist = closest_dist_sq.sqrt();

    if inside {
        let centroid = corners.iter().copied().sum::<Vec2>() / corners.len() as f32;
        let normal = if dist > 1e-6 {
            (closest - ball_pos) / dist
        } else {
            edge_normal_away_from(closest_edge, centroid)
        };
        return CollisionResult {
            hit: true,
            point: closest,
            normal,
            penetration: ball_radius + dist,
        };
    }

    if dist >= ball_radius {
        return CollisionResult::miss();
    }

    let normal = if dist > 1e-6 {
        (ball_pos - closest) / dist
    } else {
        let centroid = corners.iter().copied().sum::<Vec2>() / corners.len() as f32;
        edge_normal_away_from(closest_edge, centroid)
    };
    CollisionResult {
        hit: true,
        point: closest,
        normal,
        penetration: ball_radius - dist,
    }
}

/// Check collision between a ball and a wall
#[inline]
pub fn ball_wall_collision(ball_pos: Vec2, ball_radius: f32, wall: &Wall) -> CollisionResult {
    ball_polygon_collision(ball_pos, ball_radius, &wall.corners())
}

fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

fn edge_normal_away_from((a, b): (Vec2, Vec2), centroid: Vec2) -> Vec2 {
    let perp = (b - a).perp().normalize_or_zero();
    if perp.dot(a - centroid) >= 0.0 { perp } else { -perp }
}

/// Bounce a velocity off a surface with restitution and contact friction.
///
/// Only the approaching component is reflected; a ball already separating
/// keeps its velocity.
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32, friction: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    let normal_part = normal * vn;
    let tangent_part = velocity - normal_part;
    tangent_part * (1.0 - friction) - normal_part * restitution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_circle_collision_hit() {
        let result = ball_circle_collision(Vec2::new(10.0, 0.0), 7.0, Vec2::ZERO, 4.0);
        assert!(result.hit);
        assert!((result.penetration - 1.0).abs() < 1e-5);
        assert!((result.normal - Vec2::X).length() < 1e-5);
        assert!((result.point - Vec2::new(4.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_ball_circle_collision_miss() {
        let result = ball_circle_collision(Vec2::new(12.0, 0.0), 7.0, Vec2::ZERO, 4.0);
        assert!(!result.hit);
    }

    #[test]
    fn test_ball_circle_dead_center_pushes_up() {
        let result = ball_circle_collision(Vec2::ZERO, 7.0, Vec2::ZERO, 4.0);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_Y);
    }

    #[test]
    fn test_ball_polygon_collision_outside_edge() {
        let wall = Wall::new(Vec2::ZERO, 10.0, 100.0, 0.0);
        // Ball to the right of the wall face at x = 5
        let result = ball_wall_collision(Vec2::new(10.0, 0.0), 7.0, &wall);
        assert!(result.hit);
        assert!((result.penetration - 2.0).abs() < 1e-4);
        assert!(result.normal.x > 0.99);
    }

    #[test]
    fn test_ball_polygon_collision_inside() {
        let wall = Wall::new(Vec2::ZERO, 10.0, 100.0, 0.0);
        // Centre inside, closer to the right face
        let result = ball_wall_collision(Vec2::new(3.0, 0.0), 7.0, &wall);
        assert!(result.hit);
        assert!(result.normal.x > 0.99);
        assert!((result.penetration - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_ball_polygon_collision_rotated_wall() {
        // Rotated a quarter turn: now a horizontal slab 100 wide, 10 tall
        let wall = Wall::new(Vec2::ZERO, 10.0, 100.0, std::f32::consts::FRAC_PI_2);
        let above = ball_wall_collision(Vec2::new(0.0, -10.0), 7.0, &wall);
        assert!(above.hit);
        assert!(above.normal.y < -0.99);
        let beside = ball_wall_collision(Vec2::new(70.0, 0.0), 7.0, &wall);
        assert!(!beside.hit);
    }

    #[test]
    fn test_bounce_velocity_restitution() {
        let v = bounce_velocity(Vec2::new(0.0, 100.0), Vec2::NEG_Y, 0.5, 0.0);
        assert!((v.y + 50.0).abs() < 1e-4);
        // Separating: untouched
        let v = bounce_velocity(Vec2::new(0.0, -100.0), Vec2::NEG_Y, 0.5, 0.0);
        assert_eq!(v, Vec2::new(0.0, -100.0));
    }
}
