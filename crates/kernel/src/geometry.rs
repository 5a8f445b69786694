//! 2D ray queries on the arena floor plane.

use glam::Vec2;

/// Rotate `v` counter-clockwise by `angle` radians.
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Distance along a unit-length ray to a circle, if hit in front of the
/// origin. An origin inside the circle reports 0.
pub fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = m.dot(dir);
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    Some(-b - disc.sqrt())
}

/// Distance along a unit-length ray to an oriented box (slab test in the
/// box frame). An origin inside the box reports 0.
pub fn ray_obb(origin: Vec2, dir: Vec2, center: Vec2, half: Vec2, yaw: f32) -> Option<f32> {
    let o = rotate(origin - center, -yaw);
    let d = rotate(dir, -yaw);

    let mut t_min = 0.0_f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..2 {
        let (o, d, h) = (o[axis], d[axis], half[axis]);
        if d.abs() < 1e-8 {
            if o.abs() > h {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut t0, mut t1) = ((-h - o) * inv, (h - o) * inv);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Closest point on an oriented box to `p`, in world space.
pub fn closest_point_obb(p: Vec2, center: Vec2, half: Vec2, yaw: f32) -> Vec2 {
    let local = rotate(p - center, -yaw);
    center + rotate(local.clamp(-half, half), yaw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn rotate_quarter_turn() {
        let v = rotate(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!((v - Vec2::Y).length() < EPS);
    }

    #[test]
    fn circle_hit_and_miss() {
        let t = ray_circle(Vec2::ZERO, Vec2::X, Vec2::new(5.0, 0.0), 1.0).unwrap();
        assert!((t - 4.0).abs() < EPS);
        assert!(ray_circle(Vec2::ZERO, -Vec2::X, Vec2::new(5.0, 0.0), 1.0).is_none());
        assert!(ray_circle(Vec2::ZERO, Vec2::Y, Vec2::new(5.0, 0.0), 1.0).is_none());
        assert_eq!(ray_circle(Vec2::new(5.0, 0.5), Vec2::X, Vec2::new(5.0, 0.0), 1.0), Some(0.0));
    }

    #[test]
    fn obb_axis_aligned() {
        let t = ray_obb(Vec2::ZERO, Vec2::X, Vec2::new(4.0, 0.0), Vec2::new(1.0, 1.0), 0.0).unwrap();
        assert!((t - 3.0).abs() < EPS);
        assert!(ray_obb(Vec2::ZERO, Vec2::Y, Vec2::new(4.0, 0.0), Vec2::new(1.0, 1.0), 0.0).is_none());
    }

    #[test]
    fn obb_rotated() {
        // A 4x0.5 box rotated a quarter turn is tall along y.
        let half = Vec2::new(2.0, 0.25);
        let yaw = std::f32::consts::FRAC_PI_2;
        let center = Vec2::new(0.0, 5.0);
        let t = ray_obb(Vec2::ZERO, Vec2::Y, center, half, yaw).unwrap();
        assert!((t - 3.0).abs() < 1e-4);
        let miss = ray_obb(Vec2::new(1.0, 0.0), Vec2::Y, center, half, yaw);
        assert!(miss.is_none());
    }

    #[test]
    fn closest_point_clamps() {
        let p = closest_point_obb(Vec2::new(5.0, 0.0), Vec2::ZERO, Vec2::new(1.0, 2.0), 0.0);
        assert!((p - Vec2::new(1.0, 0.0)).length() < EPS);
        let inside = closest_point_obb(Vec2::new(0.5, 0.5), Vec2::ZERO, Vec2::new(1.0, 2.0), 0.0);
        assert!((inside - Vec2::new(0.5, 0.5)).length() < EPS);
    }
}
