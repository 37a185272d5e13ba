//! Additional math helpers layered on top of `glam`.

use glam::{Mat4, Quat, Vec3};

/// Rotation taking the direction of `from` onto the direction of `to`.
///
/// Returns `None` when either vector has no usable length.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Option<Quat> {
    let from = from.try_normalize()?;
    let to = to.try_normalize()?;
    Some(Quat::from_rotation_arc(from, to))
}

/// Copy of `matrix` whose translation column is replaced by `translation`.
pub fn with_translation(matrix: Mat4, translation: Vec3) -> Mat4 {
    let mut m = matrix;
    m.w_axis = translation.extend(1.0);
    m
}

/// Clamps a coefficient into `[0, 1]`, mapping NaN to zero.
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn from_to_rotation_maps_direction() {
        let rot = from_to_rotation(Vec3::new(0.0, -2.0, 0.0), Vec3::new(3.0, 0.0, 0.0))
            .expect("non-zero inputs");
        let mapped = rot * Vec3::NEG_Y;
        assert_abs_diff_eq!(mapped.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(mapped.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn from_to_rotation_rejects_zero_vectors() {
        assert!(from_to_rotation(Vec3::ZERO, Vec3::X).is_none());
        assert!(from_to_rotation(Vec3::Y, Vec3::ZERO).is_none());
    }

    #[test]
    fn with_translation_keeps_basis() {
        let m = Mat4::from_rotation_z(0.5);
        let moved = with_translation(m, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(moved.x_axis, m.x_axis);
        assert_eq!(moved.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
