use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DAMPING, DEFAULT_ELASTICITY, DEFAULT_INERT, DEFAULT_STIFFNESS};
use crate::error::{Result, SetupError};
use crate::utils::math::clamp01;

/// Position, orientation, and non-uniform scale of a hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    /// Builds a homogeneous matrix representation of the transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Applies a child transform on top of this one, returning the composition.
    ///
    /// Scale is composed component-wise, which is lossy under rotated
    /// non-uniform scale.
    pub fn combine(&self, child: &Transform) -> Transform {
        Transform {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    /// Maps a point from the space this transform maps into back to local space.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let unrotated = self.rotation.inverse() * (point - self.position);
        unrotated / safe_scale(self.scale)
    }
}

fn safe_scale(scale: Vec3) -> Vec3 {
    let fix = |s: f32| if s.abs() < f32::EPSILON { 1.0 } else { s };
    Vec3::new(fix(scale.x), fix(scale.y), fix(scale.z))
}

/// Physical coefficients of a particle, each within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coefficients {
    /// How much verlet velocity is lost every sub-step.
    pub damping: f32,
    /// How strongly the particle is pulled back to its rest-relative offset.
    pub elasticity: f32,
    /// How much of the rest shape is preserved (shrinks the allowed slack).
    pub stiffness: f32,
    /// How much of the owner's movement is ignored by the simulation.
    pub inert: f32,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            elasticity: DEFAULT_ELASTICITY,
            stiffness: DEFAULT_STIFFNESS,
            inert: DEFAULT_INERT,
        }
    }
}

impl Coefficients {
    pub fn new(damping: f32, elasticity: f32, stiffness: f32) -> Self {
        Self {
            damping,
            elasticity,
            stiffness,
            inert: DEFAULT_INERT,
        }
    }

    pub fn with_inert(mut self, inert: f32) -> Self {
        self.inert = inert;
        self
    }

    /// Rejects values outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("damping", self.damping),
            ("elasticity", self.elasticity),
            ("stiffness", self.stiffness),
            ("inert", self.inert),
        ];
        for (name, value) in named {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(SetupError::InvalidCoefficient { name, value });
            }
        }
        Ok(())
    }

    /// Scales every coefficient by its curve sampled at `t`, clamped to `[0, 1]`.
    pub fn distributed(&self, curves: &CoefficientCurves, t: f32) -> Coefficients {
        let apply = |base: f32, curve: &Option<Curve>| match curve {
            Some(curve) if !curve.is_empty() => clamp01(base * curve.evaluate(t)),
            _ => base,
        };
        Coefficients {
            damping: apply(self.damping, &curves.damping),
            elasticity: apply(self.elasticity, &curves.elasticity),
            stiffness: apply(self.stiffness, &curves.stiffness),
            inert: apply(self.inert, &curves.inert),
        }
    }
}

/// Piecewise-linear curve over normalized bone length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Builds a curve from `(time, value)` keys; keys are sorted by time.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.retain(|(t, v)| t.is_finite() && v.is_finite());
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![(0.0, value)])
    }

    pub fn linear(start: f32, end: f32) -> Self {
        Self::new(vec![(0.0, start), (1.0, end)])
    }

    pub fn keys(&self) -> &[(f32, f32)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Samples the curve; values outside the key range hold the nearest key.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 1.0,
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.keys.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                return v0 + (v1 - v0) * ((t - t0) / span);
            }
        }
        last.1
    }
}

/// Optional per-coefficient distribution along the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientCurves {
    pub damping: Option<Curve>,
    pub elasticity: Option<Curve>,
    pub stiffness: Option<Curve>,
    pub inert: Option<Curve>,
}

impl CoefficientCurves {
    pub fn is_empty(&self) -> bool {
        [&self.damping, &self.elasticity, &self.stiffness, &self.inert]
            .iter()
            .all(|curve| curve.as_ref().map_or(true, Curve::is_empty))
    }
}
