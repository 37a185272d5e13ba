use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_UPDATE_RATE;
use crate::core::types::{CoefficientCurves, Coefficients};
use crate::host::NodeId;

/// Configuration of one simulated chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Root of the subtree to simulate. Roots follow the animation.
    pub root: Option<NodeId>,
    /// Further subtrees simulated with the same owner and coefficients.
    pub extra_roots: Vec<NodeId>,
    /// Node whose movement and scale drive object-level effects. Defaults to `root`.
    pub owner: Option<NodeId>,
    /// Sub-steps per second; `<= 0` runs exactly one sub-step per frame.
    pub update_rate: f32,
    pub coefficients: Coefficients,
    /// Optional distribution of the coefficients over normalized bone length.
    pub curves: CoefficientCurves,
    /// Gravity applied every sub-step, in world units per sub-step.
    pub gravity: Vec3,
    /// Additional constant force, same units as `gravity`.
    pub force: Vec3,
    /// Appends a tip particle to each leaf, this fraction of the last bone long.
    pub end_length: f32,
    /// Tip offset in the leaf's local space, used when `end_length` is zero.
    pub end_offset: Vec3,
    /// Nodes that are skipped together with their subtrees.
    pub exclusions: Vec<NodeId>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            root: None,
            extra_roots: Vec::new(),
            owner: None,
            update_rate: DEFAULT_UPDATE_RATE,
            coefficients: Coefficients::default(),
            curves: CoefficientCurves::default(),
            gravity: Vec3::ZERO,
            force: Vec3::ZERO,
            end_length: 0.0,
            end_offset: Vec3::ZERO,
            exclusions: Vec::new(),
        }
    }
}

impl ChainConfig {
    pub fn new(root: NodeId) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    /// Adds another subtree driven by the same owner and settings.
    pub fn with_extra_root(mut self, root: NodeId) -> Self {
        self.extra_roots.push(root);
        self
    }

    pub fn with_coefficients(mut self, coefficients: Coefficients) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn with_update_rate(mut self, update_rate: f32) -> Self {
        self.update_rate = update_rate;
        self
    }

    pub fn with_owner(mut self, owner: NodeId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_end_length(mut self, end_length: f32) -> Self {
        self.end_length = end_length;
        self
    }

    pub fn with_curves(mut self, curves: CoefficientCurves) -> Self {
        self.curves = curves;
        self
    }

    pub fn excluding(mut self, node: NodeId) -> Self {
        self.exclusions.push(node);
        self
    }

    /// Node used for object-level movement tracking.
    pub fn owner_node(&self) -> Option<NodeId> {
        self.owner.or(self.root)
    }

    pub fn has_tips(&self) -> bool {
        self.end_length > 0.0 || self.end_offset != Vec3::ZERO
    }

    /// Number of subtrees this configuration names.
    pub fn root_count(&self) -> usize {
        usize::from(self.root.is_some()) + self.extra_roots.len()
    }

    /// Splits the configuration into one single-root configuration per tree,
    /// primary root first.
    ///
    /// All trees share the owner, which defaults to the first root. A
    /// configuration without any root is returned as is.
    pub fn trees(&self) -> Vec<ChainConfig> {
        let owner = self.owner.or(self.root).or(self.extra_roots.first().copied());
        let trees: Vec<ChainConfig> = self
            .root
            .into_iter()
            .chain(self.extra_roots.iter().copied())
            .map(|root| ChainConfig {
                root: Some(root),
                extra_roots: Vec::new(),
                owner,
                ..self.clone()
            })
            .collect();
        if trees.is_empty() {
            vec![self.clone()]
        } else {
            trees
        }
    }
}
