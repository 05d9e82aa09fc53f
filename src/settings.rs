use fenris_optimize::newton::NewtonSettings;
use serde::{Deserialize, Serialize};

/// Parameters controlling how physical points are mapped back to reference coordinates and
/// how reference coordinates are tested for containment in the reference cell.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackSettings {
    /// Maximum number of Newton iterations on non-affine cells.
    pub max_iterations: usize,
    /// Newton converges once `|F(X)| <= residual_tolerance * h`, `h` being the cell diameter.
    pub residual_tolerance: f64,
    /// Newton converges once a step satisfies `|dX| <= step_tolerance`.
    pub step_tolerance: f64,
    /// Tolerance applied to every inequality that defines the reference cell.
    pub containment_tolerance: f64,
}

impl Default for PullbackSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            residual_tolerance: 1e-10,
            step_tolerance: 1e-14,
            containment_tolerance: 1e-12,
        }
    }
}

impl PullbackSettings {
    pub fn newton_settings(&self, cell_diameter: f64) -> NewtonSettings<f64> {
        NewtonSettings {
            max_iterations: Some(self.max_iterations),
            tolerance: self.residual_tolerance * cell_diameter,
            step_tolerance: Some(self.step_tolerance),
        }
    }
}
