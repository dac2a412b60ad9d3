//! Material budget providers used for the energy loss and multiple scattering corrections.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::propagation::propagator::MatCorrType;

/// Material crossed along a straight segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MatBudget {
    /// Mean density in g/cm^3.
    pub mean_rho: f64,
    /// Thickness in units of radiation length.
    pub mean_x2x0: f64,
    /// Segment length in cm.
    pub length: f64,
}

pub trait MaterialBudget: Sync {
    fn mat_budget(&self, p0: &Point3<f64>, p1: &Point3<f64>, mode: MatCorrType) -> MatBudget;
}

/// No material at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vacuum;

impl MaterialBudget for Vacuum {
    fn mat_budget(&self, p0: &Point3<f64>, p1: &Point3<f64>, _mode: MatCorrType) -> MatBudget {
        MatBudget { length: (p1 - p0).norm(), ..MatBudget::default() }
    }
}

/// Homogeneous medium.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformMaterial {
    pub rho: f64,
    /// Radiation length in cm.
    pub x0: f64,
}

impl MaterialBudget for UniformMaterial {
    fn mat_budget(&self, p0: &Point3<f64>, p1: &Point3<f64>, _mode: MatCorrType) -> MatBudget {
        let length = (p1 - p0).norm();
        MatBudget { mean_rho: self.rho, mean_x2x0: length / self.x0, length }
    }
}

/// Cylindrical shell of constant material between two radii.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shell {
    pub r_min: f64,
    pub r_max: f64,
    pub rho: f64,
    pub x0: f64,
}

/// Concentric shells around the beam axis; space outside any shell is empty.
///
/// `MatCorrType::Lut` looks the material up at the segment midpoint only,
/// `MatCorrType::Full` samples the segment every `sampling_step` cm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShellMaterial {
    pub shells: Vec<Shell>,
    pub sampling_step: f64,
}

impl ShellMaterial {
    pub fn new(shells: Vec<Shell>) -> Self {
        ShellMaterial { shells, sampling_step: 0.1 }
    }

    fn shell_at(&self, p: &Point3<f64>) -> Option<&Shell> {
        let r = p.x.hypot(p.y);
        self.shells.iter().find(|s| r >= s.r_min && r < s.r_max)
    }
}

impl MaterialBudget for ShellMaterial {
    fn mat_budget(&self, p0: &Point3<f64>, p1: &Point3<f64>, mode: MatCorrType) -> MatBudget {
        let length = (p1 - p0).norm();
        let n_samples = match mode {
            MatCorrType::Full if self.sampling_step > 0.0 => ((length / self.sampling_step).ceil() as usize).max(1),
            _ => 1,
        };
        let mut rho_sum = 0.0;
        let mut inv_x0_sum = 0.0;
        for i in 0..n_samples {
            let t = (i as f64 + 0.5) / n_samples as f64;
            let p = p0 + (p1 - p0) * t;
            if let Some(shell) = self.shell_at(&p) {
                rho_sum += shell.rho;
                inv_x0_sum += 1.0 / shell.x0;
            }
        }
        MatBudget {
            mean_rho: rho_sum / n_samples as f64,
            mean_x2x0: length * inv_x0_sum / n_samples as f64,
            length,
        }
    }
}
