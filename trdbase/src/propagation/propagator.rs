use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{PropagationError, Result};
use crate::propagation::field::{MagneticField, UniformField};
use crate::propagation::material::{MaterialBudget, Vacuum};
use crate::track::param::TrackParCov;

const X_EPSILON: f64 = 1e-5; // cm, distance at which the target counts as reached

/// How the material between two propagation points is accounted for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatCorrType {
    #[default]
    None,
    /// Fast lookup, low accuracy.
    Lut,
    /// Full sampling of the crossed material.
    Full,
}

impl FromStr for MatCorrType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(MatCorrType::None),
            "lut" => Ok(MatCorrType::Lut),
            "full" => Ok(MatCorrType::Full),
            other => Err(format!("unknown material correction type '{other}', expected none, lut or full")),
        }
    }
}

impl Display for MatCorrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MatCorrType::None => write!(f, "none"),
            MatCorrType::Lut => write!(f, "lut"),
            MatCorrType::Full => write!(f, "full"),
        }
    }
}

/// Brings a track to a given x in its local frame.
///
/// # Description
///
/// Implementations advance parameters and covariance in steps of at most
/// `max_step` cm, fail as soon as |snp| reaches `max_snp` (ignored when not
/// positive) and apply material corrections according to `mat_corr` using
/// the mass hypothesis `mass`. On failure the track is left in an
/// unspecified intermediate state.
///
pub trait Propagator: Sync {
    fn propagate_to_x(
        &self,
        track: &mut TrackParCov,
        mass: f64,
        x: f64,
        max_snp: f64,
        max_step: f64,
        mat_corr: MatCorrType,
    ) -> Result<()>;
}

/// Stepping helix propagator over an arbitrary field and material description.
#[derive(Clone, Debug)]
pub struct HelixPropagator<F = UniformField, M = Vacuum> {
    pub field: F,
    pub material: M,
}

impl HelixPropagator<UniformField, Vacuum> {
    /// Homogeneous field `bz` (kG) without material.
    pub fn uniform(bz: f64) -> Self {
        HelixPropagator { field: UniformField::new(bz), material: Vacuum }
    }
}

impl<F: MagneticField, M: MaterialBudget> HelixPropagator<F, M> {
    pub fn new(field: F, material: M) -> Self {
        HelixPropagator { field, material }
    }
}

impl<F: MagneticField, M: MaterialBudget> Propagator for HelixPropagator<F, M> {
    fn propagate_to_x(
        &self,
        track: &mut TrackParCov,
        mass: f64,
        x: f64,
        max_snp: f64,
        max_step: f64,
        mat_corr: MatCorrType,
    ) -> Result<()> {
        let mut dx = x - track.x;
        // energy is lost when moving along the flight direction and restored against it
        let dir = if dx > 0.0 { 1.0 } else { -1.0 };
        while dx.abs() > X_EPSILON {
            let step = if max_step > 0.0 { dx.abs().min(max_step) } else { dx.abs() };
            let xyz0 = track.xyz_glo();
            let bz = self.field.bz(&xyz0);
            track.propagate_to(track.x + dir * step, bz)?;
            if max_snp > 0.0 && track.snp().abs() >= max_snp {
                trace!(x = track.x, snp = track.snp(), max_snp, "snp limit reached");
                return Err(PropagationError::SnpLimit { snp: track.snp(), max_snp });
            }
            if mat_corr != MatCorrType::None {
                let xyz1 = track.xyz_glo();
                let mb = self.material.mat_budget(&xyz0, &xyz1, mat_corr);
                track.correct_for_material(mb.mean_x2x0, dir * mb.mean_rho * mb.length, mass, false)?;
            }
            dx = x - track.x;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MASS_PION_CHARGED;
    use crate::propagation::material::UniformMaterial;
    use approx::assert_relative_eq;

    fn track(snp: f64, q2pt: f64) -> TrackParCov {
        TrackParCov::with_diagonal(290.0, 0.0, [0.0, 0.0, snp, 0.1, q2pt], [0.01, 0.01, 1e-4, 1e-4, 1e-3])
    }

    #[test]
    fn test_stepping_matches_single_step_in_uniform_field() {
        let prop = HelixPropagator::uniform(5.0);
        let mut stepped = track(0.1, 1.0);
        let mut direct = stepped.clone();
        prop.propagate_to_x(&mut stepped, MASS_PION_CHARGED, 350.0, 0.0, 1.0, MatCorrType::None).unwrap();
        direct.propagate_to(350.0, 5.0).unwrap();
        assert_relative_eq!(stepped.y(), direct.y(), epsilon = 1e-9);
        assert_relative_eq!(stepped.snp(), direct.snp(), epsilon = 1e-12);
        assert_relative_eq!(stepped.x, 350.0);
    }

    #[test]
    fn test_snp_limit_stops_propagation() {
        let prop = HelixPropagator::uniform(5.0);
        // q/pt = -2 bends towards positive snp at a rate of 3e-3 per cm
        let mut trk = track(0.5, -2.0);
        let err = prop
            .propagate_to_x(&mut trk, MASS_PION_CHARGED, 400.0, 0.6, 2.0, MatCorrType::None)
            .unwrap_err();
        assert!(matches!(err, PropagationError::SnpLimit { .. }));
        assert!(trk.x < 400.0);
    }

    #[test]
    fn test_material_reduces_momentum_outwards() {
        let prop = HelixPropagator::new(UniformField::new(0.0), UniformMaterial { rho: 0.01, x0: 300.0 });
        let mut trk = track(0.0, 1.0);
        let p0 = trk.p();
        prop.propagate_to_x(&mut trk, MASS_PION_CHARGED, 330.0, 0.85, 2.0, MatCorrType::Lut).unwrap();
        assert!(trk.p() < p0);
        let mut none = track(0.0, 1.0);
        prop.propagate_to_x(&mut none, MASS_PION_CHARGED, 330.0, 0.85, 2.0, MatCorrType::None).unwrap();
        assert_relative_eq!(none.p(), p0);
    }

    #[test]
    fn test_mat_corr_parsing() {
        assert_eq!("FULL".parse::<MatCorrType>().unwrap(), MatCorrType::Full);
        assert!("sometimes".parse::<MatCorrType>().is_err());
        assert_eq!(MatCorrType::Lut.to_string(), "lut");
    }
}
