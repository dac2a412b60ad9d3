//! Tuning knobs of the track based calibration.

use serde::{Deserialize, Serialize};

use trdbase::calibration::reco_param::RecoParam;
use trdbase::constants::{ALMOST1, MAX_SIN_PHI, MAX_STEP};
use trdbase::histos::gain::MomentumAxis;
use trdbase::propagation::propagator::MatCorrType;

use crate::error::{CalibError, Result};

/// Configuration of [`crate::calib::TrackBasedCalib`].
///
/// All fields have defaults suited for data taken at the nominal field, so
/// a JSON file only needs to list what differs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibConfig {
    /// Solenoid field in kG.
    pub bz: f64,
    /// Largest |snp| allowed while propagating.
    pub max_snp: f64,
    /// Largest propagation step in cm.
    pub max_step: f64,
    pub mat_corr: MatCorrType,
    /// Tracklet error parametrisation; derived from `bz` when absent.
    pub reco_param: Option<RecoParam>,

    // track selection
    pub min_tracklets_ang_res: usize,
    pub min_tracklets_gain: usize,
    pub min_tracklets_refit: usize,
    pub tpc_dedx_min: f64,

    /// Extra path length of tracks crossing a pad row, relative to the geometric one.
    pub cross_row_path_scale: f64,
    pub momentum_axis: MomentumAxis,
    /// Scale of the covariance reset before a TRD-only refit.
    pub refit_cov_scale: f64,

    pub require_noise_map: bool,
    pub require_local_gain: bool,
    pub num_threads: usize,
}

impl Default for CalibConfig {
    fn default() -> Self {
        CalibConfig {
            bz: 5.0,
            max_snp: MAX_SIN_PHI,
            max_step: MAX_STEP,
            mat_corr: MatCorrType::None,
            reco_param: None,
            min_tracklets_ang_res: 3,
            min_tracklets_gain: 3,
            min_tracklets_refit: 3,
            tpc_dedx_min: 0.0,
            cross_row_path_scale: 1.5,
            momentum_axis: MomentumAxis::default(),
            refit_cov_scale: 1.0,
            require_noise_map: false,
            require_local_gain: false,
            num_threads: 1,
        }
    }
}

impl CalibConfig {
    pub fn with_bz(mut self, bz: f64) -> Self {
        self.bz = bz;
        self
    }

    pub fn with_max_snp(mut self, max_snp: f64) -> Self {
        self.max_snp = max_snp;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn with_mat_corr(mut self, mat_corr: MatCorrType) -> Self {
        self.mat_corr = mat_corr;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_momentum_axis(mut self, axis: MomentumAxis) -> Self {
        self.momentum_axis = axis;
        self
    }

    /// Tracklet error parametrisation to use with this configuration.
    pub fn reco_param(&self) -> RecoParam {
        self.reco_param.clone().unwrap_or_else(|| RecoParam::for_bfield(self.bz))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_snp > 0.0 && self.max_snp <= ALMOST1) {
            return Err(CalibError::invalid_config(format!("max_snp = {} must be in (0, 1)", self.max_snp)));
        }
        if !(self.max_step > 0.0 && self.max_step.is_finite()) {
            return Err(CalibError::invalid_config(format!("max_step = {} must be positive", self.max_step)));
        }
        if !self.bz.is_finite() {
            return Err(CalibError::invalid_config("bz must be finite"));
        }
        if self.cross_row_path_scale < 1.0 {
            return Err(CalibError::invalid_config("cross_row_path_scale must be at least 1"));
        }
        let axis = &self.momentum_axis;
        if axis.n_bins == 0 || !(axis.p_max > axis.p_min) {
            return Err(CalibError::invalid_config("momentum axis needs bins and p_max > p_min"));
        }
        if self.num_threads == 0 {
            return Err(CalibError::invalid_config("num_threads must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CalibConfig::default().validate().is_ok());
    }

    #[test]
    fn test_degenerate_values_are_rejected() {
        assert!(CalibConfig::default().with_max_step(0.0).validate().is_err());
        assert!(CalibConfig::default().with_max_snp(1.0).validate().is_err());
        assert!(CalibConfig::default().with_num_threads(0).validate().is_err());
        assert!(CalibConfig::default()
            .with_momentum_axis(MomentumAxis::new(5, 2.0, 1.0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: CalibConfig = serde_json::from_str(r#"{"max_snp": 0.6, "mat_corr": "lut"}"#).unwrap();
        assert_eq!(cfg.max_snp, 0.6);
        assert_eq!(cfg.mat_corr, MatCorrType::Lut);
        assert_eq!(cfg.max_step, MAX_STEP);
        assert_eq!(cfg.reco_param(), RecoParam::for_bfield(5.0));
    }
}
