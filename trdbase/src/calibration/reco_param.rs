use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reconstruction parameters needed to use tracklets as measurements.
///
/// # Description
///
/// The r-phi resolution of a tracklet depends on the track inclination and
/// is parametrised as `a2 + c2 * (snp - b)^2`, with coefficients depending on
/// the magnetic field. The z position of tracklets from tracks that do not
/// cross a pad row is biased proportionally to `tgl`.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoParam {
    pub a2: f64,
    pub b: f64,
    pub c2: f64,
    pub z_corr_coef_nrc: f64,
}

impl Default for RecoParam {
    fn default() -> Self {
        // sigma_y = 1 cm when no parametrisation is known
        RecoParam { a2: 1.0, b: 0.0, c2: 0.0, z_corr_coef_nrc: 1.4 }
    }
}

impl RecoParam {
    /// Parametrisation for the field `bz` in kG.
    pub fn for_bfield(bz: f64) -> Self {
        let mut param = RecoParam::default();
        param.set_bfield(bz);
        param
    }

    pub fn set_bfield(&mut self, bz: f64) {
        if (bz.abs() - 2.0).abs() < 0.1 {
            self.a2 = 1.6e-3;
            self.b = if bz > 0.0 { -1.43e-2 } else { 1.43e-2 };
            self.c2 = 4.55e-2;
        } else if (bz.abs() - 5.0).abs() < 0.1 {
            self.a2 = 1.6e-3;
            self.b = if bz > 0.0 { 0.125 } else { -0.14 };
            self.c2 = if bz > 0.0 { 0.0961 } else { 0.1156 };
        } else {
            warn!(bz, "no tracklet error parametrisation for this field, keeping sigma_y = 1 cm");
        }
    }

    pub fn rphi_res(&self, snp: f64) -> f64 {
        self.a2 + self.c2 * (snp - self.b) * (snp - self.b)
    }

    /// Tracklet covariance (syy, syz, szz) for tilted pads of length `row_size`.
    pub fn tracklet_cov(&self, tilt: f64, snp: f64, row_size: f64) -> [f64; 3] {
        let t2 = tilt * tilt;
        let c2 = 1.0 / (1.0 + t2);
        let sy2 = self.rphi_res(snp);
        let sz2 = row_size * row_size / 12.0;
        [c2 * (sy2 + t2 * sz2), c2 * tilt * (sz2 - sy2), c2 * (t2 * sy2 + sz2)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_field_parametrisation() {
        let param = RecoParam::for_bfield(5.0);
        assert_relative_eq!(param.rphi_res(0.125), 1.6e-3);
        let unknown = RecoParam::for_bfield(3.0);
        assert_relative_eq!(unknown.rphi_res(0.4), 1.0);
    }

    #[test]
    fn test_untilted_covariance_is_diagonal() {
        let param = RecoParam::default();
        let cov = param.tracklet_cov(0.0, 0.0, 6.0);
        assert_relative_eq!(cov[0], 1.0);
        assert_relative_eq!(cov[1], 0.0);
        assert_relative_eq!(cov[2], 3.0);
    }
}
