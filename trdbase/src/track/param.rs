use std::f64::consts::PI;

use nalgebra::{Matrix2, Matrix2x5, Matrix5, Point3, Vector2, Vector5};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ALMOST0, ALMOST1, B2C, BB_DENSITY, BB_K, BB_MEAN_I, BB_MEAN_ZA, BB_X0, BB_X1,
    DE_RELATIVE_FLUCTUATION, MASS_ELECTRON, MAX_RELATIVE_DE, MIN_P, MS_CONST2,
};
use crate::error::{PropagationError, Result};
use crate::geometry::normalize_angle;

pub const K_Y: usize = 0;
pub const K_Z: usize = 1;
pub const K_SNP: usize = 2;
pub const K_TGL: usize = 3;
pub const K_Q2PT: usize = 4;

/// Diagonal used when the covariance is reset before a refit.
const RESET_COV_DIAG: [f64; 5] = [4.0, 4.0, 4e-2, 4e-2, 1.0];

/// Index of element (i, j) in the packed lower triangular covariance.
pub fn cov_index(i: usize, j: usize) -> usize {
    let (r, c) = if i >= j { (i, j) } else { (j, i) };
    r * (r + 1) / 2 + c
}

/// Track parameters with covariance in the local frame of a sector.
///
/// # Description
///
/// The frame is rotated by `alpha` around the beam axis; `x` is the radial
/// coordinate of the reference plane. The five parameters are the local `y`,
/// `z`, the sine of the crossing angle `snp`, the dip tangent `tgl` and the
/// signed inverse transverse momentum `q/pt` in (GeV/c)^-1. The covariance is
/// stored as 15 packed lower triangular elements.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackParCov {
    pub x: f64,
    pub alpha: f64,
    pub par: [f64; 5],
    pub cov: [f64; 15],
}

impl TrackParCov {
    pub fn new(x: f64, alpha: f64, par: [f64; 5], cov: [f64; 15]) -> Self {
        TrackParCov { x, alpha: normalize_angle(alpha), par, cov }
    }

    /// Creates a track with a diagonal covariance.
    pub fn with_diagonal(x: f64, alpha: f64, par: [f64; 5], diag: [f64; 5]) -> Self {
        let mut cov = [0.0; 15];
        for (i, d) in diag.iter().enumerate() {
            cov[cov_index(i, i)] = *d;
        }
        TrackParCov::new(x, alpha, par, cov)
    }

    pub fn y(&self) -> f64 { self.par[K_Y] }
    pub fn z(&self) -> f64 { self.par[K_Z] }
    pub fn snp(&self) -> f64 { self.par[K_SNP] }
    pub fn tgl(&self) -> f64 { self.par[K_TGL] }
    pub fn q2pt(&self) -> f64 { self.par[K_Q2PT] }

    pub fn sigma_y2(&self) -> f64 { self.cov[cov_index(K_Y, K_Y)] }
    pub fn sigma_z2(&self) -> f64 { self.cov[cov_index(K_Z, K_Z)] }
    pub fn sigma_snp2(&self) -> f64 { self.cov[cov_index(K_SNP, K_SNP)] }

    pub fn charge(&self) -> i32 {
        if self.q2pt() < 0.0 { -1 } else { 1 }
    }

    pub fn pt(&self) -> f64 {
        let q2pt = self.q2pt().abs();
        if q2pt < ALMOST0 { f64::MAX } else { 1.0 / q2pt }
    }

    pub fn p(&self) -> f64 {
        self.pt() * (1.0 + self.tgl() * self.tgl()).sqrt()
    }

    /// Curvature in 1/cm for a field `bz` given in kG.
    pub fn curvature(&self, bz: f64) -> f64 {
        self.q2pt() * bz * B2C
    }

    /// Position in the global frame.
    pub fn xyz_glo(&self) -> Point3<f64> {
        let (sa, ca) = self.alpha.sin_cos();
        Point3::new(self.x * ca - self.y() * sa, self.x * sa + self.y() * ca, self.z())
    }

    pub fn cov_matrix(&self) -> Matrix5<f64> {
        Matrix5::from_fn(|i, j| self.cov[cov_index(i, j)])
    }

    pub fn set_cov_matrix(&mut self, m: &Matrix5<f64>) {
        for i in 0..5 {
            for j in 0..=i {
                // symmetrise to keep rounding from accumulating
                self.cov[cov_index(i, j)] = 0.5 * (m[(i, j)] + m[(j, i)]);
            }
        }
    }

    /// Replaces the covariance by a large diagonal one scaled by `s2`.
    pub fn reset_covariance(&mut self, s2: f64) {
        let scale = if s2 > ALMOST0 { s2 } else { 1.0 };
        self.cov = [0.0; 15];
        for (i, d) in RESET_COV_DIAG.iter().enumerate() {
            self.cov[cov_index(i, i)] = d * scale;
        }
    }

    /// Propagates parameters and covariance to `xk` in a homogeneous field `bz` (kG).
    ///
    /// # Arguments
    ///
    /// * `xk` - target x in the local frame, cm
    /// * `bz` - field along z, kG
    ///
    /// # Returns
    ///
    /// * `Err(PropagationError::NotReachable)` if the helix does not reach `xk`;
    ///   the track is unchanged in that case
    ///
    /// # Example
    ///
    /// ```
    /// use trdbase::track::param::TrackParCov;
    ///
    /// let mut trk = TrackParCov::with_diagonal(290.0, 0.0, [0.0, 0.0, 0.5, 0.0, 1.0], [0.01, 0.01, 1e-4, 1e-4, 1e-2]);
    /// trk.propagate_to(300.0, 0.0).unwrap();
    /// assert!((trk.y() - 10.0 * 30f64.to_radians().tan()).abs() < 1e-9);
    /// assert!(trk.propagate_to(1000.0, 20.0).is_err());
    /// ```
    pub fn propagate_to(&mut self, xk: f64, bz: f64) -> Result<()> {
        let dx = xk - self.x;
        if dx.abs() < ALMOST0 {
            self.x = xk;
            return Ok(());
        }
        let crv = self.curvature(bz);
        let x2r = crv * dx;
        let f1 = self.snp();
        let f2 = f1 + x2r;
        if f1.abs() > ALMOST1 || f2.abs() > ALMOST1 {
            return Err(PropagationError::NotReachable { x: xk });
        }
        let r1 = ((1.0 - f1) * (1.0 + f1)).sqrt();
        let r2 = ((1.0 - f2) * (1.0 + f2)).sqrt();
        if r1 < ALMOST0 || r2 < ALMOST0 {
            return Err(PropagationError::NotReachable { x: xk });
        }
        let tgl = self.tgl();
        let dy2dx = (f1 + f2) / (r1 + r2);
        let dz = if x2r.abs() < 0.05 {
            dx * (r2 + f2 * dy2dx) * tgl
        } else {
            // arc length along the circle for large bending
            let arg = r1 * f2 - r2 * f1;
            if arg.abs() > ALMOST1 {
                return Err(PropagationError::NotReachable { x: xk });
            }
            let mut rot = arg.asin();
            if f1 * f1 + f2 * f2 > 1.0 && f1 * f2 < 0.0 {
                rot = if f2 > 0.0 { PI - rot } else { -PI - rot };
            }
            tgl / crv * rot
        };

        let rinv = 1.0 / r1;
        let r3inv = rinv * rinv * rinv;
        let f24 = dx * bz * B2C;
        let f02 = dx * r3inv;
        let f04 = 0.5 * f24 * f02;
        let f12 = f02 * tgl * f1;
        let f14 = 0.5 * f24 * f12;
        let f13 = dx * rinv;

        let mut jac = Matrix5::<f64>::identity();
        jac[(K_Y, K_SNP)] = f02;
        jac[(K_Y, K_Q2PT)] = f04;
        jac[(K_Z, K_SNP)] = f12;
        jac[(K_Z, K_TGL)] = f13;
        jac[(K_Z, K_Q2PT)] = f14;
        jac[(K_SNP, K_Q2PT)] = f24;

        self.x = xk;
        self.par[K_Y] += dx * dy2dx;
        self.par[K_Z] += dz;
        self.par[K_SNP] = f2;

        let c = self.cov_matrix();
        self.set_cov_matrix(&(jac * c * jac.transpose()));
        Ok(())
    }

    /// Rotates the local frame to `alpha`.
    pub fn rotate(&mut self, alpha: f64) -> Result<()> {
        let alpha = normalize_angle(alpha);
        let (sa, ca) = (alpha - self.alpha).sin_cos();
        let snp = self.snp();
        let mut csp = ((1.0 - snp) * (1.0 + snp)).sqrt();
        // the direction along x must not flip
        if csp * ca + snp * sa < 0.0 {
            return Err(PropagationError::Rotation { alpha });
        }
        let upd_snp = snp * ca - csp * sa;
        if upd_snp.abs() > ALMOST1 {
            return Err(PropagationError::Rotation { alpha });
        }
        let (xold, yold) = (self.x, self.y());
        self.alpha = alpha;
        self.x = xold * ca + yold * sa;
        self.par[K_Y] = -xold * sa + yold * ca;
        self.par[K_SNP] = upd_snp;

        if csp.abs() < ALMOST0 {
            csp = ALMOST0;
        }
        let rr = ca + snp / csp * sa;
        let jac = Matrix5::from_diagonal(&Vector5::new(ca, 1.0, rr, 1.0, 1.0));
        let c = self.cov_matrix();
        self.set_cov_matrix(&(jac * c * jac.transpose()));
        Ok(())
    }

    /// Applies multiple scattering and energy loss for a crossed layer.
    ///
    /// # Arguments
    ///
    /// * `x2x0` - thickness in units of radiation length
    /// * `xrho` - thickness times density in g/cm^2, positive when energy is lost
    /// * `mass` - mass hypothesis in GeV/c^2
    /// * `angle_corr` - scale the thickness by the inclination of the track
    ///
    pub fn correct_for_material(&mut self, mut x2x0: f64, mut xrho: f64, mass: f64, angle_corr: bool) -> Result<()> {
        let snp = self.snp();
        let tgl = self.tgl();
        let csp2 = (1.0 - snp) * (1.0 + snp);
        let cst2i = 1.0 + tgl * tgl;
        if csp2 < ALMOST0 {
            return Err(PropagationError::material("track parallel to the layer"));
        }
        if angle_corr {
            let angle = (cst2i / csp2).sqrt();
            x2x0 *= angle;
            xrho *= angle;
        }
        let p = self.p().max(MIN_P);
        let p2 = p * p;
        let mass2 = mass * mass;
        let e2 = p2 + mass2;
        let beta2 = p2 / e2;

        let mut c = self.cov_matrix();
        if x2x0 != 0.0 {
            let theta2 = MS_CONST2 / (beta2 * p2) * x2x0.abs();
            let fp34 = tgl * self.q2pt();
            let t2c2i = theta2 * cst2i;
            c[(K_SNP, K_SNP)] += t2c2i * csp2;
            c[(K_TGL, K_TGL)] += t2c2i * cst2i;
            c[(K_Q2PT, K_TGL)] += t2c2i * fp34;
            c[(K_TGL, K_Q2PT)] += t2c2i * fp34;
            c[(K_Q2PT, K_Q2PT)] += t2c2i * fp34 * fp34;
        }

        if xrho != 0.0 && mass > 0.0 {
            let de = bethe_bloch_solid(p / mass) * xrho;
            let e = e2.sqrt();
            if de.abs() > MAX_RELATIVE_DE * e {
                return Err(PropagationError::material(format!("energy loss {de:.4} GeV too large for E = {e:.4} GeV")));
            }
            let e_new = e - de;
            let p2_new = e_new * e_new - mass2;
            if p2_new < MIN_P * MIN_P {
                return Err(PropagationError::material("particle stopped"));
            }
            let c_p4 = p / p2_new.sqrt();
            self.par[K_Q2PT] *= c_p4;
            for k in 0..5 {
                c[(K_Q2PT, k)] *= c_p4;
                c[(k, K_Q2PT)] *= c_p4;
            }
            let sigma_de = DE_RELATIVE_FLUCTUATION * de.abs();
            let sigma_q2pt = self.q2pt().abs() * e_new * sigma_de / p2_new;
            c[(K_Q2PT, K_Q2PT)] += sigma_q2pt * sigma_q2pt;
        }
        self.set_cov_matrix(&c);
        Ok(())
    }

    fn residual_system(&self, meas: [f64; 2], meas_cov: [f64; 3]) -> Result<(Matrix2x5<f64>, Vector2<f64>, Matrix2<f64>)> {
        let h = Matrix2x5::new(
            1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0,
        );
        let r = Matrix2::new(meas_cov[0], meas_cov[1], meas_cov[1], meas_cov[2]);
        let s = h * self.cov_matrix() * h.transpose() + r;
        let s_inv = s
            .try_inverse()
            .ok_or_else(|| PropagationError::update("singular residual covariance"))?;
        let res = Vector2::new(meas[0] - self.y(), meas[1] - self.z());
        Ok((h, res, s_inv))
    }

    /// Kalman update with a (y, z) measurement. Returns the chi2 of the update.
    pub fn update(&mut self, meas: [f64; 2], meas_cov: [f64; 3]) -> Result<f64> {
        let (h, res, s_inv) = self.residual_system(meas, meas_cov)?;
        let c = self.cov_matrix();
        let gain = c * h.transpose() * s_inv;
        let delta = gain * res;
        let new_snp = self.snp() + delta[K_SNP];
        if new_snp.abs() > ALMOST1 {
            return Err(PropagationError::update(format!("updated snp {new_snp:.4} out of range")));
        }
        for (p, d) in self.par.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        let c_new = (Matrix5::identity() - gain * h) * c;
        self.set_cov_matrix(&c_new);
        Ok(res.dot(&(s_inv * res)))
    }
}

/// Mean energy loss in GeV cm^2/g for a given beta*gamma, parametrised for silicon-like solids.
pub fn bethe_bloch_solid(bg: f64) -> f64 {
    let bg2 = bg * bg;
    let max_t = 2.0 * MASS_ELECTRON * bg2;
    let x = bg.ln();
    let lhw_i = (28.816e-9 * (BB_DENSITY * BB_MEAN_ZA).sqrt() / BB_MEAN_I).ln();
    let d2 = if x > BB_X1 {
        lhw_i + x - 0.5
    } else if x > BB_X0 {
        let r = (BB_X1 - x) / (BB_X1 - BB_X0);
        lhw_i + x - 0.5 + (0.5 - lhw_i - BB_X0) * r * r * r
    } else {
        0.0
    };
    BB_K * BB_MEAN_ZA * (1.0 + bg2) / bg2
        * (0.5 * (2.0 * MASS_ELECTRON * bg2 * max_t / (BB_MEAN_I * BB_MEAN_I)).ln() - bg2 / (1.0 + bg2) - d2)
}
