use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::geometry::{layer_of, NCHAMBER, NLAYER};

pub const NBINSANGLEDIFF: usize = 25;
pub const MAXIMPACTANGLE: f64 = 25.0; // degrees
pub const INVBINWIDTH: f64 = NBINSANGLEDIFF as f64 / (2.0 * MAXIMPACTANGLE);

/// Angular residuals between tracklets and tracks, per chamber and impact angle.
///
/// # Description
///
/// Each bin holds the sum of the residuals (degrees) and the number of
/// entries, so the mean residual per bin can be fitted later to extract the
/// drift velocity and the Lorentz angle of each chamber.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct AngularResidHistos {
    histogram_entries: Vec<f64>,
    n_entries_per_bin: Vec<u32>,
    n_entries_total: u64,
}

impl Default for AngularResidHistos {
    fn default() -> Self {
        AngularResidHistos::new()
    }
}

impl AngularResidHistos {
    pub fn new() -> Self {
        AngularResidHistos {
            histogram_entries: vec![0.0; NCHAMBER * NBINSANGLEDIFF],
            n_entries_per_bin: vec![0; NCHAMBER * NBINSANGLEDIFF],
            n_entries_total: 0,
        }
    }

    /// Bin of an impact angle in degrees, `None` outside the histogram range.
    pub fn angle_bin(impact_angle: f64) -> Option<usize> {
        if impact_angle.abs() >= MAXIMPACTANGLE || !impact_angle.is_finite() {
            return None;
        }
        let bin = ((impact_angle + MAXIMPACTANGLE) * INVBINWIDTH) as usize;
        Some(bin.min(NBINSANGLEDIFF - 1))
    }

    /// Adds one residual.
    ///
    /// # Arguments
    ///
    /// * `delta_alpha` - tracklet angle minus track angle, degrees
    /// * `impact_angle` - track angle, degrees; only `(-25, 25)` is binned
    /// * `chamber` - detector index
    ///
    /// # Returns
    ///
    /// * `false` if the impact angle or chamber is out of range, nothing is added then
    ///
    /// # Example
    ///
    /// ```
    /// use trdbase::histos::angular::AngularResidHistos;
    ///
    /// let mut histos = AngularResidHistos::new();
    /// assert!(histos.add_entry(0.4, 3.0, 17));
    /// assert!(!histos.add_entry(0.4, 30.0, 17));
    /// let bin = AngularResidHistos::angle_bin(3.0).unwrap();
    /// assert_eq!(histos.mean_residual(17, bin), Some(0.4));
    /// assert_eq!(histos.n_entries(), 1);
    /// ```
    pub fn add_entry(&mut self, delta_alpha: f64, impact_angle: f64, chamber: usize) -> bool {
        if chamber >= NCHAMBER {
            return false;
        }
        match AngularResidHistos::angle_bin(impact_angle) {
            Some(bin) => {
                let idx = chamber * NBINSANGLEDIFF + bin;
                self.histogram_entries[idx] += delta_alpha;
                self.n_entries_per_bin[idx] += 1;
                self.n_entries_total += 1;
                true
            }
            None => false,
        }
    }

    pub fn bin_content(&self, chamber: usize, bin: usize) -> f64 {
        self.histogram_entries[chamber * NBINSANGLEDIFF + bin]
    }

    pub fn bin_entries(&self, chamber: usize, bin: usize) -> u32 {
        self.n_entries_per_bin[chamber * NBINSANGLEDIFF + bin]
    }

    /// Mean residual of a bin, `None` when empty.
    pub fn mean_residual(&self, chamber: usize, bin: usize) -> Option<f64> {
        match self.bin_entries(chamber, bin) {
            0 => None,
            n => Some(self.bin_content(chamber, bin) / n as f64),
        }
    }

    pub fn n_entries(&self) -> u64 {
        self.n_entries_total
    }

    pub fn chamber_entries(&self, chamber: usize) -> u32 {
        let start = chamber * NBINSANGLEDIFF;
        self.n_entries_per_bin[start..start + NBINSANGLEDIFF].iter().sum()
    }

    /// Entries summed over all chambers of each layer, per angle bin.
    pub fn layer_projection(&self) -> [[u32; NBINSANGLEDIFF]; NLAYER] {
        let mut proj = [[0u32; NBINSANGLEDIFF]; NLAYER];
        for (chamber, bins) in self.n_entries_per_bin.chunks(NBINSANGLEDIFF).enumerate() {
            for (bin, n) in bins.iter().enumerate() {
                proj[layer_of(chamber)][bin] += n;
            }
        }
        proj
    }

    pub fn layer_entries(&self, layer: usize) -> u32 {
        self.layer_projection()[layer].iter().sum()
    }

    pub fn merge(&mut self, other: &AngularResidHistos) {
        for (a, b) in self.histogram_entries.iter_mut().zip(other.histogram_entries.iter()) {
            *a += b;
        }
        for (a, b) in self.n_entries_per_bin.iter_mut().zip(other.n_entries_per_bin.iter()) {
            *a += b;
        }
        self.n_entries_total += other.n_entries_total;
    }

    pub fn reset(&mut self) {
        self.histogram_entries.iter_mut().for_each(|v| *v = 0.0);
        self.n_entries_per_bin.iter_mut().for_each(|v| *v = 0);
        self.n_entries_total = 0;
    }
}
