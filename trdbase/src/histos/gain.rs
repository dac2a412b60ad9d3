use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::geometry::McmId;

/// Linear momentum binning of the gain calibration histograms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MomentumAxis {
    pub n_bins: usize,
    pub p_min: f64,
    pub p_max: f64,
}

impl Default for MomentumAxis {
    fn default() -> Self {
        MomentumAxis { n_bins: 10, p_min: 0.5, p_max: 5.5 }
    }
}

impl MomentumAxis {
    pub fn new(n_bins: usize, p_min: f64, p_max: f64) -> Self {
        MomentumAxis { n_bins, p_min, p_max }
    }

    pub fn bin_width(&self) -> f64 {
        (self.p_max - self.p_min) / self.n_bins as f64
    }

    /// Bin of momentum `p` in GeV/c, `None` outside [p_min, p_max).
    ///
    /// # Example
    ///
    /// ```
    /// use trdbase::histos::gain::MomentumAxis;
    ///
    /// let axis = MomentumAxis::new(10, 0.5, 5.5);
    /// assert_eq!(axis.bin(0.5), Some(0));
    /// assert_eq!(axis.bin(1.7), Some(2));
    /// assert_eq!(axis.bin(5.5), None);
    /// ```
    pub fn bin(&self, p: f64) -> Option<usize> {
        if !(p >= self.p_min && p < self.p_max) {
            return None;
        }
        let bin = ((p - self.p_min) / self.bin_width()) as usize;
        Some(bin.min(self.n_bins - 1))
    }

    pub fn edges(&self) -> Vec<(f64, f64)> {
        (0..=self.n_bins)
            .map(|i| self.p_min + i as f64 * self.bin_width())
            .tuple_windows()
            .collect()
    }
}

/// Weighted charge statistics of one (channel, momentum bin) cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ChargeProfile {
    pub entries: u64,
    pub sum_w: f64,
    pub sum_wq: f64,
    pub sum_wq2: f64,
}

impl ChargeProfile {
    pub fn fill(&mut self, charge: f64, weight: f64) {
        self.entries += 1;
        self.sum_w += weight;
        self.sum_wq += weight * charge;
        self.sum_wq2 += weight * charge * charge;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.sum_w > 0.0 { Some(self.sum_wq / self.sum_w) } else { None }
    }

    pub fn rms(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some((self.sum_wq2 / self.sum_w - mean * mean).max(0.0).sqrt())
    }

    pub fn merge(&mut self, other: &ChargeProfile) {
        self.entries += other.entries;
        self.sum_w += other.sum_w;
        self.sum_wq += other.sum_wq;
        self.sum_wq2 += other.sum_wq2;
    }
}

/// Normalised tracklet charges per readout channel and momentum bin,
/// weighted with the dE/dx of the reference detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct GainCalibHistos {
    axis: MomentumAxis,
    profiles: BTreeMap<u64, ChargeProfile>,
    n_entries_total: u64,
}

impl Default for GainCalibHistos {
    fn default() -> Self {
        GainCalibHistos::new(MomentumAxis::default())
    }
}

impl GainCalibHistos {
    pub fn new(axis: MomentumAxis) -> Self {
        GainCalibHistos { axis, profiles: BTreeMap::new(), n_entries_total: 0 }
    }

    pub fn axis(&self) -> &MomentumAxis {
        &self.axis
    }

    fn key(&self, channel: McmId, p_bin: usize) -> u64 {
        channel.0 as u64 * self.axis.n_bins as u64 + p_bin as u64
    }

    /// Adds one normalised charge sample.
    ///
    /// # Arguments
    ///
    /// * `channel` - readout channel of the tracklet
    /// * `p` - track momentum, GeV/c
    /// * `charge` - tracklet charge divided by gain factor and path length
    /// * `weight` - dE/dx of the reference track
    ///
    /// # Returns
    ///
    /// * `false` if `p` is outside the momentum axis
    ///
    /// # Example
    ///
    /// ```
    /// use trdbase::geometry::McmId;
    /// use trdbase::histos::gain::{GainCalibHistos, MomentumAxis};
    ///
    /// let mut histos = GainCalibHistos::new(MomentumAxis::default());
    /// let channel = McmId::new(12, 3, 5);
    /// assert!(histos.fill(channel, 1.0, 300.0, 60.0));
    /// assert!(histos.fill(channel, 1.0, 500.0, 60.0));
    /// assert!(!histos.fill(channel, 9.0, 500.0, 60.0));
    /// let bin = histos.axis().bin(1.0).unwrap();
    /// assert_eq!(histos.profile(channel, bin).unwrap().mean(), Some(400.0));
    /// assert_eq!(histos.channel_entries(channel), 2);
    /// ```
    pub fn fill(&mut self, channel: McmId, p: f64, charge: f64, weight: f64) -> bool {
        match self.axis.bin(p) {
            Some(bin) => {
                let key = self.key(channel, bin);
                self.profiles.entry(key).or_default().fill(charge, weight);
                self.n_entries_total += 1;
                true
            }
            None => false,
        }
    }

    pub fn profile(&self, channel: McmId, p_bin: usize) -> Option<&ChargeProfile> {
        self.profiles.get(&self.key(channel, p_bin))
    }

    /// All filled cells as (channel, momentum bin, profile).
    pub fn iter(&self) -> impl Iterator<Item = (McmId, usize, &ChargeProfile)> + '_ {
        let n_bins = self.axis.n_bins as u64;
        self.profiles
            .iter()
            .map(move |(k, v)| (McmId((k / n_bins) as u32), (k % n_bins) as usize, v))
    }

    pub fn channel_entries(&self, channel: McmId) -> u64 {
        (0..self.axis.n_bins)
            .filter_map(|bin| self.profile(channel, bin))
            .map(|p| p.entries)
            .sum()
    }

    pub fn n_entries(&self) -> u64 {
        self.n_entries_total
    }

    pub fn n_filled_cells(&self) -> usize {
        self.profiles.len()
    }

    pub fn merge(&mut self, other: &GainCalibHistos) {
        for (key, profile) in &other.profiles {
            self.profiles.entry(*key).or_default().merge(profile);
        }
        self.n_entries_total += other.n_entries_total;
    }

    pub fn reset(&mut self) {
        self.profiles.clear();
        self.n_entries_total = 0;
    }
}
