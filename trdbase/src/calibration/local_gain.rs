use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::McmId;

/// Relative gain of each readout channel, from the krypton calibration.
///
/// # Description
///
/// A missing or non-positive entry means that no correction is known for
/// that channel; callers then use the raw charge.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalGainFactor {
    factors: BTreeMap<u32, f64>,
}

impl LocalGainFactor {
    pub fn new() -> Self {
        LocalGainFactor { factors: BTreeMap::new() }
    }

    pub fn set_value(&mut self, channel: McmId, factor: f64) {
        self.factors.insert(channel.0, factor);
    }

    /// Gain factor of `channel` if a usable one is stored.
    pub fn value(&self, channel: McmId) -> Option<f64> {
        self.factors
            .get(&channel.0)
            .copied()
            .filter(|f| f.is_finite() && *f > 0.0)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
