use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::tracklet::Tracklet64;
use crate::geometry::McmId;

/// Noise status of the readout MCMs, loaded once per run from the conditions data.
///
/// Channels that are not listed are considered good.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseStatusMcm {
    noisy: BTreeSet<McmId>,
}

impl NoiseStatusMcm {
    pub fn new() -> Self {
        NoiseStatusMcm { noisy: BTreeSet::new() }
    }

    pub fn from_noisy<I: IntoIterator<Item = McmId>>(channels: I) -> Self {
        NoiseStatusMcm { noisy: channels.into_iter().collect() }
    }

    pub fn set_noisy(&mut self, channel: McmId) {
        self.noisy.insert(channel);
    }

    pub fn is_noisy(&self, channel: McmId) -> bool {
        self.noisy.contains(&channel)
    }

    pub fn is_tracklet_from_noisy_mcm(&self, tracklet: &Tracklet64) -> bool {
        self.is_noisy(tracklet.channel())
    }

    pub fn n_noisy(&self) -> usize {
        self.noisy.len()
    }
}
