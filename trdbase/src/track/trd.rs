use serde::{Deserialize, Serialize};

use crate::constants::MASS_PION_CHARGED;
use crate::geometry::NLAYER;
use crate::track::param::TrackParCov;

/// Track matched to TRD tracklets.
///
/// # Description
///
/// Carries the track state at the inner TRD radius, one optional tracklet
/// index per layer and a flag per layer telling whether the track crosses a
/// pad row boundary there. `ref_track` points into the seeding collection:
/// the TPC tracks for TPC-TRD tracks, the ITS-TPC tracks for ITS-TPC-TRD tracks.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackTrd {
    pub param: TrackParCov,
    pub tracklet_index: [Option<u32>; NLAYER],
    pub crossing_row: [bool; NLAYER],
    pub ref_track: u32,
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default)]
    pub chi2: f64,
}

fn default_mass() -> f64 {
    MASS_PION_CHARGED
}

impl TrackTrd {
    pub fn new(param: TrackParCov, ref_track: u32) -> Self {
        TrackTrd {
            param,
            tracklet_index: [None; NLAYER],
            crossing_row: [false; NLAYER],
            ref_track,
            mass: MASS_PION_CHARGED,
            chi2: 0.0,
        }
    }

    pub fn with_tracklet(mut self, layer: usize, index: u32) -> Self {
        self.tracklet_index[layer] = Some(index);
        self
    }

    pub fn tracklet_index(&self, layer: usize) -> Option<usize> {
        self.tracklet_index.get(layer).copied().flatten().map(|i| i as usize)
    }

    pub fn set_crossing_row(&mut self, layer: usize, crossing: bool) {
        self.crossing_row[layer] = crossing;
    }

    pub fn is_crossing_row(&self, layer: usize) -> bool {
        self.crossing_row.get(layer).copied().unwrap_or(false)
    }

    pub fn n_tracklets(&self) -> usize {
        self.tracklet_index.iter().filter(|t| t.is_some()).count()
    }

    pub fn layers_with_tracklets(&self) -> impl Iterator<Item = usize> + '_ {
        self.tracklet_index
            .iter()
            .enumerate()
            .filter_map(|(layer, t)| t.map(|_| layer))
    }
}
