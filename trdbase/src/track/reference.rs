//! Tracks of the seeding detectors, used here only as dE/dx references.

use serde::{Deserialize, Serialize};

/// TPC track with its truncated-mean energy loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackTpc {
    pub dedx_tot: f64,
    #[serde(default)]
    pub dedx_max: f64,
}

impl TrackTpc {
    pub fn new(dedx_tot: f64) -> Self {
        TrackTpc { dedx_tot, dedx_max: 0.0 }
    }
}

/// ITS-TPC matched track; the dE/dx lives on the referenced TPC track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackTpcIts {
    pub ref_tpc: u32,
    #[serde(default)]
    pub ref_its: u32,
}

impl TrackTpcIts {
    pub fn new(ref_tpc: u32) -> Self {
        TrackTpcIts { ref_tpc, ref_its: 0 }
    }
}
