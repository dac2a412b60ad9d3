use serde::{Deserialize, Serialize};

use trdbase::data::tracklet::{CalibratedTracklet, Tracklet64};
use trdbase::track::reference::{TrackTpc, TrackTpcIts};
use trdbase::track::trd::TrackTrd;

/// Seeding detector of a TRD track, which decides where its reference dE/dx is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackSource {
    /// ITS-TPC-TRD tracks, `ref_track` points into the ITS-TPC tracks.
    ItsTpc,
    /// TPC-TRD tracks, `ref_track` points into the TPC tracks.
    Tpc,
}

/// Read-only view of one calibration cycle's reconstruction output.
///
/// Raw and calibrated tracklets share their indexing: the calibrated
/// tracklet `i` belongs to the raw tracklet `i`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputBundle<'a> {
    pub tracks_its_tpc_trd: &'a [TrackTrd],
    pub tracks_tpc_trd: &'a [TrackTrd],
    pub tracklets_raw: &'a [Tracklet64],
    pub tracklets_calib: &'a [CalibratedTracklet],
    pub tracks_tpc: &'a [TrackTpc],
    pub tracks_its_tpc: &'a [TrackTpcIts],
}

impl<'a> InputBundle<'a> {
    pub fn tracks(&self, source: TrackSource) -> &'a [TrackTrd] {
        match source {
            TrackSource::ItsTpc => self.tracks_its_tpc_trd,
            TrackSource::Tpc => self.tracks_tpc_trd,
        }
    }

    /// Reference dE/dx of a track, `None` if the reference chain is broken.
    pub fn reference_dedx(&self, track: &TrackTrd, source: TrackSource) -> Option<f64> {
        let tpc_index = match source {
            TrackSource::Tpc => track.ref_track as usize,
            TrackSource::ItsTpc => self.tracks_its_tpc.get(track.ref_track as usize)?.ref_tpc as usize,
        };
        self.tracks_tpc.get(tpc_index).map(|t| t.dedx_tot)
    }
}

/// Owned input as stored on disk, see [`InputData::bundle`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputData {
    pub tracks_its_tpc_trd: Vec<TrackTrd>,
    pub tracks_tpc_trd: Vec<TrackTrd>,
    pub tracklets_raw: Vec<Tracklet64>,
    pub tracklets_calib: Vec<CalibratedTracklet>,
    pub tracks_tpc: Vec<TrackTpc>,
    pub tracks_its_tpc: Vec<TrackTpcIts>,
}

impl InputData {
    pub fn bundle(&self) -> InputBundle<'_> {
        InputBundle {
            tracks_its_tpc_trd: &self.tracks_its_tpc_trd,
            tracks_tpc_trd: &self.tracks_tpc_trd,
            tracklets_raw: &self.tracklets_raw,
            tracklets_calib: &self.tracklets_calib,
            tracks_tpc: &self.tracks_tpc,
            tracks_its_tpc: &self.tracks_its_tpc,
        }
    }
}
