use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum McProcess {
    #[default]
    Primary,
    Decay,
    External,
}

/// One particle as handed over to the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackTrack {
    pub do_tracking: bool,
    pub pdg: i32,
    pub momentum: [f64; 3],
    pub energy: f64,
    pub vertex: [f64; 3],
    pub tof: f64,
    pub weight: f64,
    pub status: i32,
    pub mother1: Option<usize>,
    pub mother2: Option<usize>,
    pub daughter1: Option<usize>,
    pub daughter2: Option<usize>,
    pub process: McProcess,
}

/// Receiver of the generated particles of an event.
pub trait Stack {
    fn push_track(&mut self, track: StackTrack);

    /// Number of tracks pushed in the current event.
    fn n_tracks(&self) -> usize;
}

/// Stack keeping the tracks of one event in memory.
#[derive(Clone, Debug, Default)]
pub struct McStack {
    tracks: Vec<StackTrack>,
}

impl McStack {
    pub fn new() -> Self {
        McStack::default()
    }

    pub fn tracks(&self) -> &[StackTrack] {
        &self.tracks
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

impl Stack for McStack {
    fn push_track(&mut self, track: StackTrack) {
        self.tracks.push(track);
    }

    fn n_tracks(&self) -> usize {
        self.tracks.len()
    }
}
