use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::header::McEventHeader;
use crate::stack::McProcess;
use crate::status::McGenStatus;

/// A particle as produced by an event generator, before the event vertex
/// and the stack index offset are applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedParticle {
    pub pdg: i32,
    pub momentum: [f64; 3],
    /// Vertex relative to the interaction point.
    pub vertex: [f64; 3],
    /// Energy in GeV, negative to derive it from the mass.
    pub energy: f64,
    pub mother1: Option<usize>,
    pub mother2: Option<usize>,
    pub daughter1: Option<usize>,
    pub daughter2: Option<usize>,
    pub want_tracking: bool,
    pub tof: f64,
    pub weight: f64,
    pub process: McProcess,
    pub status: i32,
}

impl GeneratedParticle {
    /// Final state primary at the interaction point.
    pub fn new(pdg: i32, momentum: [f64; 3]) -> Self {
        GeneratedParticle {
            pdg,
            momentum,
            vertex: [0.0; 3],
            energy: -1.0,
            mother1: None,
            mother2: None,
            daughter1: None,
            daughter2: None,
            want_tracking: true,
            tof: 0.0,
            weight: 1.0,
            process: McProcess::Primary,
            status: McGenStatus::new(1, 0).full_encoding(),
        }
    }

    pub fn with_vertex(mut self, vertex: [f64; 3]) -> Self {
        self.vertex = vertex;
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_mothers(mut self, mother1: Option<usize>, mother2: Option<usize>) -> Self {
        self.mother1 = mother1;
        self.mother2 = mother2;
        self
    }

    pub fn with_daughters(mut self, daughter1: Option<usize>, daughter2: Option<usize>) -> Self {
        self.daughter1 = daughter1;
        self.daughter2 = daughter2;
        self
    }

    pub fn with_tracking(mut self, want_tracking: bool) -> Self {
        self.want_tracking = want_tracking;
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn with_process(mut self, process: McProcess) -> Self {
        self.process = process;
        self
    }
}

/// Source of the particles of one event.
pub trait Generator: Send {
    fn name(&self) -> &str;

    /// Called with the background event header before generating on top of it.
    fn notify_embedding(&mut self, _header: &McEventHeader) {}

    /// Produces the particles of the next event; indices refer to this list.
    fn read_event(&mut self) -> Result<Vec<GeneratedParticle>>;
}
