use serde::{Deserialize, Serialize};

use crate::geometry::{layer_of, sector_of, stack_of, McmId};

/// Raw tracklet as delivered by the front-end electronics.
///
/// # Description
///
/// Identifies the chamber, readout board and MCM that produced the
/// tracklet, the pad row and column, and the three charge windows
/// accumulated along the drift time.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tracklet64 {
    pub detector: u16,
    pub rob: u8,
    pub mcm: u8,
    pub pad_row: u8,
    #[serde(default)]
    pub pad_col: u8,
    pub charges: [u16; 3],
}

impl Tracklet64 {
    pub fn new(detector: u16, rob: u8, mcm: u8, pad_row: u8, charges: [u16; 3]) -> Self {
        Tracklet64 { detector, rob, mcm, pad_row, pad_col: 0, charges }
    }

    pub fn detector(&self) -> usize {
        self.detector as usize
    }

    pub fn sector(&self) -> usize {
        sector_of(self.detector())
    }

    pub fn stack(&self) -> usize {
        stack_of(self.detector())
    }

    pub fn layer(&self) -> usize {
        layer_of(self.detector())
    }

    pub fn channel(&self) -> McmId {
        McmId::new(self.detector(), self.rob as usize, self.mcm as usize)
    }

    /// Sum of the three charge windows.
    pub fn total_charge(&self) -> f64 {
        self.charges.iter().map(|&q| q as f64).sum()
    }
}

/// Tracklet position and deflection in the local frame of its sector,
/// after drift velocity, time offset and Lorentz angle corrections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibratedTracklet {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dy: f64,
}

impl CalibratedTracklet {
    pub fn new(x: f64, y: f64, z: f64, dy: f64) -> Self {
        CalibratedTracklet { x, y, z, dy }
    }
}
