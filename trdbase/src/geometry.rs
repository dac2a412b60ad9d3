//! TRD chamber layout arithmetic.
//!
//! The detector has 18 azimuthal sectors, 5 stacks along the beam and 6
//! radial layers per stack. A chamber ("detector") is addressed by
//! `sector * 30 + stack * 6 + layer`. Readout is organised in readout boards
//! (ROBs) of 16 multi-chip modules (MCMs); the MCM is the smallest channel
//! addressed by the noise map, the gain table and the gain histograms.

use serde::{Deserialize, Serialize};

use crate::constants::DEG2RAD;

pub const NSECTOR: usize = 18;
pub const NSTACK: usize = 5;
pub const NLAYER: usize = 6;
pub const NCHAMBER_PER_SEC: usize = NSTACK * NLAYER;
pub const NCHAMBER: usize = NSECTOR * NCHAMBER_PER_SEC;

pub const NROBC0: usize = 6; // ROBs per chamber in the short stack (stack 2)
pub const NROBC1: usize = 8; // ROBs per chamber elsewhere
pub const NMCMROB: usize = 16;
pub const NMCM_PER_CHAMBER: usize = NROBC1 * NMCMROB; // channel indices are laid out with the larger chamber size
pub const NCHANNEL: usize = NCHAMBER * NMCM_PER_CHAMBER;

pub const NROWC0: usize = 12;
pub const NROWC1: usize = 16;

pub const SECTOR_ANGLE: f64 = 20.0 * DEG2RAD;
pub const PAD_TILT_DEG: f64 = 2.0;
pub const DRIFT_LENGTH: f64 = 3.0; // cm, thickness of the drift region

/// Radial position (cm) of the tracklet reference plane of each layer.
pub const LAYER_X: [f64; NLAYER] = [300.65, 313.25, 325.85, 338.45, 351.05, 363.65];

/// Pad row length (cm) per layer for the long stacks; stack 2 uses the same values.
const ROW_SIZE: [f64; NLAYER] = [7.5, 7.5, 8.0, 8.5, 9.0, 9.0];

pub fn chamber(sector: usize, stack: usize, layer: usize) -> usize {
    sector * NCHAMBER_PER_SEC + stack * NLAYER + layer
}

pub fn layer_of(chamber: usize) -> usize {
    chamber % NLAYER
}

pub fn stack_of(chamber: usize) -> usize {
    (chamber % NCHAMBER_PER_SEC) / NLAYER
}

pub fn sector_of(chamber: usize) -> usize {
    chamber / NCHAMBER_PER_SEC
}

pub fn n_rows(stack: usize) -> usize {
    if stack == 2 { NROWC0 } else { NROWC1 }
}

pub fn n_robs(stack: usize) -> usize {
    if stack == 2 { NROBC0 } else { NROBC1 }
}

pub fn row_size(layer: usize) -> f64 {
    ROW_SIZE[layer]
}

/// Tangent of the pad tilting angle. The tilt alternates sign from layer to layer.
pub fn tilt(layer: usize) -> f64 {
    let t = (PAD_TILT_DEG * DEG2RAD).tan();
    if layer % 2 == 0 { -t } else { t }
}

/// Rotation angle of the local frame of a sector, in (-pi, pi].
pub fn sector_to_alpha(sector: usize) -> f64 {
    normalize_angle((sector as f64 + 0.5) * SECTOR_ANGLE)
}

/// Sector whose local frame contains the azimuth `alpha`.
pub fn alpha_to_sector(alpha: f64) -> usize {
    let mut phi = alpha;
    if phi < 0.0 {
        phi += 2.0 * std::f64::consts::PI;
    }
    ((phi / SECTOR_ANGLE) as usize) % NSECTOR
}

pub fn normalize_angle(alpha: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = alpha % two_pi;
    if a <= -std::f64::consts::PI {
        a += two_pi;
    } else if a > std::f64::consts::PI {
        a -= two_pi;
    }
    a
}

/// Global readout channel index of an MCM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct McmId(pub u32);

impl McmId {
    pub fn new(chamber: usize, rob: usize, mcm: usize) -> Self {
        McmId((chamber * NMCM_PER_CHAMBER + rob * NMCMROB + mcm) as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn chamber(&self) -> usize {
        self.index() / NMCM_PER_CHAMBER
    }

    pub fn rob(&self) -> usize {
        (self.index() % NMCM_PER_CHAMBER) / NMCMROB
    }

    pub fn mcm(&self) -> usize {
        self.index() % NMCMROB
    }

    pub fn is_valid(&self) -> bool {
        self.index() < NCHANNEL
    }
}
