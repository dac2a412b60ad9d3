// Purpose: To store constants that are used in track propagation and calibration
pub const B2C: f64 = -0.299792458e-3; // converts q/pt * Bz [kG] into curvature [1/cm]
pub const ALMOST0: f64 = 1e-12;
pub const ALMOST1: f64 = 1.0 - 1e-6;
pub const MAX_SIN_PHI: f64 = 0.85; // default snp limit when propagating
pub const MAX_STEP: f64 = 2.0; // cm, default maximum propagation step
pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;
pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

// Particle masses in GeV/c^2
pub const MASS_ELECTRON: f64 = 0.000510998950;
pub const MASS_PION_CHARGED: f64 = 0.13957039;
pub const MASS_KAON_CHARGED: f64 = 0.493677;
pub const MASS_PROTON: f64 = 0.93827208816;

// Multiple scattering and energy loss
pub const MS_CONST2: f64 = 0.0136 * 0.0136; // (13.6 MeV)^2 in GeV^2
pub const MIN_P: f64 = 0.01; // GeV/c, lower momentum bound for material corrections
pub const DE_RELATIVE_FLUCTUATION: f64 = 0.07; // relative width of the energy loss distribution
pub const MAX_RELATIVE_DE: f64 = 0.3; // largest energy loss per step relative to the energy

// Bethe-Bloch parameters for the solid approximation
pub const BB_K: f64 = 0.307075e-3; // GeV cm^2 / g
pub const BB_DENSITY: f64 = 2.33; // g/cm^3
pub const BB_X0: f64 = 0.20 * 2.303;
pub const BB_X1: f64 = 3.0 * 2.303;
pub const BB_MEAN_I: f64 = 173e-9; // GeV
pub const BB_MEAN_ZA: f64 = 0.49848;
