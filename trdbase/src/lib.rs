pub mod constants;
pub mod error;
pub mod geometry;

// track models
pub mod track {
    pub mod param;
    pub mod reference;
    pub mod trd;
}

// detector data
pub mod data {
    pub mod tracklet;
}

// conditions data consulted during calibration
pub mod calibration {
    pub mod local_gain;
    pub mod noise;
    pub mod reco_param;
}

// aggregated calibration output
pub mod histos {
    pub mod angular;
    pub mod gain;
}

// propagation contract and reference implementation
pub mod propagation {
    pub mod field;
    pub mod material;
    pub mod propagator;
}
