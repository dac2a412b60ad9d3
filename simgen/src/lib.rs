pub mod error;
pub mod header;
pub mod pdg;
pub mod stack;
pub mod status;
pub mod vertex;

// event generation
pub mod generator {
    pub mod box_gun;
    pub mod primary;
    pub mod traits;
}
