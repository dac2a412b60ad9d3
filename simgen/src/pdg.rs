use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const PDG_K0: i32 = 311;
pub const PDG_K0_SHORT: i32 = 310;
pub const PDG_K0_LONG: i32 = 130;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PdgParticle {
    pub name: String,
    /// Mass in GeV/c^2.
    pub mass: f64,
    /// Charge in units of e.
    pub charge: f64,
}

/// Particle properties by PDG code. Antiparticles are found through their absolute code.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PdgTable {
    particles: HashMap<i32, PdgParticle>,
}

impl PdgTable {
    pub fn new() -> Self {
        PdgTable { particles: HashMap::new() }
    }

    /// Table with the long lived particles reaching the detectors.
    pub fn with_defaults() -> Self {
        let mut table = PdgTable::new();
        for (code, name, mass, charge) in [
            (11, "e-", 0.000_510_999, -1.0),
            (13, "mu-", 0.105_658, -1.0),
            (22, "gamma", 0.0, 0.0),
            (211, "pi+", 0.139_570, 1.0),
            (111, "pi0", 0.134_977, 0.0),
            (321, "K+", 0.493_677, 1.0),
            (PDG_K0, "K0", 0.497_611, 0.0),
            (PDG_K0_SHORT, "K0_S", 0.497_611, 0.0),
            (PDG_K0_LONG, "K0_L", 0.497_611, 0.0),
            (2212, "p", 0.938_272, 1.0),
            (2112, "n", 0.939_565, 0.0),
            (3122, "Lambda", 1.115_683, 0.0),
            (1000010020, "deuteron", 1.875_613, 1.0),
            (1000020040, "alpha", 3.727_379, 2.0),
        ] {
            table.insert(code, PdgParticle { name: name.to_string(), mass, charge });
        }
        table
    }

    pub fn insert(&mut self, code: i32, particle: PdgParticle) {
        self.particles.insert(code.abs(), particle);
    }

    pub fn get(&self, code: i32) -> Option<&PdgParticle> {
        self.particles.get(&code.abs())
    }

    pub fn contains(&self, code: i32) -> bool {
        self.get(code).is_some()
    }

    pub fn mass(&self, code: i32) -> Option<f64> {
        self.get(code).map(|p| p.mass)
    }
}
