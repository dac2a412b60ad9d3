use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{GeneratorError, Result};
use crate::generator::traits::{GeneratedParticle, Generator};

/// Particles of one species, uniform in pt, pseudorapidity and azimuth.
#[derive(Clone, Debug)]
pub struct BoxGun {
    pub pdg: i32,
    pub n_particles: usize,
    pub pt: (f64, f64),
    pub eta: (f64, f64),
    pub phi: (f64, f64),
    rng: StdRng,
}

impl BoxGun {
    pub fn new(pdg: i32, n_particles: usize, seed: u64) -> Self {
        BoxGun {
            pdg,
            n_particles,
            pt: (0.5, 5.0),
            eta: (-0.8, 0.8),
            phi: (0.0, 2.0 * std::f64::consts::PI),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_pt(mut self, min: f64, max: f64) -> Self {
        self.pt = (min, max);
        self
    }

    pub fn with_eta(mut self, min: f64, max: f64) -> Self {
        self.eta = (min, max);
        self
    }

    fn uniform(&mut self, range: (f64, f64)) -> f64 {
        if range.1 > range.0 { self.rng.gen_range(range.0..range.1) } else { range.0 }
    }
}

impl Generator for BoxGun {
    fn name(&self) -> &str {
        "boxgun"
    }

    fn read_event(&mut self) -> Result<Vec<GeneratedParticle>> {
        if self.pt.0 < 0.0 {
            return Err(GeneratorError::Generator {
                name: self.name().to_string(),
                reason: format!("negative pt range {:?}", self.pt),
            });
        }
        let mut particles = Vec::with_capacity(self.n_particles);
        for _ in 0..self.n_particles {
            let pt = self.uniform(self.pt);
            let eta = self.uniform(self.eta);
            let phi = self.uniform(self.phi);
            particles.push(GeneratedParticle::new(self.pdg, [pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()]));
        }
        Ok(particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinematics_within_ranges() {
        let mut gun = BoxGun::new(211, 50, 3).with_pt(1.0, 2.0).with_eta(-0.5, 0.5);
        let particles = gun.read_event().unwrap();
        assert_eq!(particles.len(), 50);
        for p in &particles {
            let pt = p.momentum[0].hypot(p.momentum[1]);
            assert!((1.0..2.0).contains(&pt));
            let eta = (p.momentum[2] / pt).asinh();
            assert!(eta.abs() < 0.5 + 1e-12);
            assert!(p.energy < 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_event() {
        let a = BoxGun::new(2212, 5, 11).read_event().unwrap();
        let b = BoxGun::new(2212, 5, 11).read_event().unwrap();
        assert_eq!(a, b);
    }
}
