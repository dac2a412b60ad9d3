use nalgebra::Point3;
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

/// Where the interaction vertex of generated events comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexMode {
    /// All events at the origin.
    NoVertex,
    /// Sampled from the configured interaction diamond.
    #[default]
    DiamondParam,
    /// Sampled from a mean vertex object provided by the conditions database.
    Ccdb,
}

/// Size and position of the luminous region, all lengths in cm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionDiamondParam {
    pub position: [f64; 3],
    pub width: [f64; 3],
    pub slope_x: f64,
    pub slope_y: f64,
}

impl Default for InteractionDiamondParam {
    fn default() -> Self {
        InteractionDiamondParam { position: [0.0; 3], width: [0.01, 0.01, 0.01], slope_x: 0.0, slope_y: 0.0 }
    }
}

/// Mean interaction vertex with its spread and the beam inclination.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanVertexObject {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub sigma_z: f64,
    pub slope_x: f64,
    pub slope_y: f64,
}

fn gauss<R: Rng + ?Sized>(mean: f64, sigma: f64, rng: &mut R) -> f64 {
    match Normal::new(mean, sigma) {
        Ok(normal) if sigma > 0.0 => normal.sample(rng),
        _ => mean,
    }
}

impl MeanVertexObject {
    pub fn from_diamond(param: &InteractionDiamondParam) -> Self {
        MeanVertexObject {
            x: param.position[0],
            y: param.position[1],
            z: param.position[2],
            sigma_x: param.width[0],
            sigma_y: param.width[1],
            sigma_z: param.width[2],
            slope_x: param.slope_x,
            slope_y: param.slope_y,
        }
    }

    /// Mean position at longitudinal position `z`, following the beam slopes.
    pub fn x_at(&self, z: f64) -> f64 {
        self.x + self.slope_x * (z - self.z)
    }

    pub fn y_at(&self, z: f64) -> f64 {
        self.y + self.slope_y * (z - self.z)
    }

    /// Draws a vertex. Axes with a non-positive width stay at their mean.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Point3<f64> {
        let z = gauss(self.z, self.sigma_z, rng);
        let x = gauss(self.x, self.sigma_x, rng) + self.slope_x * (z - self.z);
        let y = gauss(self.y, self.sigma_y, rng) + self.slope_y * (z - self.z);
        Point3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_width_returns_mean() {
        let mv = MeanVertexObject { x: 0.1, y: -0.2, z: 1.5, ..Default::default() };
        let v = mv.sample(&mut StdRng::seed_from_u64(1));
        assert_eq!(v, Point3::new(0.1, -0.2, 1.5));
    }

    #[test]
    fn test_slopes_follow_z() {
        let mv = MeanVertexObject { sigma_z: 5.0, slope_x: 0.01, slope_y: -0.02, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let v = mv.sample(&mut rng);
            assert_relative_eq!(v.x, 0.01 * v.z, epsilon = 1e-12);
            assert_relative_eq!(v.y, -0.02 * v.z, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spread_matches_width() {
        let mv = MeanVertexObject::from_diamond(&InteractionDiamondParam {
            position: [0.0, 0.0, 2.0],
            width: [0.01, 0.01, 6.0],
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let zs: Vec<f64> = (0..n).map(|_| mv.sample(&mut rng).z).collect();
        let mean = zs.iter().sum::<f64>() / n as f64;
        let var = zs.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.2);
        assert!((var.sqrt() - 6.0).abs() < 0.2);
    }
}
