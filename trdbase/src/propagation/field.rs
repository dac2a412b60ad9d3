use nalgebra::Point3;

/// Longitudinal magnetic field component in kG at a global position.
pub trait MagneticField: Sync {
    fn bz(&self, point: &Point3<f64>) -> f64;
}

/// Solenoid field approximated as homogeneous.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformField {
    pub bz: f64,
}

impl UniformField {
    pub fn new(bz: f64) -> Self {
        UniformField { bz }
    }
}

impl MagneticField for UniformField {
    fn bz(&self, _point: &Point3<f64>) -> f64 {
        self.bz
    }
}
