//! Packing of generator status codes into a single integer.
//!
//! Bits 0-8 hold the HepMC status, bits 9-18 the generator specific status
//! (both signed) and bit 31 flags the value as encoded.

const HEPMC_BITS: u32 = 9;
const GEN_BITS: u32 = 10;
const ENCODED_FLAG: u32 = 1 << 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McGenStatus {
    pub hepmc: i32,
    pub gen: i32,
}

impl McGenStatus {
    pub fn new(hepmc: i32, gen: i32) -> Self {
        McGenStatus { hepmc, gen }
    }

    pub fn full_encoding(&self) -> i32 {
        let hepmc = (self.hepmc as u32) & ((1 << HEPMC_BITS) - 1);
        let gen = (self.gen as u32) & ((1 << GEN_BITS) - 1);
        (ENCODED_FLAG | gen << HEPMC_BITS | hepmc) as i32
    }

    /// Unpacks an encoded status, `None` if the encoded flag is not set.
    pub fn decode(full: i32) -> Option<Self> {
        if !is_encoded(full) {
            return None;
        }
        // shift the fields to the top and back to restore their sign
        let hepmc = (full << (32 - HEPMC_BITS)) >> (32 - HEPMC_BITS);
        let gen = (full << (32 - HEPMC_BITS - GEN_BITS)) >> (32 - GEN_BITS);
        Some(McGenStatus { hepmc, gen })
    }
}

pub fn is_encoded(full: i32) -> bool {
    (full as u32) & ENCODED_FLAG != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_keeps_signed_fields() {
        let status = McGenStatus::new(-4, 37);
        let full = status.full_encoding();
        assert!(is_encoded(full));
        assert_eq!(McGenStatus::decode(full), Some(status));
    }

    #[test]
    fn test_plain_status_is_not_encoded() {
        assert!(!is_encoded(1));
        assert!(!is_encoded(0));
        assert_eq!(McGenStatus::decode(1), None);
        assert!(is_encoded(McGenStatus::new(0, 0).full_encoding()));
    }
}
