use std::collections::BTreeMap;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

pub const GENERATOR_ID: &str = "generator_id";
pub const GENERATOR_DESCRIPTION: &str = "generator_description";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Per event bookkeeping written next to the generated particles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McEventHeader {
    pub vertex: [f64; 3],
    pub n_primaries: usize,
    pub embedding_file_name: Option<String>,
    pub embedding_event_index: Option<usize>,
    pub info: BTreeMap<String, InfoValue>,
}

impl McEventHeader {
    pub fn new() -> Self {
        McEventHeader::default()
    }

    pub fn vertex(&self) -> Point3<f64> {
        Point3::from(self.vertex)
    }

    pub fn set_vertex(&mut self, vertex: &Point3<f64>) {
        self.vertex = [vertex.x, vertex.y, vertex.z];
    }

    pub fn put_info(&mut self, key: &str, value: InfoValue) {
        self.info.insert(key.to_string(), value);
    }

    pub fn info_int(&self, key: &str) -> Option<i64> {
        match self.info.get(key)? {
            InfoValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn info_str(&self, key: &str) -> Option<&str> {
        match self.info.get(key)? {
            InfoValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_from_json() {
        let header: McEventHeader =
            serde_json::from_str(r#"{"vertex": [0.1, 0.2, 3.0], "info": {"generator_id": 4, "generator_description": "pythia"}}"#)
                .unwrap();
        assert_eq!(header.info_int(GENERATOR_ID), Some(4));
        assert_eq!(header.info_str(GENERATOR_DESCRIPTION), Some("pythia"));
        assert_eq!(header.info_str(GENERATOR_ID), None);
        assert_eq!(header.vertex().z, 3.0);
        assert_eq!(header.embedding_event_index, None);
    }
}
