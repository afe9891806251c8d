//! In-memory artifact accumulator shared by SPIRE orchestration and config synthesis
//! (spec §4.7: "No artifact is implicitly written to disk... except those the SPIRE /
//! Config Synthesis sections explicitly name").
//!
//! Modeled as a `DashMap`, the same concurrent-shared-map idiom the teacher uses for
//! `MasterState.satellites`.

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct ArtifactMap(DashMap<String, Vec<u8>>);

impl ArtifactMap {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.0.insert(name.into(), bytes.into());
    }

    pub fn get_config(&self, name: &str) -> Option<Vec<u8>> {
        self.0.get(name).map(|v| v.clone())
    }

    pub fn get_all_configs(&self) -> Vec<(String, Vec<u8>)> {
        self.0
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves_named_artifacts() {
        let artifacts = ArtifactMap::new();
        artifacts.insert("poller.json", b"{}".to_vec());
        assert_eq!(artifacts.get_config("poller.json"), Some(b"{}".to_vec()));
        assert_eq!(artifacts.get_config("missing"), None);
        assert_eq!(artifacts.get_all_configs().len(), 1);
    }
}
