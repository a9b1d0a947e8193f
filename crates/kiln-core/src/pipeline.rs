//! Pipeline descriptor types.
//!
//! These mirror the wire format in `{ "image": ..., "stages": {...} }`: the
//! shape the HTTP front door decodes a submitted pipeline into before
//! handing it to the scheduler.

use crate::error::BadPipelineReason;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A pipeline as submitted by the caller: an image reference and a map of
/// stage name to stage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    pub image: String,
    pub stages: HashMap<String, StageMetadata>,
}

/// One stage's metadata: its script, its dependencies, and the artifact
/// paths it uploads on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetadata {
    pub script: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<DependencyRef>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// A dependency declaration: the producer stage name and whether its
/// artifacts should be copied into this stage's container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRef {
    pub stage: String,
    #[serde(rename = "artifacts", alias = "fetch_artifacts", default)]
    pub fetch_artifacts: bool,
}

/// The two legal forms of an image reference: `library/<name>` for a bare
/// name, `<owner>/<name>` for a single path segment. Anything with more
/// than one slash is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub registry_or_owner: String,
    pub name: String,
}

impl ResolvedImage {
    pub fn resolve(image: &str) -> Result<Self, BadPipelineReason> {
        let segments: Vec<&str> = image.split('/').collect();
        match segments.as_slice() {
            [name] if !name.is_empty() => Ok(Self {
                registry_or_owner: "library".to_string(),
                name: name.to_string(),
            }),
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                registry_or_owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(BadPipelineReason::BadImage(image.to_string())),
        }
    }

    pub fn full_reference(&self) -> String {
        format!("docker.io/{}/{}", self.registry_or_owner, self.name)
    }
}

impl PipelineDescriptor {
    /// Validate shape invariants that are cheap to check before the DAG is
    /// even built: non-empty stage set, non-empty script per stage, and a
    /// resolvable image reference.
    pub fn validate(&self) -> Result<(), BadPipelineReason> {
        if self.stages.is_empty() {
            return Err(BadPipelineReason::EmptyPipeline);
        }
        for (name, meta) in &self.stages {
            if meta.script.is_empty() {
                return Err(BadPipelineReason::EmptyScript(name.clone()));
            }
        }
        ResolvedImage::resolve(&self.image)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_name_to_library() {
        let r = ResolvedImage::resolve("alpine").unwrap();
        assert_eq!(r.registry_or_owner, "library");
        assert_eq!(r.name, "alpine");
        assert_eq!(r.full_reference(), "docker.io/library/alpine");
    }

    #[test]
    fn resolves_owner_slash_name() {
        let r = ResolvedImage::resolve("bitnami/redis").unwrap();
        assert_eq!(r.registry_or_owner, "bitnami");
        assert_eq!(r.name, "redis");
    }

    #[test]
    fn rejects_extra_segments() {
        assert!(ResolvedImage::resolve("a/b/c").is_err());
    }

    #[test]
    fn deserializes_wire_format() {
        let json = r#"{
            "image": "alpine",
            "stages": {
                "a": { "script": ["echo hi"], "depends_on": [], "artifacts": [] },
                "b": { "script": ["echo bye"], "depends_on": [{"stage": "a", "artifacts": true}] }
            }
        }"#;
        let descriptor: PipelineDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.image, "alpine");
        assert_eq!(descriptor.stages.len(), 2);
        assert!(descriptor.stages["b"].depends_on[0].fetch_artifacts);
    }
}
