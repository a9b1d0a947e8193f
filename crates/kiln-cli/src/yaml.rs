//! YAML descriptor parsing: the CLI-only input shape that gets converted
//! into the wire `PipelineDescriptor` before it is POSTed to `/execute`.

use kiln_core::pipeline::{DependencyRef, PipelineDescriptor, StageMetadata};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct YamlPipeline {
    pub image: String,
    pub stages: HashMap<String, YamlStage>,
}

#[derive(Debug, Deserialize)]
pub struct YamlStage {
    pub script: String,
    #[serde(default)]
    pub depends_on: Vec<YamlDependency>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// Either a bare stage name (no artifact fetch) or an explicit object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlDependency {
    Name(String),
    Full {
        stage: String,
        #[serde(default)]
        artifacts: bool,
    },
}

impl From<YamlPipeline> for PipelineDescriptor {
    fn from(yaml: YamlPipeline) -> Self {
        let stages = yaml
            .stages
            .into_iter()
            .map(|(name, stage)| (name, StageMetadata::from(stage)))
            .collect();
        PipelineDescriptor {
            image: yaml.image,
            stages,
        }
    }
}

impl From<YamlStage> for StageMetadata {
    fn from(stage: YamlStage) -> Self {
        let script = stage
            .script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let depends_on = stage.depends_on.into_iter().map(DependencyRef::from).collect();
        StageMetadata {
            script,
            depends_on,
            artifacts: stage.artifacts,
        }
    }
}

impl From<YamlDependency> for DependencyRef {
    fn from(dep: YamlDependency) -> Self {
        match dep {
            YamlDependency::Name(stage) => DependencyRef {
                stage,
                fetch_artifacts: false,
            },
            YamlDependency::Full { stage, artifacts } => DependencyRef {
                stage,
                fetch_artifacts: artifacts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiline_script_into_commands() {
        let yaml = r#"
image: alpine
stages:
  build:
    script: |
      echo one
      echo two
    artifacts: ["out.txt"]
"#;
        let parsed: YamlPipeline = serde_yaml::from_str(yaml).unwrap();
        let descriptor: PipelineDescriptor = parsed.into();
        assert_eq!(
            descriptor.stages["build"].script,
            vec!["echo one".to_string(), "echo two".to_string()]
        );
    }

    #[test]
    fn bare_name_dependency_defaults_to_no_fetch() {
        let yaml = r#"
image: alpine
stages:
  a:
    script: "echo hi"
  b:
    script: "echo bye"
    depends_on: ["a"]
"#;
        let parsed: YamlPipeline = serde_yaml::from_str(yaml).unwrap();
        let descriptor: PipelineDescriptor = parsed.into();
        assert!(!descriptor.stages["b"].depends_on[0].fetch_artifacts);
    }

    #[test]
    fn full_dependency_form_carries_fetch_flag() {
        let yaml = r#"
image: alpine
stages:
  a:
    script: "echo hi"
  b:
    script: "echo bye"
    depends_on: [{stage: "a", artifacts: true}]
"#;
        let parsed: YamlPipeline = serde_yaml::from_str(yaml).unwrap();
        let descriptor: PipelineDescriptor = parsed.into();
        assert!(descriptor.stages["b"].depends_on[0].fetch_artifacts);
    }
}
