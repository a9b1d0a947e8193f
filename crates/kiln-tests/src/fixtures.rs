//! Pipeline descriptor fixtures matching the scenarios described alongside
//! the scheduler's testable properties.

use kiln_core::pipeline::{DependencyRef, PipelineDescriptor, StageMetadata};
use std::collections::HashMap;

/// Factory for sample pipeline descriptors.
pub struct PipelineFixture;

impl PipelineFixture {
    /// Three stages in a line: `a -> b -> c`, each `echo hi`.
    pub fn linear() -> PipelineDescriptor {
        let mut stages = HashMap::new();
        stages.insert(
            "a".to_string(),
            StageMetadata {
                script: vec!["echo hi".to_string()],
                depends_on: vec![],
                artifacts: vec![],
            },
        );
        stages.insert(
            "b".to_string(),
            StageMetadata {
                script: vec!["echo hi".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "a".to_string(),
                    fetch_artifacts: false,
                }],
                artifacts: vec![],
            },
        );
        stages.insert(
            "c".to_string(),
            StageMetadata {
                script: vec!["echo hi".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "b".to_string(),
                    fetch_artifacts: false,
                }],
                artifacts: vec![],
            },
        );
        PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        }
    }

    /// Diamond: `a` produces an artifact, `b` and `c` depend on it (only `b`
    /// fetches it), `d` depends on both.
    pub fn diamond_with_artifact() -> PipelineDescriptor {
        let mut stages = HashMap::new();
        stages.insert(
            "a".to_string(),
            StageMetadata {
                script: vec!["echo data > out.txt".to_string()],
                depends_on: vec![],
                artifacts: vec!["out.txt".to_string()],
            },
        );
        stages.insert(
            "b".to_string(),
            StageMetadata {
                script: vec!["cat out.txt".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "a".to_string(),
                    fetch_artifacts: true,
                }],
                artifacts: vec![],
            },
        );
        stages.insert(
            "c".to_string(),
            StageMetadata {
                script: vec!["echo no-fetch".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "a".to_string(),
                    fetch_artifacts: false,
                }],
                artifacts: vec![],
            },
        );
        stages.insert(
            "d".to_string(),
            StageMetadata {
                script: vec!["echo done".to_string()],
                depends_on: vec![
                    DependencyRef {
                        stage: "b".to_string(),
                        fetch_artifacts: false,
                    },
                    DependencyRef {
                        stage: "c".to_string(),
                        fetch_artifacts: false,
                    },
                ],
                artifacts: vec![],
            },
        );
        PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        }
    }

    /// `a -> b -> a`: a cycle the DAG builder must reject.
    pub fn cycle() -> PipelineDescriptor {
        let mut stages = HashMap::new();
        stages.insert(
            "a".to_string(),
            StageMetadata {
                script: vec!["echo hi".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "b".to_string(),
                    fetch_artifacts: false,
                }],
                artifacts: vec![],
            },
        );
        stages.insert(
            "b".to_string(),
            StageMetadata {
                script: vec!["echo hi".to_string()],
                depends_on: vec![DependencyRef {
                    stage: "a".to_string(),
                    fetch_artifacts: false,
                }],
                artifacts: vec![],
            },
        );
        PipelineDescriptor {
            image: "alpine".to_string(),
            stages,
        }
    }
}
