//! Per-pipeline, per-stage state tracked by the scheduler loop.

use crate::ids::PipelineId;
use crate::pipeline::PipelineDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stage's position in its state machine.
///
/// ```text
/// NotRunning --launch--> Running --exit=0--> Finished
///                                --exit!=0--> Finished (pipeline aborts)
/// ```
/// `Running -> NotRunning` is forbidden; `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotRunning,
    Running,
    Finished,
}

/// Terminal persisted status of a stage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Running,
    Success,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Running => "RUNNING",
            StageStatus::Success => "SUCCESS",
            StageStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(StageStatus::Running),
            "SUCCESS" => Some(StageStatus::Success),
            "FAILED" => Some(StageStatus::Failed),
            _ => None,
        }
    }
}

/// A persisted `stages` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRunRecord {
    pub pipeline_id: PipelineId,
    pub name: String,
    #[serde(with = "status_as_str")]
    pub status: StageStatus,
    pub message: String,
    pub artifact_urls: Vec<String>,
}

mod status_as_str {
    use super::StageStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &StageStatus, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(status.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<StageStatus, D::Error> {
        let raw = String::deserialize(d)?;
        StageStatus::from_str(&raw).ok_or_else(|| serde::de::Error::custom("invalid status"))
    }
}

/// The in-memory token a stage runner sends on the completion channel when
/// its container exits (or fails before ever starting one).
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub name: String,
    pub container_id: Option<String>,
    pub exit_status: i64,
    pub message: String,
    pub artifact_urls: Vec<String>,
}

impl StageOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }
}

/// One accepted pipeline execution: its identity, its validated descriptor,
/// the owning client, and the mutable per-stage state map. Every key of
/// `stage_state` is a key of `descriptor.stages`.
#[derive(Debug, Clone)]
pub struct PipelineInstance {
    pub id: PipelineId,
    pub client_id: String,
    pub descriptor: PipelineDescriptor,
    pub stage_state: HashMap<String, StageState>,
}

impl PipelineInstance {
    pub fn new(descriptor: PipelineDescriptor, client_id: String) -> Self {
        let stage_state = descriptor
            .stages
            .keys()
            .map(|name| (name.clone(), StageState::NotRunning))
            .collect();
        Self {
            id: PipelineId::new(),
            client_id,
            descriptor,
            stage_state,
        }
    }

    pub fn all_finished(&self) -> bool {
        self.stage_state
            .values()
            .all(|s| matches!(s, StageState::Finished))
    }
}
