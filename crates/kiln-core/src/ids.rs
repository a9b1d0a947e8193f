//! Pipeline identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A freshly allocated identifier for one pipeline instance.
///
/// Printed bare (no prefix): it is embedded verbatim in container names
/// (`<pipeline_id>-<stage_name>`) and object-store keys
/// (`<pipeline_id>/<stage_name>/artifacts/<filename>`), and stored as the
/// `TEXT` primary key of the `pipelines` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PipelineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_v4() {
        let id = PipelineId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn roundtrips_through_display() {
        let id = PipelineId::new();
        let parsed: PipelineId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
