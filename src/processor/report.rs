use serde::Serialize;
use std::fmt;

/// A unit of work launched for one image
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Original,
    Rendition { suffix: String },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Metadata => f.write_str("metadata"),
            Stage::Original => f.write_str("original"),
            Stage::Rendition { suffix } => write!(f, "rendition {suffix}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    /// Written by this delivery
    Stored,
    /// Already present from an earlier delivery
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    #[serde(flatten)]
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
}

/// Per-stage outcome of processing one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub image_id: String,
    pub stages: Vec<StageOutcome>,
}

impl ProcessReport {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, status: StageStatus) {
        self.stages.push(StageOutcome { stage, status });
        self.stages.sort_by(|a, b| a.stage.cmp(&b.stage));
    }

    pub fn status_of(&self, stage: &Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|outcome| &outcome.stage == stage)
            .map(|outcome| &outcome.status)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageOutcome> {
        self.stages
            .iter()
            .filter(|outcome| matches!(outcome.status, StageStatus::Failed(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}
