//! Run state and the summary produced by a finished run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battery::ModelReport;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl RunStatus {
    /// Allowed transitions:
    /// - Pending -> Running
    /// - Pending -> Error (failure before the work started)
    /// - Running -> Done
    /// - Running -> Error
    pub fn can_transition(&self, to: RunStatus) -> bool {
        matches!(
            (self, to),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Error)
                | (RunStatus::Running, RunStatus::Done)
                | (RunStatus::Running, RunStatus::Error)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters a run was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub host: String,
    /// Requested models; empty means "every model matching the marker".
    pub models: Vec<String>,
    pub repeat: u32,
}

/// A tracked evaluation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub messages: Vec<String>,
    pub progress: u8,
    pub metadata: RunMetadata,
    pub result: Option<Summary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub(crate) fn new(id: String, metadata: RunMetadata) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: RunStatus::Pending,
            messages: Vec::new(),
            progress: 0,
            metadata,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastestModel {
    pub model: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCodeModel {
    pub model: String,
    pub code_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSmartModel {
    pub model: String,
    pub smartness_score: f64,
}

/// Best performers across the tested models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopSummary {
    pub fastest: Option<FastestModel>,
    pub best_code: Option<BestCodeModel>,
    pub best_smart: Option<BestSmartModel>,
}

impl TopSummary {
    /// Picks the lowest mean latency and the highest scores.
    ///
    /// Models without a mean latency are skipped for `fastest`. Ties go to
    /// the model that appears first.
    pub fn from_reports(reports: &[ModelReport]) -> Self {
        let mut top = TopSummary::default();

        for report in reports {
            if let Some(mean) = report.mean_latency() {
                if top.fastest.as_ref().map_or(true, |f| mean < f.mean) {
                    top.fastest = Some(FastestModel {
                        model: report.model.clone(),
                        mean,
                    });
                }
            }
            if top
                .best_code
                .as_ref()
                .map_or(true, |b| report.code_score > b.code_score)
            {
                top.best_code = Some(BestCodeModel {
                    model: report.model.clone(),
                    code_score: report.code_score,
                });
            }
            if top
                .best_smart
                .as_ref()
                .map_or(true, |b| report.smartness_score > b.smartness_score)
            {
                top.best_smart = Some(BestSmartModel {
                    model: report.model.clone(),
                    smartness_score: report.smartness_score,
                });
            }
        }

        top
    }
}

/// Final result of a run, also the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub host: String,
    pub models_tested: Vec<ModelReport>,
    pub available_models: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub top_summary: TopSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Id assigned by the store, when the summary was persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
}

impl Summary {
    pub fn new(host: impl Into<String>, available_models: Vec<String>) -> Self {
        Self {
            host: host.into(),
            models_tested: Vec::new(),
            available_models,
            timestamp: Utc::now(),
            top_summary: TopSummary::default(),
            error: None,
            record_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::{CodingDetails, LatencyStats, SmartnessDetails};
    use std::collections::BTreeMap;

    fn report(model: &str, mean: Option<f64>, smart: f64, code: f64) -> ModelReport {
        ModelReport {
            model: model.to_string(),
            latency_stats: LatencyStats {
                mean,
                median: mean,
                min: mean,
                max: mean,
            },
            smartness_score: smart,
            code_score: code,
            smartness_details: SmartnessDetails {
                score: smart,
                points: "0/0".to_string(),
                categories: BTreeMap::new(),
            },
            coding_details: CodingDetails {
                score: code,
                points: "0/0".to_string(),
                difficulties: BTreeMap::new(),
            },
            reasoning: Vec::new(),
            coding: Vec::new(),
            tests: Vec::new(),
            repeat: 1,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(RunStatus::Pending.can_transition(RunStatus::Running));
        assert!(RunStatus::Pending.can_transition(RunStatus::Error));
        assert!(RunStatus::Running.can_transition(RunStatus::Done));
        assert!(RunStatus::Running.can_transition(RunStatus::Error));
        assert!(!RunStatus::Pending.can_transition(RunStatus::Done));
        assert!(!RunStatus::Done.can_transition(RunStatus::Error));
        assert!(!RunStatus::Error.can_transition(RunStatus::Running));
        assert!(!RunStatus::Running.can_transition(RunStatus::Running));
    }

    #[test]
    fn test_top_summary_picks_best() {
        let reports = vec![
            report("etch:a", Some(1.2), 80.0, 60.0),
            report("etch:b", Some(0.8), 70.0, 90.0),
            report("etch:c", None, 90.0, 10.0),
        ];
        let top = TopSummary::from_reports(&reports);

        assert_eq!(top.fastest.unwrap().model, "etch:b");
        assert_eq!(top.best_code.unwrap().model, "etch:b");
        assert_eq!(top.best_smart.unwrap().model, "etch:c");
    }

    #[test]
    fn test_top_summary_ties_go_to_first() {
        let reports = vec![
            report("etch:a", Some(1.0), 50.0, 50.0),
            report("etch:b", Some(1.0), 50.0, 50.0),
        ];
        let top = TopSummary::from_reports(&reports);

        assert_eq!(top.fastest.unwrap().model, "etch:a");
        assert_eq!(top.best_code.unwrap().model, "etch:a");
        assert_eq!(top.best_smart.unwrap().model, "etch:a");
    }

    #[test]
    fn test_top_summary_empty() {
        assert_eq!(TopSummary::from_reports(&[]), TopSummary::default());
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = Summary::new("http://localhost:11434", vec!["etch:a".to_string()]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["host"], "http://localhost:11434");
        assert!(json["top_summary"]["fastest"].is_null());
        assert!(json.get("record_id").is_none());
    }
}
