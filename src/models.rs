//! Core data models used throughout Tender Watch.
//!
//! These types represent the tenders, milestones, and analysis results that
//! flow through the fetch → store → analyze pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle status of a tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderStatus {
    Draft,
    Published,
    Bidding,
    Evaluation,
    Awarded,
    Signed,
    InProgress,
    Completed,
    Terminated,
    Suspended,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Draft => "draft",
            TenderStatus::Published => "published",
            TenderStatus::Bidding => "bidding",
            TenderStatus::Evaluation => "evaluation",
            TenderStatus::Awarded => "awarded",
            TenderStatus::Signed => "signed",
            TenderStatus::InProgress => "in_progress",
            TenderStatus::Completed => "completed",
            TenderStatus::Terminated => "terminated",
            TenderStatus::Suspended => "suspended",
        }
    }

    /// Parse a stored status string. Unknown values fall back to `Draft`
    /// so a surprising remote status never poisons a whole query.
    pub fn parse(s: &str) -> TenderStatus {
        match s {
            "published" => TenderStatus::Published,
            "bidding" => TenderStatus::Bidding,
            "evaluation" => TenderStatus::Evaluation,
            "awarded" => TenderStatus::Awarded,
            "signed" => TenderStatus::Signed,
            "in_progress" => TenderStatus::InProgress,
            "completed" => TenderStatus::Completed,
            "terminated" => TenderStatus::Terminated,
            "suspended" => TenderStatus::Suspended,
            _ => TenderStatus::Draft,
        }
    }

    /// Whether the tender is still being worked: monitored by the anomaly
    /// sweep and the deadline check.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TenderStatus::Published
                | TenderStatus::Bidding
                | TenderStatus::Evaluation
                | TenderStatus::Awarded
                | TenderStatus::Signed
                | TenderStatus::InProgress
        )
    }
}

impl std::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A government procurement tender tracked through its lifecycle.
#[derive(Debug, Clone)]
pub struct TenderRecord {
    pub id: String,
    /// External registry number, unique per tender.
    pub tender_id: String,
    pub title: String,
    pub description: String,
    pub customer: Option<String>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub initial_price: Option<f64>,
    pub price: Option<f64>,
    pub publication_date: Option<DateTime<Utc>>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub execution_deadline: Option<DateTime<Utc>>,
    pub status: TenderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Raw tender fields extracted from the remote registry page.
///
/// Every field the page does not expose comes back empty/`None`; a partial
/// page never fails the whole fetch.
#[derive(Debug, Clone, Default)]
pub struct SourceTender {
    pub tender_id: String,
    pub title: String,
    pub description: String,
    pub price: Option<f64>,
    pub customer: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: String,
}

/// Severity of an anomaly finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Category of a rule-engine anomaly finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    PriceReduction,
    Dumping,
    ShortDeadline,
    CorruptionRisk,
    HighRiskScore,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::PriceReduction => "price_reduction",
            AnomalyType::Dumping => "dumping",
            AnomalyType::ShortDeadline => "short_deadline",
            AnomalyType::CorruptionRisk => "corruption_risk",
            AnomalyType::HighRiskScore => "high_risk_score",
        }
    }
}

/// A discrete flag raised by the analyzer's rule engine.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyFinding {
    pub anomaly_type: AnomalyType,
    pub description: String,
    pub severity: Severity,
}

/// Result of one full analysis run over a tender.
///
/// Immutable once returned; `risk_score` is always within `[0, 100]`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub technical_analysis: String,
    pub budget_analysis: String,
    pub risk_analysis: String,
    pub compliance_analysis: String,
    pub recommendations: String,
    pub risk_score: f64,
    pub anomalies: Vec<AnomalyFinding>,
    pub confidential_mode: bool,
}

/// Status of a contract milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
            MilestoneStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> MilestoneStatus {
        match s {
            "in_progress" => MilestoneStatus::InProgress,
            "completed" => MilestoneStatus::Completed,
            "cancelled" => MilestoneStatus::Cancelled,
            _ => MilestoneStatus::Pending,
        }
    }
}

/// A scheduled sub-deliverable of a contract.
#[derive(Debug, Clone)]
pub struct Milestone {
    pub id: String,
    pub tender_id: String,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: MilestoneStatus,
    pub amount: Option<f64>,
}

/// Report produced by the execution-progress analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub execution_analysis: String,
    /// Share of completed milestones, `[0, 100]`; `0` for an empty list.
    pub completion_percentage: f64,
    pub schedule_status: String,
    pub overdue_milestones: i64,
    pub total_milestones: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        let all = [
            TenderStatus::Draft,
            TenderStatus::Published,
            TenderStatus::Bidding,
            TenderStatus::Evaluation,
            TenderStatus::Awarded,
            TenderStatus::Signed,
            TenderStatus::InProgress,
            TenderStatus::Completed,
            TenderStatus::Terminated,
            TenderStatus::Suspended,
        ];
        for status in all {
            assert_eq!(TenderStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_unknown_status_is_draft() {
        assert_eq!(TenderStatus::parse("garbage"), TenderStatus::Draft);
    }

    #[test]
    fn test_active_statuses() {
        assert!(TenderStatus::Bidding.is_active());
        assert!(TenderStatus::InProgress.is_active());
        assert!(!TenderStatus::Completed.is_active());
        assert!(!TenderStatus::Terminated.is_active());
        assert!(!TenderStatus::Draft.is_active());
    }

    #[test]
    fn test_analysis_result_json_shape() {
        let result = AnalysisResult {
            technical_analysis: "t".to_string(),
            budget_analysis: "b".to_string(),
            risk_analysis: "r".to_string(),
            compliance_analysis: "c".to_string(),
            recommendations: "rec".to_string(),
            risk_score: 42.0,
            anomalies: vec![AnomalyFinding {
                anomaly_type: AnomalyType::ShortDeadline,
                description: "only 5 day(s) between publication and deadline".to_string(),
                severity: Severity::High,
            }],
            confidential_mode: false,
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"risk_score\":42.0"));
        assert!(json.contains("\"anomaly_type\":\"short_deadline\""));
        assert!(json.contains("\"severity\":\"high\""));
    }

    #[test]
    fn test_milestone_status_parse() {
        assert_eq!(
            MilestoneStatus::parse("completed"),
            MilestoneStatus::Completed
        );
        assert_eq!(MilestoneStatus::parse("unknown"), MilestoneStatus::Pending);
    }
}
