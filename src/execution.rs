//! Execution-progress analysis for contracts with milestones.
//!
//! Combines three deterministic computations (completion percentage,
//! overdue-milestone count, schedule status) with one narrative
//! text-completion request. Shares the analyzer's fail-soft contract:
//! a completion error degrades the narrative and zeroes the percentage,
//! it never propagates.

use chrono::Utc;
use std::sync::Arc;
use tracing::error;

use crate::completion::CompletionClient;
use crate::models::{ExecutionReport, Milestone, MilestoneStatus, TenderRecord};

/// Narrative written when the completion call fails.
pub const EXECUTION_UNAVAILABLE: &str =
    "Execution analysis unavailable: text-completion request failed";

/// Schedule status written when the completion call fails.
pub const SCHEDULE_UNAVAILABLE: &str = "schedule status unavailable";

/// Analyze the execution progress of a contract against its milestones.
pub async fn analyze_execution(
    client: &Arc<dyn CompletionClient>,
    tender: &TenderRecord,
    milestones: &[Milestone],
) -> ExecutionReport {
    let total = milestones.len() as i64;
    let completed = milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Completed)
        .count() as i64;

    let completion_percentage = if total == 0 {
        0.0
    } else {
        100.0 * completed as f64 / total as f64
    };

    let now = Utc::now();
    let overdue = milestones
        .iter()
        .filter(|m| {
            m.status != MilestoneStatus::Completed
                && m.due_date.map(|d| d < now).unwrap_or(false)
        })
        .count() as i64;

    let schedule_status = if overdue == 0 {
        "on schedule".to_string()
    } else {
        format!("{} milestone(s) overdue", overdue)
    };

    match client.complete(&execution_prompt(tender, milestones)).await {
        Ok(narrative) => ExecutionReport {
            execution_analysis: narrative,
            completion_percentage,
            schedule_status,
            overdue_milestones: overdue,
            total_milestones: total,
        },
        Err(e) => {
            error!(tender_id = %tender.tender_id, error = %e, "execution analysis failed");
            ExecutionReport {
                execution_analysis: EXECUTION_UNAVAILABLE.to_string(),
                completion_percentage: 0.0,
                schedule_status: SCHEDULE_UNAVAILABLE.to_string(),
                overdue_milestones: overdue,
                total_milestones: total,
            }
        }
    }
}

fn execution_prompt(tender: &TenderRecord, milestones: &[Milestone]) -> String {
    let listing = milestones
        .iter()
        .map(|m| {
            let due = m
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "no due date".to_string());
            format!("- {} (due {}, status {})", m.title, due, m.status.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze the execution progress of this government contract:\n\
         Title: {}\n\
         Status: {}\n\n\
         Milestones:\n{}\n\n\
         Assess:\n\
         1. Overall execution health\n\
         2. Schedule risks\n\
         3. Recommended corrective actions",
        tender.title, tender.status, listing
    )
}
