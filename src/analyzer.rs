//! Prompt-based tender analysis.
//!
//! [`TenderAnalyzer`] issues five independent text-completion requests
//! (technical, budget, risk, compliance, recommendations) built from a
//! tender's fields, then layers two deterministic heuristics on top of the
//! generated text:
//!
//! - **Risk score** — keyword frequency over the concatenated analyses
//!   (10 points per risk keyword, 5 per warning keyword) plus fixed bonuses
//!   for marker phrases in the budget and compliance texts, clamped to
//!   `[0, 100]`. The prompts instruct the model to use the exact marker
//!   phrases, which keeps the substring bonuses meaningful.
//! - **Anomaly rules** — five fixed checks over raw tender fields and the
//!   generated text, each emitting a typed [`AnomalyFinding`].
//!
//! The analyzer never errors past its public boundary: a failed completion
//! call degrades the whole run to placeholder text, a zero score, and no
//! anomalies.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error};

use crate::completion::CompletionClient;
use crate::models::{AnalysisResult, AnomalyFinding, AnomalyType, Severity, TenderRecord};
use crate::redact::redact_pii;

/// Placeholder written into every textual field when a completion call fails.
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable: text-completion request failed";

/// Keywords worth 10 points per occurrence in the concatenated analyses.
const RISK_KEYWORDS: &[&str] = &[
    "corruption",
    "fraud",
    "violation",
    "collusion",
    "penalty",
    "litigation",
    "bankruptcy",
    "blacklist",
];

/// Keywords worth 5 points per occurrence.
const WARNING_KEYWORDS: &[&str] = &[
    "delay",
    "overdue",
    "unclear",
    "ambiguous",
    "incomplete",
    "questionable",
    "dispute",
    "concern",
];

/// Marker phrases the budget and compliance prompts ask the model to emit,
/// with their score bonuses.
const BUDGET_OVERSTATEMENT_PHRASE: &str = "price overstatement";
const BUDGET_UNJUSTIFIED_PHRASE: &str = "unjustified pricing";
const COMPLIANCE_VIOLATION_PHRASE: &str = "law violation";
const COMPLIANCE_NONCOMPLIANCE_PHRASE: &str = "non-compliance with requirements";

/// Ordered corruption-indicator patterns. The scan is pattern-major over
/// the risk text then the budget text, and stops at the first match — the
/// order of this list is observable in which finding gets emitted.
static CORRUPTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)single\s+(?:bidder|supplier)",
        r"(?i)tailored\s+to\s+a\s+specific",
        r"(?i)conflict\s+of\s+interest",
        r"(?i)kickback",
        r"(?i)affiliated\s+(?:person|company|supplier|bidder)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("corruption pattern"))
    .collect()
});

/// Threshold above which the score itself becomes an anomaly.
const HIGH_SCORE_THRESHOLD: f64 = 75.0;

pub struct TenderAnalyzer {
    client: Arc<dyn CompletionClient>,
    confidential: bool,
}

impl TenderAnalyzer {
    pub fn new(client: Arc<dyn CompletionClient>, confidential: bool) -> Self {
        Self {
            client,
            confidential,
        }
    }

    /// Run the full analysis. Never fails: any completion error yields the
    /// degraded placeholder result instead.
    pub async fn analyze(&self, tender: &TenderRecord) -> AnalysisResult {
        let mut result = match self.analyze_inner(tender).await {
            Ok(result) => result,
            Err(e) => {
                error!(tender_id = %tender.tender_id, error = %e, "tender analysis failed");
                AnalysisResult {
                    technical_analysis: ANALYSIS_UNAVAILABLE.to_string(),
                    budget_analysis: ANALYSIS_UNAVAILABLE.to_string(),
                    risk_analysis: ANALYSIS_UNAVAILABLE.to_string(),
                    compliance_analysis: ANALYSIS_UNAVAILABLE.to_string(),
                    recommendations: ANALYSIS_UNAVAILABLE.to_string(),
                    risk_score: 0.0,
                    anomalies: Vec::new(),
                    confidential_mode: false,
                }
            }
        };

        if self.confidential {
            result.technical_analysis = redact_pii(&result.technical_analysis);
            result.budget_analysis = redact_pii(&result.budget_analysis);
            result.risk_analysis = redact_pii(&result.risk_analysis);
            result.compliance_analysis = redact_pii(&result.compliance_analysis);
            result.recommendations = redact_pii(&result.recommendations);
            result.confidential_mode = true;
        }

        result
    }

    async fn analyze_inner(&self, tender: &TenderRecord) -> anyhow::Result<AnalysisResult> {
        debug!(
            tender_id = %tender.tender_id,
            model = %self.client.model_name(),
            "running five-part analysis"
        );

        let technical = self.client.complete(&technical_prompt(tender)).await?;
        let budget = self.client.complete(&budget_prompt(tender)).await?;
        let risk = self.client.complete(&risk_prompt(tender)).await?;
        let compliance = self.client.complete(&compliance_prompt(tender)).await?;
        let recommendations = self
            .client
            .complete(&recommendations_prompt(tender))
            .await?;

        let score = risk_score(
            &[&technical, &budget, &risk, &compliance, &recommendations],
            &budget,
            &compliance,
        );
        let anomalies = detect_anomalies(tender, &risk, &budget, score);

        Ok(AnalysisResult {
            technical_analysis: technical,
            budget_analysis: budget,
            risk_analysis: risk,
            compliance_analysis: compliance,
            recommendations,
            risk_score: score,
            anomalies,
            confidential_mode: false,
        })
    }
}

// ============ Prompt templates ============

fn fmt_text(value: &str) -> &str {
    if value.is_empty() {
        "not specified"
    } else {
        value
    }
}

fn fmt_opt(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "not specified",
    }
}

fn fmt_price(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "not specified".to_string(),
    }
}

fn fmt_date(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(v) => v.format("%Y-%m-%d").to_string(),
        None => "not specified".to_string(),
    }
}

fn technical_prompt(tender: &TenderRecord) -> String {
    format!(
        "Analyze the technical requirements of this government tender:\n\
         Title: {}\n\
         Description: {}\n\n\
         Assess:\n\
         1. Implementation complexity\n\
         2. Key requirements\n\
         3. Potential bottlenecks\n\
         4. Required competencies",
        fmt_text(&tender.title),
        fmt_text(&tender.description),
    )
}

fn budget_prompt(tender: &TenderRecord) -> String {
    format!(
        "Analyze the budget of this government tender:\n\
         Title: {}\n\
         Current price: {}\n\
         Initial price: {}\n\n\
         Assess:\n\
         1. Budget adequacy\n\
         2. Potential profitability\n\
         3. Comparison with market prices\n\
         4. Pricing recommendations\n\n\
         If the price looks inflated relative to the work, state exactly \
         \"price overstatement\". If the pricing has no visible justification, \
         state exactly \"unjustified pricing\".",
        fmt_text(&tender.title),
        fmt_price(tender.price),
        fmt_price(tender.initial_price),
    )
}

/// Risk prompt, also reused by the scheduler's anomaly sweep.
pub fn risk_prompt(tender: &TenderRecord) -> String {
    format!(
        "Analyze the risks of participating in this government tender:\n\
         Title: {}\n\
         Customer: {}\n\
         Execution deadline: {}\n\n\
         Assess:\n\
         1. Main risks\n\
         2. Probability of success\n\
         3. Potential problems\n\
         4. Risk mitigation measures",
        fmt_text(&tender.title),
        fmt_opt(tender.customer.as_deref()),
        fmt_date(tender.execution_deadline),
    )
}

fn compliance_prompt(tender: &TenderRecord) -> String {
    format!(
        "Analyze the procurement-law compliance of this government tender:\n\
         Title: {}\n\
         Description: {}\n\
         Customer: {}\n\n\
         Assess:\n\
         1. Conformance with procurement legislation\n\
         2. Completeness of the tender documentation\n\
         3. Fairness of the qualification requirements\n\
         4. Transparency of the award criteria\n\n\
         If you find a breach of procurement law, state exactly \"law violation\". \
         If the documentation conflicts with mandatory requirements, state exactly \
         \"non-compliance with requirements\".",
        fmt_text(&tender.title),
        fmt_text(&tender.description),
        fmt_opt(tender.customer.as_deref()),
    )
}

fn recommendations_prompt(tender: &TenderRecord) -> String {
    format!(
        "Formulate recommendations for participating in this government tender:\n\
         Title: {}\n\
         Customer: {}\n\
         Price: {}\n\n\
         Provide:\n\
         1. An overall participation recommendation\n\
         2. Key preparation points\n\
         3. A bidding strategy\n\
         4. Potential advantages",
        fmt_text(&tender.title),
        fmt_opt(tender.customer.as_deref()),
        fmt_price(tender.price),
    )
}

// ============ Risk score ============

/// Count non-overlapping occurrences of `keyword` in lowercased `text`.
fn count_occurrences(text: &str, keyword: &str) -> usize {
    text.matches(keyword).count()
}

/// Derive the 0–100 risk score from the generated analyses.
///
/// Base: 10 points per risk-keyword occurrence, 5 per warning-keyword
/// occurrence, counted case-insensitively over all texts. Bonuses: fixed
/// marker phrases in the budget and compliance texts. Clamped to `[0, 100]`.
fn risk_score(texts: &[&str], budget: &str, compliance: &str) -> f64 {
    let combined = texts.join(" ").to_lowercase();

    let mut score = 0.0;
    for keyword in RISK_KEYWORDS {
        score += 10.0 * count_occurrences(&combined, keyword) as f64;
    }
    for keyword in WARNING_KEYWORDS {
        score += 5.0 * count_occurrences(&combined, keyword) as f64;
    }

    let budget = budget.to_lowercase();
    if budget.contains(BUDGET_OVERSTATEMENT_PHRASE) {
        score += 15.0;
    }
    if budget.contains(BUDGET_UNJUSTIFIED_PHRASE) {
        score += 10.0;
    }

    let compliance = compliance.to_lowercase();
    if compliance.contains(COMPLIANCE_VIOLATION_PHRASE) {
        score += 20.0;
    }
    if compliance.contains(COMPLIANCE_NONCOMPLIANCE_PHRASE) {
        score += 15.0;
    }

    score.clamp(0.0, 100.0)
}

// ============ Anomaly rules ============

/// Apply the five anomaly rules against raw tender fields and generated text.
fn detect_anomalies(
    tender: &TenderRecord,
    risk_text: &str,
    budget_text: &str,
    score: f64,
) -> Vec<AnomalyFinding> {
    let mut findings = Vec::new();

    // Rules 1 and 2: relative price movement against the initial price.
    if let (Some(initial), Some(price)) = (tender.initial_price, tender.price) {
        if initial > 0.0 {
            let reduction = (initial - price) / initial;
            if reduction > 0.0 && reduction < 0.005 {
                findings.push(AnomalyFinding {
                    anomaly_type: AnomalyType::PriceReduction,
                    description: format!(
                        "price reduced by only {:.2}% from the initial price",
                        reduction * 100.0
                    ),
                    severity: Severity::Medium,
                });
            }
            if reduction > 0.4 {
                findings.push(AnomalyFinding {
                    anomaly_type: AnomalyType::Dumping,
                    description: format!(
                        "price is {:.1}% below the initial price, possible dumping",
                        reduction * 100.0
                    ),
                    severity: Severity::High,
                });
            }
        }
    }

    // Rule 3: suspiciously short execution window.
    if let (Some(published), Some(execution)) =
        (tender.publication_date, tender.execution_deadline)
    {
        let days = (execution - published).num_days();
        if days < 10 {
            findings.push(AnomalyFinding {
                anomaly_type: AnomalyType::ShortDeadline,
                description: format!(
                    "only {} days between publication and execution deadline",
                    days
                ),
                severity: Severity::High,
            });
        }
    }

    // Rule 4: corruption indicators in the generated text. Pattern-major
    // scan over risk then budget text, first match wins, at most one finding.
    if let Some(finding) = corruption_finding(risk_text, budget_text) {
        findings.push(finding);
    }

    // Rule 5: the aggregate score itself.
    if score > HIGH_SCORE_THRESHOLD {
        findings.push(AnomalyFinding {
            anomaly_type: AnomalyType::HighRiskScore,
            description: format!(
                "aggregate risk score {:.1} exceeds the alert threshold of {:.0}",
                score, HIGH_SCORE_THRESHOLD
            ),
            severity: Severity::High,
        });
    }

    findings
}

fn corruption_finding(risk_text: &str, budget_text: &str) -> Option<AnomalyFinding> {
    for pattern in CORRUPTION_PATTERNS.iter() {
        for (field, text) in [("risk", risk_text), ("budget", budget_text)] {
            if let Some(m) = pattern.find(text) {
                return Some(AnomalyFinding {
                    anomaly_type: AnomalyType::CorruptionRisk,
                    description: format!(
                        "corruption indicator \"{}\" found in the {} analysis",
                        m.as_str(),
                        field
                    ),
                    severity: Severity::Critical,
                });
            }
        }
    }
    None
}
