//! Tender record store: the SQLite queries shared by the CLI and scheduler.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    AnalysisResult, Milestone, MilestoneStatus, SourceTender, TenderRecord, TenderStatus,
};

fn ts_to_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
}

fn row_to_tender(row: &SqliteRow) -> TenderRecord {
    TenderRecord {
        id: row.get("id"),
        tender_id: row.get("tender_id"),
        title: row.get("title"),
        description: row.get("description"),
        customer: row.get("customer"),
        supplier: row.get("supplier"),
        category: row.get("category"),
        initial_price: row.get("initial_price"),
        price: row.get("price"),
        publication_date: ts_to_datetime(row.get("publication_date")),
        submission_deadline: ts_to_datetime(row.get("submission_deadline")),
        execution_deadline: ts_to_datetime(row.get("execution_deadline")),
        status: TenderStatus::parse(row.get::<String, _>("status").as_str()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert or refresh a tender from adapter output. Returns the row id.
pub async fn upsert_tender(pool: &SqlitePool, item: &SourceTender) -> Result<String> {
    let existing_id: Option<String> =
        sqlx::query_scalar("SELECT id FROM tenders WHERE tender_id = ?")
            .bind(&item.tender_id)
            .fetch_optional(pool)
            .await?;

    let id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = Utc::now().timestamp();
    // A page with no status block yields an empty token; treat the tender
    // as published so it stays visible to the monitoring jobs.
    let status = if item.status.is_empty() {
        TenderStatus::Published
    } else {
        TenderStatus::parse(&item.status)
    };

    sqlx::query(
        r#"
        INSERT INTO tenders (id, tender_id, title, description, customer, price, publication_date, submission_deadline, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tender_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            customer = excluded.customer,
            price = excluded.price,
            publication_date = excluded.publication_date,
            submission_deadline = excluded.submission_deadline,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&id)
    .bind(&item.tender_id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.customer)
    .bind(item.price)
    .bind(item.publication_date.map(|d| d.timestamp()))
    .bind(item.deadline.map(|d| d.timestamp()))
    .bind(status.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn get_tender(pool: &SqlitePool, tender_id: &str) -> Result<Option<TenderRecord>> {
    let row = sqlx::query("SELECT * FROM tenders WHERE tender_id = ?")
        .bind(tender_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_tender))
}

pub async fn list_tenders(pool: &SqlitePool) -> Result<Vec<TenderRecord>> {
    let rows = sqlx::query("SELECT * FROM tenders ORDER BY updated_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_tender).collect())
}

/// Tenders whose submission deadline is still in the future.
pub async fn tenders_with_open_deadline(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<TenderRecord>> {
    let rows = sqlx::query("SELECT * FROM tenders WHERE submission_deadline > ?")
        .bind(now.timestamp())
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_tender).collect())
}

/// Tenders in an active lifecycle state.
pub async fn active_tenders(pool: &SqlitePool) -> Result<Vec<TenderRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM tenders
        WHERE status IN ('published', 'bidding', 'evaluation', 'awarded', 'signed', 'in_progress')
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_tender).collect())
}

pub async fn milestones_for_tender(pool: &SqlitePool, tender_row_id: &str) -> Result<Vec<Milestone>> {
    let rows = sqlx::query(
        "SELECT * FROM milestones WHERE tender_id = ? ORDER BY due_date ASC",
    )
    .bind(tender_row_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Milestone {
            id: row.get("id"),
            tender_id: row.get("tender_id"),
            title: row.get("title"),
            due_date: ts_to_datetime(row.get("due_date")),
            completion_date: ts_to_datetime(row.get("completion_date")),
            status: MilestoneStatus::parse(row.get::<String, _>("status").as_str()),
            amount: row.get("amount"),
        })
        .collect())
}

/// Record a contract milestone for a tender. Returns the milestone row id.
pub async fn insert_milestone(pool: &SqlitePool, milestone: &Milestone) -> Result<String> {
    let id = if milestone.id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        milestone.id.clone()
    };

    sqlx::query(
        r#"
        INSERT INTO milestones (id, tender_id, title, due_date, completion_date, status, amount)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&milestone.tender_id)
    .bind(&milestone.title)
    .bind(milestone.due_date.map(|d| d.timestamp()))
    .bind(milestone.completion_date.map(|d| d.timestamp()))
    .bind(milestone.status.as_str())
    .bind(milestone.amount)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Persist an analysis run and its anomaly findings in one transaction.
/// Returns the analysis row id.
pub async fn insert_analysis(
    pool: &SqlitePool,
    tender_row_id: &str,
    result: &AnalysisResult,
) -> Result<String> {
    let analysis_id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO analyses (id, tender_id, technical_analysis, budget_analysis, risk_analysis, compliance_analysis, recommendations, risk_score, confidential, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&analysis_id)
    .bind(tender_row_id)
    .bind(&result.technical_analysis)
    .bind(&result.budget_analysis)
    .bind(&result.risk_analysis)
    .bind(&result.compliance_analysis)
    .bind(&result.recommendations)
    .bind(result.risk_score)
    .bind(result.confidential_mode as i64)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for finding in &result.anomalies {
        sqlx::query(
            r#"
            INSERT INTO anomalies (id, analysis_id, tender_id, anomaly_type, description, severity, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&analysis_id)
        .bind(tender_row_id)
        .bind(finding.anomaly_type.as_str())
        .bind(&finding.description)
        .bind(finding.severity.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(analysis_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnomalyFinding, AnomalyType, Severity};
    use crate::{db, migrate};
    use chrono::Duration;

    async fn pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    fn source_tender(tender_id: &str, deadline_in_days: i64) -> SourceTender {
        SourceTender {
            tender_id: tender_id.to_string(),
            title: format!("Tender {}", tender_id),
            description: "desc".to_string(),
            price: Some(1000.0),
            customer: Some("customer".to_string()),
            publication_date: Some(Utc::now() - Duration::days(1)),
            deadline: Some(Utc::now() + Duration::days(deadline_in_days)),
            status: "bidding".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_insert_then_update() {
        let pool = pool().await;

        let id1 = upsert_tender(&pool, &source_tender("T-1", 10)).await.unwrap();

        let mut updated = source_tender("T-1", 10);
        updated.title = "Renamed".to_string();
        updated.price = Some(900.0);
        let id2 = upsert_tender(&pool, &updated).await.unwrap();

        assert_eq!(id1, id2);
        let tender = get_tender(&pool, "T-1").await.unwrap().unwrap();
        assert_eq!(tender.title, "Renamed");
        assert_eq!(tender.price, Some(900.0));
        assert_eq!(tender.status, TenderStatus::Bidding);

        assert_eq!(list_tenders(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_deadline_filter() {
        let pool = pool().await;
        upsert_tender(&pool, &source_tender("T-open", 5)).await.unwrap();
        upsert_tender(&pool, &source_tender("T-closed", -5)).await.unwrap();

        let open = tenders_with_open_deadline(&pool, Utc::now()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].tender_id, "T-open");
    }

    #[tokio::test]
    async fn test_active_filter() {
        let pool = pool().await;
        upsert_tender(&pool, &source_tender("T-a", 5)).await.unwrap();
        let mut done = source_tender("T-b", 5);
        done.status = "completed".to_string();
        upsert_tender(&pool, &done).await.unwrap();

        let active = active_tenders(&pool).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].tender_id, "T-a");
    }

    #[tokio::test]
    async fn test_scraped_status_feeds_active_filter() {
        let pool = pool().await;

        // Status exactly as the registry page words it, run through the
        // adapter's extraction before landing in the store.
        let html = r#"
        <div class="registry-entry__header-mid__title">Bidding in progress</div>
        <div class="registry-entry__header-mid-title">Road maintenance</div>
        "#;
        let item = crate::source::extract_tender("T-page", html);
        upsert_tender(&pool, &item).await.unwrap();

        let tender = get_tender(&pool, "T-page").await.unwrap().unwrap();
        assert_eq!(tender.status, TenderStatus::Bidding);

        let active = active_tenders(&pool).await.unwrap();
        assert!(active.iter().any(|t| t.tender_id == "T-page"));
    }

    #[tokio::test]
    async fn test_upsert_without_status_defaults_to_published() {
        let pool = pool().await;
        let mut item = source_tender("T-bare", 5);
        item.status = String::new();
        upsert_tender(&pool, &item).await.unwrap();

        let tender = get_tender(&pool, "T-bare").await.unwrap().unwrap();
        assert_eq!(tender.status, TenderStatus::Published);
        assert!(!active_tenders(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_milestone_insert_and_read_ordered() {
        let pool = pool().await;
        let row_id = upsert_tender(&pool, &source_tender("T-1", 5)).await.unwrap();

        let later = Milestone {
            id: String::new(),
            tender_id: row_id.clone(),
            title: "Final delivery".to_string(),
            due_date: Some(Utc::now() + Duration::days(30)),
            completion_date: None,
            status: MilestoneStatus::Pending,
            amount: Some(500.0),
        };
        let earlier = Milestone {
            id: String::new(),
            tender_id: row_id.clone(),
            title: "Site survey".to_string(),
            due_date: Some(Utc::now() + Duration::days(5)),
            completion_date: Some(Utc::now()),
            status: MilestoneStatus::Completed,
            amount: None,
        };
        insert_milestone(&pool, &later).await.unwrap();
        insert_milestone(&pool, &earlier).await.unwrap();

        let milestones = milestones_for_tender(&pool, &row_id).await.unwrap();
        assert_eq!(milestones.len(), 2);
        assert_eq!(milestones[0].title, "Site survey");
        assert_eq!(milestones[0].status, MilestoneStatus::Completed);
        assert_eq!(milestones[1].title, "Final delivery");
        assert_eq!(milestones[1].amount, Some(500.0));
    }

    #[tokio::test]
    async fn test_insert_analysis_with_anomalies() {
        let pool = pool().await;
        let row_id = upsert_tender(&pool, &source_tender("T-1", 5)).await.unwrap();

        let result = AnalysisResult {
            technical_analysis: "t".to_string(),
            budget_analysis: "b".to_string(),
            risk_analysis: "r".to_string(),
            compliance_analysis: "c".to_string(),
            recommendations: "rec".to_string(),
            risk_score: 42.0,
            anomalies: vec![AnomalyFinding {
                anomaly_type: AnomalyType::Dumping,
                description: "d".to_string(),
                severity: Severity::High,
            }],
            confidential_mode: false,
        };

        let analysis_id = insert_analysis(&pool, &row_id, &result).await.unwrap();

        let score: f64 = sqlx::query_scalar("SELECT risk_score FROM analyses WHERE id = ?")
            .bind(&analysis_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(score, 42.0);

        let anomaly_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM anomalies WHERE analysis_id = ?")
                .bind(&analysis_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(anomaly_count, 1);
    }
}
