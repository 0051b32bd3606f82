use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an existing pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Tenders table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenders (
            id TEXT PRIMARY KEY,
            tender_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            customer TEXT,
            supplier TEXT,
            category TEXT,
            initial_price REAL,
            price REAL,
            publication_date INTEGER,
            submission_deadline INTEGER,
            execution_deadline INTEGER,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Milestones table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS milestones (
            id TEXT PRIMARY KEY,
            tender_id TEXT NOT NULL,
            title TEXT NOT NULL,
            due_date INTEGER,
            completion_date INTEGER,
            status TEXT NOT NULL DEFAULT 'pending',
            amount REAL,
            FOREIGN KEY (tender_id) REFERENCES tenders(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Analyses table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            tender_id TEXT NOT NULL,
            technical_analysis TEXT NOT NULL,
            budget_analysis TEXT NOT NULL,
            risk_analysis TEXT NOT NULL,
            compliance_analysis TEXT NOT NULL,
            recommendations TEXT NOT NULL,
            risk_score REAL NOT NULL,
            confidential INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (tender_id) REFERENCES tenders(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Anomalies table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS anomalies (
            id TEXT PRIMARY KEY,
            analysis_id TEXT NOT NULL,
            tender_id TEXT NOT NULL,
            anomaly_type TEXT NOT NULL,
            description TEXT NOT NULL,
            severity TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (analysis_id) REFERENCES analyses(id),
            FOREIGN KEY (tender_id) REFERENCES tenders(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tenders_submission_deadline ON tenders(submission_deadline)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tenders_status ON tenders(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_milestones_tender_id ON milestones(tender_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_tender_id ON analyses(tender_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_anomalies_tender_id ON anomalies(tender_id)")
        .execute(pool)
        .await?;

    Ok(())
}
