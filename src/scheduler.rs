//! Background monitoring scheduler.
//!
//! [`TenderScheduler`] runs four independently-timed periodic jobs against
//! the tender store:
//!
//! | Job | Default period | Action |
//! |-----|----------------|--------|
//! | refresh | 1h | re-fetch open tenders from the registry |
//! | cleanup | 24h | delete tenders past the retention window |
//! | anomaly sweep | 4h | generate risk text for active tenders, flag indicator hits |
//! | deadline check | 6h | warn about submission deadlines inside the warning window |
//!
//! Each job ticks on its own interval; a failed tick is logged and skipped,
//! it never stops its own loop or any other job. Jobs are not mutually
//! exclusive — overlapping runs touch disjoint-enough data. All database
//! writes within one tick share a single commit-or-rollback transaction.
//!
//! Lifecycle is explicit: [`start`](TenderScheduler::start) spawns the
//! timer tasks, [`stop`](TenderScheduler::stop) signals shutdown and awaits
//! them.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::analyzer;
use crate::completion::CompletionClient;
use crate::config::SchedulerConfig;
use crate::models::TenderStatus;
use crate::source::TenderSource;
use crate::store;

/// Substrings that flag a tender during the anomaly sweep when they appear
/// in the generated risk text.
const SWEEP_INDICATORS: &[&str] = &["high risk", "critical", "violation", "corruption", "anomal"];

pub struct TenderScheduler {
    pool: SqlitePool,
    source: Arc<dyn TenderSource>,
    completion: Arc<dyn CompletionClient>,
    config: SchedulerConfig,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl TenderScheduler {
    pub fn new(
        pool: SqlitePool,
        source: Arc<dyn TenderSource>,
        completion: Arc<dyn CompletionClient>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            pool,
            source,
            completion,
            config,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawn the four job loops. Each fires one period after start and then
    /// on its own cadence.
    pub fn start(&mut self) {
        info!(
            refresh_secs = self.config.refresh_secs,
            cleanup_secs = self.config.cleanup_secs,
            sweep_secs = self.config.sweep_secs,
            deadline_secs = self.config.deadline_secs,
            "starting tender scheduler"
        );

        let pool = self.pool.clone();
        let source = self.source.clone();
        self.spawn_job("refresh", self.config.refresh_period(), move || {
            let pool = pool.clone();
            let source = source.clone();
            async move {
                let updated = refresh_tenders(&pool, source.as_ref()).await?;
                info!(updated, "refreshed tenders");
                Ok(())
            }
        });

        let pool = self.pool.clone();
        let retention_days = self.config.retention_days;
        self.spawn_job("cleanup", self.config.cleanup_period(), move || {
            let pool = pool.clone();
            async move {
                let deleted = cleanup_expired(&pool, retention_days).await?;
                info!(deleted, "cleaned up expired tenders");
                Ok(())
            }
        });

        let pool = self.pool.clone();
        let completion = self.completion.clone();
        self.spawn_job("anomaly-sweep", self.config.sweep_period(), move || {
            let pool = pool.clone();
            let completion = completion.clone();
            async move {
                let flagged = sweep_anomalies(&pool, completion.as_ref()).await?;
                info!(flagged, "anomaly sweep finished");
                Ok(())
            }
        });

        let pool = self.pool.clone();
        let warn_days = self.config.deadline_warn_days;
        self.spawn_job("deadline-check", self.config.deadline_period(), move || {
            let pool = pool.clone();
            async move {
                let approaching = check_deadlines(&pool, warn_days).await?;
                info!(approaching, "deadline check finished");
                Ok(())
            }
        });
    }

    fn spawn_job<F, Fut>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send,
    {
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; consume
            // it so jobs start one full period after scheduler start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = job().await {
                            error!(job = name, error = %e, "scheduled job failed, skipping this run");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!(job = name, "job loop stopped");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Signal all job loops to stop and wait for them to finish.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("tender scheduler stopped");
    }
}

/// Re-fetch every tender with an open submission deadline and overwrite its
/// mutable fields from the registry. A fetch failure skips that tender; all
/// updates commit together at the end of the run.
pub async fn refresh_tenders(pool: &SqlitePool, source: &dyn TenderSource) -> Result<u64> {
    let open = store::tenders_with_open_deadline(pool, Utc::now()).await?;

    let mut fetched = Vec::new();
    for tender in &open {
        match source.fetch(&tender.tender_id).await {
            Ok(item) => fetched.push((tender.id.clone(), item)),
            Err(e) => {
                warn!(tender_id = %tender.tender_id, error = %e, "fetch failed, keeping stale record this cycle");
            }
        }
    }

    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;
    let mut updated = 0u64;

    for (row_id, item) in &fetched {
        // A page that exposes no status block must not overwrite the status
        // we already hold for the tender.
        let status = if item.status.is_empty() {
            None
        } else {
            Some(TenderStatus::parse(&item.status).as_str())
        };
        sqlx::query(
            r#"
            UPDATE tenders
            SET title = ?, description = ?, price = ?, customer = ?,
                status = COALESCE(?, status), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price)
        .bind(&item.customer)
        .bind(status)
        .bind(now)
        .bind(row_id)
        .execute(&mut *tx)
        .await?;
        updated += 1;
    }

    tx.commit().await?;
    Ok(updated)
}

/// Delete tenders whose submission deadline is older than the retention
/// window. Returns the number of rows removed.
pub async fn cleanup_expired(pool: &SqlitePool, retention_days: i64) -> Result<u64> {
    let cutoff = (Utc::now() - ChronoDuration::days(retention_days)).timestamp();

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "DELETE FROM tenders WHERE submission_deadline IS NOT NULL AND submission_deadline < ?",
    )
    .bind(cutoff)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(result.rows_affected())
}

/// Generate risk text for every active tender and count the ones whose
/// output contains an indicator substring. Flagged tenders are logged only;
/// persisted anomaly records come from the full analyze path.
pub async fn sweep_anomalies(pool: &SqlitePool, completion: &dyn CompletionClient) -> Result<u64> {
    let active = store::active_tenders(pool).await?;
    let mut flagged = 0u64;

    for tender in &active {
        let text = match completion.complete(&analyzer::risk_prompt(tender)).await {
            Ok(text) => text.to_lowercase(),
            Err(e) => {
                warn!(tender_id = %tender.tender_id, error = %e, "risk generation failed during sweep");
                continue;
            }
        };

        if SWEEP_INDICATORS.iter().any(|ind| text.contains(ind)) {
            warn!(tender_id = %tender.tender_id, "anomaly indicators in generated risk text");
            flagged += 1;
        }
    }

    Ok(flagged)
}

/// Warn about active tenders whose submission deadline falls within the
/// next `warn_days` days. Returns the number of tenders warned about.
pub async fn check_deadlines(pool: &SqlitePool, warn_days: i64) -> Result<u64> {
    let now = Utc::now();
    let active = store::active_tenders(pool).await?;
    let mut approaching = 0u64;

    for tender in &active {
        let Some(deadline) = tender.submission_deadline else {
            continue;
        };
        if deadline <= now {
            continue;
        }
        let days_left = (deadline - now).num_days();
        if days_left < warn_days {
            warn!(
                tender_id = %tender.tender_id,
                days_left,
                "submission deadline approaching"
            );
            approaching += 1;
        }
    }

    Ok(approaching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTender;
    use crate::{db, migrate, store};
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    async fn pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    fn seed(tender_id: &str, deadline_in_days: i64, status: &str) -> SourceTender {
        SourceTender {
            tender_id: tender_id.to_string(),
            title: format!("Tender {}", tender_id),
            description: "desc".to_string(),
            price: Some(1000.0),
            customer: Some("customer".to_string()),
            publication_date: Some(Utc::now() - ChronoDuration::days(1)),
            deadline: Some(Utc::now() + ChronoDuration::days(deadline_in_days)),
            status: status.to_string(),
        }
    }

    /// Source returning a renamed tender, or an error for ids listed in `fail`.
    struct FakeSource {
        fail: Vec<String>,
    }

    #[async_trait]
    impl TenderSource for FakeSource {
        async fn fetch(&self, tender_id: &str) -> Result<SourceTender> {
            if self.fail.iter().any(|f| f == tender_id) {
                bail!("registry unreachable");
            }
            let mut item = seed(tender_id, 10, "bidding");
            item.title = format!("Refreshed {}", tender_id);
            item.price = Some(2000.0);
            Ok(item)
        }
    }

    /// Source whose pages expose no status block.
    struct StatuslessSource;

    #[async_trait]
    impl TenderSource for StatuslessSource {
        async fn fetch(&self, tender_id: &str) -> Result<SourceTender> {
            let mut item = seed(tender_id, 10, "");
            item.title = format!("Refreshed {}", tender_id);
            Ok(item)
        }
    }

    /// Completion client returning one fixed text for every prompt.
    struct FixedClient {
        text: String,
    }

    #[async_trait]
    impl CompletionClient for FixedClient {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.text.clone())
        }
    }

    #[tokio::test]
    async fn test_refresh_updates_open_tenders() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-open", 5, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-past", -5, "bidding")).await.unwrap();

        let source = FakeSource { fail: vec![] };
        let updated = refresh_tenders(&pool, &source).await.unwrap();
        assert_eq!(updated, 1);

        let open = store::get_tender(&pool, "T-open").await.unwrap().unwrap();
        assert_eq!(open.title, "Refreshed T-open");
        assert_eq!(open.price, Some(2000.0));

        // Past-deadline tender untouched.
        let past = store::get_tender(&pool, "T-past").await.unwrap().unwrap();
        assert_eq!(past.title, "Tender T-past");
    }

    #[tokio::test]
    async fn test_refresh_skips_failed_fetch() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-ok", 5, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-bad", 5, "bidding")).await.unwrap();

        let source = FakeSource {
            fail: vec!["T-bad".to_string()],
        };
        let updated = refresh_tenders(&pool, &source).await.unwrap();
        assert_eq!(updated, 1);

        let ok = store::get_tender(&pool, "T-ok").await.unwrap().unwrap();
        assert_eq!(ok.title, "Refreshed T-ok");
        let bad = store::get_tender(&pool, "T-bad").await.unwrap().unwrap();
        assert_eq!(bad.title, "Tender T-bad");
    }

    #[tokio::test]
    async fn test_refresh_keeps_status_when_page_has_none() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-keep", 5, "bidding")).await.unwrap();

        let source = StatuslessSource;
        let updated = refresh_tenders(&pool, &source).await.unwrap();
        assert_eq!(updated, 1);

        let tender = store::get_tender(&pool, "T-keep").await.unwrap().unwrap();
        assert_eq!(tender.title, "Refreshed T-keep");
        assert_eq!(tender.status, TenderStatus::Bidding);
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-ancient", -40, "completed")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-recent", -5, "completed")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-live", 5, "bidding")).await.unwrap();

        let deleted = cleanup_expired(&pool, 30).await.unwrap();
        assert_eq!(deleted, 1);

        assert!(store::get_tender(&pool, "T-ancient").await.unwrap().is_none());
        assert!(store::get_tender(&pool, "T-recent").await.unwrap().is_some());
        assert!(store::get_tender(&pool, "T-live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_counts_flagged_active_tenders() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-1", 5, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-2", 5, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-done", 5, "completed")).await.unwrap();

        let alarming = FixedClient {
            text: "This tender carries high risk of corruption.".to_string(),
        };
        // Only the two active tenders are swept.
        assert_eq!(sweep_anomalies(&pool, &alarming).await.unwrap(), 2);

        let calm = FixedClient {
            text: "Nothing unusual found.".to_string(),
        };
        assert_eq!(sweep_anomalies(&pool, &calm).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deadline_check_window() {
        let pool = pool().await;
        store::upsert_tender(&pool, &seed("T-soon", 3, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-later", 20, "bidding")).await.unwrap();
        store::upsert_tender(&pool, &seed("T-done", 3, "completed")).await.unwrap();

        assert_eq!(check_deadlines(&pool, 7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let pool = pool().await;
        let config = SchedulerConfig {
            refresh_secs: 3600,
            cleanup_secs: 3600,
            sweep_secs: 3600,
            deadline_secs: 3600,
            retention_days: 30,
            deadline_warn_days: 7,
        };
        let mut scheduler = TenderScheduler::new(
            pool,
            Arc::new(FakeSource { fail: vec![] }),
            Arc::new(FixedClient {
                text: "ok".to_string(),
            }),
            config,
        );

        scheduler.start();
        assert_eq!(scheduler.handles.len(), 4);
        scheduler.stop().await;
        assert!(scheduler.handles.is_empty());
    }
}
