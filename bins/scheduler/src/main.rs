//! Parcela Scheduler
//!
//! Runs the overdue interest accrual job on a fixed interval and reports
//! each run to administrators through the background worker pool.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parcela_core::accrual::{AccrualJob, AccrualReport, AccrualSettings};
use parcela_core::ports::{Clock, NotificationKind, Notifier, SystemClock, TaskError, TaskQueue};
use parcela_core::worker::{WorkerPool, WorkerPoolConfig};
use parcela_db::{PgNotifier, PgStore, connect_with};
use parcela_shared::AppConfig;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parcela_scheduler=debug,parcela_core=debug,parcela_db=debug".into());
    let json = std::env::var("PARCELA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let pool = WorkerPool::start(WorkerPoolConfig::from(&config.worker));
    let notifier: Arc<dyn Notifier> = Arc::new(PgNotifier::new(db.clone()));
    let job = AccrualJob::new(
        Arc::new(PgStore::new(db)),
        AccrualSettings::from(&config.accrual),
    );
    let clock = SystemClock;

    let period = Duration::from_secs(config.accrual.interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !config.accrual.run_on_start {
        // The first tick completes immediately.
        ticker.tick().await;
    }
    info!(
        interval_secs = period.as_secs(),
        annual_rate = %config.accrual.annual_rate,
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match job.run(clock.now()).await {
                    Ok(report) => report_run(&pool, &notifier, report),
                    Err(e) => error!(error = %e, code = e.error_code(), "Accrual run failed"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received");
                break;
            }
        }
    }

    pool.shutdown().await;
    info!("Scheduler stopped");
    Ok(())
}

/// Tells administrators about runs that charged interest or hit failures.
fn report_run(queue: &WorkerPool, notifier: &Arc<dyn Notifier>, report: AccrualReport) {
    let charged = report.created + report.updated;
    if charged == 0 && report.failed == 0 {
        return;
    }

    let kind = if report.failed > 0 {
        NotificationKind::Warning
    } else {
        NotificationKind::Info
    };
    let message = format!(
        "Overdue interest run: {charged} charges written, {} payments failed, {} contracts refreshed",
        report.failed, report.contracts_refreshed
    );
    let notifier = Arc::clone(notifier);
    queue.enqueue(
        "notify_admins",
        async move {
            notifier
                .notify_admins("Interest accrual", &message, kind)
                .await
                .map_err(TaskError::from)
        }
        .boxed(),
    );
}
