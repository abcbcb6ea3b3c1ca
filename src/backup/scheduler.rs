use crate::backup::BackupEngine;
use crate::error::{BackupError, Result};
use chrono::Local;
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::time::sleep;
use tracing::{info, warn};

/// Parses a five-field cron expression (minute, hour, day-of-month, month,
/// day-of-week). The `cron` crate wants a leading seconds field, so one is
/// prepended here.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let with_seconds = format!("0 {}", expr.trim());
    Schedule::from_str(&with_seconds)
        .map_err(|e| BackupError::Config(format!("Invalid cron schedule '{}': {}", expr, e)))
}

/// Recurring trigger loop: fires a batch run at each schedule occurrence in
/// the process's local time zone until shutdown is requested.
pub async fn run_scheduler(
    engine: Arc<BackupEngine>,
    expr: &str,
    shutdown: Arc<AtomicUsize>,
) -> Result<()> {
    let schedule = parse_schedule(expr)?;

    info!("Backup scheduler started with schedule '{}'", expr);

    loop {
        if shutdown.load(Ordering::Relaxed) > 0 {
            break;
        }

        let next = match schedule.upcoming(Local).next() {
            Some(t) => t,
            None => {
                warn!("Schedule '{}' has no upcoming occurrence, stopping", expr);
                break;
            }
        };
        info!("Next scheduled backup at {}", next.format("%Y-%m-%d %H:%M:%S"));

        let wait = (next - Local::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        select! {
            _ = sleep(wait) => {}
            _ = async {
                while shutdown.load(Ordering::Relaxed) == 0 {
                    sleep(std::time::Duration::from_millis(100)).await;
                }
            } => {
                info!("Scheduler shutdown requested during wait");
                break;
            }
        }

        if shutdown.load(Ordering::Relaxed) > 0 {
            break;
        }

        if engine.try_run_batch().await.is_none() {
            warn!("Scheduled run skipped: a batch is already in progress");
        }
    }

    info!("Scheduler stopped");
    Ok(())
}
