mod backup;
mod config;
mod dump;
mod error;
mod log;
mod remote;
mod web;

use backup::BackupEngine;
use dump::MysqldumpExecutor;
use remote::DriveClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use web::AppState;

#[tokio::main]
async fn main() {
    log::init();

    info!("MySQL Drive Backup starting...");

    let config = match config::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if config.databases.is_empty() {
        warn!("No database targets configured, nothing will be backed up");
    }

    let ctrl_c_count = Arc::new(AtomicUsize::new(0));
    let ctrl_c_count_clone = ctrl_c_count.clone();

    ctrlc::set_handler(move || {
        let count = ctrl_c_count_clone.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            println!("\n\nShutdown signal received. Press Ctrl+C again to force exit...");
        } else {
            println!("\nForce exiting...");
            std::process::exit(130);
        }
    })
    .expect("Error setting Ctrl-C handler");

    let engine = Arc::new(BackupEngine::new(
        config.clone(),
        Box::new(MysqldumpExecutor::new()),
        Box::new(DriveClient::new(&config.drive)),
    ));

    if config.web.enabled {
        let state = AppState::new(engine.clone(), &config.web);
        tokio::spawn(web::start_server(state, config.web.port));
    }

    match backup::run_scheduler(engine, &config.schedule, ctrl_c_count).await {
        Ok(_) => {
            info!("Application exited normally");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
