//! CLI driver for the schedule engine.
//!
//! # Responsibility
//! - Load an items document, ingest it into an in-memory store and print the
//!   resulting hierarchy as JSON.
//! - Optionally print every item's completion status for a query date.
//!
//! Usage: `foresight_cli <items.json> [YYYY-MM-DD]`
//!
//! File logging is enabled when `FORESIGHT_LOG_DIR` is set; the level comes
//! from `FORESIGHT_LOG_LEVEL` or the build default.

use foresight_core::{
    default_log_level, init_logging, parse_items_document, MemoryItemStore, ScheduleService,
};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let (path, query_date) = match args.as_slice() {
        [path] => (path.as_str(), None),
        [path, date] => (path.as_str(), Some(date.as_str())),
        _ => {
            return Err(format!(
                "usage: foresight_cli <items.json> [YYYY-MM-DD] (core {})",
                foresight_core::core_version()
            ))
        }
    };

    if let Ok(log_dir) = std::env::var("FORESIGHT_LOG_DIR") {
        let level = std::env::var("FORESIGHT_LOG_LEVEL")
            .unwrap_or_else(|_| default_log_level().as_str().to_string());
        init_logging(&level, &log_dir)?;
    }

    let json = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{path}`: {err}"))?;
    let document =
        parse_items_document(&json).map_err(|err| format!("invalid items document: {err}"))?;

    let service = ScheduleService::new(MemoryItemStore::new());
    let count = service
        .ingest(document.items)
        .map_err(|err| format!("[{}] {err}", err.code()))?;
    info!("event=cli_ingest module=cli status=ok item_count={count} source={path}");

    let items = service
        .hierarchy()
        .map_err(|err| format!("[{}] {err}", err.code()))?;
    let rendered = serde_json::to_string_pretty(&items)
        .map_err(|err| format!("failed to render hierarchy: {err}"))?;
    println!("{rendered}");

    if let Some(date) = query_date {
        for item in &items {
            let status = service
                .completion_status(&item.id, date)
                .map_err(|err| format!("[{}] {err}", err.code()))?;
            println!("{}\t{}\t{status}", item.id, item.name);
        }
    }
    Ok(())
}
