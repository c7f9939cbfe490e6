//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `cms_core` linkage and print its version.
//! - Open a database (file path argument, in-memory otherwise) and print the
//!   active category forest as JSON.
//!
//! Usage: `cms_cli [DB_PATH] [CONFIG_JSON_PATH]`

use cms_core::{
    init_logging_from_config, open_db_in_memory, open_db_with_config, BaseRepository, CoreConfig,
    EntityKind, SqliteRepository,
};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("cms_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    let config = match args.next() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("cannot read config `{path}`: {err}"))?;
            CoreConfig::from_json_str(&raw).map_err(|err| err.to_string())?
        }
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config.logging)?;

    println!("cms_core version={}", cms_core::core_version());

    let conn = match db_path.as_deref() {
        Some(path) => open_db_with_config(path, &config.database),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).map_err(|err| err.to_string())?;
    let forest = repo.find_trees(false).map_err(|err| err.to_string())?;
    info!(
        "event=cli_forest module=cli status=ok roots={}",
        forest.len()
    );
    let json = serde_json::to_string_pretty(&forest).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}
