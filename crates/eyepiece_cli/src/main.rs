//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `eyepiece_core` linkage end to end against an in-memory database.
//! - Keep output deterministic for quick local sanity checks.
//! - Write core log events to `$EYEPIECE_LOG_DIR` (or a temp directory).

use eyepiece_core::{
    default_log_level, eyepiece_store, init_logging, telescope_store, DbConfig, DbManager,
    EntityRepository, Eyepiece, RepoResult, Telescope,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

const LOG_DIR_ENV: &str = "EYEPIECE_LOG_DIR";

fn main() -> ExitCode {
    println!("eyepiece_core version={}", eyepiece_core::core_version());

    let log_dir = resolve_log_dir(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from));
    if let Err(err) = init_cli_logging(&log_dir) {
        eprintln!("logging disabled: {err}");
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_smoke module=cli status=error error={err}");
            eprintln!("smoke check failed: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Configured directory when absolute, otherwise `<temp>/eyepiece`.
fn resolve_log_dir(configured: Option<PathBuf>) -> PathBuf {
    configured
        .filter(|dir| dir.is_absolute())
        .unwrap_or_else(|| std::env::temp_dir().join("eyepiece"))
}

fn init_cli_logging(dir: &Path) -> Result<(), eyepiece_core::LoggingError> {
    init_logging(default_log_level().as_str(), &dir.to_string_lossy())
}

fn run() -> RepoResult<()> {
    let manager = Rc::new(DbManager::new(DbConfig::in_memory())?);
    let telescopes = telescope_store(&manager)?;
    let eyepieces = eyepiece_store(&manager)?;

    telescopes.insert(&Telescope::new("8in Dob", 1200, 203))?;
    eyepieces.insert(&Eyepiece::new("Plossl 25mm", 25, 52))?;

    for scope in telescopes.get_all_entries_as_list()? {
        println!(
            "telescope id={} name={} focal_length={} aperture={}",
            scope.id.unwrap_or_default(),
            scope.name,
            scope.focal_length,
            scope.aperture
        );
    }
    for eyepiece in eyepieces.get_all_entries_as_list()? {
        println!(
            "eyepiece id={} name={} focal_length={} apparent_fov={}",
            eyepiece.id.unwrap_or_default(),
            eyepiece.name,
            eyepiece.focal_length,
            eyepiece.apparent_fov
        );
    }

    manager.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{init_cli_logging, resolve_log_dir, run};
    use std::path::PathBuf;

    #[test]
    fn relative_or_missing_log_dir_falls_back_to_temp() {
        let fallback = std::env::temp_dir().join("eyepiece");
        assert_eq!(resolve_log_dir(None), fallback);
        assert_eq!(resolve_log_dir(Some(PathBuf::from("logs"))), fallback);
    }

    #[test]
    fn smoke_run_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = resolve_log_dir(Some(dir.path().to_path_buf()));
        assert_eq!(log_dir, dir.path());

        init_cli_logging(&log_dir).unwrap();
        run().unwrap();
        log::logger().flush();

        let (_, active_dir) = eyepiece_core::logging_status().unwrap();
        assert_eq!(active_dir, log_dir);
        let has_log_file = std::fs::read_dir(&log_dir)
            .unwrap()
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().starts_with("eyepiece"));
        assert!(has_log_file);
    }
}
