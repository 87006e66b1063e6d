//! Per-run debug log file

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::constants::{EXECUTABLE_PATH, LOG_DIR};

/// `<exe dir>/logs/<binary>-<command>-<pid>-<unix secs>.log`
pub fn log_file_path(command: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let executable = EXECUTABLE_PATH
        .get()
        .ok_or("EXECUTABLE_PATH not initialized")?;
    let binary = executable
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let logs_dir = executable
        .parent()
        .ok_or("Cannot get executable parent directory")?
        .join(LOG_DIR);
    std::fs::create_dir_all(&logs_dir)?;

    let started = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(logs_dir.join(format!(
        "{binary}-{command}-{}-{started}.log",
        std::process::id()
    )))
}

/// Open a fresh log file for `command`
pub fn create_log_file(command: &str) -> Result<File, Box<dyn std::error::Error>> {
    let log_path = log_file_path(command)?;
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    eprintln!("Debug log: {}", log_path.display());
    Ok(log_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants;

    #[test]
    fn test_log_file_named_after_binary_and_command() {
        constants::init_constants();
        let path = log_file_path("render").unwrap();
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        let binary = EXECUTABLE_PATH.get().unwrap().file_stem().unwrap();

        assert!(file_name.starts_with(&format!("{}-render-", binary.to_string_lossy())));
        assert!(file_name.ends_with(".log"));
        assert_eq!(path.parent().unwrap().file_name().unwrap(), LOG_DIR);
    }
}
