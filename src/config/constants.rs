//! Constants for pipetopo

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Full path of the executable file
pub static EXECUTABLE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Bootstrap properties file read when none is given
pub const BOOTSTRAP_FILE: &str = "pipeline.default.properties";

/// Pipeline made active at startup when it exists
pub const DEFAULT_ACTIVE_PIPELINE: &str = "pipeline1";

/// Store namespace holding one JSON value per pipeline
pub const STORE_KEY_PREFIX: &str = "pipeline/configs";

/// Local Consul agent
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:8500";

/// Upper bound for any single store call
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Period of the background refresh
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Log directory, relative to the executable
pub const LOG_DIR: &str = "logs";

pub fn init_constants() {
    if let Ok(exe_path) = std::env::current_exe() {
        let _ = EXECUTABLE_PATH.set(exe_path);
    }
}
