//! Bootstrap loading: properties text into pipeline definitions.

pub mod parser;
pub mod properties;

pub use parser::BootstrapParser;
pub use properties::parse_properties;

use crate::error::{BootstrapError, BootstrapResult};
use crate::topology::PipelineDefinition;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Read a bootstrap file and parse it into pipelines.
///
/// A missing file yields no pipelines.
pub async fn load_bootstrap_file(
    path: &Path,
) -> BootstrapResult<BTreeMap<String, PipelineDefinition>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Unable to find bootstrap file {:?}", path);
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(BootstrapError::io(path, e)),
    };
    info!("Loaded bootstrap file {:?}", path);

    let properties = parse_properties(&content);
    Ok(BootstrapParser::parse(&properties))
}
