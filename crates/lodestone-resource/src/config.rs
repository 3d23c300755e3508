// Loader configuration

use serde::{Deserialize, Serialize};

use crate::path::PathRule;

/// Configuration for a loader instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Initial path rule for script URLs
    pub script_path: Option<PathRule>,

    /// Initial path rule for style URLs
    pub style_path: Option<PathRule>,

    /// Prime the transport cache for URLs as soon as they appear in a
    /// dependency declaration, ahead of any require
    pub prefetch_on_declare: bool,
}
