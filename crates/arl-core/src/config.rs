//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// Options governing rule compilation.
///
/// Every field has a serde default so callers can deserialize a partial
/// document (or use [`CompilerOptions::default`]) and only override what
/// they need.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Apply the `.semanticId` / `.externalSubjectId` shorthand rewrite to
    /// every reference suffix, including embedded ones (e.g.
    /// `submodelDescriptors[0].semanticId`). When false, only a bare
    /// root-level `semanticId` path is rewritten.
    #[serde(default = "default_true")]
    pub general_suffix_rewrite: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            general_suffix_rewrite: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}
