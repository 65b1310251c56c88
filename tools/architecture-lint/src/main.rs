//! Command-line entry point for the layering check.
//!
//! Lints `core/` of this workspace, or the crate directory given as the
//! first argument.

use std::fmt;
use std::path::{Path, PathBuf};

use architecture_lint::LintError;

/// Renders the lint failure as the process error message.
struct Failure(LintError);

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn main() -> Result<(), Failure> {
    let crate_dir = std::env::args_os().nth(1).map_or_else(
        || {
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .join("core")
        },
        PathBuf::from,
    );
    architecture_lint::lint_crate(&crate_dir).map_err(Failure)
}
