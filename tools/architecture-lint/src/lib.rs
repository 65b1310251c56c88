//! Layering check for `savorly-core`.
//!
//! Every file under `core/src/domain` and `core/src/outbound` is parsed and
//! each path it names is reduced to a [`Dependency`]: either a top-level
//! module of the crate or an external crate. Each [`Layer`] denies a few of
//! both. Domain code must not see adapters, configuration or process setup;
//! adapters must not see configuration or process setup.
//!
//! Run it with `cargo run -p architecture-lint`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syn::visit::Visit;

/// Name the crate uses for itself in absolute paths.
const SELF_CRATE: &str = "savorly_core";

/// Top-level modules of the crate that a bare path may name.
const CRATE_MODULES: [&str; 3] = ["config", "domain", "outbound"];

/// A linted directory under `core/src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Domain services, value types and ports.
    Domain,
    /// Adapters implementing the ports.
    Outbound,
}

impl Layer {
    const ALL: [Self; 2] = [Self::Domain, Self::Outbound];

    /// Layer owning `file`, a path relative to `core/src`.
    pub fn of(file: &Path) -> Option<Self> {
        let top = file.components().next()?.as_os_str();
        Self::ALL.into_iter().find(|layer| top == layer.dir())
    }

    const fn dir(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Outbound => "outbound",
        }
    }

    const fn denied_modules(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &["config", "outbound"],
            Self::Outbound => &["config"],
        }
    }

    const fn denied_crates(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &[
                "cap_std",
                "clap",
                "ortho_config",
                "tempfile",
                "tracing_subscriber",
            ],
            Self::Outbound => &["clap", "ortho_config", "tracing_subscriber"],
        }
    }

    fn permits(self, dependency: &Dependency) -> bool {
        match dependency {
            Dependency::Module(name) => !self.denied_modules().contains(&name.as_str()),
            Dependency::Crate(name) => !self.denied_crates().contains(&name.as_str()),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

/// What a path in a source file points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dependency {
    /// A top-level module of the crate, such as `outbound`.
    Module(String),
    /// An external crate, such as `clap`.
    Crate(String),
}

impl Dependency {
    /// Dependency on the crate module `name`.
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module(name.into())
    }

    /// Dependency on the external crate `name`.
    pub fn external(name: impl Into<String>) -> Self {
        Self::Crate(name.into())
    }

    /// Classify the leading segments of a path.
    ///
    /// Relative prefixes (`crate`, `self`, `super`) are skipped, so the
    /// first named segment after them is taken as the module. Single
    /// segment paths are locals, prelude items or types and are ignored.
    fn classify(segments: &[String]) -> Option<Self> {
        let (first, rest) = segments.split_first()?;
        match first.as_str() {
            "crate" | "self" | "super" => rest
                .iter()
                .find(|segment| !matches!(segment.as_str(), "self" | "super"))
                .map(|name| Self::Module(name.clone())),
            SELF_CRATE => rest.first().map(|name| Self::Module(name.clone())),
            name if CRATE_MODULES.contains(&name) => Some(Self::Module(name.to_owned())),
            _ if rest.is_empty() => None,
            name => Some(Self::Crate(name.to_owned())),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(name) => write!(f, "crate::{name}"),
            Self::Crate(name) => write!(f, "external crate `{name}`"),
        }
    }
}

/// A denied dependency found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File path relative to `core/src`.
    pub file: PathBuf,
    /// Layer the file belongs to.
    pub layer: Layer,
    /// The dependency the layer denies.
    pub dependency: Dependency,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} module must not depend on {}",
            self.file.display(),
            self.layer,
            self.dependency
        )
    }
}

/// Why a lint run did not pass.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    /// Reading the source tree failed.
    #[error("failed to read sources: {0}")]
    Io(#[from] io::Error),
    /// A file lies outside every linted layer.
    #[error("{} is not under domain/ or outbound/", .file.display())]
    Unlayered {
        /// File path relative to `core/src`.
        file: PathBuf,
    },
    /// A file is not valid Rust.
    #[error("failed to parse {}: {message}", .file.display())]
    Syntax {
        /// File path relative to `core/src`.
        file: PathBuf,
        /// Parser message.
        message: String,
    },
    /// One or more files depend on something their layer denies.
    #[error("{}", render_violations(.0))]
    Violations(Vec<Violation>),
}

fn render_violations(violations: &[Violation]) -> String {
    violations.iter().fold(
        String::from("architecture boundary violations:"),
        |mut out, violation| {
            out.push_str("\n- ");
            out.push_str(&violation.to_string());
            out
        },
    )
}

/// A Rust source file to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Path relative to `core/src`.
    pub file: PathBuf,
    /// Rust source text.
    pub text: String,
}

impl Source {
    /// Pair a relative path with its source text.
    pub fn new(file: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            text: text.into(),
        }
    }
}

/// Check the layered sources of the crate rooted at `crate_dir`.
pub fn lint_crate(crate_dir: &Path) -> Result<(), LintError> {
    let src = crate_dir.join("src");
    let mut sources = Vec::new();
    for layer in Layer::ALL {
        read_tree(&src, &src.join(layer.dir()), &mut sources)?;
    }
    lint_sources(&sources)
}

/// Check in-memory sources. Every file must belong to a layer.
pub fn lint_sources(sources: &[Source]) -> Result<(), LintError> {
    let mut violations = Vec::new();
    for source in sources {
        let layer = Layer::of(&source.file).ok_or_else(|| LintError::Unlayered {
            file: source.file.clone(),
        })?;
        let parsed = syn::parse_file(&source.text).map_err(|err| LintError::Syntax {
            file: source.file.clone(),
            message: err.to_string(),
        })?;

        let mut names = NamedPaths::default();
        names.visit_file(&parsed);
        let mut denied: Vec<Dependency> = names
            .paths
            .iter()
            .filter_map(|segments| Dependency::classify(segments))
            .filter(|dependency| !layer.permits(dependency))
            .collect();
        denied.sort();
        denied.dedup();

        violations.extend(denied.into_iter().map(|dependency| Violation {
            file: source.file.clone(),
            layer,
            dependency,
        }));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(LintError::Violations(violations))
    }
}

/// Every path a file names, as segment lists. `use` trees are flattened.
#[derive(Default)]
struct NamedPaths {
    paths: Vec<Vec<String>>,
}

impl NamedPaths {
    fn flatten_use(&mut self, tree: &syn::UseTree, prefix: &[String]) {
        let extend = |ident: &syn::Ident| {
            let mut path = prefix.to_vec();
            path.push(ident.to_string());
            path
        };
        match tree {
            syn::UseTree::Path(node) => self.flatten_use(&node.tree, &extend(&node.ident)),
            syn::UseTree::Name(node) => self.paths.push(extend(&node.ident)),
            syn::UseTree::Rename(node) => self.paths.push(extend(&node.ident)),
            syn::UseTree::Glob(_) => self.paths.push(prefix.to_vec()),
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.flatten_use(item, prefix);
                }
            }
        }
    }
}

impl<'ast> Visit<'ast> for NamedPaths {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        self.paths.push(
            node.segments
                .iter()
                .map(|segment| segment.ident.to_string())
                .collect(),
        );
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.flatten_use(&node.tree, &[]);
    }
}

/// Collect `.rs` files below `dir`, keyed relative to `root`.
fn read_tree(root: &Path, dir: &Path, out: &mut Vec<Source>) -> Result<(), LintError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in fs::read_dir(&next)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|err| io::Error::other(err.to_string()))?
                    .to_path_buf();
                let text = fs::read_to_string(&path)?;
                out.push(Source::new(relative, text));
            }
        }
    }
    Ok(())
}
