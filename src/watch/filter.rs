// src/watch/filter.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Exclusion filter compiled from the project's ignore patterns.
///
/// Two kinds of pattern are supported, and both are needed in practice:
///
/// - A pattern containing `*` matches by file name at any depth, e.g.
///   `*.tmp` or `.#*` for editor temp files. A pattern that already starts
///   with `**` is used as written.
/// - A pattern without `*` names a subtree: `result` excludes `result/...`
///   and `any/depth/result/...`, plus a file called `result` anywhere.
///
/// Braces are literal characters, not `{a,b}` alternation.
///
/// Paths passed to [`WatchFilter::allows`] are relative to the watched root
/// and use `/` separators.
#[derive(Clone)]
pub struct WatchFilter {
    patterns: Vec<String>,
    excluded: GlobSet,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchFilter {
    /// Filter that lets every regular file through.
    pub fn allow_all() -> Self {
        Self {
            patterns: Vec::new(),
            excluded: GlobSet::empty(),
        }
    }

    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            for expanded in expand_pattern(pattern) {
                let glob = GlobBuilder::new(&expanded)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("invalid ignore pattern: {pattern}"))?;
                builder.add(glob);
            }
        }

        let excluded = builder
            .build()
            .context("building ignore pattern set")?;

        Ok(Self {
            patterns: patterns.to_vec(),
            excluded,
        })
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.excluded.is_match(rel_path)
    }

    pub fn allows(&self, rel_path: &str) -> bool {
        !rel_path.is_empty() && !self.is_excluded(rel_path)
    }
}

/// Turn one ignore pattern into the globs that implement it.
fn expand_pattern(pattern: &str) -> Vec<String> {
    let pattern = escape_braces(pattern);
    let pattern = pattern.as_str();
    if pattern.contains('*') {
        let mut globs = vec![pattern.to_string()];
        if !pattern.starts_with("**") {
            globs.push(format!("**/{pattern}"));
        }
        globs
    } else {
        vec![
            pattern.to_string(),
            format!("{pattern}/**"),
            format!("**/{pattern}"),
            format!("**/{pattern}/**"),
        ]
    }
}

fn escape_braces(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '{' => escaped.push_str("[{]"),
            '}' => escaped.push_str("[}]"),
            _ => escaped.push(c),
        }
    }
    escaped
}
