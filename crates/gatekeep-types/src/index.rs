use globset::{Glob, GlobSet, GlobSetBuilder};

/// Cluster-wide grant token.
pub const ALL_INDICES: &str = "*";
/// Upstream alias for every index.
pub const ALL_ALIAS: &str = "_all";

#[derive(Debug, thiserror::Error)]
#[error("invalid index pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Compiled index allowlist. Entries are exact names or glob patterns.
#[derive(Clone, Debug)]
pub struct IndexAllowlist {
    entries: Vec<String>,
    globs: GlobSet,
    cluster_wide: bool,
}

impl IndexAllowlist {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self, PatternError> {
        let mut builder = GlobSetBuilder::new();
        let mut cluster_wide = false;
        for entry in entries {
            let entry = entry.as_ref();
            if entry == ALL_INDICES {
                cluster_wide = true;
            }
            let glob = Glob::new(entry).map_err(|e| PatternError {
                pattern: entry.to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|e| PatternError {
            pattern: entries
                .iter()
                .map(|e| e.as_ref())
                .collect::<Vec<_>>()
                .join(","),
            reason: e.to_string(),
        })?;
        Ok(Self {
            entries: entries.iter().map(|e| e.as_ref().to_string()).collect(),
            globs,
            cluster_wide,
        })
    }

    /// Whether the allowlist carries the explicit cluster-wide grant.
    pub fn is_cluster_wide(&self) -> bool {
        self.cluster_wide
    }

    /// Checks one target index token as it appeared in the request.
    ///
    /// Wildcard targets are never expanded here, so they only pass when an
    /// allowlist prefix pattern already covers every name they could expand to.
    pub fn allows(&self, target: &str) -> bool {
        if self.cluster_wide {
            return true;
        }
        if target == ALL_ALIAS || target.is_empty() {
            return false;
        }
        if has_wildcard(target) {
            return self.entries.iter().any(|entry| covers_wildcard(entry, target));
        }
        self.globs.is_match(target)
    }

    /// Checks a whole target list. An empty list is a cluster-wide request.
    pub fn allows_all<S: AsRef<str>>(&self, targets: &[S]) -> bool {
        if targets.is_empty() {
            return self.cluster_wide;
        }
        targets.iter().all(|t| self.allows(t.as_ref()))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

fn covers_wildcard(entry: &str, target: &str) -> bool {
    if entry == target {
        return true;
    }
    let Some(stem) = entry.strip_suffix('*') else {
        return false;
    };
    !has_wildcard(stem) && target.starts_with(stem)
}

/// True when every token of `narrow` is covered by `wide`.
///
/// Used when a delegated credential is checked against its owner's allowlist.
pub fn is_narrowing<S: AsRef<str>>(wide: &IndexAllowlist, narrow: &[S]) -> bool {
    narrow.iter().all(|entry| {
        let entry = entry.as_ref();
        if entry == ALL_INDICES {
            return wide.is_cluster_wide();
        }
        wide.allows(entry)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_glob_entries() {
        let list = IndexAllowlist::new(&["prod-*", "audit"]).unwrap();
        assert!(list.allows("prod-logs"));
        assert!(list.allows("audit"));
        assert!(!list.allows("staging-1"));
        assert!(!list.allows("audit-2"));
    }

    #[test]
    fn cluster_wide_requests_need_explicit_star() {
        let list = IndexAllowlist::new(&["prod-*"]).unwrap();
        assert!(!list.allows_all::<&str>(&[]));
        assert!(!list.allows(ALL_ALIAS));

        let star = IndexAllowlist::new(&["*"]).unwrap();
        assert!(star.allows_all::<&str>(&[]));
        assert!(star.allows(ALL_ALIAS));
    }

    #[test]
    fn wildcard_targets_stay_inside_prefix() {
        let list = IndexAllowlist::new(&["prod-*", "logs-?"]).unwrap();
        assert!(list.allows("prod-*"));
        assert!(list.allows("prod-eu-*"));
        assert!(!list.allows("p*"));
        assert!(!list.allows("logs-*"));
    }

    #[test]
    fn narrowing_against_owner() {
        let owner = IndexAllowlist::new(&["prod-*"]).unwrap();
        assert!(is_narrowing(&owner, &["prod-logs", "prod-eu-*"]));
        assert!(!is_narrowing(&owner, &["*"]));
        assert!(!is_narrowing(&owner, &["staging"]));
    }
}
