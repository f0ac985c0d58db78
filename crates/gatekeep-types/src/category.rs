#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::acl::Acl;

/// Coarse API-surface tag used for authorization scoping and rate-limit bucketing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Docs,
    Search,
    Indices,
    Cat,
    Clusters,
    Misc,
    Users,
    Permissions,
    Analytics,
    Logs,
    Streams,
    ReactiveSearch,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Docs,
        Category::Search,
        Category::Indices,
        Category::Cat,
        Category::Clusters,
        Category::Misc,
        Category::Users,
        Category::Permissions,
        Category::Analytics,
        Category::Logs,
        Category::Streams,
        Category::ReactiveSearch,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Docs => "docs",
            Category::Search => "search",
            Category::Indices => "indices",
            Category::Cat => "cat",
            Category::Clusters => "clusters",
            Category::Misc => "misc",
            Category::Users => "users",
            Category::Permissions => "permissions",
            Category::Analytics => "analytics",
            Category::Logs => "logs",
            Category::Streams => "streams",
            Category::ReactiveSearch => "reactivesearch",
        }
    }

    /// Categories served by the gateway itself rather than the upstream cluster.
    pub const fn is_internal(self) -> bool {
        matches!(
            self,
            Category::Users
                | Category::Permissions
                | Category::Analytics
                | Category::Logs
                | Category::Streams
        )
    }

    /// ACLs implicitly granted with the category.
    pub fn default_acls(self) -> &'static [Acl] {
        use Acl::*;
        match self {
            Category::Docs => &[
                Doc,
                Source,
                Bulk,
                Mget,
                UpdateByQuery,
                DeleteByQuery,
                Reindex,
                Termvectors,
            ],
            Category::Search => &[Search, Msearch, Count, Explain, Validate, FieldCaps],
            Category::Indices => &[
                Index, Mapping, Settings, Alias, Refresh, Flush, Forcemerge, Analyze, Stats,
                OpenClose, Template, Rollover, Cache,
            ],
            Category::Cat => &[Cat],
            Category::Clusters => &[Cluster, Nodes, Tasks, Snapshot, Ingest, Scripts],
            Category::Misc => &[Root, Misc],
            Category::Users => &[User],
            Category::Permissions => &[Permission],
            Category::Analytics => &[Analytics],
            Category::Logs => &[Logs],
            Category::Streams => &[Streams],
            Category::ReactiveSearch => &[ReactiveSearch],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
