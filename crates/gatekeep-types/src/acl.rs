#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::Category;

/// Fine-grained action tag. Every ACL belongs to exactly one [`Category`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Acl {
    // docs
    Doc,
    Source,
    Bulk,
    Mget,
    UpdateByQuery,
    DeleteByQuery,
    Reindex,
    Termvectors,
    // search
    Search,
    Msearch,
    Count,
    Explain,
    Validate,
    FieldCaps,
    // indices
    Index,
    Mapping,
    Settings,
    Alias,
    Refresh,
    Flush,
    Forcemerge,
    Analyze,
    Stats,
    OpenClose,
    Template,
    Rollover,
    Cache,
    // cat
    Cat,
    // clusters
    Cluster,
    Nodes,
    Tasks,
    Snapshot,
    Ingest,
    Scripts,
    // misc
    Root,
    Misc,
    // gateway-internal
    User,
    Permission,
    Analytics,
    Logs,
    Streams,
    #[serde(rename = "reactivesearch")]
    ReactiveSearch,
}

impl Acl {
    pub const fn category(self) -> Category {
        use Acl::*;
        match self {
            Doc | Source | Bulk | Mget | UpdateByQuery | DeleteByQuery | Reindex | Termvectors => {
                Category::Docs
            }
            Search | Msearch | Count | Explain | Validate | FieldCaps => Category::Search,
            Index | Mapping | Settings | Alias | Refresh | Flush | Forcemerge | Analyze | Stats
            | OpenClose | Template | Rollover | Cache => Category::Indices,
            Cat => Category::Cat,
            Cluster | Nodes | Tasks | Snapshot | Ingest | Scripts => Category::Clusters,
            Root | Misc => Category::Misc,
            User => Category::Users,
            Permission => Category::Permissions,
            Analytics => Category::Analytics,
            Logs => Category::Logs,
            Streams => Category::Streams,
            ReactiveSearch => Category::ReactiveSearch,
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde owns the wire names; reuse them for logs
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => f.write_str(&s),
            _ => write!(f, "{self:?}"),
        }
    }
}
