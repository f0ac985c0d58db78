pub use crate::{
    acl::Acl,
    category::{Category, UnknownCategory},
    index::{is_narrowing, IndexAllowlist, PatternError, ALL_ALIAS, ALL_INDICES},
    op::{OpSet, Operation, UnknownOperation},
    time::{Clock, ManualClock, SystemClock},
    trace::TraceContext,
};
