#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Semantic effect of a request. Unknown tokens never fall back to `Noop`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Noop,
    Read,
    Write,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Noop => "noop",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Delete => "delete",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Operation::Noop => 0,
            Operation::Read => 0b001,
            Operation::Write => 0b010,
            Operation::Delete => 0b100,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noop" => Ok(Operation::Noop),
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            "delete" => Ok(Operation::Delete),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

/// Set of operations, stored as a bitmask.
///
/// `Noop` carries no effect: it occupies no bit, so a request classified as
/// `noop` is a subset of every grant.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OpSet(u8);

impl OpSet {
    pub const EMPTY: OpSet = OpSet(0);
    pub const READ: OpSet = OpSet(Operation::Read.bit());
    pub const WRITE: OpSet = OpSet(Operation::Write.bit());
    pub const DELETE: OpSet = OpSet(Operation::Delete.bit());
    pub const ALL: OpSet = OpSet(0b111);

    pub fn of(ops: &[Operation]) -> Self {
        ops.iter().fold(OpSet::EMPTY, |acc, op| acc.with(*op))
    }

    pub const fn with(self, op: Operation) -> Self {
        OpSet(self.0 | op.bit())
    }

    pub const fn union(self, other: OpSet) -> Self {
        OpSet(self.0 | other.0)
    }

    pub const fn contains(self, op: Operation) -> bool {
        self.0 & op.bit() == op.bit()
    }

    pub const fn is_subset(self, of: OpSet) -> bool {
        self.0 & !of.0 == 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Operations present in `self` but missing from `other`.
    pub const fn difference(self, other: OpSet) -> OpSet {
        OpSet(self.0 & !other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Operation> {
        [Operation::Read, Operation::Write, Operation::Delete]
            .into_iter()
            .filter(move |op| self.contains(*op))
    }
}

impl From<Operation> for OpSet {
    fn from(op: Operation) -> Self {
        OpSet::EMPTY.with(op)
    }
}

impl FromIterator<Operation> for OpSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter().fold(OpSet::EMPTY, |acc, op| acc.with(op))
    }
}

impl fmt::Debug for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Operation::as_str).collect();
        write!(f, "{{{}}}", names.join(","))
    }
}

impl Serialize for OpSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for op in self.iter() {
            seq.serialize_element(&op)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for OpSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OpSetVisitor;

        impl<'de> Visitor<'de> for OpSetVisitor {
            type Value = OpSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of operation tokens")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OpSet, A::Error> {
                let mut set = OpSet::EMPTY;
                while let Some(op) = seq.next_element::<Operation>()? {
                    set = set.with(op);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(OpSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_round_trips_and_rejects_unknown() {
        for op in [
            Operation::Noop,
            Operation::Read,
            Operation::Write,
            Operation::Delete,
        ] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
            let back: Operation = serde_json::from_str(&json).unwrap();
            assert_eq!(back, op);
        }
        assert!(serde_json::from_str::<Operation>("\"purge\"").is_err());
        assert!(serde_json::from_str::<Operation>("\"READ\"").is_err());
        assert!("".parse::<Operation>().is_err());
    }

    #[test]
    fn subset_is_a_bitmask_join() {
        let granted = OpSet::of(&[Operation::Read, Operation::Write]);
        assert!(OpSet::READ.is_subset(granted));
        assert!(OpSet::READ.union(OpSet::WRITE).is_subset(granted));
        assert!(!OpSet::DELETE.is_subset(granted));
        assert!(OpSet::from(Operation::Noop).is_subset(OpSet::EMPTY));
        assert_eq!(OpSet::ALL.difference(granted), OpSet::DELETE);
    }

    #[test]
    fn opset_serializes_as_token_list() {
        let set: OpSet = serde_json::from_str(r#"["delete","read","noop"]"#).unwrap();
        assert_eq!(set, OpSet::READ.union(OpSet::DELETE));
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["read","delete"]"#);
        assert!(serde_json::from_str::<OpSet>(r#"["read","sudo"]"#).is_err());
    }
}
