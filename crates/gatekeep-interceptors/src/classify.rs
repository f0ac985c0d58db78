//! Maps a raw request onto `(category, acl, operations, indices)`.
//!
//! Routes are tried in order and the first match wins. Anything the table does not
//! know lands in `misc` with every operation and no indices, so only cluster-wide
//! grants can reach it.

use gatekeep_auth::prelude::Classification;
use gatekeep_types::prelude::*;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path segment {0:?} does not decode to utf-8")]
    Encoding(String),
    #[error("dot segments are not allowed in request paths")]
    DotSegment,
    #[error("backslashes are not allowed in request paths")]
    Backslash,
}

/// A request path split into percent-decoded segments, the way the cluster reads it.
///
/// Paths that a URL resolver would rewrite (`.`/`..` segments, in any encoding, or
/// backslashes) are refused, so the path that was classified is the path forwarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPath {
    segments: Vec<String>,
}

impl RequestPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.contains('\\') {
            return Err(PathError::Backslash);
        }
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|_| PathError::Encoding(segment.to_string()))?;
            if decoded == "." || decoded == ".." {
                return Err(PathError::DotSegment);
            }
            segments.push(decoded.into_owned());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Seg {
    Lit(&'static str),
    /// Comma separated target indices.
    Index,
    Any,
    /// Zero or more trailing segments.
    Rest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpRule {
    FromMethod,
    /// POST is a query, not a write.
    ReadOnly,
    Fixed(OpSet),
    /// Inspect every NDJSON action line.
    BulkActions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyIndices {
    None,
    Mget,
    Msearch,
}

#[derive(Clone, Debug)]
struct Route {
    methods: Option<Vec<&'static str>>,
    pattern: Vec<Seg>,
    category: Category,
    acl: Acl,
    ops: OpRule,
    body: BodyIndices,
}

impl Route {
    fn new(methods: &'static str, pattern: &'static str, acl: Acl, ops: OpRule) -> Self {
        let methods = (methods != "*").then(|| methods.split('|').collect());
        let pattern = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "{index}" => Seg::Index,
                "{*}" => Seg::Any,
                "**" => Seg::Rest,
                lit => Seg::Lit(lit),
            })
            .collect();
        Self {
            methods,
            pattern,
            category: acl.category(),
            acl,
            ops,
            body: BodyIndices::None,
        }
    }

    fn body(mut self, body: BodyIndices) -> Self {
        self.body = body;
        self
    }

    /// Returns the captured index segment (if any) on a match.
    fn matches<'p>(&self, method: &str, segments: &[&'p str]) -> Option<Option<&'p str>> {
        if let Some(methods) = &self.methods {
            if !methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
                return None;
            }
        }
        let mut captured = None;
        let mut rest = segments;
        for seg in &self.pattern {
            match seg {
                Seg::Rest => return Some(captured),
                _ => {
                    let (head, tail) = rest.split_first()?;
                    match seg {
                        Seg::Lit(lit) if lit == head => {}
                        Seg::Index if is_index_segment(head) => captured = Some(*head),
                        Seg::Any => {}
                        _ => return None,
                    }
                    rest = tail;
                }
            }
        }
        rest.is_empty().then_some(captured)
    }
}

fn is_index_segment(seg: &str) -> bool {
    !seg.starts_with('_') || seg == ALL_ALIAS
}

fn method_ops(method: &str) -> OpSet {
    match method.to_ascii_uppercase().as_str() {
        "GET" | "HEAD" | "OPTIONS" => OpSet::READ,
        "PUT" | "POST" | "PATCH" => OpSet::WRITE,
        "DELETE" => OpSet::DELETE,
        _ => OpSet::ALL,
    }
}

/// Splits a comma separated index segment. `_all` and wildcards stay literal.
fn split_indices(segment: &str) -> impl Iterator<Item = String> + '_ {
    segment
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct Classifier {
    routes: Vec<Route>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        use Acl::*;
        use OpRule::*;
        let r = Route::new;
        let routes = vec![
            // gateway-internal
            r("*", "/_user/**", User, FromMethod),
            r("*", "/_users/**", User, FromMethod),
            r("*", "/_permission/**", Permission, FromMethod),
            r("*", "/_permissions/**", Permission, FromMethod),
            r("*", "/_logs/**", Logs, FromMethod),
            r("*", "/{index}/_logs/**", Logs, FromMethod),
            r("*", "/_analytics/**", Analytics, FromMethod),
            r("*", "/{index}/_analytics/**", Analytics, FromMethod),
            r("*", "/_streams/**", Streams, FromMethod),
            r("*", "/{index}/_streams/**", Streams, FromMethod),
            r("*", "/_reactivesearch/**", ReactiveSearch, ReadOnly),
            r("*", "/{index}/_reactivesearch/**", ReactiveSearch, ReadOnly),
            // misc
            r("GET|HEAD", "/", Root, FromMethod),
            // cat
            r("*", "/_cat/{*}/{index}", Cat, FromMethod),
            r("*", "/_cat/**", Cat, FromMethod),
            // clusters
            r("*", "/_cluster/**", Cluster, FromMethod),
            r("*", "/_nodes/**", Nodes, FromMethod),
            r("*", "/_tasks/**", Tasks, FromMethod),
            r("*", "/_snapshot/**", Snapshot, FromMethod),
            r("*", "/_ingest/**", Ingest, FromMethod),
            r("*", "/_scripts/**", Scripts, FromMethod),
            // search
            r("*", "/_search/scroll/**", Search, ReadOnly),
            r("*", "/_search/**", Search, ReadOnly),
            r("*", "/{index}/_search/**", Search, ReadOnly),
            r("*", "/_msearch/**", Msearch, ReadOnly).body(BodyIndices::Msearch),
            r("*", "/{index}/_msearch/**", Msearch, ReadOnly).body(BodyIndices::Msearch),
            r("*", "/_count", Count, ReadOnly),
            r("*", "/{index}/_count", Count, ReadOnly),
            r("*", "/{index}/_explain/{*}", Explain, ReadOnly),
            r("*", "/_validate/query", Acl::Validate, ReadOnly),
            r("*", "/{index}/_validate/query", Acl::Validate, ReadOnly),
            r("*", "/_field_caps", FieldCaps, ReadOnly),
            r("*", "/{index}/_field_caps", FieldCaps, ReadOnly),
            // docs
            r("*", "/_bulk", Bulk, BulkActions),
            r("*", "/{index}/_bulk", Bulk, BulkActions),
            r("*", "/_mget", Mget, ReadOnly).body(BodyIndices::Mget),
            r("*", "/{index}/_mget", Mget, ReadOnly).body(BodyIndices::Mget),
            r("*", "/{index}/_update_by_query", UpdateByQuery, FromMethod),
            r("*", "/{index}/_delete_by_query", DeleteByQuery, Fixed(OpSet::DELETE)),
            r("*", "/_reindex", Reindex, FromMethod),
            r("*", "/_mtermvectors", Termvectors, FromMethod),
            r("*", "/{index}/_mtermvectors", Termvectors, FromMethod),
            r("*", "/{index}/_termvectors/**", Termvectors, FromMethod),
            r("*", "/{index}/_doc/**", Doc, FromMethod),
            r("*", "/{index}/_create/{*}", Doc, FromMethod),
            r("*", "/{index}/_update/{*}", Doc, FromMethod),
            r("*", "/{index}/_source/{*}", Source, FromMethod),
            // indices
            r("*", "/_mapping/**", Mapping, FromMethod),
            r("*", "/{index}/_mapping/**", Mapping, FromMethod),
            r("*", "/_settings/**", Settings, FromMethod),
            r("*", "/{index}/_settings/**", Settings, FromMethod),
            r("*", "/_alias/**", Alias, FromMethod),
            r("*", "/_aliases", Alias, FromMethod),
            r("*", "/{index}/_alias/**", Alias, FromMethod),
            r("*", "/{index}/_aliases/**", Alias, FromMethod),
            r("*", "/_refresh", Refresh, FromMethod),
            r("*", "/{index}/_refresh", Refresh, FromMethod),
            r("*", "/_flush/**", Flush, FromMethod),
            r("*", "/{index}/_flush/**", Flush, FromMethod),
            r("*", "/_forcemerge", Forcemerge, FromMethod),
            r("*", "/{index}/_forcemerge", Forcemerge, FromMethod),
            r("*", "/_analyze", Analyze, ReadOnly),
            r("*", "/{index}/_analyze", Analyze, ReadOnly),
            r("*", "/_stats/**", Stats, FromMethod),
            r("*", "/{index}/_stats/**", Stats, FromMethod),
            r("*", "/{index}/_open", OpenClose, FromMethod),
            r("*", "/{index}/_close", OpenClose, FromMethod),
            r("*", "/_template/**", Template, FromMethod),
            r("*", "/_index_template/**", Template, FromMethod),
            r("*", "/_component_template/**", Template, FromMethod),
            r("*", "/{index}/_rollover/**", Rollover, FromMethod),
            r("*", "/_cache/clear", Cache, FromMethod),
            r("*", "/{index}/_cache/clear", Cache, FromMethod),
            r("*", "/{index}", Index, FromMethod),
        ];
        Self { routes }
    }

    fn route<'p>(&self, method: &str, path: &'p RequestPath) -> Option<(&Route, Option<&'p str>)> {
        let segments: Vec<&str> = path.segments().collect();
        self.routes
            .iter()
            .find_map(|route| route.matches(method, &segments).map(|index| (route, index)))
    }

    /// Whether [`Classifier::classify`] looks at the body for this request.
    pub fn needs_body(&self, method: &str, path: &RequestPath) -> bool {
        self.route(method, path)
            .is_some_and(|(route, _)| {
                route.ops == OpRule::BulkActions || route.body != BodyIndices::None
            })
    }

    pub fn classify(&self, method: &str, path: &RequestPath, body: &[u8]) -> Classification {
        let Some((route, index)) = self.route(method, path) else {
            return Classification::new(Category::Misc, Acl::Misc, OpSet::ALL);
        };

        // path and body targets together; a body `_index` can point past the path one
        let mut indices: BTreeSet<String> =
            index.map(split_indices).into_iter().flatten().collect();
        let ops = match route.ops {
            OpRule::FromMethod => method_ops(method),
            OpRule::ReadOnly if method.eq_ignore_ascii_case("POST") => OpSet::READ,
            OpRule::ReadOnly => method_ops(method),
            OpRule::Fixed(ops) => ops,
            OpRule::BulkActions => {
                let ops = scan_bulk(body, &mut indices);
                if ops.is_empty() {
                    method_ops(method)
                } else {
                    ops
                }
            }
        };
        match route.body {
            BodyIndices::None => {}
            BodyIndices::Msearch => scan_msearch(body, index.is_some(), &mut indices),
            BodyIndices::Mget => scan_mget(body, &mut indices),
        }

        Classification::new(route.category, route.acl, ops).with_indices(indices)
    }
}

fn trim_ascii(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if !first.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    while let [rest @ .., last] = line {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}

/// Every line of an NDJSON body, blank ones included, minus the trailing newline(s).
fn ndjson_lines(body: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = body.split(|b| *b == b'\n').map(trim_ascii).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Operations named by the action lines of a bulk body, collecting their `_index`.
fn scan_bulk(body: &[u8], indices: &mut BTreeSet<String>) -> OpSet {
    let mut ops = OpSet::EMPTY;
    let mut lines = ndjson_lines(body).into_iter();
    while let Some(line) = lines.next() {
        // blank action lines are skipped by the cluster; source lines are positional
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_slice::<Value>(line).ok();
        let action = parsed
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|o| o.iter().next());
        match action {
            Some((name, meta)) if matches!(name.as_str(), "index" | "create" | "update") => {
                ops = ops.with(Operation::Write);
                collect_index_value(meta.get("_index"), indices);
                // the document source follows
                lines.next();
            }
            Some((name, meta)) if name == "delete" => {
                ops = ops.with(Operation::Delete);
                collect_index_value(meta.get("_index"), indices);
            }
            // unreadable action, assume the worst
            _ => ops = ops.with(Operation::Delete),
        }
    }
    ops
}

/// Header lines alternate with query lines. A header without targets searches the
/// path indices, or every index when the path names none.
fn scan_msearch(body: &[u8], path_has_index: bool, indices: &mut BTreeSet<String>) {
    for header in ndjson_lines(body).into_iter().step_by(2) {
        let value = serde_json::from_slice::<Value>(header).unwrap_or(Value::Null);
        let mut named = BTreeSet::new();
        collect_index_value(value.get("index"), &mut named);
        collect_index_value(value.get("indices"), &mut named);
        if named.is_empty() && !path_has_index {
            indices.insert(ALL_ALIAS.to_string());
        }
        indices.extend(named);
    }
}

fn scan_mget(body: &[u8], indices: &mut BTreeSet<String>) {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return;
    };
    if let Some(docs) = value.get("docs").and_then(Value::as_array) {
        for doc in docs {
            collect_index_value(doc.get("_index"), indices);
        }
    }
}

fn collect_index_value(value: Option<&Value>, out: &mut BTreeSet<String>) {
    match value {
        Some(Value::String(s)) => out.extend(split_indices(s)),
        Some(Value::Array(items)) => {
            for item in items.iter().filter_map(Value::as_str) {
                out.extend(split_indices(item));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> RequestPath {
        RequestPath::parse(raw).unwrap()
    }

    fn classify(method: &str, raw: &str) -> Classification {
        Classifier::new().classify(method, &path(raw), b"")
    }

    #[test]
    fn gateway_prefixes_map_to_reserved_categories() {
        assert_eq!(classify("GET", "/_user").category, Category::Users);
        assert_eq!(classify("POST", "/_users").category, Category::Users);
        assert_eq!(classify("PATCH", "/_permission/abc").category, Category::Permissions);
        assert_eq!(classify("GET", "/_permissions").category, Category::Permissions);
        assert_eq!(classify("GET", "/_logs").category, Category::Logs);
        assert_eq!(classify("GET", "/_analytics/popular").category, Category::Analytics);
        assert_eq!(classify("GET", "/_streams/movies").category, Category::Streams);
        assert_eq!(
            classify("POST", "/movies/_reactivesearch").category,
            Category::ReactiveSearch
        );
    }

    #[test]
    fn read_only_posts_are_reads() {
        let search = classify("POST", "/movies/_search");
        assert_eq!(search.category, Category::Search);
        assert_eq!(search.acl, Acl::Search);
        assert_eq!(search.ops, OpSet::READ);
        assert_eq!(search.indices, vec!["movies"]);

        for path in ["/_msearch", "/movies/_count", "/_search/scroll", "/_analyze", "/movies/_mget"] {
            assert_eq!(classify("POST", path).ops, OpSet::READ, "{path}");
        }
        assert_eq!(classify("PUT", "/movies/_doc/1").ops, OpSet::WRITE);
        assert_eq!(classify("DELETE", "/movies/_doc/1").ops, OpSet::DELETE);
    }

    #[test]
    fn delete_by_query_is_a_delete_whatever_the_method() {
        let c = classify("POST", "/movies/_delete_by_query");
        assert_eq!(c.acl, Acl::DeleteByQuery);
        assert_eq!(c.ops, OpSet::DELETE);
    }

    #[test]
    fn indices_are_split_and_kept_literal() {
        let c = classify("GET", "/movies,logs-*/_search");
        assert_eq!(c.indices, vec!["logs-*", "movies"]);
        assert_eq!(classify("GET", "/_all/_search").indices, vec!["_all"]);
        assert!(classify("GET", "/_search").indices.is_empty());
    }

    #[test]
    fn index_admin_routes() {
        let c = classify("PUT", "/movies");
        assert_eq!((c.category, c.acl, c.ops), (Category::Indices, Acl::Index, OpSet::WRITE));
        assert_eq!(classify("GET", "/movies/_mapping").acl, Acl::Mapping);
        assert_eq!(classify("GET", "/_cat/indices").category, Category::Cat);
        assert_eq!(classify("GET", "/_cat/indices/movies").indices, vec!["movies"]);
        assert_eq!(classify("GET", "/_cluster/health").acl, Acl::Cluster);
        assert_eq!(classify("GET", "/").acl, Acl::Root);
    }

    #[test]
    fn unknown_routes_fail_closed() {
        let c = classify("GET", "/_xpack/usage");
        assert_eq!(c.category, Category::Misc);
        assert_eq!(c.acl, Acl::Misc);
        assert_eq!(c.ops, OpSet::ALL);
        assert!(c.indices.is_empty());
    }

    #[test]
    fn bulk_actions_accumulate() {
        let body = br#"{"index":{"_index":"movies","_id":"1"}}
{"title":"Up"}
{"delete":{"_index":"books","_id":"2"}}
"#;
        let c = Classifier::new().classify("POST", &path("/_bulk"), body);
        assert_eq!(c.acl, Acl::Bulk);
        assert_eq!(c.ops, OpSet::WRITE.union(OpSet::DELETE));
        assert_eq!(c.indices, vec!["books", "movies"]);

        let writes_only = br#"{"create":{"_id":"1"}}
{"title":"Up"}
"#;
        let c = Classifier::new().classify("POST", &path("/movies/_bulk"), writes_only);
        assert_eq!(c.ops, OpSet::WRITE);
        assert_eq!(c.indices, vec!["movies"]);
    }

    #[test]
    fn unparseable_bulk_line_adds_delete() {
        let body = b"{\"index\":{}}\n{\"a\":1}\nnot json\n";
        let c = Classifier::new().classify("POST", &path("/movies/_bulk"), body);
        assert!(c.ops.contains(Operation::Delete));
        assert!(c.ops.contains(Operation::Write));
    }

    #[test]
    fn body_targets_are_collected() {
        let classifier = Classifier::new();
        let mget = br#"{"docs":[{"_index":"movies","_id":"1"},{"_index":"books","_id":"2"}]}"#;
        assert_eq!(classifier.classify("POST", &path("/_mget"), mget).indices, vec!["books", "movies"]);

        let msearch = b"{\"index\":\"movies\"}\n{\"query\":{}}\n{\"index\":[\"a\",\"b\"]}\n{}\n";
        assert_eq!(
            classifier.classify("POST", &path("/_msearch"), msearch).indices,
            vec!["a", "b", "movies"]
        );
        assert!(classifier.needs_body("POST", &path("/_bulk")));
        assert!(!classifier.needs_body("POST", &path("/movies/_search")));
    }

    #[test]
    fn percent_encoded_commas_name_every_target() {
        let c = classify("GET", "/prod-logs%2Csecret/_search");
        assert_eq!(c.indices, vec!["prod-logs", "secret"]);
        assert_eq!(classify("GET", "/%5Fall/_search").indices, vec!["_all"]);
        assert_eq!(classify("GET", "/movies/_doc/a%2Fb").acl, Acl::Doc);
    }

    #[test]
    fn dot_segments_and_bad_encodings_are_refused() {
        for raw in [
            "/prod-x/_search/../../secret/_doc/1",
            "/prod-x/./_search",
            "/prod-x/_search/%2e%2e/%2E%2E/secret",
            "/prod-x/_search/.%2e/secret",
        ] {
            assert_eq!(RequestPath::parse(raw), Err(PathError::DotSegment), "{raw}");
        }
        assert_eq!(RequestPath::parse("/prod-x\\..\\secret"), Err(PathError::Backslash));
        assert!(matches!(RequestPath::parse("/prod-%ff/_search"), Err(PathError::Encoding(_))));
        assert_eq!(path("/..movies/_search").segments().next(), Some("..movies"));
    }

    #[test]
    fn msearch_header_without_index_searches_everything() {
        let classifier = Classifier::new();
        let body = b"{\"index\":\"prod-logs\"}\n{\"query\":{}}\n{}\n{\"query\":{}}\n";
        assert_eq!(
            classifier.classify("POST", &path("/_msearch"), body).indices,
            vec!["_all", "prod-logs"]
        );
        // the path index stands in for a header that names none
        assert_eq!(
            classifier.classify("POST", &path("/prod-logs/_msearch"), body).indices,
            vec!["prod-logs"]
        );
    }

    #[test]
    fn blank_msearch_headers_keep_their_place() {
        let classifier = Classifier::new();
        let body = b"\n{\"query\":{}}\n{\"index\":\"secret\"}\n{\"query\":{}}\n";
        assert_eq!(
            classifier.classify("POST", &path("/prod-logs/_msearch"), body).indices,
            vec!["prod-logs", "secret"]
        );
        assert_eq!(
            classifier.classify("POST", &path("/_msearch"), body).indices,
            vec!["_all", "secret"]
        );
    }

    #[test]
    fn blank_bulk_source_does_not_hide_the_next_action() {
        let body = b"{\"index\":{\"_index\":\"prod-logs\"}}\n\n{\"delete\":{\"_index\":\"secret\",\"_id\":\"1\"}}\n";
        let c = Classifier::new().classify("POST", &path("/_bulk"), body);
        assert_eq!(c.indices, vec!["prod-logs", "secret"]);
        assert!(c.ops.contains(Operation::Delete));
    }
}
