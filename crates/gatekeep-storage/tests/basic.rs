use gatekeep_storage::mock::{InMemoryRepository, MockDatastore};
use gatekeep_storage::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Doc {
    username: String,
    role: Option<String>,
    ver: u32,
}

impl Entity for Doc {
    const TABLE: &'static str = ".docs";

    fn id(&self) -> &str {
        &self.username
    }
}

fn doc(name: &str, role: Option<&str>) -> Doc {
    Doc {
        username: name.into(),
        role: role.map(str::to_string),
        ver: 1,
    }
}

#[tokio::test]
async fn crud_and_select() {
    let datastore = MockDatastore::new();
    let repo: InMemoryRepository<Doc> = InMemoryRepository::new(&datastore);

    repo.create(&doc("alice", Some("admin"))).await.unwrap();
    repo.create(&doc("bob", None)).await.unwrap();

    let fetched = repo.get("alice").await.unwrap().unwrap();
    assert_eq!(fetched.role.as_deref(), Some("admin"));

    let page = repo.select(QueryParams::term("role", "admin")).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].username, "alice");

    let all = repo.select(QueryParams::all()).await.unwrap();
    assert_eq!(all.items.len(), 2);

    let updated = repo.patch("bob", json!({ "ver": 2 })).await.unwrap();
    assert_eq!(updated.ver, 2);
    assert_eq!(repo.get("bob").await.unwrap().unwrap().ver, 2);

    repo.delete("bob").await.unwrap();
    assert!(repo.get("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn create_conflicts_and_missing_patch() {
    let datastore = MockDatastore::new();
    let repo: InMemoryRepository<Doc> = InMemoryRepository::new(&datastore);

    repo.create(&doc("alice", None)).await.unwrap();
    let err = repo.create(&doc("alice", None)).await.unwrap_err();
    assert!(err.is_conflict());

    let err = repo.patch("ghost", json!({ "ver": 3 })).await.unwrap_err();
    assert!(err.is_not_found());
    let err = repo.delete("ghost").await.unwrap_err();
    assert!(err.is_not_found());

    repo.put(&doc("alice", Some("ops"))).await.unwrap();
    assert_eq!(
        repo.get("alice").await.unwrap().unwrap().role.as_deref(),
        Some("ops")
    );
}

#[tokio::test]
async fn tables_are_isolated_and_limit_applies() {
    let datastore = MockDatastore::new();
    let a: InMemoryRepository<Doc> = InMemoryRepository::with_table(&datastore, ".a");
    let b: InMemoryRepository<Doc> = InMemoryRepository::with_table(&datastore, ".b");

    for name in ["x", "y", "z"] {
        a.create(&doc(name, None)).await.unwrap();
    }
    assert!(b.get("x").await.unwrap().is_none());
    let page = a.select(QueryParams::all().limit(2)).await.unwrap();
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn offline_store_reports_unavailable() {
    let datastore = MockDatastore::new();
    let repo: InMemoryRepository<Doc> = InMemoryRepository::new(&datastore);
    datastore.set_offline(true);

    let err = repo.get("alice").await.unwrap_err();
    assert_eq!(err.code().0, "STORAGE.UNAVAILABLE");
}

#[tokio::test]
async fn uncapped_selects_page_until_exhausted() {
    let datastore = MockDatastore::new();
    datastore.set_page_size(2);
    let repo: InMemoryRepository<Doc> = InMemoryRepository::new(&datastore);
    for (name, role) in [("a", None), ("b", Some("ops")), ("c", None), ("d", Some("ops")), ("e", None)] {
        repo.create(&doc(name, role)).await.unwrap();
    }

    let first = repo.select(QueryParams::all()).await.unwrap();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next.clone().unwrap();
    let second = repo.select(QueryParams::all().after(cursor)).await.unwrap();
    assert_eq!(
        second.items.iter().map(|d| d.username.as_str()).collect::<Vec<_>>(),
        vec!["c", "d"]
    );

    let all = repo.select_all(QueryParams::all()).await.unwrap();
    assert_eq!(all.len(), 5);
    let ops = repo.select_all(QueryParams::term("role", "ops")).await.unwrap();
    assert_eq!(ops.len(), 2);

    // a cap is a single page
    let capped = repo.select(QueryParams::all().limit(3)).await.unwrap();
    assert_eq!(capped.items.len(), 3);
    assert!(capped.next.is_none());
}
