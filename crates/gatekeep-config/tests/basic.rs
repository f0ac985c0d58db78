use gatekeep_config::errors::invalid;
use gatekeep_config::prelude::*;
use serde::Deserialize;
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;

fn defaults() -> serde_json::Value {
    serde_json::json!({
        "store": { "users_index": ".users" },
        "auth": { "bcrypt_cost": 12 }
    })
}

#[tokio::test]
#[serial]
async fn layers_merge_in_order() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "store:\n  url: http://file:9200\nauth:\n  bcrypt_cost: 10").unwrap();

    std::env::set_var("GKTEST__AUTH__BCRYPT_COST", "8");
    let loader = Loader {
        defaults: defaults(),
        sources: vec![
            Arc::new(FileSource {
                paths: vec![file.path().to_path_buf()],
            }) as Arc<dyn Source>,
            Arc::new(EnvSource {
                prefix: "GKTEST".into(),
                separator: "__".into(),
            }) as Arc<dyn Source>,
            Arc::new(CliArgsSource {
                args: vec!["--store.url=http://cli:9200".into(), "serve".into()],
            }) as Arc<dyn Source>,
        ],
        secrets: vec![],
        validator: Arc::new(BasicValidator),
    };

    let snapshot = loader.load_once().await.expect("snapshot");
    std::env::remove_var("GKTEST__AUTH__BCRYPT_COST");

    let url: String = snapshot.get(&KeyPath::new("store.url")).unwrap();
    assert_eq!(url, "http://cli:9200");
    let cost: u32 = snapshot.get(&KeyPath::new("auth.bcrypt_cost")).unwrap();
    assert_eq!(cost, 8);
    let users: String = snapshot.get(&KeyPath::new("store.users_index")).unwrap();
    assert_eq!(users, ".users");
    assert!(!snapshot.checksum().0.is_empty());

    let origin = snapshot.origin_of(&KeyPath::new("store.url")).unwrap();
    assert_eq!(origin.layer, Layer::Cli);
    let origin = snapshot.origin_of(&KeyPath::new("auth.bcrypt_cost")).unwrap();
    assert_eq!(origin.origin, "GKTEST__AUTH__BCRYPT_COST");
}

#[tokio::test]
#[serial]
async fn aliases_and_env_secrets() {
    std::env::set_var("GKTEST_CLUSTER", "http://alias:9200");
    std::env::set_var("GKTEST_MASTER_PW", "s3cret");

    let loader = Loader {
        defaults: serde_json::json!({ "bootstrap": { "password": "secret://env/GKTEST_MASTER_PW" } }),
        sources: vec![Arc::new(EnvAliasSource::new([("GKTEST_CLUSTER", "store.url")])) as Arc<dyn Source>],
        secrets: vec![Arc::new(EnvSecretResolver) as Arc<dyn SecretResolver>],
        validator: Arc::new(BasicValidator),
    };
    let snapshot = loader.load_once().await.expect("snapshot");
    std::env::remove_var("GKTEST_CLUSTER");
    std::env::remove_var("GKTEST_MASTER_PW");

    let url: String = snapshot.get(&KeyPath::new("store.url")).unwrap();
    assert_eq!(url, "http://alias:9200");
    let pw: String = snapshot.get(&KeyPath::new("bootstrap.password")).unwrap();
    assert_eq!(pw, "s3cret");
}

struct FailingResolver;

#[async_trait::async_trait]
impl SecretResolver for FailingResolver {
    fn id(&self) -> &'static str {
        "vault"
    }

    async fn resolve(&self, _uri: &str) -> Result<serde_json::Value, ConfigError> {
        Err(invalid("test", "forced failure"))
    }
}

#[tokio::test]
async fn unresolvable_secret_fails_boot() {
    let loader = Loader {
        defaults: serde_json::json!({ "key": "secret://vault/x" }),
        sources: vec![],
        secrets: vec![Arc::new(FailingResolver) as Arc<dyn SecretResolver>],
        validator: Arc::new(BasicValidator),
    };
    assert!(loader.load_once().await.is_err());

    let loader = Loader {
        defaults: serde_json::json!({ "key": "secret://nowhere/x" }),
        sources: vec![],
        secrets: vec![Arc::new(EnvSecretResolver) as Arc<dyn SecretResolver>],
        validator: Arc::new(BasicValidator),
    };
    let err = loader.load_once().await.unwrap_err();
    assert_eq!(err.phase(), Some("secret"));
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct Typed {
    auth: TypedAuth,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct TypedAuth {
    bcrypt_cost: u32,
}

#[tokio::test]
async fn typed_validator_rejects_bad_values() {
    let loader = Loader {
        defaults: defaults(),
        sources: vec![Arc::new(CliArgsSource {
            args: vec!["--auth.bcrypt_cost=lots".into()],
        }) as Arc<dyn Source>],
        secrets: vec![],
        validator: Arc::new(TypedValidator::<Typed>::new()),
    };
    let err = loader.load_once().await.unwrap_err();
    assert_eq!(err.phase(), Some("validate"));
    assert_eq!(err.into_inner().code.0, "CONFIG.INVALID");
}
