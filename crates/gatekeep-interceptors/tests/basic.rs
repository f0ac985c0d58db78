use bytes::Bytes;
use futures::FutureExt;
use gatekeep_auth::prelude::*;
use gatekeep_auth::AuthFacade;
use gatekeep_interceptors::prelude::*;
use gatekeep_storage::prelude::MockDatastore;
use gatekeep_types::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct MockReq {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl MockReq {
    fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    fn basic(mut self, username: &str, secret: &str) -> Self {
        self.headers.insert(
            "Authorization".into(),
            BasicCredentials::new(username, secret).to_header(),
        );
        self
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Default)]
struct MockRes {
    status: u16,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
}

impl MockRes {
    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_deref().unwrap_or(b"null")).unwrap()
    }
}

#[async_trait::async_trait]
impl ProtoRequest for MockReq {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query(&self) -> Option<&str> {
        None
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).cloned()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        Some("10.0.0.7".parse().unwrap())
    }

    async fn read_body(&mut self) -> Result<Bytes, InterceptError> {
        Ok(self.body.clone())
    }
}

#[async_trait::async_trait]
impl ProtoResponse for MockRes {
    fn set_status(&mut self, code: u16) {
        self.status = code;
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn insert_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn write_body(&mut self, body: Bytes) -> Result<(), InterceptError> {
        self.body = Some(body);
        Ok(())
    }

    fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

struct Fixture {
    store: Arc<dyn CredentialStore>,
    users: UserService,
    limiter: Arc<SlidingWindowLimiter>,
    admin: Credential,
}

async fn fixture() -> Fixture {
    let datastore = MockDatastore::new();
    let store: Arc<dyn CredentialStore> = Arc::new(DocumentCredentialStore::in_memory(&datastore));
    let users = UserService::new(store.clone()).with_bcrypt_cost(4);
    users.ensure_master("admin", "root").await.unwrap();
    let admin = Credential::User(store.get_user("admin").await.unwrap().unwrap());
    Fixture {
        store,
        users,
        limiter: Arc::new(SlidingWindowLimiter::new()),
        admin,
    }
}

impl Fixture {
    fn facade(&self, limits: RateLimitPolicy) -> AuthFacade {
        AuthFacade::new(
            Arc::new(CredentialResolver::new(self.store.clone())),
            Arc::new(GrantEvaluator),
            self.limiter.clone(),
            limits,
        )
    }

    /// `reader` may read `movies` through search and docs APIs.
    async fn reader(&self) {
        let new_user: NewUser = serde_json::from_value(serde_json::json!({
            "username": "reader",
            "password": "pw",
            "categories": ["search", "docs"],
            "ops": ["read"],
            "indices": ["movies"],
        }))
        .unwrap();
        self.users.create(&self.admin, new_user).await.unwrap();
    }
}

fn ok_handler(calls: Arc<AtomicUsize>) -> Handler {
    handler(move |_cx, _req, rsp| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            rsp.set_status(200);
            rsp.write_json(&serde_json::json!({"took": 4, "ok": true})).await
        }
        .boxed()
    })
}

fn standard_chain(facade: AuthFacade) -> InterceptorChain {
    let layout = ChainLayout::standard(facade, Arc::new(Classifier::new()), false);
    InterceptorChain::new(layout.head.into_iter().chain(layout.guards).collect())
}

async fn send(chain: &InterceptorChain, handler: Handler, mut req: MockReq) -> MockRes {
    let mut res = MockRes::default();
    let mut cx = InterceptContext::default();
    chain.run(&mut cx, &mut req, &mut res, handler).await.unwrap();
    res
}

#[tokio::test]
async fn unauthenticated_requests_never_touch_the_limiter() {
    let fx = fixture().await;
    fx.reader().await;
    let chain = standard_chain(fx.facade(RateLimitPolicy {
        user_default: Some(RateLimit::new(1, Duration::from_secs(60))),
        permission_default: None,
    }));
    let calls = Arc::new(AtomicUsize::new(0));

    let res = send(&chain, ok_handler(calls.clone()), MockReq::new("GET", "/movies/_search")).await;
    assert_eq!(res.status, 401);
    assert!(res.headers.contains_key("www-authenticate"));

    let res = send(
        &chain,
        ok_handler(calls.clone()),
        MockReq::new("GET", "/movies/_search").basic("reader", "wrong"),
    )
    .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.json()["reason"], "unauthenticated");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!fx.limiter.is_tracked(&QuotaKey::new("reader", Category::Search)));
    assert!(fx.limiter.is_empty());
}

#[tokio::test]
async fn granted_request_reaches_the_handler() {
    let fx = fixture().await;
    fx.reader().await;
    let chain = standard_chain(fx.facade(RateLimitPolicy::unlimited()));
    let calls = Arc::new(AtomicUsize::new(0));

    let res = send(
        &chain,
        ok_handler(calls.clone()),
        MockReq::new("POST", "/movies/_search")
            .basic("reader", "pw")
            .with_header("X-Request-Id", "req-1"),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["ok"], true);
    assert_eq!(res.headers["X-Request-Id"], "req-1");
    assert_eq!(res.headers["X-Request-Category"], "search");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn denials_name_the_failing_check() {
    let fx = fixture().await;
    fx.reader().await;
    let chain = standard_chain(fx.facade(RateLimitPolicy::unlimited()));
    let calls = Arc::new(AtomicUsize::new(0));

    let cases = [
        (MockReq::new("PUT", "/movies/_doc/1"), "operation"),
        (MockReq::new("GET", "/books/_search"), "index"),
        (MockReq::new("GET", "/_cluster/health"), "category"),
        (MockReq::new("GET", "/_search"), "index"),
    ];
    for (req, reason) in cases {
        let path = req.path.clone();
        let res = send(&chain, ok_handler(calls.clone()), req.basic("reader", "pw")).await;
        assert_eq!(res.status, 403, "{path}");
        assert_eq!(res.json()["reason"], reason, "{path}");
        assert_eq!(res.json()["code"], "AUTH.FORBIDDEN");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn limit_exhaustion_is_429_with_retry_after() {
    let fx = fixture().await;
    fx.reader().await;
    let chain = standard_chain(fx.facade(RateLimitPolicy {
        user_default: Some(RateLimit::new(2, Duration::from_secs(30))),
        permission_default: None,
    }));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let res = send(
            &chain,
            ok_handler(calls.clone()),
            MockReq::new("GET", "/movies/_search").basic("reader", "pw"),
        )
        .await;
        assert_eq!(res.status, 200);
    }
    let res = send(
        &chain,
        ok_handler(calls.clone()),
        MockReq::new("GET", "/movies/_search").basic("reader", "pw"),
    )
    .await;
    assert_eq!(res.status, 429);
    let retry: u64 = res.headers["retry-after"].parse().unwrap();
    assert!((1..=30).contains(&retry));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // other categories have their own window
    let res = send(
        &chain,
        ok_handler(calls.clone()),
        MockReq::new("GET", "/movies/_doc/1").basic("reader", "pw"),
    )
    .await;
    assert_eq!(res.status, 200);
}

#[tokio::test]
async fn first_interceptor_is_outermost() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let chain = InterceptorChain::new(vec![
        Arc::new(Tag("a", trail.clone())),
        Arc::new(Tag("b", trail.clone())),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let res = send(&chain, ok_handler(calls), MockReq::new("GET", "/")).await;
    assert_eq!(res.status, 200);
    assert_eq!(*trail.lock(), vec!["a>", "b>", "<b", "<a"]);
}

struct Tag(&'static str, Arc<Mutex<Vec<String>>>);

#[async_trait::async_trait]
impl Interceptor for Tag {
    fn name(&self) -> &'static str {
        self.0
    }

    async fn intercept(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        next: &Handler,
    ) -> Result<(), InterceptError> {
        self.1.lock().push(format!("{}>", self.0));
        let result = next(cx, req, rsp).await;
        self.1.lock().push(format!("<{}", self.0));
        result
    }
}

struct TestPlugin {
    name: &'static str,
    deps: Vec<&'static str>,
    inits: Arc<Mutex<Vec<&'static str>>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    exports: Vec<Arc<dyn Interceptor>>,
    /// Dependencies whose exports wrap this plugin's route.
    imports: Vec<&'static str>,
}

impl TestPlugin {
    fn new(name: &'static str, deps: &[&'static str], inits: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            deps: deps.to_vec(),
            inits: inits.clone(),
            interceptors: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn dependencies(&self) -> Vec<&'static str> {
        self.deps.clone()
    }

    async fn init(&self) -> Result<(), InterceptError> {
        self.inits.lock().push(self.name);
        Ok(())
    }

    fn routes(&self, deps: &PluginExports) -> Result<Vec<Route>, InterceptError> {
        let name = self.name;
        let mut imported = Vec::new();
        for dep in &self.imports {
            imported.extend(deps.get(dep)?);
        }
        Ok(vec![Route::new(
            "GET",
            format!("/_{name}"),
            handler(move |_cx, _req, rsp| {
                async move {
                    rsp.set_status(200);
                    rsp.write_json(&serde_json::json!({ "plugin": name })).await
                }
                .boxed()
            }),
        )
        .with_interceptors(imported)])
    }

    fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.clone()
    }

    fn exports(&self) -> Vec<Arc<dyn Interceptor>> {
        self.exports.clone()
    }
}

#[tokio::test]
async fn plugins_initialise_once_in_dependency_order() {
    let inits = Arc::new(Mutex::new(Vec::new()));
    let mut host = PluginHost::new();
    host.register(TestPlugin::new("logs", &["users"], &inits))
        .register(TestPlugin::new("users", &[], &inits))
        .register(TestPlugin::new("analytics", &["logs", "users"], &inits));

    let router = host
        .build(ChainLayout::default(), ok_handler(Arc::new(AtomicUsize::new(0))))
        .await
        .unwrap();
    assert_eq!(*inits.lock(), vec!["users", "logs", "analytics"]);

    let mut res = MockRes::default();
    router
        .dispatch(&mut InterceptContext::default(), &mut MockReq::new("GET", "/_logs"), &mut res)
        .await
        .unwrap();
    assert_eq!(res.json()["plugin"], "logs");
}

#[tokio::test]
async fn plugin_cycles_and_unknown_dependencies_are_fatal() {
    let inits = Arc::new(Mutex::new(Vec::new()));
    let mut host = PluginHost::new();
    host.register(TestPlugin::new("a", &["b"], &inits))
        .register(TestPlugin::new("b", &["a"], &inits));
    let err = host
        .build(ChainLayout::default(), ok_handler(Arc::new(AtomicUsize::new(0))))
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), gatekeep_errors::prelude::codes::CONFIG_INVALID);
    assert!(inits.lock().is_empty(), "nothing initialises when the graph is bad");

    let mut host = PluginHost::new();
    host.register(TestPlugin::new("a", &["missing"], &inits));
    assert!(host.ordered().is_err());
}

async fn dispatch_get(router: &Router, path: &str) -> MockRes {
    let mut res = MockRes::default();
    router
        .dispatch(&mut InterceptContext::default(), &mut MockReq::new("GET", path), &mut res)
        .await
        .unwrap();
    res
}

#[tokio::test]
async fn route_interceptors_wrap_only_their_own_route() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let inits = Arc::new(Mutex::new(Vec::new()));
    let users = Arc::new(TestPlugin {
        name: "users",
        deps: Vec::new(),
        inits: inits.clone(),
        interceptors: Vec::new(),
        exports: vec![Arc::new(Tag("users-export", trail.clone()))],
        imports: Vec::new(),
    });
    let permissions = Arc::new(TestPlugin {
        name: "permissions",
        deps: vec!["users"],
        inits: inits.clone(),
        interceptors: Vec::new(),
        exports: Vec::new(),
        imports: vec!["users"],
    });
    let mut host = PluginHost::new();
    host.register(users).register(permissions);
    let layout = ChainLayout {
        head: vec![Arc::new(Tag("head", trail.clone()))],
        guards: vec![Arc::new(Tag("guard", trail.clone()))],
    };
    let router = host
        .build(layout, ok_handler(Arc::new(AtomicUsize::new(0))))
        .await
        .unwrap();

    assert_eq!(dispatch_get(&router, "/_permissions").await.status, 200);
    assert_eq!(
        std::mem::take(&mut *trail.lock()),
        vec!["head>", "users-export>", "guard>", "<guard", "<users-export", "<head"]
    );

    for path in ["/_users", "/movies/_search"] {
        assert_eq!(dispatch_get(&router, path).await.status, 200, "{path}");
        assert_eq!(
            std::mem::take(&mut *trail.lock()),
            vec!["head>", "guard>", "<guard", "<head"],
            "{path}"
        );
    }
}

#[tokio::test]
async fn exports_are_visible_to_dependents_only() {
    let inits = Arc::new(Mutex::new(Vec::new()));
    let users = TestPlugin::new("users", &[], &inits);
    let sneaky = Arc::new(TestPlugin {
        name: "analytics",
        deps: Vec::new(),
        inits: inits.clone(),
        interceptors: Vec::new(),
        exports: Vec::new(),
        imports: vec!["users"],
    });
    let mut host = PluginHost::new();
    host.register(users).register(sneaky);
    let err = host
        .build(ChainLayout::default(), ok_handler(Arc::new(AtomicUsize::new(0))))
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), gatekeep_errors::prelude::codes::CONFIG_INVALID);
}

async fn wait_for_records(sink: &MemoryAuditSink, n: usize) {
    for _ in 0..100 {
        if sink.len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {n} audit records, have {}", sink.len());
}

#[tokio::test]
async fn recorder_sees_the_final_response() {
    let fx = fixture().await;
    fx.reader().await;
    let sink = Arc::new(MemoryAuditSink::new(16));
    let inits = Arc::new(Mutex::new(Vec::new()));
    let logs = Arc::new(TestPlugin {
        name: "logs",
        deps: Vec::new(),
        inits,
        interceptors: vec![Arc::new(AuditRecorder::new(vec![sink.clone()]))],
        exports: Vec::new(),
        imports: Vec::new(),
    });
    let mut host = PluginHost::new();
    host.register(logs);
    let layout = ChainLayout::standard(
        fx.facade(RateLimitPolicy::unlimited()),
        Arc::new(Classifier::new()),
        false,
    );
    let router = host
        .build(layout, ok_handler(Arc::new(AtomicUsize::new(0))))
        .await
        .unwrap();

    let mut res = MockRes::default();
    let mut req = MockReq::new("GET", "/books/_search").basic("reader", "pw");
    router
        .dispatch(&mut InterceptContext::default(), &mut req, &mut res)
        .await
        .unwrap();
    assert_eq!(res.status, 403);

    let mut res = MockRes::default();
    let mut req = MockReq::new("GET", "/movies/_search").basic("reader", "pw");
    router
        .dispatch(&mut InterceptContext::default(), &mut req, &mut res)
        .await
        .unwrap();
    assert_eq!(res.status, 200);

    wait_for_records(&sink, 2).await;
    let records = sink.query(&AuditQuery::default());
    let by_code = |code: u16| records.iter().find(|r| r.response.code == code).unwrap();
    let ok = by_code(200);
    assert_eq!(ok.response.code, 200);
    assert_eq!(ok.response.took, Some(4.0));
    assert_eq!(ok.category, Some(Category::Search));
    assert_eq!(ok.indices, vec!["movies"]);
    assert_eq!(ok.request.header["Authorization"], vec!["[redacted]"]);

    let denied = by_code(403);
    assert_eq!(denied.response.status, "Forbidden");
    assert_eq!(denied.indices, vec!["books"]);

    let errors = sink.query(&AuditQuery {
        filter: Some(LogFilter::Error),
        ..Default::default()
    });
    assert_eq!(errors.len(), 1);

    // streams traffic is not recorded
    let mut res = MockRes::default();
    let mut req = MockReq::new("GET", "/movies/_search")
        .basic("reader", "pw")
        .with_header("X-Request-Category", "streams");
    router
        .dispatch(&mut InterceptContext::default(), &mut req, &mut res)
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn deadline_turns_into_504_and_is_recorded() {
    let sink = Arc::new(MemoryAuditSink::new(4));
    let chain = InterceptorChain::new(vec![
        stage(ContextInitStage::default()),
        Arc::new(AuditRecorder::new(vec![sink.clone()])),
    ]);
    let slow = handler(|_cx, _req, rsp| {
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            rsp.set_status(200);
            Ok(())
        }
        .boxed()
    });

    let mut res = MockRes::default();
    let mut cx = InterceptContext::default().with_timeout(Duration::from_millis(30));
    chain
        .run(&mut cx, &mut MockReq::new("GET", "/"), &mut res, slow)
        .await
        .unwrap();
    assert_eq!(res.status, 504);
    assert_eq!(res.json()["code"], "UPSTREAM.TIMEOUT");

    wait_for_records(&sink, 1).await;
    assert_eq!(sink.query(&AuditQuery::default())[0].response.code, 504);
}

#[tokio::test]
async fn proxy_handler_requires_a_guarded_context() {
    struct Echo;

    #[async_trait::async_trait]
    impl Upstream for Echo {
        async fn forward(
            &self,
            _cx: &InterceptContext,
            _req: &mut dyn ProtoRequest,
            rsp: &mut dyn ProtoResponse,
        ) -> Result<(), InterceptError> {
            rsp.set_status(200);
            Ok(())
        }
    }

    let chain = InterceptorChain::default();
    let res = send(&chain, proxy_handler(Arc::new(Echo)), MockReq::new("GET", "/movies")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.json()["code"], "UNKNOWN.INTERNAL");
}
