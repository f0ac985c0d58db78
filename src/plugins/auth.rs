//! Management routes for users (`/_user`, `/_users`) and permissions
//! (`/_permission`, `/_permissions`). Callers already passed the guards, so the
//! acting credential is always in the context. Both carry secrets in their bodies and
//! run behind the users plugin's exported [`SensitiveBodies`].

use futures::FutureExt;
use gatekeep_auth::prelude::*;
use gatekeep_interceptors::prelude::*;
use serde_json::json;
use std::sync::Arc;

use super::{no_such_endpoint, query_params, read_body_as, respond, tail, unknown_endpoint};

pub struct UsersPlugin {
    users: Arc<UserService>,
    sensitive: Arc<dyn Interceptor>,
}

impl UsersPlugin {
    pub fn new(users: Arc<UserService>) -> Self {
        Self {
            users,
            sensitive: Arc::new(SensitiveBodies),
        }
    }
}

/// `/_user/{name}` names a user; bare `/_user` is the caller.
fn target_user(cx: &InterceptContext, req: &dyn ProtoRequest, named: bool) -> Result<String, InterceptError> {
    if !named {
        return Ok(cx.credential()?.identity().to_string());
    }
    tail(req.path(), "/_user")
        .map(str::to_string)
        .ok_or_else(|| no_such_endpoint(req.method(), req.path()))
}

#[async_trait::async_trait]
impl Plugin for UsersPlugin {
    fn name(&self) -> &'static str {
        "users"
    }

    fn exports(&self) -> Vec<Arc<dyn Interceptor>> {
        vec![Arc::clone(&self.sensitive)]
    }

    fn routes(&self, _deps: &PluginExports) -> Result<Vec<Route>, InterceptError> {
        let get = |named: bool| {
            let users = Arc::clone(&self.users);
            handler(move |cx, req, rsp| {
                let users = Arc::clone(&users);
                async move {
                    let name = target_user(cx, req, named)?;
                    let user = users.get(cx.credential()?, &name).await?;
                    respond(rsp, 200, user.redacted()).await
                }
                .boxed()
            })
        };
        let patch = |named: bool| {
            let users = Arc::clone(&self.users);
            handler(move |cx, req, rsp| {
                let users = Arc::clone(&users);
                async move {
                    let name = target_user(cx, req, named)?;
                    let changes: UserPatch = read_body_as(req).await?;
                    let user = users.patch(cx.credential()?, &name, changes).await?;
                    respond(rsp, 200, user.redacted()).await
                }
                .boxed()
            })
        };
        let create = Arc::clone(&self.users);
        let delete = Arc::clone(&self.users);
        let list = Arc::clone(&self.users);
        let routes = vec![
            Route::new(
                "GET",
                "/_users",
                handler(move |cx, _req, rsp| {
                    let users = Arc::clone(&list);
                    async move {
                        let listed = users.list(cx.credential()?).await?;
                        let body: Vec<_> = listed.iter().map(User::redacted).collect();
                        respond(rsp, 200, json!({ "users": body })).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "POST",
                "/_user",
                handler(move |cx, req, rsp| {
                    let users = Arc::clone(&create);
                    async move {
                        let new: NewUser = read_body_as(req).await?;
                        let user = users.create(cx.credential()?, new).await?;
                        respond(rsp, 201, user.redacted()).await
                    }
                    .boxed()
                }),
            ),
            Route::new("GET", "/_user", get(false)),
            Route::new("GET", "/_user/*", get(true)),
            Route::new("PATCH", "/_user", patch(false)),
            Route::new("PATCH", "/_user/*", patch(true)),
            Route::new(
                "DELETE",
                "/_user/*",
                handler(move |cx, req, rsp| {
                    let users = Arc::clone(&delete);
                    async move {
                        let name = target_user(cx, req, true)?;
                        users.delete(cx.credential()?, &name).await?;
                        respond(rsp, 200, json!({ "acknowledged": true, "username": name })).await
                    }
                    .boxed()
                }),
            ),
            Route::new("*", "/_user*", unknown_endpoint()),
        ];
        Ok(routes
            .into_iter()
            .map(|route| route.with_interceptors([Arc::clone(&self.sensitive)]))
            .collect())
    }
}

pub struct PermissionsPlugin {
    permissions: Arc<PermissionService>,
}

impl PermissionsPlugin {
    pub fn new(permissions: Arc<PermissionService>) -> Self {
        Self { permissions }
    }
}

fn named_permission(req: &dyn ProtoRequest) -> Result<String, InterceptError> {
    tail(req.path(), "/_permission")
        .map(str::to_string)
        .ok_or_else(|| no_such_endpoint(req.method(), req.path()))
}

#[async_trait::async_trait]
impl Plugin for PermissionsPlugin {
    fn name(&self) -> &'static str {
        "permissions"
    }

    /// Permissions are minted against users.
    fn dependencies(&self) -> Vec<&'static str> {
        vec!["users"]
    }

    fn routes(&self, deps: &PluginExports) -> Result<Vec<Route>, InterceptError> {
        let sensitive = deps.get("users")?;
        let list = Arc::clone(&self.permissions);
        let create = Arc::clone(&self.permissions);
        let get = Arc::clone(&self.permissions);
        let by_role = Arc::clone(&self.permissions);
        let patch = Arc::clone(&self.permissions);
        let delete = Arc::clone(&self.permissions);
        let routes = vec![
            Route::new(
                "GET",
                "/_permissions",
                handler(move |cx, _req, rsp| {
                    let permissions = Arc::clone(&list);
                    async move {
                        let listed = permissions.list(cx.credential()?).await?;
                        respond(rsp, 200, json!({ "permissions": listed })).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "POST",
                "/_permission",
                handler(move |cx, req, rsp| {
                    let permissions = Arc::clone(&create);
                    async move {
                        let new: NewPermission = read_body_as(req).await?;
                        let permission = permissions.create(cx.credential()?, new).await?;
                        respond(rsp, 201, json!(permission)).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "GET",
                "/_permission",
                handler(move |cx, req, rsp| {
                    let permissions = Arc::clone(&by_role);
                    async move {
                        let role = query_params(req).remove("role").ok_or_else(|| {
                            InterceptError::schema("expected /_permission/{username} or ?role=")
                        })?;
                        let permission = permissions.get_by_role(cx.credential()?, &role).await?;
                        respond(rsp, 200, json!(permission)).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "GET",
                "/_permission/*",
                handler(move |cx, req, rsp| {
                    let permissions = Arc::clone(&get);
                    async move {
                        let name = named_permission(req)?;
                        let permission = permissions.get(cx.credential()?, &name).await?;
                        respond(rsp, 200, json!(permission)).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "PATCH",
                "/_permission/*",
                handler(move |cx, req, rsp| {
                    let permissions = Arc::clone(&patch);
                    async move {
                        let name = named_permission(req)?;
                        let changes: PermissionPatch = read_body_as(req).await?;
                        let permission = permissions.patch(cx.credential()?, &name, changes).await?;
                        respond(rsp, 200, json!(permission)).await
                    }
                    .boxed()
                }),
            ),
            Route::new(
                "DELETE",
                "/_permission/*",
                handler(move |cx, req, rsp| {
                    let permissions = Arc::clone(&delete);
                    async move {
                        let name = named_permission(req)?;
                        permissions.delete(cx.credential()?, &name).await?;
                        respond(rsp, 200, json!({ "acknowledged": true, "username": name })).await
                    }
                    .boxed()
                }),
            ),
            Route::new("*", "/_permission*", unknown_endpoint()),
        ];
        Ok(routes
            .into_iter()
            .map(|route| route.with_interceptors(sensitive.iter().cloned()))
            .collect())
    }
}
