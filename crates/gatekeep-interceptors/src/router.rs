use std::sync::Arc;

use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{self, Handler, Interceptor, InterceptorChain};

/// A plugin-provided endpoint. `path` is exact, or a prefix when it ends in `*`.
#[derive(Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub handler: Handler,
    /// Run on this route only, right after context init.
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Route {
    pub fn new(method: &'static str, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptors(mut self, interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method))
            && path_matches(&self.path, path)
    }
}

fn path_matches(glob: &str, path: &str) -> bool {
    if let Some(stripped) = glob.strip_suffix('*') {
        path.starts_with(stripped)
    } else {
        glob == path || path.strip_suffix('/') == Some(glob)
    }
}

/// Routes with their chain already wrapped around them.
pub struct Router {
    routes: Vec<(Route, Handler)>,
    fallback: Handler,
}

impl Router {
    /// Every handler runs inside `head`, then its route's own interceptors, then `shared`.
    pub fn new(head: &InterceptorChain, shared: &InterceptorChain, routes: Vec<Route>, fallback: Handler) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| {
                let scoped = InterceptorChain::new(route.interceptors.clone());
                let wrapped = head.wrap(scoped.wrap(shared.wrap(Arc::clone(&route.handler))));
                (route, wrapped)
            })
            .collect();
        Self {
            routes,
            fallback: head.wrap(shared.wrap(fallback)),
        }
    }

    /// First declared match wins; anything else goes to the fallback.
    pub fn route(&self, method: &str, path: &str) -> &Handler {
        self.routes
            .iter()
            .find(|(route, _)| route.matches(method, path))
            .map(|(_, handler)| handler)
            .unwrap_or(&self.fallback)
    }

    pub fn paths(&self) -> Vec<(&'static str, &str)> {
        self.routes
            .iter()
            .map(|(route, _)| (route.method, route.path.as_str()))
            .collect()
    }

    pub async fn dispatch(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<(), InterceptError> {
        let handler = Arc::clone(self.route(req.method(), req.path()));
        stages::run(&handler, cx, req, rsp).await
    }
}

#[cfg(test)]
mod tests {
    use super::path_matches;

    #[test]
    fn globs_are_prefixes() {
        assert!(path_matches("/_user*", "/_user/alice"));
        assert!(path_matches("/_users", "/_users/"));
        assert!(!path_matches("/_users", "/_users/alice"));
        assert!(path_matches("/_user/*", "/_user/alice"));
        assert!(!path_matches("/_user/*", "/_users/alice"));
        assert!(!path_matches("/_user/*", "/_user"));
    }
}
