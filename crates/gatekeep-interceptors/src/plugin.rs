//! Plugins contribute routes and interceptors. The host orders them by their declared
//! dependencies, initialises each exactly once and assembles the router. A plugin may
//! export interceptors that its dependents attach to their own routes.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::classify::Classifier;
use crate::errors::InterceptError;
use crate::router::{Route, Router};
use crate::stages::authn::AuthnStage;
use crate::stages::authz::{AuthorizeStage, ValidateOperationStage};
use crate::stages::classify::ClassifyStage;
use crate::stages::context_init::ContextInitStage;
use crate::stages::rate_limit::RateLimitStage;
use crate::stages::response_stamp::ResponseStampStage;
use crate::stages::{stage, Handler, Interceptor, InterceptorChain};
use gatekeep_auth::AuthFacade;

#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Plugins that must be initialised first.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn init(&self) -> Result<(), InterceptError> {
        Ok(())
    }

    /// `deps` holds the exports of the plugins named in [`Plugin::dependencies`].
    fn routes(&self, _deps: &PluginExports) -> Result<Vec<Route>, InterceptError> {
        Ok(Vec::new())
    }

    /// Interceptors placed on every route, between context init and the guards.
    fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        Vec::new()
    }

    /// Interceptors dependent plugins may put on their own routes. Read after `init`.
    fn exports(&self) -> Vec<Arc<dyn Interceptor>> {
        Vec::new()
    }
}

/// The exports a plugin can see: those of its declared dependencies.
pub struct PluginExports {
    plugin: &'static str,
    visible: HashMap<&'static str, Vec<Arc<dyn Interceptor>>>,
}

impl PluginExports {
    pub fn get(&self, dependency: &str) -> Result<Vec<Arc<dyn Interceptor>>, InterceptError> {
        self.visible.get(dependency).cloned().ok_or_else(|| {
            InterceptError::config(&format!(
                "plugin {} reads exports of {dependency} without depending on it",
                self.plugin
            ))
        })
    }
}

/// Where plugin interceptors go: after `head`, before `guards`.
#[derive(Clone, Default)]
pub struct ChainLayout {
    pub head: Vec<Arc<dyn Interceptor>>,
    pub guards: Vec<Arc<dyn Interceptor>>,
}

impl ChainLayout {
    /// context-init, then classify, authenticate, authorize, validate-operation,
    /// rate-limit and the response stamp.
    pub fn standard(facade: AuthFacade, classifier: Arc<Classifier>, trust_forwarded_for: bool) -> Self {
        Self {
            head: vec![stage(ContextInitStage {
                trust_forwarded_for,
            })],
            guards: vec![
                stage(ClassifyStage { classifier }),
                stage(AuthnStage {
                    facade: facade.clone(),
                }),
                stage(AuthorizeStage {
                    facade: facade.clone(),
                }),
                stage(ValidateOperationStage {
                    facade: facade.clone(),
                }),
                stage(RateLimitStage { facade }),
                stage(ResponseStampStage),
            ],
        }
    }
}

#[derive(Default)]
pub struct PluginHost {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    /// Dependency order; ties keep registration order.
    pub fn ordered(&self) -> Result<Vec<Arc<dyn Plugin>>, InterceptError> {
        let mut by_name: HashMap<&'static str, &Arc<dyn Plugin>> = HashMap::new();
        for plugin in &self.plugins {
            if by_name.insert(plugin.name(), plugin).is_some() {
                return Err(InterceptError::config(&format!(
                    "plugin {} registered twice",
                    plugin.name()
                )));
            }
        }
        for plugin in &self.plugins {
            if let Some(missing) = plugin
                .dependencies()
                .into_iter()
                .find(|dep| !by_name.contains_key(dep))
            {
                return Err(InterceptError::config(&format!(
                    "plugin {} depends on unknown plugin {missing}",
                    plugin.name()
                )));
            }
        }

        let mut done: BTreeSet<&'static str> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(self.plugins.len());
        while ordered.len() < self.plugins.len() {
            let ready = self.plugins.iter().find(|plugin| {
                !done.contains(plugin.name())
                    && plugin.dependencies().iter().all(|dep| done.contains(dep))
            });
            let Some(plugin) = ready else {
                let stuck: Vec<_> = self
                    .plugins
                    .iter()
                    .map(|p| p.name())
                    .filter(|name| !done.contains(name))
                    .collect();
                return Err(InterceptError::config(&format!(
                    "plugin dependency cycle among {stuck:?}"
                )));
            };
            done.insert(plugin.name());
            ordered.push(Arc::clone(plugin));
        }
        Ok(ordered)
    }

    /// Initialises every plugin once, in dependency order, and assembles the router.
    /// Unmatched requests go to `fallback`.
    pub async fn build(self, layout: ChainLayout, fallback: Handler) -> Result<Router, InterceptError> {
        let ordered = self.ordered()?;

        let head = InterceptorChain::new(layout.head);
        let mut shared = InterceptorChain::new(Vec::new());
        let mut exported: HashMap<&'static str, Vec<Arc<dyn Interceptor>>> = HashMap::new();
        let mut routes = Vec::new();
        for plugin in &ordered {
            plugin.init().await?;
            for interceptor in plugin.interceptors() {
                shared.push(interceptor);
            }
            let deps = PluginExports {
                plugin: plugin.name(),
                visible: plugin
                    .dependencies()
                    .into_iter()
                    .filter_map(|dep| exported.get(dep).map(|list| (dep, list.clone())))
                    .collect(),
            };
            routes.extend(plugin.routes(&deps)?);
            exported.insert(plugin.name(), plugin.exports());
            tracing::info!(target: "gatekeep::chain", plugin = plugin.name(), "plugin initialised");
        }
        for guard in layout.guards {
            shared.push(guard);
        }
        tracing::debug!(
            target: "gatekeep::chain",
            head = ?head.names(),
            shared = ?shared.names(),
            "chain assembled"
        );

        Ok(Router::new(&head, &shared, routes, fallback))
    }
}
