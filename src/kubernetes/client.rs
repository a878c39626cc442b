// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, api::ListParams};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::discovery::{ResourceInfo, ResourceRegistry, build_core_registry, discover_resources};
use crate::backup::{
    BackupRequest, FetchError, Item, ItemSource, LabelSelector, ResourceIdentifier,
};
use crate::progress::ProgressHandle;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Connection to one cluster plus the resource kinds it serves
pub struct ClusterClient {
    client: Client,
    context: String,
    registry: ResourceRegistry,
}

impl ClusterClient {
    /// Connect using a kubeconfig context (current context when None)
    pub async fn connect(context: Option<&str>, progress: Option<&ProgressHandle>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read()?;

        let context_name = context
            .map(String::from)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| anyhow!("No context specified and no current context in kubeconfig"))?;

        // Verify context exists
        if !kubeconfig.contexts.iter().any(|c| c.name == context_name) {
            return Err(anyhow!(
                "Context '{}' not found in kubeconfig",
                context_name
            ));
        }

        if let Some(progress) = progress {
            progress.connecting(&context_name);
        }

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context_name.clone()),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("Failed to load kubeconfig for context '{}'", context_name))?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .with_context(|| format!("Failed to create client for context '{}'", context_name))?;

        info!(context = %context_name, "Connected to cluster");

        Ok(Self::from_parts(client, context_name, build_core_registry()))
    }

    pub fn from_parts(client: Client, context: String, registry: ResourceRegistry) -> Self {
        Self {
            client,
            context,
            registry,
        }
    }

    /// Add every kind the API server advertises (CRDs included) to the core registry
    pub async fn discover(&mut self, progress: Option<&ProgressHandle>) -> Result<usize> {
        if let Some(progress) = progress {
            progress.discovering(&self.context);
        }
        let start = std::time::Instant::now();

        let discovered = discover_resources(&self.client)
            .await
            .with_context(|| format!("Resource discovery failed for context '{}'", self.context))?;
        if discovered.is_empty() {
            warn!(
                context = %self.context,
                "Discovery returned no resources, using built-in kinds"
            );
        }
        self.registry.merge(discovered);

        info!(
            context = %self.context,
            resources = self.registry.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resource discovery complete"
        );
        Ok(self.registry.len())
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    fn api_for(&self, info: &ResourceInfo, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = &info.api_resource;
        match namespace {
            Some(ns) if info.is_namespaced() => Api::namespaced_with(self.client.clone(), ns, ar),
            _ => Api::all_with(self.client.clone(), ar),
        }
    }

    /// List every item of one kind, following continue tokens
    async fn list_all(
        &self,
        api: &Api<DynamicObject>,
        base_params: &ListParams,
        what: &str,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = with_retry(what, &self.context, || api.list(&params)).await?;

            let items_count = list.items.len();
            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        resource = %what,
                        context = %self.context,
                        page = page_count,
                        items_this_page = items_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(all_items)
    }
}

#[async_trait]
impl ItemSource for ClusterClient {
    async fn list_roots(&self, request: &BackupRequest) -> Result<Vec<ResourceIdentifier>> {
        let selector = request.selector();
        let include_cluster = request.wants_cluster_resources();
        let list_params = build_list_params(selector.label_selector.as_ref());
        let mut roots = Vec::new();

        for info in self.registry.list() {
            let gr = &info.group_resource;
            if !info.is_listable() || !selector.matches_resource(gr) {
                trace!(resource = %gr, "Resource not selected");
                continue;
            }
            if !info.is_namespaced() && !include_cluster {
                trace!(resource = %gr, "Skipping cluster-scoped resource");
                continue;
            }

            let mut ids = Vec::new();
            for scope in list_scopes(info, &request.included_namespaces) {
                let api = self.api_for(info, scope.as_deref());
                let what = gr.to_string();
                let objects = match self.list_all(&api, &list_params, &what).await {
                    Ok(objects) => objects,
                    Err(e) if is_skippable_list_error(&e) => {
                        warn!(
                            resource = %gr,
                            namespace = ?scope,
                            error = %e,
                            "Cannot list resource, skipping"
                        );
                        continue;
                    }
                    Err(e) => {
                        return Err(anyhow!(e)).with_context(|| format!("Failed to list {}", gr));
                    }
                };

                for obj in objects {
                    let Some(name) = obj.metadata.name else {
                        continue;
                    };
                    let namespace = obj.metadata.namespace.unwrap_or_default();
                    if !selector.matches_namespace(&namespace) {
                        continue;
                    }
                    ids.push(ResourceIdentifier::new(gr.clone(), namespace, name));
                }
            }

            ids.sort();
            debug!(resource = %gr, count = ids.len(), "Listed resource");
            roots.extend(ids);
        }

        Ok(roots)
    }

    async fn fetch(&self, id: &ResourceIdentifier) -> Result<Item, FetchError> {
        let info = self.registry.get(&id.group_resource).ok_or_else(|| FetchError::Other {
            id: id.clone(),
            error: anyhow!("resource kind {} is not served by the cluster", id.group_resource),
        })?;

        let namespace = (!id.is_cluster_scoped()).then_some(id.namespace.as_str());
        let api = self.api_for(info, namespace);
        let what = id.to_string();

        let object = with_retry(&what, &self.context, || api.get_opt(&id.name))
            .await
            .map_err(|e| FetchError::Other {
                id: id.clone(),
                error: anyhow!(e),
            })?
            .ok_or_else(|| FetchError::NotFound(id.clone()))?;

        to_item(object, info).map_err(|error| FetchError::Other {
            id: id.clone(),
            error,
        })
    }
}

/// Namespaces to list a kind in; None lists across all namespaces
///
/// A namespaced kind is listed per namespace only when the inclusion list is explicit.
fn list_scopes(info: &ResourceInfo, included_namespaces: &[String]) -> Vec<Option<String>> {
    if !info.is_namespaced()
        || included_namespaces.is_empty()
        || included_namespaces.iter().any(|ns| ns == "*")
    {
        return vec![None];
    }
    included_namespaces.iter().cloned().map(Some).collect()
}

/// Convert an API object into an item, injecting apiVersion and kind
fn to_item(object: DynamicObject, info: &ResourceInfo) -> Result<Item> {
    let mut value = serde_json::to_value(object).context("Failed to serialize object")?;
    let ar = &info.api_resource;
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert(
            "apiVersion".to_string(),
            serde_json::Value::String(ar.api_version.clone()),
        );
        map.insert(
            "kind".to_string(),
            serde_json::Value::String(ar.kind.clone()),
        );
    }
    Ok(Item::new(value))
}

/// Run an API call, retrying transient failures with exponential backoff
async fn with_retry<T, F, Fut>(what: &str, context: &str, mut call: F) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable_error(&e) && attempt + 1 < MAX_RETRIES => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                warn!(
                    resource = %what,
                    context = %context,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(resource = %what, context = %context, error = %e, "API call failed");
                return Err(e);
            }
        }
    }
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        // Network/connection errors are retryable
        kube::Error::HyperError(_) => true,
        // API errors: retry on 429 (rate limit), 503 (unavailable), 504 (timeout)
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}

/// Listing errors that drop one kind from the run instead of failing it
/// (403 forbidden by RBAC, 404/405 kind not actually served)
fn is_skippable_list_error(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if matches!(api_err.code, 403 | 404 | 405))
}

/// Build ListParams, pushing the label selector down to the API server
fn build_list_params(label_selector: Option<&LabelSelector>) -> ListParams {
    let mut params = ListParams::default();

    if let Some(selector) = label_selector.filter(|s| !s.is_empty()) {
        params = params.labels(&selector.to_string());
    }

    trace!(label_selector = ?params.label_selector, "Built ListParams");

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::GroupResource;
    use serde_json::json;

    fn registry() -> ResourceRegistry {
        build_core_registry()
    }

    #[test]
    fn test_list_scopes_cluster_scoped() {
        let registry = registry();
        let pv = registry.resolve("pv").unwrap();
        assert_eq!(list_scopes(pv, &["db".to_string()]), vec![None]);
    }

    #[test]
    fn test_list_scopes_namespaced() {
        let registry = registry();
        let pods = registry.resolve("pods").unwrap();

        assert_eq!(list_scopes(pods, &[]), vec![None]);
        assert_eq!(list_scopes(pods, &["*".to_string()]), vec![None]);
        assert_eq!(
            list_scopes(pods, &["db".to_string(), "web".to_string()]),
            vec![Some("db".to_string()), Some("web".to_string())]
        );
    }

    #[test]
    fn test_to_item_injects_type_meta() {
        let registry = registry();
        let info = registry.resolve("deploy").unwrap();

        let mut object = DynamicObject::new("nginx", &info.api_resource)
            .within("web")
            .data(json!({"spec": {"replicas": 2}}));
        object.types = None;

        let item = to_item(object, info).unwrap();
        let value = item.as_value();
        assert_eq!(value["apiVersion"], "apps/v1");
        assert_eq!(value["kind"], "Deployment");
        assert_eq!(value["metadata"]["name"], "nginx");
        assert_eq!(value["metadata"]["namespace"], "web");
        assert_eq!(value["spec"]["replicas"], 2);
        assert_eq!(item.name(), Some("nginx"));
        assert_eq!(item.namespace(), "web");
    }

    #[test]
    fn test_build_list_params() {
        let params = build_list_params(None);
        assert!(params.label_selector.is_none());

        let empty: LabelSelector = "".parse().unwrap();
        assert!(build_list_params(Some(&empty)).label_selector.is_none());

        let selector: LabelSelector = "app=web,!canary".parse().unwrap();
        let params = build_list_params(Some(&selector));
        assert_eq!(params.label_selector.as_deref(), Some("app=web,!canary"));
    }

    #[test]
    fn test_registry_knows_builtin_action_targets() {
        let registry = registry();
        for gr in [
            GroupResource::core("pods"),
            GroupResource::core("persistentvolumeclaims"),
            GroupResource::core("persistentvolumes"),
        ] {
            assert!(registry.get(&gr).is_some(), "missing {}", gr);
        }
    }
}
