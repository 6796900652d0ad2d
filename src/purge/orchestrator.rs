//! Purge orchestrator.
//!
//! Multi-backend purges fan out one tokio task per backend. Tasks are
//! independent: a failing, panicking or slow backend only affects its own
//! field. Results are recorded in [`Scope::CONCRETE`] order once every task
//! has finished.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{error, info, warn};

use super::response::SUCCESS_MARKER;
use super::{ActionRouter, Field, Operation, PurgeError, PurgeRequest, Response, ResponseBuilder, Scope};
use crate::backends::{BackendError, BackendRegistry, BackendResult};
use crate::permissions::Caller;

/// Executes purge operations against the backend registry.
#[derive(Debug, Clone)]
pub struct Purger {
    backends: BackendRegistry,
    timeout: Option<Duration>,
}

impl Purger {
    pub fn new(backends: BackendRegistry) -> Self {
        Self {
            backends,
            timeout: None,
        }
    }

    /// Bound every backend call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route and execute a request.
    ///
    /// Routing failures are returned as errors so the transport can map
    /// them; every other outcome is a [`Response`].
    pub async fn dispatch(
        &self,
        router: &ActionRouter,
        request: &PurgeRequest,
        caller: &Caller,
    ) -> Result<Response, PurgeError> {
        let operation = router.route(&request.action, caller)?;
        info!("{} requested {}", caller.label, request.action);
        Ok(self.execute(operation, request).await)
    }

    pub async fn execute(&self, operation: Operation, request: &PurgeRequest) -> Response {
        match operation {
            Operation::PurgeByScope => self.purge_by_scope(request.scope()).await,
            Operation::UpdateCdnSettings => self.update_cdn_settings().await,
            Operation::UpdateCdnDevMode => self.update_cdn_dev_mode().await,
            Operation::PurgeSingle(scope) => self.purge_single(scope).await,
        }
    }

    /// Purge every backend covered by `requested`.
    ///
    /// An invalid or missing scope fails before any backend is touched.
    /// Otherwise the envelope is a success and each invoked backend has a
    /// field holding the success marker or its error detail.
    pub async fn purge_by_scope(&self, requested: Option<&str>) -> Response {
        let requested = match Scope::parse_requested(requested) {
            Ok(scope) => scope,
            Err(e) => {
                warn!("Rejected purge scope {:?}", requested);
                return Response::failure(&e);
            }
        };

        info!("Purging scope {}", requested);

        let tasks: Vec<_> = Scope::CONCRETE
            .into_iter()
            .filter(|scope| requested.covers(*scope))
            .filter_map(|scope| self.purge_task(scope).map(|task| (scope, spawn_isolated(task))))
            .collect();

        let mut builder = ResponseBuilder::new();
        for (scope, task) in tasks {
            let outcome = task.await;

            match &outcome {
                Ok(()) => info!("Purged {}", scope),
                Err(e) => warn!("Purge of {} failed: {}", scope, e),
            }
            builder.record_outcome(scope.field(), &outcome);
        }

        builder.finalize()
    }

    /// Refresh CDN settings, recording the zone id.
    pub async fn update_cdn_settings(&self) -> Response {
        let cdn = Arc::clone(&self.backends.cdn);
        let task = bounded(self.timeout, async move { cdn.update_settings().await }).boxed();
        let outcome = spawn_isolated(task).await;
        single_response(Field::Zone, outcome)
    }

    /// Apply the CDN development mode, recording the resulting state.
    pub async fn update_cdn_dev_mode(&self) -> Response {
        let cdn = Arc::clone(&self.backends.cdn);
        let task = bounded(self.timeout, async move { cdn.update_dev_mode().await }).boxed();
        let outcome = spawn_isolated(task).await;
        single_response(Field::DevMode, outcome)
    }

    /// Purge one concrete backend. Its failure fails the response.
    pub async fn purge_single(&self, scope: Scope) -> Response {
        let Some(task) = self.purge_task(scope) else {
            return Response::failure(&PurgeError::InvalidScope);
        };

        let outcome = spawn_isolated(task).await.map(|()| SUCCESS_MARKER);
        single_response(scope.field(), outcome)
    }

    /// Purge future for a concrete scope; `None` for `All`.
    fn purge_task(&self, scope: Scope) -> Option<BoxFuture<'static, BackendResult<()>>> {
        let task = match scope {
            Scope::All => return None,
            Scope::Bytecode => {
                let backend = Arc::clone(&self.backends.bytecode);
                async move { backend.purge_cache().await }.boxed()
            }
            Scope::WebServer => {
                let backend = Arc::clone(&self.backends.web_server);
                async move {
                    // A failed refresh still lets the purge decide the outcome
                    if let Err(e) = backend.update_settings().await {
                        warn!("Web server settings refresh failed: {}", e);
                    }
                    backend.purge_cache().await
                }
                .boxed()
            }
            Scope::Object => {
                let backend = Arc::clone(&self.backends.object);
                async move { backend.purge_cache().await }.boxed()
            }
            Scope::Cdn => {
                let backend = Arc::clone(&self.backends.cdn);
                async move { backend.purge_cache().await }.boxed()
            }
        };

        Some(bounded(self.timeout, task).boxed())
    }
}

/// Run a backend call on its own task so a panic becomes `Aborted`.
///
/// The task starts immediately; the returned future only joins it.
fn spawn_isolated<T>(task: BoxFuture<'static, BackendResult<T>>) -> impl Future<Output = BackendResult<T>>
where
    T: Send + 'static,
{
    let handle = tokio::spawn(task);
    async move {
        handle
            .await
            .unwrap_or_else(|e| Err(BackendError::Aborted(e.to_string())))
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, task: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .unwrap_or(Err(BackendError::TimedOut(limit))),
        None => task.await,
    }
}

fn single_response<T: Into<Value>>(field: Field, outcome: BackendResult<T>) -> Response {
    let mut builder = ResponseBuilder::new();
    match outcome {
        Ok(value) => {
            info!("{} updated", field);
            builder.record(field, value);
        }
        Err(e) => {
            let e = PurgeError::FatalBackend(e);
            error!("{} failed: {}", field, e);
            builder.fail(e.to_string());
        }
    }
    builder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::backends::{CdnCache, PurgeCache, WebServerCache};
    use crate::permissions::Capability;

    type EventLog = Arc<Mutex<Vec<String>>>;

    /// Mock backend counting calls and logging them in order.
    struct MockBackend {
        name: &'static str,
        events: EventLog,
        purge_calls: AtomicUsize,
        settings_calls: AtomicUsize,
        dev_mode_calls: AtomicUsize,
        purge_error: Mutex<Option<String>>,
        settings_error: Mutex<Option<String>>,
        purge_delay: Mutex<Option<Duration>>,
        panic_on_purge: Mutex<bool>,
    }

    impl MockBackend {
        fn new(name: &'static str, events: EventLog) -> Arc<Self> {
            Arc::new(Self {
                name,
                events,
                purge_calls: AtomicUsize::new(0),
                settings_calls: AtomicUsize::new(0),
                dev_mode_calls: AtomicUsize::new(0),
                purge_error: Mutex::new(None),
                settings_error: Mutex::new(None),
                purge_delay: Mutex::new(None),
                panic_on_purge: Mutex::new(false),
            })
        }

        fn fail_purge(&self, detail: &str) {
            *self.purge_error.lock() = Some(detail.to_string());
        }

        fn fail_settings(&self, detail: &str) {
            *self.settings_error.lock() = Some(detail.to_string());
        }

        fn log(&self, event: &str) {
            self.events.lock().push(format!("{}:{}", self.name, event));
        }

        fn purges(&self) -> usize {
            self.purge_calls.load(Ordering::SeqCst)
        }

        fn calls(&self) -> usize {
            self.purges()
                + self.settings_calls.load(Ordering::SeqCst)
                + self.dev_mode_calls.load(Ordering::SeqCst)
        }

        fn settings_result(&self) -> BackendResult<()> {
            match self.settings_error.lock().clone() {
                Some(detail) => Err(BackendError::failed(detail)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl PurgeCache for MockBackend {
        async fn purge_cache(&self) -> BackendResult<()> {
            self.purge_calls.fetch_add(1, Ordering::SeqCst);
            self.log("purge_cache");

            let delay = *self.purge_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *self.panic_on_purge.lock() {
                panic!("{} driver crashed", self.name);
            }

            match self.purge_error.lock().clone() {
                Some(detail) => Err(BackendError::failed(detail)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl WebServerCache for MockBackend {
        async fn update_settings(&self) -> BackendResult<()> {
            self.settings_calls.fetch_add(1, Ordering::SeqCst);
            // Yield so a missing await on the pre-step would reorder events
            tokio::task::yield_now().await;
            self.log("update_settings");
            self.settings_result()
        }
    }

    #[async_trait]
    impl CdnCache for MockBackend {
        async fn update_settings(&self) -> BackendResult<String> {
            self.settings_calls.fetch_add(1, Ordering::SeqCst);
            self.log("update_settings");
            self.settings_result().map(|()| "zone-123".to_string())
        }

        async fn update_dev_mode(&self) -> BackendResult<String> {
            self.dev_mode_calls.fetch_add(1, Ordering::SeqCst);
            self.log("update_dev_mode");
            self.settings_result().map(|()| "on".to_string())
        }
    }

    struct Fixture {
        bytecode: Arc<MockBackend>,
        web_server: Arc<MockBackend>,
        object: Arc<MockBackend>,
        cdn: Arc<MockBackend>,
        events: EventLog,
    }

    impl Fixture {
        fn new() -> Self {
            let events: EventLog = Arc::default();
            Self {
                bytecode: MockBackend::new("opcache", events.clone()),
                web_server: MockBackend::new("nginx", events.clone()),
                object: MockBackend::new("object", events.clone()),
                cdn: MockBackend::new("cloudflare", events.clone()),
                events,
            }
        }

        fn purger(&self) -> Purger {
            Purger::new(BackendRegistry::new(
                self.bytecode.clone(),
                self.web_server.clone(),
                self.object.clone(),
                self.cdn.clone(),
            ))
        }

        fn mocks(&self) -> [&Arc<MockBackend>; 4] {
            [&self.bytecode, &self.web_server, &self.object, &self.cdn]
        }

        fn total_calls(&self) -> usize {
            self.mocks().iter().map(|m| m.calls()).sum()
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    fn fields(response: &Response) -> Vec<&'static str> {
        response.data.fields().map(|f| f.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unknown_action_touches_no_backend() {
        let fixture = Fixture::new();
        let router = ActionRouter::new("clear_caches");
        let admin = Caller::admin("test");

        for action in ["purge", "clear_caches_purge_everything", "CLEAR_CACHES_PURGE_THEM_ALL"] {
            let request = PurgeRequest::new(action, Some("all"));
            let result = fixture.purger().dispatch(&router, &request, &admin).await;
            assert!(matches!(result, Err(PurgeError::UnknownAction(_))));
        }

        assert_eq!(fixture.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_forbidden_caller_touches_no_backend() {
        let fixture = Fixture::new();
        let router = ActionRouter::new("clear_caches");
        let viewer = Caller::new("viewer", vec![Capability::Read]);

        let request = PurgeRequest::new("clear_caches_purge_them_all", Some("all"));
        let result = fixture.purger().dispatch(&router, &request, &viewer).await;

        assert!(matches!(result, Err(PurgeError::Forbidden { .. })));
        assert_eq!(fixture.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_scope_touches_no_backend() {
        let fixture = Fixture::new();
        let purger = fixture.purger();

        for scope in [None, Some(""), Some("redis"), Some("All"), Some("zone")] {
            let response = purger.purge_by_scope(scope).await;
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some("Scope argument missing or incorrect."));
            assert!(response.data.is_empty());
        }

        assert_eq!(fixture.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_scope_all_purges_each_backend_once() {
        let fixture = Fixture::new();
        fixture.bytecode.fail_purge("Opcache is disabled");
        fixture.cdn.fail_purge("Invalid zone");

        let response = fixture.purger().purge_by_scope(Some("all")).await;

        assert!(response.success);
        assert_eq!(fields(&response), vec!["opcache", "nginx", "object", "cloudflare"]);
        for mock in fixture.mocks() {
            assert_eq!(mock.purges(), 1, "{} purge count", mock.name);
        }
    }

    #[tokio::test]
    async fn test_single_scope_purges_only_its_backend() {
        let fixture = Fixture::new();

        let response = fixture.purger().purge_by_scope(Some("opcache")).await;

        assert!(response.success);
        assert_eq!(fields(&response), vec!["opcache"]);
        assert_eq!(response.field(Field::Opcache), Some(&json!(1)));
        assert_eq!(fixture.bytecode.purges(), 1);
        assert_eq!(fixture.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_isolated() {
        let fixture = Fixture::new();
        fixture.web_server.fail_purge("Permission denied");

        let response = fixture.purger().purge_by_scope(Some("all")).await;

        assert!(response.success);
        assert!(response.error.is_none());
        assert_eq!(response.field(Field::Nginx), Some(&json!("Permission denied")));
        assert_eq!(response.field(Field::Object), Some(&json!(1)));
        assert_eq!(fixture.object.purges(), 1);
        assert_eq!(fixture.cdn.purges(), 1);
    }

    #[tokio::test]
    async fn test_every_backend_failing_keeps_envelope_success() {
        let fixture = Fixture::new();
        for mock in fixture.mocks() {
            mock.fail_purge("down");
        }

        let response = fixture.purger().purge_by_scope(Some("all")).await;

        assert!(response.success);
        assert_eq!(response.data.len(), 4);
        assert!(fixture.mocks().iter().all(|m| m.purges() == 1));
    }

    #[tokio::test]
    async fn test_cdn_settings_failure_is_fatal() {
        let fixture = Fixture::new();
        fixture.cdn.fail_settings("Invalid API token");

        let response = fixture.purger().update_cdn_settings().await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Invalid API token"));
        assert!(!response.data.contains(Field::Zone));
    }

    #[tokio::test]
    async fn test_cdn_settings_and_dev_mode_record_values() {
        let fixture = Fixture::new();
        let purger = fixture.purger();

        let response = purger.update_cdn_settings().await;
        assert!(response.success);
        assert_eq!(response.field(Field::Zone), Some(&json!("zone-123")));

        let response = purger.update_cdn_dev_mode().await;
        assert!(response.success);
        assert_eq!(response.field(Field::DevMode), Some(&json!("on")));
        assert_eq!(fixture.cdn.purges(), 0);
    }

    #[tokio::test]
    async fn test_direct_cdn_purge_failure_is_fatal() {
        let fixture = Fixture::new();
        let router = ActionRouter::new("clear_caches");
        let request = PurgeRequest::new("clear_caches_cloudflare_purge", None);
        let admin = Caller::admin("test");

        let response = fixture.purger().dispatch(&router, &request, &admin).await.unwrap();
        assert!(response.success);
        assert_eq!(fields(&response), vec!["cloudflare"]);

        fixture.cdn.fail_purge("Rate limited");
        let response = fixture.purger().dispatch(&router, &request, &admin).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Rate limited"));
        assert!(response.data.is_empty());
        assert_eq!(fixture.cdn.purges(), 2);
        assert_eq!(fixture.bytecode.purges(), 0);
    }

    #[tokio::test]
    async fn test_purge_all_has_no_cross_call_state() {
        let fixture = Fixture::new();
        let purger = fixture.purger();

        let first = purger.purge_by_scope(Some("all")).await;
        let second = purger.purge_by_scope(Some("all")).await;

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            json!({ "success": true, "data": { "opcache": 1, "nginx": 1, "object": 1, "cloudflare": 1 } })
        );
    }

    #[tokio::test]
    async fn test_web_server_settings_refresh_precedes_purge() {
        let fixture = Fixture::new();
        fixture.web_server.fail_settings("cache path missing");

        let response = fixture.purger().purge_by_scope(Some("nginx")).await;

        let nginx_events: Vec<_> = fixture
            .events()
            .into_iter()
            .filter(|e| e.starts_with("nginx:"))
            .collect();
        assert_eq!(nginx_events, vec!["nginx:update_settings", "nginx:purge_cache"]);
        // The purge result decides the field, not the refresh
        assert_eq!(response.field(Field::Nginx), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_alone() {
        let fixture = Fixture::new();
        *fixture.object.purge_delay.lock() = Some(Duration::from_secs(5));

        let purger = fixture.purger().with_timeout(Some(Duration::from_millis(50)));
        let response = purger.purge_by_scope(Some("all")).await;

        assert!(response.success);
        assert_eq!(response.field(Field::Object), Some(&json!("timed out after 50ms")));
        assert_eq!(response.field(Field::Opcache), Some(&json!(1)));
        assert_eq!(response.field(Field::Cloudflare), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_panicking_backend_is_isolated() {
        let fixture = Fixture::new();
        *fixture.bytecode.panic_on_purge.lock() = true;

        let response = fixture.purger().purge_by_scope(Some("all")).await;

        assert!(response.success);
        let detail = response.field(Field::Opcache).and_then(|v| v.as_str()).unwrap();
        assert!(detail.starts_with("backend task aborted"));
        assert_eq!(response.field(Field::Nginx), Some(&json!(1)));
        assert_eq!(fixture.object.purges(), 1);
    }

    #[tokio::test]
    async fn test_panicking_single_backend_fails_response() {
        let fixture = Fixture::new();
        *fixture.cdn.panic_on_purge.lock() = true;

        let response = fixture.purger().purge_single(Scope::Cdn).await;

        assert!(!response.success);
        assert!(response.error.as_deref().unwrap().starts_with("backend task aborted"));
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn test_non_string_scope_is_invalid() {
        let fixture = Fixture::new();
        let purger = fixture.purger();

        for scope in [json!(5), json!(true), json!(["all"]), json!({ "scope": "all" }), Value::Null] {
            let request = PurgeRequest {
                action: "clear_caches_purge_them_all".to_string(),
                scope: Some(scope),
            };
            let response = purger.execute(Operation::PurgeByScope, &request).await;
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some("Scope argument missing or incorrect."));
        }

        assert_eq!(fixture.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_purge_single_rejects_meta_scope() {
        let fixture = Fixture::new();
        let response = fixture.purger().purge_single(Scope::All).await;

        assert!(!response.success);
        assert_eq!(fixture.total_calls(), 0);
    }
}
