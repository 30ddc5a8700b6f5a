//! API client built on the batch executor
//!
//! An [`Endpoint`] sends one request per `execute` call, or fans out into a
//! batch when given ids (PATCH/DELETE) or files (POST).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::api::transport::Transport;
use crate::api::types::{ApiError, ApiOutput, ApiRequest, FormData, Method, Query, RequestBody};
use crate::api::url::{build_path, strip_api_prefix};
use crate::batch::{BatchConfig, BatchExecutionError, BatchExecutor, ProgressCallback, ProgressSnapshot};
use crate::config::ClientConfig;

/// Progress snapshot of a batch of API calls
pub type ApiProgress = ProgressSnapshot<Value, ApiError>;

/// Handler invoked with an endpoint error and its configured context
pub type ErrorHandler = Arc<dyn Fn(&ApiError, Option<&str>) + Send + Sync>;

/// Per-endpoint options
#[derive(Clone, Default)]
pub struct ApiOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub query: Option<Query>,
    pub headers: HashMap<String, String>,
    /// Label passed to the error handler or logged with the error
    pub error_context: Option<String>,
    /// Send ids/files calls as a single request instead of a batch
    pub disable_batch: bool,
    pub batch_size: Option<usize>,
    pub concurrent: Option<usize>,
    /// Per-request deadline; an expired request fails like any other
    pub timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback<Value, ApiError>>,
    pub on_error: Option<ErrorHandler>,
}

impl ApiOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_error_context(mut self, context: impl Into<String>) -> Self {
        self.error_context = Some(context.into());
        self
    }

    pub fn disable_batch(mut self) -> Self {
        self.disable_batch = true;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_concurrent(mut self, limit: usize) -> Self {
        self.concurrent = Some(limit);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ApiProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ApiError, Option<&str>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for ApiOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiOptions")
            .field("method", &self.method)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("error_context", &self.error_context)
            .field("disable_batch", &self.disable_batch)
            .field("batch_size", &self.batch_size)
            .field("concurrent", &self.concurrent)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Per-call options; batch settings here override the endpoint's
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub body: Option<Value>,
    pub id: Option<String>,
    pub ids: Vec<String>,
    pub files: Vec<FormData>,
    pub query: Option<Query>,
    pub batch_size: Option<usize>,
    pub concurrent: Option<usize>,
    pub on_progress: Option<ProgressCallback<Value, ApiError>>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_id(mut self, id: impl fmt::Display) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        self.ids = ids.into_iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_files(mut self, files: Vec<FormData>) -> Self {
        self.files = files;
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_concurrent(mut self, limit: usize) -> Self {
        self.concurrent = Some(limit);
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ApiProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("body", &self.body)
            .field("id", &self.id)
            .field("ids", &self.ids)
            .field("files", &self.files.len())
            .field("query", &self.query)
            .field("batch_size", &self.batch_size)
            .field("concurrent", &self.concurrent)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Observable state of an endpoint after its latest execution
#[derive(Debug, Clone, Default)]
pub struct EndpointState {
    /// Output of the last successful execution
    pub data: Option<ApiOutput>,
    /// Error of the last execution, cleared when a new one starts
    pub error: Option<ApiError>,
    pub pending: bool,
}

/// Entry point binding a configuration to a transport
pub struct ApiClient<Tr> {
    config: Arc<ClientConfig>,
    transport: Arc<Tr>,
}

impl<Tr> Clone for ApiClient<Tr> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<Tr: Transport> ApiClient<Tr> {
    pub fn new(config: ClientConfig, transport: Tr) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Endpoint for `path`; a leading `api/` segment is dropped since the
    /// configured prefix replaces it
    pub fn endpoint(&self, path: impl Into<String>, options: ApiOptions) -> Endpoint<Tr> {
        Endpoint {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            path: path.into(),
            options,
            state: RwLock::new(EndpointState::default()),
        }
    }
}

/// A path plus options, executed any number of times
pub struct Endpoint<Tr> {
    config: Arc<ClientConfig>,
    transport: Arc<Tr>,
    path: String,
    options: ApiOptions,
    state: RwLock<EndpointState>,
}

impl<Tr: Transport> Endpoint<Tr> {
    pub fn options(&self) -> &ApiOptions {
        &self.options
    }

    pub fn state(&self) -> EndpointState {
        self.state.read().clone()
    }

    pub fn data(&self) -> Option<ApiOutput> {
        self.state.read().data.clone()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.state.read().error.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.read().pending
    }

    /// Whether `opts` makes this call a batch: ids with PATCH/DELETE or
    /// files with POST, unless batching is disabled on the endpoint
    pub fn is_batch_operation(&self, opts: &ExecuteOptions) -> bool {
        let method = self.options.method;
        !self.options.disable_batch
            && ((!opts.ids.is_empty() && method.accepts_id_batch())
                || (!opts.files.is_empty() && method.accepts_file_batch()))
    }

    /// Execute the endpoint.
    ///
    /// A batch returns [`ApiOutput::Batch`] in id/file order, or the first
    /// failing request's error. The errors and timings of every request in
    /// the batch are only available through the progress callback.
    #[instrument(skip_all, fields(path = %self.path, method = %self.options.method))]
    pub async fn execute(&self, opts: ExecuteOptions) -> Result<ApiOutput, ApiError> {
        {
            let mut state = self.state.write();
            state.pending = true;
            state.error = None;
        }

        let result = self.dispatch(opts).await;

        {
            let mut state = self.state.write();
            state.pending = false;
            match &result {
                Ok(output) => state.data = Some(output.clone()),
                Err(err) => state.error = Some(err.clone()),
            }
        }

        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn dispatch(&self, opts: ExecuteOptions) -> Result<ApiOutput, ApiError> {
        let base_path = strip_api_prefix(&self.path).to_string();
        let body = opts.body.clone().or_else(|| self.options.body.clone());
        let query = opts
            .query
            .clone()
            .or_else(|| self.options.query.clone())
            .unwrap_or_default();

        if self.is_batch_operation(&opts) {
            let executor = BatchExecutor::from_config(self.batch_config(&opts));

            let values = if !opts.ids.is_empty() {
                debug!(count = opts.ids.len(), "Dispatching id batch");
                executor
                    .run(opts.ids, |id, _| {
                        let path = build_path(&[base_path.as_str(), id.as_str()]);
                        let request = self.request(path, body.clone().map(RequestBody::Json), &query);
                        self.perform(request)
                    })
                    .await
            } else {
                debug!(count = opts.files.len(), "Dispatching file batch");
                executor
                    .run(opts.files, |form, _| {
                        let request = self.request(base_path.clone(), Some(RequestBody::Form(form)), &query);
                        self.perform(request)
                    })
                    .await
            };

            return values.map(ApiOutput::Batch).map_err(first_item_error);
        }

        let path = match &opts.id {
            Some(id) => build_path(&[base_path.as_str(), id.as_str()]),
            None => base_path,
        };
        let request = self.request(path, body.map(RequestBody::Json), &query);
        self.perform(request).await.map(ApiOutput::Single)
    }

    async fn perform(&self, request: ApiRequest) -> Result<Value, ApiError> {
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.perform(request))
                .await
                .unwrap_or_else(|_| Err(ApiError::timeout(limit))),
            None => self.transport.perform(request).await,
        }
    }

    fn batch_config(&self, opts: &ExecuteOptions) -> BatchConfig<Value, ApiError> {
        let defaults = &self.config.batch;
        let chunk_size = opts.batch_size.or(self.options.batch_size).or(defaults.batch_size);
        let concurrent = opts.concurrent.or(self.options.concurrent).or(defaults.concurrent);

        BatchConfig {
            chunk_size: chunk_size.filter(|s| *s > 0),
            concurrency_limit: concurrent.filter(|c| *c > 0),
            on_progress: opts.on_progress.clone().or_else(|| self.options.on_progress.clone()),
        }
    }

    fn request(&self, path: String, body: Option<RequestBody>, query: &Query) -> ApiRequest {
        let mut headers = self.config.default_headers.clone();
        headers.extend(self.options.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        ApiRequest {
            method: self.options.method,
            base_url: self.config.base_url(),
            path,
            body,
            headers,
            query: query.clone(),
        }
    }

    fn report(&self, err: &ApiError) {
        let context = self.options.error_context.as_deref();
        match &self.options.on_error {
            Some(handler) => handler(err, context),
            None => error!(
                message = %err.message,
                status = ?err.status,
                context = ?context,
                "API request failed"
            ),
        }
    }
}

fn first_item_error(err: BatchExecutionError<ApiError>) -> ApiError {
    err.into_error().unwrap_or_else(|shared| (*shared).clone())
}
