//! The Petfinder client.
//!
//! [`Petfinder`] is the main entry point. Use [`ClientBuilder`] to configure
//! credentials, the base URL and retry behavior.

use crate::{
    auth::{AuthManager, Credential},
    metadata::RequestMetadata,
    normalize::{normalize, Generation, ResourceKind, TabularFrame},
    paginate::{pause, PageLimit, PageSet, Paginator},
    params::{validate_animal_types, AnimalQuery, FilterValue, OrganizationQuery, ParameterViolation},
    response::{BatchEntry, Lookup, RawResponse, ResultEnvelope},
    retry::{retry_transient, RetryStrategy},
    transport::{HttpTransport, Transport},
    Error, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.petfinder.com/v2/";

/// Environment variable read by [`ClientBuilder::credentials_from_env`] for the API key.
pub const KEY_ENV_VAR: &str = "PETFINDER_KEY";

/// Environment variable read by [`ClientBuilder::credentials_from_env`] for the API secret.
pub const SECRET_ENV_VAR: &str = "PETFINDER_SECRET";

/// A Petfinder API client.
///
/// The client is cheap to clone and designed to be reused. Requests are
/// always issued one at a time: paginated and batch operations wait for each
/// response before sending the next request.
///
/// # Examples
///
/// ```no_run
/// use petfinder_client::{AnimalQuery, PageLimit, Petfinder};
///
/// # async fn example() -> Result<(), petfinder_client::Error> {
/// let client = Petfinder::builder()
///     .credentials_from_env()
///     .build()?;
///
/// let query = AnimalQuery::new()
///     .animal_type("cat")
///     .age(["baby", "young"])
///     .location("Seattle, WA")
///     .results_per_page(50);
///
/// let animals = client.animals(&query, PageLimit::Pages(3)).await?;
/// println!("{} cats across {} pages", animals.len(), animals.pages);
///
/// let frame = animals.to_frame();
/// println!("columns: {:?}", frame.columns());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Petfinder {
    inner: Arc<Session>,
}

/// State shared by every call made through one client.
pub(crate) struct Session {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) auth: AuthManager,
    pub(crate) retry_strategy: RetryStrategy,
    pub(crate) request_interval: Duration,
}

impl Session {
    /// Sends an authorized request, retrying transient server failures.
    ///
    /// Returns the successful response and the number of attempts it took;
    /// every other outcome is classified into an [`Error`].
    pub(crate) async fn send(&self, request: RequestMetadata) -> Result<(RawResponse, usize)> {
        retry_transient(&self.retry_strategy, |attempt| {
            let request = request.clone();
            async move {
                let path = request.path.clone();
                tracing::debug!(path = %path, attempt = attempt, "Sending request");

                let response = self.auth.send_authorized(&*self.transport, request).await?;

                if !response.is_success() {
                    let status = response.effective_status();
                    if status.is_client_error() {
                        tracing::error!(
                            status = status.as_u16(),
                            path = %path,
                            response = %response.raw_body,
                            "Client error (4xx)"
                        );
                    } else {
                        tracing::warn!(
                            status = status.as_u16(),
                            path = %path,
                            response = %response.raw_body,
                            "Server error"
                        );
                    }
                    return Err(Error::from_response(&response));
                }

                if response.body.is_null() {
                    return Err(Error::DeserializationFailed {
                        raw_response: response.raw_body.clone(),
                        serde_error: "response body is not a JSON document".to_string(),
                        status: response.status,
                    });
                }

                tracing::info!(
                    status = response.status.as_u16(),
                    path = %path,
                    latency_ms = response.latency.as_millis(),
                    attempt = attempt,
                    "Received response"
                );

                Ok(response)
            }
        })
        .await
    }

    /// Fetches one payload of a known resource kind.
    pub(crate) async fn fetch(
        &self,
        kind: ResourceKind,
        request: RequestMetadata,
    ) -> Result<ResultEnvelope> {
        let (response, attempts) = self.send(request).await?;
        Ok(ResultEnvelope {
            kind,
            status: response.status,
            body: response.body,
            attempts,
            latency: response.latency,
        })
    }
}

/// Breed names per animal type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreedList {
    breeds: Vec<(String, Vec<String>)>,
    raw: Vec<Value>,
}

impl BreedList {
    /// Breed names for one animal type, in server order.
    pub fn get(&self, animal_type: &str) -> Option<&[String]> {
        self.breeds
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(animal_type))
            .map(|(_, names)| names.as_slice())
    }

    /// Every `(animal type, breed names)` pair, in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.breeds
            .iter()
            .map(|(t, names)| (t.as_str(), names.as_slice()))
    }

    /// The untouched payloads, one per requested type.
    pub fn raw(&self) -> &[Value] {
        &self.raw
    }

    /// All breeds as one frame with `name` and `animal_type` columns.
    pub fn to_frame(&self) -> TabularFrame {
        let mut frame = TabularFrame::empty(ResourceKind::BreedList);
        for payload in &self.raw {
            frame.append(normalize(payload, ResourceKind::BreedList));
        }
        frame
    }
}

impl Petfinder {
    /// Creates a new `ClientBuilder`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Obtains a fresh access token now instead of on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the key/secret pair is rejected.
    pub async fn authenticate(&self) -> Result<Credential> {
        self.inner.auth.authenticate(&*self.inner.transport).await
    }

    /// Describes animal types.
    ///
    /// With no types, returns the server's `types` listing as-is. Otherwise
    /// each type is looked up on its own and the results are collected under
    /// a `types` array, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameters`] before any request is sent if a
    /// type is not part of the vocabulary.
    pub async fn animal_types(&self, types: impl Into<FilterValue>) -> Result<Value> {
        let types = types.into();
        if types.is_empty() {
            let (response, _) = self.inner.send(RequestMetadata::get("types")).await?;
            return Ok(response.body);
        }

        let types = validate_animal_types(&types)?;
        let mut described = Vec::with_capacity(types.len());
        for (index, animal_type) in types.iter().enumerate() {
            if index > 0 {
                pause(self.inner.request_interval).await;
            }
            let (response, _) = self
                .inner
                .send(RequestMetadata::get(format!("types/{animal_type}")))
                .await?;
            described.push(response.body.get("type").cloned().unwrap_or(response.body));
        }

        Ok(json!({ "types": described }))
    }

    /// Lists breeds for the given animal types, or for every type when none are given.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(client: petfinder_client::Petfinder) -> Result<(), petfinder_client::Error> {
    /// let breeds = client.breeds(["dog", "cat"]).await?;
    /// for name in breeds.get("cat").unwrap_or_default() {
    ///     println!("{name}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn breeds(&self, types: impl Into<FilterValue>) -> Result<BreedList> {
        let types = validate_animal_types(&types.into())?;
        let mut list = BreedList::default();

        for (index, animal_type) in types.into_iter().enumerate() {
            if index > 0 {
                pause(self.inner.request_interval).await;
            }
            let envelope = self
                .inner
                .fetch(
                    ResourceKind::BreedList,
                    RequestMetadata::get(format!("types/{animal_type}/breeds")),
                )
                .await?;

            let names = envelope
                .records()
                .iter()
                .filter_map(breed_name)
                .collect();
            list.breeds.push((animal_type, names));
            list.raw.push(envelope.body);
        }

        Ok(list)
    }

    /// Like [`breeds`](Self::breeds), flattened into a frame.
    pub async fn breeds_frame(&self, types: impl Into<FilterValue>) -> Result<TabularFrame> {
        Ok(self.breeds(types).await?.to_frame())
    }

    /// Searches animals, walking up to `limit` pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameters`] before any request is sent if the
    /// query is invalid. A rate limit hit after the first page is not an
    /// error; see [`PageSet::interrupted`].
    pub async fn animals(&self, query: &AnimalQuery, limit: PageLimit) -> Result<PageSet> {
        let request = RequestMetadata::get("animals").with_query_params(query.build()?);
        Paginator::new(&self.inner, ResourceKind::AnimalCollection, request)
            .fetch_all(limit)
            .await
    }

    /// Searches organizations, walking up to `limit` pages.
    pub async fn organizations(
        &self,
        query: &OrganizationQuery,
        limit: PageLimit,
    ) -> Result<PageSet> {
        let request = RequestMetadata::get("organizations").with_query_params(query.build()?);
        Paginator::new(&self.inner, ResourceKind::OrganizationCollection, request)
            .fetch_all(limit)
            .await
    }

    /// Fetches one animal by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if the id is unknown.
    pub async fn animal(&self, id: &str) -> Result<Value> {
        self.single(ResourceKind::Animal, "animals", id).await
    }

    /// Fetches one organization by id.
    pub async fn organization(&self, id: &str) -> Result<Value> {
        self.single(ResourceKind::Organization, "organizations", id).await
    }

    /// Looks up several animals, one request per id.
    ///
    /// Unknown ids do not fail the batch: their entries carry
    /// [`Lookup::NotFound`] and status 404. Any other failure aborts it.
    pub async fn animals_by_id<I, S>(&self, ids: I) -> Result<Vec<BatchEntry>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batch(ResourceKind::Animal, "animals", ids).await
    }

    /// Looks up several organizations, one request per id.
    pub async fn organizations_by_id<I, S>(&self, ids: I) -> Result<Vec<BatchEntry>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batch(ResourceKind::Organization, "organizations", ids)
            .await
    }

    async fn single(&self, kind: ResourceKind, collection: &str, id: &str) -> Result<Value> {
        if let Some(violation) = id_violation(id) {
            return Err(Error::InvalidParameters {
                violations: vec![violation],
            });
        }
        let envelope = self
            .inner
            .fetch(kind, RequestMetadata::get(format!("{collection}/{id}")))
            .await?;

        envelope
            .records()
            .into_iter()
            .next()
            .ok_or_else(|| Error::ResourceNotFound {
                message: format!("No record in response for id {id}"),
            })
    }

    async fn batch<I, S>(&self, kind: ResourceKind, collection: &str, ids: I) -> Result<Vec<BatchEntry>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let violations: Vec<ParameterViolation> =
            ids.iter().filter_map(|id| id_violation(id)).collect();
        if !violations.is_empty() {
            return Err(Error::InvalidParameters { violations });
        }

        let mut entries = Vec::with_capacity(ids.len());
        for (index, id) in ids.into_iter().enumerate() {
            if index > 0 {
                pause(self.inner.request_interval).await;
            }

            let request = RequestMetadata::get(format!("{collection}/{id}"));
            let entry = match self.inner.fetch(kind, request).await {
                Ok(envelope) => match envelope.records().into_iter().next() {
                    Some(record) => BatchEntry {
                        id,
                        status: envelope.status,
                        generation: Generation::of(&envelope.body),
                        lookup: Lookup::Found(record),
                    },
                    None => not_found(id),
                },
                Err(Error::ResourceNotFound { message }) => {
                    tracing::info!(id = %id, message = %message, "Record not found, continuing batch");
                    not_found(id)
                }
                Err(e) => return Err(e),
            };
            entries.push(entry);
        }

        Ok(entries)
    }
}

fn not_found(id: String) -> BatchEntry {
    BatchEntry {
        id,
        status: StatusCode::NOT_FOUND,
        generation: Generation::Current,
        lookup: Lookup::NotFound,
    }
}

/// Ids are inserted into the request path, so they must be a single segment.
fn id_violation(id: &str) -> Option<ParameterViolation> {
    let message = if id.trim().is_empty() {
        "must not be empty"
    } else if id.contains(['/', '?', '#']) {
        "must not contain '/', '?' or '#'"
    } else {
        return None;
    };
    Some(ParameterViolation::new("id", format!("{id:?} {message}")))
}

fn breed_name(record: &Value) -> Option<String> {
    let name = record
        .get("name")
        .or_else(|| record.get("$t"))
        .unwrap_or(record);
    name.as_str().map(str::to_string)
}

/// Builder for configuring and creating a [`Petfinder`] client.
///
/// # Examples
///
/// ```no_run
/// use petfinder_client::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), petfinder_client::Error> {
/// let client = ClientBuilder::new()
///     .credentials("my-key", "my-secret")
///     .timeout(Duration::from_secs(30))
///     .request_interval(Duration::from_millis(250))
///     .retry_strategy(RetryStrategy::Linear {
///         delay: Duration::from_secs(1),
///         max_retries: 2,
///     })
///     .default_header("User-Agent", "shelter-sync/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    key: Option<String>,
    secret: Option<String>,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    timeout: Option<Duration>,
    request_interval: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            key: None,
            secret: None,
            default_headers: HeaderMap::new(),
            retry_strategy: RetryStrategy::default(),
            timeout: None,
            request_interval: Duration::ZERO,
            transport: None,
        }
    }

    /// Sets the API root. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the API key and secret.
    pub fn credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.secret = Some(secret.into());
        self
    }

    /// Reads the key and secret from `PETFINDER_KEY` and `PETFINDER_SECRET`.
    ///
    /// Variables that are unset leave the corresponding setting untouched.
    pub fn credentials_from_env(mut self) -> Self {
        if let Ok(key) = std::env::var(KEY_ENV_VAR) {
            self.key = Some(key);
        }
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            self.secret = Some(secret);
        }
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the pause between attempts at a failing request.
    ///
    /// A failing request is always attempted up to
    /// [`MAX_ATTEMPTS`](crate::retry::MAX_ATTEMPTS) times; the strategy only
    /// sets the delays, and a strategy that runs out retries immediately.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a pause between consecutive requests of one paginated or batch call.
    pub fn request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Replaces the HTTP transport.
    ///
    /// The base URL, timeout and default headers only apply to the built-in
    /// transport and are ignored when one is supplied here.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the configured client.
    ///
    /// No request is made; the first call authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the key or secret is missing.
    pub fn build(self) -> Result<Petfinder> {
        let (key, secret) = match (self.key, self.secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => (key, secret),
            _ => {
                return Err(Error::ConfigurationError(format!(
                    "API key and secret are required (set them with credentials() or {KEY_ENV_VAR}/{SECRET_ENV_VAR})"
                )))
            }
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = match self.base_url {
                    Some(url) => url,
                    None => Url::parse(DEFAULT_BASE_URL)?,
                };
                Arc::new(HttpTransport::new(
                    base_url,
                    self.default_headers,
                    self.timeout,
                )?)
            }
        };

        Ok(Petfinder {
            inner: Arc::new(Session {
                transport,
                auth: AuthManager::new(key, secret),
                retry_strategy: self.retry_strategy,
                request_interval: self.request_interval,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
