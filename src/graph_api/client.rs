use crate::graph_api::config::GraphApiConfig;
use crate::graph_api::paginator::Paginator;
use crate::graph_api::transport::{redact, Args, RequestBody, Transport};
use crate::graph_api::types::{ApiResponse, GraphError, Page, TransportError};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use url::Url;

/// Boundary marker used for photo uploads
const MULTIPART_BOUNDARY: &str = "----------ThIs_Is_tHe_bouNdaRY_$";

/// HTTP client for the Graph API
///
/// Holds an optional access token that is injected into every request. All
/// fields are immutable after construction, so a client can be cloned and
/// shared freely.
#[derive(Clone)]
pub struct GraphClient {
    /// Access token sent with every request, if any
    access_token: Option<String>,
    /// Hosts, timeout and page bound
    config: GraphApiConfig,
    /// HTTP transport
    transport: Transport,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("config", &self.config)
            .finish()
    }
}

/// A photo to upload with [`GraphClient::put_photo`]
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub data: Vec<u8>,
    /// Defaults to `source.jpg`
    pub filename: Option<String>,
}

impl Photo {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// A legacy FQL query
#[derive(Debug, Clone, PartialEq)]
pub enum FqlQuery {
    /// One query, sent to `fql.query`
    Single(String),
    /// Named queries, sent JSON-encoded to `fql.multiquery`
    Multi(Args),
}

impl GraphClient {
    /// Create a client that authenticates with `access_token`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use graph_api_sdk::GraphClient;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = GraphClient::new("user_access_token");
    /// let me = client.get_object("me", Default::default()).await?;
    /// println!("{:?}", me);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_config(Some(access_token.into()), GraphApiConfig::default())
    }

    /// Create a client without an access token (public data, OAuth exchanges)
    pub fn anonymous() -> Self {
        Self::with_config(None, GraphApiConfig::default())
    }

    /// Create a client with explicit configuration
    pub fn with_config(access_token: Option<String>, config: GraphApiConfig) -> Self {
        tracing::debug!(
            "Creating GraphClient with base URL: {} (authenticated: {})",
            config.graph_url,
            access_token.is_some()
        );

        Self {
            access_token,
            config,
            transport: Transport::new(),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn config(&self) -> &GraphApiConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Fetch a path and return its value together with the next-page link
    ///
    /// The access token goes into `post_args` when present (the request is a
    /// POST), otherwise into the query string. Never both.
    ///
    /// # Arguments
    ///
    /// * `path` - Object id or path relative to the Graph API host, e.g. `me/friends`
    /// * `args` - Query string arguments
    /// * `post_args` - Form arguments; when `Some`, the request is a POST
    ///
    /// # Returns
    ///
    /// Returns `Ok(Page)` holding the `data` field of a listing (or the whole
    /// body for a bare object) and the `paging.next` link if any, or
    /// `Err(GraphError)` if the request failed or the body is an error
    /// envelope.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use graph_api_sdk::{Args, GraphClient};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = GraphClient::new("user_access_token");
    /// let page = client.call("me/friends", Args::new(), None).await?;
    /// println!("{:?} (more: {})", page.value, page.next.is_some());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(
        &self,
        path: &str,
        args: Args,
        post_args: Option<Args>,
    ) -> Result<Page, GraphError> {
        let (url, post_args) = self.prepare_request(path, args, post_args)?;
        match post_args {
            Some(form) => {
                self.fetch_page(Method::POST, &url, Some(RequestBody::Form(form)))
                    .await
            }
            None => self.fetch_page(Method::GET, &url, None).await,
        }
    }

    /// Fetch a path in the Graph API
    ///
    /// If `post_args` is given the request is a POST with those arguments.
    pub async fn request(
        &self,
        path: &str,
        args: Args,
        post_args: Option<Args>,
    ) -> Result<ApiResponse, GraphError> {
        Ok(self.call(path, args, post_args).await?.value)
    }

    /// Start a lazy listing of `path`, bounded by the configured page count
    ///
    /// No request is made until the first call to
    /// [`Paginator::next_page`].
    ///
    /// # Arguments
    ///
    /// * `path` - Connection path, e.g. `me/photos`
    /// * `args` - Query string arguments for the first page; later pages use
    ///   the server's `next` links as-is
    ///
    /// # Returns
    ///
    /// Returns `Ok(Paginator)`, or `Err(GraphError)` if the URL cannot be
    /// built from the configured host.
    pub fn paginate(&self, path: &str, args: Args) -> Result<Paginator, GraphError> {
        let (url, _) = self.prepare_request(path, args, None)?;
        Ok(Paginator::new(self.clone(), url, self.config.max_pages))
    }

    /// Fetch the given object from the graph
    pub async fn get_object(&self, id: &str, args: Args) -> Result<ApiResponse, GraphError> {
        self.request(id, args, None).await
    }

    /// Fetch several objects at once
    ///
    /// The result maps each id to its object.
    pub async fn get_objects(&self, ids: &[&str], mut args: Args) -> Result<ApiResponse, GraphError> {
        args.insert("ids".to_string(), ids.join(","));
        self.request("", args, None).await
    }

    /// Fetch the first page of a connection of the given object
    pub async fn get_connections(
        &self,
        id: &str,
        connection_name: &str,
        args: Args,
    ) -> Result<ApiResponse, GraphError> {
        self.request(&format!("{}/{}", id, connection_name), args, None)
            .await
    }

    /// Lazily page through a connection of the given object
    pub fn connections(
        &self,
        id: &str,
        connection_name: &str,
        args: Args,
    ) -> Result<Paginator, GraphError> {
        self.paginate(&format!("{}/{}", id, connection_name), args)
    }

    /// Write an object to the graph, connected to the given parent
    ///
    /// `put_object("me", "feed", message)` writes to the active user's wall.
    /// Requires an access token.
    pub async fn put_object(
        &self,
        parent_object: &str,
        connection_name: &str,
        data: Args,
    ) -> Result<ApiResponse, GraphError> {
        self.require_token()?;
        self.request(
            &format!("{}/{}", parent_object, connection_name),
            Args::new(),
            Some(data),
        )
        .await
    }

    /// Write a wall post to the given profile's wall (default `me`)
    ///
    /// `attachment` may carry `name`, `link`, `caption`, `description` and
    /// `picture`.
    pub async fn put_wall_post(
        &self,
        message: &str,
        attachment: Args,
        profile_id: Option<&str>,
    ) -> Result<ApiResponse, GraphError> {
        let mut data = attachment;
        data.insert("message".to_string(), message.to_string());
        self.put_object(profile_id.unwrap_or("me"), "feed", data)
            .await
    }

    /// Comment on the given object
    pub async fn put_comment(&self, object_id: &str, message: &str) -> Result<ApiResponse, GraphError> {
        let data = Args::from([("message".to_string(), message.to_string())]);
        self.put_object(object_id, "comments", data).await
    }

    /// Like the given object
    pub async fn put_like(&self, object_id: &str) -> Result<ApiResponse, GraphError> {
        self.put_object(object_id, "likes", Args::new()).await
    }

    /// Delete the object with the given id
    pub async fn delete_object(&self, id: &str) -> Result<(), GraphError> {
        let post_args = Args::from([("method".to_string(), "delete".to_string())]);
        self.request(id, Args::new(), Some(post_args)).await?;
        Ok(())
    }

    /// Delete an app request sent to a user
    ///
    /// The server answers with a bare boolean rather than an object, which is
    /// returned as-is; only an object carrying `error` counts as a failure.
    pub async fn delete_request(&self, user_id: &str, request_id: &str) -> Result<ApiResponse, GraphError> {
        let (url, _) =
            self.prepare_request(&format!("{}_{}", request_id, user_id), Args::new(), None)?;
        self.transport
            .send(Method::DELETE, &url, None, self.config.timeout)
            .await
    }

    /// Upload a photo using `multipart/form-data`
    ///
    /// Without `album_id` the photo goes to `/me/photos`, which uses (or
    /// creates) an album for the application.
    pub async fn put_photo(
        &self,
        photo: Photo,
        message: Option<&str>,
        album_id: Option<&str>,
        extra: Args,
    ) -> Result<ApiResponse, GraphError> {
        let mut fields: Vec<(String, MultipartValue)> = Vec::new();
        if let Some(token) = &self.access_token {
            fields.push(("access_token".to_string(), MultipartValue::Text(token.clone())));
        }
        if let Some(message) = message {
            fields.push(("message".to_string(), MultipartValue::Text(message.to_string())));
        }
        for (key, value) in extra {
            fields.push((key, MultipartValue::Text(value)));
        }
        fields.push((
            "source".to_string(),
            MultipartValue::File {
                filename: photo.filename,
                data: photo.data,
            },
        ));

        let (content_type, body) = encode_multipart_form(&fields);
        let url = build_url(
            &self
                .config
                .graph_endpoint(&format!("{}/photos", album_id.unwrap_or("me"))),
            &Args::new(),
        )?;

        tracing::debug!("Uploading photo ({} byte body) to: {}", body.len(), url);

        self.transport
            .send(
                Method::POST,
                &url,
                Some(RequestBody::Raw { content_type, body }),
                self.config.timeout,
            )
            .await
    }

    /// Run a legacy FQL query
    ///
    /// Example query: `SELECT affiliations FROM user WHERE uid = me()`.
    pub async fn fql(&self, query: FqlQuery) -> Result<Value, GraphError> {
        let mut args = Args::new();
        let method_name = match query {
            FqlQuery::Single(query) => {
                args.insert("query".to_string(), query);
                "fql.query"
            }
            FqlQuery::Multi(queries) => {
                let encoded = serde_json::to_string(&queries).map_err(|e| {
                    TransportError::Request(format!("Failed to encode FQL queries: {}", e))
                })?;
                args.insert("queries".to_string(), encoded);
                "fql.multiquery"
            }
        };
        args.insert("format".to_string(), "json".to_string());
        if let Some(token) = &self.access_token {
            args.insert("access_token".to_string(), token.clone());
        }

        let url = build_url(
            &self.config.legacy_endpoint(&format!("method/{}", method_name)),
            &args,
        )?;

        match self
            .transport
            .send(Method::GET, &url, None, self.config.timeout)
            .await?
        {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Binary { mime_type, .. } => Err(GraphError::Transport(
                TransportError::UnsupportedContentType(mime_type),
            )),
        }
    }

    /// Fetch a raw URL and unwrap its `data`/`paging` envelope
    pub(crate) async fn fetch_page(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
    ) -> Result<Page, GraphError> {
        let response = self
            .transport
            .send(method, url, body, self.config.timeout)
            .await?;
        let page = unwrap_envelope(response);
        tracing::debug!(
            "Fetched {} (next page: {})",
            redact(url),
            page.next.is_some()
        );
        Ok(page)
    }

    fn prepare_request(
        &self,
        path: &str,
        mut args: Args,
        mut post_args: Option<Args>,
    ) -> Result<(String, Option<Args>), GraphError> {
        if let Some(token) = &self.access_token {
            match post_args.as_mut() {
                Some(post) => {
                    post.insert("access_token".to_string(), token.clone());
                }
                None => {
                    args.insert("access_token".to_string(), token.clone());
                }
            }
        }

        let url = build_url(&self.config.graph_endpoint(path), &args)?;
        Ok((url, post_args))
    }

    fn require_token(&self) -> Result<(), GraphError> {
        if self.access_token.is_none() {
            return Err(GraphError::Config(
                "Write operations require an access token".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a decoded body into the caller-visible value and the next-page link
///
/// Listings come wrapped as `{"data": [...], "paging": {"next": ...}}`; bare
/// objects are returned verbatim.
pub(crate) fn unwrap_envelope(response: ApiResponse) -> Page {
    match response {
        ApiResponse::Json(Value::Object(mut object)) => {
            let next = object
                .get("paging")
                .and_then(|paging| paging.get("next"))
                .and_then(Value::as_str)
                .map(String::from);

            let has_data = object.get("data").map_or(false, |data| !data.is_null());
            let value = match object.remove("data") {
                Some(data) if has_data => data,
                removed => {
                    if let Some(data) = removed {
                        object.insert("data".to_string(), data);
                    }
                    Value::Object(object)
                }
            };

            Page {
                value: ApiResponse::Json(value),
                next,
            }
        }
        other => Page {
            value: other,
            next: None,
        },
    }
}

/// Build `endpoint?args`, leaving out the `?` when there are no arguments
pub(crate) fn build_url(endpoint: &str, args: &Args) -> Result<String, GraphError> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        TransportError::Request(format!("Invalid URL {}: {}", endpoint, e))
    })?;
    if !args.is_empty() {
        url.query_pairs_mut().extend_pairs(args.iter());
    }
    Ok(url.into())
}

#[derive(Debug, Clone, PartialEq)]
enum MultipartValue {
    Text(String),
    File {
        filename: Option<String>,
        data: Vec<u8>,
    },
}

/// Encode fields as `multipart/form-data` with the fixed boundary
///
/// Empty text fields are skipped. Returns the content type and the body.
fn encode_multipart_form(fields: &[(String, MultipartValue)]) -> (String, Vec<u8>) {
    const CRLF: &[u8] = b"\r\n";
    let mut body = Vec::new();

    for (key, value) in fields {
        match value {
            MultipartValue::Text(text) if text.is_empty() => continue,
            MultipartValue::Text(text) => {
                body.extend_from_slice(format!("--{}", MULTIPART_BOUNDARY).as_bytes());
                body.extend_from_slice(CRLF);
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"", key).as_bytes(),
                );
                body.extend_from_slice(CRLF);
                body.extend_from_slice(CRLF);
                body.extend_from_slice(text.as_bytes());
                body.extend_from_slice(CRLF);
            }
            MultipartValue::File { filename, data } => {
                let filename = filename
                    .clone()
                    .unwrap_or_else(|| format!("{}.jpg", key));
                body.extend_from_slice(format!("--{}", MULTIPART_BOUNDARY).as_bytes());
                body.extend_from_slice(CRLF);
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                        key, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(CRLF);
                body.extend_from_slice(b"Content-Type: image/jpeg");
                body.extend_from_slice(CRLF);
                body.extend_from_slice(CRLF);
                body.extend_from_slice(data);
                body.extend_from_slice(CRLF);
            }
        }
    }
    body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(CRLF);

    (
        format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        body,
    )
}
