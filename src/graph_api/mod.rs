/// Graph API client module
///
/// This module provides the protocol layer shared by every Graph API
/// operation: the request pipeline, lazy pagination, error classification,
/// signed-request verification and OAuth token exchange.
///
/// ## Cookie Session Flow
///
/// 1. The JavaScript SDK sets a `fbsr_<app_id>` cookie holding a signed request
/// 2. The app verifies the signature locally with its app secret
/// 3. The embedded authorization code is exchanged for an access token
/// 4. A `GraphClient` built with that token serves all further reads/writes
pub mod classify;
pub mod client;
pub mod config;
pub mod oauth;
pub mod paginator;
pub mod signed_request;
pub mod transport;
pub mod types;

pub use classify::{classify, ErrorEnvelope};
pub use client::{FqlQuery, GraphClient, Photo};
pub use config::GraphApiConfig;
pub use paginator::Paginator;
pub use signed_request::{parse_signed_request, sign_request, SignedRequest};
pub use transport::Args;
pub use types::{ApiError, ApiResponse, ErrorKind, GraphError, TransportError};
