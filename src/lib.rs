//! Graph API SDK
//!
//! A Rust client for the Graph API social-graph service.
//!
//! This SDK provides:
//! - Object and connection reads/writes with automatic access-token injection
//! - Lazy, bounded pagination over connection listings
//! - Classified API errors (OAuth, server, user, unknown)
//! - Verification of signed requests set by the JavaScript SDK
//! - OAuth token exchange, extension, app tokens and token introspection
//!
//! # Example
//!
//! ```no_run
//! use graph_api_sdk::{Args, GraphClient};
//! use std::collections::HashMap;
//!
//! # async fn example(cookies: HashMap<String, String>) -> Result<(), Box<dyn std::error::Error>> {
//! // Resolve the visitor's session from the JavaScript SDK cookie
//! let anonymous = GraphClient::anonymous();
//! if let Some(user) = anonymous
//!     .get_user_from_cookie(&cookies, "app_id", "app_secret")
//!     .await?
//! {
//!     let graph = GraphClient::new(user.token.access_token);
//!     let profile = graph.get_object("me", Args::new()).await?;
//!     let friends = graph.get_connections("me", "friends", Args::new()).await?;
//!     println!("{:?} {:?}", profile, friends);
//! }
//! # Ok(())
//! # }
//! ```

pub mod graph_api;

// Re-export commonly used types and functions
pub use graph_api::{
    classify::{classify, ErrorEnvelope},
    client::{FqlQuery, GraphClient, Photo},
    config::GraphApiConfig,
    oauth::parse_exchange_response,
    paginator::Paginator,
    signed_request::{parse_signed_request, sign_request, SignedRequest},
    transport::Args,
    types::{
        ApiError, ApiResponse, CookieUser, DebugTokenInfo, ErrorKind, ExchangeResult,
        GraphError, Page, TransportError,
    },
};
