//! Shared constants for the connector.

use std::time::Duration;

/// Default timeout for a single outbound request (30 seconds).
pub const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing a connection (10 seconds).
pub const DEFAULT_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest number of objects a single page may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Upper bound on buffered response bodies (8 MiB).
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("pullflow-github/", env!("CARGO_PKG_VERSION"));

/// GraphQL endpoint path on cloud deployments.
pub const GRAPHQL_PATH_CLOUD: &str = "/graphql";

/// GraphQL endpoint path on self-hosted deployments.
pub const GRAPHQL_PATH_SERVER: &str = "/api/graphql";
