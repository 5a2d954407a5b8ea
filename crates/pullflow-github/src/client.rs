//! The connector and its page orchestration.
//!
//! One call to [`GithubConnector::get_page`] validates the request,
//! resolves the parent collection key when the entity needs one,
//! synthesizes the query, performs the single HTTP exchange, unwinds the
//! response, merges the pagination state into the continuation cursor, and
//! returns the page. The connector itself owns nothing mutable between
//! calls; all traversal state lives in the cursor the caller hands back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LINK, RETRY_AFTER};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::collection::{advance_collection, CollectionProbe, ProbeOutcome};
use crate::constants::{
    DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT, GRAPHQL_PATH_CLOUD,
    GRAPHQL_PATH_SERVER, MAX_RESPONSE_BYTES, USER_AGENT,
};
use crate::cursor::CompositeCursor;
use crate::entity::{self, EntityDescriptor};
use crate::error::{Error, Result};
use crate::page_info::{advance, PageInfo};
use crate::query::{build_flat_url, build_graph_query, flat_offset, GraphQuery};
use crate::request::{Deployment, EntityProjection, PageRequest, Scope, ValidatedRequest};
use crate::unwind::{parse_next_link, unwind_flat, unwind_graph};

/// One page of flattened objects plus the continuation token.
///
/// A missing `next_cursor` means the traversal session is complete.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Flattened attribute maps, in traversal order.
    pub objects: Vec<Map<String, Value>>,
    /// Opaque token to pass back on the next call.
    pub next_cursor: Option<String>,
}

/// Builder for [`GithubConnector`].
#[derive(Debug, Clone)]
pub struct GithubConnectorBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    allow_http: bool,
}

impl Default for GithubConnectorBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_HTTP_CONNECT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            allow_http: false,
        }
    }
}

impl GithubConnectorBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection-establishment timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent sent with every request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Permit plain-http addresses. Intended for tests against local mock
    /// servers; secure schemes remain mandatory by default.
    #[must_use]
    pub fn allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Build the connector.
    pub fn build(self) -> Result<GithubConnector> {
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(GithubConnector {
            inner: Arc::new(ConnectorInner {
                http,
                allow_http: self.allow_http,
            }),
        })
    }
}

/// Pull-based connector for GitHub Enterprise sources.
///
/// Cheap to clone; the HTTP client is shared.
#[derive(Debug, Clone)]
pub struct GithubConnector {
    inner: Arc<ConnectorInner>,
}

#[derive(Debug)]
struct ConnectorInner {
    http: reqwest::Client,
    allow_http: bool,
}

impl GithubConnector {
    /// Create a connector with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a connector builder.
    #[must_use]
    pub fn builder() -> GithubConnectorBuilder {
        GithubConnectorBuilder::default()
    }

    /// Fetch the next page of the requested entity.
    ///
    /// Pass the returned `next_cursor` back on the following call to
    /// resume exactly where the traversal stopped; a missing `next_cursor`
    /// means every object has been enumerated.
    pub async fn get_page(&self, request: &PageRequest) -> Result<Page> {
        let validated = request.validate(self.inner.allow_http)?;
        let descriptor = validated.descriptor;
        let mut composite = match &request.cursor {
            Some(token) if !token.is_empty() => {
                CompositeCursor::decode(token, descriptor, &request.scope)?
            }
            _ => CompositeCursor::default(),
        };
        debug!(entity = descriptor.name, "fetching page");

        if descriptor.is_flat() {
            return self.flat_page(&validated, composite).await;
        }

        if let (Some(parent_name), Scope::Enterprise(_)) = (descriptor.member_of, &request.scope) {
            let parent = entity::descriptor(parent_name)
                .ok_or_else(|| Error::internal(format!("unregistered parent {parent_name}")))?;
            let key_attribute = descriptor
                .collection_key
                .ok_or_else(|| Error::internal(format!("{} has no collection key", descriptor.name)))?;
            let probe = ParentProbe {
                connector: self,
                validated: &validated,
                parent,
                projection: EntityProjection::new(
                    parent.name,
                    vec![
                        parent.unique_id_field.to_string(),
                        key_attribute.to_string(),
                    ],
                ),
            };
            if advance_collection(&mut composite, &probe, key_attribute).await? {
                debug!(entity = descriptor.name, "parent collection exhausted");
                return Ok(Page::default());
            }
        }

        self.graph_page(&validated, composite).await
    }

    async fn graph_page(
        &self,
        validated: &ValidatedRequest<'_>,
        mut composite: CompositeCursor,
    ) -> Result<Page> {
        let request = validated.request;
        let descriptor = validated.descriptor;
        let chain = composite
            .cursor
            .as_deref()
            .map(PageInfo::decode)
            .transpose()?;
        let organizations = request.scope.organizations();
        let offset = chain.as_ref().map_or(0, |c| c.organization_offset);
        if let Some(orgs) = organizations {
            if offset >= orgs.len() {
                return Ok(Page::default());
            }
        }
        let first_page = chain.is_none();

        let query = build_graph_query(&GraphQuery {
            descriptor,
            projection: &request.entity,
            page_size: request.page_size,
            chain: chain.as_ref(),
            scope: &request.scope,
            collection_id: composite.collection_id.as_deref(),
            filters: request.filters.as_deref(),
        })?;
        let body = self.post_graph(validated, &query).await?;

        let organization_count = organizations.map_or(0, <[String]>::len);
        let unwound = unwind_graph(&body, descriptor, &request.entity, organization_count)?;
        let (_, merged) = advance(chain, unwound.page_info);

        match organizations {
            Some(orgs) => {
                composite.cursor = match merged {
                    Some(mut chain) => {
                        chain.organization_offset = offset;
                        Some(chain.encode()?)
                    }
                    None => {
                        // Restart at the next organization. A short first
                        // page also bumps the offset even when no
                        // organizations remain; the follow-up call then
                        // observes the out-of-range offset and ends the
                        // session cleanly.
                        let short_first_page =
                            first_page && unwound.objects.len() < request.page_size;
                        if offset + 1 < orgs.len() || short_first_page {
                            let mut restart = PageInfo::layer(true, None);
                            restart.organization_offset = offset + 1;
                            Some(restart.encode()?)
                        } else {
                            None
                        }
                    }
                };
            }
            None => {
                composite.cursor = merged.map(|c| c.encode()).transpose()?;
                if composite.cursor.is_none() {
                    // Child run drained: drop the parent key so the next
                    // call advances to the next parent.
                    composite.collection_id = None;
                }
            }
        }

        let next_cursor = if composite.is_empty() {
            None
        } else {
            Some(composite.encode()?)
        };
        Ok(Page {
            objects: unwound.objects,
            next_cursor,
        })
    }

    async fn flat_page(
        &self,
        validated: &ValidatedRequest<'_>,
        composite: CompositeCursor,
    ) -> Result<Page> {
        let request = validated.request;
        let organizations = request.scope.organizations();
        let offset = flat_offset(&composite)?;
        if let Some(orgs) = organizations {
            if offset >= orgs.len() {
                return Ok(Page::default());
            }
        }

        let url = build_flat_url(
            &validated.base,
            request.deployment,
            request.api_version.as_deref(),
            validated.descriptor,
            &request.scope,
            &composite,
            request.page_size,
        )?;
        debug!(%url, "dispatching listing request");
        let response = self.send(self.inner.http.get(&url), validated).await?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let link = response
            .headers()
            .get(LINK)
            .ok_or_else(|| Error::shape("response carries no Link header"))?
            .to_str()
            .map_err(|_| Error::shape("Link header is not valid text"))?
            .to_string();
        let next_url = parse_next_link(&link);
        let body = read_json(response).await?;
        let objects = unwind_flat(&body, &request.entity)?;

        let next = match next_url {
            Some(next_url) => CompositeCursor {
                cursor: Some(next_url),
                collection_id: organizations.map(|_| offset.to_string()),
                collection_cursor: None,
            },
            None => match organizations {
                Some(orgs) if offset + 1 < orgs.len() => CompositeCursor {
                    cursor: None,
                    collection_id: Some((offset + 1).to_string()),
                    collection_cursor: None,
                },
                _ => CompositeCursor::default(),
            },
        };
        let next_cursor = if next.is_empty() {
            None
        } else {
            Some(next.encode()?)
        };
        Ok(Page {
            objects,
            next_cursor,
        })
    }

    async fn post_graph(&self, validated: &ValidatedRequest<'_>, query: &str) -> Result<Value> {
        let endpoint = match validated.request.deployment {
            Deployment::Cloud => format!("{}{GRAPHQL_PATH_CLOUD}", validated.base),
            Deployment::Server => format!("{}{GRAPHQL_PATH_SERVER}", validated.base),
        };
        debug!(%endpoint, "dispatching graph query");
        let builder = self
            .inner
            .http
            .post(&endpoint)
            .json(&json!({ "query": query }));
        let response = self.send(builder, validated).await?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        read_json(response).await
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        validated: &ValidatedRequest<'_>,
    ) -> Result<reqwest::Response> {
        let mut builder = builder.header(AUTHORIZATION, &validated.request.credential);
        if let Some(timeout) = validated.request.timeout {
            builder = builder.timeout(timeout);
        }
        builder.send().await.map_err(Error::transport)
    }
}

/// Probe over the live connector: one size-1 page of the parent entity.
struct ParentProbe<'a> {
    connector: &'a GithubConnector,
    validated: &'a ValidatedRequest<'a>,
    parent: &'static EntityDescriptor,
    projection: EntityProjection,
}

#[async_trait]
impl CollectionProbe for ParentProbe<'_> {
    async fn probe(&self, after: Option<String>) -> Result<ProbeOutcome> {
        let chain = after.as_deref().map(PageInfo::decode).transpose()?;
        let query = build_graph_query(&GraphQuery {
            descriptor: self.parent,
            projection: &self.projection,
            page_size: 1,
            chain: chain.as_ref(),
            scope: &self.validated.request.scope,
            collection_id: None,
            filters: None,
        })?;
        let body = self.connector.post_graph(self.validated, &query).await?;
        let unwound = unwind_graph(&body, self.parent, &self.projection, 0)?;
        let (_, merged) = advance(chain, unwound.page_info);
        let next_cursor = merged.map(|m| m.encode()).transpose()?;
        Ok(ProbeOutcome {
            objects: unwound.objects,
            next_cursor,
        })
    }
}

/// Surface a non-OK status with its `Retry-After` header, body unread.
fn status_error(response: &reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if retry_after.is_some() {
        warn!(status, "source throttled the request");
    }
    Error::SourceStatus {
        status,
        retry_after,
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    if let Some(length) = response.content_length() {
        if length > MAX_RESPONSE_BYTES as u64 {
            return Err(Error::internal("response body exceeds the size limit"));
        }
    }
    let text = response.text().await.map_err(Error::transport)?;
    if text.len() > MAX_RESPONSE_BYTES {
        return Err(Error::internal("response body exceeds the size limit"));
    }
    serde_json::from_str(&text).map_err(|e| Error::shape(format!("response is not valid JSON: {e}")))
}
