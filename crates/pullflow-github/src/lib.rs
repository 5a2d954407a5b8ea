//! # pullflow-github
//!
//! Pull-based connector for GitHub Enterprise sources. One operation,
//! [`GithubConnector::get_page`], returns a bounded page of flattened
//! attribute maps for a requested entity plus an opaque continuation
//! cursor; replaying the cursor resumes the traversal exactly where it
//! stopped, and an absent cursor means every object has been enumerated.
//!
//! Entities live behind two query surfaces: a deeply nested GraphQL graph
//! rooted at an enterprise or organization, and a flat REST listing. The
//! connector hides the difference: nested traversals walk the graph
//! depth-first with per-level pagination state carried inside the cursor,
//! flat traversals follow `Link` headers, and both emit the same flat
//! object shape with parent ids stamped on.
//!
//! ## Features
//!
//! - Enterprise-rooted or explicit organization-list traversal
//! - Cross-level resumption under arbitrary page boundaries
//! - Deterministic query synthesis from a requested attribute set
//! - Parent-collection stepping for entities scoped to a named parent
//! - `Retry-After` passthrough for caller-driven backoff
//!
//! ## Example
//!
//! ```rust,no_run
//! use pullflow_github::{
//!     Deployment, EntityProjection, GithubConnector, PageRequest, Scope,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = GithubConnector::new()?;
//!     let mut cursor = None;
//!
//!     loop {
//!         let page = connector
//!             .get_page(&PageRequest {
//!                 address: "github.example.com".to_string(),
//!                 credential: "Bearer <token>".to_string(),
//!                 entity: EntityProjection::new(
//!                     "Repository",
//!                     vec!["id".into(), "name".into()],
//!                 ),
//!                 page_size: 50,
//!                 cursor,
//!                 scope: Scope::Enterprise("acme".to_string()),
//!                 deployment: Deployment::Cloud,
//!                 api_version: None,
//!                 ordered: false,
//!                 filters: None,
//!                 timeout: None,
//!             })
//!             .await?;
//!
//!         for object in &page.objects {
//!             println!("{object:?}");
//!         }
//!         match page.next_cursor {
//!             Some(next) => cursor = Some(next),
//!             None => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
mod collection;
pub mod constants;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod page_info;
mod query;
pub mod request;
mod unwind;

pub use client::{GithubConnector, GithubConnectorBuilder, Page};
pub use cursor::CompositeCursor;
pub use entity::{descriptor, Carrier, EntityDescriptor, PathStep, Transport};
pub use error::{Error, ErrorCode, Result, TransportKind};
pub use page_info::PageInfo;
pub use request::{Deployment, EntityProjection, PageRequest, Scope};
