//! The composite continuation token.
//!
//! All traversal state lives in this token: within-collection progress,
//! the parent whose child run is in progress, and progress through the set
//! of parents. The wire form is base64 over canonical JSON with stable
//! keys, so a caller can hold it opaquely between calls.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::request::Scope;

/// Three-part continuation token; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeCursor {
    /// Within-collection progress: a pagination-state chain for graph
    /// entities, an absolute next-page URL for flat entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    /// The parent whose child run is in progress (member-of entities), or
    /// the decimal organization offset (flat entities in organization-list
    /// mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    /// Progress through the set of parents, enabling resumption across
    /// parent boundaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_cursor: Option<String>,
}

impl CompositeCursor {
    /// Whether the token carries no state at all. An empty token signals
    /// the end of a traversal session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.collection_id.is_none() && self.collection_cursor.is_none()
    }

    /// Encode as an opaque string.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::internal(format!("failed to encode cursor: {e}")))?;
        Ok(BASE64.encode(json))
    }

    /// Decode an opaque token and validate it against the entity's shape.
    ///
    /// The scope matters: a member-of entity steps through its parent
    /// collection only under enterprise scope, so only there must mid-run
    /// child progress name the parent it belongs to.
    pub fn decode(token: &str, entity: &EntityDescriptor, scope: &Scope) -> Result<Self> {
        let bytes = BASE64
            .decode(token)
            .map_err(|e| Error::cursor(format!("cursor is not base64: {e}")))?;
        let composite: Self = serde_json::from_slice(&bytes)
            .map_err(|e| Error::cursor(format!("cursor is not valid JSON: {e}")))?;
        composite.validate(entity, scope)?;
        Ok(composite)
    }

    fn validate(&self, entity: &EntityDescriptor, scope: &Scope) -> Result<()> {
        if entity.member_of.is_some() && matches!(scope, Scope::Enterprise(_)) {
            // Mid-run child progress must name the parent it belongs to.
            if self.cursor.is_some() && self.collection_id.is_none() {
                return Err(Error::cursor(format!(
                    "cursor for {} carries child progress without a parent collection id",
                    entity.name
                )));
            }
            return Ok(());
        }
        if entity.is_flat() {
            if self.collection_cursor.is_some() {
                return Err(Error::cursor(format!(
                    "cursor for {} must not carry a parent collection cursor",
                    entity.name
                )));
            }
            if let Some(id) = &self.collection_id {
                id.parse::<usize>().map_err(|_| {
                    Error::cursor(format!(
                        "cursor for {} carries a non-numeric organization offset: {id:?}",
                        entity.name
                    ))
                })?;
            }
            return Ok(());
        }
        if self.collection_id.is_some() || self.collection_cursor.is_some() {
            return Err(Error::cursor(format!(
                "cursor for {} must not carry parent collection state",
                entity.name
            )));
        }
        Ok(())
    }
}
