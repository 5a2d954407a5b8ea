//! Parent-collection probing for member-of entities.
//!
//! A member-of entity's query must carry the key of the parent it is
//! currently ranging over (e.g. an organization's login). When a page call
//! arrives without one, a single size-1 probe of the parent collection
//! supplies it; the probe's own cursor lives in the composite's
//! `collectionCursor`, so repeated calls never skip a parent.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::cursor::CompositeCursor;
use crate::error::{Error, Result};

/// One page of the parent collection: at most one object plus the cursor
/// to the parent after it.
#[derive(Debug)]
pub(crate) struct ProbeOutcome {
    pub objects: Vec<Map<String, Value>>,
    pub next_cursor: Option<String>,
}

/// Fetches a single parent element; implemented over the live connector
/// and stubbed in tests.
#[async_trait]
pub(crate) trait CollectionProbe {
    async fn probe(&self, after: Option<String>) -> Result<ProbeOutcome>;
}

/// Ensure the composite names the parent the next child fetch belongs to.
///
/// Returns `true` when the parent collection is exhausted and the whole
/// traversal is complete. Performs at most one probe.
pub(crate) async fn advance_collection(
    composite: &mut CompositeCursor,
    probe: &(dyn CollectionProbe + Send + Sync),
    key_attribute: &str,
) -> Result<bool> {
    if composite.collection_id.is_some() {
        return Ok(false);
    }

    let outcome = probe.probe(composite.collection_cursor.take()).await?;
    let Some(parent) = outcome.objects.first() else {
        if outcome.next_cursor.is_none() {
            return Ok(true);
        }
        return Err(Error::shape(
            "parent collection probe returned a cursor but no object",
        ));
    };

    let key = parent
        .get(key_attribute)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::shape(format!(
                "parent collection object carries no {key_attribute}"
            ))
        })?;
    composite.collection_id = Some(key.to_string());
    composite.collection_cursor = outcome.next_cursor;
    Ok(false)
}
