//! Per-level pagination state.
//!
//! A [`PageInfo`] chain records how far a traversal has advanced at every
//! level of an entity's unwinding path: the outermost layer tracks the
//! organization collection, inner layers track collections nested below
//! it. The deepest still-advancing layer moves first; a layer above only
//! advances once everything below it is exhausted, which yields a
//! depth-first walk over the nested collections.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Pagination state for one traversal level, linked to the level below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether the source reported more elements at this level.
    #[serde(default)]
    pub has_next_page: bool,

    /// Opaque position cursor supplied by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,

    /// Index into the caller-supplied organization list. Meaningful only
    /// on the outermost layer of an organization-list traversal.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub organization_offset: usize,

    /// State of the level immediately below, while this level is held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<PageInfo>>,
}

impl PageInfo {
    /// A layer freshly read from a response.
    #[must_use]
    pub fn layer(has_next_page: bool, end_cursor: Option<String>) -> Self {
        Self {
            has_next_page,
            end_cursor,
            organization_offset: 0,
            inner: None,
        }
    }

    /// Number of layers in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.inner.as_ref().map_or(0, |i| i.depth())
    }

    /// Encode the chain as base64-wrapped canonical JSON.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::internal(format!("failed to encode pagination state: {e}")))?;
        Ok(BASE64.encode(json))
    }

    /// Decode a chain from its base64-wrapped JSON form.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(token)
            .map_err(|e| Error::cursor(format!("pagination state is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::cursor(format!("pagination state is not valid JSON: {e}")))
    }
}

/// Insert `leaf` as the deepest layer of `parent`.
#[must_use]
pub fn append_leaf(parent: Option<PageInfo>, leaf: PageInfo) -> PageInfo {
    match parent {
        None => leaf,
        Some(mut p) => {
            let below = p.inner.take().map(|b| *b);
            p.inner = Some(Box::new(append_leaf(below, leaf)));
            p
        }
    }
}

/// Merge the chain from the latest response into the stored chain.
///
/// Proceeds innermost-first: while a lower layer still advances, every
/// layer above it stays held on its current cursor. Once a layer's subtree
/// is exhausted, the layer itself advances to the fresh cursor, or is
/// trimmed when the source reported no further elements. Returns whether
/// anything advanced along with the merged chain; `(false, None)` means
/// the whole traversal is exhausted.
#[must_use]
pub fn advance(current: Option<PageInfo>, fresh: Option<PageInfo>) -> (bool, Option<PageInfo>) {
    let Some(fresh) = fresh else {
        return (false, None);
    };
    let mut current = current.unwrap_or_default();

    let current_inner = current.inner.take().map(|b| *b);
    let fresh_inner = fresh.inner.map(|b| *b);
    let (inner_changed, merged_inner) = advance(current_inner, fresh_inner);
    if inner_changed {
        current.inner = merged_inner.map(Box::new);
        return (true, Some(current));
    }

    // The subtree below is exhausted; advance this layer or trim it.
    if fresh.has_next_page && fresh.end_cursor.is_some() {
        current.has_next_page = true;
        current.end_cursor = fresh.end_cursor;
        (true, Some(current))
    } else {
        (false, None)
    }
}

/// The `after` argument for the collection at `depth` (0 = outermost).
///
/// An organization-list traversal has no paginated top layer, so stored
/// chains are one layer shorter than the unwinding path; `top_collapsed`
/// shifts the depth accordingly.
#[must_use]
pub fn lookup_after(chain: Option<&PageInfo>, depth: usize, top_collapsed: bool) -> Option<String> {
    let depth = if top_collapsed {
        depth.checked_sub(1)?
    } else {
        depth
    };
    let mut layer = chain?;
    for _ in 0..depth {
        layer = layer.inner.as_deref()?;
    }
    layer.end_cursor.clone()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn layer(cursor: &str, has_next: bool) -> PageInfo {
        PageInfo::layer(has_next, Some(cursor.to_string()))
    }

    #[test]
    fn test_append_leaf_to_empty() {
        let chain = append_leaf(None, layer("a", true));
        assert_eq!(chain.depth(), 1);
        assert_eq!(chain.end_cursor.as_deref(), Some("a"));
    }

    #[test]
    fn test_append_leaf_links_at_tail() {
        let chain = append_leaf(None, layer("a", true));
        let chain = append_leaf(Some(chain), layer("b", true));
        let chain = append_leaf(Some(chain), layer("c", true));
        assert_eq!(chain.depth(), 3);
        assert_eq!(chain.end_cursor.as_deref(), Some("a"));
        let mid = chain.inner.as_ref().unwrap();
        assert_eq!(mid.end_cursor.as_deref(), Some("b"));
        assert_eq!(mid.inner.as_ref().unwrap().end_cursor.as_deref(), Some("c"));
    }

    #[test]
    fn test_advance_first_page_holds_outer_layers() {
        // Three fresh layers; only the innermost should carry a cursor,
        // outer layers stay pinned on their first page.
        let fresh = append_leaf(
            Some(append_leaf(Some(layer("org1", true)), layer("repo1", true))),
            layer("label8", true),
        );
        let (changed, merged) = advance(None, Some(fresh));
        assert!(changed);
        let merged = merged.unwrap();
        assert_eq!(merged.depth(), 3);
        assert_eq!(merged.end_cursor, None);
        assert!(!merged.has_next_page);
        let mid = merged.inner.as_ref().unwrap();
        assert_eq!(mid.end_cursor, None);
        let leaf = mid.inner.as_ref().unwrap();
        assert_eq!(leaf.end_cursor.as_deref(), Some("label8"));
        assert!(leaf.has_next_page);
    }

    #[test]
    fn test_advance_moves_innermost_only() {
        let current = append_leaf(Some(PageInfo::default()), layer("leaf1", true));
        let fresh = append_leaf(Some(layer("outer1", true)), layer("leaf2", true));
        let (changed, merged) = advance(Some(current), Some(fresh));
        assert!(changed);
        let merged = merged.unwrap();
        // Outer layer still held on its original (empty) cursor.
        assert_eq!(merged.end_cursor, None);
        assert_eq!(
            merged.inner.as_ref().unwrap().end_cursor.as_deref(),
            Some("leaf2")
        );
    }

    #[test]
    fn test_advance_outer_when_inner_exhausts() {
        let current = append_leaf(Some(PageInfo::default()), layer("leaf9", true));
        // Inner exhausted, outer has more elements.
        let fresh = append_leaf(Some(layer("outer1", true)), layer("dead", false));
        let (changed, merged) = advance(Some(current), Some(fresh));
        assert!(changed);
        let merged = merged.unwrap();
        assert_eq!(merged.depth(), 1);
        assert_eq!(merged.end_cursor.as_deref(), Some("outer1"));
        assert!(merged.has_next_page);
    }

    #[test]
    fn test_advance_exhausted_everywhere_trims_to_none() {
        let current = append_leaf(Some(layer("outer1", true)), layer("leaf9", true));
        let fresh = append_leaf(Some(layer("outer2", false)), layer("dead", false));
        let (changed, merged) = advance(Some(current), Some(fresh));
        assert!(!changed);
        assert!(merged.is_none());
    }

    #[test]
    fn test_advance_with_no_fresh_chain() {
        let (changed, merged) = advance(Some(layer("a", true)), None);
        assert!(!changed);
        assert!(merged.is_none());
    }

    #[test]
    fn test_no_stored_layer_is_terminal() {
        // After any advance, a layer with has_next_page=false must carry an
        // inner layer (it is only held, never terminal).
        fn assert_not_terminal(chain: &PageInfo) {
            if !chain.has_next_page {
                assert!(chain.inner.is_some());
            }
            if let Some(inner) = &chain.inner {
                assert_not_terminal(inner);
            }
        }
        let fresh = append_leaf(Some(layer("o", true)), layer("l", true));
        let (_, merged) = advance(None, Some(fresh));
        assert_not_terminal(&merged.unwrap());
    }

    #[test]
    fn test_lookup_after_by_depth() {
        let chain = append_leaf(
            Some(append_leaf(Some(layer("o", true)), layer("r", true))),
            layer("l", true),
        );
        assert_eq!(lookup_after(Some(&chain), 0, false).as_deref(), Some("o"));
        assert_eq!(lookup_after(Some(&chain), 1, false).as_deref(), Some("r"));
        assert_eq!(lookup_after(Some(&chain), 2, false).as_deref(), Some("l"));
        assert_eq!(lookup_after(Some(&chain), 3, false), None);
        assert_eq!(lookup_after(None, 0, false), None);
    }

    #[test]
    fn test_lookup_after_with_collapsed_top() {
        let chain = append_leaf(Some(layer("r", true)), layer("l", true));
        // Depth 0 addresses the collapsed organization root: no cursor.
        assert_eq!(lookup_after(Some(&chain), 0, true), None);
        assert_eq!(lookup_after(Some(&chain), 1, true).as_deref(), Some("r"));
        assert_eq!(lookup_after(Some(&chain), 2, true).as_deref(), Some("l"));
    }

    #[test]
    fn test_held_layer_without_cursor_yields_no_after() {
        let chain = append_leaf(Some(PageInfo::default()), layer("l", true));
        assert_eq!(lookup_after(Some(&chain), 0, false), None);
        assert_eq!(lookup_after(Some(&chain), 1, false).as_deref(), Some("l"));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let chain = append_leaf(Some(layer("outer", true)), layer("inner", true));
        let token = chain.encode().unwrap();
        assert_eq!(PageInfo::decode(&token).unwrap(), chain);
    }

    #[test]
    fn test_wire_keys_are_camel_case() {
        let mut chain = layer("abc", true);
        chain.organization_offset = 2;
        let token = chain.encode().unwrap();
        let json = String::from_utf8(BASE64.decode(token).unwrap()).unwrap();
        assert!(json.contains("\"hasNextPage\":true"));
        assert!(json.contains("\"endCursor\":\"abc\""));
        assert!(json.contains("\"organizationOffset\":2"));
        assert!(!json.contains("inner"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(PageInfo::decode("!!!not-base64!!!").is_err());
        let not_json = BASE64.encode(b"plain text");
        assert!(PageInfo::decode(&not_json).is_err());
    }

    #[test]
    fn test_organization_offset_survives_round_trip() {
        let mut chain = PageInfo::layer(true, None);
        chain.organization_offset = 1;
        let decoded = PageInfo::decode(&chain.encode().unwrap()).unwrap();
        assert_eq!(decoded.organization_offset, 1);
        assert!(decoded.has_next_page);
    }
}
