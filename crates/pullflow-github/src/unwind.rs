//! Response-tree unwinding.
//!
//! Walks a nested graph response along the entity's unwinding path,
//! extracts the leaf objects as flat attribute maps, stamps the required
//! parent ids, synthesizes compound unique ids, and collects the advanced
//! pagination state for every level. Flat REST responses are a single
//! top-level array plus a `Link` header.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::entity::{injection_container, EntityDescriptor};
use crate::error::{Error, Result};
use crate::page_info::{append_leaf, PageInfo};
use crate::request::EntityProjection;

/// Result of unwinding one graph response.
#[derive(Debug)]
pub(crate) struct UnwoundPage {
    /// Flattened leaf objects, in response order.
    pub objects: Vec<Map<String, Value>>,
    /// Pagination state read from the response, one layer per level.
    pub page_info: Option<PageInfo>,
}

/// Unwind a graph response body.
///
/// `organization_count` is zero for enterprise-rooted sessions and the
/// length of the caller's organization list otherwise.
pub(crate) fn unwind_graph(
    body: &Value,
    descriptor: &EntityDescriptor,
    projection: &EntityProjection,
    organization_count: usize,
) -> Result<UnwoundPage> {
    check_source_errors(body)?;

    let data = body
        .get("data")
        .filter(|d| !d.is_null())
        .ok_or_else(|| Error::shape("response carries no data"))?;

    let path = descriptor.path;
    let collapsed = organization_count > 0
        && path
            .first()
            .map_or(false, |step| step.container == "enterprise");
    let start = usize::from(collapsed);
    let root_name: &'static str = if collapsed {
        "organization"
    } else {
        path.first()
            .map(|step| step.container)
            .ok_or_else(|| Error::internal("graph entity has an empty unwinding path"))?
    };

    let root = data.get(root_name).filter(|c| c.is_object()).ok_or_else(|| {
        Error::shape(format!("response carries no {root_name} container"))
    })?;

    let mut captured: HashMap<&'static str, Option<String>> = HashMap::new();
    capture_id(&mut captured, root_name, root);

    // Collapsed single-level entities: the root object itself is the leaf.
    if start >= path.len() {
        let object = finalize(flatten(root, projection), descriptor, &captured)?;
        return Ok(UnwoundPage {
            objects: vec![object],
            page_info: None,
        });
    }

    let mut container = root.clone();
    let mut chain: Option<PageInfo> = None;
    let mut carrier_blob = Value::Null;
    let last = path.len() - 1;

    for (index, step) in path.iter().enumerate().skip(start) {
        if index > start {
            // Intermediate levels are fetched one element at a time; the
            // single element is the container for the level below.
            let elements = carrier_blob
                .as_array()
                .ok_or_else(|| Error::shape(format!("{} is not a list", path[index - 1].collection)))?;
            match elements.len() {
                0 => {
                    // Empty branch: no objects this page, but the collected
                    // state still lets the cursor advance past it.
                    return Ok(UnwoundPage {
                        objects: Vec::new(),
                        page_info: chain,
                    });
                }
                1 => container = elements[0].clone(),
                n => {
                    return Err(Error::shape(format!(
                        "expected a single {} element, got {n}",
                        path[index - 1].collection
                    )));
                }
            }
            capture_id(&mut captured, step.container, &container);
        }

        let collection = container
            .get(step.collection)
            .filter(|c| c.is_object())
            .ok_or_else(|| {
                Error::shape(format!("{} carries no {} collection", step.container, step.collection))
            })?;
        chain = Some(append_leaf(chain, read_page_info(collection, step.collection)?));
        carrier_blob = collection
            .get(step.carrier.field())
            .cloned()
            .unwrap_or(Value::Null);
        if index == last {
            break;
        }
    }

    let leaves = carrier_blob.as_array().ok_or_else(|| {
        Error::shape(format!("{} carries no element list", path[last].collection))
    })?;

    let mut objects = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        objects.push(finalize(flatten(leaf, projection), descriptor, &captured)?);
    }

    Ok(UnwoundPage {
        objects,
        page_info: chain,
    })
}

/// Unwind a flat REST response body: a top-level JSON array.
pub(crate) fn unwind_flat(
    body: &Value,
    projection: &EntityProjection,
) -> Result<Vec<Map<String, Value>>> {
    let elements = body
        .as_array()
        .ok_or_else(|| Error::shape("expected a top-level array"))?;
    Ok(elements.iter().map(|e| flatten(e, projection)).collect())
}

/// Extract the `rel="next"` URL from a `Link` header value.
pub(crate) fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|p| p.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        Some(url.to_string())
    })
}

fn check_source_errors(body: &Value) -> Result<()> {
    let Some(errors) = body.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(Error::SourceErrors(joined))
}

fn read_page_info(collection: &Value, name: &str) -> Result<PageInfo> {
    let info = collection
        .get("pageInfo")
        .filter(|p| p.is_object())
        .ok_or_else(|| Error::shape(format!("{name} carries no pageInfo")))?;
    let has_next_page = info
        .get("hasNextPage")
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::shape(format!("{name} pageInfo carries no hasNextPage")))?;
    let end_cursor = info
        .get("endCursor")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(PageInfo::layer(has_next_page, end_cursor))
}

fn capture_id(
    captured: &mut HashMap<&'static str, Option<String>>,
    container: &'static str,
    value: &Value,
) {
    let id = value.get("id").and_then(value_as_string);
    captured.insert(container, id);
}

/// Flatten one leaf object down to the requested attribute map. Keys are
/// the caller's attribute names, dotted paths included.
fn flatten(leaf: &Value, projection: &EntityProjection) -> Map<String, Value> {
    let mut out = Map::new();
    for attribute in &projection.attributes {
        if let Some(value) = resolve_path(leaf, attribute) {
            if !value.is_null() {
                out.insert(attribute.clone(), value.clone());
            }
        }
    }
    for child in &projection.children {
        let Some(value) = resolve_path(leaf, &child.name) else {
            continue;
        };
        let elements: Vec<Value> = match value {
            Value::Array(items) => items.iter().map(|i| reshape_child(i, child)).collect(),
            Value::Null => continue,
            other => vec![reshape_child(other, child)],
        };
        out.insert(child.name.clone(), Value::Array(elements));
    }
    out
}

/// A child element is either an object (flattened recursively) or a bare
/// string, which is wrapped under the child's single declared attribute so
/// downstream handling sees a uniform list-of-objects shape.
fn reshape_child(element: &Value, child: &EntityProjection) -> Value {
    match element {
        Value::String(s) => {
            let mut wrapped = Map::new();
            if let Some(attribute) = child.attributes.first() {
                wrapped.insert(attribute.clone(), Value::String(s.clone()));
            }
            Value::Object(wrapped)
        }
        Value::Object(_) => Value::Object(flatten(element, child)),
        other => other.clone(),
    }
}

/// Stamp required parent ids and synthesize the unique id.
fn finalize(
    mut object: Map<String, Value>,
    descriptor: &EntityDescriptor,
    captured: &HashMap<&'static str, Option<String>>,
) -> Result<Map<String, Value>> {
    for injection in descriptor.injections {
        let container = injection_container(injection)
            .ok_or_else(|| Error::internal(format!("unmapped injection {injection}")))?;
        match captured.get(container) {
            Some(Some(id)) => {
                object.insert((*injection).to_string(), Value::String(id.clone()));
            }
            Some(None) => {
                return Err(Error::shape(format!(
                    "{container} container carries no id for {injection}"
                )));
            }
            // Container not traversed in this mode; nothing to stamp.
            None => {}
        }
    }

    if let Some((first, second)) = descriptor.unique_id_parts {
        let a = object
            .get(first)
            .and_then(value_as_string)
            .ok_or_else(|| Error::shape(format!("missing {first} for unique id")))?;
        let b = object
            .get(second)
            .and_then(value_as_string)
            .ok_or_else(|| Error::shape(format!("missing {second} for unique id")))?;
        object.insert(
            descriptor.unique_id_field.to_string(),
            Value::String(format!("{a}-{b}")),
        );
    }

    Ok(object)
}

fn resolve_path<'v>(leaf: &'v Value, attribute: &str) -> Option<&'v Value> {
    let mut current = leaf;
    for segment in attribute
        .strip_prefix("$.")
        .unwrap_or(attribute)
        .split('.')
        .filter(|s| !s.is_empty())
    {
        current = current.get(segment)?;
    }
    Some(current)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
