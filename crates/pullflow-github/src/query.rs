//! Query synthesis.
//!
//! Builds the nested graph query mirroring an entity's unwinding path, or
//! the flat REST URL, from the requested attribute set plus the current
//! cursor. Sibling selections are emitted in sorted order so the same
//! request always produces the same query text.

use std::collections::BTreeMap;

use crate::cursor::CompositeCursor;
use crate::entity::{EntityDescriptor, Transport, VERIFIED_DOMAIN_EMAILS};
use crate::error::{Error, Result};
use crate::page_info::{lookup_after, PageInfo};
use crate::request::{Deployment, EntityProjection, Scope};

/// Inputs for one graph query.
#[derive(Debug)]
pub(crate) struct GraphQuery<'a> {
    pub descriptor: &'static EntityDescriptor,
    pub projection: &'a EntityProjection,
    pub page_size: usize,
    pub chain: Option<&'a PageInfo>,
    pub scope: &'a Scope,
    /// Parent collection key for member-of entities under enterprise scope.
    pub collection_id: Option<&'a str>,
    pub filters: Option<&'a str>,
}

/// Whether an organization-list session collapses the entity's top layer.
///
/// The organization-list root replaces the enterprise container, so
/// entities whose path starts at the enterprise lose one paginated layer.
pub(crate) fn top_collapsed(scope: &Scope, descriptor: &EntityDescriptor) -> bool {
    matches!(scope, Scope::Organizations(_))
        && descriptor
            .path
            .first()
            .map_or(false, |step| step.container == "enterprise")
}

/// Build the graph query text for the current page.
pub(crate) fn build_graph_query(input: &GraphQuery<'_>) -> Result<String> {
    let path = input.descriptor.path;
    let first_step = path
        .first()
        .ok_or_else(|| Error::internal("graph entity has an empty unwinding path"))?;
    let collapsed = top_collapsed(input.scope, input.descriptor);
    let start = usize::from(collapsed);
    let offset = input.chain.map_or(0, |c| c.organization_offset);

    // Resolve the root container and, when rooted at an organization, the
    // login that scopes it (also used by the verified-domain-email field).
    let (root_field, root_args, org_login) = if first_step.container == "enterprise" && !collapsed {
        let Scope::Enterprise(slug) = input.scope else {
            return Err(Error::internal("enterprise root without enterprise scope"));
        };
        ("enterprise", format!("slug: {}", quote(slug)), None)
    } else {
        let login: &str = match input.scope {
            Scope::Organizations(orgs) => orgs
                .get(offset)
                .ok_or_else(|| Error::internal("organization offset out of range"))?,
            Scope::Enterprise(_) => input
                .collection_id
                .ok_or_else(|| Error::internal("missing parent collection id"))?,
        };
        ("organization", format!("login: {}", quote(login)), Some(login))
    };

    let mut content = render_projection(input.projection, input.descriptor, org_login);
    if path.len() > start {
        let last = path.len() - 1;
        for depth in (start..path.len()).rev() {
            let step = &path[depth];
            let first = if depth == last { input.page_size } else { 1 };
            let mut args = format!("first: {first}");
            if let Some(after) = lookup_after(input.chain, depth, collapsed) {
                args.push_str(&format!(", after: {}", quote(&after)));
            }
            if depth == last {
                if let Some(filters) = input.filters {
                    args.push_str(&format!(", {filters}"));
                }
            }
            let body = if depth == last {
                content
            } else {
                format!("id {content}")
            };
            content = format!(
                "{}({args}) {{ pageInfo {{ endCursor hasNextPage }} {} {{ {body} }} }}",
                step.collection,
                step.carrier.field()
            );
        }
        content = format!("id {content}");
    }

    Ok(format!("query {{ {root_field}({root_args}) {{ {content} }} }}"))
}

/// Build the flat REST endpoint for the current page.
///
/// A cursor carrying an absolute next-page URL is replayed verbatim.
pub(crate) fn build_flat_url(
    base: &str,
    deployment: Deployment,
    api_version: Option<&str>,
    descriptor: &EntityDescriptor,
    scope: &Scope,
    composite: &CompositeCursor,
    page_size: usize,
) -> Result<String> {
    if let Some(next) = &composite.cursor {
        return Ok(next.clone());
    }

    let Transport::Flat {
        enterprise_template,
        organization_template,
    } = descriptor.transport
    else {
        return Err(Error::internal(format!(
            "{} is not served by the flat transport",
            descriptor.name
        )));
    };

    let prefix = match deployment {
        Deployment::Cloud => String::new(),
        Deployment::Server => {
            let version = api_version
                .ok_or_else(|| Error::internal("missing API version for server deployment"))?;
            format!("/api/{version}")
        }
    };

    let path = match scope {
        Scope::Enterprise(slug) => enterprise_template.replace("{key}", slug),
        Scope::Organizations(orgs) => {
            let offset = flat_offset(composite)?;
            let login = orgs
                .get(offset)
                .ok_or_else(|| Error::internal("organization offset out of range"))?;
            organization_template.replace("{key}", login)
        }
    };

    Ok(format!("{base}{prefix}{path}?per_page={page_size}"))
}

/// The organization offset stored in a flat-transport cursor.
pub(crate) fn flat_offset(composite: &CompositeCursor) -> Result<usize> {
    match &composite.collection_id {
        None => Ok(0),
        Some(id) => id
            .parse()
            .map_err(|_| Error::cursor(format!("non-numeric organization offset: {id:?}"))),
    }
}

#[derive(Debug, Default)]
struct SelectionNode {
    args: Option<String>,
    children: BTreeMap<String, SelectionNode>,
}

/// Render the leaf attribute selection for an entity.
///
/// Synthesized attributes (the injected parent ids and a synthesized
/// unique id) never reach the query; dotted names expand to nested
/// selections; siblings sort lexicographically.
fn render_projection(
    projection: &EntityProjection,
    descriptor: &EntityDescriptor,
    org_login: Option<&str>,
) -> String {
    let mut tree = BTreeMap::new();
    project_into(&mut tree, projection, Some(descriptor), org_login);
    render_nodes(&tree)
}

fn project_into(
    tree: &mut BTreeMap<String, SelectionNode>,
    projection: &EntityProjection,
    descriptor: Option<&EntityDescriptor>,
    org_login: Option<&str>,
) {
    for attribute in &projection.attributes {
        if let Some(d) = descriptor {
            if synthesized(d, attribute) {
                continue;
            }
        }
        let segments = split_path(attribute);
        if segments.is_empty() {
            continue;
        }
        insert_path(tree, &segments);
    }
    for child in &projection.children {
        let segments = split_path(&child.name);
        if segments.is_empty() {
            continue;
        }
        let node = insert_path(tree, &segments);
        if segments.last() == Some(&VERIFIED_DOMAIN_EMAILS) {
            // A scalar list scoped to the containing organization; no
            // sub-selection.
            node.args = org_login.map(|login| format!("login: {}", quote(login)));
        } else {
            project_into(&mut node.children, child, None, org_login);
        }
    }
}

fn synthesized(descriptor: &EntityDescriptor, attribute: &str) -> bool {
    descriptor.injections.contains(&attribute)
        || (descriptor.synthesizes_unique_id() && attribute == descriptor.unique_id_field)
}

fn insert_path<'t>(
    mut tree: &'t mut BTreeMap<String, SelectionNode>,
    segments: &[&str],
) -> &'t mut SelectionNode {
    let (last, init) = match segments.split_last() {
        Some(parts) => parts,
        None => unreachable!("insert_path called with empty segments"),
    };
    for segment in init {
        tree = &mut tree.entry((*segment).to_string()).or_default().children;
    }
    tree.entry((*last).to_string()).or_default()
}

fn render_nodes(tree: &BTreeMap<String, SelectionNode>) -> String {
    let mut parts = Vec::with_capacity(tree.len());
    for (name, node) in tree {
        let mut rendered = name.clone();
        if let Some(args) = &node.args {
            rendered.push_str(&format!("({args})"));
        }
        if !node.children.is_empty() {
            rendered.push_str(&format!(" {{ {} }}", render_nodes(&node.children)));
        }
        parts.push(rendered);
    }
    parts.join(" ")
}

fn split_path(attribute: &str) -> Vec<&str> {
    attribute
        .strip_prefix("$.")
        .unwrap_or(attribute)
        .split('.')
        .filter(|s| !s.is_empty())
        .collect()
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
