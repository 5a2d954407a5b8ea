//! Static entity registry.
//!
//! The registry is the single source of truth for entity shape: where an
//! entity's leaves live inside the nested GraphQL response, which parent
//! identifiers are stamped onto every emitted object, how its unique id is
//! formed, and which transport serves it. It is built once and never
//! mutated.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Terminal list shape under a collection.
///
/// `Edges` means the source wraps each element in an object carrying a
/// relationship attribute (e.g. `role`) alongside the nested `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    /// Bare leaf objects under `nodes`.
    Nodes,
    /// Wrapped leaf objects under `edges`.
    Edges,
}

impl Carrier {
    /// The response field holding the elements.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Edges => "edges",
        }
    }
}

/// One step of an entity's unwinding path: the container holding a
/// paginated collection, and the carrier its elements live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// Response field naming the container object.
    pub container: &'static str,
    /// Container field naming the paginated collection.
    pub collection: &'static str,
    /// Shape of the collection's element list.
    pub carrier: Carrier,
}

const fn nodes(container: &'static str, collection: &'static str) -> PathStep {
    PathStep {
        container,
        collection,
        carrier: Carrier::Nodes,
    }
}

const fn edges(container: &'static str, collection: &'static str) -> PathStep {
    PathStep {
        container,
        collection,
        carrier: Carrier::Edges,
    }
}

/// Which query surface serves an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Nested GraphQL traversal.
    Graph,
    /// Flat REST listing, with one path template per scope.
    Flat {
        /// Endpoint template for enterprise scope; `{key}` is the slug.
        enterprise_template: &'static str,
        /// Endpoint template for organization scope; `{key}` is the login.
        organization_template: &'static str,
    },
}

/// Immutable description of one enumerable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity name as requested by callers.
    pub name: &'static str,
    /// Attribute carrying the unique id on emitted objects.
    pub unique_id_field: &'static str,
    /// When set, the unique id is synthesized as `<part0>-<part1>`, each
    /// part resolved from the flattened object by attribute name.
    pub unique_id_parts: Option<(&'static str, &'static str)>,
    /// Parent-scope identifiers stamped onto every emitted object.
    pub injections: &'static [&'static str],
    /// Container/collection steps locating the entity's leaves.
    pub path: &'static [PathStep],
    /// Parent collection this entity ranges over when the session is
    /// enterprise-scoped.
    pub member_of: Option<&'static str>,
    /// Parent attribute used as the collection key (e.g. `login`).
    pub collection_key: Option<&'static str>,
    /// Query surface serving the entity.
    pub transport: Transport,
}

impl EntityDescriptor {
    /// Whether the entity is served by the flat REST surface.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        matches!(self.transport, Transport::Flat { .. })
    }

    /// Whether the unique id is synthesized rather than fetched.
    #[must_use]
    pub fn synthesizes_unique_id(&self) -> bool {
        self.unique_id_parts.is_some()
    }
}

/// Attribute on users that resolves verified domain emails; takes the
/// containing organization's login as an argument and returns a bare list
/// of strings.
pub const VERIFIED_DOMAIN_EMAILS: &str = "organizationVerifiedDomainEmails";

const ENTERPRISE_ORGS: PathStep = nodes("enterprise", "organizations");
const ORG_USERS: PathStep = nodes("organization", "users");
const ORG_TEAMS: PathStep = nodes("organization", "teams");
const ORG_REPOS: PathStep = nodes("organization", "repositories");
const REPO_COLLABORATORS: PathStep = nodes("repository", "collaborators");
const REPO_LABELS: PathStep = nodes("repository", "labels");
const REPO_ISSUES: PathStep = nodes("repository", "issues");
const REPO_PULLS: PathStep = nodes("repository", "pullRequests");
const LABEL_ISSUES: PathStep = nodes("label", "issues");
const LABEL_PULLS: PathStep = nodes("label", "pullRequests");
const ISSUE_ASSIGNEES: PathStep = nodes("issue", "assignees");
const ISSUE_PARTICIPANTS: PathStep = nodes("issue", "participants");
const PULL_ASSIGNEES: PathStep = nodes("pullRequest", "assignees");
const PULL_PARTICIPANTS: PathStep = nodes("pullRequest", "participants");
const PULL_COMMITS: PathStep = nodes("pullRequest", "commits");
const PULL_FILES: PathStep = nodes("pullRequest", "files");
const PULL_REVIEWS: PathStep = nodes("pullRequest", "reviews");
const ORG_USER_EDGES: PathStep = edges("organization", "users");

const GRAPH: Transport = Transport::Graph;

macro_rules! graph_entity {
    ($name:literal, $uid:literal, $parts:expr, $inj:expr, $path:expr) => {
        EntityDescriptor {
            name: $name,
            unique_id_field: $uid,
            unique_id_parts: $parts,
            injections: $inj,
            path: $path,
            member_of: None,
            collection_key: None,
            transport: GRAPH,
        }
    };
}

static ENTITIES: &[EntityDescriptor] = &[
    graph_entity!(
        "Organization",
        "id",
        None,
        &["enterpriseId"],
        &[ENTERPRISE_ORGS]
    ),
    graph_entity!(
        "User",
        "id",
        None,
        &["enterpriseId"],
        &[ENTERPRISE_ORGS, ORG_USERS]
    ),
    graph_entity!(
        "Team",
        "id",
        None,
        &["enterpriseId", "orgId"],
        &[ENTERPRISE_ORGS, ORG_TEAMS]
    ),
    graph_entity!(
        "Repository",
        "id",
        None,
        &["enterpriseId", "orgId"],
        &[ENTERPRISE_ORGS, ORG_REPOS]
    ),
    graph_entity!(
        "Collaborator",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_COLLABORATORS]
    ),
    graph_entity!(
        "Label",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_LABELS]
    ),
    graph_entity!(
        "Issue",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_ISSUES]
    ),
    graph_entity!(
        "PullRequest",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS]
    ),
    graph_entity!(
        "IssueLabel",
        "uniqueId",
        Some(("labelId", "id")),
        &["enterpriseId", "orgId", "repositoryId", "labelId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_LABELS, LABEL_ISSUES]
    ),
    graph_entity!(
        "PullRequestLabel",
        "uniqueId",
        Some(("labelId", "id")),
        &["enterpriseId", "orgId", "repositoryId", "labelId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_LABELS, LABEL_PULLS]
    ),
    graph_entity!(
        "IssueAssignee",
        "uniqueId",
        Some(("issueId", "id")),
        &["enterpriseId", "orgId", "repositoryId", "issueId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_ISSUES, ISSUE_ASSIGNEES]
    ),
    graph_entity!(
        "IssueParticipant",
        "uniqueId",
        Some(("issueId", "id")),
        &["enterpriseId", "orgId", "repositoryId", "issueId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_ISSUES, ISSUE_PARTICIPANTS]
    ),
    graph_entity!(
        "PullRequestAssignee",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId", "pullRequestId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS, PULL_ASSIGNEES]
    ),
    graph_entity!(
        "PullRequestParticipant",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId", "pullRequestId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS, PULL_PARTICIPANTS]
    ),
    graph_entity!(
        "PullRequestCommit",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId", "pullRequestId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS, PULL_COMMITS]
    ),
    graph_entity!(
        "PullRequestChangedFile",
        "uniqueId",
        Some(("pullRequestId", "path")),
        &["enterpriseId", "orgId", "repositoryId", "pullRequestId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS, PULL_FILES]
    ),
    graph_entity!(
        "PullRequestReview",
        "id",
        None,
        &["enterpriseId", "orgId", "repositoryId", "pullRequestId"],
        &[ENTERPRISE_ORGS, ORG_REPOS, REPO_PULLS, PULL_REVIEWS]
    ),
    EntityDescriptor {
        name: "OrganizationUser",
        unique_id_field: "uniqueId",
        unique_id_parts: Some(("orgId", "$.node.id")),
        injections: &["orgId"],
        path: &[ORG_USER_EDGES],
        member_of: Some("Organization"),
        collection_key: Some("login"),
        transport: GRAPH,
    },
    EntityDescriptor {
        name: "SecretScanningAlert",
        unique_id_field: "number",
        unique_id_parts: None,
        injections: &[],
        path: &[],
        member_of: None,
        collection_key: None,
        transport: Transport::Flat {
            enterprise_template: "/enterprises/{key}/secret-scanning/alerts",
            organization_template: "/orgs/{key}/secret-scanning/alerts",
        },
    },
];

/// Look up an entity descriptor by name.
#[must_use]
pub fn descriptor(name: &str) -> Option<&'static EntityDescriptor> {
    static INDEX: OnceLock<HashMap<&'static str, &'static EntityDescriptor>> = OnceLock::new();
    INDEX
        .get_or_init(|| ENTITIES.iter().map(|d| (d.name, d)).collect())
        .get(name)
        .copied()
}

/// The container whose id sources a given injection attribute.
#[must_use]
pub fn injection_container(injection: &str) -> Option<&'static str> {
    match injection {
        "enterpriseId" => Some("enterprise"),
        "orgId" => Some("organization"),
        "repositoryId" => Some("repository"),
        "labelId" => Some("label"),
        "issueId" => Some("issue"),
        "pullRequestId" => Some("pullRequest"),
        _ => None,
    }
}
