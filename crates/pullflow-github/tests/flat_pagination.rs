//! End-to-end REST listing tests against a mock server.

#![allow(clippy::unwrap_used)]

use pullflow_github::{
    descriptor, CompositeCursor, Deployment, EntityProjection, Error, GithubConnector,
    PageRequest, Scope,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connector() -> GithubConnector {
    GithubConnector::builder().allow_http(true).build().unwrap()
}

fn alert_request(server: &MockServer, scope: Scope, cursor: Option<String>) -> PageRequest {
    PageRequest {
        address: server.uri(),
        credential: "Bearer test-token".to_string(),
        entity: EntityProjection::new(
            "SecretScanningAlert",
            vec!["number".to_string(), "state".to_string()],
        ),
        page_size: 1,
        cursor,
        scope,
        deployment: Deployment::Server,
        api_version: Some("v3".to_string()),
        ordered: false,
        filters: None,
        timeout: None,
    }
}

#[tokio::test]
async fn enterprise_listing_follows_next_links() {
    let server = MockServer::start().await;
    let alerts_path = "/api/v3/enterprises/SGNL/secret-scanning/alerts";
    let next_url = format!("{}{alerts_path}?per_page=1&page=2", server.uri());

    Mock::given(method("GET"))
        .and(path(alerts_path))
        .and(query_param("per_page", "1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 1, "state": "open"}]))
                .insert_header("Link", format!("<{next_url}>; rel=\"next\"").as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(alerts_path))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 2, "state": "resolved"}]))
                .insert_header("Link", format!("<{}{alerts_path}?per_page=1>; rel=\"prev\"", server.uri()).as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let connector = connector();
    let scope = Scope::Enterprise("SGNL".to_string());

    let page = connector
        .get_page(&alert_request(&server, scope.clone(), None))
        .await
        .unwrap();
    assert_eq!(page.objects.len(), 1);
    assert_eq!(page.objects[0]["number"], 1);

    // The continuation is the absolute next-page URL, replayed verbatim.
    let token = page.next_cursor.unwrap();
    let composite =
        CompositeCursor::decode(&token, descriptor("SecretScanningAlert").unwrap(), &scope)
            .unwrap();
    assert_eq!(composite.cursor.as_deref(), Some(next_url.as_str()));

    let page = connector
        .get_page(&alert_request(&server, scope, Some(token)))
        .await
        .unwrap();
    assert_eq!(page.objects.len(), 1);
    assert_eq!(page.objects[0]["number"], 2);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn organization_list_steps_through_offsets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/orgs/org-alpha/secret-scanning/alerts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 10, "state": "open"}]))
                .insert_header("Link", "<https://unused.example.com>; rel=\"prev\""),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/orgs/org-beta/secret-scanning/alerts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"number": 20, "state": "open"}]))
                .insert_header("Link", "<https://unused.example.com>; rel=\"prev\""),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let connector = connector();
    let scope = Scope::Organizations(vec!["org-alpha".to_string(), "org-beta".to_string()]);

    let page = connector
        .get_page(&alert_request(&server, scope.clone(), None))
        .await
        .unwrap();
    assert_eq!(page.objects[0]["number"], 10);

    // No next link for org-alpha: the cursor carries only the bumped
    // organization offset.
    let token = page.next_cursor.unwrap();
    let composite =
        CompositeCursor::decode(&token, descriptor("SecretScanningAlert").unwrap(), &scope)
            .unwrap();
    assert!(composite.cursor.is_none());
    assert_eq!(composite.collection_id.as_deref(), Some("1"));

    let page = connector
        .get_page(&alert_request(&server, scope, Some(token)))
        .await
        .unwrap();
    assert_eq!(page.objects[0]["number"], 20);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn missing_link_header_is_a_shape_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/enterprises/SGNL/secret-scanning/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = connector()
        .get_page(&alert_request(
            &server,
            Scope::Enterprise("SGNL".to_string()),
            None,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Shape(_)));
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/enterprises/SGNL/secret-scanning/alerts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = connector()
        .get_page(&alert_request(
            &server,
            Scope::Enterprise("SGNL".to_string()),
            None,
        ))
        .await
        .unwrap_err();
    match &err {
        Error::SourceStatus { status, .. } => assert_eq!(*status, 503),
        other => panic!("expected a status error, got {other:?}"),
    }
    assert!(err.is_retryable());
}
