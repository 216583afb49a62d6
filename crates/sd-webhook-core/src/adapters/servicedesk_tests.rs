//! Tests for the REST adapter.

use super::*;
use servicedesk_sdk::Credentials;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn desk(api: CustomFieldApi) -> RestServiceDesk {
    let client = ServiceDeskClient::builder(Credentials::new("automation", "pw"))
        .build()
        .unwrap();
    RestServiceDesk::new(client, api)
}

fn ticket_on(server: &MockServer) -> TicketRef {
    TicketRef {
        key: "ITS-5".to_string(),
        project: "ITS".to_string(),
        root_url: server.uri(),
    }
}

#[tokio::test]
async fn test_post_comment_targets_ticket_site() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/servicedeskapi/request/ITS-5/comment"))
        .and(body_json(json!({ "body": "hi", "public": true })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    desk(CustomFieldApi::Server)
        .post_comment(&ticket_on(&server), "hi", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_errors_are_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/servicedeskapi/request/ITS-5/comment"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = desk(CustomFieldApi::Server)
        .post_comment(&ticket_on(&server), "hi", false)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceDeskError::Api(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_invalid_site_is_rejected_without_request() {
    let ticket = TicketRef {
        key: "ITS-5".to_string(),
        project: "ITS".to_string(),
        root_url: "nonsense".to_string(),
    };

    let err = desk(CustomFieldApi::Cloud)
        .fetch_ticket(&ticket)
        .await
        .unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_custom_field_lookup_uses_configured_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/field"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "customfield_10100", "name": "Request Type" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let id = desk(CustomFieldApi::Cloud)
        .lookup_custom_field_id(&server.uri(), "Request Type")
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("customfield_10100"));
}

#[tokio::test]
async fn test_latest_comment_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/ITS-5/comment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "comments": [ { "body": "ok", "author": { "name": "automation" } } ]
        })))
        .mount(&server)
        .await;

    let desk = desk(CustomFieldApi::Server);
    let comment = desk
        .latest_comment(&ticket_on(&server))
        .await
        .unwrap()
        .unwrap();
    assert!(desk.is_automation_account(&comment.author));
}

#[test]
fn test_automation_account_matches_any_identifier() {
    let desk = desk(CustomFieldApi::Server);

    let by_name = CommentAuthor {
        name: Some("automation".to_string()),
        ..CommentAuthor::default()
    };
    let by_email = CommentAuthor {
        email_address: Some("automation".to_string()),
        ..CommentAuthor::default()
    };
    let customer = CommentAuthor {
        name: Some("alice".to_string()),
        display_name: Some("automation".to_string()),
        ..CommentAuthor::default()
    };

    assert!(desk.is_automation_account(&by_name));
    assert!(desk.is_automation_account(&by_email));
    assert!(!desk.is_automation_account(&customer));
    assert!(!desk.is_automation_account(&CommentAuthor::default()));
}
