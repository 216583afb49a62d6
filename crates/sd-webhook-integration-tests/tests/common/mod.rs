//! Common test utilities for the end-to-end tests
//!
//! This module provides:
//! - A wiremock Service Desk site answering the REST calls the dispatcher makes
//! - Delivery builders whose issue links point at that site
//! - A recording handler whose calls can be asserted on

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request as HttpRequest, StatusCode},
    Router,
};
use sd_webhook_api::{create_router, AppState, ServiceConfig};
use sd_webhook_core::adapters::RestServiceDesk;
use sd_webhook_core::{
    Capability, CapabilitySet, ChangelogItem, CustomFieldCache, Dispatcher, HandlerContext,
    HandlerLocator, HandlerRegistry, RequestTypeResolver, TicketHandler, TicketView,
};
use serde_json::{json, Value};
use servicedesk_sdk::{Credentials, CustomFieldApi, ServiceDeskClient};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Login of the automation account.
pub const BOT: &str = "automation";

/// Project every test ticket lives in.
pub const PROJECT: &str = "ITS";

/// Custom field holding the request type on the mock site.
pub const REQUEST_TYPE_FIELD: &str = "customfield_10010";

// ============================================================================
// Mock Service Desk site
// ============================================================================

/// A Service Desk site backed by wiremock.
///
/// The request type custom field is always discoverable; everything else
/// has to be mounted by the test that needs it.
pub struct Site {
    server: MockServer,
}

impl Site {
    pub async fn start() -> Self {
        let site = Self::without_request_type_field().await;
        Mock::given(method("GET"))
            .and(path("/rest/jiracustomfieldeditorplugin/1/admin/customfields"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "fieldId": 10020, "fieldName": "Organizations" },
                { "fieldId": 10010, "fieldName": "Customer Request Type" }
            ])))
            .mount(&site.server)
            .await;
        site
    }

    /// A site whose custom field listing knows no request type field.
    pub async fn without_request_type_field() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Requests the site received for `method_name` on `request_path`.
    pub async fn requests(&self, method_name: &str, request_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == method_name && r.url.path() == request_path)
            .collect()
    }

    /// Every request except custom field discovery.
    pub async fn ticket_requests(&self) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.path().contains("customfield") && r.url.path() != "/rest/api/2/field")
            .collect()
    }

    /// JSON bodies of the comments posted on `key`.
    pub async fn posted_comments(&self, key: &str) -> Vec<Value> {
        self.requests("POST", &comment_path(key))
            .await
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    pub async fn accept_comments(&self, key: &str) {
        self.respond_to_comments(key, 201).await;
    }

    pub async fn respond_to_comments(&self, key: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(comment_path(key)))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "id": "1" })))
            .mount(&self.server)
            .await;
    }

    /// Make the latest comment on `key` one written by `author`.
    pub async fn latest_comment_by(&self, key: &str, author: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/rest/api/2/issue/{key}/comment")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comments": [
                    { "id": "100", "body": "first", "author": { "name": "someone-else" } },
                    { "id": "101", "body": "latest", "author": { "name": author } }
                ]
            })))
            .mount(&self.server)
            .await;
    }

    /// Accept the three-step attachment upload for `key`.
    pub async fn accept_attachments(&self, key: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/servicedeskapi/servicedesk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    { "id": "3", "projectKey": "HR" },
                    { "id": "7", "projectKey": PROJECT }
                ]
            })))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/servicedeskapi/servicedesk/7/attachTemporaryFile"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "temporaryAttachments": [ { "temporaryAttachmentId": "tmp-1" } ]
            })))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(attachment_path(key)))
            .respond_with(ResponseTemplate::new(201))
            .mount(&self.server)
            .await;
    }

    /// Offer a single workflow transition on `key` leading to `status`.
    pub async fn offer_transition(&self, key: &str, id: &str, status: &str) {
        let transitions = format!("/rest/api/2/issue/{key}/transitions");
        Mock::given(method("GET"))
            .and(path(transitions.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transitions": [
                    { "id": id, "name": format!("Move to {status}"), "to": { "name": status } }
                ]
            })))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(transitions))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }
}

pub fn comment_path(key: &str) -> String {
    format!("/rest/servicedeskapi/request/{key}/comment")
}

pub fn attachment_path(key: &str) -> String {
    format!("/rest/servicedeskapi/request/{key}/attachment")
}

// ============================================================================
// Deliveries
// ============================================================================

/// A Service Desk delivery for `key` raised by an identified customer.
///
/// `request_type` of `None` leaves the request type field `null`.
pub fn delivery(site: &Site, key: &str, request_type: Option<&str>) -> Value {
    let mut payload = json!({
        "issue": {
            "self": format!("{}/rest/api/2/issue/10001", site.uri()),
            "key": key,
            "fields": {
                "project": { "key": PROJECT },
                "summary": "New laptop",
                "status": { "name": "Waiting for support" },
                "reporter": {
                    "name": "alice",
                    "emailAddress": "alice@example.com",
                    "displayName": "Alice"
                }
            }
        }
    });
    payload["issue"]["fields"][REQUEST_TYPE_FIELD] = match request_type {
        Some(id) => json!({ "requestType": { "id": id, "name": "Hardware" } }),
        None => Value::Null,
    };
    payload
}

/// A delivery whose reporter cannot be identified.
pub fn anonymous_delivery(site: &Site, key: &str, request_type: &str) -> Value {
    let mut payload = delivery(site, key, Some(request_type));
    payload["issue"]["fields"]["reporter"] = json!({ "displayName": "Anonymous" });
    payload
}

/// Attach a comment written by `author` to a delivery.
pub fn with_comment(mut payload: Value, author: &str) -> Value {
    payload["comment"] = json!({ "id": "55", "body": "Any update?", "author": { "name": author } });
    payload
}

/// A platform issue update carrying `items` in its changelog.
pub fn platform_update(site: &Site, key: &str, request_type: &str, items: Value) -> Value {
    let mut payload = delivery(site, key, Some(request_type));
    payload["webhookEvent"] = json!("jira:issue_updated");
    payload["issue_event_type_name"] = json!("issue_generic");
    payload["changelog"] = json!({ "id": "9001", "items": items });
    payload
}

// ============================================================================
// Recording handler
// ============================================================================

/// Shared record of handler slot calls, in call order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Handler that records every slot call and can be told to fail one.
#[derive(Clone)]
pub struct RecordingHandler {
    capabilities: CapabilitySet,
    persist: bool,
    fail_on: Option<Capability>,
    log: CallLog,
}

impl RecordingHandler {
    pub fn new(log: &CallLog, capabilities: &[Capability]) -> Self {
        Self {
            capabilities: capabilities.iter().copied().collect(),
            persist: false,
            fail_on: None,
            log: log.clone(),
        }
    }

    pub fn persisting(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn failing_on(mut self, capability: Capability) -> Self {
        self.fail_on = Some(capability);
        self
    }

    fn record(&self, capability: Capability, entry: String) -> anyhow::Result<()> {
        self.log.push(entry);
        if self.fail_on == Some(capability) {
            anyhow::bail!("{capability} slot refused the ticket");
        }
        Ok(())
    }
}

fn side(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

#[async_trait]
impl TicketHandler for RecordingHandler {
    fn capabilities(&self) -> Option<CapabilitySet> {
        Some(self.capabilities.clone())
    }

    fn persist_raw_payload(&self) -> bool {
        self.persist
    }

    async fn create(&self, _ctx: &HandlerContext, ticket: &TicketView) -> anyhow::Result<()> {
        self.record(Capability::Create, format!("create:{}", ticket.key()))
    }

    async fn comment(&self, _ctx: &HandlerContext, ticket: &TicketView) -> anyhow::Result<()> {
        self.record(Capability::Comment, format!("comment:{}", ticket.key()))
    }

    async fn transition(
        &self,
        _ctx: &HandlerContext,
        from: Option<&str>,
        to: Option<&str>,
        _ticket: &TicketView,
    ) -> anyhow::Result<()> {
        self.record(
            Capability::Transition,
            format!("transition:{}->{}", side(from), side(to)),
        )
    }

    async fn assignment(
        &self,
        _ctx: &HandlerContext,
        from: Option<&str>,
        to: Option<&str>,
        _ticket: &TicketView,
    ) -> anyhow::Result<()> {
        self.record(
            Capability::Assignment,
            format!("assignment:{}->{}", side(from), side(to)),
        )
    }

    async fn org_change(&self, _ctx: &HandlerContext, ticket: &TicketView) -> anyhow::Result<()> {
        self.record(Capability::OrgChange, format!("org_change:{}", ticket.key()))
    }

    async fn generic_hook(
        &self,
        _ctx: &HandlerContext,
        _ticket: &TicketView,
        changelog: Option<&[ChangelogItem]>,
    ) -> anyhow::Result<()> {
        let fields: Vec<&str> = changelog
            .unwrap_or_default()
            .iter()
            .map(|item| item.field.as_str())
            .collect();
        self.record(
            Capability::JiraHook,
            format!("generic_hook:{}", fields.join(",")),
        )
    }
}

/// Registry holding a single recording handler under `name`.
pub fn registry_with(name: &str, handler: RecordingHandler) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(name, move || handler.clone());
    registry
}

// ============================================================================
// Application
// ============================================================================

/// Router wired to `site` through the REST adapter.
pub fn app(site: &Site, registry: HandlerRegistry, table: &[(&str, &str)]) -> Router {
    let dispatcher = dispatcher(registry, table);
    let state = AppState::new(ServiceConfig::default(), Arc::new(dispatcher));
    create_router(state)
}

/// Dispatcher acting as [`BOT`] against whatever site a ticket names.
pub fn dispatcher(registry: HandlerRegistry, table: &[(&str, &str)]) -> Dispatcher {
    let client = ServiceDeskClient::builder(Credentials::new(BOT, "pw"))
        .build()
        .unwrap();
    let desk = Arc::new(RestServiceDesk::new(client, CustomFieldApi::Server));
    let cache = CustomFieldCache::in_memory(desk.clone());
    let resolver = RequestTypeResolver::new(Arc::new(cache));

    let table: HashMap<String, String> = table
        .iter()
        .map(|(request_type, handler)| (request_type.to_string(), handler.to_string()))
        .collect();
    let locator = HandlerLocator::new(table, Arc::new(registry));

    Dispatcher::new(desk, Arc::new(resolver), locator)
}

/// POST a raw body to `route` and return the response status.
pub async fn post_raw(app: Router, route: &str, body: impl Into<Body>) -> StatusCode {
    let request = HttpRequest::builder()
        .method("POST")
        .uri(route)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();

    app.oneshot(request).await.unwrap().status()
}

/// POST a JSON delivery to `route` and return the response status.
pub async fn post(app: Router, route: &str, payload: &Value) -> StatusCode {
    post_raw(app, route, payload.to_string()).await
}
