//! Entity services over the HTTP transport.

use async_trait::async_trait;
use entigraph_core::{field, Entity, EntityId, EntityMapper, MappingRule, MappingTable};
use entigraph_service::{
    EntityService, Filter, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    RequestOptions, ServiceConfig,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Serves fixed JSON bodies by URL and records every request.
#[derive(Default)]
struct FakeUpstream {
    routes: HashMap<String, (u16, Value)>,
    delay: Option<Duration>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl FakeUpstream {
    fn route(mut self, url: &str, status: u16, body: Value) -> Self {
        self.routes.insert(url.to_string(), (status, body));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn requests(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl HttpClient for FakeUpstream {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.sent.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if request.method == HttpMethod::Put {
            let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(b"{}"))
                .map_err(|e| e.to_string())?;
            let mut merged = self
                .routes
                .get(&request.url)
                .map(|(_, stored)| stored.clone())
                .unwrap_or_else(|| json!({}));
            if let (Value::Object(merged), Value::Object(body)) = (&mut merged, body) {
                merged.extend(body);
            }
            return Ok(HttpResponse::json(200, &merged));
        }
        Ok(match self.routes.get(&request.url) {
            Some((status, body)) => HttpResponse::json(*status, body),
            None => HttpResponse::json(404, &json!({"error": "not found"})),
        })
    }
}

#[derive(Default)]
struct Unit {
    id: i64,
    code: String,
    name: Option<String>,
}

impl Entity for Unit {
    type Params = ();

    fn entity_id(&self) -> EntityId {
        EntityId::from(self.id)
    }
}

fn units(upstream: FakeUpstream) -> (Arc<HttpTransport<FakeUpstream>>, EntityService<Unit>) {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Unit, id)).required())
        .rule(MappingRule::rename("code", field!(Unit, code)))
        .rule(MappingRule::rename("name", field!(Unit, name)))
        .round_trip(&["name"])
        .build()
        .unwrap();
    let mapper = EntityMapper::new(table, |id, _, _| {
        Ok(Unit {
            id: id.as_num().unwrap_or_default(),
            ..Unit::default()
        })
    });
    let transport = Arc::new(HttpTransport::new("https://lms.example.edu/api/", upstream));
    let service = EntityService::new(ServiceConfig::new("units"), transport.clone(), mapper);
    (transport, service)
}

fn upstream() -> FakeUpstream {
    FakeUpstream::default()
        .route(
            "https://lms.example.edu/api/units/7",
            200,
            json!({"id": 7, "code": "COS10001", "name": "Intro"}),
        )
        .route(
            "https://lms.example.edu/api/units?active=true",
            200,
            json!([{"id": 7, "code": "COS10001"}, {"id": 8, "code": "COS20007"}]),
        )
        .route(
            "https://lms.example.edu/api/units/9",
            503,
            json!({"error": "maintenance"}),
        )
}

#[tokio::test]
async fn get_reads_over_http_once() {
    let (transport, units) = units(upstream());

    let first = units.get(7, RequestOptions::new()).await.unwrap();
    let second = units.get(7, RequestOptions::new()).await.unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(first.read().code, "COS10001");
    assert_eq!(transport.client().requests(), 1);
}

#[tokio::test]
async fn concurrent_fetches_share_one_request() {
    let (transport, units) = units(upstream().with_delay(Duration::from_millis(10)));

    let (a, b) = tokio::join!(
        units.fetch(7, RequestOptions::new()),
        units.fetch(7, RequestOptions::new()),
    );

    assert!(a.unwrap().ptr_eq(&b.unwrap()));
    assert_eq!(transport.client().requests(), 1);
}

#[tokio::test]
async fn list_decodes_into_the_global_scope() {
    let (_, units) = units(upstream());
    let cached = units.get(7, RequestOptions::new()).await.unwrap();

    let listed = units
        .fetch_all(&Filter::new().eq("active", true), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(listed.len(), 2);
    assert!(listed[0].ptr_eq(&cached));
    // The list entry lacks `name`, which stays as read before.
    assert_eq!(cached.read().name.as_deref(), Some("Intro"));
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let (transport, units) = units(upstream());

    let missing = units.get(99, RequestOptions::new()).await.unwrap_err();
    assert!(missing.is_not_found());
    assert_eq!(missing.to_string(), "units 99 not found");

    let unavailable = units.get(9, RequestOptions::new()).await.unwrap_err();
    assert!(unavailable.is_retryable());
    assert!(units.cache().is_empty());
    assert!(transport.last_error().unwrap().contains("503"));
}

#[tokio::test]
async fn update_puts_round_trip_fields() {
    let (transport, units) = units(upstream());
    let unit = units.get(7, RequestOptions::new()).await.unwrap();

    unit.write().name = Some("Introduction to Programming".into());
    units.update(&unit, RequestOptions::new()).await.unwrap();

    let sent = transport.client().sent.lock().clone();
    let put = sent.last().unwrap();
    assert_eq!(put.method, HttpMethod::Put);
    assert_eq!(put.url, "https://lms.example.edu/api/units/7");
    let body: Value = serde_json::from_slice(put.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"name": "Introduction to Programming"}));

    assert_eq!(unit.read().name.as_deref(), Some("Introduction to Programming"));
    assert_eq!(unit.read().code, "COS10001");
}
