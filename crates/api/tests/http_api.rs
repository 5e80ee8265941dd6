use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use larder_core::OrganizationId;
use larder_infra::{CoreConfig, InMemoryStore, Services};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, over an in-memory store and an ephemeral port.
        let services = Services::new(Arc::new(InMemoryStore::new()), CoreConfig::default());
        let app = larder_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    org: OrganizationId,
}

impl Client {
    fn new(srv: &TestServer) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            org: OrganizationId::new(),
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-organization-id", self.org.to_string());
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }
}

/// A restaurant with 1000 g of flour (min 500) and a baguette using 150 g.
async fn seed(client: &Client) -> (String, String, String) {
    let (status, restaurant) = client.post("/restaurants", json!({ "name": "Oberkampf" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let restaurant_id = restaurant["id"].as_str().unwrap().to_string();

    let (status, flour) = client
        .put(
            "/ingredients",
            json!({ "name": "Farine T55", "unit": "g", "cost_per_unit": 0.002 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let flour_id = flour["id"].as_str().unwrap().to_string();

    let (status, _) = client
        .post(
            &format!("/restaurants/{restaurant_id}/inventory"),
            json!({ "ingredient_id": flour_id, "current_stock": 1000.0, "min_threshold": 500.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, baguette) = client
        .put(
            "/products",
            json!({
                "name": "Baguette",
                "category": "Boulangerie",
                "unit_price": 1.2,
                "recipe": [{ "ingredient_id": flour_id, "quantity_needed": 150.0 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let baguette_id = baguette["id"].as_str().unwrap().to_string();

    (restaurant_id, flour_id, baguette_id)
}

fn flour_stock(records: &Value, flour_id: &str) -> f64 {
    records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["ingredient_id"] == flour_id)
        .and_then(|r| r["current_stock"].as_f64())
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_organization() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn organization_header_is_required() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .get(format!("{}/restaurants", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_organization");
}

#[tokio::test]
async fn sale_lifecycle_moves_stock_and_raises_shortage() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    let (restaurant_id, flour_id, baguette_id) = seed(&client).await;

    let (status, sale) = client
        .post(
            &format!("/restaurants/{restaurant_id}/sales"),
            json!({
                "product_id": baguette_id,
                "quantity": 6,
                "amount": 7.2,
                "sale_date": "2026-10-16",
                "sale_hour": 12
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let sale_id = sale["id"].as_str().unwrap().to_string();

    let (_, records) = client.get(&format!("/restaurants/{restaurant_id}/inventory")).await;
    assert_eq!(flour_stock(&records, &flour_id), 100.0);

    let (status, alerts) = client.get(&format!("/restaurants/{restaurant_id}/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "SHORTAGE");
    assert_eq!(alerts[0]["severity"], "high");

    let (status, _) = client
        .send(
            reqwest::Method::PATCH,
            &format!("/restaurants/{restaurant_id}/sales/{sale_id}"),
            Some(json!({ "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, records) = client.get(&format!("/restaurants/{restaurant_id}/inventory")).await;
    assert_eq!(flour_stock(&records, &flour_id), 700.0);

    let (status, _) = client
        .send(
            reqwest::Method::DELETE,
            &format!("/restaurants/{restaurant_id}/sales/{sale_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, records) = client.get(&format!("/restaurants/{restaurant_id}/inventory")).await;
    assert_eq!(flour_stock(&records, &flour_id), 1000.0);

    let (status, body) = client
        .get(&format!("/restaurants/{restaurant_id}/sales/{sale_id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn recipe_in_incompatible_unit_is_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    let (_, flour_id, _) = seed(&client).await;

    let (status, body) = client
        .put(
            "/products",
            json!({
                "name": "Pain de mie",
                "category": "Boulangerie",
                "unit_price": 3.5,
                "recipe": [{ "ingredient_id": flour_id, "quantity_needed": 0.5, "unit": "l" }]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "incompatible_unit");
}

#[tokio::test]
async fn other_organizations_cannot_see_restaurants() {
    let srv = TestServer::spawn().await;
    let owner = Client::new(&srv);
    let (restaurant_id, _, _) = seed(&owner).await;

    let stranger = Client::new(&srv);
    let (status, _) = stranger
        .get(&format!("/restaurants/{restaurant_id}/inventory"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, restaurants) = stranger.get("/restaurants").await;
    assert_eq!(status, StatusCode::OK);
    assert!(restaurants.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn accepting_an_order_recommendation_restocks_once() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    let (restaurant_id, flour_id, baguette_id) = seed(&client).await;

    // Six baguettes yesterday leave 100 g and give a trailing demand.
    let yesterday = (chrono::Utc::now().date_naive() - chrono::Duration::days(1)).to_string();
    let (status, _) = client
        .post(
            &format!("/restaurants/{restaurant_id}/sales"),
            json!({
                "product_id": baguette_id,
                "quantity": 6,
                "amount": 7.2,
                "sale_date": yesterday,
                "sale_hour": 9
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, rec) = client
        .post(&format!("/restaurants/{restaurant_id}/recommendations/orders"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rec_id = rec["id"].as_str().unwrap().to_string();

    let (status, accepted) = client
        .post(&format!("/recommendations/{rec_id}/accept"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");

    let (_, records) = client.get(&format!("/restaurants/{restaurant_id}/inventory")).await;
    assert!(flour_stock(&records, &flour_id) > 100.0);

    let (status, body) = client
        .post(&format!("/recommendations/{rec_id}/dismiss"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}
