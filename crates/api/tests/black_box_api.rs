use reqwest::StatusCode;
use serde_json::{Value, json};

use stockforge_core::{TenantId, UserId};
use stockforge_infra::InfraConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let app = stockforge_api::app::build_app(&InfraConfig::default()).await.unwrap();
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

/// A client acting as one operator of one tenant.
struct Caller {
    client: reqwest::Client,
    base_url: String,
    tenant: TenantId,
    operator: UserId,
}

impl Caller {
    fn new(srv: &TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            tenant: TenantId::new(),
            operator: UserId::new(),
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", self.tenant.to_string())
            .header("X-Operator-Id", self.operator.to_string())
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("X-Tenant-Id", self.tenant.to_string())
            .header("X-Operator-Id", self.operator.to_string())
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn product(&self, sku: &str, price: &str, stock: i64) -> String {
        let (status, body) = self.post("/products", json!({ "sku": sku, "unit_price": price })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_str().unwrap().to_string();
        if stock > 0 {
            let (status, _) = self
                .post(
                    "/stock-movements",
                    json!({ "product": id, "kind": "inbound", "quantity": stock }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        id
    }
}

#[tokio::test]
async fn health_is_public_and_domain_routes_need_identity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(format!("{}/orders", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/orders", srv.base_url))
        .header("X-Tenant-Id", "not-a-uuid")
        .header("X-Operator-Id", UserId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inventory_lifecycle_movements_and_stocktake() {
    let srv = TestServer::spawn().await;
    let caller = Caller::new(&srv);
    let product = caller.product("SKU-1", "3.50", 10).await;

    let (status, body) = caller
        .post(
            "/stock-movements",
            json!({ "product": product, "kind": "outbound", "quantity": 4, "note": "sample" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["quantity"], 6);

    let (status, body) = caller
        .post(&format!("/inventory/{product}/stocktake"), json!({ "quantity": 9 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 9);

    let (status, body) = caller.get(&format!("/inventory/{product}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 9);

    let (_, body) = caller.get(&format!("/stock-movements?product_id={product}")).await;
    let kinds: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["stocktake-absolute", "outbound", "inbound"]);

    let (_, body) = caller.get("/inventory").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn single_movement_is_fetchable_by_id_within_its_tenant() {
    let srv = TestServer::spawn().await;
    let owner = Caller::new(&srv);
    let stranger = Caller::new(&srv);
    let product = owner.product("SKU-1", "1.00", 4).await;

    let (_, list) = owner.get("/stock-movements").await;
    let listed = list["items"][0].clone();
    let id = listed["id"].as_str().unwrap().to_string();

    let (status, body) = owner.get(&format!("/stock-movements/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, listed);
    assert_eq!(body["product_id"], product.as_str());
    assert_eq!(body["quantity_after"], 4);

    let (status, _) = stranger.get(&format!("/stock-movements/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = owner.get(&format!("/stock-movements/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = owner.get("/stock-movements/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn invalid_inventory_requests_map_to_error_codes() {
    let srv = TestServer::spawn().await;
    let caller = Caller::new(&srv);
    let product = caller.product("SKU-1", "1.00", 2).await;

    let (status, body) = caller
        .post(
            "/stock-movements",
            json!({ "product": product, "kind": "outbound", "quantity": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, _) = caller
        .post(&format!("/inventory/{product}/warning-line"), json!({ "threshold": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = caller
        .post(
            "/stock-movements",
            json!({ "product": product, "kind": "sideways", "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ghost = stockforge_core::AggregateId::new().to_string();
    let (status, body) = caller.get(&format!("/inventory/{ghost}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = caller.post("/products", json!({ "sku": "sku-1", "unit_price": "2.00" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_lifecycle_end_to_end() {
    let srv = TestServer::spawn().await;
    let caller = Caller::new(&srv);
    let a = caller.product("A", "10.00", 5).await;
    let b = caller.product("B", "7.00", 5).await;

    let (status, order) = caller
        .post(
            "/orders",
            json!({
                "customerName": "Jane",
                "customerPhone": "555-0100",
                "lines": [
                    { "product": a, "quantity": 2 },
                    { "product": b, "quantity": 1, "price": "5.00" },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["total"], "25.00");
    assert_eq!(order["status"], "pending");
    assert!(order["order_no"].as_str().unwrap().starts_with("ORD"));
    let id = order["id"].as_str().unwrap().to_string();

    let (_, record) = caller.get(&format!("/inventory/{a}")).await;
    assert_eq!(record["quantity"], 3);

    let (status, fetched) = caller.get(&format!("/orders/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_no"], order["order_no"]);

    let (status, _) = caller.post(&format!("/orders/{id}/status"), json!({ "status": "shipped" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = caller
        .post(&format!("/orders/{id}/status"), json!({ "status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let (status, _) = caller
        .post(&format!("/orders/{id}/status"), json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = caller
        .post(&format!("/orders/{id}/status"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, list) = caller.get("/orders").await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_order_changes_nothing() {
    let srv = TestServer::spawn().await;
    let caller = Caller::new(&srv);
    let a = caller.product("A", "1.00", 5).await;

    let (status, body) = caller
        .post(
            "/orders",
            json!({
                "customerName": "Jane",
                "lines": [{ "product": a, "quantity": 3 }, { "product": a, "quantity": 4 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains(&a));

    let (_, record) = caller.get(&format!("/inventory/{a}")).await;
    assert_eq!(record["quantity"], 5);
    let (_, list) = caller.get("/orders").await;
    assert!(list["items"].as_array().unwrap().is_empty());

    let (status, _) = caller.post("/orders", json!({ "customerName": "Jane", "lines": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let owner = Caller::new(&srv);
    let stranger = Caller::new(&srv);
    let a = owner.product("A", "1.00", 5).await;

    let (status, _) = stranger.get(&format!("/products/{a}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = stranger.get(&format!("/inventory/{a}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = stranger.get("/stock-movements").await;
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn crossing_the_warning_line_lands_in_the_alert_inbox() {
    let srv = TestServer::spawn().await;
    let caller = Caller::new(&srv);
    let a = caller.product("A", "1.00", 100).await;

    let (status, _) = caller
        .post(&format!("/inventory/{a}/warning-line"), json!({ "threshold": 20 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    for qty in [85, 1] {
        let (status, _) = caller
            .post("/stock-movements", json!({ "product": a, "kind": "outbound", "quantity": qty }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Delivery is asynchronous; poll briefly.
    let mut alerts = Vec::new();
    for _ in 0..50 {
        let (_, body) = caller.get("/alerts").await;
        alerts = body["items"].as_array().cloned().unwrap_or_default();
        if !alerts.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let (_, body) = caller.get("/alerts").await;
    let settled = body["items"].as_array().cloned().unwrap_or_default();

    assert_eq!(alerts.len(), 1);
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0]["quantity"], 15);
    assert_eq!(settled[0]["product_id"], a.as_str());
}
