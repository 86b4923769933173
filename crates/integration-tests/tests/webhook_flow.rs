//! End-to-end webhook flow: signed checkout events in, draft Printful
//! orders out.

use tidewater_integration_tests::{
    TestContext, WEBHOOK_SECRET_LIVE, WEBHOOK_SECRET_TEST, sign_payload,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checkout_event(session_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "checkout.session.completed",
        "livemode": false,
        "data": {
            "object": {
                "id": session_id,
                "customer_email": "buyer@example.com",
                "shipping_details": {
                    "name": "A Customer",
                    "address": {
                        "line1": "1 Water St",
                        "city": "Halifax",
                        "state": "NS",
                        "postal_code": "B3H 0A1",
                        "country": "CA"
                    }
                }
            }
        }
    }))
    .expect("serializes")
}

async fn mount_line_items(stripe: &MockServer, session_id: &str, metadata: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/checkout/sessions/{session_id}/line_items"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{
                "id": "li_1",
                "quantity": 2,
                "price": {"id": "price_1", "metadata": metadata}
            }],
            "has_more": false
        })))
        .mount(stripe)
        .await;
}

async fn mount_variant_exists(printful: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/sync/variant/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "result": {
                "id": id,
                "sync_product_id": 12,
                "name": "Tee - Black / M",
                "retail_price": "25.00"
            }
        })))
        .mount(printful)
        .await;
}

#[tokio::test]
async fn verified_event_creates_draft_order() {
    let ctx = TestContext::start().await;
    mount_line_items(
        &ctx.stripe,
        "cs_test_ok",
        serde_json::json!({"sync_variant_id": "501", "sku": "501"}),
    )
    .await;
    mount_variant_exists(&ctx.printful, 501).await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_string_contains("\"confirm\":false"))
        .and(body_string_contains("\"external_id\":\"cs_test_ok\""))
        .and(body_string_contains("\"sync_variant_id\":501"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "result": {"id": 777}
        })))
        .expect(1)
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_ok");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(json["fulfilled"], serde_json::json!(true));
    assert_eq!(json["order_id"], serde_json::json!(777));
}

#[tokio::test]
async fn tampered_body_is_rejected_with_401() {
    let ctx = TestContext::start().await;

    // No fulfillment may happen on a forged delivery.
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_forged");
    let signature = sign_payload(&body, WEBHOOK_SECRET_LIVE);

    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(tampered)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn missing_signature_header_is_rejected_with_401() {
    let ctx = TestContext::start().await;

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .body(checkout_event("cs_test_nohdr"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn wrong_method_is_405() {
    let ctx = TestContext::start().await;

    let response = ctx
        .client
        .get(ctx.url("/webhook"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn malformed_payload_is_400() {
    let ctx = TestContext::start().await;

    let body = b"not json at all".to_vec();
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn other_event_types_are_acknowledged_and_skipped() {
    let ctx = TestContext::start().await;

    let body = serde_json::to_vec(&serde_json::json!({
        "type": "invoice.paid",
        "data": {"object": {"id": "in_1"}}
    }))
    .expect("serializes");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(json["handled"], serde_json::json!(false));
}

#[tokio::test]
async fn unresolvable_line_items_return_200_without_order() {
    let ctx = TestContext::start().await;

    // Price carries no identity and the mapping store has no row.
    mount_line_items(&ctx.stripe, "cs_test_stale", serde_json::json!({})).await;
    Mock::given(method("GET"))
        .and(path("/variant_mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&ctx.mapping)
        .await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_stale");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(json["fulfilled"], serde_json::json!(false));
}

#[tokio::test]
async fn deleted_upstream_variant_is_dropped() {
    let ctx = TestContext::start().await;

    mount_line_items(
        &ctx.stripe,
        "cs_test_gone",
        serde_json::json!({"sync_variant_id": "999", "sku": "999"}),
    )
    .await;

    // Variant 999 no longer exists upstream.
    Mock::given(method("GET"))
        .and(path("/sync/variant/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": 404,
            "error": {"message": "Not found"}
        })))
        .mount(&ctx.printful)
        .await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_gone");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(json["fulfilled"], serde_json::json!(false));
}

#[tokio::test]
async fn printful_failure_returns_5xx_for_retry() {
    let ctx = TestContext::start().await;

    mount_line_items(
        &ctx.stripe,
        "cs_test_down",
        serde_json::json!({"sync_variant_id": "501", "sku": "501"}),
    )
    .await;
    mount_variant_exists(&ctx.printful, 501).await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "code": 500,
            "error": {"message": "temporarily unavailable"}
        })))
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_down");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_server_error());
}

#[tokio::test]
async fn mapping_store_fallback_resolves_bare_price() {
    let ctx = TestContext::start().await;

    mount_line_items(&ctx.stripe, "cs_test_map", serde_json::json!({})).await;

    // The mapping table still knows which variant price_1 sells.
    Mock::given(method("GET"))
        .and(path("/variant_mappings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "source_variant_id": 501,
            "target_price_id": "price_1",
            "environment": "test"
        }])))
        .mount(&ctx.mapping)
        .await;
    mount_variant_exists(&ctx.printful, 501).await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_string_contains("\"sync_variant_id\":501"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "result": {"id": 778}
        })))
        .expect(1)
        .mount(&ctx.printful)
        .await;

    let body = checkout_event("cs_test_map");
    let signature = sign_payload(&body, WEBHOOK_SECRET_TEST);

    let response = ctx
        .client
        .post(ctx.url("/webhook"))
        .header("Stripe-Signature", signature)
        .body(body)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(json["fulfilled"], serde_json::json!(true));
}
