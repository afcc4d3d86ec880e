//! Integration suites for the AutoAgenda webhook surface.
//!
//! Each suite drives the live instance through the harness: user journeys
//! end to end, hostile payload grids, and malformed-input edge cases. These
//! run against real workflows and real data; they are reached through the
//! `test` subcommand, not `cargo test`.

use anyhow::Result;
use serde_json::{Value, json};
use url::Url;

use crate::harness::{Harness, inject_into_first_string};

pub const SQL_INJECTION_PAYLOADS: &[&str] = &[
    "' OR '1'='1",
    "'; DROP TABLE users; --",
    "' UNION SELECT * FROM users --",
    "1; SELECT * FROM information_schema.tables",
    "admin'--",
    "' OR 1=1 --",
    "1' AND '1'='1",
    "'; EXEC xp_cmdshell('dir') --",
];

pub const XSS_PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "javascript:alert('XSS')",
    "<svg onload=alert('XSS')>",
    "'\"><script>alert(String.fromCharCode(88,83,83))</script>",
    "<body onload=alert('XSS')>",
    "<iframe src='javascript:alert(1)'>",
];

// Deterministic future date so availability lookups stay inside the booking
// window of the seeded calendar.
const TARGET_DATE: &str = "2026-12-01";

fn telegram_update(text: &str) -> Value {
    json!({
        "message": {
            "chat": { "id": 123456789 },
            "from": { "first_name": "TestUser" },
            "text": text
        }
    })
}

fn availability_request(provider_slug: &str, days_range: u32) -> Value {
    json!({
        "provider_slug": provider_slug,
        "target_date": TARGET_DATE,
        "days_range": days_range
    })
}

async fn smoke(h: &mut Harness) {
    h.section("SMOKE: ENDPOINT REACHABILITY");
    let flow = "Smoke";

    h.step(
        flow,
        "1. Error handler accepts a report",
        "error-handler",
        &json!({
            "workflow_name": "smoke-test",
            "error_message": "Connectivity probe",
            "error_type": "INFO",
            "severity": "INFO"
        }),
        None,
        &[],
    )
    .await;

    h.step(
        flow,
        "2. Availability engine responds",
        "bb03-main",
        &availability_request("dra-garcia", 1),
        Some(true),
        &[],
    )
    .await;

    h.step(
        flow,
        "3. Telegram gateway responds",
        "telegram-webhook",
        &telegram_update("/help"),
        None,
        &[],
    )
    .await;
}

async fn provider_discovery(h: &mut Harness) {
    h.section("FLOW 1: PROVIDER DISCOVERY");
    let flow = "Provider Discovery";

    h.step(
        flow,
        "1. Deep link selects the doctor",
        "telegram-webhook",
        &telegram_update("/start ref_dra-garcia"),
        None,
        &[],
    )
    .await;

    h.step(
        flow,
        "2. Single-day availability",
        "bb03-main",
        &availability_request("dra-garcia", 1),
        Some(true),
        &["provider_name", "slots"],
    )
    .await;

    h.step(
        flow,
        "3. Week-range availability",
        "bb03-main",
        &availability_request("dra-garcia", 7),
        Some(true),
        &[],
    )
    .await;
}

async fn booking_flow(h: &mut Harness) {
    h.section("FLOW 2: BOOKING VIA TELEGRAM");
    let flow = "Booking";

    h.step(
        flow,
        "1. /book with stored context",
        "telegram-webhook",
        &telegram_update("/book"),
        None,
        &[],
    )
    .await;

    h.step(
        flow,
        "2. Slots stay consistent",
        "bb03-main",
        &availability_request("dra-garcia", 1),
        Some(true),
        &[],
    )
    .await;

    h.step(
        flow,
        "3. Failed booking reports to error handler",
        "error-handler",
        &json!({
            "workflow_name": "BB_01_Telegram_Gateway",
            "error_message": "Booking rejected: slot already taken",
            "error_type": "LOGIC",
            "error_context": { "entity_id": "telegram:123456789" }
        }),
        None,
        &[],
    )
    .await;
}

async fn security(h: &mut Harness) {
    h.section("SECURITY: INJECTION PROBES");

    let endpoints: &[(&str, Value)] = &[
        ("telegram-webhook", telegram_update("/book")),
        ("bb03-main", availability_request("dra-garcia", 1)),
        (
            "error-handler",
            json!({"workflow_name": "probe", "error_message": "probe"}),
        ),
    ];

    for (path, base_payload) in endpoints {
        for (i, payload) in SQL_INJECTION_PAYLOADS.iter().take(4).enumerate() {
            let hostile = inject_into_first_string(base_payload, payload);
            h.probe("SQL Injection", &format!("{} #{}", path, i + 1), path, &hostile)
                .await;
        }
        for (i, payload) in XSS_PAYLOADS.iter().take(3).enumerate() {
            let hostile = inject_into_first_string(base_payload, payload);
            h.probe("XSS", &format!("{} #{}", path, i + 1), path, &hostile)
                .await;
        }
    }
}

async fn edge_cases(h: &mut Harness) {
    h.section("EDGE CASES: MALFORMED INPUT");
    let flow = "Edge Cases";

    h.step(
        flow,
        "1. Empty body is rejected",
        "bb03-main",
        &json!({}),
        Some(false),
        &[],
    )
    .await;

    h.step(
        flow,
        "2. Wrong types are rejected",
        "bb03-main",
        &json!({"provider_slug": 12345, "target_date": true, "days_range": "many"}),
        Some(false),
        &[],
    )
    .await;

    h.step(
        flow,
        "3. Out-of-range days_range is rejected",
        "bb03-main",
        &json!({"provider_slug": "dra-garcia", "target_date": TARGET_DATE, "days_range": 90}),
        Some(false),
        &[],
    )
    .await;

    h.probe(
        flow,
        "4. Oversized slug is handled",
        "bb03-main",
        &availability_request(&"A".repeat(10_000), 1),
    )
    .await;

    h.probe(flow, "5. Empty error report is handled", "error-handler", &json!({}))
        .await;
}

/// Run a named suite against the instance at `base`. Returns true when every
/// step passed.
pub async fn run(suite: &str, base: Url) -> Result<bool> {
    let mut h = Harness::new(base);

    match suite {
        "smoke" => smoke(&mut h).await,
        "e2e" => {
            provider_discovery(&mut h).await;
            booking_flow(&mut h).await;
        }
        "security" => security(&mut h).await,
        "edge" => edge_cases(&mut h).await,
        "all" => {
            smoke(&mut h).await;
            provider_discovery(&mut h).await;
            booking_flow(&mut h).await;
            security(&mut h).await;
            edge_cases(&mut h).await;
        }
        other => {
            return Err(anyhow::anyhow!(
                "Unknown suite '{}'. Available: smoke, e2e, security, edge, all",
                other
            ));
        }
    }

    Ok(h.summarize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn smoke_suite_passes_against_healthy_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let ok = run("smoke", Url::parse(&server.uri()).unwrap())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn edge_suite_fails_when_validation_is_missing() {
        let server = MockServer::start().await;
        // An endpoint that blindly accepts everything fails the rejection
        // steps.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let ok = run("edge", Url::parse(&server.uri()).unwrap())
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn unknown_suite_is_an_error() {
        let err = run("chaos", Url::parse("http://localhost:5678").unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown suite"));
    }
}
