//! Integration harness for the live webhook surface.
//!
//! Posts payloads at production webhook paths and asserts on the response
//! shape. Results are tallied per flow; steps can stash response fields in a
//! shared context so later steps can reference IDs created earlier.

use std::collections::HashMap;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use url::Url;

#[derive(Debug)]
pub struct FlowStats {
    pub name: String,
    pub passed: u32,
    pub failed: u32,
}

pub struct Harness {
    base: Url,
    client: Client,
    pub context: HashMap<String, Value>,
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
    pub flows: Vec<FlowStats>,
}

// Fragments that betray an unhandled database error leaking to the caller.
const DB_ERROR_MARKERS: &[&str] = &["syntax error", "SQLSTATE", "pg_catalog", "PostgreSQL"];

impl Harness {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            client: Client::new(),
            context: HashMap::new(),
            passed: 0,
            failed: 0,
            total: 0,
            flows: Vec::new(),
        }
    }

    pub fn section(&self, title: &str) {
        println!("\n{}", "=".repeat(60));
        println!("{}", title);
        println!("{}", "=".repeat(60));
    }

    fn webhook_url(&self, path: &str) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("webhook/{}", path.trim_start_matches('/')))?)
    }

    /// Execute one step of a flow: POST `payload` to the webhook `path`,
    /// require HTTP 200, and compare the body's `success` flag against
    /// `expected_success` (a `None` expectation only requires the 200).
    /// Fields named in `extract` are copied into the context as
    /// `<flow>_<field>` for later steps.
    pub async fn step(
        &mut self,
        flow: &str,
        step_name: &str,
        path: &str,
        payload: &Value,
        expected_success: Option<bool>,
        extract: &[&str],
    ) -> (bool, Option<Value>) {
        self.total += 1;

        let url = match self.webhook_url(path) {
            Ok(url) => url,
            Err(e) => {
                self.record(false, flow, step_name, &format!("Bad URL: {}", e));
                return (false, None);
            }
        };

        let resp = match self.client.post(url).json(payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.record(false, flow, step_name, &format!("Exception: {}", e));
                return (false, None);
            }
        };

        if resp.status() != 200 {
            self.record(false, flow, step_name, &format!("HTTP {}", resp.status()));
            return (false, None);
        }

        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                self.record(false, flow, step_name, &format!("Bad JSON: {}", e));
                return (false, None);
            }
        };

        let success = body.get("success").and_then(|s| s.as_bool());
        let ok = match expected_success {
            None => true,
            Some(expected) => success == Some(expected),
        };

        if ok {
            for field in extract {
                if let Some(value) = get_nested(&body, field) {
                    self.context
                        .insert(format!("{}_{}", flow, field), value.clone());
                }
            }
            self.record(true, flow, step_name, &format!("success={:?}", success));
        } else {
            self.record(
                false,
                flow,
                step_name,
                &format!("success={:?} (expected {:?})", success, expected_success),
            );
        }
        (ok, Some(body))
    }

    /// Fire a hostile payload at a webhook and check the endpoint handles it:
    /// an accepted (200) or rejected (400) response whose body leaks no
    /// database error text.
    pub async fn probe(&mut self, flow: &str, step_name: &str, path: &str, payload: &Value) -> bool {
        self.total += 1;

        let url = match self.webhook_url(path) {
            Ok(url) => url,
            Err(e) => {
                self.record(false, flow, step_name, &format!("Bad URL: {}", e));
                return false;
            }
        };

        let resp = match self.client.post(url).json(payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.record(false, flow, step_name, &format!("Exception: {}", e));
                return false;
            }
        };

        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();

        if status != 200 && status != 400 {
            self.record(false, flow, step_name, &format!("HTTP {}", status));
            return false;
        }
        if let Some(marker) = DB_ERROR_MARKERS.iter().find(|m| text.contains(**m)) {
            self.record(
                false,
                flow,
                step_name,
                &format!("response leaks '{}'", marker),
            );
            return false;
        }

        self.record(true, flow, step_name, &format!("handled (HTTP {})", status));
        true
    }

    fn record(&mut self, passed: bool, flow: &str, step_name: &str, detail: &str) {
        let status = if passed {
            self.passed += 1;
            "✅"
        } else {
            self.failed += 1;
            "❌"
        };
        println!("  {} [{}] {}: {}", status, flow, step_name, detail);

        if !self.flows.iter().any(|f| f.name == flow) {
            self.flows.push(FlowStats {
                name: flow.to_string(),
                passed: 0,
                failed: 0,
            });
        }
        if let Some(stats) = self.flows.iter_mut().find(|f| f.name == flow) {
            if passed {
                stats.passed += 1;
            } else {
                stats.failed += 1;
            }
        }
    }

    /// Print the final per-flow report. Returns true when every step passed.
    pub fn summarize(&self) -> bool {
        self.section("RESULTS");
        for flow in &self.flows {
            let mark = if flow.failed == 0 { "✅" } else { "❌" };
            println!(
                "  {} {}: {} passed, {} failed",
                mark, flow.name, flow.passed, flow.failed
            );
        }
        println!(
            "\nTotal: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        );
        self.failed == 0
    }
}

/// Walk a dot-separated path through nested objects.
pub fn get_nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Clone `payload` with the first string field (depth-first) replaced by
/// `injected`. Used to spray attack payloads across endpoint contracts
/// without knowing their field names.
pub fn inject_into_first_string(payload: &Value, injected: &str) -> Value {
    fn inject(value: &mut Value, injected: &str) -> bool {
        match value {
            Value::String(s) => {
                *s = injected.to_string();
                true
            }
            Value::Object(map) => {
                for v in map.values_mut() {
                    if inject(v, injected) {
                        return true;
                    }
                }
                false
            }
            Value::Array(items) => {
                for v in items.iter_mut() {
                    if inject(v, injected) {
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }

    let mut clone = payload.clone();
    inject(&mut clone, injected);
    clone
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn step_passes_and_extracts_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/bb03-main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "provider": { "id": "p-1" }
            })))
            .mount(&server)
            .await;

        let mut h = Harness::new(Url::parse(&server.uri()).unwrap());
        let (ok, body) = h
            .step(
                "Discovery",
                "availability",
                "bb03-main",
                &json!({"provider_slug": "doc"}),
                Some(true),
                &["provider.id"],
            )
            .await;

        assert!(ok);
        assert_eq!(body.unwrap()["success"], true);
        assert_eq!(h.context["Discovery_provider.id"], "p-1");
        assert_eq!(h.passed, 1);
        assert!(h.summarize());
    }

    #[tokio::test]
    async fn step_fails_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut h = Harness::new(Url::parse(&server.uri()).unwrap());
        let (ok, body) = h
            .step("Smoke", "missing hook", "missing", &json!({}), None, &[])
            .await;

        assert!(!ok);
        assert!(body.is_none());
        assert_eq!(h.failed, 1);
        assert!(!h.summarize());
    }

    #[tokio::test]
    async fn step_fails_on_unexpected_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/bb03-main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;

        let mut h = Harness::new(Url::parse(&server.uri()).unwrap());
        let (ok, _) = h
            .step("Smoke", "availability", "bb03-main", &json!({}), Some(true), &[])
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn probe_accepts_handled_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/bb03-main"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"success": false, "message": "Validation failed"})),
            )
            .mount(&server)
            .await;

        let mut h = Harness::new(Url::parse(&server.uri()).unwrap());
        assert!(
            h.probe("Security", "sqli #1", "bb03-main", &json!({"provider_slug": "' OR '1'='1"}))
                .await
        );
    }

    #[tokio::test]
    async fn probe_flags_leaked_database_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/bb03-main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "SQLSTATE 42601: syntax error at or near"
            })))
            .mount(&server)
            .await;

        let mut h = Harness::new(Url::parse(&server.uri()).unwrap());
        assert!(
            !h.probe("Security", "sqli #1", "bb03-main", &json!({"provider_slug": "x"}))
                .await
        );
        assert_eq!(h.failed, 1);
    }

    #[test]
    fn get_nested_walks_objects() {
        let body = json!({"a": {"b": {"c": 3}}});
        assert_eq!(get_nested(&body, "a.b.c").unwrap(), 3);
        assert!(get_nested(&body, "a.x").is_none());
        assert!(get_nested(&body, "a.b.c.d").is_none());
    }

    #[test]
    fn injection_replaces_first_string_only() {
        let payload = json!({
            "message": { "chat": { "id": 123 }, "text": "/book" },
            "other": "untouched"
        });
        let injected = inject_into_first_string(&payload, "' OR '1'='1");
        assert_eq!(injected["message"]["text"], "' OR '1'='1");
        assert_eq!(injected["other"], "untouched");

        let no_strings = json!({"n": 1, "b": true});
        assert_eq!(inject_into_first_string(&no_strings, "x"), no_strings);
    }
}
