//! Connectivity diagnostics for an n8n instance.
//!
//! Probes the instance one step at a time and keeps going on failure, so a
//! broken deployment yields the whole picture instead of the first error.

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use crate::config::N8nConfig;

/// Run the diagnostic probes. Returns true when every probe succeeded.
pub async fn run(config: &N8nConfig) -> Result<bool> {
    let client = Client::builder().timeout(config.timeout).build()?;
    let mut ok = true;

    println!("🔍 n8n connection diagnostics");
    println!("📍 URL: {}", config.host);

    // 1. Root endpoint
    println!("\n1️⃣ Probing root endpoint...");
    match client.get(config.host.clone()).send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("   ✅ Instance reachable (HTTP {})", resp.status());
        }
        Ok(resp) => {
            println!("   ❌ HTTP {}", resp.status());
            ok = false;
        }
        Err(e) => {
            println!("   ❌ {}", e);
            ok = false;
        }
    }

    // 2. Workflows endpoint with authentication
    println!("\n2️⃣ Probing workflows endpoint...");
    match client
        .get(config.endpoint("workflows"))
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(body) => {
                let count = body
                    .get("data")
                    .and_then(|d| d.as_array())
                    .map(|d| d.len())
                    .unwrap_or(0);
                println!("   ✅ {} workflows found", count);
            }
            Err(e) => {
                println!("   ❌ Response was not JSON: {}", e);
                ok = false;
            }
        },
        Ok(resp) if resp.status() == 401 => {
            println!("   ❌ Authentication rejected; check N8N_API_KEY");
            ok = false;
        }
        Ok(resp) => {
            println!("   ❌ HTTP {}", resp.status());
            ok = false;
        }
        Err(e) => {
            println!("   ❌ {}", e);
            ok = false;
        }
    }

    // 3. Allowed HTTP methods
    println!("\n3️⃣ Probing allowed HTTP methods...");
    match client
        .request(reqwest::Method::OPTIONS, config.endpoint("workflows"))
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await
    {
        Ok(resp) => {
            println!("   OPTIONS status: {}", resp.status());
            if let Some(allow) = resp.headers().get("allow").and_then(|a| a.to_str().ok()) {
                println!("   Allowed methods: {}", allow);
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            ok = false;
        }
    }

    // 4. Executions endpoint
    println!("\n4️⃣ Probing executions endpoint...");
    let mut url = config.endpoint("executions");
    url.query_pairs_mut().append_pair("limit", "1");
    match client
        .get(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            println!("   ✅ Executions endpoint reachable");
        }
        Ok(resp) => {
            println!("   ❌ HTTP {}", resp.status());
            ok = false;
        }
        Err(e) => {
            println!("   ❌ {}", e);
            ok = false;
        }
    }

    println!(
        "\n{}",
        if ok {
            "✅ All probes passed"
        } else {
            "❌ Some probes failed"
        }
    );
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(uri: &str) -> N8nConfig {
        N8nConfig {
            api_key: "test-key".into(),
            host: Url::parse(&format!("{}/", uri)).unwrap(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn all_probes_pass_on_a_healthy_instance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "1", "name": "BB_00_Global_Error_Handler"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("OPTIONS"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, POST"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/executions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        assert!(run(&test_config(&server.uri())).await.unwrap());
    }

    #[tokio::test]
    async fn probes_fail_on_an_empty_instance() {
        let server = MockServer::start().await;
        // Unmatched requests answer 404.
        assert!(!run(&test_config(&server.uri())).await.unwrap());
    }
}
