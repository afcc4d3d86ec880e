pub mod api;
pub mod config;
pub mod diagnose;
pub mod harness;
pub mod lint;
pub mod patch;
pub mod suites;
pub mod watchdog;
pub mod workflows;

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> crate::config::N8nConfig {
        crate::config::N8nConfig {
            api_key: "test-key".into(),
            host: Url::parse(&format!("{}/", server.uri())).unwrap(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn list_workflows() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(header("X-N8N-API-KEY", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "1", "name": "BB_00_Global_Error_Handler", "active": true },
                    { "id": "2", "name": "BB_03_Availability_Engine" }
                ]
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let workflows = crate::api::list_workflows(&cfg).await.unwrap();
        // ensure the mock was hit
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(workflows.len(), 2);
        assert_eq!(workflows[0].id, "1");
        assert_eq!(workflows[0].name, "BB_00_Global_Error_Handler");
        assert!(workflows[0].active);
        assert!(!workflows[1].active);
    }

    #[tokio::test]
    async fn list_active_workflows_filters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": "1", "name": "A", "active": true },
                    { "id": "2", "name": "B", "active": false }
                ]
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let active = crate::api::list_active_workflows(&cfg).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "1");
    }

    #[tokio::test]
    async fn create_workflow_posts_definition() {
        let server = MockServer::start().await;
        let definition = crate::workflows::deep_link::build();

        Mock::given(method("POST"))
            .and(path("/api/v1/workflows"))
            .and(header("X-N8N-API-KEY", "test-key"))
            .and(body_json(&definition))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "W9ha9Z765PMxU0y0",
                "name": "BB_09_Deep_Link_Redirect"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let wf = crate::api::create_workflow(&cfg, &definition).await.unwrap();
        assert_eq!(wf.id, "W9ha9Z765PMxU0y0");
        assert_eq!(wf.name, "BB_09_Deep_Link_Redirect");
    }

    #[tokio::test]
    async fn update_falls_back_to_patch_on_405() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"name": "WF", "nodes": [], "connections": {}});

        Mock::given(method("PUT"))
            .and(path("/api/v1/workflows/42"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/workflows/42"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "42", "name": "WF"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let wf = crate::api::update_workflow(&cfg, "42", &body).await.unwrap();
        assert_eq!(wf.id, "42");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn activate_surfaces_server_message_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/7/activate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": "Workflow has no trigger node"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let err = crate::api::activate_workflow(&cfg, "7").await.unwrap_err();
        assert!(err.to_string().contains("no trigger node"));
    }

    #[tokio::test]
    async fn deactivate_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/7/deactivate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "7", "name": "WF", "active": false
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        crate::api::deactivate_workflow(&cfg, "7").await.unwrap();
    }

    #[tokio::test]
    async fn delete_maps_404_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/workflows/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let err = crate::api::delete_workflow(&cfg, "missing").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_executions_filters_by_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/executions"))
            .and(query_param("limit", "10"))
            .and(query_param("workflowId", "wf-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "id": 100, "status": "success", "workflowId": "wf-1", "finished": true },
                    { "id": 101, "status": "error", "workflowId": "wf-1", "finished": true }
                ]
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let errors = crate::api::list_executions(&cfg, Some("wf-1"), 10, Some("error"))
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, 101);
        assert_eq!(errors[0].status.as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn trigger_webhook_returns_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook/bb03-main"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "success": false, "message": "Validation failed"
            })))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let (status, body) = crate::api::trigger_webhook(
            &cfg,
            "bb03-main",
            &serde_json::json!({"provider_slug": ""}),
        )
        .await
        .unwrap();
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn trigger_webhook_wraps_non_json_bodies() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook/admin-v3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>panel</h1>"))
            .mount(&server)
            .await;

        let cfg = test_config(&server);
        let (status, body) = crate::api::trigger_webhook(&cfg, "admin-v3", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, serde_json::Value::String("<h1>panel</h1>".into()));
    }
}
