use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::N8nConfig;
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct WorkflowList {
    data: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
pub struct Execution {
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "workflowId", default)]
    pub workflow_id: Option<String>,
    #[serde(rename = "startedAt", default)]
    pub started_at: Option<String>,
    #[serde(rename = "stoppedAt", default)]
    pub stopped_at: Option<String>,
    #[serde(default)]
    pub finished: Option<bool>,
}

#[derive(Deserialize)]
struct ExecutionList {
    data: Vec<Execution>,
}

fn client(config: &N8nConfig) -> Result<Client> {
    Ok(Client::builder().timeout(config.timeout).build()?)
}

pub async fn list_workflows(config: &N8nConfig) -> Result<Vec<Workflow>> {
    let client = client(config)?;
    let url = config.endpoint("workflows");
    debug!(%url, "listing workflows");

    let resp = client
        .get(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    // Check for authentication errors first
    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!(
            "API endpoint not found. Please check your N8N_API_URL"
        ));
    }

    let resp = resp.error_for_status()?;

    let list: WorkflowList = resp.json().await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to parse response JSON: {}. This might indicate the n8n API format has changed or the server returned HTML instead of JSON.",
            e
        )
    })?;

    Ok(list.data)
}

pub async fn list_active_workflows(config: &N8nConfig) -> Result<Vec<Workflow>> {
    let workflows = list_workflows(config).await?;
    Ok(workflows.into_iter().filter(|wf| wf.active).collect())
}

/// Resolve a workflow by its exact name.
pub async fn find_workflow_by_name(config: &N8nConfig, name: &str) -> Result<Option<Workflow>> {
    let workflows = list_workflows(config).await?;
    Ok(workflows.into_iter().find(|wf| wf.name == name))
}

pub async fn create_workflow(config: &N8nConfig, data: &Value) -> Result<Workflow> {
    let client = client(config)?;
    let url = config.endpoint("workflows");
    debug!(%url, "creating workflow");

    let resp = client
        .post(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .json(data)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!(
            "API endpoint not found. Please check your N8N_API_URL"
        ));
    }

    let resp = resp.error_for_status()?;
    let wf: Workflow = resp.json().await?;
    Ok(wf)
}

/// Create an empty named workflow, the starting point for `new`.
pub async fn create_empty_workflow(config: &N8nConfig, name: &str) -> Result<Workflow> {
    let body = json!({
        "name": name,
        "nodes": [],
        "connections": {},
        "settings": {}
    });
    create_workflow(config, &body).await
}

/// Fetch a workflow by id, returning the raw JSON representation
pub async fn get_workflow(config: &N8nConfig, id: &str) -> Result<Value> {
    let client = client(config)?;
    let url = config.endpoint(&format!("workflows/{}", id));

    let resp = client
        .get(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!("Workflow with ID {} not found", id));
    }

    let resp = resp.error_for_status()?;
    Ok(resp.json().await?)
}

/// Update an existing workflow with the provided JSON body.
///
/// Tries PUT first; deployments that disallow it answer 405 and get a PATCH
/// with the same body instead.
pub async fn update_workflow(config: &N8nConfig, id: &str, data: &Value) -> Result<Workflow> {
    let client = client(config)?;
    let url = config.endpoint(&format!("workflows/{}", id));

    let resp = client
        .put(url.clone())
        .header("X-N8N-API-KEY", &config.api_key)
        .json(data)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!("Workflow with ID {} not found", id));
    }
    if resp.status() == StatusCode::METHOD_NOT_ALLOWED {
        debug!(%url, "PUT not allowed, retrying with PATCH");
        let resp = client
            .patch(url)
            .header("X-N8N-API-KEY", &config.api_key)
            .json(data)
            .send()
            .await?
            .error_for_status()?;
        let wf: Workflow = resp.json().await?;
        return Ok(wf);
    }

    let resp = resp.error_for_status()?;
    let wf: Workflow = resp.json().await?;
    Ok(wf)
}

pub async fn delete_workflow(config: &N8nConfig, id: &str) -> Result<()> {
    let client = client(config)?;
    let url = config.endpoint(&format!("workflows/{}", id));

    let resp = client
        .delete(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!("Workflow with ID {} not found", id));
    }

    resp.error_for_status()?;
    Ok(())
}

/// Activate (publish) a workflow so its triggers go live.
pub async fn activate_workflow(config: &N8nConfig, id: &str) -> Result<()> {
    set_workflow_active(config, id, true).await
}

/// Deactivate (unpublish) a workflow.
pub async fn deactivate_workflow(config: &N8nConfig, id: &str) -> Result<()> {
    set_workflow_active(config, id, false).await
}

async fn set_workflow_active(config: &N8nConfig, id: &str, active: bool) -> Result<()> {
    let action = if active { "activate" } else { "deactivate" };
    let client = client(config)?;
    let url = config.endpoint(&format!("workflows/{}/{}", id, action));

    let resp = client
        .post(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }
    if resp.status() == 404 {
        return Err(anyhow::anyhow!("Workflow with ID {} not found", id));
    }
    if resp.status() == 400 {
        // Usually a workflow without a trigger node; surface the server message.
        let detail = match resp.json::<Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("bad request")
                .to_string(),
            Err(_) => "bad request".to_string(),
        };
        return Err(anyhow::anyhow!(
            "Could not {} workflow {}: {}",
            action,
            id,
            detail
        ));
    }

    resp.error_for_status()?;
    Ok(())
}

/// List executions, newest first. `status` filters client-side because the
/// public API does not expose it as a query parameter on every version.
pub async fn list_executions(
    config: &N8nConfig,
    workflow_id: Option<&str>,
    limit: u32,
    status: Option<&str>,
) -> Result<Vec<Execution>> {
    let client = client(config)?;
    let mut url = config.endpoint("executions");
    {
        let mut qs = url.query_pairs_mut();
        qs.append_pair("limit", &limit.to_string());
        qs.append_pair("includeData", "false");
        if let Some(wf_id) = workflow_id {
            qs.append_pair("workflowId", wf_id);
        }
    }
    debug!(%url, "listing executions");

    let resp = client
        .get(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    if resp.status() == 401 {
        return Err(anyhow::anyhow!(
            "Authentication failed. Please check your N8N_API_KEY"
        ));
    }

    let resp = resp.error_for_status()?;
    let list: ExecutionList = resp.json().await?;

    let executions = match status {
        Some(wanted) => list
            .data
            .into_iter()
            .filter(|e| e.status.as_deref() == Some(wanted))
            .collect(),
        None => list.data,
    };
    Ok(executions)
}

/// Fetch a single execution with its run data.
pub async fn get_execution(config: &N8nConfig, id: &str) -> Result<Value> {
    let client = client(config)?;
    let mut url = config.endpoint(&format!("executions/{}", id));
    url.query_pairs_mut().append_pair("includeData", "true");

    let resp = client
        .get(url)
        .header("X-N8N-API-KEY", &config.api_key)
        .send()
        .await?;

    if resp.status() == 404 {
        return Err(anyhow::anyhow!("Execution with ID {} not found", id));
    }

    let resp = resp.error_for_status()?;
    Ok(resp.json().await?)
}

/// POST a payload to a production webhook path. Non-2xx statuses are not an
/// error here: integration suites assert on the status themselves.
pub async fn trigger_webhook(
    config: &N8nConfig,
    path: &str,
    payload: &Value,
) -> Result<(StatusCode, Value)> {
    let client = client(config)?;
    let url = config.webhook_endpoint(path);
    debug!(%url, "triggering webhook");

    let resp = client.post(url).json(payload).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}
