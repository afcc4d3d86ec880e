//! Offline sanity checks for workflow definition documents.
//!
//! The platform accepts structurally broken definitions and only fails at
//! execution time; these checks catch the usual breakage before upload.

use std::collections::HashSet;

use serde_json::Value;

/// Lint a definition document. Returns human-readable issues; an empty list
/// means the definition is clean.
pub fn lint_definition(definition: &Value) -> Vec<String> {
    let mut issues = Vec::new();

    let Some(nodes) = definition.get("nodes").and_then(|n| n.as_array()) else {
        issues.push("Definition has no 'nodes' array".to_string());
        return issues;
    };

    let mut names = HashSet::new();
    for node in nodes {
        let name = node.get("name").and_then(|n| n.as_str()).unwrap_or("");
        if name.is_empty() {
            issues.push("Node without a name".to_string());
            continue;
        }
        if !names.insert(name) {
            issues.push(format!("Duplicate node name '{}'", name));
        }

        let node_type = node.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let params = &node["parameters"];

        if node_type == "n8n-nodes-base.code" {
            let code = params.get("jsCode").and_then(|c| c.as_str()).unwrap_or("");
            if code.trim().is_empty() {
                issues.push(format!("Code node '{}' has no jsCode", name));
            }
        }

        // executeQuery must bind through $n placeholders, never inline
        // template interpolation inside the SQL text.
        if node_type == "n8n-nodes-base.postgres"
            && params.get("operation").and_then(|o| o.as_str()) == Some("executeQuery")
        {
            let query = params.get("query").and_then(|q| q.as_str()).unwrap_or("");
            if query.trim().is_empty() {
                issues.push(format!("Postgres node '{}' has an empty query", name));
            } else if query.contains("{{") {
                issues.push(format!(
                    "Postgres node '{}' interpolates expressions into its SQL; use query parameters",
                    name
                ));
            }
        }
    }

    match definition.get("connections").and_then(|c| c.as_object()) {
        Some(connections) => {
            for (source, outputs) in connections {
                if !names.contains(source.as_str()) {
                    issues.push(format!("Connection from unknown node '{}'", source));
                }
                for routes in outputs
                    .as_object()
                    .into_iter()
                    .flat_map(|o| o.values())
                    .filter_map(|r| r.as_array())
                {
                    for conn in routes.iter().filter_map(|r| r.as_array()).flatten() {
                        let target = conn.get("node").and_then(|n| n.as_str()).unwrap_or("");
                        if !names.contains(target) {
                            issues.push(format!(
                                "Connection from '{}' to unknown node '{}'",
                                source, target
                            ));
                        }
                    }
                }
            }
        }
        None => issues.push("Definition has no 'connections' object".to_string()),
    }

    // A responseNode webhook that can never respond hangs the caller until
    // the platform times out.
    let wants_responder = nodes.iter().any(|n| {
        n["type"] == "n8n-nodes-base.webhook"
            && n["parameters"]["responseMode"] == "responseNode"
    });
    let has_responder = nodes
        .iter()
        .any(|n| n["type"] == "n8n-nodes-base.respondToWebhook");
    if wants_responder && !has_responder {
        issues.push("Webhook uses responseNode mode but there is no respondToWebhook node".into());
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "name": "WF",
            "nodes": [
                {"parameters": {"httpMethod": "POST", "path": "x", "responseMode": "responseNode"}, "id": "a", "name": "Hook", "type": "n8n-nodes-base.webhook", "typeVersion": 1, "position": [0, 0]},
                {"parameters": {"respondWith": "json", "responseBody": "={{ $json }}"}, "id": "b", "name": "Respond", "type": "n8n-nodes-base.respondToWebhook", "typeVersion": 1, "position": [200, 0]}
            ],
            "connections": {
                "Hook": {"main": [[{"node": "Respond", "type": "main", "index": 0}]]}
            },
            "settings": {"executionOrder": "v1"}
        })
    }

    #[test]
    fn clean_definition_has_no_issues() {
        assert!(lint_definition(&minimal()).is_empty());
    }

    #[test]
    fn dangling_connection_is_reported() {
        let mut wf = minimal();
        wf["connections"]["Hook"]["main"][0][0]["node"] = json!("Ghost");
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("unknown node 'Ghost'")));
    }

    #[test]
    fn connection_from_unknown_source_is_reported() {
        let mut wf = minimal();
        wf["connections"]["Ghost"] = json!({"main": [[{"node": "Respond", "type": "main", "index": 0}]]});
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("from unknown node 'Ghost'")));
    }

    #[test]
    fn duplicate_node_names_are_reported() {
        let mut wf = minimal();
        wf["nodes"].as_array_mut().unwrap().push(json!(
            {"parameters": {}, "id": "c", "name": "Respond", "type": "n8n-nodes-base.set", "typeVersion": 1, "position": [400, 0]}
        ));
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("Duplicate node name")));
    }

    #[test]
    fn interpolated_sql_is_reported() {
        let mut wf = minimal();
        wf["nodes"].as_array_mut().unwrap().push(json!({
            "parameters": {
                "operation": "executeQuery",
                "query": "SELECT * FROM users WHERE id = '{{ $json.id }}'"
            },
            "id": "c", "name": "DB", "type": "n8n-nodes-base.postgres", "typeVersion": 2.4, "position": [400, 0]
        }));
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("query parameters")));
    }

    #[test]
    fn parameterized_sql_is_clean() {
        let mut wf = minimal();
        wf["nodes"].as_array_mut().unwrap().push(json!({
            "parameters": {
                "operation": "executeQuery",
                "query": "SELECT * FROM users WHERE id = $1"
            },
            "id": "c", "name": "DB", "type": "n8n-nodes-base.postgres", "typeVersion": 2.4, "position": [400, 0]
        }));
        assert!(lint_definition(&wf).is_empty());
    }

    #[test]
    fn missing_responder_is_reported() {
        let mut wf = minimal();
        wf["nodes"].as_array_mut().unwrap().remove(1);
        wf["connections"] = json!({});
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("respondToWebhook")));
    }

    #[test]
    fn empty_code_node_is_reported() {
        let mut wf = minimal();
        wf["nodes"].as_array_mut().unwrap().push(json!({
            "parameters": {"jsCode": "  "},
            "id": "c", "name": "Code", "type": "n8n-nodes-base.code", "typeVersion": 2, "position": [400, 0]
        }));
        let issues = lint_definition(&wf);
        assert!(issues.iter().any(|i| i.contains("no jsCode")));
    }
}
