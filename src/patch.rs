//! Surgery on workflow definition JSON.
//!
//! Generated and downloaded definitions accumulate problems that are fixed
//! offline: fields the public API rejects, resource-locator references that
//! only resolve in the editor UI, code nodes that need a one-line change
//! across a whole family of workflows.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value, json};

/// Remove fields not accepted by the Public API when updating a workflow.
pub fn sanitize_for_update(json: &Value) -> Value {
    let allowed = [
        "name",
        "nodes",
        "connections",
        "settings",
        "staticData",
        "tags",
        "active",
    ];

    let mut obj = Map::new();
    for key in allowed.iter() {
        if let Some(v) = json.get(*key) {
            obj.insert((*key).to_string(), v.clone());
        }
    }
    Value::Object(obj)
}

/// Rewrite `executeWorkflow` nodes that carry a resource-locator object into
/// plain ID strings, resolved through a name→ID map. Returns the number of
/// nodes rewritten.
///
/// The editor stores `{ "__rl": true, "value": ..., "cachedResultName": ... }`;
/// the API only resolves a bare ID.
pub fn flatten_workflow_refs(definition: &mut Value, ids: &HashMap<String, String>) -> usize {
    let Some(nodes) = definition.get_mut("nodes").and_then(|n| n.as_array_mut()) else {
        return 0;
    };

    let mut fixed = 0;
    for node in nodes {
        if node.get("type").and_then(|t| t.as_str()) != Some("n8n-nodes-base.executeWorkflow") {
            continue;
        }
        let Some(params) = node.get_mut("parameters") else {
            continue;
        };
        let Some(wf_ref) = params.get("workflowId") else {
            continue;
        };
        if !wf_ref.is_object() {
            continue;
        }

        let cached_name = wf_ref
            .get("cachedResultName")
            .and_then(|n| n.as_str())
            .unwrap_or("");
        let current_id = wf_ref.get("value").and_then(|v| v.as_str()).unwrap_or("");

        let resolved = if let Some(id) = ids.get(cached_name) {
            id.clone()
        } else if ids.values().any(|id| id == current_id) {
            current_id.to_string()
        } else {
            continue;
        };

        params["workflowId"] = Value::String(resolved);
        fixed += 1;
    }
    fixed
}

// JS inserted in front of instrumented nodes; logs a bounded preview of the
// items flowing through.
const LOGGING_JS: &str = r#"const items = $input.all();

function buildSafePreview(data, maxLength = 2000) {
  const raw = JSON.stringify(data);
  if (raw.length <= maxLength) return raw;
  return raw.slice(0, maxLength) + '... [truncated]';
}

const logEntry = {
  timestamp: new Date().toISOString(),
  workflowId: $workflow.id,
  workflowName: $workflow.name,
  executionId: $execution.id,
  nodeId: $node.id,
  nodeName: $node.name,
  itemsCount: items.length,
  outputPreview: buildSafePreview(items.map(i => i.json)),
};

console.log('[WF-OUTPUT]', JSON.stringify(logEntry));
return items;"#;

/// Insert a logging code node in front of each named target and rewire the
/// target's inbound connections through it. Targets already instrumented are
/// skipped, so the patch can run repeatedly. Returns the number of loggers
/// inserted.
pub fn inject_logging(definition: &mut Value, targets: &[&str]) -> usize {
    let mut injected = 0;

    for target in targets {
        let logger_name = format!("Log Output ({})", target);

        // Locate the target and capture what the logger node needs.
        let (target_id, position) = {
            let Some(nodes) = definition.get("nodes").and_then(|n| n.as_array()) else {
                return injected;
            };
            if nodes.iter().any(|n| n["name"] == logger_name.as_str()) {
                continue;
            }
            let Some(node) = nodes.iter().find(|n| n["name"] == *target) else {
                continue;
            };
            let id = node["id"].as_str().unwrap_or("node").to_string();
            let pos = node
                .get("position")
                .and_then(|p| p.as_array())
                .and_then(|p| {
                    Some((p.first()?.as_i64()?, p.get(1)?.as_i64()?))
                })
                .unwrap_or((0, 0));
            (id, pos)
        };

        if let Some(nodes) = definition.get_mut("nodes").and_then(|n| n.as_array_mut()) {
            nodes.push(json!({
                "parameters": { "jsCode": LOGGING_JS },
                "id": format!("logger_{}", target_id),
                "name": logger_name,
                "type": "n8n-nodes-base.code",
                "typeVersion": 2,
                "position": [position.0 - 200, position.1]
            }));
        }

        // Rewire: every edge into the target now goes through the logger.
        if let Some(connections) = definition
            .get_mut("connections")
            .and_then(|c| c.as_object_mut())
        {
            for (source, outputs) in connections.iter_mut() {
                if *source == logger_name {
                    continue;
                }
                let Some(outputs) = outputs.as_object_mut() else {
                    continue;
                };
                for routes in outputs.values_mut().filter_map(|r| r.as_array_mut()) {
                    for conn in routes.iter_mut().filter_map(|r| r.as_array_mut()).flatten() {
                        if conn["node"] == *target {
                            conn["node"] = Value::String(logger_name.clone());
                        }
                    }
                }
            }
            connections.insert(
                logger_name,
                json!({ "main": [[{ "node": target, "type": "main", "index": 0 }]] }),
            );
        }

        injected += 1;
    }
    injected
}

/// Apply a regex replacement to the `jsCode` of every code node. Returns how
/// many nodes changed.
pub fn rewrite_code_nodes(definition: &mut Value, pattern: &Regex, replacement: &str) -> usize {
    let Some(nodes) = definition.get_mut("nodes").and_then(|n| n.as_array_mut()) else {
        return 0;
    };

    let mut changed = 0;
    for node in nodes {
        let Some(code) = node
            .get("parameters")
            .and_then(|p| p.get("jsCode"))
            .and_then(|c| c.as_str())
        else {
            continue;
        };
        let rewritten = pattern.replace_all(code, replacement);
        if rewritten != code {
            let rewritten = rewritten.into_owned();
            node["parameters"]["jsCode"] = Value::String(rewritten);
            changed += 1;
        }
    }
    changed
}

/// Exact-literal replacement on raw file text, for fixes that must not go
/// through a JSON parse/serialize round trip. Returns the patched text and
/// the number of occurrences replaced.
pub fn replace_literal(content: &str, from: &str, to: &str) -> (String, usize) {
    let count = content.matches(from).count();
    (content.replace(from, to), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows;

    #[test]
    fn sanitize_keeps_only_updatable_fields() {
        let raw = json!({
            "id": "abc",
            "name": "WF",
            "nodes": [],
            "connections": {},
            "settings": {},
            "createdAt": "2026-01-01",
            "versionId": "v1",
            "shared": []
        });
        let clean = sanitize_for_update(&raw);
        let obj = clean.as_object().unwrap();
        assert!(obj.contains_key("name"));
        assert!(obj.contains_key("nodes"));
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("createdAt"));
        assert!(!obj.contains_key("versionId"));
    }

    #[test]
    fn flatten_resolves_refs_by_cached_name() {
        let mut wf = workflows::telegram_gateway::build();
        let mut ids = HashMap::new();
        ids.insert(
            "BB_03_Availability_Engine".to_string(),
            "A0rZWiKvALsbupmh".to_string(),
        );

        let fixed = flatten_workflow_refs(&mut wf, &ids);
        assert_eq!(fixed, 1);

        let node = wf["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["type"] == "n8n-nodes-base.executeWorkflow")
            .unwrap();
        assert_eq!(node["parameters"]["workflowId"], "A0rZWiKvALsbupmh");
    }

    #[test]
    fn flatten_leaves_unknown_refs_alone() {
        let mut wf = workflows::telegram_gateway::build();
        let fixed = flatten_workflow_refs(&mut wf, &HashMap::new());
        assert_eq!(fixed, 0);
        let node = wf["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["type"] == "n8n-nodes-base.executeWorkflow")
            .unwrap();
        assert!(node["parameters"]["workflowId"].is_object());
    }

    #[test]
    fn inject_logging_rewires_inbound_edges() {
        let mut wf = workflows::availability::build();
        let injected = inject_logging(&mut wf, &["Respond Success"]);
        assert_eq!(injected, 1);

        // Calculate Slots now feeds the logger, and the logger feeds the
        // responder.
        let calc = &wf["connections"]["Calculate Slots"]["main"][0][0]["node"];
        assert_eq!(calc, "Log Output (Respond Success)");
        let logger = &wf["connections"]["Log Output (Respond Success)"]["main"][0][0]["node"];
        assert_eq!(logger, "Respond Success");

        // Still a structurally valid definition.
        assert!(crate::lint::lint_definition(&wf).is_empty());
    }

    #[test]
    fn inject_logging_is_idempotent() {
        let mut wf = workflows::availability::build();
        assert_eq!(inject_logging(&mut wf, &["Respond Success"]), 1);
        assert_eq!(inject_logging(&mut wf, &["Respond Success"]), 0);
    }

    #[test]
    fn inject_logging_skips_unknown_targets() {
        let mut wf = workflows::availability::build();
        assert_eq!(inject_logging(&mut wf, &["No Such Node"]), 0);
    }

    #[test]
    fn rewrite_code_nodes_counts_changes() {
        let mut wf = workflows::admin_dashboard::build();
        let re = Regex::new(r"require\('crypto'\)").unwrap();
        let changed = rewrite_code_nodes(&mut wf, &re, "globalThis.crypto");
        assert_eq!(changed, 1);

        let sign = wf["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["name"] == "Code: Sign JWT")
            .unwrap();
        let code = sign["parameters"]["jsCode"].as_str().unwrap();
        assert!(code.contains("globalThis.crypto"));
        assert!(!code.contains("require('crypto')"));
    }

    #[test]
    fn replace_literal_reports_occurrences() {
        let content = "      ,\n      _meta: {";
        let (patched, count) = replace_literal(content, "      ,\n      _meta: {", "      },\n      _meta: {");
        assert_eq!(count, 1);
        assert!(patched.starts_with("      },"));

        let (same, zero) = replace_literal("abc", "xyz", "q");
        assert_eq!(zero, 0);
        assert_eq!(same, "abc");
    }
}
