//! Generator for `BB_03_Availability_Engine`.
//!
//! Computes free booking slots for a provider: validates the request, loads
//! the provider, its schedule configuration and the existing bookings, then
//! subtracts the bookings from the configured grid.

use serde_json::{Value, json};

// JS: input contract — provider_slug, target_date, optional days_range
const JS_VALIDATE: &str = r#"
const root = items[0].json || {};
const data = root.body ? root.body : root;
let errors = [];

if (typeof data.provider_slug !== 'string' || data.provider_slug.trim().length === 0) {
    errors.push("Validation: 'provider_slug' must be a non-empty string.");
}
if (typeof data.target_date !== 'string' || !/^\d{4}-\d{2}-\d{2}$/.test(data.target_date)) {
    errors.push("Validation: 'target_date' must be a YYYY-MM-DD string.");
}
const daysRange = Number(data.days_range ?? 1);
if (!Number.isInteger(daysRange) || daysRange < 1 || daysRange > 30) {
    errors.push("Validation: 'days_range' must be an integer between 1 and 30.");
}

if (errors.length > 0) {
    return [{ json: { success: false, status: 400, message: errors.join(" ") } }];
}

return [{
    json: {
        success: true,
        provider_slug: data.provider_slug.trim(),
        target_date: data.target_date,
        days_range: daysRange
    }
}];
"#;

// JS: build the slot grid from the schedule config and drop booked ranges
const JS_CALC_SLOTS: &str = r#"
const provider = $node['DB: Provider'].json;
const config = $node['DB: Schedule Config'].json;
const bookings = $node['DB: Bookings'].all().map(i => i.json).filter(b => b.start_time);
const input = $node['Validate Input'].json;

const slotMins = Number(config.slot_duration_mins || 30);
const startHour = Number(config.schedule_start_hour || 9);
const endHour = Number(config.schedule_end_hour || 18);

const slots = [];
for (let d = 0; d < input.days_range; d++) {
    const day = new Date(input.target_date + 'T00:00:00Z');
    day.setUTCDate(day.getUTCDate() + d);
    for (let h = startHour; h < endHour; h++) {
        for (let m = 0; m < 60; m += slotMins) {
            const start = new Date(day);
            start.setUTCHours(h, m, 0, 0);
            const end = new Date(start.getTime() + slotMins * 60000);
            const taken = bookings.some(b =>
                new Date(b.start_time) < end && new Date(b.end_time) > start);
            if (!taken) {
                slots.push({ start_iso: start.toISOString(), end_iso: end.toISOString() });
            }
        }
    }
}

return [{
    json: {
        success: true,
        provider_slug: input.provider_slug,
        provider_name: provider.name || null,
        target_date: input.target_date,
        slots
    }
}];
"#;

const SQL_PROVIDER: &str = r#"
SELECT id, name, slug, timezone
FROM public.professionals
WHERE slug = $1 AND deleted_at IS NULL;
"#;

const SQL_SCHEDULE_CONFIG: &str = r#"
SELECT slot_duration_mins, schedule_start_hour, schedule_end_hour, working_days
FROM public.schedule_config
WHERE professional_id = (SELECT id FROM public.professionals WHERE slug = $1);
"#;

const SQL_BOOKINGS: &str = r#"
SELECT b.start_time, b.end_time, b.status
FROM public.bookings b
JOIN public.professionals p ON b.professional_id = p.id
WHERE p.slug = $1
  AND b.status != 'cancelled'
  AND b.start_time >= $2::date
  AND b.start_time < $2::date + ($3 || ' days')::interval;
"#;

pub fn build() -> Value {
    json!({
        "name": "BB_03_Availability_Engine",
        "nodes": [
            { "parameters": {"httpMethod": "POST", "path": "bb03-main", "responseMode": "responseNode", "options": {}}, "id": "web", "name": "Webhook", "type": "n8n-nodes-base.webhook", "typeVersion": 1, "position": [0, 0] },
            { "parameters": {"jsCode": JS_VALIDATE}, "id": "validate", "name": "Validate Input", "type": "n8n-nodes-base.code", "typeVersion": 2, "position": [200, 0] },
            { "parameters": {"conditions": {"boolean": [{"value1": "={{ $json.success }}", "value2": true}]}}, "id": "is_valid", "name": "Valid?", "type": "n8n-nodes-base.if", "typeVersion": 1, "position": [400, 0] },
            {
                "parameters": {
                    "httpCode": "400", "respondWith": "json",
                    "responseBody": "={{ { \"success\": false, \"message\": $json.message } }}"
                },
                "id": "resp_400", "name": "Respond Error", "type": "n8n-nodes-base.respondToWebhook", "typeVersion": 1, "position": [600, 200]
            },
            {
                "parameters": {
                    "operation": "executeQuery", "query": SQL_PROVIDER,
                    "options": { "queryParameters": { "values": [ { "value": "={{ $json.provider_slug }}" } ] } }
                },
                "id": "db_provider", "name": "DB: Provider", "type": "n8n-nodes-base.postgres", "typeVersion": 2.4, "position": [600, -100], "credentials": {"postgres": {"name": "Postgres Neon"}}
            },
            {
                "parameters": {
                    "operation": "executeQuery", "query": SQL_SCHEDULE_CONFIG,
                    "options": { "queryParameters": { "values": [ { "value": "={{ $node['Validate Input'].json.provider_slug }}" } ] } }
                },
                "id": "db_config", "name": "DB: Schedule Config", "type": "n8n-nodes-base.postgres", "typeVersion": 2.4, "position": [800, -100], "credentials": {"postgres": {"name": "Postgres Neon"}}
            },
            {
                "parameters": {
                    "operation": "executeQuery", "query": SQL_BOOKINGS,
                    "options": { "queryParameters": { "values": [
                        { "value": "={{ $node['Validate Input'].json.provider_slug }}" },
                        { "value": "={{ $node['Validate Input'].json.target_date }}" },
                        { "value": "={{ $node['Validate Input'].json.days_range }}" }
                    ] } }
                },
                "id": "db_bookings", "name": "DB: Bookings", "type": "n8n-nodes-base.postgres", "typeVersion": 2.4, "position": [1000, -100], "credentials": {"postgres": {"name": "Postgres Neon"}},
                "alwaysOutputData": true
            },
            { "parameters": {"jsCode": JS_CALC_SLOTS}, "id": "calc", "name": "Calculate Slots", "type": "n8n-nodes-base.code", "typeVersion": 2, "position": [1200, -100] },
            { "parameters": { "respondWith": "json", "responseBody": "={{ $json }}" }, "id": "resp_ok", "name": "Respond Success", "type": "n8n-nodes-base.respondToWebhook", "typeVersion": 1, "position": [1400, -100] }
        ],
        "connections": {
            "Webhook": {"main": [[{"node": "Validate Input", "type": "main", "index": 0}]]},
            "Validate Input": {"main": [[{"node": "Valid?", "type": "main", "index": 0}]]},
            "Valid?": {"main": [[{"node": "DB: Provider", "type": "main", "index": 0}], [{"node": "Respond Error", "type": "main", "index": 0}]]},
            "DB: Provider": {"main": [[{"node": "DB: Schedule Config", "type": "main", "index": 0}]]},
            "DB: Schedule Config": {"main": [[{"node": "DB: Bookings", "type": "main", "index": 0}]]},
            "DB: Bookings": {"main": [[{"node": "Calculate Slots", "type": "main", "index": 0}]]},
            "Calculate Slots": {"main": [[{"node": "Respond Success", "type": "main", "index": 0}]]}
        },
        "settings": {"executionOrder": "v1"}
    })
}
