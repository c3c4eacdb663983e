use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "defaults": {
                "type": "object",
                "properties": {
                    "concurrency": { "type": "integer", "minimum": 1 },
                    "timeout_ms": { "type": "integer", "minimum": 1 },
                    "script_timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "dictionaries": {
                "type": "object",
                "properties": {
                    "dir": { "type": "string" },
                    "users": { "type": "string" },
                    "passwords": { "type": "string" },
                    "directories": { "type": "string" }
                }
            },
            "interpreter": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" }
                }
            },
            "http": {
                "type": "object",
                "properties": {
                    "user_agent": { "type": "string", "minLength": 1 },
                    "max_body_bytes": { "type": "integer", "minimum": 1024 },
                    "accept_invalid_certs": { "type": "boolean" }
                }
            },
            "storage": {
                "type": "object",
                "properties": {
                    "database": { "type": "string" }
                }
            },
            "events": {
                "type": "object",
                "properties": {
                    "channel_capacity": { "type": "integer", "minimum": 16 }
                }
            }
        }
    })
});
