//! Project member grants, flattened to `{external_id, external_id_type, role}`

use std::collections::HashMap;

use rancher_client::types::ProjectMember;
use rancher_core::resource::{Value, string_map};

fn field(block: &HashMap<String, Value>, key: &str) -> String {
    block
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn make_members(blocks: &[&HashMap<String, Value>]) -> Vec<ProjectMember> {
    blocks
        .iter()
        .map(|block| ProjectMember {
            external_id: field(block, "external_id"),
            external_id_type: field(block, "external_id_type"),
            role: field(block, "role"),
            ..Default::default()
        })
        .collect()
}

pub fn normalize_members(members: &[ProjectMember]) -> Vec<Value> {
    members
        .iter()
        .map(|m| {
            string_map([
                ("external_id", m.external_id.as_str()),
                ("external_id_type", m.external_id_type.as_str()),
                ("role", m.role.as_str()),
            ])
        })
        .collect()
}
