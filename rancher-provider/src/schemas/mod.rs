//! Rancher resource schema definitions

pub mod data;
pub mod resources;

use rancher_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Orchestration engines with a public project template
pub const ORCHESTRATIONS: &[&str] = &["cattle", "kubernetes", "mesos", "swarm", "windows"];

/// Returns all Rancher schemas, managed resources first
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = resources::schemas();
    schemas.extend(data::schemas());
    schemas
}

pub(crate) fn name() -> AttributeSchema {
    AttributeSchema::new("name", AttributeType::String)
        .required()
        .with_description("Name of the resource")
}

pub(crate) fn description() -> AttributeSchema {
    AttributeSchema::new("description", AttributeType::String)
        .with_description("Free-form description")
}

/// Owning environment; moving to another environment replaces the resource
pub(crate) fn environment_id() -> AttributeSchema {
    AttributeSchema::new("environment_id", AttributeType::String)
        .required()
        .force_new()
        .with_description("ID of the environment the resource belongs to")
}

pub(crate) fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

/// One network policy rule
pub(crate) fn policy_rule() -> ResourceSchema {
    ResourceSchema::new("policy")
        .attribute(
            AttributeSchema::new("action", AttributeType::one_of(&["allow", "deny"])).required(),
        )
        .attribute(AttributeSchema::new(
            "within",
            AttributeType::one_of(&["stack", "service", "linked"]),
        ))
        .attribute(AttributeSchema::new("between", AttributeType::String))
        .attribute(AttributeSchema::new("from", AttributeType::String))
        .attribute(AttributeSchema::new("to", AttributeType::String))
        .attribute(
            AttributeSchema::new("ports", AttributeType::String)
                .with_description("Comma-separated ports, only on from/to rules"),
        )
}

/// One environment member grant
pub(crate) fn member() -> ResourceSchema {
    ResourceSchema::new("member")
        .attribute(AttributeSchema::new("external_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("external_id_type", AttributeType::String).required())
        .attribute(AttributeSchema::new("role", AttributeType::String).required())
}
