//! Read-only lookup schemas

use rancher_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{computed, member, name, policy_rule};

pub fn schemas() -> Vec<ResourceSchema> {
    vec![environment(), certificate(), setting()]
}

pub fn environment() -> ResourceSchema {
    ResourceSchema::new("rancher_environment")
        .with_description("Look up an environment by name")
        .attribute(name())
        .attribute(computed("description", AttributeType::String))
        .attribute(computed("orchestration", AttributeType::String))
        .attribute(computed("project_template_id", AttributeType::String))
        .attribute(computed("default_policy", AttributeType::String))
        .attribute(computed("policy", AttributeType::set_of(policy_rule())))
        .attribute(computed("member", AttributeType::set_of(member())))
}

pub fn certificate() -> ResourceSchema {
    ResourceSchema::new("rancher_certificate")
        .with_description("Look up a certificate by name")
        .attribute(name())
        .attribute(
            AttributeSchema::new("environment_id", AttributeType::String)
                .required()
                .with_description("ID of the environment holding the certificate"),
        )
        .attribute(computed("description", AttributeType::String))
        .attribute(computed("cn", AttributeType::String))
        .attribute(computed("algorithm", AttributeType::String))
        .attribute(computed("cert_fingerprint", AttributeType::String))
        .attribute(computed("expires_at", AttributeType::String))
        .attribute(computed("issued_at", AttributeType::String))
        .attribute(computed("issuer", AttributeType::String))
        .attribute(computed("key_size", AttributeType::Int))
        .attribute(computed("serial_number", AttributeType::String))
        .attribute(computed(
            "subject_alternative_names",
            AttributeType::Set(Box::new(AttributeType::String)),
        ))
        .attribute(computed("version", AttributeType::String))
}

pub fn setting() -> ResourceSchema {
    ResourceSchema::new("rancher_setting")
        .attribute(name())
        .attribute(computed("value", AttributeType::String))
}
