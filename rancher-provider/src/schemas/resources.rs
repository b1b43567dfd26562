//! Managed resource schemas

use rancher_core::resource::Value;
use rancher_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{ORCHESTRATIONS, computed, description, environment_id, member, name, policy_rule};

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        environment(),
        stack(),
        secret(),
        volume(),
        api_key(),
        certificate(),
        registration_token(),
        registry(),
        registry_credential(),
        host(),
    ]
}

pub fn environment() -> ResourceSchema {
    ResourceSchema::new("rancher_environment")
        .with_description("A Rancher environment (project)")
        .attribute(name())
        .attribute(description())
        .attribute(
            AttributeSchema::new("orchestration", AttributeType::one_of(ORCHESTRATIONS))
                .force_new()
                .conflicts_with("project_template_id")
                .with_description("Orchestration engine, resolved to its public project template"),
        )
        .attribute(
            AttributeSchema::new("project_template_id", AttributeType::String)
                .force_new()
                .computed()
                .conflicts_with("orchestration"),
        )
        .attribute(
            AttributeSchema::new("default_policy", AttributeType::one_of(&["allow", "deny"]))
                .computed()
                .with_description("Default action of the environment network policy"),
        )
        .attribute(AttributeSchema::new(
            "policy",
            AttributeType::set_of(policy_rule()),
        ))
        .attribute(AttributeSchema::new("member", AttributeType::set_of(member())).computed())
}

pub fn stack() -> ResourceSchema {
    ResourceSchema::new("rancher_stack")
        .with_description("A Rancher stack built from compose files or a catalog template")
        .attribute(name())
        .attribute(description())
        .attribute(environment_id())
        .attribute(AttributeSchema::new("docker_compose", AttributeType::String))
        .attribute(AttributeSchema::new("rancher_compose", AttributeType::String))
        .attribute(AttributeSchema::new(
            "environment",
            AttributeType::string_map(),
        ))
        .attribute(
            AttributeSchema::new("catalog_id", AttributeType::String)
                .with_description("Catalog template as group:name:version"),
        )
        .attribute(
            AttributeSchema::new("scope", AttributeType::one_of(&["user", "system"]))
                .with_default(Value::from("user")),
        )
        .attribute(AttributeSchema::new("start_on_create", AttributeType::Bool).computed())
        .attribute(
            AttributeSchema::new("finish_upgrade", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("Confirm the upgrade once the new services are up"),
        )
        .attribute(computed("rendered_docker_compose", AttributeType::String))
        .attribute(computed("rendered_rancher_compose", AttributeType::String))
}

pub fn secret() -> ResourceSchema {
    ResourceSchema::new("rancher_secret")
        .attribute(name().force_new())
        .attribute(description())
        .attribute(environment_id())
        .attribute(
            AttributeSchema::new("value", AttributeType::String)
                .required()
                .force_new()
                .sensitive(),
        )
}

pub fn volume() -> ResourceSchema {
    ResourceSchema::new("rancher_volume")
        .attribute(name().force_new())
        .attribute(description())
        .attribute(environment_id())
        .attribute(
            AttributeSchema::new("driver", AttributeType::String)
                .required()
                .force_new(),
        )
}

pub fn api_key() -> ResourceSchema {
    ResourceSchema::new("rancher_api_key")
        .with_description("An account API key")
        .attribute(name())
        .attribute(description())
        .attribute(
            AttributeSchema::new("reference_id", AttributeType::String)
                .required()
                .force_new()
                .with_description("Account (environment) the key belongs to"),
        )
        .attribute(computed("kind", AttributeType::String))
        .attribute(computed("public_value", AttributeType::String))
        .attribute(computed("secret_value", AttributeType::String).sensitive())
        .attribute(computed("uuid", AttributeType::String))
}

pub fn certificate() -> ResourceSchema {
    ResourceSchema::new("rancher_certificate")
        .attribute(name())
        .attribute(description())
        .attribute(environment_id())
        .attribute(AttributeSchema::new("cert", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("key", AttributeType::String)
                .required()
                .sensitive(),
        )
        .attribute(AttributeSchema::new("cert_chain", AttributeType::String))
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

pub fn registration_token() -> ResourceSchema {
    ResourceSchema::new("rancher_registration_token")
        .attribute(name().force_new())
        .attribute(description())
        .attribute(environment_id())
        .attribute(
            AttributeSchema::new("host_labels", AttributeType::string_map())
                .force_new()
                .with_description("Labels applied to hosts registered with this token"),
        )
        .attribute(computed("command", AttributeType::String))
        .attribute(computed("registration_url", AttributeType::String))
        .attribute(computed("token", AttributeType::String))
        .attribute(computed("image", AttributeType::String))
}

pub fn registry() -> ResourceSchema {
    ResourceSchema::new("rancher_registry")
        .attribute(name())
        .attribute(description())
        .attribute(environment_id())
        .attribute(
            AttributeSchema::new("server_address", AttributeType::String)
                .required()
                .force_new(),
        )
}

pub fn registry_credential() -> ResourceSchema {
    ResourceSchema::new("rancher_registry_credential")
        .attribute(name())
        .attribute(description())
        .attribute(
            AttributeSchema::new("registry_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("email", AttributeType::String))
        .attribute(AttributeSchema::new("public_value", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("secret_value", AttributeType::String)
                .required()
                .sensitive(),
        )
}

pub fn host() -> ResourceSchema {
    ResourceSchema::new("rancher_host")
        .with_description("A host registered in an environment, adopted by hostname")
        .attribute(name())
        .attribute(description())
        .attribute(environment_id())
        .attribute(
            AttributeSchema::new("hostname", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("labels", AttributeType::string_map()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn orchestration_conflicts_with_template() {
        let mut attrs: HashMap<String, Value> = HashMap::new();
        attrs.insert("name".to_string(), Value::from("prod"));
        attrs.insert("orchestration".to_string(), Value::from("cattle"));
        assert!(environment().validate(&attrs).is_ok());

        attrs.insert("project_template_id".to_string(), Value::from("1pt3"));
        assert!(environment().validate(&attrs).is_err());
    }

    #[test]
    fn unknown_orchestration_is_rejected() {
        let attrs: HashMap<String, Value> = [
            ("name".to_string(), Value::from("prod")),
            ("orchestration".to_string(), Value::from("nomad")),
        ]
        .into_iter()
        .collect();
        assert!(environment().validate(&attrs).is_err());
    }

    #[test]
    fn secret_material_is_sensitive() {
        assert_eq!(secret().sensitive_attributes(), vec!["value"]);
        assert_eq!(api_key().sensitive_attributes(), vec!["secret_value"]);
        assert_eq!(certificate().sensitive_attributes(), vec!["key"]);
    }
}
