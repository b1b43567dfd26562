use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use rancher_core::provider::Provider;
use rancher_core::resource::{Resource, State, Value};
use rancher_provider::resources::ResourceKind;
use rancher_provider::{ProviderConfig, RancherProvider};

#[derive(Parser)]
#[command(name = "rancher-tf")]
#[command(about = "Run single Rancher provider operations against a live server", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Rancher server URL [env: RANCHER_URL]
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API access key [env: RANCHER_ACCESS_KEY]
    #[arg(long, global = true)]
    access_key: Option<String>,

    /// API secret key [env: RANCHER_SECRET_KEY]
    #[arg(long, global = true)]
    secret_key: Option<String>,

    /// Path to the Rancher CLI cli.json [env: RANCHER_CLIENT_CONFIG]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the given values as-is
    #[arg(long, global = true)]
    skip_config_validation: bool,
}

#[derive(Args)]
struct Target {
    /// Resource type (e.g. rancher_stack)
    resource_type: String,

    /// Instance name used in messages
    #[arg(long, default_value = "cli")]
    name: String,

    /// Declared attribute as key=value; `key.sub=value` fills a map, JSON values are parsed
    #[arg(short = 'a', long = "attr", value_parser = parse_attribute)]
    attributes: Vec<(String, Value)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a managed resource by identifier
    Read {
        #[command(flatten)]
        target: Target,

        /// Server-assigned identifier
        #[arg(long)]
        id: String,
    },
    /// Create a resource and wait for it to settle
    Create {
        #[command(flatten)]
        target: Target,
    },
    /// Import an existing resource (`<parent>/<id>` or a bare id), then read it
    Import {
        #[command(flatten)]
        target: Target,

        external_id: String,
    },
    /// Delete a resource and wait for the removal to complete
    Delete {
        #[command(flatten)]
        target: Target,

        /// Server-assigned identifier
        #[arg(long)]
        id: String,
    },
    /// Run a data lookup (environment, certificate, setting)
    Lookup {
        #[command(flatten)]
        target: Target,
    },
    /// Print resource and lookup schemas
    Schema {
        /// Only this resource type
        resource_type: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        command => run_operation(&cli.connection, command).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn provider_config(connection: &Connection) -> ProviderConfig {
    let mut config = ProviderConfig::from_env();
    if let Some(url) = &connection.api_url {
        config.api_url = url.clone();
    }
    if let Some(key) = &connection.access_key {
        config.access_key = key.clone();
    }
    if let Some(key) = &connection.secret_key {
        config.secret_key = key.clone();
    }
    if let Some(path) = &connection.config {
        config.config = Some(path.clone());
    }
    config.skip_config_validation = connection.skip_config_validation;
    config
}

async fn run_operation(connection: &Connection, command: Commands) -> Result<(), String> {
    let resolved = provider_config(connection)
        .resolve()
        .map_err(|e| e.to_string())?;
    let client = resolved.client().map_err(|e| e.to_string())?;
    let provider = RancherProvider::new(client);

    match command {
        Commands::Read { target, id } => {
            let resource = target.resource(false);
            let state = provider
                .read(&resource, Some(&id))
                .await
                .map_err(|e| e.to_string())?;
            print_state(&resource, &state)
        }
        Commands::Create { target } => {
            let resource = target.resource(false);
            let state = provider.create(&resource).await.map_err(|e| e.to_string())?;
            print_state(&resource, &state)
        }
        Commands::Import {
            target,
            external_id,
        } => {
            let resource = target.resource(false);
            let imported = provider
                .import(&resource.id, &external_id)
                .await
                .map_err(|e| e.to_string())?;
            let identifier = imported
                .identifier
                .clone()
                .ok_or_else(|| format!("Import of {} returned no identifier", external_id))?;
            let resource = imported
                .attributes
                .into_iter()
                .fold(resource, |r, (k, v)| r.with_attribute(k, v));
            let state = provider
                .read(&resource, Some(&identifier))
                .await
                .map_err(|e| e.to_string())?;
            print_state(&resource, &state)
        }
        Commands::Delete { target, id } => {
            let resource = target.resource(false);
            provider
                .delete(&resource, &id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{} {} ({})", "Deleted".green().bold(), resource.id, id);
            Ok(())
        }
        Commands::Lookup { target } => {
            let resource = target.resource(true);
            let state = provider.read(&resource, None).await.map_err(|e| e.to_string())?;
            print_state(&resource, &state)
        }
        Commands::Schema { .. } => Ok(()),
    }
}

impl Target {
    fn resource(&self, read_only: bool) -> Resource {
        let mut resource =
            Resource::new(&self.resource_type, &self.name).with_read_only(read_only);
        for (key, value) in &self.attributes {
            match key.split_once('.') {
                None => {
                    resource.attributes.insert(key.clone(), value.clone());
                }
                Some((map_key, sub)) => {
                    let entry = resource
                        .attributes
                        .entry(map_key.to_string())
                        .or_insert_with(|| Value::Map(HashMap::new()));
                    if let Value::Map(map) = entry {
                        map.insert(sub.to_string(), value.clone());
                    }
                }
            }
        }
        resource
    }
}

/// `key=value`; JSON arrays and objects are decoded into nested values
fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty attribute name in '{}'", raw));
    }
    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        v if v.starts_with('[') || v.starts_with('{') => {
            let json: serde_json::Value =
                serde_json::from_str(v).map_err(|e| format!("{}: {}", key, e))?;
            json_to_value(&json)
        }
        v => Value::String(v.to_string()),
    };
    Ok((key.to_string(), value))
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::String(n.to_string()),
        },
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
        serde_json::Value::Null => Value::String(String::new()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => {
            let obj: serde_json::Map<_, _> = map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(obj)
        }
    }
}

/// Attribute bag as JSON, sensitive values masked
fn state_json(resource: &Resource, state: &State) -> serde_json::Value {
    let sensitive: Vec<String> = ResourceKind::resolve(&resource.id.resource_type, resource.read_only)
        .map(|kind| {
            let schema = kind.schema();
            schema
                .sensitive_attributes()
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let attributes: serde_json::Map<_, _> = state
        .attributes
        .iter()
        .map(|(k, v)| {
            let shown = if sensitive.contains(k) {
                serde_json::Value::String("(sensitive)".to_string())
            } else {
                value_to_json(v)
            };
            (k.clone(), shown)
        })
        .collect();
    serde_json::json!({
        "resource": resource.id.to_string(),
        "identifier": state.identifier,
        "exists": state.exists,
        "attributes": attributes,
    })
}

fn print_state(resource: &Resource, state: &State) -> Result<(), String> {
    let rendered =
        serde_json::to_string_pretty(&state_json(resource, state)).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let kinds: Vec<ResourceKind> = ResourceKind::ALL
        .into_iter()
        .filter(|kind| resource_type.is_none_or(|t| kind.type_name() == t))
        .collect();
    if kinds.is_empty() {
        return Err(format!(
            "Unknown resource type: {}",
            resource_type.unwrap_or_default()
        ));
    }

    for kind in kinds {
        let schema = kind.schema();
        let role = if kind.is_data_source() { "data" } else { "resource" };
        println!("{} {}", role.cyan(), schema.resource_type.bold());
        if let Some(description) = &schema.description {
            println!("  {}", description.dimmed());
        }
        let mut attributes: Vec<_> = schema.attributes.values().collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        for attr in attributes {
            let mut flags = Vec::new();
            if attr.required {
                flags.push("required");
            }
            if attr.computed {
                flags.push("computed");
            }
            if attr.force_new {
                flags.push("force-new");
            }
            if attr.sensitive {
                flags.push("sensitive");
            }
            println!("  {:<28} {:<16} {}", attr.name, attr.attr_type.to_string(), flags.join(", "));
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_and_json_attributes() {
        assert_eq!(
            parse_attribute("name=web").unwrap(),
            ("name".to_string(), Value::String("web".to_string()))
        );
        assert_eq!(
            parse_attribute("start_on_create=true").unwrap().1,
            Value::Bool(true)
        );
        assert_eq!(
            parse_attribute(r#"policy=[{"action":"allow","within":"stack"}]"#)
                .unwrap()
                .1,
            Value::List(vec![Value::Map(HashMap::from([
                ("action".to_string(), Value::from("allow")),
                ("within".to_string(), Value::from("stack")),
            ]))])
        );
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }

    #[test]
    fn dotted_keys_fill_a_map() {
        let target = Target {
            resource_type: "rancher_stack".to_string(),
            name: "web".to_string(),
            attributes: vec![
                parse_attribute("environment.PORT=80").unwrap(),
                parse_attribute("environment.HOST=db").unwrap(),
                parse_attribute("name=web").unwrap(),
            ],
        };

        let resource = target.resource(false);

        assert_eq!(
            resource.get_string_map("environment"),
            HashMap::from([
                ("PORT".to_string(), "80".to_string()),
                ("HOST".to_string(), "db".to_string()),
            ])
        );
        assert_eq!(resource.get_str("name"), "web");
    }

    #[test]
    fn sensitive_values_are_masked() {
        let resource = Resource::new("rancher_secret", "db");
        let state = State::existing(
            resource.id.clone(),
            HashMap::from([
                ("name".to_string(), Value::from("db")),
                ("value".to_string(), Value::from("hunter2")),
            ]),
        )
        .with_identifier("1se1");

        let json = state_json(&resource, &state);

        assert_eq!(json["attributes"]["value"], "(sensitive)");
        assert_eq!(json["attributes"]["name"], "db");
        assert_eq!(json["identifier"], "1se1");
    }

    #[test]
    fn schema_rejects_unknown_type() {
        assert!(run_schema(Some("rancher_cluster")).is_err());
    }
}
