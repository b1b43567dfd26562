//! Network policy rules
//!
//! Locally a rule is a flat block: `action` plus exactly one of `within`,
//! `between` or the `from`/`to` pair, with an optional comma-separated
//! `ports` string on from/to rules. On the wire `between`, `from` and `to`
//! are nested objects and ports are a list.

use std::collections::HashMap;

use rancher_client::types::{NetworkPolicyRule, NetworkPolicyRuleBetween, NetworkPolicyRuleMember};
use rancher_core::resource::Value;

/// Message shared by every shape conflict
pub const POLICY_SHAPE_CONFLICT: &str = "only one of `within` `between` `to|from` can be set";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("{}", POLICY_SHAPE_CONFLICT)]
    Shape,

    #[error("policy rule sets neither `within`, `between` nor `from`/`to`")]
    NoShape,

    #[error("invalid policy action '{0}', expected allow or deny")]
    Action(String),

    #[error("invalid policy scope '{0}', expected stack, service or linked")]
    Within(String),

    #[error("`ports` can only be set on `from`/`to` rules")]
    Ports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyAction {
    Allow,
    Deny,
}

impl PolicyAction {
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(PolicyAction::Allow),
            "deny" => Ok(PolicyAction::Deny),
            _ => Err(PolicyError::Action(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Allow => "allow",
            PolicyAction::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Within {
    Stack,
    Service,
    Linked,
}

impl Within {
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s.to_ascii_lowercase().as_str() {
            "stack" => Ok(Within::Stack),
            "service" => Ok(Within::Service),
            "linked" => Ok(Within::Linked),
            _ => Err(PolicyError::Within(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Within::Stack => "stack",
            Within::Service => "service",
            Within::Linked => "linked",
        }
    }
}

/// The one populated shape of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyShape {
    Within(Within),
    Between { group_by: String },
    FromTo {
        from: String,
        to: String,
        ports: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRule {
    pub action: PolicyAction,
    pub shape: PolicyShape,
}

/// Split a comma-separated port string; blank segments are dropped
pub fn parse_ports(ports: &str) -> Vec<String> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn block_str<'a>(block: &'a HashMap<String, Value>, key: &str) -> &'a str {
    block.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl PolicyRule {
    pub fn within(action: PolicyAction, within: Within) -> Self {
        Self {
            action,
            shape: PolicyShape::Within(within),
        }
    }

    pub fn between(action: PolicyAction, group_by: impl Into<String>) -> Self {
        Self {
            action,
            shape: PolicyShape::Between {
                group_by: group_by.into(),
            },
        }
    }

    pub fn from_to(
        action: PolicyAction,
        from: impl Into<String>,
        to: impl Into<String>,
        ports: Vec<String>,
    ) -> Self {
        Self {
            action,
            shape: PolicyShape::FromTo {
                from: from.into(),
                to: to.into(),
                ports,
            },
        }
    }

    /// Parse and validate one declared rule block
    pub fn from_attributes(block: &HashMap<String, Value>) -> Result<Self, PolicyError> {
        let within = block_str(block, "within");
        let between = block_str(block, "between");
        let from = block_str(block, "from");
        let to = block_str(block, "to");
        let ports = block_str(block, "ports");

        if !within.is_empty() && !between.is_empty() {
            return Err(PolicyError::Shape);
        }
        if (!within.is_empty() || !between.is_empty()) && (!from.is_empty() || !to.is_empty()) {
            return Err(PolicyError::Shape);
        }
        if from.is_empty() != to.is_empty() {
            return Err(PolicyError::Shape);
        }

        let action = PolicyAction::parse(block_str(block, "action"))?;
        let shape = if !within.is_empty() {
            PolicyShape::Within(Within::parse(within)?)
        } else if !between.is_empty() {
            PolicyShape::Between {
                group_by: between.to_string(),
            }
        } else if !from.is_empty() {
            PolicyShape::FromTo {
                from: from.to_string(),
                to: to.to_string(),
                ports: parse_ports(ports),
            }
        } else {
            return Err(PolicyError::NoShape);
        };

        if !ports.is_empty() && !matches!(shape, PolicyShape::FromTo { .. }) {
            return Err(PolicyError::Ports);
        }

        Ok(Self { action, shape })
    }

    /// Flat attribute block; unset fields are omitted
    pub fn to_attributes(&self) -> HashMap<String, Value> {
        let mut block = HashMap::new();
        block.insert("action".to_string(), Value::from(self.action.as_str()));
        match &self.shape {
            PolicyShape::Within(within) => {
                block.insert("within".to_string(), Value::from(within.as_str()));
            }
            PolicyShape::Between { group_by } => {
                block.insert("between".to_string(), Value::from(group_by.as_str()));
            }
            PolicyShape::FromTo { from, to, ports } => {
                block.insert("from".to_string(), Value::from(from.as_str()));
                block.insert("to".to_string(), Value::from(to.as_str()));
                if !ports.is_empty() {
                    block.insert("ports".to_string(), Value::from(ports.join(",")));
                }
            }
        }
        block
    }

    pub fn to_wire(&self) -> NetworkPolicyRule {
        let mut rule = NetworkPolicyRule {
            action: self.action.as_str().to_string(),
            ..Default::default()
        };
        match &self.shape {
            PolicyShape::Within(within) => rule.within = within.as_str().to_string(),
            PolicyShape::Between { group_by } => {
                rule.between = Some(NetworkPolicyRuleBetween {
                    group_by: group_by.clone(),
                });
            }
            PolicyShape::FromTo { from, to, ports } => {
                rule.from = Some(NetworkPolicyRuleMember {
                    selector: from.clone(),
                });
                rule.to = Some(NetworkPolicyRuleMember {
                    selector: to.clone(),
                });
                rule.ports = ports.clone();
            }
        }
        rule
    }
}

impl TryFrom<&NetworkPolicyRule> for PolicyRule {
    type Error = PolicyError;

    fn try_from(rule: &NetworkPolicyRule) -> Result<Self, Self::Error> {
        PolicyRule::from_attributes(&decode_rule(rule))
    }
}

/// Flat view of a wire rule with empty sub-fields dropped
fn decode_rule(rule: &NetworkPolicyRule) -> HashMap<String, Value> {
    let mut block = HashMap::new();
    block.insert("action".to_string(), Value::from(rule.action.as_str()));

    let mut put = |key: &str, value: &str| {
        if !value.is_empty() {
            block.insert(key.to_string(), Value::from(value));
        }
    };
    put("within", &rule.within);
    put(
        "between",
        rule.between.as_ref().map(|b| b.group_by.as_str()).unwrap_or_default(),
    );
    put(
        "from",
        rule.from.as_ref().map(|m| m.selector.as_str()).unwrap_or_default(),
    );
    put(
        "to",
        rule.to.as_ref().map(|m| m.selector.as_str()).unwrap_or_default(),
    );
    put("ports", &rule.ports.join(","));

    block
}

/// Validate every declared rule block before any remote call
pub fn parse_rules(blocks: &[&HashMap<String, Value>]) -> Result<Vec<PolicyRule>, PolicyError> {
    blocks.iter().map(|b| PolicyRule::from_attributes(b)).collect()
}

pub fn encode_rules(rules: &[PolicyRule]) -> Vec<NetworkPolicyRule> {
    rules.iter().map(PolicyRule::to_wire).collect()
}

/// Flatten wire rules for state
///
/// Decoding is lenient: rules the server holds are reported as they are,
/// even when they would not pass local validation.
pub fn decode_rules(rules: &[NetworkPolicyRule]) -> Value {
    Value::List(
        rules
            .iter()
            .map(|rule| Value::Map(decode_rule(rule)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn from_without_to_is_rejected() {
        let err = PolicyRule::from_attributes(&block(&[
            ("action", "allow"),
            ("from", "a"),
            ("to", ""),
        ]))
        .unwrap_err();
        assert_eq!(err, PolicyError::Shape);
        assert_eq!(err.to_string(), POLICY_SHAPE_CONFLICT);
    }

    #[test]
    fn from_to_with_ports_is_accepted() {
        let rule = PolicyRule::from_attributes(&block(&[
            ("action", "allow"),
            ("from", "a"),
            ("to", "b"),
            ("ports", "80,443"),
        ]))
        .unwrap();

        assert_eq!(
            rule.shape,
            PolicyShape::FromTo {
                from: "a".to_string(),
                to: "b".to_string(),
                ports: vec!["80".to_string(), "443".to_string()],
            }
        );
    }

    #[test]
    fn conflicting_shapes_are_rejected() {
        let within_between = block(&[("action", "deny"), ("within", "stack"), ("between", "app")]);
        let within_from = block(&[("action", "deny"), ("within", "stack"), ("from", "a"), ("to", "b")]);
        let to_only = block(&[("action", "deny"), ("to", "b")]);

        for b in [within_between, within_from, to_only] {
            assert_eq!(PolicyRule::from_attributes(&b), Err(PolicyError::Shape));
        }
    }

    #[test]
    fn missing_shape_and_stray_ports_are_rejected() {
        assert_eq!(
            PolicyRule::from_attributes(&block(&[("action", "allow")])),
            Err(PolicyError::NoShape)
        );
        assert_eq!(
            PolicyRule::from_attributes(&block(&[
                ("action", "allow"),
                ("within", "linked"),
                ("ports", "80"),
            ])),
            Err(PolicyError::Ports)
        );
    }

    #[test]
    fn enums_are_case_insensitive() {
        let rule = PolicyRule::from_attributes(&block(&[("action", "ALLOW"), ("within", "Service")]))
            .unwrap();
        assert_eq!(rule, PolicyRule::within(PolicyAction::Allow, Within::Service));

        assert!(matches!(
            PolicyRule::from_attributes(&block(&[("action", "drop"), ("within", "stack")])),
            Err(PolicyError::Action(_))
        ));
        assert!(matches!(
            PolicyRule::from_attributes(&block(&[("action", "allow"), ("within", "host")])),
            Err(PolicyError::Within(_))
        ));
    }

    #[test]
    fn each_shape_survives_the_wire() {
        let rules = vec![
            PolicyRule::within(PolicyAction::Allow, Within::Linked),
            PolicyRule::between(PolicyAction::Deny, "io.rancher.stack.name"),
            PolicyRule::from_to(PolicyAction::Allow, "app=web", "app=db", vec!["5432".to_string()]),
            PolicyRule::from_to(PolicyAction::Deny, "app=web", "app=cache", Vec::new()),
        ];

        for rule in rules {
            let wire = rule.to_wire();
            assert_eq!(PolicyRule::try_from(&wire).unwrap(), rule);
        }
    }

    #[test]
    fn between_is_nested_on_the_wire() {
        let wire = PolicyRule::between(PolicyAction::Allow, "app").to_wire();
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            serde_json::json!({"action": "allow", "between": {"groupBy": "app"}})
        );
    }

    #[test]
    fn empty_ports_stay_empty() {
        assert!(parse_ports("").is_empty());
        assert!(parse_ports(" , ").is_empty());
        assert_eq!(parse_ports("80,,443,"), vec!["80", "443"]);
        assert_eq!(parse_ports(" 80 , 443"), vec!["80", "443"]);

        let rule = PolicyRule::from_to(PolicyAction::Allow, "a", "b", parse_ports(""));
        let wire = rule.to_wire();
        assert!(wire.ports.is_empty());
        assert!(!rule.to_attributes().contains_key("ports"));
        assert_eq!(PolicyRule::try_from(&wire).unwrap(), rule);
    }

    #[test]
    fn decode_drops_empty_fields() {
        let decoded = decode_rules(&[NetworkPolicyRule {
            action: "allow".to_string(),
            within: "stack".to_string(),
            between: Some(NetworkPolicyRuleBetween::default()),
            ..Default::default()
        }]);

        let Value::List(items) = decoded else {
            panic!("expected list");
        };
        assert_eq!(
            items[0],
            Value::Map(block(&[("action", "allow"), ("within", "stack")]))
        );
    }
}
