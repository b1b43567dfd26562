//! Resource kinds handled by the provider
//!
//! Dispatch is a closed set: every host-facing type name maps to exactly one
//! [`ResourceKind`], and every kind names its schema.

use rancher_core::provider::ResourceType;
use rancher_core::schema::ResourceSchema;

use crate::schemas::{data, resources};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Environment,
    Stack,
    Secret,
    Volume,
    ApiKey,
    Certificate,
    RegistrationToken,
    Registry,
    RegistryCredential,
    Host,
    EnvironmentLookup,
    CertificateLookup,
    SettingLookup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Environment,
        ResourceKind::Stack,
        ResourceKind::Secret,
        ResourceKind::Volume,
        ResourceKind::ApiKey,
        ResourceKind::Certificate,
        ResourceKind::RegistrationToken,
        ResourceKind::Registry,
        ResourceKind::RegistryCredential,
        ResourceKind::Host,
        ResourceKind::EnvironmentLookup,
        ResourceKind::CertificateLookup,
        ResourceKind::SettingLookup,
    ];

    /// Type name as addressed by the host
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Environment | ResourceKind::EnvironmentLookup => "rancher_environment",
            ResourceKind::Stack => "rancher_stack",
            ResourceKind::Secret => "rancher_secret",
            ResourceKind::Volume => "rancher_volume",
            ResourceKind::ApiKey => "rancher_api_key",
            ResourceKind::Certificate | ResourceKind::CertificateLookup => "rancher_certificate",
            ResourceKind::RegistrationToken => "rancher_registration_token",
            ResourceKind::Registry => "rancher_registry",
            ResourceKind::RegistryCredential => "rancher_registry_credential",
            ResourceKind::Host => "rancher_host",
            ResourceKind::SettingLookup => "rancher_setting",
        }
    }

    /// Human-readable name used in log lines and errors
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Environment | ResourceKind::EnvironmentLookup => "environment",
            ResourceKind::Stack => "stack",
            ResourceKind::Secret => "secret",
            ResourceKind::Volume => "volume",
            ResourceKind::ApiKey => "API key",
            ResourceKind::Certificate | ResourceKind::CertificateLookup => "certificate",
            ResourceKind::RegistrationToken => "registration token",
            ResourceKind::Registry => "registry",
            ResourceKind::RegistryCredential => "registry credential",
            ResourceKind::Host => "host",
            ResourceKind::SettingLookup => "setting",
        }
    }

    pub fn is_data_source(self) -> bool {
        matches!(
            self,
            ResourceKind::EnvironmentLookup
                | ResourceKind::CertificateLookup
                | ResourceKind::SettingLookup
        )
    }

    /// Kind for a host type name; `read_only` selects the lookup variant
    pub fn resolve(type_name: &str, read_only: bool) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == type_name && kind.is_data_source() == read_only)
    }

    pub fn schema(self) -> ResourceSchema {
        match self {
            ResourceKind::Environment => resources::environment(),
            ResourceKind::Stack => resources::stack(),
            ResourceKind::Secret => resources::secret(),
            ResourceKind::Volume => resources::volume(),
            ResourceKind::ApiKey => resources::api_key(),
            ResourceKind::Certificate => resources::certificate(),
            ResourceKind::RegistrationToken => resources::registration_token(),
            ResourceKind::Registry => resources::registry(),
            ResourceKind::RegistryCredential => resources::registry_credential(),
            ResourceKind::Host => resources::host(),
            ResourceKind::EnvironmentLookup => data::environment(),
            ResourceKind::CertificateLookup => data::certificate(),
            ResourceKind::SettingLookup => data::setting(),
        }
    }
}

impl ResourceType for ResourceKind {
    fn name(&self) -> &'static str {
        self.type_name()
    }

    fn schema(&self) -> ResourceSchema {
        ResourceKind::schema(*self)
    }

    fn is_data_source(&self) -> bool {
        ResourceKind::is_data_source(*self)
    }
}

/// Every resource type, boxed for the host
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| Box::new(kind) as Box<dyn ResourceType>)
        .collect()
}
