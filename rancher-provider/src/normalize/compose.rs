//! Compose bundles and catalog template resolution

use rancher_client::RancherApi;
use rancher_client::error::ClientError;
use rancher_client::types::TemplateVersion;

pub const DOCKER_COMPOSE_FILE: &str = "docker-compose.yml";
pub const RANCHER_COMPOSE_FILE: &str = "rancher-compose.yml";

const CATALOG_SCHEME: &str = "catalog://";
const SYSTEM_PREFIX: &str = "system-";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog_id: {0} not in 'catalog:name:N' format")]
    Format(String),

    #[error("Failed to get catalog template: {source}")]
    Template {
        #[source]
        source: ClientError,
    },

    #[error("Unknown catalog template {0}")]
    UnknownTemplate(String),

    #[error("Did not find template {0}")]
    VersionNotFound(String),

    #[error("Bad response looking up {url}: {source}")]
    Version {
        url: String,
        #[source]
        source: ClientError,
    },
}

/// Catalog reference of the form `group:name:version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogId {
    raw: String,
    template: String,
}

impl CatalogId {
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let parts: Vec<&str> = raw.splitn(3, ':').collect();
        if parts.len() != 3 {
            return Err(CatalogError::Format(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            template: format!("{}:{}", parts[0], parts[1]),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Template id without the version suffix
    pub fn template_id(&self) -> &str {
        &self.template
    }

    /// Stack `externalId` for this template
    pub fn external_id(&self, system: bool) -> String {
        let prefix = if system { SYSTEM_PREFIX } else { "" };
        format!("{}{}{}", prefix, CATALOG_SCHEME, self.raw)
    }
}

/// Recover the catalog id from a stack `externalId`
pub fn catalog_id_from_external(external_id: &str) -> String {
    let trimmed = external_id.strip_prefix(SYSTEM_PREFIX).unwrap_or(external_id);
    trimmed
        .strip_prefix(CATALOG_SCHEME)
        .unwrap_or(trimmed)
        .to_string()
}

/// Fetch the file bundle of one catalog template version
///
/// The version link must end with the full catalog id and the fetched
/// version must carry that id; anything else is an error.
pub async fn resolve_template_version<C: RancherApi>(
    api: &C,
    catalog_id: &CatalogId,
) -> Result<TemplateVersion, CatalogError> {
    let template = match api.template(catalog_id.template_id()).await {
        Ok(template) => template,
        Err(e) if e.is_not_found() => {
            return Err(CatalogError::UnknownTemplate(catalog_id.as_str().to_string()));
        }
        Err(source) => return Err(CatalogError::Template { source }),
    };

    let mut links: Vec<&String> = template.version_links.values().collect();
    links.sort();
    let link = links
        .into_iter()
        .find(|url| url.ends_with(catalog_id.as_str()))
        .ok_or_else(|| CatalogError::VersionNotFound(catalog_id.as_str().to_string()))?;

    log::debug!("Resolving catalog template {} from {}", catalog_id.as_str(), link);
    let version = api
        .template_version(link)
        .await
        .map_err(|source| CatalogError::Version {
            url: link.clone(),
            source,
        })?;

    if version.id != catalog_id.as_str() {
        return Err(CatalogError::VersionNotFound(catalog_id.as_str().to_string()));
    }
    Ok(version)
}

/// Compose texts taken from a template version's files
pub fn compose_files(version: &TemplateVersion) -> (String, String) {
    let file = |name: &str| version.files.get(name).cloned().unwrap_or_default();
    (file(DOCKER_COMPOSE_FILE), file(RANCHER_COMPOSE_FILE))
}

/// Drop carriage returns the server adds to rendered compose files
pub fn strip_cr(text: &str) -> String {
    text.replace('\r', "")
}

/// Whether two compose documents describe the same configuration
///
/// Both sides are compared as parsed YAML, so key order and quoting are
/// not significant. If either side fails to parse, the texts are compared
/// line by line ignoring line endings, trailing whitespace and blank lines.
pub fn compose_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_yaml::from_str::<serde_yaml::Value>(a),
        serde_yaml::from_str::<serde_yaml::Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => {
            log::debug!("Compose text is not valid YAML; comparing lines");
            lines_equivalent(a, b)
        }
    }
}

fn lines_equivalent(a: &str, b: &str) -> bool {
    fn significant(text: &str) -> impl Iterator<Item = &str> {
        text.lines()
            .map(|line| line.trim_end())
            .filter(|line| !line.is_empty())
    }
    significant(a).eq(significant(b))
}

/// The declared text when it is equivalent to the rendered one, else the rendered text
pub fn reconcile_compose(declared: &str, rendered: &str) -> String {
    if !declared.is_empty() && compose_equivalent(declared, rendered) {
        declared.to_string()
    } else {
        rendered.to_string()
    }
}
