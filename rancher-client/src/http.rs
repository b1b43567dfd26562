//! HTTP implementation of [`RancherApi`] against the v2-beta REST API

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{RancherApi, Scope};
use crate::error::{ClientError, ClientResult};
use crate::types::{ApiResource, Collection, ListOpts, Template, TemplateVersion};

/// Rancher API client authenticated with an access/secret key pair
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    api_url: String,
    access_key: String,
    secret_key: String,
}

impl HttpClient {
    /// `api_url` is the server root (e.g., `https://rancher.example.com`)
    pub fn new(
        api_url: &str,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> ClientResult<Self> {
        let parsed = Url::parse(api_url)
            .map_err(|e| ClientError::Configuration(format!("invalid api_url '{}': {}", api_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "unsupported scheme '{}' in api_url",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("rancher-tf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn base(&self, scope: &Scope) -> String {
        match scope {
            Scope::Global => format!("{}/v2-beta", self.api_url),
            Scope::Environment(id) => format!("{}/v2-beta/projects/{}", self.api_url, id),
        }
    }

    fn collection_url<T: ApiResource>(&self, scope: &Scope) -> String {
        format!("{}/{}", self.base(scope), T::COLLECTION)
    }

    fn entity_url<T: ApiResource>(&self, scope: &Scope, id: &str) -> String {
        format!("{}/{}", self.collection_url::<T>(scope), id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        if self.access_key.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.access_key, Some(&self.secret_key))
        }
    }

    /// Send a request and decode a JSON body; non-success statuses become errors
    async fn send<R: DeserializeOwned>(&self, url: &str, builder: RequestBuilder) -> ClientResult<R> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::status(
                status.as_u16(),
                url,
                error_message(&body),
            ));
        }

        log::trace!("{} -> {}", url, status);
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_empty(&self, url: &str, builder: RequestBuilder) -> ClientResult<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::status(status.as_u16(), url, error_message(&body)))
    }
}

/// Extract the server's error message from a Rancher error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("code"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn encode<B: Serialize>(body: &B) -> ClientResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ClientError::Encode(e.to_string()))
}

#[async_trait]
impl RancherApi for HttpClient {
    async fn by_id<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<Option<T>> {
        let url = self.entity_url::<T>(scope, id);
        match self.send(&url, self.request(Method::GET, &url)).await {
            Ok(entity) => Ok(Some(entity)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list<T: ApiResource>(
        &self,
        scope: &Scope,
        opts: &ListOpts,
    ) -> ClientResult<Collection<T>> {
        let url = self.collection_url::<T>(scope);
        let builder = self.request(Method::GET, &url).query(&opts.filters);
        self.send(&url, builder).await
    }

    async fn next_page<T: ApiResource>(
        &self,
        page: &Collection<T>,
    ) -> ClientResult<Option<Collection<T>>> {
        let Some(next) = page.next_url() else {
            return Ok(None);
        };
        let next = next.to_string();
        let collection = self.send(&next, self.request(Method::GET, &next)).await?;
        Ok(Some(collection))
    }

    async fn create<T, B>(&self, scope: &Scope, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync,
    {
        let url = self.collection_url::<T>(scope);
        let body = encode(body)?;
        self.send(&url, self.request(Method::POST, &url).json(&body))
            .await
    }

    async fn update<T, B>(&self, scope: &Scope, id: &str, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync,
    {
        let url = self.entity_url::<T>(scope, id);
        let body = encode(body)?;
        self.send(&url, self.request(Method::PUT, &url).json(&body))
            .await
    }

    async fn delete<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<()> {
        let url = self.entity_url::<T>(scope, id);
        self.send_empty(&url, self.request(Method::DELETE, &url))
            .await
    }

    async fn action<T, R>(
        &self,
        scope: &Scope,
        id: &str,
        action: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<R>
    where
        T: ApiResource,
        R: DeserializeOwned + Send + 'static,
    {
        let url = format!("{}?action={}", self.entity_url::<T>(scope, id), action);
        let builder = self.request(Method::POST, &url);
        let builder = match body {
            Some(body) => builder.json(&body),
            None => builder,
        };
        self.send(&url, builder).await
    }

    async fn template(&self, id: &str) -> ClientResult<Template> {
        let url = format!("{}/v1-catalog/templates/{}", self.api_url, id);
        self.send(&url, self.request(Method::GET, &url)).await
    }

    async fn template_version(&self, url: &str) -> ClientResult<TemplateVersion> {
        self.send(url, self.request(Method::GET, url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stack;

    #[test]
    fn urls_follow_scope() {
        let client = HttpClient::new("https://rancher.example.com/", "ak", "sk").unwrap();
        assert_eq!(
            client.collection_url::<Stack>(&Scope::Global),
            "https://rancher.example.com/v2-beta/stacks"
        );
        assert_eq!(
            client.entity_url::<Stack>(&Scope::environment("1a5"), "1st7"),
            "https://rancher.example.com/v2-beta/projects/1a5/stacks/1st7"
        );
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(matches!(
            HttpClient::new("not a url", "", ""),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            HttpClient::new("ftp://rancher", "", ""),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn error_message_prefers_server_message() {
        assert_eq!(
            error_message(r#"{"type":"error","code":"NotUnique","message":"name taken"}"#),
            "name taken"
        );
        assert_eq!(error_message(r#"{"code":"NotFound"}"#), "NotFound");
        assert_eq!(error_message("bad gateway\n"), "bad gateway");
    }
}
