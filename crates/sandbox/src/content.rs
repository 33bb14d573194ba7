//! The virtual content scheme: `toolscheme://<toolId>/<relativePath>`.

use std::sync::Arc;

use {
    tokio::io::AsyncReadExt,
    toolbay_config::ContentConfig,
    toolbay_service_traits::{SettingsService, ToolCatalog},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use toolbay_metrics::{content as content_metrics, counter, labels};

use crate::{
    error::{Error, Result},
    mime::{is_html, mime_for_path},
    policy::{PolicyComposer, inject_into_html},
    resolver::ContentAddressResolver,
};

/// Body of a successful content response.
#[derive(Debug)]
pub enum ContentBody {
    /// An HTML document with the policy already injected.
    Html(String),
    /// Any other asset, streamed from disk.
    Stream { file: tokio::fs::File, len: u64 },
}

#[derive(Debug)]
pub struct ContentResponse {
    pub mime: &'static str,
    pub body: ContentBody,
}

impl ContentResponse {
    /// Drain the body into memory. Meant for small assets and tests; the
    /// HTTP front end streams instead.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self.body {
            ContentBody::Html(html) => Ok(html.into_bytes()),
            ContentBody::Stream { mut file, len } => {
                let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
                file.read_to_end(&mut buf).await.map_err(|e| {
                    warn!(error = %e, "content stream read failed");
                    Error::Failed
                })?;
                Ok(buf)
            },
        }
    }
}

/// Serves tool assets from the private content scheme.
pub struct VirtualContentServer {
    scheme: String,
    resolver: ContentAddressResolver,
    composer: PolicyComposer,
    settings: Arc<dyn SettingsService>,
}

impl VirtualContentServer {
    pub fn new(
        config: &ContentConfig,
        catalog: Arc<dyn ToolCatalog>,
        settings: Arc<dyn SettingsService>,
    ) -> Self {
        Self {
            scheme: config.scheme.clone(),
            resolver: ContentAddressResolver::new(catalog, config.default_document.clone()),
            composer: PolicyComposer::new(config.scheme.clone()),
            settings,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn composer(&self) -> &PolicyComposer {
        &self.composer
    }

    /// URL a surface loads to reach `path` inside `tool_id`.
    #[must_use]
    pub fn url_for(&self, tool_id: &str, path: &str) -> String {
        format!("{}://{tool_id}/{}", self.scheme, path.trim_start_matches('/'))
    }

    /// Split a scheme URL into `(tool id, raw path)`.
    ///
    /// Query strings and fragments are dropped. The path is returned still
    /// percent-encoded. Wrong scheme or an empty host is `NotFound`.
    pub fn parse_url<'a>(&self, url: &'a str) -> Result<(&'a str, &'a str)> {
        let rest = url
            .strip_prefix(self.scheme.as_str())
            .and_then(|r| r.strip_prefix("://"))
            .ok_or(Error::NotFound)?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        if host.is_empty() {
            return Err(Error::NotFound);
        }
        Ok((host, path))
    }

    /// Handle a full `scheme://tool/path` request.
    pub async fn handle_url(&self, url: &str) -> Result<ContentResponse> {
        let (tool_id, raw_path) = self.parse_url(url)?;
        self.serve(tool_id, raw_path).await
    }

    /// Serve `raw_path` (percent-encoded, relative) for `tool_id`.
    ///
    /// The path is decoded exactly once here; the resolver then applies the
    /// confinement check to the decoded form.
    pub async fn serve(&self, tool_id: &str, raw_path: &str) -> Result<ContentResponse> {
        let result = self.serve_inner(tool_id, raw_path).await;

        #[cfg(feature = "metrics")]
        {
            match &result {
                Err(Error::NotFound) => counter!(content_metrics::NOT_FOUND_TOTAL).increment(1),
                Err(_) => counter!(content_metrics::FAILED_TOTAL).increment(1),
                Ok(resp) => {
                    let kind = if matches!(resp.body, ContentBody::Html(_)) {
                        "html"
                    } else {
                        "asset"
                    };
                    counter!(content_metrics::REQUESTS_TOTAL, labels::KIND => kind).increment(1);
                },
            }
        }

        result
    }

    async fn serve_inner(&self, tool_id: &str, raw_path: &str) -> Result<ContentResponse> {
        let relative = urlencoding::decode(raw_path).map_err(|_| Error::NotFound)?;
        let tool = self.resolver.lookup(tool_id).await?;
        let path = self.resolver.resolve_for(&tool, &relative).await?;
        let name = path.to_string_lossy();
        let mime = mime_for_path(&name);

        if is_html(&name) {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                warn!(tool_id, error = %e, "html read failed");
                Error::Failed
            })?;
            let html = String::from_utf8_lossy(&bytes);
            // Consent can change between loads; never reuse an older policy.
            let consent = self.settings.has_consent(&tool.id).await;
            let policy = self
                .composer
                .build_policy(&tool, consent, &tool.policy_exceptions);
            debug!(tool_id, consent, "serving html with policy");
            return Ok(ContentResponse {
                mime,
                body: ContentBody::Html(inject_into_html(&html, &policy)),
            });
        }

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            warn!(tool_id, error = %e, "asset open failed");
            Error::Failed
        })?;
        let len = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        Ok(ContentResponse {
            mime,
            body: ContentBody::Stream { file, len },
        })
    }
}
