//! `{account}` template rendering

use url::Url;

use namehunt_common::{NamehuntError, NamehuntResult, ACCOUNT_PLACEHOLDER};

/// Render a probe URI template into an absolute http(s) URL.
///
/// The template must contain at least one `{account}` placeholder and no
/// other braces, and the rendered string must parse as an http or https URL
/// with a host.
pub fn render_uri(template: &str, username: &str) -> NamehuntResult<Url> {
    if !template.contains(ACCOUNT_PLACEHOLDER) {
        return Err(NamehuntError::InvalidTemplate(format!(
            "'{}' has no {} placeholder",
            template, ACCOUNT_PLACEHOLDER
        )));
    }

    let remainder = template.replace(ACCOUNT_PLACEHOLDER, "");
    if remainder.contains('{') || remainder.contains('}') {
        return Err(NamehuntError::InvalidTemplate(format!(
            "'{}' has unbalanced or unknown placeholders",
            template
        )));
    }

    let rendered = template.replace(ACCOUNT_PLACEHOLDER, username);
    let url = Url::parse(&rendered)
        .map_err(|e| NamehuntError::InvalidTemplate(format!("'{}': {}", rendered, e)))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(NamehuntError::InvalidTemplate(format!(
            "'{}' has no host",
            rendered
        ))),
        other => Err(NamehuntError::InvalidTemplate(format!(
            "unsupported scheme '{}' in '{}'",
            other, rendered
        ))),
    }
}

/// Substitute the username into a request body template.
#[inline]
pub fn render_body(template: &str, username: &str) -> String {
    template.replace(ACCOUNT_PLACEHOLDER, username)
}
