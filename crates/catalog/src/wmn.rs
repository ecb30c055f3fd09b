//! WhatsMyName catalog format
//!
//! The catalog is a JSON document of the form `{"sites": [ ... ]}` where each
//! entry carries `name`, `uri_check`, `e_code`/`e_string` (account exists)
//! and `m_code`/`m_string` (account missing), plus optional metadata.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use namehunt_common::{
    ExistenceSignal, NamehuntError, NamehuntResult, ProbeDefinition, SignalRule,
};

#[derive(Debug, Deserialize)]
struct WmnDocument {
    sites: Vec<WmnSite>,
}

#[derive(Debug, Deserialize)]
struct WmnSite {
    name: String,
    uri_check: String,
    #[serde(default)]
    uri_pretty: Option<String>,
    #[serde(default)]
    e_code: Option<u16>,
    #[serde(default)]
    e_string: Option<String>,
    #[serde(default)]
    m_code: Option<u16>,
    #[serde(default)]
    m_string: Option<String>,
    #[serde(default)]
    cat: Option<String>,
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    post_body: Option<String>,
}

fn rule(code: Option<u16>, needle: Option<String>) -> SignalRule {
    let mut rule = SignalRule::new();
    rule.status = code;
    if let Some(needle) = needle.filter(|n| !n.is_empty()) {
        rule = rule.containing(needle);
    }
    rule
}

impl WmnSite {
    fn into_definition(self) -> ProbeDefinition {
        let signal = ExistenceSignal::new(
            rule(self.e_code, self.e_string),
            rule(self.m_code, self.m_string),
        );
        let mut def = ProbeDefinition::new(self.name, self.uri_check, signal);
        def.category = self.cat.filter(|c| !c.is_empty());
        def.profile_template = self.uri_pretty.filter(|u| !u.is_empty());
        def.headers = self.headers;
        def.post_body = self.post_body.filter(|b| !b.is_empty());
        def
    }
}

/// Parse a WhatsMyName document into probe definitions, preserving order.
///
/// Entries flagged `"valid": false`, entries with a blank name or URI and
/// repeated site names (after the first) are skipped with a warning.
pub fn parse_wmn(json: &str) -> NamehuntResult<Vec<ProbeDefinition>> {
    let doc: WmnDocument = serde_json::from_str(json)
        .map_err(|e| NamehuntError::Catalog(format!("malformed catalog document: {}", e)))?;

    let mut seen = HashSet::with_capacity(doc.sites.len());
    let mut definitions = Vec::with_capacity(doc.sites.len());

    for site in doc.sites {
        if site.valid == Some(false) {
            debug!("Skipping site {} marked invalid", site.name);
            continue;
        }
        if site.name.trim().is_empty() || site.uri_check.trim().is_empty() {
            warn!("Skipping catalog entry with blank name or uri_check");
            continue;
        }
        if !seen.insert(site.name.clone()) {
            warn!("Skipping duplicate catalog entry {}", site.name);
            continue;
        }
        definitions.push(site.into_definition());
    }

    Ok(definitions)
}
