use serde::{Deserialize, Serialize};
use std::fmt::Display;
use url::Url;

/// One monitored endpoint as recorded in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub scrape_url: String,
    pub tenant_id: String,
}

impl Target {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        scrape_url: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            scrape_url: scrape_url.into(),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn address(&self) -> ResolvedAddress {
        resolve(&self.scrape_url)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A `host:port` scrape address derived from a target's URL.
///
/// `Fallback` carries the raw URL when it could not be parsed; it still ends up in the
/// scrape config so one bad entry does not block the other tenants.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumIs)]
pub enum ResolvedAddress {
    Resolved(String),
    Fallback(String),
}

impl ResolvedAddress {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedAddress::Resolved(addr) | ResolvedAddress::Fallback(addr) => addr,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            ResolvedAddress::Resolved(addr) | ResolvedAddress::Fallback(addr) => addr,
        }
    }
}

impl Display for ResolvedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve a scrape URL into the address Prometheus should scrape.
///
/// An explicit port wins; otherwise `https` maps to 443 and `http` to 80. Other schemes
/// produce the bare host.
pub fn resolve(raw: &str) -> ResolvedAddress {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(e) => {
            warn!("could not parse target url {raw:?}: {e}");
            return ResolvedAddress::Fallback(raw.to_string());
        }
    };
    let Some(host) = url.host_str().filter(|h| !h.is_empty()) else {
        warn!("target url {raw:?} has no host");
        return ResolvedAddress::Fallback(raw.to_string());
    };
    // url strips default ports, so an explicit :443 on https also lands in the scheme arm
    let addr = match (url.port(), url.scheme()) {
        (Some(port), _) => format!("{host}:{port}"),
        (None, "https") => format!("{host}:443"),
        (None, "http") => format!("{host}:80"),
        (None, _) => host.to_string(),
    };
    ResolvedAddress::Resolved(addr)
}
