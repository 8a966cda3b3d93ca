//! Query-string configuration of the sandboxed context.

use url::{form_urlencoded, Url};

/// Configuration the sandbox bootstraps itself from.
///
/// Parsed from the query string of the resource the host loaded: the host
/// has no other way to hand parameters into the isolated context before
/// the message channel is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Identifier of the client this context serves.
    pub client_id: String,

    /// Emit verbose protocol diagnostics.
    pub debug: bool,

    /// Relay scenario telemetry to the host.
    pub telemetry_enabled: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            debug: false,
            telemetry_enabled: true,
        }
    }
}

impl SandboxConfig {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Unknown parameters are ignored. `debug` is off unless set to
    /// `true`; `telemetry` is on unless present with a value other than
    /// `true`.
    pub fn from_query(query: &str) -> Self {
        let mut config = Self::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "clientId" => config.client_id = value.into_owned(),
                "debug" => config.debug = value == "true",
                "telemetry" => config.telemetry_enabled = value == "true",
                _ => {}
            }
        }

        config
    }

    /// Parse the query string of the loaded resource URL.
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_yields_defaults() {
        let config = SandboxConfig::from_query("");

        assert!(config.client_id.is_empty());
        assert!(!config.debug);
        assert!(config.telemetry_enabled);
    }

    #[test]
    fn test_client_id_is_extracted() {
        let config = SandboxConfig::from_query("clientId=client-42");
        assert_eq!(config.client_id, "client-42");
    }

    #[test]
    fn test_debug_requires_explicit_true() {
        assert!(SandboxConfig::from_query("debug=true").debug);
        assert!(!SandboxConfig::from_query("debug=false").debug);
        assert!(!SandboxConfig::from_query("debug=1").debug);
    }

    #[test]
    fn test_telemetry_disabled_unless_true_when_present() {
        assert!(SandboxConfig::from_query("telemetry=true").telemetry_enabled);
        assert!(!SandboxConfig::from_query("telemetry=false").telemetry_enabled);
        assert!(SandboxConfig::from_query("clientId=x").telemetry_enabled);
    }

    #[test]
    fn test_from_url() {
        let url = Url::parse(
            "https://cdn.example.com/assetlink/0.1.0/sandbox.html?clientId=c1&debug=true&telemetry=false",
        )
        .unwrap();
        let config = SandboxConfig::from_url(&url);

        assert_eq!(config.client_id, "c1");
        assert!(config.debug);
        assert!(!config.telemetry_enabled);
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let config = SandboxConfig::from_query("clientId=c1&theme=dark");
        assert_eq!(config.client_id, "c1");
    }
}
