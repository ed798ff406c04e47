//! Launch configuration: origin URL, impersonation target, child command.

use url::Url;

use crate::error::BridgeError;

#[derive(Debug, Clone)]
pub struct Config {
    /// The ARA API service on Cloud Run.
    pub origin: Url,
    /// Service account to impersonate when minting identity tokens.
    pub impersonate_service_account: Option<String>,
    /// Command to run once the bridge is up, argv style.
    pub command: Vec<String>,
}

impl Config {
    /// Validates raw flag/env input into a runnable configuration.
    pub fn new(
        cloud_run_url: Option<String>,
        impersonate_service_account: Option<String>,
        command: Vec<String>,
    ) -> Result<Self, BridgeError> {
        let raw = cloud_run_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BridgeError::Config("cloud run url is not set".to_string()))?;
        let origin = Url::parse(&raw)
            .map_err(|e| BridgeError::Config(format!("parse cloud run url: {e}")))?;
        if origin.host_str().is_none() {
            return Err(BridgeError::Config("cloud run url has no host".to_string()));
        }
        if command.is_empty() {
            return Err(BridgeError::Config("no command given".to_string()));
        }

        Ok(Self {
            origin,
            impersonate_service_account: impersonate_service_account.filter(|s| !s.is_empty()),
            command,
        })
    }

    /// Token audience: scheme and host with a trailing slash, any path or
    /// query on the configured URL dropped. Cloud Run expects the service
    /// root URL here.
    pub fn audience(&self) -> String {
        format!("{}/", self.origin_base())
    }

    /// Origin base without a trailing slash; forwarded request paths are
    /// appended verbatim.
    pub fn origin_base(&self) -> String {
        let host = self.origin.host_str().unwrap_or_default();
        match self.origin.port() {
            Some(port) => format!("{}://{host}:{port}", self.origin.scheme()),
            None => format!("{}://{host}", self.origin.scheme()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Vec<String> {
        vec!["ansible-playbook".to_string(), "site.yml".to_string()]
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = Config::new(None, None, command()).unwrap_err();
        assert_eq!(err.to_string(), "cloud run url is not set");
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = Config::new(Some(String::new()), None, command()).unwrap_err();
        assert_eq!(err.to_string(), "cloud run url is not set");
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let err = Config::new(Some("not a url".to_string()), None, command()).unwrap_err();
        assert!(err.to_string().starts_with("parse cloud run url:"));
    }

    #[test]
    fn url_without_host_is_rejected() {
        let err = Config::new(Some("unix:/run/ara.sock".to_string()), None, command()).unwrap_err();
        assert_eq!(err.to_string(), "cloud run url has no host");
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = Config::new(
            Some("https://ara-api-xxxx.a.run.app".to_string()),
            None,
            vec![],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no command given");
    }

    #[test]
    fn audience_is_the_service_root() {
        let config = Config::new(
            Some("https://ara-api-xxxx.a.run.app/some/path?query=1".to_string()),
            None,
            command(),
        )
        .unwrap();
        assert_eq!(config.audience(), "https://ara-api-xxxx.a.run.app/");
        assert_eq!(config.origin_base(), "https://ara-api-xxxx.a.run.app");
    }

    #[test]
    fn audience_keeps_an_explicit_port() {
        let config = Config::new(
            Some("http://127.0.0.1:8080".to_string()),
            None,
            command(),
        )
        .unwrap();
        assert_eq!(config.audience(), "http://127.0.0.1:8080/");
        assert_eq!(config.origin_base(), "http://127.0.0.1:8080");
    }

    #[test]
    fn empty_impersonation_target_means_none() {
        let config = Config::new(
            Some("https://ara-api-xxxx.a.run.app".to_string()),
            Some(String::new()),
            command(),
        )
        .unwrap();
        assert!(config.impersonate_service_account.is_none());
    }
}
