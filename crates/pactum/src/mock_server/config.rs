//! Mock server configuration.

use crate::error::ConfigurationError;
use crate::pact::WriteMode;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TLS for the listener: a generated self-signed certificate, or PEM files.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Generate a certificate for `localhost` / `127.0.0.1` at start.
    #[serde(default)]
    pub self_signed: bool,
    /// Path to TLS certificate file (PEM format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,
    /// Path to TLS private key file (PEM format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
}

impl TlsConfig {
    pub fn self_signed() -> Self {
        Self {
            self_signed: true,
            ..Default::default()
        }
    }

    pub fn files(cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            self_signed: false,
            cert_path: Some(cert_path.into()),
            key_path: Some(key_path.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match (self.self_signed, &self.cert_path, &self.key_path) {
            (true, None, None) => Ok(()),
            (false, Some(_), Some(_)) => Ok(()),
            (true, _, _) => Err(ConfigurationError::Invalid(
                "tls.selfSigned cannot be combined with tls.certPath/tls.keyPath".into(),
            )),
            _ => Err(ConfigurationError::Invalid(
                "tls requires either selfSigned: true or both certPath and keyPath".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockServerConfig {
    pub consumer: String,
    pub provider: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 binds an ephemeral port.
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Bounds header and body reads of each request.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bounds how long `stop()` waits for in-flight requests.
    #[serde(default = "default_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "default_pact_dir")]
    pub pact_dir: PathBuf,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Answer unmatched `OPTIONS` pre-flight requests permissively.
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_pact_dir() -> PathBuf {
    PathBuf::from("./pacts")
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl MockServerConfig {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            host: default_host(),
            port: 0,
            tls: None,
            request_timeout_ms: default_timeout_ms(),
            shutdown_timeout_ms: default_timeout_ms(),
            pact_dir: default_pact_dir(),
            write_mode: WriteMode::default(),
            cors: false,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: MockServerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.consumer.trim().is_empty() {
            return Err(ConfigurationError::Invalid("consumer must not be empty".into()));
        }
        if self.provider.trim().is_empty() {
            return Err(ConfigurationError::Invalid("provider must not be empty".into()));
        }
        for (field, name) in [("consumer", &self.consumer), ("provider", &self.provider)] {
            if name.contains(['/', '\\']) || name.as_str() == ".." {
                return Err(ConfigurationError::Invalid(format!(
                    "{field} '{name}' must not contain path separators"
                )));
            }
        }
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::Invalid("host must not be empty".into()));
        }
        if self.host != "localhost" && self.host.parse::<IpAddr>().is_err() {
            return Err(ConfigurationError::Invalid(format!(
                "host '{}' is not an IP address or 'localhost'",
                self.host
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "requestTimeoutMs must be greater than 0".into(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "shutdownTimeoutMs must be greater than 0".into(),
            ));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }

    // Builder-style setters used by the consumer helper and tests.

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_pact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = dir.into();
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = millis(timeout);
        self
    }

    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_defaults() {
        let config: MockServerConfig =
            serde_yaml::from_str("consumer: web\nprovider: api\n").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.pact_dir, PathBuf::from("./pacts"));
        assert_eq!(config.write_mode, WriteMode::Overwrite);
        assert!(!config.cors);
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn test_from_file_with_tls_and_merge() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "consumer: web\nprovider: api\nport: 8443\ntls:\n  selfSigned: true\nwriteMode: merge\nrequestTimeoutMs: 250\n"
        )
        .unwrap();
        let config = MockServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.tls, Some(TlsConfig::self_signed()));
        assert_eq!(config.write_mode, WriteMode::Merge);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.scheme(), "https");
    }

    #[test]
    fn test_timeout_setters_saturate() {
        let config = MockServerConfig::new("web", "api")
            .with_request_timeout(Duration::MAX)
            .with_shutdown_timeout(Duration::from_millis(1500));
        assert_eq!(config.request_timeout_ms, u64::MAX);
        assert_eq!(config.shutdown_timeout_ms, 1500);
    }

    #[test]
    fn test_validation_errors() {
        assert!(MockServerConfig::new("", "api").validate().is_err());
        assert!(MockServerConfig::new("web", "api")
            .with_request_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(MockServerConfig::new("web", "api")
            .with_shutdown_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(MockServerConfig::new("../web", "api").validate().is_err());
        assert!(MockServerConfig::new("web", "a\\pi").validate().is_err());

        let mut config = MockServerConfig::new("web", "api");
        config.host = "not a host".into();
        assert!(config.validate().is_err());

        let mut half = TlsConfig::self_signed();
        half.self_signed = false;
        half.cert_path = Some("cert.pem".into());
        assert!(MockServerConfig::new("web", "api")
            .with_tls(half)
            .validate()
            .is_err());

        assert!(MockServerConfig::new("web", "api")
            .with_tls(TlsConfig::files("cert.pem", "key.pem"))
            .validate()
            .is_ok());
    }
}
