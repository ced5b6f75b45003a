//! TLS utilities for the mock server.
//!
//! Certificate loading from PEM files, self-signed certificate generation for
//! local tests, and a client configuration that skips chain trust for
//! clients that opt out of verification.

use super::config::TlsConfig;
use super::types::MockServerError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::DigitallySignedStruct;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

/// Names the generated certificate is valid for.
const SELF_SIGNED_NAMES: [&str; 2] = ["localhost", "127.0.0.1"];

/// A ready acceptor plus the certificate PEM when it was generated.
pub(crate) struct TlsMaterial {
    pub acceptor: TlsAcceptor,
    pub certificate_pem: Option<String>,
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn tls_error(context: &str, e: impl std::fmt::Display) -> MockServerError {
    MockServerError::Tls(format!("{context}: {e}"))
}

/// Accepts any server certificate chain for the mock server's own
/// self-signed certificates. Handshake signatures are still checked with the
/// provider's algorithms, so only trust in the chain is skipped.
#[derive(Debug)]
struct SkipChainTrust {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipChainTrust {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client configuration for talking to a mock server without trusting its
/// certificate first. Use [`MockServer::certificate_pem`] to trust it instead.
///
/// [`MockServer::certificate_pem`]: super::MockServer::certificate_pem
pub fn insecure_client_config() -> Result<rustls::ClientConfig, rustls::Error> {
    let provider = provider();
    let verifier = SkipChainTrust {
        provider: Arc::clone(&provider),
    };
    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth())
}

fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, MockServerError> {
    let config = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error("Failed to select TLS protocol versions", e))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| tls_error("Failed to build TLS configuration", e))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Create TLS acceptor from certificate and key files.
pub fn create_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, MockServerError> {
    let cert_file = std::fs::File::open(cert_path)
        .map_err(|e| tls_error(&format!("Failed to open certificate file '{cert_path}'"), e))?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| tls_error("Failed to parse certificate file", e))?;

    if certs.is_empty() {
        return Err(MockServerError::Tls(format!(
            "No certificates found in certificate file: {cert_path}"
        )));
    }

    let key_file = std::fs::File::open(key_path)
        .map_err(|e| tls_error(&format!("Failed to open private key file '{key_path}'"), e))?;
    let mut key_reader = std::io::BufReader::new(key_file);

    // PKCS8, RSA, or SEC1 keys
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| tls_error("Failed to parse private key file", e))?
        .ok_or_else(|| MockServerError::Tls(format!("No private key found in key file: {key_path}")))?;

    server_config(certs, key)
}

/// Generate a certificate for `localhost` and `127.0.0.1`.
/// Returns the acceptor and the certificate in PEM form.
pub fn self_signed_acceptor() -> Result<(TlsAcceptor, String), MockServerError> {
    let names: Vec<String> = SELF_SIGNED_NAMES.iter().map(|n| n.to_string()).collect();
    let certified = rcgen::generate_simple_self_signed(names)
        .map_err(|e| tls_error("Failed to generate self-signed certificate", e))?;
    let pem = certified.cert.pem();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let acceptor = server_config(vec![certified.cert.der().clone()], key)?;
    debug!("Generated self-signed certificate for {:?}", SELF_SIGNED_NAMES);
    Ok((acceptor, pem))
}

pub(crate) fn build_acceptor(config: &TlsConfig) -> Result<TlsMaterial, MockServerError> {
    config.validate()?;
    match (&config.cert_path, &config.key_path) {
        (Some(cert), Some(key)) => Ok(TlsMaterial {
            acceptor: create_tls_acceptor(cert, key)?,
            certificate_pem: std::fs::read_to_string(cert).ok(),
        }),
        _ => {
            let (acceptor, pem) = self_signed_acceptor()?;
            Ok(TlsMaterial {
                acceptor,
                certificate_pem: Some(pem),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_skip_chain_trust_uses_provider_schemes() {
        let verifier = SkipChainTrust {
            provider: provider(),
        };
        let schemes = verifier.supported_verify_schemes();
        assert!(schemes.contains(&rustls::SignatureScheme::ECDSA_NISTP256_SHA256));
        assert!(schemes.contains(&rustls::SignatureScheme::ED25519));
    }

    #[test]
    fn test_self_signed_material() {
        let material = build_acceptor(&TlsConfig::self_signed()).unwrap();
        let pem = material.certificate_pem.unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_acceptor_from_generated_files() {
        let certified =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let mut cert = NamedTempFile::new().unwrap();
        cert.write_all(certified.cert.pem().as_bytes()).unwrap();
        let mut key = NamedTempFile::new().unwrap();
        key.write_all(certified.key_pair.serialize_pem().as_bytes()).unwrap();

        let config = TlsConfig::files(
            cert.path().to_string_lossy(),
            key.path().to_string_lossy(),
        );
        let material = build_acceptor(&config).unwrap();
        assert_eq!(material.certificate_pem, Some(certified.cert.pem()));
    }

    #[test]
    fn test_missing_files_are_tls_errors() {
        let err = create_tls_acceptor("/nonexistent/cert.pem", "/nonexistent/key.pem")
            .err()
            .unwrap();
        assert!(matches!(err, MockServerError::Tls(_)));
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[tokio::test]
    async fn test_insecure_client_completes_handshake_with_self_signed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (acceptor, _pem) = self_signed_acceptor().unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(stream).await.unwrap();
            tls.write_all(b"pong").await.unwrap();
            tls.shutdown().await.unwrap();
        });

        let connector =
            tokio_rustls::TlsConnector::from(Arc::new(insecure_client_config().unwrap()));
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let name = ServerName::try_from("localhost").unwrap();
        let mut tls = connector.connect(name, stream).await.unwrap();
        let mut reply = Vec::new();
        tls.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"pong");
        server.await.unwrap();
    }
}
