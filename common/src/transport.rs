use std::{
    fs,
    io::{self, BufReader, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    path::Path,
    sync::Arc,
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig as RustlsClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore,
    SignatureScheme,
};
use rustls_pemfile::{certs, private_key};

use crate::{
    config::{ClientConfig, TlsOptions},
    error::GmpError,
    tls_stream::TlsStream,
};

/// Lifecycle of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Closed,
}

/// Byte stream carrying GMP traffic
pub trait ByteStream: Read + Write {
    /// Shuts the stream down gracefully; errors are ignored
    fn close_stream(&mut self) {}
}

impl ByteStream for TlsStream {
    fn close_stream(&mut self) {
        self.close();
    }
}

/// Exclusive owner of one byte stream to the daemon.
///
/// The stream is closed when the connection is dropped.
pub struct Connection<S: ByteStream = TlsStream> {
    host:   String,
    port:   u16,
    state:  ConnectionState,
    stream: Option<BufReader<S>>,
}

impl<S: ByteStream> Connection<S> {
    /// Creates a connection with no stream attached yet
    pub fn unconnected<H: Into<String>>(host: H, port: u16) -> Self {
        Self {
            host:   host.into(),
            port,
            state:  ConnectionState::Unconnected,
            stream: None,
        }
    }

    /// Wraps an already established stream
    pub fn from_stream<H: Into<String>>(host: H, port: u16, stream: S) -> Self {
        Self {
            host:   host.into(),
            port,
            state:  ConnectionState::Connected,
            stream: Some(BufReader::new(stream)),
        }
    }

    /// Daemon host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Daemon port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while a stream is attached
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Writes `bytes` in full and flushes them to the peer
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), GmpError> {
        let stream = self.stream_mut()?.get_mut();
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    /// Buffered reader over the incoming byte stream
    pub fn reader(&mut self) -> Result<&mut BufReader<S>, GmpError> {
        self.stream_mut()
    }

    /// Closes the stream; calling it again has no effect
    pub fn close(&mut self) {
        if let Some(reader) = self.stream.take() {
            let mut stream = reader.into_inner();
            stream.close_stream();
            tracing::info!("Disconnected from {}:{}", self.host, self.port);
        }
        self.state = ConnectionState::Closed;
    }

    fn stream_mut(&mut self) -> Result<&mut BufReader<S>, GmpError> {
        match self.state {
            ConnectionState::Connected => self
                .stream
                .as_mut()
                .ok_or_else(|| GmpError::Transport("connection has no stream".into())),
            ConnectionState::Unconnected => {
                Err(GmpError::Transport("connection not established".into()))
            }
            ConnectionState::Closed => Err(GmpError::Transport("connection closed".into())),
        }
    }
}

impl<S: ByteStream> Drop for Connection<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a TLS connection to the daemon described by `config`.
///
/// Each resolved address is tried once; there is no retry.
pub fn connect(config: &ClientConfig) -> Result<Connection<TlsStream>, GmpError> {
    let tls_config = build_tls_config(&config.tls)?;
    let target = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to GMP daemon at {}", target);

    let addrs: Vec<_> = target
        .to_socket_addrs()
        .map_err(|e| GmpError::Transport(format!("failed to resolve {target}: {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(GmpError::Transport(format!("{target} resolved to no addresses")));
    }

    let mut last_err: Option<io::Error> = None;
    let mut socket = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, config.timeout) {
            Ok(s) => {
                socket = Some(s);
                break;
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    let socket = socket.ok_or_else(|| {
        GmpError::Transport(format!(
            "failed to connect to {target}: {}",
            last_err.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        ))
    })?;
    socket.set_read_timeout(Some(config.timeout))?;
    socket.set_write_timeout(Some(config.timeout))?;
    socket.set_nodelay(true)?;

    tracing::debug!("Socket connected, establishing TLS...");

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|_| GmpError::Config(format!("invalid server name: {}", config.host)))?;
    let client_conn = ClientConnection::new(tls_config, server_name)
        .map_err(|e| GmpError::Config(format!("failed to create TLS session: {e}")))?;
    let tls_stream = TlsStream::from_client(socket, client_conn)?;

    tracing::info!("Secure connection established to {}", target);
    Ok(Connection::from_stream(config.host.clone(), config.port, tls_stream))
}

/// Builds the rustls client configuration for `options`
pub fn build_tls_config(options: &TlsOptions) -> Result<Arc<RustlsClientConfig>, GmpError> {
    // Install default crypto provider for rustls if not already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let builder = if options.insecure {
        tracing::warn!("Server certificate verification is disabled");
        RustlsClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification::new()))
    } else {
        let mut root_store = RootCertStore::empty();
        match &options.certs.ca_path {
            Some(ca_path) => {
                let ca_certs = read_certs(ca_path)?;
                root_store.add_parsable_certificates(ca_certs);
                if root_store.is_empty() {
                    return Err(GmpError::Config(format!(
                        "no valid CA certificates found in {ca_path:?}"
                    )));
                }
            }
            None => root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }
        RustlsClientConfig::builder().with_root_certificates(root_store)
    };

    let config = match (&options.certs.cert_path, &options.certs.key_path) {
        (Some(cert_path), Some(key_path)) => {
            let cert_chain = read_certs(cert_path)?;
            let key = read_private_key(key_path)?;
            builder
                .with_client_auth_cert(cert_chain, key)
                .map_err(|e| GmpError::Config(format!("invalid client certificate: {e}")))?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(GmpError::Config(
                "client certificate and key must be given together".into(),
            ))
        }
    };

    Ok(Arc::new(config))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, GmpError> {
    let pem = fs::read(path)
        .map_err(|e| GmpError::Config(format!("failed to read {path:?}: {e}")))?;
    certs(&mut BufReader::new(&*pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GmpError::Config(format!("failed to parse certificates in {path:?}: {e}")))
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, GmpError> {
    let pem = fs::read(path)
        .map_err(|e| GmpError::Config(format!("failed to read {path:?}: {e}")))?;
    private_key(&mut BufReader::new(&*pem))
        .map_err(|e| GmpError::Config(format!("failed to parse private key in {path:?}: {e}")))?
        .ok_or_else(|| GmpError::Config(format!("no private key found in {path:?}")))
}

/// Accepts any server certificate while still checking handshake signatures
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl NoVerification {
    fn new() -> Self {
        Self {
            provider: Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        }
    }
}

impl ServerCertVerifier for NoVerification {
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
        verify_tls12_signature(
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
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
