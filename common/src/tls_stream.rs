use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
};

use rustls::ClientConnection;

use crate::error::GmpError;

/// Synchronous TLS wrapper for a TCP socket
pub struct TlsStream {
    socket: TcpStream,
    tls:    ClientConnection,
}

impl TlsStream {
    /// Wraps a connected socket and completes the client handshake
    pub fn from_client(socket: TcpStream, tls: ClientConnection) -> Result<Self, GmpError> {
        let mut stream = Self { socket, tls };
        stream.complete_handshake()?;
        Ok(stream)
    }

    /// Complete the TLS handshake
    fn complete_handshake(&mut self) -> Result<(), GmpError> {
        while self.tls.is_handshaking() {
            if self.tls.wants_write() {
                self.tls.write_tls(&mut self.socket)?;
            }
            if self.tls.wants_read() {
                if self.tls.read_tls(&mut self.socket)? == 0 {
                    return Err(GmpError::Transport(
                        "connection closed during TLS handshake".into(),
                    ));
                }
                self.tls.process_new_packets().map_err(classify_tls_error)?;
            }
        }
        // Flush the final handshake flight
        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        tracing::debug!(
            "TLS established ({:?}, {:?})",
            self.tls.protocol_version(),
            self.tls.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(())
    }

    /// Sends close_notify and shuts the socket down; errors are ignored
    pub fn close(&mut self) {
        self.tls.send_close_notify();
        let _ = self.flush();
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

/// Maps a rustls failure onto the transport/certificate split
pub fn classify_tls_error(err: rustls::Error) -> GmpError {
    match err {
        rustls::Error::InvalidCertificate(reason) => {
            GmpError::Certificate(format!("server certificate rejected: {reason:?}"))
        }
        rustls::Error::NoCertificatesPresented => {
            GmpError::Certificate("server presented no certificate".into())
        }
        rustls::Error::AlertReceived(alert) => {
            GmpError::Transport(format!("TLS handshake aborted by peer: {alert:?}"))
        }
        other => GmpError::Transport(format!("TLS handshake error: {other}")),
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            // Try to read buffered plaintext first
            match self.tls.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            // Clean shutdown without close_notify
            if self.tls.read_tls(&mut self.socket)? == 0 {
                return Ok(0);
            }
            self.tls
                .process_new_packets()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.tls.writer().write(buf)?;

        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tls.writer().flush()?;

        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }
}

#[cfg(test)]
mod tests {
    use rustls::CertificateError;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn certificate_rejections_are_certificate_errors() {
        let err = classify_tls_error(rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer,
        ));
        assert_eq!(err.kind(), ErrorKind::Certificate);

        let err = classify_tls_error(rustls::Error::NoCertificatesPresented);
        assert_eq!(err.kind(), ErrorKind::Certificate);
    }

    #[test]
    fn other_tls_failures_are_transport_errors() {
        let err = classify_tls_error(rustls::Error::DecryptError);
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
