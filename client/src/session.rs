use std::io::BufRead;

use gmp_common::{
    codec::{self, Command, Response},
    error::GmpError,
    transport::{ByteStream, Connection},
    TlsStream,
};
use secrecy::{ExposeSecret, SecretString};

/// Verbs the daemon answers before authentication
pub const PRE_AUTH_VERBS: [&str; 2] = ["authenticate", "get_version"];

/// Username and password for the daemon
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    /// Wraps the password so it is never logged or printed
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated request/response exchange over one connection.
///
/// Exactly one request is in flight at a time: `send` writes the command and
/// blocks until the matching response document has been read. The owned
/// connection is closed when the session ends.
pub struct Session<S: ByteStream = TlsStream> {
    connection:      Connection<S>,
    authenticated:   bool,
    request_counter: u32,
}

impl<S: ByteStream> Session<S> {
    /// Wraps a connection without authenticating it
    pub fn new(connection: Connection<S>) -> Self {
        Self {
            connection,
            authenticated:   false,
            request_counter: 0,
        }
    }

    /// Opens a session and authenticates it.
    ///
    /// On failure the connection is closed before the error is returned.
    pub fn authenticate(
        connection: Connection<S>,
        credentials: &Credentials,
    ) -> Result<Self, GmpError> {
        let mut session = Self::new(connection);
        session.login(credentials)?;
        Ok(session)
    }

    /// Sends the authenticate command; faults become [`GmpError::Auth`]
    pub fn login(&mut self, credentials: &Credentials) -> Result<(), GmpError> {
        let command = Command::new(
            "authenticate",
            [(
                "credentials",
                codec::map([
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.expose_secret()),
                ]),
            )],
        )?;

        tracing::info!("Authenticating as {}", credentials.username);
        match self.exchange(&command)? {
            Response::Success(root) => {
                self.authenticated = true;
                tracing::info!(
                    "Authenticated as {} (role: {})",
                    credentials.username,
                    root.child_text("role").unwrap_or("unknown")
                );
                Ok(())
            }
            Response::Fault(fault) => {
                tracing::warn!("Authentication rejected: {}", fault);
                self.close();
                Err(GmpError::Auth {
                    reason: if fault.status_text.is_empty() {
                        fault.to_string()
                    } else {
                        fault.status_text
                    },
                })
            }
        }
    }

    /// Sends a command on an authenticated session and waits for its response
    pub fn send(&mut self, command: &Command) -> Result<Response, GmpError> {
        self.ensure_connected()?;
        if !self.authenticated {
            return Err(GmpError::Protocol("not authenticated".into()));
        }
        self.exchange(command)
    }

    /// Sends one of [`PRE_AUTH_VERBS`] whether or not the session is
    /// authenticated; any other verb goes through [`send`](Self::send)
    pub fn send_unauthenticated(&mut self, command: &Command) -> Result<Response, GmpError> {
        if !PRE_AUTH_VERBS.contains(&command.verb()) {
            return self.send(command);
        }
        self.ensure_connected()?;
        self.exchange(command)
    }

    fn ensure_connected(&self) -> Result<(), GmpError> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(GmpError::Transport("connection closed".into()))
        }
    }

    fn exchange(&mut self, command: &Command) -> Result<Response, GmpError> {
        self.request_counter += 1;
        let request_id = self.request_counter;
        let verb = command.verb().to_string();

        let result = self.round_trip(request_id, command);
        if let Err(e) = &result {
            if matches!(e, GmpError::Transport(_) | GmpError::MalformedResponse(_)) {
                // The stream position is unknown after a failed read
                tracing::warn!("Request {} ({}) failed: {}", request_id, verb, e);
                self.close();
            }
        }
        result
    }

    fn round_trip(&mut self, request_id: u32, command: &Command) -> Result<Response, GmpError> {
        let bytes = codec::encode(command)?;
        if command.verb() == "authenticate" {
            tracing::debug!("Sending request {}: <authenticate>", request_id);
        } else {
            tracing::debug!(
                "Sending request {}: {}",
                request_id,
                String::from_utf8_lossy(&bytes)
            );
        }
        self.connection.send_bytes(&bytes)?;

        let reader = self.connection.reader()?;
        if reader.fill_buf()?.is_empty() {
            return Err(GmpError::Transport(
                "connection closed by daemon before a response".into(),
            ));
        }
        let root = codec::read_document(reader)?;

        let expected = format!("{}_response", command.verb());
        if root.name != expected {
            return Err(GmpError::Protocol(format!(
                "response mismatch for request {request_id}: expected <{expected}>, got <{}>",
                root.name
            )));
        }
        let response = Response::from_element(root)?;

        match &response {
            Response::Success(_) => tracing::debug!("Request {} completed", request_id),
            Response::Fault(fault) => {
                tracing::debug!("Request {} returned fault: {}", request_id, fault)
            }
        }
        Ok(response)
    }

    /// True after a successful login until the session closes
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// True until the connection is closed or lost
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Number of requests sent over this session
    pub fn requests_sent(&self) -> u32 {
        self.request_counter
    }

    /// Ends the session and closes the connection; idempotent
    pub fn close(&mut self) {
        self.authenticated = false;
        self.connection.close();
    }
}
