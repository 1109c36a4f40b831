use gmp_common::{
    codec::{self, Command, Element, Response},
    config::ClientConfig,
    error::GmpError,
    transport::{self, ByteStream, Connection},
    TlsStream,
};

use crate::{
    model::{Target, TargetList, Task, TaskStatus},
    session::{Credentials, Session},
};

/// One method per protocol verb over an exclusively owned session
pub struct GmpClient<S: ByteStream = TlsStream> {
    session: Session<S>,
}

impl GmpClient<TlsStream> {
    /// Opens a TLS connection to the daemon; the session is not yet
    /// authenticated
    pub fn connect(config: &ClientConfig) -> Result<Self, GmpError> {
        let connection = transport::connect(config)?;
        Ok(Self::from_connection(connection))
    }
}

impl<S: ByteStream> GmpClient<S> {
    /// Wraps an open, unauthenticated connection
    pub fn from_connection(connection: Connection<S>) -> Self {
        Self::new(Session::new(connection))
    }

    /// Wraps an existing session
    pub fn new(session: Session<S>) -> Self {
        Self { session }
    }

    /// Logs in; a rejection is [`GmpError::Auth`] and closes the connection
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<(), GmpError> {
        self.session.login(credentials)
    }

    /// Protocol version reported by the daemon; needs no authentication
    pub fn get_version(&mut self) -> Result<String, GmpError> {
        let command = Command::bare("get_version")?;
        let root = expect_success(self.session.send_unauthenticated(&command)?)?;
        root.child_text("version")
            .map(String::from)
            .ok_or_else(|| GmpError::MalformedResponse("version missing".into()))
    }

    /// Targets matching `filter`, which is passed through verbatim
    pub fn get_targets(&mut self, filter: &str) -> Result<TargetList, GmpError> {
        let command = Command::new("get_targets", [("@filter", filter)])?;
        let root = self.call(&command)?;
        Ok(TargetList::new(root))
    }

    /// Creates a target scanning `hosts` on `port_list_id`.
    ///
    /// `hosts` must not be empty; it is sent as one comma separated list.
    pub fn create_target(
        &mut self,
        name: &str,
        hosts: &[String],
        port_list_id: &str,
    ) -> Result<Target, GmpError> {
        if hosts.is_empty() {
            return Err(GmpError::Protocol("a target needs at least one host".into()));
        }
        let command = Command::new(
            "create_target",
            [
                ("name", codec::Value::from(name)),
                ("hosts", codec::Value::from(hosts.join(","))),
                ("port_list", codec::map([("@id", port_list_id)])),
            ],
        )?;
        let root = self.call(&command)?;
        let id = created_id(&root)?;
        tracing::info!("Created target {} ({})", name, id);

        Ok(Target {
            id,
            name:         name.to_string(),
            hosts:        hosts.to_vec(),
            port_list_id: port_list_id.to_string(),
        })
    }

    /// Creates a task tying a scan config, target and scanner together
    pub fn create_task(
        &mut self,
        name: &str,
        config_id: &str,
        target_id: &str,
        scanner_id: &str,
    ) -> Result<Task, GmpError> {
        let command = Command::new(
            "create_task",
            [
                ("name", codec::Value::from(name)),
                ("config", codec::map([("@id", config_id)])),
                ("target", codec::map([("@id", target_id)])),
                ("scanner", codec::map([("@id", scanner_id)])),
            ],
        )?;
        let root = self.call(&command)?;
        let id = created_id(&root)?;
        tracing::info!("Created task {} ({})", name, id);

        Ok(Task {
            id,
            name:           name.to_string(),
            target_id:      target_id.to_string(),
            config_id:      config_id.to_string(),
            scanner_id:     scanner_id.to_string(),
            status:         TaskStatus::New,
            last_report_id: None,
        })
    }

    /// Asks the daemon to run a task; unknown ids fail with
    /// [`GmpError::NotFound`]
    pub fn start_task(&mut self, task_id: &str) -> Result<(), GmpError> {
        let command = Command::new("start_task", [("@task_id", task_id)])?;
        let root = self.call(&command)?;
        tracing::info!(
            "Started task {} (report {})",
            task_id,
            root.child_text("report_id").unwrap_or("pending")
        );
        Ok(())
    }

    /// Tasks matching `filter`
    pub fn get_tasks(&mut self, filter: &str) -> Result<Vec<Task>, GmpError> {
        let command = Command::new("get_tasks", [("@filter", filter)])?;
        let root = self.call(&command)?;
        root.children_named("task").map(Task::from_element).collect()
    }

    /// A single task with its run state and last report
    pub fn get_task(&mut self, task_id: &str) -> Result<Task, GmpError> {
        let command = Command::new("get_tasks", [("@task_id", task_id), ("@details", "1")])?;
        let root = self.call(&command)?;
        let task = root
            .children_named("task")
            .find(|t| t.attribute("id") == Some(task_id))
            .ok_or_else(|| GmpError::NotFound(format!("task {task_id}")))?;
        Task::from_element(task)
    }

    /// Usage statistics for this client
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            connected:     self.session.is_connected(),
            authenticated: self.session.is_authenticated(),
            requests_sent: self.session.requests_sent(),
        }
    }

    /// Ends the session and closes the connection
    pub fn disconnect(&mut self) {
        self.session.close();
    }

    fn call(&mut self, command: &Command) -> Result<Element, GmpError> {
        expect_success(self.session.send(command)?)
    }
}

fn expect_success(response: Response) -> Result<Element, GmpError> {
    response.into_result().map_err(|fault| {
        tracing::warn!("Daemon returned fault: {}", fault);
        fault.into_error()
    })
}

fn created_id(root: &Element) -> Result<String, GmpError> {
    root.attribute("id")
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| GmpError::MalformedResponse(format!("<{}> lacks @id", root.name)))
}

/// Statistics about the client session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStats {
    pub connected:     bool,
    pub authenticated: bool,
    pub requests_sent: u32,
}
