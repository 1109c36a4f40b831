//! In-memory GMP daemon used by the integration tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    io::{self, Read, Write},
    rc::Rc,
};

use gmp_client::{Credentials, GmpClient};
use gmp_common::{
    codec::{self, Command, Element},
    transport::{ByteStream, Connection},
};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "s3cret";

#[derive(Debug, Clone)]
pub struct StoredTarget {
    pub id:        String,
    pub name:      String,
    pub hosts:     String,
    pub port_list: String,
}

#[derive(Debug, Clone)]
pub struct StoredTask {
    pub id:        String,
    pub name:      String,
    pub target_id: String,
    pub config_id: String,
    pub status:    String,
}

/// Remote state plus a log of every verb received
#[derive(Debug, Default)]
pub struct DaemonState {
    pub targets:       Vec<StoredTarget>,
    pub tasks:         Vec<StoredTask>,
    pub calls:         Vec<String>,
    pub requests:      Vec<Element>,
    pub authenticated: bool,
    next_id:           u32,
}

impl DaemonState {
    pub fn add_target(&mut self, name: &str, hosts: &str, port_list: &str) -> String {
        let id = self.allocate("target");
        self.targets.push(StoredTarget {
            id:        id.clone(),
            name:      name.into(),
            hosts:     hosts.into(),
            port_list: port_list.into(),
        });
        id
    }

    pub fn add_task(&mut self, name: &str, target_id: &str, status: &str) -> String {
        let id = self.allocate("task");
        self.tasks.push(StoredTask {
            id:        id.clone(),
            name:      name.into(),
            target_id: target_id.into(),
            config_id: "cfg".into(),
            status:    status.into(),
        });
        id
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls.iter().filter(|c| *c == verb).count()
    }

    fn allocate(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}-{:04}", self.next_id)
    }

    fn handle(&mut self, request: Element) -> Element {
        self.calls.push(request.name.clone());
        self.requests.push(request.clone());
        let reply = format!("{}_response", request.name);

        match request.name.as_str() {
            "get_version" => ok(&reply, "200").with_child(text("version", "22.4")),
            "authenticate" => {
                let creds = request.child("credentials");
                let user = creds.and_then(|c| c.child_text("username"));
                let pass = creds.and_then(|c| c.child_text("password"));
                if user == Some(USERNAME) && pass == Some(PASSWORD) {
                    self.authenticated = true;
                    ok(&reply, "200").with_child(text("role", "Admin"))
                } else {
                    fault(&reply, "400", "Authentication failed")
                }
            }
            _ if !self.authenticated => fault(
                &reply,
                "400",
                "Only command GET_VERSION is allowed before AUTHENTICATE",
            ),
            "get_targets" => {
                let wanted = request
                    .attribute("filter")
                    .and_then(|f| f.strip_prefix("name=\""))
                    .and_then(|f| f.strip_suffix('"'))
                    .map(String::from);
                let mut root = ok(&reply, "200");
                for t in &self.targets {
                    if wanted.as_deref().is_some_and(|w| w != t.name) {
                        continue;
                    }
                    root = root.with_child(
                        Element::new("target")
                            .with_attribute("id", t.id.as_str())
                            .with_child(text("name", &t.name))
                            .with_child(text("hosts", &t.hosts))
                            .with_child(
                                Element::new("port_list")
                                    .with_attribute("id", t.port_list.as_str())
                                    .with_child(text("name", "All IANA assigned TCP")),
                            ),
                    );
                }
                root
            }
            "create_target" => {
                let name = request.child_text("name").unwrap_or_default().to_string();
                if self.targets.iter().any(|t| t.name == name) {
                    return fault(&reply, "400", "Target exists already");
                }
                let hosts = request.child_text("hosts").unwrap_or_default().to_string();
                let port_list = request
                    .child("port_list")
                    .and_then(|p| p.attribute("id"))
                    .unwrap_or_default()
                    .to_string();
                let id = self.add_target(&name, &hosts, &port_list);
                ok(&reply, "201").with_attribute("id", id)
            }
            "create_task" => {
                let name = request.child_text("name").unwrap_or_default().to_string();
                let target_id = request
                    .child("target")
                    .and_then(|t| t.attribute("id"))
                    .unwrap_or_default()
                    .to_string();
                if !self.targets.iter().any(|t| t.id == target_id) {
                    return fault(&reply, "404", "Failed to find target");
                }
                let id = self.add_task(&name, &target_id, "New");
                ok(&reply, "201").with_attribute("id", id)
            }
            "start_task" => {
                let task_id = request.attribute("task_id").unwrap_or_default().to_string();
                match self.tasks.iter_mut().find(|t| t.id == task_id) {
                    Some(task) => {
                        task.status = "Requested".into();
                        ok(&reply, "202").with_child(text("report_id", "report-0001"))
                    }
                    None => fault(&reply, "404", &format!("Failed to find task '{task_id}'")),
                }
            }
            "get_tasks" => {
                let only = request.attribute("task_id");
                if let Some(id) = only {
                    if !self.tasks.iter().any(|t| t.id == id) {
                        return fault(&reply, "404", &format!("Failed to find task '{id}'"));
                    }
                }
                let mut root = ok(&reply, "200");
                for t in self.tasks.iter().filter(|t| only.map_or(true, |id| id == t.id)) {
                    root = root.with_child(
                        Element::new("task")
                            .with_attribute("id", t.id.as_str())
                            .with_child(text("name", &t.name))
                            .with_child(Element::new("config").with_attribute("id", t.config_id.as_str()))
                            .with_child(Element::new("target").with_attribute("id", t.target_id.as_str()))
                            .with_child(text("status", &t.status))
                            .with_child(
                                Element::new("last_report").with_child(
                                    Element::new("report").with_attribute("id", "report-0001"),
                                ),
                            ),
                    );
                }
                root
            }
            _ => fault(&reply, "400", "Bogus command name"),
        }
    }
}

fn ok(name: &str, status: &str) -> Element {
    Element::new(name)
        .with_attribute("status", status)
        .with_attribute("status_text", "OK")
}

fn fault(name: &str, status: &str, status_text: &str) -> Element {
    Element::new(name)
        .with_attribute("status", status)
        .with_attribute("status_text", status_text)
}

fn text(name: &str, value: &str) -> Element {
    Element::new(name).with_text(value)
}

/// Byte stream end of the fake daemon
pub struct FakeDaemon {
    state:   Rc<RefCell<DaemonState>>,
    inbox:   Vec<u8>,
    pending: Vec<u8>,
}

impl FakeDaemon {
    pub fn new(state: Rc<RefCell<DaemonState>>) -> Self {
        Self {
            state,
            inbox:   Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl Read for FakeDaemon {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for FakeDaemon {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbox.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.inbox.is_empty() {
            return Ok(());
        }
        let request = codec::read_document(self.inbox.as_slice())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        self.inbox.clear();

        let reply = self.state.borrow_mut().handle(request);
        let bytes = Command::try_from(reply)
            .and_then(|command| codec::encode(&command))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        self.pending.extend_from_slice(&bytes);
        Ok(())
    }
}

impl ByteStream for FakeDaemon {}

/// A fresh daemon state and a client connected to it
pub fn daemon() -> (Rc<RefCell<DaemonState>>, GmpClient<FakeDaemon>) {
    let state = Rc::new(RefCell::new(DaemonState::default()));
    let client = client_for(&state);
    (state, client)
}

/// A new client connected to an existing daemon state
pub fn client_for(state: &Rc<RefCell<DaemonState>>) -> GmpClient<FakeDaemon> {
    let connection = Connection::from_stream("gvm.test", 9390, FakeDaemon::new(Rc::clone(state)));
    GmpClient::from_connection(connection)
}

pub fn valid_credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

pub fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|h| h.to_string()).collect()
}
