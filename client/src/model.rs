use std::collections::BTreeSet;

use gmp_common::{codec::Element, error::GmpError};
use serde::Serialize;

/// A scan destination known to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub id:           String,
    pub name:         String,
    pub hosts:        Vec<String>,
    pub port_list_id: String,
}

impl Target {
    /// Decodes a `<target>` element
    pub fn from_element(element: &Element) -> Result<Self, GmpError> {
        let id = required_attribute(element, "id")?;
        let port_list_id = element
            .child("port_list")
            .and_then(|p| p.attribute("id"))
            .ok_or_else(|| missing(&element.name, "port_list@id"))?
            .to_string();
        Ok(Self {
            id,
            name:  element.child_text("name").unwrap_or_default().to_string(),
            hosts: split_hosts(element.child_text("hosts").unwrap_or_default()),
            port_list_id,
        })
    }

    /// True when this target scans the same hosts (in any order) on the same
    /// port list
    pub fn is_equivalent(&self, hosts: &[String], port_list_id: &str) -> bool {
        self.port_list_id == port_list_id && hosts_equivalent(&self.hosts, hosts)
    }
}

/// Compares two host lists as sets
pub fn hosts_equivalent<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    host_set(a) == host_set(b)
}

fn host_set<S: AsRef<str>>(hosts: &[S]) -> BTreeSet<&str> {
    hosts
        .iter()
        .map(|h| h.as_ref().trim())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Splits the daemon's comma separated host string
pub fn split_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect()
}

/// Targets returned by `get_targets`, decoded one at a time on iteration
#[derive(Debug, Clone)]
pub struct TargetList {
    root: Element,
}

impl TargetList {
    pub(crate) fn new(root: Element) -> Self {
        Self { root }
    }

    /// Decodes each `<target>` child in document order
    pub fn iter(&self) -> impl Iterator<Item = Result<Target, GmpError>> + '_ {
        self.root.children_named("target").map(Target::from_element)
    }

    /// Number of `<target>` children, decoded or not
    pub fn len(&self) -> usize {
        self.root.children_named("target").count()
    }

    /// True when the daemon returned no targets
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run state of a task, owned by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Requested,
    Queued,
    Running,
    StopRequested,
    Stopped,
    Interrupted,
    Done,
    Other(String),
}

impl TaskStatus {
    /// Maps the daemon's status text, keeping unknown values verbatim
    pub fn parse(status: &str) -> Self {
        match status.trim() {
            "New" => TaskStatus::New,
            "Requested" => TaskStatus::Requested,
            "Queued" => TaskStatus::Queued,
            "Running" => TaskStatus::Running,
            "Stop Requested" => TaskStatus::StopRequested,
            "Stopped" => TaskStatus::Stopped,
            "Interrupted" => TaskStatus::Interrupted,
            "Done" => TaskStatus::Done,
            other => TaskStatus::Other(other.to_string()),
        }
    }
}

/// A target bound to a scan config and a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id:             String,
    pub name:           String,
    pub target_id:      String,
    pub config_id:      String,
    pub scanner_id:     String,
    pub status:         TaskStatus,
    pub last_report_id: Option<String>,
}

impl Task {
    /// Decodes a `<task>` element
    pub fn from_element(element: &Element) -> Result<Self, GmpError> {
        let ref_id = |name: &str| {
            element
                .child(name)
                .and_then(|c| c.attribute("id"))
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            id:             required_attribute(element, "id")?,
            name:           element.child_text("name").unwrap_or_default().to_string(),
            target_id:      ref_id("target"),
            config_id:      ref_id("config"),
            scanner_id:     ref_id("scanner"),
            status:         TaskStatus::parse(element.child_text("status").unwrap_or("New")),
            last_report_id: element
                .child("last_report")
                .and_then(|r| r.child("report"))
                .and_then(|r| r.attribute("id"))
                .map(String::from),
        })
    }
}

fn required_attribute(element: &Element, key: &str) -> Result<String, GmpError> {
    element
        .attribute(key)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| missing(&element.name, &format!("@{key}")))
}

fn missing(element: &str, what: &str) -> GmpError {
    GmpError::MalformedResponse(format!("<{element}> lacks {what}"))
}
