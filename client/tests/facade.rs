mod common;

use common::{daemon, hosts, valid_credentials};
use gmp_client::{ClientStats, ErrorKind, TaskStatus};

#[test]
fn version_is_available_before_authentication() {
    let (_state, mut client) = daemon();
    assert_eq!(client.get_version().unwrap(), "22.4");
    assert!(!client.stats().authenticated);
}

#[test]
fn verbs_require_authentication() {
    let (state, mut client) = daemon();
    let err = client.get_targets("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(state.borrow().calls.is_empty());
}

#[test]
fn get_targets_returns_matching_targets() {
    let (state, mut client) = daemon();
    {
        let mut state = state.borrow_mut();
        state.add_target("web1", "10.0.0.5, 10.0.0.6", "pl-1");
        state.add_target("db1", "10.0.1.1", "pl-1");
    }
    client.authenticate(&valid_credentials()).unwrap();

    let targets = client.get_targets("name=\"web1\"").unwrap();
    assert_eq!(targets.len(), 1);
    let web1 = targets.iter().next().unwrap().unwrap();
    assert_eq!(web1.name, "web1");
    assert_eq!(web1.hosts, hosts(&["10.0.0.5", "10.0.0.6"]));
    assert_eq!(web1.port_list_id, "pl-1");

    let all = client.get_targets("").unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn create_target_sends_comma_separated_hosts() {
    let (state, mut client) = daemon();
    client.authenticate(&valid_credentials()).unwrap();

    let target = client
        .create_target("web", &hosts(&["10.0.0.5", "web.local"]), "pl-1")
        .unwrap();

    assert!(!target.id.is_empty());
    assert_eq!(target.hosts, hosts(&["10.0.0.5", "web.local"]));
    assert_eq!(state.borrow().targets[0].hosts, "10.0.0.5,web.local");
}

#[test]
fn create_target_with_taken_name_is_duplicate() {
    let (state, mut client) = daemon();
    state.borrow_mut().add_target("web", "10.0.0.5", "pl-1");
    client.authenticate(&valid_credentials()).unwrap();

    let err = client
        .create_target("web", &hosts(&["10.0.0.7"]), "pl-1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);
    assert!(err.to_string().contains("exists already"));
}

#[test]
fn create_target_needs_hosts() {
    let (state, mut client) = daemon();
    client.authenticate(&valid_credentials()).unwrap();
    let err = client.create_target("web", &[], "pl-1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(state.borrow().count("create_target"), 0);
}

#[test]
fn create_task_reports_identifiers() {
    let (state, mut client) = daemon();
    let target_id = state.borrow_mut().add_target("web", "10.0.0.5", "pl-1");
    client.authenticate(&valid_credentials()).unwrap();

    let task = client
        .create_task("Scan_web", "cfg-1", &target_id, "scanner-1")
        .unwrap();
    assert_eq!(task.target_id, target_id);
    assert_eq!(task.config_id, "cfg-1");
    assert_eq!(task.scanner_id, "scanner-1");
    assert_eq!(task.status, TaskStatus::New);
}

#[test]
fn create_task_for_unknown_target_is_not_found() {
    let (_state, mut client) = daemon();
    client.authenticate(&valid_credentials()).unwrap();
    let err = client
        .create_task("Scan_x", "cfg-1", "missing", "scanner-1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn task_queries_decode_run_state_and_reports() {
    let (state, mut client) = daemon();
    let (done, running) = {
        let mut state = state.borrow_mut();
        let target = state.add_target("web", "10.0.0.5", "pl-1");
        (
            state.add_task("Scan_a", &target, "Done"),
            state.add_task("Scan_b", &target, "Running"),
        )
    };
    client.authenticate(&valid_credentials()).unwrap();

    let tasks = client.get_tasks("").unwrap();
    assert_eq!(tasks.len(), 2);

    let task = client.get_task(&done).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.last_report_id.as_deref(), Some("report-0001"));

    assert_eq!(client.get_task(&running).unwrap().status, TaskStatus::Running);
    assert_eq!(
        client.get_task("missing").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn stats_track_the_session() {
    let (_state, mut client) = daemon();
    client.authenticate(&valid_credentials()).unwrap();
    client.get_tasks("").unwrap();

    assert_eq!(
        client.stats(),
        ClientStats {
            connected:     true,
            authenticated: true,
            requests_sent: 2,
        }
    );

    client.disconnect();
    client.disconnect();
    let stats = client.stats();
    assert!(!stats.connected);
    assert!(!stats.authenticated);
    assert_eq!(client.get_tasks("").unwrap_err().kind(), ErrorKind::Transport);
}
