// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::*;

const KAMAL_PRODUCTION: &str = r#"
service: ghapp
image: ghapp/web

servers:
  web:
    hosts:
      - 10.0.1.1
    options:
      memory: 2g
  ghosthands:
    hosts:
      - "10.0.2.1"
      - 10.0.2.2

accessories:
  db:
    hosts:
      - 10.0.9.9
"#;

const KAMAL_STAGING: &str = r#"
servers:
  ghosthands:
    hosts:
      - 10.0.2.2
      - 10.0.3.1
"#;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn sources(dir: &tempfile::TempDir) -> FleetSources {
    FleetSources {
        env_json: None,
        discovery: vec![
            ("production".to_string(), write(dir, "deploy.yml", KAMAL_PRODUCTION)),
            ("staging".to_string(), write(dir, "deploy.staging.yml", KAMAL_STAGING)),
        ],
        static_file: dir.path().join("fleet.json"),
    }
}

#[test]
fn scanner_extracts_role_host_pairs_in_order() {
    let pairs = scan_server_hosts(KAMAL_PRODUCTION);
    assert_eq!(
        pairs,
        vec![
            ("web".to_string(), "10.0.1.1".to_string()),
            ("ghosthands".to_string(), "10.0.2.1".to_string()),
            ("ghosthands".to_string(), "10.0.2.2".to_string()),
        ]
    );
}

#[test]
fn scanner_ignores_lists_outside_the_servers_block() {
    let pairs = scan_server_hosts("accessories:\n  db:\n    hosts:\n      - 1.1.1.1\n");
    assert!(pairs.is_empty());
}

#[test]
fn scanner_skips_comments_and_blank_lines() {
    let raw = "servers:\n\n  # workers below\n  ghosthands:\n    hosts:\n      - 2.2.2.2\n";
    assert_eq!(scan_server_hosts(raw), vec![("ghosthands".to_string(), "2.2.2.2".to_string())]);
}

#[test]
fn env_json_overrides_all_file_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = sources(&dir);
    s.env_json = Some(r#"[{"id":"gh-worker-0","ip":"172.16.0.1","role":"ghosthands"}]"#.to_string());

    let fleet = load_fleet(&s).unwrap();

    assert_eq!(fleet.len(), 1);
    assert_eq!(fleet[0].ip, "172.16.0.1");
}

#[test]
fn invalid_env_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = sources(&dir);
    s.env_json = Some("{broken".to_string());

    assert!(matches!(load_fleet(&s), Err(FleetConfigError::InvalidEnvJson(_))));
}

#[test]
fn discovery_assigns_ids_by_one_global_counter() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = load_fleet(&sources(&dir)).unwrap();

    // Only worker-role hosts are discovered; web and accessories are not.
    let ids: Vec<&str> = fleet.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["gh-worker-0", "gh-worker-1", "gh-worker-2"]);
    assert_eq!(fleet[0].ip, "10.0.2.1");
    assert_eq!(fleet[0].environment.as_deref(), Some("production"));
    // 10.0.3.1 keeps counting from the global counter.
    assert_eq!(fleet[2].ip, "10.0.3.1");
    assert_eq!(fleet[2].environment.as_deref(), Some("staging"));
}

#[test]
fn duplicate_ip_across_environments_first_wins() {
    let dir = tempfile::tempdir().unwrap();
    let fleet = load_fleet(&sources(&dir)).unwrap();

    // 10.0.2.2 appears in production and staging; production won.
    let dupes: Vec<&FleetEntry> = fleet.iter().filter(|e| e.ip == "10.0.2.2").collect();
    assert_eq!(dupes.len(), 1);
    assert_eq!(dupes[0].environment.as_deref(), Some("production"));
}

#[test]
fn static_file_overrides_worker_metadata_by_ip() {
    let dir = tempfile::tempdir().unwrap();
    let s = sources(&dir);
    write(
        &dir,
        "fleet.json",
        r#"[
            {"ip":"10.0.2.1","instanceId":"i-abc","name":"worker one"},
            {"ip":"10.0.9.9","role":"database","id":"db-primary"}
        ]"#,
    );

    let fleet = load_fleet(&s).unwrap();

    let worker = fleet.iter().find(|e| e.ip == "10.0.2.1").unwrap();
    assert_eq!(worker.id, "gh-worker-0");
    assert_eq!(worker.instance_id.as_deref(), Some("i-abc"));
    assert_eq!(worker.name.as_deref(), Some("worker one"));

    let db = fleet.iter().find(|e| e.ip == "10.0.9.9").unwrap();
    assert_eq!(db.id, "db-primary");
    assert_eq!(db.role, "database");
}

#[test]
fn static_worker_unknown_to_discovery_is_appended() {
    let dir = tempfile::tempdir().unwrap();
    let s = FleetSources {
        env_json: None,
        discovery: Vec::new(),
        static_file: write(&dir, "fleet.json", r#"[{"ip":"10.1.1.1","instanceId":"i-x"}]"#),
    };

    let fleet = load_fleet(&s).unwrap();

    assert_eq!(fleet.len(), 1);
    assert_eq!(fleet[0].role, "ghosthands");
    assert_eq!(fleet[0].instance_id.as_deref(), Some("i-x"));
}

#[test]
fn missing_files_yield_an_empty_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let s = FleetSources {
        env_json: None,
        discovery: vec![("production".to_string(), dir.path().join("nope.yml"))],
        static_file: dir.path().join("nope.json"),
    };

    assert!(load_fleet(&s).unwrap().is_empty());
}

#[test]
fn corrupt_static_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let s = FleetSources {
        env_json: None,
        discovery: Vec::new(),
        static_file: write(&dir, "fleet.json", "not json"),
    };

    assert!(matches!(load_fleet(&s), Err(FleetConfigError::InvalidStaticFile { .. })));
}
