//! Export snapshot tests against a mock tracker API.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskmill_scheduler::config::Config;
use taskmill_scheduler::db::DbConfig;
use taskmill_scheduler::export::{export_all, export_projects, export_statuses, ExportError};
use taskmill_scheduler::redmine::RedmineClient;

fn test_config(base_url: &str) -> Config {
    Config {
        redmine_url: base_url.to_string(),
        redmine_api_key: "secret-key".to_string(),
        catalog_path: "data/periodic_tasks.csv".into(),
        data_dir: "data".into(),
        log_file: None,
        log_level: "info".to_string(),
        done_status_ids: None,
        database: DbConfig::default(),
    }
}

fn temp_data_dir(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskmill_{name}_{suffix}"))
}

#[tokio::test]
async fn test_export_statuses_writes_csv() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/issue_statuses.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issue_statuses": [
                {"id": 1, "name": "New", "is_closed": false},
                {"id": 5, "name": "Closed", "is_closed": true}
            ]
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(&test_config(&server.uri())).unwrap();
    let data_dir = temp_data_dir("statuses");

    let written = export_statuses(&client, &data_dir).await.unwrap();

    let contents = std::fs::read_to_string(&written).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("id,name,is_closed"));
    assert_eq!(lines.next(), Some("1,New,false"));
    assert_eq!(lines.next(), Some("5,Closed,true"));

    let file_name = written.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("issue_statuses_"));
    assert!(file_name.ends_with(".csv"));
}

#[tokio::test]
async fn test_export_projects_flattens_parent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [
                {"id": 1, "name": "Root", "identifier": "root", "status": 1},
                {"id": 2, "name": "Child", "identifier": "child", "status": 1,
                 "parent": {"id": 1, "name": "Root"}}
            ],
            "total_count": 2
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(&test_config(&server.uri())).unwrap();
    let data_dir = temp_data_dir("projects");

    let written = export_projects(&client, &data_dir).await.unwrap();

    let contents = std::fs::read_to_string(&written).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,identifier,description,homepage,status,created_on,updated_on,parent_id")
    );
    assert_eq!(lines.next(), Some("1,Root,root,,,1,,,"));
    assert_eq!(lines.next(), Some("2,Child,child,,,1,,,1"));
}

#[tokio::test]
async fn test_export_all_continues_past_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"errors": ["boom"]})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/trackers.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trackers": [{"id": 2, "name": "Task"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 3, "login": "reporter"}],
            "total_count": 1
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/issue_statuses.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issue_statuses": [{"id": 5, "name": "Closed", "is_closed": true}]
        })))
        .mount(&server)
        .await;

    let client = RedmineClient::new(&test_config(&server.uri())).unwrap();
    let data_dir = temp_data_dir("all");

    let err = export_all(&client, &data_dir).await.unwrap_err();
    assert!(matches!(err, ExportError::Partial { failed: 1 }));

    // The failing projects export must not stop the others.
    let names: Vec<String> = std::fs::read_dir(&data_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.starts_with("trackers_")));
    assert!(names.iter().any(|n| n.starts_with("users_")));
    assert!(names.iter().any(|n| n.starts_with("issue_statuses_")));
}
