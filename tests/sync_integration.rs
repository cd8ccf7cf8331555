use folio::api::ApiClient;
use folio::storage::VaultStore;
use folio::sync::{SyncOptions, Syncer};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_post(server: &MockServer, id: &str, post_type: &str, body: &str) {
    let uri = server.uri();
    let record = serde_json::json!({
        "id": id,
        "title": format!("Post {}", id),
        "type": post_type,
        "date": "2024-03-05T10:00:00.000Z",
        "tags": ["rust"],
        "description": format!("About {}.", id),
        "covers": [format!("{}-cover", id)],
        "markdown": format!("{}-md", id),
        "resources": [
            {"id": format!("{}-cover", id), "filename": "cover.png", "type": "image",
             "url": format!("{}/bucket/{}-cover", uri, id)},
            {"id": format!("{}-md", id), "filename": format!("{}.md", id), "type": "markdown",
             "url": format!("{}/bucket/{}-md", uri, id)}
        ]
    });

    Mock::given(method("GET"))
        .and(path(format!("/api/posts/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/bucket/{}-md", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/bucket/{}-cover", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("cover of {}", id).into_bytes()))
        .mount(server)
        .await;
}

fn syncer(server: &MockServer, temp: &TempDir) -> Syncer<ApiClient, VaultStore> {
    let client = ApiClient::new("test_token".into(), Some(server.uri()))
        .unwrap()
        .disable_throttle();
    Syncer::new(
        client,
        VaultStore::new(temp.path().to_path_buf()),
        SyncOptions::default(),
    )
}

#[tokio::test]
async fn test_fetch_all_end_to_end() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/posts/ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["p1", "p2", "p3"])))
        .mount(&server)
        .await;
    mount_post(&server, "p1", "project", "See ![cover](ref:p1-cover) above.").await;
    mount_post(&server, "p3", "blog", "Intro\n\n![c](ref:p3-cover)").await;
    Mock::given(method("GET"))
        .and(path("/api/posts/p2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let syncer = syncer(&server, &temp);
    let report = syncer.fetch_all().await.unwrap();

    assert_eq!(report.total(), 3);
    let failed: Vec<&str> = report.failed().map(|(id, _)| id).collect();
    assert_eq!(failed, vec!["p2"]);

    let doc = fs::read_to_string(temp.path().join("Projects/p1/p1.md")).unwrap();
    assert!(doc.starts_with("---\nid: p1\ntitle: Post p1\ntype: project\n"));
    assert!(doc.contains("2024-03-05"));
    assert!(doc.ends_with("# Description\n\nAbout p1.\n\nSee ![cover](cover.png) above.\n"));
    assert_eq!(
        fs::read_to_string(temp.path().join("Projects/p1/cover.png")).unwrap(),
        "cover of p1"
    );
    assert!(temp.path().join("Blogs/p3/p3.md").exists());
    assert!(!temp.path().join("Projects/p2").exists());

    match report.into_result() {
        Err(folio::Error::PartialBulkFailure { failed, total }) => {
            assert_eq!(failed, vec!["p2".to_string()]);
            assert_eq!(total, 3);
        }
        other => panic!("Expected PartialBulkFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repeat_fetch_is_byte_identical() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_post(&server, "p1", "project", "## Notes\n\n- one\n- two\n\n![cover](ref:p1-cover)").await;

    let syncer = syncer(&server, &temp);
    syncer.fetch_post("p1").await.unwrap();
    let first = fs::read(temp.path().join("Projects/p1/p1.md")).unwrap();
    syncer.fetch_post("p1").await.unwrap();
    let second = fs::read(temp.path().join("Projects/p1/p1.md")).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_enumeration_failure_is_an_error() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/posts/ids"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = syncer(&server, &temp).fetch_all().await;
    assert!(matches!(result, Err(folio::Error::Api { status: 401, .. })));
}
