use drive_relink::contract::{FetchedArtifact, Publisher};
use drive_relink::upload::{HttpPublisher, PublishError, UploadConfig};
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn publisher_for(server: &MockServer) -> HttpPublisher {
    HttpPublisher::new(
        UploadConfig {
            url: format!("{}/upload", server.uri()),
            public_host: "https://cdn.example".to_string(),
        },
        None,
    )
    .unwrap()
}

fn artifact_in(dir: &std::path::Path, id: &str, content: &[u8]) -> FetchedArtifact {
    let path = dir.join(format!("{id}.jpg"));
    std::fs::write(&path, content).unwrap();
    FetchedArtifact {
        resource_id: id.to_string(),
        path,
        bytes: content.len() as u64,
    }
}

#[tokio::test]
async fn location_is_prefixed_with_public_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"media\""))
        .and(body_string_contains("filename=\"abc.jpg\""))
        .and(body_string_contains("pixels"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/i/2024/abc.jpg"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let artifact = artifact_in(dir.path(), "abc", b"pixels");
    let link = publisher_for(&server).publish(&artifact).await.unwrap();

    assert_eq!(link.as_str(), "https://cdn.example/i/2024/abc.jpg");
}

#[tokio::test]
async fn missing_location_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let artifact = artifact_in(dir.path(), "abc", b"pixels");
    let err = publisher_for(&server).publish(&artifact).await.unwrap_err();

    match err {
        PublishError::MissingLocation { file, status } => {
            assert_eq!(file, "abc.jpg");
            assert_eq!(status, 200);
        }
        other => panic!("expected missing location, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_artifact_is_not_uploaded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let artifact = FetchedArtifact {
        resource_id: "ghost".into(),
        path: dir.path().join("ghost.jpg"),
        bytes: 0,
    };
    let err = publisher_for(&server).publish(&artifact).await.unwrap_err();

    assert!(matches!(err, PublishError::Io { .. }));
}
