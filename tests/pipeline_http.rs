use drive_relink::contract::MockSleeper;
use drive_relink::download::{DownloadConfig, HttpFetcher};
use drive_relink::link::LinkPattern;
use drive_relink::listing::DriveListingClient;
use drive_relink::synchronise::{synchronise, Mode, SynchroniseConfig};
use drive_relink::table::Table;
use drive_relink::upload::{HttpPublisher, UploadConfig};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Listing, download and upload all served by one mock server; the table is
/// rewritten with the upload store's public links.
#[tokio::test]
async fn rehost_pipeline_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v2/files/F1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "selfLink": "https://www.googleapis.com/drive/v2/files/F1/children/one" },
                { "selfLink": "https://www.googleapis.com/drive/v2/files/F1/children/two" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    for id in ["one", "two"] {
        Mock::given(method("GET"))
            .and(path("/uc"))
            .and(query_param("id", id))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("bytes-of-{id}")))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_string_contains(format!("filename=\"{id}.jpg\"")))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", format!("/img/{id}.jpg").as_str()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempdir().unwrap();
    let lister = DriveListingClient::new(reqwest::Client::new(), server.uri());
    let fetcher = HttpFetcher::new(
        &DownloadConfig {
            dir: dir.path().to_path_buf(),
            ..DownloadConfig::default()
        },
        None,
    )
    .unwrap();
    let publisher = HttpPublisher::new(
        UploadConfig {
            url: format!("{}/upload", server.uri()),
            public_host: "https://cdn.example".to_string(),
        },
        None,
    )
    .unwrap();
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(0);

    let config = SynchroniseConfig {
        link_column: 2,
        link_pattern: LinkPattern::Custom(format!("{}/uc?id=", server.uri())),
        ..SynchroniseConfig::rehost()
    };

    let mut table = Table::from_reader(
        "id,name,folder\n1,holiday,https://drive.google.com/drive/folders/F1\n".as_bytes(),
    )
    .unwrap();
    let mode = Mode::Rehost {
        fetcher: &fetcher,
        publisher: &publisher,
    };
    let report = synchronise(config, &lister, &sleeper, mode, &mut table).await.unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(
        table.rows[1][2],
        "https://cdn.example/img/one.jpg | https://cdn.example/img/two.jpg | "
    );
    assert_eq!(std::fs::read(dir.path().join("two.jpg")).unwrap(), b"bytes-of-two");
}
