//! End-to-end tests of the HTTP API over a fixture-backed registry.

use std::io::Write;
use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use time::macros::datetime;

use archiving_uri::http::{build_router, AppState};
use archiving_uri::{ArchivingSettings, FixtureReader};

const FIXTURES: &str = r"
attributes:
  - name: sys/tg_test/1/ampli
    type: DevDouble
    samples:
      - [1641038280, 1.5]
      - [1641038340, 2.5]
  - name: sys/tg_test/1/spectrum
    samples:
      - [1641038340, [1, 2, 3]]
  - name: sys/tg_test/1/cube
    samples:
      - [1641038340, [[[1]]]]
  - name: sys/tg_test/1/retired
    active: false
";

fn server(settings_yaml: &str) -> (TestServer, Arc<FixtureReader>) {
    let mut fixtures = NamedTempFile::new().expect("tempfile");
    fixtures.write_all(FIXTURES.as_bytes()).expect("write fixtures");
    let reader = Arc::new(FixtureReader::load_from_path(fixtures.path()).expect("fixtures"));

    let settings = ArchivingSettings::from_yaml_str(settings_yaml).expect("settings");
    let state = AppState::builder()
        .with_reader(reader.clone())
        .with_settings(settings)
        .with_fixed_now(datetime!(2022-01-01 12:00:00 UTC))
        .build()
        .expect("valid configuration");

    (TestServer::new(build_router(state)).expect("test server"), reader)
}

/// Test name resolution across element kinds for the epoch flavor.
#[tokio::test]
async fn test_names_epoch_flavor() {
    let (server, _) = server("scheme: archiving\ndefault_authority: foo:1234\n");

    let response = server
        .get("/api/v1/names")
        .add_query_param("name", "archiving://foo:1234/a/b/c/d?db=rad2s;t0=1542681831;t1=now")
        .await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json["data"]["complete"],
        "archiving://foo:1234/a/b/c/d?db=rad2s;t0=1542681831;t1=1641038400"
    );
    assert_eq!(json["data"]["normal"], "/a/b/c/d?db=rad2s;t0=1542681831;t1=now");
    assert_eq!(json["data"]["short"], "a/b/c/d");

    let response = server
        .get("/api/v1/names")
        .add_query_param("name", "archiving:/bar/d")
        .add_query_param("kind", "attribute")
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["short"], "bar/d");

    let response = server
        .get("/api/v1/names")
        .add_query_param("name", "archiving://foo:1234?db=tdb")
        .add_query_param("kind", "device")
        .await;
    assert_eq!(response.json::<Value>()["data"]["normal"], "?db=tdb");

    let response = server
        .get("/api/v1/names")
        .add_query_param("name", "archiving:/a/b/c/d?t1=-1d;t1=now")
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["errorType"], "bad_data");
}

/// Test reading both views and refreshing through the API.
#[tokio::test]
async fn test_read_and_refresh() {
    let (server, reader) = server("default_authority: foo:1234\nutc_offset: '+01:00'\n");

    let response =
        server.get("/api/v1/read").add_query_param("name", "tgarch:/sys/tg_test/1/ampli").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json["data"]["name"],
        "tgarch://foo:1234/sys/tg_test/1/ampli?db=*;t0=2021-12-31T13:00:00;t1=2022-01-01T13:00:00"
    );
    assert_eq!(json["data"]["type"], "float");
    assert_eq!(json["data"]["values"], json!([[1641038280.0, 1.5], [1641038340.0, 2.5]]));

    let response =
        server.get("/api/v1/read").add_query_param("name", "tgarch:/sys/tg_test/1/ampli?ts").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["label"], "sys/tg_test/1/ampli (archiving ts)");
    assert_eq!(reader.fetch_count(), 1);

    let response =
        server.post("/api/v1/refresh").add_query_param("name", "tgarch:/sys/tg_test/1/spectrum").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["data"]["format"], "1d");
    assert_eq!(json["data"]["values"], json!([[1641038340.0, [1.0, 2.0, 3.0]]]));
}

/// Test the error status of each failure kind.
#[tokio::test]
async fn test_error_statuses() {
    let (server, reader) = server("default_authority: foo:1234\n");

    let response =
        server.get("/api/v1/read").add_query_param("name", "tgarch:/sys/tg_test/1/cube").await;
    assert_eq!(response.status_code(), 422);
    assert_eq!(response.json::<Value>()["errorType"], "unsupported_shape");

    let response = server
        .post("/api/v1/write")
        .add_query_param("name", "tgarch:/sys/tg_test/1/ampli")
        .text("3.5")
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["errorType"], "read_only");

    reader.set_online(false);
    let response =
        server.get("/api/v1/read").add_query_param("name", "tgarch:/sys/tg_test/1/ampli").await;
    assert_eq!(response.status_code(), 503);

    let response = server.get("/api/v1/attributes").await;
    assert_eq!(response.status_code(), 503);
}

/// Test listing archived attributes and the health check.
#[tokio::test]
async fn test_attributes_and_health() {
    let (server, _) = server("default_authority: foo:1234\n");

    server.get("/healthz").await.assert_text("ok");

    let response = server.get("/api/v1/attributes").add_query_param("active", true).await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["data"],
        json!(["sys/tg_test/1/ampli", "sys/tg_test/1/cube", "sys/tg_test/1/spectrum"])
    );

    let response = server.get("/api/v1/attributes").await;
    assert_eq!(response.json::<Value>()["data"].as_array().map(Vec::len), Some(4));
}
