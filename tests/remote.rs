use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use mockito::{Matcher, Server};

use clams_utils::config::RetrieverConfig;
use clams_utils::domain::DatasetId;
use clams_utils::error::{ErrorKind, GoldError};
use clams_utils::remote::{GithubTreeSource, GoldSource};
use clams_utils::retrieve;

const LISTING_PATH: &str = "/clamsproject/aapb-annotations/tree/main/batch-01";

fn listing_fixture() -> String {
    fs::read_to_string("tests/fixtures/tree_batch_01.json").unwrap()
}

fn config_for(server: &Server, cache_root: Utf8PathBuf) -> RetrieverConfig {
    let mut config = RetrieverConfig::new(cache_root);
    config.remote_base = format!("{}/clamsproject/aapb-annotations/tree/main", server.url());
    config.raw_base = server.url();
    config.timeout_secs = 5;
    config
}

fn temp_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("golds")).unwrap()
}

#[test]
fn fetch_bundle_downloads_every_file_in_listing() {
    let mut server = Server::new();
    let listing = server
        .mock("GET", LISTING_PATH)
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing_fixture())
        .expect(1)
        .create();
    let first = server
        .mock(
            "GET",
            "/clamsproject/aapb-annotations/main/batch-01/cpb-aacip-507-028pc2tp2z.tsv",
        )
        .with_body("first")
        .expect(1)
        .create();
    let second = server
        .mock(
            "GET",
            "/clamsproject/aapb-annotations/main/batch-01/cpb-aacip-507-0k26970j2p.tsv",
        )
        .with_body("second")
        .expect(1)
        .create();
    let directory = server
        .mock(
            "GET",
            Matcher::Regex("/clamsproject/aapb-annotations/main/batch-01/extras".to_string()),
        )
        .expect(0)
        .create();

    let temp = tempfile::tempdir().unwrap();
    let source = GithubTreeSource::new(&config_for(&server, temp_root(&temp))).unwrap();
    let id: DatasetId = "batch-01".parse().unwrap();
    let bundle = source.fetch_bundle(&id).unwrap();

    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.files[0].name, "cpb-aacip-507-028pc2tp2z.tsv");
    assert_eq!(bundle.files[0].bytes, b"first");
    assert_eq!(bundle.files[1].name, "cpb-aacip-507-0k26970j2p.tsv");
    listing.assert();
    first.assert();
    second.assert();
    directory.assert();
}

#[test]
fn retrieve_downloads_once_then_serves_from_cache() {
    let mut server = Server::new();
    let listing = server
        .mock("GET", LISTING_PATH)
        .with_status(200)
        .with_body(listing_fixture())
        .expect(1)
        .create();
    let raw = server
        .mock(
            "GET",
            Matcher::Regex(r"^/clamsproject/aapb-annotations/main/batch-01/.+\.tsv$".to_string()),
        )
        .with_body("start\tend\n")
        .expect(2)
        .create();

    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let config = config_for(&server, root.clone());

    let first = retrieve(&config, "batch-01").unwrap();
    let second = retrieve(&config, "batch-01").unwrap();

    assert_eq!(first, root.join("batch-01"));
    assert_eq!(first, second);
    assert!(first.join("cpb-aacip-507-0k26970j2p.tsv").is_file());
    listing.assert();
    raw.assert();
}

#[test]
fn missing_listing_is_not_found_and_creates_nothing() {
    let mut server = Server::new();
    let listing = server
        .mock("GET", "/clamsproject/aapb-annotations/tree/main/nonexistent-id")
        .with_status(404)
        .with_body("Not Found")
        .create();

    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let err = retrieve(&config_for(&server, root.clone()), "nonexistent-id").unwrap_err();

    assert_matches!(err, GoldError::NotFound(_));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!root.exists());
    listing.assert();
}

#[test]
fn server_error_is_a_network_failure() {
    let mut server = Server::new();
    server
        .mock("GET", LISTING_PATH)
        .with_status(503)
        .with_body("unavailable")
        .create();

    let temp = tempfile::tempdir().unwrap();
    let err = retrieve(&config_for(&server, temp_root(&temp)), "batch-01").unwrap_err();

    assert_matches!(err, GoldError::Status { status: 503, .. });
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn html_listing_reports_unexpected_shape() {
    let mut server = Server::new();
    server
        .mock("GET", LISTING_PATH)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<!DOCTYPE html><html><body>login</body></html>")
        .create();

    let temp = tempfile::tempdir().unwrap();
    let err = retrieve(&config_for(&server, temp_root(&temp)), "batch-01").unwrap_err();

    assert_matches!(err, GoldError::UnexpectedListing { .. });
}

#[test]
fn failed_file_download_leaves_no_dataset_directory() {
    let mut server = Server::new();
    server
        .mock("GET", LISTING_PATH)
        .with_status(200)
        .with_body(listing_fixture())
        .create();
    server
        .mock(
            "GET",
            "/clamsproject/aapb-annotations/main/batch-01/cpb-aacip-507-028pc2tp2z.tsv",
        )
        .with_body("first")
        .create();
    server
        .mock(
            "GET",
            "/clamsproject/aapb-annotations/main/batch-01/cpb-aacip-507-0k26970j2p.tsv",
        )
        .with_status(500)
        .create();

    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let err = retrieve(&config_for(&server, root.clone()), "batch-01").unwrap_err();

    assert_matches!(err, GoldError::Status { status: 500, .. });
    assert!(!root.join("batch-01").exists());
}

#[test]
fn unreachable_host_is_a_network_failure() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = RetrieverConfig::new(temp_root(&temp));
    config.remote_base = "http://127.0.0.1:1/clamsproject/aapb-annotations/tree/main".to_string();
    config.timeout_secs = 2;

    let err = retrieve(&config, "batch-01").unwrap_err();

    assert_matches!(err, GoldError::Http(_));
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn invalid_identifier_is_rejected_before_any_request() {
    let temp = tempfile::tempdir().unwrap();
    let config = RetrieverConfig::new(temp_root(&temp));

    let err = retrieve(&config, "../outside").unwrap_err();

    assert_matches!(err, GoldError::InvalidDatasetId(_));
}

#[test]
fn malformed_remote_base_is_an_input_error() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = RetrieverConfig::new(temp_root(&temp));
    config.remote_base = "not a url".to_string();

    let err = retrieve(&config, "batch-01").unwrap_err();

    assert_matches!(err, GoldError::InvalidRemote(_));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
