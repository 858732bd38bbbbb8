mod common;

use assert_matches::assert_matches;

use common::{CannedResponse, MockHost, dataset_zip};
use otfs_provision::domain::ShareLinkId;
use otfs_provision::error::{OtfsError, VerificationFailure};
use otfs_provision::fetch::VerifiedFetcher;

fn link() -> ShareLinkId {
    "1AbCdEf".parse().unwrap()
}

#[test]
fn direct_payload_is_verified() {
    let payload = dataset_zip();
    let host = MockHost::with(vec![CannedResponse::binary(payload.clone())]);
    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("dl/dataset.zip");

    let artifact = VerifiedFetcher::new(&host).fetch(&link(), &destination).unwrap();

    assert!(artifact.verified);
    assert_eq!(artifact.content_type, "application/zip");
    assert_eq!(artifact.source_link_id.as_deref(), Some("1AbCdEf"));
    assert_eq!(std::fs::read(&destination).unwrap(), payload);
    assert_eq!(host.requests().len(), 1);
}

#[test]
fn interstitial_token_is_followed_once() {
    let page = r#"<!DOCTYPE html><html><form action="https://share.test/uc?id=1AbCdEf&amp;confirm=t_0k-9">
        Google Drive can't scan this file for viruses.</form></html>"#;
    let host = MockHost::with(vec![
        CannedResponse::html(page),
        CannedResponse::binary(dataset_zip()),
    ]);
    let temp = tempfile::tempdir().unwrap();

    let artifact = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap();

    assert!(artifact.verified);
    let requests = host.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], "https://share.test/uc?id=1AbCdEf&confirm=t_0k-9");
}

#[test]
fn interstitial_token_from_cookie() {
    let mut page = CannedResponse::html("<html><body>Virus scan warning</body></html>");
    page.cookies = vec![("download_warning_42".to_string(), "ck".to_string())];
    let host = MockHost::with(vec![page, CannedResponse::binary(dataset_zip())]);
    let temp = tempfile::tempdir().unwrap();

    VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap();

    assert!(host.requests()[1].ends_with("&confirm=ck"));
}

#[test]
fn interstitial_without_token_stops_after_one_request() {
    let host = MockHost::with(vec![
        CannedResponse::html("<html><body>You need access. Sign in.</body></html>"),
        CannedResponse::binary(dataset_zip()),
    ]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(err, OtfsError::ConfirmationTokenMissing { .. });
    assert_eq!(host.requests().len(), 1);
}

#[test]
fn second_layer_html_is_rejected() {
    let page = "<html><a href=\"?confirm=abc\">download</a></html>";
    let mut second = CannedResponse::binary(b"<!DOCTYPE html><html>still a page</html>".to_vec());
    second.content_type = Some("application/octet-stream".to_string());
    let host = MockHost::with(vec![CannedResponse::html(page), second]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(err, OtfsError::Verification(VerificationFailure::HtmlPayload));
    assert_eq!(host.requests().len(), 2);
}

#[test]
fn quota_page_is_reported_as_quota() {
    let host = MockHost::with(vec![CannedResponse::binary(
        b"<html><title>Google Drive - Quota exceeded</title></html>".to_vec(),
    )]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(err, OtfsError::Verification(VerificationFailure::QuotaExceeded));
}

#[test]
fn quota_interstitial_is_reported_as_quota() {
    let host = MockHost::with(vec![
        CannedResponse::html(
            "<html><title>Google Drive - Quota exceeded</title><body>Too many users have \
             viewed or downloaded this file recently.</body></html>",
        ),
        CannedResponse::binary(dataset_zip()),
    ]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(err, OtfsError::Verification(VerificationFailure::QuotaExceeded));
    assert_eq!(host.requests().len(), 1);
}

#[test]
fn empty_body_is_rejected() {
    let host = MockHost::with(vec![CannedResponse::binary(Vec::new())]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(err, OtfsError::EmptyDownload(_));
}

#[test]
fn corrupted_archive_is_rejected() {
    let mut payload = dataset_zip();
    payload.truncate(payload.len() - 30);
    let host = MockHost::with(vec![CannedResponse::binary(payload)]);
    let temp = tempfile::tempdir().unwrap();

    let err = VerifiedFetcher::new(&host)
        .fetch(&link(), &temp.path().join("dataset.zip"))
        .unwrap_err();

    assert_matches!(
        err,
        OtfsError::Verification(VerificationFailure::CorruptArchive(_))
    );
}
