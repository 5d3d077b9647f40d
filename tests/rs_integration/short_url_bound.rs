use crate::common::{
    daemon_config, get_free_port, sample_auth_request, send_auth_request, spawn_daemon,
    start_mock_oidc, wait_for_listening, wait_for_socket,
};
use oidc_bridge_common::ResponseStatus;

#[tokio::test]
async fn oversized_short_url_is_rejected_before_writing_pending_file() {
    let http_port = get_free_port();
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("oidc-auth.sock");

    let mock = start_mock_oidc().await;
    let mut config = daemon_config(&mock.uri(), socket_path.clone(), http_port);
    // A redirect_uri whose base path alone pushes "WEB_AUTH::<url>\n" past the
    // 256-byte pending-file line limit once the `auth/<32-hex-state>` segment
    // is appended.
    config.oidc.redirect_uri = format!(
        "http://127.0.0.1:{http_port}/{}/callback",
        "a".repeat(240)
    );
    let _daemon = spawn_daemon(config, tmp.path());

    wait_for_listening(http_port, 5).await;
    wait_for_socket(&socket_path, 5).await;

    let req = sample_auth_request("alice", tmp.path());
    let pending_path = std::path::PathBuf::from(&req.auth_pending_file);
    let resp = send_auth_request(&socket_path, &req).await;

    assert_eq!(resp.status, ResponseStatus::Error);
    assert!(resp.error.unwrap().contains("256"));
    assert!(!pending_path.exists(), "pending file must not be written for a rejected flow");
}
