use reqwest::redirect::Policy;
use reqwest::Client;

use crate::common::{
    base_claims, daemon_config, get_free_port, mount_token_response, nonce_from_redirect_location,
    read_verdict, sample_auth_request, send_auth_request, spawn_daemon, start_mock_oidc,
    state_from_redirect_location, wait_for_listening, wait_for_socket,
};

#[tokio::test]
async fn mismatched_username_is_rejected() {
    let http_port = get_free_port();
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("oidc-auth.sock");

    let mock = start_mock_oidc().await;
    let config = daemon_config(&mock.uri(), socket_path.clone(), http_port);
    let _daemon = spawn_daemon(config, tmp.path());

    wait_for_listening(http_port, 5).await;
    wait_for_socket(&socket_path, 5).await;

    let req = sample_auth_request("alice", tmp.path());
    let control_path = std::path::PathBuf::from(&req.auth_control_file);
    let reason_path = std::path::PathBuf::from(&req.auth_failed_reason_file);
    let resp = send_auth_request(&socket_path, &req).await;
    let short_url = resp.auth_url.unwrap();

    let client = Client::builder().redirect(Policy::none()).build().unwrap();
    let redirect = client.get(&short_url).send().await.unwrap();
    let location = redirect
        .headers()
        .get(reqwest::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    let oidc_state = state_from_redirect_location(&location);
    let nonce = nonce_from_redirect_location(&location);

    // Token claims belong to "mallory" but the VPN connection was for "alice".
    let mut claims = base_claims(&mock.uri(), "mallory");
    claims["nonce"] = serde_json::json!(nonce);
    mount_token_response(&mock, claims).await;

    let callback_url = format!("http://127.0.0.1:{http_port}/callback?code=test-code&state={oidc_state}");
    let callback_resp = client.get(&callback_url).send().await.unwrap();
    assert_eq!(callback_resp.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_eq!(read_verdict(&control_path).await, b"0");
    let reason = std::fs::read_to_string(&reason_path).unwrap();
    assert!(reason.contains("username mismatch"), "unexpected reason: {reason}");
}
