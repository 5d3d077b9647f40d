//! The periodic sweeper's own write-on-timeout behavior is covered directly
//! in `daemon::session::sweeper`'s unit tests (it runs on a fixed 60-second
//! interval, too slow to exercise end-to-end here). This test covers the
//! other half of "expired sessions are unreachable": once a session's
//! deadline passes, the short-URL redirect stops resolving even before the
//! sweeper gets around to reaping it.

use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::time::{sleep, Duration};

use crate::common::{
    daemon_config, get_free_port, sample_auth_request, send_auth_request, spawn_daemon,
    start_mock_oidc, wait_for_listening, wait_for_socket,
};

#[tokio::test]
async fn short_url_stops_resolving_once_session_expires() {
    let http_port = get_free_port();
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("oidc-auth.sock");

    let mock = start_mock_oidc().await;
    let mut config = daemon_config(&mock.uri(), socket_path.clone(), http_port);
    config.session_timeout_secs = 1;
    let _daemon = spawn_daemon(config, tmp.path());

    wait_for_listening(http_port, 5).await;
    wait_for_socket(&socket_path, 5).await;

    let req = sample_auth_request("alice", tmp.path());
    let resp = send_auth_request(&socket_path, &req).await;
    let short_url = resp.auth_url.unwrap();

    let client = Client::builder().redirect(Policy::none()).build().unwrap();
    let fresh = client.get(&short_url).send().await.unwrap();
    assert!(fresh.status().is_redirection());

    sleep(Duration::from_millis(1_500)).await;

    let stale = client.get(&short_url).send().await.unwrap();
    assert_eq!(stale.status(), reqwest::StatusCode::BAD_REQUEST);
}
