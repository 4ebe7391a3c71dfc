use std::time::Duration;

use port_reach::cert::{check_expiry_with, CertCheckConfig};
use port_reach::Error;
use tokio::net::TcpListener;

const CERT_PEM: &[u8] = include_bytes!("fixtures/localhost.crt");
const KEY_PEM: &[u8] = include_bytes!("fixtures/localhost.key");
// notAfter of the fixture: Oct 13 23:29:27 2036 GMT
const FIXTURE_NOT_AFTER: i64 = 2_107_553_367;

async fn tls_server() -> u16 {
    let identity = native_tls::Identity::from_pkcs8(CERT_PEM, KEY_PEM).expect("fixture identity");
    let acceptor = tokio_native_tls::TlsAcceptor::from(
        native_tls::TlsAcceptor::new(identity).expect("acceptor"),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _ = acceptor.accept(stream).await;
        }
    });
    port
}

#[tokio::test]
async fn reads_expiry_over_tls() {
    let port = tls_server().await;
    let config = CertCheckConfig::default()
        .port(port)
        .accept_invalid_certs(true);

    let info = check_expiry_with("localhost", &config).await.unwrap();
    assert_eq!(info.hostname, "localhost");
    assert_eq!(info.not_after.unix_timestamp(), FIXTURE_NOT_AFTER);
    assert!(info.remaining() > ::time::Duration::days(365));
}

#[tokio::test]
async fn self_signed_rejected_when_verifying() {
    let port = tls_server().await;
    let config = CertCheckConfig::default().port(port);

    let err = check_expiry_with("localhost", &config).await.unwrap_err();
    assert!(matches!(err, Error::Tls { .. }), "got {err}");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        // Accept and then say nothing.
        if let Ok((stream, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        }
    });

    let config = CertCheckConfig::default()
        .port(port)
        .timeout(Duration::from_millis(200))
        .accept_invalid_certs(true);
    let err = check_expiry_with("localhost", &config).await.unwrap_err();
    assert!(matches!(err, Error::TlsTimeout { .. }), "got {err}");
}

#[tokio::test]
async fn refused_connection_is_tls_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = CertCheckConfig::default().port(port);
    let err = check_expiry_with("127.0.0.1", &config).await.unwrap_err();
    assert!(matches!(err, Error::Tls { .. }), "got {err}");
}

#[tokio::test]
async fn unresolvable_host_is_tls_error() {
    let err = check_expiry_with("no-such-host.invalid", &CertCheckConfig::default())
        .await
        .unwrap_err();
    // A slow resolver may hit the deadline first; both end the check.
    assert!(
        matches!(err, Error::Tls { .. } | Error::TlsTimeout { .. }),
        "got {err}"
    );
}
