use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use port_reach::progress::NoProgress;
use port_reach::scanner::{scan, scan_with_cancel, ScanCoordinator};
use port_reach::types::{ScanConfig, ScanStatus, ScanTarget};
use port_reach::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn closed_port() -> u16 {
    let (listener, port) = open_port().await;
    drop(listener);
    port
}

fn config(workers: usize) -> ScanConfig {
    ScanConfig::new(workers)
        .unwrap()
        .connect_timeout(Duration::from_millis(300))
        .scan_timeout(Duration::from_secs(10))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_listening_port_is_reported() {
    let (_listener, open) = open_port().await;
    let closed_a = closed_port().await;
    let closed_b = closed_port().await;

    for workers in 1..=3 {
        let target =
            ScanTarget::with_address("localhost", LOCALHOST, vec![closed_a, open, closed_b])
                .unwrap();
        let report = scan(&target, &config(workers)).await;
        assert_eq!(report.open_ports, vec![open], "workers = {workers}");
        assert!(report.is_complete());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scanned_count_matches_port_count() {
    let closed = closed_port().await;
    let (_l1, open1) = open_port().await;
    let (_l2, open2) = open_port().await;
    let mut ports = vec![closed; 37];
    ports.push(open2);
    ports.insert(5, open1);

    for workers in [1, 3, 7, 39, 50] {
        let target = ScanTarget::with_address("localhost", LOCALHOST, ports.clone()).unwrap();
        let report = scan(&target, &config(workers)).await;
        assert_eq!(report.scanned_done, ports.len() as u64, "workers = {workers}");
        assert_eq!(report.scanned_total, ports.len() as u64);

        let mut expected = vec![open1, open2];
        expected.sort_unstable();
        assert_eq!(report.open_ports, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_open_port_is_reported_once() {
    let (_listener, open) = open_port().await;
    let target = ScanTarget::with_address("localhost", LOCALHOST, vec![open, open, open]).unwrap();
    let report = scan(&target, &config(3)).await;
    assert_eq!(report.open_ports, vec![open]);
    assert_eq!(report.scanned_done, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_returns_partial_results() {
    let closed = closed_port().await;
    let ports = vec![closed; 20_000];
    let target = ScanTarget::with_address("localhost", LOCALHOST, ports).unwrap();
    let cfg = ScanConfig::new(1)
        .unwrap()
        .connect_timeout(Duration::from_millis(500))
        .scan_timeout(Duration::from_millis(20));

    let started = Instant::now();
    let report = scan(&target, &cfg).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(report.timed_out);
    assert!(!report.is_complete());
    assert!(report.scanned_done < report.scanned_total);
    assert!(report.open_ports.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verbose_scan_reports_every_port() {
    let (_listener, open) = open_port().await;
    let closed = closed_port().await;
    let ports = vec![open, closed, closed, closed, open];
    let target = ScanTarget::with_address("localhost", LOCALHOST, ports).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let max_scanned = Arc::new(AtomicU64::new(0));
    let sink = {
        let calls = calls.clone();
        let max_scanned = max_scanned.clone();
        move |status: ScanStatus| {
            calls.fetch_add(1, Ordering::Relaxed);
            max_scanned.fetch_max(status.scanned, Ordering::Relaxed);
            assert!(status.open <= 1);
        }
    };

    let coordinator = ScanCoordinator::new(target, config(2).verbose(true));
    let monitor = coordinator.monitor();
    let report = coordinator.run(Arc::new(sink)).await;

    // One initial snapshot plus one per port.
    assert_eq!(calls.load(Ordering::Relaxed), 6);
    assert_eq!(max_scanned.load(Ordering::Relaxed), 5);
    assert_eq!(monitor.status().scanned, 5);
    assert_eq!(monitor.status().open, 1);
    assert_eq!(report.open_ports, vec![open]);
}

#[tokio::test]
async fn quiet_scan_never_calls_progress() {
    let closed = closed_port().await;
    let target = ScanTarget::with_address("localhost", LOCALHOST, vec![closed, closed]).unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let sink = {
        let calls = calls.clone();
        move |_status: ScanStatus| {
            calls.fetch_add(1, Ordering::Relaxed);
        }
    };
    let report = ScanCoordinator::new(target, config(1))
        .run(Arc::new(sink))
        .await;
    assert_eq!(report.scanned_done, 2);
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn cancelled_scan_stops_early() {
    let closed = closed_port().await;
    let target = ScanTarget::with_address("localhost", LOCALHOST, vec![closed; 100]).unwrap();
    let coordinator = ScanCoordinator::new(target, config(4));
    coordinator.cancel_token().cancel();
    let report = coordinator.run(Arc::new(NoProgress)).await;
    assert!(report.cancelled);
    assert!(!report.timed_out);
    assert_eq!(report.scanned_done, 0);
}

#[tokio::test]
async fn scan_with_cancelled_token_returns_partial() {
    let closed = closed_port().await;
    let target = ScanTarget::with_address("localhost", LOCALHOST, vec![closed; 50]).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = scan_with_cancel(&target, &config(2), cancel).await;
    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.scanned_done, 0);
}

#[tokio::test]
async fn huge_worker_count_scans_in_one_chunk() {
    let (_listener, open) = open_port().await;
    let target = ScanTarget::with_address("localhost", LOCALHOST, vec![open]).unwrap();
    let report = scan(&target, &config(usize::MAX)).await;
    assert_eq!(report.open_ports, vec![open]);
    assert!(report.is_complete());
}

#[tokio::test]
async fn target_resolution() {
    let target = ScanTarget::resolve("localhost", vec![80]).await.unwrap();
    assert!(target.address().is_loopback());
    assert_eq!(target.hostname(), "localhost");

    let err = ScanTarget::resolve("localhost", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::EmptyPortList));

    let err = ScanTarget::resolve("no-such-host.invalid", vec![80])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Resolution { .. }));
}

#[test]
fn report_serializes_to_json() {
    let report = port_reach::types::ScanReport {
        hostname: "localhost".into(),
        address: LOCALHOST,
        started_at: "2026-01-01T00:00:00Z".into(),
        elapsed_ms: 12,
        scanned_total: 3,
        scanned_done: 3,
        open_ports: vec![22, 80],
        timed_out: false,
        cancelled: false,
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["address"], "127.0.0.1");
    assert_eq!(json["open_ports"], serde_json::json!([22, 80]));
}
