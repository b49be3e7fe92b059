//! Without `--dry-run`, gauges are sent to statsd over UDP.

use assert_cmd::Command;
use std::net::UdpSocket;
use std::time::Duration;

#[allow(deprecated)]
#[test]
fn check_sends_every_gauge_to_statsd() {
    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    let snapshot_dir = format!("{}/tests/fixtures/snapshots", env!("CARGO_MANIFEST_DIR"));

    let mut cmd = Command::cargo_bin("rck").unwrap();
    cmd.env("RUST_LOG", "warn").args([
        "check",
        "--snapshot-dir",
        &snapshot_dir,
        "--statsd-host",
        "127.0.0.1",
        "--statsd-port",
        &port,
    ]);
    cmd.assert().success();

    let mut lines = Vec::new();
    let mut buf = [0u8; 1024];
    for _ in 0..12 {
        let n = listener.recv(&mut buf).unwrap();
        lines.push(String::from_utf8_lossy(&buf[..n]).into_owned());
    }

    for expected in [
        "aws.ec2.unused_reservations:2|g",
        "aws.ec2.unreserved_instances:2|g",
        "aws.rds.qty_running_instances:3|g",
        "aws.elasticache.qty_reserved_instances:2|g",
    ] {
        assert!(
            lines.iter().any(|l| l == expected),
            "missing {expected} in {lines:?}"
        );
    }
}

/// Nothing listens on the statsd port: sends may be refused, but every
/// category is still reconciled and printed.
#[allow(deprecated)]
#[test]
fn refused_statsd_port_still_prints_every_category() {
    let port = {
        let freed = UdpSocket::bind("127.0.0.1:0").unwrap();
        freed.local_addr().unwrap().port().to_string()
    };
    let snapshot_dir = format!("{}/tests/fixtures/snapshots", env!("CARGO_MANIFEST_DIR"));

    let mut cmd = Command::cargo_bin("rck").unwrap();
    cmd.env("RUST_LOG", "error").args([
        "check",
        "--snapshot-dir",
        &snapshot_dir,
        "--statsd-host",
        "127.0.0.1",
        "--statsd-port",
        &port,
    ]);
    let out = cmd.output().unwrap();
    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);

    for expected in [
        "aws.ec2.unused_reservations=2\n",
        "aws.ec2.qty_reserved_instances=4\n",
        "aws.rds.unused_reservations=1\n",
        "aws.rds.unreserved_instances=1\n",
        "aws.elasticache.qty_running_instances=2\n",
        "aws.elasticache.qty_reserved_instances=2\n",
    ] {
        assert!(stdout.contains(expected), "missing {expected:?} in:\n{stdout}");
    }
    assert!(!stdout.contains("category_failed"), "{stdout}");

    if !out.status.success() {
        assert!(stderr.contains("CHECK_INCOMPLETE"), "{stderr}");
        assert!(stdout.contains("metrics_failed="), "{stdout}");
    }
}
