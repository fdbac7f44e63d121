#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/cxcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket did not appear");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_receiver(sock_path: &Path, out_dir: &Path, count: u64) -> Child {
    Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("receive")
        .arg(sock_path)
        .arg("--out-dir")
        .arg(out_dir)
        .arg("--count")
        .arg(count.to_string())
        .arg("--idle-timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("receive command should start")
}

#[test]
fn send_and_receive_file() {
    let dir = unique_temp_dir("xfer");
    let sock_path = dir.join("recv.sock");
    let out_dir = dir.join("out");
    let source = dir.join("source.bin");
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 241) as u8).collect();
    std::fs::write(&source, &payload).unwrap();

    let receiver = spawn_receiver(&sock_path, &out_dir, 1);
    wait_for_socket(&sock_path, Duration::from_secs(5));

    let sent = Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock_path)
        .arg(&source)
        .arg("--label")
        .arg("copy.bin")
        .output()
        .expect("send should run");
    assert!(
        sent.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&sent.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&sent.stdout).expect("send should emit json");
    assert_eq!(report["event"], "transfer-sent");
    assert_eq!(report["total_bytes"], 200_000);
    assert_eq!(report["chunks"], 4);

    let received = receiver.wait_with_output().expect("receiver should exit");
    assert!(received.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&received.stdout).expect("receive should emit json");
    assert_eq!(report["event"], "payload-received");
    assert_eq!(report["label"], "copy.bin");

    assert_eq!(std::fs::read(out_dir.join("copy.bin")).unwrap(), payload);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_empty_file() {
    let dir = unique_temp_dir("empty");
    let sock_path = dir.join("recv.sock");
    let out_dir = dir.join("out");
    let source = dir.join("empty.txt");
    std::fs::write(&source, b"").unwrap();

    let receiver = spawn_receiver(&sock_path, &out_dir, 1);
    wait_for_socket(&sock_path, Duration::from_secs(5));

    let status = Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("--log-level")
        .arg("error")
        .arg("send")
        .arg(&sock_path)
        .arg(&source)
        .stdout(Stdio::null())
        .status()
        .expect("send should run");
    assert!(status.success());

    let received = receiver.wait_with_output().expect("receiver should exit");
    assert!(received.status.success());
    let written = std::fs::read(out_dir.join("empty.txt")).unwrap();
    assert!(written.is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

fn send_file(sock_path: &Path, source: &Path, label: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("--log-level")
        .arg("error")
        .arg("send")
        .arg(sock_path)
        .arg(source)
        .arg("--label")
        .arg(label)
        .arg("--idle-timeout")
        .arg("5s")
        .output()
        .expect("send should run")
}

#[test]
fn rejected_label_fails_sender_and_receiver_keeps_running() {
    let dir = unique_temp_dir("label");
    let sock_path = dir.join("recv.sock");
    let out_dir = dir.join("out");
    let source = dir.join("data.bin");
    std::fs::write(&source, b"abc").unwrap();

    let receiver = spawn_receiver(&sock_path, &out_dir, 1);
    wait_for_socket(&sock_path, Duration::from_secs(5));

    let rejected = send_file(&sock_path, &source, "..");
    assert_eq!(rejected.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&rejected.stderr);
    assert!(
        stderr.contains("receiver did not confirm delivery"),
        "stderr: {stderr}"
    );
    assert!(rejected.stdout.is_empty());

    let accepted = send_file(&sock_path, &source, "kept.bin");
    assert!(
        accepted.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&accepted.stderr)
    );

    let received = receiver.wait_with_output().expect("receiver should exit");
    assert!(received.status.success());
    assert_eq!(std::fs::read(out_dir.join("kept.bin")).unwrap(), b"abc");
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let source = dir.join("data.bin");
    std::fs::write(&source, b"abc").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .arg(&source)
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_missing_file_fails_before_connecting() {
    let dir = unique_temp_dir("nofile");
    let output = Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .arg(dir.join("absent.bin"))
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed reading"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_chanxfer"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("chanxfer {}", env!("CARGO_PKG_VERSION"))
    );
}
