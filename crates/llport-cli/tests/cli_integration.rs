#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f\
                       202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f";

fn llport() -> Command {
    let mut cmd = Command::cargo_bin("llport").unwrap();
    cmd.env_remove("LLPORT_CONFIG")
        .env_remove("LLPORT_KEY_HEX")
        .env_remove("LLPORT_DECRYPT_WORKERS")
        .env_remove("LLPORT_DECRYPT_QUEUE_DEPTH");
    cmd
}

#[test]
fn test_fid_json() {
    llport()
        .args(["fid", "[0x200000400:0x1:0x0]", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ino32\": 4194305"))
        .stdout(predicate::str::contains("\"kind\": \"normal\""))
        .stdout(predicate::str::contains("\"sane\": true"));
}

#[test]
fn test_fid_rejects_garbage() {
    llport().args(["fid", "nonsense"]).assert().code(2);
}

#[test]
fn test_encode_then_decode() {
    let output = llport()
        .args(["encode", "0x200000400:0x1:0x0", "0x200000007:0x1:0x0"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("type 0x97"));
    let handle = lines.next().unwrap().to_string();
    assert_eq!(
        handle,
        "0004000002000000010000000000000007000000020000000100000000000000"
    );

    llport()
        .args(["decode", &handle])
        .assert()
        .success()
        .stdout(predicate::str::contains("child  [0x200000400:0x1:0x0]"))
        .stdout(predicate::str::contains("parent [0x200000007:0x1:0x0]"));
}

#[test]
fn test_decode_foreign_type() {
    let handle = "00".repeat(32);
    llport()
        .args(["decode", &handle, "--type", "1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unrecognized file handle"));
}

#[test]
fn test_zero_then_read() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("disk.img");

    llport()
        .arg("zero")
        .arg(&image)
        .args(["--lblk", "3", "--pblk", "1", "--len", "2", "--key-hex", KEY_HEX])
        .assert()
        .success();

    let raw = std::fs::read(&image).unwrap();
    assert_eq!(raw.len(), 3 * 4096);
    assert!(raw[..4096].iter().all(|&b| b == 0));
    assert!(raw[4096..].iter().any(|&b| b != 0));

    let zero_line = "00".repeat(4096);
    llport()
        .arg("read")
        .arg(&image)
        .args(["--lblk", "3", "--pblk", "1", "--len", "2", "--hex", "--key-hex", KEY_HEX])
        .assert()
        .success()
        .stdout(predicate::eq(format!("{zero_line}\n{zero_line}\n")));
}

#[test]
fn test_config_block_size() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("disk.img");
    let config = dir.path().join("llport.toml");
    std::fs::write(&config, "[crypt]\nblock_bits = 10\n").unwrap();

    llport()
        .arg("--config")
        .arg(&config)
        .arg("zero")
        .arg(&image)
        .args(["--lblk", "0", "--pblk", "2", "--len", "1", "--key-hex", KEY_HEX])
        .assert()
        .success();

    assert_eq!(std::fs::metadata(&image).unwrap().len(), 3 * 1024);
}

#[test]
fn test_short_key_rejected() {
    let dir = TempDir::new().unwrap();
    llport()
        .arg("zero")
        .arg(dir.path().join("disk.img"))
        .args(["--lblk", "0", "--pblk", "0", "--len", "1", "--key-hex", "abcd"])
        .assert()
        .code(2);
}
