#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let buyer = common::address(0x01);
    let seller = common::address(0x02);

    // 1. First run: open, deliver and confirm
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{}", common::HEADER.join(", ")).unwrap();
    writeln!(csv1, "open, {buyer}, , {seller}, 100.0, , , 10").unwrap();
    writeln!(csv1, "deliver, {seller}, 0, , , , , 20").unwrap();
    writeln!(csv1, "confirm, {buyer}, 0, , , , , 30").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("escrow-engine"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains(&format!("0,{buyer},{seller},100,2")));

    // 2. Second run: claim the stored transaction and open a new one
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{}", common::HEADER.join(", ")).unwrap();
    writeln!(csv2, "claim, {seller}, 0, , , , , 86430").unwrap();
    writeln!(csv2, "open, {buyer}, , {seller}, 50, , , ").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("escrow-engine"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // The mirror is rebuilt from storage and ids continue after the last one.
    assert!(stdout2.contains(&format!("0,{buyer},{seller},100,5")));
    assert!(stdout2.contains(&format!("1,{buyer},{seller},50,0")));

    // 3. Third run: the seller's ledger balance survived
    let mut csv3 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv3, "{}", common::HEADER.join(", ")).unwrap();

    let mut cmd3 = Command::new(cargo_bin!("escrow-engine"));
    cmd3.arg(csv3.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--balances");

    let output3 = cmd3.output().expect("Failed to execute command");
    assert!(output3.status.success());
    let stdout3 = String::from_utf8_lossy(&output3.stdout);
    assert!(stdout3.contains(&format!("{seller},100")));
}
