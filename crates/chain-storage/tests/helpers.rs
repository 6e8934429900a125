use std::fs;

use chain_storage::SledKv;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledKv) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledKv::open(db_path.to_str().unwrap()).expect("Failed to open SledKv"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledKv) {
    let db_path = temp_dir.path().to_path_buf();
    store.close().expect("Failed to flush the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}
