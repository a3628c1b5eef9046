use sync_fs::{NormalizedPath, io};
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("state/definitions.toml"));

    io::write_atomic(&path, b"version = \"1.0\"").unwrap();

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "version = \"1.0\"");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("problems.toml");
    fs::write(&file_path, "original").unwrap();

    let path = NormalizedPath::new(&file_path);
    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("artefacts.toml"));

    io::write_atomic(&path, b"a").unwrap();
    io::write_atomic(&path, b"b").unwrap();

    let entries: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["artefacts.toml".to_string()]);
}

#[test]
fn test_read_locked_existing_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("definitions.toml");
    fs::write(&file_path, "hello").unwrap();

    let content = io::read_locked(&NormalizedPath::new(&file_path)).unwrap();
    assert_eq!(content, b"hello");
}

#[test]
fn test_read_locked_nonexistent_file() {
    let result = io::read_locked(&NormalizedPath::new("/nonexistent/definitions.toml"));
    assert!(matches!(result, Err(sync_fs::Error::Io { .. })));
}

#[test]
fn test_concurrent_writes_do_not_interleave() {
    let dir = TempDir::new().unwrap();
    let path = Arc::new(NormalizedPath::new(dir.path().join("concurrent.toml")));
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    let content = format!("thread{}:write{}\n", thread_id, i);
                    // Contended writes may fail on some platforms; corruption may not
                    let _ = io::write_atomic(&path, content.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert!(content.starts_with("thread"));
    assert_eq!(content.matches("thread").count(), 1);
}
