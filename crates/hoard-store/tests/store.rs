use hoard_store::{Store, StoreConfig, StoreError, ENTRY_HEADER_LEN};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const TEST_CACHE_KEY: &str = "GETlocalhost:8080/test/path";
const LONG_TTL: Duration = Duration::from_secs(3600);

fn open_store(dir: &TempDir) -> Store {
    // Long interval: these tests drive expiry themselves.
    Store::open(dir.path(), Duration::from_secs(3600)).unwrap()
}

#[test]
fn set_then_get_round_trips() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    assert!(store.get(TEST_CACHE_KEY).is_none(), "unexpected cache content");

    let content = b"some random cache content that should be exact";
    store.set(TEST_CACHE_KEY, content, LONG_TTL).unwrap();

    assert_eq!(store.get(TEST_CACHE_KEY).as_deref(), Some(content.as_slice()));
    assert!(store.lock_registry().is_empty());
}

#[test]
fn empty_payload_round_trips() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    store.set("empty", b"", LONG_TTL).unwrap();
    assert_eq!(store.get("empty"), Some(Vec::new()));
}

#[test]
fn get_of_unknown_key_is_a_miss() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    assert_eq!(store.get("never-set"), None);
}

#[test]
fn entries_are_written_at_the_shard_path() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    store.set(TEST_CACHE_KEY, b"body", LONG_TTL).unwrap();

    let expected = tmp
        .path()
        .join("b5/a0/cf/fc/GETlocalhost_8080-test-path");
    assert_eq!(store.entry_path(TEST_CACHE_KEY), expected);

    let bytes = std::fs::read(&expected).unwrap();
    assert_eq!(bytes.len(), ENTRY_HEADER_LEN + 4);
    assert_eq!(&bytes[ENTRY_HEADER_LEN..], b"body");
    let expires_at = u64::from_le_bytes(bytes[..ENTRY_HEADER_LEN].try_into().unwrap());
    assert!(expires_at > hoard_store::now_secs());
}

#[test]
fn expired_entry_is_a_miss_and_is_removed() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    store.set("short-lived", b"value", Duration::from_secs(1)).unwrap();
    let path = store.entry_path("short-lived");
    assert!(path.is_file());

    std::thread::sleep(Duration::from_millis(1500));

    assert_eq!(store.get("short-lived"), None);
    assert!(!path.exists(), "expired entry should be deleted on read");
}

#[test]
fn overwrite_with_shorter_payload_leaves_no_residue() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    store
        .set("key", b"a much longer first payload", LONG_TTL)
        .unwrap();
    store.set("key", b"short", LONG_TTL).unwrap();

    assert_eq!(store.get("key").as_deref(), Some(b"short".as_slice()));
    let len = std::fs::metadata(store.entry_path("key")).unwrap().len();
    assert_eq!(len, (ENTRY_HEADER_LEN + 5) as u64);
}

#[test]
fn truncated_entry_is_a_miss() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    store.set("key", b"value", LONG_TTL).unwrap();
    let path = store.entry_path("key");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    assert_eq!(store.get("key"), None);

    // A later write heals the entry.
    store.set("key", b"value", LONG_TTL).unwrap();
    assert_eq!(store.get("key").as_deref(), Some(b"value".as_slice()));
}

#[test]
fn directory_at_entry_path_is_a_miss() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    std::fs::create_dir_all(store.entry_path("dir-key")).unwrap();
    assert_eq!(store.get("dir-key"), None);
    assert!(store.set("dir-key", b"value", LONG_TTL).is_err());
}

#[test]
fn set_propagates_filesystem_errors() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    // Occupy the first shard level with a regular file so the directory chain
    // cannot be created.
    let first_level = tmp.path().join("b5");
    std::fs::write(&first_level, b"not a directory").unwrap();

    let err = store.set(TEST_CACHE_KEY, b"value", LONG_TTL).unwrap_err();
    assert!(matches!(err, StoreError::Io(_)), "unexpected error: {err}");
    assert!(store.lock_registry().is_empty());
}

#[test]
fn keys_with_separators_stay_inside_the_shard_tree() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);

    for key in ["../../escape", "..", ".", "", "a/b/c", "host:1/x"] {
        store.set(key, key.as_bytes(), LONG_TTL).unwrap();
        let path = store.entry_path(key);
        assert!(path.starts_with(tmp.path()));
        assert!(path.is_file(), "key {key:?} did not produce a file");
        assert_eq!(store.get(key).as_deref(), Some(key.as_bytes()));
    }
}

#[test]
fn open_rejects_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("foo/bar");
    let err = Store::open(&missing, Duration::from_secs(60)).unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidBasePath { ref path, .. } if path == &missing),
        "unexpected error: {err}"
    );
}

#[test]
fn open_rejects_regular_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("file");
    std::fs::write(&file, b"").unwrap();
    let err = Store::open(&file, Duration::from_secs(60)).unwrap_err();
    assert!(matches!(err, StoreError::NotADirectory { .. }), "unexpected error: {err}");
}

#[test]
fn open_rejects_zero_vacuum_interval() {
    let tmp = TempDir::new().unwrap();
    let err = Store::open(tmp.path(), Duration::ZERO).unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidVacuumInterval { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn from_config_validates_before_opening() {
    let tmp = TempDir::new().unwrap();

    let config = StoreConfig {
        path: tmp.path().to_path_buf(),
        vacuum_interval_secs: 1,
    };
    assert!(matches!(
        Store::from_config(&config),
        Err(StoreError::InvalidVacuumInterval { .. })
    ));

    let config = StoreConfig {
        path: tmp.path().to_path_buf(),
        vacuum_interval_secs: 600,
    };
    let store = Store::from_config(&config).unwrap();
    assert_eq!(store.root(), tmp.path());
}

#[test]
fn get_and_set_work_after_shutdown() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.shutdown();
    store.shutdown();

    store.set("key", b"value", LONG_TTL).unwrap();
    assert_eq!(store.get("key").as_deref(), Some(b"value".as_slice()));
}

#[cfg(unix)]
#[test]
fn entries_are_private_to_the_owner() {
    use std::os::unix::fs::PermissionsExt as _;

    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp);
    store.set("key", b"value", LONG_TTL).unwrap();

    let path = store.entry_path("key");
    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode & 0o077, 0, "file mode {file_mode:o}");

    let shard_dir: &Path = path.parent().unwrap();
    let dir_mode = std::fs::metadata(shard_dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode & 0o077, 0, "dir mode {dir_mode:o}");
}
