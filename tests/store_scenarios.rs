use optstore::db::Value;
use optstore::options::KEY_OPTION;
use optstore::{Bootstrap, OptionsStore, Outcome};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> OptionsStore {
    OptionsStore::open(dir.path().join("options.db")).unwrap()
}

#[test]
fn test_fresh_store_gets_a_stable_key() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let key = store.get(KEY_OPTION, None).unwrap().unwrap();
    assert_eq!(key.len(), 32);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

    assert_eq!(
        store.create_options_table().unwrap(),
        Bootstrap::AlreadyPresent
    );
    assert_eq!(store.get(KEY_OPTION, None).unwrap(), Some(key));
}

#[test]
fn test_plain_upsert_flow() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    assert_eq!(store.update("theme", "dark").unwrap(), Outcome::Inserted);
    assert_eq!(store.get("theme", None).unwrap().as_deref(), Some("dark"));
    assert_eq!(store.update("theme", "light").unwrap(), Outcome::Updated);
    assert_eq!(store.get("theme", None).unwrap().as_deref(), Some("light"));
}

#[test]
fn test_encrypted_flow_hides_raw_rows() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    assert_eq!(
        store.update_encrypted("secret", "s3cr3t").unwrap(),
        Outcome::Inserted
    );

    let rows = store
        .database()
        .query("SELECT option_name, option_value FROM options", [])
        .unwrap();
    for row in rows.rows() {
        for cell in row {
            if let Value::Text(text) = cell {
                assert!(!text.contains("secret"));
                assert!(!text.contains("s3cr3t"));
            }
        }
    }

    assert_eq!(
        store.get_encrypted("secret", None).unwrap().as_deref(),
        Some("s3cr3t")
    );
}

#[test]
fn test_encrypted_delete_flow() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    assert_eq!(
        store.delete_encrypted("absentKey").unwrap(),
        Outcome::NotFound
    );
    store.update_encrypted("secret", "s3cr3t").unwrap();
    assert_eq!(store.delete_encrypted("secret").unwrap(), Outcome::Deleted);
    assert_eq!(
        store.get_encrypted("secret", Some("none")).unwrap().as_deref(),
        Some("none")
    );
}

#[test]
fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = open_store(&dir);
        store.update("theme", "dark").unwrap();
        store.update_encrypted("token", "t0k3n").unwrap();
        store.close().unwrap();
    }

    let mut store = open_store(&dir);
    assert_eq!(store.get("theme", None).unwrap().as_deref(), Some("dark"));
    assert_eq!(
        store.get_encrypted("token", None).unwrap().as_deref(),
        Some("t0k3n")
    );
}
