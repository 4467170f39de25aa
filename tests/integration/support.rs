use holocene::{Database, Holocene, Identifier, Resource};
use parking_lot::Mutex;
use std::path::Path;
use tempfile::TempDir;

/// Serializes tests that rewrite process-wide environment variables.
static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Run `f` with XDG and HOLOCENE variables pointing into `temp`.
pub fn with_xdg_env<F: FnOnce()>(temp: &TempDir, f: F) {
    let _guard = ENV_LOCK.lock();
    let saved: Vec<(&str, Option<String>)> = ["XDG_CONFIG_HOME", "XDG_DATA_HOME", "HOLOCENE__STORAGE__DATADIR"]
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect();

    std::env::set_var("XDG_CONFIG_HOME", temp.path().join("config"));
    std::env::set_var("XDG_DATA_HOME", temp.path().join("data"));
    std::env::remove_var("HOLOCENE__STORAGE__DATADIR");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    if let Err(panic) = result {
        std::panic::resume_unwind(panic);
    }
}

/// Fresh data directory with one database and one resource.
pub fn fixture(datadir: &Path) -> (Holocene, Database, Resource) {
    let holo = Holocene::new(datadir);
    let db = holo.create_db(Some(Identifier::random())).unwrap();
    let resource = db.create_resource(None).unwrap();
    (holo, db, resource)
}
