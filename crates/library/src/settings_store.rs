use rusqlite::params;

use crate::model::{LibrarySettings, SettingsPatch};
use crate::{Db, LibraryError};

pub const MIN_SCAN_DEPTH: i64 = 1;
pub const MAX_SCAN_DEPTH: i64 = 20;

/// Singleton settings row. The environment provides first-run defaults; once
/// the row is written it wins.
#[derive(Clone)]
pub struct SettingsStore {
    db: Db,
}

impl SettingsStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn get(&self) -> Result<LibrarySettings, LibraryError> {
        let conn = self.db.lock();
        let settings = conn.query_row(
            "SELECT library_path, scan_recursive, scan_max_depth, updated_at
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(LibrarySettings {
                    library_path: row.get(0)?,
                    scan_recursive: row.get(1)?,
                    scan_max_depth: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )?;
        Ok(settings)
    }

    pub fn apply_patch(
        &self,
        patch: &SettingsPatch,
        now: i64,
    ) -> Result<LibrarySettings, LibraryError> {
        let current = self.get()?;
        let next = LibrarySettings {
            library_path: patch
                .library_path
                .clone()
                .map(|value| value.trim().to_string())
                .unwrap_or(current.library_path),
            scan_recursive: patch.scan_recursive.unwrap_or(current.scan_recursive),
            scan_max_depth: patch
                .scan_max_depth
                .unwrap_or(current.scan_max_depth)
                .clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH),
            updated_at: now,
        };

        let conn = self.db.lock();
        conn.execute(
            "UPDATE settings SET library_path = ?1, scan_recursive = ?2,
                    scan_max_depth = ?3, updated_at = ?4
             WHERE id = 1",
            params![next.library_path, next.scan_recursive, next.scan_max_depth, now],
        )?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::SettingsPatch;
    use crate::{Db, SettingsStore};

    #[test]
    fn defaults_then_partial_patch() {
        let store = SettingsStore::new(Db::open_in_memory().unwrap());
        let initial = store.get().unwrap();
        assert_eq!(initial.library_path, "");
        assert!(initial.scan_recursive);
        assert_eq!(initial.scan_max_depth, 3);

        let patched = store
            .apply_patch(
                &SettingsPatch {
                    library_path: Some("/music".into()),
                    scan_recursive: None,
                    scan_max_depth: Some(5),
                },
                100,
            )
            .unwrap();
        assert_eq!(patched.library_path, "/music");
        assert!(patched.scan_recursive);
        assert_eq!(patched.scan_max_depth, 5);

        let reread = store.get().unwrap();
        assert_eq!(reread.library_path, "/music");
        assert_eq!(reread.updated_at, 100);
    }

    #[test]
    fn depth_is_clamped_to_valid_range() {
        let store = SettingsStore::new(Db::open_in_memory().unwrap());
        let patched = store
            .apply_patch(
                &SettingsPatch {
                    scan_max_depth: Some(99),
                    ..Default::default()
                },
                1,
            )
            .unwrap();
        assert_eq!(patched.scan_max_depth, 20);
    }
}
