use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Extensions the scanner considers audio candidates. Everything else under
/// an artist directory is recorded as an unsupported-extension skip.
pub const AUDIO_EXTENSIONS: [&str; 9] = [
    "aac", "aiff", "alac", "flac", "m4a", "mp3", "ogg", "opus", "wav",
];

#[derive(Clone, Copy, Debug)]
pub struct WalkOptions {
    pub recursive: bool,
    pub max_depth: u32,
}

#[derive(Clone, Debug)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub ext: String,
    pub mtime: i64,
    pub size: u64,
    pub device: u64,
    pub inode: u64,
}

impl WalkedFile {
    /// Filesystem identity when the platform reports meaningful inodes;
    /// `None` sends the scanner down the content-hash fallback.
    pub fn inode_key(&self) -> Option<String> {
        if self.inode == 0 {
            None
        } else {
            Some(format!("{}:{}", self.device, self.inode))
        }
    }
}

/// Bounded-depth traversal of one artist directory. Every entry that does
/// not become a candidate is reported through `on_skip` with a raw reason;
/// the walker itself never fails.
pub fn collect_artist_tracks(
    artist_path: &Path,
    options: &WalkOptions,
    on_skip: &mut dyn FnMut(&Path, String),
) -> Vec<WalkedFile> {
    let mut files = Vec::new();
    walk_directory(artist_path, 0, options, on_skip, &mut files);
    files
}

fn walk_directory(
    dir: &Path,
    depth: u32,
    options: &WalkOptions,
    on_skip: &mut dyn FnMut(&Path, String),
    out: &mut Vec<WalkedFile>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            on_skip(dir, "unreadable-directory".to_string());
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    paths.sort();

    for path in paths {
        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden {
            on_skip(&path, "hidden-path".to_string());
            continue;
        }

        let lstat = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                on_skip(&path, format!("unreadable-path: {}", err));
                continue;
            }
        };
        let stat = if lstat.file_type().is_symlink() {
            match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(_) => {
                    on_skip(&path, "broken-symlink".to_string());
                    continue;
                }
            }
        } else {
            lstat
        };

        if stat.is_dir() {
            if !options.recursive {
                continue;
            }
            if depth + 1 > options.max_depth {
                on_skip(&path, format!("depth-exceeded:{}", options.max_depth));
                continue;
            }
            walk_directory(&path, depth + 1, options, on_skip, out);
        } else if stat.is_file() {
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                on_skip(&path, format!("unsupported-extension:{}", ext));
                continue;
            }
            let mtime = stat
                .modified()
                .ok()
                .and_then(|value| value.duration_since(UNIX_EPOCH).ok())
                .map(|value| value.as_millis() as i64)
                .unwrap_or(0);
            let (device, inode) = file_identity(&stat);
            out.push(WalkedFile {
                path,
                ext,
                mtime,
                size: stat.len(),
                device,
                inode,
            });
        } else {
            on_skip(&path, "unsupported-file-type".to_string());
        }
    }
}

#[cfg(unix)]
fn file_identity(meta: &fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn file_identity(_meta: &fs::Metadata) -> (u64, u64) {
    (0, 0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::{collect_artist_tracks, WalkOptions};

    fn walk(root: &Path, options: WalkOptions) -> (Vec<PathBuf>, HashMap<String, String>) {
        let mut skips = HashMap::new();
        let files = collect_artist_tracks(root, &options, &mut |path, reason| {
            skips.insert(path.to_string_lossy().to_string(), reason);
        });
        (files.into_iter().map(|file| file.path).collect(), skips)
    }

    #[test]
    fn non_recursive_visits_top_level_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/b.mp3"), b"x").unwrap();

        let (files, skips) = walk(
            dir.path(),
            WalkOptions {
                recursive: false,
                max_depth: 10,
            },
        );
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.mp3"));
        assert!(skips.is_empty());
    }

    #[test]
    fn depth_cap_records_skip_reason() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("one/two");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("c.flac"), b"x").unwrap();

        let (files, skips) = walk(
            dir.path(),
            WalkOptions {
                recursive: true,
                max_depth: 1,
            },
        );
        assert!(files.is_empty());
        let reason = skips
            .get(&dir.path().join("one/two").to_string_lossy().to_string())
            .unwrap();
        assert_eq!(reason, "depth-exceeded:1");
    }

    #[test]
    fn hidden_entries_and_foreign_extensions_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".hidden.mp3"), b"x").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"x").unwrap();
        fs::write(dir.path().join("song.opus"), b"x").unwrap();

        let (files, skips) = walk(
            dir.path(),
            WalkOptions {
                recursive: true,
                max_depth: 3,
            },
        );
        assert_eq!(files.len(), 1);
        assert_eq!(
            skips
                .get(&dir.path().join(".hidden.mp3").to_string_lossy().to_string())
                .unwrap(),
            "hidden-path"
        );
        assert_eq!(
            skips
                .get(&dir.path().join("cover.jpg").to_string_lossy().to_string())
                .unwrap(),
            "unsupported-extension:jpg"
        );
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlinks_are_reported() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.mp3"), dir.path().join("link.mp3"))
            .unwrap();

        let (files, skips) = walk(
            dir.path(),
            WalkOptions {
                recursive: true,
                max_depth: 3,
            },
        );
        assert!(files.is_empty());
        assert_eq!(
            skips
                .get(&dir.path().join("link.mp3").to_string_lossy().to_string())
                .unwrap(),
            "broken-symlink"
        );
    }

    #[cfg(unix)]
    #[test]
    fn files_carry_inode_identity() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        let files = collect_artist_tracks(
            dir.path(),
            &WalkOptions {
                recursive: false,
                max_depth: 1,
            },
            &mut |_, _| {},
        );
        assert_eq!(files.len(), 1);
        assert!(files[0].inode_key().is_some());
    }
}
