use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use common::{normalize_title, now_millis, sha1_hex, short_sha1, slugify};
use library::{FileIndexEntry, LibraryError, LibraryStore};
use metadata::TagInfo;

use crate::walker::{collect_artist_tracks, WalkOptions, WalkedFile};

/// Progress rows are written at artist boundaries and every this many files.
const PROGRESS_EVERY: usize = 25;
const HASH_SAMPLE_BYTES: usize = 1024 * 1024;
const FILE_HASH_HEX_LEN: usize = 16;
const VIRTUAL_DIR: &str = ".crate";

/// Single-flight guard plus the cancellation flag the running job polls at
/// its checkpoints. Constructed once at service start and cloned into
/// handlers; never a global.
#[derive(Clone, Default)]
pub struct ScanController {
    inner: Arc<ControllerInner>,
}

#[derive(Default)]
struct ControllerInner {
    running: Mutex<bool>,
    cancel: AtomicBool,
}

impl ScanController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the scan slot. Returns false when a scan is already in flight.
    pub fn try_begin(&self) -> bool {
        let mut running = self.inner.running.lock();
        if *running {
            return false;
        }
        *running = true;
        self.inner.cancel.store(false, Ordering::SeqCst);
        true
    }

    pub fn finish(&self) {
        *self.inner.running.lock() = false;
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.lock()
    }

    /// Flags the running scan for cancellation; returns whether one was
    /// actually running.
    pub fn request_cancel(&self) -> bool {
        let running = self.inner.running.lock();
        if *running {
            self.inner.cancel.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub recursive: bool,
    pub max_depth: u32,
    pub artist_id: Option<i64>,
}

#[derive(Clone)]
pub struct ScanDeps {
    pub library: LibraryStore,
    pub controller: ScanController,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub cancelled: bool,
    pub scanned_files: i64,
    pub skipped_files: i64,
    pub artists_seen: i64,
    pub albums_seen: i64,
    pub tracks_seen: i64,
    pub skipped_reasons: BTreeMap<String, i64>,
}

#[derive(Debug)]
pub enum ScanError {
    Setup(String),
    Library(LibraryError),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Setup(message) => write!(f, "{}", message),
            ScanError::Library(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<LibraryError> for ScanError {
    fn from(err: LibraryError) -> Self {
        ScanError::Library(err)
    }
}

/// Launches the scan job in the background. The caller must have claimed the
/// controller slot already; the slot is released when the job ends, however
/// it ends.
pub fn spawn_scan(deps: ScanDeps, options: ScanOptions) {
    let controller = deps.controller.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || run_scan(&deps, &options)).await;
        match result {
            Ok(Ok(outcome)) => {
                info!(
                    "scan finished ({}): {} artists, {} albums, {} tracks, {} skipped",
                    if outcome.cancelled { "cancelled" } else { "complete" },
                    outcome.artists_seen,
                    outcome.albums_seen,
                    outcome.tracks_seen,
                    outcome.skipped_files
                );
            }
            Ok(Err(err)) => warn!("scan failed: {}", err),
            Err(err) => warn!("scan task join error: {}", err),
        }
        controller.finish();
    });
}

/// One scan run, start to finish: bookkeeping reset, artist loop, and for
/// uncancelled full-library runs the soft-delete sweep and cache prune.
pub fn run_scan(deps: &ScanDeps, options: &ScanOptions) -> Result<ScanOutcome, ScanError> {
    let started_at = now_millis();
    deps.library.begin_scan(started_at)?;

    match scan_all_artists(deps, options, started_at) {
        Ok(outcome) => {
            if !outcome.cancelled && options.artist_id.is_none() {
                let (artists, albums, tracks) = deps.library.soft_delete_missing(started_at)?;
                if artists + albums + tracks > 0 {
                    info!(
                        "sweep soft-deleted {} artists, {} albums, {} tracks",
                        artists, albums, tracks
                    );
                }
                deps.library.prune_file_index(started_at)?;
            }
            let status = if outcome.cancelled { "cancelled" } else { "idle" };
            deps.library
                .finish_scan(status, now_millis(), &outcome.skipped_reasons, None)?;
            Ok(outcome)
        }
        Err(err) => {
            let _ = deps.library.finish_scan(
                "error",
                now_millis(),
                &BTreeMap::new(),
                Some(&err.to_string()),
            );
            Err(err)
        }
    }
}

fn scan_all_artists(
    deps: &ScanDeps,
    options: &ScanOptions,
    started_at: i64,
) -> Result<ScanOutcome, ScanError> {
    if !options.root.is_dir() {
        return Err(ScanError::Setup(format!(
            "library root {} is not a directory",
            options.root.display()
        )));
    }

    let target_name = match options.artist_id {
        Some(artist_id) => {
            let artist = deps
                .library
                .get_artist(artist_id)?
                .ok_or_else(|| ScanError::Setup(format!("artist {} not found", artist_id)))?;
            Some(artist.name)
        }
        None => None,
    };

    let mut progress = Progress::new(started_at);
    let mut artist_dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&options.root).map_err(|err| {
        ScanError::Setup(format!("cannot read library root: {}", err))
    })? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                progress.record_skip(
                    deps,
                    &options.root,
                    format!("unreadable-path: {}", err),
                )?;
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            progress.record_skip(deps, &path, "hidden-path".to_string())?;
            continue;
        }
        if path.is_dir() {
            artist_dirs.push((name, path));
        }
    }
    artist_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(target) = &target_name {
        artist_dirs.retain(|(name, _)| name == target);
        if artist_dirs.is_empty() {
            return Err(ScanError::Setup(format!(
                "no directory named '{}' under {}",
                target,
                options.root.display()
            )));
        }
    }

    let mut cancelled = false;
    for (name, path) in artist_dirs {
        if deps.controller.is_cancelled() {
            cancelled = true;
            break;
        }
        scan_artist(deps, options, started_at, &name, &path, &mut progress)?;
        progress.flush(deps, Some(&path.to_string_lossy()))?;
        if deps.controller.is_cancelled() {
            cancelled = true;
            break;
        }
    }

    progress.flush(deps, None)?;
    Ok(progress.into_outcome(cancelled))
}

fn scan_artist(
    deps: &ScanDeps,
    options: &ScanOptions,
    started_at: i64,
    artist_name: &str,
    artist_path: &Path,
    progress: &mut Progress,
) -> Result<(), ScanError> {
    let artist = deps.library.upsert_artist(artist_name, started_at)?;
    progress.artists_seen += 1;
    progress.flush(deps, Some(&artist_path.to_string_lossy()))?;

    let walk_options = WalkOptions {
        recursive: options.recursive,
        max_depth: options.max_depth,
    };
    let mut walk_skips: Vec<(PathBuf, String)> = Vec::new();
    let files = collect_artist_tracks(artist_path, &walk_options, &mut |path, reason| {
        walk_skips.push((path.to_path_buf(), reason));
    });
    for (path, reason) in walk_skips {
        progress.record_skip(deps, &path, reason)?;
    }

    let normalized_folder_artist = normalize_title(artist_name);
    let mut groups: BTreeMap<String, AlbumGroup> = BTreeMap::new();

    for (index, file) in files.iter().enumerate() {
        if deps.controller.is_cancelled() {
            return Ok(());
        }
        if index % PROGRESS_EVERY == 0 && index > 0 {
            progress.flush(deps, Some(&file.path.to_string_lossy()))?;
        }

        let meta = build_track_meta(deps, started_at, file)?;

        let tags = match meta.tags.as_ref() {
            Some(tags) => tags,
            None => {
                progress.record_skip(deps, &file.path, "missing-album-tag".to_string())?;
                continue;
            }
        };
        let album_title = match non_empty(tags.album.as_deref()) {
            Some(title) => title.to_string(),
            None => {
                progress.record_skip(deps, &file.path, "missing-album-tag".to_string())?;
                continue;
            }
        };
        let album_artist_tag = non_empty(tags.album_artist.as_deref());
        let artist_tag = non_empty(tags.artist.as_deref());
        if album_artist_tag.is_none() && artist_tag.is_none() {
            progress.record_skip(deps, &file.path, "missing-artist-tag".to_string())?;
            continue;
        }
        if let Some(album_artist) = album_artist_tag {
            if !artist_name.is_empty()
                && normalize_title(album_artist) != normalized_folder_artist
            {
                progress.record_skip(
                    deps,
                    &file.path,
                    "missing-artist-tag: album artist mismatch".to_string(),
                )?;
                continue;
            }
        }

        let dedupe_key = meta.dedupe_key();
        if !progress.seen_keys.insert(dedupe_key.clone()) {
            progress.record_skip(deps, &file.path, format!("deduped:{}", dedupe_key))?;
            continue;
        }

        let group_artist = album_artist_tag
            .or(artist_tag)
            .unwrap_or(artist_name)
            .to_string();
        let group_key = format!(
            "{}::{}",
            normalize_title(&group_artist),
            normalize_title(&album_title)
        );
        groups
            .entry(group_key)
            .or_insert_with(|| AlbumGroup {
                title: album_title,
                files: Vec::new(),
            })
            .files
            .push(meta);
        progress.scanned_files += 1;
    }

    for group in groups.into_values() {
        let virtual_path = album_virtual_path(artist_path, &group.title);
        let mut formats: Vec<String> = group
            .files
            .iter()
            .map(|file| file.ext.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        formats.sort();
        let last_file_mtime = group.files.iter().map(|file| file.mtime).max();

        let album = deps.library.upsert_album(
            artist.id,
            &virtual_path,
            &group.title,
            &formats,
            group.files.len() as i64,
            last_file_mtime,
            started_at,
        )?;
        progress.albums_seen += 1;

        for file in &group.files {
            deps.library
                .upsert_track(album.id, &file.path, &file.ext, file.mtime, started_at)?;
            progress.tracks_seen += 1;
        }
    }

    Ok(())
}

struct AlbumGroup {
    title: String,
    files: Vec<TrackMeta>,
}

struct TrackMeta {
    path: String,
    ext: String,
    mtime: i64,
    size: i64,
    inode_key: Option<String>,
    tags: Option<TagInfo>,
}

impl TrackMeta {
    /// Identity for in-scan deduplication: inode when the filesystem has
    /// one, otherwise size + rounded mtime + path hash prefix.
    fn dedupe_key(&self) -> String {
        match &self.inode_key {
            Some(inode_key) => format!("inode:{}", inode_key),
            None => format!(
                "fallback:{}:{}:{}",
                self.size,
                self.mtime / 1000,
                short_sha1(&self.path, 8)
            ),
        }
    }
}

/// Builds the per-file metadata, going through the file-index cache: a row
/// whose mtime and size still match skips tag parsing and hashing entirely.
fn build_track_meta(
    deps: &ScanDeps,
    started_at: i64,
    file: &WalkedFile,
) -> Result<TrackMeta, LibraryError> {
    let path = file.path.to_string_lossy().to_string();
    let size = file.size as i64;
    let now = now_millis();

    if let Some(cached) = deps.library.get_file_index(&path)? {
        if cached.mtime == file.mtime && cached.size == size {
            deps.library.touch_file_index(&path, started_at, now)?;
            return Ok(TrackMeta {
                path,
                ext: file.ext.clone(),
                mtime: file.mtime,
                size,
                inode_key: cached.inode_key.clone(),
                tags: cached.tags(),
            });
        }
    }

    let tags = metadata::read_tags(&file.path, &file.ext);
    let inode_key = file.inode_key();
    let file_hash = if inode_key.is_none() {
        first_mb_hash(&file.path)
    } else {
        None
    };

    let mut entry = FileIndexEntry {
        path: path.clone(),
        mtime: file.mtime,
        size,
        inode_key: inode_key.clone(),
        file_hash,
        last_scan_at: started_at,
        last_seen_at: now,
        ..Default::default()
    };
    entry.set_tags(tags.as_ref());
    deps.library.upsert_file_index(&entry)?;

    Ok(TrackMeta {
        path,
        ext: file.ext.clone(),
        mtime: file.mtime,
        size,
        inode_key,
        tags,
    })
}

/// Hash prefix over the first mebibyte; content identity where inodes are
/// meaningless.
fn first_mb_hash(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut buffer = vec![0u8; HASH_SAMPLE_BYTES];
    let mut filled = 0usize;
    loop {
        let read = file.read(&mut buffer[filled..]).ok()?;
        if read == 0 {
            break;
        }
        filled += read;
        if filled == buffer.len() {
            break;
        }
    }
    Some(sha1_hex(&buffer[..filled])[..FILE_HASH_HEX_LEN].to_string())
}

/// Deterministic identity key for an album row. Never touches the disk:
/// multiple on-disk layouts collapse into one logical album and need one
/// stable handle.
fn album_virtual_path(artist_path: &Path, album_title: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        artist_path.display(),
        VIRTUAL_DIR,
        slugify(album_title),
        short_sha1(album_title, 8)
    )
}

/// Canonical histogram bucket for a raw skip reason.
pub fn canonicalize_skip_reason(raw: &str) -> String {
    if raw.starts_with("unsupported-extension") {
        "unsupported extension".to_string()
    } else if raw.starts_with("unreadable") {
        "unreadable".to_string()
    } else if raw.starts_with("missing-album-tag") {
        "missing album tag".to_string()
    } else if raw.starts_with("missing-artist-tag") {
        "missing artist tag".to_string()
    } else if raw.starts_with("deduped") {
        "duplicate".to_string()
    } else if raw.starts_with("parse-error") {
        "parse error".to_string()
    } else {
        raw.to_string()
    }
}

struct Progress {
    started_at: i64,
    scanned_files: i64,
    skipped_files: i64,
    artists_seen: i64,
    albums_seen: i64,
    tracks_seen: i64,
    skipped_reasons: BTreeMap<String, i64>,
    seen_keys: HashSet<String>,
}

impl Progress {
    fn new(started_at: i64) -> Self {
        Self {
            started_at,
            scanned_files: 0,
            skipped_files: 0,
            artists_seen: 0,
            albums_seen: 0,
            tracks_seen: 0,
            skipped_reasons: BTreeMap::new(),
            seen_keys: HashSet::new(),
        }
    }

    fn record_skip(
        &mut self,
        deps: &ScanDeps,
        path: &Path,
        raw_reason: String,
    ) -> Result<(), LibraryError> {
        deps.library
            .record_skip(self.started_at, &path.to_string_lossy(), &raw_reason)?;
        *self
            .skipped_reasons
            .entry(canonicalize_skip_reason(&raw_reason))
            .or_insert(0) += 1;
        self.skipped_files += 1;
        Ok(())
    }

    fn flush(&self, deps: &ScanDeps, current_path: Option<&str>) -> Result<(), LibraryError> {
        deps.library.update_scan_progress(
            current_path,
            self.scanned_files,
            self.skipped_files,
            self.artists_seen,
            self.albums_seen,
            self.tracks_seen,
        )
    }

    fn into_outcome(self, cancelled: bool) -> ScanOutcome {
        ScanOutcome {
            cancelled,
            scanned_files: self.scanned_files,
            skipped_files: self.skipped_files,
            artists_seen: self.artists_seen,
            albums_seen: self.albums_seen,
            tracks_seen: self.tracks_seen,
            skipped_reasons: self.skipped_reasons,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::thread::sleep;
    use std::time::Duration;

    use tempfile::TempDir;

    use library::{Db, LibraryStore};

    use super::{run_scan, ScanController, ScanDeps, ScanOptions};

    fn write_id3v1(path: &Path, title: &str, artist: &str, album: &str, year: &str) {
        let mut data = vec![0xFFu8; 512];
        let mut tag = [0u8; 128];
        tag[0..3].copy_from_slice(b"TAG");
        copy_field(&mut tag[3..33], title);
        copy_field(&mut tag[33..63], artist);
        copy_field(&mut tag[63..93], album);
        copy_field(&mut tag[93..97], year);
        data.extend_from_slice(&tag);
        fs::write(path, data).unwrap();
    }

    fn copy_field(target: &mut [u8], value: &str) {
        for (slot, byte) in target.iter_mut().zip(value.bytes()) {
            *slot = byte;
        }
    }

    fn deps() -> ScanDeps {
        ScanDeps {
            library: LibraryStore::new(Db::open_in_memory().unwrap()),
            controller: ScanController::new(),
        }
    }

    fn options(root: PathBuf) -> ScanOptions {
        ScanOptions {
            root,
            recursive: true,
            max_depth: 4,
            artist_id: None,
        }
    }

    fn seed_nested_mp3(root: &Path) -> PathBuf {
        let album_dir = root.join("New Found Glory/Waiting (1998)");
        fs::create_dir_all(&album_dir).unwrap();
        let song = album_dir.join("01-song.mp3");
        write_id3v1(
            &song,
            "Something I Call Personality",
            "New Found Glory",
            "Waiting",
            "1998",
        );
        song
    }

    #[test]
    fn nested_mp3_import_creates_one_album() {
        let dir = TempDir::new().unwrap();
        seed_nested_mp3(dir.path());
        let deps = deps();

        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert_eq!(outcome.scanned_files, 1);
        assert_eq!(outcome.skipped_files, 0);

        let artist = deps
            .library
            .get_artist_by_name("New Found Glory")
            .unwrap()
            .unwrap();
        assert_eq!(artist.slug, "new-found-glory");

        let albums = deps.library.list_albums_for_artist(artist.id, false).unwrap();
        assert_eq!(albums.len(), 1);
        let album = &albums[0];
        assert_eq!(album.title, "Waiting");
        assert_eq!(album.track_count, 1);
        assert_eq!(album.formats, vec!["mp3".to_string()]);
        assert!(album.path.contains("/.crate/waiting-"));
        assert!(album.owned);

        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(state.status, "idle");
        assert_eq!(state.scanned_files, 1);
    }

    #[cfg(unix)]
    #[test]
    fn hardlinked_duplicate_is_deduped() {
        let dir = TempDir::new().unwrap();
        let song = seed_nested_mp3(dir.path());
        fs::hard_link(&song, dir.path().join("New Found Glory/01-track-hardlink.mp3")).unwrap();
        let deps = deps();

        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        // Two audio candidates: one admitted, one deduplicated.
        assert_eq!(outcome.scanned_files, 1);
        assert_eq!(outcome.skipped_files, 1);

        assert_eq!(deps.library.count_live_tracks().unwrap(), 1);
        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(state.skipped_reasons_breakdown.get("duplicate"), Some(&1));

        let artist = deps
            .library
            .get_artist_by_name("New Found Glory")
            .unwrap()
            .unwrap();
        let albums = deps.library.list_albums_for_artist(artist.id, false).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].track_count, 1);
    }

    #[test]
    fn untagged_file_is_skipped_without_album_row() {
        let dir = TempDir::new().unwrap();
        let album_dir = dir.path().join("X/Album Y");
        fs::create_dir_all(&album_dir).unwrap();
        fs::write(album_dir.join("song.ogg"), b"not really audio").unwrap();
        let deps = deps();

        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert_eq!(outcome.scanned_files, 0);
        assert_eq!(outcome.skipped_files, 1);

        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(
            state.skipped_reasons_breakdown.get("missing album tag"),
            Some(&1)
        );

        let artist = deps.library.get_artist_by_name("X").unwrap().unwrap();
        assert!(deps
            .library
            .list_albums_for_artist(artist.id, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn track_artist_without_album_artist_admits_under_folder_identity() {
        let dir = TempDir::new().unwrap();
        let album_dir = dir.path().join("Folder Artist");
        fs::create_dir_all(&album_dir).unwrap();
        // ID3v1 carries no album-artist field; the mismatch rule only fires
        // when one is present.
        write_id3v1(
            &album_dir.join("01.mp3"),
            "Title",
            "Somebody Else",
            "Some Album",
            "2001",
        );
        let deps = deps();

        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert_eq!(outcome.scanned_files, 1);
        let artist = deps
            .library
            .get_artist_by_name("Folder Artist")
            .unwrap()
            .unwrap();
        let albums = deps.library.list_albums_for_artist(artist.id, false).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].title, "Some Album");
    }

    #[test]
    fn album_artist_mismatch_is_a_skip() {
        let dir = TempDir::new().unwrap();
        let artist_dir = dir.path().join("Folder Artist");
        fs::create_dir_all(&artist_dir).unwrap();
        write_flac_with_album_artist(
            &artist_dir.join("01.flac"),
            "Somebody Else",
            "Their Album",
        );
        let deps = deps();

        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert_eq!(outcome.scanned_files, 0);
        assert_eq!(outcome.skipped_files, 1);
        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(
            state.skipped_reasons_breakdown.get("missing artist tag"),
            Some(&1)
        );
    }

    fn write_flac_with_album_artist(path: &Path, album_artist: &str, album: &str) {
        let mut body = Vec::new();
        let vendor = b"test";
        body.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        body.extend_from_slice(vendor);
        let comments = [
            format!("ALBUMARTIST={}", album_artist),
            format!("ARTIST={}", album_artist),
            format!("ALBUM={}", album),
        ];
        body.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for comment in &comments {
            body.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            body.extend_from_slice(comment.as_bytes());
        }
        let mut data = Vec::new();
        data.extend_from_slice(b"fLaC");
        data.push(0x84);
        let len = body.len() as u32;
        data.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
        data.extend_from_slice(&body);
        fs::write(path, data).unwrap();
    }

    #[test]
    fn owned_flag_survives_rescans() {
        let dir = TempDir::new().unwrap();
        seed_nested_mp3(dir.path());
        let deps = deps();

        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        let artist = deps
            .library
            .get_artist_by_name("New Found Glory")
            .unwrap()
            .unwrap();
        let album = deps.library.list_albums_for_artist(artist.id, false).unwrap()[0].clone();
        deps.library.set_album_owned(album.id, false).unwrap();

        sleep(Duration::from_millis(5));
        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        let album = deps.library.get_album(album.id).unwrap().unwrap();
        assert!(!album.owned);
        assert!(!album.deleted);
    }

    #[test]
    fn full_scan_sweeps_rows_for_vanished_files() {
        let dir = TempDir::new().unwrap();
        let song = seed_nested_mp3(dir.path());
        let deps = deps();

        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert_eq!(deps.library.stats().unwrap().albums, 1);

        fs::remove_file(&song).unwrap();
        sleep(Duration::from_millis(5));
        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();

        let stats = deps.library.stats().unwrap();
        assert_eq!(stats.albums, 0);
        assert_eq!(stats.tracks, 0);
        // Artist directory still exists, so the artist row survives.
        assert_eq!(stats.artists, 1);

        let artist = deps
            .library
            .get_artist_by_name("New Found Glory")
            .unwrap()
            .unwrap();
        let albums = deps.library.list_albums_for_artist(artist.id, false).unwrap();
        assert!(albums.is_empty(), "soft-deleted albums drop from listings");
    }

    #[test]
    fn file_index_caches_unchanged_files() {
        let dir = TempDir::new().unwrap();
        let song = seed_nested_mp3(dir.path());
        let deps = deps();

        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        let first = deps
            .library
            .get_file_index(&song.to_string_lossy())
            .unwrap()
            .unwrap();

        sleep(Duration::from_millis(5));
        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        let second = deps
            .library
            .get_file_index(&song.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(first.tags().unwrap(), second.tags().unwrap());
        assert!(second.last_scan_at > first.last_scan_at);
    }

    #[test]
    fn artist_scoped_scan_skips_the_sweep() {
        let dir = TempDir::new().unwrap();
        let song = seed_nested_mp3(dir.path());
        let other_dir = dir.path().join("Other Artist/Album");
        fs::create_dir_all(&other_dir).unwrap();
        write_id3v1(&other_dir.join("01.mp3"), "T", "Other Artist", "Theirs", "2000");
        let deps = deps();

        run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        let nfg = deps
            .library
            .get_artist_by_name("New Found Glory")
            .unwrap()
            .unwrap();

        // The file vanishes, but a scoped rescan of the other artist must
        // not sweep it away.
        fs::remove_file(&song).unwrap();
        let other = deps.library.get_artist_by_name("Other Artist").unwrap().unwrap();
        sleep(Duration::from_millis(5));
        let mut scoped = options(dir.path().to_path_buf());
        scoped.artist_id = Some(other.id);
        run_scan(&deps, &scoped).unwrap();

        let albums = deps.library.list_albums_for_artist(nfg.id, false).unwrap();
        assert_eq!(albums.len(), 1, "scoped scans never soft-delete");
    }

    #[test]
    fn cancellation_before_work_finalizes_as_cancelled() {
        let dir = TempDir::new().unwrap();
        seed_nested_mp3(dir.path());
        let deps = deps();

        assert!(deps.controller.try_begin());
        assert!(deps.controller.request_cancel());
        let outcome = run_scan(&deps, &options(dir.path().to_path_buf())).unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.scanned_files, 0);

        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(state.status, "cancelled");
    }

    #[test]
    fn fallback_dedupe_key_hashes_the_path_not_the_content() {
        let meta = |path: &str| super::TrackMeta {
            path: path.to_string(),
            ext: "mp3".to_string(),
            mtime: 7_500,
            size: 4096,
            inode_key: None,
            tags: None,
        };
        let first = meta("/lib/A/.same/01.mp3").dedupe_key();
        let second = meta("/lib/B/.same/01.mp3").dedupe_key();
        assert!(first.starts_with("fallback:4096:7:"));
        assert_ne!(
            first, second,
            "identical size and mtime must not collide across paths"
        );

        let inode = super::TrackMeta {
            inode_key: Some("9:77".to_string()),
            ..meta("/lib/A/.same/01.mp3")
        };
        assert_eq!(inode.dedupe_key(), "inode:9:77");
    }

    #[test]
    fn single_flight_rejects_second_start() {
        let controller = ScanController::new();
        assert!(controller.try_begin());
        assert!(!controller.try_begin());
        controller.finish();
        assert!(controller.try_begin());
    }

    #[test]
    fn missing_root_sets_error_state() {
        let deps = deps();
        let err = run_scan(&deps, &options(PathBuf::from("/definitely/not/here"))).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
        let state = deps.library.get_scan_state().unwrap();
        assert_eq!(state.status, "error");
        assert!(state.error.unwrap().contains("not a directory"));
    }
}
