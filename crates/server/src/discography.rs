use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use common::{is_strong_title_alias_match, normalize_title, now_millis};
use library::{
    Album, Artist, ExpectedAlbum, ExpectedArtistSettings, ExpectedRelease, ExpectedStore,
    LibraryStore, WantedAlbum, WishlistEntry, WishlistStore,
};

use crate::error::ServiceError;
use crate::musicbrainz::{MetadataClientError, ReleaseGroup, ReleaseGroupSource};
use crate::state::WishlistRequest;

/// Outer bound on one logical metadata operation, wrapped around the already
/// rate-limited client call so a slow upstream cannot pin an HTTP handler.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Reconciles the owned inventory against the canonical per-artist
/// discography: syncs expected release-groups, computes completion
/// summaries, and manages the user-lifetime rows layered on top.
pub struct DiscographyService {
    library: LibraryStore,
    expected: ExpectedStore,
    wishlist: WishlistStore,
    source: Arc<dyn ReleaseGroupSource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub artist: Artist,
    pub settings: ExpectedArtistSettings,
    pub owned_count: i64,
    pub expected_count: i64,
    pub missing_count: i64,
    pub ignored_count: i64,
    pub completion_pct: Option<i64>,
    pub missing_albums: Vec<ExpectedAlbum>,
    pub matched_owned_count: i64,
    pub matched_owned_albums: Vec<Album>,
    pub unmatched_owned_albums: Vec<Album>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistOverview {
    pub artist: Artist,
    pub owned_albums: Vec<Album>,
    pub wanted_albums: Vec<WantedOverviewEntry>,
    pub missing: Vec<WantedAlbum>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedOverviewEntry {
    #[serde(flatten)]
    pub wanted: WantedAlbum,
    pub owned: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WishlistAddResponse {
    Entry(WishlistEntry),
    Wanted(WantedAlbum),
}

impl DiscographyService {
    pub fn new(
        library: LibraryStore,
        expected: ExpectedStore,
        wishlist: WishlistStore,
        source: Arc<dyn ReleaseGroupSource>,
    ) -> Self {
        Self {
            library,
            expected,
            wishlist,
            source,
        }
    }

    /// Refreshes the expected release-groups for one artist from the
    /// metadata service and returns a fresh summary. The artist's external
    /// id is resolved once and kept.
    pub async fn sync_expected_for_artist(
        &self,
        artist_id: i64,
    ) -> Result<ArtistSummary, ServiceError> {
        let artist = self.resolve_artist(artist_id)?;

        let mbid = match self
            .expected
            .get_expected_artist(artist_id)?
            .and_then(|expected| expected.mbid)
        {
            Some(mbid) => mbid,
            None => {
                let matched = self
                    .call_upstream(self.source.find_artist_by_name(&artist.name))
                    .await?;
                match matched {
                    Some(matched) => matched.mbid,
                    None => {
                        return Err(ServiceError::NotFound(format!(
                            "no metadata match for artist '{}'",
                            artist.name
                        )))
                    }
                }
            }
        };

        let now = now_millis();
        let expected_artist = self
            .expected
            .upsert_expected_artist(artist_id, &mbid, &artist.name, now)?;
        let releases = self
            .call_upstream(self.source.fetch_artist_albums(&mbid))
            .await?;
        let incoming: Vec<ExpectedRelease> = releases.into_iter().map(to_expected_release).collect();
        let pruned = self
            .expected
            .replace_expected_albums(expected_artist.id, &incoming, now)?;
        info!(
            "synced {} expected albums for '{}' ({} pruned)",
            incoming.len(),
            artist.name,
            pruned
        );

        self.compute_summary(artist_id)
    }

    /// Owned/expected/missing reconciliation for one artist. An expected
    /// album counts as matched through an explicit override, normalized
    /// title equality, or a strong alias match; unmatched albums surface as
    /// missing unless ignored or excluded by the inclusion settings.
    pub fn compute_summary(&self, artist_id: i64) -> Result<ArtistSummary, ServiceError> {
        let artist = self.resolve_artist(artist_id)?;
        let settings = self.expected.get_settings(artist_id)?;
        let ignored = self.expected.list_ignored_ids(artist_id)?;

        let expected_albums = match self.expected.get_expected_artist(artist_id)? {
            Some(expected_artist) => self.expected.list_expected_albums(expected_artist.id)?,
            None => Vec::new(),
        };
        let owned = self.library.list_albums_for_artist(artist_id, true)?;
        let overrides: HashMap<i64, i64> = self
            .expected
            .list_overrides(artist_id)?
            .into_iter()
            .map(|entry| (entry.expected_album_id, entry.owned_album_id))
            .collect();

        let owned_normalized: Vec<String> = owned
            .iter()
            .map(|album| normalize_title(&album.title))
            .collect();
        let mut owned_by_normalized: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, title) in owned_normalized.iter().enumerate() {
            owned_by_normalized.entry(title.as_str()).or_default().push(index);
        }
        let owned_ids: HashSet<i64> = owned.iter().map(|album| album.id).collect();

        let mut matched_owned: HashSet<usize> = HashSet::new();
        let mut missing_albums = Vec::new();
        let mut ignored_count = 0i64;

        for expected_album in &expected_albums {
            let mut matched = false;

            if let Some(owned_album_id) = overrides.get(&expected_album.id) {
                if owned_ids.contains(owned_album_id) {
                    matched = true;
                    if let Some(index) =
                        owned.iter().position(|album| album.id == *owned_album_id)
                    {
                        matched_owned.insert(index);
                    }
                }
            }
            if let Some(indices) = owned_by_normalized.get(expected_album.normalized_title.as_str())
            {
                matched = true;
                matched_owned.extend(indices.iter().copied());
            }
            if !matched {
                for (index, owned_title) in owned_normalized.iter().enumerate() {
                    if is_strong_title_alias_match(owned_title, &expected_album.normalized_title) {
                        matched = true;
                        matched_owned.insert(index);
                    }
                }
            }

            if ignored.contains(&expected_album.id) {
                ignored_count += 1;
            }
            if !matched
                && !ignored.contains(&expected_album.id)
                && passes_inclusion(expected_album, &settings)
            {
                missing_albums.push(expected_album.clone());
            }
        }

        let expected_count = expected_albums.len() as i64;
        let missing_count = missing_albums.len() as i64;
        let completion_pct = if expected_count == 0 {
            None
        } else {
            let covered = (expected_count - missing_count) as f64;
            Some((covered / expected_count as f64 * 100.0).round() as i64)
        };

        let matched_owned_albums: Vec<Album> = owned
            .iter()
            .enumerate()
            .filter(|(index, _)| matched_owned.contains(index))
            .map(|(_, album)| album.clone())
            .collect();
        let unmatched_owned_albums: Vec<Album> = owned
            .iter()
            .enumerate()
            .filter(|(index, _)| !matched_owned.contains(index))
            .map(|(_, album)| album.clone())
            .collect();

        Ok(ArtistSummary {
            owned_count: owned.len() as i64,
            expected_count,
            missing_count,
            ignored_count,
            completion_pct,
            missing_albums,
            matched_owned_count: matched_owned_albums.len() as i64,
            matched_owned_albums,
            unmatched_owned_albums,
            artist,
            settings,
        })
    }

    pub fn ignore_expected_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), ServiceError> {
        self.resolve_expected_pair(artist_id, expected_album_id)?;
        self.expected.ignore_album(artist_id, expected_album_id)?;
        Ok(())
    }

    pub fn unignore_expected_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), ServiceError> {
        self.resolve_expected_pair(artist_id, expected_album_id)?;
        self.expected.unignore_album(artist_id, expected_album_id)?;
        Ok(())
    }

    pub fn update_artist_settings(
        &self,
        artist_id: i64,
        include_live: bool,
        include_compilations: bool,
    ) -> Result<ExpectedArtistSettings, ServiceError> {
        self.resolve_artist(artist_id)?;
        let settings = self
            .expected
            .upsert_settings(artist_id, include_live, include_compilations)?;
        Ok(settings)
    }

    pub fn get_artist_settings(
        &self,
        artist_id: i64,
    ) -> Result<ExpectedArtistSettings, ServiceError> {
        self.resolve_artist(artist_id)?;
        Ok(self.expected.get_settings(artist_id)?)
    }

    pub fn set_match_override(
        &self,
        artist_id: i64,
        expected_album_id: i64,
        owned_album_id: i64,
    ) -> Result<(), ServiceError> {
        self.resolve_expected_pair(artist_id, expected_album_id)?;
        let album = self
            .library
            .get_album(owned_album_id)?
            .filter(|album| !album.deleted && album.artist_id == artist_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "owned album {} not found for artist {}",
                    owned_album_id, artist_id
                ))
            })?;
        self.expected.set_override(expected_album_id, album.id)?;
        Ok(())
    }

    pub fn clear_match_override(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), ServiceError> {
        self.resolve_expected_pair(artist_id, expected_album_id)?;
        self.expected.clear_override(expected_album_id)?;
        Ok(())
    }

    /// Legacy artist page: manual wanted titles and their aliases matched
    /// against the owned shelf by normalized title.
    pub fn compute_overview(&self, artist_id: i64) -> Result<ArtistOverview, ServiceError> {
        let artist = self.resolve_artist(artist_id)?;
        let owned = self.library.list_albums_for_artist(artist_id, true)?;
        let owned_normalized: HashSet<String> = owned
            .iter()
            .map(|album| normalize_title(&album.title))
            .collect();

        let mut wanted_albums = Vec::new();
        let mut missing = Vec::new();
        for wanted in self.wishlist.list_wanted(artist_id)? {
            let mut is_owned = owned_normalized.contains(&normalize_title(&wanted.title));
            if !is_owned {
                for alias in self.wishlist.list_alias_titles(wanted.id)? {
                    if owned_normalized.contains(&alias) {
                        is_owned = true;
                        break;
                    }
                }
            }
            if !is_owned {
                missing.push(wanted.clone());
            }
            wanted_albums.push(WantedOverviewEntry {
                wanted,
                owned: is_owned,
            });
        }

        Ok(ArtistOverview {
            artist,
            owned_albums: owned,
            wanted_albums,
            missing,
        })
    }

    pub fn add_wishlist(
        &self,
        request: &WishlistRequest,
    ) -> Result<WishlistAddResponse, ServiceError> {
        if let Some(expected_album_id) = request.expected_album_id {
            self.expected
                .get_expected_album(expected_album_id)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("expected album {} not found", expected_album_id))
                })?;
            let entry = self.wishlist.add_by_expected(expected_album_id, now_millis())?;
            return Ok(WishlistAddResponse::Entry(entry));
        }

        let artist_id = request.artist_id.ok_or_else(|| {
            ServiceError::Validation(
                "either expectedAlbumId or artistId with title is required".to_string(),
            )
        })?;
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| ServiceError::Validation("title must not be empty".to_string()))?;
        self.resolve_artist(artist_id)?;
        let source = request.source.as_deref().unwrap_or("manual");
        let wanted =
            self.wishlist
                .upsert_wanted(artist_id, title, request.year, source, now_millis())?;
        Ok(WishlistAddResponse::Wanted(wanted))
    }

    pub fn remove_wishlist(&self, expected_album_id: i64) -> Result<bool, ServiceError> {
        Ok(self.wishlist.remove_by_expected(expected_album_id)?)
    }

    pub fn list_wishlist(&self) -> Result<Vec<WishlistEntry>, ServiceError> {
        Ok(self.wishlist.list()?)
    }

    pub fn wishlist_count(&self) -> Result<i64, ServiceError> {
        Ok(self.wishlist.count()?)
    }

    /// Sum of missing albums across every synced artist; soft-deleted
    /// artists drop out of the total.
    pub fn missing_total(&self) -> Result<i64, ServiceError> {
        let mut total = 0i64;
        for expected_artist in self.expected.list_expected_artists()? {
            match self.compute_summary(expected_artist.artist_id) {
                Ok(summary) => total += summary.missing_count,
                Err(ServiceError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    fn resolve_artist(&self, artist_id: i64) -> Result<Artist, ServiceError> {
        self.library
            .get_artist(artist_id)?
            .filter(|artist| !artist.deleted)
            .ok_or_else(|| ServiceError::NotFound(format!("artist {} not found", artist_id)))
    }

    fn resolve_expected_pair(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<ExpectedAlbum, ServiceError> {
        self.resolve_artist(artist_id)?;
        let expected_artist = self.expected.get_expected_artist(artist_id)?.ok_or_else(|| {
            ServiceError::NotFound(format!("artist {} has no synced discography", artist_id))
        })?;
        self.expected
            .get_expected_album(expected_album_id)?
            .filter(|album| album.expected_artist_id == expected_artist.id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "expected album {} not found for artist {}",
                    expected_album_id, artist_id
                ))
            })
    }

    async fn call_upstream<T>(
        &self,
        operation: impl Future<Output = Result<T, MetadataClientError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(UPSTREAM_TIMEOUT, operation).await {
            Err(_) => Err(ServiceError::UpstreamTimeout(
                "metadata service did not answer in time".to_string(),
            )),
            Ok(Err(err)) => Err(ServiceError::Upstream {
                status: err.status(),
                message: "metadata service request failed".to_string(),
                details: Some(err.to_string()),
            }),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

fn passes_inclusion(album: &ExpectedAlbum, settings: &ExpectedArtistSettings) -> bool {
    let compilation_ok = settings.include_compilations
        || album
            .primary_type
            .as_deref()
            .map(|value| !value.eq_ignore_ascii_case("compilation"))
            .unwrap_or(true);
    let live_ok = settings.include_live
        || !album
            .secondary_types
            .iter()
            .any(|value| value.eq_ignore_ascii_case("live"));
    compilation_ok && live_ok
}

fn to_expected_release(release: ReleaseGroup) -> ExpectedRelease {
    ExpectedRelease {
        mb_release_group_id: release.mb_release_group_id,
        title: release.title,
        year: release.year,
        primary_type: release.primary_type,
        secondary_types: release.secondary_types,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use library::{Db, ExpectedStore, LibraryStore, WishlistStore};

    use crate::error::ServiceError;
    use crate::musicbrainz::{
        ArtistMatch, MetadataClientError, ReleaseGroup, ReleaseGroupSource,
    };
    use crate::state::WishlistRequest;

    use super::DiscographyService;

    #[derive(Default)]
    struct StubSource {
        artist: Mutex<Option<ArtistMatch>>,
        batches: Mutex<VecDeque<Result<Vec<ReleaseGroup>, MetadataClientError>>>,
    }

    #[async_trait]
    impl ReleaseGroupSource for StubSource {
        async fn find_artist_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<ArtistMatch>, MetadataClientError> {
            Ok(self.artist.lock().clone())
        }

        async fn fetch_artist_albums(
            &self,
            _mbid: &str,
        ) -> Result<Vec<ReleaseGroup>, MetadataClientError> {
            self.batches.lock().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn service_with_stub() -> (DiscographyService, Arc<StubSource>, LibraryStore, ExpectedStore) {
        let db = Db::open_in_memory().unwrap();
        let library = LibraryStore::new(db.clone());
        let expected = ExpectedStore::new(db.clone());
        let wishlist = WishlistStore::new(db);
        let source = Arc::new(StubSource::default());
        let service = DiscographyService::new(
            library.clone(),
            expected.clone(),
            wishlist,
            source.clone(),
        );
        (service, source, library, expected)
    }

    fn release(id: &str, title: &str, primary: &str, secondary: &[&str]) -> ReleaseGroup {
        ReleaseGroup {
            mb_release_group_id: Some(id.to_string()),
            title: title.to_string(),
            year: Some(2002),
            primary_type: Some(primary.to_string()),
            secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn seed_expected(
        library: &LibraryStore,
        expected: &ExpectedStore,
        releases: &[ReleaseGroup],
    ) -> i64 {
        let artist = library.upsert_artist("New Found Glory", 1).unwrap();
        let expected_artist = expected
            .upsert_expected_artist(artist.id, "mbid-nfg", &artist.name, 1)
            .unwrap();
        let incoming: Vec<_> = releases
            .iter()
            .cloned()
            .map(super::to_expected_release)
            .collect();
        expected
            .replace_expected_albums(expected_artist.id, &incoming, 1)
            .unwrap();
        artist.id
    }

    #[test]
    fn summary_counts_normalized_and_filtered_matches() {
        let (service, _, library, expected) = service_with_stub();
        let artist_id = seed_expected(
            &library,
            &expected,
            &[
                release("rg-1", "Sticks and Stones", "Album", &[]),
                release("rg-2", "Sticks & Stones", "Album", &[]),
                release("rg-3", "Catalyst", "Album", &[]),
                release("rg-4", "Live EP", "Album", &["Live"]),
            ],
        );
        library
            .upsert_album(artist_id, "/lib/nfg/.crate/sticks", "Sticks and Stones", &[], 12, None, 1)
            .unwrap();
        library
            .upsert_album(artist_id, "/lib/nfg/.crate/coming", "Coming Home", &[], 12, None, 1)
            .unwrap();

        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.owned_count, 2);
        assert_eq!(summary.expected_count, 4);
        assert_eq!(summary.missing_count, 1);
        assert_eq!(summary.missing_albums[0].title, "Catalyst");
        assert_eq!(summary.completion_pct, Some(75));
        assert_eq!(summary.matched_owned_count, 1);
        assert_eq!(summary.matched_owned_albums[0].title, "Sticks and Stones");
        assert_eq!(summary.unmatched_owned_albums[0].title, "Coming Home");
    }

    #[test]
    fn include_live_setting_surfaces_live_releases() {
        let (service, _, library, expected) = service_with_stub();
        let artist_id = seed_expected(
            &library,
            &expected,
            &[
                release("rg-1", "Catalyst", "Album", &[]),
                release("rg-2", "Live EP", "Album", &["Live"]),
                release("rg-3", "Hits", "Compilation", &[]),
            ],
        );

        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 1, "live and compilation filtered");

        service.update_artist_settings(artist_id, true, true).unwrap();
        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 3);
    }

    #[test]
    fn ignored_albums_leave_the_missing_list() {
        let (service, _, library, expected) = service_with_stub();
        let artist_id = seed_expected(
            &library,
            &expected,
            &[release("rg-1", "Catalyst", "Album", &[])],
        );
        let expected_artist = expected.get_expected_artist(artist_id).unwrap().unwrap();
        let album_id = expected.list_expected_albums(expected_artist.id).unwrap()[0].id;

        service.ignore_expected_album(artist_id, album_id).unwrap();
        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 0);
        assert_eq!(summary.ignored_count, 1);
        assert_eq!(summary.completion_pct, Some(100));

        service.unignore_expected_album(artist_id, album_id).unwrap();
        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 1);
    }

    #[test]
    fn override_links_count_as_matches() {
        let (service, _, library, expected) = service_with_stub();
        let artist_id = seed_expected(
            &library,
            &expected,
            &[release("rg-1", "Catalyst", "Album", &[])],
        );
        let owned = library
            .upsert_album(artist_id, "/lib/nfg/.crate/other", "Completely Different", &[], 9, None, 1)
            .unwrap();
        let expected_artist = expected.get_expected_artist(artist_id).unwrap().unwrap();
        let album_id = expected.list_expected_albums(expected_artist.id).unwrap()[0].id;

        service
            .set_match_override(artist_id, album_id, owned.id)
            .unwrap();
        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 0);
        assert_eq!(summary.matched_owned_count, 1);

        service.clear_match_override(artist_id, album_id).unwrap();
        let summary = service.compute_summary(artist_id).unwrap();
        assert_eq!(summary.missing_count, 1);
    }

    #[tokio::test]
    async fn sync_refreshes_and_prunes_expected_albums() {
        let (service, source, library, expected) = service_with_stub();
        let artist = library.upsert_artist("New Found Glory", 1).unwrap();
        *source.artist.lock() = Some(ArtistMatch {
            mbid: "mbid-nfg".to_string(),
            name: "New Found Glory".to_string(),
            score: 100,
        });
        source.batches.lock().push_back(Ok((0..5)
            .map(|index| release(&format!("rg-{}", index), &format!("Album {}", index), "Album", &[]))
            .collect()));
        source.batches.lock().push_back(Ok((0..4)
            .map(|index| release(&format!("rg-{}", index), &format!("Album {}", index), "Album", &[]))
            .collect()));

        let first = service.sync_expected_for_artist(artist.id).await.unwrap();
        assert_eq!(first.expected_count, 5);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service.sync_expected_for_artist(artist.id).await.unwrap();
        assert_eq!(second.expected_count, 4);

        let expected_artist = expected.get_expected_artist(artist.id).unwrap().unwrap();
        let rows = expected.list_expected_albums(expected_artist.id).unwrap();
        assert_eq!(rows.len(), 4);
        let stamps: Vec<i64> = rows.iter().map(|row| row.updated_at).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn unmatched_artist_is_not_found() {
        let (service, _, library, _) = service_with_stub();
        let artist = library.upsert_artist("Unknown Garage Band", 1).unwrap();
        let err = service.sync_expected_for_artist(artist.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn upstream_failures_surface_status_and_details() {
        let (service, source, library, _) = service_with_stub();
        let artist = library.upsert_artist("New Found Glory", 1).unwrap();
        *source.artist.lock() = Some(ArtistMatch {
            mbid: "mbid-nfg".to_string(),
            name: "New Found Glory".to_string(),
            score: 100,
        });
        source.batches.lock().push_back(Err(MetadataClientError::Http {
            status: 503,
            snippet: "maintenance".to_string(),
        }));

        let err = service.sync_expected_for_artist(artist.id).await.unwrap_err();
        match err {
            ServiceError::Upstream { status, details, .. } => {
                assert_eq!(status, Some(503));
                assert!(details.unwrap().contains("maintenance"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[test]
    fn overview_matches_wanted_titles_and_aliases() {
        let (service, _, library, _) = service_with_stub();
        let artist = library.upsert_artist("New Found Glory", 1).unwrap();
        library
            .upsert_album(artist.id, "/lib/nfg/.crate/waiting", "Waiting (1998)", &[], 10, None, 1)
            .unwrap();

        service
            .add_wishlist(&WishlistRequest {
                artist_id: Some(artist.id),
                title: Some("Waiting".to_string()),
                year: Some(1998),
                source: Some("musicbrainz".to_string()),
                ..Default::default()
            })
            .unwrap();
        service
            .add_wishlist(&WishlistRequest {
                artist_id: Some(artist.id),
                title: Some("Catalyst".to_string()),
                ..Default::default()
            })
            .unwrap();

        let overview = service.compute_overview(artist.id).unwrap();
        assert_eq!(overview.owned_albums.len(), 1);
        assert_eq!(overview.wanted_albums.len(), 2);
        assert_eq!(overview.missing.len(), 1);
        assert_eq!(overview.missing[0].title, "Catalyst");
    }

    #[test]
    fn wishlist_requires_a_target() {
        let (service, _, _, _) = service_with_stub();
        let err = service.add_wishlist(&WishlistRequest::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
