mod flac;
mod id3v1;

use std::path::Path;

/// Tag fields the scanner cares about. Every field is optional; a record
/// with no album tag is still a valid parse result, the admission filters
/// upstream decide what to do with it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub year: Option<String>,
    pub title: Option<String>,
}

/// Reads embedded tags for a candidate file. Returns `None` when the format
/// has no supported tag container, the container is absent, or any read or
/// parse step fails; errors never propagate past this boundary.
pub fn read_tags(path: &Path, ext: &str) -> Option<TagInfo> {
    match ext.to_ascii_lowercase().as_str() {
        "flac" => flac::read_vorbis_tags(path),
        "mp3" => id3v1::read_id3v1_tags(path),
        _ => None,
    }
}
