use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::TagInfo;

const TAG_LENGTH: u64 = 128;

/// Reads the fixed 128-byte ID3v1 footer. ID3v2 frames are deliberately not
/// parsed; a file carrying only v2 tags reads as untagged.
pub fn read_id3v1_tags(path: &Path) -> Option<TagInfo> {
    let mut file = File::open(path).ok()?;
    let size = file.metadata().ok()?.len();
    if size < TAG_LENGTH {
        return None;
    }

    file.seek(SeekFrom::End(-(TAG_LENGTH as i64))).ok()?;
    let mut tag = [0u8; TAG_LENGTH as usize];
    file.read_exact(&mut tag).ok()?;
    if &tag[0..3] != b"TAG" {
        return None;
    }

    let title = latin1_field(&tag[3..33]);
    let artist = latin1_field(&tag[33..63]);
    let album = latin1_field(&tag[63..93]);
    let year = latin1_field(&tag[93..97]);
    album.as_ref()?;

    Some(TagInfo {
        album,
        album_artist: None,
        artist,
        year,
        title,
    })
}

/// Latin-1 maps byte-for-byte onto the first 256 code points.
fn latin1_field(bytes: &[u8]) -> Option<String> {
    let decoded: String = bytes.iter().map(|&byte| byte as char).collect();
    let trimmed = decoded
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
