//! Structured media keys.
//!
//! Every stored object lives under one of three top-level prefixes:
//! `photos/` and `videos/` hold originals, `thumbnails/` holds derived
//! objects. The rest of the key is `{identity}/{file name}` and is carried
//! verbatim between the original and its thumbnail. Parsing happens once at
//! the boundary; everything downstream dispatches on [`MediaCategory`]
//! instead of re-checking string prefixes.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// What the leading path segment of a key encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaCategory {
    Photo,
    Video,
    Thumbnail,
}

impl MediaCategory {
    /// The key prefix for this category, including the trailing slash.
    pub fn prefix(self) -> &'static str {
        match self {
            MediaCategory::Photo => "photos/",
            MediaCategory::Video => "videos/",
            MediaCategory::Thumbnail => "thumbnails/",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "photos" => Some(MediaCategory::Photo),
            "videos" => Some(MediaCategory::Video),
            "thumbnails" => Some(MediaCategory::Thumbnail),
            _ => None,
        }
    }
}

/// A parsed object key: `{category}/{identity}/{file_name}`.
///
/// `file_name` keeps everything after the identity segment verbatim, so the
/// thumbnail mapping preserves nested paths byte for byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaKey {
    pub category: MediaCategory,
    pub identity: String,
    pub file_name: String,
}

impl MediaKey {
    /// Parse a full object key. Returns `None` for keys outside the three
    /// known prefixes or without an identity and file-name segment.
    pub fn parse(key: &str) -> Option<Self> {
        let (category_seg, rest) = key.split_once('/')?;
        let category = MediaCategory::from_segment(category_seg)?;
        let (identity, file_name) = rest.split_once('/')?;
        if identity.is_empty() || file_name.is_empty() {
            return None;
        }
        Some(Self {
            category,
            identity: identity.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// The derived-object key for this original: the category segment is
    /// replaced by `thumbnails/` and every other segment is preserved.
    ///
    /// This rule is shared between the upload path (which predicts the key
    /// when creating a photo record) and the pipeline (which computes it when
    /// writing); both must call through here. Returns `None` for keys already
    /// under `thumbnails/` — those have no derived object.
    pub fn thumbnail_key(&self) -> Option<String> {
        match self.category {
            MediaCategory::Thumbnail => None,
            MediaCategory::Photo | MediaCategory::Video => Some(format!(
                "{}{}/{}",
                MediaCategory::Thumbnail.prefix(),
                self.identity,
                self.file_name
            )),
        }
    }
}

/// Characters escaped in notification keys, beyond controls: everything that
/// would be ambiguous in a URL query or path context.
const EVENT_KEY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'+')
    .add(b'%')
    .add(b'#')
    .add(b'?')
    .add(b'&')
    .add(b'=')
    .add(b'"');

/// Encode a raw key the way the notification layer delivers it: percent
/// escapes with `+` standing in for spaces.
pub fn encode_event_key(key: &str) -> String {
    utf8_percent_encode(key, EVENT_KEY_ESCAPE)
        .to_string()
        .replace("%20", "+")
}

/// Decode a key as delivered in an object-created event. Must stay the exact
/// inverse of [`encode_event_key`], or lookups silently miss: `+` becomes a
/// space first, then percent escapes are resolved.
pub fn decode_event_key(key: &str) -> String {
    let spaced = key.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_photo_keys() {
        let key = MediaKey::parse("photos/u1/abc.jpg").unwrap();
        assert_eq!(key.category, MediaCategory::Photo);
        assert_eq!(key.identity, "u1");
        assert_eq!(key.file_name, "abc.jpg");
    }

    #[test]
    fn rejects_unknown_prefixes_and_short_keys() {
        assert_eq!(MediaKey::parse("public/banner.png"), None);
        assert_eq!(MediaKey::parse("photos/orphan.jpg"), None);
        assert_eq!(MediaKey::parse("photos//x.jpg"), None);
        assert_eq!(MediaKey::parse("photos/u1/"), None);
    }

    #[test]
    fn thumbnail_mapping_replaces_only_the_category_segment() {
        let photo = MediaKey::parse("photos/u1/abc.jpg").unwrap();
        assert_eq!(photo.thumbnail_key().unwrap(), "thumbnails/u1/abc.jpg");

        let video = MediaKey::parse("videos/u1/clip.mp4").unwrap();
        assert_eq!(video.thumbnail_key().unwrap(), "thumbnails/u1/clip.mp4");
    }

    #[test]
    fn thumbnails_have_no_derived_key() {
        let thumb = MediaKey::parse("thumbnails/u1/abc.jpg").unwrap();
        assert_eq!(thumb.thumbnail_key(), None);
    }

    #[test]
    fn nested_file_names_survive_the_mapping() {
        let key = MediaKey::parse("photos/u1/2025/08/trip.jpg").unwrap();
        assert_eq!(key.file_name, "2025/08/trip.jpg");
        assert_eq!(key.thumbnail_key().unwrap(), "thumbnails/u1/2025/08/trip.jpg");
    }

    #[test]
    fn event_key_round_trips_spaces_and_plus() {
        let raw = "photos/u1/summer trip+1.jpg";
        let encoded = encode_event_key(raw);
        assert_eq!(encoded, "photos/u1/summer+trip%2B1.jpg");
        assert_eq!(decode_event_key(&encoded), raw);
    }

    #[test]
    fn decode_matches_upload_side_encoding() {
        // A plain key passes through both directions untouched.
        let raw = "photos/u1/abc.jpg";
        assert_eq!(encode_event_key(raw), raw);
        assert_eq!(decode_event_key(raw), raw);
    }
}
