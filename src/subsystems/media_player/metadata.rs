//! Track metadata read from the MPRIS `Metadata` dictionary.

use std::collections::HashMap;

use serde::Serialize;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

/// Metadata of the track a player is on
///
/// Every field is optional on the bus; missing or mistyped entries are left
/// empty rather than failing the whole map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackMetadata {
    /// MPRIS track identifier
    pub track_id: Option<String>,

    /// Track title
    pub title: Option<String>,

    /// Track artists
    pub artists: Vec<String>,

    /// Album name
    pub album: Option<String>,

    /// Album artists
    pub album_artists: Vec<String>,

    /// URL to album artwork image
    pub art_url: Option<String>,

    /// Location of the media file
    pub url: Option<String>,

    /// Track duration in microseconds
    pub length_us: Option<i64>,
}

impl From<HashMap<String, OwnedValue>> for TrackMetadata {
    fn from(metadata: HashMap<String, OwnedValue>) -> Self {
        Self {
            track_id: metadata.get("mpris:trackid").and_then(track_id),
            title: metadata.get("xesam:title").and_then(string),
            artists: metadata.get("xesam:artist").map(strings).unwrap_or_default(),
            album: metadata.get("xesam:album").and_then(string),
            album_artists: metadata
                .get("xesam:albumArtist")
                .map(strings)
                .unwrap_or_default(),
            art_url: metadata.get("mpris:artUrl").and_then(string),
            url: metadata.get("xesam:url").and_then(string),
            length_us: metadata.get("mpris:length").and_then(length),
        }
    }
}

fn string(value: &OwnedValue) -> Option<String> {
    String::try_from(value.clone()).ok()
}

// Some players send the id as a plain string instead of an object path.
fn track_id(value: &OwnedValue) -> Option<String> {
    OwnedObjectPath::try_from(value.clone())
        .map(|path| path.as_str().to_string())
        .ok()
        .or_else(|| string(value))
}

fn strings(value: &OwnedValue) -> Vec<String> {
    if let Ok(array) = <&zbus::zvariant::Array>::try_from(value) {
        array
            .iter()
            .filter_map(|item| {
                if let Ok(s) = item.downcast_ref::<String>() {
                    Some(s.to_string())
                } else if let Ok(s) = item.downcast_ref::<&str>() {
                    Some(s.to_string())
                } else {
                    None
                }
            })
            .collect()
    } else {
        string(value).into_iter().collect()
    }
}

fn length(value: &OwnedValue) -> Option<i64> {
    i64::try_from(value.clone())
        .ok()
        .or_else(|| u64::try_from(value.clone()).ok().and_then(|v| i64::try_from(v).ok()))
        .filter(|micros| *micros > 0)
}
