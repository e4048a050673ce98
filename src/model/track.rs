use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Snapshot of the track currently on air, as reported by the metadata API.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
pub struct TrackInfo {
    /// Title of the track, the only field used to tell tracks apart.
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Length of the track in seconds, absent when unknown or zero.
    #[serde(rename = "duration", default, deserialize_with = "duration_from_seconds")]
    pub duration_seconds: Option<u64>,
    #[serde(rename = "cover", default)]
    pub cover_url: Option<String>,
    #[serde(rename = "buy_link", default)]
    pub purchase_url: Option<String>
}

impl TrackInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: None,
            album: None,
            duration_seconds: None,
            cover_url: None,
            purchase_url: None
        }
    }

    /// Whether both snapshots describe the same track.
    pub fn same_track(&self, other: &TrackInfo) -> bool {
        self.title == other.title
    }

    /// Duration formatted as `m:ss`.
    pub fn duration_display(&self) -> Option<String> {
        self.duration_seconds
            .map(|secs| format!("{}:{:02}", secs / 60, secs % 60))
    }
}

/// The API is loose about `duration`: it may be an integer, a float, a numeric
/// string or null.
fn duration_from_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>
{
    let secs = match <Option<Value> as Deserialize>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64),
        _ => None
    };

    Ok(secs.filter(|s| *s > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_payload() {
        let track: TrackInfo = serde_json::from_value(json!({
            "title": "Song A",
            "artist": "Someone",
            "album": "Record",
            "duration": 215,
            "cover": "https://cdn.example/cover.jpg",
            "buy_link": "https://shop.example/a",
            "started_at": "2024-01-01T00:00:00Z"
        })).unwrap();

        assert_eq!(track.title, "Song A");
        assert_eq!(track.artist.as_deref(), Some("Someone"));
        assert_eq!(track.duration_seconds, Some(215));
        assert_eq!(track.duration_display().as_deref(), Some("3:35"));
        assert_eq!(track.cover_url.as_deref(), Some("https://cdn.example/cover.jpg"));
        assert_eq!(track.purchase_url.as_deref(), Some("https://shop.example/a"));
    }

    #[test]
    fn tolerates_loose_durations() {
        let from = |v: Value| -> Option<u64> {
            serde_json::from_value::<TrackInfo>(json!({ "title": "x", "duration": v }))
                .unwrap()
                .duration_seconds
        };

        assert_eq!(from(json!("61")), Some(61));
        assert_eq!(from(json!(61.9)), Some(61));
        assert_eq!(from(json!(0)), None);
        assert_eq!(from(json!(-5)), None);
        assert_eq!(from(json!("soon")), None);
        assert_eq!(from(Value::Null), None);
    }

    #[test]
    fn title_is_required() {
        assert!(serde_json::from_value::<TrackInfo>(json!({ "artist": "a" })).is_err());
    }

    #[test]
    fn identity_is_title_only() {
        let mut a = TrackInfo::new("Song");
        let b = TrackInfo::new("Song");
        a.artist = Some("Other".into());

        assert!(a.same_track(&b));
        assert!(!a.same_track(&TrackInfo::new("Song B")));
    }
}
