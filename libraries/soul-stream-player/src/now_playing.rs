//! Now-playing information shown by the system media display

use crate::item::AudioItem;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot handed to the [`NowPlayingCenter`](crate::capability::NowPlayingCenter)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_count: Option<u32>,
    pub track_number: Option<u32>,
    pub artwork: Option<Arc<[u8]>>,
    pub duration: Option<Duration>,
    pub elapsed: Option<Duration>,
    pub playback_rate: f32,
}

impl NowPlayingInfo {
    /// Build the snapshot for `item` at the given playback position
    pub fn for_item(
        item: &AudioItem,
        duration: Option<Duration>,
        elapsed: Option<Duration>,
        playback_rate: f32,
    ) -> Self {
        let metadata = item.metadata();
        Self {
            title: metadata.title,
            artist: metadata.artist,
            album: metadata.album,
            track_count: metadata.track_count,
            track_number: metadata.track_number,
            artwork: metadata.artwork,
            duration,
            elapsed,
            playback_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn snapshot_copies_item_fields() {
        let url = Url::parse("https://cdn.example.com/a.mp3").unwrap();
        let item = AudioItem::with_urls(None, Some(url), None).unwrap();
        item.set_title(Some("Title".into()));
        item.set_track_count(Some(9));

        let info = NowPlayingInfo::for_item(
            &item,
            Some(Duration::from_secs(200)),
            Some(Duration::from_secs(12)),
            1.0,
        );

        assert_eq!(info.title.as_deref(), Some("Title"));
        assert_eq!(info.track_count, Some(9));
        assert_eq!(info.artist, None);
        assert_eq!(info.duration, Some(Duration::from_secs(200)));
        assert_eq!(info.playback_rate, 1.0);
    }
}
