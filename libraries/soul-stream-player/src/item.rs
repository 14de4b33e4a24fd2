//! Playable items
//!
//! An [`AudioItem`] is a cheap handle: clones share the same sources and
//! metadata, and equality is identity. Metadata fields may be filled in while
//! the item plays; each change is reported to the item's observer as an
//! [`ItemChange`].

use crate::error::{PlaybackError, Result};
use crate::types::AudioQuality;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Callback receiving item field changes
pub type ItemObserver = Arc<dyn Fn(ItemChange) + Send + Sync>;

/// Which descriptive field of an item changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemChange {
    Title,
    Artist,
    Album,
    TrackCount,
    TrackNumber,
    Artwork,
}

/// Descriptive fields of an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_count: Option<u32>,
    pub track_number: Option<u32>,
    /// Encoded artwork image
    pub artwork: Option<Arc<[u8]>>,
}

/// Well-known metadata keys reported by a decoder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Title,
    Artist,
    Album,
    TrackNumber,
    Artwork,
    /// Any key the player does not interpret
    Other(String),
}

/// Raw metadata value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Number(i64),
    Data(Arc<[u8]>),
}

/// One metadata entry discovered during playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    pub key: MetadataKey,
    pub value: MetadataValue,
}

impl MetadataItem {
    pub fn new(key: MetadataKey, value: MetadataValue) -> Self {
        Self { key, value }
    }

    fn as_text(&self) -> Option<String> {
        match &self.value {
            MetadataValue::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<u32> {
        match &self.value {
            MetadataValue::Number(n) => u32::try_from(*n).ok(),
            MetadataValue::Text(text) => text.split('/').next()?.trim().parse().ok(),
            MetadataValue::Data(_) => None,
        }
    }

    fn as_data(&self) -> Option<Arc<[u8]>> {
        match &self.value {
            MetadataValue::Data(data) => Some(Arc::clone(data)),
            _ => None,
        }
    }
}

/// A source locator together with its effective quality tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSource {
    pub quality: AudioQuality,
    pub url: Url,
}

impl ItemSource {
    /// Whether this source plays without network access
    pub fn is_offline(&self) -> bool {
        is_offline(&self.url)
    }
}

/// Whether a locator is always available regardless of connectivity
///
/// Local files, device media library references and loopback hosts qualify.
pub fn is_offline(url: &Url) -> bool {
    if matches!(url.scheme(), "file" | "ipod-library") {
        return true;
    }
    matches!(url.host_str(), Some("localhost" | "127.0.0.1"))
}

struct ItemInner {
    id: Uuid,
    sources: BTreeMap<AudioQuality, Url>,
    primary: ItemSource,
    metadata: RwLock<ItemMetadata>,
    observer: Mutex<Option<ItemObserver>>,
}

/// A playable unit with one source per available quality tier
#[derive(Clone)]
pub struct AudioItem {
    inner: Arc<ItemInner>,
}

impl AudioItem {
    /// Create an item from its quality tiers
    ///
    /// Fails with [`PlaybackError::NoSources`] when `sources` is empty.
    pub fn new(sources: BTreeMap<AudioQuality, Url>) -> Result<Self> {
        let primary = sources
            .iter()
            .next_back()
            .map(|(quality, url)| ItemSource {
                quality: *quality,
                url: url.clone(),
            })
            .ok_or(PlaybackError::NoSources)?;

        Ok(Self {
            inner: Arc::new(ItemInner {
                id: Uuid::new_v4(),
                sources,
                primary,
                metadata: RwLock::new(ItemMetadata::default()),
                observer: Mutex::new(None),
            }),
        })
    }

    /// Create an item from optional per-tier URLs
    pub fn with_urls(high: Option<Url>, medium: Option<Url>, low: Option<Url>) -> Result<Self> {
        let sources = [
            (AudioQuality::High, high),
            (AudioQuality::Medium, medium),
            (AudioQuality::Low, low),
        ]
        .into_iter()
        .filter_map(|(quality, url)| url.map(|url| (quality, url)))
        .collect();

        Self::new(sources)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// All sources, keyed by tier
    pub fn sources(&self) -> &BTreeMap<AudioQuality, Url> {
        &self.inner.sources
    }

    /// The source registered for exactly this tier
    pub fn source(&self, quality: AudioQuality) -> Option<&Url> {
        self.inner.sources.get(&quality)
    }

    /// Best source for a requested tier, falling back to the nearest one
    pub fn url_for_quality(&self, quality: AudioQuality) -> ItemSource {
        quality
            .fallback_order()
            .into_iter()
            .find_map(|q| {
                self.inner.sources.get(&q).map(|url| ItemSource {
                    quality: q,
                    url: url.clone(),
                })
            })
            .unwrap_or_else(|| self.inner.primary.clone())
    }

    pub fn high_quality_url(&self) -> ItemSource {
        self.url_for_quality(AudioQuality::High)
    }

    pub fn medium_quality_url(&self) -> ItemSource {
        self.url_for_quality(AudioQuality::Medium)
    }

    pub fn low_quality_url(&self) -> ItemSource {
        self.url_for_quality(AudioQuality::Low)
    }

    /// Nearest available tier strictly below `quality`
    pub fn lower_quality_than(&self, quality: AudioQuality) -> Option<AudioQuality> {
        self.inner
            .sources
            .range(..quality)
            .next_back()
            .map(|(q, _)| *q)
    }

    /// Nearest available tier strictly above `quality`
    pub fn higher_quality_than(&self, quality: AudioQuality) -> Option<AudioQuality> {
        use std::ops::Bound::{Excluded, Unbounded};

        self.inner
            .sources
            .range((Excluded(quality), Unbounded))
            .next()
            .map(|(q, _)| *q)
    }

    // ===== Metadata =====

    /// Snapshot of the descriptive fields
    pub fn metadata(&self) -> ItemMetadata {
        self.inner.metadata.read().clone()
    }

    pub fn title(&self) -> Option<String> {
        self.inner.metadata.read().title.clone()
    }

    pub fn artist(&self) -> Option<String> {
        self.inner.metadata.read().artist.clone()
    }

    pub fn album(&self) -> Option<String> {
        self.inner.metadata.read().album.clone()
    }

    pub fn set_title(&self, title: Option<String>) {
        self.update(ItemChange::Title, |m| m.title = title);
    }

    pub fn set_artist(&self, artist: Option<String>) {
        self.update(ItemChange::Artist, |m| m.artist = artist);
    }

    pub fn set_album(&self, album: Option<String>) {
        self.update(ItemChange::Album, |m| m.album = album);
    }

    pub fn set_track_count(&self, track_count: Option<u32>) {
        self.update(ItemChange::TrackCount, |m| m.track_count = track_count);
    }

    pub fn set_track_number(&self, track_number: Option<u32>) {
        self.update(ItemChange::TrackNumber, |m| m.track_number = track_number);
    }

    pub fn set_artwork(&self, artwork: Option<Arc<[u8]>>) {
        self.update(ItemChange::Artwork, |m| m.artwork = artwork);
    }

    /// Fill empty fields from metadata discovered by the decoder
    ///
    /// Fields that already hold a value are left untouched.
    pub fn parse_metadata(&self, items: &[MetadataItem]) {
        for item in items {
            let current = self.metadata();
            match item.key {
                MetadataKey::Title if current.title.is_none() => {
                    if let Some(title) = item.as_text() {
                        self.set_title(Some(title));
                    }
                }
                MetadataKey::Artist if current.artist.is_none() => {
                    if let Some(artist) = item.as_text() {
                        self.set_artist(Some(artist));
                    }
                }
                MetadataKey::Album if current.album.is_none() => {
                    if let Some(album) = item.as_text() {
                        self.set_album(Some(album));
                    }
                }
                MetadataKey::TrackNumber if current.track_number.is_none() => {
                    if let Some(number) = item.as_number() {
                        self.set_track_number(Some(number));
                    }
                }
                MetadataKey::Artwork if current.artwork.is_none() => {
                    if let Some(data) = item.as_data() {
                        self.set_artwork(Some(data));
                    }
                }
                _ => {}
            }
        }
    }

    // ===== Observation =====

    /// Install (or remove) the observer notified on field changes
    pub fn set_observer(&self, observer: Option<ItemObserver>) {
        *self.inner.observer.lock() = observer;
    }

    fn update(&self, change: ItemChange, apply: impl FnOnce(&mut ItemMetadata)) {
        apply(&mut *self.inner.metadata.write());

        let observer = self.inner.observer.lock().clone();
        if let Some(observer) = observer {
            observer(change);
        }
    }
}

impl PartialEq for AudioItem {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for AudioItem {}

impl Hash for AudioItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for AudioItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioItem")
            .field("id", &self.inner.id)
            .field("sources", &self.inner.sources)
            .finish_non_exhaustive()
    }
}
