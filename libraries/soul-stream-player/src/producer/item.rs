//! Current item observation

use super::{EventProducer, EventSink};
use crate::event::AudioItemEvent;
use crate::item::{AudioItem, ItemChange};
use parking_lot::Mutex;
use std::sync::Arc;

/// Reports changes to the current item's descriptive fields
pub struct AudioItemEventProducer {
    sink: EventSink,
    item: Option<AudioItem>,
    active: Option<Arc<Mutex<bool>>>,
}

impl AudioItemEventProducer {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            item: None,
            active: None,
        }
    }

    /// Observe another item, detaching from the previous one
    pub fn set_item(&mut self, item: Option<AudioItem>) {
        self.stop_producing_events();
        self.item = item;
    }
}

impl EventProducer for AudioItemEventProducer {
    fn start_producing_events(&mut self) {
        if self.active.is_some() {
            return;
        }
        let Some(item) = &self.item else {
            return;
        };

        let active = Arc::new(Mutex::new(true));
        let gate = Arc::clone(&active);
        let sink = self.sink.clone();
        item.set_observer(Some(Arc::new(move |change: ItemChange| {
            let active = gate.lock();
            if *active {
                sink.emit(AudioItemEvent::Updated(change));
            }
        })));
        self.active = Some(active);
    }

    fn stop_producing_events(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        *active.lock() = false;
        if let Some(item) = &self.item {
            item.set_observer(None);
        }
    }

    fn is_producing_events(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for AudioItemEventProducer {
    fn drop(&mut self) {
        self.stop_producing_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use url::Url;

    fn item() -> AudioItem {
        let url = Url::parse("https://cdn.example.com/a.mp3").unwrap();
        AudioItem::with_urls(None, Some(url), None).unwrap()
    }

    #[test]
    fn reports_changes_while_producing() {
        let (sink, mut rx) = EventSink::channel();
        let mut producer = AudioItemEventProducer::new(sink);
        let first = item();
        producer.set_item(Some(first.clone()));

        first.set_title(Some("Not yet".into()));
        assert!(rx.try_recv().is_err());

        producer.start_producing_events();
        first.set_artist(Some("Artist".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::AudioItem(AudioItemEvent::Updated(ItemChange::Artist))
        );

        let second = item();
        producer.set_item(Some(second.clone()));
        first.set_album(Some("Old".into()));
        assert!(rx.try_recv().is_err());
        assert!(!producer.is_producing_events());
    }
}
