//! Audio item queue
//!
//! Keeps two lists: `items` in the order the caller supplied them, and
//! `queue` in the order they will actually play (shuffled or not). A cursor
//! (`next_position`) points at the next entry of `queue` to hand out, and
//! `historic` records every item that was handed out.
//!
//! Mode changes are reconciled against the cursor so the item that is
//! currently playing stays the anchor when shuffle or repeat is toggled.

use crate::item::AudioItem;
use crate::shuffle::{shuffle_around, shuffle_random};
use crate::types::PlayerMode;
use std::sync::Arc;
use tracing::trace;

/// Veto hook consulted before an item is handed out
///
/// Returning `false` skips the item (for example an item that cannot be
/// played offline). Items skipped this way are never recorded in history.
pub trait AudioItemQueueDelegate: Send + Sync {
    fn should_consider_item(&self, item: &AudioItem) -> bool;
}

impl<F> AudioItemQueueDelegate for F
where
    F: Fn(&AudioItem) -> bool + Send + Sync,
{
    fn should_consider_item(&self, item: &AudioItem) -> bool {
        self(item)
    }
}

/// Ordered collection of items with shuffle and repeat semantics
pub struct AudioItemQueue {
    items: Vec<AudioItem>,
    queue: Vec<AudioItem>,
    historic: Vec<AudioItem>,
    next_position: usize,
    mode: PlayerMode,
    delegate: Option<Arc<dyn AudioItemQueueDelegate>>,
}

impl AudioItemQueue {
    /// Create a queue; the play order is shuffled right away in shuffle mode
    pub fn new(items: Vec<AudioItem>, mode: PlayerMode) -> Self {
        let mut queue = items.clone();
        if mode.is_shuffle_active() {
            shuffle_random(&mut queue);
        }

        Self {
            items,
            queue,
            historic: Vec::new(),
            next_position: 0,
            mode,
            delegate: None,
        }
    }

    // ===== Navigation =====

    /// Hand out the next item
    ///
    /// In repeat mode the anchored item is returned every time without
    /// consulting the delegate. Otherwise the cursor moves forward past vetoed
    /// items; in repeat-all mode it wraps around at most once.
    pub fn next_item(&mut self) -> Option<AudioItem> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }

        if self.mode.is_repeat_one() {
            let item = self.queue[self.next_position.min(len - 1)].clone();
            self.historic.push(item.clone());
            return Some(item);
        }

        let repeat_all = self.mode.is_repeat_all();
        let budget = if repeat_all {
            len
        } else {
            len.saturating_sub(self.next_position)
        };

        for _ in 0..budget {
            if self.next_position >= len {
                self.next_position = 0;
            }

            let item = self.queue[self.next_position].clone();
            self.next_position += 1;

            if self.should_consider(&item) {
                self.historic.push(item.clone());
                return Some(item);
            }
            trace!(item = %item.id(), "Skipping vetoed item");
        }

        if repeat_all && self.next_position >= len {
            self.next_position = 0;
        }
        None
    }

    /// Hand out the previous item
    ///
    /// Mirror of [`next_item`](Self::next_item). In repeat mode the item just
    /// before the cursor is returned; in repeat-all mode the cursor wraps to
    /// the tail when it reaches the head.
    pub fn previous_item(&mut self) -> Option<AudioItem> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }
        self.next_position = self.next_position.min(len);

        if self.mode.is_repeat_one() {
            let item = self.queue[self.next_position.saturating_sub(1)].clone();
            self.historic.push(item.clone());
            return Some(item);
        }

        let repeat_all = self.mode.is_repeat_all();
        let budget = if repeat_all { len } else { self.next_position };

        for _ in 0..budget {
            if self.next_position == 0 {
                self.next_position = len;
            }

            self.next_position -= 1;
            let item = self.queue[self.next_position].clone();

            if self.should_consider(&item) {
                self.historic.push(item.clone());
                return Some(item);
            }
            trace!(item = %item.id(), "Skipping vetoed item");
        }

        if repeat_all && self.next_position == 0 {
            self.next_position = len;
        }
        None
    }

    /// Whether [`next_item`](Self::next_item) could return an item, ignoring vetoes
    pub fn has_next_item(&self) -> bool {
        !self.queue.is_empty()
            && (self.queue.len() > self.next_position
                || self.mode.is_repeat_one()
                || self.mode.is_repeat_all())
    }

    /// Whether [`previous_item`](Self::previous_item) could return an item, ignoring vetoes
    pub fn has_previous_item(&self) -> bool {
        !self.queue.is_empty()
            && (self.next_position > 0 || self.mode.is_repeat_one() || self.mode.is_repeat_all())
    }

    // ===== Mode =====

    pub fn mode(&self) -> PlayerMode {
        self.mode
    }

    /// Change the mode and reconcile the cursor with the new order
    pub fn set_mode(&mut self, mode: PlayerMode) {
        let old = std::mem::replace(&mut self.mode, mode);
        if old != mode {
            self.adapt_queue(old);
        }
    }

    fn adapt_queue(&mut self, old: PlayerMode) {
        let new = self.mode;
        let len = self.queue.len();
        if len == 0 {
            return;
        }

        if new.is_repeat_all() && !old.is_repeat_all() {
            self.next_position %= len;
        }

        if old.is_repeat_one() && !new.is_repeat_one() {
            let anchored = self.queue.get(self.next_position);
            if anchored.is_some() && self.historic.last() == anchored {
                self.next_position += 1;
            }
        } else if new.is_repeat_one() && !old.is_repeat_one() && self.next_position == len {
            self.next_position -= 1;
        }

        if old.is_shuffle_active() && !new.is_shuffle_active() {
            self.queue = self.items.clone();
            let relocated = self
                .historic
                .last()
                .and_then(|last| self.queue.iter().position(|item| item == last));
            if let Some(index) = relocated {
                self.next_position = index + 1;
            }
        } else if new.is_shuffle_active() && !old.is_shuffle_active() {
            shuffle_around(&mut self.queue, self.next_position);
        }

        trace!(?old, ?new, next_position = self.next_position, "Queue adapted to mode");
    }

    // ===== Mutation =====

    /// Append items to both the original and the play order
    pub fn add(&mut self, items: impl IntoIterator<Item = AudioItem>) {
        for item in items {
            self.items.push(item.clone());
            self.queue.push(item);
        }
    }

    /// Remove the item at `index` of the play order
    ///
    /// The first equal item is also removed from the original order.
    pub fn remove(&mut self, index: usize) -> Option<AudioItem> {
        if index >= self.queue.len() {
            return None;
        }

        let item = self.queue.remove(index);
        if let Some(position) = self.items.iter().position(|i| *i == item) {
            self.items.remove(position);
        }
        Some(item)
    }

    /// Install or clear the veto hook
    pub fn set_delegate(&mut self, delegate: Option<Arc<dyn AudioItemQueueDelegate>>) {
        self.delegate = delegate;
    }

    /// Move the cursor, clamped to the queue length
    pub fn set_next_position(&mut self, position: usize) {
        self.next_position = position.min(self.queue.len());
    }

    // ===== Queries =====

    /// Items in the order they were supplied
    pub fn items(&self) -> &[AudioItem] {
        &self.items
    }

    /// Items in play order
    pub fn queue(&self) -> &[AudioItem] {
        &self.queue
    }

    /// Every item handed out so far
    pub fn historic(&self) -> &[AudioItem] {
        &self.historic
    }

    pub fn next_position(&self) -> usize {
        self.next_position
    }

    /// The item [`next_item`](Self::next_item) would hand out, without moving
    /// the cursor or touching the history
    pub fn peek_next_item(&self) -> Option<&AudioItem> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }
        if self.mode.is_repeat_one() {
            return self.queue.get(self.next_position.min(len - 1));
        }

        let start = self.next_position.min(len);
        let candidates = if self.mode.is_repeat_all() {
            len
        } else {
            len - start
        };
        (0..candidates)
            .map(|offset| &self.queue[(start + offset) % len])
            .find(|item| self.should_consider(item))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn should_consider(&self, item: &AudioItem) -> bool {
        self.delegate
            .as_ref()
            .map_or(true, |delegate| delegate.should_consider_item(item))
    }
}

impl std::fmt::Debug for AudioItemQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioItemQueue")
            .field("items", &self.items.len())
            .field("next_position", &self.next_position)
            .field("historic", &self.historic.len())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn create_test_item(n: usize) -> AudioItem {
        let url = Url::parse(&format!("https://cdn.example.com/{}.mp3", n)).unwrap();
        AudioItem::with_urls(None, Some(url), None).unwrap()
    }

    fn create_items(count: usize) -> Vec<AudioItem> {
        (1..=count).map(create_test_item).collect()
    }

    fn veto(item: &AudioItem) -> Arc<dyn AudioItemQueueDelegate> {
        let vetoed = item.clone();
        Arc::new(move |candidate: &AudioItem| *candidate != vetoed)
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let mut queue = AudioItemQueue::new(vec![], PlayerMode::REPEAT_ALL);
        assert!(!queue.has_next_item());
        assert!(!queue.has_previous_item());
        assert!(queue.next_item().is_none());
        assert!(queue.previous_item().is_none());
    }

    #[test]
    fn next_in_normal_mode_walks_once() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);

        for item in &items {
            assert!(queue.has_next_item());
            assert_eq!(queue.next_item().as_ref(), Some(item));
        }
        assert!(!queue.has_next_item());
        assert!(queue.next_item().is_none());
        assert_eq!(queue.next_position(), 3);
        assert_eq!(queue.historic(), items.as_slice());
    }

    #[test]
    fn next_in_repeat_mode_stays_on_anchor() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT);
        queue.set_delegate(Some(veto(&items[0])));

        for _ in 0..5 {
            assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        }
        assert_eq!(queue.historic().len(), 5);
    }

    #[test]
    fn next_in_repeat_all_mode_cycles() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT_ALL);

        for round in 0..3 {
            for item in &items {
                assert_eq!(queue.next_item().as_ref(), Some(item), "round {}", round);
            }
        }
    }

    #[test]
    fn next_skips_vetoed_item() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        queue.set_delegate(Some(veto(&items[1])));

        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        assert_eq!(queue.next_item().as_ref(), Some(&items[2]));
        assert!(queue.next_item().is_none());
        assert!(!queue.historic().contains(&items[1]));
    }

    #[test]
    fn next_skips_vetoed_item_in_repeat_all_mode() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT_ALL);
        queue.set_delegate(Some(veto(&items[1])));

        let played: Vec<_> = (0..6).filter_map(|_| queue.next_item()).collect();
        assert_eq!(
            played,
            vec![
                items[0].clone(),
                items[2].clone(),
                items[0].clone(),
                items[2].clone(),
                items[0].clone(),
                items[2].clone()
            ]
        );
    }

    #[test]
    fn peek_matches_next_without_moving() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT_ALL);
        queue.set_delegate(Some(veto(&items[1])));

        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        assert_eq!(queue.peek_next_item(), Some(&items[2]));
        assert_eq!(queue.peek_next_item(), Some(&items[2]));
        assert_eq!(queue.historic().len(), 1);

        assert_eq!(queue.next_item().as_ref(), Some(&items[2]));
        assert_eq!(queue.peek_next_item(), Some(&items[0]));

        let mut normal = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        normal.set_next_position(3);
        assert!(normal.peek_next_item().is_none());
    }

    #[test]
    fn fully_vetoed_repeat_all_terminates() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items, PlayerMode::REPEAT_ALL);
        queue.set_delegate(Some(Arc::new(|_: &AudioItem| false)));

        assert!(queue.has_next_item());
        assert!(queue.next_item().is_none());
        assert!(queue.previous_item().is_none());
        assert!(queue.historic().is_empty());
    }

    #[test]
    fn previous_in_normal_mode() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);

        assert!(!queue.has_previous_item());
        assert!(queue.previous_item().is_none());

        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        assert!(queue.has_previous_item());
        assert_eq!(queue.previous_item().as_ref(), Some(&items[0]));
        assert!(!queue.has_previous_item());
    }

    #[test]
    fn previous_in_repeat_all_mode_wraps_to_tail() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT_ALL);

        assert_eq!(queue.previous_item().as_ref(), Some(&items[2]));
        assert_eq!(queue.previous_item().as_ref(), Some(&items[1]));
        assert_eq!(queue.previous_item().as_ref(), Some(&items[0]));
        assert_eq!(queue.previous_item().as_ref(), Some(&items[2]));
    }

    #[test]
    fn previous_in_repeat_mode_pins_before_cursor() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT);

        assert_eq!(queue.previous_item().as_ref(), Some(&items[0]));
        queue.set_next_position(2);
        assert_eq!(queue.previous_item().as_ref(), Some(&items[1]));
        assert_eq!(queue.previous_item().as_ref(), Some(&items[1]));
    }

    #[test]
    fn previous_skips_vetoed_item() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        queue.set_next_position(3);
        queue.set_delegate(Some(veto(&items[1])));

        assert_eq!(queue.previous_item().as_ref(), Some(&items[2]));
        assert_eq!(queue.previous_item().as_ref(), Some(&items[0]));
        assert!(queue.previous_item().is_none());
    }

    #[test]
    fn leaving_repeat_moves_past_anchor() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT);

        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        queue.set_mode(PlayerMode::NORMAL);
        assert_eq!(queue.next_item().as_ref(), Some(&items[1]));
    }

    #[test]
    fn leaving_repeat_on_single_item_ends_queue() {
        let items = create_items(1);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::REPEAT);

        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
        queue.set_mode(PlayerMode::NORMAL);
        assert!(queue.next_item().is_none());
    }

    #[test]
    fn entering_repeat_at_end_anchors_last_item() {
        let items = create_items(2);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        queue.next_item();
        queue.next_item();
        assert!(!queue.has_next_item());

        queue.set_mode(PlayerMode::REPEAT);
        assert_eq!(queue.next_position(), 1);
        assert_eq!(queue.next_item().as_ref(), Some(&items[1]));
    }

    #[test]
    fn entering_repeat_all_normalizes_cursor() {
        let items = create_items(2);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        queue.next_item();
        queue.next_item();

        queue.set_mode(PlayerMode::REPEAT_ALL);
        assert_eq!(queue.next_position(), 0);
        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));
    }

    #[test]
    fn enabling_shuffle_keeps_played_items_behind_cursor() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        assert_eq!(queue.next_item().as_ref(), Some(&items[0]));

        queue.set_mode(PlayerMode::SHUFFLE);
        assert_eq!(queue.queue()[0], items[0]);

        let rest: Vec<_> = std::iter::from_fn(|| queue.next_item()).collect();
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&items[0]));
    }

    #[test]
    fn disabling_shuffle_restores_order_after_last_played() {
        let items = create_items(5);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::SHUFFLE);

        let played = queue.next_item().unwrap();
        queue.set_mode(PlayerMode::NORMAL);

        assert_eq!(queue.queue(), items.as_slice());
        let index = items.iter().position(|i| *i == played).unwrap();
        assert_eq!(queue.next_position(), index + 1);
    }

    #[test]
    fn add_appends_without_reshuffling() {
        let items = create_items(2);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);
        let extra = create_items(2);
        queue.add(extra.clone());

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.items()[2], extra[0]);
        assert_eq!(queue.queue()[3], extra[1]);
    }

    #[test]
    fn remove_drops_from_both_lists() {
        let items = create_items(3);
        let mut queue = AudioItemQueue::new(items.clone(), PlayerMode::NORMAL);

        assert_eq!(queue.remove(1), Some(items[1].clone()));
        assert_eq!(queue.items(), &[items[0].clone(), items[2].clone()]);
        assert_eq!(queue.queue(), &[items[0].clone(), items[2].clone()]);
        assert!(queue.remove(5).is_none());
    }
}
