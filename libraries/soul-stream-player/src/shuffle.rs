//! Shuffle helpers for queue randomization

use rand::seq::SliceRandom;
use rand::thread_rng;

/// Pure random shuffle using Fisher-Yates
///
/// Each element has equal probability of landing at any position.
pub fn shuffle_random<T>(items: &mut [T]) {
    let mut rng = thread_rng();
    items.shuffle(&mut rng);
}

/// Shuffle both sides of `split` independently
///
/// Elements before `split` stay before it and elements after stay after.
/// A `split` past the end is treated as the end.
pub fn shuffle_around<T>(items: &mut [T], split: usize) {
    let split = split.min(items.len());
    let (played, leftover) = items.split_at_mut(split);
    shuffle_random(played);
    shuffle_random(leftover);
}
