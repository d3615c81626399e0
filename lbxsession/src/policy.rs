//! Queue-advance and completion policies.
//!
//! Pure functions over (length, selection, mode); the coordinator applies
//! their results to the session state. Two behaviors are preserved exactly
//! as observed rather than "fixed":
//! - `next` honors shuffle, `previous` never does (it always wraps
//!   arithmetically),
//! - shuffle re-samples until it lands on a different index, which is fine
//!   because it only does so for queues longer than one.

use lbxmodel::RepeatMode;
use rand::Rng;

/// Index selected by a `next` command. `None` on an empty queue.
pub fn next_index<R: Rng + ?Sized>(
    len: usize,
    current: Option<usize>,
    shuffle: bool,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if shuffle {
        if len == 1 {
            return Some(0);
        }
        loop {
            let candidate = rng.random_range(0..len);
            if Some(candidate) != current {
                return Some(candidate);
            }
        }
    } else {
        Some(current.map_or(0, |c| (c + 1) % len))
    }
}

/// Index selected by a `previous` command: wraps arithmetically, shuffle or
/// not. `None` on an empty queue.
pub fn prev_index(len: usize, current: Option<usize>) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let cur = current.map_or(-1, |c| c as i64);
    Some((cur - 1 + len as i64).rem_euclid(len as i64) as usize)
}

/// What to do when the current track ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionAction {
    /// Restart the current track.
    Replay,
    /// Advance via the next-index policy.
    Advance,
    /// Queue exhausted: stop, keep the selection where it is.
    Stop,
}

/// Completion policy. Callers guarantee a non-empty queue.
pub fn on_track_ended(
    repeat: RepeatMode,
    shuffle: bool,
    current: Option<usize>,
    len: usize,
) -> CompletionAction {
    match repeat {
        RepeatMode::One => CompletionAction::Replay,
        RepeatMode::All => CompletionAction::Advance,
        RepeatMode::Off => {
            let is_last = current.is_some_and(|c| c + 1 >= len);
            if !is_last || shuffle {
                CompletionAction::Advance
            } else {
                CompletionAction::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_next_wraps() {
        let mut rng = rand::rng();
        assert_eq!(next_index(3, Some(1), false, &mut rng), Some(2));
        assert_eq!(next_index(3, Some(2), false, &mut rng), Some(0));
        assert_eq!(next_index(3, None, false, &mut rng), Some(0));
        assert_eq!(next_index(0, None, false, &mut rng), None);
    }

    #[test]
    fn previous_wraps_and_ignores_shuffle() {
        assert_eq!(prev_index(3, Some(1)), Some(0));
        assert_eq!(prev_index(3, Some(0)), Some(2));
        assert_eq!(prev_index(3, None), Some(1));
        assert_eq!(prev_index(1, None), Some(0));
        assert_eq!(prev_index(0, None), None);
    }

    #[test]
    fn next_previous_asymmetry() {
        // Spec scenario: 3-item queue at index 1.
        let mut rng = rand::rng();
        let after_next = next_index(3, Some(1), false, &mut rng);
        assert_eq!(after_next, Some(2));
        let wrapped = next_index(3, after_next, false, &mut rng);
        assert_eq!(wrapped, Some(0));
        assert_eq!(prev_index(3, Some(0)), Some(2));
    }

    #[test]
    fn shuffle_never_repeats_the_current_index() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let picked = next_index(5, Some(2), true, &mut rng);
            assert_ne!(picked, Some(2));
            assert!(picked.unwrap() < 5);
        }
    }

    #[test]
    fn shuffle_on_a_single_entry_stays_put() {
        let mut rng = rand::rng();
        assert_eq!(next_index(1, Some(0), true, &mut rng), Some(0));
    }

    #[test]
    fn completion_policy_table() {
        use CompletionAction::*;
        // (repeat, shuffle, current, len) -> action
        assert_eq!(on_track_ended(RepeatMode::One, false, Some(2), 3), Replay);
        assert_eq!(on_track_ended(RepeatMode::One, true, Some(2), 3), Replay);
        assert_eq!(on_track_ended(RepeatMode::All, false, Some(2), 3), Advance);
        assert_eq!(on_track_ended(RepeatMode::Off, false, Some(1), 3), Advance);
        assert_eq!(on_track_ended(RepeatMode::Off, true, Some(2), 3), Advance);
        assert_eq!(on_track_ended(RepeatMode::Off, false, Some(2), 3), Stop);
    }
}
