//! Typewriter decomposition: one keystroke script per character, each with
//! a jittered delay the executor sleeps for after sending the character.

use crate::applescript;
use rand::Rng;
use rand::rngs::ThreadRng;
use std::time::Duration;

pub struct Typewriter<R: Rng> {
    chars: std::vec::IntoIter<char>,
    speed_ms: u64,
    variance_ms: u64,
    rng: R,
}

impl Typewriter<ThreadRng> {
    pub fn new(text: &str, speed_ms: u64, variance_ms: u64) -> Self {
        Self::with_rng(text, speed_ms, variance_ms, rand::thread_rng())
    }
}

impl<R: Rng> Typewriter<R> {
    /// Tests inject a seeded generator here for deterministic delays.
    pub fn with_rng(text: &str, speed_ms: u64, variance_ms: u64, rng: R) -> Self {
        Self {
            chars: text.chars().collect::<Vec<_>>().into_iter(),
            speed_ms,
            variance_ms,
            rng,
        }
    }
}

impl<R: Rng> Iterator for Typewriter<R> {
    type Item = (String, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.chars.next()?;
        let jitter = self.rng.gen_range(0..=self.variance_ms);
        Some((
            applescript::type_char(c),
            Duration::from_millis(self.speed_ms + jitter),
        ))
    }
}
