//! Randomness used by `States.UUID`, `States.MathRandom` and retry jitter.

use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// A source of randomness that can be swapped out in tests.
pub trait RandomSource: Send + Sync + fmt::Debug {
  /// A uniform value in `[0, 1)`.
  fn next_f64(&self) -> f64;

  /// Fill `dest` with random bytes.
  fn fill_bytes(&self, dest: &mut [u8]);
}

/// Thread-local OS-seeded randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
  fn next_f64(&self) -> f64 {
    rand::thread_rng().r#gen::<f64>()
  }

  fn fill_bytes(&self, dest: &mut [u8]) {
    rand::thread_rng().fill_bytes(dest);
  }
}

/// Deterministic randomness from a fixed seed.
#[derive(Debug)]
pub struct SeededRandom {
  rng: Mutex<StdRng>,
}

impl SeededRandom {
  pub fn new(seed: u64) -> Self {
    Self {
      rng: Mutex::new(StdRng::seed_from_u64(seed)),
    }
  }
}

impl RandomSource for SeededRandom {
  fn next_f64(&self) -> f64 {
    let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
    rng.r#gen::<f64>()
  }

  fn fill_bytes(&self, dest: &mut [u8]) {
    let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
    rng.fill_bytes(dest);
  }
}

/// Always returns the same fraction; handy for pinning jitter in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
  fn next_f64(&self) -> f64 {
    self.0
  }

  fn fill_bytes(&self, dest: &mut [u8]) {
    let byte = (self.0 * 255.0) as u8;
    dest.fill(byte);
  }
}
