//! One-shot seeding of the process-wide CSPRNG used by every downstream
//! cryptographic operation.
//!
//! The OS RNG (`rand::rngs::OsRng`, backed by `getrandom`) is always the
//! actual source of IVs and nonces; no real OpenVPN target platform lets
//! application code replace its kernel CSPRNG wholesale. `prepare_prng`
//! instead folds caller-supplied seed material into a process-wide pool
//! that later draws mix in alongside the OS RNG, recovering the original
//! source's `PRNGEngine::seed` behavior without ever weakening randomness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;
use rand::RngCore;

use crate::error::Error;

static SEEDED: AtomicBool = AtomicBool::new(false);
static SEED_POOL: OnceLock<Mutex<[u8; 32]>> = OnceLock::new();

fn seed_pool() -> &'static Mutex<[u8; 32]> {
    SEED_POOL.get_or_init(|| Mutex::new([0u8; 32]))
}

/// Seeds the process-wide CSPRNG pool. Idempotent after the first
/// successful call; later calls are a no-op that still returns `true`.
///
/// Fails only if the OS entropy source itself cannot be reached.
pub fn prepare_prng(seed: &[u8]) -> crate::error::Result<bool> {
    if SEEDED.load(Ordering::Acquire) {
        return Ok(true);
    }

    // Touch the OS RNG once up front so a broken entropy source fails here
    // rather than silently later, on the first packet encrypted.
    let mut probe = [0u8; 8];
    rand::rngs::OsRng.try_fill_bytes(&mut probe).map_err(|_| Error::RandomGenerator)?;

    {
        let mut pool = seed_pool().lock();
        for (i, b) in seed.iter().enumerate() {
            pool[i % pool.len()] ^= *b;
        }
    }

    SEEDED.store(true, Ordering::Release);
    Ok(true)
}

/// Fills `dest` with cryptographically secure random bytes, mixing in the
/// seed pool if [`prepare_prng`] has been called.
pub fn fill_random(dest: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(dest);
    if SEEDED.load(Ordering::Acquire) {
        let pool = seed_pool().lock();
        for (i, b) in dest.iter_mut().enumerate() {
            *b ^= pool[i % pool.len()];
        }
    }
}
