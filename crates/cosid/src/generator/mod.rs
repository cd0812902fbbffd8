mod atomic;
mod clock_sync;
mod friendly;
mod interface;
mod lock;
mod sequence;
mod status;
mod string;

pub use atomic::*;
pub use clock_sync::*;
pub use friendly::*;
pub use interface::*;
pub use lock::*;
pub use status::*;
pub use string::*;


/// Default back-off between polls of a pending generator.
///
/// A zero wait means a lost compare-and-swap race, so the caller retries
/// immediately; anything else means the sequence is exhausted for the
/// current tick.
pub(crate) fn backoff(yield_for: u64) {
    if yield_for == 0 {
        core::hint::spin_loop();
    } else {
        std::thread::yield_now();
    }
}
