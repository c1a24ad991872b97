//! Compile-time tuning constants
//!
//! Central place for the sizing knobs of the layer. Ports may assume these
//! are small powers of two where noted.

/// Default stack size hint for spawned tasks, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Number of wait-state slots shared by all watched addresses.
/// Must be a power of two; aliasing between addresses is harmless because
/// waiters revalidate their predicate after every wake.
pub const WAITSTATE_SLOTS: usize = 16;

/// Direct predicate probes (with yields) before a wait-state waiter blocks.
pub const WAITSTATE_SPIN_TRIES: usize = 10;

/// Tick rate of the hosted port: 1 tick = 1 ms.
pub const TICK_RATE_HZ: u32 = 1000;
