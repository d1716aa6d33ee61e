//! Thread-safety bound shared by every bridge trait.
//!
//! Native hosts hand the core engines and stores that are moved into spawned
//! status and persistence tasks, so they must be `Send + Sync`. A wasm32 host
//! runs on one thread with objects that are neither, so the bound vanishes
//! there.

#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}
