//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! Desktop hosts still provide their own `AudioEngine`; decoding and output
//! are outside the core.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::SqliteSettingsStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let path = SqliteSettingsStore::default_path().unwrap();
//!     let settings = SqliteSettingsStore::new(path).await.unwrap();
//!     // Pass to CoreConfig::builder().settings_store(Arc::new(settings))
//! }
//! ```

mod settings;

pub use settings::SqliteSettingsStore;
