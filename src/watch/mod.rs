// src/watch/mod.rs

//! File watching.
//!
//! Turns filesystem changes under the project root into [`WatchTrigger`]s
//! for the bindings whose patterns match. It does not know about tasks or
//! the scheduler; the dev session decides what a trigger means.

pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use patterns::{bindings_for_paths, bindings_from_config, WatchAction, WatchBinding, WatchCallback};
pub use watcher::{spawn_watcher, WatchTrigger, WatcherHandle};
