#![forbid(unsafe_code)]

//! sensorcfg runtime.
//!
//! The moving parts of the configuration client on top of
//! `sensorcfg-core`: the [`Store`] that owns state and notifies subscribers,
//! the [`UndoManager`] that keeps gesture history, the [`TutorialMachine`]
//! that follows the same gestures, and the [`Session`] that wires them
//! together for one user.
//!
//! # Data flow
//!
//! ```text
//! gesture / server push
//!        │
//!        ▼
//! UndoManager::enact ──► Store::apply ──► subscribers
//!        │
//!        └──► TutorialMachine (if the gesture is awaited)
//! ```
//!
//! Everything runs on one thread; a batch is published as a single
//! snapshot.

pub mod config;
pub mod push;
pub mod session;
pub mod store;
pub mod tutorial;
pub mod undo;

pub use config::{ConfigError, EngineConfig, LoggingConfig, TutorialConfig};
pub use push::ServerPush;
pub use session::{Session, SessionError};
pub use store::{ApplyReport, Store, StoreSnapshot, Subscription};
pub use tutorial::{GraphError, TutorialGraph, TutorialMachine};
pub use undo::{
    EnactKind, Gesture, GestureBuilder, GestureError, GestureObserver, HistoryConfig, NoObserver,
    ObserverMark, UndoManager,
};
