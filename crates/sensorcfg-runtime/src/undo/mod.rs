#![forbid(unsafe_code)]

//! Gesture history.
//!
//! Every edit the UI makes is an [`ActionGroup`](sensorcfg_core::ActionGroup)
//! handed to [`UndoManager::enact`] with an [`EnactKind`] saying whether it
//! belongs in history.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  enact(group, kind)  ┌──────────────┐  apply   ┌───────┐
//! │  UI / push   │ ───────────────────► │ UndoManager  │ ───────► │ Store │
//! └──────────────┘                      │ done  undone │ reverse  └───────┘
//!                                       └──────┬───────┘
//!                                              │ awaited gestures
//!                                              ▼
//!                                       GestureObserver (tutorial)
//! ```
//!
//! # Module Structure
//!
//! - [`history`]: `UndoManager`, enact kinds, the observer hook
//! - [`gesture`]: `GestureBuilder` for assembling groups with inverse data

pub mod gesture;
pub mod history;

pub use gesture::{GestureBuilder, GestureError};
pub use history::{
    EnactKind, Gesture, GestureObserver, HistoryConfig, NoObserver, ObserverMark, UndoManager,
};
