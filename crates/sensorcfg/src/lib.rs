#![forbid(unsafe_code)]

//! sensorcfg public facade crate.
//!
//! Re-exports the data model and runtime, offers a prelude for UI code, and
//! sets up logging for the host process.
//!
//! ```ignore
//! use sensorcfg::prelude::*;
//!
//! let config = EngineConfig::load("sensorcfg.toml")?;
//! sensorcfg::logging::init(&config.logging)?;
//! let mut session = Session::from_startup_json(config, &startup_json)?;
//!
//! let group = session
//!     .gesture("rotate Sensor Zone")
//!     .update(zone, Patch::new().with("rotationDegrees", 90))?
//!     .build();
//! session.enact(group, EnactKind::UserUndoable);
//! ```

use std::path::Path;

use thiserror::Error;

pub mod logging;

// --- Core re-exports -------------------------------------------------------

pub use sensorcfg_core::{
    Action, ActionError, ActionGroup, DeviceKind, DynamicFrom, ErrorIndex, ErrorKey, ObjectId,
    ObjectRef, ObjectType, Patch, StateTree, UpdateType,
};

// --- Runtime re-exports ----------------------------------------------------

pub use sensorcfg_runtime::{
    ApplyReport, ConfigError, EnactKind, EngineConfig, GestureBuilder, GestureError,
    LoggingConfig, ServerPush, Session, SessionError, Store, StoreSnapshot, Subscription,
    TutorialGraph, UndoManager,
};

pub use logging::LoggingError;

// --- Errors ---------------------------------------------------------------

/// Top-level error for host applications.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Load the config at `config_path` (defaults when `None`), install logging,
/// and start a session from the startup snapshot.
pub fn launch(config_path: Option<&Path>, startup_json: &str) -> Result<Session> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    logging::init(&config.logging)?;
    Ok(Session::from_startup_json(config, startup_json)?)
}

/// Everyday imports for UI code.
pub mod prelude {
    pub use crate::{
        Action, ActionGroup, DeviceKind, EnactKind, EngineConfig, ErrorKey, ObjectRef, Patch,
        ServerPush, Session,
    };
}
