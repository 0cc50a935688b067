#![forbid(unsafe_code)]

//! Guided tutorial driven by the gesture stream.
//!
//! - [`graph`]: validated state graphs and widget templates
//! - [`machine`]: the running tutorial, its subject binding and widgets

pub mod graph;
pub mod machine;

pub use graph::{
    AnchorTemplate, GraphError, TextTemplate, Transition, TutorialGraph, TutorialState,
    WidgetTemplate,
};
pub use machine::{TutorialMachine, WIDGET_ID_PREFIX};
