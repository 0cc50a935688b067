#![forbid(unsafe_code)]

//! Tutorial graphs: states, their help widgets, and gesture-labelled edges.
//!
//! A graph is data. It can be loaded from TOML or JSON, or taken from the
//! built-in [`TutorialGraph::walkthrough`]. Every constructor validates it:
//!
//! - the initial state and both ends of every edge exist
//! - no state is declared twice and no `(state, gesture)` pair has two edges
//! - terminal states have no outgoing edges
//! - widgets that mention the subject only appear in states with a subject
//!   type
//!
//! # Example
//!
//! ```toml
//! initial = "welcome"
//!
//! [[states]]
//! name = "welcome"
//! widgets = [{ anchor = { named = "startButton" }, text = "Press start." }]
//!
//! [[states]]
//! name = "placed"
//! subject = "device.sensorZone"
//! widgets = [{ anchor = "subject", text = "Drag {subject} into place." }]
//!
//! [[transitions]]
//! from = "welcome"
//! gesture = "add Sensor Zone"
//! to = "placed"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sensorcfg_core::{ObjectRef, ObjectType, Placement, WidgetAnchor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SUBJECT_PLACEHOLDER: &str = "subject";

/// Problems with a tutorial graph definition.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown placeholder `{{{placeholder}}}` in widget text")]
    UnknownPlaceholder { placeholder: String },
    #[error("unclosed placeholder in widget text {text:?}")]
    UnclosedPlaceholder { text: String },
    #[error("state `{0}` is declared more than once")]
    DuplicateState(String),
    #[error("initial state `{0}` is not declared")]
    UnknownInitial(String),
    #[error("edge `{from}` --[{gesture}]--> `{to}` references an undeclared state")]
    DanglingEdge {
        from: String,
        gesture: String,
        to: String,
    },
    #[error("state `{from}` has more than one edge for gesture `{gesture}`")]
    DuplicateEdge { from: String, gesture: String },
    #[error("terminal state `{0}` has outgoing edges")]
    TerminalEdge(String),
    #[error("state `{0}` has widgets that mention the subject but no subject type")]
    SubjectWithoutType(String),
    #[error("failed to read tutorial graph {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML tutorial graph: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON tutorial graph: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Widget templates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Subject,
}

/// Widget text with `{subject}` slots, filled with the bound object id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextTemplate {
    segments: Vec<Segment>,
}

impl TextTemplate {
    /// Parse `text`, rejecting placeholders other than `{subject}`.
    pub fn parse(text: &str) -> Result<Self, GraphError> {
        let mut template = Self::default();
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            template = template.text(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(GraphError::UnclosedPlaceholder {
                    text: text.to_owned(),
                });
            };
            let name = &after[..close];
            if name != SUBJECT_PLACEHOLDER {
                return Err(GraphError::UnknownPlaceholder {
                    placeholder: name.to_owned(),
                });
            }
            template = template.subject();
            rest = &after[close + 1..];
        }
        Ok(template.text(rest))
    }

    /// Append literal text.
    #[must_use]
    pub fn text(mut self, literal: &str) -> Self {
        if literal.is_empty() {
            return self;
        }
        match self.segments.last_mut() {
            Some(Segment::Literal(prev)) => prev.push_str(literal),
            _ => self.segments.push(Segment::Literal(literal.to_owned())),
        }
        self
    }

    /// Append a subject slot.
    #[must_use]
    pub fn subject(mut self) -> Self {
        self.segments.push(Segment::Subject);
        self
    }

    #[must_use]
    pub fn uses_subject(&self) -> bool {
        self.segments.contains(&Segment::Subject)
    }

    /// Fill subject slots with the subject's id. `None` when a slot exists
    /// but nothing is bound.
    #[must_use]
    pub fn render(&self, subject: Option<&ObjectRef>) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Subject => out.push_str(subject?.object_id.as_str()),
            }
        }
        Some(out)
    }
}

impl fmt::Display for TextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Subject => write!(f, "{{{SUBJECT_PLACEHOLDER}}}")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for TextTemplate {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TextTemplate> for String {
    fn from(value: TextTemplate) -> Self {
        value.to_string()
    }
}

/// Where a widget is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorTemplate {
    /// A fixed UI element.
    Named(String),
    /// The object the state is about.
    Subject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetTemplate {
    pub anchor: AnchorTemplate,
    pub text: TextTemplate,
    #[serde(default)]
    pub placement: Placement,
}

impl WidgetTemplate {
    #[must_use]
    pub fn named(anchor: impl Into<String>, text: TextTemplate) -> Self {
        Self {
            anchor: AnchorTemplate::Named(anchor.into()),
            text,
            placement: Placement::default(),
        }
    }

    #[must_use]
    pub fn on_subject(text: TextTemplate) -> Self {
        Self {
            anchor: AnchorTemplate::Subject,
            text,
            placement: Placement::default(),
        }
    }

    #[must_use]
    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn uses_subject(&self) -> bool {
        self.anchor == AnchorTemplate::Subject || self.text.uses_subject()
    }

    /// Resolve the anchor against the bound subject.
    #[must_use]
    pub fn resolve_anchor(&self, subject: Option<&ObjectRef>) -> Option<WidgetAnchor> {
        match &self.anchor {
            AnchorTemplate::Named(name) => Some(WidgetAnchor::Named(name.clone())),
            AnchorTemplate::Subject => subject.cloned().map(WidgetAnchor::Object),
        }
    }
}

// ============================================================================
// States and edges
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialState {
    pub name: String,
    /// Type of the object this state's widgets talk about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<ObjectType>,
    #[serde(default)]
    pub widgets: Vec<WidgetTemplate>,
    #[serde(default)]
    pub terminal: bool,
}

impl TutorialState {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: None,
            widgets: Vec::new(),
            terminal: false,
        }
    }

    #[must_use]
    pub fn about(mut self, subject: ObjectType) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn widget(mut self, widget: WidgetTemplate) -> Self {
        self.widgets.push(widget);
        self
    }

    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Edge `(from, gesture) → to`. `gesture` is a gesture description or a
/// button id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub gesture: String,
    pub to: String,
}

impl Transition {
    #[must_use]
    pub fn new(from: impl Into<String>, gesture: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            gesture: gesture.into(),
            to: to.into(),
        }
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Deserialize)]
struct GraphDef {
    initial: String,
    states: Vec<TutorialState>,
    #[serde(default)]
    transitions: Vec<Transition>,
}

/// A validated tutorial graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GraphDef")]
pub struct TutorialGraph {
    initial: String,
    states: Vec<TutorialState>,
    transitions: Vec<Transition>,
}

impl TryFrom<GraphDef> for TutorialGraph {
    type Error = GraphError;

    fn try_from(def: GraphDef) -> Result<Self, Self::Error> {
        Self::new(def.initial, def.states, def.transitions)
    }
}

impl TutorialGraph {
    /// Build and validate a graph.
    pub fn new(
        initial: impl Into<String>,
        states: Vec<TutorialState>,
        transitions: Vec<Transition>,
    ) -> Result<Self, GraphError> {
        let graph = Self {
            initial: initial.into(),
            states,
            transitions,
        };
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, GraphError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file; `.json` files are JSON, anything else is TOML.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let text = fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    fn validate(&self) -> Result<(), GraphError> {
        for (i, state) in self.states.iter().enumerate() {
            if self.states[..i].iter().any(|s| s.name == state.name) {
                return Err(GraphError::DuplicateState(state.name.clone()));
            }
            if state.subject.is_none() && state.widgets.iter().any(WidgetTemplate::uses_subject) {
                return Err(GraphError::SubjectWithoutType(state.name.clone()));
            }
        }
        if self.state(&self.initial).is_none() {
            return Err(GraphError::UnknownInitial(self.initial.clone()));
        }
        for (i, edge) in self.transitions.iter().enumerate() {
            let Some(from) = self.state(&edge.from) else {
                return Err(dangling(edge));
            };
            if self.state(&edge.to).is_none() {
                return Err(dangling(edge));
            }
            if from.terminal {
                return Err(GraphError::TerminalEdge(from.name.clone()));
            }
            if self.transitions[..i]
                .iter()
                .any(|e| e.from == edge.from && e.gesture == edge.gesture)
            {
                return Err(GraphError::DuplicateEdge {
                    from: edge.from.clone(),
                    gesture: edge.gesture.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn initial(&self) -> &str {
        &self.initial
    }

    #[must_use]
    pub fn state(&self, name: &str) -> Option<&TutorialState> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn states(&self) -> impl Iterator<Item = &TutorialState> {
        self.states.iter()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Target of the edge leaving `state` on `gesture`.
    #[must_use]
    pub fn next(&self, state: &str, gesture: &str) -> Option<&TutorialState> {
        let edge = self
            .transitions
            .iter()
            .find(|e| e.from == state && e.gesture == gesture)?;
        self.state(&edge.to)
    }

    /// Gesture ids with an edge out of `state`.
    #[must_use]
    pub fn awaited(&self, state: &str) -> Vec<String> {
        self.transitions
            .iter()
            .filter(|e| e.from == state)
            .map(|e| e.gesture.clone())
            .collect()
    }

    /// The sensor zone walkthrough shipped with the client.
    ///
    /// ```text
    /// welcome ──startTutorial──► placeSensorZone ──add Sensor Zone──►
    /// afterAddSensorZone ──move Sensor Zone──► afterMoveSensorZone
    /// ──rotate Sensor Zone──► afterRotateSensorZone
    /// ──change Sensor Zone type──► afterChangeZoneType ──saveButton──►
    /// tutorialComplete
    /// ```
    #[must_use]
    pub fn walkthrough() -> Self {
        let say = |text: &str| TextTemplate::default().text(text);
        let zone = ObjectType::SENSOR_ZONE;
        let states = vec![
            TutorialState::new("welcome").widget(WidgetTemplate::named(
                "startTutorial",
                say("Walk through placing and configuring a sensor zone."),
            )),
            TutorialState::new("placeSensorZone").widget(
                WidgetTemplate::named("sensorZoneTray", say("Drag a sensor zone onto the map."))
                    .placed(Placement::Right),
            ),
            TutorialState::new("afterAddSensorZone").about(zone).widget(
                WidgetTemplate::on_subject(
                    say("Move ").subject().text(" over the lanes it should detect."),
                ),
            ),
            TutorialState::new("afterMoveSensorZone").about(zone).widget(
                WidgetTemplate::on_subject(
                    say("Rotate ").subject().text(" to match the direction of travel."),
                ),
            ),
            TutorialState::new("afterRotateSensorZone")
                .about(zone)
                .widget(WidgetTemplate::on_subject(
                    say("Choose the detection type for ").subject().text("."),
                ))
                .widget(
                    WidgetTemplate::named("undoButton", say("Undo steps back one change."))
                        .placed(Placement::Above),
                ),
            TutorialState::new("afterChangeZoneType")
                .about(ObjectType::MAP_SENSOR)
                .widget(WidgetTemplate::on_subject(
                    say("Sensor ").subject().text(" reports detections for this zone."),
                ))
                .widget(
                    WidgetTemplate::named(
                        "saveButton",
                        say("Save to send the configuration to the access point."),
                    )
                    .placed(Placement::Above),
                ),
            TutorialState::new("tutorialComplete")
                .widget(WidgetTemplate::named(
                    "helpButton",
                    say("Walkthrough complete. Reopen it from the help menu."),
                ))
                .terminal(),
        ];
        let transitions = vec![
            Transition::new("welcome", "startTutorial", "placeSensorZone"),
            Transition::new("placeSensorZone", "add Sensor Zone", "afterAddSensorZone"),
            Transition::new("afterAddSensorZone", "move Sensor Zone", "afterMoveSensorZone"),
            Transition::new("afterMoveSensorZone", "rotate Sensor Zone", "afterRotateSensorZone"),
            Transition::new(
                "afterRotateSensorZone",
                "change Sensor Zone type",
                "afterChangeZoneType",
            ),
            Transition::new("afterChangeZoneType", "saveButton", "tutorialComplete"),
        ];
        Self {
            initial: "welcome".into(),
            states,
            transitions,
        }
    }
}

fn dangling(edge: &Transition) -> GraphError {
    GraphError::DanglingEdge {
        from: edge.from.clone(),
        gesture: edge.gesture.clone(),
        to: edge.to.clone(),
    }
}
