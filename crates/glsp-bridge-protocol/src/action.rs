//! GLSP actions understood or produced by the bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Actions the bridge inspects or sends.
///
/// The enum is tagged by the GLSP `kind` field. Actions of any other kind are
/// not represented here; [`Action::parse`] returns `None` for them and the
/// router forwards them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    /// Ask the diagram to persist its model.
    #[serde(rename = "saveModel")]
    SaveModel(SaveModelAction),

    /// Ask the server to (re)load the model from its source.
    #[serde(rename = "requestModel")]
    RequestModel(RequestModelAction),

    /// Dirty flag of the diagram changed.
    #[serde(rename = "setDirtyState")]
    SetDirtyState(SetDirtyStateAction),

    /// Validation markers for the diagram.
    #[serde(rename = "setMarkers")]
    SetMarkers(SetMarkersAction),

    /// Server asks the editor to open an external resource.
    #[serde(rename = "navigateToExternalTarget")]
    NavigateToExternalTarget(NavigateToExternalTargetAction),

    /// Element selection changed.
    #[serde(rename = "elementSelected")]
    Select(SelectAction),

    /// Exported SVG text for a `requestExportSvg`.
    #[serde(rename = "exportSvg")]
    ExportSvg(ExportSvgAction),

    #[serde(rename = "glspUndo")]
    Undo(UndoAction),

    #[serde(rename = "glspRedo")]
    Redo(RedoAction),

    /// Fit the viewport around elements.
    #[serde(rename = "fit")]
    Fit(FitToScreenAction),

    /// Center the viewport on elements.
    #[serde(rename = "center")]
    Center(CenterAction),

    /// Run the server-side layout.
    #[serde(rename = "layout")]
    Layout(LayoutAction),

    /// Navigate within the diagram (next/previous node, documentation).
    #[serde(rename = "navigate")]
    Navigate(NavigateAction),

    #[serde(rename = "requestExportSvg")]
    RequestExportSvg(RequestExportSvgAction),

    /// Server answer to a context-menu request.
    #[serde(rename = "setContextActions")]
    SetContextActions(SetContextActionsAction),

    /// Webview asks the server for the actions of a context.
    #[serde(rename = "requestContextActions")]
    RequestContextActions(RequestContextActionsAction),
}

impl Action {
    /// Parse a raw action object. Unknown kinds and malformed payloads yield `None`.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Serialize into the JSON object sent on the wire.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The wire `kind` of this action.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SaveModel(_) => "saveModel",
            Action::RequestModel(_) => "requestModel",
            Action::SetDirtyState(_) => "setDirtyState",
            Action::SetMarkers(_) => "setMarkers",
            Action::NavigateToExternalTarget(_) => "navigateToExternalTarget",
            Action::Select(_) => "elementSelected",
            Action::ExportSvg(_) => "exportSvg",
            Action::Undo(_) => "glspUndo",
            Action::Redo(_) => "glspRedo",
            Action::Fit(_) => "fit",
            Action::Center(_) => "center",
            Action::Layout(_) => "layout",
            Action::Navigate(_) => "navigate",
            Action::RequestExportSvg(_) => "requestExportSvg",
            Action::SetContextActions(_) => "setContextActions",
            Action::RequestContextActions(_) => "requestContextActions",
        }
    }
}

/// Reads the `kind` of a raw action object, typed or not.
pub fn action_kind(value: &Value) -> Option<&str> {
    value.get("kind").and_then(Value::as_str)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveModelAction {
    /// Destination for "save as"; absent for a plain save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_uri: Option<String>,
}

impl SaveModelAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(file_uri: impl Into<String>) -> Self {
        Self {
            file_uri: Some(file_uri.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestModelAction {
    pub options: RequestModelOptions,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestModelOptions {
    pub source_uri: String,
    pub diagram_type: String,
}

impl RequestModelAction {
    pub fn new(source_uri: impl Into<String>, diagram_type: impl Into<String>) -> Self {
        Self {
            options: RequestModelOptions {
                source_uri: source_uri.into(),
                diagram_type: diagram_type.into(),
            },
            request_id: String::new(),
        }
    }
}

/// Why the dirty state of a diagram changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirtyStateReason {
    Operation,
    Undo,
    Redo,
    Save,
    External,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDirtyStateAction {
    pub is_dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DirtyStateReason>,
}

impl SetDirtyStateAction {
    pub fn new(is_dirty: bool, reason: DirtyStateReason) -> Self {
        Self {
            is_dirty,
            reason: Some(reason),
        }
    }
}

/// Severity of a validation marker as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Info,
    Warning,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub element_id: String,
    pub kind: MarkerKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetMarkersAction {
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigateToExternalTargetAction {
    pub target: NavigationTarget,
}

/// Field of [`NavigationTarget::args`] carrying host show options as JSON.
pub const JSON_OPENER_OPTIONS: &str = "jsonOpenerOptions";

impl NavigationTarget {
    /// Show options for the host: the target args, with the JSON encoded
    /// `jsonOpenerOptions` (a string or an object) merged on top.
    pub fn show_options(&self) -> Map<String, Value> {
        let mut options = self.args.clone().unwrap_or_default();
        let embedded = match options.get(JSON_OPENER_OPTIONS) {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
            Some(Value::Object(map)) => Some(Value::Object(map.clone())),
            _ => None,
        };
        if let Some(Value::Object(extra)) = embedded {
            for (key, value) in extra {
                options.insert(key, value);
            }
        }
        options
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectAction {
    #[serde(rename = "selectedElementsIDs", default)]
    pub selected_elements_ids: Vec<String>,
    #[serde(rename = "deselectedElementsIDs", default)]
    pub deselected_elements_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSvgAction {
    pub svg: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoAction {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedoAction {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitToScreenAction {
    pub element_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
    #[serde(default)]
    pub animate: bool,
}

impl FitToScreenAction {
    pub fn new(element_ids: Vec<String>) -> Self {
        Self {
            element_ids,
            padding: None,
            max_zoom: None,
            animate: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterAction {
    pub element_ids: Vec<String>,
    #[serde(default)]
    pub animate: bool,
    #[serde(default)]
    pub retain_zoom: bool,
}

impl CenterAction {
    pub fn new(element_ids: Vec<String>) -> Self {
        Self {
            element_ids,
            animate: true,
            retain_zoom: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateAction {
    pub target_type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl NavigateAction {
    pub fn new(target_type_id: impl Into<String>) -> Self {
        Self {
            target_type_id: target_type_id.into(),
            args: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestExportSvgAction {}

/// One entry of a context menu, possibly with nested entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledAction {
    pub label: String,
    /// Raw action objects fired when the entry is chosen.
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LabeledAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetContextActionsAction {
    #[serde(default)]
    pub actions: Vec<LabeledAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

/// Context id the webview menu asks the server for.
pub const CONTEXT_MENU_ID: &str = "context-menu";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContextActionsAction {
    pub context_id: String,
    pub editor_context: EditorContext,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorContext {
    #[serde(default)]
    pub selected_element_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mouse_position: Option<Point>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
