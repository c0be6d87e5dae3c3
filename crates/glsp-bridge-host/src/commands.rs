//! Editor commands that act on the focused diagram.
//!
//! Commands are addressed by name, optionally prefixed with a namespace
//! (`workflow.fit` and `fit` are the same command).

use glsp_bridge_protocol::{
    Action, CenterAction, FitToScreenAction, LayoutAction, NavigateAction, RequestExportSvgAction,
};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorCommand {
    Fit,
    Center,
    Layout,
    GoToNextNode,
    GoToPreviousNode,
    ShowDocumentation,
    ExportAsSvg,
}

impl EditorCommand {
    pub const ALL: [EditorCommand; 7] = [
        EditorCommand::Fit,
        EditorCommand::Center,
        EditorCommand::Layout,
        EditorCommand::GoToNextNode,
        EditorCommand::GoToPreviousNode,
        EditorCommand::ShowDocumentation,
        EditorCommand::ExportAsSvg,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EditorCommand::Fit => "fit",
            EditorCommand::Center => "center",
            EditorCommand::Layout => "layout",
            EditorCommand::GoToNextNode => "goToNextNode",
            EditorCommand::GoToPreviousNode => "goToPreviousNode",
            EditorCommand::ShowDocumentation => "showDocumentation",
            EditorCommand::ExportAsSvg => "exportAsSVG",
        }
    }

    /// The action sent to the focused diagram. Fit and center act on
    /// `selection`, the most recently reported selection.
    pub fn action(&self, selection: &[String]) -> Action {
        match self {
            EditorCommand::Fit => Action::Fit(FitToScreenAction::new(selection.to_vec())),
            EditorCommand::Center => Action::Center(CenterAction::new(selection.to_vec())),
            EditorCommand::Layout => Action::Layout(LayoutAction::default()),
            EditorCommand::GoToNextNode => Action::Navigate(NavigateAction::new("next")),
            EditorCommand::GoToPreviousNode => Action::Navigate(NavigateAction::new("previous")),
            EditorCommand::ShowDocumentation => {
                Action::Navigate(NavigateAction::new("documentation"))
            }
            EditorCommand::ExportAsSvg => Action::RequestExportSvg(RequestExportSvgAction {}),
        }
    }
}

impl fmt::Display for EditorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EditorCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('.').next().unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|command| command.name() == name)
            .ok_or_else(|| format!("Unknown command: {s}"))
    }
}
