//! Context menu of a diagram webview.
//!
//! A right-click asks the server for the context actions and puts the menu in
//! the waiting state. The first `setContextActions` envelope that arrives while
//! waiting opens the menu at the click position. Choosing an entry posts its
//! actions back tagged with the client id of the envelope that opened it.

use glsp_bridge_protocol::{
    Action, ActionMessage, EditorContext, LabeledAction, Point, RequestContextActionsAction,
    CONTEXT_MENU_ID,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

/// Where the menu is drawn, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MenuPosition {
    pub top: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuMode {
    Inactive,
    WaitingForActions {
        position: MenuPosition,
    },
    Active {
        position: MenuPosition,
        actions: Vec<LabeledAction>,
        client_id: String,
    },
}

/// Context menu state machine for one webview.
#[derive(Debug, Clone)]
pub struct ContextMenu {
    client_id: String,
    mode: MenuMode,
    /// Index path of the entry whose children are shown.
    open_path: Vec<usize>,
    /// Point of the last right-click until the matching mouse-up.
    pressed_at: Option<(f64, f64)>,
    selection: Vec<String>,
}

impl ContextMenu {
    /// Create a closed menu for the webview of `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            mode: MenuMode::Inactive,
            open_path: Vec::new(),
            pressed_at: None,
            selection: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn mode(&self) -> &MenuMode {
        &self.mode
    }

    pub fn is_active(&self) -> bool {
        matches!(self.mode, MenuMode::Active { .. })
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.mode, MenuMode::WaitingForActions { .. })
    }

    pub fn position(&self) -> Option<MenuPosition> {
        match &self.mode {
            MenuMode::Inactive => None,
            MenuMode::WaitingForActions { position } | MenuMode::Active { position, .. } => {
                Some(*position)
            }
        }
    }

    /// Remember the diagram selection sent with the next request.
    pub fn set_selection(&mut self, selected_element_ids: Vec<String>) {
        self.selection = selected_element_ids;
    }

    /// Handle a right-click at page coordinates `(x, y)`.
    ///
    /// Returns the `requestContextActions` envelope to send when the click
    /// starts a new request.
    pub fn right_click(&mut self, x: f64, y: f64, inside_menu: bool) -> Option<ActionMessage> {
        self.pressed_at = Some((x, y));

        if let Some(position) = self.position() {
            if position.top == y && position.left == x {
                self.close();
                return None;
            }
        }
        if inside_menu && self.is_active() {
            return None;
        }

        self.open_path.clear();
        self.mode = MenuMode::WaitingForActions {
            // One pixel down so the entry under the cursor is not hovered right away.
            position: MenuPosition {
                top: y + 1.0,
                left: x,
            },
        };

        let request = RequestContextActionsAction {
            context_id: CONTEXT_MENU_ID.to_string(),
            editor_context: EditorContext {
                selected_element_ids: self.selection.clone(),
                last_mouse_position: Some(Point { x, y }),
            },
            request_id: String::new(),
        };
        debug!(client_id = %self.client_id, x, y, "Requesting context actions");
        Some(ActionMessage::new(
            self.client_id.clone(),
            Action::RequestContextActions(request).to_value(),
        ))
    }

    /// Handle the release following a right-click. Dragging away closes.
    pub fn mouse_up(&mut self, x: f64, y: f64) {
        if let Some((pressed_x, pressed_y)) = self.pressed_at.take() {
            if pressed_x != x || pressed_y != y {
                self.close();
            }
        }
    }

    /// Handle a left click anywhere in the webview.
    pub fn click(&mut self, inside_menu: bool) {
        if !(inside_menu && self.is_active()) {
            self.close();
        }
    }

    /// Handle a message posted to the webview. Returns true if it opened the
    /// menu.
    pub fn receive(&mut self, message: &Value) -> bool {
        let MenuMode::WaitingForActions { position } = self.mode else {
            return false;
        };
        let Some(envelope) = ActionMessage::from_value(message) else {
            return false;
        };
        let Some(Action::SetContextActions(set)) = envelope.typed_action() else {
            return false;
        };

        trace!(client_id = %envelope.client_id, entries = set.actions.len(), "Opening context menu");
        self.mode = MenuMode::Active {
            position,
            actions: set.actions,
            client_id: envelope.client_id,
        };
        true
    }

    /// Hover the entry at `path`, showing its children. Returns false for
    /// paths outside the open menu.
    pub fn hover(&mut self, path: &[usize]) -> bool {
        if self.entry(path).is_none() {
            return false;
        }
        self.open_path = path.to_vec();
        true
    }

    /// The entries of each shown level, outermost first.
    pub fn visible_levels(&self) -> Vec<&[LabeledAction]> {
        let MenuMode::Active { actions, .. } = &self.mode else {
            return Vec::new();
        };

        let mut levels = vec![actions.as_slice()];
        let mut current = actions.as_slice();
        for &index in &self.open_path {
            match current.get(index) {
                Some(entry) if !entry.children.is_empty() => {
                    current = entry.children.as_slice();
                    levels.push(current);
                }
                _ => break,
            }
        }
        levels
    }

    /// Choose the entry at `path`.
    ///
    /// Returns one envelope per action of the entry. The menu closes when
    /// the entry carried actions; choosing a pure group keeps it open.
    pub fn select(&mut self, path: &[usize]) -> Vec<ActionMessage> {
        let messages: Vec<ActionMessage> = match (&self.mode, self.entry(path)) {
            (MenuMode::Active { client_id, .. }, Some(entry)) => entry
                .actions
                .iter()
                .map(|action| ActionMessage::new(client_id.clone(), action.clone()))
                .collect(),
            _ => return Vec::new(),
        };

        if !messages.is_empty() {
            self.close();
        }
        messages
    }

    pub fn close(&mut self) {
        self.mode = MenuMode::Inactive;
        self.open_path.clear();
    }

    fn entry(&self, path: &[usize]) -> Option<&LabeledAction> {
        let MenuMode::Active { actions, .. } = &self.mode else {
            return None;
        };
        let (first, rest) = path.split_first()?;
        let mut entry = actions.get(*first)?;
        for &index in rest {
            entry = entry.children.get(index)?;
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_context_actions(client_id: &str) -> Value {
        json!({
            "clientId": client_id,
            "action": {
                "kind": "setContextActions",
                "actions": [
                    {"label": "Delete", "actions": [{"kind": "deleteElement", "elementIds": ["n1"]}]},
                    {"label": "New", "actions": [], "children": [
                        {"label": "Task", "actions": [
                            {"kind": "createNode", "elementTypeId": "task"},
                            {"kind": "selectAll"}
                        ]}
                    ]}
                ]
            }
        })
    }

    fn opened() -> ContextMenu {
        let mut menu = ContextMenu::new("wf_0");
        menu.right_click(10.0, 20.0, false);
        assert!(menu.receive(&set_context_actions("wf_0")));
        menu
    }

    #[test]
    fn test_right_click_requests_actions() {
        let mut menu = ContextMenu::new("wf_0");
        menu.set_selection(vec!["n1".to_string()]);

        let request = menu.right_click(10.0, 20.0, false).unwrap();
        assert_eq!(request.client_id, "wf_0");
        assert_eq!(
            request.action,
            json!({
                "kind": "requestContextActions",
                "contextId": "context-menu",
                "editorContext": {
                    "selectedElementIds": ["n1"],
                    "lastMousePosition": {"x": 10.0, "y": 20.0}
                },
                "requestId": ""
            })
        );
        assert_eq!(
            menu.mode(),
            &MenuMode::WaitingForActions {
                position: MenuPosition {
                    top: 21.0,
                    left: 10.0
                }
            }
        );
    }

    #[test]
    fn test_actions_only_accepted_while_waiting() {
        let mut menu = ContextMenu::new("wf_0");
        assert!(!menu.receive(&set_context_actions("wf_0")));
        assert!(!menu.is_active());

        menu.right_click(10.0, 20.0, false);
        assert!(!menu.receive(&json!({"clientId": "wf_0", "action": {"kind": "setModel"}})));
        assert!(menu.receive(&set_context_actions("wf_0")));
        // A second response to the same request is ignored.
        assert!(!menu.receive(&set_context_actions("wf_1")));
        match menu.mode() {
            MenuMode::Active { client_id, actions, .. } => {
                assert_eq!(client_id, "wf_0");
                assert_eq!(actions.len(), 2);
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_right_click_on_menu_position_closes() {
        let mut menu = opened();
        assert!(menu.right_click(10.0, 21.0, false).is_none());
        assert_eq!(menu.mode(), &MenuMode::Inactive);
    }

    #[test]
    fn test_right_click_inside_open_menu_keeps_it() {
        let mut menu = opened();
        assert!(menu.right_click(15.0, 30.0, true).is_none());
        assert!(menu.is_active());

        // Elsewhere starts a new request.
        assert!(menu.right_click(100.0, 100.0, false).is_some());
        assert!(menu.is_waiting());
    }

    #[test]
    fn test_mouse_up_elsewhere_closes() {
        let mut menu = ContextMenu::new("wf_0");
        menu.right_click(10.0, 20.0, false);
        menu.mouse_up(10.0, 20.0);
        assert!(menu.is_waiting());

        menu.right_click(50.0, 50.0, false);
        menu.mouse_up(60.0, 50.0);
        assert_eq!(menu.mode(), &MenuMode::Inactive);
    }

    #[test]
    fn test_click_outside_closes() {
        let mut menu = opened();
        menu.click(true);
        assert!(menu.is_active());
        menu.click(false);
        assert!(!menu.is_active());
    }

    #[test]
    fn test_hover_opens_children() {
        let mut menu = opened();
        assert_eq!(menu.visible_levels().len(), 1);

        assert!(menu.hover(&[1]));
        let levels = menu.visible_levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1][0].label, "Task");

        assert!(menu.hover(&[0]));
        assert_eq!(menu.visible_levels().len(), 1);
        assert!(!menu.hover(&[5]));
    }

    #[test]
    fn test_select_posts_each_action_and_closes() {
        let mut menu = opened();

        let messages = menu.select(&[1, 0]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].client_id, "wf_0");
        assert_eq!(messages[0].kind(), "createNode");
        assert_eq!(messages[1].kind(), "selectAll");
        assert!(!messages[0].local_dispatch);
        assert_eq!(menu.mode(), &MenuMode::Inactive);
        assert!(menu.select(&[0]).is_empty());
    }

    #[test]
    fn test_select_group_without_actions_stays_open() {
        let mut menu = opened();
        assert!(menu.select(&[1]).is_empty());
        assert!(menu.is_active());
    }
}
