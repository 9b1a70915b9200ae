//! Pointer-driven drag session for employee cards.
//!
//! The controller knows nothing about rendering. The UI feeds it pointer
//! events and hovered drop zones; a release over a zone yields a
//! [`DropRequest`] for the reassignment workflow.

use serde::{Deserialize, Serialize};

/// Pointer travel, in points, before a press becomes a drag.
pub const DEFAULT_ACTIVATION_DISTANCE: f32 = 8.0;

/// A completed drop of an employee card on a drop zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRequest {
    pub employee_id: i32,
    pub zone_id: i32,
}

/// Drag gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// Pointer is down on a card but has not travelled far enough.
    Pressed { employee_id: i32, origin: [f32; 2] },
    Dragging { employee_id: i32, hovered: Option<i32> },
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Clone)]
pub struct DragController {
    activation_distance: f32,
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE)
    }
}

impl DragController {
    pub fn new(activation_distance: f32) -> Self {
        Self {
            activation_distance: activation_distance.max(0.0),
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Employee currently being dragged (past the activation threshold).
    pub fn dragged_employee(&self) -> Option<i32> {
        match self.state {
            DragState::Dragging { employee_id, .. } => Some(employee_id),
            _ => None,
        }
    }

    /// Zone under the pointer while dragging.
    pub fn hovered_zone(&self) -> Option<i32> {
        match self.state {
            DragState::Dragging { hovered, .. } => hovered,
            _ => None,
        }
    }

    /// Pointer pressed on an employee card.
    pub fn pointer_down(&mut self, employee_id: i32, pos: [f32; 2]) {
        self.state = DragState::Pressed {
            employee_id,
            origin: pos,
        };
    }

    /// Pointer moved. Returns `true` when this movement started the drag.
    pub fn pointer_move(&mut self, pos: [f32; 2]) -> bool {
        if let DragState::Pressed { employee_id, origin } = self.state {
            let dx = pos[0] - origin[0];
            let dy = pos[1] - origin[1];
            if (dx * dx + dy * dy).sqrt() > self.activation_distance {
                self.state = DragState::Dragging {
                    employee_id,
                    hovered: None,
                };
                return true;
            }
        }
        false
    }

    /// Update the zone under the pointer.
    pub fn hover(&mut self, zone_id: Option<i32>) {
        if let DragState::Dragging { hovered, .. } = &mut self.state {
            *hovered = zone_id;
        }
    }

    /// Pointer released. Yields a drop only for a drag over a zone.
    pub fn release(&mut self) -> Option<DropRequest> {
        let state = std::mem::take(&mut self.state);
        match state {
            DragState::Dragging {
                employee_id,
                hovered: Some(zone_id),
            } => Some(DropRequest { employee_id, zone_id }),
            _ => None,
        }
    }

    /// Abort the gesture (escape key, focus loss).
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_below_threshold_is_a_click() {
        let mut drag = DragController::new(8.0);
        drag.pointer_down(1, [0.0, 0.0]);
        assert!(!drag.pointer_move([3.0, 4.0]));
        drag.hover(Some(5));
        assert_eq!(drag.release(), None);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_drag_over_zone_yields_drop() {
        let mut drag = DragController::new(8.0);
        drag.pointer_down(1, [0.0, 0.0]);
        assert!(drag.pointer_move([10.0, 0.0]));
        assert_eq!(drag.dragged_employee(), Some(1));

        drag.hover(Some(5));
        assert_eq!(drag.hovered_zone(), Some(5));
        assert_eq!(
            drag.release(),
            Some(DropRequest {
                employee_id: 1,
                zone_id: 5
            })
        );
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_drop_outside_zone_returns_to_idle() {
        let mut drag = DragController::default();
        drag.pointer_down(2, [0.0, 0.0]);
        drag.pointer_move([0.0, 20.0]);
        drag.hover(Some(3));
        drag.hover(None);
        assert_eq!(drag.release(), None);
    }

    #[test]
    fn test_cancel_mid_drag() {
        let mut drag = DragController::default();
        drag.pointer_down(2, [0.0, 0.0]);
        drag.pointer_move([50.0, 0.0]);
        drag.cancel();
        assert_eq!(drag.dragged_employee(), None);
    }
}
