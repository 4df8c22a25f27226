use std::cell::RefCell;
use std::rc::Rc;

use crate::render::{
    capture_snapshot, clear_surface, decode_base_image, draw_dot, draw_segment, draw_shape,
    redraw_preview_base, restore_snapshot,
};
use crate::state::{PointerState, State};

pub fn pointer_down(state: &mut State, point: (f64, f64)) {
    if !matches!(state.pointer, PointerState::Idle) {
        return;
    }
    if state.tool.is_shape() {
        state.shape_base = capture_snapshot(state).and_then(|snap| decode_base_image(&snap));
        state.pointer = PointerState::Shaping { start: point };
    } else {
        let color = state.stroke_color().to_string();
        draw_dot(&state.ctx, point.0, point.1, &color, state.size);
        state.pointer = PointerState::Stroking { last: point };
    }
}

pub fn pointer_move(state: &mut State, point: (f64, f64)) {
    match state.pointer {
        PointerState::Idle => {}
        PointerState::Stroking { last } => {
            let color = state.stroke_color().to_string();
            draw_segment(&state.ctx, last, point, &color, state.size);
            state.pointer = PointerState::Stroking { last: point };
        }
        PointerState::Shaping { start } => {
            // Two-step preview: restore the committed raster, then overlay.
            redraw_preview_base(state);
            let color = state.stroke_color().to_string();
            draw_shape(&state.ctx, state.tool, start, point, &color, state.size);
        }
    }
}

/// Finalizes the stroke or shape and records the result in the history.
pub fn pointer_up(state: &mut State, point: (f64, f64)) {
    match state.pointer {
        PointerState::Idle => return,
        PointerState::Stroking { last } => {
            let color = state.stroke_color().to_string();
            draw_segment(&state.ctx, last, point, &color, state.size);
        }
        PointerState::Shaping { start } => {
            redraw_preview_base(state);
            let color = state.stroke_color().to_string();
            draw_shape(&state.ctx, state.tool, start, point, &color, state.size);
        }
    }
    state.pointer = PointerState::Idle;
    state.shape_base = None;
    if let Some(snapshot) = capture_snapshot(state) {
        state.history.push(snapshot);
    }
}

pub fn undo(state_rc: &Rc<RefCell<State>>) {
    let snapshot = {
        let mut state = state_rc.borrow_mut();
        state.history.undo().clone()
    };
    restore_snapshot(state_rc, &snapshot);
}

pub fn redo(state_rc: &Rc<RefCell<State>>) {
    let snapshot = {
        let mut state = state_rc.borrow_mut();
        state.history.redo().cloned()
    };
    if let Some(snapshot) = snapshot {
        restore_snapshot(state_rc, &snapshot);
    }
}

/// Blanks the surface and records the blank state as an undoable edit.
pub fn clear_board(state: &mut State) {
    clear_surface(&state.ctx, state.board_width, state.board_height);
    state.pointer = PointerState::Idle;
    state.shape_base = None;
    if let Some(snapshot) = capture_snapshot(state) {
        state.history.push(snapshot);
    }
}
