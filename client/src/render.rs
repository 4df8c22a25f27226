use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use drawdeck_shared::Snapshot;

use crate::state::{State, Tool, SURFACE_COLOR};

pub fn clear_surface(ctx: &CanvasRenderingContext2d, width: f64, height: f64) {
    ctx.set_fill_style_str(SURFACE_COLOR);
    ctx.fill_rect(0.0, 0.0, width, height);
}

pub fn draw_dot(ctx: &CanvasRenderingContext2d, x: f64, y: f64, color: &str, size: f64) {
    ctx.set_fill_style_str(color);
    ctx.begin_path();
    let _ = ctx.arc(x, y, size / 2.0, 0.0, std::f64::consts::PI * 2.0);
    ctx.fill();
}

pub fn draw_segment(
    ctx: &CanvasRenderingContext2d,
    from: (f64, f64),
    to: (f64, f64),
    color: &str,
    size: f64,
) {
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(size);
    ctx.set_line_cap("round");
    ctx.begin_path();
    ctx.move_to(from.0, from.1);
    ctx.line_to(to.0, to.1);
    ctx.stroke();
}

/// Axis-aligned rectangle from two corner points, as `(x, y, w, h)`.
pub fn rect_from_points(a: (f64, f64), b: (f64, f64)) -> (f64, f64, f64, f64) {
    let x = a.0.min(b.0);
    let y = a.1.min(b.1);
    (x, y, (a.0 - b.0).abs(), (a.1 - b.1).abs())
}

pub fn draw_shape(
    ctx: &CanvasRenderingContext2d,
    tool: Tool,
    start: (f64, f64),
    end: (f64, f64),
    color: &str,
    size: f64,
) {
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(size);
    ctx.set_line_cap("round");
    match tool {
        Tool::Line => {
            ctx.begin_path();
            ctx.move_to(start.0, start.1);
            ctx.line_to(end.0, end.1);
            ctx.stroke();
        }
        Tool::Rect => {
            let (x, y, w, h) = rect_from_points(start, end);
            ctx.stroke_rect(x, y, w, h);
        }
        Tool::Ellipse => {
            let (x, y, w, h) = rect_from_points(start, end);
            ctx.begin_path();
            let _ = ctx.ellipse(
                x + w / 2.0,
                y + h / 2.0,
                w / 2.0,
                h / 2.0,
                0.0,
                0.0,
                std::f64::consts::PI * 2.0,
            );
            ctx.stroke();
        }
        Tool::Brush | Tool::Eraser => {}
    }
}

/// Captures the current surface as an encoded snapshot.
pub fn capture_snapshot(state: &State) -> Option<Snapshot> {
    let url = state.canvas.to_data_url().ok()?;
    Snapshot::from_data_url(url).ok()
}

/// Repaints the surface from an encoded snapshot. Image decode is
/// asynchronous: the history was already updated by the caller, and the
/// repaint lands whenever the browser finishes decoding. The epoch check
/// drops a decode that another restore has overtaken.
pub fn restore_snapshot(state_rc: &Rc<RefCell<State>>, snapshot: &Snapshot) {
    let epoch = {
        let mut state = state_rc.borrow_mut();
        state.render_epoch += 1;
        state.render_epoch
    };
    let image = match HtmlImageElement::new() {
        Ok(image) => image,
        Err(_) => return,
    };
    let state_for_load = state_rc.clone();
    let image_for_load = image.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        let state = state_for_load.borrow();
        if state.render_epoch != epoch {
            return;
        }
        clear_surface(&state.ctx, state.board_width, state.board_height);
        let _ = state.ctx.draw_image_with_html_image_element_and_dw_and_dh(
            &image_for_load,
            0.0,
            0.0,
            state.board_width,
            state.board_height,
        );
    });
    image.set_onload(Some(onload.as_ref().unchecked_ref()));
    onload.forget();
    image.set_src(snapshot.as_data_url());
}

/// Decodes a snapshot into an image element for synchronous preview redraws.
pub fn decode_base_image(snapshot: &Snapshot) -> Option<HtmlImageElement> {
    let image = HtmlImageElement::new().ok()?;
    image.set_src(snapshot.as_data_url());
    Some(image)
}

/// Repaints the shape-preview base: last committed raster, or a blank
/// surface while the base is still decoding.
pub fn redraw_preview_base(state: &State) {
    clear_surface(&state.ctx, state.board_width, state.board_height);
    if let Some(base) = &state.shape_base {
        if base.complete() {
            let _ = state.ctx.draw_image_with_html_image_element_and_dw_and_dh(
                base,
                0.0,
                0.0,
                state.board_width,
                state.board_height,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::rect_from_points;

    #[test]
    fn rect_is_normalized_for_any_drag_direction() {
        assert_eq!(
            rect_from_points((10.0, 20.0), (30.0, 50.0)),
            (10.0, 20.0, 20.0, 30.0)
        );
        // Dragging up-left gives the same rectangle.
        assert_eq!(
            rect_from_points((30.0, 50.0), (10.0, 20.0)),
            (10.0, 20.0, 20.0, 30.0)
        );
    }

    #[test]
    fn degenerate_drag_has_zero_area() {
        assert_eq!(
            rect_from_points((5.0, 5.0), (5.0, 5.0)),
            (5.0, 5.0, 0.0, 0.0)
        );
    }
}
