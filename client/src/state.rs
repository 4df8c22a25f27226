use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use drawdeck_shared::{DiagramRecord, SnapshotHistory};

pub const DEFAULT_COLOR: &str = "#1f1f1f";
pub const DEFAULT_SIZE: f64 = 4.0;
pub const SURFACE_COLOR: &str = "#ffffff";

#[derive(Clone, Copy, PartialEq)]
pub enum Tool {
    Brush,
    Eraser,
    Line,
    Rect,
    Ellipse,
}

impl Tool {
    pub fn is_shape(self) -> bool {
        matches!(self, Tool::Line | Tool::Rect | Tool::Ellipse)
    }
}

pub enum PointerState {
    Idle,
    /// Freehand stroke in progress; `last` is the previous sample point.
    Stroking { last: (f64, f64) },
    /// Shape anchored at `start`, previewed until pointer-up commits it.
    Shaping { start: (f64, f64) },
}

pub struct AuthSession {
    pub username: String,
    pub token: String,
}

pub struct State {
    pub canvas: HtmlCanvasElement,
    pub ctx: CanvasRenderingContext2d,
    pub history: SnapshotHistory,
    pub tool: Tool,
    pub color: String,
    pub size: f64,
    pub board_width: f64,
    pub board_height: f64,
    pub pointer: PointerState,
    /// Decoded base raster used while previewing a shape.
    pub shape_base: Option<HtmlImageElement>,
    /// Bumped on every async restore; stale decodes check it and bail.
    pub render_epoch: u64,
    pub auth: Option<AuthSession>,
    pub diagrams: Vec<DiagramRecord>,
    /// Server id of the currently open diagram, for overwriting saves.
    pub open_diagram: Option<u64>,
}

/// Color a tool paints with. The eraser repaints the surface color so
/// snapshots and exports stay fully opaque.
pub fn tool_color(tool: Tool, brush_color: &str) -> &str {
    match tool {
        Tool::Eraser => SURFACE_COLOR,
        _ => brush_color,
    }
}

impl State {
    pub fn stroke_color(&self) -> &str {
        tool_color(self.tool, &self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eraser_paints_the_surface_color() {
        assert_eq!(tool_color(Tool::Eraser, "#123456"), SURFACE_COLOR);
        assert_eq!(tool_color(Tool::Brush, "#123456"), "#123456");
        assert_eq!(tool_color(Tool::Rect, "#123456"), "#123456");
    }
}
