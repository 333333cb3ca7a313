use inkwire_shared::Tool;

/// Minimum spacing between two stroke transmissions of one drag.
pub const EMIT_INTERVAL_MS: f64 = 60.0;
/// Minimum spacing between two cursor broadcasts.
pub const CURSOR_INTERVAL_MS: f64 = 50.0;
/// Points used for the local preview while dragging.
pub const PREVIEW_POINTS: usize = 6;
/// Points carried over into the next batch so curves stay joined.
pub const TRAILING_POINTS: usize = 2;
/// Remote cursors disappear after this long without an update.
pub const CURSOR_IDLE_MS: f64 = 4000.0;

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_WIDTH: f32 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: String,
    pub width: f32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: DEFAULT_COLOR.to_string(),
            width: DEFAULT_WIDTH,
        }
    }
}

pub fn parse_tool(value: &str) -> Tool {
    match value {
        "eraser" => Tool::Eraser,
        _ => Tool::Brush,
    }
}

pub fn parse_width(value: &str) -> f32 {
    value
        .parse::<f32>()
        .ok()
        .filter(|width| width.is_finite() && *width > 0.0)
        .unwrap_or(DEFAULT_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_inputs_fall_back_to_defaults() {
        assert_eq!(parse_tool("eraser"), Tool::Eraser);
        assert_eq!(parse_tool("pen"), Tool::Brush);
        assert_eq!(parse_width("12"), 12.0);
        assert_eq!(parse_width("-3"), DEFAULT_WIDTH);
        assert_eq!(parse_width("wide"), DEFAULT_WIDTH);
    }
}
