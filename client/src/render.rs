use inkwire_shared::{Operation, OperationKind, Point, Tool};
use web_sys::CanvasRenderingContext2d;

/// Drawing surface. Implementations must be idempotent: drawing the same
/// stroke twice looks like drawing it once, which full replays rely on.
pub trait Renderer {
    fn clear(&mut self);
    fn draw_stroke(&mut self, tool: Tool, color: &str, width: f32, points: &[Point]);
}

pub fn draw_operation(renderer: &mut dyn Renderer, operation: &Operation) {
    match &operation.kind {
        OperationKind::Stroke {
            tool,
            color,
            width,
            points,
        } => renderer.draw_stroke(*tool, color, *width, points),
        OperationKind::Clear => renderer.clear(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    Quad { control: Point, end: Point },
    Line { end: Point },
}

/// Midpoint quadratic smoothing: every interior point becomes a control
/// point and the curve passes through the midpoints between neighbours.
pub fn smooth_segments(points: &[Point]) -> Vec<Segment> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut segments = Vec::with_capacity(points.len() - 1);
    for pair in points[1..].windows(2) {
        let (control, next) = (pair[0], pair[1]);
        segments.push(Segment::Quad {
            control,
            end: Point::new((control.x + next.x) / 2.0, (control.y + next.y) / 2.0),
        });
    }
    segments.push(Segment::Line {
        end: points[points.len() - 1],
    });
    segments
}

pub struct CanvasRenderer {
    ctx: CanvasRenderingContext2d,
    width: f64,
    height: f64,
}

impl CanvasRenderer {
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self {
            ctx,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn ctx(&self) -> &CanvasRenderingContext2d {
        &self.ctx
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }
}

impl Renderer for CanvasRenderer {
    fn clear(&mut self) {
        self.ctx.clear_rect(0.0, 0.0, self.width, self.height);
    }

    fn draw_stroke(&mut self, tool: Tool, color: &str, width: f32, points: &[Point]) {
        let Some(first) = points.first() else {
            return;
        };
        let ctx = &self.ctx;
        let weight = width as f64;
        ctx.save();
        let composite = match tool {
            Tool::Eraser => "destination-out",
            Tool::Brush => "source-over",
        };
        let _ = ctx.set_global_composite_operation(composite);

        if points.len() == 1 {
            ctx.set_fill_style_str(color);
            ctx.begin_path();
            let _ = ctx.arc(
                first.x as f64,
                first.y as f64,
                weight / 2.0,
                0.0,
                std::f64::consts::PI * 2.0,
            );
            ctx.fill();
            ctx.restore();
            return;
        }

        ctx.set_stroke_style_str(color);
        ctx.set_line_width(weight);
        ctx.set_line_cap("round");
        ctx.set_line_join("round");
        ctx.begin_path();
        ctx.move_to(first.x as f64, first.y as f64);
        for segment in smooth_segments(points) {
            match segment {
                Segment::Quad { control, end } => ctx.quadratic_curve_to(
                    control.x as f64,
                    control.y as f64,
                    end.x as f64,
                    end.y as f64,
                ),
                Segment::Line { end } => ctx.line_to(end.x as f64, end.y as f64),
            }
        }
        ctx.stroke();
        ctx.restore();
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Drawn {
        Clear,
        Stroke {
            tool: Tool,
            color: String,
            width: f32,
            points: Vec<Point>,
        },
    }

    #[derive(Default)]
    pub struct RecordingRenderer {
        pub calls: Vec<Drawn>,
    }

    impl RecordingRenderer {
        pub fn strokes(&self) -> Vec<Vec<Point>> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Drawn::Stroke { points, .. } => Some(points.clone()),
                    Drawn::Clear => None,
                })
                .collect()
        }
    }

    impl Renderer for RecordingRenderer {
        fn clear(&mut self) {
            self.calls.push(Drawn::Clear);
        }

        fn draw_stroke(&mut self, tool: Tool, color: &str, width: f32, points: &[Point]) {
            self.calls.push(Drawn::Stroke {
                tool,
                color: color.to_string(),
                width,
                points: points.to_vec(),
            });
        }
    }
}
