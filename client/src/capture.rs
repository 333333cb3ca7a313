use std::rc::Rc;

use inkwire_shared::{Operation, Point, Tool};

use crate::mirror::LocalMirror;
use crate::render::Renderer;
use crate::state::{ToolSettings, EMIT_INTERVAL_MS, PREVIEW_POINTS, TRAILING_POINTS};
use crate::transmit::Transmitter;

/// What happened to the stroke buffer after a pointer move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Batch {
    /// No drag in progress, the move was ignored.
    Idle,
    /// The whole buffer went out as one stroke operation.
    Sent,
    /// Too soon to send. The host must call
    /// [`CapturePipeline::flush_deferred`] with `drag` after `wait_ms`.
    Deferred { drag: u64, wait_ms: f64 },
    /// Too soon to send, and a deferred flush is already scheduled.
    Pending,
}

struct Drag {
    generation: u64,
    id: String,
    tool: Tool,
    color: String,
    width: f32,
    points: Vec<Point>,
    unsent: usize,
    flush_scheduled: bool,
}

impl Drag {
    fn operation(&self) -> Operation {
        Operation::stroke(
            self.id.clone(),
            self.tool,
            self.color.clone(),
            self.width,
            self.points.clone(),
        )
    }

    fn draw(&self, renderer: &mut dyn Renderer, points: &[Point]) {
        renderer.draw_stroke(self.tool, &self.color, self.width, points);
    }
}

/// Turns one pointer drag into stroke operations.
///
/// Local rendering never waits on the network. Transmission is throttled to
/// one batch per emit interval; every batch carries the whole buffer under
/// the drag's operation id, and the server stores each batch as its own
/// history entry.
pub struct CapturePipeline {
    transmitter: Rc<dyn Transmitter>,
    emit_interval_ms: f64,
    drag: Option<Drag>,
    generation: u64,
    last_emit: Option<f64>,
}

impl CapturePipeline {
    pub fn new(transmitter: Rc<dyn Transmitter>) -> Self {
        Self::with_interval(transmitter, EMIT_INTERVAL_MS)
    }

    pub fn with_interval(transmitter: Rc<dyn Transmitter>, emit_interval_ms: f64) -> Self {
        Self {
            transmitter,
            emit_interval_ms,
            drag: None,
            generation: 0,
            last_emit: None,
        }
    }

    #[cfg(test)]
    pub fn is_drawing(&self) -> bool {
        self.drag.is_some()
    }

    #[cfg(test)]
    pub fn active_id(&self) -> Option<&str> {
        self.drag.as_ref().map(|drag| drag.id.as_str())
    }

    pub fn begin(
        &mut self,
        id: String,
        settings: &ToolSettings,
        point: Point,
        renderer: &mut dyn Renderer,
    ) {
        self.generation += 1;
        let drag = Drag {
            generation: self.generation,
            id,
            tool: settings.tool,
            color: settings.color.clone(),
            width: settings.width,
            points: vec![point],
            unsent: 1,
            flush_scheduled: false,
        };
        drag.draw(renderer, &drag.points);
        self.drag = Some(drag);
    }

    pub fn extend(
        &mut self,
        point: Point,
        now: f64,
        renderer: &mut dyn Renderer,
        mirror: &mut LocalMirror,
    ) -> Batch {
        let Some(drag) = self.drag.as_mut() else {
            return Batch::Idle;
        };
        drag.points.push(point);
        drag.unsent += 1;
        let preview_start = drag.points.len().saturating_sub(PREVIEW_POINTS);
        drag.draw(renderer, &drag.points[preview_start..]);

        match self.last_emit.map(|last| now - last) {
            Some(elapsed) if elapsed < self.emit_interval_ms => {
                if drag.flush_scheduled {
                    Batch::Pending
                } else {
                    drag.flush_scheduled = true;
                    Batch::Deferred {
                        drag: drag.generation,
                        wait_ms: self.emit_interval_ms - elapsed,
                    }
                }
            }
            _ => {
                transmit(drag, self.transmitter.as_ref(), mirror);
                self.last_emit = Some(now);
                Batch::Sent
            }
        }
    }

    /// Runs a flush scheduled by [`Batch::Deferred`]. Does nothing when that
    /// drag is over or nothing new was captured since the last batch.
    pub fn flush_deferred(&mut self, drag: u64, now: f64, mirror: &mut LocalMirror) -> bool {
        let Some(active) = self
            .drag
            .as_mut()
            .filter(|active| active.generation == drag)
        else {
            return false;
        };
        active.flush_scheduled = false;
        if active.unsent == 0 {
            return false;
        }
        transmit(active, self.transmitter.as_ref(), mirror);
        self.last_emit = Some(now);
        true
    }

    pub fn end(
        &mut self,
        now: f64,
        renderer: &mut dyn Renderer,
        mirror: &mut LocalMirror,
    ) -> Option<Operation> {
        let drag = self.drag.take()?;
        drag.draw(renderer, &drag.points);
        let operation = drag.operation();
        mirror.record_local(operation.clone());
        self.transmitter.send_stroke(&operation);
        self.last_emit = Some(now);
        Some(operation)
    }

    pub fn cancel(&mut self) -> bool {
        self.drag.take().is_some()
    }
}

fn transmit(drag: &mut Drag, transmitter: &dyn Transmitter, mirror: &mut LocalMirror) {
    let operation = drag.operation();
    transmitter.send_stroke(&operation);
    mirror.record_local(operation);
    let keep_from = drag.points.len().saturating_sub(TRAILING_POINTS);
    drag.points.drain(..keep_from);
    drag.unsent = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{Drawn, RecordingRenderer};
    use crate::transmit::testing::RecordingTransmitter;

    struct Harness {
        transmitter: Rc<RecordingTransmitter>,
        pipeline: CapturePipeline,
        renderer: RecordingRenderer,
        mirror: LocalMirror,
    }

    impl Harness {
        fn new() -> Self {
            let transmitter = Rc::new(RecordingTransmitter::default());
            let pipeline = CapturePipeline::with_interval(transmitter.clone(), 60.0);
            Self {
                transmitter,
                pipeline,
                renderer: RecordingRenderer::default(),
                mirror: LocalMirror::new(),
            }
        }

        fn begin(&mut self, id: &str, x: f32) {
            let settings = ToolSettings {
                tool: Tool::Eraser,
                color: "#abcdef".into(),
                width: 9.0,
            };
            self.pipeline
                .begin(id.into(), &settings, p(x), &mut self.renderer);
        }

        fn extend(&mut self, x: f32, now: f64) -> Batch {
            self.pipeline
                .extend(p(x), now, &mut self.renderer, &mut self.mirror)
        }

        fn end(&mut self, now: f64) -> Option<Operation> {
            self.pipeline
                .end(now, &mut self.renderer, &mut self.mirror)
        }
    }

    fn p(x: f32) -> Point {
        Point::new(x, x)
    }

    fn xs(points: &[Point]) -> Vec<f32> {
        points.iter().map(|point| point.x).collect()
    }

    #[test]
    fn drag_start_renders_immediately_without_transmitting() {
        let mut h = Harness::new();
        h.begin("s", 1.0);
        assert!(h.pipeline.is_drawing());
        assert_eq!(h.pipeline.active_id(), Some("s"));
        assert_eq!(
            h.renderer.calls,
            vec![Drawn::Stroke {
                tool: Tool::Eraser,
                color: "#abcdef".into(),
                width: 9.0,
                points: vec![p(1.0)],
            }]
        );
        assert!(h.transmitter.sent.borrow().is_empty());
    }

    #[test]
    fn partial_batches_are_transmitted_as_separate_operations_with_one_id() {
        // Batches are not merged: each one becomes its own history entry and
        // its own undo step on the server.
        let mut h = Harness::new();
        h.begin("s", 0.0);
        assert_eq!(h.extend(1.0, 0.0), Batch::Sent);
        assert_eq!(h.extend(2.0, 10.0), Batch::Deferred { drag: 1, wait_ms: 50.0 });
        assert_eq!(h.extend(3.0, 20.0), Batch::Pending);
        assert_eq!(h.extend(4.0, 70.0), Batch::Sent);
        let last = h.end(80.0).unwrap();

        let sent = h.transmitter.strokes();
        let batches = sent.iter().map(|op| xs(op.points())).collect::<Vec<_>>();
        assert_eq!(
            batches,
            vec![
                vec![0.0, 1.0],
                vec![0.0, 1.0, 2.0, 3.0, 4.0],
                vec![3.0, 4.0],
            ]
        );
        assert!(sent.iter().all(|op| op.id == "s"));
        assert_eq!(sent[2], last);
        assert_eq!(h.mirror.operations(), sent.as_slice());
        assert!(!h.pipeline.is_drawing());
    }

    #[test]
    fn deferred_flush_sends_when_no_further_moves_arrive() {
        let mut h = Harness::new();
        h.begin("s", 0.0);
        h.extend(1.0, 0.0);
        let Batch::Deferred { drag, wait_ms } = h.extend(2.0, 15.0) else {
            panic!("expected a deferred batch");
        };
        assert_eq!(wait_ms, 45.0);

        assert!(h.pipeline.flush_deferred(drag, 60.0, &mut h.mirror));
        let sent = h.transmitter.strokes();
        assert_eq!(sent.len(), 2);
        assert_eq!(xs(sent[1].points()), vec![0.0, 1.0, 2.0]);

        // Nothing new since: a second firing is a no-op.
        assert!(!h.pipeline.flush_deferred(drag, 61.0, &mut h.mirror));
        assert_eq!(h.transmitter.strokes().len(), 2);

        // The slot is free again, so the next early move schedules anew.
        assert!(matches!(h.extend(3.0, 70.0), Batch::Deferred { .. }));
    }

    #[test]
    fn deferred_flush_after_drag_end_is_a_no_op() {
        let mut h = Harness::new();
        h.begin("s", 0.0);
        h.extend(1.0, 0.0);
        let Batch::Deferred { drag, .. } = h.extend(2.0, 5.0) else {
            panic!("expected a deferred batch");
        };
        h.end(10.0);
        let sent_before = h.transmitter.strokes().len();

        assert!(!h.pipeline.flush_deferred(drag, 60.0, &mut h.mirror));
        assert_eq!(h.transmitter.strokes().len(), sent_before);
    }

    #[test]
    fn stale_flush_does_not_touch_a_newer_drag() {
        let mut h = Harness::new();
        h.begin("first", 0.0);
        h.extend(1.0, 0.0);
        let Batch::Deferred { drag: stale, .. } = h.extend(2.0, 5.0) else {
            panic!("expected a deferred batch");
        };
        h.end(10.0);

        h.begin("second", 5.0);
        let Batch::Deferred { drag: fresh, .. } = h.extend(6.0, 20.0) else {
            panic!("expected a deferred batch");
        };
        assert_ne!(stale, fresh);
        assert!(!h.pipeline.flush_deferred(stale, 60.0, &mut h.mirror));
        assert!(h.pipeline.flush_deferred(fresh, 80.0, &mut h.mirror));
        let last = h.transmitter.strokes().pop().unwrap();
        assert_eq!(last.id, "second");
    }

    #[test]
    fn drag_end_renders_the_remaining_buffer_and_records_it() {
        let mut h = Harness::new();
        h.begin("s", 0.0);
        h.extend(1.0, 0.0);
        h.extend(2.0, 10.0);
        let operation = h.end(20.0).unwrap();

        assert_eq!(xs(operation.points()), vec![0.0, 1.0, 2.0]);
        assert_eq!(h.renderer.strokes().last().map(|points| xs(points)), Some(vec![0.0, 1.0, 2.0]));
        assert_eq!(h.mirror.operations().last(), Some(&operation));
        assert!(h.end(30.0).is_none());
    }

    #[test]
    fn tap_without_movement_still_transmits_one_dot() {
        let mut h = Harness::new();
        h.begin("dot", 7.0);
        let operation = h.end(1.0).unwrap();
        assert_eq!(xs(operation.points()), vec![7.0]);
        assert_eq!(h.transmitter.strokes().len(), 1);
    }

    #[test]
    fn preview_only_draws_the_most_recent_points() {
        let mut h = Harness::new();
        h.begin("s", 0.0);
        for step in 1..10 {
            h.extend(step as f32, 0.0);
        }
        let last_preview = h.renderer.strokes().pop().unwrap();
        assert_eq!(last_preview.len(), PREVIEW_POINTS);
        assert_eq!(last_preview.last(), Some(&p(9.0)));
    }

    #[test]
    fn cancel_discards_without_transmitting_or_rendering() {
        let mut h = Harness::new();
        h.begin("s", 0.0);
        h.extend(1.0, 0.0);
        h.extend(2.0, 10.0);
        let drawn = h.renderer.calls.len();
        let sent = h.transmitter.strokes().len();

        assert!(h.pipeline.cancel());
        assert!(!h.pipeline.is_drawing());
        assert_eq!(h.extend(3.0, 100.0), Batch::Idle);
        assert!(h.end(110.0).is_none());
        assert_eq!(h.renderer.calls.len(), drawn);
        assert_eq!(h.transmitter.strokes().len(), sent);
        assert!(!h.pipeline.cancel());
    }
}
