use inkwire_shared::Operation;

use crate::render::{draw_operation, Renderer};

/// Client-side copy of the server history, used to repaint the canvas.
///
/// Full snapshots replace the mirror wholesale and are replayed from an empty
/// surface; only remote strokes and our own transmissions are appended.
#[derive(Debug, Default)]
pub struct LocalMirror {
    operations: Vec<Operation>,
}

impl LocalMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(&mut self, history: Vec<Operation>, renderer: &mut dyn Renderer) {
        self.operations = history;
        self.replay(renderer);
    }

    pub fn replay(&self, renderer: &mut dyn Renderer) {
        renderer.clear();
        for operation in &self.operations {
            draw_operation(renderer, operation);
        }
    }

    pub fn apply_remote(&mut self, operation: Operation, renderer: &mut dyn Renderer) {
        draw_operation(renderer, &operation);
        self.operations.push(operation);
    }

    /// Records a batch this client already painted while capturing it.
    pub fn record_local(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn wipe(&mut self, renderer: &mut dyn Renderer) {
        self.operations.clear();
        renderer.clear();
    }

    #[cfg(test)]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use inkwire_shared::{Point, Tool};

    use super::*;
    use crate::render::testing::{Drawn, RecordingRenderer};

    fn stroke(id: &str, x: f32) -> Operation {
        Operation::stroke(id, Tool::Brush, "#111", 2.0, vec![Point::new(x, x)])
    }

    #[test]
    fn rebuild_replays_from_an_empty_surface_in_order() {
        let mut mirror = LocalMirror::new();
        let mut renderer = RecordingRenderer::default();
        mirror.record_local(stroke("stale", 9.0));

        mirror.rebuild(
            vec![stroke("a", 1.0), Operation::clear("c"), stroke("b", 2.0)],
            &mut renderer,
        );

        assert_eq!(mirror.len(), 3);
        assert_eq!(renderer.calls.len(), 4);
        assert_eq!(renderer.calls[0], Drawn::Clear);
        assert_eq!(renderer.calls[2], Drawn::Clear);
        assert_eq!(
            renderer.strokes(),
            vec![vec![Point::new(1.0, 1.0)], vec![Point::new(2.0, 2.0)]]
        );
    }

    #[test]
    fn replaying_twice_draws_the_same_sequence() {
        let mut mirror = LocalMirror::new();
        let mut first = RecordingRenderer::default();
        mirror.rebuild(vec![stroke("a", 1.0), stroke("b", 2.0)], &mut first);
        let mut second = RecordingRenderer::default();
        mirror.replay(&mut second);
        assert_eq!(first.calls, second.calls);
    }

    #[test]
    fn remote_strokes_are_drawn_incrementally() {
        let mut mirror = LocalMirror::new();
        let mut renderer = RecordingRenderer::default();
        mirror.apply_remote(stroke("r", 3.0), &mut renderer);
        assert_eq!(renderer.calls.len(), 1);
        assert_eq!(mirror.operations()[0].id, "r");
    }

    #[test]
    fn local_records_are_not_redrawn() {
        let mut mirror = LocalMirror::new();
        let renderer = RecordingRenderer::default();
        mirror.record_local(stroke("mine", 1.0));
        assert!(renderer.calls.is_empty());
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn wipe_empties_mirror_and_surface() {
        let mut mirror = LocalMirror::new();
        let mut renderer = RecordingRenderer::default();
        mirror.record_local(stroke("a", 1.0));
        mirror.wipe(&mut renderer);
        assert!(mirror.is_empty());
        assert_eq!(renderer.calls, vec![Drawn::Clear]);
    }
}
