use inkwire_shared::{Operation, Point};

/// Outbound half of the protocol as seen by the capture pipeline and the
/// cursor throttle. Sends are fire-and-forget: nothing is queued or retried.
pub trait Transmitter {
    fn send_stroke(&self, operation: &Operation);
    fn send_cursor(&self, point: Point);
    fn send_undo(&self);
    fn send_redo(&self);
    fn send_clear(&self);
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;

    use inkwire_shared::ClientMessage;

    use super::*;

    #[derive(Default)]
    pub struct RecordingTransmitter {
        pub sent: RefCell<Vec<ClientMessage>>,
    }

    impl RecordingTransmitter {
        pub fn strokes(&self) -> Vec<Operation> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|message| match message {
                    ClientMessage::Stroke { operation } => Some(operation.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn cursors(&self) -> Vec<Point> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|message| match message {
                    ClientMessage::Cursor { x, y } => Some(Point::new(*x, *y)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transmitter for RecordingTransmitter {
        fn send_stroke(&self, operation: &Operation) {
            self.sent.borrow_mut().push(ClientMessage::Stroke {
                operation: operation.clone(),
            });
        }

        fn send_cursor(&self, point: Point) {
            self.sent.borrow_mut().push(ClientMessage::Cursor {
                x: point.x,
                y: point.y,
            });
        }

        fn send_undo(&self) {
            self.sent.borrow_mut().push(ClientMessage::Undo);
        }

        fn send_redo(&self) {
            self.sent.borrow_mut().push(ClientMessage::Redo);
        }

        fn send_clear(&self) {
            self.sent.borrow_mut().push(ClientMessage::Clear);
        }
    }
}
