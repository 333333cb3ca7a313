use inkwire_shared::{Operation, OperationKind};
use thiserror::Error;

use crate::state::{DEFAULT_COLOR, MAX_COLOR_LEN, MAX_ID_LEN, MAX_POINTS_PER_OPERATION, MAX_WIDTH};

#[derive(Debug, Error, PartialEq)]
pub enum MalformedOperation {
    #[error("operation id is empty")]
    EmptyId,
    #[error("operation id is {0} bytes long")]
    IdTooLong(usize),
    #[error("only stroke operations can be submitted")]
    NotAStroke,
    #[error("stroke has no finite points")]
    NoPoints,
    #[error("stroke width {0} is not a positive number")]
    InvalidWidth(f32),
}

/// The canonical canvas history plus the redo stack popped off its tail.
///
/// Every mutation goes through this type; callers hold it behind the canvas
/// lock so one event is applied completely before the next one starts.
#[derive(Debug, Default)]
pub struct OperationLog {
    history: Vec<Operation>,
    redo: Vec<Operation>,
    last_timestamp: u64,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends a client stroke, returning the stamped copy that
    /// should be fanned out.
    pub fn append(
        &mut self,
        operation: Operation,
        author: &str,
        now: u64,
    ) -> Result<Operation, MalformedOperation> {
        let mut operation = sanitize_stroke(operation)?;
        operation.author_id = author.to_string();
        operation.timestamp = self.next_timestamp(now);
        self.push_new(operation.clone());
        Ok(operation)
    }

    pub fn undo(&mut self) -> Vec<Operation> {
        if let Some(operation) = self.history.pop() {
            self.redo.push(operation);
        }
        self.snapshot()
    }

    pub fn redo(&mut self) -> Vec<Operation> {
        // Restoring is not new work, so the rest of the redo stack stays.
        if let Some(operation) = self.redo.pop() {
            self.history.push(operation);
        }
        self.snapshot()
    }

    pub fn clear(&mut self, requester: &str, now: u64) -> Operation {
        let timestamp = self.next_timestamp(now);
        let mut operation = Operation::clear(format!("clear-{timestamp}"));
        operation.author_id = requester.to_string();
        operation.timestamp = timestamp;
        self.push_new(operation.clone());
        operation
    }

    pub fn snapshot(&self) -> Vec<Operation> {
        self.history.clone()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    fn push_new(&mut self, operation: Operation) {
        self.history.push(operation);
        self.redo.clear();
    }

    fn next_timestamp(&mut self, now: u64) -> u64 {
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }
}

fn sanitize_stroke(mut operation: Operation) -> Result<Operation, MalformedOperation> {
    if operation.id.is_empty() {
        return Err(MalformedOperation::EmptyId);
    }
    if operation.id.len() > MAX_ID_LEN {
        return Err(MalformedOperation::IdTooLong(operation.id.len()));
    }
    let OperationKind::Stroke {
        color,
        width,
        points,
        ..
    } = &mut operation.kind
    else {
        return Err(MalformedOperation::NotAStroke);
    };
    if !width.is_finite() || *width <= 0.0 {
        return Err(MalformedOperation::InvalidWidth(*width));
    }
    *width = width.min(MAX_WIDTH);
    sanitize_color(color);
    points.retain(|point| point.is_finite());
    points.truncate(MAX_POINTS_PER_OPERATION);
    if points.is_empty() {
        return Err(MalformedOperation::NoPoints);
    }
    Ok(operation)
}

fn sanitize_color(color: &mut String) {
    if color.is_empty() {
        color.push_str(DEFAULT_COLOR);
        return;
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
}
