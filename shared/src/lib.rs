use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationKind {
    Stroke {
        tool: Tool,
        color: String,
        width: f32,
        points: Vec<Point>,
    },
    Clear,
}

/// One entry of the shared canvas history.
///
/// `author_id` and `timestamp` are owned by the server: whatever a client puts
/// there is overwritten when the operation is appended.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    pub fn stroke(
        id: impl Into<String>,
        tool: Tool,
        color: impl Into<String>,
        width: f32,
        points: Vec<Point>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: String::new(),
            timestamp: 0,
            kind: OperationKind::Stroke {
                tool,
                color: color.into(),
                width,
                points,
            },
        }
    }

    pub fn clear(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author_id: String::new(),
            timestamp: 0,
            kind: OperationKind::Clear,
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self.kind, OperationKind::Clear)
    }

    pub fn points(&self) -> &[Point] {
        match &self.kind {
            OperationKind::Stroke { points, .. } => points,
            OperationKind::Clear => &[],
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub color: String,
    pub joined_at: u64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCursor {
    pub x: f32,
    pub y: f32,
    pub user_id: String,
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "stroke")]
    Stroke { operation: Operation },
    #[serde(rename = "cursor")]
    Cursor { x: f32, y: f32 },
    #[serde(rename = "undo")]
    Undo,
    #[serde(rename = "redo")]
    Redo,
    #[serde(rename = "clear")]
    Clear,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "me")]
    Me { user: User },
    #[serde(rename = "users")]
    Users { users: Vec<UserSummary> },
    #[serde(rename = "init")]
    Init { history: Vec<Operation> },
    #[serde(rename = "stroke")]
    Stroke { operation: Operation },
    #[serde(rename = "cursor")]
    Cursor(RemoteCursor),
    #[serde(rename = "update-history")]
    UpdateHistory { history: Vec<Operation> },
    #[serde(rename = "clear-canvas")]
    ClearCanvas,
    #[serde(rename = "user-joined")]
    UserJoined { user: User },
    #[serde(rename = "user-left")]
    UserLeft {
        #[serde(rename = "userId")]
        user_id: String,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Me { .. } => "me",
            ServerMessage::Users { .. } => "users",
            ServerMessage::Init { .. } => "init",
            ServerMessage::Stroke { .. } => "stroke",
            ServerMessage::Cursor(_) => "cursor",
            ServerMessage::UpdateHistory { .. } => "update-history",
            ServerMessage::ClearCanvas => "clear-canvas",
            ServerMessage::UserJoined { .. } => "user-joined",
            ServerMessage::UserLeft { .. } => "user-left",
        }
    }
}

pub fn encode_frame<T: Encode>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::encode_to_vec(message, bincode::config::standard())
}

pub fn decode_frame<T: Decode<()>>(payload: &[u8]) -> Result<T, DecodeError> {
    bincode::decode_from_slice(payload, bincode::config::standard()).map(|(message, _)| message)
}

/// Upper bound on what one client frame may ask the decoder to allocate.
/// A 5000-point stroke needs about 40 KiB.
pub const MAX_CLIENT_FRAME_BYTES: usize = 256 * 1024;

/// Decodes a frame that came from a client. Length prefixes are checked
/// against [`MAX_CLIENT_FRAME_BYTES`] before anything is allocated.
pub fn decode_client_frame(payload: &[u8]) -> Result<ClientMessage, DecodeError> {
    let config = bincode::config::standard().with_limit::<MAX_CLIENT_FRAME_BYTES>();
    bincode::decode_from_slice(payload, config).map(|(message, _)| message)
}
