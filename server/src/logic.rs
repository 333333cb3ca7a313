use inkwire_shared::{ClientMessage, RemoteCursor, ServerMessage, User};
use tracing::debug;
use uuid::Uuid;

use crate::state::{Canvas, PeerSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipients {
    Everyone,
    Others,
}

/// Registers a new connection and performs the join bootstrap: identity and
/// history go to the newcomer only, the presence list goes to everyone.
pub fn connect_peer(canvas: &mut Canvas, connection_id: Uuid, tx: PeerSender, now: u64) -> User {
    canvas.peers.insert(connection_id, tx);
    let user = canvas.presence.add_user(connection_id, now);

    send_to(canvas, connection_id, ServerMessage::Me { user: user.clone() });
    let users = canvas.presence.list_users();
    broadcast_all(canvas, ServerMessage::Users { users });
    let history = canvas.log.snapshot();
    send_to(canvas, connection_id, ServerMessage::Init { history });
    broadcast_except(canvas, connection_id, ServerMessage::UserJoined { user: user.clone() });
    user
}

pub fn disconnect_peer(canvas: &mut Canvas, connection_id: Uuid) -> Option<User> {
    canvas.peers.remove(&connection_id);
    let user = canvas.presence.remove_user(connection_id);
    let users = canvas.presence.list_users();
    broadcast_all(canvas, ServerMessage::Users { users });
    broadcast_all(
        canvas,
        ServerMessage::UserLeft {
            user_id: connection_id.to_string(),
        },
    );
    user
}

pub fn apply_client_message(
    canvas: &mut Canvas,
    sender: Uuid,
    message: ClientMessage,
    now: u64,
) -> Option<(ServerMessage, Recipients)> {
    match message {
        ClientMessage::Stroke { operation } => {
            let id = operation.id.clone();
            match canvas.log.append(operation, &sender.to_string(), now) {
                Ok(operation) => Some((ServerMessage::Stroke { operation }, Recipients::Others)),
                Err(error) => {
                    debug!(conn = %sender, op = %id, %error, "dropping malformed operation");
                    None
                }
            }
        }
        ClientMessage::Cursor { x, y } => {
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            let (name, color) = match canvas.presence.get_user(sender) {
                Some(user) => (user.name.clone(), user.color.clone()),
                None => ("User".to_string(), "#000".to_string()),
            };
            Some((
                ServerMessage::Cursor(RemoteCursor {
                    x,
                    y,
                    user_id: sender.to_string(),
                    name,
                    color,
                }),
                Recipients::Others,
            ))
        }
        ClientMessage::Undo => {
            let history = canvas.log.undo();
            Some((ServerMessage::UpdateHistory { history }, Recipients::Everyone))
        }
        ClientMessage::Redo => {
            let history = canvas.log.redo();
            Some((ServerMessage::UpdateHistory { history }, Recipients::Everyone))
        }
        ClientMessage::Clear => {
            canvas.log.clear(&sender.to_string(), now);
            Some((ServerMessage::ClearCanvas, Recipients::Everyone))
        }
    }
}

/// Applies one client message and enqueues its fanout before returning, so
/// callers holding the canvas lock deliver in append order.
pub fn handle_client_message(canvas: &mut Canvas, sender: Uuid, message: ClientMessage, now: u64) {
    if let Some((message, recipients)) = apply_client_message(canvas, sender, message, now) {
        match recipients {
            Recipients::Everyone => broadcast_all(canvas, message),
            Recipients::Others => broadcast_except(canvas, sender, message),
        }
    }
}

pub fn send_to(canvas: &mut Canvas, target: Uuid, message: ServerMessage) {
    let failed = canvas
        .peers
        .get(&target)
        .is_some_and(|tx| tx.send(message).is_err());
    if failed {
        canvas.peers.remove(&target);
    }
}

pub fn broadcast_except(canvas: &mut Canvas, sender: Uuid, message: ServerMessage) {
    let mut stale = Vec::new();
    for (id, tx) in canvas.peers.iter() {
        if *id == sender {
            continue;
        }
        if tx.send(message.clone()).is_err() {
            stale.push(*id);
        }
    }
    prune(canvas, stale);
}

pub fn broadcast_all(canvas: &mut Canvas, message: ServerMessage) {
    let mut stale = Vec::new();
    for (id, tx) in canvas.peers.iter() {
        if tx.send(message.clone()).is_err() {
            stale.push(*id);
        }
    }
    prune(canvas, stale);
}

fn prune(canvas: &mut Canvas, stale: Vec<Uuid>) {
    for id in stale {
        debug!(conn = %id, "pruning closed peer channel");
        canvas.peers.remove(&id);
    }
}
