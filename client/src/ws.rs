use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket, Window};

use inkwire_shared::{decode_frame, encode_frame, ClientMessage, Operation, Point, ServerMessage};

use crate::transmit::Transmitter;

const INITIAL_BACKOFF_MS: i32 = 500;
const MAX_BACKOFF_MS: i32 = 8000;

#[derive(Debug)]
pub enum WsEvent {
    Open,
    /// The socket is gone. Nothing sent in the gap is kept; the next `Open`
    /// starts a brand new session on the server.
    Lost,
    Message(ServerMessage),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Lost,
}

/// Reconnect delays: doubles after every loss up to a cap, back to the
/// start once a socket opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    next_ms: i32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            next_ms: INITIAL_BACKOFF_MS,
        }
    }
}

impl Backoff {
    pub fn next_delay(&mut self) -> i32 {
        let delay = self.next_ms;
        self.next_ms = delay.saturating_mul(2).min(MAX_BACKOFF_MS);
        delay
    }

    pub fn reset(&mut self) {
        self.next_ms = INITIAL_BACKOFF_MS;
    }
}

/// A WebSocket that replaces itself after a backoff whenever it closes.
pub struct Connection {
    window: Window,
    url: String,
    socket: RefCell<Option<WebSocket>>,
    state: Cell<ConnectionState>,
    generation: Cell<u32>,
    backoff: Cell<Backoff>,
    on_event: RefCell<Option<Box<dyn FnMut(WsEvent)>>>,
}

impl Connection {
    pub fn new(window: Window, url: String) -> Rc<Self> {
        Rc::new(Self {
            window,
            url,
            socket: RefCell::new(None),
            state: Cell::new(ConnectionState::Connecting),
            generation: Cell::new(0),
            backoff: Cell::new(Backoff::default()),
            on_event: RefCell::new(None),
        })
    }

    pub fn start(self: &Rc<Self>, on_event: impl 'static + FnMut(WsEvent)) {
        *self.on_event.borrow_mut() = Some(Box::new(on_event));
        self.open_socket();
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn send(&self, message: &ClientMessage) {
        if self.state.get() != ConnectionState::Open {
            return;
        }
        let socket = self.socket.borrow();
        let Some(socket) = socket.as_ref() else {
            return;
        };
        if socket.ready_state() != WebSocket::OPEN {
            return;
        }
        if let Ok(payload) = encode_frame(message) {
            let _ = socket.send_with_u8_array(&payload);
        }
    }

    fn emit(&self, event: WsEvent) {
        if let Some(on_event) = self.on_event.borrow_mut().as_mut() {
            on_event(event);
        }
    }

    fn is_current(&self, generation: u32) -> bool {
        self.generation.get() == generation
    }

    fn open_socket(self: &Rc<Self>) {
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        self.state.set(ConnectionState::Connecting);

        let socket = match WebSocket::new(&self.url) {
            Ok(socket) => socket,
            Err(error) => {
                web_sys::console::error_2(&"WS create failed".into(), &error);
                self.connection_lost(generation);
                return;
            }
        };
        socket.set_binary_type(BinaryType::Arraybuffer);

        {
            let connection = self.clone();
            let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
                if !connection.is_current(generation) {
                    return;
                }
                connection.state.set(ConnectionState::Open);
                let mut backoff = connection.backoff.get();
                backoff.reset();
                connection.backoff.set(backoff);
                connection.emit(WsEvent::Open);
            });
            socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
            onopen.forget();
        }

        {
            let connection = self.clone();
            let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
                web_sys::console::warn_1(
                    &format!(
                        "WS closed url={} code={} reason={:?}",
                        connection.url,
                        event.code(),
                        event.reason()
                    )
                    .into(),
                );
                connection.connection_lost(generation);
            });
            socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
            onclose.forget();
        }

        {
            let url = self.url.clone();
            let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
                web_sys::console::error_1(&format!("WS error url={url}").into());
            });
            socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        }

        {
            let connection = self.clone();
            let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                if !connection.is_current(generation) {
                    return;
                }
                let data = event.data();
                if let Some(text) = data.as_string() {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => connection.emit(WsEvent::Message(message)),
                        Err(error) => web_sys::console::error_1(
                            &format!("WS message json parse error: {error}").into(),
                        ),
                    }
                    return;
                }
                let Ok(buffer) = data.dyn_into::<js_sys::ArrayBuffer>() else {
                    web_sys::console::error_1(&"WS message data is not an arraybuffer".into());
                    return;
                };
                let bytes = Uint8Array::new(&buffer).to_vec();
                match decode_frame::<ServerMessage>(&bytes) {
                    Ok(message) => connection.emit(WsEvent::Message(message)),
                    Err(error) => web_sys::console::error_1(
                        &format!("WS message bincode parse error: {error}").into(),
                    ),
                }
            });
            socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
            onmessage.forget();
        }

        *self.socket.borrow_mut() = Some(socket);
    }

    fn connection_lost(self: &Rc<Self>, generation: u32) {
        if !self.is_current(generation) || self.state.get() == ConnectionState::Lost {
            return;
        }
        self.state.set(ConnectionState::Lost);
        self.socket.borrow_mut().take();
        self.emit(WsEvent::Lost);

        let mut backoff = self.backoff.get();
        let delay = backoff.next_delay();
        self.backoff.set(backoff);
        let connection = self.clone();
        let reconnect = Closure::once_into_js(move || connection.open_socket());
        let _ = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                reconnect.unchecked_ref(),
                delay,
            );
    }

    pub fn close(&self) {
        if let Some(socket) = self.socket.borrow().as_ref() {
            let _ = socket.close();
        }
    }
}

/// Sends protocol messages over the current socket, dropping them while
/// the connection is down.
pub struct WsTransmitter {
    connection: Rc<Connection>,
}

impl WsTransmitter {
    pub fn new(connection: Rc<Connection>) -> Self {
        Self { connection }
    }
}

impl Transmitter for WsTransmitter {
    fn send_stroke(&self, operation: &Operation) {
        self.connection.send(&ClientMessage::Stroke {
            operation: operation.clone(),
        });
    }

    fn send_cursor(&self, point: Point) {
        self.connection.send(&ClientMessage::Cursor {
            x: point.x,
            y: point.y,
        });
    }

    fn send_undo(&self) {
        self.connection.send(&ClientMessage::Undo);
    }

    fn send_redo(&self) {
        self.connection.send(&ClientMessage::Redo);
    }

    fn send_clear(&self) {
        self.connection.send(&ClientMessage::Clear);
    }
}
