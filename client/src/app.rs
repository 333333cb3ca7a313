use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, HtmlButtonElement, HtmlCanvasElement,
    HtmlElement, HtmlInputElement, HtmlSelectElement, KeyboardEvent, PointerEvent, Window,
};

use inkwire_shared::ServerMessage;

use crate::capture::{Batch, CapturePipeline};
use crate::dom::{
    event_to_point, get_element, place_remote_cursor, remove_remote_cursor, render_users,
    resize_canvas, set_status, show_me,
};
use crate::mirror::LocalMirror;
use crate::net::websocket_url;
use crate::presence::{forget_connection, CursorThrottle, RemoteCursors};
use crate::render::CanvasRenderer;
use crate::state::{parse_tool, parse_width, ToolSettings};
use crate::transmit::Transmitter;
use crate::util::{make_id, now_ms};
use crate::ws::{Connection, ConnectionState, WsEvent, WsTransmitter};

const CURSOR_SWEEP_MS: i32 = 1000;

struct Ui {
    document: Document,
    status_el: Element,
    me_el: HtmlElement,
    users_el: Element,
    cursor_layer: Element,
}

struct App {
    canvas: HtmlCanvasElement,
    renderer: CanvasRenderer,
    mirror: LocalMirror,
    pipeline: CapturePipeline,
    throttle: CursorThrottle,
    cursors: RemoteCursors,
    settings: ToolSettings,
}

impl App {
    fn handle_ws_event(&mut self, ui: &Ui, event: WsEvent) {
        match event {
            WsEvent::Open => set_status(&ui.status_el, "open", "Connected"),
            WsEvent::Lost => {
                // The server forgets this connection; so do we.
                let removed =
                    forget_connection(&mut self.pipeline, &mut self.throttle, &mut self.cursors);
                for user_id in removed {
                    remove_remote_cursor(&ui.document, &user_id);
                }
                set_status(&ui.status_el, "closed", "Disconnected, reconnecting...");
            }
            WsEvent::Message(message) => self.handle_server_message(ui, message),
        }
    }

    fn handle_server_message(&mut self, ui: &Ui, message: ServerMessage) {
        match message {
            ServerMessage::Me { user } => show_me(&ui.me_el, &user),
            ServerMessage::Users { users } => render_users(&ui.document, &ui.users_el, &users),
            ServerMessage::Init { history } | ServerMessage::UpdateHistory { history } => {
                self.mirror.rebuild(history, &mut self.renderer);
            }
            ServerMessage::Stroke { operation } => {
                self.mirror.apply_remote(operation, &mut self.renderer);
            }
            ServerMessage::Cursor(cursor) => {
                self.cursors.seen(&cursor.user_id, now_ms());
                place_remote_cursor(&ui.document, &ui.cursor_layer, &cursor);
            }
            ServerMessage::ClearCanvas => self.mirror.wipe(&mut self.renderer),
            ServerMessage::UserJoined { user } => {
                web_sys::console::log_1(&format!("{} joined", user.name).into());
            }
            ServerMessage::UserLeft { user_id } => {
                self.cursors.forget(&user_id);
                remove_remote_cursor(&ui.document, &user_id);
            }
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent) {
        let Some(point) = event_to_point(&self.canvas, event) else {
            return;
        };
        self.pipeline
            .begin(make_id("stroke"), &self.settings, point, &mut self.renderer);
        self.throttle.moved(point, now_ms());
    }

    fn pointer_move(&mut self, event: &PointerEvent) -> Batch {
        let Some(point) = event_to_point(&self.canvas, event) else {
            return Batch::Idle;
        };
        let now = now_ms();
        self.throttle.moved(point, now);
        self.pipeline
            .extend(point, now, &mut self.renderer, &mut self.mirror)
    }

    fn pointer_up(&mut self) {
        self.pipeline
            .end(now_ms(), &mut self.renderer, &mut self.mirror);
    }

    fn flush_deferred(&mut self, drag: u64) {
        self.pipeline
            .flush_deferred(drag, now_ms(), &mut self.mirror);
    }

    fn resize(&mut self, window: &Window) {
        resize_canvas(window, &self.canvas, &mut self.renderer);
        self.mirror.replay(&mut self.renderer);
    }

    fn expire_cursors(&mut self, ui: &Ui) {
        for user_id in self.cursors.expire(now_ms()) {
            remove_remote_cursor(&ui.document, &user_id);
        }
    }
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let canvas: HtmlCanvasElement = get_element(&document, "drawCanvas")?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("Missing 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()?;

    let ui = Rc::new(Ui {
        status_el: get_element(&document, "status")?,
        me_el: get_element(&document, "meInfo")?,
        users_el: get_element(&document, "usersList")?,
        cursor_layer: get_element(&document, "cursors")?,
        document: document.clone(),
    });

    let tool_select: HtmlSelectElement = get_element(&document, "toolSelect")?;
    let color_input: HtmlInputElement = get_element(&document, "colorPicker")?;
    let width_input: HtmlInputElement = get_element(&document, "widthRange")?;
    let undo_button: HtmlButtonElement = get_element(&document, "undoBtn")?;
    let redo_button: HtmlButtonElement = get_element(&document, "redoBtn")?;
    let clear_button: HtmlButtonElement = get_element(&document, "clearBtn")?;

    let connection = Connection::new(window.clone(), websocket_url(&window)?);
    let transmitter: Rc<dyn Transmitter> = Rc::new(WsTransmitter::new(connection.clone()));

    let settings = ToolSettings {
        tool: parse_tool(&tool_select.value()),
        color: color_input.value(),
        width: parse_width(&width_input.value()),
    };
    let app = Rc::new(RefCell::new(App {
        canvas: canvas.clone(),
        renderer: CanvasRenderer::new(ctx),
        mirror: LocalMirror::new(),
        pipeline: CapturePipeline::new(transmitter.clone()),
        throttle: CursorThrottle::new(transmitter.clone()),
        cursors: RemoteCursors::default(),
        settings,
    }));
    app.borrow_mut().resize(&window);

    set_status(&ui.status_el, "connecting", "Connecting...");
    {
        let app = app.clone();
        let ui = ui.clone();
        connection.start(move |event| app.borrow_mut().handle_ws_event(&ui, event));
    }

    {
        let app = app.clone();
        let canvas_cb = canvas.clone();
        let ondown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            event.prevent_default();
            let _ = canvas_cb.set_pointer_capture(event.pointer_id());
            app.borrow_mut().pointer_down(&event);
        });
        canvas.add_event_listener_with_callback("pointerdown", ondown.as_ref().unchecked_ref())?;
        ondown.forget();
    }

    {
        let app = app.clone();
        let window_cb = window.clone();
        let onmove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let batch = app.borrow_mut().pointer_move(&event);
            if let Batch::Deferred { drag, wait_ms } = batch {
                let app = app.clone();
                let flush = Closure::once_into_js(move || app.borrow_mut().flush_deferred(drag));
                let _ = window_cb.set_timeout_with_callback_and_timeout_and_arguments_0(
                    flush.unchecked_ref(),
                    wait_ms.ceil() as i32,
                );
            }
        });
        canvas.add_event_listener_with_callback("pointermove", onmove.as_ref().unchecked_ref())?;
        onmove.forget();
    }

    {
        let app = app.clone();
        let onup = Closure::<dyn FnMut(PointerEvent)>::new(move |_event: PointerEvent| {
            app.borrow_mut().pointer_up();
        });
        canvas.add_event_listener_with_callback("pointerup", onup.as_ref().unchecked_ref())?;
        onup.forget();
    }

    {
        let app = app.clone();
        let oncancel = Closure::<dyn FnMut(PointerEvent)>::new(move |_event: PointerEvent| {
            app.borrow_mut().pipeline.cancel();
        });
        canvas
            .add_event_listener_with_callback("pointercancel", oncancel.as_ref().unchecked_ref())?;
        oncancel.forget();
    }

    {
        let app = app.clone();
        let tool_cb = tool_select.clone();
        let color_cb = color_input.clone();
        let width_cb = width_input.clone();
        let onsettings = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let mut app = app.borrow_mut();
            app.settings.tool = parse_tool(&tool_cb.value());
            app.settings.color = color_cb.value();
            app.settings.width = parse_width(&width_cb.value());
        });
        let callback = onsettings.as_ref().unchecked_ref();
        tool_select.add_event_listener_with_callback("change", callback)?;
        color_input.add_event_listener_with_callback("input", callback)?;
        width_input.add_event_listener_with_callback("input", callback)?;
        onsettings.forget();
    }

    {
        let transmitter = transmitter.clone();
        let onundo = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            transmitter.send_undo();
        });
        undo_button.add_event_listener_with_callback("click", onundo.as_ref().unchecked_ref())?;
        onundo.forget();
    }

    {
        let transmitter = transmitter.clone();
        let onredo = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            transmitter.send_redo();
        });
        redo_button.add_event_listener_with_callback("click", onredo.as_ref().unchecked_ref())?;
        onredo.forget();
    }

    {
        let transmitter = transmitter.clone();
        let connection = connection.clone();
        let window_cb = window.clone();
        let onclear = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if connection.state() != ConnectionState::Open {
                return;
            }
            let confirmed = window_cb
                .confirm_with_message("Clear canvas for everyone?")
                .unwrap_or(false);
            if confirmed {
                transmitter.send_clear();
            }
        });
        clear_button.add_event_listener_with_callback("click", onclear.as_ref().unchecked_ref())?;
        onclear.forget();
    }

    {
        let transmitter = transmitter.clone();
        let onkeydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if !(event.ctrl_key() || event.meta_key()) {
                return;
            }
            match event.key().to_lowercase().as_str() {
                "z" if event.shift_key() => transmitter.send_redo(),
                "z" => transmitter.send_undo(),
                "y" => transmitter.send_redo(),
                _ => return,
            }
            event.prevent_default();
        });
        window.add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())?;
        onkeydown.forget();
    }

    {
        let app = app.clone();
        let window_cb = window.clone();
        let onresize = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            app.borrow_mut().resize(&window_cb);
        });
        window.add_event_listener_with_callback("resize", onresize.as_ref().unchecked_ref())?;
        onresize.forget();
    }

    {
        let app = app.clone();
        let ui = ui.clone();
        let onsweep = Closure::<dyn FnMut()>::new(move || {
            app.borrow_mut().expire_cursors(&ui);
        });
        window.set_interval_with_callback_and_timeout_and_arguments_0(
            onsweep.as_ref().unchecked_ref(),
            CURSOR_SWEEP_MS,
        )?;
        onsweep.forget();
    }

    {
        let connection = connection.clone();
        let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            connection.close();
        });
        window.add_event_listener_with_callback(
            "beforeunload",
            onbeforeunload.as_ref().unchecked_ref(),
        )?;
        onbeforeunload.forget();
    }

    Ok(())
}
