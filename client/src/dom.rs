use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlElement, PointerEvent, Window};

use inkwire_shared::{Point, RemoteCursor, User, UserSummary};

use crate::render::CanvasRenderer;

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn set_status(status_el: &Element, state: &str, text: &str) {
    let _ = status_el.set_attribute("data-state", state);
    status_el.set_text_content(Some(text));
}

pub fn show_me(me_el: &HtmlElement, user: &User) {
    me_el.set_text_content(Some(&user.name));
    let _ = me_el.style().set_property("color", &user.color);
}

pub fn render_users(document: &Document, list_el: &Element, users: &[UserSummary]) {
    list_el.set_inner_html("");
    for user in users {
        let Ok(row) = document.create_element("div") else {
            continue;
        };
        row.set_class_name("user");
        if let Ok(swatch) = document.create_element("span") {
            swatch.set_class_name("swatch");
            let _ = swatch.set_attribute("style", &format!("background:{}", user.color));
            let _ = row.append_child(&swatch);
        }
        if let Ok(name) = document.create_element("span") {
            name.set_text_content(Some(&user.name));
            let _ = row.append_child(&name);
        }
        let _ = list_el.append_child(&row);
    }
}

fn cursor_element_id(user_id: &str) -> String {
    format!("cursor-{user_id}")
}

pub fn place_remote_cursor(document: &Document, layer: &Element, cursor: &RemoteCursor) {
    let id = cursor_element_id(&cursor.user_id);
    let marker = match document.get_element_by_id(&id) {
        Some(marker) => marker,
        None => {
            let Ok(marker) = build_cursor_marker(document, &id) else {
                return;
            };
            let _ = layer.append_child(&marker);
            marker
        }
    };
    let Ok(marker) = marker.dyn_into::<HtmlElement>() else {
        return;
    };
    let style = marker.style();
    let _ = style.set_property("left", &format!("{}px", cursor.x));
    let _ = style.set_property("top", &format!("{}px", cursor.y));
    if let Ok(Some(dot)) = marker.query_selector(".dot") {
        let _ = dot.set_attribute("style", &format!("background:{}", cursor.color));
    }
    if let Ok(Some(label)) = marker.query_selector(".label") {
        label.set_text_content(Some(&cursor.name));
    }
}

fn build_cursor_marker(document: &Document, id: &str) -> Result<Element, JsValue> {
    let marker = document.create_element("div")?;
    marker.set_id(id);
    marker.set_class_name("cursor");
    let dot = document.create_element("div")?;
    dot.set_class_name("dot");
    let label = document.create_element("div")?;
    label.set_class_name("label");
    marker.append_child(&dot)?;
    marker.append_child(&label)?;
    Ok(marker)
}

pub fn remove_remote_cursor(document: &Document, user_id: &str) {
    if let Some(marker) = document.get_element_by_id(&cursor_element_id(user_id)) {
        marker.remove();
    }
}

/// Matches the backing store to the displayed size and device pixel ratio.
/// The caller must replay the mirror afterwards: resizing wipes the bitmap.
pub fn resize_canvas(window: &Window, canvas: &HtmlCanvasElement, renderer: &mut CanvasRenderer) {
    let rect = canvas.get_bounding_client_rect();
    let dpr = window.device_pixel_ratio();
    canvas.set_width((rect.width() * dpr) as u32);
    canvas.set_height((rect.height() * dpr) as u32);
    let _ = renderer.ctx().set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
    renderer.set_size(rect.width(), rect.height());
}

pub fn event_to_point(canvas: &HtmlCanvasElement, event: &PointerEvent) -> Option<Point> {
    let rect = canvas.get_bounding_client_rect();
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return None;
    }
    let point = Point::new(
        (event.client_x() as f64 - rect.left()) as f32,
        (event.client_y() as f64 - rect.top()) as f32,
    );
    point.is_finite().then_some(point)
}
