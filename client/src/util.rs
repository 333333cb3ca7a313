fn random_u32() -> u32 {
    (js_sys::Math::random() * (u32::MAX as f64 + 1.0)) as u32
}

pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

pub fn make_id(prefix: &str) -> String {
    let now = js_sys::Date::now() as u64;
    format!("{prefix}-{:08x}{:08x}-{now:x}", random_u32(), random_u32())
}
