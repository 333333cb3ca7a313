mod app;
mod capture;
mod dom;
mod mirror;
mod net;
mod presence;
mod render;
mod state;
mod transmit;
mod util;
mod ws;

pub use app::run;
