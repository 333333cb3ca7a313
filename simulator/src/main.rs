//! Load generator: drives synthetic clients against a running canvas server.
//!
//! Every client connects over WebSocket, speaks the JSON text protocol and
//! on a fixed interval either draws a random stroke, asks for an undo or asks
//! for a redo. Server frames come back as bincode and are decoded so history
//! resyncs can be reported.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use inkwire_shared::{decode_frame, ClientMessage, Operation, Point, ServerMessage, Tool};

const STROKE_POINTS: usize = 10;
const BOARD_WIDTH: f32 = 800.0;
const BOARD_HEIGHT: f32 = 600.0;
const PALETTE: [&str; 5] = ["#FF5733", "#33FF57", "#3357FF", "#FF33A8", "#FFD433"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "ws://localhost:3000/ws")]
    url: String,
    #[arg(long, default_value_t = 5)]
    clients: usize,
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,
    /// Probability that a tick draws a stroke.
    #[arg(long, default_value_t = 0.8)]
    draw: f64,
    /// Probability that a tick requests an undo. Redo takes the remainder.
    #[arg(long, default_value_t = 0.1)]
    undo: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Draw,
    Undo,
    Redo,
}

#[derive(Clone, Copy, Debug)]
struct ActionOdds {
    draw: f64,
    undo: f64,
}

impl ActionOdds {
    fn new(draw: f64, undo: f64) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&draw) && (0.0..=1.0).contains(&undo),
            "probabilities must lie in [0, 1]"
        );
        anyhow::ensure!(draw + undo <= 1.0, "--draw plus --undo must not exceed 1");
        Ok(Self { draw, undo })
    }

    fn pick(&self, roll: f64) -> Action {
        if roll < self.draw {
            Action::Draw
        } else if roll < self.draw + self.undo {
            Action::Undo
        } else {
            Action::Redo
        }
    }
}

fn stroke_id(rng: &mut impl Rng) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("{millis}-{suffix}")
}

fn random_stroke(rng: &mut impl Rng) -> Operation {
    let points = (0..STROKE_POINTS)
        .map(|_| {
            Point::new(
                rng.gen_range(0.0..BOARD_WIDTH),
                rng.gen_range(0.0..BOARD_HEIGHT),
            )
        })
        .collect();
    let color = PALETTE[rng.gen_range(0..PALETTE.len())];
    let width = rng.gen_range(2..=4) as f32;
    Operation::stroke(stroke_id(rng), Tool::Brush, color, width, points)
}

fn next_message(rng: &mut impl Rng, odds: ActionOdds) -> ClientMessage {
    match odds.pick(rng.gen()) {
        Action::Draw => ClientMessage::Stroke {
            operation: random_stroke(rng),
        },
        Action::Undo => ClientMessage::Undo,
        Action::Redo => ClientMessage::Redo,
    }
}

fn report(client: &str, data: &[u8]) {
    match decode_frame::<ServerMessage>(data) {
        Ok(ServerMessage::UpdateHistory { history }) => {
            info!(client, ops = history.len(), "received updated history");
        }
        Ok(ServerMessage::Init { history }) => {
            info!(client, ops = history.len(), "received initial history");
        }
        Ok(ServerMessage::Me { user }) => info!(client, name = %user.name, "assigned identity"),
        Ok(message) => debug!(client, kind = message.kind(), "frame"),
        Err(error) => warn!(client, %error, "undecodable server frame"),
    }
}

async fn run_client(
    index: usize,
    url: String,
    interval: Duration,
    odds: ActionOdds,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let client = format!("sim-{index}");
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("{client} failed to connect to {url}"))?;
    info!(client = %client, "connected");

    let (mut writer, mut reader) = socket.split();
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; start acting one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = writer.send(Message::Close(None)).await;
                info!(client = %client, "closed");
                return Ok(());
            }
            _ = ticker.tick() => {
                let message = next_message(&mut rng, odds);
                match &message {
                    ClientMessage::Stroke { operation } => {
                        info!(client = %client, points = operation.points().len(), "drew a stroke");
                    }
                    other => info!(client = %client, action = ?other, "requested"),
                }
                let text = serde_json::to_string(&message)?;
                writer.send(Message::text(text)).await?;
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Binary(data))) => report(&client, &data),
                Some(Ok(Message::Close(_))) | None => {
                    info!(client = %client, "disconnected");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error).context(format!("{client} socket error")),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let odds = ActionOdds::new(args.draw, args.undo)?;
    let interval = Duration::from_millis(args.interval_ms.max(1));

    info!(clients = args.clients, url = %args.url, "launching simulated clients");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut clients = JoinSet::new();
    for index in 1..=args.clients {
        clients.spawn(run_client(
            index,
            args.url.clone(),
            interval,
            odds,
            shutdown_rx.clone(),
        ));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut closing = false;
    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !closing => {
                info!("closing all client connections");
                closing = true;
                let _ = shutdown_tx.send(true);
            }
            joined = clients.join_next() => match joined {
                None => break,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(error))) => warn!("{error:#}"),
                Some(Err(error)) => warn!(%error, "client task failed"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolls_split_into_draw_undo_and_redo() {
        let odds = ActionOdds::new(0.8, 0.1).unwrap();
        assert_eq!(odds.pick(0.0), Action::Draw);
        assert_eq!(odds.pick(0.79), Action::Draw);
        assert_eq!(odds.pick(0.8), Action::Undo);
        assert_eq!(odds.pick(0.89), Action::Undo);
        assert_eq!(odds.pick(0.95), Action::Redo);
    }

    #[test]
    fn odds_beyond_one_are_rejected() {
        assert!(ActionOdds::new(0.9, 0.2).is_err());
        assert!(ActionOdds::new(-0.1, 0.2).is_err());
        assert!(ActionOdds::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn random_strokes_stay_on_the_board() {
        let mut rng = StdRng::seed_from_u64(7);
        let operation = random_stroke(&mut rng);
        let points = operation.points();
        assert_eq!(points.len(), STROKE_POINTS);
        assert!(points
            .iter()
            .all(|point| (0.0..BOARD_WIDTH).contains(&point.x)
                && (0.0..BOARD_HEIGHT).contains(&point.y)));
        match &operation.kind {
            inkwire_shared::OperationKind::Stroke { color, width, .. } => {
                assert!(PALETTE.contains(&color.as_str()));
                assert!((2.0..=4.0).contains(width));
            }
            other => panic!("expected a stroke, got {other:?}"),
        }
    }

    #[test]
    fn strokes_go_out_as_json_the_server_accepts() {
        let mut rng = StdRng::seed_from_u64(1);
        let odds = ActionOdds::new(1.0, 0.0).unwrap();
        let text = serde_json::to_string(&next_message(&mut rng, odds)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "stroke");
        assert_eq!(value["operation"]["kind"], "stroke");
        assert_eq!(value["operation"]["tool"], "brush");
    }
}
