//! Exhibition runner: pits strategy files against each other in one duel.
//!
//! ```text
//! codeduel-exhibition hunter.lua camper.py [third.js [fourth.lua]]
//! ```
//!
//! The language is taken from each file's extension (`.lua`, `.py`,
//! `.js`). The duel is formed through the real matchmaking and registry
//! path, ticks at the production rate, and the board is printed after
//! every tick until a winner emerges.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use codeduel_core::scheduler::{DuelOver, EventSink};
use codeduel_core::state::{Grid, PlayerSeat, SessionId, StateSnapshot};
use codeduel_server::{DuelRegistry, Matchmaking};

enum Event {
    Update(StateSnapshot),
    Over(DuelOver),
}

struct ChannelSink {
    events: mpsc::UnboundedSender<Event>,
}

impl EventSink for ChannelSink {
    fn on_state_update(&self, snapshot: StateSnapshot) {
        let _ = self.events.send(Event::Update(snapshot));
    }

    fn on_duel_over(&self, outcome: DuelOver) {
        let _ = self.events.send(Event::Over(outcome));
    }
}

fn language_tag(path: &Path) -> Result<&'static str> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("lua") => Ok("lua"),
        Some("py") => Ok("python"),
        Some("js") => Ok("javascript"),
        other => bail!("cannot infer language of {} (extension {other:?})", path.display()),
    }
}

fn seat_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let paths: Vec<std::path::PathBuf> = std::env::args_os().skip(1).map(Into::into).collect();
    if paths.len() < 2 || paths.len() > 4 {
        bail!("usage: codeduel-exhibition <strategy-file> <strategy-file> [two more]");
    }

    let registry = DuelRegistry::new();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let matchmaker = Matchmaking::new(
        Arc::clone(&registry),
        Arc::new(ChannelSink { events: events_tx }),
        Grid::new(10, 10),
    );

    // Queue every contestant; the last one fills the queue and forms the duel.
    let mut duel = None;
    for (index, path) in paths.iter().enumerate() {
        let session = SessionId::new(format!("exhibition-{index}"));
        let seat = PlayerSeat::new(session, seat_name(path));
        duel = matchmaker.enqueue(seat, paths.len())?;
    }
    let duel = duel.context("queue should have filled")?;
    tracing::info!(%duel, contestants = paths.len(), "exhibition duel formed");

    for (index, path) in paths.iter().enumerate() {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let session = SessionId::new(format!("exhibition-{index}"));
        if !registry.submit_code(&session, code, language_tag(path)?) {
            bail!("duel rejected the submission from {}", path.display());
        }
    }

    while let Some(event) = events.recv().await {
        match event {
            Event::Update(snapshot) => print_board(&snapshot),
            Event::Over(outcome) => {
                match outcome.winner {
                    Some(winner) => println!("duel {} over: player {winner} wins ({:?})", outcome.duel, outcome.reason),
                    None => println!("duel {} over: no winner ({:?})", outcome.duel, outcome.reason),
                }
                return Ok(());
            }
        }
    }
    bail!("duel ended without a terminal event");
}

fn print_board(snapshot: &StateSnapshot) {
    let players: Vec<String> = snapshot
        .players
        .iter()
        .map(|p| {
            format!(
                "{}@({},{}) {}hp",
                p.name, p.bot.position.x, p.bot.position.y, p.bot.health
            )
        })
        .collect();
    println!("tick {:>4}  {}", snapshot.tick, players.join("  "));
}
