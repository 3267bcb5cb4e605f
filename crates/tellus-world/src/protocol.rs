//! Line protocol spoken with clients.
//!
//! Clients send one command per line: a trigger word followed by an optional
//! free-form argument. The server pushes one notification per line; free text
//! always comes last so it may contain spaces.

use std::borrow::Cow;
use std::fmt;

use crate::aspect::Aspect;
use crate::ids::PlayerId;

/// Split a client line into `(trigger, argument)`.
///
/// Returns `None` for blank lines.
pub fn parse_command(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((trigger, arg)) => Some((trigger, arg.trim())),
        None => Some((line, "")),
    }
}

/// Whether `word` fits in one space-separated field of a notification.
pub fn is_token(word: &str) -> bool {
    !word.is_empty() && !word.contains(char::is_whitespace)
}

/// One notification pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(String),
    Player {
        id: PlayerId,
        x: u32,
        y: u32,
        aspect: Aspect,
        name: String,
    },
    PlayerExit(PlayerId),
    Floor {
        width: u32,
        height: u32,
        aspects: Vec<Aspect>,
    },
    Tile {
        x: u32,
        y: u32,
        aspect: Aspect,
    },
    Gauge {
        name: String,
        val: u32,
        max: u32,
        full: Aspect,
        empty: Aspect,
    },
    NoGauge(String),
    Inventory {
        item: String,
        aspect: Aspect,
    },
    NoInventory(String),
    Pickup {
        item: String,
        aspect: Aspect,
    },
    NoPickup(String),
    Follow(PlayerId),
    Hint {
        aspect: Aspect,
        text: String,
    },
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Message(text) => write!(f, "message {}", one_line(text)),
            Outbound::Player {
                id,
                x,
                y,
                aspect,
                name,
            } => write!(f, "player {id} {x} {y} {} {}", token(aspect.as_str()), one_line(name)),
            Outbound::PlayerExit(id) => write!(f, "player_exit {id}"),
            Outbound::Floor {
                width,
                height,
                aspects,
            } => {
                write!(f, "floor {width} {height}")?;
                for aspect in aspects {
                    write!(f, " {}", token(aspect.as_str()))?;
                }
                Ok(())
            }
            Outbound::Tile { x, y, aspect } => write!(f, "tile {x} {y} {}", token(aspect.as_str())),
            Outbound::Gauge {
                name,
                val,
                max,
                full,
                empty,
            } => write!(
                f,
                "gauge {} {val} {max} {} {}",
                token(name),
                token(full.as_str()),
                token(empty.as_str())
            ),
            Outbound::NoGauge(name) => write!(f, "nogauge {}", token(name)),
            Outbound::Inventory { item, aspect } => {
                write!(f, "inventory {} {}", token(item), token(aspect.as_str()))
            }
            Outbound::NoInventory(item) => write!(f, "noinventory {}", token(item)),
            Outbound::Pickup { item, aspect } => {
                write!(f, "pickup {} {}", token(item), token(aspect.as_str()))
            }
            Outbound::NoPickup(item) => write!(f, "nopickup {}", token(item)),
            Outbound::Follow(id) => write!(f, "follow {id}"),
            Outbound::Hint { aspect, text } => {
                write!(f, "hint {} {}", token(aspect.as_str()), one_line(text))
            }
        }
    }
}

/// Fields before the free text must not contain spaces or line breaks.
fn token(word: &str) -> Cow<'_, str> {
    if word.contains(char::is_whitespace) {
        word.replace(char::is_whitespace, "_").into()
    } else {
        word.into()
    }
}

fn one_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        text.replace(['\n', '\r'], " ").into()
    } else {
        text.into()
    }
}
