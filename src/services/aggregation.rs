//! Completion predicates and the two result-assembly algorithms.
//!
//! Everything here is pure: callers load the players inside the game's transaction
//! and pass them in, so a decision is always made on the same snapshot the write is
//! committed against.

use rand::{Rng, rng};
use uuid::Uuid;

use crate::{
    config::Hint,
    state::game::{GameType, NameEntry, PlayerWithEntry},
};

/// How far the players of a game have got with the current phase's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Players done with the contribution currently asked of them.
    pub submitted: usize,
    /// STORY only: rounds completed by every player.
    pub round: Option<usize>,
}

/// Every player of a NAME game holds exactly one name entry.
pub fn names_complete(players: &[PlayerWithEntry]) -> bool {
    !players.is_empty() && players.iter().all(|p| p.name_entry().is_some())
}

/// Every player of a STORY game has written `rounds` values.
pub fn stories_complete(players: &[PlayerWithEntry], rounds: usize) -> bool {
    !players.is_empty() && players.iter().all(|p| p.rounds_submitted() >= rounds)
}

/// Rounds completed by the slowest player; zero for an empty game.
pub fn current_round(players: &[PlayerWithEntry]) -> usize {
    players
        .iter()
        .map(PlayerWithEntry::rounds_submitted)
        .min()
        .unwrap_or(0)
}

/// Progress counters exposed in game summaries.
pub fn progress(game_type: GameType, players: &[PlayerWithEntry], rounds: usize) -> Progress {
    match game_type {
        GameType::Name => Progress {
            submitted: players.iter().filter(|p| p.name_entry().is_some()).count(),
            round: None,
        },
        GameType::Story => {
            let round = current_round(players);
            let submitted = if round >= rounds {
                players.len()
            } else {
                players
                    .iter()
                    .filter(|p| p.rounds_submitted() > round)
                    .count()
            };
            Progress {
                submitted,
                round: Some(round),
            }
        }
    }
}

/// Draw the display-order key for a new name entry.
pub fn random_order() -> i32 {
    rng().random()
}

/// Draw the rotation offset for a game of `players` players.
pub fn random_offset(players: usize) -> usize {
    if players == 0 {
        return 0;
    }
    rng().random_range(0..players)
}

/// Round-robin assembly: the story of player `i` takes round `j` from player
/// `(i + j + offset) % n`, framed by that round's prefix and suffix. A missing value
/// leaves a hole instead of failing.
pub fn assemble_stories(
    players: &[PlayerWithEntry],
    hints: &[Hint],
    offset: usize,
) -> Vec<(Uuid, String)> {
    let n = players.len();
    if n == 0 {
        return Vec::new();
    }

    (0..n)
        .map(|i| {
            let mut story = String::new();
            for (j, hint) in hints.iter().enumerate() {
                let contributor = &players[(i + j + offset) % n];
                let value = contributor
                    .story_entry()
                    .and_then(|entry| entry.values.get(j))
                    .map(String::as_str)
                    .unwrap_or_default();
                story.push_str(&hint.prefix);
                story.push_str(value);
                story.push_str(&hint.suffix);
            }
            (players[i].player.id, story)
        })
        .collect()
}

/// Name entries in reveal order: `order` descending.
pub fn reveal_order(players: &[PlayerWithEntry]) -> Vec<&NameEntry> {
    let mut entries: Vec<&NameEntry> = players
        .iter()
        .filter_map(PlayerWithEntry::name_entry)
        .collect();
    entries.sort_by(|a, b| b.order.cmp(&a.order));
    entries
}
