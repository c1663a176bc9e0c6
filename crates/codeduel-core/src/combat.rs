//! Combat resolution: pure application of a tick's validated actions.
//!
//! Resolution is sequential and deterministic. [`resolve_tick`] walks the
//! batch in roster order; for each player it applies movement before attack
//! detection. That fixed order is what makes a tick's outcome reproducible
//! from its inputs - there is no randomness and no parallelism here.
//!
//! Movement is bounds-checked against the grid only; bots may share a cell
//! (there is no collision rule). Attacks strike the single adjacent cell in
//! the chosen direction for a fixed 10 damage, floored at zero health.

use crate::action::{Action, ActionKind, Direction};
use crate::state::{Bot, DuelState, Grid, PlayerId};

/// Damage dealt by one landed attack.
pub const ATTACK_DAMAGE: u32 = 10;

/// Attempts to move `bot` one cell in `direction`.
///
/// Commits the new position and facing and returns true when the
/// destination is inside the grid; otherwise leaves the bot untouched
/// (including its facing) and returns false.
pub fn apply_move(bot: &mut Bot, direction: Direction, grid: &Grid) -> bool {
    let destination = bot.position.stepped(direction);
    if !grid.contains(destination) {
        return false;
    }
    bot.position = destination;
    bot.facing = direction;
    true
}

/// Resolves an attack from `attacker` into the adjacent cell in `direction`.
///
/// The first living opponent (roster order) standing on the target cell
/// takes [`ATTACK_DAMAGE`]; at most one victim is hit. Returns the victim's
/// id, if any. The attacker never damages itself, never moves, and never
/// changes facing. An attacker id outside the roster resolves to a miss.
pub fn apply_attack(
    state: &mut DuelState,
    attacker: PlayerId,
    direction: Direction,
) -> Option<PlayerId> {
    let target = state.player(attacker).ok()?.bot.position.stepped(direction);

    let victim = state
        .players()
        .find(|p| p.id != attacker && p.bot.is_alive() && p.bot.position == target)
        .map(|p| p.id)?;

    // The victim was just found in the roster.
    if let Ok(player) = state.player_mut(victim) {
        player.bot.take_damage(ATTACK_DAMAGE);
    }
    Some(victim)
}

/// Applies one tick's worth of actions.
///
/// `actions` must already be sorted by roster order; the scheduler sorts
/// after the concurrent gather. Dead players' actions are skipped (a bot
/// can die earlier in the same tick it acted in), and `none` mutates
/// nothing.
pub fn resolve_tick(state: &mut DuelState, actions: &[(PlayerId, Action)]) {
    for &(player, action) in actions {
        let Ok(entry) = state.player_mut(player) else {
            continue;
        };
        if !entry.bot.is_alive() {
            continue;
        }
        match action.kind {
            ActionKind::Move => {
                let grid = state.grid().clone();
                if let Ok(entry) = state.player_mut(player) {
                    apply_move(&mut entry.bot, action.direction, &grid);
                }
            }
            ActionKind::Attack => {
                apply_attack(state, player, action.direction);
            }
            ActionKind::None => {}
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
