//! Action schema: the only values a strategy program may return.
//!
//! Every backend funnels whatever the untrusted program produced through
//! [`validate`] before it can touch simulation state. The schema is
//! deliberately closed: an action is exactly two fields, `kind` from a
//! three-element enumeration and `direction` from a four-element
//! enumeration. Anything else - missing field, out-of-enum value, extra
//! field, non-object - is invalid and degrades to [`Action::fallback`]
//! at the executor layer.
//!
//! # Example
//!
//! ```
//! use codeduel_core::action::{validate, Action, ActionKind, Direction};
//!
//! let value = serde_json::json!({"kind": "move", "direction": "right"});
//! assert_eq!(
//!     validate(value),
//!     Some(Action { kind: ActionKind::Move, direction: Direction::Right })
//! );
//!
//! // Out-of-enum values are rejected, not coerced.
//! assert_eq!(validate(serde_json::json!({"kind": "fly", "direction": "up"})), None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Direction
// =============================================================================

/// One of the four cardinal directions.
///
/// Serialized lowercase (`"up"`, `"down"`, `"left"`, `"right"`) to match
/// the wire shape strategy programs produce and consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward `y = 0`.
    Up,
    /// Toward `y = height - 1`.
    Down,
    /// Toward `x = 0`.
    Left,
    /// Toward `x = width - 1`.
    Right,
}

impl Direction {
    /// Returns the single-cell `(dx, dy)` offset for this direction.
    ///
    /// The grid origin is the top-left corner, so `Up` decreases `y`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// What a strategy wants to do with its bot this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Step one cell in `direction`.
    Move,
    /// Strike the adjacent cell in `direction`.
    Attack,
    /// Do nothing. The direction is ignored but must still be schema-valid.
    None,
}

/// A validated strategy decision for one tick.
///
/// This is the only channel from untrusted code back into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    /// What to do.
    pub kind: ActionKind,
    /// Where to do it.
    pub direction: Direction,
}

impl Action {
    /// The action substituted for every strategy failure mode.
    ///
    /// Parse errors, runtime errors, timeouts, invalid return shapes and
    /// unsupported languages all resolve to this no-op.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            kind: ActionKind::None,
            direction: Direction::Up,
        }
    }
}

/// Validates an untrusted return value against the action schema.
///
/// Returns `None` for anything that is not a structured value with exactly
/// the two expected fields and in-enumeration values. Never panics, never
/// has side effects.
#[must_use]
pub fn validate(candidate: serde_json::Value) -> Option<Action> {
    serde_json::from_value(candidate).ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod direction_tests {
        use super::*;

        #[test]
        fn offsets_are_single_cell() {
            assert_eq!(Direction::Up.offset(), (0, -1));
            assert_eq!(Direction::Down.offset(), (0, 1));
            assert_eq!(Direction::Left.offset(), (-1, 0));
            assert_eq!(Direction::Right.offset(), (1, 0));
        }

        #[test]
        fn serializes_lowercase() {
            assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
            assert_eq!(
                serde_json::to_string(&Direction::Right).unwrap(),
                "\"right\""
            );
        }

        #[test]
        fn display_matches_wire_form() {
            assert_eq!(Direction::Left.to_string(), "left");
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn accepts_all_valid_combinations() {
            for kind in ["move", "attack", "none"] {
                for direction in ["up", "down", "left", "right"] {
                    let value = json!({"kind": kind, "direction": direction});
                    assert!(validate(value).is_some(), "{kind}/{direction}");
                }
            }
        }

        #[test]
        fn none_still_requires_valid_direction() {
            assert_eq!(validate(json!({"kind": "none", "direction": "sideways"})), None);
            assert_eq!(validate(json!({"kind": "none"})), None);
        }

        #[test]
        fn rejects_missing_fields() {
            assert_eq!(validate(json!({"kind": "move"})), None);
            assert_eq!(validate(json!({"direction": "up"})), None);
            assert_eq!(validate(json!({})), None);
        }

        #[test]
        fn rejects_out_of_enum_values() {
            assert_eq!(validate(json!({"kind": "teleport", "direction": "up"})), None);
            assert_eq!(validate(json!({"kind": "move", "direction": "north"})), None);
        }

        #[test]
        fn rejects_extra_fields() {
            let value = json!({"kind": "move", "direction": "up", "speed": 9});
            assert_eq!(validate(value), None);
        }

        #[test]
        fn rejects_non_objects() {
            assert_eq!(validate(json!("move up")), None);
            assert_eq!(validate(json!(42)), None);
            assert_eq!(validate(json!(null)), None);
            assert_eq!(validate(json!(["move", "up"])), None);
        }

        #[test]
        fn rejects_wrongly_typed_fields() {
            assert_eq!(validate(json!({"kind": 1, "direction": "up"})), None);
            assert_eq!(
                validate(json!({"kind": "move", "direction": {"x": 1}})),
                None
            );
        }
    }

    mod fallback_tests {
        use super::*;

        #[test]
        fn fallback_is_a_noop_facing_up() {
            let fallback = Action::fallback();
            assert_eq!(fallback.kind, ActionKind::None);
            assert_eq!(fallback.direction, Direction::Up);
        }

        #[test]
        fn fallback_round_trips_through_schema() {
            let value = serde_json::to_value(Action::fallback()).unwrap();
            assert_eq!(validate(value), Some(Action::fallback()));
        }
    }
}
