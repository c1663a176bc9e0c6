//! Duels and sandboxes must not observe one another.

use std::time::Duration;

use crate::executor::Language;
use crate::scheduler::DuelOverReason;
use crate::state::{PlayerId, Position};

use super::helpers::{test_scheduler, two_player_duel, HUNTER, PACIFIST};

/// Plants a global at load time, then idles.
const PLANTER: &str = r#"
    planted = true
    function bot_strategy(context)
        return { kind = "none", direction = "up" }
    end
"#;

/// Moves only if it can see the planted global.
const PROBER: &str = r#"
    function bot_strategy(context)
        if planted ~= nil then
            return { kind = "move", direction = "right" }
        end
        return { kind = "none", direction = "up" }
    end
"#;

#[tokio::test]
async fn globals_planted_in_one_duel_are_invisible_to_another() {
    let mut first = two_player_duel(10);
    first.begin();
    first
        .submit_code(PlayerId::new(0), PLANTER.into(), Language::Lua)
        .unwrap();
    let (mut first_scheduler, _h1, _s1) = test_scheduler(first);

    let mut second = two_player_duel(11);
    second.begin();
    second
        .submit_code(PlayerId::new(0), PROBER.into(), Language::Lua)
        .unwrap();
    let (mut second_scheduler, _h2, sink) = test_scheduler(second);

    // Interleave the two duels tick by tick.
    for _ in 0..3 {
        first_scheduler.step().await;
        second_scheduler.step().await;
    }

    let last = sink.updates().last().cloned().unwrap();
    assert_eq!(
        last.players[0].bot.position,
        Position::new(1, 5),
        "the prober must never see the planter's global"
    );
}

#[tokio::test]
async fn concurrent_duels_conclude_independently() {
    let (first_scheduler, first_handle, first_sink) = test_scheduler(two_player_duel(12));
    let (second_scheduler, second_handle, second_sink) = test_scheduler(two_player_duel(13));

    let first_task = tokio::spawn(first_scheduler.run());
    let second_task = tokio::spawn(second_scheduler.run());

    // First duel: a real fight. Second duel: an early disconnect.
    first_handle.submit_code(PlayerId::new(0), HUNTER.into(), Language::Lua);
    first_handle.submit_code(PlayerId::new(1), PACIFIST.into(), Language::Lua);
    tokio::time::sleep(Duration::from_millis(30)).await;
    second_handle.disconnect(PlayerId::new(0));

    tokio::time::timeout(Duration::from_secs(10), async {
        first_task.await.unwrap();
        second_task.await.unwrap();
    })
    .await
    .expect("both duels should conclude");

    let first_outcomes = first_sink.outcomes();
    assert_eq!(first_outcomes.len(), 1);
    assert_eq!(first_outcomes[0].reason, DuelOverReason::Elimination);
    assert_eq!(first_outcomes[0].winner, Some(PlayerId::new(0)));

    let second_outcomes = second_sink.outcomes();
    assert_eq!(second_outcomes.len(), 1);
    assert_eq!(second_outcomes[0].reason, DuelOverReason::OpponentDisconnected);
    assert_eq!(second_outcomes[0].winner, Some(PlayerId::new(1)));

    // Every event stayed on its own duel's sink.
    assert!(first_sink.updates().iter().all(|u| u.id.as_u64() == 12));
    assert!(second_sink.updates().iter().all(|u| u.id.as_u64() == 13));
}
