#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for `SessionController`.
//!
//! Uses the scripted `MockGameService` from `tests/common`. Timing tests run
//! on a paused clock, so the poll period and settle delays elapse instantly
//! and deterministically.

mod common;

use std::time::Duration;

use salvo_client::{
    BoardOwner, CellState, Coordinate, RawSnapshot, ReconcileOutcome, SalvoError, SessionConfig,
    SessionController, SessionEvent, SessionState, ShotOutcome, ShotResult, Winner,
};
use tokio_test::{assert_err, assert_ok};

use common::{
    drain, empty_grid, finished, game_overs, grid_with, in_progress, log_lines, quick_config,
    MockGameService,
};

/// Start a controller over `service` and apply its first snapshot.
async fn active_controller(
    service: &MockGameService,
    config: SessionConfig,
) -> (
    SessionController,
    tokio::sync::mpsc::Receiver<SessionEvent>,
) {
    let (controller, events) = SessionController::new(service.clone(), config);
    let outcome = controller.initialize().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);
    (controller, events)
}

fn text_dump(own_ship: (usize, usize), enemy_hit: (usize, usize)) -> String {
    let mut out = String::from("Board size 10x10\n");
    for (header, mark, symbol) in [
        ("Your ships:", own_ship, 'S'),
        ("Enemy ships:", enemy_hit, 'X'),
    ] {
        out.push_str(header);
        out.push('\n');
        for y in 0..10 {
            let row: String = (0..10)
                .map(|x| if (x, y) == mark { symbol } else { '.' })
                .collect();
            out.push_str(&row);
            out.push('\n');
        }
    }
    out
}

// ════════════════════════════════════════════════════════════════════
// Initialization
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn initialize_projects_first_snapshot_and_starts() {
    let service = MockGameService::serving(in_progress(grid_with(&[(2, 2, 1)]), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;

    assert_eq!(controller.state().await, SessionState::Active);
    assert!(controller.is_polling().await);

    let (own, enemy) = controller.boards().await;
    assert_eq!(own.owner(), BoardOwner::Own);
    assert_eq!(own.get(Coordinate::new(2, 2)).unwrap(), CellState::Ship);
    assert_eq!(own.count(CellState::Ship), 1);
    assert_eq!(enemy.count(CellState::Empty), 100);

    let id = controller.session_id().await;
    let events = drain(&mut events);
    assert!(
        matches!(events[0], SessionEvent::Started { session_id } if session_id == id),
        "first event should be Started, got {:?}",
        events[0]
    );
    assert!(matches!(events[1], SessionEvent::BoardsUpdated { .. }));
}

#[tokio::test]
async fn failed_initialize_stays_idle() {
    let service = MockGameService::default();
    let (controller, mut events) = SessionController::new(service.clone(), quick_config());

    let err = assert_err!(controller.initialize().await);
    assert!(err.is_transport());
    assert_eq!(controller.state().await, SessionState::Idle);
    assert!(!controller.is_polling().await);

    let lines = log_lines(&drain(&mut events));
    assert_eq!(lines, vec!["Error: transport error: connection refused".to_string()]);
}

#[tokio::test]
async fn malformed_first_snapshot_stays_idle() {
    let mut bad = empty_grid();
    bad[0][0] = 9u8.into();
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    service.push_fetch(Ok(RawSnapshot::Structured(in_progress(empty_grid(), bad))));
    service.push_fetch(Ok(RawSnapshot::Text(
        "Your ships:\nS.\nEnemy ships:\n..\n".into(),
    )));
    let (controller, mut events) = SessionController::new(service.clone(), quick_config());

    for _ in 0..2 {
        let err = assert_err!(controller.initialize().await);
        assert!(matches!(err, SalvoError::MalformedSnapshot(_)), "{err:?}");
        assert_eq!(controller.state().await, SessionState::Idle);
        assert!(!controller.is_polling().await);
    }
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Started { .. })));

    // A good snapshot afterwards still starts the session.
    assert_ok!(controller.initialize().await);
    assert_eq!(controller.state().await, SessionState::Active);
}

#[tokio::test]
async fn new_controller_is_idle_and_quiet() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, mut events) = SessionController::new(service.clone(), quick_config());

    assert_eq!(controller.state().await, SessionState::Idle);
    assert_eq!(controller.winner().await, None);
    assert_eq!(service.fetch_count(), 0);
    assert!(drain(&mut events).is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Periodic refresh
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn polls_once_per_interval_while_active() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (_controller, _events) = active_controller(&service, quick_config()).await;
    assert_eq!(service.fetch_count(), 1);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(service.fetch_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn poll_picks_up_server_changes() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    service.set_state(in_progress(grid_with(&[(0, 0, 2)]), grid_with(&[(9, 9, 3)])));
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (own, enemy) = controller.boards().await;
    assert_eq!(own.get(Coordinate::new(0, 0)).unwrap(), CellState::Hit);
    assert_eq!(enemy.get(Coordinate::new(9, 9)).unwrap(), CellState::Miss);
}

#[tokio::test(start_paused = true)]
async fn failed_tick_keeps_polling() {
    let service = MockGameService::serving(in_progress(grid_with(&[(1, 1, 1)]), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;
    drain(&mut events);

    service.push_fetch(Err(SalvoError::Timeout));
    service.push_fetch(Err(SalvoError::HttpStatus {
        status: 502,
        reason: "Bad Gateway".into(),
    }));
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(service.fetch_count(), 4);
    assert!(controller.is_polling().await);
    assert_eq!(controller.state().await, SessionState::Active);
    let (own, _) = controller.boards().await;
    assert_eq!(own.get(Coordinate::new(1, 1)).unwrap(), CellState::Ship);

    let lines = log_lines(&drain(&mut events));
    assert_eq!(lines.len(), 2, "one log line per failed tick: {lines:?}");
    assert!(lines.iter().all(|l| l.starts_with("Error: ")));
}

#[tokio::test(start_paused = true)]
async fn stop_halts_polling_and_board_mutation() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;
    let before = controller.boards().await;

    assert_ok!(controller.stop().await);
    assert_eq!(controller.state().await, SessionState::Idle);
    assert!(!controller.is_polling().await);

    service.set_state(in_progress(grid_with(&[(3, 3, 1)]), grid_with(&[(4, 4, 2)])));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(service.fetch_count(), 1);

    // A refresh that completes after stop is ignored.
    let outcome = controller.refresh().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored(SessionState::Idle));
    assert_eq!(controller.boards().await, before);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Stopped { .. })));
    let updates = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::BoardsUpdated { .. }))
        .count();
    assert_eq!(updates, 1, "only the initial snapshot was applied");
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_polling() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    controller.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(service.fetch_count(), 1);

    controller.start().await.unwrap();
    assert!(controller.is_polling().await);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(service.fetch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_start_does_not_double_the_poll_rate() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;
    drain(&mut events);

    controller.start().await.unwrap();
    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(service.fetch_count(), 3);
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Started { .. })));
}

// ════════════════════════════════════════════════════════════════════
// Game over
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn game_over_records_winner_and_cancels_polling() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;

    service.set_state(finished(Some(Winner::Player)));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(
        controller.state().await,
        SessionState::Over {
            winner: Some(Winner::Player)
        }
    );
    assert_eq!(controller.winner().await, Some(Winner::Player));
    assert!(!controller.is_polling().await);

    let fetches = service.fetch_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(service.fetch_count(), fetches, "no ticks after game over");

    let events = drain(&mut events);
    assert_eq!(game_overs(&events), 1);
    assert!(log_lines(&events).contains(&"Game Over - You Won!".to_string()));
}

#[tokio::test]
async fn simultaneous_game_over_snapshots_finish_once() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;

    let over = RawSnapshot::Structured(finished(Some(Winner::Enemy)));
    let (a, b) = tokio::join!(
        controller.reconcile(over.clone()),
        controller.reconcile(over)
    );
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, ReconcileOutcome::GameOver(_)));

    assert_eq!(
        outcomes,
        vec![
            ReconcileOutcome::Ignored(SessionState::Over {
                winner: Some(Winner::Enemy)
            }),
            ReconcileOutcome::GameOver(Some(Winner::Enemy)),
        ]
    );
    assert_eq!(controller.winner().await, Some(Winner::Enemy));

    let events = drain(&mut events);
    assert_eq!(game_overs(&events), 1);
    assert!(log_lines(&events).contains(&"Game Over - You Lost!".to_string()));
}

#[tokio::test]
async fn over_is_terminal() {
    let service = MockGameService::serving(finished(None));
    let (controller, _events) = SessionController::new(service.clone(), quick_config());
    let outcome = controller.initialize().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::GameOver(None));

    assert!(matches!(
        controller.start().await,
        Err(SalvoError::SessionOver)
    ));
    assert!(matches!(
        controller.stop().await,
        Err(SalvoError::SessionOver)
    ));

    let later = RawSnapshot::Structured(in_progress(grid_with(&[(5, 5, 1)]), empty_grid()));
    let outcome = controller.reconcile(later).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Ignored(SessionState::Over { winner: None })
    );
    let (own, _) = controller.boards().await;
    assert_eq!(own.count(CellState::Ship), 0);
}

#[tokio::test(start_paused = true)]
async fn game_over_announcement_waits_for_settle_delay() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let config = quick_config().with_game_over_delay(Duration::from_secs(1));
    let (controller, mut events) = active_controller(&service, config).await;
    drain(&mut events);

    let task = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .reconcile(RawSnapshot::Structured(finished(Some(Winner::Player))))
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(controller.state().await.is_over());
    let early = drain(&mut events);
    assert_eq!(game_overs(&early), 0);
    assert!(early
        .iter()
        .any(|e| matches!(e, SessionEvent::BoardsUpdated { .. })));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        task.await.unwrap().unwrap(),
        ReconcileOutcome::GameOver(Some(Winner::Player))
    );
    assert_eq!(game_overs(&drain(&mut events)), 1);
}

// ════════════════════════════════════════════════════════════════════
// Snapshot encodings and failures
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn text_snapshot_reconciles_like_structured() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    controller
        .reconcile(RawSnapshot::Text(text_dump((4, 1), (7, 8))))
        .await
        .unwrap();
    let from_text = controller.boards().await;

    controller
        .reconcile(RawSnapshot::Structured(in_progress(
            grid_with(&[(4, 1, 1)]),
            grid_with(&[(7, 8, 2)]),
        )))
        .await
        .unwrap();
    assert_eq!(controller.boards().await, from_text);
}

#[tokio::test]
async fn malformed_snapshot_keeps_previous_boards() {
    let service = MockGameService::serving(in_progress(grid_with(&[(6, 6, 1)]), empty_grid()));
    let (controller, mut events) = active_controller(&service, quick_config()).await;
    let before = controller.boards().await;
    drain(&mut events);

    let err = controller
        .reconcile(RawSnapshot::Text("Your ships:\nS?\n".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, SalvoError::MalformedSnapshot(_)));

    let mut bad = empty_grid();
    bad[3][3] = 9u8.into();
    let err = controller
        .reconcile(RawSnapshot::Structured(in_progress(empty_grid(), bad)))
        .await
        .unwrap_err();
    assert!(matches!(err, SalvoError::MalformedSnapshot(_)));

    assert_eq!(controller.boards().await, before);
    assert_eq!(controller.state().await, SessionState::Active);
    assert_eq!(log_lines(&drain(&mut events)).len(), 2);
}

#[tokio::test]
async fn enemy_ships_are_never_revealed() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    let all_ships = vec![vec![1u8.into(); 10]; 10];
    controller
        .reconcile(RawSnapshot::Structured(in_progress(empty_grid(), all_ships)))
        .await
        .unwrap();
    let (_, enemy) = controller.boards().await;
    assert_eq!(enemy.count(CellState::Ship), 0);
}

// ════════════════════════════════════════════════════════════════════
// Locally derived effects
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn destroyed_surroundings_survive_later_snapshots() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    controller
        .apply_shot(ShotResult::new((5, 5), ShotOutcome::Destroyed))
        .await
        .unwrap();

    // The service only knows about the kill and a later hit next to it.
    service.set_state(in_progress(
        empty_grid(),
        grid_with(&[(5, 5, 4), (4, 4, 2)]),
    ));
    controller.refresh().await.unwrap();

    let (_, enemy) = controller.boards().await;
    assert_eq!(
        enemy.get(Coordinate::new(5, 5)).unwrap(),
        CellState::Destroyed
    );
    assert_eq!(enemy.get(Coordinate::new(4, 4)).unwrap(), CellState::Hit);
    assert_eq!(enemy.count(CellState::Surrounding), 7);
}

#[tokio::test]
async fn restart_discards_previous_effects() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = active_controller(&service, quick_config()).await;

    controller
        .apply_shot(ShotResult::new((0, 0), ShotOutcome::Destroyed))
        .await
        .unwrap();
    controller.stop().await.unwrap();
    controller.start().await.unwrap();
    controller.refresh().await.unwrap();

    let (_, enemy) = controller.boards().await;
    assert_eq!(enemy.count(CellState::Surrounding), 0);
}

#[tokio::test]
async fn shots_require_an_active_session() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (controller, _events) = SessionController::new(service, quick_config());

    let err = controller
        .apply_shot(ShotResult::new((1, 1), ShotOutcome::Hit))
        .await
        .unwrap_err();
    assert!(matches!(err, SalvoError::NotActive));
}
