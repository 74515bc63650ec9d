#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for `CommandDispatcher`.
//!
//! Scripts command replies on the shared `MockGameService` and checks the
//! lifecycle and board side effects of each submission.

mod common;

use std::time::Duration;

use salvo_client::{
    CellState, Command, CommandDispatcher, Coordinate, ReconcileOutcome, SalvoError,
    SessionConfig, SessionController, SessionEvent, SessionState, ShotOutcome, ShotResult,
};
use tokio_test::assert_ok;

use common::{
    drain, empty_grid, finished, grid_with, in_progress, log_lines, quick_config, MockGameService,
};

fn dispatcher_over(
    service: &MockGameService,
    config: SessionConfig,
) -> (
    CommandDispatcher,
    tokio::sync::mpsc::Receiver<SessionEvent>,
) {
    let (controller, events) = SessionController::new(service.clone(), config);
    (CommandDispatcher::new(controller), events)
}

async fn active_dispatcher(
    service: &MockGameService,
) -> (
    CommandDispatcher,
    tokio::sync::mpsc::Receiver<SessionEvent>,
) {
    let (dispatcher, mut events) = dispatcher_over(service, quick_config());
    dispatcher.controller().initialize().await.unwrap();
    drain(&mut events);
    (dispatcher, events)
}

// ════════════════════════════════════════════════════════════════════
// Lifecycle keywords
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn start_command_starts_the_session() {
    let service = MockGameService::serving(in_progress(grid_with(&[(2, 2, 1)]), empty_grid()));
    service.reply("Game started");
    let (dispatcher, mut events) = dispatcher_over(&service, quick_config());

    let outcome = dispatcher.submit("start").await.unwrap();
    assert_eq!(outcome.command, Command::Start);
    assert_eq!(outcome.response, "Game started");
    assert_eq!(outcome.shot, None);
    assert_eq!(outcome.refresh, Some(ReconcileOutcome::Applied));

    let controller = dispatcher.controller();
    assert_eq!(controller.state().await, SessionState::Active);
    assert!(controller.is_polling().await);
    assert_eq!(service.commands(), vec!["start".to_string()]);

    let (own, _) = controller.boards().await;
    assert_eq!(own.get(Coordinate::new(2, 2)).unwrap(), CellState::Ship);

    let lines = log_lines(&drain(&mut events));
    assert_eq!(lines, vec!["> start".to_string(), "Game started".to_string()]);
}

#[tokio::test]
async fn stop_command_stops_the_session() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;

    let outcome = dispatcher.submit("  stop ").await.unwrap();
    assert_eq!(outcome.command, Command::Stop);
    assert_eq!(
        outcome.refresh,
        Some(ReconcileOutcome::Ignored(SessionState::Idle))
    );
    assert_eq!(dispatcher.controller().state().await, SessionState::Idle);
    assert!(!dispatcher.controller().is_polling().await);
}

#[tokio::test]
async fn failed_dispatch_has_no_lifecycle_effect() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    service.push_reply(Err(SalvoError::HttpStatus {
        status: 503,
        reason: "Service Unavailable".into(),
    }));
    let (dispatcher, mut events) = dispatcher_over(&service, quick_config());

    let err = dispatcher.submit("start").await.unwrap_err();
    match err {
        SalvoError::Dispatch { command, source } => {
            assert_eq!(command, "start");
            assert!(matches!(*source, SalvoError::HttpStatus { status: 503, .. }));
        }
        other => panic!("expected Dispatch, got {other:?}"),
    }

    assert_eq!(dispatcher.controller().state().await, SessionState::Idle);
    assert!(!dispatcher.controller().is_polling().await);
    assert_eq!(service.fetch_count(), 0, "no refresh after a failed dispatch");

    let lines = log_lines(&drain(&mut events));
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("Error: command `start` failed"));
}

#[tokio::test]
async fn unexpected_reply_shape_is_a_dispatch_error() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    service.push_reply(Err(SalvoError::MalformedReply(
        r#"missing field `response`: {"error":"not your turn"}"#.into(),
    )));
    let (dispatcher, mut events) = active_dispatcher(&service).await;

    let err = dispatcher.submit("shot 2 2").await.unwrap_err();
    assert!(matches!(
        err,
        SalvoError::Dispatch { ref source, .. } if matches!(**source, SalvoError::MalformedReply(_))
    ));
    let lines = log_lines(&drain(&mut events));
    assert!(lines.iter().any(|l| l.contains("not your turn")), "{lines:?}");
    let (_, enemy) = dispatcher.controller().boards().await;
    assert_eq!(enemy.count(CellState::Empty), 100);
}

#[tokio::test]
async fn start_after_game_over_is_reported_not_returned() {
    let service = MockGameService::serving(finished(None));
    let (dispatcher, mut events) = dispatcher_over(&service, quick_config());
    dispatcher.controller().initialize().await.unwrap();
    drain(&mut events);

    let outcome = assert_ok!(dispatcher.submit("start").await);
    assert_eq!(
        outcome.refresh,
        Some(ReconcileOutcome::Ignored(SessionState::Over { winner: None }))
    );
    let lines = log_lines(&drain(&mut events));
    assert!(lines.contains(&"Error: session is over".to_string()));
}

// ════════════════════════════════════════════════════════════════════
// Shots
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn destroying_shot_marks_the_surroundings() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;

    service.reply("Ship destroyed! Fire again.");
    service.set_state(in_progress(empty_grid(), grid_with(&[(5, 5, 4)])));
    let outcome = dispatcher.shoot(Coordinate::new(5, 5)).await.unwrap();

    assert_eq!(
        outcome.shot,
        Some(ShotResult::new((5, 5), ShotOutcome::Destroyed))
    );
    assert_eq!(outcome.refresh, Some(ReconcileOutcome::Applied));
    assert_eq!(service.commands(), vec!["shot 5 5".to_string()]);

    let (_, enemy) = dispatcher.controller().boards().await;
    assert_eq!(
        enemy.get(Coordinate::new(5, 5)).unwrap(),
        CellState::Destroyed
    );
    for (x, y) in [(4, 4), (5, 4), (6, 4), (4, 5), (6, 5), (4, 6), (5, 6), (6, 6)] {
        assert_eq!(
            enemy.get(Coordinate::new(x, y)).unwrap(),
            CellState::Surrounding,
            "({x}, {y})"
        );
    }
}

#[tokio::test]
async fn corner_kill_marks_three_neighbors() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;

    service.reply("Destroyed!");
    dispatcher.submit("shot 0 0").await.unwrap();

    let (_, enemy) = dispatcher.controller().boards().await;
    assert_eq!(enemy.count(CellState::Surrounding), 3);
    assert_eq!(
        enemy.get(Coordinate::new(0, 0)).unwrap(),
        CellState::Destroyed
    );
}

#[tokio::test]
async fn hit_is_shown_before_the_service_reports_it() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, mut events) = active_dispatcher(&service).await;

    service.reply("Hit! Your turn again.");
    let outcome = dispatcher.submit("shot 3 7").await.unwrap();
    assert_eq!(outcome.shot, Some(ShotResult::new((3, 7), ShotOutcome::Hit)));

    let (_, enemy) = dispatcher.controller().boards().await;
    assert_eq!(enemy.get(Coordinate::new(3, 7)).unwrap(), CellState::Hit);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::ShotApplied(shot) if shot.outcome == ShotOutcome::Hit
    )));
}

#[tokio::test]
async fn unclassified_reply_leaves_the_board_alone() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;
    let before = dispatcher.controller().boards().await;

    service.reply("Not your turn");
    let outcome = dispatcher.submit("shot 1 1").await.unwrap();
    assert_eq!(outcome.shot, None);
    assert_eq!(dispatcher.controller().boards().await, before);
}

#[tokio::test]
async fn shot_while_idle_is_not_sent() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = dispatcher_over(&service, quick_config());

    let err = dispatcher.submit("shot 1 1").await.unwrap_err();
    assert!(matches!(err, SalvoError::NotActive));
    assert!(service.commands().is_empty());
}

#[tokio::test]
async fn non_canonical_shot_is_sent_as_typed() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;

    service.reply("Invalid coordinates");
    let outcome = dispatcher.submit("shot +3 04").await.unwrap();
    assert_eq!(outcome.command, Command::Other("shot +3 04".into()));
    assert_eq!(outcome.shot, None);
    assert_eq!(service.commands(), vec!["shot +3 04".to_string()]);
}

#[tokio::test]
async fn out_of_range_shot_is_not_sent() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;

    let err = dispatcher.submit("shot 10 3").await.unwrap_err();
    assert!(matches!(
        err,
        SalvoError::OutOfBounds {
            x: 10,
            y: 3,
            width: 10,
            height: 10
        }
    ));
    assert!(service.commands().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Free-form commands and the follow-up refresh
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn free_form_text_is_passed_through() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, _events) = active_dispatcher(&service).await;
    let fetches = service.fetch_count();

    service.reply("ok");
    let outcome = dispatcher.submit("place ship 1 1 horizontal").await.unwrap();
    assert_eq!(
        outcome.command,
        Command::Other("place ship 1 1 horizontal".into())
    );
    assert_eq!(
        service.commands(),
        vec!["place ship 1 1 horizontal".to_string()]
    );
    assert_eq!(service.fetch_count(), fetches + 1);
    assert_eq!(outcome.refresh, Some(ReconcileOutcome::Applied));
}

#[tokio::test(start_paused = true)]
async fn refresh_waits_for_post_command_delay() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let config = quick_config()
        .with_post_command_delay(Duration::from_millis(300))
        .with_poll_interval(Duration::from_secs(60));
    let (dispatcher, _events) = dispatcher_over(&service, config);

    let started = tokio::time::Instant::now();
    dispatcher.submit("hello").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(service.fetch_count(), 1);
}

#[tokio::test]
async fn failed_refresh_still_returns_the_reply() {
    let service = MockGameService::serving(in_progress(empty_grid(), empty_grid()));
    let (dispatcher, mut events) = active_dispatcher(&service).await;

    service.reply("Miss.");
    service.push_fetch(Err(SalvoError::Timeout));
    let outcome = dispatcher.submit("shot 9 9").await.unwrap();

    assert_eq!(outcome.shot, Some(ShotResult::new((9, 9), ShotOutcome::Miss)));
    assert_eq!(outcome.refresh, None);
    let lines = log_lines(&drain(&mut events));
    assert!(lines.contains(&"Error: operation timed out".to_string()));
}
