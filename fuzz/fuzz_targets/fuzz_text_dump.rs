#![no_main]

use libfuzzer_sys::fuzz_target;
use salvo_client::board::CellState;
use salvo_client::snapshot::parse_text_dump;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(snapshot) = parse_text_dump(text) {
            assert_eq!(snapshot.enemy.count(CellState::Ship), 0);
            // Rendering a parsed board and parsing it again is stable.
            let rendered = format!("Your ships:\n{}Enemy ships:\n{}", snapshot.own, snapshot.enemy);
            let reparsed = parse_text_dump(&rendered);
            assert!(reparsed.is_ok_and(|again| again.own == snapshot.own && again.enemy == snapshot.enemy));
        }
    }
});
