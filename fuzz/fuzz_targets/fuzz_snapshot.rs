#![no_main]

use libfuzzer_sys::fuzz_target;
use salvo_client::board::CellState;
use salvo_client::snapshot::RawSnapshot;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    // Decoding arbitrary JSON must fail cleanly, never panic, and never
    // reveal an enemy ship.
    if let Ok(snapshot) = RawSnapshot::from_json(body).and_then(|raw| raw.decode()) {
        assert_eq!(snapshot.enemy.count(CellState::Ship), 0);
    }
});
