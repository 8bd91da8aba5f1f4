#![no_main]

use hll_accuracy_report::table::{parse_runs, parse_single_stream, parse_statistics};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(rows) = parse_statistics(data) {
        assert!(!rows.is_empty());
        assert!(rows.windows(2).all(|w| w[0].percentage < w[1].percentage));
    }
    if let Ok(rows) = parse_single_stream(data) {
        assert!(rows.iter().all(|r| r.error.is_finite()));
    }
    let _ = parse_runs(data);
});
