#![no_main]

use hll_accuracy_report::summarize;
use hll_accuracy_report::summarizer::runs_from_records;
use hll_accuracy_report::table::parse_runs;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = parse_runs(data) else {
        return;
    };
    let Ok((checkpoints, runs)) = runs_from_records(&records) else {
        return;
    };
    if let Ok(summaries) = summarize(&runs, &checkpoints) {
        assert_eq!(summaries.len(), checkpoints.len());
        for s in &summaries {
            assert!(s.mean_estimate.is_finite());
            assert!(s.std_dev.is_finite() && s.std_dev >= 0.0);
            assert!(s.mean_error.is_finite() && s.mean_error >= 0.0);
        }
    }
});
