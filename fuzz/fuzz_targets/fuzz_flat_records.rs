#![no_main]

use libfuzzer_sys::fuzz_target;
use locus::index::loader::parse_flat_records;

fuzz_target!(|data: &str| {
    // Malformed input is an error, never a panic
    if let Ok(records) = parse_flat_records(data) {
        for record in records {
            assert!(record.line >= 1);
            assert!(!record.fields.is_empty());
        }
    }
});
