#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Ok or Err are both fine; a panic is a bug
        if let Ok(values) = minilisp_reader::read_many(input) {
            for value in values {
                let printed = value.to_string();
                assert_eq!(minilisp_reader::read(&printed).ok(), Some(value));
            }
        }
    }
});
