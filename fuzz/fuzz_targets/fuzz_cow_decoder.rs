//! Fuzz target: herd record decoding
//!
//! Feeds arbitrary bytes to both ways a cow enters the herd table: the
//! versioned flash blob and the management page's JSON form.  Neither may
//! panic, and anything the form parser accepts must pass validation and
//! survive a store round trip.
//!
//! cargo fuzz run fuzz_cow_decoder

#![no_main]

use feedstation::adapters::cow_store::{decode_record, encode_record};
use feedstation::ration::herd::CowRecord;
use libfuzzer_sys::fuzz_target;

use critical_section as _;

fuzz_target!(|data: &[u8]| {
    let _ = decode_record(data);

    if let Ok(json) = core::str::from_utf8(data) {
        if let Ok(cow) = CowRecord::from_json(json) {
            assert!(cow.validate().is_ok(), "form accepted an invalid cow");
            let blob = encode_record(&cow).expect("valid cow must encode");
            assert_eq!(decode_record(&blob).ok(), Some(cow));
        }
    }
});
