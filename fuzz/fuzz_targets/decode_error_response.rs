#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use strata_protocol::ErrorResponse;

fuzz_target!(|data: &[u8]| {
    // First byte splits the input into message bytes and query text
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (message, query) = rest.split_at(split);

    let mut src = Bytes::copy_from_slice(message);
    if let Ok(response) = ErrorResponse::decode(&mut src) {
        let query = String::from_utf8_lossy(query);
        let _ = response.render_message(&query);
    }
});
