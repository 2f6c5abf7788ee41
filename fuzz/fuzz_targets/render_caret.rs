#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_protocol::Position;
use strata_protocol::error_response::render_caret;

#[derive(Debug, Arbitrary)]
struct CaretInput {
    query: String,
    line_no: u8,
    byte_no: u16,
    hint: String,
}

fuzz_target!(|input: CaretInput| {
    let position = Position {
        line_no: usize::from(input.line_no),
        byte_no: usize::from(input.byte_no),
    };

    if let Ok(rendered) = render_caret("error", &input.query, position, &input.hint) {
        assert!(rendered.starts_with("error\nquery:"));
    }
});
