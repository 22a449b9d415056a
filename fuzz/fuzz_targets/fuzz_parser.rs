#![no_main]

use bend_parser::{parse_program_with_errors, Item, Term};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(src) = std::str::from_utf8(data) else {
        return;
    };
    let (program, diags) = parse_program_with_errors(src);
    for d in &diags {
        assert!(d.span.end <= src.len());
    }
    let damaged = program.items.iter().any(|i| matches!(i, Item::Error(_)))
        || program
            .ast
            .terms
            .ids()
            .any(|id| matches!(program.ast.term(id), Term::Error));
    assert!(!damaged || !diags.is_empty());
});
