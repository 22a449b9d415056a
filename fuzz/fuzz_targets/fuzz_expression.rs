#![no_main]

use bend_parser::parse_expression;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Dumping and walking any successful parse must not panic.
    if let Ok(src) = std::str::from_utf8(data) {
        if let Ok(expr) = parse_expression(src) {
            let _ = expr.sexp();
            for id in expr.ast.terms.ids() {
                let _ = expr.ast.children(id);
            }
        }
    }
});
