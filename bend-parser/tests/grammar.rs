use bend_parser::ast::{DefForm, Item, Term};
use bend_parser::{parse_expression, parse_program, Program};

fn sexp(src: &str) -> String {
    match parse_expression(src) {
        Ok(expr) => expr.sexp(),
        Err(diags) => panic!("failed to parse {src:?}: {diags:?}"),
    }
}

fn program(src: &str) -> Program {
    match parse_program(src) {
        Ok(program) => program,
        Err(diags) => panic!("failed to parse {src:?}: {diags:?}"),
    }
}

fn items(src: &str) -> Vec<String> {
    let program = program(src);
    program
        .items
        .iter()
        .map(|item| program.item_sexp(item))
        .collect()
}

#[test]
fn test_operator_precedence() {
    assert_eq!(sexp("1n + 2n * 3n"), "(+ 1n (* 2n 3n))");
    assert_eq!(sexp("1n * 2n + 3n"), "(+ (* 1n 2n) 3n)");
    assert_eq!(sexp("a + b == c * d"), "(== (+ a b) (* c d))");
    assert_eq!(sexp("a <> b or c"), "(<> a (or b c))");
    assert_eq!(sexp("A -> B <> C"), "(-> A (<> B C))");
}

#[test]
fn test_grouping() {
    assert_eq!(sexp("(1n + 2n) * 3n"), "(* (+ 1n 2n) 3n)");
}

#[test]
fn test_right_associative_operators() {
    assert_eq!(sexp("A -> B -> C"), "(-> A (-> B C))");
    assert_eq!(sexp("2n ** 3n ** 2n"), "(** 2n (** 3n 2n))");
    assert_eq!(sexp("x <> y <> z"), "(<> x (<> y z))");
    assert_eq!(sexp("a :: A :: Set"), "(:: a (:: A Set))");
}

#[test]
fn test_tight_and_loose_application() {
    assert_eq!(sexp("f(x)"), "(call f x)");
    assert_eq!(sexp("f (x)"), "(call f x)");
    assert!(matches!(
        parse_expression("f(x)").unwrap().term(),
        Term::Call { tight: true, .. }
    ));
    assert!(matches!(
        parse_expression("f (x)").unwrap().term(),
        Term::Call { tight: false, .. }
    ));
}

#[test]
fn test_generic_call_requires_adjacency() {
    assert_eq!(sexp("f<A>(x)"), "(call f <A> x)");
    // any space turns the angle brackets back into comparisons
    for src in ["f <A>(x)", "f<A> (x)", "f < A > (x)"] {
        assert_eq!(sexp(src), "(> (< f A) x)", "{src}");
    }
}

#[test]
fn test_bool_match_rejects_reordered_cases() {
    let diags = parse_expression("λ{True: a; False: b}").unwrap_err();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, bend_parser::DiagnosticKind::Syntax);
}

#[test]
fn test_nat_match_cases_in_order() {
    assert_eq!(
        sexp("λ{0n: zero; 1n+: succ}"),
        "(lam (nat-match (0n zero) (1n+ succ)))"
    );
}

#[test]
fn test_full_definition() {
    let program = program("def inc(x: Nat) -> Nat : x + 1n");
    let Item::Def(def) = &program.items[0] else {
        panic!("expected definition, got {:?}", program.items[0]);
    };
    assert_eq!(def.name, "inc");
    let DefForm::Full { params, ret, body } = &def.form else {
        panic!("expected full form, got {:?}", def.form);
    };
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name, "x");
    assert_eq!(program.ast.sexp(params[0].ty), "Nat");
    assert_eq!(ret.map(|r| program.ast.sexp(r)).as_deref(), Some("Nat"));
    assert_eq!(program.ast.sexp(*body), "(+ x 1n)");
}

#[test]
fn test_equation_definition_wins_over_nullary() {
    let program = program("def id : Nat -> Nat = λx. x");
    let Item::Def(def) = &program.items[0] else {
        panic!("expected definition");
    };
    let DefForm::Equation { ty, value } = &def.form else {
        panic!("expected equation form, got {:?}", def.form);
    };
    assert_eq!(program.ast.sexp(*ty), "(-> Nat Nat)");
    assert_eq!(program.ast.sexp(*value), "(lam (x) x)");
}

#[test]
fn test_nullary_definition() {
    assert_eq!(items("def zero : 0n"), ["(def zero 0n)"]);
}

#[test]
fn test_option_type() {
    let program = program("type Option<T> : case @None: case @Some: value: T");
    let Item::Type(ty) = &program.items[0] else {
        panic!("expected type definition");
    };
    assert_eq!(ty.type_params.len(), 1);
    assert_eq!(ty.type_params[0].name, "T");
    assert_eq!(ty.cases.len(), 2);
    assert_eq!(ty.cases[0].tag, "None");
    assert!(ty.cases[0].fields.is_empty());
    assert_eq!(ty.cases[1].tag, "Some");
    assert_eq!(ty.cases[1].fields[0].name, "value");
    assert_eq!(program.ast.sexp(ty.cases[1].fields[0].ty), "T");
}

#[test]
fn test_small_program() {
    let src = "\
type Nat2 : case @Z: case @S: pred: Nat2

def add(a: Nat, b: Nat) -> Nat :
  match a:
    case 0n: b
    case 1n + p: 1n + add(p, b)

def two : Nat = add(1n, 1n)

assert two : Nat
";
    assert_eq!(
        items(src),
        [
            "(type Nat2 (case @Z) (case @S (pred Nat2)))",
            "(def add (params (a Nat) (b Nat)) (ret Nat) \
             (match (a) (case 0n => b) (case (+ 1n p) => (+ 1n (call add p b)))))",
            "(def two (type Nat) (call add 1n 1n))",
            "(assert two Nat)",
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        items("# leading comment\ndef one : 1n # trailing\n"),
        ["(def one 1n)"]
    );
}
