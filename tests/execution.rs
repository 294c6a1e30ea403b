use fclc::{
    exec::{Machine, Outcome, RuntimeError},
    ir::{Label, LabelKind, Program},
};

fn compile(text: &str) -> Program {
    match fclc::compile(text.as_bytes(), "test.fcl") {
        Ok(program) => program,
        Err(diagnostics) => panic!("{}", diagnostics),
    }
}

fn run(text: &str, args: &[&str]) -> Outcome {
    let program = compile(text);

    let mut machine = Machine::new(&program).with_step_limit(100_000);
    machine.bind(args);
    machine.run().unwrap()
}

#[test]
fn inputs_come_from_name_value_pairs() {
    let outcome = run("x = i + j;", &["i", "5", "j", "7"]);
    assert_eq!(outcome.value("x"), Some(12));

    // Orden arbitrario, nombres desconocidos y entradas faltantes
    let outcome = run("x = i + j;", &["nope", "1", "j", "7", "x", "100"]);
    assert_eq!(outcome.value("i"), Some(0));
    assert_eq!(outcome.value("x"), Some(7));

    let outcome = run("x = i + j;", &["i", "3", "j"]);
    assert_eq!(outcome.value("x"), Some(3));
}

#[test]
fn dump_lists_every_variable_in_declaration_order() {
    let outcome = run("x = i + j; if (x > k) { y = x; } i = 0;", &["i", "2", "j", "2", "k", "1"]);

    let dump: Vec<_> = outcome
        .dump()
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect();

    assert_eq!(
        dump,
        [
            (String::from("x"), 4),
            (String::from("i"), 0),
            (String::from("j"), 2),
            (String::from("k"), 1),
            (String::from("y"), 4),
        ]
    );
}

#[test]
fn countdown_loop() {
    let program = compile("x = 5; loop { if (x <= 0) { break; } x = x - 1; }");
    let outcome = Machine::new(&program).run().unwrap();

    let label = |kind| Label { kind, number: 1 };

    assert_eq!(outcome.value("x"), Some(0));
    assert_eq!(outcome.visits(label(LabelKind::Loop)), 6);
    assert_eq!(outcome.visits(label(LabelKind::EndIf)), 5);
    assert_eq!(outcome.visits(label(LabelKind::ExitLoop)), 1);

    // store inicial, 5 vueltas de 7 instrucciones y la salida de 4
    assert_eq!(outcome.steps(), 1 + 5 * 7 + 4);
}

#[test]
fn runtime_modulo_matches_folded_modulo() {
    let runtime = run("a = 10; b = 3; c = a % b;", &[]);
    let folded = run("c = 10 % 3;", &[]);

    assert_eq!(runtime.value("c"), Some(1));
    assert_eq!(folded.value("c"), Some(1));
}

#[test]
fn folding_agrees_with_execution() {
    let cases = [
        ("-7 / 2", "a / b", -7, 2),
        ("-7 % 2", "a % b", -7, 2),
        ("7 % -2", "a % b", 7, -2),
        ("2147483647 + 1", "a + b", i32::MAX, 1),
        ("-2147483647 - 2", "a - b", -i32::MAX, 2),
        ("65536 * 65536", "a * b", 65536, 65536),
        ("3 < 4", "a < b", 3, 4),
        ("3 >= 4", "a >= b", 3, 4),
        ("0 || 5", "a || b", 0, 5),
        ("6 && 0", "a && b", 6, 0),
        ("6 != 6", "a != b", 6, 6),
    ];

    for (literal, variables, a, b) in cases {
        let folded = compile(&format!("r = {};", literal));
        assert_eq!(folded.code.len(), 1, "`{}` was not folded", literal);

        let folded = Machine::new(&folded).run().unwrap().value("r");

        let (a, b) = (a.to_string(), b.to_string());
        let evaluated = run(&format!("r = {};", variables), &["a", a.as_str(), "b", b.as_str()]).value("r");

        assert_eq!(folded, evaluated, "`{}` vs `{}`", literal, variables);
    }
}

#[test]
fn euclid() {
    let text = "// máximo común divisor\n\
                loop {\n\
                    if (b == 0) { break; }\n\
                    t = a % b;\n\
                    a = b;\n\
                    b = t;\n\
                }\n\
                gcd = a;";

    let outcome = run(text, &["a", "1071", "b", "462"]);
    assert_eq!(outcome.value("gcd"), Some(21));
    assert_eq!(outcome.value("b"), Some(0));
}

#[test]
fn nested_break_leaves_only_the_inner_loop() {
    let text = "i = 0; total = 0;\n\
                loop {\n\
                    if (i == 3) { break; }\n\
                    j = 0;\n\
                    loop {\n\
                        if (j == 4) { break; }\n\
                        total = total + 1;\n\
                        j = j + 1;\n\
                    }\n\
                    i = i + 1;\n\
                }";

    let outcome = run(text, &[]);
    assert_eq!(outcome.value("total"), Some(12));
    assert_eq!(outcome.value("i"), Some(3));
}

#[test]
fn runtime_faults_are_reported() {
    let program = compile("r = a / b;");
    let mut machine = Machine::new(&program);
    machine.bind(["a", "1", "b", "0"]);

    assert!(matches!(
        machine.run(),
        Err(RuntimeError::DivisionByZero(_))
    ));

    let program = compile("loop { x = x + 1; }");
    let outcome = Machine::new(&program).with_step_limit(1_000).run();
    assert!(matches!(outcome, Err(RuntimeError::StepLimit(1_000))));
}
