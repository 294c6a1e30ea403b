//! Ensamblado de la descripción final del programa.
//!
//! Reúne la clasificación de variables y el código generado en un
//! [`Program`], que es lo único que recibe el colaborador encargado
//! de proyectarlo a una sintaxis concreta. No se transforma nada.

use tracing::debug;

use crate::{
    codegen::Generated,
    ir::{Initialization, Program},
    semantic::{Role, SymbolTable},
};

pub fn assemble<S: Into<String>>(name: S, symbols: &SymbolTable, generated: Generated) -> Program {
    let names = |role| {
        symbols
            .with_role(role)
            .map(|symbol| symbol.name().clone())
            .collect::<Vec<_>>()
    };

    let inputs = names(Role::Input);
    let locals = names(Role::Local)
        .into_iter()
        .map(|variable| Initialization { variable, value: 0 })
        .collect();

    let dump = symbols.iter().map(|symbol| symbol.name().clone()).collect();

    let program = Program {
        name: name.into(),
        inputs,
        locals,
        registers: generated.registers,
        code: generated.code,
        dump,
    };

    debug!(
        program = %program.name,
        inputs = program.inputs.len(),
        locals = program.locals.len(),
        instructions = program.code.len(),
        "program assembled"
    );

    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen, lex::Lexer, parse, source};

    fn names<'a, I: Iterator<Item = &'a crate::lex::Identifier>>(names: I) -> Vec<String> {
        names.map(ToString::to_string).collect()
    }

    #[test]
    fn bindings_initializations_and_dump_order() {
        let text = "x = i + j; if (x > k) { y = x; } i = 0;";
        let (start, stream) = source::consume(text.as_bytes(), "sum.fcl");
        let tokens = Lexer::new(start.clone(), stream).try_exhaustive().unwrap();
        let ast = parse::parse(tokens.iter(), start).unwrap();

        let symbols = ast.classify();
        let generated = codegen::generate(&ast, &symbols).unwrap();
        let program = assemble("sum.fcl", &symbols, generated);

        assert_eq!(program.name, "sum.fcl");
        assert_eq!(names(program.inputs.iter()), ["i", "j", "k"]);
        assert_eq!(
            names(program.locals.iter().map(|local| &local.variable)),
            ["x", "y"]
        );
        assert!(program.locals.iter().all(|local| local.value == 0));
        assert_eq!(names(program.dump.iter()), ["x", "i", "j", "k", "y"]);
        assert_eq!(program.registers, 2);
    }
}
