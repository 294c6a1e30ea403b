//! Compilador para FCL.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en un AST por medio de análisis sintáctico en [`parse`].
//! Sobre el árbol sintáctico se clasifican las variables en entradas
//! y locales en [`semantic`].
//!
//! # Back end
//! El AST clasificado se linealiza a instrucciones de registros
//! virtuales y etiquetas en [`codegen`], usando la representación
//! intermedia descrita en [`ir`]. Finalmente [`assemble`] produce la
//! descripción completa del programa, que otro colaborador proyecta a
//! una sintaxis concreta. [`exec`] ejecuta esa misma descripción tal
//! como lo haría el artefacto final.

#[macro_use]
mod macros;

pub mod assemble;
pub mod codegen;
pub mod error;
pub mod exec;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

use std::io::BufRead;

use tracing::debug;

use crate::{error::Diagnostics, ir::Program, lex::Lexer};

/// Compila un programa completo a partir de su código fuente.
///
/// `name` identifica al origen en los diagnósticos y se convierte en
/// el nombre del programa. Todos los errores son terminales: o se
/// obtiene un programa completo o se obtienen únicamente diagnósticos.
pub fn compile<R: BufRead>(reader: R, name: &str) -> Result<Program, Diagnostics> {
    let (start, stream) = source::consume(reader, name);

    let tokens = Lexer::new(start.clone(), stream)
        .try_exhaustive()
        .map_err(|errors| Diagnostics::from(errors).kind("Lexical error"))?;

    let ast = parse::parse(tokens.iter(), start)
        .map_err(|error| Diagnostics::from(error).kind("Syntax error"))?;

    debug!(statements = ast.statements().len(), "parsed");

    let symbols = ast.classify();
    let generated = codegen::generate(&ast, &symbols)
        .map_err(|error| Diagnostics::from(error).kind("Semantic error"))?;

    Ok(assemble::assemble(name, &symbols, generated))
}
