//! Generación de código.
//!
//! Linealiza el AST a un listado plano de instrucciones del IR.
//! Cada constructo de control recibe un par de etiquetas frescas en
//! el orden en que se encuentra (preorden). Los `if` y los ciclos
//! llevan contadores independientes.
//!
//! ```text
//! if (c) { A } else { B }      loop { A }
//!
//!     <c en r>                 _loop_N:
//!     breq(r, _else_N)             A
//!     A                            jmp(_loop_N)
//!     jmp(_end_if_N)           _exit_loop_N:
//! _else_N:
//!     B
//! _end_if_N:
//! ```
//!
//! Un `break` salta a la etiqueta de salida del ciclo más interno.

use tracing::debug;

use crate::{
    ir::{Instruction, Label, LabelKind},
    parse::{Ast, Statement},
    semantic::{Semantic, SemanticError, SymbolTable},
    source::Located,
};

mod expr;
mod regs;

pub use expr::Value;
use regs::Registers;

/// Salida de la generación de código.
pub struct Generated {
    pub code: Vec<Instruction>,
    pub registers: u32,
}

/// Genera código para un programa ya clasificado.
pub fn generate(ast: &Ast, symbols: &SymbolTable) -> Semantic<Generated> {
    let mut cx = Context {
        symbols,
        code: Vec::new(),
        regs: Registers::default(),
        labels: Labels::default(),
    };

    cx.block(ast.statements(), None)?;

    debug!(
        instructions = cx.code.len(),
        registers = cx.regs.used(),
        ifs = cx.labels.ifs,
        loops = cx.labels.loops,
        "code generation finished"
    );

    Ok(Generated {
        registers: cx.regs.used(),
        code: cx.code,
    })
}

/// Estado de una ejecución del generador.
pub struct Context<'a> {
    symbols: &'a SymbolTable,
    code: Vec<Instruction>,
    regs: Registers,
    labels: Labels,
}

/// Contadores de etiquetas por tipo de constructo.
#[derive(Default)]
struct Labels {
    ifs: u32,
    loops: u32,
}

impl Labels {
    fn next_if(&mut self) -> (Label, Label) {
        self.ifs += 1;
        pair(LabelKind::Else, LabelKind::EndIf, self.ifs)
    }

    fn next_loop(&mut self) -> (Label, Label) {
        self.loops += 1;
        pair(LabelKind::Loop, LabelKind::ExitLoop, self.loops)
    }
}

fn pair(first: LabelKind, second: LabelKind, number: u32) -> (Label, Label) {
    (
        Label {
            kind: first,
            number,
        },
        Label {
            kind: second,
            number,
        },
    )
}

impl Context<'_> {
    fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    /// `exit` es la etiqueta de salida del ciclo más interno, si lo hay.
    fn block(&mut self, statements: &[Statement], exit: Option<Label>) -> Semantic<()> {
        statements
            .iter()
            .try_for_each(|statement| self.statement(statement, exit))
    }

    fn statement(&mut self, statement: &Statement, exit: Option<Label>) -> Semantic<()> {
        match statement {
            Statement::Assignment { target, value } => {
                let variable = self.symbols.lookup(target.val(), target.location())?;
                let variable = variable.name().clone();

                let value = self.eval(value, 0)?;
                self.push(Instruction::Store(variable, value.operand()));
            }

            Statement::If {
                condition,
                body,
                otherwise,
            } => {
                let (else_label, end_label) = self.labels.next_if();

                // La condición siempre se evalúa en tiempo de ejecución
                let condition = self.eval_into_register(condition, 0)?;
                self.push(Instruction::JumpIfZero(condition, else_label));

                self.block(body, exit)?;
                self.push(Instruction::Jump(end_label));

                self.push(Instruction::SetLabel(else_label));
                self.block(otherwise, exit)?;
                self.push(Instruction::SetLabel(end_label));
            }

            Statement::Loop { body } => {
                let (loop_label, exit_label) = self.labels.next_loop();

                self.push(Instruction::SetLabel(loop_label));
                self.block(body, Some(exit_label))?;
                self.push(Instruction::Jump(loop_label));
                self.push(Instruction::SetLabel(exit_label));
            }

            Statement::Break(location) => match exit {
                Some(exit) => self.push(Instruction::Jump(exit)),
                None => {
                    return Err(Located::at(
                        SemanticError::BreakOutsideLoop,
                        location.clone(),
                    ))
                }
            },

            Statement::Comment(text) => self.push(Instruction::Comment(text.val().clone())),
        }

        Ok(())
    }
}
