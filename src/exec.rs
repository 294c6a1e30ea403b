//! Ejecución de referencia.
//!
//! Un [`Machine`] ejecuta un [`Program`] tal como lo hace el artefacto
//! que se genera a partir de él: las entradas se toman de pares
//! `<nombre> <valor>`, las locales inician en cero, el control se
//! transfiere directamente a etiquetas y al final se imprimen todas las
//! variables en orden de declaración. La aritmética es de 32 bits con
//! semántica de C.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ir::{Instruction, Label, Operand, Program, Register},
    lex::Identifier,
};

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Division by zero at instruction {0}")]
    DivisionByZero(usize),

    #[error("Jump to undefined label `{0}`")]
    UndefinedLabel(Label),

    #[error("Step limit of {0} instructions exceeded")]
    StepLimit(u64),
}

/// Resultado de una ejecución completa.
#[derive(Debug)]
pub struct Outcome {
    dump: Vec<(Identifier, i32)>,
    visits: HashMap<Label, u64>,
    steps: u64,
}

impl Outcome {
    /// Variables y sus valores finales, en orden de declaración.
    pub fn dump(&self) -> &[(Identifier, i32)] {
        &self.dump
    }

    /// Valor final de una variable.
    pub fn value(&self, name: &str) -> Option<i32> {
        self.dump
            .iter()
            .find(|(variable, _)| variable.as_ref() == name)
            .map(|&(_, value)| value)
    }

    /// Cantidad de veces que el flujo de control pasó por una etiqueta.
    pub fn visits(&self, label: Label) -> u64 {
        self.visits.get(&label).copied().unwrap_or(0)
    }

    /// Cantidad de instrucciones ejecutadas, sin contar etiquetas ni comentarios.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

pub struct Machine<'a> {
    program: &'a Program,
    targets: HashMap<Label, usize>,
    inputs: HashSet<&'a Identifier>,
    variables: HashMap<&'a Identifier, i32>,
    registers: Vec<i32>,
    step_limit: Option<u64>,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a Program) -> Self {
        let targets = program
            .code
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| match instruction {
                Instruction::SetLabel(label) => Some((*label, index)),
                _ => None,
            })
            .collect();

        let inputs = program.inputs.iter().collect();
        let variables = program
            .inputs
            .iter()
            .map(|input| (input, 0))
            .chain(
                program
                    .locals
                    .iter()
                    .map(|local| (&local.variable, local.value)),
            )
            .collect();

        Machine {
            program,
            targets,
            inputs,
            variables,
            registers: vec![0; program.registers as usize],
            step_limit: None,
        }
    }

    /// Aborta la ejecución después de `limit` instrucciones.
    pub fn with_step_limit(self, limit: u64) -> Self {
        Machine {
            step_limit: Some(limit),
            ..self
        }
    }

    /// Enlaza entradas a partir de pares de argumentos `<nombre> <valor>`.
    ///
    /// Los nombres que no son entradas se ignoran, un valor que no es un
    /// entero se interpreta como en `atoi()` y un argumento final sin
    /// pareja se descarta.
    pub fn bind<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let (Some(name), Some(value)) = (args.next(), args.next()) {
            let name = name.as_ref();
            match self.inputs.get(&Identifier::new(name)) {
                Some(&input) => {
                    let value = atoi(value.as_ref());
                    trace!(input = name, value, "input bound");

                    self.variables.insert(input, value);
                }

                None => trace!(name, "ignoring argument for unknown input"),
            }
        }
    }

    /// Ejecuta el programa hasta su fin.
    pub fn run(mut self) -> Result<Outcome, RuntimeError> {
        let program = self.program;
        let code = &program.code;

        let mut visits = HashMap::new();
        let mut steps = 0;
        let mut pc = 0;

        while let Some(instruction) = code.get(pc) {
            let mut next = pc + 1;

            match instruction {
                Instruction::SetLabel(label) => {
                    *visits.entry(*label).or_insert(0) += 1;
                    pc = next;
                    continue;
                }

                Instruction::Comment(_) => {
                    pc = next;
                    continue;
                }

                Instruction::Jump(label) => next = self.target(*label)?,

                Instruction::JumpIfZero(register, label) => {
                    if *self.register(*register) == 0 {
                        next = self.target(*label)?;
                    }
                }

                Instruction::Load(register, operand) => {
                    let value = self.read(operand);
                    *self.register(*register) = value;
                }

                Instruction::Store(variable, operand) => {
                    let value = self.read(operand);
                    self.variables.insert(variable, value);
                }

                Instruction::Binary(op, register, operand) => {
                    let rhs = self.read(operand);
                    let lhs = self.register(*register);

                    *lhs = op
                        .apply(*lhs, rhs)
                        .ok_or(RuntimeError::DivisionByZero(pc))?;
                }
            }

            steps += 1;
            if let Some(limit) = self.step_limit {
                if steps > limit {
                    return Err(RuntimeError::StepLimit(limit));
                }
            }

            pc = next;
        }

        debug!(steps, "execution finished");

        let dump = program
            .dump
            .iter()
            .map(|name| (name.clone(), self.variables.get(name).copied().unwrap_or(0)))
            .collect();

        Ok(Outcome {
            dump,
            visits,
            steps,
        })
    }

    fn target(&self, label: Label) -> Result<usize, RuntimeError> {
        let target = self
            .targets
            .get(&label)
            .copied()
            .ok_or(RuntimeError::UndefinedLabel(label))?;

        trace!(%label, target, "jump");
        Ok(target)
    }

    fn register(&mut self, Register(index): Register) -> &mut i32 {
        let index = index as usize;
        if index >= self.registers.len() {
            self.registers.resize(index + 1, 0);
        }

        &mut self.registers[index]
    }

    fn read(&mut self, operand: &Operand) -> i32 {
        match operand {
            Operand::Constant(constant) => *constant,
            Operand::Variable(variable) => self.variables.get(variable).copied().unwrap_or(0),
            Operand::Register(register) => *self.register(*register),
        }
    }
}

/// Conversión permisiva de texto a entero, como `atoi()` de C.
///
/// Se aceptan espacios iniciales, un signo opcional y tantos dígitos
/// como haya; cualquier otra cosa termina la conversión.
fn atoi(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |accumulated, digit| {
            accumulated
                .wrapping_mul(10)
                .wrapping_add((digit - b'0') as i32)
        });

    if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{LabelKind, Op};

    fn id(name: &str) -> Identifier {
        Identifier::new(name)
    }

    #[test]
    fn atoi_prefixes() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi("  -17"), -17);
        assert_eq!(atoi("+8x"), 8);
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
    }

    #[test]
    fn hand_built_program() {
        // n = input; r = 0; loop { if (n) { r = r + n; n = n - 1; } else { break; } }
        let n = id("n");
        let r = id("r");
        let label = |kind| Label { kind, number: 1 };

        let program = Program {
            name: String::from("sum"),
            inputs: vec![n.clone()],
            locals: vec![crate::ir::Initialization {
                variable: r.clone(),
                value: 0,
            }],
            registers: 1,
            code: vec![
                Instruction::SetLabel(label(LabelKind::Loop)),
                Instruction::Load(Register(0), Operand::Variable(n.clone())),
                Instruction::JumpIfZero(Register(0), label(LabelKind::ExitLoop)),
                Instruction::Load(Register(0), Operand::Variable(r.clone())),
                Instruction::Binary(Op::Add, Register(0), Operand::Variable(n.clone())),
                Instruction::Store(r.clone(), Operand::Register(Register(0))),
                Instruction::Load(Register(0), Operand::Variable(n.clone())),
                Instruction::Binary(Op::Sub, Register(0), Operand::Constant(1)),
                Instruction::Store(n.clone(), Operand::Register(Register(0))),
                Instruction::Jump(label(LabelKind::Loop)),
                Instruction::SetLabel(label(LabelKind::ExitLoop)),
            ],
            dump: vec![n, r],
        };

        let mut machine = Machine::new(&program);
        machine.bind(vec!["n", "4", "r", "100", "extra"]);

        let outcome = machine.run().unwrap();
        assert_eq!(outcome.dump(), &[(id("n"), 0), (id("r"), 10)]);
        assert_eq!(outcome.visits(label(LabelKind::Loop)), 5);
        assert_eq!(outcome.visits(label(LabelKind::ExitLoop)), 1);
    }

    #[test]
    fn runtime_faults() {
        let program = Program {
            name: String::from("faults"),
            inputs: vec![],
            locals: vec![],
            registers: 1,
            code: vec![
                Instruction::Load(Register(0), Operand::Constant(1)),
                Instruction::Binary(Op::Div, Register(0), Operand::Constant(0)),
            ],
            dump: vec![],
        };

        assert_eq!(
            Machine::new(&program).run().unwrap_err(),
            RuntimeError::DivisionByZero(1)
        );

        let forever = Label {
            kind: LabelKind::Loop,
            number: 1,
        };

        let program = Program {
            code: vec![Instruction::SetLabel(forever), Instruction::Jump(forever)],
            ..program
        };

        assert_eq!(
            Machine::new(&program)
                .with_step_limit(100)
                .run()
                .unwrap_err(),
            RuntimeError::StepLimit(100)
        );
    }
}
