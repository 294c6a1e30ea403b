//! Representación intermedia.
//!
//! El IR es un listado plano de pseudo-instrucciones basadas en
//! registros virtuales, con etiquetas como marcadores de posición.
//! Es neutral respecto a la sintaxis del backend: un colaborador
//! externo proyecta un [`Program`] a C, ensamblador o lo que
//! corresponda. La implementación de `Display` produce un listado
//! legible que no pretende ser un backend.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::{lex::Identifier, parse::BinOp};

/// Descripción completa de un programa compilado.
#[derive(Debug)]
pub struct Program {
    /// Nombre del origen a partir del cual se compiló.
    pub name: String,

    /// Variables que se enlazan a valores externos, en orden de declaración.
    pub inputs: Vec<Identifier>,

    /// Variables locales y su valor inicial, en orden de declaración.
    pub locals: Vec<Initialization>,

    /// Cantidad de registros virtuales que el código utiliza.
    pub registers: u32,

    /// Instrucciones, etiquetas y comentarios.
    pub code: Vec<Instruction>,

    /// Variables a imprimir al final de la ejecución.
    pub dump: Vec<Identifier>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Initialization {
    pub variable: Identifier,
    pub value: i32,
}

/// Registro virtual, indexado por profundidad de evaluación.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Else,
    EndIf,
    Loop,
    ExitLoop,
}

/// Etiqueta única dentro de un programa.
///
/// Las etiquetas se numeran por tipo de constructo: un contador
/// para `if` (`Else` y `EndIf`) y otro para ciclos (`Loop` y `ExitLoop`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    pub kind: LabelKind,
    pub number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Variable(Identifier),
    Constant(i32),
}

/// Operación binaria sobre un registro y un operando.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    Or,
    And,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Op {
    /// Evalúa la operación con semántica de enteros de C.
    ///
    /// La división y el módulo truncan hacia cero, el módulo toma el
    /// signo del dividendo y el desbordamiento da la vuelta. Retorna
    /// `None` únicamente para división o módulo entre cero.
    pub fn apply(self, lhs: i32, rhs: i32) -> Option<i32> {
        use Op::*;

        let truth = |condition: bool| condition as i32;
        let result = match self {
            Eq => truth(lhs == rhs),
            Neq => truth(lhs != rhs),
            Lt => truth(lhs < rhs),
            Leq => truth(lhs <= rhs),
            Gt => truth(lhs > rhs),
            Geq => truth(lhs >= rhs),
            Or => truth(lhs != 0 || rhs != 0),
            And => truth(lhs != 0 && rhs != 0),
            Add => lhs.wrapping_add(rhs),
            Sub => lhs.wrapping_sub(rhs),
            Mul => lhs.wrapping_mul(rhs),
            Div if rhs == 0 => return None,
            Div => lhs.wrapping_div(rhs),
            Mod if rhs == 0 => return None,
            Mod => lhs.wrapping_rem(rhs),
        };

        Some(result)
    }

    fn mnemonic(self) -> &'static str {
        use Op::*;

        match self {
            Eq => "eq",
            Neq => "neq",
            Lt => "lt",
            Leq => "leq",
            Gt => "gt",
            Geq => "geq",
            Or => "or",
            And => "and",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
        }
    }
}

impl From<BinOp> for Op {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Equal => Op::Eq,
            BinOp::NotEqual => Op::Neq,
            BinOp::Less => Op::Lt,
            BinOp::LessOrEqual => Op::Leq,
            BinOp::Greater => Op::Gt,
            BinOp::GreaterOrEqual => Op::Geq,
            BinOp::Or => Op::Or,
            BinOp::And => Op::And,
            BinOp::Add => Op::Add,
            BinOp::Sub => Op::Sub,
            BinOp::Mul => Op::Mul,
            BinOp::Div => Op::Div,
            BinOp::Mod => Op::Mod,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Marca la posición de una etiqueta, no se ejecuta.
    SetLabel(Label),

    /// Salto incondicional.
    Jump(Label),

    /// Salto si el registro vale cero.
    JumpIfZero(Register, Label),

    /// `register = operand`
    Load(Register, Operand),

    /// `variable = operand`
    Store(Identifier, Operand),

    /// `register = register <op> operand`
    Binary(Op, Register, Operand),

    /// Comentario del programa original, no se ejecuta.
    Comment(Rc<str>),
}

impl Display for Register {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "_R{:02}", self.0)
    }
}

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            LabelKind::Else => "_else",
            LabelKind::EndIf => "_end_if",
            LabelKind::Loop => "_loop",
            LabelKind::ExitLoop => "_exit_loop",
        };

        write!(fmt, "{}_{}", prefix, self.number)
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(register) => register.fmt(fmt),
            Operand::Variable(variable) => variable.fmt(fmt),
            Operand::Constant(constant) => constant.fmt(fmt),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            SetLabel(label) => write!(fmt, "{}:", label),
            Jump(label) => emit!(fmt, "jmp", label),
            JumpIfZero(register, label) => emit!(fmt, "breq", register, label),
            Load(register, operand) => emit!(fmt, "load", register, operand),
            Store(variable, operand) => emit!(fmt, "store", variable, operand),
            Binary(op, register, operand) => emit!(fmt, op.mnemonic(), register, operand),
            Comment(text) => write!(fmt, "// {}", text),
        }
    }
}

impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<'a, I>(fmt: &mut fmt::Formatter<'_>, title: &str, names: I) -> fmt::Result
        where
            I: Iterator<Item = &'a Identifier>,
        {
            write!(fmt, "{}:", title)?;
            for name in names {
                write!(fmt, " {}", name)?;
            }

            writeln!(fmt)
        }

        writeln!(fmt, "program: {}", self.name)?;
        list(fmt, "inputs", self.inputs.iter())?;
        list(fmt, "locals", self.locals.iter().map(|local| &local.variable))?;
        writeln!(fmt, "registers: {}", self.registers)?;
        writeln!(fmt)?;

        for instruction in &self.code {
            match instruction {
                Instruction::SetLabel(_) => writeln!(fmt, "{}", instruction)?,
                _ => writeln!(fmt, "    {}", instruction)?,
            }
        }

        writeln!(fmt)?;
        list(fmt, "dump", self.dump.iter())
    }
}
