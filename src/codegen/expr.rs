//! Generación de código para expresiones.
//!
//! El plegado de constantes es puramente sintáctico: una operación se
//! evalúa en tiempo de compilación únicamente si sus dos operandos son
//! constantes tras reducirse, sin simplificaciones algebraicas. Una
//! lectura de variable nunca es constante. `||` y `&&` no hacen
//! cortocircuito, ambos operandos se evalúan siempre.

use super::Context;
use crate::{
    ir::{Instruction, Op, Operand, Register},
    parse::Expr,
    semantic::Semantic,
    source::Located,
};

/// Resultado de reducir una expresión.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Constante conocida en tiempo de compilación.
    Constant(i32),

    /// Valor calculado en tiempo de ejecución en un registro.
    Evaluated(Register),
}

impl Value {
    pub fn operand(self) -> Operand {
        match self {
            Value::Constant(constant) => Operand::Constant(constant),
            Value::Evaluated(register) => Operand::Register(register),
        }
    }
}

impl Context<'_> {
    /// Reduce una expresión usando registros a partir de `depth`.
    ///
    /// Si el resultado se evalúa en tiempo de ejecución, queda en
    /// el registro de profundidad `depth`.
    pub fn eval(&mut self, expr: &Located<Expr>, depth: u32) -> Semantic<Value> {
        match expr.val() {
            Expr::Integer(constant) => Ok(Value::Constant(*constant)),

            Expr::Read(name) => {
                self.symbols.lookup(name, expr.location())?;

                let into = self.regs.at(depth);
                self.push(Instruction::Load(into, Operand::Variable(name.clone())));

                Ok(Value::Evaluated(into))
            }

            Expr::Negate(operand) => match self.eval(operand, depth)? {
                Value::Constant(constant) => Ok(Value::Constant(constant.wrapping_neg())),
                Value::Evaluated(register) => {
                    self.push(Instruction::Binary(
                        Op::Mul,
                        register,
                        Operand::Constant(-1),
                    ));

                    Ok(Value::Evaluated(register))
                }
            },

            Expr::Binary(lhs, op, rhs) => {
                let op = Op::from(*op);

                // El operando derecho siempre se evalúa un registro más abajo
                let lhs = self.eval(lhs, depth)?;
                let rhs = self.eval(rhs, depth + 1)?;

                match (lhs, rhs) {
                    (Value::Constant(lhs), Value::Constant(rhs)) => match op.apply(lhs, rhs) {
                        Some(folded) => Ok(Value::Constant(folded)),

                        // División entre cero literal: se deja al tiempo de ejecución
                        None => {
                            let into = self.load_constant(lhs, depth);
                            self.push(Instruction::Binary(op, into, Operand::Constant(rhs)));

                            Ok(Value::Evaluated(into))
                        }
                    },

                    // El literal izquierdo se carga después de evaluar el lado derecho
                    (Value::Constant(lhs), Value::Evaluated(rhs)) => {
                        let into = self.load_constant(lhs, depth);
                        self.push(Instruction::Binary(op, into, Operand::Register(rhs)));

                        Ok(Value::Evaluated(into))
                    }

                    (Value::Evaluated(into), rhs) => {
                        self.push(Instruction::Binary(op, into, rhs.operand()));
                        Ok(Value::Evaluated(into))
                    }
                }
            }
        }
    }

    /// Reduce una expresión y garantiza que el resultado quede en un registro.
    pub fn eval_into_register(&mut self, expr: &Located<Expr>, depth: u32) -> Semantic<Register> {
        match self.eval(expr, depth)? {
            Value::Evaluated(register) => Ok(register),
            Value::Constant(constant) => Ok(self.load_constant(constant, depth)),
        }
    }

    fn load_constant(&mut self, constant: i32, depth: u32) -> Register {
        let into = self.regs.at(depth);
        self.push(Instruction::Load(into, Operand::Constant(constant)));

        into
    }
}
