//! Análisis semántico: clasificación de variables.
//!
//! FCL no tiene declaraciones. El papel de cada variable se deduce de
//! su primera aparición en orden textual: si es una lectura, la variable
//! es una entrada del sistema ([`Role::Input`]) y se conecta a la
//! interfaz de la aplicación; si es una escritura, es una local
//! ([`Role::Local`]) que inicia en cero. Apariciones posteriores nunca
//! reclasifican una variable.
//!
//! En una asignación el destino aparece textualmente antes que la
//! expresión, por lo que `x = x + 1;` como primera aparición de `x`
//! produce una local.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    lex::Identifier,
    parse::{self, Expr, Statement},
    source::{Located, Location},
};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Variable `{0}` was never classified")]
    UnboundVariable(Identifier),

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Input,
    Local,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    name: Identifier,
    role: Role,
    order: usize,
}

impl Symbol {
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Posición de la primera aparición entre todas las variables.
    pub fn order(&self) -> usize {
        self.order
    }
}

/// Tabla de símbolos de un programa, en orden de declaración.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<Identifier, usize>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&order| &self.symbols[order])
    }

    /// Busca un símbolo que se espera exista.
    pub fn lookup(&self, id: &Identifier, location: &Location) -> Semantic<&Symbol> {
        self.get(id.as_ref()).ok_or_else(|| {
            Located::at(
                SemanticError::UnboundVariable(id.clone()),
                location.clone(),
            )
        })
    }

    /// Todos los símbolos, en orden de primera aparición.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Symbol> {
        self.iter().filter(move |symbol| symbol.role == role)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn decide(&mut self, name: &Identifier, role: Role) {
        if self.index.contains_key(name) {
            return;
        }

        let order = self.symbols.len();
        trace!(%name, ?role, order, "variable classified");

        self.index.insert(name.clone(), order);
        self.symbols.push(Symbol {
            name: name.clone(),
            role,
            order,
        });
    }
}

impl parse::Ast {
    /// Clasifica todas las variables del programa en un solo recorrido.
    pub fn classify(&self) -> SymbolTable {
        let mut table = SymbolTable::default();
        scan_block(&mut table, self.statements());

        debug!(
            inputs = table.with_role(Role::Input).count(),
            locals = table.with_role(Role::Local).count(),
            "variable classification finished"
        );

        table
    }
}

fn scan_block(table: &mut SymbolTable, statements: &[Statement]) {
    for statement in statements {
        match statement {
            Statement::Assignment { target, value } => {
                table.decide(target.val(), Role::Local);
                scan_expr(table, value.val());
            }

            Statement::If {
                condition,
                body,
                otherwise,
            } => {
                scan_expr(table, condition.val());
                scan_block(table, body);
                scan_block(table, otherwise);
            }

            Statement::Loop { body } => scan_block(table, body),
            Statement::Break(_) | Statement::Comment(_) => (),
        }
    }
}

fn scan_expr(table: &mut SymbolTable, expr: &Expr) {
    match expr {
        Expr::Integer(_) => (),
        Expr::Read(name) => table.decide(name, Role::Input),
        Expr::Negate(operand) => scan_expr(table, operand.val()),
        Expr::Binary(lhs, _, rhs) => {
            scan_expr(table, lhs.val());
            scan_expr(table, rhs.val());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    fn classify(text: &str) -> SymbolTable {
        let (start, stream) = source::consume(text.as_bytes(), "test.fcl");
        let tokens = Lexer::new(start.clone(), stream).try_exhaustive().unwrap();
        parse::parse(tokens.iter(), start).unwrap().classify()
    }

    fn roles(table: &SymbolTable) -> Vec<(String, Role)> {
        table
            .iter()
            .map(|symbol| (symbol.name().to_string(), symbol.role()))
            .collect()
    }

    fn entry(name: &str, role: Role) -> (String, Role) {
        (name.to_string(), role)
    }

    #[test]
    fn reads_before_writes_are_inputs() {
        let table = classify("x = i + j;");
        assert_eq!(
            roles(&table),
            vec![
                entry("x", Role::Local),
                entry("i", Role::Input),
                entry("j", Role::Input),
            ]
        );
    }

    #[test]
    fn target_precedes_its_own_value() {
        let table = classify("x = x + 1;");
        assert_eq!(roles(&table), vec![entry("x", Role::Local)]);
    }

    #[test]
    fn later_writes_do_not_reclassify() {
        let table = classify("y = x; x = 1; x = x + y;");
        assert_eq!(table.get("x").unwrap().role(), Role::Input);
        assert_eq!(table.get("y").unwrap().role(), Role::Local);
    }

    #[test]
    fn conditions_and_branches_in_textual_order() {
        let table = classify(
            "loop {\n\
                 if (n == 0) { break; } else { r = r + n; }\n\
                 n = n - 1;\n\
             }",
        );

        assert_eq!(
            roles(&table),
            vec![entry("n", Role::Input), entry("r", Role::Local)]
        );
    }

    #[test]
    fn every_name_has_exactly_one_role() {
        let table = classify("a = b; if (c < a) { d = -e * a; } loop { break; } f = d % g;");

        let names: Vec<_> = table.iter().map(|symbol| symbol.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e", "f", "g"]);

        let inputs = table.with_role(Role::Input).count();
        let locals = table.with_role(Role::Local).count();
        assert_eq!(inputs + locals, table.len());

        for (order, symbol) in table.iter().enumerate() {
            assert_eq!(symbol.order(), order);
        }
    }

    #[test]
    fn unknown_names_are_unbound() {
        let table = classify("a = 1;");
        let (start, _) = source::consume("".as_bytes(), "test.fcl");

        let error = table.lookup(&Identifier::new("zz"), &start).unwrap_err();
        assert_eq!(error.val().to_string(), "Variable `zz` was never classified");
    }
}
