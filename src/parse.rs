//! Análisis sintáctico.
//!
//! Descenso recursivo con una producción por tipo de sentencia y
//! precedence climbing para expresiones. Los niveles de precedencia,
//! de menor a mayor, son: `||`, `&&`, igualdad, relacionales, aditivos,
//! multiplicativos, negación unaria y expresiones primarias. Todos los
//! operadores binarios asocian a la izquierda.
//!
//! # Anidamiento
//! Las fases posteriores recorren el AST recursivamente. Para que un
//! programa válido nunca agote la pila, tanto la altura de cada
//! expresión como el anidamiento de bloques, paréntesis y negaciones
//! se limitan a [`MAX_NESTING`] niveles; más allá se reporta
//! [`ParserError::TooDeep`].

use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

#[derive(Debug)]
pub struct Ast(Vec<Statement>);

impl Ast {
    pub fn statements(&self) -> &[Statement] {
        &self.0
    }
}

#[derive(Debug)]
pub enum Statement {
    Assignment {
        target: Located<Identifier>,
        value: Located<Expr>,
    },

    If {
        condition: Located<Expr>,
        body: Vec<Statement>,
        otherwise: Vec<Statement>,
    },

    Loop {
        body: Vec<Statement>,
    },

    Break(Location),

    Comment(Located<Rc<str>>),
}

#[derive(Debug)]
pub enum Expr {
    Integer(i32),
    Read(Identifier),
    Negate(Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Or,
    And,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let string = match self {
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            Or => "||",
            And => "&&",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
        };

        fmt.write_str(string)
    }
}

/// Límite de anidamiento de bloques y de altura de expresiones.
pub const MAX_NESTING: u32 = 256;

/// Cantidad de niveles de precedencia para operadores binarios.
const BINARY_LEVELS: usize = 6;

/// Operador binario que `token` denota en un nivel de precedencia dado.
///
/// El nivel 0 es el de menor precedencia.
fn binary_op(level: usize, token: &Token) -> Option<BinOp> {
    use Token::*;

    let op = match (level, token) {
        (0, Or) => BinOp::Or,
        (1, And) => BinOp::And,
        (2, Equal) => BinOp::Equal,
        (2, NotEqual) => BinOp::NotEqual,
        (3, Less) => BinOp::Less,
        (3, LessOrEqual) => BinOp::LessOrEqual,
        (3, Greater) => BinOp::Greater,
        (3, GreaterOrEqual) => BinOp::GreaterOrEqual,
        (4, Plus) => BinOp::Add,
        (4, Minus) => BinOp::Sub,
        (5, Times) => BinOp::Mul,
        (5, Slash) => BinOp::Div,
        (5, Percent) => BinOp::Mod,
        _ => return None,
    };

    Some(op)
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected token {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected token {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Expected any of `if`, `loop`, `break`, assignment or comment, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Only variables can be assigned to")]
    NotAssignable,

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("Unmatched `}}`")]
    UnmatchedClose,

    #[error("Abrupt end of program")]
    UnexpectedEof,

    #[error("Nesting exceeds the limit of {0} levels")]
    TooDeep(u32),
}

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Construye un AST a partir de un flujo de tokens.
///
/// `start` es la ubicación que se reporta en caso de que el
/// programa termine antes de encontrar un primer token.
pub fn parse<'a, I>(tokens: I, start: Location) -> Parse<Ast>
where
    I: Iterator<Item = &'a Located<Token>>,
{
    let mut parser = Parser {
        tokens: tokens.peekable(),
        last_known: start,
        loop_depth: 0,
        depth: 0,
    };

    let ast = parser.program()?;
    debug!(statements = ast.0.len(), "syntax analysis finished");

    Ok(ast)
}

struct Parser<'a, I: Iterator<Item = &'a Located<Token>>> {
    tokens: Peekable<I>,
    last_known: Location,
    loop_depth: u32,
    depth: u32,
}

/// Expresión junto a la altura de su árbol.
struct Nested {
    expr: Located<Expr>,
    height: u32,
}

impl<'a, I: Iterator<Item = &'a Located<Token>>> Parser<'a, I> {
    fn program(&mut self) -> Parse<Ast> {
        let mut statements = Vec::new();
        while let Some(token) = self.tokens.peek() {
            if let Token::CloseCurly = token.val() {
                self.next()?;
                return self.fail(ParserError::UnmatchedClose);
            }

            statements.push(self.statement()?);
        }

        Ok(Ast(statements))
    }

    fn statement_block(&mut self) -> Parse<Vec<Statement>> {
        self.expect(Token::OpenCurly)?;
        self.enter(Self::block_contents)
    }

    fn block_contents(&mut self) -> Parse<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Some(Token::CloseCurly) => {
                    self.next()?;
                    break Ok(statements);
                }

                Some(_) => statements.push(self.statement()?),
                None => break self.fail(ParserError::MissingToken(Token::CloseCurly)),
            }
        }
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.peek() {
            Some(Token::Keyword(Keyword::If)) => self.if_statement(),
            Some(Token::Keyword(Keyword::Loop)) => self.loop_statement(),
            Some(Token::Keyword(Keyword::Break)) => self.break_statement(),
            Some(Token::Id(_)) => self.assignment(),

            Some(Token::Comment(_)) => {
                let (location, token) = self.next()?.split();
                match token {
                    Token::Comment(text) => Ok(Statement::Comment(Located::at(text, location))),
                    _ => unreachable!(),
                }
            }

            // Algo que parece una expresión en posición de sentencia solo
            // puede ser un intento de asignar a algo que no es una variable
            Some(Token::IntLiteral(_)) | Some(Token::OpenParen) | Some(Token::Minus) => {
                let expr = self.expr()?;
                match self.peek() {
                    Some(Token::Assign) => Err(Located::at(
                        ParserError::NotAssignable,
                        expr.location().clone(),
                    )),

                    _ => self.next_and_fail(ParserError::ExpectedStatement),
                }
            }

            _ => self.next_and_fail(ParserError::ExpectedStatement),
        }
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::If)?;

        self.expect(Token::OpenParen)?;
        let condition = self.expr()?;
        self.expect(Token::CloseParen)?;

        let body = self.statement_block()?;
        let otherwise = match self.peek() {
            Some(Token::Keyword(Keyword::Else)) => {
                self.next()?;
                self.statement_block()?
            }

            _ => Vec::new(),
        };

        Ok(Statement::If {
            condition,
            body,
            otherwise,
        })
    }

    fn loop_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Loop)?;

        self.loop_depth += 1;
        let body = self.statement_block();
        self.loop_depth -= 1;

        Ok(Statement::Loop { body: body? })
    }

    fn break_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Break)?;
        let location = self.last_known.clone();

        if self.loop_depth == 0 {
            return self.fail(ParserError::BreakOutsideLoop);
        }

        self.expect(Token::Semicolon)?;
        Ok(Statement::Break(location))
    }

    fn assignment(&mut self) -> Parse<Statement> {
        let target = self.id()?;
        self.expect(Token::Assign)?;
        let value = self.expr()?;
        self.expect(Token::Semicolon)?;

        Ok(Statement::Assignment { target, value })
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        Ok(self.binary(0)?.expr)
    }

    fn binary(&mut self, level: usize) -> Parse<Nested> {
        if level == BINARY_LEVELS {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        loop {
            let op = match self.peek().and_then(|token| binary_op(level, token)) {
                Some(op) => op,
                None => break Ok(lhs),
            };

            self.next()?;
            let rhs = self.binary(level + 1)?;

            let height = lhs.height.max(rhs.height) + 1;
            let location = Location::span(lhs.expr.location().clone(), rhs.expr.location());
            let expr = Expr::Binary(Box::new(lhs.expr), op, Box::new(rhs.expr));

            lhs = self.nested(Located::at(expr, location), height)?;
        }
    }

    fn unary(&mut self) -> Parse<Nested> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next()?;
                let start = self.last_known.clone();

                let operand = self.enter(Self::unary)?;
                let location = Location::span(start, operand.expr.location());
                let expr = Expr::Negate(Box::new(operand.expr));

                self.nested(Located::at(expr, location), operand.height + 1)
            }

            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Parse<Nested> {
        let (location, token) = self.next()?.split();
        match token {
            Token::IntLiteral(integer) => self.nested(Located::at(Expr::Integer(integer), location), 1),
            Token::Id(id) => self.nested(Located::at(Expr::Read(id), location), 1),

            Token::OpenParen => {
                let inner = self.enter(|parser| parser.binary(0))?;
                self.expect(Token::CloseParen)?;

                let location = Location::span(location, &self.last_known);
                self.nested(Located::at(inner.expr.into_inner(), location), inner.height)
            }

            found => self.fail(ParserError::ExpectedExpr(found)),
        }
    }

    /// Ejecuta una producción un nivel de anidamiento más abajo.
    fn enter<T, F>(&mut self, production: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        if self.depth >= MAX_NESTING {
            return self.fail(ParserError::TooDeep(MAX_NESTING));
        }

        self.depth += 1;
        let result = production(self);
        self.depth -= 1;

        result
    }

    fn nested(&self, expr: Located<Expr>, height: u32) -> Parse<Nested> {
        if height > MAX_NESTING {
            let location = expr.location().clone();
            return Err(Located::at(ParserError::TooDeep(MAX_NESTING), location));
        }

        Ok(Nested { expr, height })
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.tokens.peek() {
            Some(_) => {
                let found = self.next()?.into_inner();
                if found == token {
                    Ok(())
                } else {
                    self.fail(ParserError::UnexpectedToken(token, found))
                }
            }

            None => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(|token| token.val())
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn next_and_fail<T, F>(&mut self, error: F) -> Parse<T>
    where
        F: FnOnce(Token) -> ParserError,
    {
        let found = self.next()?.into_inner();
        self.fail(error(found))
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_known.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    fn parse_str(text: &str) -> Parse<Ast> {
        let (start, stream) = source::consume(text.as_bytes(), "test.fcl");
        let tokens = Lexer::new(start.clone(), stream).try_exhaustive().unwrap();
        parse(tokens.iter(), start)
    }

    fn error(text: &str) -> String {
        parse_str(text).unwrap_err().val().to_string()
    }

    /// Forma completamente parentizada de una expresión.
    fn show(expr: &Expr) -> String {
        match expr {
            Expr::Integer(value) => value.to_string(),
            Expr::Read(id) => id.to_string(),
            Expr::Negate(operand) => format!("(-{})", show(operand.val())),
            Expr::Binary(lhs, op, rhs) => format!(
                "({} {} {})",
                show(lhs.val()),
                op,
                show(rhs.val())
            ),
        }
    }

    fn value_of(text: &str) -> String {
        let ast = parse_str(text).unwrap();
        match &ast.statements()[0] {
            Statement::Assignment { value, .. } => show(value.val()),
            other => panic!("not an assignment: {:?}", other),
        }
    }

    #[test]
    fn precedence_levels() {
        assert_eq!(
            value_of("x = a || b && c == d < e + f * -g;"),
            "(a || (b && (c == (d < (e + (f * (-g)))))))"
        );
    }

    #[test]
    fn left_associativity() {
        assert_eq!(value_of("x = a - b - c;"), "((a - b) - c)");
        assert_eq!(value_of("x = a / b % c * d;"), "(((a / b) % c) * d)");
        assert_eq!(value_of("x = a == b != c;"), "((a == b) != c)");
    }

    #[test]
    fn parentheses_and_nested_negation() {
        assert_eq!(value_of("x = -(a + 1) * --2;"), "((-(a + 1)) * (-(-2)))");
    }

    #[test]
    fn control_flow_structure() {
        let ast = parse_str(
            "// header\n\
             loop {\n\
                 if (x <= 0) { break; } else { x = x - 1; }\n\
                 if (y) { }\n\
             }",
        )
        .unwrap();

        let statements = ast.statements();
        assert!(matches!(&statements[0], Statement::Comment(text) if &**text.val() == "header"));

        let body = match &statements[1] {
            Statement::Loop { body } => body,
            other => panic!("expected loop, got {:?}", other),
        };

        match &body[0] {
            Statement::If {
                body, otherwise, ..
            } => {
                assert!(matches!(body.as_slice(), [Statement::Break(_)]));
                assert_eq!(otherwise.len(), 1);
            }

            other => panic!("expected if, got {:?}", other),
        }

        assert!(matches!(
            &body[1],
            Statement::If { body, otherwise, .. } if body.is_empty() && otherwise.is_empty()
        ));
    }

    #[test]
    fn break_outside_loop() {
        assert_eq!(error("if (x) { break; }"), "`break` outside of a loop");
        assert!(parse_str("loop { if (x) { if (y) { break; } } }").is_ok());
    }

    #[test]
    fn assignment_to_non_variable() {
        assert_eq!(error("3 = x;"), "Only variables can be assigned to");
        assert_eq!(error("(a) = 1;"), "Only variables can be assigned to");
    }

    #[test]
    fn unmatched_delimiters() {
        assert_eq!(
            error("loop { x = 1;"),
            "Expected token `}`, none was found instead"
        );
        assert_eq!(error("x = 1; }"), "Unmatched `}`");
        assert_eq!(
            error("if (x { }"),
            "Expected token `)`, found `{` instead"
        );
    }

    #[test]
    fn comment_inside_statement() {
        assert_eq!(
            error("x = 1 +\n// nope\n2;"),
            "Expected an expression, found comment instead"
        );
    }

    fn chain(terms: usize) -> String {
        format!("x = {};", vec!["a"; terms].join(" + "))
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let limit = MAX_NESTING as usize;
        assert_eq!(
            value_of(&chain(limit)).matches('+').count(),
            limit - 1
        );

        let too_deep = "Nesting exceeds the limit of 256 levels";
        assert_eq!(error(&chain(limit + 1)), too_deep);
        assert_eq!(error(&chain(20_001)), too_deep);
    }

    #[test]
    fn repeated_negation_is_bounded() {
        let negations = |count| format!("x = {}a;", "- ".repeat(count));

        assert!(parse_str(&negations(200)).is_ok());
        assert_eq!(
            error(&negations(20_000)),
            "Nesting exceeds the limit of 256 levels"
        );
    }

    #[test]
    fn parentheses_and_blocks_are_bounded() {
        let parens = |count| format!("x = {}a{};", "(".repeat(count), ")".repeat(count));
        assert_eq!(value_of(&parens(200)), "a");
        assert_eq!(
            error(&parens(20_000)),
            "Nesting exceeds the limit of 256 levels"
        );

        let blocks = |count| format!("{}x = 1;{}", "loop { ".repeat(count), " }".repeat(count));
        assert!(parse_str(&blocks(200)).is_ok());
        assert_eq!(
            error(&blocks(20_000)),
            "Nesting exceeds the limit of 256 levels"
        );
    }

    #[test]
    fn error_location_points_at_offending_token() {
        let error = parse_str("x = 1;\ny = * 2;").unwrap_err();
        assert_eq!(error.location().to_string(), "test.fcl:2:5");
    }
}
