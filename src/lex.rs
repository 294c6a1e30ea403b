//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco se descartan durante esta operación. Cada token emitido está
//! asociado a una ubicación en el código fuente original, lo cual permite
//! rastrear errores en tanto los mismos como constructos más elevados de
//! fases posteriores.
//!
//! # Comentarios
//! A diferencia de la mayoría de lenguajes, en FCL un comentario es una
//! sentencia. Por tanto, los comentarios de línea (`// ...`) no se descartan
//! sino que se emiten como [`Token::Comment`] y llegan intactos hasta el
//! listado de instrucciones generado.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores y los comentarios sí
//! incluyen su texto original. Las constantes literales se resuelven a sus
//! valores en vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son case-insensitive, por lo cual tanto `loop` como
//!   `LOOP` y `Loop` resultan en [`Keyword::Loop`].
//! - Los identificadores sí distinguen mayúsculas de minúsculas.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::source::{InputStream, Located, Location};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;
use tracing::debug;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", INT_MAX)]
    IntOverflow,
}

/// Un identificador.
///
/// Es barato de clonar, ya que todas las apariciones de un mismo
/// nombre terminan compartiendo la tabla de símbolos y el IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// Comentario de línea, sin `//` y sin espacios en los extremos.
    Comment(Rc<str>),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `||`
    Or,

    /// `&&`
    And,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `%`
    Percent,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `{`
    OpenCurly,

    /// `)`
    CloseParen,

    /// `}`
    CloseCurly,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Comment(_) => fmt.write_str("comment"),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Or => fmt.write_str("`||`"),
            And => fmt.write_str("`&&`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Percent => fmt.write_str("`%`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseParen => fmt.write_str("`)`"),
            CloseCurly => fmt.write_str("`}`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    Loop,
    Break,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            If    => "if",
            Else  => "else",
            Loop  => "loop",
            Break => "break",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("if"),    If),
            (NoCase::new("else"),  Else),
            (NoCase::new("loop"),  Loop),
            (NoCase::new("break"), Break),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró un primer carácter que puede formar un operador
    /// de dos caracteres.
    ///
    /// Si sigue `second`, el token es `long`. De lo contrario, el
    /// token es `short`, o un error si `short` no existe.
    Pair {
        second: char,
        long: Token,
        short: Option<Token>,
    },

    /// Se encontró `/`, ya sea división o inicio de comentario.
    Division,

    /// Comentario de línea.
    ///
    /// Este estado emite el comentario al encontrar `'\n'`.
    LineComment(String),

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(i32),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            next,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    debug!(errors = errors.len(), "lexical analysis failed");
                    return Err(errors);
                }
            }
        }

        debug!(tokens = tokens.len(), "lexical analysis finished");
        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => break Err(error.into()),
                    _ => unreachable!(),
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('%')) => self.state = Complete(Percent),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('}')) => self.state = Complete(CloseCurly),
                (Start, Some('/')) => self.state = Division,

                // Operadores de uno o dos caracteres
                (Start, Some('=')) => self.state = pair('=', Equal, Some(Assign)),
                (Start, Some('!')) => self.state = pair('=', NotEqual, None),
                (Start, Some('<')) => self.state = pair('=', LessOrEqual, Some(Less)),
                (Start, Some('>')) => self.state = pair('=', GreaterOrEqual, Some(Greater)),
                (Start, Some('|')) => self.state = pair('|', Or, None),
                (Start, Some('&')) => self.state = pair('&', And, None),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume
                // el entero, ya que esta lógica ya está implementada
                // en el respectivo caso para un estado de constante
                // entera para el cual el siguiente carácter es un
                // dígito. Por tanto, la constante es inicialmente cero.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Plus)),

                (Pair { second, long, .. }, Some(c)) if c == *second => {
                    let long = std::mem::replace(long, Plus);
                    self.state = Complete(long);
                }

                (Pair { short, second, .. }, _) => match short.take() {
                    Some(short) => break Ok(short),
                    None => break Err(LexerError::Expected(*second)),
                },

                // `//` inicia un comentario, de lo contrario es división
                (Division, Some('/')) => self.state = LineComment(String::new()),
                (Division, _) => break Ok(Slash),

                // El comentario termina antes del fin de línea
                (LineComment(text), Some('\n')) | (LineComment(text), None) => {
                    break Ok(Comment(Rc::from(text.trim())))
                }

                (LineComment(text), Some(c)) => text.push(c),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit as i32 - '0' as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => {
                    word.push(c);
                }

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier(Rc::from(std::mem::take(word)))));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, next_position))) = self.source.next() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.next.clone())))
            }
        }
    }
}

fn pair(second: char, long: Token, short: Option<Token>) -> State {
    State::Pair {
        second,
        long,
        short,
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn tokens(text: &str) -> Vec<Token> {
        let (start, stream) = source::consume(text.as_bytes(), "test.fcl");
        Lexer::new(start, stream)
            .try_exhaustive()
            .unwrap()
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn errors(text: &str) -> Vec<String> {
        let (start, stream) = source::consume(text.as_bytes(), "test.fcl");
        Lexer::new(start, stream)
            .try_exhaustive()
            .unwrap_err()
            .into_iter()
            .map(|error| error.as_ref().to_string())
            .collect()
    }

    fn id(name: &str) -> Token {
        Token::Id(Identifier::new(name))
    }

    #[test]
    fn assignment() {
        use Token::*;

        assert_eq!(
            tokens("x = 12 + y_2;"),
            vec![id("x"), Assign, IntLiteral(12), Plus, id("y_2"), Semicolon]
        );
    }

    #[test]
    fn two_character_operators() {
        use Token::*;

        assert_eq!(
            tokens("a==b!=c<=d>=e<f>g||h&&i"),
            vec![
                id("a"),
                Equal,
                id("b"),
                NotEqual,
                id("c"),
                LessOrEqual,
                id("d"),
                GreaterOrEqual,
                id("e"),
                Less,
                id("f"),
                Greater,
                id("g"),
                Or,
                id("h"),
                And,
                id("i"),
            ]
        );
    }

    #[test]
    fn comments_are_tokens() {
        use Token::*;

        assert_eq!(
            tokens("a = b / 2; //  halve it \n// second"),
            vec![
                id("a"),
                Assign,
                id("b"),
                Slash,
                IntLiteral(2),
                Semicolon,
                Comment(Rc::from("halve it")),
                Comment(Rc::from("second")),
            ]
        );
    }

    #[test]
    fn keywords_ignore_case() {
        use Token::*;

        assert_eq!(
            tokens("IF Else loop BREAK Loopy"),
            vec![
                Keyword(super::Keyword::If),
                Keyword(super::Keyword::Else),
                Keyword(super::Keyword::Loop),
                Keyword(super::Keyword::Break),
                id("Loopy"),
            ]
        );
    }

    #[test]
    fn token_locations() {
        let (start, stream) = source::consume("x =\n  total;".as_bytes(), "test.fcl");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();

        assert_eq!(tokens[0].location().to_string(), "test.fcl:1:1");
        assert_eq!(tokens[2].location().to_string(), "test.fcl:[2:3-2:7]");
    }

    #[test]
    fn bad_characters_are_reported_per_line() {
        let errors = errors("a = 1 # 2;\nb = $;\nc = 3;");
        assert_eq!(
            errors,
            vec![
                "Bad character '#' in input stream",
                "Bad character '$' in input stream",
            ]
        );
    }

    #[test]
    fn lone_operator_halves() {
        assert_eq!(errors("a = !b;"), vec!["Expected '='"]);
        assert_eq!(errors("a = b | c;"), vec!["Expected '|'"]);
        assert_eq!(errors("a = b & c;"), vec!["Expected '&'"]);
    }

    #[test]
    fn integer_overflow() {
        assert_eq!(tokens("2147483647"), vec![Token::IntLiteral(i32::MAX)]);
        assert_eq!(
            errors("x = 2147483648;"),
            vec!["Integer literal overflow, valid range is [0, 2147483647]"]
        );
    }
}
