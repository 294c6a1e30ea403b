//! Ubicaciones en el código fuente.
//!
//! Cada fase del compilador conserva de dónde proviene lo que produce:
//! tokens, nodos del AST y errores llevan una [`Location`], que es un
//! rango de posiciones línea-columna dentro de un [`Source`].
//!
//! El texto se lee línea por línea a partir de cualquier [`BufRead`].
//! Las líneas ya leídas se conservan en el [`Source`] para que los
//! diagnósticos puedan mostrarlas más adelante.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un flujo de entrada, carácter por carácter.
///
/// Cada carácter viene acompañado de la ubicación del carácter que
/// le sigue, que es donde queda el lexer tras consumirlo.
pub trait InputStream: Iterator<Item = io::Result<(char, Location)>> {}

impl<I> InputStream for I where I: Iterator<Item = io::Result<(char, Location)>> {}

/// Un valor junto a la ubicación de la cual proviene.
#[derive(Debug, Clone)]
pub struct Located<T> {
    value: T,
    location: Location,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        let Located { value, location } = self;
        (location, value)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Rango semiabierto `[start, end)` dentro de un origen.
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    start: Position,
    end: Position,
}

impl Location {
    /// Rango desde el inicio de `from` hasta el final de `to`.
    ///
    /// Ambas ubicaciones deben provenir del mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            end: to.end,
            ..from
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn single(source: Rc<Source>, at: Position) -> Self {
        Location {
            source,
            start: at,
            end: at.right(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let (start, end) = (self.start, self.end);
        let name = self.source.name();

        if start.line != end.line || end.column <= start.column + 1 {
            write!(fmt, "{}:{}", name, start)
        } else {
            write!(fmt, "{}:[{}-{}]", name, start, end.left())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

/// Posición línea-columna, ambas a partir de 1.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Posición que ocupa lo que sigue a `c` si `c` se encuentra aquí.
    fn after(self, c: char) -> Position {
        match c {
            '\n' => Position {
                line: self.line + 1,
                column: 1,
            },

            '\t' => Position {
                column: 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP,
                ..self
            },

            _ => self.right(),
        }
    }

    fn right(self) -> Position {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    fn left(self) -> Position {
        Position {
            column: self.column.saturating_sub(1).max(1),
            ..self
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}:{}", self.line, self.column)
    }
}

impl Debug for Position {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

/// Nombre de un origen y las líneas que se han leído de él.
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    /// Nombre del origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoca a `callback` con el contenido de una línea ya leída.
    ///
    /// Las líneas que todavía no se han leído, o que no existen,
    /// se presentan como vacías.
    pub fn with_line<F, R>(&self, line_number: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let lines = self.lines.borrow();
        let line = (line_number as usize)
            .checked_sub(1)
            .and_then(|index| lines.get(index))
            .map(String::as_str)
            .unwrap_or("");

        callback(line)
    }
}

/// Lector de caracteres sobre un [`BufRead`].
///
/// Toda línea, incluyendo la última, termina en `'\n'` sin importar
/// si el texto original usa `"\r\n"` o no tiene salto final.
pub struct Reader<R> {
    input: Option<R>,
    source: Rc<Source>,
    line: Vec<char>,
    cursor: usize,
    position: Position,
}

/// Comienza a leer un origen.
///
/// La ubicación retornada corresponde al primer carácter.
pub fn consume<R, S>(input: R, name: S) -> (Location, Reader<R>)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: RefCell::default(),
    });

    let start = Location::single(Rc::clone(&source), Position::default());
    let reader = Reader {
        input: Some(input),
        source,
        line: Vec::new(),
        cursor: 0,
        position: Position::default(),
    };

    (start, reader)
}

impl<R: BufRead> Reader<R> {
    /// Carga la siguiente línea. Retorna `false` al final de la entrada.
    fn refill(&mut self) -> io::Result<bool> {
        let input = match &mut self.input {
            Some(input) => input,
            None => return Ok(false),
        };

        let mut text = String::new();
        if input.read_line(&mut text)? == 0 {
            self.input = None;
            return Ok(false);
        }

        let text = text.strip_suffix('\n').unwrap_or(&text);
        let text = text.strip_suffix('\r').unwrap_or(text);

        self.line.clear();
        self.line.extend(text.chars());
        self.line.push('\n');
        self.cursor = 0;

        self.source.lines.borrow_mut().push(text.to_owned());
        Ok(true)
    }
}

impl<R: BufRead> Iterator for Reader<R> {
    type Item = io::Result<(char, Location)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor == self.line.len() {
            match self.refill() {
                Ok(true) => (),
                Ok(false) => return None,
                Err(error) => {
                    self.input = None;
                    return Some(Err(error));
                }
            }
        }

        let c = self.line[self.cursor];
        self.cursor += 1;
        self.position = self.position.after(c);

        let next = Location::single(Rc::clone(&self.source), self.position);
        Some(Ok((c, next)))
    }
}
