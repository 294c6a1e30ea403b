//! Reporte de errores localizados.
//!
//! Todas las fases del compilador reportan errores como [`Located`].
//! Un [`Diagnostics`] agrupa los errores de una misma fase y los
//! presenta junto a la línea de código fuente donde ocurrieron:
//!
//! ```text
//! Syntax error: Expected token `)`, found `;` instead
//!  --> main.fcl:3:11
//!   |
//! 3 | x = (1 + 2;
//!   |           ^
//! ```

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error que conoce su ubicación. Solo lo implementa [`Located`].
pub trait LocatedError: sealed::Sealed {
    fn error(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn error(&self) -> &dyn Error {
        self.val()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

/// Conjunto de errores de una fase, listo para presentarse.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn LocatedError>>,
}

impl Diagnostics {
    /// Nombre de la fase, antecede a cada mensaje.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Mensajes de cada error, sin ubicación.
    pub fn messages(&self) -> impl Iterator<Item = String> + '_ {
        self.errors.iter().map(|error| error.error().to_string())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "Error",
            errors: Vec::new(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        vec![error].into()
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        Diagnostics {
            errors: errors
                .into_iter()
                .map(|error| Box::new(error) as Box<dyn LocatedError>)
                .collect(),

            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }

        for error in &self.errors {
            writeln!(fmt, "{}: {}", self.kind, error.error())?;
            snippet(fmt, error.location())?;
            writeln!(fmt)?;
        }

        match self.errors.len() {
            1 => writeln!(fmt, "Aborting due to previous error"),
            count => writeln!(fmt, "Aborting due to {} previous errors", count),
        }
    }
}

impl Debug for Diagnostics {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

/// Muestra las líneas de una ubicación y subraya su inicio.
fn snippet(fmt: &mut Formatter<'_>, location: &Location) -> fmt::Result {
    let (start, end) = (location.start(), location.end());
    let last = end.line().max(start.line());
    let gutter = last.to_string().len();

    writeln!(fmt, " --> {}", location)?;
    writeln!(fmt, "{:gutter$} |", "", gutter = gutter)?;

    for number in start.line()..=last {
        location.source().with_line(number, |line| {
            writeln!(fmt, "{:>gutter$} | {}", number, line, gutter = gutter)
        })?;
    }

    // Un rango que continúa en otra línea solo se marca en su primera columna
    let width = if end.line() == start.line() {
        end.column().saturating_sub(start.column()).max(1)
    } else {
        1
    };

    writeln!(
        fmt,
        "{:gutter$} | {:skip$}{:^<width$}",
        "",
        "",
        "",
        gutter = gutter,
        skip = start.column().saturating_sub(1) as usize,
        width = width as usize
    )
}
