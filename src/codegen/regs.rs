use crate::ir::Register;

/// Reserva de registros virtuales.
///
/// Un registro corresponde exactamente a una profundidad de evaluación,
/// por lo cual no existe lista de registros libres: el registro de
/// profundidad `d` se reutiliza en cada expresión que llega a esa
/// profundidad, y nunca dentro de una misma evaluación. No se intenta
/// minimizar la cantidad de registros.
#[derive(Default)]
pub struct Registers {
    used: u32,
}

impl Registers {
    /// Registro correspondiente a una profundidad.
    pub fn at(&mut self, depth: u32) -> Register {
        self.used = self.used.max(depth + 1);
        Register(depth)
    }

    /// Cantidad de registros distintos que se han utilizado.
    pub fn used(&self) -> u32 {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_water_mark() {
        let mut regs = Registers::default();
        assert_eq!(regs.used(), 0);

        assert_eq!(regs.at(2), Register(2));
        assert_eq!(regs.at(0), Register(0));
        assert_eq!(regs.used(), 3);
    }
}
