/// Escribe una pseudo-instrucción de la forma `opcode(a, b, ...)`.
macro_rules! emit {
    ($fmt:expr, $opcode:expr, $first:expr $(, $rest:expr)*) => {{
        write!($fmt, "{}({}", $opcode, $first)?;
        $(write!($fmt, ", {}", $rest)?;)*
        $fmt.write_str(")")
    }};
}
