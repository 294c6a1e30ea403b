use fclc::{assemble, codegen, error::Diagnostics, lex::Lexer, parse, source};

fn main() {
    let stdin = std::io::stdin();
    let mut stdin = stdin.lock();

    let (start, stream) = source::consume(&mut stdin, "<stdin>");
    let lexer = Lexer::new(start.clone(), stream);

    let diagnostics = match lexer.try_exhaustive() {
        Err(errors) => Diagnostics::from(errors).kind("Lexical error"),

        Ok(tokens) => {
            print!("Tokens: {:#?}\n\n", tokens);

            match parse::parse(tokens.iter(), start) {
                Err(error) => Diagnostics::from(error).kind("Syntax error"),

                Ok(ast) => {
                    print!("Ast: {:#?}\n\n", ast);

                    let symbols = ast.classify();
                    for symbol in symbols.iter() {
                        println!("{:?} {}", symbol.role(), symbol.name());
                    }

                    println!();
                    match codegen::generate(&ast, &symbols) {
                        Err(error) => Diagnostics::from(error).kind("Semantic error"),

                        Ok(generated) => {
                            print!("{}", assemble::assemble("<stdin>", &symbols, generated));
                            Diagnostics::default()
                        }
                    }
                }
            }
        }
    };

    eprint!("{}", diagnostics);
}
