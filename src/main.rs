mod repl;

use std::io;
use std::process::ExitCode;

use calc_expr::evaluate_expression;
use clap::Parser;

#[derive(Parser)]
#[command(name = "calc", version, about = "Evaluate arithmetic expressions safely")]
struct Cli {
    #[arg(help = "Expression to evaluate; starts an interactive session when omitted")]
    expression: Option<String>,
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let Some(expression) = cli.expression.filter(|e| !e.trim().is_empty()) else {
        return match repl::run(io::stdin().lock(), io::stdout().lock()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("Error: {error}");
                ExitCode::FAILURE
            }
        };
    };

    match evaluate_expression(&expression) {
        Ok(value) => {
            println!("{}", repl::format_number(value));
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
