use std::io::{self, BufRead, Write};

use calc_expr::evaluate_expression;
use log::debug;

pub const BANNER: &str = "Scientific Calculator (type 'quit' to exit)";
pub const PROMPT: &str = "calc> ";

/// Reads lines from `input` and writes results to `output` until a quit
/// command or the end of input.
///
/// Evaluation failures are written as `Error: <message>` lines and do not end
/// the loop; only I/O failures are returned.
pub fn run<R: BufRead, W: Write>(mut input: R, mut output: W) -> io::Result<()> {
    writeln!(output, "{BANNER}")?;
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            debug!("Leaving on {text:?}");
            return Ok(());
        }
        match evaluate_expression(text) {
            Ok(value) => writeln!(output, "{}", format_number(value))?,
            Err(error) => writeln!(output, "Error: {error}")?,
        }
    }
}

/// Renders a result the way the calculator prints it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        format!("{value:e}")
    } else {
        format!("{value}")
    }
}
