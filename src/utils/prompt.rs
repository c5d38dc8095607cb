//! Interactive yes/no confirmation.

use std::io::{self, BufRead, Write};

use anyhow::Result;

/// Asks a yes/no question until the answer is recognised.
///
/// `is_terminal` and `reader` are injected so tests can drive the loop
/// without blocking on real stdin. A non-interactive stdin or a closed
/// stream counts as "no".
pub fn confirm(
    question: &str,
    is_terminal: bool,
    reader: &mut (dyn BufRead + Send),
) -> Result<bool> {
    if !is_terminal {
        eprintln!("warning: stdin is not interactive, cannot ask: {question}");
        return Ok(false);
    }

    loop {
        print!("❓ {question} [y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes = reader.read_line(&mut input)?;
        if bytes == 0 {
            eprintln!("warning: stdin closed, treating as no");
            return Ok(false);
        }

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}
