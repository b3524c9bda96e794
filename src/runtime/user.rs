//! User interaction operations (line prompts).

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, IsTerminal, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
/// Free-standing so tests can exercise it without a RealRuntime.
pub(crate) fn prompt_with_io<R: BufRead, W: Write>(
    message: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>> {
    write!(output, "{} ", message)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }

    Ok(Some(line.trim().to_string()))
}

impl RealRuntime {
    pub(crate) fn prompt_impl(&self, message: &str) -> Result<Option<String>> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        prompt_with_io(message, &mut stdin_lock, &mut stdout)
    }

    pub(crate) fn is_interactive_impl(&self) -> bool {
        io::stdin().is_terminal()
    }
}
