//! Interactive collection of placeholder values.

use crate::error::{Result, RunnerError};
use std::io::{BufRead, Write};

/// Source of placeholder values.
pub trait Prompter {
    /// Asks for the value of the placeholder `name` (without the `&` marker).
    fn ask(&mut self, name: &str) -> Result<String>;
}

/// Prompts on a writer and reads one line per value from a reader.
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consumes the prompter, returning the underlying writer.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl ConsolePrompter<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompter bound to the process' stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn ask(&mut self, name: &str) -> Result<String> {
        write!(self.output, "Ingrese el valor para {name}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(RunnerError::unexpected(format!(
                "Input closed while reading a value for '{name}'"
            )));
        }

        // Only the line terminator goes; surrounding spaces belong to the value.
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}
