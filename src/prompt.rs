//! Line input for the interactive shell.
//!
//! Stdin is read by one long-lived thread that forwards lines over a
//! channel. A prompt that is cancelled (Ctrl-C, challenge timeout) leaves
//! the next typed line queued for whoever prompts next.

use crate::error::{CrawlError, Result};
use std::io::{self, BufRead, BufReader, Write};
use std::sync::OnceLock;
use tokio::sync::{mpsc, Mutex};

/// Lines from a blocking source, delivered asynchronously
pub struct LineReader {
    lines: mpsc::UnboundedReceiver<io::Result<String>>,
}

impl LineReader {
    /// Start a reader thread over `source`. The thread ends at end of input.
    pub fn spawn<R: BufRead + Send + 'static>(source: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || pump(source, tx));
        Self { lines: rx }
    }

    /// Print `prompt` and wait for the next trimmed line. `None` means the
    /// input was closed.
    ///
    /// Cancel safe: dropping the future never loses a line.
    pub async fn next_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        match self.lines.recv().await {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => Ok(None),
        }
    }
}

fn pump<R: BufRead>(mut source: R, tx: mpsc::UnboundedSender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        match source.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(Ok(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

static STDIN: OnceLock<Mutex<LineReader>> = OnceLock::new();

/// Print `prompt` and read one trimmed line from stdin. `None` means stdin
/// was closed.
pub async fn read_line(prompt: &str) -> Result<Option<String>> {
    let reader = STDIN.get_or_init(|| Mutex::new(LineReader::spawn(BufReader::new(io::stdin()))));
    reader.lock().await.next_line(prompt).await
}

/// Parse a zero-based index into a list of `len` items.
pub fn parse_index(input: &str, len: usize) -> Result<usize> {
    let index: usize = input
        .trim()
        .parse()
        .map_err(|_| CrawlError::Selection(format!("'{}' is not a number", input.trim())))?;
    if index >= len {
        return Err(CrawlError::Selection(format!(
            "{} is out of range (0-{})",
            index,
            len.saturating_sub(1)
        )));
    }
    Ok(index)
}

/// Parse an export count; 0 means everything.
pub fn parse_count(input: &str) -> Result<usize> {
    input
        .trim()
        .parse()
        .map_err(|_| CrawlError::Selection(format!("'{}' is not a count", input.trim())))
}

/// Answer to the per-page prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Continue,
    Quit,
    Export,
}

impl PageAction {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "q" | "quit" => PageAction::Quit,
            "e" | "export" => PageAction::Export,
            _ => PageAction::Continue,
        }
    }
}
