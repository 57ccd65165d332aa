use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::fmt::Display;
use std::io::{IsTerminal, Write as _};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::{stdin, stdout, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::task::spawn_blocking;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PromptError {
    #[error("error while talking to the terminal: {0:#}")]
    Io(#[from] std::io::Error),
    #[error("input was closed")]
    Closed,
}

type Result<T, E = PromptError> = std::result::Result<T, E>;

/// Ask questions on the terminal
pub type ConsolePrompt = Prompt<Stdin, Stdout>;

/// Line based questions, answers are read from the input one line at a time
pub struct Prompt<Read, Write> {
    input: BufReader<Read>,
    output: Write,
    mask_passwords: bool,
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        ConsolePrompt {
            input: BufReader::new(stdin()),
            output: stdout(),
            mask_passwords: std::io::stdin().is_terminal(),
        }
    }
}

impl<Read, Write> Prompt<Read, Write>
where
    Read: AsyncRead + Unpin + Send,
    Write: AsyncWrite + Unpin + Send,
{
    /// Create a prompt using the provided I/O
    ///
    /// Passwords are read as plain lines from the input.
    pub fn new(input: Read, output: Write) -> Self {
        Prompt {
            input: BufReader::new(input),
            output,
            mask_passwords: false,
        }
    }

    pub fn into_output(self) -> Write {
        self.output
    }

    /// Print a line of text
    pub async fn say(&mut self, message: &str) -> Result<()> {
        self.output.write_all(message.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn question(&mut self, question: &str) -> Result<()> {
        let line = format!("? {question} ");
        self.output.write_all(line.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut buff = String::with_capacity(16);
        if self.input.read_line(&mut buff).await? == 0 {
            return Err(PromptError::Closed);
        }
        buff.truncate(buff.trim_end_matches(['\r', '\n']).len());
        Ok(buff)
    }

    async fn ask(&mut self, question: &str) -> Result<String> {
        self.question(question).await?;
        self.read_line().await
    }

    /// Free text, an empty answer picks the default
    pub async fn input(&mut self, message: &str, default: &str) -> Result<String> {
        let answer = self.ask(&format!("{message} ({default})")).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(default.into())
        } else {
            Ok(answer.into())
        }
    }

    /// Pick one of the choices, returning its index
    pub async fn select<T: Display>(&mut self, message: &str, choices: &[T]) -> Result<usize> {
        self.list(choices).await?;
        loop {
            let answer = self.ask(&format!("{message} [1-{}]", choices.len())).await?;
            match answer.trim().parse::<usize>() {
                Ok(index) if (1..=choices.len()).contains(&index) => return Ok(index - 1),
                _ => {
                    self.say(&format!("Enter a number between 1 and {}", choices.len()))
                        .await?
                }
            }
        }
    }

    /// Pick any number of the choices, returning their indices in ascending order
    pub async fn multi_select<T: Display>(
        &mut self,
        message: &str,
        choices: &[T],
    ) -> Result<Vec<usize>> {
        if choices.is_empty() {
            self.say(&format!("{message}: nothing to choose from")).await?;
            return Ok(Vec::new());
        }
        self.list(choices).await?;
        loop {
            let answer = self
                .ask(&format!("{message} (numbers separated by commas, empty for none)"))
                .await?;
            match parse_selection(&answer, choices.len()) {
                Some(selection) => return Ok(selection),
                None => {
                    self.say(&format!(
                        "Enter numbers between 1 and {} separated by commas",
                        choices.len()
                    ))
                    .await?
                }
            }
        }
    }

    /// Yes or no, an empty answer picks the default
    pub async fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.ask(&format!("{message} ({hint})")).await?;
            match answer.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Answer y or n").await?,
            }
        }
    }

    /// Ask for a secret, the input is masked when reading from a terminal
    pub async fn password(&mut self, message: &str) -> Result<String> {
        self.question(message).await?;
        if !self.mask_passwords {
            return self.read_line().await;
        }
        let password = spawn_blocking(read_masked_line)
            .await
            .map_err(std::io::Error::other)??;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(password)
    }

    async fn list<T: Display>(&mut self, choices: &[T]) -> Result<()> {
        for (index, choice) in choices.iter().enumerate() {
            self.say(&format!("  {}) {choice}", index + 1)).await?;
        }
        Ok(())
    }
}

fn parse_selection(answer: &str, count: usize) -> Option<Vec<usize>> {
    let mut selection = answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<usize>() {
            Ok(index) if (1..=count).contains(&index) => Some(index - 1),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    selection.sort_unstable();
    selection.dedup();
    Some(selection)
}

fn read_masked_line() -> std::io::Result<String> {
    terminal::enable_raw_mode()?;
    let result = read_masked_keys();
    terminal::disable_raw_mode()?;
    result
}

fn read_masked_keys() -> std::io::Result<String> {
    let mut out = std::io::stdout();
    let mut password = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        else {
            continue;
        };
        match code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(std::io::ErrorKind::Interrupted.into());
            }
            KeyCode::Backspace => {
                if password.pop().is_some() {
                    out.write_all(b"\x08 \x08")?;
                }
            }
            KeyCode::Char(c) => {
                password.push(c);
                out.write_all(b"*")?;
            }
            _ => {}
        }
        out.flush()?;
    }
}
