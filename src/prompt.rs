//! Operator input: one prompted line at a time.
//!
//! Prompting is order-dependent global state on a real terminal, so the
//! workflow only ever sees the [`InputProvider`] trait. The typed readers
//! below turn raw lines into the values each stage needs.

use std::fmt::Display;
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

use crate::payload::PoolSecret;

/// Case-insensitive token that ends the session generation loop.
pub const EXIT_SENTINEL: &str = "exit";
/// Token that ends secret entry when typed as a name or a value.
pub const SECRET_SENTINEL: &str = "`";

/// Errors raised while talking to the operator.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InputError {
    /// Raised when a numeric prompt receives non-numeric text.
    #[error("invalid {field} entered: '{input}' is not a valid number")]
    InvalidNumber {
        /// Value being prompted for.
        field: &'static str,
        /// Text the operator typed.
        input: String,
    },
    /// Raised when a number falls outside the accepted range.
    #[error("invalid {field} entered: {input} is outside {min}..={max}")]
    OutOfRange {
        /// Value being prompted for.
        field: &'static str,
        /// Text the operator typed.
        input: String,
        /// Smallest accepted value.
        min: u16,
        /// Largest accepted value.
        max: u16,
    },
    /// Raised when input ends while a value is still required.
    #[error("input ended while waiting for {field}")]
    EndOfInput {
        /// Value being prompted for.
        field: &'static str,
    },
    /// Raised when the console cannot be read or written.
    #[error("console I/O failed: {0}")]
    Console(String),
}

impl From<io::Error> for InputError {
    fn from(value: io::Error) -> Self {
        Self::Console(value.to_string())
    }
}

/// Source of operator text.
pub trait InputProvider {
    /// Shows `prompt` and returns the next line without its terminator, or
    /// `None` once input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Console`] when the underlying stream fails.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, InputError>;
}

/// Interactive input that writes prompts to `writer` and reads `reader`.
#[derive(Debug)]
pub struct ConsoleInput<R, W> {
    reader: R,
    writer: W,
}

impl ConsoleInput<StdinLock<'static>, Stdout> {
    /// Prompts on stdout and reads stdin.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleInput<R, W> {
    /// Wraps an arbitrary reader and writer.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> InputProvider for ConsoleInput<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, InputError> {
        write!(self.writer, "{prompt}")?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }
}

/// Reads a required line of text, trimmed.
///
/// # Errors
///
/// Returns [`InputError::EndOfInput`] when input is exhausted.
pub fn read_text(
    input: &mut impl InputProvider,
    prompt: &str,
    field: &'static str,
) -> Result<String, InputError> {
    input
        .read_line(prompt)?
        .map(|line| line.trim().to_owned())
        .ok_or(InputError::EndOfInput { field })
}

/// Parses operator text as a number.
///
/// # Errors
///
/// Returns [`InputError::InvalidNumber`] when `raw` does not parse.
pub fn parse_number<N: FromStr>(raw: &str, field: &'static str) -> Result<N, InputError> {
    raw.trim().parse().map_err(|_| InputError::InvalidNumber {
        field,
        input: raw.to_owned(),
    })
}

/// Reads a required number.
///
/// # Errors
///
/// Returns [`InputError::EndOfInput`] or [`InputError::InvalidNumber`].
pub fn read_number<N: FromStr>(
    input: &mut impl InputProvider,
    prompt: &str,
    field: &'static str,
) -> Result<N, InputError> {
    let raw = read_text(input, prompt, field)?;
    parse_number(&raw, field)
}

/// Reads a number and checks it against `range`.
///
/// # Errors
///
/// Returns [`InputError::OutOfRange`] in addition to the errors of
/// [`read_number`].
pub fn read_bounded(
    input: &mut impl InputProvider,
    prompt: &str,
    field: &'static str,
    range: RangeInclusive<u16>,
) -> Result<u16, InputError> {
    let raw = read_text(input, prompt, field)?;
    let value: u16 = parse_number(&raw, field).map_err(|err| widen_overflow(err, &range))?;
    if range.contains(&value) {
        return Ok(value);
    }
    Err(out_of_range(field, raw, &range))
}

// Digits that overflow `u16` are still numbers, just too large.
fn widen_overflow(err: InputError, range: &RangeInclusive<u16>) -> InputError {
    match err {
        InputError::InvalidNumber { field, input }
            if input.trim().parse::<u64>().is_ok() =>
        {
            out_of_range(field, input, range)
        }
        other => other,
    }
}

fn out_of_range(field: &'static str, input: String, range: &RangeInclusive<u16>) -> InputError {
    InputError::OutOfRange {
        field,
        input,
        min: *range.start(),
        max: *range.end(),
    }
}

/// Reads name/value secret pairs until [`SECRET_SENTINEL`] is typed for
/// either half or input ends. A pair cut short by the sentinel is dropped.
///
/// # Errors
///
/// Returns [`InputError::Console`] when the underlying stream fails.
pub fn read_secrets(input: &mut impl InputProvider) -> Result<Vec<PoolSecret>, InputError> {
    let mut secrets = Vec::new();
    loop {
        let ordinal = secrets.len() + 1;
        let Some(name) = read_until_sentinel(input, "name", ordinal)? else {
            break;
        };
        let Some(value) = read_until_sentinel(input, "value", ordinal)? else {
            break;
        };
        secrets.push(PoolSecret::new(name, value));
    }
    Ok(secrets)
}

fn read_until_sentinel(
    input: &mut impl InputProvider,
    half: impl Display,
    ordinal: usize,
) -> Result<Option<String>, InputError> {
    let prompt = format!("Enter {half} for secret {ordinal} (or {SECRET_SENTINEL} to quit): ");
    Ok(input
        .read_line(&prompt)?
        .filter(|line| line.trim() != SECRET_SENTINEL))
}

/// Returns `true` when `raw` is the loop exit sentinel, in any case.
#[must_use]
pub fn is_exit_sentinel(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;
    use crate::test_support::ScriptedInput;

    #[test]
    fn console_input_writes_prompt_and_strips_terminator() {
        let mut written = Vec::new();
        let mut console = ConsoleInput::new(Cursor::new("westus\r\nnext\n"), &mut written);

        let first = console.read_line("Location: ");
        let second = console.read_line("Again: ");
        let third = console.read_line("Done? ");

        assert_eq!(first, Ok(Some(String::from("westus"))));
        assert_eq!(second, Ok(Some(String::from("next"))));
        assert_eq!(third, Ok(None));
        drop(console);
        assert_eq!(String::from_utf8_lossy(&written), "Location: Again: Done? ");
    }

    #[rstest]
    #[case("42", Ok(42))]
    #[case(" 7 ", Ok(7))]
    #[case("seven", Err(()))]
    #[case("", Err(()))]
    #[case("-1", Err(()))]
    fn parse_number_accepts_only_digits(#[case] raw: &str, #[case] expected: Result<u32, ()>) {
        let parsed = parse_number::<u32>(raw, "count").map_err(|_| ());
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("1", Ok(1))]
    #[case("1000", Ok(1000))]
    #[case("0", Err("outside"))]
    #[case("1001", Err("outside"))]
    #[case("99999999", Err("outside"))]
    #[case("lots", Err("not a valid number"))]
    fn bounded_reads_enforce_range(#[case] raw: &str, #[case] expected: Result<u16, &str>) {
        let mut input = ScriptedInput::new([raw]);
        let result = read_bounded(&mut input, "max: ", "max concurrent sessions", 1..=1000);
        match (result, expected) {
            (Ok(actual), Ok(wanted)) => assert_eq!(actual, wanted),
            (Err(err), Err(fragment)) => {
                assert!(err.to_string().contains(fragment), "{err}");
            }
            (other, wanted) => panic!("expected {wanted:?}, got {other:?}"),
        }
    }

    #[test]
    fn secrets_are_collected_in_order_until_sentinel() {
        let mut input = ScriptedInput::new(["a", "1", "b", "2", "`"]);

        let secrets = read_secrets(&mut input).unwrap_or_else(|err| panic!("secrets: {err}"));

        assert_eq!(
            secrets,
            vec![PoolSecret::new("a", "1"), PoolSecret::new("b", "2")]
        );
        assert_eq!(
            input.prompts().last().map(String::as_str),
            Some("Enter name for secret 3 (or ` to quit): ")
        );
    }

    #[test]
    fn sentinel_as_value_drops_the_pending_pair() {
        let mut input = ScriptedInput::new(["a", "`", "never-read"]);

        let secrets = read_secrets(&mut input).unwrap_or_else(|err| panic!("secrets: {err}"));

        assert!(secrets.is_empty());
        assert_eq!(input.remaining(), 1);
    }

    #[test]
    fn secrets_end_with_input() {
        let mut input = ScriptedInput::new(["only-name"]);
        let secrets = read_secrets(&mut input).unwrap_or_else(|err| panic!("secrets: {err}"));
        assert!(secrets.is_empty());
    }

    #[rstest]
    #[case("exit", true)]
    #[case("EXIT", true)]
    #[case(" Exit ", true)]
    #[case("exits", false)]
    #[case("3", false)]
    fn exit_sentinel_ignores_case(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_exit_sentinel(raw), expected);
    }

    #[test]
    fn read_text_reports_end_of_input() {
        let mut input = ScriptedInput::new(Vec::<String>::new());
        assert_eq!(
            read_text(&mut input, "Subscription: ", "subscription"),
            Err(InputError::EndOfInput {
                field: "subscription"
            })
        );
    }
}
