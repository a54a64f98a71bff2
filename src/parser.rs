//! Turns one line of input into a [`CommandLine`]: an ordered sequence of
//! [`Pipeline`]s, each an ordered sequence of [`Command`] stages.
//!
//! Recognizes quoting and escapes exactly as the original word-tokenizer
//! did, plus the operators `|` (pipe), `&` (background marker, pipeline
//! terminator), `;` (pipeline sequencer), `<`, `>`, `>>` (redirection).
//! Variable expansion, command substitution, globbing, tilde expansion,
//! here-documents, and `&&`/`||` are not part of this grammar.

use crate::jobs::JobStatus;

/// One stage of a pipeline.
#[derive(Debug, Clone)]
pub struct Command {
    /// Non-empty; `argv[0]` is the program name.
    pub argv: Vec<String>,
    pub input_redirect: Option<String>,
    pub output_redirect: Option<String>,
    pub append: bool,
}

impl Command {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// A pipeline as parsed, before (and then during) launch. `jid`/`pgrp`
/// are filled in by the Pipeline Launcher once the job is created.
#[derive(Debug)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub bg_marker: bool,
    pub jid: Option<usize>,
    pub pgrp: Option<libc::pid_t>,
    pub status: Option<JobStatus>,
}

/// An ordered, possibly empty, sequence of pipelines parsed from one line.
pub type CommandLine = Vec<Pipeline>;

/// States for the character-level tokenizer.
enum State {
    Normal,
    InWord,
    InDoubleQuote,
    InSingleQuote,
}

/// A single lexical token: either a literal word or one of the shell
/// operators recognized outside quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Pipe,
    Background,
    Sequence,
    RedirIn,
    RedirOut,
    RedirAppend,
}

/// Tokenize a line into words and operators.
///
/// Quoting and backslash-escape rules match the original word tokenizer:
/// double quotes preserve whitespace and only escape `\`, `"`, `$`, `` ` ``;
/// single quotes are fully literal; an unquoted backslash escapes the next
/// character. The operator characters `|`, `&`, `;`, `<`, `>` are only
/// recognized outside quotes and outside an escape.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    macro_rules! flush_word {
        () => {
            if !current.is_empty() {
                tokens.push(Token::Word(std::mem::take(&mut current)));
            }
        };
    }

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            (State::Normal, ' ' | '\t') => {}
            (State::Normal | State::InWord, '"') => state = State::InDoubleQuote,
            (State::Normal | State::InWord, '\'') => state = State::InSingleQuote,
            (State::Normal | State::InWord, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                state = State::InWord;
            }
            (State::Normal | State::InWord, '|') => {
                flush_word!();
                tokens.push(Token::Pipe);
                state = State::Normal;
            }
            (State::Normal | State::InWord, '&') => {
                flush_word!();
                tokens.push(Token::Background);
                state = State::Normal;
            }
            (State::Normal | State::InWord, ';') => {
                flush_word!();
                tokens.push(Token::Sequence);
                state = State::Normal;
            }
            (State::Normal | State::InWord, '<') => {
                flush_word!();
                tokens.push(Token::RedirIn);
                state = State::Normal;
            }
            (State::Normal | State::InWord, '>') => {
                flush_word!();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::RedirAppend);
                } else {
                    tokens.push(Token::RedirOut);
                }
                state = State::Normal;
            }
            (State::Normal, c) => {
                current.push(c);
                state = State::InWord;
            }
            (State::InWord, ' ' | '\t') => {
                flush_word!();
                state = State::Normal;
            }
            (State::InWord, c) => current.push(c),

            (State::InDoubleQuote, '"') => state = State::InWord,
            (State::InDoubleQuote, '\\') => match chars.peek() {
                Some(&'"' | &'\\' | &'$' | &'`') => current.push(chars.next().unwrap()),
                _ => current.push('\\'),
            },
            (State::InDoubleQuote, c) => current.push(c),

            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => current.push(c),
        }
    }

    flush_word!();
    tokens
}

/// Build one pipeline stage's argument vector and redirections from a
/// slice of tokens already split on `|`. Returns `None` on malformed input
/// (a redirection operator with no following word, or no program name).
fn parse_stage(tokens: &[Token]) -> Option<Command> {
    let mut argv = Vec::new();
    let mut input_redirect = None;
    let mut output_redirect = None;
    let mut append = false;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token {
            Token::Word(w) => argv.push(w.clone()),
            Token::RedirIn => match iter.next() {
                Some(Token::Word(w)) => input_redirect = Some(w.clone()),
                _ => return None,
            },
            Token::RedirOut => match iter.next() {
                Some(Token::Word(w)) => {
                    output_redirect = Some(w.clone());
                    append = false;
                }
                _ => return None,
            },
            Token::RedirAppend => match iter.next() {
                Some(Token::Word(w)) => {
                    output_redirect = Some(w.clone());
                    append = true;
                }
                _ => return None,
            },
            Token::Pipe | Token::Background | Token::Sequence => return None,
        }
    }

    if argv.is_empty() {
        return None;
    }

    Some(Command {
        argv,
        input_redirect,
        output_redirect,
        append,
    })
}

/// Build one pipeline from the tokens between two `;` separators.
fn parse_pipeline(tokens: &[Token]) -> Option<Pipeline> {
    let mut tokens = tokens;
    let mut bg_marker = false;

    if tokens.last() == Some(&Token::Background) {
        bg_marker = true;
        tokens = &tokens[..tokens.len() - 1];
    }

    if tokens.is_empty() {
        return None;
    }

    let mut commands = Vec::new();
    for stage in tokens.split(|t| *t == Token::Pipe) {
        commands.push(parse_stage(stage)?);
    }

    Some(Pipeline {
        commands,
        bg_marker,
        jid: None,
        pgrp: None,
        status: None,
    })
}

/// Parse a full input line into a [`CommandLine`]. Returns `None` for an
/// empty line or malformed input — the caller should silently skip to the
/// next prompt in either case.
pub fn parse(input: &str) -> Option<CommandLine> {
    let tokens = tokenize(input);
    if tokens.is_empty() {
        return None;
    }

    let mut pipelines = Vec::new();
    for group in tokens.split(|t| *t == Token::Sequence) {
        if group.is_empty() {
            continue;
        }
        pipelines.push(parse_pipeline(group)?);
    }

    if pipelines.is_empty() {
        None
    } else {
        Some(pipelines)
    }
}
