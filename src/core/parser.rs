//! BSH Parser
//!
//! Input lines are split on whitespace only. A word is an operator iff it is
//! exactly one of `<`, `>`, `|` or `&`; `a>b` is a single ordinary word.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    RedirectIn,
    RedirectOut,
    Pipe,
    Background,
}

impl Operator {
    pub fn from_token(token: &str) -> Option<Operator> {
        match token {
            "<" => Some(Operator::RedirectIn),
            ">" => Some(Operator::RedirectOut),
            "|" => Some(Operator::Pipe),
            "&" => Some(Operator::Background),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::RedirectIn => "<",
            Operator::RedirectOut => ">",
            Operator::Pipe => "|",
            Operator::Background => "&",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index into the token list of the first occurrence of each operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperatorPositions {
    redirect_in: Option<usize>,
    redirect_out: Option<usize>,
    pipe: Option<usize>,
    background: Option<usize>,
}

impl OperatorPositions {
    pub fn get(&self, operator: Operator) -> Option<usize> {
        *self.slot(operator)
    }

    /// Returns the position of the earliest operator of any kind.
    pub fn first(&self) -> Option<usize> {
        [
            self.redirect_in,
            self.redirect_out,
            self.pipe,
            self.background,
        ]
        .iter()
        .filter_map(|p| *p)
        .min()
    }

    fn record(&mut self, operator: Operator, position: usize) {
        let slot = self.slot_mut(operator);
        if slot.is_none() {
            *slot = Some(position);
        }
    }

    fn slot(&self, operator: Operator) -> &Option<usize> {
        match operator {
            Operator::RedirectIn => &self.redirect_in,
            Operator::RedirectOut => &self.redirect_out,
            Operator::Pipe => &self.pipe,
            Operator::Background => &self.background,
        }
    }

    fn slot_mut(&mut self, operator: Operator) -> &mut Option<usize> {
        match operator {
            Operator::RedirectIn => &mut self.redirect_in,
            Operator::RedirectOut => &mut self.redirect_out,
            Operator::Pipe => &mut self.pipe,
            Operator::Background => &mut self.background,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    /// Command line, used for messages
    pub input: String,
    tokens: Vec<String>,
    arguments: Vec<String>,
    operators: OperatorPositions,
    display_text: String,
}

impl Command {
    /// Parse `input`. A blank line produces a command with no arguments,
    /// which callers treat as a no-op.
    pub fn parse(input: &str) -> Self {
        let tokens: Vec<String> = input.split_whitespace().map(String::from).collect();
        let mut operators = OperatorPositions::default();
        let mut arguments = Vec::with_capacity(tokens.len());
        for (position, token) in tokens.iter().enumerate() {
            match Operator::from_token(token) {
                Some(operator) => operators.record(operator, position),
                None => arguments.push(token.clone()),
            }
        }

        let trimmed = input.trim();
        let display_text = if tokens.last().map(String::as_str) == Some("&") {
            trimmed.trim_end_matches('&').trim_end()
        } else {
            trimmed
        };

        let command = Command {
            input: input.to_string(),
            display_text: display_text.to_string(),
            tokens,
            arguments,
            operators,
        };
        debug!("parsed Command: {:?}", command);
        command
    }

    /// Every non-operator token, in input order (redirect targets included).
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn operators(&self) -> &OperatorPositions {
        &self.operators
    }

    pub fn operator(&self, operator: Operator) -> Option<usize> {
        self.operators.get(operator)
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn is_background(&self) -> bool {
        self.operator(Operator::Background).is_some()
    }

    pub fn has_pipe(&self) -> bool {
        self.operator(Operator::Pipe).is_some()
    }

    /// The program and its arguments: the words before the first operator.
    pub fn argv(&self) -> &[String] {
        let end = self.operators.first().unwrap_or_else(|| self.tokens.len());
        &self.tokens[..end]
    }

    pub fn program(&self) -> Option<&str> {
        self.argv().first().map(String::as_str)
    }

    /// The segment after `|`, up to the next operator.
    pub fn pipe_argv(&self) -> Option<&[String]> {
        let start = self.operator(Operator::Pipe)? + 1;
        let end = self.tokens[start..]
            .iter()
            .position(|t| Operator::from_token(t).is_some())
            .map_or(self.tokens.len(), |offset| start + offset);
        Some(&self.tokens[start..end])
    }

    pub fn input_file(&self) -> Option<&str> {
        self.redirect_target(Operator::RedirectIn)
    }

    pub fn output_file(&self) -> Option<&str> {
        self.redirect_target(Operator::RedirectOut)
    }

    /// Text shown in job status lines: the input without a trailing `&`.
    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    fn redirect_target(&self, operator: Operator) -> Option<&str> {
        let position = self.operator(operator)?;
        self.tokens
            .get(position + 1)
            .map(String::as_str)
            .filter(|t| Operator::from_token(t).is_none())
    }
}
