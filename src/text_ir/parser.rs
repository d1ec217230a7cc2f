//! Text IR parser implementation.

use std::collections::HashMap;

use super::ParseError;
use crate::core::error::BuildError;
use crate::ir::{BlockRef, FunctionBuilder, FunctionId, InstructionBuilder, UnitBuilder, ValueRef};

/// Operations that define a value.
const DEFINING_OPS: &[&str] = &["int", "getlocal", "getlexical", "function", "add", "lt", "call"];

pub fn parse_unit(text: &str) -> Result<UnitBuilder, ParseError> {
    Parser::new(text).parse()
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

struct Parser<'a> {
    /// Non-empty lines with comments stripped, paired with their 1-based number.
    lines: Vec<(usize, &'a str)>,
    unit: UnitBuilder,
    /// Function ids by name, known before any body is parsed so that
    /// `function NAME` may refer forward.
    functions: HashMap<&'a str, FunctionId>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| {
                let code = line.split(';').next().unwrap_or_default();
                (index + 1, code.trim())
            })
            .filter(|(_, line)| !line.is_empty())
            .collect();

        Self {
            lines,
            unit: UnitBuilder::new(),
            functions: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<UnitBuilder, ParseError> {
        self.collect_function_names()?;

        let mut pos = 0;
        while pos < self.lines.len() {
            let (line, text) = self.lines[pos];
            let name = function_header(text)
                .ok_or_else(|| syntax(line, format!("expected 'fn NAME {{' but found '{text}'")))?;

            let body_start = pos + 1;
            let body_len = self.lines[body_start..]
                .iter()
                .position(|(_, text)| *text == "}")
                .ok_or_else(|| {
                    syntax(line, format!("function {name} is missing its closing '}}'"))
                })?;
            let body = &self.lines[body_start..body_start + body_len];

            let function = self
                .unit
                .new_function(name)
                .map_err(|source| ParseError::Build { line, source })?;
            FunctionParser::new(function, &self.functions).parse(line, body)?;

            pos = body_start + body_len + 1;
        }

        Ok(self.unit)
    }

    fn collect_function_names(&mut self) -> Result<(), ParseError> {
        for &(line, text) in &self.lines {
            let Some(name) = function_header(text) else {
                continue;
            };
            let id = u16::try_from(self.functions.len()).map_err(|_| {
                ParseError::Build {
                    line,
                    source: BuildError::TooManyFunctions {
                        name: name.to_string(),
                    },
                }
            })?;
            if self.functions.insert(name, FunctionId(id)).is_some() {
                return Err(syntax(line, format!("duplicate function {name}")));
            }
        }
        Ok(())
    }
}

/// `fn NAME {` -> `NAME`
fn function_header(text: &str) -> Option<&str> {
    let name = text.strip_prefix("fn ")?.strip_suffix('{')?.trim();
    is_identifier(name).then_some(name)
}

/// `NAME:` -> `NAME`
fn label(text: &str) -> Option<&str> {
    let name = text.strip_suffix(':')?.trim();
    is_identifier(name).then_some(name)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
}

/// Parses the body of one function into its builder.
struct FunctionParser<'p, 'a> {
    function: &'p mut FunctionBuilder,
    functions: &'p HashMap<&'a str, FunctionId>,
    blocks: HashMap<&'a str, BlockRef>,
    values: HashMap<&'a str, ValueRef>,
}

impl<'p, 'a> FunctionParser<'p, 'a> {
    fn new(function: &'p mut FunctionBuilder, functions: &'p HashMap<&'a str, FunctionId>) -> Self {
        Self {
            function,
            functions,
            blocks: HashMap::new(),
            values: HashMap::new(),
        }
    }

    fn parse(mut self, header_line: usize, body: &[(usize, &'a str)]) -> Result<(), ParseError> {
        // Create every labelled block up front so branches may refer forward.
        // Creation order follows the labels, with `entry` always first.
        let entry = self.function.entry_block();
        for &(line, text) in body {
            let Some(name) = label(text) else {
                continue;
            };
            let block = if name == "entry" {
                entry
            } else {
                self.function.new_named_block(name)
            };
            if self.blocks.insert(name, block).is_some() {
                return Err(syntax(line, format!("duplicate label {name}")));
            }
        }
        self.function
            .set_current_block(entry)
            .map_err(|source| ParseError::Build {
                line: header_line,
                source,
            })?;

        for &(line, text) in body {
            match label(text) {
                Some(name) => {
                    let block = self.block(line, name)?;
                    self.function
                        .set_current_block(block)
                        .map_err(|source| ParseError::Build { line, source })?;
                }
                None => self.parse_instruction(line, text)?,
            }
        }
        Ok(())
    }

    fn parse_instruction(&mut self, line: usize, text: &'a str) -> Result<(), ParseError> {
        let at = move |source: BuildError| ParseError::Build { line, source };
        let mut cursor = LineCursor::new(line, text);

        let binding = if cursor.peek() == Some('%') {
            let name = cursor.read_value_name()?;
            cursor.expect('=')?;
            if self.values.contains_key(name) {
                return Err(syntax(line, format!("value %{name} is already defined")));
            }
            Some(name)
        } else {
            None
        };

        let op = cursor.read_identifier()?;
        if binding.is_some() && !DEFINING_OPS.contains(&op) {
            return Err(syntax(line, format!("'{op}' does not produce a value")));
        }

        let result = match op {
            "int" => {
                let value = cursor.read_integer()?;
                Some(self.function.build_make_integer(value).map_err(at)?)
            }
            "getlocal" => {
                let name = cursor.read_identifier()?;
                let index = self.function.get_local(name).map_err(at)?;
                Some(self.function.build_get_local(index).map_err(at)?)
            }
            "setlocal" => {
                let name = cursor.read_identifier()?;
                cursor.expect(',')?;
                let rval = self.read_operand(&mut cursor)?;
                let index = self.function.get_or_add_local(name).map_err(at)?;
                self.function.build_set_local(index, rval).map_err(at)?;
                None
            }
            "getlexical" => {
                let name = cursor.read_identifier()?;
                Some(self.function.build_get_local_lexical(name).map_err(at)?)
            }
            "setlexical" => {
                let name = cursor.read_identifier()?;
                cursor.expect(',')?;
                let rval = self.read_operand(&mut cursor)?;
                self.function.build_set_local_lexical(name, rval).map_err(at)?;
                None
            }
            "function" => {
                let name = cursor.read_identifier()?;
                let id = self.functions.get(name).copied().ok_or_else(|| {
                    at(BuildError::FunctionNotFound {
                        name: name.to_string(),
                    })
                })?;
                Some(self.function.build_make_function(id).map_err(at)?)
            }
            "add" | "lt" => {
                let lhs = self.read_operand(&mut cursor)?;
                cursor.expect(',')?;
                let rhs = self.read_operand(&mut cursor)?;
                let value = if op == "add" {
                    self.function.build_op_add(lhs, rhs)
                } else {
                    self.function.build_op_less_than(lhs, rhs)
                };
                Some(value.map_err(at)?)
            }
            "call" => {
                let target = self.read_operand(&mut cursor)?;
                cursor.expect('(')?;
                let mut arguments = Vec::new();
                if !cursor.try_read(')') {
                    loop {
                        arguments.push(self.read_operand(&mut cursor)?);
                        if cursor.try_read(')') {
                            break;
                        }
                        cursor.expect(',')?;
                    }
                }
                Some(self.function.build_call(target, &arguments).map_err(at)?)
            }
            "br" => {
                let name = cursor.read_block_name()?;
                let destination = self.block(line, name)?;
                self.function.build_branch(destination).map_err(at)?;
                None
            }
            "brif" => {
                let condition = self.read_operand(&mut cursor)?;
                cursor.expect(',')?;
                let name = cursor.read_block_name()?;
                let destination = self.block(line, name)?;
                self.function
                    .build_branch_if(destination, condition)
                    .map_err(at)?;
                None
            }
            "ret" => {
                if cursor.at_end() {
                    self.function.build_return_null().map_err(at)?;
                } else {
                    let rval = self.read_operand(&mut cursor)?;
                    self.function.build_return(rval).map_err(at)?;
                }
                None
            }
            other => return Err(syntax(line, format!("unknown operation '{other}'"))),
        };

        cursor.finish()?;

        if let (Some(name), Some(value)) = (binding, result) {
            self.values.insert(name, value);
        }
        Ok(())
    }

    fn read_operand(&self, cursor: &mut LineCursor<'a>) -> Result<ValueRef, ParseError> {
        if cursor.peek() == Some('%') {
            let name = cursor.read_value_name()?;
            return self
                .values
                .get(name)
                .copied()
                .ok_or_else(|| cursor.error(format!("value %{name} is not defined")));
        }
        match cursor.read_identifier()? {
            "null" => Ok(self.function.null_value()),
            other => Err(cursor.error(format!("expected operand but found '{other}'"))),
        }
    }

    fn block(&self, line: usize, name: &str) -> Result<BlockRef, ParseError> {
        self.blocks
            .get(name)
            .copied()
            .ok_or_else(|| syntax(line, format!("unknown label ^{name}")))
    }
}

/// Character cursor over one instruction line.
struct LineCursor<'a> {
    line: usize,
    text: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(line: usize, text: &'a str) -> Self {
        Self { line, text, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        syntax(self.line, message)
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.text[self.pos..].chars().next() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.text[self.pos..].chars().next() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn try_read(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        if !self.try_read(ch) {
            let found = self.peek();
            return Err(self.error(format!("expected '{ch}' but found {found:?}")));
        }
        Ok(())
    }

    /// Identifiers may start with a digit so that `%1` is a valid value name.
    fn read_identifier(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.text[self.pos..].chars().next() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }

        if start == self.pos {
            let found = self.peek();
            return Err(self.error(format!("expected identifier but found {found:?}")));
        }
        Ok(&self.text[start..self.pos])
    }

    fn read_value_name(&mut self) -> Result<&'a str, ParseError> {
        self.expect('%')?;
        self.read_identifier()
    }

    fn read_block_name(&mut self) -> Result<&'a str, ParseError> {
        self.expect('^')?;
        self.read_identifier()
    }

    fn read_integer(&mut self) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.text[self.pos..].starts_with('-') {
            self.pos += 1;
        }
        while self.text[self.pos..].starts_with(|ch: char| ch.is_ascii_digit()) {
            self.pos += 1;
        }

        let digits = &self.text[start..self.pos];
        digits
            .parse()
            .map_err(|_| self.error(format!("expected integer but found '{digits}'")))
    }

    /// Reject trailing input.
    fn finish(&mut self) -> Result<(), ParseError> {
        if self.at_end() {
            return Ok(());
        }
        let rest = &self.text[self.pos..];
        Err(self.error(format!("unexpected trailing input '{rest}'")))
    }
}
