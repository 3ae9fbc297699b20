//! Textual ILOC reader
//!
//! Reads the same format the IR's `Display` implementations print:
//!
//! ```text
//! .global counter int @0
//! .function int main() locals=4
//!     loadI 0 => r1
//! l1:
//!     storeAI r1 => bp, -4     // counter = 0
//!     return
//! ```
//!
//! `#` starts a line comment; `//` attaches a comment to the instruction.

use crate::ir::{Function, Instruction, Opcode, Operand, Program};
use iloc_common::{DataType, IlocError, Symbol};

/// Parse a complete program with globals and function headers
pub fn parse_program(source: &str) -> Result<Program, IlocError> {
    let mut program = Program::new();
    let mut current: Option<Function> = None;
    let mut body: Vec<Instruction> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let (code, comment) = split_comment(raw);
        let code = code.trim();
        if code.is_empty() {
            continue;
        }

        if let Some(directive) = code.strip_prefix('.') {
            let (name, args) = match directive.split_once(char::is_whitespace) {
                Some((name, args)) => (name, args.trim()),
                None => (directive, ""),
            };
            match name {
                "global" => program.add_global(parse_global(args, line_no)?),
                "function" => {
                    if let Some(mut done) = current.take() {
                        done.set_instructions(std::mem::take(&mut body));
                        program.add_function(done);
                    }
                    current = Some(parse_function_header(args, line_no)?);
                }
                other => {
                    return Err(IlocError::parse_error(
                        line_no,
                        format!("unknown directive '.{}'", other),
                    ));
                }
            }
            continue;
        }

        if current.is_none() {
            return Err(IlocError::parse_error(line_no, "instruction outside of a function"));
        }
        body.push(parse_line(code, comment, line_no)?);
    }

    if let Some(mut done) = current.take() {
        done.set_instructions(body);
        program.add_function(done);
    }
    Ok(program)
}

/// Parse a bare instruction list (no directives)
pub fn parse_instructions(source: &str) -> Result<Vec<Instruction>, IlocError> {
    let mut instructions = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let (code, comment) = split_comment(raw);
        let code = code.trim();
        if code.is_empty() {
            continue;
        }
        instructions.push(parse_line(code, comment, idx + 1)?);
    }
    Ok(instructions)
}

/// Parse one instruction or label marker
fn parse_line(code: &str, comment: Option<&str>, line_no: usize) -> Result<Instruction, IlocError> {
    if let Some(label) = code.strip_suffix(':') {
        let label = label.trim();
        let id = label
            .strip_prefix('l')
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| IlocError::parse_error(line_no, format!("invalid label '{}'", label)))?;
        let instr = Instruction::label(id);
        return Ok(attach_comment(instr, comment));
    }

    let (mnemonic, rest) = match code.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => (mnemonic, rest.trim()),
        None => (code, ""),
    };
    let opcode = Opcode::from_mnemonic(mnemonic);

    let parts = split_outside_quotes(rest, "=>");
    let (sources, dests) = match parts.as_slice() {
        [sources] => (split_operands(sources), Vec::new()),
        [sources, dests] => (split_operands(sources), split_operands(dests)),
        _ => return Err(IlocError::parse_error(line_no, "more than one '=>'")),
    };

    if let Some(arity) = opcode.arity() {
        let expected_sources = opcode.source_count().unwrap_or(arity);
        if sources.len() != expected_sources || sources.len() + dests.len() != arity {
            return Err(IlocError::parse_error(
                line_no,
                format!("'{}' expects {} operand(s)", mnemonic, arity),
            ));
        }
    }

    let mut operands = Vec::with_capacity(sources.len() + dests.len());
    for token in sources.iter().chain(dests.iter()) {
        let operand = if opcode == Opcode::Call {
            Operand::CallLabel(token.to_string())
        } else {
            parse_operand(token, line_no)?
        };
        operands.push(operand);
    }

    Ok(attach_comment(Instruction::new(opcode, operands), comment))
}

fn attach_comment(instr: Instruction, comment: Option<&str>) -> Instruction {
    match comment {
        Some(text) if !text.is_empty() => instr.with_comment(text),
        _ => instr,
    }
}

fn parse_operand(token: &str, line_no: usize) -> Result<Operand, IlocError> {
    if token.starts_with('"') {
        return parse_string(token, line_no).map(Operand::StrConst);
    }
    match token {
        "bp" => return Ok(Operand::BaseReg),
        "ret" => return Ok(Operand::ReturnReg),
        _ => {}
    }
    if let Ok(value) = token.parse::<i32>() {
        return Ok(Operand::IntConst(value));
    }

    let numbered = |prefix: char| {
        token
            .strip_prefix(prefix)
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
    };
    if let Some(id) = numbered('r') {
        return Ok(Operand::VirtualReg(id));
    }
    if let Some(id) = numbered('p') {
        return Ok(Operand::PhysicalReg(id));
    }
    if let Some(id) = numbered('l') {
        return Ok(Operand::JumpLabel(id));
    }

    if is_identifier(token) {
        Ok(Operand::CallLabel(token.to_string()))
    } else {
        Err(IlocError::parse_error(line_no, format!("invalid operand '{}'", token)))
    }
}

fn parse_string(token: &str, line_no: usize) -> Result<String, IlocError> {
    let inner = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .filter(|_| token.len() >= 2)
        .ok_or_else(|| IlocError::parse_error(line_no, format!("unterminated string {}", token)))?;

    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('"') => text.push('"'),
            Some('\\') => text.push('\\'),
            other => {
                return Err(IlocError::parse_error(
                    line_no,
                    format!("invalid escape '\\{}'", other.map(String::from).unwrap_or_default()),
                ));
            }
        }
    }
    Ok(text)
}

fn parse_global(args: &str, line_no: usize) -> Result<Symbol, IlocError> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let [name, type_spec, offset] = tokens.as_slice() else {
        return Err(IlocError::parse_error(line_no, "expected '.global <name> <type> @<offset>'"));
    };

    let offset = offset
        .strip_prefix('@')
        .and_then(|o| o.parse::<i32>().ok())
        .ok_or_else(|| IlocError::parse_error(line_no, format!("invalid offset '{}'", offset)))?;

    match type_spec.split_once('[') {
        Some((base, len)) => {
            let data_type = parse_type(base, line_no)?;
            let length = len
                .strip_suffix(']')
                .and_then(|l| l.parse::<u32>().ok())
                .ok_or_else(|| {
                    IlocError::parse_error(line_no, format!("invalid array type '{}'", type_spec))
                })?;
            Ok(Symbol::global_array(name, data_type, length, offset))
        }
        None => Ok(Symbol::global(name, parse_type(type_spec, line_no)?, offset)),
    }
}

fn parse_function_header(args: &str, line_no: usize) -> Result<Function, IlocError> {
    let malformed = || {
        IlocError::parse_error(
            line_no,
            "expected '.function <type> <name>(<params>) [locals=<n>]'",
        )
    };

    let (return_type, rest) = args.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let open = rest.find('(').ok_or_else(malformed)?;
    let close = rest.find(')').filter(|&c| c > open).ok_or_else(malformed)?;

    let name = rest[..open].trim();
    if !is_identifier(name) {
        return Err(IlocError::parse_error(line_no, format!("invalid function name '{}'", name)));
    }

    let mut params = Vec::new();
    for param in rest[open + 1..close].split(',').map(str::trim).filter(|p| !p.is_empty()) {
        params.push(parse_type(param, line_no)?);
    }

    let mut local_size = 0;
    for attr in rest[close + 1..].split_whitespace() {
        match attr.split_once('=') {
            Some(("locals", value)) => {
                local_size = value.parse().map_err(|_| {
                    IlocError::parse_error(line_no, format!("invalid frame size '{}'", value))
                })?;
            }
            _ => {
                return Err(IlocError::parse_error(
                    line_no,
                    format!("unknown attribute '{}'", attr),
                ))
            }
        }
    }

    let symbol = Symbol::function(name, parse_type(return_type, line_no)?, params);
    Ok(Function::new(symbol, Vec::new(), local_size))
}

fn parse_type(name: &str, line_no: usize) -> Result<DataType, IlocError> {
    DataType::from_name(name)
        .ok_or_else(|| IlocError::parse_error(line_no, format!("unknown type '{}'", name)))
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Separate code from a trailing `//` comment; `#` discards the rest of the line
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '#' => return (&line[..i], None),
            '/' if line[i..].starts_with("//") => return (&line[..i], Some(line[i + 2..].trim())),
            _ => {}
        }
    }
    (line, None)
}

/// Split on `separator` wherever it is not inside a string constant
fn split_outside_quotes<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if ch == '"' {
            in_string = true;
        } else if i >= start && text[i..].starts_with(separator) {
            parts.push(&text[start..i]);
            start = i + separator.len();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn split_operands(text: &str) -> Vec<&str> {
    split_outside_quotes(text, ",")
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}
