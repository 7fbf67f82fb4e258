use std::{
    env, fs,
    io::{self, Write},
    process::ExitCode,
    time::Instant,
};

use tcl_engine::{Interp, Obj, ReplProgress, ReplSession, Unwind};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 {
        let path = &args[1];
        let source = match read_file(path) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        };

        let mut interp = Interp::new();
        install_host_builtins(&mut interp);

        let start = Instant::now();
        match interp.eval(&source) {
            Ok(value) => {
                let elapsed = start.elapsed();
                eprintln!("success after: {elapsed:?}\n{value}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                let elapsed = start.elapsed();
                eprintln!("error after: {elapsed:?}\n{err}");
                ExitCode::FAILURE
            }
        }
    } else {
        run_repl()
    }
}

fn read_file(path: &str) -> Result<String, String> {
    eprintln!("reading file: {path}");
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => return Err(format!("{path} is not a file")),
        Ok(_) => {}
        Err(err) => return Err(format!("error reading {path}: {err}")),
    }
    fs::read_to_string(path).map_err(|err| format!("error reading file: {err}"))
}

/// Interactive mode: feeds stdin lines into a [`ReplSession`], which tells
/// us whether a command is still open (`{` without its `}`, say) instead
/// of re-approximating that with a bracket-counting heuristic.
fn run_repl() -> ExitCode {
    let mut session = ReplSession::new();
    install_host_builtins(session.interp_mut());

    loop {
        let prompt = if session.awaiting_continuation() { "... " } else { "% " };
        let Some(line) = read_line(prompt) else {
            println!();
            return ExitCode::SUCCESS;
        };

        if !session.awaiting_continuation() && line.trim().is_empty() {
            continue;
        }

        match session.feed_line(&line) {
            ReplProgress::NeedsMore => {}
            ReplProgress::Completed(Ok(value)) => {
                if !value.is_empty() {
                    println!("{value}");
                }
            }
            ReplProgress::Completed(Err(err)) => eprintln!("{err}"),
        }
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}

/// Registers the builtins that live outside the engine's core (spec.md §1:
/// `puts`, `expr`, and the rest of the built-in-command layer are a host
/// concern, not the interpreter's). `expr` here is a minimal arithmetic
/// evaluator over `+ - * /`, `()`, and `$var` substitution — just enough to
/// run the worked examples and tests, not a general TCL expression engine.
fn install_host_builtins(interp: &mut Interp) {
    interp.register_builtin("puts", cmd_puts);
    interp.register_builtin("expr", cmd_expr);
}

fn cmd_puts(_interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let mut rest = &args[1..];
    let mut newline = true;
    if rest.first().is_some_and(|a| a.as_string() == "-nonewline") {
        newline = false;
        rest = &rest[1..];
    }
    // `puts ?channel? string`: a channel name is only ever followed by
    // the string to print, so when two words remain, the first is the
    // channel and the second the text.
    let text = match rest {
        [text] => text.as_string(),
        [_channel, text] => text.as_string(),
        _ => return Err(Unwind::error("wrong # args: should be \"puts ?-nonewline? ?channel? string\"")),
    };
    if newline {
        println!("{text}");
    } else {
        print!("{text}");
        io::stdout().flush().ok();
    }
    Ok(Obj::empty())
}

fn cmd_expr(interp: &mut Interp, args: &[Obj]) -> Result<Obj, Unwind> {
    let text = args[1..].iter().map(Obj::as_string).collect::<Vec<_>>().join(" ");
    expr::evaluate(interp, &text)
}

mod expr {
    use tcl_engine::{Interp, Obj, Unwind};

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Num {
        Int(i64),
        Double(f64),
    }

    impl Num {
        fn as_double(self) -> f64 {
            match self {
                Num::Int(n) => n as f64,
                Num::Double(d) => d,
            }
        }

        fn into_obj(self) -> Obj {
            match self {
                Num::Int(n) => Obj::from_int(n),
                Num::Double(d) => Obj::from_double(d),
            }
        }
    }

    /// Evaluates a minimal arithmetic expression: `+ - * /`, parentheses,
    /// unary minus, `$name` substitution, and integer/float literals.
    /// Precedence climbing over a small hand-rolled tokenizer, matching
    /// the engine's own parser style (`parse.rs`) rather than pulling in
    /// an expression-parsing crate for four operators.
    pub(crate) fn evaluate(interp: &mut Interp, text: &str) -> Result<Obj, Unwind> {
        let tokens = tokenize(interp, text)?;
        let mut pos = 0;
        let value = parse_sum(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(Unwind::error(format!("syntax error in expression \"{text}\"")));
        }
        Ok(value.into_obj())
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Token {
        Num(Num),
        Plus,
        Minus,
        Star,
        Slash,
        LParen,
        RParen,
    }

    fn tokenize(interp: &Interp, text: &str) -> Result<Vec<Token>, Unwind> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' => i += 1,
                '+' => {
                    tokens.push(Token::Plus);
                    i += 1;
                }
                '-' => {
                    tokens.push(Token::Minus);
                    i += 1;
                }
                '*' => {
                    tokens.push(Token::Star);
                    i += 1;
                }
                '/' => {
                    tokens.push(Token::Slash);
                    i += 1;
                }
                '(' => {
                    tokens.push(Token::LParen);
                    i += 1;
                }
                ')' => {
                    tokens.push(Token::RParen);
                    i += 1;
                }
                '$' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == ':') {
                        end += 1;
                    }
                    if end == start {
                        return Err(Unwind::error(format!("syntax error in expression \"{text}\"")));
                    }
                    let name: String = chars[start..end].iter().collect();
                    let value = interp.get_var(&name).map_err(|e| Unwind::error(e.to_string()))?;
                    tokens.push(Token::Num(parse_num(&value.as_string()).ok_or_else(|| Unwind::error(format!("expected number but got \"{}\"", value.as_string())))?));
                    i = end;
                }
                c if c.is_ascii_digit() || c == '.' => {
                    let start = i;
                    let mut end = i;
                    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                        end += 1;
                    }
                    let raw: String = chars[start..end].iter().collect();
                    let num = parse_num(&raw).ok_or_else(|| Unwind::error(format!("syntax error in expression \"{text}\"")))?;
                    tokens.push(Token::Num(num));
                    i = end;
                }
                _ => return Err(Unwind::error(format!("syntax error in expression \"{text}\""))),
            }
        }
        Ok(tokens)
    }

    fn parse_num(raw: &str) -> Option<Num> {
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Num::Int(n));
        }
        raw.parse::<f64>().ok().map(Num::Double)
    }

    fn parse_sum(tokens: &[Token], pos: &mut usize) -> Result<Num, Unwind> {
        let mut left = parse_product(tokens, pos)?;
        loop {
            match tokens.get(*pos) {
                Some(Token::Plus) => {
                    *pos += 1;
                    left = apply(left, parse_product(tokens, pos)?, |a, b| a + b, f64::add);
                }
                Some(Token::Minus) => {
                    *pos += 1;
                    left = apply(left, parse_product(tokens, pos)?, |a, b| a - b, f64::sub);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_product(tokens: &[Token], pos: &mut usize) -> Result<Num, Unwind> {
        let mut left = parse_unary(tokens, pos)?;
        loop {
            match tokens.get(*pos) {
                Some(Token::Star) => {
                    *pos += 1;
                    left = apply(left, parse_unary(tokens, pos)?, |a, b| a * b, f64::mul);
                }
                Some(Token::Slash) => {
                    *pos += 1;
                    let rhs = parse_unary(tokens, pos)?;
                    left = divide(left, rhs)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<Num, Unwind> {
        if let Some(Token::Minus) = tokens.get(*pos) {
            *pos += 1;
            return Ok(match parse_unary(tokens, pos)? {
                Num::Int(n) => Num::Int(-n),
                Num::Double(d) => Num::Double(-d),
            });
        }
        parse_atom(tokens, pos)
    }

    fn parse_atom(tokens: &[Token], pos: &mut usize) -> Result<Num, Unwind> {
        match tokens.get(*pos) {
            Some(Token::Num(n)) => {
                *pos += 1;
                Ok(*n)
            }
            Some(Token::LParen) => {
                *pos += 1;
                let value = parse_sum(tokens, pos)?;
                match tokens.get(*pos) {
                    Some(Token::RParen) => {
                        *pos += 1;
                        Ok(value)
                    }
                    _ => Err(Unwind::error("missing close-parenthesis in expression")),
                }
            }
            _ => Err(Unwind::error("syntax error in expression")),
        }
    }

    fn apply(a: Num, b: Num, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Num {
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)),
            _ => Num::Double(float_op(a.as_double(), b.as_double())),
        }
    }

    fn divide(a: Num, b: Num) -> Result<Num, Unwind> {
        match (a, b) {
            (Num::Int(_), Num::Int(0)) => Err(Unwind::error("divide by zero")),
            (Num::Int(x), Num::Int(y)) => Ok(Num::Int(x / y)),
            _ => Ok(Num::Double(a.as_double() / b.as_double())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tcl_engine::Interp;

    use super::install_host_builtins;

    #[test]
    fn expr_evaluates_integer_arithmetic_with_variable_substitution() {
        let mut interp = Interp::new();
        install_host_builtins(&mut interp);
        interp.eval("set a 3").unwrap();
        interp.eval("set b 4").unwrap();
        assert_eq!(interp.eval("expr {$a + $b * 2}").unwrap(), "11");
    }

    #[test]
    fn expr_promotes_to_double_on_division() {
        let mut interp = Interp::new();
        install_host_builtins(&mut interp);
        assert_eq!(interp.eval("expr {1 / 2.0}").unwrap(), "0.5");
    }

    #[test]
    fn proc_body_with_expr_runs_end_to_end() {
        let mut interp = Interp::new();
        install_host_builtins(&mut interp);
        interp.eval("proc f {a {b 10}} {expr {$a + $b}}").unwrap();
        assert_eq!(interp.eval("f 5").unwrap(), "15");
    }
}
