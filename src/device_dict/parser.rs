//! Interpreter for the assignment subset of Jinja2 that device dict files are written in.
//!
//! Only top-level `{% set %}` statements produce values. `{% if %}` chains are evaluated so that untaken branches
//! assign nothing, while assignments inside loops, macros, calls, filters, `with` and template blocks stay local to
//! them. Comments, output expressions, raw sections and every other statement (`extends`, `include`, ...) are
//! template machinery and skipped.

use serde_json::{Map, Number, Value};

/// Block constructs with their own scope, assignments inside them never reach the top level.
const SCOPED: &[&str] = &["block", "call", "filter", "for", "macro", "with"];

#[derive(Debug, Clone, PartialEq)]
pub(super) struct SyntaxError {
    pub line: usize,
    pub reason: String,
}

/// An open block construct.
struct Frame<'a> {
    keyword: &'a str,
    offset: usize,
    /// Statements directly inside currently execute.
    active: bool,
    /// An `if` chain already picked a branch, or runs in a section that never executes.
    taken: bool,
}

/// Every executed top-level assignment in source order, a name assigned twice appears twice.
pub(super) fn assignments(source: &str) -> Result<Vec<(String, Value)>, SyntaxError> {
    let mut bindings = Map::new();
    let mut assigned = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('{') {
        let start = pos + offset;
        let rest = &source[start..];

        if rest.starts_with("{#") {
            let end = source[start + 2..].find("#}").ok_or_else(|| error(source, start, "unterminated comment"))?;
            pos = start + 2 + end + 2;
        } else if rest.starts_with("{{") {
            let end = find_closing(source, start + 2, "}}").ok_or_else(|| error(source, start, "unterminated expression"))?;
            pos = end + 2;
        } else if rest.starts_with("{%") {
            let end = find_closing(source, start + 2, "%}").ok_or_else(|| error(source, start, "unterminated statement"))?;
            let tag = Tag::parse(&source[start + 2..end]);
            pos = end + 2;
            let live = stack.iter().all(|frame| frame.active);

            match tag.keyword {
                "set" => match tag.arguments.split_once('=') {
                    Some(_) if !live => {}
                    Some((target, expression)) => {
                        let name = identifier(target.trim()).map_err(|reason| error(source, start, reason))?;
                        let value = Expression::new(expression, &bindings).parse().map_err(|reason| error(source, start, reason))?;
                        bindings.insert(name.to_string(), value.clone());
                        assigned.push((name.to_string(), value));
                    }
                    None => {
                        let (body, after) = block_body(source, pos, tag.trim_after).ok_or_else(|| error(source, start, "missing endset"))?;
                        pos = after;
                        if live {
                            let name = identifier(tag.arguments).map_err(|reason| error(source, start, reason))?;
                            let value = Value::String(body.to_string());
                            bindings.insert(name.to_string(), value.clone());
                            assigned.push((name.to_string(), value));
                        }
                    }
                },
                "endset" => return Err(error(source, start, "endset without set")),
                "raw" => pos = raw_end(source, pos).ok_or_else(|| error(source, start, "missing endraw"))?,
                "if" => {
                    let active = live && condition(tag.arguments, &bindings).map_err(|reason| error(source, start, reason))?;
                    stack.push(Frame {
                        keyword: "if",
                        offset: start,
                        active,
                        taken: active || !live,
                    });
                }
                "elif" => match stack.last_mut() {
                    Some(frame) if frame.keyword == "if" => {
                        frame.active = !frame.taken && condition(tag.arguments, &bindings).map_err(|reason| error(source, start, reason))?;
                        frame.taken |= frame.active;
                    }
                    _ => return Err(error(source, start, "unexpected 'elif'")),
                },
                "else" => match stack.last_mut() {
                    Some(frame) if frame.keyword == "if" => {
                        frame.active = !frame.taken;
                        frame.taken = true;
                    }
                    Some(frame) if frame.keyword == "for" => {}
                    _ => return Err(error(source, start, "unexpected 'else'")),
                },
                keyword if SCOPED.iter().any(|scoped| *scoped == keyword) => stack.push(Frame {
                    keyword,
                    offset: start,
                    active: false,
                    taken: true,
                }),
                keyword if keyword.starts_with("end") => match stack.pop() {
                    Some(frame) if keyword["end".len()..] == *frame.keyword => {}
                    _ => return Err(error(source, start, format!("unexpected '{}'", keyword))),
                },
                _ => {}
            }
        } else {
            pos = start + 1;
        }
    }

    match stack.last() {
        Some(frame) => Err(error(source, frame.offset, format!("missing end{}", frame.keyword))),
        None => Ok(assigned),
    }
}

/// Evaluates an `if` or `elif` test, optionally negated with `not`.
fn condition(text: &str, bindings: &Map<String, Value>) -> Result<bool, String> {
    let (negated, text) = match text.strip_prefix("not ") {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = Expression::new(text, bindings).parse()?;
    Ok(truthy(&value) != negated)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn error(source: &str, offset: usize, reason: impl Into<String>) -> SyntaxError {
    SyntaxError {
        line: source[..offset].matches('\n').count() + 1,
        reason: reason.into(),
    }
}

/// Byte offset of `delimiter` after `from`, skipping over quoted strings.
fn find_closing(source: &str, from: usize, delimiter: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    for (index, c) in source[from..].char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if source[from + index..].starts_with(delimiter) => return Some(from + index),
            None => {}
        }
    }
    None
}

/// Offset right after the `{% endraw %}` closing a raw section. Nothing inside is interpreted.
fn raw_end(source: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(offset) = source[pos..].find("{%") {
        let start = pos + offset;
        let end = start + 2 + source[start + 2..].find("%}")?;
        if Tag::parse(&source[start + 2..end]).keyword == "endraw" {
            return Some(end + 2);
        }
        pos = start + 2;
    }
    None
}

/// Text up to the matching `{% endset %}` and the offset right after it.
fn block_body(source: &str, from: usize, trim_start: bool) -> Option<(&str, usize)> {
    let mut pos = from;
    while let Some(offset) = source[pos..].find("{%") {
        let start = pos + offset;
        let end = find_closing(source, start + 2, "%}")?;
        let tag = Tag::parse(&source[start + 2..end]);
        if tag.keyword == "endset" {
            let mut body = &source[from..start];
            if trim_start {
                body = body.trim_start();
            }
            if tag.trim_before {
                body = body.trim_end();
            }
            return Some((body, end + 2));
        }
        pos = end + 2;
    }
    None
}

fn identifier(text: &str) -> Result<&str, String> {
    let mut chars = text.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid { Ok(text) } else { Err(format!("unsupported assignment target '{}'", text)) }
}

struct Tag<'a> {
    keyword: &'a str,
    arguments: &'a str,
    trim_before: bool,
    trim_after: bool,
}

impl<'a> Tag<'a> {
    fn parse(inner: &'a str) -> Self {
        let trim_before = inner.starts_with('-');
        let trim_after = inner.ends_with('-');
        let inner = inner.trim_start_matches(['-', '+']).trim_end_matches(['-', '+']).trim();
        let (keyword, arguments) = inner.split_once(char::is_whitespace).unwrap_or((inner, ""));
        Tag {
            keyword,
            arguments: arguments.trim(),
            trim_before,
            trim_after,
        }
    }
}

/// Literals, lists, maps, earlier bindings and `~` concatenation.
struct Expression<'a> {
    text: &'a str,
    pos: usize,
    bindings: &'a Map<String, Value>,
}

impl<'a> Expression<'a> {
    fn new(text: &'a str, bindings: &'a Map<String, Value>) -> Self {
        Expression { text, pos: 0, bindings }
    }

    fn parse(mut self) -> Result<Value, String> {
        let value = self.concat()?;
        self.skip_whitespace();
        match self.peek() {
            None => Ok(value),
            Some(c) => Err(format!("unexpected '{}'", c)),
        }
    }

    fn concat(&mut self) -> Result<Value, String> {
        let mut value = self.primary()?;
        loop {
            self.skip_whitespace();
            if !self.eat('~') {
                return Ok(value);
            }
            let right = self.primary()?;
            value = Value::String(format!("{}{}", display(&value), display(&right)));
        }
    }

    fn primary(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            None => Err("expected an expression".to_string()),
            Some('\'' | '"') => self.string(),
            Some('[') => self.list(),
            Some('{') => self.map(),
            Some('(') => {
                self.pos += 1;
                let value = self.concat()?;
                self.skip_whitespace();
                self.expect(')')?;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.name(),
            Some(c) => Err(format!("unexpected '{}'", c)),
        }
    }

    fn string(&mut self) -> Result<Value, String> {
        let quote = self.next_char().unwrap_or('\'');
        let mut text = String::new();
        loop {
            match self.next_char() {
                None => return Err("unterminated string".to_string()),
                Some('\\') => match self.next_char() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(c) => text.push(c),
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) if c == quote => return Ok(Value::String(text)),
                Some(c) => text.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        self.eat('-');
        self.skip_digits();
        let mut float = false;
        if self.peek() == Some('.') && self.text[self.pos + 1..].starts_with(|c: char| c.is_ascii_digit()) {
            float = true;
            self.pos += 1;
            self.skip_digits();
        }

        let literal = self.text[start..self.pos].replace('_', "");
        let number = if float {
            literal.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            literal.parse::<i64>().ok().map(Number::from)
        };
        number.map(Value::Number).ok_or_else(|| format!("invalid number '{}'", literal))
    }

    fn name(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "none" | "None" => Ok(Value::Null),
            name => self.bindings.get(name).cloned().ok_or_else(|| format!("undefined variable '{}'", name)),
        }
    }

    fn list(&mut self) -> Result<Value, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.concat()?);
            self.skip_whitespace();
            if !self.eat(',') {
                self.expect(']')?;
                return Ok(Value::Array(items));
            }
        }
    }

    fn map(&mut self) -> Result<Value, String> {
        self.expect('{')?;
        let mut entries = Map::new();
        loop {
            self.skip_whitespace();
            if self.eat('}') {
                return Ok(Value::Object(entries));
            }
            let key = display(&self.concat()?);
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.concat()?;
            entries.insert(key, value);
            self.skip_whitespace();
            if !self.eat(',') {
                self.expect('}')?;
                return Ok(Value::Object(entries));
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(c) => Err(format!("expected '{}' but found '{}'", expected, c)),
            None => Err(format!("expected '{}'", expected)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.next_char();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }
}

/// String conversion used by `~`.
fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn values(source: &str) -> Vec<(String, Value)> {
        assignments(source).unwrap()
    }

    #[test]
    fn collects_assignments_in_order() {
        let source = r#"{# lab board #}
{% extends 'base.jinja2' %}
{% set boot_method = 'grub' %}
{%- set connection_command = "telnet localhost 2000" -%}
{{ connection_command }}
{% set docker_shell_extra_arguments = ['--add-host=lava:10.0.0.1', "--privileged",] %}
"#;

        assert_eq!(
            values(source),
            vec![
                ("boot_method".to_string(), json!("grub")),
                ("connection_command".to_string(), json!("telnet localhost 2000")),
                ("docker_shell_extra_arguments".to_string(), json!(["--add-host=lava:10.0.0.1", "--privileged"])),
            ]
        );
    }

    #[rstest]
    #[case::integer("42", json!(42))]
    #[case::negative("-7", json!(-7))]
    #[case::float("1.5", json!(1.5))]
    #[case::boolean("True", json!(true))]
    #[case::none("none", Value::Null)]
    #[case::escaped("'it\\'s'", json!("it's"))]
    #[case::map("{'vendor': '0x18d1', 'product': 20199}", json!({"vendor": "0x18d1", "product": 20199}))]
    #[case::empty_list("[ ]", json!([]))]
    #[case::nested("[['-o', 'x'], {}]", json!([["-o", "x"], {}]))]
    fn evaluates_literals(#[case] expression: &str, #[case] expected: Value) {
        let source = format!("{{% set value = {} %}}", expression);
        assert_eq!(values(&source), vec![("value".to_string(), expected)]);
    }

    #[test]
    fn concatenates_earlier_bindings() {
        let source = "{% set port = 2000 %}{% set connection_command = 'telnet localhost ' ~ port %}";
        assert_eq!(values(source)[1], ("connection_command".to_string(), json!("telnet localhost 2000")));
    }

    #[test]
    fn captures_block_assignments() {
        let source = "{% set power_on_command -%}\n  pduclient --command on\n{%- endset %}\n{% set x %} raw {% endset %}";
        assert_eq!(
            values(source),
            vec![
                ("power_on_command".to_string(), json!("pduclient --command on")),
                ("x".to_string(), json!(" raw ")),
            ]
        );
    }

    #[test]
    fn ignores_template_machinery() {
        let source = "{% if true %}text { braces }{% endif %}{{ '%}' }}{% include 'other.jinja2' %}";
        assert!(values(source).is_empty());
    }

    #[test]
    fn untaken_branches_assign_nothing() {
        let source = "{% set boot_method = 'grub' %}{% if false %}{% set boot_method = 'u-boot' %}{% endif %}";
        assert_eq!(values(source), vec![("boot_method".to_string(), json!("grub"))]);
    }

    #[rstest]
    #[case::first("'grub'", "grub")]
    #[case::second("''", "u-boot")]
    #[case::fallback("none", "fastboot")]
    fn follows_the_first_true_branch(#[case] first: &str, #[case] expected: &str) {
        let second = if expected == "fastboot" { "[]" } else { "'yes'" };
        let source = format!(
            "{{% set a = {} %}}{{% set b = {} %}}\n\
             {{% if a %}}{{% set boot_method = 'grub' %}}\n\
             {{% elif b %}}{{% set boot_method = 'u-boot' %}}\n\
             {{% else %}}{{% set boot_method = 'fastboot' %}}{{% endif %}}",
            first, second
        );

        assert_eq!(values(&source).last(), Some(&("boot_method".to_string(), json!(expected))));
    }

    #[test]
    fn nested_conditions_inside_untaken_branches_stay_untaken() {
        let source = "{% if not true %}{% if true %}{% set a = 1 %}{% else %}{% set a = 2 %}{% endif %}{% endif %}";
        assert!(values(source).is_empty());
    }

    #[rstest]
    #[case::macro_local("{% macro helper(x) %}{% set helper = x %}{{ helper }}{% endmacro %}")]
    #[case::loop_local("{% for port in [1, 2] %}{% set last = port %}{% else %}{% set last = 0 %}{% endfor %}")]
    #[case::block_local("{% block body %}{% set title %}lab{% endset %}{% endblock %}")]
    #[case::raw("{% raw %}{% set example = 1 %}{% if %}{% endraw %}")]
    fn scoped_assignments_stay_local(#[case] body: &str) {
        let source = format!("{}{{% set boot_method = 'grub' %}}", body);
        assert_eq!(values(&source), vec![("boot_method".to_string(), json!("grub"))]);
    }

    #[rstest]
    #[case::missing_endif("{% set a = 1 %}\n{% if a %}\n", 2, "missing endif")]
    #[case::mismatched_end("{% for x in [] %}{% endif %}", 1, "unexpected 'endif'")]
    #[case::stray_else("{% else %}", 1, "unexpected 'else'")]
    #[case::stray_elif("{% for x in [] %}{% elif x %}{% endfor %}", 1, "unexpected 'elif'")]
    #[case::missing_endraw("\n{% raw %}{% set a = 1 %}", 2, "missing endraw")]
    #[case::undefined_condition("{% if lab %}{% endif %}", 1, "undefined variable 'lab'")]
    fn reports_unbalanced_blocks(#[case] source: &str, #[case] line: usize, #[case] reason: &str) {
        assert_eq!(
            assignments(source).unwrap_err(),
            SyntaxError {
                line,
                reason: reason.to_string()
            }
        );
    }

    #[rstest]
    #[case::undefined("\n\n{% set a = missing %}", 3, "undefined variable 'missing'")]
    #[case::unterminated_statement("{% set a = 1", 1, "unterminated statement")]
    #[case::unterminated_comment("\n{# never closed", 2, "unterminated comment")]
    #[case::unterminated_string("{% set a = 'oops %}", 1, "unterminated statement")]
    #[case::filter("{% set a = 'x'|upper %}", 1, "unexpected '|'")]
    #[case::attribute("{% set ns.a = 1 %}", 1, "unsupported assignment target 'ns.a'")]
    #[case::dangling_endset("{% endset %}", 1, "endset without set")]
    #[case::missing_endset("{% set a %}text", 1, "missing endset")]
    #[case::unclosed_list("{% set a = [1, 2 %}", 1, "expected ']'")]
    fn reports_syntax_errors(#[case] source: &str, #[case] line: usize, #[case] reason: &str) {
        assert_eq!(
            assignments(source).unwrap_err(),
            SyntaxError {
                line,
                reason: reason.to_string()
            }
        );
    }
}
