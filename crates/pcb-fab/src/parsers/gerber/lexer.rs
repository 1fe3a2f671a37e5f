/// Tokens produced by the Gerber lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberToken {
    /// One `%...%` block, split into its `*`-terminated statements.
    /// Example: `["AMDONUT", "1,1,$1,0,0", "1,0,$2,0,0"]`
    Extended(Vec<String>),
    /// A word statement terminated by `*`.
    /// Example: `"D10"`, `"X100Y200D01"`, `"G01"`, `"M02"`
    Word(String),
}

/// Tokenize a Gerber file.
///
/// `*` terminates statements and `%...%` delimits extended blocks. Line
/// breaks and surrounding whitespace carry no meaning. `G04` comments are
/// dropped.
pub fn tokenize(input: &str) -> Vec<GerberToken> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '%' => {
                chars.next();
                let mut statements = Vec::new();
                let mut statement = String::new();
                loop {
                    match chars.next() {
                        Some('%') | None => {
                            push_statement(&mut statements, &statement);
                            break;
                        }
                        Some('*') => {
                            push_statement(&mut statements, &statement);
                            statement.clear();
                        }
                        Some('\n' | '\r') => {}
                        Some(c) => statement.push(c),
                    }
                }
                if !statements.is_empty() {
                    tokens.push(GerberToken::Extended(statements));
                }
            }
            '\n' | '\r' | ' ' | '\t' => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '*' {
                        chars.next();
                        break;
                    }
                    // A comment runs to its `*`, even across a `%`.
                    if c == '%' && !is_comment(word.trim_start()) {
                        break;
                    }
                    chars.next();
                    if c != '\n' && c != '\r' {
                        word.push(c);
                    }
                }
                let trimmed = word.trim();
                if !trimmed.is_empty() && !is_comment(trimmed) {
                    tokens.push(GerberToken::Word(trimmed.to_string()));
                }
            }
        }
    }

    tokens
}

fn push_statement(statements: &mut Vec<String>, statement: &str) {
    let trimmed = statement.trim();
    if !trimmed.is_empty() && !is_comment(trimmed) {
        statements.push(trimmed.to_string());
    }
}

/// `G04` comment, or its short form `G4` followed by text.
fn is_comment(s: &str) -> bool {
    s.starts_with("G04") || (s.starts_with("G4") && !s[2..].starts_with(|c: char| c.is_ascii_digit()))
}
