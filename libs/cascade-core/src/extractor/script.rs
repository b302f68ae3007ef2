use super::*;
use regex::Regex;
use std::sync::OnceLock;

/// Host API calls whose arguments may name a collection or link type.
const HOST_CALLS: [&str; 12] = [
    "createDocument",
    "getLinkedDocuments",
    "getLinks",
    "getSiblings",
    "linkDocuments",
    "getLinkDocument",
    "getDocumentAttribute",
    "setDocumentAttribute",
    "getLinkAttribute",
    "setLinkAttribute",
    "removeDocument",
    "printAttribute",
];

fn host_call() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let pattern = format!(r"\blumeer\s*\.\s*(?:{})\s*\(", HOST_CALLS.join("|"));
            Regex::new(&pattern)
                .map_err(|e| error!("invalid host call pattern: {}", e))
                .ok()
        })
        .as_ref()
}

struct Literal {
    start: usize,
    value: String,
}

/// Script text with comments and string contents blanked out, byte offsets preserved.
struct Lexed {
    code: String,
    literals: Vec<Literal>,
}

fn blank(code: &mut String, c: char) {
    if c == '\n' {
        code.push('\n');
    } else {
        code.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

fn lex(script: &str) -> Lexed {
    let mut code = String::with_capacity(script.len());
    let mut literals = vec![];
    let mut chars = script.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                blank(&mut code, c);
                while let Some(&(_, next)) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    blank(&mut code, next);
                    chars.next();
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                blank(&mut code, c);
                if let Some((_, star)) = chars.next() {
                    blank(&mut code, star);
                }
                let mut previous = ' ';
                for (_, next) in chars.by_ref() {
                    blank(&mut code, next);
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            '"' | '\'' | '`' => {
                code.push(c);
                let mut value = String::new();
                let mut escaped = false;
                for (_, next) in chars.by_ref() {
                    if escaped {
                        value.push(unescape(next));
                        blank(&mut code, next);
                        escaped = false;
                    } else if next == '\\' {
                        blank(&mut code, next);
                        escaped = true;
                    } else if next == c {
                        code.push(next);
                        break;
                    } else {
                        value.push(next);
                        blank(&mut code, next);
                    }
                }
                literals.push(Literal { start, value });
            }
            _ => code.push(c),
        }
    }

    Lexed { code, literals }
}

/// Offset of the parenthesis closing the call opened just before `open`.
fn call_end(code: &str, open: usize) -> usize {
    let mut depth = 1usize;
    for (offset, byte) in code.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return open + offset;
                }
            }
            _ => {}
        }
    }
    code.len()
}

/// Resources named by string literals passed to host API calls.
///
/// Identifiers assembled at runtime are not visible to this scan.
pub(super) fn extract_script(script: &str, known: &KnownResources) -> Vec<ResourceReference> {
    let Some(pattern) = host_call() else {
        return vec![];
    };
    let lexed = lex(script);
    let mut seen = HashSet::new();
    let mut found = vec![];

    for call in pattern.find_iter(&lexed.code) {
        let (open, close) = (call.end(), call_end(&lexed.code, call.end()));
        let arguments = lexed
            .literals
            .iter()
            .filter(|literal| literal.start >= open && literal.start < close);
        for literal in arguments {
            if let Some(reference) = known.classify(&literal.value) {
                if seen.insert(reference.clone()) {
                    found.push(reference);
                }
            }
        }
    }

    found
}
