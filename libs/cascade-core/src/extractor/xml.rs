use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, rest},
    multi::many0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

/// Elements opened deeper than this are kept as leaves of the innermost open element.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open {
        name: &'a str,
        attributes: Vec<(&'a str, &'a str)>,
        empty: bool,
    },
    Close(&'a str),
    Text(&'a str),
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str, name_attribute: &str) -> Option<&Element> {
        self.elements()
            .find(|element| {
                element.name == name && element.attribute("name") == Some(name_attribute)
            })
    }

    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect::<String>()
            .trim()
            .to_owned()
    }

    /// All nested elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = vec![];
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        while let Some(element) = stack.pop() {
            found.push(element);
            let mut children: Vec<_> = element.elements().collect();
            children.reverse();
            stack.extend(children);
        }
        found
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_until("\""), char('"')),
        delimited(char('\''), take_until("'"), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = preceded(multispace0, name)(input)?;
    let (input, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        quoted,
    ))(input)?;
    Ok((input, (key, value.unwrap_or_default())))
}

fn open_tag(input: &str) -> IResult<&str, Token> {
    map(
        tuple((
            preceded(char('<'), name),
            many0(attribute),
            preceded(multispace0, opt(char('/'))),
            char('>'),
        )),
        |(name, attributes, empty, _)| Token::Open {
            name,
            attributes,
            empty: empty.is_some(),
        },
    )(input)
}

fn close_tag(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("</"), name, preceded(multispace0, char('>'))),
        Token::Close,
    )(input)
}

fn comment(input: &str) -> IResult<&str, Token> {
    map(
        preceded(
            tag("<!--"),
            alt((terminated(take_until("-->"), tag("-->")), rest)),
        ),
        |_| Token::Skip,
    )(input)
}

fn cdata(input: &str) -> IResult<&str, Token> {
    map(
        preceded(
            tag("<![CDATA["),
            alt((terminated(take_until("]]>"), tag("]]>")), rest)),
        ),
        Token::Text,
    )(input)
}

fn declaration(input: &str) -> IResult<&str, Token> {
    map(
        alt((
            delimited(tag("<?"), take_until("?>"), tag("?>")),
            delimited(tag("<!"), take_until(">"), char('>')),
        )),
        |_| Token::Skip,
    )(input)
}

fn text(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| c != '<'), Token::Text)(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((comment, cdata, declaration, close_tag, open_tag, text))(input)
}

fn tokenize(mut input: &str) -> Vec<Token> {
    let mut tokens = vec![];
    while !input.is_empty() {
        match token(input) {
            Ok((remaining, token)) => {
                tokens.push(token);
                input = remaining;
            }
            // only a stray `<` can fail every branch
            Err(_) => {
                let (stray, remaining) = input.split_at(1);
                tokens.push(Token::Text(stray));
                input = remaining;
            }
        }
    }
    tokens
}

fn decode(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn close_top(stack: &mut Vec<Element>) {
    if stack.len() > 1 {
        if let Some(element) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(element));
            }
        }
    }
}

/// Parses markup into a tree under a nameless root, never failing.
///
/// Unknown markup is dropped, unmatched closing tags are ignored and
/// elements left open at the end of input are closed there. Nesting stops
/// at `MAX_DEPTH`, past which opening tags are treated as empty.
pub(super) fn parse_document(input: &str) -> Element {
    let mut stack = vec![Element::default()];

    for token in tokenize(input) {
        match token {
            Token::Open {
                name,
                attributes,
                empty,
            } => {
                let element = Element {
                    name: name.to_owned(),
                    attributes: attributes
                        .into_iter()
                        .map(|(key, value)| (key.to_owned(), decode(value)))
                        .collect(),
                    children: vec![],
                };
                if empty || stack.len() > MAX_DEPTH {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Element(element));
                    }
                } else {
                    stack.push(element);
                }
            }
            Token::Close(name) => {
                if let Some(depth) = stack.iter().skip(1).rposition(|open| open.name == name) {
                    while stack.len() > depth + 1 {
                        close_top(&mut stack);
                    }
                }
            }
            Token::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(decode(text)));
                }
            }
            Token::Skip => {}
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().unwrap_or_default()
}
