use crate::{
    InvalidIntegerLiteralError, ParseError, ParseResult, Token, TokenType,
    UnexpectedCharacterError, UnexpectedEndOfFileError, UnfinishedTokenError,
};
use ember_span::{SourcePosition, Span};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct LexerInput<'a> {
    input: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> LexerInput<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    /// Byte offset of the next unconsumed character.
    pub fn pos(&mut self) -> SourcePosition {
        self.input
            .peek()
            .map(|(pos, _)| *pos)
            .unwrap_or(self.len) as SourcePosition
    }

    fn peek(&mut self) -> Option<char> {
        self.input.peek().map(|(_, ch)| *ch)
    }

    fn next(&mut self) -> ParseResult<char> {
        let pos = self.pos();
        self.input
            .next()
            .map(|(_, ch)| ch)
            .ok_or(ParseError::from(UnexpectedEndOfFileError {
                span: Span::new(pos..pos),
            }))
    }

    /// Expect the next character to be `expected`, producing the two-character token.
    ///
    /// Used for tokens that have no single-character production, such as `||`.
    fn expect_peek(
        &mut self,
        expected: char,
        start: SourcePosition,
        production: TokenType,
    ) -> ParseResult<Token> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.input.next();
                Ok(Token::new(production, Span::new(start..self.pos())))
            }
            _ => Err(ParseError::from(UnfinishedTokenError {
                expected,
                span: Span::pos(start),
            })),
        }
    }

    /// Select a two-character token if `f` accepts the next character, otherwise produce the
    /// single-character `default`.
    fn select_peek<F>(
        &mut self,
        default: TokenType,
        start: SourcePosition,
        f: F,
    ) -> ParseResult<Token>
    where
        F: FnOnce(char) -> Option<TokenType>,
    {
        match self.peek().and_then(f) {
            Some(ty) => {
                self.input.next();
                Ok(Token::new(ty, Span::new(start..self.pos())))
            }
            None => Ok(Token::new(default, Span::pos(start))),
        }
    }
}

/// A lexer for source to token stream conversion.
pub struct Lexer<'a> {
    input: LexerInput<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: LexerInput::new(input),
        }
    }

    pub fn pos(&mut self) -> SourcePosition {
        self.input.pos()
    }

    /// Produce the next token from the input stream.
    ///
    /// Reaching the end of input yields [`ParseError::UnexpectedEndOfFile`].
    pub fn produce(&mut self) -> ParseResult<Token> {
        let pos = self.pos();
        let ch = self.input.next()?;
        match ch {
            '0'..='9' => self.produce_integer_literal(ch, pos),
            'a'..='z' | 'A'..='Z' | '_' => self.produce_keyword_or_identifier(ch, pos),
            '.' => Ok(Token::new(TokenType::Dot, Span::pos(pos))),
            ';' => Ok(Token::new(TokenType::Semicolon, Span::pos(pos))),
            ',' => Ok(Token::new(TokenType::Comma, Span::pos(pos))),
            ':' => Ok(Token::new(TokenType::Colon, Span::pos(pos))),
            '+' => Ok(Token::new(TokenType::Plus, Span::pos(pos))),
            '*' => Ok(Token::new(TokenType::Star, Span::pos(pos))),
            '%' => Ok(Token::new(TokenType::Percent, Span::pos(pos))),
            '/' if self.input.peek() == Some('/') => {
                while !matches!(self.input.peek(), Some('\n') | None) {
                    self.input.next()?;
                }
                self.produce()
            }
            '/' => Ok(Token::new(TokenType::Slash, Span::pos(pos))),
            '=' => self.input.select_peek(TokenType::Equal, pos, |ch| match ch {
                '=' => Some(TokenType::EqualEqual),
                _ => None,
            }),
            '<' => self
                .input
                .select_peek(TokenType::LessThan, pos, |ch| match ch {
                    '=' => Some(TokenType::LessThanEqual),
                    _ => None,
                }),
            '>' => self
                .input
                .select_peek(TokenType::GreaterThan, pos, |ch| match ch {
                    '=' => Some(TokenType::GreaterThanEqual),
                    _ => None,
                }),
            '!' => self.input.select_peek(TokenType::Bang, pos, |ch| match ch {
                '=' => Some(TokenType::BangEqual),
                _ => None,
            }),
            '-' => self.input.select_peek(TokenType::Minus, pos, |ch| match ch {
                '>' => Some(TokenType::Arrow),
                _ => None,
            }),
            '&' => self
                .input
                .select_peek(TokenType::AddressOf, pos, |ch| match ch {
                    '&' => Some(TokenType::LogicalAnd),
                    _ => None,
                }),
            '|' => self.input.expect_peek('|', pos, TokenType::LogicalOr),
            '(' => Ok(Token::new(TokenType::OpenParen, Span::pos(pos))),
            ')' => Ok(Token::new(TokenType::CloseParen, Span::pos(pos))),
            '[' => Ok(Token::new(TokenType::OpenBracket, Span::pos(pos))),
            ']' => Ok(Token::new(TokenType::CloseBracket, Span::pos(pos))),
            '{' => Ok(Token::new(TokenType::OpenBrace, Span::pos(pos))),
            '}' => Ok(Token::new(TokenType::CloseBrace, Span::pos(pos))),
            ' ' | '\t' | '\n' | '\r' => self.produce(),
            unrecognized_char => Err(ParseError::from(UnexpectedCharacterError {
                ch: unrecognized_char,
                span: Span::pos(pos),
            })),
        }
    }

    fn produce_integer_literal(&mut self, ch: char, start: SourcePosition) -> ParseResult<Token> {
        let mut buf = String::from(ch);
        while let Some(ch) = self.input.peek().filter(|ch| ch.is_ascii_digit()) {
            self.input.next()?;
            buf.push(ch);
        }
        let span = Span::new(start..self.pos());
        // Octal-looking literals are rejected outright
        if buf.starts_with('0') && buf.len() > 1 {
            return Err(ParseError::from(InvalidIntegerLiteralError { buf, span }));
        }
        match buf.parse::<u64>() {
            Ok(value) => Ok(Token::new(TokenType::IntegerLiteral(value), span)),
            Err(_) => Err(ParseError::from(InvalidIntegerLiteralError { buf, span })),
        }
    }

    fn produce_keyword_or_identifier(
        &mut self,
        ch: char,
        start: SourcePosition,
    ) -> ParseResult<Token> {
        let mut buf = String::from(ch);
        while let Some(ch) = self
            .input
            .peek()
            .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        {
            self.input.next()?;
            buf.push(ch);
        }
        let ty = match buf.as_str() {
            "fn" => TokenType::KeywordFn,
            "extern" => TokenType::KeywordExtern,
            "struct" => TokenType::KeywordStruct,
            "const" => TokenType::KeywordConst,
            "let" => TokenType::KeywordLet,
            "mut" => TokenType::KeywordMut,
            "if" => TokenType::KeywordIf,
            "else" => TokenType::KeywordElse,
            "while" => TokenType::KeywordWhile,
            "return" => TokenType::KeywordReturn,
            "break" => TokenType::KeywordBreak,
            "continue" => TokenType::KeywordContinue,
            "comptime" => TokenType::KeywordComptime,
            "new" => TokenType::KeywordNew,
            "as" => TokenType::KeywordAs,
            "undefined" => TokenType::KeywordUndefined,
            "true" => TokenType::BooleanLiteral(true),
            "false" => TokenType::BooleanLiteral(false),
            _ => TokenType::Identifier(buf),
        };
        Ok(Token::new(ty, Span::new(start..self.pos())))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Lexer, ParseError, Token, TokenType};
    use ember_macros::{assert_err, assert_matches, assert_ok};
    use ember_span::Span;

    macro_rules! assert_lexer_parse {
        ($input:expr, $($token:expr),*) => {
            let mut lexer = Lexer::new($input);
            $(
                let tok = assert_ok!(lexer.produce());
                assert_eq!(tok, $token);
            )*
            assert_matches!(lexer.produce(), Err(ParseError::UnexpectedEndOfFile(_)));
        }
    }

    #[test]
    fn test_lex_integer_literal() {
        assert_lexer_parse!(
            "123 4",
            Token::new(TokenType::IntegerLiteral(123), Span::new(0..3)),
            Token::new(TokenType::IntegerLiteral(4), Span::new(4..5))
        );
        assert_lexer_parse!(
            "18446744073709551615",
            Token::new(TokenType::IntegerLiteral(u64::MAX), Span::new(0..20))
        );
        let mut lexer = Lexer::new("0123");
        let err = assert_err!(lexer.produce());
        let (buf, span) = assert_matches!(err, ParseError::InvalidIntegerLiteral(e) => (e.buf, e.span));
        assert_eq!(buf, "0123");
        assert_eq!(span, Span::new(0..4));
        let mut lexer = Lexer::new("18446744073709551616");
        assert_matches!(lexer.produce(), Err(ParseError::InvalidIntegerLiteral(_)));
    }

    #[test]
    fn test_lex_keywords_and_identifiers() {
        assert_lexer_parse!(
            "comptime undefined x_1",
            Token::new(TokenType::KeywordComptime, Span::new(0..8)),
            Token::new(TokenType::KeywordUndefined, Span::new(9..18)),
            Token::new(TokenType::Identifier("x_1".to_string()), Span::new(19..22))
        );
        assert_lexer_parse!(
            "true false",
            Token::new(TokenType::BooleanLiteral(true), Span::new(0..4)),
            Token::new(TokenType::BooleanLiteral(false), Span::new(5..10))
        );
    }

    #[test]
    fn test_lex_compound_operators() {
        assert_lexer_parse!(
            "&& & || -> <= < == !=",
            Token::new(TokenType::LogicalAnd, Span::new(0..2)),
            Token::new(TokenType::AddressOf, Span::new(3..4)),
            Token::new(TokenType::LogicalOr, Span::new(5..7)),
            Token::new(TokenType::Arrow, Span::new(8..10)),
            Token::new(TokenType::LessThanEqual, Span::new(11..13)),
            Token::new(TokenType::LessThan, Span::new(14..15)),
            Token::new(TokenType::EqualEqual, Span::new(16..18)),
            Token::new(TokenType::BangEqual, Span::new(19..21))
        );
    }

    #[test]
    fn test_lex_skips_line_comments() {
        assert_lexer_parse!(
            "1 // the rest is ignored\n/ 2",
            Token::new(TokenType::IntegerLiteral(1), Span::new(0..1)),
            Token::new(TokenType::Slash, Span::new(25..26)),
            Token::new(TokenType::IntegerLiteral(2), Span::new(27..28))
        );
    }

    #[test]
    fn test_lex_rejects_lone_pipe_and_unknown_characters() {
        let mut lexer = Lexer::new("|");
        let err = assert_err!(lexer.produce());
        assert_matches!(err, ParseError::UnfinishedToken(e) => assert_eq!(e.expected, '|'));
        let mut lexer = Lexer::new("$");
        let err = assert_err!(lexer.produce());
        assert_matches!(err, ParseError::UnexpectedCharacter(e) => assert_eq!(e.ch, '$'));
    }
}
