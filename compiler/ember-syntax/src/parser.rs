use crate::{
    AstArrayExpr, AstArrayType, AstAssignExpr, AstBinaryOp, AstBinaryOpExpr, AstBlockExpr,
    AstBooleanLiteralExpr, AstBooleanType, AstBracketIndexExpr, AstBreakStmt, AstCallExpr,
    AstCastExpr, AstComptimeExpr, AstConstItem, AstConstructExpr, AstConstructorExprArgument,
    AstContinueStmt, AstDotIndexExpr, AstExpr, AstExprStmt, AstFunctionItem,
    AstFunctionParameterItem, AstGroupExpr, AstIdentifier, AstIfExpr, AstIntegerLiteralExpr,
    AstIntegerType, AstItem, AstLetStmt, AstNamedType, AstPointerType, AstReferenceExpr,
    AstReturnStmt, AstStmt, AstStructFieldItem, AstStructItem, AstTranslationUnit, AstType,
    AstUndefinedLiteralExpr, AstUnaryOp, AstUnaryOpExpr, AstUnitType, AstWhileExpr, Lexer,
    ParseError, ParseResult, Token, TokenType, UnexpectedEndOfFileError, UnexpectedTokenError,
};
use ember_span::Span;

pub struct ParserInput<'a, 'src> {
    lexer: &'a mut Lexer<'src>,
    /// Buffer for the single token of lookahead the grammar needs.
    la: Option<Token>,
}

impl<'a, 'src> ParserInput<'a, 'src> {
    pub fn new(lexer: &'a mut Lexer<'src>) -> Self {
        Self { lexer, la: None }
    }

    /// Perform a single token lookahead.
    ///
    /// Reaching the end of input is not an error here; it yields `None`.
    pub fn lookahead(&mut self) -> ParseResult<Option<&Token>> {
        if self.la.is_none() {
            self.la = match self.lexer.produce() {
                Ok(tok) => Some(tok),
                Err(ParseError::UnexpectedEndOfFile(_)) => None,
                Err(err) => return Err(err),
            };
        }
        Ok(self.la.as_ref())
    }

    pub fn eat(&mut self) -> ParseResult<Token> {
        if let Some(token) = self.la.take() {
            return Ok(token);
        }
        self.lexer.produce()
    }
}

pub struct Parser<'a, 'src> {
    input: ParserInput<'a, 'src>,
}

impl<'a, 'src> Parser<'a, 'src> {
    pub fn new(lexer: &'a mut Lexer<'src>) -> Self {
        Self {
            input: ParserInput::new(lexer),
        }
    }

    pub fn eat(&mut self) -> ParseResult<Token> {
        self.input.eat()
    }

    pub fn lookahead(&mut self) -> ParseResult<Option<&Token>> {
        self.input.lookahead()
    }

    /// Get a copy of the next token's type, or `None` at the end of input.
    pub fn lookahead_ty(&mut self) -> ParseResult<Option<TokenType>> {
        Ok(self.input.lookahead()?.map(|t| t.ty.clone()))
    }

    /// Peek at the next token, failing the parser at the end of input.
    pub fn lookahead_or_err(&mut self) -> ParseResult<&Token> {
        let pos = self.input.lexer.pos();
        self.input
            .lookahead()?
            .ok_or(ParseError::UnexpectedEndOfFile(UnexpectedEndOfFileError {
                span: Span::new(pos..pos),
            }))
    }

    pub fn lookahead_check(&mut self, ty: &TokenType) -> ParseResult<bool> {
        match self.lookahead()? {
            Some(token) => Ok(token.ty == *ty),
            None => Ok(false),
        }
    }

    /// Consume the next token and ensure it has type `ty`.
    pub fn check(&mut self, ty: &TokenType) -> ParseResult<Token> {
        let token = self.eat()?;
        if token.ty == *ty {
            return Ok(token);
        }
        Err(Self::unexpected(token))
    }

    /// Ensure that the whole input has been consumed.
    pub fn expect_end_of_input(&mut self) -> ParseResult<()> {
        if self.lookahead()?.is_some() {
            let token = self.eat()?;
            return Err(Self::unexpected(token));
        }
        Ok(())
    }

    fn unexpected(token: Token) -> ParseError {
        ParseError::UnexpectedToken(UnexpectedTokenError {
            span: token.span,
            token,
        })
    }

    /// Apply `f` until the next token is `circuit_breaker`, consuming one `delimiter` between each
    /// application. A trailing delimiter is permitted. The circuit breaker is not consumed.
    pub fn parser_combinator_delimited<T, F>(
        &mut self,
        delimiter: &TokenType,
        circuit_breaker: &TokenType,
        f: F,
    ) -> ParseResult<Vec<T>>
    where
        F: Fn(&mut Self) -> ParseResult<T>,
    {
        let mut items = Vec::new();
        while !self.lookahead_check(circuit_breaker)? {
            items.push(f(self)?);
            if !self.lookahead_check(circuit_breaker)? {
                self.check(delimiter)?;
            }
        }
        Ok(items)
    }

    /// Apply `f` only if the next token satisfies `matcher`.
    pub fn parser_combinator_take_if<T, F, M>(&mut self, matcher: M, f: F) -> ParseResult<Option<T>>
    where
        F: FnOnce(&mut Self) -> ParseResult<T>,
        M: FnOnce(&Token) -> bool,
    {
        match self.lookahead()? {
            Some(token) if matcher(token) => Ok(Some(f(self)?)),
            _ => Ok(None),
        }
    }
}

impl Parser<'_, '_> {
    pub fn parse(&mut self) -> ParseResult<AstTranslationUnit> {
        self.parse_translation_unit()
    }

    /// Parse a translation unit.
    ///
    /// ```text
    /// translation_unit ::= item*
    /// ```
    pub fn parse_translation_unit(&mut self) -> ParseResult<AstTranslationUnit> {
        let mut items = Vec::new();
        while self.lookahead()?.is_some() {
            items.push(self.parse_item()?);
        }
        Ok(AstTranslationUnit { items })
    }

    /// Parse an item.
    ///
    /// ```text
    /// item ::= fn_item | extern_fn_item | struct_item | const_item
    /// ```
    pub fn parse_item(&mut self) -> ParseResult<AstItem> {
        let ty = self.lookahead_or_err()?.ty.clone();
        let node = match ty {
            TokenType::KeywordFn | TokenType::KeywordExtern => {
                AstItem::Function(self.parse_fn_item()?)
            }
            TokenType::KeywordStruct => AstItem::Struct(self.parse_struct_item()?),
            TokenType::KeywordConst => AstItem::Const(self.parse_const_item()?),
            _ => {
                let token = self.eat()?;
                return Err(Self::unexpected(token));
            }
        };
        Ok(node)
    }

    /// Parse a function item. Extern functions end in a semicolon instead of a body.
    ///
    /// ```text
    /// fn_item ::= FN IDENTIFIER OPEN_PAREN (fn_parameter_item COMMA)* CLOSE_PAREN
    ///             (ARROW type)? block_expr
    /// extern_fn_item ::= EXTERN FN IDENTIFIER OPEN_PAREN (fn_parameter_item COMMA)* CLOSE_PAREN
    ///                    (ARROW type)? SEMICOLON
    /// ```
    pub fn parse_fn_item(&mut self) -> ParseResult<AstFunctionItem> {
        let external = self.parser_combinator_take_if(
            |t| t.ty == TokenType::KeywordExtern,
            |p| p.check(&TokenType::KeywordExtern),
        )?;
        let start = self.check(&TokenType::KeywordFn)?;
        let start_span = external.as_ref().map(|t| t.span).unwrap_or(start.span);
        let name = self.parse_identifier()?;
        self.check(&TokenType::OpenParen)?;
        let parameters =
            self.parser_combinator_delimited(&TokenType::Comma, &TokenType::CloseParen, |p| {
                p.parse_fn_parameter_item()
            })?;
        self.check(&TokenType::CloseParen)?;
        let return_type = self.parser_combinator_take_if(
            |t| t.ty == TokenType::Arrow,
            |p| {
                p.check(&TokenType::Arrow)?;
                p.parse_type()
            },
        )?;
        if external.is_some() {
            let end = self.check(&TokenType::Semicolon)?;
            return Ok(AstFunctionItem {
                span: Span::from_pair(&start_span, &end.span),
                name,
                parameters,
                return_type,
                body: None,
            });
        }
        let body = self.parse_block_expr()?;
        let node = AstFunctionItem {
            span: Span::from_pair(&start_span, &body.span),
            name,
            parameters,
            return_type,
            body: Some(body),
        };
        Ok(node)
    }

    /// ```text
    /// fn_parameter_item ::= IDENTIFIER COLON type
    /// ```
    pub fn parse_fn_parameter_item(&mut self) -> ParseResult<AstFunctionParameterItem> {
        let name = self.parse_identifier()?;
        self.check(&TokenType::Colon)?;
        let ty = self.parse_type()?;
        Ok(AstFunctionParameterItem {
            span: Span::from_pair(&name.span, &ty.span()),
            name,
            ty,
        })
    }

    /// ```text
    /// struct_item ::= STRUCT IDENTIFIER OPEN_BRACE (struct_field_item COMMA)* CLOSE_BRACE
    /// struct_field_item ::= IDENTIFIER COLON type
    /// ```
    pub fn parse_struct_item(&mut self) -> ParseResult<AstStructItem> {
        let start = self.check(&TokenType::KeywordStruct)?;
        let name = self.parse_identifier()?;
        self.check(&TokenType::OpenBrace)?;
        let fields =
            self.parser_combinator_delimited(&TokenType::Comma, &TokenType::CloseBrace, |p| {
                let name = p.parse_identifier()?;
                p.check(&TokenType::Colon)?;
                let ty = p.parse_type()?;
                Ok(AstStructFieldItem {
                    span: Span::from_pair(&name.span, &ty.span()),
                    name,
                    ty,
                })
            })?;
        let end = self.check(&TokenType::CloseBrace)?;
        Ok(AstStructItem {
            span: Span::from_pair(&start.span, &end.span),
            name,
            fields,
        })
    }

    /// ```text
    /// const_item ::= CONST IDENTIFIER (COLON type)? EQUAL expr SEMICOLON
    /// ```
    pub fn parse_const_item(&mut self) -> ParseResult<AstConstItem> {
        let start = self.check(&TokenType::KeywordConst)?;
        let name = self.parse_identifier()?;
        let ty = self.parser_combinator_take_if(
            |t| t.ty == TokenType::Colon,
            |p| {
                p.check(&TokenType::Colon)?;
                p.parse_type()
            },
        )?;
        self.check(&TokenType::Equal)?;
        let value = self.parse_expr()?;
        let end = self.check(&TokenType::Semicolon)?;
        Ok(AstConstItem {
            span: Span::from_pair(&start.span, &end.span),
            name,
            ty,
            value,
        })
    }

    /// Parse a statement that is introduced by a keyword.
    ///
    /// ```text
    /// stmt ::= let_stmt | return_stmt | break_stmt | continue_stmt | expr_stmt
    /// ```
    ///
    /// Expression statements are handled by [`Parser::parse_block_expr`], since whether an
    /// expression is a statement or the block's tail depends on what follows it.
    pub fn parse_stmt(&mut self) -> ParseResult<AstStmt> {
        let ty = self.lookahead_or_err()?.ty.clone();
        let node = match ty {
            TokenType::KeywordLet => AstStmt::Let(self.parse_let_stmt()?),
            TokenType::KeywordReturn => AstStmt::Return(self.parse_return_stmt()?),
            TokenType::KeywordBreak => {
                let start = self.check(&TokenType::KeywordBreak)?;
                let end = self.check(&TokenType::Semicolon)?;
                AstStmt::Break(AstBreakStmt {
                    span: Span::from_pair(&start.span, &end.span),
                })
            }
            TokenType::KeywordContinue => {
                let start = self.check(&TokenType::KeywordContinue)?;
                let end = self.check(&TokenType::Semicolon)?;
                AstStmt::Continue(AstContinueStmt {
                    span: Span::from_pair(&start.span, &end.span),
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                let end = self.check(&TokenType::Semicolon)?;
                AstStmt::Expr(AstExprStmt {
                    span: Span::from_pair(&expr.span(), &end.span),
                    expr,
                })
            }
        };
        Ok(node)
    }

    /// ```text
    /// let_stmt ::= LET MUT? IDENTIFIER (COLON type)? EQUAL expr SEMICOLON
    /// ```
    pub fn parse_let_stmt(&mut self) -> ParseResult<AstLetStmt> {
        let start = self.check(&TokenType::KeywordLet)?;
        let mutable = self
            .parser_combinator_take_if(
                |t| t.ty == TokenType::KeywordMut,
                |p| p.check(&TokenType::KeywordMut),
            )?
            .is_some();
        let name = self.parse_identifier()?;
        let ty = self.parser_combinator_take_if(
            |t| t.ty == TokenType::Colon,
            |p| {
                p.check(&TokenType::Colon)?;
                p.parse_type()
            },
        )?;
        self.check(&TokenType::Equal)?;
        let value = self.parse_expr()?;
        let end = self.check(&TokenType::Semicolon)?;
        Ok(AstLetStmt {
            span: Span::from_pair(&start.span, &end.span),
            name,
            mutable,
            ty,
            value,
        })
    }

    /// ```text
    /// return_stmt ::= RETURN expr? SEMICOLON
    /// ```
    pub fn parse_return_stmt(&mut self) -> ParseResult<AstReturnStmt> {
        let start = self.check(&TokenType::KeywordReturn)?;
        let value =
            self.parser_combinator_take_if(|t| t.ty != TokenType::Semicolon, |p| p.parse_expr())?;
        let end = self.check(&TokenType::Semicolon)?;
        Ok(AstReturnStmt {
            span: Span::from_pair(&start.span, &end.span),
            value,
        })
    }

    /// Parse a block expression.
    ///
    /// ```text
    /// block_expr ::= OPEN_BRACE stmt* expr? CLOSE_BRACE
    /// ```
    ///
    /// Block-like expressions (`if`, `while`, `comptime` and nested blocks) in statement position
    /// do not need a trailing semicolon, and are never continued by a binary operator.
    pub fn parse_block_expr(&mut self) -> ParseResult<AstBlockExpr> {
        let start = self.check(&TokenType::OpenBrace)?;
        let mut stmts = Vec::new();
        let mut tail = None;
        while !self.lookahead_check(&TokenType::CloseBrace)? {
            let ty = self.lookahead_or_err()?.ty.clone();
            match ty {
                TokenType::KeywordLet
                | TokenType::KeywordReturn
                | TokenType::KeywordBreak
                | TokenType::KeywordContinue => {
                    stmts.push(self.parse_stmt()?);
                    continue;
                }
                _ => {}
            }
            let block_like = matches!(
                ty,
                TokenType::KeywordIf
                    | TokenType::KeywordWhile
                    | TokenType::KeywordComptime
                    | TokenType::OpenBrace
            );
            let expr = if block_like {
                self.parse_primary_expr()?
            } else {
                self.parse_expr()?
            };
            if self.lookahead_check(&TokenType::Semicolon)? {
                let end = self.check(&TokenType::Semicolon)?;
                stmts.push(AstStmt::Expr(AstExprStmt {
                    span: Span::from_pair(&expr.span(), &end.span),
                    expr,
                }));
            } else if self.lookahead_check(&TokenType::CloseBrace)? {
                tail = Some(Box::new(expr));
            } else if expr.is_block_like() {
                stmts.push(AstStmt::Expr(AstExprStmt {
                    span: expr.span(),
                    expr,
                }));
            } else {
                let token = self.eat()?;
                return Err(Self::unexpected(token));
            }
        }
        let end = self.check(&TokenType::CloseBrace)?;
        Ok(AstBlockExpr {
            span: Span::from_pair(&start.span, &end.span),
            stmts,
            tail,
        })
    }

    /// ```text
    /// expr ::= assign_expr
    /// ```
    pub fn parse_expr(&mut self) -> ParseResult<AstExpr> {
        self.parse_assign_expr()
    }

    /// Assignment is right-associative and binds weakest.
    ///
    /// ```text
    /// assign_expr ::= logical_or_expr (EQUAL assign_expr)?
    /// ```
    pub fn parse_assign_expr(&mut self) -> ParseResult<AstExpr> {
        let lhs = self.parse_logical_or_expr()?;
        if !self.lookahead_check(&TokenType::Equal)? {
            return Ok(lhs);
        }
        self.check(&TokenType::Equal)?;
        let rhs = self.parse_assign_expr()?;
        Ok(AstExpr::Assign(AstAssignExpr {
            span: Span::from_pair(&lhs.span(), &rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }))
    }

    /// ```text
    /// logical_or_expr ::= logical_and_expr (LOGICAL_OR logical_and_expr)*
    /// ```
    pub fn parse_logical_or_expr(&mut self) -> ParseResult<AstExpr> {
        self.parse_left_associative(
            |ty| match ty {
                TokenType::LogicalOr => Some(AstBinaryOp::Or),
                _ => None,
            },
            |p| p.parse_logical_and_expr(),
        )
    }

    /// ```text
    /// logical_and_expr ::= comparison_expr (LOGICAL_AND comparison_expr)*
    /// ```
    pub fn parse_logical_and_expr(&mut self) -> ParseResult<AstExpr> {
        self.parse_left_associative(
            |ty| match ty {
                TokenType::LogicalAnd => Some(AstBinaryOp::And),
                _ => None,
            },
            |p| p.parse_comparison_expr(),
        )
    }

    /// Comparisons do not chain.
    ///
    /// ```text
    /// comparison_expr ::= additive_expr (comparison_op additive_expr)?
    /// ```
    pub fn parse_comparison_expr(&mut self) -> ParseResult<AstExpr> {
        let lhs = self.parse_additive_expr()?;
        let op = match self.lookahead_ty()? {
            Some(TokenType::EqualEqual) => AstBinaryOp::Eq,
            Some(TokenType::BangEqual) => AstBinaryOp::Neq,
            Some(TokenType::LessThan) => AstBinaryOp::Lt,
            Some(TokenType::LessThanEqual) => AstBinaryOp::Lte,
            Some(TokenType::GreaterThan) => AstBinaryOp::Gt,
            Some(TokenType::GreaterThanEqual) => AstBinaryOp::Gte,
            _ => return Ok(lhs),
        };
        self.eat()?;
        let rhs = self.parse_additive_expr()?;
        Ok(AstExpr::BinaryOp(AstBinaryOpExpr {
            span: Span::from_pair(&lhs.span(), &rhs.span()),
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }))
    }

    /// ```text
    /// additive_expr ::= multiplicative_expr ((PLUS | MINUS) multiplicative_expr)*
    /// ```
    pub fn parse_additive_expr(&mut self) -> ParseResult<AstExpr> {
        self.parse_left_associative(
            |ty| match ty {
                TokenType::Plus => Some(AstBinaryOp::Add),
                TokenType::Minus => Some(AstBinaryOp::Sub),
                _ => None,
            },
            |p| p.parse_multiplicative_expr(),
        )
    }

    /// ```text
    /// multiplicative_expr ::= cast_expr ((STAR | SLASH | PERCENT) cast_expr)*
    /// ```
    pub fn parse_multiplicative_expr(&mut self) -> ParseResult<AstExpr> {
        self.parse_left_associative(
            |ty| match ty {
                TokenType::Star => Some(AstBinaryOp::Mul),
                TokenType::Slash => Some(AstBinaryOp::Div),
                TokenType::Percent => Some(AstBinaryOp::Rem),
                _ => None,
            },
            |p| p.parse_cast_expr(),
        )
    }

    fn parse_left_associative<S, F>(&mut self, select: S, operand: F) -> ParseResult<AstExpr>
    where
        S: Fn(&TokenType) -> Option<AstBinaryOp>,
        F: Fn(&mut Self) -> ParseResult<AstExpr>,
    {
        let mut lhs = operand(self)?;
        while let Some(op) = self.lookahead_ty()?.as_ref().and_then(&select) {
            self.eat()?;
            let rhs = operand(self)?;
            lhs = AstExpr::BinaryOp(AstBinaryOpExpr {
                span: Span::from_pair(&lhs.span(), &rhs.span()),
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    /// ```text
    /// cast_expr ::= unary_expr (AS type)*
    /// ```
    pub fn parse_cast_expr(&mut self) -> ParseResult<AstExpr> {
        let mut operand = self.parse_unary_expr()?;
        while self.lookahead_check(&TokenType::KeywordAs)? {
            self.check(&TokenType::KeywordAs)?;
            let ty = self.parse_type()?;
            operand = AstExpr::Cast(AstCastExpr {
                span: Span::from_pair(&operand.span(), &ty.span()),
                operand: Box::new(operand),
                ty,
            });
        }
        Ok(operand)
    }

    /// ```text
    /// unary_expr ::= (MINUS | BANG | STAR | ADDRESS_OF) unary_expr | postfix_expr
    /// ```
    pub fn parse_unary_expr(&mut self) -> ParseResult<AstExpr> {
        let op = match self.lookahead_ty()? {
            Some(TokenType::Minus) => AstUnaryOp::Neg,
            Some(TokenType::Bang) => AstUnaryOp::Not,
            Some(TokenType::Star) => AstUnaryOp::Deref,
            Some(TokenType::AddressOf) => AstUnaryOp::AddressOf,
            _ => return self.parse_postfix_expr(),
        };
        let start = self.eat()?;
        let operand = self.parse_unary_expr()?;
        Ok(AstExpr::UnaryOp(AstUnaryOpExpr {
            span: Span::from_pair(&start.span, &operand.span()),
            op,
            operand: Box::new(operand),
        }))
    }

    /// ```text
    /// postfix_expr ::= primary_expr (call_suffix | dot_suffix | bracket_suffix)*
    /// call_suffix ::= OPEN_PAREN (expr COMMA)* CLOSE_PAREN
    /// dot_suffix ::= DOT IDENTIFIER
    /// bracket_suffix ::= OPEN_BRACKET expr CLOSE_BRACKET
    /// ```
    pub fn parse_postfix_expr(&mut self) -> ParseResult<AstExpr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            expr = match self.lookahead_ty()? {
                Some(TokenType::OpenParen) => {
                    self.check(&TokenType::OpenParen)?;
                    let arguments = self.parser_combinator_delimited(
                        &TokenType::Comma,
                        &TokenType::CloseParen,
                        |p| p.parse_expr(),
                    )?;
                    let end = self.check(&TokenType::CloseParen)?;
                    AstExpr::Call(AstCallExpr {
                        span: Span::from_pair(&expr.span(), &end.span),
                        callee: Box::new(expr),
                        arguments,
                    })
                }
                Some(TokenType::Dot) => {
                    self.check(&TokenType::Dot)?;
                    let field = self.parse_identifier()?;
                    AstExpr::DotIndex(AstDotIndexExpr {
                        span: Span::from_pair(&expr.span(), &field.span),
                        origin: Box::new(expr),
                        field,
                    })
                }
                Some(TokenType::OpenBracket) => {
                    self.check(&TokenType::OpenBracket)?;
                    let index = self.parse_expr()?;
                    let end = self.check(&TokenType::CloseBracket)?;
                    AstExpr::BracketIndex(AstBracketIndexExpr {
                        span: Span::from_pair(&expr.span(), &end.span),
                        origin: Box::new(expr),
                        index: Box::new(index),
                    })
                }
                _ => return Ok(expr),
            };
        }
    }

    /// ```text
    /// primary_expr ::= INTEGER_LITERAL | BOOLEAN_LITERAL | UNDEFINED | IDENTIFIER
    ///                | OPEN_PAREN expr CLOSE_PAREN
    ///                | block_expr | if_expr | while_expr | comptime_expr
    ///                | construct_expr | array_expr
    /// ```
    pub fn parse_primary_expr(&mut self) -> ParseResult<AstExpr> {
        let ty = self.lookahead_or_err()?.ty.clone();
        let node = match ty {
            TokenType::IntegerLiteral(value) => {
                let token = self.eat()?;
                AstExpr::IntegerLiteral(AstIntegerLiteralExpr {
                    span: token.span,
                    value,
                })
            }
            TokenType::BooleanLiteral(value) => {
                let token = self.eat()?;
                AstExpr::BooleanLiteral(AstBooleanLiteralExpr {
                    span: token.span,
                    value,
                })
            }
            TokenType::KeywordUndefined => {
                let token = self.eat()?;
                AstExpr::UndefinedLiteral(AstUndefinedLiteralExpr { span: token.span })
            }
            TokenType::Identifier(_) => {
                let name = self.parse_identifier()?;
                AstExpr::Reference(AstReferenceExpr {
                    span: name.span,
                    name,
                })
            }
            TokenType::OpenParen => {
                let start = self.check(&TokenType::OpenParen)?;
                let inner = self.parse_expr()?;
                let end = self.check(&TokenType::CloseParen)?;
                AstExpr::Group(AstGroupExpr {
                    span: Span::from_pair(&start.span, &end.span),
                    inner: Box::new(inner),
                })
            }
            TokenType::OpenBrace => AstExpr::Block(self.parse_block_expr()?),
            TokenType::KeywordIf => AstExpr::If(self.parse_if_expr()?),
            TokenType::KeywordWhile => {
                let start = self.check(&TokenType::KeywordWhile)?;
                let condition = self.parse_expr()?;
                let body = self.parse_block_expr()?;
                AstExpr::While(AstWhileExpr {
                    span: Span::from_pair(&start.span, &body.span),
                    condition: Box::new(condition),
                    body,
                })
            }
            TokenType::KeywordComptime => {
                let start = self.check(&TokenType::KeywordComptime)?;
                let body = self.parse_block_expr()?;
                AstExpr::Comptime(AstComptimeExpr {
                    span: Span::from_pair(&start.span, &body.span),
                    body,
                })
            }
            TokenType::KeywordNew => AstExpr::Construct(self.parse_construct_expr()?),
            TokenType::OpenBracket => {
                let start = self.check(&TokenType::OpenBracket)?;
                let elements = self.parser_combinator_delimited(
                    &TokenType::Comma,
                    &TokenType::CloseBracket,
                    |p| p.parse_expr(),
                )?;
                let end = self.check(&TokenType::CloseBracket)?;
                AstExpr::Array(AstArrayExpr {
                    span: Span::from_pair(&start.span, &end.span),
                    elements,
                })
            }
            _ => {
                let token = self.eat()?;
                return Err(Self::unexpected(token));
            }
        };
        Ok(node)
    }

    /// ```text
    /// if_expr ::= IF expr block_expr (ELSE (if_expr | block_expr))?
    /// ```
    pub fn parse_if_expr(&mut self) -> ParseResult<AstIfExpr> {
        let start = self.check(&TokenType::KeywordIf)?;
        let condition = self.parse_expr()?;
        let happy_path = self.parse_block_expr()?;
        let unhappy_path = self.parser_combinator_take_if(
            |t| t.ty == TokenType::KeywordElse,
            |p| {
                p.check(&TokenType::KeywordElse)?;
                if p.lookahead_check(&TokenType::KeywordIf)? {
                    return Ok(AstExpr::If(p.parse_if_expr()?));
                }
                Ok(AstExpr::Block(p.parse_block_expr()?))
            },
        )?;
        let end = unhappy_path
            .as_ref()
            .map(|e| e.span())
            .unwrap_or(happy_path.span);
        Ok(AstIfExpr {
            span: Span::from_pair(&start.span, &end),
            condition: Box::new(condition),
            happy_path,
            unhappy_path: unhappy_path.map(Box::new),
        })
    }

    /// ```text
    /// construct_expr ::= NEW IDENTIFIER OPEN_BRACE (IDENTIFIER COLON expr COMMA)* CLOSE_BRACE
    /// ```
    pub fn parse_construct_expr(&mut self) -> ParseResult<AstConstructExpr> {
        let start = self.check(&TokenType::KeywordNew)?;
        let callee = self.parse_identifier()?;
        self.check(&TokenType::OpenBrace)?;
        let arguments =
            self.parser_combinator_delimited(&TokenType::Comma, &TokenType::CloseBrace, |p| {
                let field = p.parse_identifier()?;
                p.check(&TokenType::Colon)?;
                let expr = p.parse_expr()?;
                Ok(AstConstructorExprArgument {
                    span: Span::from_pair(&field.span, &expr.span()),
                    field,
                    expr,
                })
            })?;
        let end = self.check(&TokenType::CloseBrace)?;
        Ok(AstConstructExpr {
            span: Span::from_pair(&start.span, &end.span),
            callee,
            arguments,
        })
    }

    /// Parse a type.
    ///
    /// ```text
    /// type ::= builtin_type | IDENTIFIER | STAR type | OPEN_BRACKET expr CLOSE_BRACKET type
    /// builtin_type ::= i8 | i16 | i32 | i64 | u8 | u16 | u32 | u64 | bool | unit
    /// ```
    pub fn parse_type(&mut self) -> ParseResult<AstType> {
        let ty = self.lookahead_or_err()?.ty.clone();
        match ty {
            TokenType::Star => {
                let start = self.check(&TokenType::Star)?;
                let inner = self.parse_type()?;
                Ok(AstType::Pointer(AstPointerType {
                    span: Span::from_pair(&start.span, &inner.span()),
                    inner: Box::new(inner),
                }))
            }
            TokenType::OpenBracket => {
                let start = self.check(&TokenType::OpenBracket)?;
                let len = self.parse_expr()?;
                self.check(&TokenType::CloseBracket)?;
                let element = self.parse_type()?;
                Ok(AstType::Array(AstArrayType {
                    span: Span::from_pair(&start.span, &element.span()),
                    len: Box::new(len),
                    element: Box::new(element),
                }))
            }
            TokenType::Identifier(_) => {
                let name = self.parse_identifier()?;
                let span = name.span;
                let integer = |signed, bits| AstType::Integer(AstIntegerType { span, signed, bits });
                let node = match name.name.as_str() {
                    "i8" => integer(true, 8),
                    "i16" => integer(true, 16),
                    "i32" => integer(true, 32),
                    "i64" => integer(true, 64),
                    "u8" => integer(false, 8),
                    "u16" => integer(false, 16),
                    "u32" => integer(false, 32),
                    "u64" => integer(false, 64),
                    "bool" => AstType::Boolean(AstBooleanType { span }),
                    "unit" => AstType::Unit(AstUnitType { span }),
                    _ => AstType::Named(AstNamedType { span, name }),
                };
                Ok(node)
            }
            _ => {
                let token = self.eat()?;
                Err(Self::unexpected(token))
            }
        }
    }

    pub fn parse_identifier(&mut self) -> ParseResult<AstIdentifier> {
        let token = self.eat()?;
        match token.ty {
            TokenType::Identifier(name) => Ok(AstIdentifier {
                name,
                span: token.span,
            }),
            ty => Err(Self::unexpected(Token::new(ty, token.span))),
        }
    }
}
