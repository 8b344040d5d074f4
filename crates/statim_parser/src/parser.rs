//! Recursive-descent parser producing the AST in `ast.rs`.
//!
//! Structure is grounded in `original_source/scc/source/ast/Parser.cpp`
//! (top-level item dispatch) and `original_source/stmc/source/parser/
//! ParseExpr.cpp` (the precedence-climbing expression parser, prefix/postfix
//! unary chains, `cast<T>(...)`/`sizeof(T)` special forms). Named types
//! referenced before their declaration are minted as `NamedRef` placeholders
//! via `statim_types::TypeContext::named_ref` and resolved in a final pass
//! once every top-level item has been parsed, mirroring the type context's
//! deferred-name pool.

use smallvec::SmallVec;
use statim_common::SourceSpan;
use statim_lexer::{Token, TokenKind};
use statim_types::{FloatWidth, IntWidth, Qualifiers, TypeContext, TypeUse};
use thiserror::Error;

use crate::ast::*;
use crate::precedence::precedence;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected token {found}, expected {expected} at {span}")]
    Unexpected { found: String, expected: String, span: SourceSpan },
    #[error("unknown declaration starting with {found} at {span}")]
    UnknownItem { found: String, span: SourceSpan },
    #[error("undeclared names remain unresolved: {0:?}")]
    UnresolvedNames(Vec<String>),
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
    types: &'a mut TypeContext,
    file: String,
}

impl<'a> Parser<'a> {
    pub fn new(file: impl Into<String>, tokens: Vec<Token>, types: &'a mut TypeContext) -> Self {
        Self { tokens, pos: 0, ast: Ast::new(), types, file: file.into() }
    }

    /// Parses a full translation unit and returns the populated `Ast`
    /// together with the `DeclId` of its `TranslationUnitDecl`. Fails if any
    /// named type reference is never declared (spec §3.1's invariant that
    /// every deferred reference resolves before lowering runs).
    pub fn parse_translation_unit(mut self) -> ParseResult<(Ast, DeclId)> {
        let start = self.here();
        let mut decls = Vec::new();
        while !self.at_eof() {
            decls.push(self.parse_item()?);
        }
        let end = self.here();

        let unresolved = self.types.resolve_deferred();
        if !unresolved.is_empty() {
            return Err(ParseError::UnresolvedNames(unresolved));
        }

        let tu = TranslationUnitDecl { span: start.combine(&end), file: self.file.clone(), decls };
        let id = self.ast.push_decl(Decl::TranslationUnit(tu));
        Ok((self.ast, id))
    }

    // -- token stream helpers ----------------------------------------------

    fn here(&self) -> SourceSpan {
        self.tokens[self.pos].span.clone()
    }

    fn prev_span(&self) -> SourceSpan {
        self.tokens[self.pos.saturating_sub(1)].span.clone()
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].value
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn bump(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::Unexpected {
                found: self.peek().to_string(),
                expected: kind.to_string(),
                span: self.here(),
            })
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::Unexpected { found: other.to_string(), expected: "identifier".into(), span: self.here() }),
        }
    }

    // -- types ---------------------------------------------------------

    fn parse_type_use(&mut self) -> ParseResult<TypeUse> {
        let mut quals = Qualifiers::empty();
        if self.bump(&TokenKind::KeywordMut) {
            quals.insert(Qualifiers::MUT);
        }
        let ty = self.parse_type_core()?;
        Ok(TypeUse::new(ty, quals))
    }

    fn parse_type_core(&mut self) -> ParseResult<statim_types::TypeId> {
        if self.bump(&TokenKind::Star) {
            let pointee = self.parse_type_use()?;
            return Ok(self.types.pointer(pointee));
        }
        if self.bump(&TokenKind::LBracket) {
            let size = match self.peek().clone() {
                TokenKind::IntLiteral(n) => {
                    self.advance();
                    n as u32
                }
                other => {
                    return Err(ParseError::Unexpected { found: other.to_string(), expected: "array size".into(), span: self.here() })
                }
            };
            self.expect(TokenKind::RBracket)?;
            let elem = self.parse_type_use()?;
            return Ok(self.types.array(elem, size));
        }

        let name = self.expect_identifier()?;
        Ok(match name.as_str() {
            "void" => self.types.void(),
            "bool" => self.types.bool(),
            "char" => self.types.char(),
            "i8" => self.types.int(IntWidth::W8),
            "i16" => self.types.int(IntWidth::W16),
            "i32" => self.types.int(IntWidth::W32),
            "i64" => self.types.int(IntWidth::W64),
            "u8" => self.types.uint(IntWidth::W8),
            "u16" => self.types.uint(IntWidth::W16),
            "u32" => self.types.uint(IntWidth::W32),
            "u64" => self.types.uint(IntWidth::W64),
            "f32" => self.types.float(FloatWidth::W32),
            "f64" => self.types.float(FloatWidth::W64),
            "f128" => self.types.float(FloatWidth::W128),
            _ => self.types.named_ref(name),
        })
    }

    // -- top-level items -------------------------------------------------

    fn parse_item(&mut self) -> ParseResult<DeclId> {
        match self.peek().clone() {
            TokenKind::KeywordLoad => self.parse_load(),
            TokenKind::KeywordStruct => self.parse_struct(),
            TokenKind::KeywordEnum => self.parse_enum(),
            TokenKind::KeywordAlias => self.parse_alias(),
            TokenKind::KeywordFunc => self.parse_function(),
            TokenKind::KeywordVar => self.parse_global_variable(),
            other => Err(ParseError::UnknownItem { found: other.to_string(), span: self.here() }),
        }
    }

    fn parse_load(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'load'
        let path = match self.peek().clone() {
            TokenKind::StringLiteral(s) => {
                self.advance();
                s
            }
            other => return Err(ParseError::Unexpected { found: other.to_string(), expected: "string literal".into(), span: self.here() }),
        };
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_decl(Decl::Load(LoadDecl { span, path })))
    }

    fn parse_struct(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'struct'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let fstart = self.here();
            let fname = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type_use()?;
            let fspan = fstart.combine(&self.prev_span());
            fields.push(self.ast.push_decl(Decl::Field(FieldDecl { span: fspan, name: fname, ty })));
            if !self.bump(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        let span = start.combine(&self.prev_span());

        let field_uses: Vec<TypeUse> = fields
            .iter()
            .map(|id| match self.ast.decl(*id) {
                Decl::Field(f) => f.ty,
                _ => unreachable!(),
            })
            .collect();
        self.types.declare_struct(name.clone(), field_uses);

        Ok(self.ast.push_decl(Decl::Struct(StructDecl { span, name, fields })))
    }

    fn parse_enum(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'enum'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let underlying = self.parse_type_use()?;
        self.expect(TokenKind::LBrace)?;

        let mut variants = Vec::new();
        let mut next_value: i64 = 0;
        let mut enum_variants = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let vstart = self.here();
            let vname = self.expect_identifier()?;
            let value = if self.bump(&TokenKind::Eq) {
                match self.peek().clone() {
                    TokenKind::IntLiteral(n) => {
                        self.advance();
                        n as i64
                    }
                    other => {
                        return Err(ParseError::Unexpected { found: other.to_string(), expected: "integer".into(), span: self.here() })
                    }
                }
            } else {
                next_value
            };
            next_value = value + 1;
            let vspan = vstart.combine(&self.prev_span());
            variants.push(self.ast.push_decl(Decl::Variant(VariantDecl { span: vspan, name: vname.clone(), ty: underlying, value })));
            enum_variants.push(statim_types::EnumVariant { name: vname, value });
            if !self.bump(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        let span = start.combine(&self.prev_span());

        self.types.declare_enum(name.clone(), underlying.ty(), enum_variants);

        Ok(self.ast.push_decl(Decl::Enum(EnumDecl { span, name, underlying, variants })))
    }

    fn parse_alias(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'alias'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Eq)?;
        let underlying = self.parse_type_use()?;
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());

        self.types.declare_alias(name.clone(), underlying);

        Ok(self.ast.push_decl(Decl::Alias(AliasDecl { span, name, underlying })))
    }

    fn parse_global_variable(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'var'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_use()?;
        let init = if self.bump(&TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_decl(Decl::Variable(VariableDecl { span, name, ty, init, is_global: true })))
    }

    fn parse_function(&mut self) -> ParseResult<DeclId> {
        let start = self.here();
        self.advance(); // 'func'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let pstart = self.here();
            let pname = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let pty = self.parse_type_use()?;
            let pspan = pstart.combine(&self.prev_span());
            params.push(self.ast.push_decl(Decl::Parameter(ParameterDecl { span: pspan, name: pname, ty: pty })));
            if !self.bump(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = if self.bump(&TokenKind::Arrow) { self.parse_type_use()? } else { TypeUse::unqualified(self.types.void()) };

        let body = if self.at(&TokenKind::LBrace) { Some(self.parse_block()?) } else { self.expect(TokenKind::Semicolon)?; None };

        let span = start.combine(&self.prev_span());
        let linkage = if name == "main" || body.is_none() { Linkage::External } else { Linkage::Internal };

        Ok(self.ast.push_decl(Decl::Function(FunctionDecl { span, name, ret, params, body, linkage })))
    }

    // -- statements -------------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_stmt(Stmt::Block(BlockStmt { span, stmts })))
    }

    fn parse_stmt(&mut self) -> ParseResult<StmtId> {
        match self.peek().clone() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::KeywordVar => self.parse_local_decl(),
            TokenKind::KeywordReturn => self.parse_ret(),
            TokenKind::KeywordIf => self.parse_if(),
            TokenKind::KeywordWhile => self.parse_while(),
            TokenKind::KeywordBreak => {
                let start = self.here();
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(self.ast.push_stmt(Stmt::Break(start.combine(&self.prev_span()))))
            }
            TokenKind::KeywordContinue => {
                let start = self.here();
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(self.ast.push_stmt(Stmt::Continue(start.combine(&self.prev_span()))))
            }
            TokenKind::KeywordAsm => self.parse_asm(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(self.ast.push_stmt(Stmt::Expr(expr)))
            }
        }
    }

    fn parse_local_decl(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.advance(); // 'var'
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_use()?;
        let init = if self.bump(&TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());
        let decl = self.ast.push_decl(Decl::Variable(VariableDecl { span: span.clone(), name, ty, init, is_global: false }));
        Ok(self.ast.push_stmt(Stmt::Decl(DeclStmt { span, decl })))
    }

    fn parse_ret(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.advance(); // 'return'
        let value = if self.at(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_stmt(Stmt::Ret(RetStmt { span, value })))
    }

    fn parse_if(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.advance(); // 'if'
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_stmt()?;
        let else_branch = if self.bump(&TokenKind::KeywordElse) { Some(self.parse_stmt()?) } else { None };
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_stmt(Stmt::If(IfStmt { span, cond, then_branch, else_branch })))
    }

    fn parse_while(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.advance(); // 'while'
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_stmt(Stmt::While(WhileStmt { span, cond, body })))
    }

    /// `asm("template", "constraints")(arg, ...);`
    fn parse_asm(&mut self) -> ParseResult<StmtId> {
        let start = self.here();
        self.advance(); // 'asm'
        self.expect(TokenKind::LParen)?;
        let template = self.expect_string()?;
        self.expect(TokenKind::Comma)?;
        let constraints = self.expect_string()?;
        self.expect(TokenKind::RParen)?;

        let mut args = Vec::new();
        if self.bump(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                args.push(self.parse_expr()?);
                if !self.bump(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Semicolon)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_stmt(Stmt::Asm(AsmStmt { span, template, constraints, args })))
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(ParseError::Unexpected { found: other.to_string(), expected: "string literal".into(), span: self.here() }),
        }
    }

    // -- expressions -------------------------------------------------------

    fn placeholder_type(&self) -> TypeUse {
        TypeUse::unqualified(self.types.void())
    }

    pub fn parse_expr(&mut self) -> ParseResult<ExprId> {
        let base = self.parse_prefix_unary()?;
        self.parse_binary(base, 0)
    }

    fn binary_operator(kind: &TokenKind) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        Some(match kind {
            TokenKind::Eq => Assign,
            TokenKind::EqEq => Eq,
            TokenKind::BangEq => Ne,
            TokenKind::Plus => Add,
            TokenKind::Minus => Sub,
            TokenKind::Star => Mul,
            TokenKind::Slash => Div,
            TokenKind::Percent => Rem,
            TokenKind::Lt => Lt,
            TokenKind::LtEq => Le,
            TokenKind::Gt => Gt,
            TokenKind::GtEq => Ge,
            TokenKind::Shl => Shl,
            TokenKind::Shr => Shr,
            TokenKind::Amp => And,
            TokenKind::AmpAmp => LogicalAnd,
            TokenKind::Pipe => Or,
            TokenKind::PipePipe => LogicalOr,
            TokenKind::Caret => Xor,
            _ => return None,
        })
    }

    fn parse_binary(&mut self, mut base: ExprId, min_precedence: i32) -> ParseResult<ExprId> {
        loop {
            let Some(op) = Self::binary_operator(self.peek()) else { break };
            let curr = precedence(op);
            if curr < min_precedence {
                break;
            }
            self.advance();
            let mut rhs = self.parse_prefix_unary()?;

            if let Some(next_op) = Self::binary_operator(self.peek()) {
                if curr < precedence(next_op) {
                    rhs = self.parse_binary(rhs, min_precedence + 1)?;
                }
            }

            let span = self.ast.expr(base).span.combine(&self.ast.expr(rhs).span);
            base = self.ast.push_expr(Expr {
                span,
                ty: self.placeholder_type(),
                kind: ExprKind::BinaryOp(BinaryOpExpr { op, lhs: base, rhs }),
            });
        }
        Ok(base)
    }

    fn unary_operator(kind: &TokenKind) -> Option<UnaryOperator> {
        use UnaryOperator::*;
        Some(match kind {
            TokenKind::Bang => Not,
            TokenKind::Minus => Neg,
            TokenKind::Tilde => BitNot,
            TokenKind::Star => Dereference,
            TokenKind::Amp => AddressOf,
            _ => return None,
        })
    }

    fn parse_prefix_unary(&mut self) -> ParseResult<ExprId> {
        if let Some(op) = Self::unary_operator(self.peek()) {
            let start = self.here();
            self.advance();
            let operand = self.parse_prefix_unary()?;
            let span = start.combine(&self.ast.expr(operand).span);
            return Ok(self.ast.push_expr(Expr { span, ty: self.placeholder_type(), kind: ExprKind::UnaryOp(UnaryOpExpr { op, operand }) }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<ExprId> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let span = self.ast.expr(expr).span.combine(&self.prev_span());
                    expr = self.ast.push_expr(Expr {
                        span,
                        ty: self.placeholder_type(),
                        kind: ExprKind::Subscript(SubscriptExpr { base: expr, index }),
                    });
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args: SmallVec<[ExprId; 4]> = SmallVec::new();
                    while !self.at(&TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        if !self.bump(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let span = self.ast.expr(expr).span.combine(&self.prev_span());
                    expr = self.ast.push_expr(Expr { span, ty: self.placeholder_type(), kind: ExprKind::Call(CallExpr { callee: expr, args }) });
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    let span = self.ast.expr(expr).span.combine(&self.prev_span());
                    expr = self.ast.push_expr(Expr {
                        span,
                        ty: self.placeholder_type(),
                        kind: ExprKind::Access(AccessExpr { base: expr, field, resolved_field: None }),
                    });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<ExprId> {
        let start = self.here();
        match self.peek().clone() {
            TokenKind::IntLiteral(n) => {
                self.advance();
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(self.types.int(IntWidth::W64)), kind: ExprKind::IntLit(n) }))
            }
            TokenKind::FloatLiteral(text) => {
                self.advance();
                let value: f64 = text.parse().unwrap_or(0.0);
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(self.types.float(FloatWidth::W64)), kind: ExprKind::FloatLit(value) }))
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(self.types.char()), kind: ExprKind::CharLit(c) }))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                let char_use = TypeUse::unqualified(self.types.char());
                let str_ty = self.types.pointer(char_use);
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(str_ty), kind: ExprKind::StringLit(s) }))
            }
            TokenKind::KeywordTrue | TokenKind::KeywordFalse => {
                let value = matches!(self.peek(), TokenKind::KeywordTrue);
                self.advance();
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(self.types.bool()), kind: ExprKind::BoolLit(value) }))
            }
            TokenKind::KeywordNull => {
                self.advance();
                let void_use = TypeUse::unqualified(self.types.void());
                let ptr = self.types.pointer(void_use);
                Ok(self.ast.push_expr(Expr { span: start, ty: TypeUse::unqualified(ptr), kind: ExprKind::NullLit }))
            }
            TokenKind::KeywordSizeof => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let ty = self.parse_type_use()?;
                self.expect(TokenKind::RParen)?;
                let span = start.combine(&self.prev_span());
                Ok(self.ast.push_expr(Expr { span, ty: TypeUse::unqualified(self.types.uint(IntWidth::W64)), kind: ExprKind::Sizeof(ty) }))
            }
            TokenKind::Identifier(name) if name == "cast" => self.parse_cast(start),
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(self.ast.push_expr(Expr { span: start, ty: self.placeholder_type(), kind: ExprKind::DeclRef(DeclRefExpr { name, resolved: None }) }))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let span = start.combine(&self.prev_span());
                Ok(self.ast.push_expr(Expr { span, ty: self.placeholder_type(), kind: ExprKind::Paren(inner) }))
            }
            other => Err(ParseError::Unexpected { found: other.to_string(), expected: "expression".into(), span: self.here() }),
        }
    }

    fn parse_cast(&mut self, start: SourceSpan) -> ParseResult<ExprId> {
        self.advance(); // 'cast'
        self.expect(TokenKind::Lt)?;
        let target = self.parse_type_use()?;
        self.expect(TokenKind::Gt)?;
        self.expect(TokenKind::LParen)?;
        let operand = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let span = start.combine(&self.prev_span());
        Ok(self.ast.push_expr(Expr { span, ty: target, kind: ExprKind::Cast(CastExpr { target, operand }) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statim_lexer::Lexer;

    fn parse(src: &str) -> (Ast, DeclId, TypeContext) {
        let mut types = TypeContext::new();
        let tokens = Lexer::new("test.stm", src).tokenize().unwrap();
        let (ast, id) = Parser::new("test.stm", tokens, &mut types).parse_translation_unit().unwrap();
        (ast, id, types)
    }

    #[test]
    fn parses_trivial_main() {
        let (ast, id, _types) = parse("func main() -> i64 { return 0; }");
        let Decl::TranslationUnit(tu) = ast.decl(id) else { panic!() };
        assert_eq!(tu.decls.len(), 1);
        let Decl::Function(f) = ast.decl(tu.decls[0]) else { panic!() };
        assert_eq!(f.name, "main");
        assert_eq!(f.linkage, Linkage::External);
    }

    #[test]
    fn parses_binary_precedence() {
        let (ast, id, _types) = parse("func f(a: i32, b: i32, c: i32) -> i32 { return a + b * c; }");
        let Decl::TranslationUnit(tu) = ast.decl(id) else { panic!() };
        let Decl::Function(f) = ast.decl(tu.decls[0]) else { panic!() };
        let Stmt::Block(block) = ast.stmt(f.body.unwrap()) else { panic!() };
        let Stmt::Ret(ret) = ast.stmt(block.stmts[0]) else { panic!() };
        let Expr { kind: ExprKind::BinaryOp(top), .. } = ast.expr(ret.value.unwrap()) else { panic!() };
        assert_eq!(top.op, BinaryOperator::Add);
        let Expr { kind: ExprKind::BinaryOp(rhs), .. } = ast.expr(top.rhs) else { panic!("rhs should be a nested mul") };
        assert_eq!(rhs.op, BinaryOperator::Mul);
    }

    #[test]
    fn parses_struct_and_field_access() {
        let (ast, id, types) = parse("struct Point { x: i32, y: i32 } func f(p: Point) -> i32 { return p.x; }");
        let Decl::TranslationUnit(tu) = ast.decl(id) else { panic!() };
        assert!(types.lookup_named("Point").is_some());
        assert_eq!(tu.decls.len(), 2);
    }

    #[test]
    fn parses_if_while_break_continue() {
        let (ast, id, _types) = parse(
            "func f() -> void { while (true) { if (true) { break; } else { continue; } } }",
        );
        let Decl::TranslationUnit(tu) = ast.decl(id) else { panic!() };
        let Decl::Function(f) = ast.decl(tu.decls[0]) else { panic!() };
        let Stmt::Block(block) = ast.stmt(f.body.unwrap()) else { panic!() };
        assert!(matches!(ast.stmt(block.stmts[0]), Stmt::While(_)));
    }

    #[test]
    fn parses_cast_and_sizeof() {
        let (ast, id, _types) = parse("func f(x: i64) -> i32 { return cast<i32>(x) + sizeof(i32); }");
        let Decl::TranslationUnit(tu) = ast.decl(id) else { panic!() };
        let Decl::Function(f) = ast.decl(tu.decls[0]) else { panic!() };
        let Stmt::Block(block) = ast.stmt(f.body.unwrap()) else { panic!() };
        let Stmt::Ret(ret) = ast.stmt(block.stmts[0]) else { panic!() };
        let Expr { kind: ExprKind::BinaryOp(top), .. } = ast.expr(ret.value.unwrap()) else { panic!() };
        assert!(matches!(ast.expr(top.lhs).kind, ExprKind::Cast(_)));
        assert!(matches!(ast.expr(top.rhs).kind, ExprKind::Sizeof(_)));
    }

    #[test]
    fn rejects_unresolved_named_type() {
        let mut types = TypeContext::new();
        let tokens = Lexer::new("test.stm", "func f(x: Unknown) -> void {}").tokenize().unwrap();
        let result = Parser::new("test.stm", tokens, &mut types).parse_translation_unit();
        assert!(matches!(result, Err(ParseError::UnresolvedNames(_))));
    }
}
