pub mod ast;
pub mod ast_dump;
pub mod lexer;
pub mod token;
pub mod visit;

pub use ast::*;
pub use lexer::ParseError;

use token::{StringPart, Token, TokenKind};

/// Words that may precede a declaration without changing what it declares
const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "final",
    "abstract",
    "synchronized",
    "transient",
    "volatile",
];

/// Primitive type names that start a declaration even though they are lowercase
const BUILTIN_TYPES: &[&str] = &[
    "void", "boolean", "byte", "char", "short", "int", "long", "float", "double",
];

/// Parse a script source unit from a string
pub fn parse(input: &str) -> Result<ModuleNode, ParseError> {
    let tokens = lexer::tokenize(input)?;
    Parser::new(tokens).parse_module()
}

/// Parse a single expression
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    parse_expression_at(input, Span::new(1, 1))
}

fn parse_expression_at(input: &str, start: Span) -> Result<Expr, ParseError> {
    let tokens = lexer::Lexer::with_position(input, start).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect(TokenKind::End, "end of expression")?;
    Ok(expr)
}

/// What a declaration-or-statement position turned out to hold
enum Parsed {
    Class(ClassNode),
    Method(MethodNode),
    Statement(Statement),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open parentheses and brackets around the current expression. Line
    /// breaks inside them do not end the expression.
    grouping: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, grouping: 0 }
    }

    // ----- token helpers -----

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Identifier or keyword used as a name: `obj.class`, `params.default`
    fn expect_word(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind().word() {
            Some(word) => {
                let word = word.to_string();
                self.advance();
                Ok(word)
            }
            None => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: describe(&token.kind),
            span: token.span,
        }
    }

    fn previous_is(&self, kind: &TokenKind) -> bool {
        self.pos > 0 && &self.tokens[self.pos - 1].kind == kind
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&TokenKind::Semicolon) {}
    }

    fn at_statement_end(&self) -> bool {
        let token = self.peek();
        token.newline_before
            || matches!(token.kind, TokenKind::Semicolon | TokenKind::RBrace | TokenKind::End)
    }

    /// Require a statement boundary. Anything closed by `}` may be followed directly.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.at_statement_end() || self.previous_is(&TokenKind::RBrace) {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    /// Whether the next token may continue the current expression
    fn continues_expression(&self) -> bool {
        !self.peek().newline_before || self.grouping > 0
    }

    /// Run `f` inside parentheses or brackets
    fn grouped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.grouping += 1;
        let result = f(self);
        self.grouping -= 1;
        result
    }

    /// Run `f` for a block body, where line breaks end statements again
    fn line_sensitive<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.grouping, 0);
        let result = f(self);
        self.grouping = saved;
        result
    }

    // ----- declarations -----

    fn parse_module(&mut self) -> Result<ModuleNode, ParseError> {
        let mut module = ModuleNode::default();

        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::End) {
                break;
            }

            let start = self.peek().span;
            let annotations = self.parse_annotations()?;
            match self.peek_kind() {
                TokenKind::Package => {
                    if module.package.is_some()
                        || !module.imports.is_empty()
                        || !module.items.is_empty()
                    {
                        return Err(self.unexpected("package declaration before anything else"));
                    }
                    self.advance();
                    let name = self.parse_qualified_name("package name")?;
                    module.package = Some(PackageNode { name, annotations, span: start });
                }
                TokenKind::Import => {
                    let import = self.parse_import(annotations, start)?;
                    module.imports.push(import);
                }
                _ => {
                    let parsed = self.parse_declaration_or_statement(annotations, start, true)?;
                    let item = match parsed {
                        Parsed::Class(class) => Item::Class(class),
                        Parsed::Method(method) => Item::Method(method),
                        Parsed::Statement(stmt) => Item::Statement(stmt),
                    };
                    module.items.push(item);
                }
            }
            self.end_statement()?;
        }

        Ok(module)
    }

    fn parse_annotations(&mut self) -> Result<Vec<AnnotationNode>, ParseError> {
        let mut annotations = Vec::new();
        while self.check(&TokenKind::At) {
            annotations.push(self.parse_annotation()?);
        }
        Ok(annotations)
    }

    fn parse_annotation(&mut self) -> Result<AnnotationNode, ParseError> {
        let span = self.expect(TokenKind::At, "'@'")?.span;
        let class_name = self.parse_qualified_name("annotation name")?;
        let mut members = Vec::new();

        if self.check(&TokenKind::LParen) && !self.peek().newline_before {
            self.advance();
            self.grouped(|p| {
                if p.check(&TokenKind::RParen) {
                    return Ok(());
                }
                let named = matches!(p.peek_kind(), TokenKind::Identifier(_))
                    && p.peek_nth(1).kind == TokenKind::Assign;
                if named {
                    loop {
                        let name = p.expect_identifier("annotation member name")?;
                        p.expect(TokenKind::Assign, "'='")?;
                        let value = p.parse_ternary()?;
                        members.push(AnnotationMember { name, value });
                        if !p.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                } else {
                    let value = p.parse_ternary()?;
                    members.push(AnnotationMember { name: "value".to_string(), value });
                }
                Ok(())
            })?;
            self.expect(TokenKind::RParen, "')' to close annotation")?;
        }

        Ok(AnnotationNode { class_name, members, span })
    }

    fn parse_qualified_name(&mut self, expected: &str) -> Result<String, ParseError> {
        let mut name = self.expect_identifier(expected)?;
        while self.check(&TokenKind::Dot)
            && matches!(self.peek_nth(1).kind, TokenKind::Identifier(_))
        {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier(expected)?);
        }
        Ok(name)
    }

    fn parse_import(
        &mut self,
        annotations: Vec<AnnotationNode>,
        span: Span,
    ) -> Result<ImportNode, ParseError> {
        self.expect(TokenKind::Import, "'import'")?;
        let is_static = self.eat(&TokenKind::Static);
        let mut name = self.expect_identifier("import name")?;
        let mut is_star = false;

        while self.eat(&TokenKind::Dot) {
            if self.eat(&TokenKind::Star) {
                is_star = true;
                break;
            }
            name.push('.');
            name.push_str(&self.expect_identifier("import name")?);
        }

        let alias = if !is_star && self.eat(&TokenKind::As) {
            Some(self.expect_identifier("import alias")?)
        } else {
            None
        };

        Ok(ImportNode { name, alias, is_static, is_star, annotations, span })
    }

    /// Skip modifier words. Returns true if any were present.
    fn parse_modifiers(&mut self) -> bool {
        let mut any = false;
        loop {
            let is_modifier = match self.peek_kind() {
                TokenKind::Static => true,
                TokenKind::Identifier(word) => {
                    MODIFIERS.contains(&word.as_str())
                        && matches!(
                            self.peek_nth(1).kind,
                            TokenKind::Identifier(_)
                                | TokenKind::Def
                                | TokenKind::Class
                                | TokenKind::Static
                        )
                }
                _ => false,
            };
            if !is_modifier {
                return any;
            }
            self.advance();
            any = true;
        }
    }

    fn is_type_name(name: &str) -> bool {
        name.chars().next().is_some_and(|c| c.is_uppercase()) || BUILTIN_TYPES.contains(&name)
    }

    /// Number of tokens in the type starting `n` tokens ahead: `String`,
    /// `java.util.List<Map<String, ?>>`, `int[]`. None if no type starts there.
    fn type_len(&self, n: usize) -> Option<usize> {
        let TokenKind::Identifier(first) = &self.peek_nth(n).kind else {
            return None;
        };
        let mut last = first.as_str();
        let mut len = 1;
        while self.peek_nth(n + len).kind == TokenKind::Dot {
            let TokenKind::Identifier(segment) = &self.peek_nth(n + len + 1).kind else {
                break;
            };
            last = segment.as_str();
            len += 2;
        }
        if !Self::is_type_name(last) {
            return None;
        }

        if self.peek_nth(n + len).kind == TokenKind::Lt {
            let mut depth = 0usize;
            loop {
                match &self.peek_nth(n + len).kind {
                    TokenKind::Lt => depth += 1,
                    TokenKind::Gt => depth -= 1,
                    TokenKind::Identifier(_)
                    | TokenKind::Dot
                    | TokenKind::Comma
                    | TokenKind::Question
                    | TokenKind::Extends
                    | TokenKind::LBracket
                    | TokenKind::RBracket => {}
                    _ => return None,
                }
                len += 1;
                if depth == 0 {
                    break;
                }
            }
        }

        while self.peek_nth(n + len).kind == TokenKind::LBracket
            && self.peek_nth(n + len + 1).kind == TokenKind::RBracket
        {
            len += 2;
        }
        Some(len)
    }

    /// Type name as written, with generic arguments and array brackets
    fn parse_type(&mut self, expected: &str) -> Result<String, ParseError> {
        let len = self.type_len(0).ok_or_else(|| self.unexpected(expected))?;
        let mut text = String::new();
        for _ in 0..len {
            match self.advance().kind {
                TokenKind::Identifier(name) => text.push_str(&name),
                TokenKind::Extends => text.push_str(" extends "),
                TokenKind::Comma => text.push_str(", "),
                TokenKind::Dot => text.push('.'),
                TokenKind::Lt => text.push('<'),
                TokenKind::Gt => text.push('>'),
                TokenKind::Question => text.push('?'),
                TokenKind::LBracket => text.push('['),
                TokenKind::RBracket => text.push(']'),
                _ => {}
            }
        }
        Ok(text)
    }

    /// Tokens taken by `def` or a type at the current position
    fn declared_type_len(&self) -> Option<usize> {
        match self.peek_kind() {
            TokenKind::Def => Some(1),
            _ => self.type_len(0),
        }
    }

    /// `def name(` or `Type name(`
    fn at_method_start(&self) -> bool {
        let Some(len) = self.declared_type_len() else {
            return false;
        };
        matches!(self.peek_nth(len).kind, TokenKind::Identifier(_))
            && self.peek_nth(len + 1).kind == TokenKind::LParen
    }

    /// `def name` or `Type name` on one line
    fn at_typed_declaration(&self) -> bool {
        let Some(len) = self.declared_type_len() else {
            return false;
        };
        let name = self.peek_nth(len);
        matches!(name.kind, TokenKind::Identifier(_)) && !name.newline_before
    }

    /// `def` yields no type name
    fn parse_declared_type(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat(&TokenKind::Def) {
            Ok(None)
        } else {
            Ok(Some(self.parse_type("type name")?))
        }
    }

    fn parse_declaration_or_statement(
        &mut self,
        annotations: Vec<AnnotationNode>,
        start: Span,
        allow_definitions: bool,
    ) -> Result<Parsed, ParseError> {
        let had_modifiers = self.parse_modifiers();

        if self.check(&TokenKind::Class) {
            if !allow_definitions {
                return Err(self.unexpected("statement"));
            }
            return Ok(Parsed::Class(self.parse_class(annotations, start)?));
        }

        if self.at_method_start() {
            if !allow_definitions {
                return Err(self.unexpected("statement"));
            }
            return Ok(Parsed::Method(self.parse_method(annotations, start)?));
        }

        if self.at_typed_declaration() {
            let type_name = self.parse_declared_type()?;
            let decl = self.parse_declaration_rest(type_name, annotations, start)?;
            return Ok(Parsed::Statement(Statement::Declaration(decl)));
        }

        // `final x = 1` or the annotated placeholder `@Lib('x') _`
        if had_modifiers || !annotations.is_empty() {
            if let TokenKind::Identifier(_) = self.peek_kind() {
                let next = self.peek_nth(1);
                let ends = next.newline_before
                    || matches!(
                        next.kind,
                        TokenKind::Assign
                            | TokenKind::Semicolon
                            | TokenKind::RBrace
                            | TokenKind::End
                    );
                if ends {
                    let decl = self.parse_declaration_rest(None, annotations, start)?;
                    return Ok(Parsed::Statement(Statement::Declaration(decl)));
                }
            }
            return Err(self.unexpected("declaration after annotations or modifiers"));
        }

        Ok(Parsed::Statement(self.parse_statement()?))
    }

    fn parse_declaration_rest(
        &mut self,
        type_name: Option<String>,
        annotations: Vec<AnnotationNode>,
        span: Span,
    ) -> Result<DeclarationNode, ParseError> {
        let name = self.expect_identifier("variable name")?;
        let initializer = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(DeclarationNode { name, type_name, annotations, initializer, span })
    }

    fn parse_class(
        &mut self,
        annotations: Vec<AnnotationNode>,
        span: Span,
    ) -> Result<ClassNode, ParseError> {
        self.expect(TokenKind::Class, "'class'")?;
        let name = self.expect_identifier("class name")?;

        let superclass = if self.eat(&TokenKind::Extends) {
            Some(self.parse_type("superclass name")?)
        } else {
            None
        };

        let mut interfaces = Vec::new();
        if self.eat(&TokenKind::Implements) {
            loop {
                interfaces.push(self.parse_type("interface name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::LBrace, "'{' to open class body")?;
        let mut members = Vec::new();
        loop {
            self.skip_semicolons();
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.check(&TokenKind::End) {
                return Err(self.unexpected("'}' to close class body"));
            }

            let start = self.peek().span;
            let member_annotations = self.parse_annotations()?;
            self.parse_modifiers();

            let member = if self.check(&TokenKind::Class) {
                ClassMember::Class(self.parse_class(member_annotations, start)?)
            } else if self.at_method_start() || self.at_constructor_start(&name) {
                ClassMember::Method(self.parse_method(member_annotations, start)?)
            } else {
                ClassMember::Field(self.parse_field(member_annotations, start)?)
            };
            members.push(member);
            self.end_statement()?;
        }

        Ok(ClassNode { name, superclass, interfaces, annotations, members, span })
    }

    fn at_constructor_start(&self, class_name: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(name) if name == class_name)
            && self.peek_nth(1).kind == TokenKind::LParen
    }

    fn parse_field(
        &mut self,
        annotations: Vec<AnnotationNode>,
        span: Span,
    ) -> Result<FieldNode, ParseError> {
        let type_name = if self.at_typed_declaration() {
            self.parse_declared_type()?
        } else {
            None
        };
        let name = self.expect_identifier("field name")?;
        let initializer = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(FieldNode { name, type_name, annotations, initializer, span })
    }

    fn parse_method(
        &mut self,
        annotations: Vec<AnnotationNode>,
        span: Span,
    ) -> Result<MethodNode, ParseError> {
        // Constructor: the name is followed directly by '('
        let return_type = if matches!(self.peek_kind(), TokenKind::Identifier(_))
            && self.peek_nth(1).kind == TokenKind::LParen
        {
            None
        } else {
            self.parse_declared_type()?
        };
        let name = self.expect_identifier("method name")?;

        self.expect(TokenKind::LParen, "'(' to open parameter list")?;
        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                parameters.push(self.parse_parameter()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list")?;

        let body = self.parse_block()?;
        Ok(MethodNode { name, return_type, annotations, parameters, body, span })
    }

    fn parse_parameter(&mut self) -> Result<Parameter, ParseError> {
        let annotations = self.parse_annotations()?;
        self.parse_modifiers();
        let type_name = if self.at_typed_declaration() {
            self.parse_declared_type()?
        } else {
            None
        };
        let name = self.expect_identifier("parameter name")?;
        // Default values do not matter to anything downstream
        if self.eat(&TokenKind::Assign) {
            self.parse_ternary()?;
        }
        Ok(Parameter { name, type_name, annotations })
    }

    // ----- statements -----

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace, "'{' to open block")?;
        let block = self.parse_block_body()?;
        self.expect(TokenKind::RBrace, "'}' to close block")?;
        Ok(block)
    }

    /// Statements up to (not including) the closing brace
    fn parse_block_body(&mut self) -> Result<Block, ParseError> {
        self.line_sensitive(|p| {
            let mut statements = Vec::new();
            loop {
                p.skip_semicolons();
                if p.check(&TokenKind::RBrace) || p.check(&TokenKind::End) {
                    break;
                }
                statements.push(p.parse_block_statement()?);
            }
            Ok(Block { statements })
        })
    }

    /// One statement inside a block, with its leading annotations
    fn parse_block_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.peek().span;
        let annotations = self.parse_annotations()?;
        let stmt = match self.parse_declaration_or_statement(annotations, start, false)? {
            Parsed::Statement(stmt) => stmt,
            Parsed::Class(_) | Parsed::Method(_) => return Err(self.unexpected("statement")),
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek_kind() {
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::Return => {
                self.advance();
                if self.at_statement_end() {
                    Ok(Statement::Return(None))
                } else {
                    Ok(Statement::Return(Some(self.parse_expression()?)))
                }
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Try => self.parse_try(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Throw => {
                self.advance();
                Ok(Statement::Throw(self.parse_expression()?))
            }
            TokenKind::Assert => {
                self.advance();
                let condition = self.parse_expression()?;
                let message = if self.eat(&TokenKind::Colon) || self.eat(&TokenKind::Comma) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Ok(Statement::Assert { condition, message })
            }
            TokenKind::Break | TokenKind::Continue => {
                let stmt = match self.advance().kind {
                    TokenKind::Break => Statement::Break,
                    _ => Statement::Continue,
                };
                // Labels carry no meaning downstream
                let labelled = matches!(self.peek_kind(), TokenKind::Identifier(_));
                if labelled && !self.at_statement_end() {
                    self.advance();
                }
                Ok(stmt)
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Parenthesized condition of `if`, `while` and `switch`
    fn parse_condition(&mut self, keyword: &str) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, &format!("'(' after '{}'", keyword))?;
        let condition = self.grouped(Self::parse_expression)?;
        self.expect(TokenKind::RParen, "')' to close condition")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::If, "'if'")?;
        let condition = self.parse_condition("if")?;
        let then_block = self.parse_block_or_statement()?;

        let else_block = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Block { statements: vec![self.parse_if()?] })
            } else {
                Some(self.parse_block_or_statement()?)
            }
        } else {
            None
        };

        Ok(Statement::If { condition, then_block, else_block })
    }

    fn parse_block_or_statement(&mut self) -> Result<Block, ParseError> {
        if self.check(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(Block { statements: vec![self.parse_statement()?] })
        }
    }

    fn parse_try(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Try, "'try'")?;
        let body = self.parse_block()?;

        let mut catches = Vec::new();
        while self.eat(&TokenKind::Catch) {
            self.expect(TokenKind::LParen, "'(' after 'catch'")?;
            self.parse_modifiers();
            self.eat(&TokenKind::Def);
            let mut types = Vec::new();
            while self.type_len(0).is_some() && self.peek_nth(1).kind != TokenKind::RParen {
                types.push(self.parse_type("exception type")?);
                if !self.eat(&TokenKind::Pipe) {
                    break;
                }
            }
            let variable = self.expect_identifier("exception variable")?;
            self.expect(TokenKind::RParen, "')' to close catch clause")?;
            let body = self.parse_block()?;
            catches.push(CatchClause { types, variable, body });
        }

        let finally_block = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catches.is_empty() && finally_block.is_none() {
            return Err(self.unexpected("'catch' or 'finally' after 'try' block"));
        }

        Ok(Statement::Try { body, catches, finally_block })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LParen, "'(' after 'for'")?;

        if self.at_classic_for() {
            let init = if self.check(&TokenKind::Semicolon) {
                None
            } else {
                Some(Box::new(self.parse_for_init()?))
            };
            self.expect(TokenKind::Semicolon, "';' after loop initializer")?;
            let condition = if self.check(&TokenKind::Semicolon) {
                None
            } else {
                Some(self.grouped(Self::parse_expression)?)
            };
            self.expect(TokenKind::Semicolon, "';' after loop condition")?;
            let mut update = Vec::new();
            while !self.check(&TokenKind::RParen) {
                update.push(self.grouped(Self::parse_expression)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')' to close loop header")?;
            let body = self.parse_block_or_statement()?;
            return Ok(Statement::For { init, condition, update, body });
        }

        let variable = self.parse_parameter()?;
        if !self.eat(&TokenKind::In) {
            self.expect(TokenKind::Colon, "'in' or ':' after loop variable")?;
        }
        let iterable = self.grouped(Self::parse_expression)?;
        self.expect(TokenKind::RParen, "')' to close loop header")?;
        let body = self.parse_block_or_statement()?;
        Ok(Statement::ForIn { variable, iterable, body })
    }

    /// A `;` before the header's closing parenthesis marks `for (init; cond; update)`
    fn at_classic_for(&self) -> bool {
        let mut depth = 0usize;
        let mut n = 0;
        loop {
            match &self.peek_nth(n).kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace if depth == 0 => {
                    return false;
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => depth -= 1,
                TokenKind::Semicolon if depth == 0 => return true,
                TokenKind::End => return false,
                _ => {}
            }
            n += 1;
        }
    }

    fn parse_for_init(&mut self) -> Result<Statement, ParseError> {
        let span = self.peek().span;
        if self.at_typed_declaration() {
            let type_name = self.parse_declared_type()?;
            let decl = self.parse_declaration_rest(type_name, Vec::new(), span)?;
            return Ok(Statement::Declaration(decl));
        }
        Ok(Statement::Expr(self.parse_expression()?))
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::While, "'while'")?;
        let condition = self.parse_condition("while")?;
        let body = self.parse_block_or_statement()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_switch(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Switch, "'switch'")?;
        let subject = self.parse_condition("switch")?;
        self.expect(TokenKind::LBrace, "'{' to open switch body")?;

        let cases = self.line_sensitive(|p| {
            let mut cases = Vec::new();
            loop {
                p.skip_semicolons();
                if p.eat(&TokenKind::RBrace) {
                    return Ok(cases);
                }
                let value = if p.eat(&TokenKind::Case) {
                    Some(p.parse_expression()?)
                } else if p.eat(&TokenKind::Default) {
                    None
                } else {
                    return Err(p.unexpected("'case' or 'default'"));
                };
                p.expect(TokenKind::Colon, "':' after case label")?;

                let mut statements = Vec::new();
                loop {
                    p.skip_semicolons();
                    if matches!(
                        p.peek_kind(),
                        TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::End
                    ) {
                        break;
                    }
                    statements.push(p.parse_block_statement()?);
                }
                cases.push(SwitchCase { value, body: Block { statements } });
            }
        })?;

        Ok(Statement::Switch { subject, cases })
    }

    /// Expression statement, including parenthesis-free command calls: `sh 'make'`
    fn parse_expression_statement(&mut self) -> Result<Statement, ParseError> {
        let expr = self.parse_expression()?;
        if self.at_statement_end() || !starts_command_argument(self.peek_kind()) {
            return Ok(Statement::Expr(expr));
        }

        let args = self.parse_arguments(None)?;
        let call = match expr {
            Expr::Variable(name) => Expr::MethodCall { receiver: None, name, args },
            Expr::Property { object, name, .. } => {
                Expr::MethodCall { receiver: Some(object), name, args }
            }
            _ => return Err(self.unexpected("end of statement")),
        };
        Ok(Statement::Expr(call))
    }

    // ----- expressions -----

    /// Full expression, including assignments: `x = 1`, `count += 2`
    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_ternary()?;
        let op = self.binary_op(&[
            (TokenKind::Assign, BinaryOp::Assign),
            (TokenKind::PlusAssign, BinaryOp::AddAssign),
            (TokenKind::MinusAssign, BinaryOp::SubAssign),
            (TokenKind::StarAssign, BinaryOp::MulAssign),
            (TokenKind::SlashAssign, BinaryOp::DivAssign),
            (TokenKind::PercentAssign, BinaryOp::ModAssign),
        ]);
        if let Some(op) = op {
            self.advance();
            let right = self.parse_expression()?;
            return Ok(binary(op, left, right));
        }
        Ok(left)
    }

    /// `cond ? a : b` and `value ?: fallback`, both right-associative
    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_or()?;
        if self.eat(&TokenKind::Question) {
            let then_expr = self.parse_ternary()?;
            self.expect(TokenKind::Colon, "':' in conditional expression")?;
            let else_expr = self.parse_ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            });
        }
        if self.eat(&TokenKind::Elvis) {
            let fallback = self.parse_ternary()?;
            return Ok(Expr::Elvis { value: Box::new(condition), fallback: Box::new(fallback) });
        }
        Ok(condition)
    }

    /// Binary operator at the current position, if it continues the expression
    fn binary_op(&self, ops: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        if !self.continues_expression() {
            return None;
        }
        let kind = self.peek_kind();
        ops.iter().find(|(candidate, _)| candidate == kind).map(|(_, op)| *op)
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        while let Some(op) = self.binary_op(ops) {
            self.advance();
            let right = next(self)?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::parse_bit_or)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Pipe, BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Caret, BinaryOp::BitXor)], Self::parse_bit_and)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(TokenKind::Ampersand, BinaryOp::BitAnd)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (TokenKind::Eq, BinaryOp::Eq),
                (TokenKind::Neq, BinaryOp::Neq),
                (TokenKind::Compare, BinaryOp::Compare),
                (TokenKind::FindMatch, BinaryOp::Find),
                (TokenKind::ExactMatch, BinaryOp::Match),
            ],
            Self::parse_relational,
        )
    }

    /// Comparisons plus `in`, `instanceof` and `as`, with `!in` and `!instanceof`
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_shift()?;
        loop {
            if !self.continues_expression() {
                return Ok(left);
            }
            let negated = self.check(&TokenKind::Bang)
                && matches!(self.peek_nth(1).kind, TokenKind::In | TokenKind::Instanceof)
                && !self.peek_nth(1).newline_before;
            if negated {
                self.advance();
            }

            match self.peek_kind() {
                TokenKind::Instanceof => {
                    self.advance();
                    let type_name = self.parse_type("type after 'instanceof'")?;
                    left = Expr::InstanceOf { expr: Box::new(left), type_name, negated };
                }
                TokenKind::In => {
                    self.advance();
                    let op = if negated { BinaryOp::NotIn } else { BinaryOp::In };
                    let right = self.parse_shift()?;
                    left = binary(op, left, right);
                }
                TokenKind::As => {
                    self.advance();
                    let type_name = self.parse_type("type after 'as'")?;
                    left = Expr::Cast { expr: Box::new(left), type_name };
                }
                _ => {
                    let op = self.binary_op(&[
                        (TokenKind::Lt, BinaryOp::Lt),
                        (TokenKind::Gt, BinaryOp::Gt),
                        (TokenKind::Lte, BinaryOp::Lte),
                        (TokenKind::Gte, BinaryOp::Gte),
                    ]);
                    let Some(op) = op else {
                        return Ok(left);
                    };
                    self.advance();
                    let right = self.parse_shift()?;
                    left = binary(op, left, right);
                }
            }
        }
    }

    /// `<<` and ranges
    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        while self.continues_expression() {
            match self.peek_kind() {
                TokenKind::LeftShift => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = binary(BinaryOp::LeftShift, left, right);
                }
                TokenKind::Range | TokenKind::RangeExclusive => {
                    let exclusive = self.advance().kind == TokenKind::RangeExclusive;
                    let to = self.parse_additive()?;
                    left = Expr::Range { from: Box::new(left), to: Box::new(to), exclusive };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::PlusPlus => UnaryOp::PreIncrement,
            TokenKind::MinusMinus => UnaryOp::PreDecrement,
            TokenKind::Plus => {
                self.advance();
                return self.parse_unary();
            }
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    /// `base ** exponent`, right-associative and tighter than unary minus
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let primary = self.parse_primary()?;
        let base = self.parse_postfix(primary)?;
        if self.binary_op(&[(TokenKind::Power, BinaryOp::Pow)]).is_some() {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            let same_line = !self.peek().newline_before;
            match self.peek_kind() {
                TokenKind::Dot | TokenKind::SafeDot => {
                    let safe = self.advance().kind == TokenKind::SafeDot;
                    let name = self.expect_word("property or method name")?;
                    if self.check(&TokenKind::LParen) && !self.peek().newline_before {
                        self.advance();
                        let args = self.parse_call_arguments()?;
                        expr = Expr::MethodCall { receiver: Some(Box::new(expr)), name, args };
                    } else if self.check(&TokenKind::LBrace) && !self.peek().newline_before {
                        let closure = self.parse_closure()?;
                        expr = Expr::MethodCall {
                            receiver: Some(Box::new(expr)),
                            name,
                            args: vec![closure],
                        };
                    } else {
                        expr = Expr::Property { object: Box::new(expr), name, safe };
                    }
                }
                TokenKind::LParen if same_line => {
                    expr = match expr {
                        Expr::Variable(name) => {
                            self.advance();
                            let args = self.parse_call_arguments()?;
                            Expr::MethodCall { receiver: None, name, args }
                        }
                        other => return Ok(other),
                    };
                }
                TokenKind::LBrace if same_line => {
                    expr = match expr {
                        Expr::Variable(name) => {
                            let closure = self.parse_closure()?;
                            Expr::MethodCall { receiver: None, name, args: vec![closure] }
                        }
                        other => return Ok(other),
                    };
                }
                TokenKind::LBracket if same_line => {
                    self.advance();
                    let index = self.grouped(Self::parse_expression)?;
                    self.expect(TokenKind::RBracket, "']' to close index")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus if same_line => {
                    let op = match self.advance().kind {
                        TokenKind::PlusPlus => UnaryOp::PostIncrement,
                        _ => UnaryOp::PostDecrement,
                    };
                    expr = Expr::Unary { op, operand: Box::new(expr) };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an opening parenthesis, plus a trailing closure: `stage('x') { ... }`
    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = self.grouped(|p| p.parse_arguments(Some(TokenKind::RParen)))?;
        self.expect(TokenKind::RParen, "')' to close argument list")?;
        if self.check(&TokenKind::LBrace) && !self.peek().newline_before {
            args.push(self.parse_closure()?);
        }
        Ok(args)
    }

    /// Comma-separated arguments. Named arguments (`key: value`) are gathered
    /// into a leading map, the way the call receives them.
    fn parse_arguments(&mut self, close: Option<TokenKind>) -> Result<Vec<Expr>, ParseError> {
        let mut named = Vec::new();
        let mut positional = Vec::new();

        if close.as_ref().is_some_and(|c| self.check(c)) {
            return Ok(positional);
        }

        loop {
            if let Some(key) = self.named_argument_key() {
                self.advance();
                self.expect(TokenKind::Colon, "':'")?;
                named.push((key, self.parse_expression()?));
            } else {
                positional.push(self.parse_expression()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        if !named.is_empty() {
            positional.insert(0, Expr::Map(named));
        }
        Ok(positional)
    }

    fn named_argument_key(&self) -> Option<String> {
        if self.peek_nth(1).kind != TokenKind::Colon {
            return None;
        }
        match self.peek_kind() {
            TokenKind::String(name) => Some(name.clone()),
            TokenKind::Integer(n) => Some(n.to_string()),
            other => other.word().map(str::to_string),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Constant(Constant::String(s)))
            }
            TokenKind::GString(parts) => {
                self.advance();
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        StringPart::Text(text) => out.push(GStringPart::Text(text)),
                        StringPart::Interpolation(source, span) => {
                            out.push(GStringPart::Expr(parse_expression_at(&source, span)?));
                        }
                    }
                }
                Ok(Expr::GString(out))
            }
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Constant(Constant::Integer(n)))
            }
            TokenKind::Decimal(n) => {
                self.advance();
                Ok(Expr::Constant(Constant::Decimal(n)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Constant(Constant::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Constant(Constant::Boolean(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Constant(Constant::Null))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.grouped(Self::parse_expression)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_or_map(),
            TokenKind::LBrace => self.parse_closure(),
            TokenKind::New => {
                self.advance();
                let type_name = self.parse_type("type name")?;
                self.expect(TokenKind::LParen, "'(' after type name")?;
                let args = self.parse_call_arguments()?;
                Ok(Expr::New { type_name, args })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_list_or_map(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBracket, "'['")?;

        if self.check(&TokenKind::Colon) && self.peek_nth(1).kind == TokenKind::RBracket {
            self.advance();
            self.advance();
            return Ok(Expr::Map(Vec::new()));
        }
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }

        let expr = self.grouped(|p| {
            if p.named_argument_key().is_some() {
                let mut entries = Vec::new();
                loop {
                    let key = p.named_argument_key().ok_or_else(|| p.unexpected("map key"))?;
                    p.advance();
                    p.expect(TokenKind::Colon, "':'")?;
                    entries.push((key, p.parse_expression()?));
                    if !p.eat(&TokenKind::Comma) || p.check(&TokenKind::RBracket) {
                        break;
                    }
                }
                Ok(Expr::Map(entries))
            } else {
                let mut items = Vec::new();
                loop {
                    items.push(p.parse_expression()?);
                    if !p.eat(&TokenKind::Comma) || p.check(&TokenKind::RBracket) {
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
        })?;

        self.expect(TokenKind::RBracket, "']'")?;
        Ok(expr)
    }

    fn parse_closure(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut parameters = Vec::new();
        if self.at_closure_parameters() {
            while !self.eat(&TokenKind::Arrow) {
                parameters.push(self.parse_parameter()?);
                self.eat(&TokenKind::Comma);
            }
        }

        let body = self.parse_block_body()?;
        self.expect(TokenKind::RBrace, "'}' to close closure")?;
        Ok(Expr::Closure { parameters, body })
    }

    /// `{ ->`, `{ a ->`, `{ a, b ->` or `{ Map<String, String> a ->`
    fn at_closure_parameters(&self) -> bool {
        let mut n = 0;
        loop {
            match &self.peek_nth(n).kind {
                TokenKind::Arrow => return true,
                TokenKind::Identifier(_)
                | TokenKind::Comma
                | TokenKind::Def
                | TokenKind::Dot
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Question
                | TokenKind::LBracket
                | TokenKind::RBracket => n += 1,
                _ => return false,
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
}

/// Tokens that can begin the first argument of a parenthesis-free call
fn starts_command_argument(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier(_)
            | TokenKind::String(_)
            | TokenKind::GString(_)
            | TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::New
    )
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::End => "end of input".to_string(),
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::String(_) | TokenKind::GString(_) => "string literal".to_string(),
        TokenKind::Integer(n) => format!("number {}", n),
        TokenKind::Decimal(n) => format!("number {}", n),
        other => match other.word() {
            Some(word) => format!("keyword '{}'", word),
            None => format!("{:?}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_statement(module: &ModuleNode) -> &Statement {
        match &module.items[0] {
            Item::Statement(stmt) => stmt,
            other => panic!("Expected statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty() {
        let module = parse("").unwrap();
        assert!(module.items.is_empty());
        assert!(module.imports.is_empty());
        assert!(module.package.is_none());
    }

    #[test]
    fn test_parse_annotated_placeholder() {
        let module = parse("@SharedLibrary('utils') _").unwrap();
        match first_statement(&module) {
            Statement::Declaration(decl) => {
                assert_eq!(decl.name, "_");
                assert_eq!(decl.annotations.len(), 1);
                let annotation = &decl.annotations[0];
                assert_eq!(annotation.class_name, "SharedLibrary");
                assert_eq!(
                    annotation.member("value"),
                    Some(&Expr::Constant(Constant::String("utils".to_string())))
                );
                assert_eq!(annotation.span, Span::new(1, 1));
            }
            other => panic!("Expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_annotation_forms() {
        let source = r#"
@io.jenkins.plugins.shared_library.SharedLibrary(value = "a") _
@SharedLibrary _
@SharedLibrary() def x
"#;
        let module = parse(source).unwrap();
        assert_eq!(module.items.len(), 3);

        let annotations: Vec<&AnnotationNode> = module
            .items
            .iter()
            .map(|item| match item {
                Item::Statement(Statement::Declaration(decl)) => &decl.annotations[0],
                other => panic!("Expected declaration, got {:?}", other),
            })
            .collect();

        assert_eq!(annotations[0].class_name, "io.jenkins.plugins.shared_library.SharedLibrary");
        assert!(annotations[0].member("value").is_some());
        assert!(annotations[1].members.is_empty());
        assert!(annotations[2].members.is_empty());
        assert_eq!(annotations[2].span.line, 4);
    }

    #[test]
    fn test_parse_imports_and_package() {
        let source =
            "package org.example\nimport a.b.C\nimport static a.b.D.m as n\nimport a.b.*\n";
        let module = parse(source).unwrap();
        assert_eq!(module.package.as_ref().map(|p| p.name.as_str()), Some("org.example"));
        assert_eq!(module.imports.len(), 3);
        assert_eq!(module.imports[0].simple_name(), Some("C"));
        assert!(module.imports[1].is_static);
        assert_eq!(module.imports[1].simple_name(), Some("n"));
        assert!(module.imports[2].is_star);
        assert_eq!(module.imports[2].simple_name(), None);
    }

    #[test]
    fn test_parse_command_calls_and_closures() {
        let source = r#"
node('linux') {
    stage('Build') {
        sh 'make'
        git url: 'https://example.com/repo.git', branch: 'main'
    }
}
"#;
        let module = parse(source).unwrap();
        let Statement::Expr(Expr::MethodCall { name, args, .. }) = first_statement(&module) else {
            panic!("Expected method call");
        };
        assert_eq!(name, "node");
        assert_eq!(args.len(), 2);
        let Expr::Closure { body, .. } = &args[1] else {
            panic!("Expected trailing closure");
        };
        let Statement::Expr(Expr::MethodCall { name, args, .. }) = &body.statements[0] else {
            panic!("Expected stage call");
        };
        assert_eq!(name, "stage");
        let Expr::Closure { body, .. } = &args[1] else {
            panic!("Expected stage closure");
        };
        assert_eq!(body.statements.len(), 2);
        match &body.statements[1] {
            Statement::Expr(Expr::MethodCall { name, args, .. }) => {
                assert_eq!(name, "git");
                assert!(matches!(&args[0], Expr::Map(entries) if entries.len() == 2));
            }
            other => panic!("Expected git call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_class_members() {
        let source = r#"
@Deprecated
class Helper extends Base implements Serializable {
    @Field String name = 'x'
    private static final int count
    Helper(String name) { this.name = name }
    @NonCPS
    def run(@Checked String arg) {
        @SharedLibrary('inner') def local = 1
        return local
    }
}
"#;
        let module = parse(source).unwrap();
        let Item::Class(class) = &module.items[0] else {
            panic!("Expected class");
        };
        assert_eq!(class.name, "Helper");
        assert_eq!(class.superclass.as_deref(), Some("Base"));
        assert_eq!(class.interfaces, vec!["Serializable".to_string()]);
        assert_eq!(class.annotations[0].class_name, "Deprecated");
        assert_eq!(class.members.len(), 4);

        let ClassMember::Field(field) = &class.members[0] else {
            panic!("Expected field");
        };
        assert_eq!(field.type_name.as_deref(), Some("String"));
        assert_eq!(field.annotations[0].class_name, "Field");

        let ClassMember::Method(ctor) = &class.members[2] else {
            panic!("Expected constructor");
        };
        assert_eq!(ctor.name, "Helper");
        assert!(ctor.return_type.is_none());

        let ClassMember::Method(method) = &class.members[3] else {
            panic!("Expected method");
        };
        assert_eq!(method.name, "run");
        assert_eq!(method.parameters[0].annotations[0].class_name, "Checked");
        assert_eq!(method.body.statements.len(), 2);
    }

    #[test]
    fn test_parse_gstring_interpolation() {
        let expr = parse_expression("\"lib-${env.BRANCH_NAME}\"").unwrap();
        match expr {
            Expr::GString(parts) => {
                assert_eq!(parts[0], GStringPart::Text("lib-".to_string()));
                assert!(matches!(
                    &parts[1],
                    GStringPart::Expr(Expr::Property { name, .. }) if name == "BRANCH_NAME"
                ));
            }
            other => panic!("Expected GString, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_expression_precedence() {
        let expr = parse_expression("a + b * 2 == c && !d").unwrap();
        assert_eq!(expr.text(), "(((a + (b * 2)) == c) && !d)");
    }

    #[test]
    fn test_parse_if_else_chain() {
        let source = "if (x) {\n  echo 'a'\n} else if (y) echo 'b' else {\n  echo 'c'\n}";
        let module = parse(source).unwrap();
        let Statement::If { else_block: Some(else_block), .. } = first_statement(&module) else {
            panic!("Expected if/else");
        };
        assert!(matches!(else_block.statements[0], Statement::If { .. }));
    }

    #[test]
    fn test_parse_list_and_map_literals() {
        assert_eq!(parse_expression("[]").unwrap(), Expr::List(vec![]));
        assert_eq!(parse_expression("[:]").unwrap(), Expr::Map(vec![]));
        assert_eq!(parse_expression("['a', 'b']").unwrap().text(), "[a, b]");
        assert_eq!(parse_expression("[a: 1, 'b': 2]").unwrap().text(), "[a: 1, b: 2]");
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = parse("def x = (1 + \n").unwrap_err();
        match err {
            ParseError::UnexpectedToken { span, .. } => assert_eq!(span.line, 2),
            other => panic!("Expected unexpected token, got {:?}", other),
        }
    }

    #[test]
    fn test_annotation_without_declaration_is_rejected() {
        let err = parse("@SharedLibrary('x') println 'hi'").unwrap_err();
        assert!(err.to_string().contains("declaration after annotations"));
    }

    #[test]
    fn test_parse_groovy_operators() {
        let cases = [
            ("x += 1", "(x += 1)"),
            ("a ?: b ? c : d", "(a ?: (b ? c : d))"),
            ("names << 'a' << 'b'", "((names << a) << b)"),
            (r"branch ==~ /release\/.*/", "(branch ==~ release/.*)"),
            ("env.TIMEOUT as Integer", "(env.TIMEOUT as Integer)"),
            ("'x' in list && !(y instanceof String)", "((x in list) && !(y instanceof String))"),
            ("a !in b", "(a !in b)"),
            ("i++ + --j", "(i++ + --j)"),
            ("1..<3", "(1..<3)"),
            ("-2 ** 2", "-(2 ** 2)"),
        ];
        for (source, expected) in cases {
            assert_eq!(parse_expression(source).unwrap().text(), expected, "{}", source);
        }
    }

    #[test]
    fn test_parse_try_catch_finally() {
        let source = r#"
try {
    sh 'make'
} catch (InterruptedException | hudson.AbortException e) {
    throw e
} catch (err) {
    echo "failed: ${err}"
} finally {
    cleanWs()
}
"#;
        let module = parse(source).unwrap();
        let Statement::Try { body, catches, finally_block } = first_statement(&module) else {
            panic!("Expected try statement");
        };
        assert_eq!(body.statements.len(), 1);
        assert_eq!(catches.len(), 2);
        assert_eq!(catches[0].types, vec!["InterruptedException", "hudson.AbortException"]);
        assert_eq!(catches[0].variable, "e");
        assert!(matches!(catches[0].body.statements[0], Statement::Throw(_)));
        assert!(catches[1].types.is_empty());
        assert_eq!(catches[1].variable, "err");
        assert!(finally_block.is_some());
    }

    #[test]
    fn test_parse_try_without_handler_is_rejected() {
        let err = parse("try {\n  sh 'make'\n}\necho 'done'").unwrap_err();
        assert!(err.to_string().contains("'catch' or 'finally'"));
    }

    #[test]
    fn test_parse_for_loops() {
        let source = r#"
for (int i = 0; i < targets.size(); i++) {
    echo targets[i]
}
for (t in targets) echo t
for (String t : targets) {
    echo t
}
for (;;) {
    break
}
"#;
        let module = parse(source).unwrap();
        assert_eq!(module.items.len(), 4);

        let Item::Statement(Statement::For { init, condition, update, .. }) = &module.items[0]
        else {
            panic!("Expected classic for loop");
        };
        assert!(matches!(init.as_deref(), Some(Statement::Declaration(d)) if d.name == "i"));
        assert_eq!(condition.as_ref().map(Expr::text), Some("(i < targets.size())".to_string()));
        assert_eq!(update[0].text(), "i++");

        let Item::Statement(Statement::ForIn { variable, iterable, .. }) = &module.items[1] else {
            panic!("Expected for-in loop");
        };
        assert_eq!(variable.name, "t");
        assert_eq!(iterable.text(), "targets");

        let Item::Statement(Statement::ForIn { variable, .. }) = &module.items[2] else {
            panic!("Expected typed for-each loop");
        };
        assert_eq!(variable.type_name.as_deref(), Some("String"));

        let Item::Statement(Statement::For { init: None, condition: None, update, body }) =
            &module.items[3]
        else {
            panic!("Expected empty for header");
        };
        assert!(update.is_empty());
        assert_eq!(body.statements, vec![Statement::Break]);
    }

    #[test]
    fn test_parse_switch_and_while() {
        let source = r#"
switch (env.TARGET) {
    case 'prod':
    case 'staging':
        deploy()
        break
    default:
        echo 'nothing to deploy'
}
while (retries-- > 0) {
    continue
}
"#;
        let module = parse(source).unwrap();
        let Statement::Switch { subject, cases } = first_statement(&module) else {
            panic!("Expected switch");
        };
        assert_eq!(subject.text(), "env.TARGET");
        assert_eq!(cases.len(), 3);
        assert!(cases[0].body.statements.is_empty());
        assert_eq!(cases[1].body.statements.len(), 2);
        assert!(cases[2].value.is_none());

        let Item::Statement(Statement::While { condition, body }) = &module.items[1] else {
            panic!("Expected while");
        };
        assert_eq!(condition.text(), "(retries-- > 0)");
        assert_eq!(body.statements, vec![Statement::Continue]);
    }

    #[test]
    fn test_parse_generic_declarations() {
        let source = "Map<String, List<String>> owners = [:]\nString[] args = []\nint count = 0";
        let module = parse(source).unwrap();
        let types: Vec<Option<&str>> = module
            .items
            .iter()
            .map(|item| match item {
                Item::Statement(Statement::Declaration(decl)) => decl.type_name.as_deref(),
                other => panic!("Expected declaration, got {:?}", other),
            })
            .collect();
        assert_eq!(
            types,
            vec![Some("Map<String, List<String>>"), Some("String[]"), Some("int")]
        );
    }

    #[test]
    fn test_parse_multiline_condition() {
        let source = "if (isRelease\n    && env.BRANCH_NAME != 'main') {\n  echo 'x'\n}";
        let module = parse(source).unwrap();
        let Statement::If { condition, .. } = first_statement(&module) else {
            panic!("Expected if");
        };
        assert_eq!(condition.text(), "(isRelease && (env.BRANCH_NAME != main))");
    }

    #[test]
    fn test_parse_keyword_property_and_map_key() {
        let expr = parse_expression("[default: params.default, in: x.class]").unwrap();
        assert_eq!(expr.text(), "[default: params.default, in: x.class]");
    }

    const SCRIPTED_PIPELINE: &str = r#"#!/usr/bin/env groovy
@SharedLibrary('pipeline-utils') _

import groovy.transform.Field

@Field List<String> targets = ['linux', 'windows']
def counter = 0

def notify(String status) {
    def colour = status == 'SUCCESS' ? 'good' : 'danger'
    slackSend color: colour, message: "${env.JOB_NAME} #${env.BUILD_NUMBER}: ${status}"
}

node('linux') {
    try {
        stage('Checkout') {
            checkout scm
            def branch = env.BRANCH_NAME ?: 'main'
            def release = branch ==~ /release\/.*/
            if (branch =~ /^feature\//) {
                echo "Feature build for ${branch}"
            }
        }
        stage('Build') {
            for (int i = 0; i < targets.size(); i++) {
                counter += 1
                sh "make TARGET=${targets[i]}"
            }
            for (t in targets) {
                archiveArtifacts artifacts: "out/${t}/**", fingerprint: true
            }
            def names = []
            names << 'build'
            def timeout = (env.TIMEOUT ?: '30') as Integer
            def mode = release ? 'release' : 'snapshot'
            --counter
        }
        stage('Détails') {
            def résumé = "Ünïcode ${mode}"
            if (résumé instanceof String && 'build' in names) {
                echo résumé
            }
            switch (mode) {
                case 'release':
                    echo 'Publishing'
                    break
                default:
                    echo 'Skipping publish'
            }
            while (counter > 0) {
                counter--
            }
        }
    } catch (InterruptedException | hudson.AbortException e) {
        currentBuild.result = 'ABORTED'
        throw e
    } catch (err) {
        currentBuild.result = 'FAILURE'
        notify('FAILURE')
        throw err
    } finally {
        cleanWs()
    }
}
"#;

    #[test]
    fn test_parse_scripted_pipeline() {
        let module = parse(SCRIPTED_PIPELINE).unwrap();
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.items.len(), 5);

        let mut names = Vec::new();
        visit::walk_annotations(&module, &mut |a: &AnnotationNode| {
            names.push(a.class_name.clone())
        });
        assert_eq!(names, vec!["SharedLibrary", "Field"]);

        let Item::Statement(Statement::Expr(Expr::MethodCall { name, args, .. })) = &module.items[4]
        else {
            panic!("Expected node call");
        };
        assert_eq!(name, "node");
        let Expr::Closure { body, .. } = &args[1] else {
            panic!("Expected node closure");
        };
        let Statement::Try { body, catches, finally_block } = &body.statements[0] else {
            panic!("Expected try statement");
        };
        assert_eq!(body.statements.len(), 3);
        assert_eq!(catches.len(), 2);
        assert!(finally_block.is_some());

        let dump = ast_dump::dump_module(&module);
        let expected_lines =
            ["For:", "ForIn: t", "Switch:", "While:", "Throw:", "Declaration: def résumé"];
        for expected in expected_lines {
            assert!(dump.contains(expected), "missing {} in\n{}", expected, dump);
        }
    }
}
