/// Abstract Syntax Tree types for pipeline scripts
///
/// These types represent the parsed structure of a script source unit.
/// Nodes own their strings so a tree can outlive the text it was parsed from
/// and be rewritten in place by later compilation phases.

use std::fmt;

use serde::Serialize;

/// 1-based source position of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A complete source unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleNode {
    pub package: Option<PackageNode>,
    pub imports: Vec<ImportNode>,
    pub items: Vec<Item>,
}

/// Top-level item, kept in source order
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Class(ClassNode),
    Method(MethodNode),
    Statement(Statement),
}

/// Package declaration: `package org.example`
#[derive(Debug, Clone, PartialEq)]
pub struct PackageNode {
    pub name: String,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

/// Import declaration: `import a.b.C`, `import a.b.*`, `import static a.B.m as n`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub name: String,
    pub alias: Option<String>,
    pub is_static: bool,
    pub is_star: bool,
    pub annotations: Vec<AnnotationNode>,
    pub span: Span,
}

impl ImportNode {
    /// The name this import makes visible in the unit (alias or last segment).
    /// Star imports bind nothing by themselves.
    pub fn simple_name(&self) -> Option<&str> {
        if self.is_star {
            return None;
        }
        match &self.alias {
            Some(alias) => Some(alias.as_str()),
            None => self.name.rsplit('.').next(),
        }
    }
}

/// Annotation: `@Name`, `@Name(expr)` or `@Name(key = expr, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationNode {
    /// Class name exactly as written, or fully qualified once imports are resolved
    pub class_name: String,
    pub members: Vec<AnnotationMember>,
    pub span: Span,
}

impl AnnotationNode {
    /// Look up a member by name. A bare `@Name(expr)` argument is stored as `value`.
    pub fn member(&self, name: &str) -> Option<&Expr> {
        self.members.iter().find(|m| m.name == name).map(|m| &m.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationMember {
    pub name: String,
    pub value: Expr,
}

/// Class declaration: `class Name extends Base { members }`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<AnnotationNode>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

/// Class body member, kept in source order
#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field(FieldNode),
    Method(MethodNode),
    Class(ClassNode),
}

/// Field declaration: `String name = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub type_name: Option<String>,
    pub annotations: Vec<AnnotationNode>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

/// Method declaration: `def name(params) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub return_type: Option<String>,
    pub annotations: Vec<AnnotationNode>,
    pub parameters: Vec<Parameter>,
    pub body: Block,
    pub span: Span,
}

/// Method or closure parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
    pub annotations: Vec<AnnotationNode>,
}

/// Block of statements: `{ stmt1; stmt2 }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// Statement in a block or at script level
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Local declaration: `def x = expr`, `String x`, or the annotated `@Lib('x') _`
    Declaration(DeclarationNode),
    /// Expression used as a statement
    Expr(Expr),
    /// `return` or `return expr`
    Return(Option<Expr>),
    /// `if (cond) { ... } else { ... }`
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// Nested block
    Block(Block),
    /// `try { ... } catch (A | B e) { ... } finally { ... }`
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally_block: Option<Block>,
    },
    /// `for (init; condition; update) { ... }`
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expr>,
        update: Vec<Expr>,
        body: Block,
    },
    /// `for (x in items) { ... }` or `for (String x : items) { ... }`
    ForIn {
        variable: Parameter,
        iterable: Expr,
        body: Block,
    },
    /// `while (cond) { ... }`
    While { condition: Expr, body: Block },
    /// `switch (subject) { case a: ... default: ... }`
    Switch { subject: Expr, cases: Vec<SwitchCase> },
    /// `throw expr`
    Throw(Expr),
    /// `assert cond : message`
    Assert { condition: Expr, message: Option<Expr> },
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Caught types; empty for an untyped `catch (e)`
    pub types: Vec<String>,
    pub variable: String,
    pub body: Block,
}

/// One `case value:` or `default:` label with the statements that follow it
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default`
    pub value: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationNode {
    pub name: String,
    pub type_name: Option<String>,
    pub annotations: Vec<AnnotationNode>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

/// Compile-time constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::String(s) => write!(f, "{}", s),
            Constant::Integer(n) => write!(f, "{}", n),
            Constant::Decimal(n) => write!(f, "{}", n),
            Constant::Boolean(b) => write!(f, "{}", b),
            Constant::Null => write!(f, "null"),
        }
    }
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum GStringPart {
    Text(String),
    Expr(Expr),
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal constant: `'a'`, `"a"` without interpolation, `42`, `true`, `null`
    Constant(Constant),
    /// Variable reference: `foo`
    Variable(String),
    /// Interpolated string: `"hello ${name}"`
    GString(Vec<GStringPart>),
    /// Property access: `obj.name` or `obj?.name`
    Property {
        object: Box<Expr>,
        name: String,
        safe: bool,
    },
    /// Method call: `name(args)`, `obj.name(args)`, `name arg` or `name { closure }`
    MethodCall {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    /// Constructor call: `new Type(args)`
    New {
        type_name: String,
        args: Vec<Expr>,
    },
    /// Closure: `{ a, b -> ... }`
    Closure {
        parameters: Vec<Parameter>,
        body: Block,
    },
    /// List literal: `[a, b]`
    List(Vec<Expr>),
    /// Map literal or named arguments: `[a: 1]`, `git url: 'x'`
    Map(Vec<(String, Expr)>),
    /// Index access: `list[0]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// Binary operation, including assignment: `a + b`, `x = 1`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: `!a`, `-a`, `++i`, `i--`
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `cond ? a : b`
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// `value ?: fallback`
    Elvis {
        value: Box<Expr>,
        fallback: Box<Expr>,
    },
    /// `expr as Type`
    Cast {
        expr: Box<Expr>,
        type_name: String,
    },
    /// `expr instanceof Type` or `expr !instanceof Type`
    InstanceOf {
        expr: Box<Expr>,
        type_name: String,
        negated: bool,
    },
    /// `from..to` or `from..<to`
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
        exclusive: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Neq,
    Compare,
    /// `=~`
    Find,
    /// `==~`
    Match,
    Lt,
    Gt,
    Lte,
    Gte,
    In,
    NotIn,
    LeftShift,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::ModAssign => "%=",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Compare => "<=>",
            BinaryOp::Find => "=~",
            BinaryOp::Match => "==~",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "!in",
            BinaryOp::LeftShift => "<<",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostIncrement | UnaryOp::PostDecrement)
    }
}

impl Expr {
    /// Whether this is a literal constant
    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    /// Render the expression back to source-like text, for diagnostics.
    pub fn text(&self) -> String {
        match self {
            Expr::Constant(Constant::String(s)) => s.clone(),
            Expr::Constant(c) => c.to_string(),
            Expr::Variable(name) => name.clone(),
            Expr::GString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        GStringPart::Text(t) => out.push_str(t),
                        GStringPart::Expr(e) => {
                            out.push_str("${");
                            out.push_str(&e.text());
                            out.push('}');
                        }
                    }
                }
                out
            }
            Expr::Property { object, name, safe } => {
                let dot = if *safe { "?." } else { "." };
                format!("{}{}{}", object.text(), dot, name)
            }
            Expr::MethodCall { receiver, name, args } => {
                let args = args.iter().map(Expr::text).collect::<Vec<_>>().join(", ");
                match receiver {
                    Some(r) => format!("{}.{}({})", r.text(), name, args),
                    None => format!("{}({})", name, args),
                }
            }
            Expr::New { type_name, args } => {
                let args = args.iter().map(Expr::text).collect::<Vec<_>>().join(", ");
                format!("new {}({})", type_name, args)
            }
            Expr::Closure { .. } => "{ -> ... }".to_string(),
            Expr::List(items) => {
                let items = items.iter().map(Expr::text).collect::<Vec<_>>().join(", ");
                format!("[{}]", items)
            }
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return "[:]".to_string();
                }
                let entries = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.text()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{}]", entries)
            }
            Expr::Index { object, index } => format!("{}[{}]", object.text(), index.text()),
            Expr::Binary { op, left, right } => {
                format!("({} {} {})", left.text(), op.symbol(), right.text())
            }
            Expr::Unary { op, operand } if op.is_postfix() => {
                format!("{}{}", operand.text(), op.symbol())
            }
            Expr::Unary { op, operand } => format!("{}{}", op.symbol(), operand.text()),
            Expr::Ternary { condition, then_expr, else_expr } => format!(
                "({} ? {} : {})",
                condition.text(),
                then_expr.text(),
                else_expr.text()
            ),
            Expr::Elvis { value, fallback } => format!("({} ?: {})", value.text(), fallback.text()),
            Expr::Cast { expr, type_name } => format!("({} as {})", expr.text(), type_name),
            Expr::InstanceOf { expr, type_name, negated } => {
                let op = if *negated { "!instanceof" } else { "instanceof" };
                format!("({} {} {})", expr.text(), op, type_name)
            }
            Expr::Range { from, to, exclusive } => {
                let op = if *exclusive { "..<" } else { ".." };
                format!("({}{}{})", from.text(), op, to.text())
            }
        }
    }
}
