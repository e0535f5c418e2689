/// AST dumping utilities for testing and debugging
///
/// Provides human-readable tree representations of AST nodes.

use crate::ast::*;
use std::fmt::Write as FmtWrite;

/// Dump a source unit AST as a pretty-printed tree
pub fn dump_module(module: &ModuleNode) -> String {
    let mut out = String::new();
    write_module(&mut out, module, 0).unwrap();
    out
}

fn write_module(out: &mut String, module: &ModuleNode, indent: usize) -> std::fmt::Result {
    writeln!(out, "{}Module:", "  ".repeat(indent))?;
    let prefix = "  ".repeat(indent + 1);
    if let Some(package) = &module.package {
        writeln!(out, "{}Package: {}", prefix, package.name)?;
        write_annotations(out, &package.annotations, indent + 2)?;
    }
    for import in &module.imports {
        let mut line = format!("{}Import: ", prefix);
        if import.is_static {
            line.push_str("static ");
        }
        line.push_str(&import.name);
        if import.is_star {
            line.push_str(".*");
        }
        if let Some(alias) = &import.alias {
            line.push_str(&format!(" as {}", alias));
        }
        writeln!(out, "{}", line)?;
        write_annotations(out, &import.annotations, indent + 2)?;
    }
    for item in &module.items {
        match item {
            Item::Class(class) => write_class(out, class, indent + 1)?,
            Item::Method(method) => write_method(out, method, indent + 1)?,
            Item::Statement(stmt) => write_statement(out, stmt, indent + 1)?,
        }
    }
    Ok(())
}

fn write_annotations(
    out: &mut String,
    annotations: &[AnnotationNode],
    indent: usize,
) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    for annotation in annotations {
        if annotation.members.is_empty() {
            writeln!(out, "{}@{}", prefix, annotation.class_name)?;
            continue;
        }
        let members = annotation
            .members
            .iter()
            .map(|m| format!("{} = {}", m.name, describe_expr(&m.value)))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "{}@{}({})", prefix, annotation.class_name, members)?;
    }
    Ok(())
}

fn write_class(out: &mut String, class: &ClassNode, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    write!(out, "{}Class: {}", prefix, class.name)?;
    if let Some(superclass) = &class.superclass {
        write!(out, " extends {}", superclass)?;
    }
    if !class.interfaces.is_empty() {
        write!(out, " implements {}", class.interfaces.join(", "))?;
    }
    writeln!(out)?;
    write_annotations(out, &class.annotations, indent + 1)?;
    for member in &class.members {
        match member {
            ClassMember::Field(field) => {
                let ty = field.type_name.as_deref().unwrap_or("def");
                writeln!(out, "{}  Field: {} {}", prefix, ty, field.name)?;
                write_annotations(out, &field.annotations, indent + 2)?;
                if let Some(init) = &field.initializer {
                    writeln!(out, "{}    Init:", prefix)?;
                    write_expr(out, init, indent + 3)?;
                }
            }
            ClassMember::Method(method) => write_method(out, method, indent + 1)?,
            ClassMember::Class(inner) => write_class(out, inner, indent + 1)?,
        }
    }
    Ok(())
}

fn write_method(out: &mut String, method: &MethodNode, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    let ty = method.return_type.as_deref().unwrap_or("def");
    writeln!(out, "{}Method: {} {}", prefix, ty, method.name)?;
    write_annotations(out, &method.annotations, indent + 1)?;
    write_params(out, &method.parameters, indent + 1)?;
    write_block(out, &method.body, indent + 1)
}

fn write_params(out: &mut String, params: &[Parameter], indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    if params.is_empty() {
        writeln!(out, "{}Params: (none)", prefix)?;
    } else {
        writeln!(out, "{}Params:", prefix)?;
        for param in params {
            match &param.type_name {
                Some(ty) => writeln!(out, "{}  - {} {}", prefix, ty, param.name)?,
                None => writeln!(out, "{}  - {}", prefix, param.name)?,
            }
            write_annotations(out, &param.annotations, indent + 2)?;
        }
    }
    Ok(())
}

fn write_block(out: &mut String, block: &Block, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    writeln!(out, "{}Block:", prefix)?;
    if block.statements.is_empty() {
        writeln!(out, "{}  (empty)", prefix)?;
    } else {
        for stmt in &block.statements {
            write_statement(out, stmt, indent + 1)?;
        }
    }
    Ok(())
}

fn write_statement(out: &mut String, stmt: &Statement, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    match stmt {
        Statement::Declaration(decl) => {
            let ty = decl.type_name.as_deref().unwrap_or("def");
            writeln!(out, "{}Declaration: {} {}", prefix, ty, decl.name)?;
            write_annotations(out, &decl.annotations, indent + 1)?;
            if let Some(init) = &decl.initializer {
                writeln!(out, "{}  Init:", prefix)?;
                write_expr(out, init, indent + 2)?;
            }
        }
        Statement::Expr(expr) => {
            writeln!(out, "{}ExprStmt:", prefix)?;
            write_expr(out, expr, indent + 1)?;
        }
        Statement::Return(expr) => {
            writeln!(out, "{}Return:", prefix)?;
            if let Some(expr) = expr {
                write_expr(out, expr, indent + 1)?;
            }
        }
        Statement::If { condition, then_block, else_block } => {
            writeln!(out, "{}If:", prefix)?;
            writeln!(out, "{}  Condition:", prefix)?;
            write_expr(out, condition, indent + 2)?;
            writeln!(out, "{}  Then:", prefix)?;
            write_block(out, then_block, indent + 2)?;
            if let Some(else_blk) = else_block {
                writeln!(out, "{}  Else:", prefix)?;
                write_block(out, else_blk, indent + 2)?;
            }
        }
        Statement::Block(block) => write_block(out, block, indent)?,
        Statement::Try { body, catches, finally_block } => {
            writeln!(out, "{}Try:", prefix)?;
            write_block(out, body, indent + 1)?;
            for clause in catches {
                if clause.types.is_empty() {
                    writeln!(out, "{}  Catch: {}", prefix, clause.variable)?;
                } else {
                    let types = clause.types.join(" | ");
                    writeln!(out, "{}  Catch: {} {}", prefix, types, clause.variable)?;
                }
                write_block(out, &clause.body, indent + 2)?;
            }
            if let Some(finally_block) = finally_block {
                writeln!(out, "{}  Finally:", prefix)?;
                write_block(out, finally_block, indent + 2)?;
            }
        }
        Statement::For { init, condition, update, body } => {
            writeln!(out, "{}For:", prefix)?;
            if let Some(init) = init {
                writeln!(out, "{}  Init:", prefix)?;
                write_statement(out, init, indent + 2)?;
            }
            if let Some(condition) = condition {
                writeln!(out, "{}  Condition:", prefix)?;
                write_expr(out, condition, indent + 2)?;
            }
            for expr in update {
                writeln!(out, "{}  Update:", prefix)?;
                write_expr(out, expr, indent + 2)?;
            }
            write_block(out, body, indent + 1)?;
        }
        Statement::ForIn { variable, iterable, body } => {
            match &variable.type_name {
                Some(ty) => writeln!(out, "{}ForIn: {} {}", prefix, ty, variable.name)?,
                None => writeln!(out, "{}ForIn: {}", prefix, variable.name)?,
            }
            write_annotations(out, &variable.annotations, indent + 1)?;
            write_expr(out, iterable, indent + 1)?;
            write_block(out, body, indent + 1)?;
        }
        Statement::While { condition, body } => {
            writeln!(out, "{}While:", prefix)?;
            write_expr(out, condition, indent + 1)?;
            write_block(out, body, indent + 1)?;
        }
        Statement::Switch { subject, cases } => {
            writeln!(out, "{}Switch:", prefix)?;
            write_expr(out, subject, indent + 1)?;
            for case in cases {
                match &case.value {
                    Some(value) => writeln!(out, "{}  Case: {}", prefix, describe_expr(value))?,
                    None => writeln!(out, "{}  Default:", prefix)?,
                }
                write_block(out, &case.body, indent + 2)?;
            }
        }
        Statement::Throw(expr) => {
            writeln!(out, "{}Throw:", prefix)?;
            write_expr(out, expr, indent + 1)?;
        }
        Statement::Assert { condition, message } => {
            writeln!(out, "{}Assert:", prefix)?;
            write_expr(out, condition, indent + 1)?;
            if let Some(message) = message {
                write_expr(out, message, indent + 1)?;
            }
        }
        Statement::Break => writeln!(out, "{}Break", prefix)?,
        Statement::Continue => writeln!(out, "{}Continue", prefix)?,
    }
    Ok(())
}

/// One-line description of an expression node
fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Constant(Constant::String(s)) => format!("String({:?})", s),
        Expr::Constant(c) => format!("Constant({})", c),
        Expr::Variable(name) => format!("Variable({})", name),
        other => other.text(),
    }
}

fn write_expr(out: &mut String, expr: &Expr, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    match expr {
        Expr::MethodCall { receiver, name, args } => {
            writeln!(out, "{}Call: {}", prefix, name)?;
            if let Some(receiver) = receiver {
                writeln!(out, "{}  Receiver:", prefix)?;
                write_expr(out, receiver, indent + 2)?;
            }
            for arg in args {
                write_expr(out, arg, indent + 1)?;
            }
        }
        Expr::Closure { parameters, body } => {
            writeln!(out, "{}Closure:", prefix)?;
            if !parameters.is_empty() {
                write_params(out, parameters, indent + 1)?;
            }
            write_block(out, body, indent + 1)?;
        }
        other => writeln!(out, "{}{}", prefix, describe_expr(other))?,
    }
    Ok(())
}
