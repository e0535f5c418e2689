//! Annotation traversal.
//!
//! Walks every annotatable node of a source unit in source order: package,
//! imports, classes and their members, method parameters, and local
//! declarations, including those nested in closures.

use crate::ast::*;

/// Call `f` for every annotation in the unit, in source order
pub fn walk_annotations<'a>(module: &'a ModuleNode, f: &mut impl FnMut(&'a AnnotationNode)) {
    if let Some(package) = &module.package {
        package.annotations.iter().for_each(&mut *f);
    }
    for import in &module.imports {
        import.annotations.iter().for_each(&mut *f);
    }
    for item in &module.items {
        match item {
            Item::Class(class) => walk_class(class, f),
            Item::Method(method) => walk_method(method, f),
            Item::Statement(stmt) => walk_statement(stmt, f),
        }
    }
}

fn walk_class<'a>(class: &'a ClassNode, f: &mut impl FnMut(&'a AnnotationNode)) {
    class.annotations.iter().for_each(&mut *f);
    for member in &class.members {
        match member {
            ClassMember::Field(field) => {
                field.annotations.iter().for_each(&mut *f);
                if let Some(init) = &field.initializer {
                    walk_expr(init, f);
                }
            }
            ClassMember::Method(method) => walk_method(method, f),
            ClassMember::Class(inner) => walk_class(inner, f),
        }
    }
}

fn walk_method<'a>(method: &'a MethodNode, f: &mut impl FnMut(&'a AnnotationNode)) {
    method.annotations.iter().for_each(&mut *f);
    for param in &method.parameters {
        param.annotations.iter().for_each(&mut *f);
    }
    walk_block(&method.body, f);
}

fn walk_block<'a>(block: &'a Block, f: &mut impl FnMut(&'a AnnotationNode)) {
    for stmt in &block.statements {
        walk_statement(stmt, f);
    }
}

fn walk_statement<'a>(stmt: &'a Statement, f: &mut impl FnMut(&'a AnnotationNode)) {
    match stmt {
        Statement::Declaration(decl) => {
            decl.annotations.iter().for_each(&mut *f);
            if let Some(init) = &decl.initializer {
                walk_expr(init, f);
            }
        }
        Statement::Expr(expr) => walk_expr(expr, f),
        Statement::Return(expr) => {
            if let Some(expr) = expr {
                walk_expr(expr, f);
            }
        }
        Statement::If { condition, then_block, else_block } => {
            walk_expr(condition, f);
            walk_block(then_block, f);
            if let Some(else_block) = else_block {
                walk_block(else_block, f);
            }
        }
        Statement::Block(block) => walk_block(block, f),
        Statement::Try { body, catches, finally_block } => {
            walk_block(body, f);
            for clause in catches {
                walk_block(&clause.body, f);
            }
            if let Some(finally_block) = finally_block {
                walk_block(finally_block, f);
            }
        }
        Statement::For { init, condition, update, body } => {
            if let Some(init) = init {
                walk_statement(init, f);
            }
            if let Some(condition) = condition {
                walk_expr(condition, f);
            }
            update.iter().for_each(|expr| walk_expr(expr, f));
            walk_block(body, f);
        }
        Statement::ForIn { variable, iterable, body } => {
            variable.annotations.iter().for_each(&mut *f);
            walk_expr(iterable, f);
            walk_block(body, f);
        }
        Statement::While { condition, body } => {
            walk_expr(condition, f);
            walk_block(body, f);
        }
        Statement::Switch { subject, cases } => {
            walk_expr(subject, f);
            for case in cases {
                if let Some(value) = &case.value {
                    walk_expr(value, f);
                }
                walk_block(&case.body, f);
            }
        }
        Statement::Throw(expr) => walk_expr(expr, f),
        Statement::Assert { condition, message } => {
            walk_expr(condition, f);
            if let Some(message) = message {
                walk_expr(message, f);
            }
        }
        Statement::Break | Statement::Continue => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a AnnotationNode)) {
    match expr {
        Expr::Constant(_) | Expr::Variable(_) => {}
        Expr::GString(parts) => {
            for part in parts {
                if let GStringPart::Expr(e) = part {
                    walk_expr(e, f);
                }
            }
        }
        Expr::Property { object, .. } => walk_expr(object, f),
        Expr::MethodCall { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                walk_expr(receiver, f);
            }
            args.iter().for_each(|arg| walk_expr(arg, f));
        }
        Expr::New { args, .. } | Expr::List(args) => {
            args.iter().for_each(|arg| walk_expr(arg, f));
        }
        Expr::Closure { parameters, body } => {
            for param in parameters {
                param.annotations.iter().for_each(&mut *f);
            }
            walk_block(body, f);
        }
        Expr::Map(entries) => entries.iter().for_each(|(_, v)| walk_expr(v, f)),
        Expr::Index { object, index } => {
            walk_expr(object, f);
            walk_expr(index, f);
        }
        Expr::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Unary { operand, .. }
        | Expr::Cast { expr: operand, .. }
        | Expr::InstanceOf { expr: operand, .. } => walk_expr(operand, f),
        Expr::Ternary { condition, then_expr, else_expr } => {
            walk_expr(condition, f);
            walk_expr(then_expr, f);
            walk_expr(else_expr, f);
        }
        Expr::Elvis { value: left, fallback: right }
        | Expr::Range { from: left, to: right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
    }
}

/// Call `f` for every annotation in the unit, allowing it to be rewritten in place
pub fn walk_annotations_mut(module: &mut ModuleNode, f: &mut impl FnMut(&mut AnnotationNode)) {
    if let Some(package) = &mut module.package {
        package.annotations.iter_mut().for_each(&mut *f);
    }
    for import in &mut module.imports {
        import.annotations.iter_mut().for_each(&mut *f);
    }
    for item in &mut module.items {
        match item {
            Item::Class(class) => walk_class_mut(class, f),
            Item::Method(method) => walk_method_mut(method, f),
            Item::Statement(stmt) => walk_statement_mut(stmt, f),
        }
    }
}

fn walk_class_mut(class: &mut ClassNode, f: &mut impl FnMut(&mut AnnotationNode)) {
    class.annotations.iter_mut().for_each(&mut *f);
    for member in &mut class.members {
        match member {
            ClassMember::Field(field) => {
                field.annotations.iter_mut().for_each(&mut *f);
                if let Some(init) = &mut field.initializer {
                    walk_expr_mut(init, f);
                }
            }
            ClassMember::Method(method) => walk_method_mut(method, f),
            ClassMember::Class(inner) => walk_class_mut(inner, f),
        }
    }
}

fn walk_method_mut(method: &mut MethodNode, f: &mut impl FnMut(&mut AnnotationNode)) {
    method.annotations.iter_mut().for_each(&mut *f);
    for param in &mut method.parameters {
        param.annotations.iter_mut().for_each(&mut *f);
    }
    walk_block_mut(&mut method.body, f);
}

fn walk_block_mut(block: &mut Block, f: &mut impl FnMut(&mut AnnotationNode)) {
    for stmt in &mut block.statements {
        walk_statement_mut(stmt, f);
    }
}

fn walk_statement_mut(stmt: &mut Statement, f: &mut impl FnMut(&mut AnnotationNode)) {
    match stmt {
        Statement::Declaration(decl) => {
            decl.annotations.iter_mut().for_each(&mut *f);
            if let Some(init) = &mut decl.initializer {
                walk_expr_mut(init, f);
            }
        }
        Statement::Expr(expr) => walk_expr_mut(expr, f),
        Statement::Return(expr) => {
            if let Some(expr) = expr {
                walk_expr_mut(expr, f);
            }
        }
        Statement::If { condition, then_block, else_block } => {
            walk_expr_mut(condition, f);
            walk_block_mut(then_block, f);
            if let Some(else_block) = else_block {
                walk_block_mut(else_block, f);
            }
        }
        Statement::Block(block) => walk_block_mut(block, f),
        Statement::Try { body, catches, finally_block } => {
            walk_block_mut(body, f);
            for clause in catches {
                walk_block_mut(&mut clause.body, f);
            }
            if let Some(finally_block) = finally_block {
                walk_block_mut(finally_block, f);
            }
        }
        Statement::For { init, condition, update, body } => {
            if let Some(init) = init {
                walk_statement_mut(init, f);
            }
            if let Some(condition) = condition {
                walk_expr_mut(condition, f);
            }
            update.iter_mut().for_each(|expr| walk_expr_mut(expr, f));
            walk_block_mut(body, f);
        }
        Statement::ForIn { variable, iterable, body } => {
            variable.annotations.iter_mut().for_each(&mut *f);
            walk_expr_mut(iterable, f);
            walk_block_mut(body, f);
        }
        Statement::While { condition, body } => {
            walk_expr_mut(condition, f);
            walk_block_mut(body, f);
        }
        Statement::Switch { subject, cases } => {
            walk_expr_mut(subject, f);
            for case in cases {
                if let Some(value) = &mut case.value {
                    walk_expr_mut(value, f);
                }
                walk_block_mut(&mut case.body, f);
            }
        }
        Statement::Throw(expr) => walk_expr_mut(expr, f),
        Statement::Assert { condition, message } => {
            walk_expr_mut(condition, f);
            if let Some(message) = message {
                walk_expr_mut(message, f);
            }
        }
        Statement::Break | Statement::Continue => {}
    }
}

fn walk_expr_mut(expr: &mut Expr, f: &mut impl FnMut(&mut AnnotationNode)) {
    match expr {
        Expr::Constant(_) | Expr::Variable(_) => {}
        Expr::GString(parts) => {
            for part in parts {
                if let GStringPart::Expr(e) = part {
                    walk_expr_mut(e, f);
                }
            }
        }
        Expr::Property { object, .. } => walk_expr_mut(object, f),
        Expr::MethodCall { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                walk_expr_mut(receiver, f);
            }
            args.iter_mut().for_each(|arg| walk_expr_mut(arg, f));
        }
        Expr::New { args, .. } | Expr::List(args) => {
            args.iter_mut().for_each(|arg| walk_expr_mut(arg, f));
        }
        Expr::Closure { parameters, body } => {
            for param in parameters {
                param.annotations.iter_mut().for_each(&mut *f);
            }
            walk_block_mut(body, f);
        }
        Expr::Map(entries) => entries.iter_mut().for_each(|(_, v)| walk_expr_mut(v, f)),
        Expr::Index { object, index } => {
            walk_expr_mut(object, f);
            walk_expr_mut(index, f);
        }
        Expr::Binary { left, right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
        Expr::Unary { operand, .. }
        | Expr::Cast { expr: operand, .. }
        | Expr::InstanceOf { expr: operand, .. } => walk_expr_mut(operand, f),
        Expr::Ternary { condition, then_expr, else_expr } => {
            walk_expr_mut(condition, f);
            walk_expr_mut(then_expr, f);
            walk_expr_mut(else_expr, f);
        }
        Expr::Elvis { value: left, fallback: right }
        | Expr::Range { from: left, to: right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    const SCRIPT: &str = r#"
@PackageNote package org.example
@Grab('x') import a.b.C

@First _

class Build {
    @OnField def field = { @InFieldClosure def y = 2 }
    def run(@OnParam p) {
        @InMethod def z = 1
    }
}

def helper() {
    node {
        @InClosure _
    }
}
"#;

    #[test]
    fn test_walk_annotations_in_source_order() {
        let module = parse(SCRIPT).unwrap();
        let mut names = Vec::new();
        walk_annotations(&module, &mut |a: &AnnotationNode| names.push(a.class_name.clone()));
        assert_eq!(
            names,
            vec![
                "PackageNote",
                "Grab",
                "First",
                "OnField",
                "InFieldClosure",
                "OnParam",
                "InMethod",
                "InClosure",
            ]
        );
    }

    #[test]
    fn test_walk_annotations_mut_rewrites() {
        let mut module = parse(SCRIPT).unwrap();
        walk_annotations_mut(&mut module, &mut |a: &mut AnnotationNode| {
            a.class_name = format!("x.{}", a.class_name);
        });
        let mut names = Vec::new();
        walk_annotations(&module, &mut |a: &AnnotationNode| names.push(a.class_name.clone()));
        assert_eq!(names.len(), 8);
        assert!(names.iter().all(|n| n.starts_with("x.")));
    }

    #[test]
    fn test_walk_annotations_in_control_flow() {
        let source = r#"
try {
    @InTry def a = 1
} catch (e) {
    @InCatch def b = 2
} finally {
    for (@InLoopVar x in xs) {
        @InLoop def c = 3
    }
}
switch (x) {
    case 1:
        @InCase def d = 4
}
"#;
        let module = parse(source).unwrap();
        let mut names = Vec::new();
        walk_annotations(&module, &mut |a: &AnnotationNode| names.push(a.class_name.clone()));
        assert_eq!(names, vec!["InTry", "InCatch", "InLoopVar", "InLoop", "InCase"]);
    }
}
