// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The high-level intermediate representation produced by the front end and
//! consumed by the analysis passes. Nodes are immutable once built; passes
//! that change the tree produce a new one.
//!
//! Statement spans are relative to the start of the enclosing block, and block
//! and expression spans are relative to the start of the enclosing statement.
//! The top-level statements of a specialization are relative to the start of
//! the specialization. A node synthesized by the compiler has no span.

use indenter::{indented, Indented};
use num_bigint::BigInt;
use qlc_data_structures::span::Span;
use std::{
    fmt::{self, Display, Formatter, Write},
    rc::Rc,
};

fn set_indentation<'a, 'b>(
    indent: Indented<'a, Formatter<'b>>,
    level: usize,
) -> Indented<'a, Formatter<'b>> {
    match level {
        0 => indent.with_str(""),
        1 => indent.with_str("    "),
        2 => indent.with_str("        "),
        _ => unimplemented!("indentation level not supported"),
    }
}

struct OptSpan(Option<Span>);

impl Display for OptSpan {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.0 {
            Some(span) => Display::fmt(&span, f),
            None => f.write_str("[?]"),
        }
    }
}

/// A unique identifier for an HIR node, assigned by the front end.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    const PLACEHOLDER: Self = Self(u32::MAX);

    /// True if the front end has not assigned an identifier to this node.
    #[must_use]
    pub fn is_placeholder(self) -> bool {
        self == Self::PLACEHOLDER
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_placeholder() {
            f.write_str("_id_")
        } else {
            Display::fmt(&self.0, f)
        }
    }
}

/// The root of the HIR.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Package {
    pub namespaces: Vec<Namespace>,
}

impl Display for Package {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Package:")?;
        let mut indent = set_indentation(indented(f), 1);
        for namespace in &self.namespaces {
            write!(indent, "\n{namespace}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Namespace {
    pub id: NodeId,
    pub span: Option<Span>,
    pub name: Ident,
    pub items: Vec<Item>,
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Namespace {} {} ({}):", self.id, OptSpan(self.span), self.name)?;
        let mut indent = set_indentation(indented(f), 1);
        for item in &self.items {
            write!(indent, "\n{item}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub id: NodeId,
    pub span: Option<Span>,
    pub kind: ItemKind,
}

impl Display for Item {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Item {} {}:", self.id, OptSpan(self.span))?;
        let mut indent = set_indentation(indented(f), 1);
        write!(indent, "\n{}", self.kind)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    Callable(CallableDecl),
    Open(Ident),
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ItemKind::Callable(decl) => write!(f, "{decl}"),
            ItemKind::Open(name) => write!(f, "Open ({name})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallableDecl {
    pub id: NodeId,
    pub span: Option<Span>,
    pub kind: CallableKind,
    pub name: Ident,
    pub attrs: Vec<Attr>,
    pub specs: Vec<SpecDecl>,
}

impl Display for CallableDecl {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Callable {} {} ({}):",
            self.id,
            OptSpan(self.span),
            self.kind
        )?;
        let mut indent = set_indentation(indented(f), 1);
        write!(indent, "\nname: {}", self.name)?;
        for attr in &self.attrs {
            write!(indent, "\nattr: {attr}")?;
        }
        for spec in &self.specs {
            write!(indent, "\n{spec}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallableKind {
    Function,
    Operation,
}

impl Display for CallableKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CallableKind::Function => f.write_str("Function"),
            CallableKind::Operation => f.write_str("Operation"),
        }
    }
}

/// An attribute attached to a callable declaration, with an optional string
/// argument.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    pub id: NodeId,
    pub span: Option<Span>,
    pub name: Rc<str>,
    pub arg: Option<Rc<str>>,
}

impl Display for Attr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Attr {} {} \"{}\"", self.id, OptSpan(self.span), self.name)?;
        if let Some(arg) = &self.arg {
            write!(f, "(\"{arg}\")")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpecDecl {
    pub id: NodeId,
    /// The location of the specialization within its file, when the
    /// specialization comes from source.
    pub span: Option<Span>,
    pub spec: Spec,
    pub body: SpecBody,
}

impl Display for SpecDecl {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "SpecDecl {} {} ({}): {}",
            self.id,
            OptSpan(self.span),
            self.spec,
            self.body
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Spec {
    Body,
    Adj,
    Ctl,
    CtlAdj,
}

impl Display for Spec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Spec::Body => f.write_str("body"),
            Spec::Adj => f.write_str("adjoint"),
            Spec::Ctl => f.write_str("controlled"),
            Spec::CtlAdj => f.write_str("controlled adjoint"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpecBody {
    Gen(SpecGen),
    Impl(Block),
}

impl Display for SpecBody {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SpecBody::Gen(gen) => write!(f, "Gen: {gen:?}"),
            SpecBody::Impl(block) => {
                write!(f, "Impl:")?;
                let mut indent = set_indentation(indented(f), 1);
                write!(indent, "\n{block}")?;
                Ok(())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpecGen {
    Auto,
    Distribute,
    Intrinsic,
    Invert,
    Slf,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub span: Option<Span>,
    pub stmts: Vec<Stmt>,
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.stmts.is_empty() {
            write!(f, "Block {} {}: <empty>", self.id, OptSpan(self.span))
        } else {
            write!(f, "Block {} {}:", self.id, OptSpan(self.span))?;
            let mut indent = set_indentation(indented(f), 1);
            for stmt in &self.stmts {
                write!(indent, "\n{stmt}")?;
            }
            Ok(())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Option<Span>,
    pub kind: StmtKind,
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Stmt {} {}: {}", self.id, OptSpan(self.span), self.kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Local(Mutability, Ident, Expr),
    Semi(Expr),
}

impl Display for StmtKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StmtKind::Expr(expr) => write!(f, "Expr: {expr}"),
            StmtKind::Local(mutability, name, value) => {
                write!(f, "Local ({mutability}):")?;
                let mut indent = set_indentation(indented(f), 1);
                write!(indent, "\n{name}")?;
                write!(indent, "\n{value}")?;
                Ok(())
            }
            StmtKind::Semi(expr) => write!(f, "Semi: {expr}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

impl Display for Mutability {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Mutability::Immutable => f.write_str("Immutable"),
            Mutability::Mutable => f.write_str("Mutable"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Option<Span>,
    pub ty: Ty,
    pub kind: ExprKind,
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Expr {} {} [{}]: {}",
            self.id,
            OptSpan(self.span),
            self.ty,
            self.kind
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Assign(Box<Expr>, Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Block(Block),
    Call(Box<Expr>, Box<Expr>),
    If(Box<Expr>, Block, Option<Box<Expr>>),
    Lit(Lit),
    Return(Box<Expr>),
    Tuple(Vec<Expr>),
    UnOp(UnOp, Box<Expr>),
    Var(Ident),
}

impl Display for ExprKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ExprKind::Assign(lhs, rhs) => display_two(f, "Assign:", lhs, rhs),
            ExprKind::BinOp(op, lhs, rhs) => display_two(f, &format!("BinOp ({op:?}):"), lhs, rhs),
            ExprKind::Block(block) => write!(f, "{block}"),
            ExprKind::Call(callee, arg) => display_two(f, "Call:", callee, arg),
            ExprKind::If(cond, block, otherwise) => {
                write!(f, "If:")?;
                let mut indent = set_indentation(indented(f), 1);
                write!(indent, "\n{cond}")?;
                write!(indent, "\n{block}")?;
                if let Some(otherwise) = otherwise {
                    write!(indent, "\nElse: {otherwise}")?;
                }
                Ok(())
            }
            ExprKind::Lit(lit) => write!(f, "Lit: {lit}"),
            ExprKind::Return(expr) => {
                write!(f, "Return:")?;
                let mut indent = set_indentation(indented(f), 1);
                write!(indent, "\n{expr}")?;
                Ok(())
            }
            ExprKind::Tuple(exprs) => {
                if exprs.is_empty() {
                    write!(f, "Tuple: <empty>")
                } else {
                    write!(f, "Tuple:")?;
                    let mut indent = set_indentation(indented(f), 1);
                    for expr in exprs {
                        write!(indent, "\n{expr}")?;
                    }
                    Ok(())
                }
            }
            ExprKind::UnOp(op, expr) => {
                write!(f, "UnOp ({op:?}):")?;
                let mut indent = set_indentation(indented(f), 1);
                write!(indent, "\n{expr}")?;
                Ok(())
            }
            ExprKind::Var(name) => write!(f, "Var: {name}"),
        }
    }
}

fn display_two(f: &mut Formatter, label: &str, lhs: &Expr, rhs: &Expr) -> fmt::Result {
    write!(f, "{label}")?;
    let mut indent = set_indentation(indented(f), 1);
    write!(indent, "\n{lhs}")?;
    write!(indent, "\n{rhs}")?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinOp {
    Add,
    AndL,
    Div,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Mul,
    Neq,
    OrL,
    Sub,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnOp {
    Neg,
    NotL,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Lit {
    BigInt(BigInt),
    Bool(bool),
    Double(f64),
    Int(i64),
    Result(Result),
    Unit,
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Lit::BigInt(value) => write!(f, "BigInt({value})"),
            Lit::Bool(value) => write!(f, "Bool({value})"),
            Lit::Double(value) => write!(f, "Double({value})"),
            Lit::Int(value) => write!(f, "Int({value})"),
            Lit::Result(value) => write!(f, "Result({value:?})"),
            Lit::Unit => f.write_str("Unit"),
        }
    }
}

/// A measurement result literal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Result {
    One,
    Zero,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub span: Option<Span>,
    pub name: Rc<str>,
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Ident {} {} \"{}\"", self.id, OptSpan(self.span), self.name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ty {
    BigInt,
    Bool,
    Double,
    Int,
    Qubit,
    Result,
    Tuple(Vec<Ty>),
    Unit,
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Ty::BigInt => f.write_str("BigInt"),
            Ty::Bool => f.write_str("Bool"),
            Ty::Double => f.write_str("Double"),
            Ty::Int => f.write_str("Int"),
            Ty::Qubit => f.write_str("Qubit"),
            Ty::Result => f.write_str("Result"),
            Ty::Tuple(items) => {
                f.write_str("(")?;
                let mut first = true;
                for item in items {
                    if !first {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                    first = false;
                }
                f.write_str(")")
            }
            Ty::Unit => f.write_str("Unit"),
        }
    }
}
