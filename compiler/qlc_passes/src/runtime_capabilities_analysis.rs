// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runtime capability analysis: infers the minimum capability level each
//! callable requires from the patterns found in its specializations, and
//! checks statement scopes against the capability of a selected target.
//!
//! The analysis is local to a specialization. Calls are not followed, so the
//! inferred level is a lower bound that ignores the requirements of callees.
//! Analysis of distinct specializations is independent and side effect free.

use enum_iterator::Sequence;
use log::trace;
use miette::Diagnostic;
use qlc_data_structures::span::Span;
use qlc_hir::{
    hir::{
        Attr, BinOp, Block, CallableDecl, CallableKind, Expr, ExprKind, Item, ItemKind, Namespace,
        NodeId, Package, SpecBody, SpecDecl, Stmt, StmtKind, Ty,
    },
    visit::{walk_block, walk_callable_decl, walk_expr, walk_stmt, Visitor},
};
use rustc_hash::FxHashSet;
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
    str::FromStr,
};
use thiserror::Error;


/// The well-known name of the attribute attached by [`infer_capabilities`].
pub const CAPABILITY_ATTR: &str = "Capability";

/// How much classical control flow around measurement results a target
/// supports. Levels are ordered from least to most capable; a target at one
/// level supports everything the levels below it support.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Sequence)]
pub enum RuntimeCapability {
    /// No classical control flow may depend on a measurement result.
    #[default]
    Base,
    /// Measurement results may be compared, but only within the condition of
    /// a conditional expression in an operation, and with restrictions on the
    /// statements of the guarded blocks.
    Intermediate,
    /// No restrictions.
    Unrestricted,
}

impl RuntimeCapability {
    /// The textual name carried by the `Capability` attribute and accepted by
    /// [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RuntimeCapability::Base => "Base",
            RuntimeCapability::Intermediate => "Intermediate",
            RuntimeCapability::Unrestricted => "Unrestricted",
        }
    }
}

impl Display for RuntimeCapability {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuntimeCapability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Base" => Ok(RuntimeCapability::Base),
            "Intermediate" => Ok(RuntimeCapability::Intermediate),
            "Unrestricted" => Ok(RuntimeCapability::Unrestricted),
            _ => Err(UnknownCapability(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unknown capability level: {0}")]
pub struct UnknownCapability(String);

/// A syntactic pattern that constrains the capability required to run the
/// surrounding code. Ranges are relative to the start of the specialization
/// the pattern was found in; a pattern without a range comes from generated
/// code with no source location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pattern {
    /// A return from within a block whose guarding condition depends on a
    /// measurement result.
    ReturnInResultConditionedBlock(Option<Span>),
    /// Reassignment, within such a block, of a variable declared outside it.
    SetInResultConditionedBlock(Rc<str>, Option<Span>),
    /// A measurement result compared for equality within the condition of a
    /// conditional expression.
    ResultEqualityInCondition(Option<Span>),
    /// A measurement result compared for equality anywhere else.
    ResultEqualityNotInCondition(Option<Span>),
}

impl Pattern {
    /// The minimum capability a target must have to support the pattern. The
    /// returns and reassignments found in result-conditioned blocks count as
    /// fully general for aggregation; their diagnostics follow the narrower
    /// rule in [`scope_diagnostics`].
    #[must_use]
    pub fn required_capability(&self, in_operation: bool) -> RuntimeCapability {
        match self {
            Pattern::ResultEqualityInCondition(_) if in_operation => {
                RuntimeCapability::Intermediate
            }
            _ => RuntimeCapability::Unrestricted,
        }
    }
}

/// The target configuration a scope is analyzed against.
#[derive(Clone, Debug)]
pub struct AnalysisContext {
    /// The capability of the selected target.
    pub capability: RuntimeCapability,
    /// Whether the scope is the body of an operation rather than a function.
    pub in_operation: bool,
    /// The architecture name substituted into diagnostics.
    pub architecture: Rc<str>,
}

#[derive(Clone, Debug, Diagnostic, Error)]
pub enum Error {
    #[error("cannot return from within a result-conditioned block")]
    #[diagnostic(help(
        "the target {0} does not support return statements in blocks that depend on a measurement result"
    ))]
    #[diagnostic(code("Qlc.RuntimeCapabilities.ReturnInResultConditionedBlock"))]
    ReturnInResultConditionedBlock(String, #[label] Span),

    #[error("cannot reassign {0} from within a result-conditioned block")]
    #[diagnostic(help(
        "in blocks that depend on a measurement result, the target {1} only supports reassigning variables declared within the block"
    ))]
    #[diagnostic(code("Qlc.RuntimeCapabilities.SetInResultConditionedBlock"))]
    SetInResultConditionedBlock(String, String, #[label] Span),

    #[error("cannot compare measurement results")]
    #[diagnostic(help(
        "the target {0} only supports comparing measurement results as part of the condition of an if expression in an operation"
    ))]
    #[diagnostic(code("Qlc.RuntimeCapabilities.ResultComparisonNotInOperationIf"))]
    ResultComparisonNotInOperationIf(String, #[label] Span),

    #[error("cannot compare measurement results")]
    #[diagnostic(help("comparing measurement results is not supported by the target {0}"))]
    #[diagnostic(code("Qlc.RuntimeCapabilities.UnsupportedResultComparison"))]
    UnsupportedResultComparison(String, #[label] Span),
}

impl Error {
    /// Translates the error's range by the given offset, anchoring a
    /// specialization-relative range in its file.
    #[must_use]
    pub fn with_offset(self, offset: u32) -> Self {
        match self {
            Error::ReturnInResultConditionedBlock(arch, span) => {
                Error::ReturnInResultConditionedBlock(arch, span.with_offset(offset))
            }
            Error::SetInResultConditionedBlock(name, arch, span) => {
                Error::SetInResultConditionedBlock(name, arch, span.with_offset(offset))
            }
            Error::ResultComparisonNotInOperationIf(arch, span) => {
                Error::ResultComparisonNotInOperationIf(arch, span.with_offset(offset))
            }
            Error::UnsupportedResultComparison(arch, span) => {
                Error::UnsupportedResultComparison(arch, span.with_offset(offset))
            }
        }
    }
}

/// Collects the capability patterns in a statement scope, in document order.
/// Pattern ranges are relative to the start of the scope.
#[must_use]
pub fn scope_patterns(block: &Block) -> Vec<Pattern> {
    let mut extractor = PatternExtractor {
        offset: Some(0),
        patterns: Vec::new(),
    };
    // The scope's statements are already relative to the scope, so the
    // scope's own span contributes no offset.
    walk_block(&mut extractor, block);
    extractor.patterns
}

/// Runs the extractor over a scope and produces a diagnostic for every
/// pattern the context's target cannot support, in document order. Patterns
/// without a range surface with the default span.
#[must_use]
pub fn scope_diagnostics(context: &AnalysisContext, block: &Block) -> Vec<Error> {
    scope_patterns(block)
        .iter()
        .filter_map(|pattern| diagnostic(context, pattern))
        .collect()
}

/// The minimum capability required by one specialization. Specializations
/// without a provided implementation require nothing beyond [`RuntimeCapability::Base`].
#[must_use]
pub fn specialization_capability(decl: &SpecDecl, in_operation: bool) -> RuntimeCapability {
    match &decl.body {
        SpecBody::Gen(_) => RuntimeCapability::Base,
        SpecBody::Impl(block) => scope_patterns(block)
            .iter()
            .map(|pattern| pattern.required_capability(in_operation))
            .max()
            .unwrap_or_default(),
    }
}

/// The minimum capability required by any specialization of a callable.
#[must_use]
pub fn callable_capability(decl: &CallableDecl) -> RuntimeCapability {
    let in_operation = decl.kind == CallableKind::Operation;
    decl.specs
        .iter()
        .map(|spec| specialization_capability(spec, in_operation))
        .max()
        .unwrap_or_default()
}

/// Annotates every callable in the package with the capability level inferred
/// from its specializations, carried by a `Capability` attribute whose
/// argument is the level's name. Returns a new package; the input is
/// unchanged. Re-annotating a package replaces the attribute from an earlier
/// run rather than accumulating duplicates.
#[must_use]
pub fn infer_capabilities(package: &Package) -> Package {
    let namespaces = package
        .namespaces
        .iter()
        .map(|namespace| Namespace {
            id: namespace.id,
            span: namespace.span,
            name: namespace.name.clone(),
            items: namespace.items.iter().map(annotate_item).collect(),
        })
        .collect();
    Package { namespaces }
}

/// Checks every provided specialization in the package against a target,
/// returning the diagnostics in declaration order. Ranges are anchored in the
/// file for specializations that have a source location.
#[must_use]
pub fn check_runtime_capabilities(
    package: &Package,
    capability: RuntimeCapability,
    architecture: &str,
) -> Vec<Error> {
    let mut checker = Checker {
        capability,
        architecture: architecture.into(),
        in_operation: false,
        errors: Vec::new(),
    };
    checker.visit_package(package);
    checker.errors
}

fn diagnostic(context: &AnalysisContext, pattern: &Pattern) -> Option<Error> {
    let architecture = || context.architecture.to_string();
    match pattern {
        // Returns and reassignments are checked only against the Intermediate
        // profile's restriction on result-conditioned blocks, not against the
        // general rank comparison.
        Pattern::ReturnInResultConditionedBlock(range) => (context.capability
            == RuntimeCapability::Intermediate)
            .then(|| {
                Error::ReturnInResultConditionedBlock(architecture(), range.unwrap_or_default())
            }),
        Pattern::SetInResultConditionedBlock(name, range) => (context.capability
            == RuntimeCapability::Intermediate)
            .then(|| {
                Error::SetInResultConditionedBlock(
                    name.to_string(),
                    architecture(),
                    range.unwrap_or_default(),
                )
            }),
        Pattern::ResultEqualityInCondition(range)
        | Pattern::ResultEqualityNotInCondition(range) => {
            if context.capability < pattern.required_capability(context.in_operation) {
                let range = range.unwrap_or_default();
                Some(if context.capability == RuntimeCapability::Intermediate {
                    Error::ResultComparisonNotInOperationIf(architecture(), range)
                } else {
                    Error::UnsupportedResultComparison(architecture(), range)
                })
            } else {
                None
            }
        }
    }
}

fn annotate_item(item: &Item) -> Item {
    let kind = match &item.kind {
        ItemKind::Callable(decl) => ItemKind::Callable(annotate_callable(decl)),
        kind @ ItemKind::Open(_) => kind.clone(),
    };
    Item {
        id: item.id,
        span: item.span,
        kind,
    }
}

fn annotate_callable(decl: &CallableDecl) -> CallableDecl {
    let capability = callable_capability(decl);
    trace!("callable {} requires {capability}", decl.name.name);
    let mut attrs: Vec<Attr> = decl
        .attrs
        .iter()
        .filter(|attr| &*attr.name != CAPABILITY_ATTR)
        .cloned()
        .collect();
    attrs.push(Attr {
        id: NodeId::default(),
        span: None,
        name: CAPABILITY_ATTR.into(),
        arg: Some(capability.name().into()),
    });
    CallableDecl {
        attrs,
        ..decl.clone()
    }
}

fn offset_sum(lhs: Option<u32>, rhs: Option<u32>) -> Option<u32> {
    lhs.zip(rhs).map(|(lhs, rhs)| lhs + rhs)
}

fn translate(offset: Option<u32>, span: Option<Span>) -> Option<Span> {
    offset.zip(span).map(|(offset, span)| span.with_offset(offset))
}

/// Walks one statement scope and collects capability patterns. `offset` is
/// the scope-relative offset of the node whose children are being visited; it
/// becomes absent as soon as any node on the path has no span.
struct PatternExtractor {
    offset: Option<u32>,
    patterns: Vec<Pattern>,
}

impl PatternExtractor {
    fn range(&self, span: Option<Span>) -> Option<Span> {
        translate(self.offset, span)
    }

    fn is_result_comparison(op: BinOp, lhs: &Expr) -> bool {
        matches!(op, BinOp::Eq | BinOp::Neq) && lhs.ty == Ty::Result
    }

    /// Folds the guarded blocks of a conditional in source order. The flag is
    /// sticky: once any preceding condition of the same conditional depends
    /// on a measurement result, every later block is result conditioned.
    fn visit_conditional(
        &mut self,
        cond: &Expr,
        block: &Block,
        otherwise: Option<&Expr>,
        seen_result_condition: bool,
    ) {
        let result_dependent = self.visit_condition(cond) || seen_result_condition;
        if result_dependent {
            self.visit_result_conditioned_block(block);
        } else {
            self.visit_block(block);
        }
        if let Some(otherwise) = otherwise {
            match &otherwise.kind {
                ExprKind::If(cond, block, next) => {
                    self.visit_conditional(cond, block, next.as_deref(), result_dependent);
                }
                // An unconditional else is the final guarded block, guarded
                // by a condition of `true`.
                ExprKind::Block(block) => {
                    if result_dependent {
                        self.visit_result_conditioned_block(block);
                    } else {
                        self.visit_block(block);
                    }
                }
                _ => self.visit_expr(otherwise),
            }
        }
    }

    /// Walks a condition expression, classifying every measurement result
    /// comparison in it as in-condition, and reports whether any was found.
    fn visit_condition(&mut self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::BinOp(op, lhs, _) if Self::is_result_comparison(*op, lhs) => {
                self.patterns
                    .push(Pattern::ResultEqualityInCondition(self.range(expr.span)));
                true
            }
            ExprKind::Assign(lhs, rhs) | ExprKind::BinOp(_, lhs, rhs) | ExprKind::Call(lhs, rhs) => {
                let found = self.visit_condition(lhs);
                self.visit_condition(rhs) || found
            }
            ExprKind::Return(inner) | ExprKind::UnOp(_, inner) => self.visit_condition(inner),
            ExprKind::Tuple(items) => items
                .iter()
                .fold(false, |found, item| self.visit_condition(item) || found),
            // A conditional nested within a condition classifies its own
            // condition independently; it does not make the outer condition
            // result dependent.
            ExprKind::If(..) => {
                self.visit_expr(expr);
                false
            }
            ExprKind::Block(_) | ExprKind::Lit(_) | ExprKind::Var(_) => false,
        }
    }

    /// Applies the direct-statement checks to a result-conditioned block,
    /// interleaved with the normal walk so findings stay in document order.
    /// Only the block's own statement list is scanned; statements of nested
    /// scopes belong to their own conditionals.
    fn visit_result_conditioned_block(&mut self, block: &Block) {
        let offset = self.offset;
        self.offset = offset_sum(offset, block.span.map(|s| s.lo));
        let mut declared = FxHashSet::default();
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Local(_, name, _) => {
                    declared.insert(Rc::clone(&name.name));
                }
                StmtKind::Expr(expr) | StmtKind::Semi(expr) => match &expr.kind {
                    ExprKind::Return(_) => {
                        let range = self.range(stmt.span);
                        self.patterns
                            .push(Pattern::ReturnInResultConditionedBlock(range));
                    }
                    ExprKind::Assign(lhs, _) => {
                        if let ExprKind::Var(name) = &lhs.kind {
                            if !declared.contains(&name.name) {
                                let base = offset_sum(self.offset, stmt.span.map(|s| s.lo));
                                self.patterns.push(Pattern::SetInResultConditionedBlock(
                                    Rc::clone(&name.name),
                                    translate(base, expr.span),
                                ));
                            }
                        }
                    }
                    _ => {}
                },
            }
            self.visit_stmt(stmt);
        }
        self.offset = offset;
    }
}

impl<'a> Visitor<'a> for PatternExtractor {
    fn visit_block(&mut self, block: &'a Block) {
        let offset = self.offset;
        self.offset = offset_sum(offset, block.span.map(|s| s.lo));
        walk_block(self, block);
        self.offset = offset;
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        let offset = self.offset;
        self.offset = offset_sum(offset, stmt.span.map(|s| s.lo));
        walk_stmt(self, stmt);
        self.offset = offset;
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::If(cond, block, otherwise) => {
                self.visit_conditional(cond, block, otherwise.as_deref(), false);
            }
            ExprKind::BinOp(op, lhs, _) if Self::is_result_comparison(*op, lhs) => {
                self.patterns
                    .push(Pattern::ResultEqualityNotInCondition(self.range(expr.span)));
                walk_expr(self, expr);
            }
            _ => walk_expr(self, expr),
        }
    }
}

struct Checker {
    capability: RuntimeCapability,
    architecture: Rc<str>,
    in_operation: bool,
    errors: Vec<Error>,
}

impl<'a> Visitor<'a> for Checker {
    fn visit_callable_decl(&mut self, decl: &'a CallableDecl) {
        self.in_operation = decl.kind == CallableKind::Operation;
        walk_callable_decl(self, decl);
    }

    fn visit_spec_decl(&mut self, decl: &'a SpecDecl) {
        let SpecBody::Impl(block) = &decl.body else {
            return;
        };
        let context = AnalysisContext {
            capability: self.capability,
            in_operation: self.in_operation,
            architecture: Rc::clone(&self.architecture),
        };
        let errors = scope_diagnostics(&context, block);
        match decl.span {
            Some(span) => self
                .errors
                .extend(errors.into_iter().map(|error| error.with_offset(span.lo))),
            None => self.errors.extend(errors),
        }
    }
}
