use std::fmt;

use serde::Serialize;
use syn::visit::Visit;

/// Identity of an instrumentation marker attribute.
///
/// A marker is recognised by its attribute name, written bare (`#[name]`) or
/// through one of the crates that export it (`#[krate::name]`). Kinds with
/// different names or crate lists never match each other's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerKind {
    name: &'static str,
    crates: &'static [&'static str],
}

/// The `#[method_logger]` marker exported by `method-logger-macros`.
pub const METHOD_LOGGER: MarkerKind =
    MarkerKind::new("method_logger", &["method_logger_macros", "method_logger"]);

impl MarkerKind {
    pub const fn new(name: &'static str, crates: &'static [&'static str]) -> Self {
        Self { name, crates }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `path` spells this marker. Generic arguments never match.
    pub fn matches_path(&self, path: &syn::Path) -> bool {
        if path.segments.iter().any(|seg| !seg.arguments.is_none()) {
            return false;
        }
        let segments: Vec<&syn::Ident> = path.segments.iter().map(|seg| &seg.ident).collect();
        match segments.as_slice() {
            [only] => path.leading_colon.is_none() && *only == self.name,
            [krate, last] => *last == self.name && self.crates.iter().any(|c| *krate == *c),
            _ => false,
        }
    }
}

/// A callable declaration in a `syn` tree.
///
/// This is the only shape the registry answers questions about, so markers
/// attached to structs, constants, modules and the like can never be
/// reported as tagged.
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    /// Free function, including functions nested in other bodies.
    Fn(&'a syn::ItemFn),
    /// Method inside an `impl` block.
    ImplFn(&'a syn::ImplItemFn),
    /// Trait method, with or without a default body.
    TraitFn(&'a syn::TraitItemFn),
    /// Function declared in an `extern` block. Never has a body.
    ForeignFn(&'a syn::ForeignItemFn),
}

impl<'a> Declaration<'a> {
    pub fn attrs(&self) -> &'a [syn::Attribute] {
        match self {
            Declaration::Fn(f) => &f.attrs,
            Declaration::ImplFn(f) => &f.attrs,
            Declaration::TraitFn(f) => &f.attrs,
            Declaration::ForeignFn(f) => &f.attrs,
        }
    }

    pub fn sig(&self) -> &'a syn::Signature {
        match self {
            Declaration::Fn(f) => &f.sig,
            Declaration::ImplFn(f) => &f.sig,
            Declaration::TraitFn(f) => &f.sig,
            Declaration::ForeignFn(f) => &f.sig,
        }
    }

    pub fn name(&self) -> String {
        self.sig().ident.to_string()
    }

    pub fn body(&self) -> Option<&'a syn::Block> {
        match self {
            Declaration::Fn(f) => Some(&f.block),
            Declaration::ImplFn(f) => Some(&f.block),
            Declaration::TraitFn(f) => f.default.as_ref(),
            Declaration::ForeignFn(_) => None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body().is_some()
    }

    /// `const fn` bodies are evaluated at compile time and cannot print, so
    /// the marker has no meaning there.
    pub fn accepts_marker(&self) -> bool {
        self.sig().constness.is_none()
    }
}

/// Answers "is this declaration tagged?" for one marker kind.
///
/// Holds no per-tree state, so a single registry can serve any number of
/// concurrent rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRegistry {
    kind: MarkerKind,
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::new(METHOD_LOGGER)
    }
}

impl MarkerRegistry {
    pub const fn new(kind: MarkerKind) -> Self {
        Self { kind }
    }

    pub fn marker_kind(&self) -> MarkerKind {
        self.kind
    }

    /// True iff `decl` carries at least one well-formed marker and its kind
    /// accepts the marker. Duplicate markers count once; malformed ones are
    /// ignored.
    pub fn is_tagged(&self, decl: &Declaration<'_>) -> bool {
        decl.accepts_marker() && decl.attrs().iter().any(|attr| self.is_marker(attr))
    }

    /// A well-formed marker: an outer attribute with no arguments whose path
    /// names this registry's kind.
    pub fn is_marker(&self, attr: &syn::Attribute) -> bool {
        matches!(attr.style, syn::AttrStyle::Outer)
            && matches!(attr.meta, syn::Meta::Path(_))
            && self.names_marker(attr)
    }

    /// Any attribute spelled like the marker, well-formed or not.
    fn names_marker(&self, attr: &syn::Attribute) -> bool {
        self.kind.matches_path(attr.path())
    }

    /// Remove every well-formed marker from `attrs`, returning how many were
    /// removed.
    pub fn strip_markers(&self, attrs: &mut Vec<syn::Attribute>) -> usize {
        let before = attrs.len();
        attrs.retain(|attr| !self.is_marker(attr));
        before - attrs.len()
    }

    /// Collect tagged declarations and ignored marker attachments in `file`,
    /// in document order.
    pub fn scan(&self, file: &syn::File) -> Scan {
        let mut scanner = Scanner {
            registry: self,
            scope: Scope::default(),
            scan: Scan::default(),
        };
        scanner.visit_file(file);
        scanner.scan
    }
}

/// Result of [`MarkerRegistry::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scan {
    pub tagged: Vec<TaggedDeclaration>,
    pub ignored: Vec<IgnoredMarker>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedDeclaration {
    /// Bare name for free functions, "Type::method" or "Trait::method" otherwise.
    pub name: String,
    pub line: usize,
    /// Tagged declarations without a body are left alone by the rewriter.
    pub has_body: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredMarker {
    pub item: String,
    pub line: usize,
    pub reason: IgnoreReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IgnoreReason {
    /// Attached to something that is not a callable declaration.
    Misplaced,
    /// Written with arguments or as an inner attribute.
    Malformed,
    ConstFn,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::Misplaced => "marker only applies to functions",
            IgnoreReason::Malformed => "marker takes no arguments",
            IgnoreReason::ConstFn => "marker cannot apply to a const fn",
        };
        f.write_str(text)
    }
}

/// The `impl` type or trait whose items a visitor is inside, used to report
/// methods as `Owner::method`. Shared by [`MarkerRegistry::scan`] and the
/// rewriter so both name declarations the same way.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    owner: Option<String>,
}

impl Scope {
    /// Enter an `impl` block. Returns the previous owner for [`Scope::leave`].
    pub(crate) fn enter_impl(&mut self, node: &syn::ItemImpl) -> Option<String> {
        self.owner.replace(type_name(&node.self_ty))
    }

    pub(crate) fn enter_trait(&mut self, node: &syn::ItemTrait) -> Option<String> {
        self.owner.replace(node.ident.to_string())
    }

    /// Enter a free function body. Functions nested there are not methods.
    pub(crate) fn enter_fn(&mut self) -> Option<String> {
        self.owner.take()
    }

    pub(crate) fn leave(&mut self, prev: Option<String>) {
        self.owner = prev;
    }

    /// Reported name of `decl`: bare for free and foreign functions,
    /// `Owner::method` for impl and trait methods.
    pub(crate) fn qualify(&self, decl: &Declaration<'_>) -> String {
        let name = decl.name();
        match (decl, &self.owner) {
            (Declaration::ImplFn(_) | Declaration::TraitFn(_), Some(owner)) => {
                format!("{owner}::{name}")
            }
            _ => name,
        }
    }
}

struct Scanner<'r> {
    registry: &'r MarkerRegistry,
    scope: Scope,
    scan: Scan,
}

impl Scanner<'_> {
    fn declaration(&mut self, decl: Declaration<'_>) {
        let qualified = self.scope.qualify(&decl);
        let mut marked = false;
        for attr in decl.attrs() {
            if !self.registry.names_marker(attr) {
                continue;
            }
            if self.registry.is_marker(attr) {
                marked = true;
            } else {
                self.ignore(&qualified, attr, IgnoreReason::Malformed);
            }
        }
        if !marked {
            return;
        }
        let line = decl.sig().fn_token.span.start().line;
        if self.registry.is_tagged(&decl) {
            self.scan.tagged.push(TaggedDeclaration {
                name: qualified,
                line,
                has_body: decl.has_body(),
            });
        } else {
            self.scan.ignored.push(IgnoredMarker {
                item: qualified,
                line,
                reason: IgnoreReason::ConstFn,
            });
        }
    }

    fn misplaced(&mut self, item: &str, attrs: &[syn::Attribute]) {
        for attr in attrs {
            if self.registry.names_marker(attr) {
                self.ignore(item, attr, IgnoreReason::Misplaced);
            }
        }
    }

    fn ignore(&mut self, item: &str, attr: &syn::Attribute, reason: IgnoreReason) {
        self.scan.ignored.push(IgnoredMarker {
            item: item.to_string(),
            line: attr.pound_token.span.start().line,
            reason,
        });
    }
}

impl<'ast> Visit<'ast> for Scanner<'_> {
    fn visit_item(&mut self, node: &'ast syn::Item) {
        if let Some((item, attrs)) = describe_item(node) {
            self.misplaced(&item, attrs);
        }
        syn::visit::visit_item(self, node);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.declaration(Declaration::Fn(node));
        let prev = self.scope.enter_fn();
        syn::visit::visit_item_fn(self, node);
        self.scope.leave(prev);
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let prev = self.scope.enter_impl(node);
        syn::visit::visit_item_impl(self, node);
        self.scope.leave(prev);
    }

    fn visit_impl_item(&mut self, node: &'ast syn::ImplItem) {
        let described = match node {
            syn::ImplItem::Const(c) => Some((format!("const {}", c.ident), &c.attrs)),
            syn::ImplItem::Type(t) => Some((format!("type {}", t.ident), &t.attrs)),
            syn::ImplItem::Macro(m) => Some(("macro invocation".to_string(), &m.attrs)),
            _ => None,
        };
        if let Some((item, attrs)) = described {
            self.misplaced(&item, attrs);
        }
        syn::visit::visit_impl_item(self, node);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.declaration(Declaration::ImplFn(node));
        syn::visit::visit_impl_item_fn(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        let prev = self.scope.enter_trait(node);
        syn::visit::visit_item_trait(self, node);
        self.scope.leave(prev);
    }

    fn visit_trait_item(&mut self, node: &'ast syn::TraitItem) {
        let described = match node {
            syn::TraitItem::Const(c) => Some((format!("const {}", c.ident), &c.attrs)),
            syn::TraitItem::Type(t) => Some((format!("type {}", t.ident), &t.attrs)),
            syn::TraitItem::Macro(m) => Some(("macro invocation".to_string(), &m.attrs)),
            _ => None,
        };
        if let Some((item, attrs)) = described {
            self.misplaced(&item, attrs);
        }
        syn::visit::visit_trait_item(self, node);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast syn::TraitItemFn) {
        self.declaration(Declaration::TraitFn(node));
        syn::visit::visit_trait_item_fn(self, node);
    }

    fn visit_foreign_item(&mut self, node: &'ast syn::ForeignItem) {
        let described = match node {
            syn::ForeignItem::Static(s) => Some((format!("static {}", s.ident), &s.attrs)),
            syn::ForeignItem::Type(t) => Some((format!("type {}", t.ident), &t.attrs)),
            syn::ForeignItem::Macro(m) => Some(("macro invocation".to_string(), &m.attrs)),
            _ => None,
        };
        if let Some((item, attrs)) = described {
            self.misplaced(&item, attrs);
        }
        syn::visit::visit_foreign_item(self, node);
    }

    fn visit_foreign_item_fn(&mut self, node: &'ast syn::ForeignItemFn) {
        self.declaration(Declaration::ForeignFn(node));
        syn::visit::visit_foreign_item_fn(self, node);
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        self.misplaced("let binding", &node.attrs);
        syn::visit::visit_local(self, node);
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        self.misplaced("closure", &node.attrs);
        syn::visit::visit_expr_closure(self, node);
    }

    fn visit_field(&mut self, node: &'ast syn::Field) {
        let item = match &node.ident {
            Some(ident) => format!("field {ident}"),
            None => "tuple field".to_string(),
        };
        self.misplaced(&item, &node.attrs);
        syn::visit::visit_field(self, node);
    }

    fn visit_variant(&mut self, node: &'ast syn::Variant) {
        self.misplaced(&format!("variant {}", node.ident), &node.attrs);
        syn::visit::visit_variant(self, node);
    }
}

/// Human-readable label and attributes for every non-function item.
fn describe_item(item: &syn::Item) -> Option<(String, &[syn::Attribute])> {
    let (label, attrs) = match item {
        syn::Item::Const(i) => (format!("const {}", i.ident), &i.attrs),
        syn::Item::Enum(i) => (format!("enum {}", i.ident), &i.attrs),
        syn::Item::ExternCrate(i) => (format!("extern crate {}", i.ident), &i.attrs),
        syn::Item::ForeignMod(i) => ("extern block".to_string(), &i.attrs),
        syn::Item::Impl(i) => (format!("impl {}", type_name(&i.self_ty)), &i.attrs),
        syn::Item::Macro(i) => ("macro invocation".to_string(), &i.attrs),
        syn::Item::Mod(i) => (format!("mod {}", i.ident), &i.attrs),
        syn::Item::Static(i) => (format!("static {}", i.ident), &i.attrs),
        syn::Item::Struct(i) => (format!("struct {}", i.ident), &i.attrs),
        syn::Item::Trait(i) => (format!("trait {}", i.ident), &i.attrs),
        syn::Item::TraitAlias(i) => (format!("trait {}", i.ident), &i.attrs),
        syn::Item::Type(i) => (format!("type {}", i.ident), &i.attrs),
        syn::Item::Union(i) => (format!("union {}", i.ident), &i.attrs),
        syn::Item::Use(i) => ("use declaration".to_string(), &i.attrs),
        _ => return None,
    };
    Some((label, attrs.as_slice()))
}

/// Extract a human-readable type name from a `syn::Type` (best-effort).
fn type_name(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(tp) => tp
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
            .unwrap_or_else(|| "_".to_string()),
        _ => "_".to_string(),
    }
}
