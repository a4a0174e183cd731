use syn::visit_mut::VisitMut;

use crate::marker::{Declaration, MarkerRegistry, Scope};

/// Text printed by the injected diagnostic statement.
pub const DIAGNOSTIC_MESSAGE: &str = "Hello world!!!";

/// What happens to marker attributes on declarations the rewriter
/// instrumented. Bodiless declarations always keep theirs.
///
/// With `Retain`, rewriting the output again prepends a second diagnostic to
/// every tagged body. With `Strip`, the output carries no markers, so a
/// second pass changes nothing and the compiler never expands the attribute
/// on top of the rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkerPolicy {
    #[default]
    Strip,
    Retain,
}

/// A rewritten tree and what happened to it.
#[derive(Debug)]
pub struct Rewritten {
    pub file: syn::File,
    /// Declarations whose body received the diagnostic, in document order.
    pub instrumented: Vec<String>,
    /// Tagged declarations left alone because they have no body.
    pub skipped: Vec<String>,
    /// Marker attributes removed from instrumented declarations under
    /// [`MarkerPolicy::Strip`].
    pub stripped: usize,
}

impl Rewritten {
    pub fn changed(&self) -> bool {
        !self.instrumented.is_empty() || self.stripped > 0
    }

    /// Pretty-print the tree, or hand back `original` untouched when the
    /// pass changed nothing.
    pub fn render(&self, original: &str) -> String {
        if self.changed() {
            prettyplease::unparse(&self.file)
        } else {
            original.to_string()
        }
    }
}

/// Result of rewriting source text.
pub struct RewriteResult {
    pub source: String,
    pub instrumented: Vec<String>,
    pub skipped: Vec<String>,
}

/// The statement prepended to every tagged body.
///
/// Fully qualified so it resolves the same way whatever the surrounding
/// scope imports or shadows.
pub fn diagnostic_statement() -> syn::Stmt {
    syn::parse_quote! {
        ::std::println!(#DIAGNOSTIC_MESSAGE);
    }
}

/// Build a new block whose statements are the diagnostic followed by the
/// statements of `block`, in their original order.
pub fn instrument_block(block: syn::Block) -> syn::Block {
    let mut stmts = Vec::with_capacity(block.stmts.len() + 1);
    stmts.push(diagnostic_statement());
    stmts.extend(block.stmts);
    syn::Block {
        brace_token: block.brace_token,
        stmts,
    }
}

/// Rewrite every declaration in `file` that `registry` reports as tagged.
///
/// Visits declarations in document order, including ones nested inside
/// other bodies; each tagged body is instrumented exactly once on this pass.
/// Everything else in the tree is returned untouched.
pub fn rewrite(
    mut file: syn::File,
    registry: &MarkerRegistry,
    policy: MarkerPolicy,
) -> Rewritten {
    let mut rewriter = Rewriter {
        registry,
        policy,
        scope: Scope::default(),
        instrumented: Vec::new(),
        skipped: Vec::new(),
        stripped: 0,
    };
    rewriter.visit_file_mut(&mut file);
    Rewritten {
        file,
        instrumented: rewriter.instrumented,
        skipped: rewriter.skipped,
        stripped: rewriter.stripped,
    }
}

/// Parse `source`, rewrite it, and pretty-print the result.
///
/// When no declaration is tagged the original text is returned as-is, so
/// files without markers keep their formatting and comments.
pub fn rewrite_source(
    source: &str,
    registry: &MarkerRegistry,
    policy: MarkerPolicy,
) -> Result<RewriteResult, syn::Error> {
    let file: syn::File = syn::parse_str(source)?;
    let rewritten = rewrite(file, registry, policy);
    Ok(RewriteResult {
        source: rewritten.render(source),
        instrumented: rewritten.instrumented,
        skipped: rewritten.skipped,
    })
}

struct Rewriter<'r> {
    registry: &'r MarkerRegistry,
    policy: MarkerPolicy,
    scope: Scope,
    instrumented: Vec<String>,
    skipped: Vec<String>,
    stripped: usize,
}

impl Rewriter<'_> {
    /// Replace `body` with its instrumented form, or record a skip when the
    /// declaration has none. Markers are only stripped from instrumented
    /// declarations.
    fn apply(
        &mut self,
        attrs: &mut Vec<syn::Attribute>,
        body: Option<&mut syn::Block>,
        name: String,
    ) {
        match body {
            Some(block) => {
                let brace_token = block.brace_token;
                let original = std::mem::replace(
                    block,
                    syn::Block {
                        brace_token,
                        stmts: Vec::new(),
                    },
                );
                *block = instrument_block(original);
                if self.policy == MarkerPolicy::Strip {
                    self.stripped += self.registry.strip_markers(attrs);
                }
                tracing::debug!(function = %name, "instrumented");
                self.instrumented.push(name);
            }
            // Bodiless declarations keep their markers: the tree is untouched.
            None => {
                tracing::debug!(function = %name, "tagged declaration has no body, skipping");
                self.skipped.push(name);
            }
        }
    }
}

impl VisitMut for Rewriter<'_> {
    fn visit_item_fn_mut(&mut self, node: &mut syn::ItemFn) {
        let decl = Declaration::Fn(&*node);
        if self.registry.is_tagged(&decl) {
            let name = self.scope.qualify(&decl);
            self.apply(&mut node.attrs, Some(&mut *node.block), name);
        }
        let prev = self.scope.enter_fn();
        syn::visit_mut::visit_item_fn_mut(self, node);
        self.scope.leave(prev);
    }

    fn visit_item_impl_mut(&mut self, node: &mut syn::ItemImpl) {
        let prev = self.scope.enter_impl(node);
        syn::visit_mut::visit_item_impl_mut(self, node);
        self.scope.leave(prev);
    }

    fn visit_impl_item_fn_mut(&mut self, node: &mut syn::ImplItemFn) {
        let decl = Declaration::ImplFn(&*node);
        if self.registry.is_tagged(&decl) {
            let name = self.scope.qualify(&decl);
            self.apply(&mut node.attrs, Some(&mut node.block), name);
        }
        syn::visit_mut::visit_impl_item_fn_mut(self, node);
    }

    fn visit_item_trait_mut(&mut self, node: &mut syn::ItemTrait) {
        let prev = self.scope.enter_trait(node);
        syn::visit_mut::visit_item_trait_mut(self, node);
        self.scope.leave(prev);
    }

    fn visit_trait_item_fn_mut(&mut self, node: &mut syn::TraitItemFn) {
        let decl = Declaration::TraitFn(&*node);
        if self.registry.is_tagged(&decl) {
            let name = self.scope.qualify(&decl);
            self.apply(&mut node.attrs, node.default.as_mut(), name);
        }
        syn::visit_mut::visit_trait_item_fn_mut(self, node);
    }

    fn visit_foreign_item_fn_mut(&mut self, node: &mut syn::ForeignItemFn) {
        let decl = Declaration::ForeignFn(&*node);
        if self.registry.is_tagged(&decl) {
            let name = self.scope.qualify(&decl);
            self.apply(&mut node.attrs, None, name);
        }
        syn::visit_mut::visit_foreign_item_fn_mut(self, node);
    }
}
