//! The `#[method_logger]` attribute.
//!
//! ```ignore
//! use method_logger_macros::method_logger;
//!
//! #[method_logger]
//! fn test() {
//!     println!("test");
//! }
//! ```
//!
//! expands to a `test` whose body starts with
//! `::std::println!("Hello world!!!");`. The attribute itself leaves nothing
//! behind in the compiled program.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::ToTokens;

use method_logger::MarkerRegistry;
use method_logger::rewrite::instrument_block;

/// Prepend `::std::println!("Hello world!!!");` to the function's body.
///
/// Applies to free functions, impl methods and trait methods. A trait method
/// without a default body is emitted unchanged. Nested functions carrying
/// their own `#[method_logger]` are expanded separately by the compiler.
#[proc_macro_attribute]
pub fn method_logger(args: TokenStream, input: TokenStream) -> TokenStream {
    expand(args.into(), input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(args: TokenStream2, input: TokenStream2) -> syn::Result<TokenStream2> {
    let registry = MarkerRegistry::default();
    let name = registry.marker_kind().name();
    if !args.is_empty() {
        return Err(syn::Error::new_spanned(
            args,
            format!("#[{name}] takes no arguments"),
        ));
    }

    if let Ok(mut item) = syn::parse2::<syn::ItemFn>(input.clone()) {
        reject_const(&item.sig, name)?;
        // Repeated markers on the same fn count once.
        registry.strip_markers(&mut item.attrs);
        item.block = Box::new(instrument_block(*item.block));
        return Ok(item.into_token_stream());
    }

    if let Ok(mut item) = syn::parse2::<syn::TraitItemFn>(input.clone()) {
        reject_const(&item.sig, name)?;
        registry.strip_markers(&mut item.attrs);
        item.default = item.default.take().map(instrument_block);
        return Ok(item.into_token_stream());
    }

    if let Ok(mut item) = syn::parse2::<syn::ForeignItemFn>(input) {
        registry.strip_markers(&mut item.attrs);
        return Ok(item.into_token_stream());
    }

    Err(syn::Error::new(
        Span::call_site(),
        format!("#[{name}] can only be applied to functions"),
    ))
}

fn reject_const(sig: &syn::Signature, name: &str) -> syn::Result<()> {
    match &sig.constness {
        Some(token) => Err(syn::Error::new_spanned(
            token,
            format!("#[{name}] cannot be applied to a const fn"),
        )),
        None => Ok(()),
    }
}
