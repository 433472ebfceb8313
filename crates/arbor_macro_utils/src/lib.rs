//! Shared utilities for Arbor procedural macro crates.
//!
//! Generated code has to name the crate that defines the trait it
//! implements. Consumers may depend on that crate directly, under a renamed
//! key, or only through the `arbor` umbrella crate.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// An Arbor crate that macro-generated code may reference.
#[derive(Debug, Clone, Copy)]
pub enum ArborCrate {
    /// `arbor_model`
    Model,
}

impl ArborCrate {
    fn as_str(self) -> &'static str {
        match self {
            Self::Model => "arbor_model",
        }
    }
}

/// Returns a [`TokenStream`] path for the given Arbor crate.
///
/// Resolution order:
/// 1. Direct dependency, possibly renamed in `Cargo.toml`.
/// 2. The `arbor` umbrella crate (`arbor::<name>`).
/// 3. The literal crate name, so the compiler points at the missing
///    dependency.
pub fn resolve_crate_path(krate: ArborCrate) -> TokenStream {
    let name = krate.as_str();

    match crate_name(name) {
        Ok(FoundCrate::Itself) => {
            let ident = format_ident!("{}", name);
            quote!(#ident)
        }
        Ok(FoundCrate::Name(found)) => {
            let ident = format_ident!("{}", found);
            quote!(#ident)
        }
        Err(_) => match crate_name("arbor") {
            Ok(FoundCrate::Name(found)) => {
                let umbrella = format_ident!("{}", found);
                let ident = format_ident!("{}", name);
                quote!(#umbrella::#ident)
            }
            _ => {
                let ident = format_ident!("{}", name);
                quote!(#ident)
            }
        },
    }
}
