//! Derive macros for `arbor_model`.
//!
//! - `#[derive(Component)]` implements `arbor_model::component::Component`
//! - `#[derive(Tag)]` implements `arbor_model::component::Tag`

mod component;

use proc_macro::TokenStream;

/// Derive macro for the `Component` trait.
///
/// # Attributes
///
/// - `idempotent` (optional): re-attaching the component keeps the first
///   value instead of failing.
///
/// # Example
///
/// ```ignore
/// use arbor_model::Component;
///
/// #[derive(Component)]
/// #[component(idempotent)]
/// struct Configurable;
///
/// #[derive(Component)]
/// struct BaseName(String);
/// ```
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    component::derive_component(input)
}

/// Derive macro for the `Tag` trait.
///
/// ```ignore
/// use arbor_model::Tag;
///
/// #[derive(Tag)]
/// struct HasCSources;
/// ```
#[proc_macro_derive(Tag)]
pub fn derive_tag(input: TokenStream) -> TokenStream {
    component::derive_tag(input)
}
