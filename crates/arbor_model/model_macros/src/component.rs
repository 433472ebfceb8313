//! `Component` and `Tag` derives.

use arbor_macro_utils::{ArborCrate, resolve_crate_path};
use darling::FromDeriveInput;
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(component), supports(struct_any, enum_any))]
struct ComponentArgs {
    ident: syn::Ident,
    generics: syn::Generics,

    /// Keep the first value when the component is attached again.
    #[darling(default)]
    idempotent: bool,
}

pub(crate) fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match ComponentArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    let name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();
    let model = resolve_crate_path(ArborCrate::Model);

    let idempotent = args.idempotent.then(|| {
        quote! {
            const IDEMPOTENT: bool = true;
        }
    });

    quote! {
        impl #impl_generics #model::component::Component for #name #ty_generics #where_clause {
            #idempotent
        }
    }
    .into()
}

pub(crate) fn derive_tag(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let model = resolve_crate_path(ArborCrate::Model);

    quote! {
        impl #impl_generics #model::component::Tag for #name #ty_generics #where_clause {}
    }
    .into()
}
