// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Proc macros backing annotation-driven step discovery.
//!
//! Discovery (the compiler's first phase) needs to find step declarations in the
//! source tree without re-parsing every crate's AST at build time. `#[pipeline_step]`
//! registers each annotated type into a compile-time, link-time-collected registry
//! that the compiler reads directly instead.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Ident, ItemStruct, LitStr, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

/// Optional arguments to `#[pipeline_step]`.
struct PipelineStepArgs {
    /// An explicit canonical name; defaults to the annotated type's identifier.
    canonical_name: Option<LitStr>,
}

impl Parse for PipelineStepArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(PipelineStepArgs {
                canonical_name: None,
            });
        }
        let key: Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        let value: LitStr = input.parse()?;
        if key != "name" {
            return Err(syn::Error::new(
                key.span(),
                "expected `name = \"...\"` or no arguments",
            ));
        }
        Ok(PipelineStepArgs {
            canonical_name: Some(value),
        })
    }
}

/// Registers the annotated step type into the link-time step registry consumed by
/// Discovery.
///
/// The annotated type must implement `tpf_runtime::registry::StepFactory`.
///
/// ```rust,ignore
/// use tpf_macros::pipeline_step;
///
/// #[pipeline_step]
/// struct PriceStep;
/// ```
#[proc_macro_attribute]
pub fn pipeline_step(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as PipelineStepArgs);
    let item = parse_macro_input!(input as ItemStruct);
    let ident = &item.ident;

    let descriptor_static = quote::format_ident!("__TPF_STEP_DESCRIPTOR_{}", ident);
    let canonical_name = match args.canonical_name {
        Some(lit) => quote! { #lit },
        None => quote! { stringify!(#ident) },
    };

    let output = quote! {
        #item

        #[doc(hidden)]
        #[::tpf_runtime::distributed_slice(::tpf_runtime::registry::STEP_REGISTRY)]
        static #descriptor_static: ::tpf_runtime::registry::StepDescriptor =
            ::tpf_runtime::registry::StepDescriptor {
                canonical_name: #canonical_name,
                factory: <#ident as ::tpf_runtime::registry::StepFactory>::create,
            };
    };

    output.into()
}
