//! Derive macro for syntagma productions.
//!
//! Emits `Production` and `Capture` impls from `#[rule("…")]` field
//! attributes. The macro carries no grammar knowledge: fragments stay as
//! strings and are compiled when the parser is built, so grammar errors
//! surface as `BuildError`s with production and field context rather than at
//! macro expansion time.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `syntagma::Production` for a struct with `#[rule(…)]` fields, or
/// for an enum whose variants each wrap one production type.
///
/// Struct fields named `pos` / `end_pos` of type `syntagma::Position` are
/// filled with the record's start and end positions automatically.
#[proc_macro_derive(Production, attributes(rule))]
pub fn derive_production(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic productions are not supported",
        ));
    }

    match &input.data {
        Data::Struct(data) => expand_struct(input, data),
        Data::Enum(data) => expand_enum(input, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "derive(Production) supports structs and enums only",
        )),
    }
}

fn rule_attr(field: &syn::Field) -> syn::Result<Option<LitStr>> {
    for attr in &field.attrs {
        if attr.path().is_ident("rule") {
            return attr.parse_args::<LitStr>().map(Some);
        }
    }
    Ok(None)
}

fn expand_struct(input: &DeriveInput, data: &syn::DataStruct) -> syn::Result<TokenStream2> {
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "derive(Production) requires named fields",
        ));
    };

    let name = &input.ident;
    let name_str = name.to_string();

    let mut make_fields = Vec::new();
    let mut specs = Vec::new();
    let mut pos_apply = quote!(::core::option::Option::None);
    let mut end_pos_apply = quote!(::core::option::Option::None);

    for field in &fields.named {
        let ident = field.ident.as_ref().expect("named field");
        let ty = &field.ty;
        make_fields.push(quote! {
            #ident: ::core::default::Default::default()
        });

        let rule = rule_attr(field)?;
        match rule {
            Some(rule) => {
                let field_str = ident.to_string();
                specs.push(quote! {
                    syntagma::production::FieldSpec {
                        name: #field_str,
                        rule: #rule,
                        target: syntagma::production::FieldTarget::of::<#ty>(
                            |parent, values, at| {
                                let parent = parent
                                    .downcast_mut::<#name>()
                                    .expect("field applied to a foreign record");
                                syntagma::Capture::capture(&mut parent.#ident, values, at)
                            },
                        ),
                    }
                });
            }
            None if ident == "pos" => {
                pos_apply = quote! {
                    ::core::option::Option::Some(|parent, _values, at| {
                        let parent = parent
                            .downcast_mut::<#name>()
                            .expect("position applied to a foreign record");
                        parent.pos = at.clone();
                        ::core::result::Result::Ok(())
                    })
                };
            }
            None if ident == "end_pos" => {
                end_pos_apply = quote! {
                    ::core::option::Option::Some(|parent, _values, at| {
                        let parent = parent
                            .downcast_mut::<#name>()
                            .expect("position applied to a foreign record");
                        parent.end_pos = at.clone();
                        ::core::result::Result::Ok(())
                    })
                };
            }
            None => {}
        }
    }

    Ok(quote! {
        impl syntagma::Production for #name {
            const NAME: &'static str = #name_str;

            fn compile(
                cc: &mut syntagma::compile::GrammarCompiler<'_>,
            ) -> ::core::result::Result<syntagma::graph::NodeId, syntagma::BuildError> {
                cc.record(syntagma::production::RecordSpec {
                    name: #name_str,
                    make: || ::std::boxed::Box::new(#name { #(#make_fields),* }),
                    pos: #pos_apply,
                    end_pos: #end_pos_apply,
                    fields: ::std::vec![#(#specs),*],
                })
            }
        }

        impl syntagma::Capture for #name {
            const ACCEPTS_TEXT: bool = false;

            fn production() -> ::core::option::Option<syntagma::production::ProductionHook> {
                ::core::option::Option::Some(
                    syntagma::production::ProductionHook::of::<#name>(),
                )
            }

            fn from_values(
                values: &mut syntagma::Values,
                at: &syntagma::Position,
            ) -> ::core::result::Result<Self, syntagma::ParseError> {
                values.take_node::<#name>(at)
            }
        }
    })
}

fn expand_enum(input: &DeriveInput, data: &syn::DataEnum) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();

    let mut variants = Vec::new();
    for variant in &data.variants {
        let Fields::Unnamed(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                variant,
                "union variants must wrap exactly one production type",
            ));
        };
        if fields.unnamed.len() != 1 {
            return Err(syn::Error::new_spanned(
                variant,
                "union variants must wrap exactly one production type",
            ));
        }
        let inner = &fields.unnamed.first().expect("one field").ty;
        let variant_ident = &variant.ident;
        let variant_str = variant_ident.to_string();

        variants.push(quote! {
            syntagma::production::VariantSpec::of::<#inner>(
                #variant_str,
                |value, at| {
                    let inner = value.downcast::<#inner>().map_err(|_| {
                        syntagma::ParseError::Conversion {
                            pos: at.clone(),
                            message: ::std::string::String::from(
                                "variant payload has an unexpected type",
                            ),
                        }
                    })?;
                    ::core::result::Result::Ok(
                        ::std::boxed::Box::new(#name::#variant_ident(*inner))
                            as ::std::boxed::Box<dyn ::core::any::Any>,
                    )
                },
            )
        });
    }

    Ok(quote! {
        impl syntagma::Production for #name {
            const NAME: &'static str = #name_str;

            fn compile(
                cc: &mut syntagma::compile::GrammarCompiler<'_>,
            ) -> ::core::result::Result<syntagma::graph::NodeId, syntagma::BuildError> {
                cc.union(#name_str, ::std::vec![#(#variants),*])
            }
        }

        impl syntagma::Capture for #name {
            const ACCEPTS_TEXT: bool = false;

            fn production() -> ::core::option::Option<syntagma::production::ProductionHook> {
                ::core::option::Option::Some(
                    syntagma::production::ProductionHook::of::<#name>(),
                )
            }

            fn from_values(
                values: &mut syntagma::Values,
                at: &syntagma::Position,
            ) -> ::core::result::Result<Self, syntagma::ParseError> {
                values.take_node::<#name>(at)
            }
        }
    })
}
