use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let calmform = calmform_path();
    let mut key_exprs = Vec::new();
    let mut field_arms = Vec::new();
    let mut set_field_arms = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_ty = field.ty;
        let field_name = field_ident.to_string();

        key_exprs.push(quote! {
            #calmform::FieldKey::new(#field_name)
        });

        field_arms.push(quote! {
            #field_name => ::std::option::Option::Some(
                #calmform::FieldScalar::to_field_value(&self.#field_ident),
            ),
        });

        set_field_arms.push(quote! {
            #field_name => {
                match <#field_ty as #calmform::FieldScalar>::from_field_value(value) {
                    ::std::option::Option::Some(parsed) => {
                        self.#field_ident = parsed;
                        true
                    }
                    ::std::option::Option::None => false,
                }
            }
        });
    }

    quote! {
        impl #calmform::FormModel for #model_ident {
            fn field_keys(&self) -> ::std::vec::Vec<#calmform::FieldKey> {
                ::std::vec![#(#key_exprs),*]
            }

            fn field(&self, key: &#calmform::FieldKey) -> ::std::option::Option<#calmform::FieldValue> {
                match key.as_str() {
                    #(#field_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field(&mut self, key: &#calmform::FieldKey, value: #calmform::FieldValue) -> bool {
                match key.as_str() {
                    #(#set_field_arms)*
                    _ => false,
                }
            }
        }
    }
    .into()
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}
