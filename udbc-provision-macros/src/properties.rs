use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input};

struct FieldSpec {
    ident: syn::Ident,
    names: Vec<String>,
    inner_option: Option<Type>,
    ty: Type,
}

pub fn derive_properties_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(ident, "Properties requires named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(ident, "Properties can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut specs = Vec::new();
    for field in fields {
        let Some(field_ident) = field.ident.clone() else {
            continue;
        };
        let mut skip = false;
        let mut rename = None;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("property")) {
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `rename = \"...\"`"))
                }
            });
            if let Err(e) = parsed {
                return e.to_compile_error().into();
            }
        }
        if skip {
            continue;
        }

        let raw = field_ident.to_string();
        let raw = raw.strip_prefix("r#").unwrap_or(&raw).to_string();
        let mut names = vec![raw.clone()];
        let camel = to_camel_case(&raw);
        if camel != raw {
            names.push(camel);
        }
        if let Some(rename) = rename {
            if !names.contains(&rename) {
                names.push(rename);
            }
        }

        specs.push(FieldSpec {
            ident: field_ident,
            names,
            inner_option: option_inner(&field.ty),
            ty: field.ty.clone(),
        });
    }

    let arms = specs.iter().map(|spec| {
        let field = &spec.ident;
        let names = &spec.names;
        let assign = match &spec.inner_option {
            Some(inner) => quote! {
                self.#field = ::std::option::Option::Some(
                    ::udbc_provision::properties::parse_value::<#inner>(__name, __value)?,
                );
            },
            None => {
                let ty = &spec.ty;
                quote! {
                    self.#field = ::udbc_provision::properties::parse_value::<#ty>(__name, __value)?;
                }
            }
        };
        quote! {
            #(#names)|* => {
                #assign
                ::std::result::Result::Ok(())
            }
        }
    });

    let output = quote! {
        impl #impl_generics ::udbc_provision::properties::Properties for #ident #ty_generics #where_clause {
            fn set_property(
                &mut self,
                __name: &str,
                __value: &str,
            ) -> ::std::result::Result<(), ::udbc_provision::error::PropertyError> {
                match __name {
                    #(#arms)*
                    _ => ::std::result::Result::Err(
                        ::udbc_provision::error::PropertyError::Unknown(__name.to_string()),
                    ),
                }
            }
        }
    };

    output.into()
}

fn to_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn option_inner(ty: &Type) -> Option<Type> {
    let Type::Path(tp) = ty else {
        return None;
    };
    let seg = tp.path.segments.last()?;
    if seg.ident != "Option" {
        return None;
    }
    match &seg.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner.clone()),
            _ => None,
        },
        _ => None,
    }
}
