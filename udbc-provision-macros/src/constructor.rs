use proc_macro::TokenStream;
use quote::{format_ident, quote};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use syn::{FnArg, GenericArgument, ItemFn, LitStr, PathArguments, ReturnType, Type, parse_macro_input};

pub fn constructor_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    // 1. Registered type name
    let name = parse_macro_input!(attr as LitStr);
    let name_str = name.value();
    if name_str.trim().is_empty() {
        return syn::Error::new(name.span(), "constructor name must not be empty")
            .to_compile_error()
            .into();
    }

    let func = parse_macro_input!(item as ItemFn);
    let sig = &func.sig;
    if !sig.generics.params.is_empty() || sig.asyncness.is_some() {
        return syn::Error::new_spanned(sig, "constructors must be plain, non-generic, synchronous functions")
            .to_compile_error()
            .into();
    }

    // 2. Parameter types form the signature
    let mut param_types = Vec::new();
    for input in &sig.inputs {
        match input {
            FnArg::Typed(pt) => param_types.push((*pt.ty).clone()),
            FnArg::Receiver(r) => {
                return syn::Error::new_spanned(r, "constructors cannot take self")
                    .to_compile_error()
                    .into();
            }
        }
    }
    let arg_idents: Vec<_> = (0..param_types.len())
        .map(|i| format_ident!("__arg{}", i))
        .collect();

    let fn_ident = &sig.ident;
    let call = if returns_result(&sig.output) {
        quote! {
            #fn_ident(#(#arg_idents),*)
                .map_err(|__e| ::std::convert::Into::<::udbc_provision::error::BoxError>::into(__e))
        }
    } else {
        quote! { ::std::result::Result::Ok(#fn_ident(#(#arg_idents),*)) }
    };

    // 3. Unique registration function per (name, fn)
    let mut hasher = DefaultHasher::new();
    name_str.hash(&mut hasher);
    fn_ident.to_string().hash(&mut hasher);
    let register_fn = format_ident!("__udbc_register_constructor_{}", hasher.finish());

    // 4. Register at process start
    let output = quote! {
        #func

        #[::udbc_provision::ctor::ctor]
        fn #register_fn() {
            ::udbc_provision::factory::registry().register(
                #name_str,
                ::udbc_provision::factory::Constructor::new(
                    ::std::vec![#(::udbc_provision::factory::Param::of::<#param_types>()),*],
                    |__args: &mut ::udbc_provision::factory::Args| {
                        #(let #arg_idents = __args.next::<#param_types>()?;)*
                        #call
                    },
                ),
            );
        }
    };

    output.into()
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(tp) = &**ty else {
        return false;
    };
    tp.path.segments.last().is_some_and(|seg| {
        seg.ident == "Result"
            && matches!(
                &seg.arguments,
                PathArguments::AngleBracketed(args)
                    if args.args.iter().filter(|a| matches!(a, GenericArgument::Type(_))).count() == 2
            )
    })
}
