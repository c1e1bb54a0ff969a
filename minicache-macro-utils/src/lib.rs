//! Shared utilities for minicache procedural macros
//!
//! This crate provides the attribute parsing, signature inspection and key
//! expression generation used by `#[this]`, `#[cached]` and
//! `#[derive(Cacheable)]` in `minicache-macros`.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    punctuated::Punctuated, Data, Expr, FnArg, Ident, Lit, Member, MetaNameValue, Pat,
    ReturnType, Signature, Token, Type,
};

/// Parsed attributes shared by `#[this]` and `#[cached]`
#[derive(Debug, Default)]
pub struct MemoAttributes {
    /// Overrides the function name used as the key prefix (`#[this]`) or the
    /// member name (`#[cached]`)
    pub custom_name: Option<String>,
    /// Parameters passed as named rather than positional values
    pub named: Vec<String>,
}

/// How a memoized function's return type is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// `()`: nothing worth storing
    Unit,
    /// `Option<T>`: `None` is never stored
    Option,
    /// Anything else
    Value,
}

/// Parameters of a memoized function, split by how they enter the key
#[derive(Debug, Default)]
pub struct MemoArgs {
    pub positional: Vec<Ident>,
    pub named: Vec<Ident>,
}

fn compile_error(msg: &str) -> TokenStream2 {
    quote! { compile_error!(#msg); }
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(s) if s.value().is_empty() => {
                Err(compile_error("Invalid `name`: must not be empty"))
            }
            Lit::Str(s) => Ok(s.value()),
            _ => Err(compile_error("Invalid literal for `name`: expected string")),
        },
        _ => Err(compile_error(
            "Invalid syntax for `name`: expected `name = \"...\"`",
        )),
    }
}

/// Parse the `named` attribute: `named = ["a", "b"]`
pub fn parse_named_attribute(nv: &MetaNameValue) -> Result<Vec<String>, TokenStream2> {
    let array = match &nv.value {
        Expr::Array(array) => array,
        _ => {
            return Err(compile_error(
                "Invalid syntax for `named`: expected `named = [\"param\", ...]`",
            ))
        }
    };

    array
        .elems
        .iter()
        .map(|elem| match elem {
            Expr::Lit(expr_lit) => match &expr_lit.lit {
                Lit::Str(s) => Ok(s.value()),
                _ => Err(compile_error(
                    "Invalid literal in `named`: expected parameter names as strings",
                )),
            },
            _ => Err(compile_error(
                "Invalid entry in `named`: expected parameter names as strings",
            )),
        })
        .collect()
}

/// Parse memoization attributes from a token stream
pub fn parse_memo_attributes(attr: TokenStream2) -> Result<MemoAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg); }
    })?;

    let mut attrs = MemoAttributes::default();

    for nv in parsed_args {
        if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(&nv)?);
        } else if nv.path.is_ident("named") {
            attrs.named = parse_named_attribute(&nv)?;
        } else {
            let path = &nv.path;
            let msg = format!(
                "Unknown attribute `{}`: expected `name` or `named`",
                quote!(#path).to_string().replace(' ', "")
            );
            return Err(quote! { compile_error!(#msg); });
        }
    }

    Ok(attrs)
}

/// Reject signatures the memoizing macros cannot wrap
pub fn check_signature(sig: &Signature) -> Result<(), TokenStream2> {
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.asyncness,
            "memoization of async functions is not supported",
        )
        .to_compile_error());
    }
    Ok(())
}

/// Returns true if the signature takes `self` in any form
pub fn has_receiver(sig: &Signature) -> bool {
    sig.inputs
        .iter()
        .any(|arg| matches!(arg, FnArg::Receiver(_)))
}

/// Returns true if the signature's receiver is a shared reference:
/// `&self`, `&'a self` or `self: &Self`
pub fn has_shared_ref_receiver(sig: &Signature) -> bool {
    sig.inputs.iter().any(|arg| match arg {
        FnArg::Receiver(receiver) => match &*receiver.ty {
            Type::Reference(reference) => reference.mutability.is_none(),
            _ => false,
        },
        FnArg::Typed(_) => false,
    })
}

/// Split the typed parameters into positional and named key parts
///
/// Every parameter must be a plain identifier, and every entry of `named` must
/// name a parameter.
pub fn collect_arguments(sig: &Signature, named: &[String]) -> Result<MemoArgs, TokenStream2> {
    let mut args = MemoArgs::default();

    for arg in sig.inputs.iter() {
        let pat_type = match arg {
            FnArg::Receiver(_) => continue,
            FnArg::Typed(pat_type) => pat_type,
        };
        let ident = match &*pat_type.pat {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "memoized function parameters must be plain identifiers",
                )
                .to_compile_error())
            }
        };
        if named.iter().any(|n| ident == n) {
            args.named.push(ident);
        } else {
            args.positional.push(ident);
        }
    }

    for name in named {
        if !args.named.iter().any(|ident| ident == name) {
            let msg = format!("`named` lists `{}`, which is not a parameter", name);
            return Err(quote! { compile_error!(#msg); });
        }
    }

    Ok(args)
}

/// Generate the `CallArgs` expression for a call
pub fn generate_call_args_expr(args: &MemoArgs) -> TokenStream2 {
    let positional = &args.positional;
    let named = &args.named;
    let named_strs: Vec<String> = named.iter().map(|ident| ident.to_string()).collect();

    quote! {
        ::minicache::__core::CallArgs::new()
            #( .arg(&#positional) )*
            #( .named(#named_strs, &#named) )*
    }
}

/// Classify a return type
///
/// Detection is textual, like the rest of the macros: `Option<..>` under its
/// usual paths is recognized, type aliases of it are not.
pub fn classify_return(output: &ReturnType) -> ReturnKind {
    let ty = match output {
        ReturnType::Default => return ReturnKind::Unit,
        ReturnType::Type(_, ty) => ty,
    };
    if let Type::Tuple(tuple) = &**ty {
        if tuple.elems.is_empty() {
            return ReturnKind::Unit;
        }
    }

    let s = quote!(#ty).to_string().replace(' ', "");
    let is_option = ["Option<", "std::option::Option<", "::std::option::Option<", "core::option::Option<"]
        .iter()
        .any(|prefix| s.starts_with(prefix));
    if is_option {
        ReturnKind::Option
    } else {
        ReturnKind::Value
    }
}

/// Find the single `MemberCache` field of a struct
pub fn find_member_cache_field(data: &Data) -> Result<Member, &'static str> {
    let fields = match data {
        Data::Struct(data) => &data.fields,
        _ => return Err("Cacheable can only be derived for structs"),
    };

    let mut found = fields.iter().enumerate().filter_map(|(index, field)| {
        let is_member_cache = match &field.ty {
            Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "MemberCache"),
            _ => false,
        };
        is_member_cache.then(|| match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        })
    });

    match (found.next(), found.next()) {
        (Some(member), None) => Ok(member),
        (None, _) => Err("Cacheable requires a field of type `MemberCache`"),
        (Some(_), Some(_)) => Err("Cacheable requires exactly one field of type `MemberCache`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::{parse_quote, DeriveInput, ItemFn};

    #[test]
    fn test_parse_attributes() {
        let attrs =
            parse_memo_attributes(quote! { name = "fib_v2", named = ["k", "m"] }).unwrap();
        assert_eq!(attrs.custom_name.as_deref(), Some("fib_v2"));
        assert_eq!(attrs.named, vec!["k".to_string(), "m".to_string()]);

        let attrs = parse_memo_attributes(TokenStream2::new()).unwrap();
        assert!(attrs.custom_name.is_none());
        assert!(attrs.named.is_empty());
    }

    #[test]
    fn test_parse_attributes_errors() {
        assert!(parse_memo_attributes(quote! { name = "" }).is_err());
        assert!(parse_memo_attributes(quote! { name = 3 }).is_err());
        assert!(parse_memo_attributes(quote! { named = "k" }).is_err());
        assert!(parse_memo_attributes(quote! { named = [k] }).is_err());
        assert!(parse_memo_attributes(quote! { limit = 3 }).is_err());
    }

    #[test]
    fn test_collect_arguments() {
        let item: ItemFn = parse_quote! {
            fn m2(&self, a: i64, mut b: i64, k: i64) -> i64 { a + b + k }
        };
        let args = collect_arguments(&item.sig, &["k".to_string()]).unwrap();
        assert_eq!(args.positional, vec!["a", "b"]);
        assert_eq!(args.named, vec!["k"]);
    }

    #[test]
    fn test_collect_arguments_errors() {
        let item: ItemFn = parse_quote! {
            fn f((a, b): (i32, i32)) -> i32 { a + b }
        };
        assert!(collect_arguments(&item.sig, &[]).is_err());

        let item: ItemFn = parse_quote! {
            fn f(a: i32) -> i32 { a }
        };
        assert!(collect_arguments(&item.sig, &["z".to_string()]).is_err());
    }

    #[test]
    fn test_receivers() {
        let shared: ItemFn = parse_quote! { fn f(&self) {} };
        let exclusive: ItemFn = parse_quote! { fn f(&mut self) {} };
        let owned: ItemFn = parse_quote! { fn f(self) {} };
        let explicit_shared: ItemFn = parse_quote! { fn f(self: &Self) {} };
        let explicit_exclusive: ItemFn = parse_quote! { fn f(self: &mut Self) {} };
        let boxed: ItemFn = parse_quote! { fn f(self: Box<Self>) {} };
        let free: ItemFn = parse_quote! { fn f(x: u8) {} };

        assert!(has_shared_ref_receiver(&shared.sig));
        assert!(!has_shared_ref_receiver(&exclusive.sig));
        assert!(!has_shared_ref_receiver(&owned.sig));
        assert!(has_shared_ref_receiver(&explicit_shared.sig));
        assert!(!has_shared_ref_receiver(&explicit_exclusive.sig));
        assert!(!has_shared_ref_receiver(&boxed.sig));
        assert!(has_receiver(&owned.sig));
        assert!(!has_receiver(&free.sig));
    }

    #[test]
    fn test_check_signature() {
        let sync_fn: ItemFn = parse_quote! { fn f() {} };
        let async_fn: ItemFn = parse_quote! { async fn f() {} };
        assert!(check_signature(&sync_fn.sig).is_ok());
        assert!(check_signature(&async_fn.sig).is_err());
    }

    #[test]
    fn test_classify_return() {
        let unit: ItemFn = parse_quote! { fn f() {} };
        let explicit_unit: ItemFn = parse_quote! { fn f() -> () {} };
        let option: ItemFn = parse_quote! { fn f() -> Option<u8> { None } };
        let qualified: ItemFn = parse_quote! { fn f() -> std::option::Option<u8> { None } };
        let value: ItemFn = parse_quote! { fn f() -> Vec<Option<u8>> { vec![] } };

        assert_eq!(classify_return(&unit.sig.output), ReturnKind::Unit);
        assert_eq!(classify_return(&explicit_unit.sig.output), ReturnKind::Unit);
        assert_eq!(classify_return(&option.sig.output), ReturnKind::Option);
        assert_eq!(classify_return(&qualified.sig.output), ReturnKind::Option);
        assert_eq!(classify_return(&value.sig.output), ReturnKind::Value);
    }

    #[test]
    fn test_generate_call_args_expr() {
        let args = MemoArgs {
            positional: vec![parse_quote!(a)],
            named: vec![parse_quote!(k)],
        };
        let expr = generate_call_args_expr(&args).to_string().replace(' ', "");
        assert_eq!(
            expr,
            "::minicache::__core::CallArgs::new().arg(&a).named(\"k\",&k)"
        );
    }

    #[test]
    fn test_find_member_cache_field() {
        let named: DeriveInput = parse_quote! {
            struct Foo { bar: i64, cache: minicache::MemberCache }
        };
        let tuple: DeriveInput = parse_quote! {
            struct Foo(i64, MemberCache);
        };
        let none: DeriveInput = parse_quote! {
            struct Foo { bar: i64 }
        };
        let twice: DeriveInput = parse_quote! {
            struct Foo { a: MemberCache, b: MemberCache }
        };
        let enumeration: DeriveInput = parse_quote! {
            enum Foo { A(MemberCache) }
        };

        assert_eq!(
            find_member_cache_field(&named.data).unwrap(),
            Member::Named(parse_quote!(cache))
        );
        assert_eq!(
            find_member_cache_field(&tuple.data).unwrap(),
            Member::Unnamed(syn::Index::from(1))
        );
        assert!(find_member_cache_field(&none.data).is_err());
        assert!(find_member_cache_field(&twice.data).is_err());
        assert!(find_member_cache_field(&enumeration.data).is_err());
    }
}
