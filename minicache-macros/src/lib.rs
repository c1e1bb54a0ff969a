use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, ItemFn};

// Import shared utilities
use minicache_macro_utils::{
    check_signature, classify_return, collect_arguments, find_member_cache_field,
    generate_call_args_expr, has_receiver, has_shared_ref_receiver, parse_memo_attributes,
    MemoAttributes, ReturnKind,
};

/// Parse macro attributes, turning failures into compile errors
fn parse_attributes(attr: TokenStream) -> Result<MemoAttributes, TokenStream2> {
    parse_memo_attributes(attr.into())
}

fn expand_this(attrs: MemoAttributes, input: ItemFn) -> Result<TokenStream2, TokenStream2> {
    let sig = &input.sig;
    check_signature(sig)?;
    if has_receiver(sig) {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "#[this] memoizes free functions; use #[cached] on methods",
        )
        .to_compile_error());
    }

    let args = collect_arguments(sig, &attrs.named)?;
    let call_args = generate_call_args_expr(&args);
    let name = attrs.custom_name.unwrap_or_else(|| sig.ident.to_string());

    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;

    Ok(quote! {
        #(#fn_attrs)*
        #vis #sig {
            let __args = #call_args;
            ::minicache::__core::GlobalCache::global().memoize_call(#name, &__args, || #block)
        }
    })
}

fn expand_cached(attrs: MemoAttributes, input: ItemFn) -> Result<TokenStream2, TokenStream2> {
    let sig = &input.sig;
    check_signature(sig)?;
    if !has_shared_ref_receiver(sig) {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "#[cached] requires a method taking `&self`",
        )
        .to_compile_error());
    }

    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;

    let lookup = match classify_return(&sig.output) {
        // A unit result is the null value: never stored, so the body always runs
        ReturnKind::Unit => {
            return Ok(quote! {
                #(#fn_attrs)*
                #vis #sig #block
            })
        }
        ReturnKind::Option => quote! { get_or_insert_option },
        ReturnKind::Value => quote! { get_or_insert_with },
    };

    let args = collect_arguments(sig, &attrs.named)?;
    let call_args = generate_call_args_expr(&args);
    let member = attrs.custom_name.unwrap_or_else(|| sig.ident.to_string());

    Ok(quote! {
        #(#fn_attrs)*
        #vis #sig {
            let __args = #call_args;
            ::minicache::__core::Cacheable::member_cache(self).#lookup(#member, &__args, || #block)
        }
    })
}

/// Memoizes a free function in the process-wide cache.
///
/// Each call is keyed on the function name followed by its rendered
/// arguments, e.g. `fibonacci(10){}`, and looked up in
/// `GlobalCache::global()`. While that cache is disabled, the body always
/// runs and nothing is stored.
///
/// # Requirements
///
/// - **Arguments**: plain identifiers whose types implement `ToArg`
/// - **Return type**: `Clone + Send + Sync + 'static`
/// - **No receiver**: use `#[cached]` for methods
///
/// # Macro Parameters
///
/// - `name` (optional): key prefix used instead of the function name. Must not be empty.
/// - `named` (optional): parameters keyed by name (`{k: v}`) instead of position.
///
/// # Key collisions
///
/// Keys are text. Arguments that render identically share a slot: a
/// function taking a `String` called with `"1"` and one taking an integer
/// called with `1`, if both use the same `name`, return each other's results.
///
/// # Examples
///
/// ```ignore
/// use minicache::this;
///
/// #[this]
/// fn fibonacci(n: u64) -> u64 {
///     if n <= 1 {
///         return n;
///     }
///     fibonacci(n - 1) + fibonacci(n - 2)
/// }
///
/// #[this(name = "scaled", named = ["factor"])]
/// fn scale(x: i64, factor: i64) -> i64 {
///     x * factor
/// }
///
/// assert_eq!(fibonacci(50), 12_586_269_025);
/// assert!(minicache::has("fibonacci(50){}"));
/// assert_eq!(scale(2, 3), 6);
/// assert!(minicache::has("scaled(2){factor: 3}"));
/// ```
#[proc_macro_attribute]
pub fn this(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_attributes(attr) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);

    match expand_this(attrs, input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.into(),
    }
}

/// Memoizes a method in its owner's `MemberCache`.
///
/// The owning type must implement `Cacheable` (see `#[derive(Cacheable)]`).
/// Results are stored per object, keyed by member name and arguments:
///
/// - no arguments: one shared slot
/// - positional parameters: keyed in order
/// - parameters listed in `named`: keyed by name, order-insensitive
///
/// # Return types
///
/// - `Option<T>`: `None` is returned but never stored, so it is recomputed
/// - `()`: the body runs on every call
/// - anything else (`Clone + Send + Sync + 'static`): stored on first call
///
/// # Macro Parameters
///
/// - `name` (optional): member name used instead of the method name
/// - `named` (optional): parameters keyed by name instead of position
///
/// # Examples
///
/// ```ignore
/// use minicache::{cached, Cacheable, MemberCache};
///
/// #[derive(Cacheable)]
/// struct Foo {
///     cache: MemberCache,
///     bar: i64,
/// }
///
/// impl Foo {
///     #[cached]
///     fn m1(&self) -> i64 {
///         self.bar
///     }
///
///     #[cached(named = ["k", "m"])]
///     fn m2(&self, a: i64, b: i64, k: i64, m: i64) -> i64 {
///         a + b + k + m
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn cached(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_attributes(attr) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);

    match expand_cached(attrs, input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.into(),
    }
}

/// Implements `Cacheable` for a struct holding exactly one `MemberCache` field.
///
/// # Examples
///
/// ```ignore
/// use minicache::{Cacheable, MemberCache};
///
/// #[derive(Default, Cacheable)]
/// struct Report {
///     cache: MemberCache,
///     rows: Vec<u32>,
/// }
///
/// let report = Report::default();
/// report.clear_cache();
/// ```
#[proc_macro_derive(Cacheable)]
pub fn derive_cacheable(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let field = match find_member_cache_field(&input.data) {
        Ok(field) => field,
        Err(msg) => return syn::Error::new_spanned(&input.ident, msg).to_compile_error().into(),
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::minicache::__core::Cacheable for #ident #ty_generics #where_clause {
            fn member_cache(&self) -> &::minicache::__core::MemberCache {
                &self.#field
            }
        }
    };

    TokenStream::from(expanded)
}
