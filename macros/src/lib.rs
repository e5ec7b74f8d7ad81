use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, PathArguments, Type};

/// Derives `new()` plus an `expr()` constructor that wraps the struct in the
/// `Expr` variant of the same name. `Box<T>` and `Option<Box<T>>` fields are
/// unboxed in the constructor signature and reboxed on construction.
#[proc_macro_derive(ExpressionType)]
pub fn derive_expression_type(input: TokenStream) -> TokenStream {
    derive_node(input, "Expr", "expr")
}

/// Same as `ExpressionType`, but wraps in `Stmt` via a `stmt()` constructor.
#[proc_macro_derive(StatementType)]
pub fn derive_statement_type(input: TokenStream) -> TokenStream {
    derive_node(input, "Stmt", "stmt")
}

enum Rebox {
    No,
    Boxed,
    OptionBoxed,
}

fn derive_node(input: TokenStream, wrapper: &str, constructor: &str) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let wrapper = format_ident!("{wrapper}");
    let constructor = format_ident!("{constructor}");

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => panic!("node constructors can only be derived for structs"),
    };

    let field_info: Vec<(Ident, Type)> = match fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|f| {
                let name = f.ident.clone().unwrap();
                let ty = f.ty.clone();
                (name, ty)
            })
            .collect::<Vec<_>>(),
        _ => panic!("node constructors require named fields"),
    };
    let field_names: Vec<_> = field_info.iter().map(|(name, _)| name).collect();

    let unboxed_fields: Vec<_> = field_info
        .iter()
        .map(|(name, ty)| {
            let (ty, rebox) = unboxed(ty);
            (name, ty, rebox)
        })
        .collect();

    let param_types: Vec<_> = unboxed_fields.iter().map(|(_, ty, _)| ty).collect();

    let field_assigns: Vec<_> = unboxed_fields
        .iter()
        .map(|(name, _ty, rebox)| match rebox {
            Rebox::No => quote! { #name },
            Rebox::Boxed => quote! { #name: Box::new(#name) },
            Rebox::OptionBoxed => quote! { #name: #name.map(Box::new) },
        })
        .collect();

    let expanded = quote! {
        impl #name {
            pub fn #constructor(#(#field_names: #param_types),*) -> #wrapper {
                #wrapper::#name(Self::new(#(#field_names),*))
            }

            pub fn new(#(#field_names: #param_types),*) -> Self {
                Self {
                    #(#field_assigns),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

fn unboxed(ty: &Type) -> (proc_macro2::TokenStream, Rebox) {
    if let Some(inner) = generic_inner(ty, "Box") {
        return (quote! { #inner }, Rebox::Boxed);
    }
    if let Some(option_inner) = generic_inner(ty, "Option") {
        if let Some(inner) = generic_inner(option_inner, "Box") {
            return (quote! { Option<#inner> }, Rebox::OptionBoxed);
        }
    }
    (quote! { #ty }, Rebox::No)
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    if let PathArguments::AngleBracketed(ref args) = segment.arguments {
        if let Some(GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}
