use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{parse_macro_input, DeriveInput, Field, Variant};

use super::utils::{get_enum_encode_value, get_enum_width, get_member_symbol};

const fn clog2(value: usize) -> usize {
    if value <= 1 {
        0
    } else {
        usize::BITS as usize - (value - 1).leading_zeros() as usize
    }
}

pub(super) fn derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let name = &ast.ident;
    let (width, transl, port_decls) = match &ast.data {
        syn::Data::Struct(syn::DataStruct { fields: syn::Fields::Named(fields), .. }) => packed_struct(&fields.named),
        syn::Data::Enum(syn::DataEnum { variants, .. }) => encoded_enum(&ast, variants),
        _ => panic!("{name}: `Signal` can only be derived for structs with named fields and unit enums"),
    };

    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    quote! {
        impl #impl_generics Signal for #name #ty_generics #where_clause {
            const WIDTH: usize = #width;

            fn transl(self) -> Vec<bool> { #transl }

            fn port_decls() -> PortDecls { #port_decls }
        }
    }
    .into()
}

/// Fields are packed in declaration order, the first one in the least significant bits.
fn packed_struct(fields: &Punctuated<Field, Comma>) -> (TokenStream2, TokenStream2, TokenStream2) {
    let tys = fields.iter().map(|f| &f.ty).collect::<Vec<_>>();
    let idents = fields.iter().map(|f| &f.ident).collect::<Vec<_>>();
    let members = fields.iter().map(|f| {
        let ty = &f.ty;
        let ident = f.ident.as_ref().expect("named field");
        match get_member_symbol(&f.attrs, ident) {
            Some(symbol) => quote! { (Some(#symbol.to_string()), <#ty as Signal>::port_decls()) },
            None => quote! { (None, <#ty as Signal>::port_decls()) },
        }
    });

    let width = quote! { 0 #(+ <#tys as Signal>::WIDTH)* };
    let transl = quote! {
        let mut bits = Vec::with_capacity(<Self as Signal>::WIDTH);
        #(bits.extend(Signal::transl(self.#idents));)*
        bits
    };
    let port_decls = quote! { PortDecls::Struct(vec![#(#members),*]) };
    (width, transl, port_decls)
}

/// Variants are encoded by index unless `#[encode(N)]` overrides it.
fn encoded_enum(
    ast: &DeriveInput, variants: &Punctuated<Variant, Comma>,
) -> (TokenStream2, TokenStream2, TokenStream2) {
    let name = &ast.ident;
    assert!(!variants.is_empty(), "{name}: empty enums have no encoding");

    let width = match get_enum_width(&ast.attrs) {
        Some(width) => width.base10_parse::<usize>().unwrap_or_else(|_| panic!("{name}: width must be a usize")),
        None => clog2(variants.len()).max(1),
    };

    let arms = variants.iter().enumerate().map(|(index, variant)| {
        let ident = &variant.ident;
        assert!(matches!(variant.fields, syn::Fields::Unit), "{name}::{ident}: only unit variants can be encoded");
        let code = match get_enum_encode_value(&variant.attrs) {
            Some(code) => {
                code.base10_parse::<usize>().unwrap_or_else(|_| panic!("{name}::{ident}: code must be a usize"))
            }
            None => index,
        };
        assert!(code < (1 << width), "{name}::{ident}: code {code} does not fit in {width} bits");
        quote! { Self::#ident => #code }
    });

    let transl = quote! {
        let code: usize = match self { #(#arms,)* };
        (0..#width).map(|i| (code >> i) & 1 == 1).collect()
    };
    (quote! { #width }, transl, quote! { PortDecls::Bits(#width) })
}
