use syn::{Attribute, Ident, Lit, LitInt};

fn get_list_int(attrs: &[Attribute], key: &str) -> Option<LitInt> {
    for attr in attrs {
        if let Ok(syn::Meta::List(nvs)) = attr.parse_meta() {
            if nvs.path.is_ident(key) {
                return nvs.nested.iter().find_map(|nv| match nv {
                    syn::NestedMeta::Lit(syn::Lit::Int(value)) => Some(value.clone()),
                    _ => None,
                });
            }
        }
    }
    None
}

/// `#[width(N)]` on an enum.
pub(super) fn get_enum_width(attrs: &[Attribute]) -> Option<LitInt> { get_list_int(attrs, "width") }

/// `#[encode(N)]` on an enum variant.
pub(super) fn get_enum_encode_value(attrs: &[Attribute]) -> Option<LitInt> { get_list_int(attrs, "encode") }

/// Port name of a struct field: the field name, or `#[member(name = "...")]`. `None` for an empty
/// name.
pub(super) fn get_member_symbol(attrs: &[Attribute], name: &Ident) -> Option<Lit> {
    for attr in attrs {
        let nvs = match attr.parse_meta() {
            Ok(syn::Meta::List(nvs)) if nvs.path.is_ident("member") => nvs,
            _ => continue,
        };

        let meta = nvs.nested.iter().find_map(|nv| match nv {
            syn::NestedMeta::Meta(syn::Meta::NameValue(nv)) if nv.path.is_ident("name") => Some(nv.lit.clone()),
            _ => None,
        });

        return match meta {
            None => Some(Lit::new(proc_macro2::Literal::string(&name.to_string()))),
            Some(Lit::Str(ref s)) if s.value().is_empty() => None,
            Some(meta @ Lit::Str(_)) => Some(meta),
            Some(lit) => panic!("expected string, found {:?}", lit),
        };
    }
    Some(Lit::new(proc_macro2::Literal::string(&name.to_string())))
}
