//! Procedural macros used in the definition and implementation of getters and setters for StatusSettings

use quote::quote;
use syn::parse::{Parse, ParseStream, Result};
use syn::{Expr, Ident, Token};

type ValueName = Ident;
type ValueType = Ident;
type DefaultValue = Expr;

/// Signature contains the results of parsing a sts_gets_and_sets definition, i.e., the
/// name of a value stored in a StatusSettings map and the corresponding type.
///     ```ignore
///     sts_gets_and_sets!(PS_CRL_FOLDER, String);
///     ```
struct Signature {
    value_name: ValueName,
    value_type: ValueType,
}

impl Parse for Signature {
    fn parse(stream: ParseStream<'_>) -> Result<Self> {
        let value_name: ValueName = stream.parse()?;
        let _comma: Token!(,) = stream.parse()?;
        let value_type: ValueType = stream.parse()?;
        Ok(Signature {
            value_name,
            value_type,
        })
    }
}

/// SignatureWithDefault adds a default value expression that is returned by the getter when the
/// map does not contain the item (or contains an item of the wrong type).
///     ```ignore
///     sts_gets_and_sets_with_default!(PS_CHECK_CRLS, bool, true);
///     ```
struct SignatureWithDefault {
    value_name: ValueName,
    value_type: ValueType,
    default_value: DefaultValue,
}

impl Parse for SignatureWithDefault {
    fn parse(stream: ParseStream<'_>) -> Result<Self> {
        let value_name: ValueName = stream.parse()?;
        let _comma: Token!(,) = stream.parse()?;
        let value_type: ValueType = stream.parse()?;
        let _comma2: Token!(,) = stream.parse()?;
        let default_value: DefaultValue = stream.parse()?;
        Ok(SignatureWithDefault {
            value_name,
            value_type,
            default_value,
        })
    }
}

/// is_string_numeric is used to determine if a string value contains only numeric characters.
/// It is used to process a slice that omits the first character, i.e., in order to identify
/// types like u8, u64, etc.
fn is_string_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_numeric())
}

/// variant_for_type maps a value type to the name of the StatusSettingTypes variant that holds it,
/// i.e., u8 to U8 and bool to Bool. Other types share the name of the variant.
fn variant_for_type(value_type: &Ident) -> Ident {
    let type_str = value_type.to_string();
    let variant = if type_str == "bool" {
        "Bool".to_string()
    } else if is_string_numeric(&type_str[1..]) {
        type_str.to_uppercase()
    } else {
        type_str
    };
    Ident::new(&variant, value_type.span())
}

/// accessor_names returns identifiers for the getter and setter, which are derived from the
/// setting name minus the `PS_` prefix, i.e., PS_CHECK_CRLS yields get_check_crls and set_check_crls.
fn accessor_names(flag: &Ident) -> (Ident, Ident, String, String) {
    let flag_str = flag.to_string();
    let stem = flag_str
        .strip_prefix("PS_")
        .unwrap_or(flag_str.as_str())
        .to_lowercase();
    let getter_str = format!("get_{}", stem);
    let setter_str = format!("set_{}", stem);
    (
        Ident::new(&getter_str, flag.span()),
        Ident::new(&setter_str, flag.span()),
        getter_str,
        setter_str,
    )
}

/// Generates `get_<name>` returning `Option<T>` and `set_<name>` methods on `StatusSettings`.
#[proc_macro]
pub fn sts_gets_and_sets(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let signature = syn::parse_macro_input!(input as Signature);
    let flag = signature.value_name;
    let return_t = signature.value_type;
    let variant = variant_for_type(&return_t);
    let (getter, setter, getter_str, setter_str) = accessor_names(&flag);

    let getter_comment = format!(
        "`{}` is used to retrieve `{}` items from a [`StatusSettings`] instance",
        getter_str, flag
    );
    let setter_comment = format!(
        "`{}` is used to set `{}` items in a [`StatusSettings`] instance",
        setter_str, flag
    );

    let tokens = quote! {
        impl StatusSettings {
            #[doc = #getter_comment]
            pub fn #getter(&self) -> Option<#return_t> {
                match self.0.get(#flag) {
                    Some(StatusSettingTypes::#variant(v)) => Some(v.clone()),
                    _ => None,
                }
            }
            #[doc = #setter_comment]
            pub fn #setter(&mut self, v: #return_t) {
                self.0.insert(#flag.to_string(), StatusSettingTypes::#variant(v));
            }
        }
    };
    tokens.into()
}

/// Generates `get_<name>` returning `T` (falling back to the default expression) and `set_<name>`
/// methods on `StatusSettings`.
#[proc_macro]
pub fn sts_gets_and_sets_with_default(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let signature = syn::parse_macro_input!(input as SignatureWithDefault);
    let flag = signature.value_name;
    let return_t = signature.value_type;
    let default_value = signature.default_value;
    let variant = variant_for_type(&return_t);
    let (getter, setter, getter_str, setter_str) = accessor_names(&flag);

    let getter_comment = format!(
        "`{}` is used to retrieve `{}` items from a [`StatusSettings`] instance",
        getter_str, flag
    );
    let setter_comment = format!(
        "`{}` is used to set `{}` items in a [`StatusSettings`] instance",
        setter_str, flag
    );

    let tokens = quote! {
        impl StatusSettings {
            #[doc = #getter_comment]
            pub fn #getter(&self) -> #return_t {
                match self.0.get(#flag) {
                    Some(StatusSettingTypes::#variant(v)) => v.clone(),
                    _ => #default_value,
                }
            }
            #[doc = #setter_comment]
            pub fn #setter(&mut self, v: #return_t) {
                self.0.insert(#flag.to_string(), StatusSettingTypes::#variant(v));
            }
        }
    };
    tokens.into()
}
