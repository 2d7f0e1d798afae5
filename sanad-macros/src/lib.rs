//! Procedural macros for Sanad.
//!
//! `#[derive(Injectable)]` generates construction metadata for a struct:
//!
//! ```rust,ignore
//! #[derive(Injectable)]
//! struct UserService {
//!     repo: Arc<dyn UserRepository>,        // constructor parameter
//!     #[inject(name = "audit")]
//!     log: Arc<dyn Logger>,                 // named registration
//!     #[inject(default)]
//!     retries: u32,                         // Default::default() when unresolvable
//!     #[inject(field)]
//!     cache: Option<Arc<Cache>>,            // injected after construction
//!     #[inject(setter = "set_clock")]
//!     clock: Option<Arc<Clock>>,            // injected through a setter
//!     #[inject(skip)]
//!     hits: AtomicU64,                      // Default::default(), never injected
//! }
//! ```
//!
//! Non-generic types are also submitted to the link-time type catalog so
//! the container can build them without a registration. Opt out with
//! `#[injectable(catalog = false)]`; point at a renamed facade crate with
//! `#[injectable(crate = "my_sanad")]`.

use darling::{FromDeriveInput, FromField, ast};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{DeriveInput, Ident, Index, Member, Path, Type, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_any))]
struct InjectableInput {
    ident: Ident,
    generics: syn::Generics,
    data: ast::Data<(), InjectField>,
    #[darling(rename = "crate", default)]
    krate: Option<Path>,
    #[darling(default)]
    catalog: Option<bool>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    default: bool,
    #[darling(default)]
    skip: bool,
    #[darling(default)]
    field: bool,
    #[darling(default)]
    setter: Option<Ident>,
}

enum Mode {
    Parameter,
    Field,
    Setter(Ident),
    Skip,
}

impl InjectField {
    fn mode(&self) -> darling::Result<Mode> {
        let span_of = |message: &str| {
            let error = darling::Error::custom(message);
            match &self.ident {
                Some(ident) => error.with_span(ident),
                None => error.with_span(&self.ty),
            }
        };

        if self.skip {
            if self.field || self.setter.is_some() || self.name.is_some() || self.default {
                return Err(span_of("`skip` cannot be combined with other inject options"));
            }
            return Ok(Mode::Skip);
        }
        match (&self.setter, self.field) {
            (Some(_), true) => Err(span_of("use either `field` or `setter`, not both")),
            (Some(setter), false) => Ok(Mode::Setter(setter.clone())),
            (None, true) => Ok(Mode::Field),
            (None, false) => Ok(Mode::Parameter),
        }
    }
}

/// Derives `Injectable` for a struct.
#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.write_errors().into(),
    }
}

fn expand(input: &DeriveInput) -> darling::Result<TokenStream2> {
    let parsed = InjectableInput::from_derive_input(input)?;
    let krate = parsed.krate.clone().unwrap_or_else(|| syn::parse_quote!(::sanad));
    let ident = &parsed.ident;
    let fields = parsed
        .data
        .as_ref()
        .take_struct()
        .ok_or_else(|| darling::Error::unsupported_shape("enum").with_span(ident))?;

    let mut errors = darling::Error::accumulator();
    let mut parameters = Vec::new();
    let mut initializers = Vec::new();
    let mut members = Vec::new();

    for (position, field) in fields.fields.iter().enumerate() {
        let Some(mode) = errors.handle(field.mode()) else {
            continue;
        };
        let ty = &field.ty;
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(position)),
        };
        let label = match &field.ident {
            Some(ident) => ident.to_string(),
            None => position.to_string(),
        };
        let named = field.name.as_ref().map(|name| quote!(.named(#name)));

        match mode {
            Mode::Parameter => {
                let info = if field.default {
                    quote!(#krate::ParameterInfo::defaulted::<#ty>(#label))
                } else {
                    quote!(#krate::ParameterInfo::of::<#ty>(#label))
                };
                parameters.push(quote!(#info #named));
                initializers.push(quote!(#member: args.next::<#ty>()?));
            }
            Mode::Skip => {
                initializers.push(quote!(#member: ::core::default::Default::default()));
            }
            Mode::Field | Mode::Setter(_) => {
                initializers.push(quote!(#member: ::core::default::Default::default()));
                let value = format_ident!("value");
                let info = match &mode {
                    Mode::Setter(setter) => quote! {
                        #krate::MemberInfo::property::<Self, #ty, _>(#label, |target: &mut Self, #value: #ty| {
                            target.#setter(#value);
                        })
                    },
                    _ => quote! {
                        #krate::MemberInfo::field::<Self, #ty, _>(#label, |target: &mut Self, #value: #ty| {
                            target.#member = #value;
                        })
                    },
                };
                let default = field.default.then(|| {
                    quote! {
                        .with_default(|| <#ty as #krate::Dependency>::into_value(
                            <#ty as ::core::default::Default>::default(),
                        ))
                    }
                });
                members.push(quote!(.member(#info.attributed() #named #default)));
            }
        }
    }
    errors.finish()?;

    // An unused argument list would trip `unused_variables` in user code.
    let args = if parameters.is_empty() {
        format_ident!("_args")
    } else {
        format_ident!("args")
    };

    let (impl_generics, ty_generics, where_clause) = parsed.generics.split_for_impl();
    let describe = quote! {
        impl #impl_generics #krate::Injectable for #ident #ty_generics #where_clause {
            fn type_info() -> #krate::TypeInfo {
                #krate::TypeInfo::builder::<Self>()
                    .constructor(
                        ::std::vec::Vec::<#krate::ParameterInfo>::from([#(#parameters),*]),
                        |#args: &mut #krate::Arguments| {
                            ::core::result::Result::Ok(Self { #(#initializers),* })
                        },
                    )
                    #(#members)*
                    .build()
            }
        }
    };

    let generic = parsed.generics.params.iter().next().is_some();
    let submit = (parsed.catalog.unwrap_or(true) && !generic).then(|| {
        quote! {
            #krate::inventory::submit! {
                #krate::TypeEntry::new(
                    ::core::any::TypeId::of::<#ident>,
                    <#ident as #krate::Injectable>::type_info,
                )
            }
        }
    });

    Ok(quote! {
        #describe
        #submit
    })
}
