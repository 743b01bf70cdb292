//! The `json_struct!` declarative macro.

/// Defines a struct and derives [`MarshalJson`] and [`UnmarshalJson`] for
/// it from per-field tag strings.
///
/// Each field is declared as `name: Type => "tag"`, where the tag string
/// follows the field-tag grammar: an optional member name (empty means
/// the Rust field name, `-` excludes the field) followed by option
/// keywords (`nocase`, `inline`, `unknown`, `omitzero`, `omitempty`,
/// `string`, `format:value`).
///
/// The struct must implement [`Default`]; decoding JSON `null` resets it.
///
/// # Examples
///
/// ```
/// jsonwire::json_struct! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Point {
///         x: f64 => "x",
///         y: f64 => "y",
///         label: String => "label,omitempty",
///     }
/// }
///
/// let p = Point { x: 1.0, y: -2.5, label: String::new() };
/// assert_eq!(jsonwire::marshal(&p).unwrap(), br#"{"x":1,"y":-2.5}"#);
/// let q: Point = jsonwire::unmarshal(br#"{"x":1,"y":-2.5}"#).unwrap();
/// assert_eq!(p, q);
/// ```
///
/// [`MarshalJson`]: crate::MarshalJson
/// [`UnmarshalJson`]: crate::UnmarshalJson
#[macro_export]
macro_rules! json_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ftype:ty => $tag:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $ftype, )+
        }

        impl $name {
            #[doc(hidden)]
            fn __jsonwire_fields() -> ::core::result::Result<
                ::std::sync::Arc<$crate::marshal::fields::StructFields<Self>>,
                $crate::Error,
            > {
                $crate::marshal::fields::struct_fields::<Self>(|| ::std::vec![
                    $(
                        $crate::marshal::fields::RawField {
                            rust_name: ::core::stringify!($field),
                            tag: $tag,
                            get: {
                                fn get<'x>(v: &'x $name) -> &'x (dyn $crate::MarshalJson + 'x) {
                                    &v.$field
                                }
                                get
                            },
                            get_mut: {
                                fn get_mut<'x>(
                                    v: &'x mut $name,
                                ) -> &'x mut (dyn $crate::UnmarshalJson + 'x) {
                                    &mut v.$field
                                }
                                get_mut
                            },
                        }
                    ),+
                ])
            }
        }

        impl $crate::MarshalJson for $name {
            fn marshal_json(
                &self,
                st: &mut $crate::MarshalState<'_, '_>,
            ) -> ::core::result::Result<(), $crate::Error> {
                let fields = Self::__jsonwire_fields()?;
                $crate::marshal::structs::marshal_struct_value(self, &fields, st)
            }

            fn json_is_zero(&self) -> bool {
                match Self::__jsonwire_fields() {
                    ::core::result::Result::Ok(fields) => {
                        $crate::marshal::structs::struct_is_zero(self, &fields)
                    }
                    ::core::result::Result::Err(_) => false,
                }
            }

            fn marshal_json_members(
                &self,
                st: &mut $crate::MarshalState<'_, '_>,
            ) -> ::core::option::Option<::core::result::Result<(), $crate::Error>> {
                let fields = match Self::__jsonwire_fields() {
                    ::core::result::Result::Ok(fields) => fields,
                    ::core::result::Result::Err(e) => {
                        return ::core::option::Option::Some(::core::result::Result::Err(e));
                    }
                };
                ::core::option::Option::Some($crate::marshal::structs::marshal_struct_members(
                    self, &fields, st,
                ))
            }
        }

        impl $crate::UnmarshalJson for $name {
            fn unmarshal_json(
                &mut self,
                st: &mut $crate::UnmarshalState<'_, '_>,
            ) -> ::core::result::Result<(), $crate::Error> {
                let fields = Self::__jsonwire_fields()?;
                $crate::marshal::structs::unmarshal_struct_value(self, &fields, st)
            }

            fn unmarshal_json_member(
                &mut self,
                name: &str,
                st: &mut $crate::UnmarshalState<'_, '_>,
            ) -> ::core::option::Option<::core::result::Result<(), $crate::Error>> {
                let fields = match Self::__jsonwire_fields() {
                    ::core::result::Result::Ok(fields) => fields,
                    ::core::result::Result::Err(e) => {
                        return ::core::option::Option::Some(::core::result::Result::Err(e));
                    }
                };
                $crate::marshal::structs::unmarshal_struct_member(self, &fields, name, st)
            }
        }
    };
}
