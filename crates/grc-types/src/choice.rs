//! Closed choice sets
//!
//! Every enumerated field in the tracker (impact, likelihood, statuses, ...) is a
//! closed set of upper-case codes. `closed_choice!` generates the enum together
//! with its code table, human labels, parsing and serde glue so that an unknown
//! code is rejected at deserialization time instead of being stored verbatim.

use thiserror::Error;

/// A value outside a closed choice set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {field} (expected one of: {})", .expected.join(", "))]
pub struct InvalidChoice {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static [&'static str],
}

/// Declares a closed choice enum.
///
/// Variants are declared in ordinal order; the derived `Ord` follows it.
/// Codes are matched exactly; `low` is not `LOW`.
macro_rules! closed_choice {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "&'static str")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Field name used in error messages.
            pub const FIELD: &'static str = $field;

            /// Every variant, in ordinal order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Every code, in ordinal order.
            pub const CODES: &'static [&'static str] = &[$($code),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Human-readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn parse(value: &str) -> Result<Self, $crate::choice::InvalidChoice> {
                $(
                    if value == $code {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::choice::InvalidChoice {
                    field: Self::FIELD,
                    value: value.to_string(),
                    expected: Self::CODES,
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::choice::InvalidChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::choice::InvalidChoice;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }
    };
}

pub(crate) use closed_choice;

#[cfg(test)]
mod tests {
    closed_choice! {
        enum Colour ("colour") {
            Red => "RED", "Red",
            DarkBlue => "DARK_BLUE", "Dark blue",
        }
    }

    #[test]
    fn parse_requires_canonical_code() {
        assert_eq!(Colour::parse("DARK_BLUE").unwrap(), Colour::DarkBlue);
        assert_eq!(Colour::parse("dark_blue").unwrap_err().value, "dark_blue");
        assert_eq!(Colour::DarkBlue.to_string(), "DARK_BLUE");
        assert_eq!(Colour::DarkBlue.label(), "Dark blue");
    }

    #[test]
    fn unknown_code_is_rejected_with_context() {
        let err = Colour::parse("GREEN").unwrap_err();
        assert_eq!(err.field, "colour");
        assert_eq!(
            err.to_string(),
            "invalid value 'GREEN' for colour (expected one of: RED, DARK_BLUE)"
        );
    }

    #[test]
    fn serde_uses_codes() {
        let json = serde_json::to_string(&Colour::Red).unwrap();
        assert_eq!(json, "\"RED\"");
        let back: Colour = serde_json::from_str("\"RED\"").unwrap();
        assert_eq!(back, Colour::Red);
        assert!(serde_json::from_str::<Colour>("\"red\"").is_err());
        assert!(serde_json::from_str::<Colour>("\"PURPLE\"").is_err());
    }

    #[test]
    fn ordering_follows_declaration() {
        assert!(Colour::Red < Colour::DarkBlue);
        assert_eq!(Colour::ALL, &[Colour::Red, Colour::DarkBlue]);
    }
}
