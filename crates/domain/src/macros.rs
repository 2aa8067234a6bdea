//! Display and FromStr for keyword-valued settings
//!
//! Settings such as the timeout mode are written as lowercase keywords in
//! config files and environment variables. This macro derives both
//! directions of that mapping from a single table.
//!
//! # Example
//!
//! ```rust
//! use fortify_domain::impl_setting_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Level {
//!     Low,
//!     High,
//! }
//!
//! impl_setting_conversions!(Level {
//!     Low => "low",
//!     High => "high",
//! });
//!
//! assert_eq!("HIGH".parse::<Level>(), Ok(Level::High));
//! assert_eq!(Level::Low.to_string(), "low");
//! ```

/// Implements Display and case-insensitive FromStr for a keyword enum
#[macro_export]
macro_rules! impl_setting_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
