//! Per-language rule sets plugged into [`SyntaxParser`](crate::parser::SyntaxParser).

#[cfg(any(feature = "lang-c", feature = "lang-cpp"))]
mod c_family;

#[cfg(feature = "lang-c")]
pub mod c;
#[cfg(feature = "lang-cpp")]
pub mod cpp;
#[cfg(feature = "lang-go")]
pub mod go;
#[cfg(feature = "lang-java")]
pub mod java;
#[cfg(feature = "lang-python")]
pub mod python;
#[cfg(feature = "lang-rust")]
pub mod rust;
