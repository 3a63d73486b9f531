//! kennitala: Icelandic national identification number parsing, validation,
//! formatting and generation.
//!
//! A kennitala is ten digits identifying a person or a registered entity
//! such as a company. It encodes a date, two sequence digits, a check digit
//! and a century indicator.
//!
//! # Format
//!
//! ```text
//! KENNITALA ::= DD MM YY SS C R
//! DD        ::= day of month (+40 for companies)
//! C         ::= check digit over DDMMYYSS
//! R         ::= century indicator, 8 | 9 | 0
//! ```
//!
//! # Example
//!
//! ```
//! use kennitala::{EntityKind, Kennitala};
//!
//! let kt = Kennitala::parse("010130-2989").expect("valid kennitala");
//! assert!(kt.is_person());
//! assert_eq!(kt.pretty("-"), "010130-2989");
//!
//! let company = Kennitala::generate(EntityKind::Company);
//! assert!(kennitala::is_valid(company.as_str()));
//! ```

mod generator;
mod input;
mod kennitala;

pub use generator::KennitalaGen;
pub use kennitala::{
    COMPANY_DAY_OFFSET, EntityKind, InvalidReason, KENNITALA_LEN, Kennitala, KennitalaError,
    check_digit, is_valid, normalize,
};
