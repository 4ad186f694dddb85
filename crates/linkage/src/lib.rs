//! `linkwise-linkage`: rule-driven record linkage engine.
//!
//! Links the records of a right table to those of a left table using an
//! ordered list of rules (exact fields, derived keys, bounded edit distance),
//! keeps the best rule per record pair and reports what stayed unmatched.
//!
//! Pure engine crate: receives tables, returns tables. File loading lives in
//! [`load`]; no CLI concerns.

pub mod columns;
pub mod config;
pub mod criteria;
pub mod dedup;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod join;
pub mod key;
pub mod load;
pub mod matcher;
pub mod result;
pub mod summary;
pub mod table;
pub mod unmatched;
pub mod value;

pub use columns::Suffixes;
pub use config::LinkConfig;
pub use criteria::{FieldPrecision, KeyFn, MatchCriterion, Method};
pub use dedup::remove_duplicate_matches;
pub use descriptor::{resolve_criteria, CriterionSpec};
pub use engine::Matcher;
pub use error::{BoxError, LinkError, Side};
pub use join::{cross_join, inner_join};
pub use key::{KeyExpr, KeyFunctions, KeyPart, KeyTransform};
pub use result::MatchResultSet;
pub use summary::{MatchSummary, RuleSummary};
pub use table::{Row, Table};
pub use unmatched::unmatched_records;
pub use value::Value;
