//! Query parsing, execution and search requests.
//!
//! - [`parser`] turns a [`SearchQuery`] into a [`QueryTree`]
//! - [`executor`] evaluates a tree against one index snapshot
//! - [`request`] runs searches on a background thread with cancellation

pub mod executor;
pub mod highlight;
pub mod parser;
pub mod request;
pub mod scorer;
pub mod spelling;
pub mod topk;

pub use executor::{QueryExecutor, ResultSet, SearchHit, SortKey, SortOrder, SpellCorrection};
pub use highlight::{fetch_char_ranges, CharRange};
pub use parser::{parse_query, QueryNode, QueryOperator, QueryTree, SearchQuery};
pub use request::{RequestState, SearchHandle, SearchRequest};
pub use scorer::Scorer;
pub use spelling::{levenshtein_distance, SpellingCorrector};
pub use topk::{TopKEntry, TopKHeap};
