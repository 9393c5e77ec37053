//! Query composition and response handling on top of [`fql_codec`].
//!
//! ```
//! use fql_codec::CodecRegistry;
//! use fql_query::{decode_response, Query, QueryRequest};
//!
//! let registry = CodecRegistry::new();
//! let request = QueryRequest::new(Query::builder().lit("1 + ").value(2i32).build());
//! assert_eq!(
//!     request.encode(&registry).unwrap(),
//!     r#"{"query":{"fql":["1 + ",{"value":{"@int":"2"}}]}}"#
//! );
//!
//! let response = decode_response::<i32>(&registry, br#"{"data":{"@int":"3"},"txn_ts":1}"#).unwrap();
//! assert_eq!(response.data, 3);
//! ```

pub mod error;
pub mod query;
pub mod request;
pub mod response;

pub use error::QueryError;
pub use query::{Argument, Fragment, Query, QueryBuilder};
pub use request::QueryRequest;
pub use response::{decode_response, parse_query_tags, QueryFailure, QueryStats, QuerySuccess};
