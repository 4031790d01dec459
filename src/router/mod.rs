//! # Router Module
//!
//! Path matching for the dispatch engine.
//!
//! ## Overview
//!
//! Routing happens in two phases:
//!
//! 1. **Declaration**: routes are collected in a [`RouteTable`], which keeps
//!    registration order and handles duplicate `(method, path)` pairs (warn and
//!    overwrite, or fail in strict mode).
//!
//! 2. **Matching**: at build time the table is compiled into a [`RadixRouter`]; each
//!    request is matched by walking the tree segment by segment, which keeps lookup
//!    proportional to path length rather than route count.
//!
//! ## Pattern syntax
//!
//! | Pattern | Matches | Captures |
//! |---------|---------|----------|
//! | `/users/:id` | `/users/42` | `id = "42"` |
//! | `/a/*` | `/a/x` | `_0 = "x"` |
//! | `/files/**` | `/files`, `/files/a/b` | `_ = "a/b"` |
//! | `/files/**:rest` | `/files/a/b` | `rest = "a/b"` |

mod radix;
mod table;

pub use radix::{ParamVec, RadixRouter, RouteMatch, MAX_INLINE_PARAMS, WILDCARD_KEY};
pub use table::{normalize_path, DuplicateRouteError, RouteMethod, RouteTable};
