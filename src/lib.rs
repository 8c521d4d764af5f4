#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]
// When `docsrs` configuration flag is set enable banner for features in documentation
// See https://stackoverflow.com/q/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A resumable, streaming writer for [OData JSON](https://docs.oasis-open.org/odata/odata-json-format/v4.01/odata-json-format-v4.01.html)
//! resource payloads.
//!
//! Resources, collections and primitive values are written into an output buffer owned by a
//! [`WriteState`](state::WriteState). Writers check at fixed points whether the buffered
//! output should be flushed; if so they record their progress on the write stack of the state
//! and return `Ok(false)`. The caller drains the buffer and calls the writer again with the
//! same value and state, and writing continues exactly where it stopped. The output is the
//! same no matter how often writing was suspended.
//!
//! # Terminology
//!
//! - *resource*: structured value written as JSON object, for example an entity
//!   - *declared property*: property described by the [`ResourceTypeInfo`](resource::ResourceTypeInfo)
//!     of the resource type
//!   - *dynamic property*: property of an open type which is only known at runtime
//!   - *instance annotation*: member named `@namespace.term`, or `Property@namespace.term`
//!     for annotations of a property
//! - *collection*: sequence of values written as JSON array
//! - *select / expand clause*: selection of the properties to write, and of the navigation
//!   properties whose related resources are included
//!
//! # Usage examples
//!
//! ```
//! # use std::sync::Arc;
//! # use odata_resource_writer::model::SelectExpandClause;
//! # use odata_resource_writer::provider::{Writable, WriterProvider};
//! # use odata_resource_writer::resource::{PropertyInfo, ResourceTypeInfo};
//! # use odata_resource_writer::state::{WriteOptions, WriteState};
//! struct Customer {
//!     id: i32,
//!     name: String,
//!     orders: Vec<Order>,
//! }
//! impl Writable for Customer {}
//!
//! struct Order {
//!     amount: f64,
//! }
//! impl Writable for Order {}
//!
//! let provider = WriterProvider::builder()
//!     .register(
//!         ResourceTypeInfo::<Customer>::new("Sales.Customer")
//!             .property_with(PropertyInfo::new("Id", |c: &Customer| &c.id).key(true))
//!             .property("Name", |c| &c.name)
//!             .property_with(
//!                 PropertyInfo::new("Orders", |c: &Customer| &c.orders).navigation(true),
//!             ),
//!     )
//!     .register(ResourceTypeInfo::<Order>::new("Sales.Order").property("Amount", |o| &o.amount))
//!     .build();
//!
//! let customer = Customer {
//!     id: 1,
//!     name: "Ann".to_owned(),
//!     orders: vec![Order { amount: 10.5 }],
//! };
//!
//! // Suspends after every property; normally the default flush threshold is used
//! let options = WriteOptions {
//!     context_url: Some("$metadata#Customers/$entity".to_owned()),
//!     select_expand: Some(Arc::new(SelectExpandClause::all().expand("Orders", SelectExpandClause::all()))),
//!     flush_threshold: 0,
//!     ..Default::default()
//! };
//! let writer = provider.get_writer::<Customer>()?;
//! let mut state = WriteState::new(Arc::clone(&provider), options);
//! let mut out = Vec::new();
//! while !writer.write(&customer, &mut state)? {
//!     state.drain_to(&mut out)?;
//! }
//! state.drain_to(&mut out)?;
//!
//! assert_eq!(
//!     String::from_utf8(out)?,
//!     r#"{"@odata.context":"$metadata#Customers/$entity","Id":1,"Name":"Ann","Orders":[{"Amount":10.5}]}"#
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`WriterProvider::write_document`](provider::WriterProvider::write_document) performs this
//! drain loop for a `std::io::Write`.

pub mod annotation;
pub mod error;
pub mod model;
pub mod primitive;
pub mod provider;
pub mod resource;
pub mod stack;
pub mod state;
pub mod value;
pub mod writer;

mod json_number;
mod structural;
