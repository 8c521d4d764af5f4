//! Common library module for integration tests
// See https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests
// Not every test file uses every fixture
#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use odata_resource_writer::{
    error::WriteError,
    primitive::Decimal,
    provider::{Writable, WriterProvider},
    resource::{PropertyInfo, ResourceTypeInfo},
    state::{FlushPolicy, WriteOptions, WriteState},
    value::{Annotations, OpenValue},
};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Resource with a string, a number and an optional property
pub struct Abc {
    pub a: String,
    pub b: i32,
    pub c: Option<String>,
}
impl Writable for Abc {}

pub fn abc_info() -> ResourceTypeInfo<Abc> {
    ResourceTypeInfo::<Abc>::new("Test.Abc")
        .property("A", |v| &v.a)
        .property("B", |v| &v.b)
        .property("C", |v| &v.c)
}

pub fn abc() -> Abc {
    Abc {
        a: "foo".to_owned(),
        b: 42,
        c: None,
    }
}

#[derive(Debug)]
pub struct Address {
    pub street: String,
    pub city: String,
}
impl Writable for Address {}

#[derive(Debug)]
pub struct Order {
    pub id: i64,
    pub total: Decimal,
    pub items: Vec<String>,
}
impl Writable for Order {}

#[derive(Debug)]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub address: Address,
    pub orders: Vec<Order>,
    /// Open properties
    pub extra: Annotations,
}
impl Writable for Customer {}

pub fn customer_info() -> ResourceTypeInfo<Customer> {
    ResourceTypeInfo::<Customer>::new("Sales.Customer")
        .property_with(PropertyInfo::new("Id", |c: &Customer| &c.id).key(true))
        .property("Name", |c| &c.name)
        .property("Address", |c| &c.address)
        .property_with(PropertyInfo::new("Orders", |c: &Customer| &c.orders).navigation(true))
        .dynamic_properties(|c| Some(&c.extra))
}

pub fn address_info() -> ResourceTypeInfo<Address> {
    ResourceTypeInfo::<Address>::new("Sales.Address")
        .property("Street", |a| &a.street)
        .property("City", |a| &a.city)
}

pub fn order_info() -> ResourceTypeInfo<Order> {
    ResourceTypeInfo::<Order>::new("Sales.Order")
        .property_with(PropertyInfo::new("Id", |o: &Order| &o.id).key(true))
        .property("Total", |o| &o.total)
        .property("Items", |o| &o.items)
}

pub fn sales_provider() -> Arc<WriterProvider> {
    WriterProvider::builder()
        .register(customer_info())
        .register(address_info())
        .register(order_info())
        .build()
}

pub fn customer() -> Customer {
    let mut extra = Annotations::new();
    extra.insert("Rating".to_owned(), OpenValue::from(4.5));
    extra.insert(
        "Tags".to_owned(),
        OpenValue::Array(vec!["vip".into(), "new".into()]),
    );
    Customer {
        id: 7,
        name: "Ann".to_owned(),
        address: Address {
            street: "Main St 1".to_owned(),
            city: "Springfield".to_owned(),
        },
        orders: vec![
            Order {
                id: 100,
                total: Decimal::from(25),
                items: vec!["tea".to_owned(), "cups".to_owned()],
            },
            Order {
                id: 101,
                total: "3.50".parse().unwrap(),
                items: Vec::new(),
            },
        ],
        extra,
    }
}

pub const CUSTOMER_JSON: &str = concat!(
    r#"{"Id":7,"Name":"Ann","Address":{"Street":"Main St 1","City":"Springfield"},"#,
    r#""Orders":[{"Id":100,"Total":25,"Items":["tea","cups"]},{"Id":101,"Total":3.50,"Items":[]}],"#,
    r#""Rating":4.5,"Tags":["vip","new"]}"#
);

/// Result of writing a document with [`write_resumable`]
#[derive(Debug)]
pub struct Written {
    pub json: String,
    /// Number of calls of the writer until the value was complete
    pub calls: usize,
    pub state: WriteState,
}

/// Writes a value, draining the output whenever the writer suspended
///
/// Verifies that the stack is balanced once the value is complete and that the output is
/// well-formed JSON.
pub fn write_resumable<V: Writable>(
    provider: &Arc<WriterProvider>,
    value: &V,
    options: WriteOptions,
    flush_policy: impl FlushPolicy + 'static,
) -> Result<Written, WriteError> {
    let writer = provider.get_writer::<V>()?;
    let mut state = WriteState::new(Arc::clone(provider), options).with_flush_policy(flush_policy);

    let mut out = Vec::new();
    let mut calls = 1;
    while !writer.write(value, &mut state)? {
        assert!(
            state.stack().has_pending_continuation(),
            "suspended write must leave continuation"
        );
        assert_eq!(0, state.stack().depth());
        state.drain_to(&mut out)?;
        calls += 1;
    }
    state.drain_to(&mut out)?;

    assert_eq!(0, state.stack().depth());
    assert_eq!(false, state.stack().has_pending_continuation());
    let json = String::from_utf8(out).unwrap();
    if let Err(e) = serde_json::from_str::<serde_json::Value>(&json) {
        panic!("Written document is not valid JSON ({e}): {json}");
    }
    Ok(Written { json, calls, state })
}

/// Writes a value without ever suspending
pub fn write_uninterrupted<V: Writable>(
    provider: &Arc<WriterProvider>,
    value: &V,
    options: WriteOptions,
) -> Result<Written, WriteError> {
    write_resumable(provider, value, options, |_: usize| false)
}

/// Writes a value, suspending at every checkpoint
pub fn write_always_suspending<V: Writable>(
    provider: &Arc<WriterProvider>,
    value: &V,
    options: WriteOptions,
) -> Result<Written, WriteError> {
    write_resumable(provider, value, options, |_: usize| true)
}
