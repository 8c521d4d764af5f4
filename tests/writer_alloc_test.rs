use std::error::Error;
use std::sync::Arc;

use assert_no_alloc::permit_alloc;
// Only use import when creating debug builds, see also configuration below
#[cfg(debug_assertions)]
use assert_no_alloc::AllocDisabler;
use odata_resource_writer::{
    provider::{Writable, WriterProvider},
    resource::ResourceTypeInfo,
    state::{WriteOptions, WriteState},
};

// Only enable when creating debug builds
#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

fn assert_no_alloc<F: FnOnce() -> Result<(), Box<dyn Error>>>(func: F) {
    assert_no_alloc::assert_no_alloc(func).unwrap()
}

struct Account {
    name: String,
    active: bool,
    note: Option<String>,
}
impl Writable for Account {}

fn account_provider() -> Arc<WriterProvider> {
    WriterProvider::builder()
        .register(
            ResourceTypeInfo::<Account>::new("Test.Account")
                .property("Name", |a| &a.name)
                .property("Active", |a| &a.active)
                .property("Note", |a| &a.note),
        )
        .build()
}

fn account() -> Account {
    Account {
        // Has to be escaped
        name: "\"quoted\"\n\u{10FFFF}".to_owned(),
        active: true,
        note: None,
    }
}

const ACCOUNT_JSON: &str = "{\"Name\":\"\\\"quoted\\\"\\n\u{10FFFF}\",\"Active\":true,\"Note\":null}";

#[test]
fn cached_writer_lookup() -> Result<(), Box<dyn Error>> {
    let provider = account_provider();
    // Populates the cache
    provider.get_writer::<Account>()?;

    assert_no_alloc(|| {
        let writer = provider.get_writer::<Account>()?;
        permit_alloc(|| drop(writer));
        Ok(())
    });
    Ok(())
}

#[test]
fn write_resource() -> Result<(), Box<dyn Error>> {
    let provider = account_provider();
    let value = account();

    let writer = provider.get_writer::<Account>()?;
    let new_state = || {
        WriteState::new(Arc::clone(&provider), WriteOptions::default())
            .with_flush_policy(|_: usize| true)
    };

    // Resolves the writers of the properties
    let mut state = new_state();
    let mut out = Vec::new();
    while !writer.write(&value, &mut state)? {
        state.drain_to(&mut out)?;
    }
    state.drain_to(&mut out)?;
    assert_eq!(ACCOUNT_JSON, String::from_utf8(out)?);

    let mut state = new_state();
    let mut out = Vec::with_capacity(4096);

    assert_no_alloc(|| {
        // Suspends after every checkpoint; the single frame is kept inline
        while !writer.write(&value, &mut state)? {
            permit_alloc(|| state.drain_to(&mut out))?;
        }
        permit_alloc(|| state.drain_to(&mut out))?;
        Ok(())
    });

    assert_eq!(ACCOUNT_JSON, String::from_utf8(out)?);
    Ok(())
}
