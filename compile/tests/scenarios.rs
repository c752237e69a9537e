//! End-to-end scenarios (spec §8): each one runs a full translation unit through
//! `translate_unit` and checks both the diagnostics stream and the shape of the emitted source,
//! rather than unit-testing one stage at a time.

use pretty_assertions::assert_eq;
use transpiler_compile::{fixtures, translate_unit};
use transpiler_session::{Options, Session};

#[test]
fn malloc_free_round_trip_has_no_errors_and_drops_on_release() {
    let unit = fixtures::malloc_free();
    let mut session = Session::new("malloc_free", Options::default());

    let translation = translate_unit(unit, &mut session).expect("pipeline does not fail fatally on this input");

    assert!(
        !session.diagnostics.has_errors(),
        "unexpected errors: {:#?}",
        session.diagnostics.records()
    );
    assert!(translation.source.contains("pub fn main"));
    assert!(
        translation.source.contains("drop(p)") || translation.source.contains("Box::new"),
        "expected the freed pointer to show up as an owning Box with an explicit drop: {}",
        translation.source
    );
}

#[test]
fn sum_array_parameter_is_classified_as_an_immutable_borrow() {
    let unit = fixtures::sum_array();
    let mut session = Session::new("sum_array", Options::default());

    let translation = translate_unit(unit, &mut session).expect("pipeline does not fail fatally on this input");

    assert!(
        !session.diagnostics.has_errors(),
        "unexpected errors: {:#?}",
        session.diagnostics.records()
    );
    assert!(translation.source.contains("pub fn sum"));
    assert!(
        translation.source.contains("& ") || translation.source.contains("&'"),
        "expected `xs` to be rendered as a borrow, not an owning pointer: {}",
        translation.source
    );
    assert!(
        !translation.source.contains("Box<"),
        "a read-only array walk should never need an owning Box: {}",
        translation.source
    );
}

#[test]
fn push_back_resizes_through_the_reallocates_catalog_mapping() {
    let unit = fixtures::push_back();
    let mut session = Session::new("push_back", Options::default());

    let translation = translate_unit(unit, &mut session).expect("pipeline does not fail fatally on this input");

    assert!(
        !session.diagnostics.has_errors(),
        "unexpected errors: {:#?}",
        session.diagnostics.records()
    );
    assert!(translation.source.contains("pub fn push_back"));
    assert!(
        translation.source.contains("__v.resize("),
        "expected the realloc call to lower through the Reallocates catalog mapping: {}",
        translation.source
    );
}

#[test]
fn producer_consumer_spawns_joins_and_guards_the_shared_counter_with_a_mutex() {
    let unit = fixtures::producer_consumer();
    let mut session = Session::new("producer_consumer", Options::default());

    let translation = translate_unit(unit, &mut session).expect("pipeline does not fail fatally on this input");

    assert!(translation.source.contains("::std::thread::spawn"), "{}", translation.source);
    assert!(translation.source.contains(".join()"), "{}", translation.source);
    assert!(
        translation.source.contains("::std::sync::Mutex<i32> = ::std::sync::Mutex::new"),
        "shared_count must be Mutex-wrapped once producer and consumer both write it: {}",
        translation.source
    );
    assert!(
        !translation.source.contains("pthread_mutex_lock(") && !translation.source.contains("pthread_mutex_unlock("),
        "mutex lock/unlock calls must be elided, not emitted as raw calls: {}",
        translation.source
    );
    assert!(
        !translation.source.contains("pthread_create(") && !translation.source.contains("pthread_join("),
        "thread spawn/join must lower to std::thread, not survive as raw calls: {}",
        translation.source
    );
    // Condition variables are recognized but not lowered, so this scenario — unlike the others —
    // still carries diagnostics after translation, and the generated `todo!` names the call it
    // could not lower.
    assert!(translation.source.contains("condition variable call `pthread_cond_wait`"), "{}", translation.source);
    assert!(
        session.diagnostics.records().iter().any(|r| r.code == "E-CODEGEN-0006"),
        "expected an explicit diagnostic about the unlowered condition-variable calls: {:#?}",
        session.diagnostics.records()
    );
}

#[test]
fn demo_lookup_by_name_matches_the_published_name_list() {
    for name in fixtures::NAMES {
        assert!(fixtures::by_name(name).is_some(), "`{name}` is listed but has no fixture");
    }
    assert_eq!(fixtures::by_name("not-a-real-demo").is_none(), true);
}
