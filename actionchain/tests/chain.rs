//! Chain behaviour on deterministic contexts.

#![cfg(feature = "test-utils")]

use actionchain::test_utils::{ManualContexts, Recorder};
use actionchain::{Chain, FnUnit, Phase, RoleUnit, Unit, UnitError, UnitExt, role};
use std::sync::{Arc, Mutex};

fn add_one(recorder: &Recorder, label: &str) -> RoleUnit<i32, i32> {
    recorder.compute(label, |x: i32| Ok(x + 1))
}

fn parse_int(recorder: &Recorder) -> RoleUnit<String, i32> {
    recorder.compute("parse", |s: String| {
        s.parse::<i32>().map_err(UnitError::other)
    })
}

fn run<P: Send + 'static, V: Send + 'static>(chain: &Chain<P, V>, input: P) -> ManualContexts {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
    let manual = ManualContexts::new();
    chain.execute_with(input, &manual.contexts());
    manual.run_until_idle();
    manual
}

// --- Order preservation ---

#[test]
fn each_compute_receives_previous_output() {
    let rec = Recorder::new();
    let chain = add_one(&rec, "a")
        .then(add_one(&rec, "b"))
        .then(add_one(&rec, "c"))
        .then(rec.consume("end"));

    run(&chain, 10);

    assert_eq!(
        rec.of(Phase::Computing),
        vec![
            ("a".to_string(), "10".to_string()),
            ("b".to_string(), "11".to_string()),
            ("c".to_string(), "12".to_string()),
        ]
    );
    assert_eq!(rec.of(Phase::Consuming), vec![("end".to_string(), "13".to_string())]);
}

#[test]
fn parse_then_three_increments_consumes_four() {
    let rec = Recorder::new();
    let chain = parse_int(&rec)
        .then(add_one(&rec, "a"))
        .then(add_one(&rec, "b"))
        .then(add_one(&rec, "c"))
        .then(rec.consume("check"));

    run(&chain, "1".to_string());

    assert_eq!(rec.of(Phase::Consuming), vec![("check".to_string(), "4".to_string())]);
    assert!(rec.of(Phase::ErrorHandling).is_empty());
}

#[test]
fn mixed_chain_consumes_between_computes() {
    let rec = Recorder::new();
    let chain = parse_int(&rec)
        .then(add_one(&rec, "a"))
        .then(rec.consume("first"))
        .then(add_one(&rec, "b"))
        .then(rec.consume("second"));

    run(&chain, "10".to_string());

    assert_eq!(
        rec.of(Phase::Consuming),
        vec![
            ("first".to_string(), "11".to_string()),
            ("second".to_string(), "12".to_string()),
        ]
    );
}

// --- Context separation ---

#[test]
fn compute_off_foreground_consume_and_handlers_on_it() {
    let rec = Recorder::new();
    let chain = parse_int(&rec)
        .then(add_one(&rec, "a"))
        .then(rec.consume("seen"))
        .then(rec.compute("fail", |_: i32| Err::<i32, _>(UnitError::msg("no"))))
        .then(rec.on_error("caught"));

    run(&chain, "3".to_string());

    let events = rec.events();
    assert!(!events.is_empty());
    for event in events {
        match event.phase {
            Phase::Computing => assert!(!event.on_foreground, "{event:?}"),
            Phase::Consuming | Phase::ErrorHandling => {
                assert!(event.on_foreground, "{event:?}")
            }
        }
    }
}

// --- Errors ---

#[test]
fn deliberate_failure_reaches_trailing_handler() {
    let rec = Recorder::new();
    let chain = parse_int(&rec)
        .then(add_one(&rec, "a"))
        .then(add_one(&rec, "b"))
        .then(FnUnit::<i32, i32>::computing(|_| Err(UnitError::msg("deliberate failure"))))
        .then(add_one(&rec, "after"))
        .then(rec.on_error("capture"));

    run(&chain, "1234".to_string());

    assert_eq!(
        rec.of(Phase::ErrorHandling),
        vec![("capture".to_string(), "deliberate failure".to_string())]
    );
    let computed: Vec<String> = rec.of(Phase::Computing).into_iter().map(|(l, _)| l).collect();
    assert_eq!(computed, vec!["parse", "a", "b"]);
    assert!(rec.of(Phase::Consuming).is_empty());
}

#[test]
fn parse_failure_routes_parse_error_to_handler() {
    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    let unit = FnUnit::<String, i32>::computing(|s| s.parse::<i32>().map_err(UnitError::other))
        .on_consume(|_| panic!("consume must not run after a failed compute"))
        .on_error(move |e| {
            let is_parse = e.downcast_ref::<std::num::ParseIntError>().is_some();
            *sink.lock().unwrap() = Some((is_parse, actionchain::context::on_foreground()));
            Ok(())
        });

    let manual = ManualContexts::new();
    unit.execute_with("hello world".to_string(), &manual.contexts());
    manual.run_until_idle();

    assert_eq!(*captured.lock().unwrap(), Some((true, true)));
}

#[test]
fn short_circuit_skips_remaining_computes_and_consumes() {
    let rec = Recorder::new();
    let chain = add_one(&rec, "a")
        .then(rec.consume("a-out"))
        .then(rec.compute("k", |_: i32| Err::<i32, _>(UnitError::msg("k failed"))))
        .then(rec.consume("k-out"))
        .then(add_one(&rec, "later"))
        .then(rec.consume("later-out"));

    run(&chain, 0);

    let labels: Vec<String> = rec.events().into_iter().map(|e| e.label).collect();
    assert_eq!(labels, vec!["a", "a-out", "k"]);
}

#[test]
fn first_handler_wins_and_nothing_after_runs() {
    let rec = Recorder::new();
    let chain = add_one(&rec, "a")
        .then(rec.compute("k", |_: i32| Err::<i32, _>(UnitError::msg("boom"))))
        .then(add_one(&rec, "skipped"))
        .then(rec.on_error("first"))
        .then(add_one(&rec, "also-skipped"))
        .then(rec.consume("never"))
        .then(rec.on_error("second"));

    run(&chain, 0);

    let labels: Vec<String> = rec.events().into_iter().map(|e| e.label).collect();
    assert_eq!(labels, vec!["a", "k", "first"]);
}

#[test]
fn reraising_handler_can_replace_the_error() {
    let rec = Recorder::new();
    let chain = rec
        .compute("k", |_: i32| Err::<i32, _>(UnitError::msg("inner")))
        .then(FnUnit::<i32, i32>::computing(Ok).on_error(|e| {
            Err(UnitError::msg(format!("outer({e})")))
        }))
        .then(rec.on_error("sink"));

    run(&chain, 0);

    assert_eq!(
        rec.of(Phase::ErrorHandling),
        vec![("sink".to_string(), "outer(inner)".to_string())]
    );
}

#[test]
fn consume_failure_is_offered_to_its_own_handler_first() {
    struct Fragile(Recorder);

    impl Unit<i32, i32> for Fragile {
        fn compute(&self, input: i32) -> Result<i32, UnitError> {
            Ok(input)
        }

        fn consume(&self, _output: &i32) -> Result<(), UnitError> {
            Err(UnitError::msg("consume broke"))
        }

        fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
            self.0
                .record("fragile", Phase::ErrorHandling, error.to_string());
            Err(error)
        }
    }

    let rec = Recorder::new();
    let chain = Chain::new(Fragile(rec.clone()))
        .then(add_one(&rec, "skipped"))
        .then(rec.on_error("sink"));

    run(&chain, 1);

    assert_eq!(
        rec.of(Phase::ErrorHandling),
        vec![
            ("fragile".to_string(), "consume broke".to_string()),
            ("sink".to_string(), "consume broke".to_string()),
        ]
    );
    assert!(rec.of(Phase::Computing).is_empty());
}

#[test]
fn unhandled_error_is_silently_dropped() {
    let rec = Recorder::new();
    let chain = add_one(&rec, "a")
        .then(rec.compute("k", |_: i32| Err::<i32, _>(UnitError::msg("lost"))))
        .then(role::identity())
        .then(add_one(&rec, "b"));

    let manual = run(&chain, 0);

    assert_eq!(manual.pending(), (0, 0));
    let labels: Vec<String> = rec.events().into_iter().map(|e| e.label).collect();
    assert_eq!(labels, vec!["a", "k"]);
}

// --- Defaults ---

#[test]
fn unit_without_compute_delivers_default_value() {
    let rec = Recorder::new();
    let seen = rec.clone();
    let unit = FnUnit::<String, String>::new().on_consume(move |value| {
        seen.record("consume", Phase::Consuming, format!("{value:?}"));
        Ok(())
    });

    let manual = ManualContexts::new();
    unit.execute_with("x".to_string(), &manual.contexts());
    manual.run_until_idle();

    assert_eq!(
        rec.of(Phase::Consuming),
        vec![("consume".to_string(), "\"\"".to_string())]
    );
}

#[test]
fn empty_chain_runs_nothing() {
    let manual = ManualContexts::new();
    Chain::<i32, i32>::empty().execute_with(1, &manual.contexts());
    assert_eq!(manual.pending(), (0, 0));
}

// --- Fusion transparency ---

/// An `Arc` around a role unit is an opaque unit and never fuses.
fn opaque<P, R>(unit: RoleUnit<P, R>) -> Arc<RoleUnit<P, R>> {
    Arc::new(unit)
}

/// Observable consume / handle-error calls as `(label, phase, value, on_foreground)`.
fn observable(recorder: &Recorder) -> Vec<(String, Phase, String, bool)> {
    recorder
        .events()
        .into_iter()
        .filter(|event| event.phase != Phase::Computing)
        .map(|event| (event.label, event.phase, event.value, event.on_foreground))
        .collect()
}

fn compare(fused: (&Chain<i32, i32>, &Recorder), plain: (&Chain<i32, i32>, &Recorder), input: i32) {
    assert!(
        fused.0.len() < plain.0.len(),
        "fused chain should have fewer nodes"
    );
    run(fused.0, input);
    run(plain.0, input);
    assert!(!observable(fused.1).is_empty());
    assert_eq!(observable(fused.1), observable(plain.1));
}

#[test]
fn fusing_computes_is_transparent() {
    let (fr, pr) = (Recorder::new(), Recorder::new());
    let fused = add_one(&fr, "a")
        .then(add_one(&fr, "b"))
        .then(opaque(fr.consume("out")));
    let plain = Chain::new(opaque(add_one(&pr, "a")))
        .then(opaque(add_one(&pr, "b")))
        .then(opaque(pr.consume("out")));
    compare((&fused, &fr), (&plain, &pr), 5);
}

#[test]
fn fusing_consumes_is_transparent() {
    let (fr, pr) = (Recorder::new(), Recorder::new());
    let fused = Chain::new(opaque(add_one(&fr, "a")))
        .then(fr.consume("x"))
        .then(fr.consume("y"))
        .then(fr.consume("z"));
    let plain = Chain::new(opaque(add_one(&pr, "a")))
        .then(opaque(pr.consume("x")))
        .then(opaque(pr.consume("y")))
        .then(opaque(pr.consume("z")));
    compare((&fused, &fr), (&plain, &pr), 1);
}

#[test]
fn fusing_compute_into_consume_is_transparent() {
    let (fr, pr) = (Recorder::new(), Recorder::new());
    let fused = add_one(&fr, "a")
        .then(fr.consume("out"))
        .then(add_one(&fr, "b"))
        .then(fr.consume("end"));
    let plain = Chain::new(opaque(add_one(&pr, "a")))
        .then(opaque(pr.consume("out")))
        .then(opaque(add_one(&pr, "b")))
        .then(opaque(pr.consume("end")));
    compare((&fused, &fr), (&plain, &pr), 2);
}

#[test]
fn consume_failure_inside_fused_consumes_skips_the_rest() {
    let (fr, pr) = (Recorder::new(), Recorder::new());
    let failing = |rec: &Recorder| {
        let rec = rec.clone();
        role::consume(move |value: &i32| {
            rec.record("broken", Phase::Consuming, format!("{value:?}"));
            Err(UnitError::msg("consume failed"))
        })
    };
    let fused = Chain::new(opaque(add_one(&fr, "a")))
        .then(fr.consume("x"))
        .then(failing(&fr))
        .then(fr.consume("never"))
        .then(opaque(fr.on_error("sink")));
    let plain = Chain::new(opaque(add_one(&pr, "a")))
        .then(opaque(pr.consume("x")))
        .then(opaque(failing(&pr)))
        .then(opaque(pr.consume("never")))
        .then(opaque(pr.on_error("sink")));
    compare((&fused, &fr), (&plain, &pr), 0);
    let labels: Vec<String> = observable(&fr).into_iter().map(|e| e.0).collect();
    assert_eq!(labels, vec!["x", "broken", "sink"]);
}

#[test]
fn fused_error_handlers_deliver_the_same_error_once() {
    let (fr, pr) = (Recorder::new(), Recorder::new());
    let failing = |rec: &Recorder| rec.compute("k", |_: i32| Err::<i32, _>(UnitError::msg("bad")));
    let fused = Chain::new(opaque(failing(&fr)))
        .then(fr.on_error("first"))
        .then(fr.on_error("last"));
    let plain = Chain::new(opaque(failing(&pr)))
        .then(opaque(pr.on_error("first")))
        .then(opaque(pr.on_error("last")));
    assert_eq!(fused.len(), 2);
    assert_eq!(plain.len(), 3);

    run(&fused, 0);
    run(&plain, 0);

    // One handler call, same error, same context, either way. The fused
    // node keeps the later handler; unfused, the first one swallows it.
    let strip = |events: Vec<(String, Phase, String, bool)>| {
        events
            .into_iter()
            .map(|(_, phase, value, fg)| (phase, value, fg))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(observable(&fr)), strip(observable(&pr)));
    assert_eq!(fr.of(Phase::ErrorHandling), vec![("last".to_string(), "bad".to_string())]);
    assert_eq!(pr.of(Phase::ErrorHandling), vec![("first".to_string(), "bad".to_string())]);
}
