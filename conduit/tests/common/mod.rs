#![allow(dead_code)]

use conduit::{
    ActionClass, Arguments, BoxError, Dispatcher, EngineConfig, MethodDecl, Outcome, OutcomeDecl,
    Scope, ValueKind,
    pipeline::InterceptorStack,
};
use conduit::{BeanSpec, Binding};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Handlers
// ============================================================================

/// A profile editor that counts how often it is constructed and called.
pub struct Profile {
    pub calls: Arc<AtomicUsize>,
}

impl Profile {
    fn save(&mut self, args: &mut Arguments) -> Result<Outcome, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name: String = args.value(0)?;
        let age: Option<f64> = args.optional(1)?;
        args.put(2, &format!("{name} ({})", age.unwrap_or_default()))?;
        Ok(Outcome::success())
    }

    fn view(&mut self, args: &mut Arguments) -> Result<Outcome, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name: Option<String> = args.optional(0)?;
        Ok(if name.is_some() {
            Outcome::success()
        } else {
            Outcome::new("empty")
        })
    }
}

pub fn profile_class(calls: Arc<AtomicUsize>) -> ActionClass<Profile> {
    ActionClass::new("Profile")
        .constructor(move || Profile {
            calls: Arc::clone(&calls),
        })
        .method(
            MethodDecl::new("save", Profile::save)
                .param(
                    Binding::input("name")
                        .string()
                        .required()
                        .from([Scope::Submission, Scope::SessionPrivate]),
                )
                .param(Binding::input("age").number().range(0.0, 150.0))
                .param(Binding::output("display").to(Scope::Request))
                .outcome(OutcomeDecl::new("success").renderer("redirect").data("/profile")),
        )
        .method(
            MethodDecl::new("view", Profile::view)
                .idempotent()
                .cacheable()
                .param(Binding::input("name").string())
                .outcome(OutcomeDecl::new("success"))
                .outcome(OutcomeDecl::new("empty")),
        )
}

/// A report generator with a state-changing export.
pub struct Report {
    pub calls: Arc<AtomicUsize>,
}

pub fn report_class(calls: Arc<AtomicUsize>) -> ActionClass<Report> {
    ActionClass::new("Report")
        .constructor(move || Report {
            calls: Arc::clone(&calls),
        })
        .method(
            MethodDecl::new("export", |report: &mut Report, _: &mut Arguments| {
                report.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::success())
            })
            .stack("audited")
            .param(Binding::input("format").string().required())
            .outcome(OutcomeDecl::new("success")),
        )
}

/// Holds a counter in the shared session scope and reads it back.
#[derive(Default)]
pub struct Counter;

pub fn counter_class() -> ActionClass<Counter> {
    ActionClass::new("Counter")
        .constructor(Counter::default)
        .method(
            MethodDecl::new("store", |_: &mut Counter, args: &mut Arguments| {
                let amount: i64 = args.value(0)?;
                args.put(1, &amount)?;
                Ok(Outcome::success())
            })
            .param(Binding::input("amount").integer().required())
            .param(Binding::output("total").to(Scope::SessionShared))
            .outcome(OutcomeDecl::new("success")),
        )
        .method(
            MethodDecl::new("load", |_: &mut Counter, args: &mut Arguments| {
                let total: i64 = args.value(0)?;
                args.put(1, &total)?;
                Ok(Outcome::success())
            })
            .idempotent()
            .param(
                Binding::input("total")
                    .integer()
                    .required()
                    .from([Scope::SessionShared, Scope::Submission]),
            )
            .param(Binding::output("seen").to(Scope::Request))
            .outcome(OutcomeDecl::new("success")),
        )
        .method(
            MethodDecl::new("remember", |_: &mut Counter, args: &mut Arguments| {
                let user = args.get(0).cloned().unwrap_or_default();
                args.set(1, user)?;
                Ok(Outcome::success())
            })
            .param(Binding::input("user").bean(user_bean()).from([Scope::Submission]))
            .param(Binding::output("saved").bean(user_bean()).to(Scope::SessionPrivate))
            .outcome(OutcomeDecl::new("success")),
        )
        .method(
            MethodDecl::new("recall", |_: &mut Counter, args: &mut Arguments| {
                if let Some(user) = args.take(0) {
                    args.set(1, user)?;
                }
                Ok(Outcome::success())
            })
            .idempotent()
            .param(Binding::input("user").bean(user_bean()).from([Scope::SessionPrivate]))
            .param(Binding::output("recalled").to(Scope::Request))
            .outcome(OutcomeDecl::new("success")),
        )
}

pub fn user_bean() -> BeanSpec {
    BeanSpec::new("user:").field("age", ValueKind::Integer)
}

// ============================================================================
// Engines
// ============================================================================

pub struct Fixture {
    pub dispatcher: Dispatcher,
    pub profile_calls: Arc<AtomicUsize>,
    pub report_calls: Arc<AtomicUsize>,
}

pub fn fixture() -> Fixture {
    fixture_with(EngineConfig::default(), InterceptorStack::new("audited"))
}

pub fn fixture_with(config: EngineConfig, audited: InterceptorStack) -> Fixture {
    let profile_calls = Arc::new(AtomicUsize::new(0));
    let report_calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::builder()
        .with_config(config)
        .class(profile_class(Arc::clone(&profile_calls)))
        .class(report_class(Arc::clone(&report_calls)))
        .class(counter_class())
        .stack(audited)
        .build()
        .expect("fixture dispatcher builds");
    Fixture {
        dispatcher,
        profile_calls,
        report_calls,
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
