use crate::context::Context;
use crate::error::JobError;
use crate::request::Parameters;
use crate::templates;
use glob::Pattern;
use serde_json::{Value, json};
use tracing::{instrument, warn};

mod definitions;
mod kselftest;
mod ltp;

/// Every test profile, abstract family markers included.
pub fn catalog() -> impl Iterator<Item = &'static TestProfile> {
    ltp::TESTS
        .iter()
        .chain(kselftest::TESTS)
        .chain(rt_tests::TESTS)
        .chain(definitions::TESTS)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestKind {
    Ltp {
        suite: &'static str,
    },
    Kselftest {
        suite: &'static str,
    },
    RtTests {
        subtest: &'static str,
        duration: &'static str,
        iterations: u32,
        bgcmd: &'static str,
    },
    HackingSession,
    Definition {
        path: &'static str,
    },
}

impl TestKind {
    fn template(&self) -> &'static str {
        match self {
            TestKind::Ltp { .. } => "tests/ltp.yaml.jinja2",
            TestKind::Kselftest { .. } => "tests/kselftest.yaml.jinja2",
            TestKind::RtTests { .. } => "tests/rt-tests.yaml.jinja2",
            TestKind::HackingSession => "tests/hacking-session.yaml.jinja2",
            TestKind::Definition { .. } => "tests/definition.yaml.jinja2",
        }
    }
}

#[derive(Debug)]
pub struct TestProfile {
    pub name: &'static str,
    pub is_abstract: bool,
    /// Glob patterns of the device names the test runs on.
    pub devices: &'static [&'static str],
    /// Minutes.
    pub timeout: u32,
    pub need_test_definition: bool,
    pub kind: TestKind,
}

/// One requested test with its effective timeout.
#[derive(Debug, Clone)]
pub struct Test {
    profile: &'static TestProfile,
    timeout: u32,
}

impl Test {
    pub fn new(profile: &'static TestProfile, timeout: Option<u32>) -> Self {
        Test {
            profile,
            timeout: timeout.unwrap_or(profile.timeout),
        }
    }

    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    pub fn need_test_definition(&self) -> bool {
        self.profile.need_test_definition
    }

    pub fn is_hacking_session(&self) -> bool {
        self.profile.kind == TestKind::HackingSession
    }

    pub fn supports(&self, device: &str) -> bool {
        self.profile.devices.iter().any(|pattern| match Pattern::new(pattern) {
            Ok(pattern) => pattern.matches(device),
            Err(e) => {
                warn!("⚠️ Ignoring invalid device pattern '{}' of '{}': {}", pattern, self.name(), e);
                false
            }
        })
    }

    #[instrument(skip(self, parameters), fields(test = self.name()))]
    pub fn validate(&self, device: &str, parameters: &Parameters) -> Result<(), JobError> {
        if !self.supports(device) {
            return Err(JobError::invalid(format!("Test '{}' is not supported on device '{}'", self.name(), device)));
        }

        match &self.profile.kind {
            TestKind::HackingSession => require(parameters, "PUB_KEY"),
            TestKind::Kselftest { .. } => require(parameters, "KSELFTEST"),
            TestKind::RtTests { .. } => rt_tests::validate(parameters),
            TestKind::Ltp { .. } | TestKind::Definition { .. } => Ok(()),
        }
    }

    /// Renders the test sub-document from the shared job values in `context`.
    #[instrument(skip_all, fields(test = self.name()))]
    pub fn render(&self, context: &Context) -> Result<String, JobError> {
        let mut context = context.clone();
        if !context.get("parameters").is_some_and(Value::is_object) {
            context.store("parameters", json!({}));
        }
        context.store("name", json!(self.name()));
        context.store("timeout", json!(self.timeout));

        match &self.profile.kind {
            TestKind::Ltp { suite } | TestKind::Kselftest { suite } => {
                context.store("suite", json!(suite));
            }
            TestKind::RtTests {
                subtest,
                duration,
                iterations,
                bgcmd,
            } => rt_tests::store(&mut context, subtest, duration, *iterations, bgcmd),
            TestKind::Definition { path } => {
                context.store("path", json!(path));
            }
            TestKind::HackingSession => {}
        }

        Ok(templates::render(self.profile.kind.template(), &context)?)
    }
}

fn require(parameters: &Parameters, key: &str) -> Result<(), JobError> {
    match parameters.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Ok(()),
        Some(value) if !value.is_null() && !value.is_string() => Ok(()),
        _ => Err(JobError::invalid(format!("argument missing --parameters {}='...'", key))),
    }
}
