use crate::devices::{self, DeviceProfile};
use crate::error::JobError;
use crate::suites::{self, TestProfile};
use std::collections::HashMap;
use std::sync::LazyLock;

static DEVICE_REGISTRY: LazyLock<HashMap<&'static str, &'static DeviceProfile>> =
    LazyLock::new(|| devices::catalog().map(|profile| (profile.name, profile)).collect());

static TEST_REGISTRY: LazyLock<HashMap<&'static str, &'static TestProfile>> =
    LazyLock::new(|| suites::catalog().map(|profile| (profile.name, profile)).collect());

pub fn select_device(name: &str) -> Result<&'static DeviceProfile, JobError> {
    match DEVICE_REGISTRY.get(name) {
        Some(profile) if profile.is_abstract => Err(JobError::invalid(format!("Device '{}' is a device family and cannot be selected", name))),
        Some(profile) => Ok(*profile),
        None => Err(JobError::invalid(format!("Unknown device '{}'", name))),
    }
}

pub fn select_test(name: &str) -> Result<&'static TestProfile, JobError> {
    match TEST_REGISTRY.get(name) {
        Some(profile) if profile.is_abstract => Err(JobError::invalid(format!("Test '{}' is a test family and cannot be selected", name))),
        Some(profile) => Ok(*profile),
        None => Err(JobError::invalid(format!("Unknown test '{}'", name))),
    }
}

/// Selectable device names, sorted.
pub fn devices() -> Vec<&'static str> {
    let mut names: Vec<_> = DEVICE_REGISTRY.values().filter(|p| !p.is_abstract).map(|p| p.name).collect();
    names.sort();
    names
}

/// Selectable test names, sorted.
pub fn tests() -> Vec<&'static str> {
    let mut names: Vec<_> = TEST_REGISTRY.values().filter(|p| !p.is_abstract).map(|p| p.name).collect();
    names.sort();
    names
}
