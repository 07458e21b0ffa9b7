use crate::context::Context;
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

mod loader;
mod parser;

pub use loader::load;

/// Names a device dict file may assign. Anything else is rejected so that every value reaches a template.
pub static DEVICE_DICT_VARS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "adb_serial_number",
        "boot_method",
        "booti_dtb_addr",
        "booti_kernel_addr",
        "booti_ramdisk_addr",
        "bootloader_prompt",
        "connection_command",
        "console_device",
        "docker_shell_extra_arguments",
        "extra_kernel_args",
        "fastboot_options",
        "fastboot_serial_number",
        "hard_reset_command",
        "power_off_command",
        "power_on_command",
        "pre_os_command",
        "pre_power_command",
        "soft_reboot_command",
        "usb_product_id",
        "usb_vendor_id",
    ])
});

/// Variables assigned by a device dict file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceDictConfig {
    values: Context,
}

impl DeviceDictConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get_str(key)
    }

    /// Assigned names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().collect();
        names.sort();
        names
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.get(key).is_some()
    }

    pub fn as_context(&self) -> &Context {
        &self.values
    }
}

impl<const N: usize> From<[(&str, Value); N]> for DeviceDictConfig {
    fn from(entries: [(&str, Value); N]) -> Self {
        DeviceDictConfig { values: Context::from(entries) }
    }
}

impl FromIterator<(String, Value)> for DeviceDictConfig {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut values = Context::new();
        for (key, value) in iter {
            values.store(&key, value);
        }
        DeviceDictConfig { values }
    }
}

#[derive(Error, Debug)]
pub enum DeviceDictError {
    #[error("Device dict file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Unable to read device dict file {}: {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("Invalid device dict file {}: line {line}: {reason}", path.display())]
    Syntax { path: PathBuf, line: usize, reason: String },
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}
