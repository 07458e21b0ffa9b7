use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type Parameters = BTreeMap<String, Value>;

/// A remote archive and the directory it is extracted to on the target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Artefact {
    pub url: String,
    #[serde(default = "Artefact::default_path")]
    pub path: String,
}

impl Artefact {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Artefact { url: url.into(), path: path.into() }
    }

    fn default_path() -> String {
        "/".to_string()
    }
}

/// Everything the caller asked for. The compiler never parses strings into these fields, it only validates them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Request {
    pub device: String,
    pub bios: Option<String>,
    pub boot: Option<String>,
    pub boot_args: Option<String>,
    pub commands: Vec<String>,
    pub deploy_os: Option<String>,
    pub device_dict: Option<PathBuf>,
    pub dtb: Option<String>,
    pub enable_kvm: bool,
    pub enable_network: bool,
    pub kernel: Option<String>,
    pub modules: Option<Artefact>,
    pub overlays: Vec<Artefact>,
    pub parameters: Parameters,
    pub prompt: Option<String>,
    pub qemu_image: Option<String>,
    pub ramdisk: Option<String>,
    pub rootfs: Option<String>,
    pub rootfs_partition: Option<u32>,
    pub secrets: BTreeMap<String, String>,
    pub shared: bool,
    pub ssh_host: Option<String>,
    pub ssh_identity_file: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_prompt: Option<String>,
    pub ssh_user: Option<String>,
    pub tests: Vec<String>,
    pub timeouts: BTreeMap<String, u32>,
    /// Local tuxmake build directory filling the kernel, modules and device.
    pub tuxmake: Option<PathBuf>,
    pub visibility: Option<String>,
}

impl Request {
    pub fn new(device: impl Into<String>) -> Self {
        Request {
            device: device.into(),
            ..Request::default()
        }
    }

    /// Names of the option fields carrying a value. The device, tests, timeouts and tuxmake build are structural and
    /// never listed.
    pub fn supplied_options(&self) -> Vec<&'static str> {
        let options = [
            ("bios", is_set(&self.bios)),
            ("boot", is_set(&self.boot)),
            ("boot_args", is_set(&self.boot_args)),
            ("commands", !self.commands.is_empty()),
            ("deploy_os", is_set(&self.deploy_os)),
            ("device_dict", self.device_dict.is_some()),
            ("dtb", is_set(&self.dtb)),
            ("enable_kvm", self.enable_kvm),
            ("enable_network", self.enable_network),
            ("kernel", is_set(&self.kernel)),
            ("modules", self.modules.is_some()),
            ("overlays", !self.overlays.is_empty()),
            ("parameters", !self.parameters.is_empty()),
            ("prompt", is_set(&self.prompt)),
            ("qemu_image", is_set(&self.qemu_image)),
            ("ramdisk", is_set(&self.ramdisk)),
            ("rootfs", is_set(&self.rootfs)),
            ("rootfs_partition", self.rootfs_partition.is_some_and(|p| p != 0)),
            ("secrets", !self.secrets.is_empty()),
            ("shared", self.shared),
            ("ssh_host", is_set(&self.ssh_host)),
            ("ssh_identity_file", is_set(&self.ssh_identity_file)),
            ("ssh_port", self.ssh_port.is_some_and(|p| p != 0)),
            ("ssh_prompt", is_set(&self.ssh_prompt)),
            ("ssh_user", is_set(&self.ssh_user)),
            ("visibility", is_set(&self.visibility)),
        ];

        options.into_iter().filter(|(_, supplied)| *supplied).map(|(name, _)| name).collect()
    }

    /// A parameter value, when it was given as a string.
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}
