use crate::context::Context;
use crate::device_dict::{self, DeviceDictConfig};
use crate::devices::Device;
use crate::error::JobError;
use crate::registry::{select_device, select_test};
use crate::request::Request;
use crate::suites::Test;
use crate::tuxmake::TuxMakeBuild;
use crate::utils::{normalize_args, quote_commands};
use serde_json::{Value, json};
use std::fmt;
use tracing::{debug, info, instrument};

pub const TEST_DEFINITIONS: &str = "https://storage.tuxboot.com/test-definitions/2024.06.tar.zst";
pub const DEFAULT_VISIBILITY: &str = "public";
pub const DEFAULT_PRIORITY: u32 = 50;

/// Compiles one request into a LAVA job definition and, on demand, a device dictionary.
#[derive(Debug)]
pub struct Job {
    request: Request,
    test_definitions: String,
    default_visibility: String,
    device: Option<Device>,
    tests: Vec<Test>,
    device_dict: Option<DeviceDictConfig>,
}

impl Job {
    pub fn new(request: Request) -> Self {
        Job {
            request,
            test_definitions: TEST_DEFINITIONS.to_string(),
            default_visibility: DEFAULT_VISIBILITY.to_string(),
            device: None,
            tests: Vec::new(),
            device_dict: None,
        }
    }

    pub fn with_test_definitions(mut self, url: impl Into<String>) -> Self {
        self.test_definitions = url.into();
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.default_visibility = visibility.into();
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn device_dict_config(&self) -> Option<&DeviceDictConfig> {
        self.device_dict.as_ref()
    }

    /// Resolves the device and tests from the catalog and loads the device dict. Calling it again is a no-op.
    #[instrument(skip(self), fields(device = %self.request.device))]
    pub fn initialize(&mut self) -> Result<(), JobError> {
        if self.device.is_some() {
            return Ok(());
        }

        if let Some(directory) = &self.request.tuxmake {
            let build = TuxMakeBuild::load(directory)?;
            build.apply(&mut self.request);
        }
        if self.request.device.is_empty() {
            return Err(JobError::invalid("argument --device is required"));
        }

        let device = Device::new(select_device(&self.request.device)?);
        let tests = self
            .request
            .tests
            .iter()
            .map(|name| -> Result<Test, JobError> { Ok(Test::new(select_test(name)?, self.request.timeouts.get(name).copied())) })
            .collect::<Result<Vec<_>, _>>()?;
        let device_dict = self.request.device_dict.as_deref().map(device_dict::load).transpose()?;

        info!("🧩 Resolved {} with {} test(s)", device.name(), tests.len());
        self.device = Some(device);
        self.tests = tests;
        self.device_dict = device_dict;
        Ok(())
    }

    /// Renders the job definition.
    #[instrument(skip(self), fields(device = %self.request.device))]
    pub fn render(&mut self) -> Result<String, JobError> {
        self.prepare()?;
        let device = self.resolved_device()?;
        let context = self.context(device)?;
        let definition = device.definition(context, &self.request.parameters, &self.tests, self.device_dict.as_ref())?;

        info!("📝 Rendered {}", self);
        Ok(definition)
    }

    /// Renders the device dictionary for the requested device.
    #[instrument(skip(self), fields(device = %self.request.device))]
    pub fn render_device_dict(&mut self) -> Result<String, JobError> {
        self.prepare()?;
        let device = self.resolved_device()?;
        let context = Context::from([("arch", json!(device.profile().arch))]);
        let device_dict = device.device_dict(context, self.device_dict.as_ref())?;

        info!("📝 Rendered device dictionary for {}", device.name());
        Ok(device_dict)
    }

    fn prepare(&mut self) -> Result<(), JobError> {
        self.initialize()?;
        let Job { request, device, tests, .. } = self;
        let device = device.as_mut().ok_or_else(|| JobError::invalid(format!("Unknown device '{}'", request.device)))?;
        device.apply_defaults(request);
        device.validate(request, tests)
    }

    fn resolved_device(&self) -> Result<&Device, JobError> {
        self.device
            .as_ref()
            .ok_or_else(|| JobError::invalid(format!("Unknown device '{}'", self.request.device)))
    }

    /// Job-wide values shared by every family. The device adds its own before rendering.
    fn context(&self, device: &Device) -> Result<Context, JobError> {
        let request = &self.request;
        let physical = device.profile().family.is_physical();

        let mut overlays = Vec::new();
        let mut modules = Value::Null;
        if let Some(artefact) = &request.modules {
            if physical {
                modules = json!({"url": artefact.url, "path": artefact.path});
            } else {
                overlays.push(json!({"name": "modules", "url": artefact.url, "path": artefact.path}));
            }
        }
        for (index, overlay) in request.overlays.iter().enumerate() {
            overlays.push(json!({"name": format!("overlay-{:02}", index), "url": overlay.url, "path": overlay.path}));
        }

        let test_definitions = if self.tests.iter().any(Test::need_test_definition) {
            json!(self.test_definitions)
        } else {
            Value::Null
        };
        let tux_boot_args = match request.boot_args.as_deref() {
            Some(args) if !args.is_empty() => json!(normalize_args("boot-args", args)?),
            _ => Value::Null,
        };
        let enable_network = request.enable_network || self.tests.iter().any(Test::is_hacking_session);
        let test_names: Vec<&str> = self.tests.iter().map(Test::name).collect();
        let tests_timeout: u32 = self.tests.iter().map(Test::timeout).sum();

        debug!(tests_timeout, overlays = overlays.len(), "Assembled job context");

        Ok(Context::from([
            ("device", json!(device.name())),
            ("tests", json!(test_names)),
            ("tests_timeout", json!(tests_timeout)),
            ("test_definitions", test_definitions),
            ("commands", json!(quote_commands(&request.commands)?)),
            ("tux_boot_args", tux_boot_args),
            ("tux_prompt", json!(request.prompt)),
            ("ssh_prompt", json!(request.ssh_prompt)),
            ("enable_kvm", json!(request.enable_kvm)),
            ("enable_network", json!(enable_network)),
            ("shared", json!(request.shared)),
            ("kernel", json!(request.kernel)),
            ("rootfs", json!(request.rootfs)),
            ("dtb", json!(request.dtb)),
            ("bios", json!(request.bios)),
            ("ramdisk", json!(request.ramdisk)),
            ("boot", json!(request.boot)),
            ("qemu_image", json!(request.qemu_image)),
            ("rootfs_partition", json!(request.rootfs_partition)),
            ("modules", modules),
            ("overlays", Value::Array(overlays)),
            ("parameters", json!(request.parameters)),
            ("secrets", json!(request.secrets)),
            ("visibility", json!(request.visibility.as_deref().unwrap_or(&self.default_visibility))),
            ("deploy_os", json!(request.deploy_os)),
            ("lava_job_priority", json!(DEFAULT_PRIORITY)),
            ("boot_timeout", json!(request.timeouts.get("boot"))),
        ]))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tests = if self.request.tests.is_empty() {
            "boot".to_string()
        } else {
            self.request.tests.join("_")
        };
        write!(f, "Job {}/{}", self.request.device, tests)
    }
}
