use crate::context::Context;
use crate::device_dict::DeviceDictConfig;
use crate::error::JobError;
use crate::request::{Parameters, Request};
use crate::suites::Test;
use crate::templates;
use crate::utils::{compression, human_list, slugify};
use serde_json::{Value, json};
use tracing::{debug, instrument};

mod fastboot;
mod nfs;
mod qemu;
mod ssh;

pub const DEFAULT_STORAGE_DEVICE: &str = "$(lava-target-storage SATA || lava-target-storage USB)";
const DEFAULT_CONNECTION_COMMAND: &str = "telnet localhost 2000";
/// Parameters replacing the timeout fields the job header adds up.
const TIMEOUT_PARAMETERS: &[&str] = &["boot_timeout", "tests_timeout"];

/// Every device profile, abstract family markers included.
pub fn catalog() -> impl Iterator<Item = &'static DeviceProfile> {
    qemu::DEVICES
        .iter()
        .chain(fastboot::DEVICES)
        .chain(fastboot::AOSP_DEVICES)
        .chain(nfs::DEVICES)
        .chain(nfs::BOOTLOADER_DEVICES)
        .chain(ssh::DEVICES)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextValue {
    Str(&'static str),
    Int(i64),
}

impl ContextValue {
    pub fn to_value(self) -> Value {
        match self {
            ContextValue::Str(value) => json!(value),
            ContextValue::Int(value) => json!(value),
        }
    }
}

/// Optional request arguments a profile is able to consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Supports {
    pub dtb: bool,
    pub bios: bool,
    pub ramdisk: bool,
    pub kvm: bool,
}

impl Supports {
    pub const NONE: Supports = Supports {
        dtb: false,
        bios: false,
        ramdisk: false,
        kvm: false,
    };
}

/// Whether the job formats a scratch partition before running tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoragePrep {
    pub needed: bool,
    pub device: &'static str,
}

impl StoragePrep {
    pub const NONE: StoragePrep = StoragePrep {
        needed: false,
        device: DEFAULT_STORAGE_DEVICE,
    };

    pub const fn on(device: &'static str) -> Self {
        StoragePrep { needed: true, device }
    }
}

#[derive(Debug)]
pub struct QemuSpec {
    pub qemu_arch: &'static str,
    pub machine: &'static str,
    pub cpu: &'static str,
    pub memory: &'static str,
    pub console: &'static str,
    pub rootfs_dev: &'static str,
    pub rootfs_bus: &'static str,
    pub extra_options: &'static [&'static str],
}

#[derive(Debug)]
pub struct FastbootSpec {
    pub template: &'static str,
    pub downloads_image_name: &'static str,
    pub fastboot_image_name: &'static str,
    pub needs_partition_flash: bool,
    pub needs_boot_img: bool,
    pub needs_boot_img_reboot: bool,
    pub needs_vendor_boot: bool,
    pub boot_docker_local: bool,
    pub reboot_to_fastboot: Option<&'static str>,
    pub pre_boot_commands: &'static [&'static str],
    pub post_boot_commands: &'static [&'static str],
    pub boot_commands: &'static [&'static str],
    pub erase_commands: &'static [&'static str],
    pub extra_prompts: &'static [&'static str],
    pub storage: StoragePrep,
}

#[derive(Debug)]
pub struct AospSpec {
    pub ptable: &'static str,
    pub required_parameters: &'static [&'static str],
}

#[derive(Debug)]
pub struct NfsSpec {
    pub storage: StoragePrep,
    pub device_kernel_args: &'static str,
}

#[derive(Debug)]
pub struct SshSpec {
    pub port: u16,
}

#[derive(Debug)]
pub enum Family {
    Qemu(QemuSpec),
    Fastboot(FastbootSpec),
    FastbootAosp(AospSpec),
    Nfs(NfsSpec),
    NfsBootloader(NfsSpec),
    Ssh(SshSpec),
}

const QEMU_OPTIONS: &[&str] = &[
    "bios",
    "boot_args",
    "commands",
    "deploy_os",
    "dtb",
    "enable_kvm",
    "enable_network",
    "kernel",
    "modules",
    "overlays",
    "parameters",
    "prompt",
    "qemu_image",
    "rootfs",
    "rootfs_partition",
    "secrets",
    "shared",
    "visibility",
];

const FASTBOOT_OPTIONS: &[&str] = &[
    "bios",
    "boot",
    "boot_args",
    "commands",
    "deploy_os",
    "device_dict",
    "dtb",
    "enable_network",
    "kernel",
    "modules",
    "overlays",
    "parameters",
    "prompt",
    "ramdisk",
    "rootfs",
    "secrets",
    "visibility",
];

const AOSP_OPTIONS: &[&str] = &["boot_args", "commands", "overlays", "parameters", "prompt", "secrets", "visibility"];

const NFS_OPTIONS: &[&str] = &[
    "bios",
    "boot_args",
    "commands",
    "deploy_os",
    "device_dict",
    "dtb",
    "enable_network",
    "kernel",
    "modules",
    "overlays",
    "parameters",
    "prompt",
    "rootfs",
    "secrets",
    "visibility",
];

const SSH_OPTIONS: &[&str] = &[
    "commands",
    "deploy_os",
    "overlays",
    "parameters",
    "secrets",
    "ssh_host",
    "ssh_identity_file",
    "ssh_port",
    "ssh_prompt",
    "ssh_user",
];

impl Family {
    /// How validation errors refer to the family.
    pub fn label(&self) -> &'static str {
        match self {
            Family::Qemu(_) => "qemu devices",
            Family::Fastboot(_) => "fastboot devices",
            Family::FastbootAosp(_) => "fastboot aosp devices",
            Family::Nfs(_) => "nfs devices",
            Family::NfsBootloader(_) => "nfs-bootloader devices",
            Family::Ssh(_) => "ssh device",
        }
    }

    pub fn accepted_options(&self) -> &'static [&'static str] {
        match self {
            Family::Qemu(_) => QEMU_OPTIONS,
            Family::Fastboot(_) => FASTBOOT_OPTIONS,
            Family::FastbootAosp(_) => AOSP_OPTIONS,
            Family::Nfs(_) | Family::NfsBootloader(_) => NFS_OPTIONS,
            Family::Ssh(_) => SSH_OPTIONS,
        }
    }

    /// Physical boards receive kernel modules as their own deploy image instead of a rootfs overlay.
    pub fn is_physical(&self) -> bool {
        !matches!(self, Family::Qemu(_))
    }

    fn boot_timeout(&self) -> u32 {
        match self {
            Family::Qemu(_) => 15,
            Family::Fastboot(_) | Family::Nfs(_) | Family::NfsBootloader(_) => 20,
            Family::FastbootAosp(_) => 30,
            Family::Ssh(_) => 5,
        }
    }

    fn deploy_os(&self) -> &'static str {
        match self {
            Family::Qemu(_) | Family::Ssh(_) => "oe",
            Family::Fastboot(_) | Family::FastbootAosp(_) | Family::Nfs(_) | Family::NfsBootloader(_) => "debian",
        }
    }

    fn same_family(&self, other: &Family) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Immutable catalog record describing one target or one abstract family.
#[derive(Debug)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub is_abstract: bool,
    pub device_type: &'static str,
    pub arch: &'static str,
    pub lava_arch: &'static str,
    pub boot_method: &'static str,
    pub kernel: Option<&'static str>,
    pub rootfs: Option<&'static str>,
    pub dtb: Option<&'static str>,
    pub bios: Option<&'static str>,
    pub ramdisk: Option<&'static str>,
    pub boot: Option<&'static str>,
    pub extra_boot_args: &'static str,
    pub redirect_to_kmsg: bool,
    pub supports: Supports,
    pub context_overrides: &'static [(&'static str, ContextValue)],
    pub family: Family,
}

impl DeviceProfile {
    pub fn mkimage_arch(&self) -> &'static str {
        match self.arch {
            "armv5" | "armv7" => "arm",
            "i386" => "x86",
            "ppc64le" => "powerpc",
            "riscv64" => "riscv",
            arch => arch,
        }
    }

    pub fn kernel_type(&self) -> &'static str {
        match self.arch {
            "i386" | "x86_64" => "bzimage",
            "armv5" | "armv7" => "zimage",
            "ppc64le" => "vmlinux",
            _ => "image",
        }
    }
}

/// Where an ssh device is reached, captured while validating the request.
#[derive(Debug, Clone, PartialEq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: String,
}

/// A device profile bound to one compile.
#[derive(Debug)]
pub struct Device {
    profile: &'static DeviceProfile,
    ssh: Option<SshTarget>,
}

impl Device {
    pub fn new(profile: &'static DeviceProfile) -> Self {
        Device { profile, ssh: None }
    }

    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn device_type(&self) -> &'static str {
        self.profile.device_type
    }

    pub fn ssh_target(&self) -> Option<&SshTarget> {
        self.ssh.as_ref()
    }

    /// Fills unset request fields from the profile, caller values always win.
    #[instrument(skip_all, fields(device = self.name()))]
    pub fn apply_defaults(&self, request: &mut Request) {
        let profile = self.profile;
        fill(&mut request.kernel, profile.kernel);
        fill(&mut request.rootfs, profile.rootfs);
        match &profile.family {
            Family::Qemu(_) => fill(&mut request.dtb, profile.dtb),
            Family::Fastboot(_) => fill(&mut request.boot, profile.boot),
            Family::Ssh(spec) => {
                request.ssh_port.get_or_insert(spec.port);
            }
            Family::FastbootAosp(_) | Family::Nfs(_) | Family::NfsBootloader(_) => {}
        }
    }

    #[instrument(skip_all, fields(device = self.name()))]
    pub fn validate(&mut self, request: &Request, tests: &[Test]) -> Result<(), JobError> {
        let profile = self.profile;
        let family = &profile.family;
        let supplied = request.supplied_options();

        let mut invalid: Vec<String> = supplied
            .iter()
            .filter(|option| !family.accepted_options().contains(*option))
            .map(|option| format!("--{}", option.replace('_', "-")))
            .collect();
        if !invalid.is_empty() {
            invalid.sort();
            return Err(JobError::invalid(format!("Invalid option(s) for {}: {}", family.label(), invalid.join(", "))));
        }

        check_quotes("boot-args", request.boot_args.as_deref())?;
        check_quotes("prompt", request.prompt.as_deref())?;

        self.check_capability(&supplied, "dtb", |s| s.dtb)?;
        self.check_capability(&supplied, "bios", |s| s.bios)?;
        self.check_capability(&supplied, "ramdisk", |s| s.ramdisk)?;
        self.check_capability(&supplied, "enable_kvm", |s| s.kvm)?;

        if let Some(modules) = &request.modules {
            if !matches!(compression(&modules.url), (Some("tar"), Some("gz" | "xz"))) {
                return Err(JobError::invalid("argument --modules should be a .tar.gz, .tar.xz or .tgz"));
            }
        }

        check_priority(&request.parameters)?;
        for key in TIMEOUT_PARAMETERS {
            timeout_parameter(&request.parameters, key)?;
        }

        match family {
            Family::Ssh(spec) => self.ssh = Some(ssh::target(request, spec)?),
            Family::FastbootAosp(spec) => {
                for parameter in spec.required_parameters {
                    if !request.parameters.contains_key(*parameter) {
                        return Err(JobError::invalid(format!("argument --parameters {} must be provided", parameter)));
                    }
                }
            }
            Family::Qemu(_) | Family::Fastboot(_) | Family::Nfs(_) | Family::NfsBootloader(_) => {}
        }

        for test in tests {
            test.validate(self.name(), &request.parameters)?;
        }

        debug!("Request is valid");
        Ok(())
    }

    fn check_capability(&self, supplied: &[&str], option: &str, capable: fn(&Supports) -> bool) -> Result<(), JobError> {
        if !supplied.contains(&option) || capable(&self.profile.supports) {
            return Ok(());
        }

        let mut names: Vec<&str> = catalog()
            .filter(|p| !p.is_abstract && p.family.same_family(&self.profile.family) && capable(&p.supports))
            .map(|p| p.name)
            .collect();
        names.sort();
        if names.is_empty() {
            return Err(JobError::invalid(format!(
                "argument --{} is not supported by {}",
                option.replace('_', "-"),
                self.profile.family.label()
            )));
        }

        let noun = if names.len() == 1 { "device" } else { "devices" };
        Err(JobError::invalid(format!(
            "argument --{} is only valid for {} {}",
            option.replace('_', "-"),
            human_list(&names),
            noun
        )))
    }

    /// Renders the job definition followed by every test in request order.
    ///
    /// The caller's free-form parameters are copied over the context right before rendering, so a parameter named
    /// like a built-in field replaces it.
    #[instrument(skip_all, fields(device = self.name()))]
    pub fn definition(
        &self,
        mut context: Context,
        parameters: &Parameters,
        tests: &[Test],
        config: Option<&DeviceDictConfig>,
    ) -> Result<String, JobError> {
        let profile = self.profile;

        context.store("device_type", json!(profile.device_type));
        context.store("arch", json!(profile.arch));
        context.store("lava_arch", json!(profile.lava_arch));
        context.store("redirect_to_kmsg", json!(profile.redirect_to_kmsg));
        context.store_default("kernel", json!(profile.kernel));
        context.store_default("rootfs", json!(profile.rootfs));
        context.store_default("dtb", json!(profile.dtb));
        context.store_default("bios", json!(profile.bios));
        context.store_default("ramdisk", json!(profile.ramdisk));
        context.store_default("boot", json!(profile.boot));
        context.store_default("deploy_os", json!(profile.family.deploy_os()));
        context.store_default("boot_timeout", json!(profile.family.boot_timeout()));

        let boot_method = config.and_then(|c| c.get_str("boot_method")).unwrap_or(profile.boot_method);
        context.store("boot_method", json!(boot_method));

        let boot_args = join_args(&[context.get_str("tux_boot_args").unwrap_or_default(), profile.extra_boot_args]);
        context.store("tux_boot_args", json!(boot_args));

        let prompt = match context.get_str("tux_prompt") {
            Some(prompt) if !prompt.is_empty() => json!([prompt]),
            _ => json!([]),
        };
        context.store("tux_prompt", prompt);

        let command_name = parameters.get("command-name").and_then(Value::as_str).unwrap_or("command");
        context.store("command_name", json!(slugify(command_name)));

        let template = match &profile.family {
            Family::Qemu(spec) => qemu::job_context(spec, &mut context),
            Family::Fastboot(spec) => fastboot::job_context(spec, &mut context, config),
            Family::FastbootAosp(spec) => fastboot::aosp_job_context(spec, &mut context),
            Family::Nfs(spec) | Family::NfsBootloader(spec) => nfs::job_context(profile, spec, &mut context, config),
            Family::Ssh(_) => ssh::job_context(&mut context),
        };

        context.overlay(parameters);
        for key in TIMEOUT_PARAMETERS {
            if let Some(minutes) = timeout_parameter(parameters, key)? {
                context.store(key, json!(minutes));
            }
        }

        let test_context = context.pick(&[
            "arch",
            "commands",
            "command_name",
            "device",
            "device_type",
            "overlays",
            "parameters",
            "redirect_to_kmsg",
            "ssh_prompt",
            "test_definitions",
        ]);

        debug!(template, "Rendering job definition");
        let mut definition = templates::render(template, &context)?;
        for test in tests {
            definition.push_str(&test.render(&test_context)?);
        }
        Ok(definition)
    }

    /// Renders the device dictionary.
    ///
    /// Values are layered in this order, later ones winning: `context`, the profile's context overrides, the
    /// family fallbacks for missing keys and finally every non-null value of `config`.
    #[instrument(skip_all, fields(device = self.name()))]
    pub fn device_dict(&self, mut context: Context, config: Option<&DeviceDictConfig>) -> Result<String, JobError> {
        let profile = self.profile;
        for (key, value) in profile.context_overrides {
            context.store(key, value.to_value());
        }
        context.store_default("arch", json!(profile.arch));
        context.store_default("lava_arch", json!(profile.lava_arch));

        let template = match (&profile.family, config) {
            (Family::Qemu(spec), _) => {
                qemu::device_dict_context(spec, &mut context);
                "devices/qemu.yaml.jinja2"
            }
            (Family::Ssh(_), _) => {
                let target = self
                    .ssh
                    .as_ref()
                    .ok_or_else(|| JobError::invalid("ssh device dictionary rendered before the request was validated"))?;
                ssh::device_dict_context(target, &mut context);
                "devices/ssh.yaml.jinja2"
            }
            (Family::Nfs(_) | Family::NfsBootloader(_), config) => {
                context.store_default("connection_command", json!(DEFAULT_CONNECTION_COMMAND));
                context.store_default("boot_method", json!(profile.boot_method));
                context.store_default("test_character_delay", json!(0));
                context.store_default("mkimage_arch", json!(profile.mkimage_arch()));
                context.store_default("kernel_type", json!(profile.kernel_type()));
                match config {
                    Some(_) => "devices/nfs-device-dict.yaml.jinja2",
                    None => "devices/nfs-standard.yaml.jinja2",
                }
            }
            (Family::Fastboot(_) | Family::FastbootAosp(_), config) => {
                context.store_default("connection_command", json!(DEFAULT_CONNECTION_COMMAND));
                context.store_default("boot_method", json!(profile.boot_method));
                match config {
                    Some(_) => "devices/fastboot-device-dict.yaml.jinja2",
                    None => "devices/fastboot-standard.yaml.jinja2",
                }
            }
        };

        if let Some(config) = config {
            context.merge(config.as_context());
        }

        debug!(template, "Rendering device dictionary");
        Ok(templates::render(template, &context)?)
    }
}

fn fill(field: &mut Option<String>, default: Option<&'static str>) {
    if field.is_none() {
        *field = default.map(str::to_string);
    }
}

fn check_quotes(argument: &str, value: Option<&str>) -> Result<(), JobError> {
    match value {
        Some(value) if value.contains('"') => Err(JobError::invalid(format!("argument --{} should not contain \"", argument))),
        _ => Ok(()),
    }
}

fn check_priority(parameters: &Parameters) -> Result<(), JobError> {
    let Some(value) = parameters.get("lava_job_priority") else {
        return Ok(());
    };

    let priority = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    match priority {
        Some(1..=100) => Ok(()),
        _ => Err(JobError::invalid("argument --parameters lava_job_priority must be a value between 1-100")),
    }
}

/// Minutes from a timeout parameter given as a number or a numeric string.
fn timeout_parameter(parameters: &Parameters, key: &str) -> Result<Option<u64>, JobError> {
    let Some(value) = parameters.get(key) else {
        return Ok(None);
    };

    let minutes = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    minutes
        .map(Some)
        .ok_or_else(|| JobError::invalid(format!("argument --parameters {} must be a number of minutes", key)))
}

/// Joins the non-empty argument strings with single spaces.
fn join_args(args: &[&str]) -> String {
    args.iter().map(|arg| arg.trim()).filter(|arg| !arg.is_empty()).collect::<Vec<_>>().join(" ")
}
