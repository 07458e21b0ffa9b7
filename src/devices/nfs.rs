use super::{ContextValue, DEFAULT_STORAGE_DEVICE, DeviceProfile, Family, NfsSpec, StoragePrep, Supports};
use crate::context::Context;
use crate::device_dict::DeviceDictConfig;
use serde_json::{Map, Value, json};

const ARM64_KERNEL: &str = "https://storage.tuxboot.com/buildroot/arm64/Image";
const ARM64_ROOTFS: &str = "https://storage.tuxboot.com/debian/20250326/trixie/arm64/rootfs.tar.xz";
const X86_KERNEL: &str = "https://storage.tuxboot.com/buildroot/x86_64/bzImage";
const NVME_SCRATCH: &str = "/dev/nvme0n1p2";

/// Device dict values that also tune the booted kernel, forwarded to the job context.
const JOB_CONTEXT_VARS: &[&str] = &["bootloader_prompt", "booti_dtb_addr", "booti_kernel_addr", "booti_ramdisk_addr", "console_device"];

const NFS_SPEC: NfsSpec = NfsSpec {
    storage: StoragePrep::NONE,
    device_kernel_args: "",
};

const NFS: DeviceProfile = DeviceProfile {
    name: "nfs",
    is_abstract: true,
    device_type: "",
    arch: "arm64",
    lava_arch: "arm64",
    boot_method: "u-boot",
    kernel: Some(ARM64_KERNEL),
    rootfs: Some(ARM64_ROOTFS),
    dtb: None,
    bios: None,
    ramdisk: None,
    boot: None,
    extra_boot_args: "",
    redirect_to_kmsg: true,
    supports: Supports { bios: true, ..Supports::NONE },
    context_overrides: &[],
    family: Family::Nfs(NFS_SPEC),
};

/// Boards with a flattened device tree, the only ones taking a custom dtb.
const NFS_WITH_DTB: DeviceProfile = DeviceProfile {
    supports: Supports { dtb: true, bios: true, ..Supports::NONE },
    ..NFS
};

const AMPERE: DeviceProfile = DeviceProfile {
    is_abstract: false,
    rootfs: Some("https://storage.tuxboot.com/debian/trixie/arm64/rootfs.tar.xz"),
    boot_method: "grub",
    context_overrides: &[("arch", ContextValue::Str("arm64"))],
    family: Family::Nfs(NfsSpec {
        storage: StoragePrep::on(NVME_SCRATCH),
        ..NFS_SPEC
    }),
    ..NFS
};

pub(super) static DEVICES: &[DeviceProfile] = &[
    NFS,
    DeviceProfile {
        name: "nfs-juno-r2",
        is_abstract: false,
        device_type: "juno-r2",
        context_overrides: &[
            ("bootloader_prompt", ContextValue::Str("juno#")),
            ("booti_dtb_addr", ContextValue::Str("0x88000000")),
            ("extra_nfsroot_args", ContextValue::Str(",wsize=65536")),
        ],
        family: Family::Nfs(NfsSpec {
            storage: StoragePrep::on(DEFAULT_STORAGE_DEVICE),
            device_kernel_args: "default_hugepagesz=2M hugepages=256 earlycon rw pci=config_acs=000000@pci:0:0",
        }),
        ..NFS_WITH_DTB
    },
    DeviceProfile {
        name: "nfs-bcm2711-rpi-4-b",
        is_abstract: false,
        device_type: "bcm2711-rpi-4-b",
        context_overrides: &[
            ("arch", ContextValue::Str("arm64")),
            ("booti_dtb_addr", ContextValue::Str("0x86000000")),
            ("console_device", ContextValue::Str("ttyS0")),
            ("extra_nfsroot_args", ContextValue::Str(",vers=3")),
        ],
        family: Family::Nfs(NfsSpec {
            device_kernel_args: "8250.nr_uarts=1 cma=64M rootwait earlycon systemd.log_level=warning",
            ..NFS_SPEC
        }),
        ..NFS_WITH_DTB
    },
    DeviceProfile {
        name: "nfs-s32g399a-rdb3",
        is_abstract: false,
        device_type: "s32g399a-rdb3",
        context_overrides: &[
            ("arch", ContextValue::Str("arm64")),
            ("booti_dtb_addr", ContextValue::Str("0x86000000")),
            ("extra_nfsroot_args", ContextValue::Str(",vers=3")),
        ],
        family: Family::Nfs(NfsSpec {
            device_kernel_args: "rootwait earlycon systemd.log_level=warning",
            ..NFS_SPEC
        }),
        ..NFS_WITH_DTB
    },
    DeviceProfile {
        name: "nfs-rk3399-rock-pi-4b",
        is_abstract: false,
        device_type: "rk3399-rock-pi-4b",
        context_overrides: &[
            ("arch", ContextValue::Str("arm64")),
            ("booti_dtb_addr", ContextValue::Str("0x86000000")),
            ("extra_nfsroot_args", ContextValue::Str(",vers=3")),
        ],
        family: Family::Nfs(NfsSpec {
            device_kernel_args: "rootwait earlycon systemd.log_level=warning",
            ..NFS_SPEC
        }),
        ..NFS_WITH_DTB
    },
    DeviceProfile {
        name: "nfs-i386",
        is_abstract: false,
        device_type: "i386",
        arch: "i386",
        lava_arch: "i386",
        boot_method: "ipxe",
        kernel: Some(X86_KERNEL),
        rootfs: Some("https://storage.tuxboot.com/debian/20250326/trixie/i386/rootfs.tar.xz"),
        context_overrides: &[("test_character_delay", ContextValue::Int(10))],
        family: Family::Nfs(NfsSpec {
            storage: StoragePrep::on(DEFAULT_STORAGE_DEVICE),
            device_kernel_args: "rootwait",
        }),
        ..NFS
    },
    DeviceProfile {
        name: "nfs-x86_64",
        is_abstract: false,
        device_type: "x86_64",
        arch: "x86_64",
        lava_arch: "x86_64",
        boot_method: "ipxe",
        kernel: Some(X86_KERNEL),
        rootfs: Some("https://storage.tuxboot.com/debian/20250326/trixie/amd64/rootfs.tar.xz"),
        context_overrides: &[("test_character_delay", ContextValue::Int(10))],
        family: Family::Nfs(NfsSpec {
            storage: StoragePrep::on(DEFAULT_STORAGE_DEVICE),
            device_kernel_args: "rootwait",
        }),
        ..NFS
    },
    DeviceProfile {
        name: "nfs-ampereone",
        device_type: "ampereone",
        ..AMPERE
    },
    DeviceProfile {
        name: "nfs-altra-max-ac02",
        device_type: "altra-max-ac02",
        ..AMPERE
    },
    DeviceProfile {
        name: "nfs-ampereone-ac04",
        device_type: "ampereone-ac04",
        ..AMPERE
    },
    DeviceProfile {
        name: "nfs-cd8180-orion-o6",
        device_type: "cd8180-orion-o6",
        family: Family::Nfs(NfsSpec {
            storage: StoragePrep::on(NVME_SCRATCH),
            device_kernel_args: "rw console=ttyAMA2,115200 efi=noruntime earlycon=pl011,0x040d0000 arm-smmu-v3.disable_bypass=0 cma=640M acpi=force",
        }),
        ..AMPERE
    },
];

const NFS_BOOTLOADER: DeviceProfile = DeviceProfile {
    name: "nfs-bootloader",
    supports: Supports { dtb: true, bios: true, ..Supports::NONE },
    family: Family::NfsBootloader(NFS_SPEC),
    ..NFS
};

const NFS_GRUB: DeviceProfile = DeviceProfile {
    name: "nfs-grub",
    boot_method: "grub",
    ..NFS_BOOTLOADER
};

const NFS_UBOOT: DeviceProfile = DeviceProfile {
    name: "nfs-uboot",
    boot_method: "u-boot",
    ..NFS_BOOTLOADER
};

/// Generic boards, one per bootloader and architecture.
pub(super) static BOOTLOADER_DEVICES: &[DeviceProfile] = &[
    NFS_BOOTLOADER,
    NFS_GRUB,
    NFS_UBOOT,
    DeviceProfile {
        name: "nfs-grub-arm64",
        is_abstract: false,
        device_type: "grub-arm64",
        context_overrides: &[("arch", ContextValue::Str("arm64"))],
        ..NFS_GRUB
    },
    DeviceProfile {
        name: "nfs-grub-riscv64",
        is_abstract: false,
        device_type: "grub-riscv64",
        arch: "riscv64",
        lava_arch: "riscv64",
        context_overrides: &[("arch", ContextValue::Str("riscv64"))],
        ..NFS_GRUB
    },
    DeviceProfile {
        name: "nfs-grub-ppc64le",
        is_abstract: false,
        device_type: "grub-ppc64le",
        arch: "ppc64le",
        lava_arch: "ppc64le",
        context_overrides: &[("arch", ContextValue::Str("ppc64le"))],
        ..NFS_GRUB
    },
    DeviceProfile {
        name: "nfs-grub-i386",
        is_abstract: false,
        device_type: "grub-i386",
        arch: "i386",
        lava_arch: "i386",
        kernel: Some(X86_KERNEL),
        context_overrides: &[("arch", ContextValue::Str("i386"))],
        ..NFS_GRUB
    },
    DeviceProfile {
        name: "nfs-grub-x86-64",
        is_abstract: false,
        device_type: "grub-x86-64",
        arch: "x86_64",
        lava_arch: "x86_64",
        kernel: Some(X86_KERNEL),
        context_overrides: &[("arch", ContextValue::Str("x86_64"))],
        ..NFS_GRUB
    },
    DeviceProfile {
        name: "nfs-uboot-arm64",
        is_abstract: false,
        device_type: "uboot-arm64",
        context_overrides: &[("arch", ContextValue::Str("arm64"))],
        ..NFS_UBOOT
    },
    DeviceProfile {
        name: "nfs-uboot-riscv64",
        is_abstract: false,
        device_type: "uboot-riscv64",
        arch: "riscv64",
        lava_arch: "riscv64",
        context_overrides: &[("arch", ContextValue::Str("riscv64"))],
        ..NFS_UBOOT
    },
    DeviceProfile {
        name: "nfs-uboot-ppc64le",
        is_abstract: false,
        device_type: "uboot-ppc64le",
        arch: "ppc64le",
        lava_arch: "ppc64le",
        context_overrides: &[("arch", ContextValue::Str("ppc64le"))],
        ..NFS_UBOOT
    },
    DeviceProfile {
        name: "nfs-uboot-i386",
        is_abstract: false,
        device_type: "uboot-i386",
        arch: "i386",
        lava_arch: "i386",
        kernel: Some(X86_KERNEL),
        context_overrides: &[("arch", ContextValue::Str("i386"))],
        ..NFS_UBOOT
    },
    DeviceProfile {
        name: "nfs-uboot-x86-64",
        is_abstract: false,
        device_type: "uboot-x86-64",
        arch: "x86_64",
        lava_arch: "x86_64",
        kernel: Some(X86_KERNEL),
        context_overrides: &[("arch", ContextValue::Str("x86_64"))],
        ..NFS_UBOOT
    },
];

pub(super) fn job_context(profile: &DeviceProfile, spec: &NfsSpec, context: &mut Context, config: Option<&DeviceDictConfig>) -> &'static str {
    context.store("kernel_type", json!(profile.kernel_type()));
    context.store("needs_storage_prep", json!(spec.storage.needed));
    context.store("storage_device", json!(spec.storage.device));

    // arch is rendered on its own and test_character_delay only concerns the dispatcher
    let mut lava_context: Map<String, Value> = profile
        .context_overrides
        .iter()
        .filter(|(key, _)| !matches!(*key, "arch" | "test_character_delay"))
        .map(|(key, value)| (key.to_string(), value.to_value()))
        .collect();

    if let Some(config) = config {
        for key in JOB_CONTEXT_VARS {
            if let Some(value) = config.get(key).filter(|v| !v.is_null()) {
                lava_context.insert(key.to_string(), value.clone());
            }
        }
    }
    context.store("lava_context", Value::Object(lava_context));

    let extra_kernel_args = config.and_then(|c| c.get_str("extra_kernel_args")).unwrap_or_default();
    let kernel_args = super::join_args(&[spec.device_kernel_args, context.get_str("tux_boot_args").unwrap_or_default(), extra_kernel_args]);
    context.store("kernel_args", json!(kernel_args));

    match config {
        Some(config) => {
            context.store("docker_shell_extra_arguments", super::fastboot::docker_arguments(config));
            "jobs/nfs-device-dict.yaml.jinja2"
        }
        None => "jobs/nfs.yaml.jinja2",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(name: &str) -> &'static DeviceProfile {
        DEVICES.iter().chain(BOOTLOADER_DEVICES).find(|p| p.name == name).unwrap()
    }

    fn spec(profile: &DeviceProfile) -> &NfsSpec {
        match &profile.family {
            Family::Nfs(spec) | Family::NfsBootloader(spec) => spec,
            _ => panic!("{} is not an nfs device", profile.name),
        }
    }

    #[test]
    fn builds_the_lava_context_from_overrides_and_config() {
        let juno = profile("nfs-juno-r2");
        let config = DeviceDictConfig::from([("console_device", json!("ttyAMA0")), ("hard_reset_command", json!("pdu reboot"))]);
        let mut context = Context::from([("tux_boot_args", json!("quiet"))]);

        let template = job_context(juno, spec(juno), &mut context, Some(&config));

        assert_eq!(template, "jobs/nfs-device-dict.yaml.jinja2");
        assert_eq!(
            context.get("lava_context"),
            Some(&json!({
                "bootloader_prompt": "juno#",
                "booti_dtb_addr": "0x88000000",
                "console_device": "ttyAMA0",
                "extra_nfsroot_args": ",wsize=65536",
            }))
        );
        assert_eq!(
            context.get_str("kernel_args"),
            Some("default_hugepagesz=2M hugepages=256 earlycon rw pci=config_acs=000000@pci:0:0 quiet")
        );
        assert_eq!(context.get("docker_shell_extra_arguments"), Some(&json!([])));
    }

    #[test]
    fn ampere_boards_prepare_nvme_scratch_storage() {
        for name in ["nfs-ampereone", "nfs-altra-max-ac02", "nfs-ampereone-ac04", "nfs-cd8180-orion-o6"] {
            let profile = profile(name);
            assert_eq!(profile.boot_method, "grub", "{}", name);
            assert_eq!(spec(profile).storage, StoragePrep::on(NVME_SCRATCH), "{}", name);
        }
    }

    #[test]
    fn bootloader_leaves_inherit_their_boot_method() {
        assert_eq!(profile("nfs-grub-riscv64").boot_method, "grub");
        assert_eq!(profile("nfs-uboot-x86-64").boot_method, "u-boot");
        assert!(profile("nfs-grub").is_abstract);
        assert!(!profile("nfs-uboot-ppc64le").is_abstract);
    }

    #[test]
    fn x86_boards_slow_down_the_test_shell() {
        let mut context = Context::new();
        for (key, value) in profile("nfs-x86_64").context_overrides {
            context.store(key, value.to_value());
        }
        assert_eq!(context.get("test_character_delay"), Some(&json!(10)));
    }
}
