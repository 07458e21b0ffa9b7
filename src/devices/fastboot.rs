use super::{AospSpec, DeviceProfile, Family, FastbootSpec, StoragePrep, Supports};
use crate::context::Context;
use crate::device_dict::DeviceDictConfig;
use serde_json::{Value, json};

const DEBIAN_ARM64_ROOTFS: &str = "https://storage.tuxboot.com/debian/20250326/trixie/arm64/rootfs.tar.xz";
const BUILDROOT_ARM64_KERNEL: &str = "https://storage.tuxboot.com/buildroot/arm64/Image";
const QCOM_RAMDISK: &str = "https://images.validation.linaro.org/snapshots.linaro.org/member-builds/qcomlt/boards/qcom-armv8a/openembedded/master/56008/rpb/initramfs-rootfs-image-qcom-armv8a.rootfs-20240118001247-92260.cpio.gz";
const DB845C_PTABLE: &str = "https://images.validation.linaro.org/snapshots.linaro.org/96boards/dragonboard845c/linaro/rescue/28/dragonboard-845c-bootloader-ufs-linux-28/gpt_both0.bin";
const RB5_PTABLE: &str =
    "https://images.validation.linaro.org/snapshots.linaro.org/96boards/qrb5165-rb5/linaro/rescue/27/rb5-bootloader-ufs-linux-27/gpt_both0.bin";

const FASTBOOT_SPEC: FastbootSpec = FastbootSpec {
    template: "jobs/fastboot.yaml.jinja2",
    downloads_image_name: "rootfs",
    fastboot_image_name: "rootfs",
    needs_partition_flash: false,
    needs_boot_img: true,
    needs_boot_img_reboot: false,
    needs_vendor_boot: false,
    boot_docker_local: false,
    reboot_to_fastboot: None,
    pre_boot_commands: &[],
    post_boot_commands: &[],
    boot_commands: &[],
    erase_commands: &[],
    extra_prompts: &[],
    storage: StoragePrep::NONE,
};

const FASTBOOT: DeviceProfile = DeviceProfile {
    name: "fastboot",
    is_abstract: true,
    device_type: "",
    arch: "arm64",
    lava_arch: "arm64",
    boot_method: "fastboot",
    kernel: Some(BUILDROOT_ARM64_KERNEL),
    rootfs: Some(DEBIAN_ARM64_ROOTFS),
    dtb: None,
    bios: None,
    ramdisk: None,
    boot: None,
    extra_boot_args: "",
    redirect_to_kmsg: true,
    supports: Supports { dtb: true, ..Supports::NONE },
    context_overrides: &[],
    family: Family::Fastboot(FASTBOOT_SPEC),
};

/// Bootloader flavour shared by the boards that flash a partition table first.
const QCOM_BOOTLOADER: FastbootSpec = FastbootSpec {
    needs_partition_flash: true,
    needs_boot_img_reboot: true,
    pre_boot_commands: &["pre_os_command", "pre_power_command"],
    ..FASTBOOT_SPEC
};

pub(super) static DEVICES: &[DeviceProfile] = &[
    FASTBOOT,
    DeviceProfile {
        name: "fastboot-e850-96",
        is_abstract: false,
        device_type: "e850-96",
        family: Family::Fastboot(FastbootSpec {
            downloads_image_name: "userdata",
            fastboot_image_name: "userdata",
            pre_boot_commands: &["pre_power_command"],
            post_boot_commands: &["pre_os_command"],
            ..FASTBOOT_SPEC
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-dragonboard-410c",
        is_abstract: false,
        device_type: "dragonboard-410c",
        family: Family::Fastboot(FastbootSpec {
            pre_boot_commands: &["pre_os_command", "pre_power_command"],
            ..FASTBOOT_SPEC
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-dragonboard-845c",
        is_abstract: false,
        device_type: "dragonboard-845c",
        bios: Some(DB845C_PTABLE),
        ramdisk: Some(QCOM_RAMDISK),
        redirect_to_kmsg: false,
        supports: Supports { dtb: true, bios: true, ramdisk: true, kvm: false },
        family: Family::Fastboot(FastbootSpec {
            boot_docker_local: true,
            extra_prompts: &["dragonboard-845c:"],
            ..QCOM_BOOTLOADER
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-oe-dragonboard-845c",
        is_abstract: false,
        device_type: "dragonboard-845c",
        kernel: None,
        bios: Some(DB845C_PTABLE),
        boot: Some("https://storage.tuxboot.com/buildroot/arm64/boot.img"),
        redirect_to_kmsg: false,
        family: Family::Fastboot(FastbootSpec {
            template: "jobs/fastboot-oe.yaml.jinja2",
            ..FASTBOOT_SPEC
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-x15",
        is_abstract: false,
        device_type: "x15",
        boot_method: "u-boot",
        family: Family::Fastboot(FastbootSpec {
            downloads_image_name: "super",
            fastboot_image_name: "super",
            needs_boot_img: false,
            reboot_to_fastboot: Some("true"),
            boot_commands: &[
                "setenv fdtfile am57xx-beagle-x15.dtb",
                "setenv console ttyS2,115200n8",
                "setenv mmcdev 1",
                "part number mmc 1 super part_num",
                "setenv bootpart 1:${part_num}",
                "run mmcboot",
            ],
            storage: StoragePrep::on(super::DEFAULT_STORAGE_DEVICE),
            ..FASTBOOT_SPEC
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-gs101-oriole",
        is_abstract: false,
        device_type: "gs101-oriole",
        rootfs: Some("https://storage.tuxboot.com/debian/20250326/trixie/arm64/rootfs.ext4.xz"),
        family: Family::Fastboot(FastbootSpec {
            fastboot_image_name: "userdata",
            needs_boot_img_reboot: true,
            needs_vendor_boot: true,
            reboot_to_fastboot: Some("true"),
            erase_commands: &["dtbo"],
            ..FASTBOOT_SPEC
        }),
        ..FASTBOOT
    },
    DeviceProfile {
        name: "fastboot-qrb5165-rb5",
        is_abstract: false,
        device_type: "qrb5165-rb5",
        bios: Some(RB5_PTABLE),
        ramdisk: Some(QCOM_RAMDISK),
        supports: Supports { dtb: true, bios: true, ramdisk: true, kvm: false },
        family: Family::Fastboot(QCOM_BOOTLOADER),
        ..FASTBOOT
    },
];

const AOSP_PARAMETERS: &[&str] = &["TUXSUITE_BAKE_VENDOR_DOWNLOAD_URL", "BUILD_REFERENCE_IMAGE_GZ_URL", "LKFT_BUILD_CONFIG"];

const FASTBOOT_AOSP: DeviceProfile = DeviceProfile {
    name: "fastboot-aosp",
    is_abstract: true,
    kernel: None,
    rootfs: None,
    supports: Supports::NONE,
    family: Family::FastbootAosp(AospSpec {
        ptable: "",
        required_parameters: AOSP_PARAMETERS,
    }),
    ..FASTBOOT
};

pub(super) static AOSP_DEVICES: &[DeviceProfile] = &[
    FASTBOOT_AOSP,
    DeviceProfile {
        name: "fastboot-aosp-dragonboard-845c",
        is_abstract: false,
        device_type: "dragonboard-845c",
        family: Family::FastbootAosp(AospSpec {
            ptable: "https://images.validation.linaro.org/snapshots.linaro.org/96boards/dragonboard845c/linaro/rescue/101/dragonboard-845c-bootloader-ufs-aosp-101/gpt_both0.bin",
            required_parameters: AOSP_PARAMETERS,
        }),
        ..FASTBOOT_AOSP
    },
    DeviceProfile {
        name: "fastboot-aosp-qrb5165-rb5",
        is_abstract: false,
        device_type: "qrb5165-rb5",
        ramdisk: Some(QCOM_RAMDISK),
        family: Family::FastbootAosp(AospSpec {
            ptable: "https://images.validation.linaro.org/snapshots.linaro.org/96boards/qrb5165-rb5/linaro/rescue/27/rb5-bootloader-ufs-aosp-27/gpt_both0.bin",
            required_parameters: AOSP_PARAMETERS,
        }),
        ..FASTBOOT_AOSP
    },
];

pub(super) fn job_context(spec: &FastbootSpec, context: &mut Context, config: Option<&DeviceDictConfig>) -> &'static str {
    context.store("downloads_image_name", json!(spec.downloads_image_name));
    context.store("fastboot_image_name", json!(spec.fastboot_image_name));
    context.store("needs_partition_flash", json!(spec.needs_partition_flash));
    context.store("needs_boot_img", json!(spec.needs_boot_img));
    context.store("needs_boot_img_reboot", json!(spec.needs_boot_img_reboot));
    context.store("needs_vendor_boot", json!(spec.needs_vendor_boot));
    context.store("boot_docker_local", json!(spec.boot_docker_local));
    context.store("reboot_to_fastboot", json!(spec.reboot_to_fastboot));
    context.store("pre_boot_commands", json!(spec.pre_boot_commands));
    context.store("post_boot_commands", json!(spec.post_boot_commands));
    context.store("boot_commands", json!(spec.boot_commands));
    context.store("erase_commands", json!(spec.erase_commands));
    context.store("extra_prompts", json!(spec.extra_prompts));
    context.store("needs_storage_prep", json!(spec.storage.needed));
    context.store("storage_device", json!(spec.storage.device));

    let extra_kernel_args = config.and_then(|c| c.get_str("extra_kernel_args")).unwrap_or_default();
    let kernel_args = super::join_args(&[context.get_str("tux_boot_args").unwrap_or_default(), extra_kernel_args]);
    context.store("kernel_args", json!(kernel_args));

    match config {
        Some(config) if spec.template == FASTBOOT_SPEC.template => {
            context.store("fastboot_serial_number", config.get("fastboot_serial_number").cloned().unwrap_or(Value::Null));
            context.store("docker_shell_extra_arguments", docker_arguments(config));
            "jobs/fastboot-device-dict.yaml.jinja2"
        }
        _ => spec.template,
    }
}

pub(super) fn aosp_job_context(spec: &AospSpec, context: &mut Context) -> &'static str {
    context.store("ptable", json!(spec.ptable));
    "jobs/fastboot-aosp.yaml.jinja2"
}

/// Extra docker arguments from a device dict, always a list.
pub(super) fn docker_arguments(config: &DeviceDictConfig) -> Value {
    match config.get("docker_shell_extra_arguments") {
        Some(Value::Array(arguments)) => Value::Array(arguments.clone()),
        Some(Value::String(argument)) if !argument.is_empty() => json!([argument]),
        _ => json!([]),
    }
}
