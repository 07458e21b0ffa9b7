use super::{DeviceProfile, Family, QemuSpec, Supports};
use crate::context::Context;
use serde_json::json;

const QEMU_SPEC: QemuSpec = QemuSpec {
    qemu_arch: "",
    machine: "virt",
    cpu: "max",
    memory: "4G",
    console: "ttyAMA0",
    rootfs_dev: "/dev/vda",
    rootfs_bus: "virtio-blk-device",
    extra_options: &[],
};

const QEMU: DeviceProfile = DeviceProfile {
    name: "qemu",
    is_abstract: true,
    device_type: "qemu",
    arch: "",
    lava_arch: "",
    boot_method: "qemu",
    kernel: None,
    rootfs: None,
    dtb: None,
    bios: None,
    ramdisk: None,
    boot: None,
    extra_boot_args: "",
    redirect_to_kmsg: true,
    supports: Supports { bios: true, ..Supports::NONE },
    context_overrides: &[],
    family: Family::Qemu(QEMU_SPEC),
};

pub(super) static DEVICES: &[DeviceProfile] = &[
    QEMU,
    DeviceProfile {
        name: "qemu-arm64",
        is_abstract: false,
        arch: "arm64",
        lava_arch: "arm64",
        kernel: Some("https://storage.tuxboot.com/buildroot/arm64/Image"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/arm64/rootfs.ext4.zst"),
        supports: Supports { bios: true, kvm: true, ..Supports::NONE },
        family: Family::Qemu(QemuSpec {
            qemu_arch: "aarch64",
            machine: "virt,gic-version=3,mte=on",
            cpu: "max,pauth-impdef=on",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-armv5",
        is_abstract: false,
        arch: "armv5",
        lava_arch: "arm",
        kernel: Some("https://storage.tuxboot.com/buildroot/armv5/zImage"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/armv5/rootfs.ext4.zst"),
        dtb: Some("https://storage.tuxboot.com/buildroot/armv5/versatile-pb.dtb"),
        supports: Supports { bios: true, dtb: true, ..Supports::NONE },
        family: Family::Qemu(QemuSpec {
            qemu_arch: "arm",
            machine: "versatilepb",
            cpu: "arm926",
            memory: "256M",
            rootfs_bus: "virtio-blk-pci",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-armv7",
        is_abstract: false,
        arch: "armv7",
        lava_arch: "arm",
        kernel: Some("https://storage.tuxboot.com/buildroot/armv7/zImage"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/armv7/rootfs.ext4.zst"),
        family: Family::Qemu(QemuSpec {
            qemu_arch: "arm",
            machine: "virt,gic-version=3",
            cpu: "cortex-a15",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-i386",
        is_abstract: false,
        arch: "i386",
        lava_arch: "i386",
        kernel: Some("https://storage.tuxboot.com/buildroot/i386/bzImage"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/i386/rootfs.ext4.zst"),
        supports: Supports { bios: true, kvm: true, ..Supports::NONE },
        family: Family::Qemu(QemuSpec {
            qemu_arch: "i386",
            machine: "q35",
            cpu: "coreduo",
            console: "ttyS0",
            rootfs_bus: "virtio-blk-pci",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-ppc64le",
        is_abstract: false,
        arch: "ppc64le",
        lava_arch: "ppc64le",
        kernel: Some("https://storage.tuxboot.com/buildroot/ppc64le/vmlinux"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/ppc64le/rootfs.ext4.zst"),
        family: Family::Qemu(QemuSpec {
            qemu_arch: "ppc64",
            machine: "pseries",
            cpu: "POWER9",
            memory: "2G",
            console: "hvc0",
            rootfs_bus: "virtio-blk-pci",
            extra_options: &["-smp 2"],
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-riscv64",
        is_abstract: false,
        arch: "riscv64",
        lava_arch: "riscv64",
        kernel: Some("https://storage.tuxboot.com/buildroot/riscv64/Image"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/riscv64/rootfs.ext4.zst"),
        family: Family::Qemu(QemuSpec {
            qemu_arch: "riscv64",
            cpu: "rv64",
            console: "ttyS0",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
    DeviceProfile {
        name: "qemu-x86_64",
        is_abstract: false,
        arch: "x86_64",
        lava_arch: "x86_64",
        kernel: Some("https://storage.tuxboot.com/buildroot/x86_64/bzImage"),
        rootfs: Some("https://storage.tuxboot.com/buildroot/x86_64/rootfs.ext4.zst"),
        supports: Supports { bios: true, kvm: true, ..Supports::NONE },
        family: Family::Qemu(QemuSpec {
            qemu_arch: "x86_64",
            machine: "q35",
            cpu: "Nehalem",
            console: "ttyS0",
            rootfs_bus: "virtio-blk-pci",
            ..QEMU_SPEC
        }),
        ..QEMU
    },
];

pub(super) fn job_context(spec: &QemuSpec, context: &mut Context) -> &'static str {
    context.store("machine", json!(spec.machine));
    context.store("cpu", json!(spec.cpu));
    context.store("memory", json!(spec.memory));
    context.store("console", json!(spec.console));
    context.store("rootfs_dev", json!(spec.rootfs_dev));
    context.store("rootfs_bus", json!(spec.rootfs_bus));
    context.store("extra_options", json!(spec.extra_options));
    "jobs/qemu.yaml.jinja2"
}

pub(super) fn device_dict_context(spec: &QemuSpec, context: &mut Context) {
    context.store("qemu_arch", json!(spec.qemu_arch));
    context.store("machine", json!(spec.machine));
    context.store("cpu", json!(spec.cpu));
    context.store("memory", json!(spec.memory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Device;
    use pretty_assertions::assert_eq;

    fn profile(name: &str) -> &'static DeviceProfile {
        DEVICES.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn only_armv5_ships_a_dtb() {
        let with_dtb: Vec<&str> = DEVICES.iter().filter(|p| p.dtb.is_some()).map(|p| p.name).collect();
        assert_eq!(with_dtb, vec!["qemu-armv5"]);
    }

    #[test]
    fn every_leaf_names_its_qemu_binary() {
        for profile in DEVICES.iter().filter(|p| !p.is_abstract) {
            let Family::Qemu(spec) = &profile.family else {
                panic!("{} is not a qemu device", profile.name);
            };
            assert!(!spec.qemu_arch.is_empty(), "{}", profile.name);
            assert!(profile.kernel.is_some() && profile.rootfs.is_some(), "{}", profile.name);
        }
    }

    #[test]
    fn renders_the_device_dictionary() {
        let output = Device::new(profile("qemu-arm64")).device_dict(Context::new(), None).unwrap();

        assert!(output.contains("command: qemu-system-aarch64"), "{}", output);
        assert!(output.contains("machine: 'virt,gic-version=3,mte=on'"), "{}", output);
        assert!(output.contains("- arm64"), "{}", output);
    }
}
