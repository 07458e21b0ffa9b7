use super::{TestKind, TestProfile};

const DEFINITION: TestProfile = TestProfile {
    name: "",
    is_abstract: false,
    devices: &["qemu-*", "nfs-*", "fastboot-*"],
    timeout: 10,
    need_test_definition: true,
    kind: TestKind::Definition { path: "" },
};

pub(super) static TESTS: &[TestProfile] = &[
    TestProfile {
        name: "hacking-session",
        devices: &["qemu-*", "nfs-*", "fastboot-*", "ssh-device"],
        timeout: 60,
        need_test_definition: false,
        kind: TestKind::HackingSession,
        ..DEFINITION
    },
    TestProfile {
        name: "kunit",
        kind: TestKind::Definition {
            path: "automated/linux/kunit/kunit.yaml",
        },
        ..DEFINITION
    },
    TestProfile {
        name: "libgpiod",
        kind: TestKind::Definition {
            path: "automated/linux/gpiod/gpiod.yaml",
        },
        ..DEFINITION
    },
    TestProfile {
        name: "perf",
        timeout: 30,
        kind: TestKind::Definition {
            path: "automated/linux/perf/perf.yaml",
        },
        ..DEFINITION
    },
    TestProfile {
        name: "v4l2",
        devices: &["qemu-*", "fastboot-*"],
        kind: TestKind::Definition {
            path: "automated/linux/v4l2/v4l2-compliance.yaml",
        },
        ..DEFINITION
    },
];
