use super::{TestKind, TestProfile};

const KSELFTEST: TestProfile = TestProfile {
    name: "kselftest",
    is_abstract: true,
    devices: &["qemu-*", "nfs-*", "fastboot-*", "ssh-device"],
    timeout: 15,
    need_test_definition: true,
    kind: TestKind::Kselftest { suite: "" },
};

const fn kselftest(name: &'static str, suite: &'static str, timeout: u32) -> TestProfile {
    TestProfile {
        name,
        is_abstract: false,
        timeout,
        kind: TestKind::Kselftest { suite },
        ..KSELFTEST
    }
}

pub(super) static TESTS: &[TestProfile] = &[
    KSELFTEST,
    kselftest("kselftest-arm64", "arm64", 45),
    kselftest("kselftest-breakpoints", "breakpoints", 10),
    kselftest("kselftest-capabilities", "capabilities", 5),
    kselftest("kselftest-cgroup", "cgroup", 10),
    kselftest("kselftest-clone3", "clone3", 5),
    kselftest("kselftest-cpufreq", "cpufreq", 10),
    kselftest("kselftest-exec", "exec", 5),
    kselftest("kselftest-futex", "futex", 10),
    kselftest("kselftest-ipc", "ipc", 5),
    kselftest("kselftest-kvm", "kvm", 30),
    kselftest("kselftest-mm", "mm", 30),
    kselftest("kselftest-net", "net", 60),
    kselftest("kselftest-rseq", "rseq", 10),
    kselftest("kselftest-rtc", "rtc", 10),
    kselftest("kselftest-seccomp", "seccomp", 10),
    kselftest("kselftest-timers", "timers", 45),
];
