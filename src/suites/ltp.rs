use super::{TestKind, TestProfile};

const LTP: TestProfile = TestProfile {
    name: "ltp",
    is_abstract: true,
    devices: &["qemu-*", "nfs-*", "fastboot-*", "ssh-device"],
    timeout: 30,
    need_test_definition: true,
    kind: TestKind::Ltp { suite: "" },
};

const fn ltp(name: &'static str, suite: &'static str, timeout: u32) -> TestProfile {
    TestProfile {
        name,
        is_abstract: false,
        timeout,
        kind: TestKind::Ltp { suite },
        ..LTP
    }
}

pub(super) static TESTS: &[TestProfile] = &[
    LTP,
    ltp("ltp-cap_bounds", "cap_bounds", 1),
    ltp("ltp-commands", "commands", 10),
    ltp("ltp-containers", "containers", 10),
    ltp("ltp-controllers", "controllers", 180),
    ltp("ltp-crypto", "crypto", 5),
    ltp("ltp-cve", "cve", 20),
    ltp("ltp-dio", "dio", 50),
    ltp("ltp-fcntl-locktests", "fcntl-locktests", 1),
    ltp("ltp-filecaps", "filecaps", 1),
    ltp("ltp-fs", "fs", 30),
    ltp("ltp-fs_bind", "fs_bind", 10),
    ltp("ltp-fs_perms_simple", "fs_perms_simple", 1),
    ltp("ltp-hugetlb", "hugetlb", 10),
    ltp("ltp-io", "io", 1),
    ltp("ltp-ipc", "ipc", 3),
    ltp("ltp-math", "math", 10),
    ltp("ltp-mm", "mm", 30),
    ltp("ltp-nptl", "nptl", 15),
    ltp("ltp-pty", "pty", 3),
    ltp("ltp-sched", "sched", 10),
    ltp("ltp-securebits", "securebits", 1),
    ltp("ltp-smoke", "smoketest", 5),
    ltp("ltp-syscalls", "syscalls", 40),
    ltp("ltp-timers", "timers", 10),
    ltp("ltp-tracing", "tracing", 10),
];
