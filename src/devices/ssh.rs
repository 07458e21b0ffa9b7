use super::{DeviceProfile, Family, SshSpec, SshTarget, Supports};
use crate::context::Context;
use crate::error::JobError;
use crate::request::Request;
use serde_json::json;

pub(super) static DEVICES: &[DeviceProfile] = &[DeviceProfile {
    name: "ssh-device",
    is_abstract: false,
    device_type: "ssh",
    arch: "arm64",
    lava_arch: "arm64",
    boot_method: "ssh",
    kernel: None,
    rootfs: None,
    dtb: None,
    bios: None,
    ramdisk: None,
    boot: None,
    extra_boot_args: "",
    redirect_to_kmsg: true,
    supports: Supports::NONE,
    context_overrides: &[],
    family: Family::Ssh(SshSpec { port: 22 }),
}];

pub(super) fn target(request: &Request, spec: &SshSpec) -> Result<SshTarget, JobError> {
    let required = |value: &Option<String>, argument: &str| {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| JobError::invalid(format!("argument --{} is required", argument)))
    };

    let host = required(&request.ssh_host, "ssh-host")?;
    let user = required(&request.ssh_user, "ssh-user")?;
    let identity_file = required(&request.ssh_identity_file, "ssh-identity-file")?;

    Ok(SshTarget {
        host,
        user,
        port: request.ssh_port.unwrap_or(spec.port),
        identity_file: identity_file.strip_prefix("file://").unwrap_or(&identity_file).to_string(),
    })
}

pub(super) fn job_context(context: &mut Context) -> &'static str {
    let prompt = match context.get_str("ssh_prompt") {
        Some(prompt) if !prompt.is_empty() => json!([prompt]),
        _ => json!([]),
    };
    context.store("ssh_prompt", prompt);
    "jobs/ssh.yaml.jinja2"
}

pub(super) fn device_dict_context(target: &SshTarget, context: &mut Context) {
    context.store("ssh_host", json!(target.host));
    context.store("ssh_user", json!(target.user));
    context.store("ssh_port", json!(target.port));
    context.store("ssh_identity_file", json!(target.identity_file));
    context.store("lava_test_results_dir", json!("/tmp/lava-%s"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_a_plain_identity_file_path() {
        let request = Request {
            ssh_host: Some("host".to_string()),
            ssh_user: Some("user".to_string()),
            ssh_identity_file: Some("/keys/id_ed25519".to_string()),
            ssh_port: Some(2222),
            ..Request::new("ssh-device")
        };

        let target = target(&request, &SshSpec { port: 22 }).unwrap();
        assert_eq!(target.identity_file, "/keys/id_ed25519");
        assert_eq!(target.port, 2222);
    }

    #[test]
    fn requires_an_identity_file() {
        let request = Request {
            ssh_host: Some("host".to_string()),
            ssh_user: Some("user".to_string()),
            ..Request::new("ssh-device")
        };

        let error = target(&request, &SshSpec { port: 22 }).unwrap_err();
        assert_eq!(error.to_string(), "argument --ssh-identity-file is required");
    }

    #[test]
    fn wraps_the_prompt_in_a_list() {
        let mut context = Context::from([("ssh_prompt", json!("root@board:~#"))]);
        job_context(&mut context);
        assert_eq!(context.get("ssh_prompt"), Some(&json!(["root@board:~#"])));
    }
}
