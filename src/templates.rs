use crate::context::Context;
use crate::utils::lava_compression;
use minijinja::{AutoEscape, Environment, Value};
use std::sync::LazyLock;
use tracing::{debug, instrument};

static TEMPLATES: &[(&str, &str)] = &[
    ("jobs/base.yaml.jinja2", include_str!("../templates/jobs/base.yaml.jinja2")),
    ("jobs/fastboot.yaml.jinja2", include_str!("../templates/jobs/fastboot.yaml.jinja2")),
    ("jobs/fastboot-aosp.yaml.jinja2", include_str!("../templates/jobs/fastboot-aosp.yaml.jinja2")),
    ("jobs/fastboot-device-dict.yaml.jinja2", include_str!("../templates/jobs/fastboot-device-dict.yaml.jinja2")),
    ("jobs/fastboot-oe.yaml.jinja2", include_str!("../templates/jobs/fastboot-oe.yaml.jinja2")),
    ("jobs/nfs.yaml.jinja2", include_str!("../templates/jobs/nfs.yaml.jinja2")),
    ("jobs/nfs-device-dict.yaml.jinja2", include_str!("../templates/jobs/nfs-device-dict.yaml.jinja2")),
    ("jobs/qemu.yaml.jinja2", include_str!("../templates/jobs/qemu.yaml.jinja2")),
    ("jobs/ssh.yaml.jinja2", include_str!("../templates/jobs/ssh.yaml.jinja2")),
    ("devices/fastboot-device-dict.yaml.jinja2", include_str!("../templates/devices/fastboot-device-dict.yaml.jinja2")),
    ("devices/fastboot-standard.yaml.jinja2", include_str!("../templates/devices/fastboot-standard.yaml.jinja2")),
    ("devices/nfs-device-dict.yaml.jinja2", include_str!("../templates/devices/nfs-device-dict.yaml.jinja2")),
    ("devices/nfs-standard.yaml.jinja2", include_str!("../templates/devices/nfs-standard.yaml.jinja2")),
    ("devices/qemu.yaml.jinja2", include_str!("../templates/devices/qemu.yaml.jinja2")),
    ("devices/ssh.yaml.jinja2", include_str!("../templates/devices/ssh.yaml.jinja2")),
    ("tests/definition.yaml.jinja2", include_str!("../templates/tests/definition.yaml.jinja2")),
    ("tests/hacking-session.yaml.jinja2", include_str!("../templates/tests/hacking-session.yaml.jinja2")),
    ("tests/kselftest.yaml.jinja2", include_str!("../templates/tests/kselftest.yaml.jinja2")),
    ("tests/ltp.yaml.jinja2", include_str!("../templates/tests/ltp.yaml.jinja2")),
    ("tests/rt-tests.yaml.jinja2", include_str!("../templates/tests/rt-tests.yaml.jinja2")),
];

static ENVIRONMENT: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_loader(|name| Ok(TEMPLATES.iter().find(|(n, _)| *n == name).map(|(_, source)| source.to_string())));
    env.add_filter("basename", basename);
    env.add_filter("compression", compression);
    env.add_filter("quote", quote);
    env.add_filter("scalar", scalar);
    env
});

/// Renders the named template with `context` as its only bindings.
#[instrument(skip(context))]
pub fn render(name: &str, context: &Context) -> Result<String, minijinja::Error> {
    let template = ENVIRONMENT.get_template(name)?;
    let output = template.render(context)?;
    debug!(bytes = output.len(), "Rendered template");
    Ok(output)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    TEMPLATES.iter().map(|(name, _)| *name)
}

fn basename(value: &Value) -> String {
    let value = value.to_string();
    value.rsplit('/').next().unwrap_or_default().to_string()
}

fn compression(url: &Value) -> String {
    url.as_str().and_then(lava_compression).unwrap_or_default().to_string()
}

/// Single-quoted YAML scalar.
fn quote(value: &Value) -> String {
    format!("'{}'", value.to_string().replace('\'', "''"))
}

/// Integers stay bare, anything else becomes a quoted scalar.
fn scalar(value: &Value) -> String {
    let text = value.to_string();
    if value.is_integer() || (value.as_str().is_some() && text.parse::<i64>().is_ok()) {
        text
    } else {
        quote(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn every_template_parses() {
        for name in names() {
            let result = ENVIRONMENT.get_template(name);
            assert!(result.is_ok(), "template {} failed to parse: {:?}", name, result.err());
        }
    }

    #[test]
    fn unknown_templates_fail() {
        assert!(render("jobs/unknown.yaml.jinja2", &Context::new()).is_err());
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(quote(&Value::from("root@host:~#")), "'root@host:~#'");
        assert_eq!(quote(&Value::from("it's")), "'it''s'");
    }

    #[test]
    fn scalar_keeps_integers_bare() {
        assert_eq!(scalar(&Value::from(3)), "3");
        assert_eq!(scalar(&Value::from("50")), "50");
        assert_eq!(scalar(&Value::from("2: x")), "'2: x'");
        assert_eq!(scalar(&Value::from("ten # minutes")), "'ten # minutes'");
    }

    #[test]
    fn basename_keeps_the_last_path_segment() {
        assert_eq!(basename(&Value::from("https://example.com/rescue/gpt_both0.bin")), "gpt_both0.bin");
        assert_eq!(basename(&Value::from("boot.img")), "boot.img");
    }

    #[test]
    fn compression_is_empty_for_missing_urls() {
        assert_eq!(compression(&Value::from(())), "");
        assert_eq!(compression(&Value::from("https://example.com/rootfs.tar.xz")), "xz");
    }

    #[test]
    fn ssh_device_template_renders_its_context() {
        let context = Context::from([
            ("ssh_host", json!("192.168.0.10")),
            ("ssh_user", json!("root")),
            ("ssh_port", json!(22)),
            ("ssh_identity_file", json!("/root/.ssh/id_rsa")),
            ("lava_test_results_dir", json!("/tmp/lava-%s")),
        ]);

        let output = render("devices/ssh.yaml.jinja2", &context).unwrap();
        assert!(output.contains("host: 192.168.0.10"), "{}", output);
        assert!(output.contains("port: 22"), "{}", output);
    }
}
