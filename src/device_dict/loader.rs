use super::parser::{self, SyntaxError};
use super::{DEVICE_DICT_VARS, DeviceDictConfig, DeviceDictError};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Reads a device dict file and keeps the variables it assigns.
#[instrument]
pub fn load(path: &Path) -> Result<DeviceDictConfig, DeviceDictError> {
    if !path.is_file() {
        return Err(DeviceDictError::NotFound(path.to_path_buf()));
    }

    let source = fs::read_to_string(path).map_err(|source| DeviceDictError::Io {
        source,
        path: path.to_path_buf(),
    })?;

    let assignments = parser::assignments(&source).map_err(|SyntaxError { line, reason }| DeviceDictError::Syntax {
        path: path.to_path_buf(),
        line,
        reason,
    })?;

    if let Some((name, _)) = assignments.iter().find(|(name, _)| !DEVICE_DICT_VARS.contains(name.as_str())) {
        return Err(DeviceDictError::UnknownVariable(name.clone()));
    }

    debug!("Device dict assigns {:?}", assignments.iter().map(|(name, _)| name).collect::<Vec<_>>());
    info!("📖 Loaded device dict {}", path.display());

    Ok(assignments.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources/device_dicts").join(name)
    }

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tuxlava-{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test_log::test]
    fn loads_a_grub_board() {
        let config = load(&fixture("cd8180-orion-o6.jinja2")).unwrap();

        assert_eq!(config.get_str("boot_method"), Some("grub"));
        assert_eq!(config.get_str("connection_command"), Some("telnet localhost 2000"));
        assert_eq!(config.get_str("hard_reset_command"), Some("pduclient --port 3 --command reboot"));
        assert_eq!(
            config.get("docker_shell_extra_arguments"),
            Some(&json!(["--add-host=lava-server:192.168.0.1", "--volume=/srv/nfs:/srv/nfs"]))
        );
    }

    #[rstest]
    #[case::ampereone("ampereone.jinja2")]
    #[case::ampereone_ac04("ampereone-ac04.jinja2")]
    #[case::juno("juno-r2.jinja2")]
    #[case::rpi("bcm2711-rpi-4-b.jinja2")]
    #[case::s32g("s32g399a-rdb3.jinja2")]
    #[case::db410c("dragonboard-410c.jinja2")]
    #[case::db845c("dragonboard-845c.jinja2")]
    #[case::oriole("gs101-oriole.jinja2")]
    #[case::rb5("qrb5165-rb5.jinja2")]
    fn loads_every_fixture(#[case] name: &str) {
        let config = load(&fixture(name)).unwrap();
        assert!(config.contains_key("connection_command"), "{}", name);
        assert!(config.contains_key("docker_shell_extra_arguments"), "{}", name);
    }

    #[test_log::test]
    fn keeps_exactly_the_assigned_names() {
        let config = load(&fixture("cd8180-orion-o6.jinja2")).unwrap();

        assert_eq!(
            config.names(),
            vec![
                "boot_method",
                "connection_command",
                "console_device",
                "docker_shell_extra_arguments",
                "hard_reset_command",
                "power_off_command",
                "power_on_command",
            ]
        );
    }

    #[test_log::test]
    fn skips_assignments_that_never_execute() {
        let path = write_temp(
            "scoped.jinja2",
            "{% set boot_method = 'grub' %}\n\
             {% if false %}{% set boot_method = 'u-boot' %}{% endif %}\n\
             {% macro prompt(helper) %}{% set helper = helper ~ '#' %}{{ helper }}{% endmacro %}\n\
             {% raw %}{% set example = 1 %}{% endraw %}\n",
        );

        let config = load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.get_str("boot_method"), Some("grub"));
        assert_eq!(config.names(), vec!["boot_method"]);
    }

    #[test_log::test]
    fn concatenated_values_are_resolved() {
        let config = load(&fixture("juno-r2.jinja2")).unwrap();
        assert_eq!(config.get_str("connection_command"), Some("telnet lava-lab 7001"));
        assert_eq!(config.get_str("bootloader_prompt"), Some("juno#"));
    }

    #[test_log::test]
    fn missing_files_are_not_found() {
        let path = fixture("does-not-exist.jinja2");
        let error = load(&path).unwrap_err();
        assert_eq!(error.to_string(), format!("Device dict file not found: {}", path.display()));
    }

    #[test_log::test]
    fn directories_are_not_found() {
        assert!(matches!(load(&fixture("")), Err(DeviceDictError::NotFound(_))));
    }

    #[test_log::test]
    fn rejects_unknown_variables() {
        let path = write_temp(
            "unknown.jinja2",
            "{% set connection_command = 'telnet localhost 2000' %}\n{% set foo_bar = 'baz' %}\n{% set lava_arch = 'x' %}\n",
        );

        let error = load(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert_eq!(error.to_string(), "Unknown variable: foo_bar");
    }

    #[test_log::test]
    fn reports_the_line_of_a_syntax_error() {
        let path = write_temp("syntax.jinja2", "{% set boot_method = 'grub' %}\n{% set connection_command = telnet %}\n");

        let error = load(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert_eq!(
            error.to_string(),
            format!("Invalid device dict file {}: line 2: undefined variable 'telnet'", path.display())
        );
    }
}
