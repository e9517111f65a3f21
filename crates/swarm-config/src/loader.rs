use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::SwarmConfig;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/swarm/config.yaml"));
    paths.push(PathBuf::from("/etc/swarm/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/swarm/config.yaml"));
        paths.push(home.join(".config/swarm/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("swarm/config.yaml"));
        paths.push(cfg.join("swarm/config.yml"));
    }

    paths.push(PathBuf::from(".swarm/config.yaml"));
    paths.push(PathBuf::from(".swarm/config.yml"));
    paths.push(PathBuf::from("swarm.yaml"));
    paths.push(PathBuf::from("swarm.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, lowest to
/// highest priority. `extra` is an explicit path (e.g. the `--config` CLI
/// flag) layered on top of everything else.
pub fn load(extra: Option<&Path>) -> anyhow::Result<SwarmConfig> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let config: SwarmConfig = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty()) {
        SwarmConfig::default()
    } else {
        serde_yaml::from_value(merged).context("deserializing merged config")?
    };
    Ok(config)
}

/// Deep-merge `src` into `dst`; `src` wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("net:\n  p2p_port: 7420\n  bind_addr: 127.0.0.1");
        let src = val("net:\n  p2p_port: 9000");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["net"]["bind_addr"].as_str(), Some("127.0.0.1"));
        assert_eq!(dst["net"]["p2p_port"].as_i64(), Some(9000));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/swarm_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.net.bind_addr, "127.0.0.1");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "net:\n  p2p_port: 9100\nbroker:\n  enabled: true").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.net.p2p_port, 9100);
        assert!(cfg.broker.enabled);
    }
}
