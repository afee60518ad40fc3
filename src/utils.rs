// utils.rs
// Description: JSON helpers for GptConfig files and an atomic file write.
// History:
// - 2026-10-10: Config load and save replace the parameter checkpoint helpers.
// Author: handgrad contributors

use std::path::Path;

use crate::config::GptConfig;
use crate::error::NetError;

pub fn config_to_json(cfg: &GptConfig) -> Result<String, NetError> {
    serde_json::to_string_pretty(cfg).map_err(|e| NetError::Json(e.to_string()))
}

/// Parses and validates a config. Missing fields take their defaults.
pub fn config_from_json(s_json: &str) -> Result<GptConfig, NetError> {
    if s_json.trim().is_empty() {
        return Err(NetError::Json("config json is empty".to_string()));
    }
    let cfg: GptConfig = serde_json::from_str(s_json).map_err(|e| NetError::Json(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(s_path: &str) -> Result<GptConfig, NetError> {
    let s_json = std::fs::read_to_string(s_path)
        .map_err(|e| NetError::Io(format!("{s_path}: {e}")))?;
    config_from_json(&s_json)
}

pub fn save_config(s_path: &str, cfg: &GptConfig) -> Result<(), NetError> {
    write_file_atomic(s_path, &config_to_json(cfg)?)
}

/// Writes to `<path>.tmp` and renames it over `s_path`, creating parent directories.
pub fn write_file_atomic(s_path: &str, s_content: &str) -> Result<(), NetError> {
    if s_path.trim().is_empty() {
        return Err(NetError::Io("file path is empty".to_string()));
    }

    let p_path = Path::new(s_path);
    if let Some(p_parent) = p_path.parent() {
        if !p_parent.as_os_str().is_empty() {
            std::fs::create_dir_all(p_parent)
                .map_err(|e| NetError::Io(format!("{}: {e}", p_parent.display())))?;
        }
    }

    let s_tmp = format!("{s_path}.tmp");
    std::fs::write(&s_tmp, s_content).map_err(|e| NetError::Io(format!("{s_tmp}: {e}")))?;

    std::fs::rename(&s_tmp, s_path).map_err(|e| {
        let _ = std::fs::remove_file(&s_tmp);
        NetError::Io(format!("{s_path}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockSpec;

    #[test]
    fn config_survives_json() {
        let cfg = GptConfig {
            seed: Some(42),
            ..GptConfig::default()
        };
        let s_json = config_to_json(&cfg).unwrap();
        assert!(s_json.contains("\"kind\": \"attention\""));
        assert_eq!(config_from_json(&s_json).unwrap(), cfg);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = config_from_json(r#"{ "dimensionality": 4, "blocks": [{ "kind": "layer_norm" }] }"#)
            .unwrap();
        assert_eq!(cfg.dimensionality, 4);
        assert_eq!(cfg.vocabulary_size, 50);
        assert_eq!(cfg.blocks, vec![BlockSpec::LayerNorm]);
    }

    #[test]
    fn invalid_json_and_values_are_rejected() {
        assert!(matches!(config_from_json(""), Err(NetError::Json(_))));
        assert!(matches!(config_from_json("{ nope"), Err(NetError::Json(_))));
        assert!(matches!(
            config_from_json(r#"{ "learning_rate": -1.0 }"#),
            Err(NetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn atomic_write_replaces_file() {
        let p_dir = std::env::temp_dir().join(format!("handgrad_utils_{}", std::process::id()));
        let s_path = p_dir.join("nested").join("cfg.json");
        let s_path = s_path.to_string_lossy().to_string();

        save_config(&s_path, &GptConfig::bare(7, 3, 0.1)).unwrap();
        assert_eq!(load_config(&s_path).unwrap().vocabulary_size, 7);
        save_config(&s_path, &GptConfig::bare(9, 3, 0.1)).unwrap();
        assert_eq!(load_config(&s_path).unwrap().vocabulary_size, 9);
        assert!(!Path::new(&format!("{s_path}.tmp")).exists());

        let _ = std::fs::remove_dir_all(&p_dir);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_config("/definitely/not/here/cfg.json"),
            Err(NetError::Io(_))
        ));
    }
}
