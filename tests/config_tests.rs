use advice::{
    add_advice_with, Advised, AdviceConfig, AdviceError, Class, LoggingConfig, MissingMixinPolicy,
    MixinList,
};
use anyhow::Result;
use serde_json::json;
use tempfile::TempDir;

/// Test saving and loading a configuration file
#[test]
fn test_save_and_load_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("nested").join("advice.toml");

    let config = AdviceConfig {
        missing_mixin: Some(MissingMixinPolicy::Error),
        logging: Some(LoggingConfig {
            verbose: Some(true),
            time_format: Some("[hour]:[minute]".to_string()),
        }),
    };
    config.save_to_file(&config_path)?;

    let loaded = AdviceConfig::load_from_file(&config_path)?;
    assert_eq!(loaded, config);
    assert!(loaded.is_verbose_default());
    Ok(())
}

/// Test loading a missing file reports the path
#[test]
fn test_load_missing_file_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let missing = temp_dir.path().join("absent.toml");

    let error = AdviceConfig::load_from_file(&missing).unwrap_err();
    assert!(format!("{error:#}").contains("absent.toml"));
    Ok(())
}

/// Test a malformed file is rejected
#[test]
fn test_load_malformed_file_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("advice.toml");
    std::fs::write(&config_path, "missing_mixin = [")?;

    assert!(AdviceConfig::load_from_file(&config_path).is_err());
    Ok(())
}

/// Test the error policy from configuration applies to the advised class
#[test]
fn test_error_policy_from_config() -> Result<()> {
    let config = AdviceConfig::from_toml_str(r#"missing_mixin = "error""#)?;
    let class = Class::new("Strict");
    add_advice_with(&class, &config);

    let mut mixins = MixinList::new();
    mixins.push_missing();
    let error = class.mixin(mixins, json!(null)).unwrap_err();
    assert!(matches!(error, AdviceError::MissingMixin { ref target } if target == "Strict"));
    Ok(())
}

/// Test subclasses keep the policy of their parent
#[test]
fn test_error_policy_is_inherited() -> Result<()> {
    let config = AdviceConfig {
        missing_mixin: Some(MissingMixinPolicy::Error),
        logging: None,
    };
    let class = Class::new("Strict");
    add_advice_with(&class, &config);
    let derived = class.extend("StrictChild");

    let mut mixins = MixinList::new();
    mixins.push_missing();
    assert!(derived.mixin(mixins, json!(null)).is_err());
    Ok(())
}

/// Test the default policy keeps composing past a missing descriptor
#[test]
fn test_default_policy_warns() -> Result<()> {
    let class = Class::new("Lenient");
    add_advice_with(&class, &AdviceConfig::default());

    let mut mixins = MixinList::new();
    mixins.push_missing();
    class.mixin(mixins, json!({"kept": true}))?;
    assert_eq!(class.mixed_options().get("kept"), Some(&json!(true)));
    Ok(())
}
