use anyhow::{Result, bail};
use log::debug;
use std::path::PathBuf;

use crate::config::CipConfig;
use crate::error::CipError;
use crate::runtime::Runtime;

/// Picks the library directory to install into.
///
/// An explicit path wins over the configured `install_target`. The result
/// must be an existing directory.
#[tracing::instrument(skip(runtime, config))]
pub fn resolve_target<R: Runtime>(
    runtime: &R,
    explicit: Option<PathBuf>,
    config: &CipConfig,
) -> Result<PathBuf> {
    let target = match explicit.or_else(|| config.install_target.clone()) {
        Some(path) => path,
        None => bail!(
            "No install target given. Pass --target <DIR> or run: cip config install_target <DIR>"
        ),
    };

    if !runtime.is_dir(&target) {
        return Err(CipError::InvalidTarget(target).into());
    }

    let resolved = runtime.canonicalize(&target)?;
    debug!("Resolved install target {:?}", resolved);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn config_with_target(target: Option<&str>) -> CipConfig {
        CipConfig {
            install_target: target.map(PathBuf::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_target_wins() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_dir()
            .with(eq(PathBuf::from("/explicit")))
            .returning(|_| true);
        runtime.expect_canonicalize().returning(|p| Ok(p.to_path_buf()));

        let target = resolve_target(
            &runtime,
            Some(PathBuf::from("/explicit")),
            &config_with_target(Some("/configured")),
        )
        .unwrap();
        assert_eq!(target, PathBuf::from("/explicit"));
    }

    #[test]
    fn test_falls_back_to_configured_target() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_dir()
            .with(eq(PathBuf::from("/configured")))
            .returning(|_| true);
        runtime.expect_canonicalize().returning(|p| Ok(p.to_path_buf()));

        let target =
            resolve_target(&runtime, None, &config_with_target(Some("/configured"))).unwrap();
        assert_eq!(target, PathBuf::from("/configured"));
    }

    #[test]
    fn test_no_target_at_all() {
        let runtime = MockRuntime::new();
        let err = resolve_target(&runtime, None, &config_with_target(None)).unwrap_err();
        assert!(err.to_string().contains("--target"));
    }

    #[test]
    fn test_target_must_be_a_directory() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);

        let err = resolve_target(&runtime, Some(PathBuf::from("/missing")), &CipConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CipError>(),
            Some(CipError::InvalidTarget(_))
        ));
    }
}
