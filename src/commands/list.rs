use anyhow::Result;

use crate::naming::ArchiveName;
use crate::registry::{PackageListing, RegistryTransport};

/// Prints every package known to the registry with its versions.
#[tracing::instrument(skip(transport))]
pub async fn list<T: RegistryTransport>(transport: &T) -> Result<PackageListing> {
    let listing = transport.list().await?;

    if listing.is_empty() {
        println!("No packages in registry.");
        return Ok(listing);
    }

    for (package, files) in &listing {
        println!("{} {}", package, format_versions(files));
    }
    Ok(listing)
}

/// Versions parsed from the filenames; unparseable names are shown as-is.
fn format_versions(files: &[String]) -> String {
    files
        .iter()
        .map(|f| match f.parse::<ArchiveName>() {
            Ok(name) => name.version,
            Err(_) => f.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CipError;
    use crate::registry::MockRegistryTransport;

    #[test]
    fn test_format_versions() {
        let files = vec![
            "demo-1.0.cpack".to_string(),
            "demo-1.1.cpack".to_string(),
            "odd".to_string(),
        ];
        assert_eq!(format_versions(&files), "1.0, 1.1, odd");
    }

    #[tokio::test]
    async fn test_list_returns_listing() {
        let mut transport = MockRegistryTransport::new();
        transport.expect_list().times(1).returning(|| {
            let mut listing = PackageListing::new();
            listing.insert("demo".to_string(), vec!["demo-1.0.cpack".to_string()]);
            Ok(listing)
        });

        let listing = list(&transport).await.unwrap();
        assert_eq!(listing["demo"], ["demo-1.0.cpack"]);
    }

    #[tokio::test]
    async fn test_list_propagates_unavailable() {
        let mut transport = MockRegistryTransport::new();
        transport
            .expect_list()
            .returning(|| Err(CipError::RegistryUnavailable("refused".into()).into()));

        let err = list(&transport).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CipError>(),
            Some(CipError::RegistryUnavailable(_))
        ));
    }
}
