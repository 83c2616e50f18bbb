//! Colaborador de resolución: convierte texto libre o una URL en una
//! `PlayableSource`. Puede tardar segundos, así que siempre se invoca desde
//! la tarea del comando, nunca sosteniendo el lock de una sesión.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{error::ResolutionError, player::source::PlayableSource};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<PlayableSource, ResolutionError>;
}

/// Resolver respaldado por yt-dlp como proceso externo.
///
/// Solo sondea metadatos (`--dump-json`); el stream real lo abre la capa de
/// salida al momento de reproducir, con URLs frescas.
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpProbe {
    title: String,
    webpage_url: Option<String>,
    duration: Option<f64>,
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<PlayableSource, ResolutionError> {
        let target = normalize_query(query)?;
        debug!(%target, "🔍 sondeando metadatos con yt-dlp");

        let output = async_process::Command::new(&self.binary)
            .args(["--dump-json", "--no-playlist", "--quiet", "--no-warnings"])
            .arg(&target)
            .output()
            .await
            .map_err(|e| ResolutionError::Network(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(query, stderr = %stderr.trim(), "yt-dlp no encontró resultados");
            return Err(ResolutionError::NotFound(query.to_string()));
        }

        // --dump-json emite un objeto JSON por línea; interesa el primero.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;
        let probe: YtDlpProbe = serde_json::from_str(first_line)
            .map_err(|e| ResolutionError::Network(format!("salida ilegible de yt-dlp: {e}")))?;

        let mut source = PlayableSource::new(
            probe.title,
            probe.webpage_url.unwrap_or_else(|| query.to_string()),
        );
        if let Some(seconds) = probe.duration {
            source = source.with_duration(Duration::from_secs_f64(seconds));
        }
        Ok(source)
    }
}

/// Texto libre pasa a ser una búsqueda `ytsearch1:`; una URL se valida antes
/// de entregársela a yt-dlp.
fn normalize_query(query: &str) -> Result<String, ResolutionError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResolutionError::NotFound(query.to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let parsed =
            Url::parse(trimmed).map_err(|_| ResolutionError::UnsupportedSource(trimmed.into()))?;
        if parsed.host_str().is_none() {
            return Err(ResolutionError::UnsupportedSource(trimmed.into()));
        }
        Ok(trimmed.to_string())
    } else if trimmed.contains("://") {
        // Cualquier otro esquema (ftp, file, etc.) no es reproducible.
        Err(ResolutionError::UnsupportedSource(trimmed.into()))
    } else {
        Ok(format!("ytsearch1:{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn free_text_becomes_a_youtube_search() {
        assert_eq!(
            normalize_query("never gonna give you up").unwrap(),
            "ytsearch1:never gonna give you up"
        );
    }

    #[test]
    fn http_urls_pass_through_after_validation() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(normalize_query(url).unwrap(), url);
    }

    #[test]
    fn non_http_schemes_are_unsupported() {
        let err = normalize_query("ftp://example.com/song.mp3").unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedSource(_)));
    }

    #[test]
    fn malformed_urls_are_unsupported() {
        let err = normalize_query("https://").unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedSource(_)));
    }

    #[test]
    fn blank_queries_resolve_to_nothing() {
        let err = normalize_query("   ").unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }
}
