use std::path::PathBuf;

pub type BulletpointerResult<T> = Result<T, BulletpointerError>;

#[derive(thiserror::Error, Debug)]
pub enum BulletpointerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("document error: {0}")]
    Document(String),

    #[error("lookup error: expected one #{id} element; found {count}")]
    Lookup { id: String, count: usize },

    #[error("rasterizer error: {0}")]
    Raster(String),

    /// A failure while applying one layer, tagged with the source file and layer suffix.
    #[error("'{}' layer '{suffix}': {inner}", .path.display())]
    Layer {
        path: PathBuf,
        suffix: String,
        inner: Box<BulletpointerError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BulletpointerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }

    pub fn lookup(id: impl Into<String>, count: usize) -> Self {
        Self::Lookup {
            id: id.into(),
            count,
        }
    }

    pub fn raster(msg: impl Into<String>) -> Self {
        Self::Raster(msg.into())
    }

    pub fn in_layer(path: impl Into<PathBuf>, suffix: impl Into<String>, inner: Self) -> Self {
        Self::Layer {
            path: path.into(),
            suffix: suffix.into(),
            inner: Box::new(inner),
        }
    }

    /// The innermost error, looking through [`BulletpointerError::Layer`] tags.
    pub fn root(&self) -> &Self {
        match self {
            Self::Layer { inner, .. } => inner.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            BulletpointerError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            BulletpointerError::config("x")
                .to_string()
                .contains("config error:")
        );
        assert!(
            BulletpointerError::document("x")
                .to_string()
                .contains("document error:")
        );
        assert!(
            BulletpointerError::raster("x")
                .to_string()
                .contains("rasterizer error:")
        );
    }

    #[test]
    fn lookup_reports_id_and_count() {
        let msg = BulletpointerError::lookup("bullet2", 0).to_string();
        assert!(msg.contains("#bullet2"));
        assert!(msg.contains("found 0"));
    }

    #[test]
    fn layer_tag_names_file_suffix_and_cause() {
        let err = BulletpointerError::in_layer(
            "slides/intro.svg",
            "_2",
            BulletpointerError::lookup("bullet9", 0),
        );
        assert_eq!(
            err.to_string(),
            "'slides/intro.svg' layer '_2': lookup error: expected one #bullet9 element; found 0"
        );
        assert!(matches!(
            err.root(),
            BulletpointerError::Lookup { count: 0, .. }
        ));
    }

    #[test]
    fn io_failure_keeps_context_and_io_cause() {
        let err = crate::config::load_config(std::path::Path::new(
            "target/error_tests/missing.yaml",
        ))
        .unwrap_err();

        let BulletpointerError::Other(inner) = &err else {
            panic!("expected an io failure, got {err}");
        };
        assert!(err.to_string().contains("read config 'target/error_tests/missing.yaml'"));
        let io = inner.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
