use std::path::PathBuf;

use anyhow::Context;

/// Optional per-attempt dump of request payloads and raw replies.
pub struct TraceWriter {
    dir: PathBuf,
    enabled: bool,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if enabled {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir, enabled })
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn write_attempt_text(
        &self,
        chunk_seq: usize,
        attempt: u32,
        kind: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self
            .dir
            .join(format!("chunk_{chunk_seq:06}.a{attempt}.{kind}.json"));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::TraceWriter;

    #[test]
    fn writes_named_attempt_files_only_when_enabled() {
        let dir = TempDir::new().expect("tempdir");
        let on = TraceWriter::new(dir.path().join("trace"), true).expect("trace");
        on.write_attempt_text(3, 2, "request", "{}").expect("write");
        assert!(dir.path().join("trace/chunk_000003.a2.request.json").exists());

        let off = TraceWriter::new(dir.path().join("off"), false).expect("trace");
        off.write_attempt_text(1, 1, "request", "{}").expect("noop");
        assert!(!dir.path().join("off").exists());
    }
}
