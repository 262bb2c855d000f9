use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::scene::model::Scene;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

impl Scene {
    /// Parse and validate a scene from JSON.
    ///
    /// Layer transforms are brought into canonical form. The loaded scene gets a fresh
    /// [`crate::SceneId`].
    pub fn from_reader<R: std::io::Read>(r: R) -> LayerstackResult<Self> {
        let mut scene: Scene = serde_json::from_reader(r)
            .map_err(|e| LayerstackError::validation(format!("parse scene JSON: {e}")))?;
        scene.validate()?;
        scene.sanitize_layers()?;
        Ok(scene)
    }

    /// Parse and validate a scene from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> LayerstackResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            LayerstackError::validation(format!("open scene JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Write the scene as pretty JSON.
    pub fn to_writer<W: Write>(&self, w: W) -> LayerstackResult<()> {
        let mut w = BufWriter::new(w);
        serde_json::to_writer_pretty(&mut w, self)
            .map_err(|e| LayerstackError::serde(format!("write scene JSON: {e}")))?;
        w.flush()
            .map_err(|e| LayerstackError::Other(anyhow::Error::new(e)))?;
        Ok(())
    }

    /// Serialize the scene to a pretty JSON string.
    pub fn to_json_string(&self) -> LayerstackResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LayerstackError::serde(format!("serialize scene JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/persist.rs"]
mod tests;
