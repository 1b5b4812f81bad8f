use entsync_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

/// Reference to the template an entity was created from.
///
/// The core only carries it to clients in the share snapshot; collaborators use
/// it to pick type-specific behavior.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateAccessor {
    pub template_id: i64,
    pub config_path: Option<String>,
}

impl TemplateAccessor {
    pub fn new(template_id: i64) -> Self {
        Self {
            template_id,
            config_path: None,
        }
    }

    pub fn with_config(template_id: i64, config_path: impl Into<String>) -> Self {
        Self {
            template_id,
            config_path: Some(config_path.into()),
        }
    }
}

impl Serde for TemplateAccessor {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.template_id.ser(writer);
        self.config_path.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            template_id: i64::de(reader)?,
            config_path: Option::<String>::de(reader)?,
        })
    }
}
