//! Recovery of deployment settings from pipeline YAML text.
//!
//! The text is user- or template-authored and is often not schema-valid, so
//! the default parser is a tolerant line scanner. A structural parser is
//! available behind the same trait.

mod collector;
mod scan;
mod structural;
mod types;

pub use collector::ENVIRONMENTS;
pub use scan::LineScanParser;
pub use structural::StructuralParser;
pub use types::{Confidence, ParsedEnvironmentSettings, ParsedPipelineSettings};

use crate::config::ParserKind;
use crate::providers::types::DefinitionId;

/// Extracts [`ParsedPipelineSettings`] from pipeline YAML.
///
/// Implementations never fail: unrecognised or malformed input produces an
/// empty or partial result.
pub trait PipelineSettingsParser: Send + Sync {
    fn parse(
        &self,
        yaml: &str,
        pipeline_id: Option<DefinitionId>,
        pipeline_name: Option<&str>,
    ) -> ParsedPipelineSettings;
}

pub fn parser_for(kind: ParserKind) -> Box<dyn PipelineSettingsParser> {
    match kind {
        ParserKind::LineScan => Box::new(LineScanParser),
        ParserKind::Structural => Box::new(StructuralParser),
    }
}
