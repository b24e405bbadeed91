//! JSONL fact streams.
//!
//! A fact stream is what the scanning collaborator emits for one
//! configuration-build cycle. Each line is one record:
//!
//! ```text
//! {"type":"type","name":"ILogger","kind":"interface","members":["Log"]}
//! {"type":"mixin","target":"Order","mixin":"AuditMixin","dependencies":["ILogger"]}
//! {"type":"complete_interface","target":"Order","interface":"IAuditable"}
//! ```
//!
//! File order is declaration order: the mixin and complete-interface records
//! of one target are folded in the order they appear.

use crate::jsonl::{JsonlError, open_checked, read_records, write_atomic, write_records};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use weave_kernel::{
    CompleteInterfaceFact, Fact, FactSource, MixinConfiguration, MixinFact, TargetDescriptor,
    TypeDecl, TypeRef,
};

/// One line of a fact stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactRecord {
    Type(TypeDecl),
    Mixin {
        target: TypeRef,
        #[serde(flatten)]
        fact: MixinFact,
    },
    CompleteInterface {
        target: TypeRef,
        #[serde(flatten)]
        fact: CompleteInterfaceFact,
    },
}

/// Read a fact stream into a configuration.
///
/// Repeating an identical type record is allowed; two different records
/// for the same type name are rejected.
pub fn read_configuration(reader: impl BufRead) -> Result<MixinConfiguration, JsonlError> {
    let mut configuration = MixinConfiguration::default();
    for (line_no, record) in read_records::<FactRecord>(reader)? {
        match record {
            FactRecord::Type(decl) => {
                let name = decl.name.clone();
                if let Some(previous) = configuration.catalog.insert(decl.clone())
                    && previous != decl
                {
                    return Err(JsonlError::Parse(
                        line_no,
                        format!("conflicting type record for {name}"),
                    ));
                }
            }
            FactRecord::Mixin { target, fact } => {
                configuration.push_fact(TargetDescriptor::new(target), fact);
            }
            FactRecord::CompleteInterface { target, fact } => {
                configuration.push_fact(TargetDescriptor::new(target), fact);
            }
        }
    }
    debug!(
        types = configuration.catalog.len(),
        targets = configuration.target_count(),
        "fact stream loaded"
    );
    Ok(configuration)
}

pub fn read_configuration_from_path(
    path: impl AsRef<Path>,
) -> Result<MixinConfiguration, JsonlError> {
    read_configuration(open_checked(path.as_ref())?)
}

/// Flatten a configuration back into records: types first, then each
/// target's facts in declaration order.
pub fn configuration_records(configuration: &MixinConfiguration) -> Vec<FactRecord> {
    let mut records: Vec<FactRecord> = configuration
        .catalog
        .iter()
        .cloned()
        .map(FactRecord::Type)
        .collect();
    for (target, facts) in &configuration.targets {
        for fact in facts {
            let target = target.type_ref().clone();
            records.push(match fact.clone() {
                Fact::Mixin(fact) => FactRecord::Mixin { target, fact },
                Fact::CompleteInterface(fact) => FactRecord::CompleteInterface { target, fact },
            });
        }
    }
    records
}

pub fn write_configuration(
    writer: &mut impl Write,
    configuration: &MixinConfiguration,
) -> Result<(), JsonlError> {
    write_records(writer, &configuration_records(configuration))
}

pub fn write_configuration_to_path(
    path: impl AsRef<Path>,
    configuration: &MixinConfiguration,
) -> Result<(), JsonlError> {
    write_atomic(path.as_ref(), |writer| {
        write_configuration(writer, configuration)
    })
}

/// A [`FactSource`] reading a JSONL fact stream from disk.
#[derive(Debug, Clone)]
pub struct JsonlFactSource {
    path: PathBuf,
}

impl JsonlFactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FactSource for JsonlFactSource {
    type Error = JsonlError;

    fn load(&self) -> Result<MixinConfiguration, JsonlError> {
        read_configuration_from_path(&self.path)
    }
}
