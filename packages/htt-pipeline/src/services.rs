//! Service descriptors and the container the execution host starts them from

use crate::error::{PipelineError, PipelineResult};
use crate::stage::Binding;
use htt_config::{template, Namespace, Tag, TagValue};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const MAPPING_SERVICE: &str = "mapping";
pub const BANK_SERVICE: &str = "bank";
pub const HISTOGRAM_SERVICE: &str = "histograms";
pub const LRT_EVENT_SELECTION_SERVICE: &str = "EvtSelLRTSvc";

pub const MONITOR_STREAM: &str = "MONITOROUT";
pub const HOUGH_OUTPUT_STREAM: &str = "TRIGHTTHOUGHOUTPUT";
pub const HOUGH_OUTPUT_FILE: &str = "HTTHoughOutput.root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Mapping,
    Bank,
    Histogram,
    EventSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub kind: ServiceKind,
    pub properties: BTreeMap<String, TagValue>,
    /// Config file paths the service opens itself
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path_inputs: Vec<Binding>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            path_inputs: Vec::new(),
        }
    }

    pub fn reads_path(mut self, namespace: Namespace, key: impl Into<String>) -> Self {
        self.path_inputs.push(Binding::config(namespace, key));
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&TagValue> {
        self.properties.get(key)
    }

    /// Geometry files and region of the map tag
    pub fn mapping(map: &Tag, region_index: usize, region_name: &str) -> Self {
        let mut descriptor = Self::new(MAPPING_SERVICE, ServiceKind::Mapping)
            .with("region", region_index as i64)
            .with("regionName", region_name);
        descriptor.copy_paths(Namespace::Map, map);
        descriptor
    }

    /// Bank files plus the bank's random stream settings
    pub fn bank(bank: &Tag) -> Self {
        let mut descriptor = Self::new(BANK_SERVICE, ServiceKind::Bank);
        descriptor.copy_paths(Namespace::Bank, bank);
        for key in ["rndStreamName", "seed", "seed2"] {
            if let Some(value) = bank.get(key) {
                descriptor.properties.insert(key.to_string(), value.clone());
            }
        }
        descriptor
    }

    pub fn histograms(monitor_file: &str, hough_output: bool) -> Self {
        let descriptor =
            Self::new(HISTOGRAM_SERVICE, ServiceKind::Histogram).with(MONITOR_STREAM, monitor_file);
        if hough_output {
            descriptor.with(HOUGH_OUTPUT_STREAM, HOUGH_OUTPUT_FILE)
        } else {
            descriptor
        }
    }

    fn copy_paths(&mut self, namespace: Namespace, tag: &Tag) {
        for spec in template(namespace).path_fields() {
            if let Some(value) = tag.get(spec.key) {
                self.properties.insert(spec.key.to_string(), value.clone());
            }
        }
    }
}

/// Services keyed by name; owned by the caller that assembles the pipeline
#[derive(Debug, Default, Clone)]
pub struct ServiceContainer {
    services: BTreeMap<String, ServiceDescriptor>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Re-registering an identical descriptor is a no-op.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> PipelineResult<()> {
        match self.services.get(&descriptor.name) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(PipelineError::ServiceConflict {
                name: descriptor.name,
            }),
            None => {
                debug!(service = %descriptor.name, kind = ?descriptor.kind, "Registered service");
                self.services.insert(descriptor.name.clone(), descriptor);
                Ok(())
            }
        }
    }

    pub fn install<'a>(&mut self, descriptors: impl IntoIterator<Item = &'a ServiceDescriptor>) -> PipelineResult<()> {
        for descriptor in descriptors {
            self.register(descriptor.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
